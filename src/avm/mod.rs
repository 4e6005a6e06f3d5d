//! Target virtual machine: instruction set, values, structured code, the
//! assembler that flattens it, and a reference interpreter.

pub mod assembler;
pub mod byterange;
pub mod code;
pub mod errors;
pub mod isa;
pub mod machine;
pub mod stack;
pub mod value;

pub use assembler::{Listing, assemble};
pub use code::{Block, CodeBuilder, HostCall, Node};
pub use errors::AvmError;
pub use isa::Opcode;
pub use value::{Label, Value};
