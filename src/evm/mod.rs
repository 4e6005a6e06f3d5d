//! Source side: EVM opcodes, decoding and peephole normalization.
//!
//! # Modules
//!
//! - [`opcode`]: closed opcode enumeration generated from one table
//! - [`instruction`]: decoded instruction with pc and operand
//! - [`disasm`]: linear-sweep disassembler
//! - [`normalize`]: metadata stripping and idiom fusion

pub mod disasm;
pub mod instruction;
pub mod normalize;
pub mod opcode;

pub use instruction::Instruction;
pub use opcode::Mnemonic;
