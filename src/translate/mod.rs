//! Source-to-target translation.
//!
//! [`Translator::translate`] disassembles and normalizes every contract,
//! builds the shared dispatch trees, compiles each contract into a labeled
//! block and wraps them in the start-up code and message loop of a
//! [`TranslationUnit`].

pub mod contract;
pub mod dispatch;
pub mod environment;
pub mod errors;
pub mod instruction;
pub mod program;
pub mod unit;


pub use dispatch::{DispatchEntry, DispatchTree};
pub use environment::{Environment, HostEnvironment};
pub use errors::TranslateError;
pub use program::Translator;
pub use unit::TranslationUnit;
