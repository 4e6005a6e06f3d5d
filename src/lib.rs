//! EVM to AVM bytecode translator.
//!
//! Disassembles and normalizes EVM contracts, translates them instruction by
//! instruction into structured AVM code and links everything into one
//! translation unit driven by a message loop.

pub mod avm;
pub mod config;
pub mod evm;
pub mod storage;
pub mod translate;
pub mod types;
pub mod utils;
