use crate::avm::errors::AvmError;
use crate::types::encoding::DecodeError;
use alloy_primitives::U256;
use evm2avm_derive::Error;

/// Translation-time failures. Any of these aborts the whole unit.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum TranslateError {
    #[error("unsupported opcode {mnemonic} at pc {pc} in contract {contract}")]
    UnsupportedOpcode {
        mnemonic: &'static str,
        pc: usize,
        contract: U256,
    },
    #[error("duplicate dispatch key {key}")]
    DuplicateDispatchKey { key: U256 },
    #[error("push at pc {pc} has no operand")]
    MissingOperand { pc: usize },
    #[error("assembly failed: {reason}")]
    Assembly { reason: String },
    #[error("malformed translation unit: {reason}")]
    Decode { reason: String },
}

impl From<AvmError> for TranslateError {
    fn from(err: AvmError) -> Self {
        TranslateError::Assembly {
            reason: err.to_string(),
        }
    }
}

impl From<DecodeError> for TranslateError {
    fn from(err: DecodeError) -> Self {
        TranslateError::Decode {
            reason: err.to_string(),
        }
    }
}
