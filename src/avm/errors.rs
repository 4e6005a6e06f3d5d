use evm2avm_derive::Error;

/// Errors raised while assembling or executing target code.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum AvmError {
    /// Byte does not name a target opcode.
    #[error("invalid opcode byte {byte:#04x}")]
    InvalidOpcode { byte: u8 },
    /// Label defined more than once.
    #[error("duplicate label: {label}")]
    DuplicateLabel { label: String },
    /// Reference to a label that is never defined.
    #[error("undefined label: {label}")]
    UndefinedLabel { label: String },
    #[error("stack underflow at {pc}: {op} needs {needed} values")]
    StackUnderflow {
        pc: usize,
        op: &'static str,
        needed: usize,
    },
    #[error("aux stack underflow at {pc}")]
    AuxStackUnderflow { pc: usize },
    /// Operand has the wrong kind of value.
    #[error("{op} at {pc} expected {expected}, got {actual}")]
    TypeMismatch {
        pc: usize,
        op: &'static str,
        expected: &'static str,
        actual: &'static str,
    },
    /// Division or modulo by zero.
    #[error("division by zero at {pc}")]
    DivisionByZero { pc: usize },
    /// Jump to a value that is not a defined label.
    #[error("invalid jump target at {pc}: {target}")]
    InvalidJump { pc: usize, target: String },
    #[error("step limit of {limit} exceeded")]
    StepLimitExceeded { limit: u64 },
    /// The host rejected a call.
    #[error("host call {call} failed: {reason}")]
    HostFailure { call: &'static str, reason: String },
}
