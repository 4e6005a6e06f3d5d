use crate::evm::opcode::Mnemonic;
use alloy_primitives::U256;
use std::fmt;

/// One decoded source operation.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Instruction {
    pub mnemonic: Mnemonic,
    /// Raw byte the instruction was decoded from. Fused instructions keep the
    /// byte of the first instruction they replaced.
    pub opcode: u8,
    /// Immediate value, present for push-like operations.
    pub operand: Option<U256>,
    /// Byte offset within the contract.
    pub pc: usize,
    /// Encoded length in bytes, immediate included.
    pub size: usize,
}

impl Instruction {
    /// Builds a single-byte instruction with no immediate.
    pub fn new(mnemonic: Mnemonic, pc: usize) -> Self {
        Self {
            mnemonic,
            opcode: mnemonic.byte().unwrap_or_default(),
            operand: None,
            pc,
            size: 1,
        }
    }

    /// Builds a push with the width implied by `mnemonic`.
    pub fn push(mnemonic: Mnemonic, value: U256, pc: usize) -> Self {
        Self {
            mnemonic,
            opcode: mnemonic.byte().unwrap_or_default(),
            operand: Some(value),
            pc,
            size: 1 + mnemonic.immediate_len(),
        }
    }

    /// Offset of the byte following this instruction.
    pub fn end(&self) -> usize {
        self.pc + self.size
    }
}

impl fmt::Display for Instruction {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match &self.operand {
            Some(value) => write!(f, "{} {:#x}", self.mnemonic, value),
            None => write!(f, "{}", self.mnemonic),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn display_with_operand() {
        let insn = Instruction::push(Mnemonic::Push1, U256::from(0x20u64), 4);
        assert_eq!(insn.to_string(), "PUSH1 0x20");
        assert_eq!(insn.size, 2);
        assert_eq!(insn.end(), 6);
    }

    #[test]
    fn display_without_operand() {
        assert_eq!(Instruction::new(Mnemonic::JumpDest, 0).to_string(), "JUMPDEST");
    }
}
