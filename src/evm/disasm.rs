//! Linear-sweep disassembler for source bytecode.
//!
//! Every byte position reached by the sweep becomes one [`Instruction`].
//! Bytes with no defined opcode decode as `INVALID` carrying the raw
//! byte. A push whose immediate runs past the end of the code reads the
//! missing bytes as zero.

use crate::evm::instruction::Instruction;
use crate::evm::opcode::Mnemonic;
use alloy_primitives::U256;

pub fn disassemble(code: &[u8]) -> Vec<Instruction> {
    let mut out = Vec::with_capacity(code.len());
    let mut pc = 0;

    while pc < code.len() {
        let byte = code[pc];
        let mnemonic = Mnemonic::from_byte(byte).unwrap_or(Mnemonic::Invalid);
        let width = mnemonic.immediate_len();

        let operand = if mnemonic.is_push() {
            let start = (pc + 1).min(code.len());
            let end = (pc + 1 + width).min(code.len());
            let mut word = [0u8; 32];
            word[..end - start].copy_from_slice(&code[start..end]);
            // Bytes past the end of the code stay zero.
            Some(U256::from_be_slice(&word[..width]))
        } else {
            None
        };

        out.push(Instruction {
            mnemonic,
            opcode: byte,
            operand,
            pc,
            size: 1 + width,
        });
        pc += 1 + width;
    }

    out
}
