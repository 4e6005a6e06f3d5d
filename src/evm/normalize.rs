//! Peephole normalization of decoded instruction streams.
//!
//! Runs before translation:
//! - metadata stripping drops the compiler's trailing metadata blob
//! - self-balance fusion turns `ADDRESS; PUSH20 0xff..ff; AND; BALANCE` into `SELFBALANCE`
//! - word-hash fusion (opt-in) turns `PUSH1 0; MSTORE; PUSH1 32; PUSH1 0; SHA3` into `HASH`

use crate::config::NormalizeOptions;
use crate::evm::instruction::Instruction;
use crate::evm::opcode::Mnemonic;
use alloy_primitives::U256;

/// Opcode byte pair that opens the metadata section (`LOG1` followed by `PUSH6`).
pub const METADATA_MARKER: (u8, u8) = (0xa1, 0x65);

/// What [`normalize`] changed.
#[derive(Debug, Default, Clone, PartialEq, Eq)]
pub struct NormalizeReport {
    /// Number of instructions removed by metadata stripping.
    pub stripped: usize,
    pub self_balance_fusions: usize,
    pub word_hash_fusions: usize,
}

/// Applies the enabled passes in order: strip, self-balance, word-hash.
pub fn normalize(
    instructions: &mut Vec<Instruction>,
    options: &NormalizeOptions,
) -> NormalizeReport {
    let mut report = NormalizeReport::default();
    if options.strip_metadata {
        let before = instructions.len();
        strip_metadata(instructions);
        report.stripped = before - instructions.len();
    }
    if options.fuse_self_balance {
        report.self_balance_fusions = fuse_self_balance(instructions);
    }
    if options.fuse_word_hash {
        report.word_hash_fusions = fuse_word_hash(instructions);
    }
    report
}

/// Truncates at the last occurrence of [`METADATA_MARKER`], scanning from the end.
///
/// Returns the index truncated at, if a marker was found.
pub fn strip_metadata(instructions: &mut Vec<Instruction>) -> Option<usize> {
    let (first, second) = METADATA_MARKER;
    let at = instructions
        .windows(2)
        .rposition(|pair| pair[0].opcode == first && pair[1].opcode == second)?;
    instructions.truncate(at);
    Some(at)
}

/// 2^160 - 1, the address mask.
fn address_mask() -> U256 {
    U256::MAX >> 96
}

/// Fuses the self-balance idiom. Returns the number of fusions.
pub fn fuse_self_balance(instructions: &mut Vec<Instruction>) -> usize {
    let mask = address_mask();
    fuse(instructions, 4, Mnemonic::SelfBalance, |w| {
        w[0].mnemonic == Mnemonic::Address
            && w[1].mnemonic == Mnemonic::Push20
            && w[1].operand == Some(mask)
            && w[2].mnemonic == Mnemonic::And
            && w[3].mnemonic == Mnemonic::Balance
    })
}

/// Fuses the single-word memory hash idiom. Returns the number of fusions.
pub fn fuse_word_hash(instructions: &mut Vec<Instruction>) -> usize {
    let push1 = |insn: &Instruction, value: u64| {
        insn.mnemonic == Mnemonic::Push1 && insn.operand == Some(U256::from(value))
    };
    fuse(instructions, 5, Mnemonic::Hash, |w| {
        push1(&w[0], 0)
            && w[1].mnemonic == Mnemonic::MStore
            && push1(&w[2], 32)
            && push1(&w[3], 0)
            && w[4].mnemonic == Mnemonic::Sha3
    })
}

/// Replaces every non-overlapping `len`-instruction window accepted by
/// `matches` with a single `fused` instruction spanning the same bytes.
fn fuse(
    instructions: &mut Vec<Instruction>,
    len: usize,
    fused: Mnemonic,
    matches: impl Fn(&[Instruction]) -> bool,
) -> usize {
    let mut out = Vec::with_capacity(instructions.len());
    let mut count = 0;
    let mut i = 0;

    while i < instructions.len() {
        if let Some(window) = instructions.get(i..i + len)
            && matches(window)
        {
            let first = &window[0];
            out.push(Instruction {
                mnemonic: fused,
                opcode: first.opcode,
                operand: None,
                pc: first.pc,
                size: window.iter().map(|insn| insn.size).sum(),
            });
            count += 1;
            i += len;
        } else {
            out.push(instructions[i].clone());
            i += 1;
        }
    }

    *instructions = out;
    count
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::evm::disasm::disassemble;

    fn mnemonics(instructions: &[Instruction]) -> Vec<Mnemonic> {
        instructions.iter().map(|i| i.mnemonic).collect()
    }

    fn self_balance_code(push: u8, mask_len: usize) -> Vec<u8> {
        let mut code = vec![0x30, push];
        code.extend(std::iter::repeat_n(0xFF, mask_len));
        code.extend_from_slice(&[0x16, 0x31, 0x00]);
        code
    }

    #[test]
    fn strip_truncates_at_marker() {
        // PUSH1 1, STOP, LOG1, PUSH6 ..
        let mut insns = disassemble(&[0x60, 0x01, 0x00, 0xa1, 0x65, 1, 2, 3, 4, 5, 6]);
        assert_eq!(strip_metadata(&mut insns), Some(2));
        assert_eq!(mnemonics(&insns), vec![Mnemonic::Push1, Mnemonic::Stop]);
    }

    #[test]
    fn strip_without_marker_is_noop() {
        let mut insns = disassemble(&[0x60, 0x01, 0x00, 0xa1, 0x00]);
        let before = insns.clone();
        assert_eq!(strip_metadata(&mut insns), None);
        assert_eq!(insns, before);
    }

    #[test]
    fn strip_uses_last_marker() {
        let mut insns = disassemble(&[0xa1, 0x65, 0, 0, 0, 0, 0, 0, 0x00, 0xa1, 0x65]);
        strip_metadata(&mut insns);
        assert_eq!(mnemonics(&insns), vec![Mnemonic::Log1, Mnemonic::Push6, Mnemonic::Stop]);
    }

    #[test]
    fn strip_is_idempotent_on_compiler_output() {
        let mut code = vec![0x60, 0x80, 0x60, 0x40, 0x52, 0x00, 0xfe];
        // a1 65 'bzzr0' 58 20 <32 bytes> 00 29
        code.extend_from_slice(&[0xa1, 0x65, 0x62, 0x7a, 0x7a, 0x72, 0x30, 0x58, 0x20]);
        code.extend_from_slice(&[0x11; 32]);
        code.extend_from_slice(&[0x00, 0x29]);

        let mut once = disassemble(&code);
        strip_metadata(&mut once);
        let mut twice = once.clone();
        strip_metadata(&mut twice);
        assert_eq!(once, twice);
        assert_eq!(once.last().map(|i| i.mnemonic), Some(Mnemonic::Invalid));
    }

    #[test]
    fn strip_short_inputs() {
        let mut empty: Vec<Instruction> = Vec::new();
        assert_eq!(strip_metadata(&mut empty), None);
        let mut single = disassemble(&[0xa1]);
        assert_eq!(strip_metadata(&mut single), None);
        assert_eq!(single.len(), 1);
    }

    #[test]
    fn self_balance_fuses_exact_idiom() {
        let mut insns = disassemble(&self_balance_code(0x73, 20));
        assert_eq!(fuse_self_balance(&mut insns), 1);
        assert_eq!(mnemonics(&insns), vec![Mnemonic::SelfBalance, Mnemonic::Stop]);
        assert_eq!(insns[0].pc, 0);
        assert_eq!(insns[0].size, 24);
        assert_eq!(insns[1].pc, 24);
    }

    #[test]
    fn self_balance_rejects_other_push_width() {
        let mut insns = disassemble(&self_balance_code(0x7f, 32));
        let before = insns.clone();
        assert_eq!(fuse_self_balance(&mut insns), 0);
        assert_eq!(insns, before);
    }

    #[test]
    fn self_balance_rejects_other_mask() {
        let mut code = self_balance_code(0x73, 20);
        code[2] = 0x7F;
        let mut insns = disassemble(&code);
        assert_eq!(fuse_self_balance(&mut insns), 0);
        assert!(insns.iter().any(|i| i.mnemonic == Mnemonic::Balance));
    }

    #[test]
    fn self_balance_rejects_reordered_idiom() {
        // PUSH20 mask, ADDRESS, AND, BALANCE
        let mut code = vec![0x73];
        code.extend(std::iter::repeat_n(0xFF, 20));
        code.extend_from_slice(&[0x30, 0x16, 0x31]);
        let mut insns = disassemble(&code);
        assert_eq!(fuse_self_balance(&mut insns), 0);
        assert_eq!(insns.len(), 4);
    }

    #[test]
    fn self_balance_partial_idiom_at_end() {
        let mut code = self_balance_code(0x73, 20);
        code.truncate(code.len() - 2);
        let mut insns = disassemble(&code);
        assert_eq!(fuse_self_balance(&mut insns), 0);
        assert_eq!(insns.len(), 3);
    }

    #[test]
    fn word_hash_fusion() {
        let code = [0x60, 0x00, 0x52, 0x60, 0x20, 0x60, 0x00, 0x20, 0x00];
        let mut insns = disassemble(&code);
        assert_eq!(fuse_word_hash(&mut insns), 1);
        assert_eq!(mnemonics(&insns), vec![Mnemonic::Hash, Mnemonic::Stop]);
        assert_eq!(insns[0].size, 8);
    }

    #[test]
    fn normalize_respects_options() {
        let code = [0x60, 0x00, 0x52, 0x60, 0x20, 0x60, 0x00, 0x20, 0xa1, 0x65];
        let mut insns = disassemble(&code);
        let report = normalize(&mut insns, &NormalizeOptions::default());
        assert_eq!(report.stripped, 2);
        assert_eq!(report.word_hash_fusions, 0);
        assert_eq!(insns.len(), 5);

        let mut insns = disassemble(&code);
        let options = NormalizeOptions {
            strip_metadata: false,
            fuse_self_balance: false,
            fuse_word_hash: true,
        };
        let report = normalize(&mut insns, &options);
        assert_eq!(report.stripped, 0);
        assert_eq!(report.word_hash_fusions, 1);
        assert_eq!(insns.len(), 3);
    }
}
