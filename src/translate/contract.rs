//! Contract compilation: one labeled block per contract.

use crate::avm::byterange;
use crate::avm::code::{Block, CodeBuilder};
use crate::avm::value::{Label, Value};
use crate::config::TranslatorConfig;
use crate::evm::instruction::Instruction;
use crate::evm::opcode::Mnemonic;
use crate::translate::dispatch::{DispatchEntry, DispatchTree};
use crate::translate::environment::Environment;
use crate::translate::errors::TranslateError;
use crate::translate::instruction::{InstructionContext, SharedTables, translate_instruction};
use alloy_primitives::U256;

#[derive(Clone, Debug)]
pub struct CompiledContract {
    pub id: U256,
    pub entry: Label,
    /// Entry label followed by one block per instruction.
    pub code: Block,
    pub jump_table: DispatchTree,
    /// The raw bytecode as a target byte range.
    pub code_blob: Value,
    pub instruction_count: usize,
}

/// Builds the jump destination table: `JUMPDEST` pc to its label.
pub fn jump_table(id: U256, instructions: &[Instruction]) -> Result<DispatchTree, TranslateError> {
    let entries = instructions
        .iter()
        .filter(|insn| insn.mnemonic == Mnemonic::JumpDest)
        .map(|insn| DispatchEntry::new(U256::from(insn.pc), Label::jumpdest(id, insn.pc)))
        .collect();
    DispatchTree::from_entries(entries)
}

/// Compiles the normalized `instructions` of contract `id`.
///
/// `code` is the raw bytecode, exposed to `CODECOPY` as a byte range.
pub fn compile_contract<E: Environment + ?Sized>(
    id: U256,
    instructions: &[Instruction],
    code: &[u8],
    shared: SharedTables<'_>,
    env: &E,
    config: &TranslatorConfig,
) -> Result<CompiledContract, TranslateError> {
    let entry = Label::contract_entry(id);
    let jump_table = jump_table(id, instructions)?;
    let code_blob = byterange::encode(code);

    let cx = InstructionContext {
        contract: id,
        instruction_count: instructions.len(),
        jump_table: &jump_table,
        shared,
        code_blob: &code_blob,
        gas_stub: config.gas_stub,
        env,
    };

    let mut b = CodeBuilder::with_note(format!("contract {id}"));
    b.label(entry.clone());
    for insn in instructions {
        b.append(translate_instruction(insn, &cx)?);
    }

    let falls_through = instructions
        .last()
        .is_none_or(|insn| !insn.mnemonic.is_terminator());
    if config.implicit_stop && falls_through {
        let end = instructions.last().map_or(0, Instruction::end);
        let mut stop = CodeBuilder::with_note(format!("implicit STOP @ {end}"));
        env.stop(&mut stop);
        b.append(stop.finish());
    }

    Ok(CompiledContract {
        id,
        entry,
        code: b.finish(),
        jump_table,
        code_blob,
        instruction_count: instructions.len(),
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::avm::code::{HostCall, Node};
    use crate::evm::disasm::disassemble;
    use crate::translate::environment::HostEnvironment;

    fn compile(code: &[u8], config: &TranslatorConfig) -> Result<CompiledContract, TranslateError> {
        let empty = DispatchTree::Empty;
        let shared = SharedTables {
            contracts: &empty,
            code_sizes: &empty,
        };
        compile_contract(
            U256::from(1u64),
            &disassemble(code),
            code,
            shared,
            &HostEnvironment,
            config,
        )
    }

    fn notes(block: &Block) -> Vec<String> {
        block
            .nodes
            .iter()
            .filter_map(|node| match node {
                Node::Block(inner) => inner.note.clone(),
                _ => None,
            })
            .collect()
    }

    #[test]
    fn entry_label_then_instruction_blocks() {
        let compiled = compile(&[0x60, 0x01, 0x50, 0x00], &TranslatorConfig::default()).unwrap();
        assert_eq!(compiled.entry, Label::named("contract_entry_1"));
        assert_eq!(compiled.code.nodes[0], Node::Label(compiled.entry.clone()));
        assert_eq!(notes(&compiled.code), vec!["PUSH1 0x1 @ 0", "POP @ 2", "STOP @ 3"]);
        assert_eq!(compiled.instruction_count, 3);
    }

    #[test]
    fn jump_table_covers_every_jumpdest() {
        let compiled = compile(&[0x5b, 0x00, 0x5b, 0x5b, 0x00], &TranslatorConfig::default()).unwrap();
        assert_eq!(compiled.jump_table.len(), 3);
        for pc in [0u64, 2, 3] {
            assert_eq!(
                compiled.jump_table.lookup(U256::from(pc)),
                Some(&Value::Label(Label::jumpdest(U256::from(1u64), pc as usize)))
            );
        }
        assert_eq!(compiled.jump_table.lookup(U256::from(1u64)), None);
    }

    #[test]
    fn implicit_stop_only_when_falling_through() {
        let compiled = compile(&[0x60, 0x01], &TranslatorConfig::default()).unwrap();
        assert_eq!(notes(&compiled.code), vec!["PUSH1 0x1 @ 0", "implicit STOP @ 2"]);
        assert_eq!(compiled.code.count(|n| matches!(n, Node::Host(HostCall::Stop))), 1);

        let compiled = compile(&[0x60, 0x01, 0xf3], &TranslatorConfig::default()).unwrap();
        assert_eq!(compiled.code.count(|n| matches!(n, Node::Host(HostCall::Stop))), 0);

        let config = TranslatorConfig {
            implicit_stop: false,
            ..TranslatorConfig::default()
        };
        let compiled = compile(&[0x60, 0x01], &config).unwrap();
        assert_eq!(notes(&compiled.code), vec!["PUSH1 0x1 @ 0"]);
    }

    #[test]
    fn empty_contract_stops() {
        let compiled = compile(&[], &TranslatorConfig::default()).unwrap();
        assert_eq!(notes(&compiled.code), vec!["implicit STOP @ 0"]);
        assert!(compiled.jump_table.is_empty());
    }

    #[test]
    fn code_blob_holds_raw_bytes() {
        let code = [0x60, 0x00, 0x60, 0x00, 0x39, 0x00];
        let compiled = compile(&code, &TranslatorConfig::default()).unwrap();
        assert_eq!(byterange::decode(&compiled.code_blob), Some(code.to_vec()));
    }

    #[test]
    fn unsupported_opcode_aborts() {
        let err = compile(&[0x31], &TranslatorConfig::default()).unwrap_err();
        assert!(matches!(
            err,
            TranslateError::UnsupportedOpcode { mnemonic: "BALANCE", pc: 0, .. }
        ));
    }
}
