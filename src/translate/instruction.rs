//! Per-instruction translation.

use crate::avm::code::{Block, CodeBuilder};
use crate::avm::isa::Opcode;
use crate::avm::stack;
use crate::avm::value::{Label, Value};
use crate::evm::instruction::Instruction;
use crate::evm::opcode::Mnemonic;
use crate::translate::dispatch::{
    DispatchTree, emit_cjump_or_halt, emit_halt_on_miss, emit_jump_or_halt,
};
use crate::translate::environment::Environment;
use crate::translate::errors::TranslateError;
use alloy_primitives::U256;

/// Lookup tables shared by every contract in a unit.
#[derive(Clone, Copy, Debug)]
pub struct SharedTables<'a> {
    /// Contract id to entry label.
    pub contracts: &'a DispatchTree,
    /// Contract id to instruction count.
    pub code_sizes: &'a DispatchTree,
}

/// Everything one contract's instructions are translated against.
pub struct InstructionContext<'a, E: ?Sized> {
    pub contract: U256,
    pub instruction_count: usize,
    /// Jump destination pc to label, local to the contract.
    pub jump_table: &'a DispatchTree,
    pub shared: SharedTables<'a>,
    pub code_blob: &'a Value,
    pub gas_stub: U256,
    pub env: &'a E,
}

/// Diagnostic note for the block of `insn`: `MNEMONIC [operand] @ pc`.
pub fn note(insn: &Instruction) -> String {
    format!("{insn} @ {}", insn.pc)
}

/// Translates one instruction into a block tagged with its origin.
pub fn translate_instruction<E: Environment + ?Sized>(
    insn: &Instruction,
    cx: &InstructionContext<'_, E>,
) -> Result<Block, TranslateError> {
    let mut b = CodeBuilder::with_note(note(insn));
    let env = cx.env;

    match insn.mnemonic {
        Mnemonic::Hash => {
            b.op(Opcode::Hash);
        }
        Mnemonic::SelfBalance => {
            b.push(Value::int(0));
            env.balance_get(&mut b);
        }

        Mnemonic::Add => {
            b.op(Opcode::Add);
        }
        Mnemonic::Mul => {
            b.op(Opcode::Mul);
        }
        Mnemonic::Sub => {
            b.op(Opcode::Sub);
        }
        Mnemonic::Div => {
            b.op(Opcode::Div);
        }
        Mnemonic::Mod => {
            b.op(Opcode::Mod);
        }
        Mnemonic::Exp => {
            b.op(Opcode::Exp);
        }
        Mnemonic::And => {
            b.op(Opcode::BitwiseAnd);
        }
        Mnemonic::Or => {
            b.op(Opcode::BitwiseOr);
        }
        Mnemonic::Not => {
            b.op(Opcode::BitwiseNot);
        }
        Mnemonic::Lt => {
            b.op(Opcode::Lt);
        }
        Mnemonic::Gt => {
            b.op(Opcode::Gt);
        }
        Mnemonic::Eq => {
            b.op(Opcode::Eq);
        }
        Mnemonic::IsZero => {
            b.op(Opcode::IsZero);
        }
        Mnemonic::Pop => {
            b.op(Opcode::Pop);
        }

        Mnemonic::Push0 => {
            b.push(Value::int(0));
        }
        m if m.is_push() => {
            let value = insn
                .operand
                .ok_or(TranslateError::MissingOperand { pc: insn.pc })?;
            b.push(value);
        }
        m @ (Mnemonic::Dup1
        | Mnemonic::Dup2
        | Mnemonic::Dup3
        | Mnemonic::Dup4
        | Mnemonic::Dup5
        | Mnemonic::Dup6
        | Mnemonic::Dup7
        | Mnemonic::Dup8
        | Mnemonic::Dup9
        | Mnemonic::Dup10
        | Mnemonic::Dup11
        | Mnemonic::Dup12
        | Mnemonic::Dup13
        | Mnemonic::Dup14
        | Mnemonic::Dup15
        | Mnemonic::Dup16) => {
            // DUPn copies the value n - 1 below the top
            stack::dup(&mut b, m.stack_depth().unwrap_or(1) - 1);
        }
        m @ (Mnemonic::Swap1
        | Mnemonic::Swap2
        | Mnemonic::Swap3
        | Mnemonic::Swap4
        | Mnemonic::Swap5
        | Mnemonic::Swap6
        | Mnemonic::Swap7
        | Mnemonic::Swap8
        | Mnemonic::Swap9
        | Mnemonic::Swap10
        | Mnemonic::Swap11
        | Mnemonic::Swap12
        | Mnemonic::Swap13
        | Mnemonic::Swap14
        | Mnemonic::Swap15
        | Mnemonic::Swap16) => {
            stack::swap(&mut b, m.stack_depth().unwrap_or(1));
        }

        Mnemonic::SLoad => env.storage_load(&mut b),
        Mnemonic::SStore => env.storage_store(&mut b),
        Mnemonic::MLoad => env.memory_load(&mut b),
        Mnemonic::MStore => env.memory_store(&mut b),
        Mnemonic::Caller => env.message_caller(&mut b),
        Mnemonic::CallValue => env.message_value(&mut b),
        Mnemonic::CallDataLoad => env.message_data_load(&mut b),
        Mnemonic::CallDataSize => env.message_data_size(&mut b),
        Mnemonic::Timestamp => env.message_timestamp(&mut b),
        Mnemonic::ReturnDataSize => env.return_data_size(&mut b),
        Mnemonic::ReturnDataCopy => env.return_data_copy(&mut b),
        Mnemonic::Sha3 => env.evm_sha3(&mut b),
        m @ (Mnemonic::Log1 | Mnemonic::Log2 | Mnemonic::Log3) => {
            env.evm_log(&mut b, m.log_topics().unwrap_or_default());
        }

        Mnemonic::Address => {
            b.push(cx.contract);
        }
        Mnemonic::CodeSize => {
            b.push(cx.instruction_count);
        }
        Mnemonic::Gas => {
            b.push(cx.gas_stub);
        }
        Mnemonic::ExtCodeSize => {
            cx.shared.code_sizes.emit(&mut b);
            emit_halt_on_miss(&mut b);
        }
        Mnemonic::CodeCopy => env.evm_copy_to_memory(&mut b, cx.code_blob),

        Mnemonic::Jump => {
            cx.jump_table.emit(&mut b);
            emit_jump_or_halt(&mut b);
        }
        Mnemonic::JumpI => {
            cx.jump_table.emit(&mut b);
            emit_cjump_or_halt(&mut b);
        }
        Mnemonic::JumpDest => {
            b.label(Label::jumpdest(cx.contract, insn.pc));
        }

        Mnemonic::Call => env.call(&mut b, cx.shared.contracts, insn.pc, cx.contract),
        Mnemonic::StaticCall => env.staticcall(&mut b, cx.shared.contracts, insn.pc, cx.contract),
        Mnemonic::Stop => env.stop(&mut b),
        Mnemonic::Revert | Mnemonic::Invalid => env.revert(&mut b),
        Mnemonic::Return => env.ret(&mut b),
        Mnemonic::SelfDestruct => env.selfdestruct(&mut b),

        other => {
            return Err(TranslateError::UnsupportedOpcode {
                mnemonic: other.as_str(),
                pc: insn.pc,
                contract: cx.contract,
            });
        }
    }

    Ok(b.finish())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::avm::code::{HostCall, Node};
    use crate::translate::environment::HostEnvironment;

    fn with_context<R>(f: impl FnOnce(&InstructionContext<'_, HostEnvironment>) -> R) -> R {
        let empty = DispatchTree::Empty;
        let blob = Value::none();
        let cx = InstructionContext {
            contract: U256::from(9u64),
            instruction_count: 4,
            jump_table: &empty,
            shared: SharedTables {
                contracts: &empty,
                code_sizes: &empty,
            },
            code_blob: &blob,
            gas_stub: U256::from(123u64),
            env: &HostEnvironment,
        };
        f(&cx)
    }

    fn translate(insn: Instruction) -> Result<Block, TranslateError> {
        with_context(|cx| translate_instruction(&insn, cx))
    }

    #[test]
    fn block_is_tagged_with_origin() {
        let block = translate(Instruction::push(Mnemonic::Push2, U256::from(0x1234u64), 7)).unwrap();
        assert_eq!(block.note.as_deref(), Some("PUSH2 0x1234 @ 7"));
        assert_eq!(block.nodes, vec![Node::Push(Value::int(0x1234))]);
    }

    #[test]
    fn constants_are_folded() {
        let block = translate(Instruction::new(Mnemonic::Address, 0)).unwrap();
        assert_eq!(block.nodes, vec![Node::Push(Value::int(9))]);
        let block = translate(Instruction::new(Mnemonic::CodeSize, 0)).unwrap();
        assert_eq!(block.nodes, vec![Node::Push(Value::int(4))]);
        let block = translate(Instruction::new(Mnemonic::Gas, 0)).unwrap();
        assert_eq!(block.nodes, vec![Node::Push(Value::int(123))]);
    }

    #[test]
    fn self_balance_queries_own_balance() {
        let block = translate(Instruction::new(Mnemonic::SelfBalance, 0)).unwrap();
        assert_eq!(
            block.nodes,
            vec![Node::Push(Value::int(0)), Node::Host(HostCall::BalanceGet)]
        );
    }

    #[test]
    fn invalid_reverts() {
        let block = translate(Instruction::new(Mnemonic::Invalid, 0)).unwrap();
        assert_eq!(block.nodes, vec![Node::Host(HostCall::Revert)]);
    }

    #[test]
    fn jumpdest_defines_label() {
        let block = translate(Instruction::new(Mnemonic::JumpDest, 30)).unwrap();
        assert_eq!(
            block.nodes,
            vec![Node::Label(Label::named("jumpdest_9_30"))]
        );
    }

    #[test]
    fn shallow_dup_and_swap_are_native() {
        let block = translate(Instruction::new(Mnemonic::Dup3, 0)).unwrap();
        assert_eq!(block.nodes, vec![Node::Op(Opcode::Dup2)]);
        let block = translate(Instruction::new(Mnemonic::Swap2, 0)).unwrap();
        assert_eq!(block.nodes, vec![Node::Op(Opcode::Swap2)]);
        let block = translate(Instruction::new(Mnemonic::Dup4, 0)).unwrap();
        assert!(block.count(|n| matches!(n, Node::Op(Opcode::AuxPush))) == 1);
    }

    #[test]
    fn log_topics() {
        let block = translate(Instruction::new(Mnemonic::Log2, 0)).unwrap();
        assert_eq!(block.nodes, vec![Node::Host(HostCall::Log { topics: 2 })]);
    }

    #[test]
    fn unsupported_opcodes_fail() {
        for (mnemonic, name) in [
            (Mnemonic::Balance, "BALANCE"),
            (Mnemonic::Log0, "LOG0"),
            (Mnemonic::Log4, "LOG4"),
            (Mnemonic::Create, "CREATE"),
            (Mnemonic::Xor, "XOR"),
        ] {
            let err = translate(Instruction::new(mnemonic, 12)).unwrap_err();
            assert_eq!(
                err,
                TranslateError::UnsupportedOpcode {
                    mnemonic: name,
                    pc: 12,
                    contract: U256::from(9u64),
                }
            );
        }
    }

    #[test]
    fn push_without_operand() {
        let err = translate(Instruction::new(Mnemonic::Push1, 3)).unwrap_err();
        assert_eq!(err, TranslateError::MissingOperand { pc: 3 });
    }
}
