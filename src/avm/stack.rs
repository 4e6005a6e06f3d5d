//! Stack manipulation at arbitrary depth.
//!
//! The target only has `dup0..dup2` and `swap1..swap2`. Deeper accesses park
//! the intervening values on the aux stack and restore them afterwards.

use crate::avm::code::CodeBuilder;
use crate::avm::isa::Opcode;

/// Pushes a copy of the value `depth` slots below the top (`0` is the top).
pub fn dup(b: &mut CodeBuilder, depth: usize) {
    match depth {
        0 => {
            b.op(Opcode::Dup0);
        }
        1 => {
            b.op(Opcode::Dup1);
        }
        2 => {
            b.op(Opcode::Dup2);
        }
        _ => {
            let parked = depth - 2;
            for _ in 0..parked {
                b.op(Opcode::AuxPush);
            }
            b.op(Opcode::Dup2);
            for _ in 0..parked {
                b.op(Opcode::AuxPop).op(Opcode::Swap1);
            }
        }
    }
}

/// Exchanges the top with the value `depth` slots below it (`depth >= 1`).
pub fn swap(b: &mut CodeBuilder, depth: usize) {
    match depth {
        0 => {}
        1 => {
            b.op(Opcode::Swap1);
        }
        2 => {
            b.op(Opcode::Swap2);
        }
        _ => {
            let parked = depth - 2;
            for _ in 0..parked {
                b.op(Opcode::Swap1).op(Opcode::AuxPush);
            }
            b.op(Opcode::Swap2);
            for _ in 0..parked {
                b.op(Opcode::AuxPop).op(Opcode::Swap1);
            }
        }
    }
}
