//! Reference interpreter for assembled target code.
//!
//! Executes a [`Listing`] with an operand stack, an aux stack and a step
//! limit. Host calls are delegated to a [`Host`], which may continue, halt or
//! redirect execution to a label.

use crate::avm::assembler::{AsmInstr, Listing};
use crate::avm::code::HostCall;
use crate::avm::errors::AvmError;
use crate::avm::isa::Opcode;
use crate::avm::value::{Label, Value};
use crate::types::encoding::Encode;
use alloy_primitives::U256;
use sha3::{Digest, Keccak256};

/// Default bound on executed instructions per [`Machine::run`].
pub const DEFAULT_STEP_LIMIT: u64 = 1_000_000;

/// What the machine does after a host call.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum HostAction {
    Continue,
    Halt,
    Jump(Label),
}

/// Runtime services behind [`HostCall`]s.
pub trait Host {
    /// Performs `call`, reading and writing the operand stack (top is last).
    fn call(&mut self, call: &HostCall, stack: &mut Vec<Value>) -> Result<HostAction, AvmError>;
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Outcome {
    /// A `halt` instruction or the host stopped execution.
    Halted,
    /// Execution ran past the last instruction.
    Finished,
}

pub struct Machine<'a> {
    listing: &'a Listing,
    pc: usize,
    stack: Vec<Value>,
    aux: Vec<Value>,
    steps: u64,
    step_limit: u64,
}

impl<'a> Machine<'a> {
    pub fn new(listing: &'a Listing) -> Self {
        Self {
            listing,
            pc: 0,
            stack: Vec::new(),
            aux: Vec::new(),
            steps: 0,
            step_limit: DEFAULT_STEP_LIMIT,
        }
    }

    pub fn with_step_limit(mut self, limit: u64) -> Self {
        self.step_limit = limit;
        self
    }

    /// Moves the program counter to `label`.
    pub fn start_at(&mut self, label: &Label) -> Result<(), AvmError> {
        self.pc = self.listing.resolve(label)?;
        Ok(())
    }

    pub fn push(&mut self, value: Value) {
        self.stack.push(value);
    }

    /// Operand stack, bottom first.
    pub fn stack(&self) -> &[Value] {
        &self.stack
    }

    pub fn steps(&self) -> u64 {
        self.steps
    }

    pub fn run(&mut self, host: &mut dyn Host) -> Result<Outcome, AvmError> {
        let listing = self.listing;
        loop {
            let Some(instr) = listing.get(self.pc) else {
                return Ok(Outcome::Finished);
            };
            if self.steps >= self.step_limit {
                return Err(AvmError::StepLimitExceeded {
                    limit: self.step_limit,
                });
            }
            self.steps += 1;

            match instr {
                AsmInstr::Push(value) => {
                    self.stack.push(value.clone());
                    self.pc += 1;
                }
                AsmInstr::Host(call) => match host.call(call, &mut self.stack)? {
                    HostAction::Continue => self.pc += 1,
                    HostAction::Halt => return Ok(Outcome::Halted),
                    HostAction::Jump(label) => self.pc = listing.resolve(&label)?,
                },
                AsmInstr::Op(Opcode::Halt) => return Ok(Outcome::Halted),
                AsmInstr::Op(op) => self.exec(*op)?,
            }
        }
    }

    fn pop(&mut self) -> Value {
        // Callers check depth against `Opcode::pops` first.
        self.stack.pop().unwrap_or_else(Value::none)
    }

    fn pop_int(&mut self, op: Opcode) -> Result<U256, AvmError> {
        let value = self.pop();
        value.as_int().ok_or(AvmError::TypeMismatch {
            pc: self.pc,
            op: op.mnemonic(),
            expected: "int",
            actual: value.kind(),
        })
    }

    fn jump_target(&self, value: &Value) -> Result<usize, AvmError> {
        match value {
            Value::Label(label) => self.listing.resolve(label),
            other => Err(AvmError::InvalidJump {
                pc: self.pc,
                target: other.to_string(),
            }),
        }
    }

    fn exec(&mut self, op: Opcode) -> Result<(), AvmError> {
        if self.stack.len() < op.pops() {
            return Err(AvmError::StackUnderflow {
                pc: self.pc,
                op: op.mnemonic(),
                needed: op.pops(),
            });
        }

        let mut next = self.pc + 1;
        match op {
            Opcode::Add
            | Opcode::Mul
            | Opcode::Sub
            | Opcode::Div
            | Opcode::Mod
            | Opcode::Exp
            | Opcode::Lt
            | Opcode::Gt
            | Opcode::BitwiseAnd
            | Opcode::BitwiseOr
            | Opcode::BitwiseXor => {
                let a = self.pop_int(op)?;
                let b = self.pop_int(op)?;
                let result = self.binary(op, a, b)?;
                self.stack.push(Value::Int(result));
            }
            Opcode::Eq => {
                let a = self.pop();
                let b = self.pop();
                self.stack.push(Value::Int(flag(a == b)));
            }
            Opcode::IsZero => {
                let a = self.pop_int(op)?;
                self.stack.push(Value::Int(flag(a.is_zero())));
            }
            Opcode::BitwiseNot => {
                let a = self.pop_int(op)?;
                self.stack.push(Value::Int(!a));
            }
            Opcode::Hash => {
                let a = self.pop();
                let digest: [u8; 32] = Keccak256::digest(a.to_bytes()).into();
                self.stack.push(Value::Int(U256::from_be_bytes(digest)));
            }
            Opcode::Pop => {
                self.pop();
            }
            Opcode::Dup0 | Opcode::Dup1 | Opcode::Dup2 => {
                let depth = op.pops() - 1;
                let value = self.stack[self.stack.len() - 1 - depth].clone();
                self.stack.push(value);
            }
            Opcode::Swap1 | Opcode::Swap2 => {
                let top = self.stack.len() - 1;
                self.stack.swap(top, top - (op.pops() - 1));
            }
            Opcode::AuxPush => {
                let value = self.pop();
                self.aux.push(value);
            }
            Opcode::AuxPop => {
                let value = self
                    .aux
                    .pop()
                    .ok_or(AvmError::AuxStackUnderflow { pc: self.pc })?;
                self.stack.push(value);
            }
            Opcode::Jump => {
                let dest = self.pop();
                next = self.jump_target(&dest)?;
            }
            Opcode::Cjump => {
                let dest = self.pop();
                let cond = self.pop_int(op)?;
                if !cond.is_zero() {
                    next = self.jump_target(&dest)?;
                }
            }
            Opcode::Nop | Opcode::Halt => {}
        }
        self.pc = next;
        Ok(())
    }

    fn binary(&self, op: Opcode, a: U256, b: U256) -> Result<U256, AvmError> {
        Ok(match op {
            Opcode::Add => a.wrapping_add(b),
            Opcode::Mul => a.wrapping_mul(b),
            Opcode::Sub => a.wrapping_sub(b),
            Opcode::Div => a
                .checked_div(b)
                .ok_or(AvmError::DivisionByZero { pc: self.pc })?,
            Opcode::Mod => a
                .checked_rem(b)
                .ok_or(AvmError::DivisionByZero { pc: self.pc })?,
            Opcode::Exp => a.wrapping_pow(b),
            Opcode::Lt => flag(a < b),
            Opcode::Gt => flag(a > b),
            Opcode::BitwiseAnd => a & b,
            Opcode::BitwiseOr => a | b,
            Opcode::BitwiseXor => a ^ b,
            _ => unreachable!("{op} is not a binary integer operation"),
        })
    }
}

fn flag(cond: bool) -> U256 {
    if cond { U256::from(1u64) } else { U256::ZERO }
}
