//! Target (AVM) instruction set.
//!
//! [`for_each_avm_opcode!`](crate::for_each_avm_opcode) holds the canonical
//! opcode definitions and invokes a callback macro for code generation.
//!
//! This module generates:
//! - The [`Opcode`] enum with its byte mapping
//! - `TryFrom<u8>` for decoding opcodes
//! - Mnemonics and stack arity used by the assembler listing and the machine
//!
//! Binary operators pop `a` (top) then `b` and push `a op b`. `cjump` pops the
//! destination, then the condition.

use crate::avm::errors::AvmError;
use crate::types::encoding::{Decode, DecodeError, Encode, EncodeSink};

/// Invokes a callback macro with the complete opcode definition list.
///
/// Entry format: `Name = byte, "mnemonic", pops, pushes`.
#[macro_export]
macro_rules! for_each_avm_opcode {
    ($callback:ident) => {
        $callback! {
            // =========================
            // Arithmetic
            // =========================
            /// a + b (mod 2^256)
            Add = 0x01, "add", 2, 1,
            /// a * b (mod 2^256)
            Mul = 0x02, "mul", 2, 1,
            /// a - b (mod 2^256)
            Sub = 0x03, "sub", 2, 1,
            /// a / b; b = 0 is an error
            Div = 0x04, "div", 2, 1,
            /// a % b; b = 0 is an error
            Mod = 0x06, "mod", 2, 1,
            /// a ** b (mod 2^256)
            Exp = 0x0a, "exp", 2, 1,
            // =========================
            // Comparison and bitwise
            // =========================
            Lt = 0x10, "lt", 2, 1,
            Gt = 0x11, "gt", 2, 1,
            /// Structural equality over any two values
            Eq = 0x14, "eq", 2, 1,
            IsZero = 0x15, "iszero", 1, 1,
            BitwiseAnd = 0x16, "and", 2, 1,
            BitwiseOr = 0x17, "or", 2, 1,
            BitwiseXor = 0x18, "xor", 2, 1,
            BitwiseNot = 0x19, "not", 1, 1,
            Hash = 0x20, "hash", 1, 1,
            // =========================
            // Stack and control
            // =========================
            Pop = 0x30, "pop", 1, 0,
            Jump = 0x34, "jump", 1, 0,
            Cjump = 0x35, "cjump", 2, 0,
            /// Moves the top of the main stack onto the aux stack
            AuxPush = 0x38, "auxpush", 1, 0,
            /// Moves the top of the aux stack onto the main stack
            AuxPop = 0x39, "auxpop", 0, 1,
            Nop = 0x3b, "nop", 0, 0,
            Dup0 = 0x40, "dup0", 1, 2,
            Dup1 = 0x41, "dup1", 2, 3,
            Dup2 = 0x42, "dup2", 3, 4,
            Swap1 = 0x43, "swap1", 2, 2,
            Swap2 = 0x44, "swap2", 3, 3,
            Halt = 0x74, "halt", 0, 0,
        }
    };
}

#[macro_export]
macro_rules! define_opcodes {
    (
        $(
            $(#[$doc:meta])*
            $name:ident = $byte:literal, $mnemonic:literal, $pops:literal, $pushes:literal
        ),* $(,)?
    ) => {
        #[repr(u8)]
        #[derive(Copy, Clone, Debug, Eq, PartialEq, Hash)]
        pub enum Opcode {
            $(
                $(#[$doc])*
                $name = $byte,
            )*
        }

        impl TryFrom<u8> for Opcode {
            type Error = AvmError;

            fn try_from(value: u8) -> Result<Self, Self::Error> {
                match value {
                    $( $byte => Ok(Opcode::$name), )*
                    _ => Err(AvmError::InvalidOpcode { byte: value }),
                }
            }
        }

        impl Opcode {
            /// Every opcode in table order.
            pub const ALL: &'static [Opcode] = &[$( Opcode::$name, )*];

            pub const fn mnemonic(&self) -> &'static str {
                match self {
                    $( Opcode::$name => $mnemonic, )*
                }
            }

            /// Values the operation needs on the stack.
            pub const fn pops(&self) -> usize {
                match self {
                    $( Opcode::$name => $pops, )*
                }
            }

            /// Values the operation leaves in place of those it needed.
            pub const fn pushes(&self) -> usize {
                match self {
                    $( Opcode::$name => $pushes, )*
                }
            }
        }
    };
}

for_each_avm_opcode!(define_opcodes);

impl Opcode {
    pub fn from_mnemonic(name: &str) -> Option<Opcode> {
        Opcode::ALL.iter().copied().find(|op| op.mnemonic() == name)
    }
}

impl std::fmt::Display for Opcode {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.mnemonic())
    }
}

impl Encode for Opcode {
    fn encode<S: EncodeSink>(&self, out: &mut S) {
        (*self as u8).encode(out);
    }
}

impl Decode for Opcode {
    fn decode(input: &mut &[u8]) -> Result<Self, DecodeError> {
        Opcode::try_from(u8::decode(input)?).map_err(|_| DecodeError::InvalidValue)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn try_from_invalid() {
        assert!(matches!(
            Opcode::try_from(0xFF),
            Err(AvmError::InvalidOpcode { byte: 0xFF })
        ));
    }

    #[test]
    fn bytes_and_mnemonics_are_unique() {
        for (i, a) in Opcode::ALL.iter().enumerate() {
            for b in &Opcode::ALL[i + 1..] {
                assert_ne!(*a as u8, *b as u8);
                assert_ne!(a.mnemonic(), b.mnemonic());
            }
            assert_eq!(Opcode::try_from(*a as u8).unwrap(), *a);
            assert_eq!(Opcode::from_mnemonic(a.mnemonic()), Some(*a));
        }
    }

    #[test]
    fn dup_and_swap_arity() {
        assert_eq!((Opcode::Dup2.pops(), Opcode::Dup2.pushes()), (3, 4));
        assert_eq!((Opcode::Swap2.pops(), Opcode::Swap2.pushes()), (3, 3));
        assert_eq!((Opcode::Cjump.pops(), Opcode::Cjump.pushes()), (2, 0));
    }

    #[test]
    fn decode_rejects_unknown_byte() {
        assert_eq!(Opcode::from_bytes(&[0x99]), Err(DecodeError::InvalidValue));
        assert_eq!(Opcode::from_bytes(&[0x74]), Ok(Opcode::Halt));
    }
}
