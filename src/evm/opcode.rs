//! Source (EVM) opcode table.
//!
//! [`for_each_evm_opcode!`](crate::for_each_evm_opcode) holds the canonical
//! byte/mnemonic/immediate-width table and hands it to a callback macro, the
//! same way the target ISA is generated in [`crate::avm::isa`].
//!
//! This module generates the [`Mnemonic`] enum. Besides one variant per
//! defined opcode byte it carries the pseudo-mnemonics produced by peephole
//! fusion, which have no byte of their own.

/// Invokes a callback macro with the complete source opcode list.
///
/// Entry format: `Name = byte, "MNEMONIC", immediate_bytes`.
#[macro_export]
macro_rules! for_each_evm_opcode {
    ($callback:ident) => {
        $callback! {
            // =========================
            // Arithmetic
            // =========================
            Stop = 0x00, "STOP", 0,
            Add = 0x01, "ADD", 0,
            Mul = 0x02, "MUL", 0,
            Sub = 0x03, "SUB", 0,
            Div = 0x04, "DIV", 0,
            SDiv = 0x05, "SDIV", 0,
            Mod = 0x06, "MOD", 0,
            SMod = 0x07, "SMOD", 0,
            AddMod = 0x08, "ADDMOD", 0,
            MulMod = 0x09, "MULMOD", 0,
            Exp = 0x0a, "EXP", 0,
            SignExtend = 0x0b, "SIGNEXTEND", 0,
            // =========================
            // Comparison and bitwise
            // =========================
            Lt = 0x10, "LT", 0,
            Gt = 0x11, "GT", 0,
            SLt = 0x12, "SLT", 0,
            SGt = 0x13, "SGT", 0,
            Eq = 0x14, "EQ", 0,
            IsZero = 0x15, "ISZERO", 0,
            And = 0x16, "AND", 0,
            Or = 0x17, "OR", 0,
            Xor = 0x18, "XOR", 0,
            Not = 0x19, "NOT", 0,
            Byte = 0x1a, "BYTE", 0,
            Shl = 0x1b, "SHL", 0,
            Shr = 0x1c, "SHR", 0,
            Sar = 0x1d, "SAR", 0,
            Sha3 = 0x20, "SHA3", 0,
            // =========================
            // Environment
            // =========================
            Address = 0x30, "ADDRESS", 0,
            Balance = 0x31, "BALANCE", 0,
            Origin = 0x32, "ORIGIN", 0,
            Caller = 0x33, "CALLER", 0,
            CallValue = 0x34, "CALLVALUE", 0,
            CallDataLoad = 0x35, "CALLDATALOAD", 0,
            CallDataSize = 0x36, "CALLDATASIZE", 0,
            CallDataCopy = 0x37, "CALLDATACOPY", 0,
            CodeSize = 0x38, "CODESIZE", 0,
            CodeCopy = 0x39, "CODECOPY", 0,
            GasPrice = 0x3a, "GASPRICE", 0,
            ExtCodeSize = 0x3b, "EXTCODESIZE", 0,
            ExtCodeCopy = 0x3c, "EXTCODECOPY", 0,
            ReturnDataSize = 0x3d, "RETURNDATASIZE", 0,
            ReturnDataCopy = 0x3e, "RETURNDATACOPY", 0,
            ExtCodeHash = 0x3f, "EXTCODEHASH", 0,
            // =========================
            // Block information
            // =========================
            BlockHash = 0x40, "BLOCKHASH", 0,
            Coinbase = 0x41, "COINBASE", 0,
            Timestamp = 0x42, "TIMESTAMP", 0,
            Number = 0x43, "NUMBER", 0,
            Difficulty = 0x44, "DIFFICULTY", 0,
            GasLimit = 0x45, "GASLIMIT", 0,
            ChainId = 0x46, "CHAINID", 0,
            SelfBalance = 0x47, "SELFBALANCE", 0,
            BaseFee = 0x48, "BASEFEE", 0,
            // =========================
            // Stack, memory, storage and flow
            // =========================
            Pop = 0x50, "POP", 0,
            MLoad = 0x51, "MLOAD", 0,
            MStore = 0x52, "MSTORE", 0,
            MStore8 = 0x53, "MSTORE8", 0,
            SLoad = 0x54, "SLOAD", 0,
            SStore = 0x55, "SSTORE", 0,
            Jump = 0x56, "JUMP", 0,
            JumpI = 0x57, "JUMPI", 0,
            Pc = 0x58, "PC", 0,
            MSize = 0x59, "MSIZE", 0,
            Gas = 0x5a, "GAS", 0,
            JumpDest = 0x5b, "JUMPDEST", 0,
            Push0 = 0x5f, "PUSH0", 0,
            // =========================
            // Push
            // =========================
            Push1 = 0x60, "PUSH1", 1,
            Push2 = 0x61, "PUSH2", 2,
            Push3 = 0x62, "PUSH3", 3,
            Push4 = 0x63, "PUSH4", 4,
            Push5 = 0x64, "PUSH5", 5,
            Push6 = 0x65, "PUSH6", 6,
            Push7 = 0x66, "PUSH7", 7,
            Push8 = 0x67, "PUSH8", 8,
            Push9 = 0x68, "PUSH9", 9,
            Push10 = 0x69, "PUSH10", 10,
            Push11 = 0x6a, "PUSH11", 11,
            Push12 = 0x6b, "PUSH12", 12,
            Push13 = 0x6c, "PUSH13", 13,
            Push14 = 0x6d, "PUSH14", 14,
            Push15 = 0x6e, "PUSH15", 15,
            Push16 = 0x6f, "PUSH16", 16,
            Push17 = 0x70, "PUSH17", 17,
            Push18 = 0x71, "PUSH18", 18,
            Push19 = 0x72, "PUSH19", 19,
            Push20 = 0x73, "PUSH20", 20,
            Push21 = 0x74, "PUSH21", 21,
            Push22 = 0x75, "PUSH22", 22,
            Push23 = 0x76, "PUSH23", 23,
            Push24 = 0x77, "PUSH24", 24,
            Push25 = 0x78, "PUSH25", 25,
            Push26 = 0x79, "PUSH26", 26,
            Push27 = 0x7a, "PUSH27", 27,
            Push28 = 0x7b, "PUSH28", 28,
            Push29 = 0x7c, "PUSH29", 29,
            Push30 = 0x7d, "PUSH30", 30,
            Push31 = 0x7e, "PUSH31", 31,
            Push32 = 0x7f, "PUSH32", 32,
            // =========================
            // Dup
            // =========================
            Dup1 = 0x80, "DUP1", 0,
            Dup2 = 0x81, "DUP2", 0,
            Dup3 = 0x82, "DUP3", 0,
            Dup4 = 0x83, "DUP4", 0,
            Dup5 = 0x84, "DUP5", 0,
            Dup6 = 0x85, "DUP6", 0,
            Dup7 = 0x86, "DUP7", 0,
            Dup8 = 0x87, "DUP8", 0,
            Dup9 = 0x88, "DUP9", 0,
            Dup10 = 0x89, "DUP10", 0,
            Dup11 = 0x8a, "DUP11", 0,
            Dup12 = 0x8b, "DUP12", 0,
            Dup13 = 0x8c, "DUP13", 0,
            Dup14 = 0x8d, "DUP14", 0,
            Dup15 = 0x8e, "DUP15", 0,
            Dup16 = 0x8f, "DUP16", 0,
            // =========================
            // Swap
            // =========================
            Swap1 = 0x90, "SWAP1", 0,
            Swap2 = 0x91, "SWAP2", 0,
            Swap3 = 0x92, "SWAP3", 0,
            Swap4 = 0x93, "SWAP4", 0,
            Swap5 = 0x94, "SWAP5", 0,
            Swap6 = 0x95, "SWAP6", 0,
            Swap7 = 0x96, "SWAP7", 0,
            Swap8 = 0x97, "SWAP8", 0,
            Swap9 = 0x98, "SWAP9", 0,
            Swap10 = 0x99, "SWAP10", 0,
            Swap11 = 0x9a, "SWAP11", 0,
            Swap12 = 0x9b, "SWAP12", 0,
            Swap13 = 0x9c, "SWAP13", 0,
            Swap14 = 0x9d, "SWAP14", 0,
            Swap15 = 0x9e, "SWAP15", 0,
            Swap16 = 0x9f, "SWAP16", 0,
            // =========================
            // Logging
            // =========================
            Log0 = 0xa0, "LOG0", 0,
            Log1 = 0xa1, "LOG1", 0,
            Log2 = 0xa2, "LOG2", 0,
            Log3 = 0xa3, "LOG3", 0,
            Log4 = 0xa4, "LOG4", 0,
            // =========================
            // System
            // =========================
            Create = 0xf0, "CREATE", 0,
            Call = 0xf1, "CALL", 0,
            CallCode = 0xf2, "CALLCODE", 0,
            Return = 0xf3, "RETURN", 0,
            DelegateCall = 0xf4, "DELEGATECALL", 0,
            Create2 = 0xf5, "CREATE2", 0,
            StaticCall = 0xfa, "STATICCALL", 0,
            Revert = 0xfd, "REVERT", 0,
            Invalid = 0xfe, "INVALID", 0,
            SelfDestruct = 0xff, "SELFDESTRUCT", 0,
        }
    };
}

#[macro_export]
macro_rules! define_mnemonics {
    (
        $( $name:ident = $byte:literal, $text:literal, $immediate:literal ),* $(,)?
    ) => {
        /// Closed set of source mnemonics.
        #[derive(Copy, Clone, Debug, Eq, PartialEq, Hash)]
        pub enum Mnemonic {
            $( $name, )*
            /// `PUSH1 0; MSTORE; PUSH1 32; PUSH1 0; SHA3` fused into one word hash.
            Hash,
        }

        impl Mnemonic {
            /// Decodes a defined opcode byte. Undefined bytes return `None`.
            pub const fn from_byte(byte: u8) -> Option<Mnemonic> {
                match byte {
                    $( $byte => Some(Mnemonic::$name), )*
                    _ => None,
                }
            }

            /// Returns the opcode byte, or `None` for pseudo-mnemonics.
            pub const fn byte(&self) -> Option<u8> {
                match self {
                    $( Mnemonic::$name => Some($byte), )*
                    Mnemonic::Hash => None,
                }
            }

            pub const fn as_str(&self) -> &'static str {
                match self {
                    $( Mnemonic::$name => $text, )*
                    Mnemonic::Hash => "HASH",
                }
            }

            /// Number of immediate bytes following the opcode.
            pub const fn immediate_len(&self) -> usize {
                match self {
                    $( Mnemonic::$name => $immediate, )*
                    Mnemonic::Hash => 0,
                }
            }
        }
    };
}

for_each_evm_opcode!(define_mnemonics);

impl Mnemonic {
    /// True for `PUSH0` through `PUSH32`.
    pub const fn is_push(&self) -> bool {
        matches!(self, Mnemonic::Push0) || self.immediate_len() > 0
    }

    /// Ends straight-line execution: nothing after it runs unless jumped to.
    pub const fn is_terminator(&self) -> bool {
        matches!(
            self,
            Mnemonic::Stop
                | Mnemonic::Jump
                | Mnemonic::Return
                | Mnemonic::Revert
                | Mnemonic::Invalid
                | Mnemonic::SelfDestruct
        )
    }

    /// Stack depth for `DUPn`/`SWAPn` (`DUP1` is 1, `SWAP16` is 16).
    pub fn stack_depth(&self) -> Option<usize> {
        let byte = self.byte()?;
        match byte {
            0x80..=0x8f => Some((byte - 0x80 + 1) as usize),
            0x90..=0x9f => Some((byte - 0x90 + 1) as usize),
            _ => None,
        }
    }

    /// Topic count for `LOGn`.
    pub fn log_topics(&self) -> Option<u8> {
        match self.byte()? {
            byte @ 0xa0..=0xa4 => Some(byte - 0xa0),
            _ => None,
        }
    }
}

impl std::fmt::Display for Mnemonic {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}
