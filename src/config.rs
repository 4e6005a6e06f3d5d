//! Translator configuration.

use alloy_primitives::U256;

/// Literal pushed for every `GAS` instruction.
pub const DEFAULT_GAS_STUB: u64 = 9_999_999_999;

/// Environment variable overriding [`TranslatorConfig::gas_stub`].
pub const GAS_STUB_ENV: &str = "EVM2AVM_GAS_STUB";

/// Which peephole passes run before translation.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct NormalizeOptions {
    /// Truncate trailing compiler metadata.
    pub strip_metadata: bool,
    /// Fuse `ADDRESS; PUSH20 mask; AND; BALANCE` into `SELFBALANCE`.
    pub fuse_self_balance: bool,
    /// Fuse `PUSH1 0; MSTORE; PUSH1 32; PUSH1 0; SHA3` into `HASH`.
    pub fuse_word_hash: bool,
}

impl Default for NormalizeOptions {
    fn default() -> Self {
        Self {
            strip_metadata: true,
            fuse_self_balance: true,
            fuse_word_hash: false,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TranslatorConfig {
    pub gas_stub: U256,
    pub normalize: NormalizeOptions,
    /// Append a `STOP` to contracts that can run off the end of their code.
    pub implicit_stop: bool,
}

impl Default for TranslatorConfig {
    fn default() -> Self {
        Self {
            gas_stub: U256::from(DEFAULT_GAS_STUB),
            normalize: NormalizeOptions::default(),
            implicit_stop: true,
        }
    }
}

impl TranslatorConfig {
    /// Defaults with `EVM2AVM_GAS_STUB` applied when it is set.
    pub fn from_env() -> Result<Self, String> {
        let mut config = Self::default();
        if let Ok(raw) = std::env::var(GAS_STUB_ENV) {
            config.gas_stub = parse_u256(&raw).map_err(|e| format!("{GAS_STUB_ENV}: {e}"))?;
        }
        Ok(config)
    }
}

/// Parses a decimal or `0x`-prefixed hex integer.
pub fn parse_u256(text: &str) -> Result<U256, String> {
    let text = text.trim();
    let (digits, radix) = match text.strip_prefix("0x").or_else(|| text.strip_prefix("0X")) {
        Some(hex) => (hex, 16),
        None => (text, 10),
    };
    if digits.is_empty() {
        return Err(format!("invalid integer '{text}'"));
    }
    let parsed = U256::from_str_radix(digits, radix);
    parsed.map_err(|_| format!("invalid integer '{text}'"))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults() {
        let config = TranslatorConfig::default();
        assert_eq!(config.gas_stub, U256::from(9_999_999_999u64));
        assert!(config.normalize.strip_metadata);
        assert!(config.normalize.fuse_self_balance);
        assert!(!config.normalize.fuse_word_hash);
        assert!(config.implicit_stop);
    }

    #[test]
    fn parse_u256_radixes() {
        assert_eq!(parse_u256("42"), Ok(U256::from(42u64)));
        assert_eq!(parse_u256(" 0xff "), Ok(U256::from(255u64)));
        assert_eq!(parse_u256("0XFF"), Ok(U256::from(255u64)));
        assert!(parse_u256("").is_err());
        assert!(parse_u256("0xzz").is_err());
        assert!(parse_u256("-1").is_err());
    }
}
