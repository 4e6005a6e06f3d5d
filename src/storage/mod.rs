//! Per-contract persistent storage handles.
//!
//! Each contract id owns one [`ContractStorage`]. The program assembler only
//! inserts missing entries into a [`StorageMap`] and never removes any.

use crate::avm::value::Value;
use crate::config::parse_u256;
use alloy_primitives::U256;
use evm2avm_derive::Error;
use std::collections::BTreeMap;
use std::collections::btree_map;
use std::str::FromStr;

/// Storage handles by contract id.
pub type StorageMap = BTreeMap<U256, ContractStorage>;

#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum StorageError {
    #[error("line {line}: expected `<key> <value>`")]
    MalformedLine { line: usize },
    #[error("line {line}: {reason}")]
    InvalidNumber { line: usize, reason: String },
    #[error("line {line}: key {key} assigned twice")]
    DuplicateKey { line: usize, key: U256 },
}

/// Word-addressed key/value store. Unset slots read as zero.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct ContractStorage {
    slots: BTreeMap<U256, U256>,
}

impl ContractStorage {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn get(&self, key: U256) -> U256 {
        self.slots.get(&key).copied().unwrap_or_default()
    }

    /// Writes `value` at `key`. Writing zero clears the slot.
    pub fn set(&mut self, key: U256, value: U256) {
        if value.is_zero() {
            self.slots.remove(&key);
        } else {
            self.slots.insert(key, value);
        }
    }

    pub fn remove(&mut self, key: U256) -> Option<U256> {
        self.slots.remove(&key)
    }

    pub fn len(&self) -> usize {
        self.slots.len()
    }

    pub fn is_empty(&self) -> bool {
        self.slots.is_empty()
    }

    /// Non-zero slots in ascending key order.
    pub fn iter(&self) -> btree_map::Iter<'_, U256, U256> {
        self.slots.iter()
    }

    /// Tuple of `(key, value)` pairs in ascending key order.
    pub fn to_value(&self) -> Value {
        Value::Tuple(
            self.slots
                .iter()
                .map(|(&k, &v)| Value::Tuple(vec![Value::Int(k), Value::Int(v)]))
                .collect(),
        )
    }

    /// Parses `<key> <value>` lines. Blank lines and `#` comments are skipped.
    pub fn parse(text: &str) -> Result<Self, StorageError> {
        let mut storage = Self::new();
        let mut seen = BTreeMap::new();

        for (idx, raw) in text.lines().enumerate() {
            let line = idx + 1;
            let content = raw.trim();
            if content.is_empty() || content.starts_with('#') {
                continue;
            }

            let mut fields = content.split_whitespace();
            let (Some(key), Some(value), None) = (fields.next(), fields.next(), fields.next())
            else {
                return Err(StorageError::MalformedLine { line });
            };
            let number = |s: &str| {
                parse_u256(s).map_err(|reason| StorageError::InvalidNumber { line, reason })
            };
            let key = number(key)?;
            let value = number(value)?;

            if seen.insert(key, line).is_some() {
                return Err(StorageError::DuplicateKey { line, key });
            }
            storage.set(key, value);
        }
        Ok(storage)
    }
}

impl FromStr for ContractStorage {
    type Err = StorageError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::parse(s)
    }
}

impl FromIterator<(U256, U256)> for ContractStorage {
    fn from_iter<I: IntoIterator<Item = (U256, U256)>>(iter: I) -> Self {
        let mut storage = Self::new();
        for (key, value) in iter {
            storage.set(key, value);
        }
        storage
    }
}
