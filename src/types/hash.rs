//! 32-byte SHA3-256 digest used to fingerprint translation units.

use crate::types::encoding::{Encode, EncodeSink};
use evm2avm_derive::BinaryCodec;
use sha3::{Digest, Sha3_256};
use std::fmt;

/// SHA3-256 hash length in bytes.
pub const HASH_LEN: usize = 32;

/// Fixed-size 32-byte hash.
#[derive(Clone, Copy, Debug, PartialEq, Eq, BinaryCodec, Default, Hash, Ord, PartialOrd)]
pub struct Hash(pub [u8; HASH_LEN]);

impl Hash {
    pub fn zero() -> Hash {
        Hash([0u8; HASH_LEN])
    }

    pub fn as_slice(&self) -> &[u8] {
        &self.0
    }

    /// Creates a new SHA3-256 hash builder for incremental hashing.
    pub fn sha3() -> HashBuilder {
        HashBuilder::new()
    }

    /// Hashes the binary encoding of `value` without materializing it.
    pub fn of<T: Encode + ?Sized>(value: &T) -> Hash {
        let mut builder = HashBuilder::new();
        value.encode(&mut builder);
        builder.finalize()
    }
}

impl fmt::Display for Hash {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        for byte in &self.0 {
            write!(f, "{:02x}", byte)?;
        }
        Ok(())
    }
}

/// Incremental SHA3-256 hash builder.
///
/// Implements [`EncodeSink`] so encodable types can be hashed directly.
pub struct HashBuilder {
    hasher: Sha3_256,
}

impl HashBuilder {
    pub fn new() -> Self {
        Self {
            hasher: Sha3_256::new(),
        }
    }

    pub fn update(&mut self, data: &[u8]) {
        self.hasher.update(data);
    }

    pub fn finalize(self) -> Hash {
        Hash(self.hasher.finalize().into())
    }
}

impl Default for HashBuilder {
    fn default() -> Self {
        Self::new()
    }
}

impl EncodeSink for HashBuilder {
    fn write(&mut self, bytes: &[u8]) {
        self.hasher.update(bytes);
    }
}
