//! Translation unit and its portable binary container.

use crate::avm::assembler::{Listing, assemble};
use crate::avm::code::Block;
use crate::translate::errors::TranslateError;
use crate::types::encoding::{Decode, Encode};
use crate::types::hash::Hash;
use evm2avm_derive::BinaryCodec;

/// Magic bytes identifying a serialized translation unit.
const MAGIC: &[u8; 6] = b"AVM_TU";

/// Current container format version.
const CURRENT_VERSION: Version = Version::new(0, 1, 0);

const PREFIX: &[u8] = b"TRANSLATION_UNIT";

/// Semantic version for container compatibility.
#[derive(Debug, PartialEq, Eq, PartialOrd, Ord, BinaryCodec)]
struct Version {
    major: u8,
    minor: u8,
    patch: u8,
}

impl Version {
    const fn new(major: u8, minor: u8, patch: u8) -> Self {
        Self {
            major,
            minor,
            patch,
        }
    }
}

/// Output of a translation: start-up code and the message loop with every
/// compiled contract.
#[derive(Clone, Debug, PartialEq, Eq, BinaryCodec)]
pub struct TranslationUnit {
    /// Registers contracts and enters the run loop.
    pub init: Block,
    /// Run loop followed by the contract blocks.
    pub main: Block,
}

fn malformed(reason: &str) -> TranslateError {
    TranslateError::Decode {
        reason: reason.to_string(),
    }
}

impl TranslationUnit {
    /// Serializes the unit behind a magic header, version and prefix tag.
    pub fn to_bytes(&self) -> Vec<u8> {
        let mut out = Vec::new();
        MAGIC.encode(&mut out);
        CURRENT_VERSION.encode(&mut out);
        PREFIX.to_vec().encode(&mut out);
        self.encode(&mut out);
        out
    }

    /// Deserializes a unit written by [`TranslationUnit::to_bytes`].
    ///
    /// Rejects other major versions of the container.
    pub fn from_bytes(mut input: &[u8]) -> Result<Self, TranslateError> {
        if input.len() < MAGIC.len() {
            return Err(malformed("truncated"));
        }

        if &<[u8; 6]>::decode(&mut input)? != MAGIC {
            return Err(malformed("bad magic"));
        }

        if Version::decode(&mut input)?.major != CURRENT_VERSION.major {
            return Err(malformed("unsupported version"));
        }

        if Vec::<u8>::decode(&mut input)?.as_slice() != PREFIX {
            return Err(malformed("bad prefix"));
        }

        let unit = TranslationUnit::decode(&mut input)?;
        if !input.is_empty() {
            return Err(malformed("trailing bytes"));
        }
        Ok(unit)
    }

    /// SHA3-256 of the unit's encoding.
    pub fn fingerprint(&self) -> Hash {
        Hash::of(self)
    }

    /// Assembles `init` then `main` into one listing.
    pub fn listing(&self) -> Result<Listing, TranslateError> {
        Ok(assemble(&[&self.init, &self.main])?)
    }
}
