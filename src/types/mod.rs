//! Serialization and hashing primitives.
//!
//! - `encoding`: deterministic `Encode`/`Decode` traits
//! - `hash`: SHA3-256 `Hash` used to fingerprint translation units

pub mod encoding;
pub mod hash;
