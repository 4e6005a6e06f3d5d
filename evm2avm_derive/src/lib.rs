//! Derive macros for the evm2avm crate.
//!
//! - `#[derive(BinaryCodec)]` generates `Encode`/`Decode` against `crate::types::encoding`
//! - `#[derive(Error)]` generates `Display` and `std::error::Error` from `#[error("...")]`

mod binary_codec;
mod error;

use proc_macro::TokenStream;

/// Implements `Encode` and `Decode` for a struct or enum.
#[proc_macro_derive(BinaryCodec)]
pub fn derive_binary_codec(input: TokenStream) -> TokenStream {
    binary_codec::derive_binary_codec(input)
}

/// Implements `Display` and `Error` from per-variant `#[error("...")]` messages.
#[proc_macro_derive(Error, attributes(error))]
pub fn derive_error(input: TokenStream) -> TokenStream {
    error::derive_error(input)
}
