//! Binary encoding and decoding traits for translation units.
//!
//! The format is deterministic so that equal units always produce equal bytes
//! (and therefore equal fingerprints).
//!
//! # Binary Format
//!
//! - Integers: little-endian, fixed-width
//! - `usize`: encoded as `u64`
//! - `bool`: single byte (0 = false, 1 = true)
//! - `U256`: 32 bytes, big-endian (the word order used by both VMs)
//! - `Vec<T>`/`String`: 8-byte length prefix followed by elements
//! - `Option<T>`: 1-byte tag (0 = None, 1 = Some) followed by value if present
//! - Arrays `[T; N]`: elements serialized sequentially without length prefix

use alloy_primitives::U256;
use evm2avm_derive::Error;

/// Sink for writing encoded bytes.
///
/// Implemented by byte buffers, size counters and hashers so encodable types
/// can be written straight into any of them.
pub trait EncodeSink {
    fn write(&mut self, bytes: &[u8]);
}

/// Counts encoded bytes without storing them.
pub struct SizeCounter {
    len: usize,
}

impl SizeCounter {
    pub fn new() -> Self {
        Self { len: 0 }
    }

    pub fn len(&self) -> usize {
        self.len
    }
}

impl Default for SizeCounter {
    fn default() -> Self {
        Self::new()
    }
}

impl EncodeSink for SizeCounter {
    fn write(&mut self, bytes: &[u8]) {
        self.len += bytes.len();
    }
}

impl EncodeSink for Vec<u8> {
    fn write(&mut self, bytes: &[u8]) {
        self.extend_from_slice(bytes);
    }
}

/// Trait for types that can be serialized to binary format.
pub trait Encode {
    /// Writes the binary representation to the given sink.
    fn encode<S: EncodeSink>(&self, out: &mut S);

    /// Serializes to a new buffer sized exactly for the encoding.
    fn to_bytes(&self) -> Vec<u8> {
        let mut counter = SizeCounter::new();
        self.encode(&mut counter);

        let mut out = Vec::with_capacity(counter.len());
        self.encode(&mut out);
        out
    }
}

/// Errors that can occur during decoding.
#[derive(Debug, Error, PartialEq, Eq)]
pub enum DecodeError {
    #[error("unexpected end of input")]
    UnexpectedEof,
    #[error("invalid value")]
    InvalidValue,
    #[error("length prefix too large")]
    LengthOverflow,
}

/// Trait for types that can be deserialized from binary format.
pub trait Decode: Sized {
    /// Reads a value from the front of `input`, advancing it past the consumed bytes.
    fn decode(input: &mut &[u8]) -> Result<Self, DecodeError>;

    /// Decodes a value that must span all of `data`.
    fn from_bytes(data: &[u8]) -> Result<Self, DecodeError> {
        let mut input = data;
        let value = Self::decode(&mut input)?;
        if !input.is_empty() {
            return Err(DecodeError::InvalidValue);
        }
        Ok(value)
    }
}

/// Reads exactly `n` bytes from the input, advancing the slice.
pub(crate) fn read_bytes<'a>(input: &mut &'a [u8], n: usize) -> Result<&'a [u8], DecodeError> {
    if input.len() < n {
        return Err(DecodeError::UnexpectedEof);
    }
    let (bytes, rest) = input.split_at(n);
    *input = rest;
    Ok(bytes)
}

/// Reads a fixed-size array from the input.
fn read_array<const N: usize>(input: &mut &[u8]) -> Result<[u8; N], DecodeError> {
    read_bytes(input, N)?
        .try_into()
        .map_err(|_| DecodeError::UnexpectedEof)
}

impl Encode for u8 {
    fn encode<S: EncodeSink>(&self, out: &mut S) {
        out.write(&[*self]);
    }
}

impl Decode for u8 {
    fn decode(input: &mut &[u8]) -> Result<Self, DecodeError> {
        Ok(read_array::<1>(input)?[0])
    }
}

macro_rules! impl_int {
    ($($t:ty),*) => {
        $(
            impl Encode for $t {
                fn encode<S: EncodeSink>(&self, out: &mut S) {
                    out.write(&self.to_le_bytes());
                }
            }

            impl Decode for $t {
                fn decode(input: &mut &[u8]) -> Result<Self, DecodeError> {
                    Ok(<$t>::from_le_bytes(read_array(input)?))
                }
            }
        )*
    };
}

impl_int!(u16, u32, u64);

impl Encode for usize {
    fn encode<S: EncodeSink>(&self, out: &mut S) {
        (*self as u64).encode(out);
    }
}

impl Decode for usize {
    fn decode(input: &mut &[u8]) -> Result<Self, DecodeError> {
        let v = u64::decode(input)?;
        usize::try_from(v).map_err(|_| DecodeError::LengthOverflow)
    }
}

impl Encode for bool {
    fn encode<S: EncodeSink>(&self, out: &mut S) {
        out.write(&[*self as u8]);
    }
}

impl Decode for bool {
    fn decode(input: &mut &[u8]) -> Result<Self, DecodeError> {
        match u8::decode(input)? {
            0 => Ok(false),
            1 => Ok(true),
            _ => Err(DecodeError::InvalidValue),
        }
    }
}

impl Encode for U256 {
    fn encode<S: EncodeSink>(&self, out: &mut S) {
        out.write(&self.to_be_bytes::<32>());
    }
}

impl Decode for U256 {
    fn decode(input: &mut &[u8]) -> Result<Self, DecodeError> {
        Ok(U256::from_be_bytes(read_array::<32>(input)?))
    }
}

impl<T: Encode> Encode for Vec<T> {
    fn encode<S: EncodeSink>(&self, out: &mut S) {
        self.len().encode(out);
        for item in self {
            item.encode(out);
        }
    }
}

/// Maximum allowed length for decoded vectors.
const MAX_VEC_LEN: usize = 1_000_000;

impl<T: Decode> Decode for Vec<T> {
    fn decode(input: &mut &[u8]) -> Result<Self, DecodeError> {
        let len = usize::decode(input)?;
        if len > MAX_VEC_LEN {
            return Err(DecodeError::LengthOverflow);
        }
        // Capacity is capped by the remaining input.
        let mut vec = Vec::with_capacity(len.min(input.len()));
        for _ in 0..len {
            vec.push(T::decode(input)?);
        }
        Ok(vec)
    }
}

impl<T: Encode> Encode for Box<T> {
    fn encode<S: EncodeSink>(&self, out: &mut S) {
        self.as_ref().encode(out);
    }
}

impl<T: Decode> Decode for Box<T> {
    fn decode(input: &mut &[u8]) -> Result<Self, DecodeError> {
        Ok(Box::new(T::decode(input)?))
    }
}

impl Encode for String {
    fn encode<S: EncodeSink>(&self, out: &mut S) {
        self.as_str().encode(out);
    }
}

impl Decode for String {
    fn decode(input: &mut &[u8]) -> Result<Self, DecodeError> {
        let bytes = Vec::<u8>::decode(input)?;
        String::from_utf8(bytes).map_err(|_| DecodeError::InvalidValue)
    }
}

impl Encode for &str {
    fn encode<S: EncodeSink>(&self, out: &mut S) {
        self.len().encode(out);
        out.write(self.as_bytes());
    }
}

impl<T: Encode> Encode for Option<T> {
    fn encode<S: EncodeSink>(&self, out: &mut S) {
        match self {
            None => 0u8.encode(out),
            Some(v) => {
                1u8.encode(out);
                v.encode(out);
            }
        }
    }
}

impl<T: Decode> Decode for Option<T> {
    fn decode(input: &mut &[u8]) -> Result<Self, DecodeError> {
        match u8::decode(input)? {
            0 => Ok(None),
            1 => Ok(Some(T::decode(input)?)),
            _ => Err(DecodeError::InvalidValue),
        }
    }
}

impl<const N: usize> Encode for [u8; N] {
    fn encode<S: EncodeSink>(&self, out: &mut S) {
        out.write(self);
    }
}

impl<const N: usize> Decode for [u8; N] {
    fn decode(input: &mut &[u8]) -> Result<Self, DecodeError> {
        read_array(input)
    }
}

impl<A: Encode, B: Encode> Encode for (A, B) {
    fn encode<S: EncodeSink>(&self, out: &mut S) {
        self.0.encode(out);
        self.1.encode(out);
    }
}

impl<A: Decode, B: Decode> Decode for (A, B) {
    fn decode(input: &mut &[u8]) -> Result<Self, DecodeError> {
        Ok((A::decode(input)?, B::decode(input)?))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn size_counter_accumulates() {
        let mut counter = SizeCounter::new();
        counter.write(&[1, 2, 3]);
        counter.write(&[4, 5]);
        assert_eq!(counter.len(), 5);
    }

    #[test]
    fn to_bytes_allocates_exact_capacity() {
        let data: Vec<u8> = vec![1, 2, 3, 4, 5];
        let bytes = data.to_bytes();
        assert_eq!(bytes.len(), 8 + 5);
        assert_eq!(bytes.capacity(), bytes.len());
    }

    #[test]
    fn u32_little_endian() {
        let bytes = 0x12345678u32.to_bytes();
        assert_eq!(bytes, vec![0x78, 0x56, 0x34, 0x12]);
        assert_eq!(u32::from_bytes(&bytes).unwrap(), 0x12345678);
    }

    #[test]
    fn u256_big_endian() {
        let bytes = U256::from(0x0102u64).to_bytes();
        assert_eq!(bytes.len(), 32);
        assert_eq!(&bytes[30..], &[0x01, 0x02]);
        assert!(bytes[..30].iter().all(|&b| b == 0));
        assert_eq!(U256::from_bytes(&bytes).unwrap(), U256::from(0x0102u64));
    }

    #[test]
    fn u256_truncated() {
        assert_eq!(U256::from_bytes(&[0u8; 31]), Err(DecodeError::UnexpectedEof));
    }

    #[test]
    fn bool_invalid_value() {
        assert_eq!(bool::from_bytes(&[2]), Err(DecodeError::InvalidValue));
    }

    #[test]
    fn vec_length_overflow() {
        let bytes = ((MAX_VEC_LEN as u64) + 1).to_bytes();
        assert_eq!(Vec::<u8>::from_bytes(&bytes), Err(DecodeError::LengthOverflow));
    }

    #[test]
    fn vec_forged_length_hits_eof() {
        let bytes = 1000u64.to_bytes();
        assert_eq!(Vec::<u32>::from_bytes(&bytes), Err(DecodeError::UnexpectedEof));
    }

    #[test]
    fn string_invalid_utf8() {
        let mut bytes = Vec::new();
        3u64.encode(&mut bytes);
        bytes.extend_from_slice(&[0xFF, 0xFE, 0x00]);
        assert_eq!(String::from_bytes(&bytes), Err(DecodeError::InvalidValue));
    }

    #[test]
    fn str_encodes_same_as_string() {
        assert_eq!("label".to_bytes(), "label".to_string().to_bytes());
    }

    #[test]
    fn option_invalid_tag() {
        assert_eq!(
            Option::<u32>::from_bytes(&[2u8, 0, 0, 0, 0]),
            Err(DecodeError::InvalidValue)
        );
    }

    #[test]
    fn trailing_bytes_rejected() {
        assert_eq!(u8::from_bytes(&[1, 2]), Err(DecodeError::InvalidValue));
    }
}
