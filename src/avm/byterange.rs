//! Code blobs: raw bytes packed into target values.
//!
//! A blob is `(length, tree)`. The bytes are split into 32-byte big-endian
//! words (the last one zero-padded) and the words are grouped into tuples of
//! at most [`ARITY`] elements, level by level, until a single tuple remains.

use crate::avm::value::Value;
use alloy_primitives::U256;

/// Maximum tuple width used for blob trees.
pub const ARITY: usize = 8;

const WORD: usize = 32;

pub fn encode(bytes: &[u8]) -> Value {
    let mut level: Vec<Value> = bytes
        .chunks(WORD)
        .map(|chunk| {
            let mut word = [0u8; WORD];
            word[..chunk.len()].copy_from_slice(chunk);
            Value::Int(U256::from_be_bytes(word))
        })
        .collect();

    while level.len() > ARITY {
        level = level
            .chunks(ARITY)
            .map(|group| Value::Tuple(group.to_vec()))
            .collect();
    }

    Value::Tuple(vec![Value::from(bytes.len()), Value::Tuple(level)])
}

/// Recovers the bytes of a blob built by [`encode`].
pub fn decode(blob: &Value) -> Option<Vec<u8>> {
    let Value::Tuple(parts) = blob else {
        return None;
    };
    let [length, tree] = parts.as_slice() else {
        return None;
    };
    let length: usize = length.as_int()?.try_into().ok()?;

    let mut out = Vec::with_capacity(length.div_ceil(WORD) * WORD);
    collect_words(tree, &mut out)?;
    if out.len() < length {
        return None;
    }
    out.truncate(length);
    Some(out)
}

fn collect_words(node: &Value, out: &mut Vec<u8>) -> Option<()> {
    match node {
        Value::Int(word) => {
            out.extend_from_slice(&word.to_be_bytes::<WORD>());
            Some(())
        }
        Value::Tuple(children) => children.iter().try_for_each(|c| collect_words(c, out)),
        Value::Label(_) => None,
    }
}
