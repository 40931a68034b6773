//! Byte encodings for tree keys and stored values.

use crate::types::{RedwoodError, Result};

/// Keys that can be written into a node record and read back.
///
/// Ordering inside the tree uses the decoded key's `Ord`, so encodings only
/// need to be reversible.
pub trait KeyCodec: Sized {
    /// Appends the encoded form of `key` to `out`.
    fn encode_key(key: &Self, out: &mut Vec<u8>);

    /// Decodes a key previously produced by [`KeyCodec::encode_key`].
    fn decode_key(bytes: &[u8]) -> Result<Self>;
}

/// Values stored as leaf records.
pub trait ValCodec: Sized {
    /// Appends the encoded form of `value` to `out`.
    fn encode_val(value: &Self, out: &mut Vec<u8>);

    /// Decodes a value from a leaf record payload.
    fn decode_val(src: &[u8]) -> Result<Self>;
}

fn fixed8(bytes: &[u8], what: &'static str) -> Result<[u8; 8]> {
    bytes.try_into().map_err(|_| RedwoodError::Corruption(what))
}

impl KeyCodec for u64 {
    fn encode_key(key: &Self, out: &mut Vec<u8>) {
        out.extend_from_slice(&key.to_be_bytes());
    }

    fn decode_key(bytes: &[u8]) -> Result<Self> {
        Ok(u64::from_be_bytes(fixed8(bytes, "u64 key length mismatch")?))
    }
}

impl KeyCodec for i64 {
    fn encode_key(key: &Self, out: &mut Vec<u8>) {
        out.extend_from_slice(&key.to_be_bytes());
    }

    fn decode_key(bytes: &[u8]) -> Result<Self> {
        Ok(i64::from_be_bytes(fixed8(bytes, "i64 key length mismatch")?))
    }
}

impl KeyCodec for String {
    fn encode_key(key: &Self, out: &mut Vec<u8>) {
        out.extend_from_slice(key.as_bytes());
    }

    fn decode_key(bytes: &[u8]) -> Result<Self> {
        String::from_utf8(bytes.to_vec())
            .map_err(|_| RedwoodError::Corruption("key is not valid UTF-8"))
    }
}

impl KeyCodec for Vec<u8> {
    fn encode_key(key: &Self, out: &mut Vec<u8>) {
        out.extend_from_slice(key);
    }

    fn decode_key(bytes: &[u8]) -> Result<Self> {
        Ok(bytes.to_vec())
    }
}

impl ValCodec for String {
    fn encode_val(value: &Self, out: &mut Vec<u8>) {
        out.extend_from_slice(value.as_bytes());
    }

    fn decode_val(src: &[u8]) -> Result<Self> {
        String::from_utf8(src.to_vec())
            .map_err(|_| RedwoodError::Corruption("value is not valid UTF-8"))
    }
}

impl ValCodec for Vec<u8> {
    fn encode_val(value: &Self, out: &mut Vec<u8>) {
        out.extend_from_slice(value);
    }

    fn decode_val(src: &[u8]) -> Result<Self> {
        Ok(src.to_vec())
    }
}
