#![forbid(unsafe_code)]

/// CRC32 over an encoded record body, stored as the record trailer.
pub fn record_crc32(body: &[u8]) -> u32 {
    let mut hasher = crc32fast::Hasher::new();
    hasher.update(body);
    hasher.finalize()
}
