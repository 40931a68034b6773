use std::ops::Range;

use crate::primitives::io::FileIo;
use crate::types::{Address, RedwoodError, Result};

/// Superblock size used when none is configured.
pub const DEFAULT_SUPERBLOCK_SIZE: u64 = 4096;
/// Smallest superblock accepted: the root field and the size field.
pub const MIN_SUPERBLOCK_SIZE: u64 = 16;
/// Width of the length prefix in front of every record.
pub const RECORD_LEN_PREFIX: usize = 8;

const ROOT_ADDRESS: Range<usize> = 0..8;
const SUPERBLOCK_SIZE: Range<usize> = 8..16;

/// Rejects sizes that are not a power of two of at least 16 bytes.
pub fn validate_superblock_size(size: u64) -> Result<()> {
    if size < MIN_SUPERBLOCK_SIZE {
        return Err(RedwoodError::Invalid("superblock smaller than 16 bytes"));
    }
    if !size.is_power_of_two() {
        return Err(RedwoodError::Invalid("superblock size must be a power of two"));
    }
    Ok(())
}

/// Makes sure the superblock exists and returns `(size, padded)`.
///
/// A file that already records its superblock size keeps it, whatever
/// `requested` says; otherwise `requested` is recorded. The file is
/// zero-padded up to the size so every record address lands past it.
/// Callers hold the file lock.
pub fn ensure_superblock(io: &dyn FileIo, requested: u64) -> Result<(u64, bool)> {
    let len = io.len()?;
    let stored = if len >= MIN_SUPERBLOCK_SIZE {
        read_u64_at(io, SUPERBLOCK_SIZE.start as u64)?
    } else {
        0
    };
    let size = match stored {
        0 => requested,
        stored => {
            validate_superblock_size(stored)
                .map_err(|_| RedwoodError::Corruption("stored superblock size is invalid"))?;
            stored
        }
    };
    let padded = len < size;
    if padded {
        io.set_len(size)?;
    }
    if stored == 0 {
        io.write_at(SUPERBLOCK_SIZE.start as u64, &size.to_be_bytes())?;
    }
    Ok((size, padded))
}

fn read_u64_at(io: &dyn FileIo, off: u64) -> Result<u64> {
    let mut buf = [0u8; 8];
    io.read_at(off, &mut buf)
        .map_err(|err| match err {
            RedwoodError::Io(inner) if inner.kind() == std::io::ErrorKind::UnexpectedEof => {
                RedwoodError::Corruption("superblock truncated")
            }
            other => other,
        })?;
    Ok(u64::from_be_bytes(buf))
}

/// Reads the committed root address; zero means the tree is empty.
pub fn read_root(io: &dyn FileIo) -> Result<Address> {
    read_u64_at(io, ROOT_ADDRESS.start as u64).map(Address)
}

/// Overwrites the root field. This is the only in-place write in the file.
pub fn write_root(io: &dyn FileIo, root: Address) -> Result<()> {
    io.write_at(ROOT_ADDRESS.start as u64, &root.0.to_be_bytes())
}

/// Frames `payload` with its big-endian length prefix.
pub fn encode_record(payload: &[u8]) -> Vec<u8> {
    let mut out = Vec::with_capacity(RECORD_LEN_PREFIX + payload.len());
    out.extend_from_slice(&(payload.len() as u64).to_be_bytes());
    out.extend_from_slice(payload);
    out
}
