//! Shared identifiers and the crate-wide error type.

use std::fmt;

mod checksum;

pub use checksum::record_crc32;

/// Byte offset of a record inside the storage file.
///
/// Addresses are handed out by appends and never reused. Zero is reserved for
/// the superblock and doubles as the "nothing here" sentinel on disk.
#[derive(Copy, Clone, Eq, PartialEq, Ord, PartialOrd, Hash, Debug)]
pub struct Address(pub u64);

impl Address {
    /// Sentinel used on disk for an absent child or an empty tree.
    pub const NONE: Address = Address(0);

    /// Returns `None` for the zero sentinel.
    pub fn non_null(self) -> Option<Address> {
        if self.0 == 0 {
            None
        } else {
            Some(self)
        }
    }
}

impl fmt::Display for Address {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Errors surfaced by storage, tree and database operations.
#[derive(thiserror::Error, Debug)]
pub enum RedwoodError {
    /// Underlying file operation failed.
    #[error("IO: {0}")]
    Io(#[from] std::io::Error),
    /// Lookup of a key that is not in the tree.
    #[error("key not found")]
    NotFound,
    /// The handle was closed; reconnect to continue.
    #[error("database closed")]
    Closed,
    /// The advisory file lock could not be obtained.
    #[error("lock unavailable: {0}")]
    LockUnavailable(&'static str),
    /// A record on disk could not be decoded.
    #[error("corruption: {0}")]
    Corruption(&'static str),
    /// A caller supplied an unusable argument or option.
    #[error("invalid argument: {0}")]
    Invalid(&'static str),
}

/// Result alias used throughout the crate.
pub type Result<T> = std::result::Result<T, RedwoodError>;
