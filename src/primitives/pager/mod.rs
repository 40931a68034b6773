#![forbid(unsafe_code)]

mod storage;
mod superblock;

pub use storage::{Storage, StorageOptions, Synchronous};
pub use superblock::{DEFAULT_SUPERBLOCK_SIZE, MIN_SUPERBLOCK_SIZE, RECORD_LEN_PREFIX};
