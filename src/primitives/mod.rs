//! Low-level primitives for building the storage engine.
//!
//! Includes positioned file I/O, the advisory file lock, and the append-only
//! record store with its superblock.

/// Concurrency primitives.
///
/// Whole-file advisory locking used to serialize writers across handles.
pub mod concurrency;

/// I/O abstractions and utilities.
///
/// Interfaces for reading/writing data at explicit file offsets.
pub mod io;

/// Append-only record storage.
///
/// Superblock management, record framing, and root commits.
pub mod pager;
