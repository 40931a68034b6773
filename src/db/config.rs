use crate::primitives::pager::{StorageOptions, Synchronous};

/// Options for [`Database::open_with`](super::Database::open_with).
#[derive(Debug, Clone, Default)]
pub struct DbOptions {
    /// Settings for the underlying record store.
    pub storage: StorageOptions,
}

impl DbOptions {
    /// Defaults, but never fsync. Suited to scratch files and tests.
    pub fn unsynced() -> Self {
        Self {
            storage: StorageOptions {
                synchronous: Synchronous::Off,
                ..StorageOptions::default()
            },
        }
    }
}
