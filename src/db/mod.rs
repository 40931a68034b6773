//! Database handle: one record file, one tree, and a closed-state guard.

mod config;

#[cfg(test)]
mod tests;

use std::path::Path;
use std::sync::Arc;

use tracing::debug;

use crate::primitives::pager::Storage;
use crate::storage::codecs::{KeyCodec, ValCodec};
use crate::storage::rbtree::{RedBlackTree, TreeStats};
use crate::types::{Address, RedwoodError, Result};

pub use config::DbOptions;

/// Opens or creates the database at `path` with default options.
pub fn connect(path: impl AsRef<Path>) -> Result<Database> {
    Database::connect(path)
}

/// Owned handle on a database file.
///
/// Changes made with [`Database::set`] are visible to this handle right away
/// and to other handles once [`Database::commit`] returns. The first `set`
/// after a commit takes the file's write lock and holds it until the next
/// commit, so a second writer blocks (or times out) in `set` until then.
pub struct Database<K = String, V = String> {
    storage: Arc<Storage>,
    tree: RedBlackTree<K, V>,
}

impl<K, V> Database<K, V>
where
    K: KeyCodec + Ord + Clone,
    V: ValCodec + Clone,
{
    /// Opens or creates the database at `path` with default options.
    pub fn connect(path: impl AsRef<Path>) -> Result<Self> {
        Self::open_with(path, DbOptions::default())
    }

    /// Opens or creates the database at `path`.
    pub fn open_with(path: impl AsRef<Path>, options: DbOptions) -> Result<Self> {
        let storage = Arc::new(Storage::open(path.as_ref(), options.storage)?);
        let tree = RedBlackTree::open(Arc::clone(&storage))?;
        debug!(
            path = %path.as_ref().display(),
            root = storage.get_root_address()?.0,
            "db.open"
        );
        Ok(Self { storage, tree })
    }

    fn ensure_open(&self) -> Result<()> {
        if self.storage.is_closed() {
            return Err(RedwoodError::Closed);
        }
        Ok(())
    }

    /// Value stored under `key`; [`RedwoodError::NotFound`] when absent.
    pub fn get(&self, key: &K) -> Result<V> {
        self.ensure_open()?;
        self.tree.get(key)
    }

    /// Inserts or replaces `key`. Not visible to other handles until commit.
    pub fn set(&self, key: K, value: V) -> Result<()> {
        self.ensure_open()?;
        self.tree.set(key, value)
    }

    /// Writes pending nodes and repoints the root. Returns the root address.
    pub fn commit(&self) -> Result<Address> {
        self.ensure_open()?;
        self.tree.commit()
    }

    /// Releases the file. Uncommitted changes are dropped.
    ///
    /// Closing twice is harmless; every other call on a closed handle fails
    /// with [`RedwoodError::Closed`].
    pub fn close(&self) -> Result<()> {
        if self.storage.is_closed() {
            return Ok(());
        }
        self.storage.close()?;
        debug!("db.close");
        Ok(())
    }

    /// Whether [`Database::close`] has run.
    pub fn is_closed(&self) -> bool {
        self.storage.is_closed()
    }

    /// Number of keys visible to this handle.
    pub fn len(&self) -> Result<usize> {
        self.ensure_open()?;
        self.tree.len()
    }

    /// Returns true when no keys are visible to this handle.
    pub fn is_empty(&self) -> Result<bool> {
        self.ensure_open()?;
        self.tree.is_empty()
    }

    /// All visible entries in ascending key order.
    pub fn entries(&self) -> Result<Vec<(K, V)>> {
        self.ensure_open()?;
        self.tree.entries()
    }

    /// Shape of the visible tree.
    pub fn stats(&self) -> Result<TreeStats> {
        self.ensure_open()?;
        self.tree.stats()
    }

    /// Checks the visible tree's ordering and red-black invariants.
    pub fn verify(&self) -> Result<TreeStats> {
        self.ensure_open()?;
        self.tree.verify()
    }

    /// Last committed root address in the file.
    pub fn root_address(&self) -> Result<Address> {
        self.ensure_open()?;
        self.storage.get_root_address()
    }

    /// Address of the stored node holding `key`, or `None` if not yet committed.
    pub fn node_address(&self, key: &K) -> Result<Option<Address>> {
        self.ensure_open()?;
        self.tree.node_address(key)
    }
}
