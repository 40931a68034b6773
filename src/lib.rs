//! Redwood: an append-only key/value store backed by a persistent red-black tree.
//!
//! Every change builds new tree nodes and appends them to a single file; old
//! versions stay intact on disk. A fixed superblock at the start of the file
//! names the current root, and committing is the one in-place write.
//!
//! ```no_run
//! # fn main() -> redwood::Result<()> {
//! let db = redwood::connect("series.db")?;
//! db.set("1:size".into(), "42".into())?;
//! db.commit()?;
//! assert_eq!(db.get(&"1:size".into())?, "42");
//! db.close()?;
//! # Ok(())
//! # }
//! ```

#![warn(missing_docs)]

pub mod db;
pub mod primitives;
pub mod storage;
pub mod types;

pub use db::{connect, Database, DbOptions};
pub use primitives::pager::{Storage, StorageOptions, Synchronous};
pub use storage::codecs::{KeyCodec, ValCodec};
pub use storage::rbtree::{RedBlackTree, TreeStats};
pub use types::{Address, RedwoodError, Result};
