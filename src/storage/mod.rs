//! Key/value encodings and the persistent tree built on the record store.

/// Encoding and decoding utilities for keys and values.
pub mod codecs;

/// Persistent red-black tree.
pub mod rbtree;

pub use codecs::{KeyCodec, ValCodec};
pub use rbtree::{Color, RedBlackTree, TreeStats};
