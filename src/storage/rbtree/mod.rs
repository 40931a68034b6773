#![forbid(unsafe_code)]

//! Copy-on-write red-black tree whose nodes live in append-only storage.

mod node;
mod reference;
mod stats;
mod tree;

pub use node::{Color, Node, NodeRef};
pub use reference::{Leaf, Ref, RefState, Referent, ValueRef};
pub use stats::TreeStats;
pub use tree::RedBlackTree;
