use super::node::NodeRef;
use super::tree::RedBlackTree;
use crate::storage::codecs::{KeyCodec, ValCodec};
use crate::types::{RedwoodError, Result};

/// Shape of the tree reachable from the current root.
#[derive(Default, Debug, Clone, Copy, PartialEq, Eq)]
pub struct TreeStats {
    /// Number of nodes (equivalently, keys).
    pub nodes: usize,
    /// Nodes on the shortest root-to-empty-child path.
    pub min_depth: usize,
    /// Nodes on the longest root-to-empty-child path.
    pub max_depth: usize,
    /// Black nodes on the leftmost root-to-empty-child path.
    pub black_height: usize,
}

impl TreeStats {
    /// Longest path is at most twice the shortest one.
    pub fn is_balanced(&self) -> bool {
        self.max_depth <= 2 * self.min_depth
    }
}

impl<K, V> RedBlackTree<K, V>
where
    K: KeyCodec + Ord + Clone,
    V: ValCodec + Clone,
{
    /// Measures the current tree. Loads every reachable node.
    pub fn stats(&self) -> Result<TreeStats> {
        let root = self.root()?;
        let (nodes, min_depth, max_depth) = self.measure(&root)?;
        let mut black_height = 0;
        let mut cursor = root;
        while let Some(node) = cursor.get(self.storage())? {
            if !node.is_red() {
                black_height += 1;
            }
            cursor = node.left().clone();
        }
        Ok(TreeStats {
            nodes,
            min_depth,
            max_depth,
            black_height,
        })
    }

    fn measure(&self, node_ref: &NodeRef<K, V>) -> Result<(usize, usize, usize)> {
        let Some(node) = node_ref.get(self.storage())? else {
            return Ok((0, 0, 0));
        };
        let (left_nodes, left_min, left_max) = self.measure(node.left())?;
        let (right_nodes, right_min, right_max) = self.measure(node.right())?;
        Ok((
            left_nodes + right_nodes + 1,
            left_min.min(right_min) + 1,
            left_max.max(right_max) + 1,
        ))
    }

    /// Checks ordering and red-black invariants over the whole tree.
    ///
    /// Fails with [`RedwoodError::Corruption`] on a red root, a red node with
    /// a red child, unequal black heights, or keys out of order.
    pub fn verify(&self) -> Result<TreeStats> {
        let root = self.root()?;
        if let Some(node) = root.get(self.storage())? {
            if node.is_red() {
                return Err(RedwoodError::Corruption("root is red"));
            }
        }
        self.check(&root, None, None, false)?;
        self.stats()
    }

    fn check(
        &self,
        node_ref: &NodeRef<K, V>,
        lower: Option<&K>,
        upper: Option<&K>,
        parent_red: bool,
    ) -> Result<usize> {
        let Some(node) = node_ref.get(self.storage())? else {
            return Ok(0);
        };
        if parent_red && node.is_red() {
            return Err(RedwoodError::Corruption("red node with red child"));
        }
        if lower.is_some_and(|lower| node.key() <= lower)
            || upper.is_some_and(|upper| node.key() >= upper)
        {
            return Err(RedwoodError::Corruption("keys out of order"));
        }
        let left = self.check(node.left(), lower, Some(node.key()), node.is_red())?;
        let right = self.check(node.right(), Some(node.key()), upper, node.is_red())?;
        if left != right {
            return Err(RedwoodError::Corruption("unequal black height"));
        }
        Ok(left + usize::from(!node.is_red()))
    }
}
