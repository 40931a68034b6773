use std::cmp::Ordering;
use std::sync::Arc;

use parking_lot::Mutex;
use tracing::{debug, trace};

use super::node::{blacken, Color, Node, NodeRef};
use super::reference::{Leaf, Ref, ValueRef};
use crate::primitives::pager::Storage;
use crate::storage::codecs::{KeyCodec, ValCodec};
use crate::types::{Address, RedwoodError, Result};

/// Persistent red-black tree over an append-only [`Storage`].
///
/// Every `set` builds fresh nodes along the insertion path and shares all
/// other subtrees with the previous version. Nothing reachable from the
/// committed root is ever modified, so other handles reading the file keep
/// seeing the last committed version until `commit` repoints the superblock.
pub struct RedBlackTree<K, V> {
    storage: Arc<Storage>,
    root: Mutex<NodeRef<K, V>>,
}

impl<K, V> RedBlackTree<K, V>
where
    K: KeyCodec + Ord + Clone,
    V: ValCodec + Clone,
{
    /// Opens the tree rooted at the storage's committed root address.
    pub fn open(storage: Arc<Storage>) -> Result<Self> {
        let root = Ref::on_disk(storage.get_root_address()?);
        Ok(Self {
            storage,
            root: Mutex::new(root),
        })
    }

    /// The storage this tree writes to.
    pub fn storage(&self) -> &Arc<Storage> {
        &self.storage
    }

    fn refresh_root(&self) -> Result<()> {
        let address = self.storage.get_root_address()?;
        let mut root = self.root.lock();
        let unchanged = match address.non_null() {
            Some(address) => root.address() == Some(address),
            None => root.is_absent(),
        };
        if !unchanged {
            trace!(root = address.0, "tree.refresh_root");
            *root = Ref::on_disk(address);
        }
        Ok(())
    }

    /// Root to read from. Without the write lock the superblock may have moved
    /// under us, so pick up the latest committed root first.
    fn current_root(&self) -> Result<NodeRef<K, V>> {
        if !self.storage.is_locked() {
            self.refresh_root()?;
        }
        Ok(self.root.lock().clone())
    }

    /// Looks up `key`, failing with [`RedwoodError::NotFound`] when absent.
    pub fn get(&self, key: &K) -> Result<V> {
        let mut node = self.current_root()?.get(&self.storage)?;
        while let Some(current) = node {
            node = match key.cmp(&current.key) {
                Ordering::Less => current.left.get(&self.storage)?,
                Ordering::Greater => current.right.get(&self.storage)?,
                Ordering::Equal => {
                    let leaf = current
                        .value
                        .get(&self.storage)?
                        .ok_or(RedwoodError::Corruption("node without value"))?;
                    return Ok(leaf.0.clone());
                }
            };
        }
        Err(RedwoodError::NotFound)
    }

    /// Inserts or replaces `key`, producing a new uncommitted root.
    ///
    /// Takes the write lock; if this call is the one that acquired it, the root
    /// is reloaded first so the change builds on the latest commit.
    pub fn set(&self, key: K, value: V) -> Result<()> {
        if self.storage.lock()? {
            self.refresh_root()?;
        }
        let root = self.root.lock().clone();
        let inserted = self.insert(&root, key, Ref::resolved(Leaf(value)))?;
        let new_root = if inserted.is_red() {
            Arc::new(inserted.with_color(Color::Black))
        } else {
            inserted
        };
        *self.root.lock() = Ref::from_arc(new_root);
        Ok(())
    }

    /// Stores every node created since the last commit and repoints the
    /// superblock at the new root. Returns the committed root address.
    ///
    /// Without the write lock there is nothing pending from this handle, and
    /// the superblock is left alone.
    pub fn commit(&self) -> Result<Address> {
        if !self.storage.is_locked() {
            return self.storage.get_root_address();
        }
        let root = self.root.lock().clone();
        let address = root.store(&self.storage)?.unwrap_or(Address::NONE);
        self.storage.commit_root_address(address)?;
        debug!(root = address.0, "tree.commit");
        Ok(address)
    }

    /// Address of the stored node holding `key`, or `None` if that node was
    /// created after the last commit.
    pub fn node_address(&self, key: &K) -> Result<Option<Address>> {
        let mut cursor = self.current_root()?;
        loop {
            let node = cursor
                .get(&self.storage)?
                .ok_or(RedwoodError::NotFound)?;
            cursor = match key.cmp(&node.key) {
                Ordering::Less => node.left.clone(),
                Ordering::Greater => node.right.clone(),
                Ordering::Equal => return Ok(cursor.address()),
            };
        }
    }

    /// Reference to the current in-memory root.
    pub fn root(&self) -> Result<NodeRef<K, V>> {
        self.current_root()
    }

    /// Number of keys reachable from the current root.
    pub fn len(&self) -> Result<usize> {
        let mut count = 0usize;
        self.walk(&self.current_root()?, &mut |_node: &Node<K, V>| {
            count += 1;
            Ok(())
        })?;
        Ok(count)
    }

    /// Returns true when the tree holds no keys.
    pub fn is_empty(&self) -> Result<bool> {
        Ok(self.current_root()?.get(&self.storage)?.is_none())
    }

    /// All entries in ascending key order.
    pub fn entries(&self) -> Result<Vec<(K, V)>> {
        let mut out = Vec::new();
        self.walk(&self.current_root()?, &mut |node: &Node<K, V>| {
            let leaf = node
                .value
                .get(&self.storage)?
                .ok_or(RedwoodError::Corruption("node without value"))?;
            out.push((node.key.clone(), leaf.0.clone()));
            Ok(())
        })?;
        Ok(out)
    }

    fn walk(
        &self,
        node_ref: &NodeRef<K, V>,
        visit: &mut dyn FnMut(&Node<K, V>) -> Result<()>,
    ) -> Result<()> {
        if let Some(node) = node_ref.get(&self.storage)? {
            self.walk(&node.left, visit)?;
            visit(node.as_ref())?;
            self.walk(&node.right, visit)?;
        }
        Ok(())
    }

    fn insert(
        &self,
        node_ref: &NodeRef<K, V>,
        key: K,
        value: ValueRef<V>,
    ) -> Result<Arc<Node<K, V>>> {
        let Some(node) = node_ref.get(&self.storage)? else {
            return Ok(Arc::new(Node::leaf(key, value)));
        };
        let rebuilt = match key.cmp(&node.key) {
            Ordering::Less => {
                let left = self.insert(&node.left, key, value)?;
                node.with_left(Ref::from_arc(left))
            }
            Ordering::Greater => {
                let right = self.insert(&node.right, key, value)?;
                node.with_right(Ref::from_arc(right))
            }
            Ordering::Equal => node.with_value(value),
        };
        self.balance(rebuilt)
    }

    /// Restores the red-black shape below a black node after an insert.
    ///
    /// Red nodes are returned as-is; a red-red edge under them is fixed by
    /// their black parent one level up.
    fn balance(&self, node: Node<K, V>) -> Result<Arc<Node<K, V>>> {
        if node.is_red() {
            return Ok(Arc::new(node));
        }
        let storage = &*self.storage;
        let left = red_child(&node.left, storage)?;
        let right = red_child(&node.right, storage)?;

        match (left, right) {
            (Some(l), Some(r)) => Ok(Arc::new(Node::new(
                blacken(&node.left, &l),
                node.key.clone(),
                node.value.clone(),
                blacken(&node.right, &r),
                Color::Red,
            ))),
            (Some(l), None) => {
                if let Some(ll) = red_child(&l.left, storage)? {
                    // Single right rotation around `node`.
                    return Ok(Arc::new(Node::new(
                        blacken(&l.left, &ll),
                        l.key.clone(),
                        l.value.clone(),
                        Ref::resolved(Node::new(
                            l.right.clone(),
                            node.key.clone(),
                            node.value.clone(),
                            node.right.clone(),
                            Color::Black,
                        )),
                        Color::Red,
                    )));
                }
                if let Some(lr) = red_child(&l.right, storage)? {
                    // Left rotation around the left child, then right around `node`.
                    return Ok(Arc::new(Node::new(
                        Ref::resolved(Node::new(
                            l.left.clone(),
                            l.key.clone(),
                            l.value.clone(),
                            lr.left.clone(),
                            Color::Black,
                        )),
                        lr.key.clone(),
                        lr.value.clone(),
                        Ref::resolved(Node::new(
                            lr.right.clone(),
                            node.key.clone(),
                            node.value.clone(),
                            node.right.clone(),
                            Color::Black,
                        )),
                        Color::Red,
                    )));
                }
                Ok(Arc::new(node))
            }
            (None, Some(r)) => {
                if let Some(rr) = red_child(&r.right, storage)? {
                    return Ok(Arc::new(Node::new(
                        Ref::resolved(Node::new(
                            node.left.clone(),
                            node.key.clone(),
                            node.value.clone(),
                            r.left.clone(),
                            Color::Black,
                        )),
                        r.key.clone(),
                        r.value.clone(),
                        blacken(&r.right, &rr),
                        Color::Red,
                    )));
                }
                if let Some(rl) = red_child(&r.left, storage)? {
                    return Ok(Arc::new(Node::new(
                        Ref::resolved(Node::new(
                            node.left.clone(),
                            node.key.clone(),
                            node.value.clone(),
                            rl.left.clone(),
                            Color::Black,
                        )),
                        rl.key.clone(),
                        rl.value.clone(),
                        Ref::resolved(Node::new(
                            rl.right.clone(),
                            r.key.clone(),
                            r.value.clone(),
                            r.right.clone(),
                            Color::Black,
                        )),
                        Color::Red,
                    )));
                }
                Ok(Arc::new(node))
            }
            (None, None) => Ok(Arc::new(node)),
        }
    }
}

/// Loads `node_ref` and returns it only if it is a red node.
fn red_child<K, V>(node_ref: &NodeRef<K, V>, storage: &Storage) -> Result<Option<Arc<Node<K, V>>>>
where
    K: KeyCodec + Clone,
    V: ValCodec,
{
    Ok(node_ref.get(storage)?.filter(|node| node.is_red()))
}
