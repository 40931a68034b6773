use std::ops::Range;
use std::sync::Arc;

use super::reference::{Ref, Referent, ValueRef};
use crate::primitives::pager::Storage;
use crate::storage::codecs::{KeyCodec, ValCodec};
use crate::types::{record_crc32, Address, RedwoodError, Result};

const NODE_FORMAT_VERSION: u8 = 1;

const NODE_FORMAT: usize = 0;
const NODE_COLOR: usize = 1;
const NODE_LEFT: Range<usize> = 2..10;
const NODE_VALUE: Range<usize> = 10..18;
const NODE_RIGHT: Range<usize> = 18..26;
const NODE_KEY_LEN: Range<usize> = 26..30;
const NODE_HDR_LEN: usize = 30;
const NODE_CRC_LEN: usize = 4;

/// Node colour.
#[repr(u8)]
#[derive(Copy, Clone, Debug, Eq, PartialEq)]
pub enum Color {
    /// Red nodes never have red children.
    Red = 0,
    /// Black nodes count toward the black height.
    Black = 1,
}

impl TryFrom<u8> for Color {
    type Error = RedwoodError;

    fn try_from(value: u8) -> Result<Self> {
        match value {
            0 => Ok(Color::Red),
            1 => Ok(Color::Black),
            _ => Err(RedwoodError::Corruption("unknown node color")),
        }
    }
}

/// Reference to a tree node; an absent ref is an empty subtree.
pub type NodeRef<K, V> = Ref<Node<K, V>>;

/// Immutable tree node. Changing anything means building a new node.
pub struct Node<K, V> {
    pub(crate) left: NodeRef<K, V>,
    pub(crate) key: K,
    pub(crate) value: ValueRef<V>,
    pub(crate) right: NodeRef<K, V>,
    pub(crate) color: Color,
}

impl<K: Clone, V> Node<K, V> {
    /// Builds a node from its parts.
    pub fn new(
        left: NodeRef<K, V>,
        key: K,
        value: ValueRef<V>,
        right: NodeRef<K, V>,
        color: Color,
    ) -> Self {
        Self {
            left,
            key,
            value,
            right,
            color,
        }
    }

    /// A fresh red node with two empty children.
    pub fn leaf(key: K, value: ValueRef<V>) -> Self {
        Self::new(Ref::absent(), key, value, Ref::absent(), Color::Red)
    }

    /// The node's key.
    pub fn key(&self) -> &K {
        &self.key
    }

    /// The node's colour.
    pub fn color(&self) -> Color {
        self.color
    }

    /// Whether the node is red.
    pub fn is_red(&self) -> bool {
        self.color == Color::Red
    }

    /// Reference to the left subtree.
    pub fn left(&self) -> &NodeRef<K, V> {
        &self.left
    }

    /// Reference to the right subtree.
    pub fn right(&self) -> &NodeRef<K, V> {
        &self.right
    }

    pub(crate) fn with_left(&self, left: NodeRef<K, V>) -> Self {
        Self::new(
            left,
            self.key.clone(),
            self.value.clone(),
            self.right.clone(),
            self.color,
        )
    }

    pub(crate) fn with_right(&self, right: NodeRef<K, V>) -> Self {
        Self::new(
            self.left.clone(),
            self.key.clone(),
            self.value.clone(),
            right,
            self.color,
        )
    }

    pub(crate) fn with_value(&self, value: ValueRef<V>) -> Self {
        Self::new(
            self.left.clone(),
            self.key.clone(),
            value,
            self.right.clone(),
            self.color,
        )
    }

    pub(crate) fn with_color(&self, color: Color) -> Self {
        Self::new(
            self.left.clone(),
            self.key.clone(),
            self.value.clone(),
            self.right.clone(),
            color,
        )
    }
}

/// Returns `node_ref` untouched when it is already black, else a black copy.
pub(crate) fn blacken<K: Clone, V>(node_ref: &NodeRef<K, V>, node: &Arc<Node<K, V>>) -> NodeRef<K, V> {
    if node.is_red() {
        Ref::resolved(node.with_color(Color::Black))
    } else {
        node_ref.clone()
    }
}

fn child_address<K, V>(child: &NodeRef<K, V>) -> Result<Address> {
    if child.is_absent() {
        return Ok(Address::NONE);
    }
    child
        .address()
        .ok_or(RedwoodError::Invalid("child node encoded before it was stored"))
}

impl<K, V> Referent for Node<K, V>
where
    K: KeyCodec + Clone,
    V: ValCodec,
{
    fn prepare_to_store(&self, storage: &Storage) -> Result<()> {
        self.value.store(storage)?;
        self.left.store(storage)?;
        self.right.store(storage)?;
        Ok(())
    }

    fn encode(&self) -> Result<Vec<u8>> {
        let value = self
            .value
            .address()
            .ok_or(RedwoodError::Invalid("node encoded before its value was stored"))?;
        let mut key = Vec::new();
        K::encode_key(&self.key, &mut key);
        let key_len =
            u32::try_from(key.len()).map_err(|_| RedwoodError::Invalid("key too large"))?;

        let mut out = vec![0u8; NODE_HDR_LEN];
        out[NODE_FORMAT] = NODE_FORMAT_VERSION;
        out[NODE_COLOR] = self.color as u8;
        out[NODE_LEFT].copy_from_slice(&child_address(&self.left)?.0.to_be_bytes());
        out[NODE_VALUE].copy_from_slice(&value.0.to_be_bytes());
        out[NODE_RIGHT].copy_from_slice(&child_address(&self.right)?.0.to_be_bytes());
        out[NODE_KEY_LEN].copy_from_slice(&key_len.to_be_bytes());
        out.extend_from_slice(&key);
        let crc = record_crc32(&out);
        out.extend_from_slice(&crc.to_be_bytes());
        Ok(out)
    }

    fn decode(bytes: &[u8]) -> Result<Self> {
        if bytes.len() < NODE_HDR_LEN + NODE_CRC_LEN {
            return Err(RedwoodError::Corruption("node record truncated"));
        }
        let (body, crc) = bytes.split_at(bytes.len() - NODE_CRC_LEN);
        if record_crc32(body) != read_u32(crc) {
            return Err(RedwoodError::Corruption("node record checksum mismatch"));
        }
        if body[NODE_FORMAT] != NODE_FORMAT_VERSION {
            return Err(RedwoodError::Corruption("unsupported node record format"));
        }
        let color = Color::try_from(body[NODE_COLOR])?;
        let key_len = read_u32(&body[NODE_KEY_LEN]) as usize;
        if body.len() != NODE_HDR_LEN + key_len {
            return Err(RedwoodError::Corruption("node key length mismatch"));
        }
        let value = Address(read_u64(&body[NODE_VALUE])).non_null().ok_or(
            RedwoodError::Corruption("node record without value address"),
        )?;
        Ok(Self {
            left: Ref::on_disk(Address(read_u64(&body[NODE_LEFT]))),
            key: K::decode_key(&body[NODE_HDR_LEN..])?,
            value: Ref::on_disk(value),
            right: Ref::on_disk(Address(read_u64(&body[NODE_RIGHT]))),
            color,
        })
    }
}

fn read_u32(bytes: &[u8]) -> u32 {
    let mut arr = [0u8; 4];
    arr.copy_from_slice(&bytes[..4]);
    u32::from_be_bytes(arr)
}

fn read_u64(bytes: &[u8]) -> u64 {
    let mut arr = [0u8; 8];
    arr.copy_from_slice(&bytes[..8]);
    u64::from_be_bytes(arr)
}
