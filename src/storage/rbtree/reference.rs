use std::sync::Arc;

use parking_lot::Mutex;

use crate::primitives::pager::Storage;
use crate::storage::codecs::ValCodec;
use crate::types::{Address, Result};

/// Something a [`Ref`] can point at and move to and from disk.
pub trait Referent: Sized {
    /// Persists whatever this value points to before it is encoded itself.
    fn prepare_to_store(&self, _storage: &Storage) -> Result<()> {
        Ok(())
    }

    /// Serializes the value into a record payload.
    fn encode(&self) -> Result<Vec<u8>>;

    /// Rebuilds the value from a record payload.
    fn decode(bytes: &[u8]) -> Result<Self>;
}

/// Where the target of a [`Ref`] currently lives.
pub enum RefState<T> {
    /// Nothing: an empty child slot.
    Absent,
    /// In memory only; not yet written.
    Resolved(Arc<T>),
    /// On disk only; fetched on first access.
    OnDisk(Address),
    /// In memory and on disk.
    Cached {
        /// The decoded value.
        value: Arc<T>,
        /// Address of its record.
        address: Address,
    },
}

/// Lazily loaded, lazily stored handle to a value or tree node.
///
/// Clones share one cell, so loading or storing through any clone is seen by
/// all of them. That is what lets a new tree version reuse an old subtree
/// without writing it again.
pub struct Ref<T> {
    state: Arc<Mutex<RefState<T>>>,
}

impl<T> Clone for Ref<T> {
    fn clone(&self) -> Self {
        Self {
            state: Arc::clone(&self.state),
        }
    }
}

impl<T> Ref<T> {
    fn with_state(state: RefState<T>) -> Self {
        Self {
            state: Arc::new(Mutex::new(state)),
        }
    }

    /// An empty slot.
    pub fn absent() -> Self {
        Self::with_state(RefState::Absent)
    }

    /// Wraps a value that has not been written yet.
    pub fn resolved(value: T) -> Self {
        Self::from_arc(Arc::new(value))
    }

    /// Wraps an already shared value that has not been written yet.
    pub fn from_arc(value: Arc<T>) -> Self {
        Self::with_state(RefState::Resolved(value))
    }

    /// Points at a record on disk; [`Address::NONE`] yields an empty slot.
    pub fn on_disk(address: Address) -> Self {
        match address.non_null() {
            Some(address) => Self::with_state(RefState::OnDisk(address)),
            None => Self::absent(),
        }
    }

    /// Address of the backing record, once there is one.
    pub fn address(&self) -> Option<Address> {
        match &*self.state.lock() {
            RefState::OnDisk(address) | RefState::Cached { address, .. } => Some(*address),
            RefState::Absent | RefState::Resolved(_) => None,
        }
    }

    /// True for an empty slot.
    pub fn is_absent(&self) -> bool {
        matches!(&*self.state.lock(), RefState::Absent)
    }

    /// True when both handles share one cell.
    pub fn ptr_eq(&self, other: &Self) -> bool {
        Arc::ptr_eq(&self.state, &other.state)
    }

    /// True once the target has been decoded or was created in memory.
    pub fn is_loaded(&self) -> bool {
        matches!(
            &*self.state.lock(),
            RefState::Resolved(_) | RefState::Cached { .. }
        )
    }
}

impl<T: Referent> Ref<T> {
    /// Returns the target, reading and caching it on first use.
    ///
    /// An empty slot yields `None` rather than an error.
    pub fn get(&self, storage: &Storage) -> Result<Option<Arc<T>>> {
        let address = match &*self.state.lock() {
            RefState::Absent => return Ok(None),
            RefState::Resolved(value) | RefState::Cached { value, .. } => {
                return Ok(Some(Arc::clone(value)))
            }
            RefState::OnDisk(address) => *address,
        };
        let value = Arc::new(T::decode(&storage.read(address)?)?);
        *self.state.lock() = RefState::Cached {
            value: Arc::clone(&value),
            address,
        };
        Ok(Some(value))
    }

    /// Writes the target if it has no address yet and returns the address.
    ///
    /// Targets that are already on disk are left alone, so storing a new root
    /// only writes what changed since the last commit.
    pub fn store(&self, storage: &Storage) -> Result<Option<Address>> {
        let value = match &*self.state.lock() {
            RefState::Absent => return Ok(None),
            RefState::OnDisk(address) | RefState::Cached { address, .. } => {
                return Ok(Some(*address))
            }
            RefState::Resolved(value) => Arc::clone(value),
        };
        value.prepare_to_store(storage)?;
        let address = storage.write(&value.encode()?)?;
        *self.state.lock() = RefState::Cached { value, address };
        Ok(Some(address))
    }
}

/// A user value held in a leaf record.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Leaf<V>(pub V);

impl<V: ValCodec> Referent for Leaf<V> {
    fn encode(&self) -> Result<Vec<u8>> {
        let mut out = Vec::new();
        V::encode_val(&self.0, &mut out);
        Ok(out)
    }

    fn decode(bytes: &[u8]) -> Result<Self> {
        V::decode_val(bytes).map(Leaf)
    }
}

/// Reference to a stored user value.
pub type ValueRef<V> = Ref<Leaf<V>>;
