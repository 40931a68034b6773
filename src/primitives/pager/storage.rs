use std::path::Path;
use std::time::Duration;

use parking_lot::Mutex;
use tracing::{debug, trace};

use super::superblock::{
    encode_record, ensure_superblock, read_root, validate_superblock_size, write_root,
    DEFAULT_SUPERBLOCK_SIZE, RECORD_LEN_PREFIX,
};
use crate::primitives::concurrency::FileLock;
use crate::primitives::io::{FileIo, StdFileIo};
use crate::types::{Address, RedwoodError, Result};

/// How hard a root commit pushes data to stable storage.
#[derive(Copy, Clone, Debug, Eq, PartialEq, Default)]
pub enum Synchronous {
    /// Sync record data before repointing the root, then sync the root.
    #[default]
    Full,
    /// Sync once, after the root has been repointed.
    Normal,
    /// Never sync; the OS decides when bytes reach the disk.
    Off,
}

/// Configuration options for [`Storage`].
#[derive(Clone, Debug)]
pub struct StorageOptions {
    /// Size of the reserved header region; a power of two of at least 16.
    pub superblock_size: u64,
    /// Give up on the file lock after this long. `None` blocks indefinitely.
    pub lock_timeout: Option<Duration>,
    /// Durability mode applied by [`Storage::commit_root_address`].
    pub synchronous: Synchronous,
}

impl Default for StorageOptions {
    fn default() -> Self {
        Self {
            superblock_size: DEFAULT_SUPERBLOCK_SIZE,
            lock_timeout: None,
            synchronous: Synchronous::Full,
        }
    }
}

struct Inner {
    io: StdFileIo,
    lock: FileLock,
}

/// Append-only record store over one file.
///
/// The file starts with a zeroed superblock whose first eight bytes hold the
/// committed root address and whose next eight record the superblock size.
/// Everything after it is a sequence of `[u64 length][payload]` records,
/// addressed by the offset of their length prefix. Records are never
/// rewritten or freed.
pub struct Storage {
    inner: Mutex<Option<Inner>>,
    superblock_size: u64,
    synchronous: Synchronous,
}

impl Storage {
    /// Opens or creates the file at `path` and makes sure its superblock exists.
    pub fn open(path: impl AsRef<Path>, options: StorageOptions) -> Result<Self> {
        validate_superblock_size(options.superblock_size)?;
        let io = StdFileIo::open(path.as_ref())?;
        let mut lock = FileLock::new(io.file().clone(), options.lock_timeout);
        lock.acquire()?;
        let ensured = ensure_superblock(&io, options.superblock_size);
        let released = lock.release();
        let (superblock_size, padded) = ensured?;
        released?;
        debug!(
            path = %path.as_ref().display(),
            superblock_size,
            requested = options.superblock_size,
            padded,
            "storage.open"
        );
        Ok(Self {
            inner: Mutex::new(Some(Inner { io, lock })),
            superblock_size,
            synchronous: options.synchronous,
        })
    }

    fn with_inner<T>(&self, f: impl FnOnce(&mut Inner) -> Result<T>) -> Result<T> {
        let mut guard = self.inner.lock();
        match guard.as_mut() {
            Some(inner) => f(inner),
            None => Err(RedwoodError::Closed),
        }
    }

    /// Size of the reserved header region, as recorded in the file.
    pub fn superblock_size(&self) -> u64 {
        self.superblock_size
    }

    /// Takes the exclusive file lock. Returns `true` only when newly acquired.
    pub fn lock(&self) -> Result<bool> {
        self.with_inner(|inner| inner.lock.acquire())
    }

    /// Releases the file lock if this handle holds it.
    pub fn unlock(&self) -> Result<bool> {
        self.with_inner(|inner| inner.lock.release())
    }

    /// Whether this handle holds the file lock. A closed store holds nothing.
    pub fn is_locked(&self) -> bool {
        self.inner
            .lock()
            .as_ref()
            .map(|inner| inner.lock.is_held())
            .unwrap_or(false)
    }

    /// Appends `payload` as a new record and returns its address.
    ///
    /// Takes the file lock first and keeps it; the lock is released by the next
    /// root commit, an explicit [`Storage::unlock`], or close.
    pub fn write(&self, payload: &[u8]) -> Result<Address> {
        self.with_inner(|inner| {
            inner.lock.acquire()?;
            let end = inner.io.len()?.max(self.superblock_size);
            inner.io.write_at(end, &encode_record(payload))?;
            trace!(address = end, len = payload.len(), "storage.write");
            Ok(Address(end))
        })
    }

    /// Reads the payload of the record starting at `address`.
    pub fn read(&self, address: Address) -> Result<Vec<u8>> {
        if address.0 < self.superblock_size {
            return Err(RedwoodError::Corruption("record address inside superblock"));
        }
        self.with_inner(|inner| {
            let file_len = inner.io.len()?;
            let body_start = address
                .0
                .checked_add(RECORD_LEN_PREFIX as u64)
                .ok_or(RedwoodError::Corruption("record address overflow"))?;
            if body_start > file_len {
                return Err(RedwoodError::Corruption("record address past end of file"));
            }
            let mut prefix = [0u8; RECORD_LEN_PREFIX];
            inner.io.read_at(address.0, &mut prefix)?;
            let len = u64::from_be_bytes(prefix);
            match body_start.checked_add(len) {
                Some(end) if end <= file_len => {}
                _ => return Err(RedwoodError::Corruption("record length exceeds file")),
            }
            let mut payload = vec![0u8; len as usize];
            inner.io.read_at(body_start, &mut payload)?;
            trace!(address = address.0, len, "storage.read");
            Ok(payload)
        })
    }

    /// Points the superblock at `root` and releases the file lock.
    pub fn commit_root_address(&self, root: Address) -> Result<()> {
        self.with_inner(|inner| {
            inner.lock.acquire()?;
            let result = self.write_root_synced(&inner.io, root);
            let released = inner.lock.release();
            result?;
            released?;
            debug!(root = root.0, synchronous = ?self.synchronous, "storage.commit_root");
            Ok(())
        })
    }

    fn write_root_synced(&self, io: &StdFileIo, root: Address) -> Result<()> {
        if self.synchronous == Synchronous::Full {
            io.sync_all()?;
        }
        write_root(io, root)?;
        if self.synchronous != Synchronous::Off {
            io.sync_all()?;
        }
        Ok(())
    }

    /// Address of the last committed root, or [`Address::NONE`] for an empty tree.
    pub fn get_root_address(&self) -> Result<Address> {
        self.with_inner(|inner| read_root(&inner.io))
    }

    /// Current length of the backing file.
    pub fn file_len(&self) -> Result<u64> {
        self.with_inner(|inner| inner.io.len())
    }

    /// Releases the lock and the file. Later calls fail with `Closed`.
    pub fn close(&self) -> Result<()> {
        let taken = self.inner.lock().take();
        if let Some(mut inner) = taken {
            inner.lock.release()?;
            debug!("storage.close");
        }
        Ok(())
    }

    /// Whether [`Storage::close`] has run.
    pub fn is_closed(&self) -> bool {
        self.inner.lock().is_none()
    }
}
