#![forbid(unsafe_code)]

use std::{
    fs::{File, OpenOptions},
    io::{self, ErrorKind},
    path::Path,
    sync::Arc,
};

use crate::types::{RedwoodError, Result};

/// Positioned reads and writes against a single file.
///
/// Nothing here tracks a cursor; every call names its own offset, so a reader
/// never disturbs where the next append lands.
pub trait FileIo: Send + Sync + 'static {
    /// Fills `dst` from `off`, failing with `UnexpectedEof` on a short file.
    fn read_at(&self, off: u64, dst: &mut [u8]) -> Result<()>;
    /// Writes all of `src` starting at `off`.
    fn write_at(&self, off: u64, src: &[u8]) -> Result<()>;
    /// Flushes file data and metadata to stable storage.
    fn sync_all(&self) -> Result<()>;
    /// Current file length in bytes.
    fn len(&self) -> Result<u64>;
    /// Returns true when the file holds no bytes.
    fn is_empty(&self) -> Result<bool> {
        Ok(self.len()? == 0)
    }
    /// Grows or shrinks the file to exactly `len` bytes.
    fn set_len(&self, len: u64) -> Result<()>;
}

/// [`FileIo`] over a shared `std::fs::File`.
#[derive(Clone)]
pub struct StdFileIo {
    inner: Arc<File>,
}

impl StdFileIo {
    /// Wraps an already opened file.
    pub fn new(file: File) -> Self {
        Self {
            inner: Arc::new(file),
        }
    }

    /// Opens `path` read/write, creating it when missing.
    pub fn open(path: impl AsRef<Path>) -> Result<Self> {
        let file = OpenOptions::new()
            .read(true)
            .write(true)
            .create(true)
            .truncate(false)
            .open(path)
            .map_err(RedwoodError::from)?;
        Ok(Self::new(file))
    }

    /// Shared handle to the underlying file, used for OS-level locking.
    pub fn file(&self) -> &Arc<File> {
        &self.inner
    }
}

#[cfg(unix)]
fn read_exact_at(file: &File, mut off: u64, mut dst: &mut [u8]) -> io::Result<()> {
    use std::os::unix::fs::FileExt;

    while !dst.is_empty() {
        let read = file.read_at(dst, off)?;
        if read == 0 {
            return Err(io::Error::new(
                ErrorKind::UnexpectedEof,
                "read_at reached EOF",
            ));
        }
        dst = &mut dst[read..];
        off += read as u64;
    }
    Ok(())
}

#[cfg(unix)]
fn write_all_at(file: &File, mut off: u64, mut src: &[u8]) -> io::Result<()> {
    use std::os::unix::fs::FileExt;

    while !src.is_empty() {
        let written = file.write_at(src, off)?;
        if written == 0 {
            return Err(io::Error::new(
                ErrorKind::WriteZero,
                "write_at wrote zero bytes",
            ));
        }
        src = &src[written..];
        off += written as u64;
    }
    Ok(())
}

#[cfg(windows)]
fn read_exact_at(file: &File, mut off: u64, mut dst: &mut [u8]) -> io::Result<()> {
    use std::os::windows::fs::FileExt;

    while !dst.is_empty() {
        let read = file.seek_read(dst, off)?;
        if read == 0 {
            return Err(io::Error::new(
                ErrorKind::UnexpectedEof,
                "seek_read reached EOF",
            ));
        }
        dst = &mut dst[read..];
        off += read as u64;
    }
    Ok(())
}

#[cfg(windows)]
fn write_all_at(file: &File, mut off: u64, mut src: &[u8]) -> io::Result<()> {
    use std::os::windows::fs::FileExt;

    while !src.is_empty() {
        let written = file.seek_write(src, off)?;
        if written == 0 {
            return Err(io::Error::new(
                ErrorKind::WriteZero,
                "seek_write wrote zero bytes",
            ));
        }
        src = &src[written..];
        off += written as u64;
    }
    Ok(())
}

#[cfg(not(any(unix, windows)))]
fn read_exact_at(_file: &File, _off: u64, _dst: &mut [u8]) -> io::Result<()> {
    Err(io::Error::new(
        ErrorKind::Unsupported,
        "positioned reads unsupported on this platform",
    ))
}

#[cfg(not(any(unix, windows)))]
fn write_all_at(_file: &File, _off: u64, _src: &[u8]) -> io::Result<()> {
    Err(io::Error::new(
        ErrorKind::Unsupported,
        "positioned writes unsupported on this platform",
    ))
}

impl FileIo for StdFileIo {
    fn read_at(&self, off: u64, dst: &mut [u8]) -> Result<()> {
        read_exact_at(&self.inner, off, dst).map_err(RedwoodError::from)
    }

    fn write_at(&self, off: u64, src: &[u8]) -> Result<()> {
        write_all_at(&self.inner, off, src).map_err(RedwoodError::from)
    }

    fn sync_all(&self) -> Result<()> {
        self.inner.sync_all().map_err(RedwoodError::from)
    }

    fn len(&self) -> Result<u64> {
        Ok(self.inner.metadata().map_err(RedwoodError::from)?.len())
    }

    fn set_len(&self, len: u64) -> Result<()> {
        self.inner.set_len(len).map_err(RedwoodError::from)
    }
}
