#![allow(unsafe_code)]

use std::fs::File;
use std::io;
use std::sync::Arc;
use std::time::{Duration, Instant};

use tracing::{debug, warn};

use crate::types::{RedwoodError, Result};

const POLL_INTERVAL: Duration = Duration::from_millis(5);

/// Exclusive advisory lock over a whole file.
///
/// The lock belongs to the open file description, so two handles opened on the
/// same path exclude each other even inside one process. Acquiring while
/// already held is a no-op; dropping the guard releases it.
pub struct FileLock {
    file: Arc<File>,
    held: bool,
    timeout: Option<Duration>,
}

impl FileLock {
    /// Creates an unheld lock over `file`.
    ///
    /// With `timeout` set, acquisition polls instead of blocking and gives up
    /// with [`RedwoodError::LockUnavailable`] once the deadline passes.
    pub fn new(file: Arc<File>, timeout: Option<Duration>) -> Self {
        Self {
            file,
            held: false,
            timeout,
        }
    }

    /// Whether this handle currently holds the lock.
    pub fn is_held(&self) -> bool {
        self.held
    }

    /// Takes the lock, returning `true` only if this call acquired it.
    pub fn acquire(&mut self) -> Result<bool> {
        if self.held {
            return Ok(false);
        }
        match self.timeout {
            None => lock_file(&self.file, true).map_err(|err| {
                warn!(error = %err, "lock.acquire.failed");
                RedwoodError::LockUnavailable("exclusive file lock failed")
            })?,
            Some(timeout) => self.acquire_with_deadline(Instant::now() + timeout)?,
        };
        self.held = true;
        debug!("lock.acquire");
        Ok(true)
    }

    fn acquire_with_deadline(&self, deadline: Instant) -> Result<bool> {
        loop {
            let acquired = lock_file(&self.file, false).map_err(|err| {
                warn!(error = %err, "lock.try_acquire.failed");
                RedwoodError::LockUnavailable("exclusive file lock failed")
            })?;
            if acquired {
                return Ok(true);
            }
            if Instant::now() >= deadline {
                warn!("lock.acquire.timeout");
                return Err(RedwoodError::LockUnavailable(
                    "timed out waiting for file lock",
                ));
            }
            std::thread::sleep(POLL_INTERVAL);
        }
    }

    /// Drops the lock if held. Returns `true` when something was released.
    pub fn release(&mut self) -> Result<bool> {
        if !self.held {
            return Ok(false);
        }
        unlock_file(&self.file).map_err(RedwoodError::from)?;
        self.held = false;
        debug!("lock.release");
        Ok(true)
    }
}

impl Drop for FileLock {
    fn drop(&mut self) {
        if self.held {
            if let Err(err) = unlock_file(&self.file) {
                warn!(error = %err, "lock.release.failed");
            }
            self.held = false;
        }
    }
}

fn lock_file(file: &File, blocking: bool) -> io::Result<bool> {
    #[cfg(unix)]
    {
        unix::lock(file, blocking)
    }
    #[cfg(windows)]
    {
        windows::lock(file, blocking)
    }
    #[cfg(not(any(unix, windows)))]
    {
        let _ = (file, blocking);
        Err(io::Error::new(
            io::ErrorKind::Unsupported,
            "file locking unsupported on this platform",
        ))
    }
}

fn unlock_file(file: &File) -> io::Result<()> {
    #[cfg(unix)]
    {
        unix::unlock(file)
    }
    #[cfg(windows)]
    {
        windows::unlock(file)
    }
    #[cfg(not(any(unix, windows)))]
    {
        let _ = file;
        Err(io::Error::new(
            io::ErrorKind::Unsupported,
            "file locking unsupported on this platform",
        ))
    }
}

#[cfg(unix)]
mod unix {
    use super::*;
    use std::os::unix::io::AsRawFd;

    pub fn lock(file: &File, blocking: bool) -> io::Result<bool> {
        let fd = file.as_raw_fd();
        let op = if blocking {
            libc::LOCK_EX
        } else {
            libc::LOCK_EX | libc::LOCK_NB
        };
        loop {
            let res = unsafe { libc::flock(fd, op) };
            if res == 0 {
                return Ok(true);
            }
            let err = io::Error::last_os_error();
            match err.raw_os_error() {
                Some(libc::EINTR) => continue,
                Some(code) if !blocking && code == libc::EWOULDBLOCK => return Ok(false),
                _ => return Err(err),
            }
        }
    }

    pub fn unlock(file: &File) -> io::Result<()> {
        let res = unsafe { libc::flock(file.as_raw_fd(), libc::LOCK_UN) };
        if res == 0 {
            Ok(())
        } else {
            Err(io::Error::last_os_error())
        }
    }
}

#[cfg(windows)]
mod windows {
    use super::*;
    use std::mem::zeroed;
    use std::os::windows::io::AsRawHandle;
    use windows_sys::Win32::Foundation::ERROR_LOCK_VIOLATION;
    use windows_sys::Win32::Storage::FileSystem::{
        LockFileEx, UnlockFileEx, LOCKFILE_EXCLUSIVE_LOCK, LOCKFILE_FAIL_IMMEDIATELY,
    };
    use windows_sys::Win32::System::IO::OVERLAPPED;

    pub fn lock(file: &File, blocking: bool) -> io::Result<bool> {
        unsafe {
            let handle = file.as_raw_handle();
            let mut overlapped: OVERLAPPED = zeroed();
            let mut flags = LOCKFILE_EXCLUSIVE_LOCK;
            if !blocking {
                flags |= LOCKFILE_FAIL_IMMEDIATELY;
            }
            let res = LockFileEx(handle as isize, flags, 0, u32::MAX, u32::MAX, &mut overlapped);
            if res != 0 {
                return Ok(true);
            }
            let err = io::Error::last_os_error();
            if !blocking && matches!(err.raw_os_error(), Some(code) if code == ERROR_LOCK_VIOLATION as i32)
            {
                Ok(false)
            } else {
                Err(err)
            }
        }
    }

    pub fn unlock(file: &File) -> io::Result<()> {
        unsafe {
            let handle = file.as_raw_handle();
            let mut overlapped: OVERLAPPED = zeroed();
            let res = UnlockFileEx(handle as isize, 0, u32::MAX, u32::MAX, &mut overlapped);
            if res != 0 {
                Ok(())
            } else {
                Err(io::Error::last_os_error())
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs::OpenOptions;
    use std::path::Path;
    use std::sync::atomic::{AtomicBool, Ordering};
    use std::thread;
    use tempfile::tempdir;

    fn open(path: &Path) -> Arc<File> {
        Arc::new(
            OpenOptions::new()
                .read(true)
                .write(true)
                .create(true)
                .truncate(false)
                .open(path)
                .unwrap(),
        )
    }

    #[test]
    fn acquire_is_idempotent() -> Result<()> {
        let dir = tempdir().unwrap();
        let mut lock = FileLock::new(open(&dir.path().join("a.lock")), None);
        assert!(lock.acquire()?);
        assert!(!lock.acquire()?, "second acquire is a no-op");
        assert!(lock.is_held());
        assert!(lock.release()?);
        assert!(!lock.release()?);
        Ok(())
    }

    #[test]
    fn second_handle_times_out_while_held() -> Result<()> {
        let dir = tempdir().unwrap();
        let path = dir.path().join("b.lock");
        let mut first = FileLock::new(open(&path), None);
        first.acquire()?;

        let mut second = FileLock::new(open(&path), Some(Duration::from_millis(30)));
        let err = second.acquire().unwrap_err();
        assert!(matches!(err, RedwoodError::LockUnavailable(_)));

        first.release()?;
        assert!(second.acquire()?);
        Ok(())
    }

    #[test]
    fn blocked_writer_proceeds_after_drop() -> Result<()> {
        let dir = tempdir().unwrap();
        let path = dir.path().join("c.lock");
        let mut holder = FileLock::new(open(&path), None);
        holder.acquire()?;

        let flag = Arc::new(AtomicBool::new(false));
        let waiter_flag = Arc::clone(&flag);
        let waiter_file = open(&path);
        let handle = thread::spawn(move || {
            let mut lock = FileLock::new(waiter_file, None);
            lock.acquire().expect("lock after release");
            waiter_flag.store(true, Ordering::SeqCst);
        });
        thread::sleep(Duration::from_millis(50));
        assert!(!flag.load(Ordering::SeqCst), "waiter blocks while held");
        drop(holder);
        handle.join().unwrap();
        assert!(flag.load(Ordering::SeqCst));
        Ok(())
    }
}
