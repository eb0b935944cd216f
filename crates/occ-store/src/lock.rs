//! Advisory lock on a file shared by every handle and process.

use std::fs::{File, OpenOptions};
use std::path::Path;

use crate::error::StoreError;

/// Held `flock` on a lock file. Released on drop.
///
/// `flock` locks belong to the open file, so two handles in one process
/// exclude each other just like two processes do.
#[derive(Debug)]
pub(crate) struct FileLock {
    file: File,
}

impl FileLock {
    /// Block until the exclusive lock on `path` is held.
    pub(crate) fn exclusive(path: &Path) -> Result<Self, StoreError> {
        Self::acquire(path, true)
    }

    /// Block until a shared lock on `path` is held.
    pub(crate) fn shared(path: &Path) -> Result<Self, StoreError> {
        Self::acquire(path, false)
    }

    fn acquire(path: &Path, exclusive: bool) -> Result<Self, StoreError> {
        let file = OpenOptions::new()
            .create(true)
            .read(true)
            .write(true)
            .truncate(false)
            .open(path)
            .map_err(|e| StoreError::io(path, e))?;

        lock(&file, exclusive).map_err(|e| StoreError::io(path, e))?;
        Ok(Self { file })
    }
}

impl Drop for FileLock {
    fn drop(&mut self) {
        unlock(&self.file);
    }
}

#[cfg(unix)]
fn lock(file: &File, exclusive: bool) -> std::io::Result<()> {
    use std::os::unix::io::AsRawFd;

    let op = if exclusive {
        libc::LOCK_EX
    } else {
        libc::LOCK_SH
    };
    loop {
        // SAFETY: the descriptor is owned by `file` and stays open for the call.
        if unsafe { libc::flock(file.as_raw_fd(), op) } == 0 {
            return Ok(());
        }
        let err = std::io::Error::last_os_error();
        if err.kind() != std::io::ErrorKind::Interrupted {
            return Err(err);
        }
    }
}

#[cfg(unix)]
fn unlock(file: &File) {
    use std::os::unix::io::AsRawFd;

    // SAFETY: the descriptor is owned by `file`; closing it would release the lock anyway.
    unsafe {
        libc::flock(file.as_raw_fd(), libc::LOCK_UN);
    }
}

// No advisory locking off unix; the version check still rejects stale writers
// within one handle.
#[cfg(not(unix))]
fn lock(_file: &File, _exclusive: bool) -> std::io::Result<()> {
    Ok(())
}

#[cfg(not(unix))]
fn unlock(_file: &File) {}
