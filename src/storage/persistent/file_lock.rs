//! Exclusive lock on a store directory.
//!
//! Only one [`PersistentMeasurementStore`](super::PersistentMeasurementStore)
//! may have a directory open at a time. The lock is advisory (`flock` on
//! unix, `LockFileEx` on windows) and is released when the handle is dropped.

use std::fs::{File, OpenOptions};
use std::io::{Error as IoError, ErrorKind, Result as IoResult};
use std::path::{Path, PathBuf};

/// Name of the lock file inside the store directory.
pub const LOCK_FILE: &str = "mooclet.lock";

/// Held exclusive lock on a store directory.
#[derive(Debug)]
pub struct DirectoryLock {
    _file: File,
    path: PathBuf,
}

impl DirectoryLock {
    /// Attempts to lock `dir` without blocking.
    ///
    /// # Errors
    /// `ErrorKind::WouldBlock` if another handle holds the lock.
    pub fn acquire(dir: &Path) -> IoResult<Self> {
        let path = dir.join(LOCK_FILE);
        let file = OpenOptions::new()
            .write(true)
            .create(true)
            .truncate(false)
            .open(&path)?;
        try_lock(&file)?;
        Ok(Self { _file: file, path })
    }

    #[must_use]
    pub fn path(&self) -> &Path {
        &self.path
    }
}

fn held_elsewhere() -> IoError {
    IoError::new(
        ErrorKind::WouldBlock,
        "measurement store is locked by another process",
    )
}

#[cfg(unix)]
fn try_lock(file: &File) -> IoResult<()> {
    use std::os::unix::io::AsRawFd;

    // SAFETY: the descriptor is owned by `file` and stays open for the call.
    let rc = unsafe { libc::flock(file.as_raw_fd(), libc::LOCK_EX | libc::LOCK_NB) };
    if rc == 0 {
        return Ok(());
    }
    let err = IoError::last_os_error();
    if err.raw_os_error() == Some(libc::EWOULDBLOCK) {
        Err(held_elsewhere())
    } else {
        Err(err)
    }
}

#[cfg(windows)]
fn try_lock(file: &File) -> IoResult<()> {
    use std::os::windows::io::AsRawHandle;
    use windows_sys::Win32::Foundation::HANDLE;
    use windows_sys::Win32::Storage::FileSystem::{
        LockFileEx, LOCKFILE_EXCLUSIVE_LOCK, LOCKFILE_FAIL_IMMEDIATELY,
    };
    use windows_sys::Win32::System::IO::OVERLAPPED;

    // SAFETY: the handle is owned by `file`; OVERLAPPED is plain data.
    let rc = unsafe {
        let mut overlapped = std::mem::zeroed::<OVERLAPPED>();
        LockFileEx(
            file.as_raw_handle() as HANDLE,
            LOCKFILE_EXCLUSIVE_LOCK | LOCKFILE_FAIL_IMMEDIATELY,
            0,
            1,
            0,
            &mut overlapped,
        )
    };
    if rc == 0 {
        Err(held_elsewhere())
    } else {
        Ok(())
    }
}

#[cfg(not(any(unix, windows)))]
fn try_lock(_file: &File) -> IoResult<()> {
    Err(IoError::new(
        ErrorKind::Unsupported,
        "directory locking is not supported on this platform",
    ))
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::tempdir;

    #[test]
    fn second_handle_is_refused() {
        let dir = tempdir().unwrap();
        let first = DirectoryLock::acquire(dir.path()).unwrap();
        assert!(first.path().ends_with(LOCK_FILE));

        let err = DirectoryLock::acquire(dir.path()).unwrap_err();
        assert_eq!(err.kind(), ErrorKind::WouldBlock);
    }

    #[test]
    fn lock_is_released_on_drop() {
        let dir = tempdir().unwrap();
        drop(DirectoryLock::acquire(dir.path()).unwrap());
        assert!(DirectoryLock::acquire(dir.path()).is_ok());
    }
}
