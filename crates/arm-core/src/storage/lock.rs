//! Cross-process advisory file locks.
//!
//! One lock file per registry under `storage/.locks/`. `flock` locks belong
//! to the open file description, so two handles in the same process also
//! exclude each other. The lock is released when the guard drops.

use std::fs::{File, OpenOptions};
use std::io;
use std::path::{Path, PathBuf};
use std::time::Duration;

use tracing::debug;

use crate::context::OpContext;
use crate::error::Result;

const POLL_INTERVAL: Duration = Duration::from_millis(50);

/// Held advisory lock. Dropping it unlocks.
#[derive(Debug)]
pub struct FileLock {
    file: File,
    path: PathBuf,
}

impl FileLock {
    /// Acquire an exclusive lock on `path`, creating it if needed.
    ///
    /// Polls until the lock is free, the context is cancelled, or its
    /// deadline passes.
    pub async fn acquire(path: &Path, ctx: &OpContext) -> Result<Self> {
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)?;
        }
        let file = OpenOptions::new()
            .create(true)
            .read(true)
            .write(true)
            .truncate(false)
            .open(path)?;

        let mut waited = false;
        loop {
            ctx.check()?;
            if try_lock_exclusive(&file)? {
                debug!(path = %path.display(), "acquired lock");
                return Ok(Self {
                    file,
                    path: path.to_path_buf(),
                });
            }
            if !waited {
                debug!(path = %path.display(), "waiting for lock");
                waited = true;
            }
            ctx.sleep(POLL_INTERVAL).await?;
        }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }
}

impl Drop for FileLock {
    fn drop(&mut self) {
        unlock(&self.file);
        debug!(path = %self.path.display(), "released lock");
    }
}

#[cfg(unix)]
#[allow(unsafe_code)]
fn try_lock_exclusive(file: &File) -> io::Result<bool> {
    use std::os::unix::io::AsRawFd;

    // SAFETY: the descriptor is owned by `file` and valid for this call.
    let rc = unsafe { libc::flock(file.as_raw_fd(), libc::LOCK_EX | libc::LOCK_NB) };
    if rc == 0 {
        return Ok(true);
    }
    let err = io::Error::last_os_error();
    if err.raw_os_error() == Some(libc::EWOULDBLOCK) {
        Ok(false)
    } else {
        Err(err)
    }
}

#[cfg(unix)]
#[allow(unsafe_code)]
fn unlock(file: &File) {
    use std::os::unix::io::AsRawFd;

    // SAFETY: see above. Errors are ignored; closing the file unlocks too.
    unsafe {
        libc::flock(file.as_raw_fd(), libc::LOCK_UN);
    }
}

// No advisory locking off unix; single-process use only.
#[cfg(not(unix))]
fn try_lock_exclusive(_file: &File) -> io::Result<bool> {
    Ok(true)
}

#[cfg(not(unix))]
fn unlock(_file: &File) {}

#[cfg(all(test, unix))]
mod tests {
    use super::*;
    use crate::error::ArmError;

    #[tokio::test]
    async fn second_acquire_waits_until_release() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("locks/r.lock");
        let ctx = OpContext::new();

        let first = FileLock::acquire(&path, &ctx).await.unwrap();

        let short = ctx.with_timeout(Duration::from_millis(150));
        let blocked = FileLock::acquire(&path, &short).await;
        assert!(matches!(blocked, Err(ArmError::Timeout)));

        drop(first);
        let again = FileLock::acquire(&path, &ctx).await;
        assert!(again.is_ok());
    }

    #[tokio::test]
    async fn cancelled_while_waiting() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("r.lock");
        let ctx = OpContext::new();
        let _held = FileLock::acquire(&path, &ctx).await.unwrap();

        let waiter_ctx = OpContext::new();
        let canceller = waiter_ctx.clone();
        tokio::spawn(async move {
            tokio::time::sleep(Duration::from_millis(60)).await;
            canceller.cancel();
        });
        let res = FileLock::acquire(&path, &waiter_ctx).await;
        assert!(matches!(res, Err(ArmError::Cancelled)));
    }
}
