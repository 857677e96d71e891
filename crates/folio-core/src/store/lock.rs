//! Advisory exclusive locking for the document's backing file.
//!
//! The lock is an OS-level flock on a sibling `<document>.lock` file, so
//! it serializes writers across independent processes, not just threads.
//! Acquisition tries non-blocking first, then polls with jitter up to a
//! bounded timeout. The guard releases on drop on every exit path, and
//! the OS releases the flock on process exit, which is what makes a
//! crashed writer harmless.
//!
//! The lock only protects against other processes using this same
//! primitive; an external process writing the document without taking the
//! lock still races.

use std::fs::{File, OpenOptions};
use std::io;
use std::path::{Path, PathBuf};
use std::time::{Duration, Instant};

use fs2::FileExt;

use super::StoreError;

/// Poll interval while waiting for a contended lock.
pub const LOCK_POLL_INTERVAL: Duration = Duration::from_millis(100);

/// Maximum jitter added to each poll sleep (milliseconds).
pub const LOCK_POLL_JITTER_MS: u64 = 50;

/// Default bound on how long a writer waits for the lock.
pub const DEFAULT_LOCK_TIMEOUT: Duration = Duration::from_millis(5000);

/// Suffix appended to the document path to form the lock file path.
pub const LOCK_SUFFIX: &str = "lock";

/// RAII guard over the document lock. Dropping it releases the flock.
#[derive(Debug)]
pub struct DocumentLockGuard {
    // Held only for the flock; closing the file releases it.
    _lock_file: File,
}

/// Lock file path for a document: `site.yaml` locks via `site.yaml.lock`.
///
/// The lock lives on a sibling file rather than the document itself
/// because commits rename a temp file over the document, which would swap
/// the locked inode out from under the guard.
#[must_use]
pub fn lock_path_for(document: &Path) -> PathBuf {
    let mut name = document
        .file_name()
        .map(|name| name.to_os_string())
        .unwrap_or_default();
    name.push(".");
    name.push(LOCK_SUFFIX);
    document.with_file_name(name)
}

fn try_flock_exclusive(file: &File) -> io::Result<bool> {
    match FileExt::try_lock_exclusive(file) {
        Ok(()) => Ok(true),
        Err(err) if err.kind() == io::ErrorKind::WouldBlock => Ok(false),
        Err(err) => Err(err),
    }
}

/// Attempts to take the document lock without blocking.
///
/// Returns `Ok(None)` when another holder has it.
///
/// # Errors
///
/// Returns [`StoreError::WriteFailed`] if the lock file cannot be opened
/// or the flock call itself fails.
pub fn try_acquire(document: &Path) -> Result<Option<DocumentLockGuard>, StoreError> {
    let lock_path = lock_path_for(document);
    let lock_file = OpenOptions::new()
        .create(true)
        .read(true)
        .write(true)
        .truncate(false)
        .open(&lock_path)
        .map_err(|err| StoreError::write_failed(
            format!("opening lock file {}", lock_path.display()),
            err,
        ))?;
    match try_flock_exclusive(&lock_file) {
        Ok(true) => Ok(Some(DocumentLockGuard {
            _lock_file: lock_file,
        })),
        Ok(false) => Ok(None),
        Err(err) => Err(StoreError::write_failed(
            format!("locking {}", lock_path.display()),
            err,
        )),
    }
}

/// Takes the document lock, polling with jitter until success or the
/// bounded timeout elapses.
///
/// # Errors
///
/// Returns [`StoreError::LockTimeout`] if the lock is still held by
/// another writer when the timeout elapses.
pub fn acquire(document: &Path, timeout: Duration) -> Result<DocumentLockGuard, StoreError> {
    let start = Instant::now();
    loop {
        if let Some(guard) = try_acquire(document)? {
            tracing::debug!(
                document = %document.display(),
                waited_ms = start.elapsed().as_millis() as u64,
                "acquired document lock"
            );
            return Ok(guard);
        }
        let elapsed = start.elapsed();
        if elapsed >= timeout {
            return Err(StoreError::LockTimeout {
                path: document.to_path_buf(),
                elapsed_ms: elapsed.as_millis() as u64,
            });
        }
        let jitter_ms = rand::random::<u64>() % (LOCK_POLL_JITTER_MS + 1);
        std::thread::sleep(LOCK_POLL_INTERVAL + Duration::from_millis(jitter_ms));
    }
}
