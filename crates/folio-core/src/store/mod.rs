//! Atomic on-disk store for the site configuration document.
//!
//! The store owns a single YAML file holding the whole document. Reads are
//! lock-free. Writes are section-level read-modify-write transactions:
//!
//! 1. fail `NotFound` if the backing file is absent;
//! 2. copy the current file to `<document>.bak` (best effort);
//! 3. take the exclusive flock, non-blocking first, then a bounded wait;
//! 4. re-read and re-parse the on-disk document under the lock — never a
//!    cached copy, so changes by other writers since this caller last
//!    read are preserved;
//! 5. replace the named section wholesale and normalize mapping keys;
//! 6. serialize to a temp file in the same directory, fsync, and rename
//!    it over the document, still under the lock.
//!
//! The rename commit means a crash mid-write can never leave a partial or
//! zero-length document. The lock guard releases on every exit path. The
//! store never retries internally; all four failure modes are surfaced as
//! distinct [`StoreError`] variants and retry policy belongs to the
//! caller.

pub mod lock;

use std::fs;
use std::io::{self, Write};
use std::path::{Path, PathBuf};
use std::time::Duration;

use serde_yaml::Value;
use thiserror::Error;

use crate::document::{Document, DocumentError};

pub use lock::{DEFAULT_LOCK_TIMEOUT, DocumentLockGuard};

/// Suffix appended to the document path to form the backup path.
pub const BACKUP_SUFFIX: &str = "bak";

/// Errors surfaced by [`ConfigStore`] operations.
#[derive(Debug, Error)]
#[non_exhaustive]
pub enum StoreError {
    /// The backing file does not exist. Fatal to the call, never retried.
    #[error("document not found at {}", .path.display())]
    NotFound {
        /// Expected location of the backing file.
        path: PathBuf,
    },

    /// Another writer held the lock past the bounded wait. The caller may
    /// retry with backoff.
    #[error("timed out waiting for document lock on {} after {elapsed_ms}ms", .path.display())]
    LockTimeout {
        /// Document whose lock could not be taken.
        path: PathBuf,
        /// How long this writer waited.
        elapsed_ms: u64,
    },

    /// The on-disk content could not be parsed or re-serialized. Not
    /// auto-repaired; a human should inspect the backup.
    #[error("document at {} is unreadable: {detail}", .path.display())]
    Serialization {
        /// Backing file with the unparsable content.
        path: PathBuf,
        /// Parser detail.
        detail: String,
    },

    /// Any other I/O failure along the write path.
    #[error("write failed: {context}: {source}")]
    WriteFailed {
        /// What was being attempted.
        context: String,
        /// Underlying I/O error.
        source: io::Error,
    },
}

impl StoreError {
    pub(crate) fn write_failed(context: impl Into<String>, source: io::Error) -> Self {
        Self::WriteFailed {
            context: context.into(),
            source,
        }
    }
}

/// The atomic document store.
///
/// Cheap to construct; holds no open handles between calls. Every write
/// takes the cross-process lock for its whole critical section, so at
/// most one writer mutates the backing file at a time across the host.
#[derive(Debug, Clone)]
pub struct ConfigStore {
    document_path: PathBuf,
    lock_timeout: Duration,
}

impl ConfigStore {
    /// Creates a store over the given backing file with the default
    /// 5-second lock timeout.
    #[must_use]
    pub fn new(document_path: impl Into<PathBuf>) -> Self {
        Self::with_lock_timeout(document_path, DEFAULT_LOCK_TIMEOUT)
    }

    /// Creates a store with an explicit lock timeout.
    #[must_use]
    pub fn with_lock_timeout(document_path: impl Into<PathBuf>, lock_timeout: Duration) -> Self {
        Self {
            document_path: document_path.into(),
            lock_timeout,
        }
    }

    /// Path of the backing file.
    #[must_use]
    pub fn document_path(&self) -> &Path {
        &self.document_path
    }

    /// Path of the rolling backup (`<document>.bak`), overwritten on
    /// every write attempt.
    #[must_use]
    pub fn backup_path(&self) -> PathBuf {
        let mut name = self
            .document_path
            .file_name()
            .map(|name| name.to_os_string())
            .unwrap_or_default();
        name.push(".");
        name.push(BACKUP_SUFFIX);
        self.document_path.with_file_name(name)
    }

    /// Returns the current on-disk document.
    ///
    /// Reads do not take the lock: with rename commits a reader sees
    /// either the previous or the new document, never a partial one.
    ///
    /// # Errors
    ///
    /// [`StoreError::NotFound`] if the backing file is absent,
    /// [`StoreError::Serialization`] if its content is not valid YAML.
    pub fn read(&self) -> Result<Document, StoreError> {
        let content = match fs::read_to_string(&self.document_path) {
            Ok(content) => content,
            Err(err) if err.kind() == io::ErrorKind::NotFound => {
                return Err(StoreError::NotFound {
                    path: self.document_path.clone(),
                });
            },
            Err(err) => {
                return Err(StoreError::write_failed(
                    format!("reading {}", self.document_path.display()),
                    err,
                ));
            },
        };
        self.parse(&content)
    }

    /// Applies one section-level replacement and persists the document.
    ///
    /// The section's new value is opaque to the store and merged in
    /// wholesale; there is no partial merging inside a section.
    ///
    /// # Errors
    ///
    /// [`StoreError::NotFound`] if the backing file is absent,
    /// [`StoreError::LockTimeout`] on lock contention past the bound,
    /// [`StoreError::Serialization`] if the on-disk content cannot be
    /// parsed under the lock, [`StoreError::WriteFailed`] for any other
    /// I/O failure. The lock is released in every case.
    pub fn write(&self, section: &str, value: Value) -> Result<(), StoreError> {
        if !self.document_path.exists() {
            return Err(StoreError::NotFound {
                path: self.document_path.clone(),
            });
        }

        self.write_backup();

        // Guard drop releases the flock on every path below.
        let _guard = lock::acquire(&self.document_path, self.lock_timeout)?;

        let content = match fs::read_to_string(&self.document_path) {
            Ok(content) => content,
            // The file can disappear between the pre-lock existence check
            // and here; that is still a missing document, not an I/O fault.
            Err(err) if err.kind() == io::ErrorKind::NotFound => {
                return Err(StoreError::NotFound {
                    path: self.document_path.clone(),
                });
            },
            Err(err) => {
                return Err(StoreError::write_failed(
                    format!("re-reading {} under lock", self.document_path.display()),
                    err,
                ));
            },
        };
        let mut document = self.parse(&content)?;
        document.set_section(section, value);
        document.normalize_keys();

        let serialized = document.to_yaml_string().map_err(|err| {
            StoreError::Serialization {
                path: self.document_path.clone(),
                detail: err.to_string(),
            }
        })?;
        self.persist(serialized.as_bytes())?;

        tracing::debug!(
            document = %self.document_path.display(),
            section,
            "committed section update"
        );
        Ok(())
    }

    /// Best-effort pre-write backup. A failure is logged and the write
    /// proceeds: the backup is a recovery aid, not a correctness
    /// requirement.
    fn write_backup(&self) {
        let backup_path = self.backup_path();
        if let Err(err) = fs::copy(&self.document_path, &backup_path) {
            tracing::warn!(
                document = %self.document_path.display(),
                backup = %backup_path.display(),
                error = %err,
                "failed to write backup before document update"
            );
        }
    }

    /// Commits serialized content via temp-file-in-same-dir + fsync +
    /// rename, so the backing file is replaced atomically.
    fn persist(&self, serialized: &[u8]) -> Result<(), StoreError> {
        let parent = self.document_path.parent().ok_or_else(|| {
            StoreError::write_failed(
                format!("document path has no parent: {}", self.document_path.display()),
                io::Error::from(io::ErrorKind::InvalidInput),
            )
        })?;
        let mut temp = tempfile::NamedTempFile::new_in(parent)
            .map_err(|err| StoreError::write_failed("creating document temp file", err))?;
        temp.write_all(serialized)
            .map_err(|err| StoreError::write_failed("writing document temp file", err))?;
        temp.as_file()
            .sync_all()
            .map_err(|err| StoreError::write_failed("syncing document temp file", err))?;
        temp.persist(&self.document_path).map_err(|err| {
            StoreError::write_failed(
                format!("persisting {}", self.document_path.display()),
                err.error,
            )
        })?;
        Ok(())
    }

    fn parse(&self, content: &str) -> Result<Document, StoreError> {
        Document::from_yaml_str(content).map_err(|err| {
            let (DocumentError::Parse(detail) | DocumentError::Serialize(detail)) = err;
            StoreError::Serialization {
                path: self.document_path.clone(),
                detail,
            }
        })
    }
}
