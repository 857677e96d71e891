//! Expiring local cache for unsaved working copies.
//!
//! One JSON record per draft key, written on every edit so a reload (or
//! a new editor process) can restore unsaved work. A record carries its
//! creation and expiry timestamps; anything past expiry is treated as
//! nonexistent and purged on the next read. Cache I/O is a recovery aid,
//! never a correctness requirement: corrupt or unwritable records degrade
//! to "no draft" with a warning.

use std::fs;
use std::io::{self, Write};
use std::path::{Path, PathBuf};

use chrono::{DateTime, Duration, Utc};
use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::document::Document;

/// Fixed time-to-live for drafts: 24 hours from creation.
#[must_use]
pub fn draft_ttl() -> Duration {
    Duration::hours(24)
}

/// Errors from draft persistence. Callers treat these as non-fatal.
#[derive(Debug, Error)]
pub enum DraftError {
    /// Filesystem failure while reading or writing a record.
    #[error("draft cache I/O error: {context}: {source}")]
    Io {
        /// What was being attempted.
        context: String,
        /// Underlying I/O error.
        source: io::Error,
    },

    /// A record could not be serialized.
    #[error("failed to serialize draft record: {0}")]
    Serialize(#[from] serde_json::Error),
}

impl DraftError {
    fn io(context: impl Into<String>, source: io::Error) -> Self {
        Self::Io {
            context: context.into(),
            source,
        }
    }
}

/// A cached snapshot of an unsaved working copy.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DraftRecord {
    /// The working copy at the moment of the last edit.
    pub data: Document,
    /// When the draft was first created.
    pub created_at: DateTime<Utc>,
    /// When the draft stops being restorable.
    pub expires_at: DateTime<Utc>,
}

impl DraftRecord {
    /// Whether the record is past its expiry at the given instant.
    #[must_use]
    pub fn is_expired_at(&self, now: DateTime<Utc>) -> bool {
        now > self.expires_at
    }
}

/// File-backed key-value cache of [`DraftRecord`]s, one JSON file per key.
#[derive(Debug, Clone)]
pub struct DraftCache {
    dir: PathBuf,
}

impl DraftCache {
    /// Creates a cache rooted at the given directory. The directory is
    /// created lazily on first write.
    #[must_use]
    pub fn new(dir: impl Into<PathBuf>) -> Self {
        Self { dir: dir.into() }
    }

    pub(crate) fn record_path(&self, key: &str) -> PathBuf {
        self.dir.join(format!("{key}.json"))
    }

    /// Persists a working copy under the key, stamped now with the fixed
    /// 24-hour TTL. Written via temp file + rename so a crashed editor
    /// never leaves a truncated record.
    ///
    /// # Errors
    ///
    /// Returns [`DraftError`] on serialization or filesystem failure.
    pub fn store(&self, key: &str, document: &Document) -> Result<(), DraftError> {
        let created_at = Utc::now();
        let record = DraftRecord {
            data: document.clone(),
            created_at,
            expires_at: created_at + draft_ttl(),
        };
        self.store_record(key, &record)
    }

    pub(crate) fn store_record(&self, key: &str, record: &DraftRecord) -> Result<(), DraftError> {
        fs::create_dir_all(&self.dir)
            .map_err(|err| DraftError::io(format!("creating {}", self.dir.display()), err))?;
        let payload = serde_json::to_vec_pretty(record)?;
        let path = self.record_path(key);
        let mut temp = tempfile::NamedTempFile::new_in(&self.dir)
            .map_err(|err| DraftError::io("creating draft temp file", err))?;
        temp.write_all(&payload)
            .map_err(|err| DraftError::io("writing draft temp file", err))?;
        temp.as_file()
            .sync_all()
            .map_err(|err| DraftError::io("syncing draft temp file", err))?;
        temp.persist(&path)
            .map_err(|err| DraftError::io(format!("persisting {}", path.display()), err.error))?;
        Ok(())
    }

    /// Returns the non-expired draft under the key, if any.
    ///
    /// An expired record is purged and reported as absent. A missing,
    /// unreadable, or corrupt record is also reported as absent — with a
    /// warning for the latter two, since the draft is best-effort state.
    #[must_use]
    pub fn load(&self, key: &str) -> Option<DraftRecord> {
        let path = self.record_path(key);
        let content = match fs::read(&path) {
            Ok(bytes) => bytes,
            Err(err) if err.kind() == io::ErrorKind::NotFound => return None,
            Err(err) => {
                tracing::warn!(path = %path.display(), error = %err, "failed to read draft record");
                return None;
            },
        };
        let record = match serde_json::from_slice::<DraftRecord>(&content) {
            Ok(record) => record,
            Err(err) => {
                tracing::warn!(path = %path.display(), error = %err, "discarding corrupt draft record");
                remove_quietly(&path);
                return None;
            },
        };
        if record.is_expired_at(Utc::now()) {
            tracing::debug!(path = %path.display(), "purging expired draft");
            remove_quietly(&path);
            return None;
        }
        Some(record)
    }

    /// Deletes the record under the key, if present.
    pub fn clear(&self, key: &str) {
        remove_quietly(&self.record_path(key));
    }

    /// Whether a record file exists under the key (expired or not).
    #[must_use]
    pub fn contains(&self, key: &str) -> bool {
        self.record_path(key).exists()
    }
}

fn remove_quietly(path: &Path) {
    if let Err(err) = fs::remove_file(path) {
        if err.kind() != io::ErrorKind::NotFound {
            tracing::warn!(path = %path.display(), error = %err, "failed to remove draft record");
        }
    }
}
