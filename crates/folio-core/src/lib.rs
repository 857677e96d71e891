//! Configuration synchronization core for the folio site editor.
//!
//! The site's settings live in a single YAML document on disk. Two parties
//! share it: the local persistence daemon, which owns the file, and the
//! editor, which accumulates unsaved edits in memory. This crate provides
//! both halves of that arrangement:
//!
//! - [`store::ConfigStore`] — the atomic on-disk store. Section-level
//!   writes are serialized across processes via an advisory file lock,
//!   preceded by a best-effort backup, and committed with a
//!   temp-file-then-rename so a crash mid-write never leaves a partial
//!   document.
//! - [`sync::Synchronizer`] — the editor-side state machine. It tracks a
//!   baseline (last durably-saved copy) against a working copy, derives a
//!   dirty flag from structural comparison, persists the working copy to
//!   an expiring draft cache so reloads don't lose edits, and notifies
//!   observers on lifecycle transitions.
//!
//! The two halves meet at the [`sync::transport`] boundary: a small
//! request/response contract the daemon serves over HTTP and the editor
//! consumes through [`sync::transport::DocumentTransport`].

pub mod document;
pub mod store;
pub mod sync;

pub use document::{Document, DocumentError};
pub use store::{ConfigStore, StoreError};
pub use sync::{SyncError, Synchronizer};
