//! Editor-side configuration synchronizer.
//!
//! The synchronizer owns two copies of the site document: the baseline
//! (last known durably-saved state, replaced only on load and after a
//! successful save) and the working copy the editor mutates. The dirty
//! flag is derived, never stored authority: it is recomputed as a
//! structural comparison after every edit, so editing a field away from
//! and back to its baseline value flips it back off.
//!
//! Every edit also snapshots the working copy into the expiring
//! [`DraftCache`], which is what lets unsaved work survive an editor
//! restart. A failed save deliberately leaves the draft in place — losing
//! unsaved edits is the worst failure mode this component exists to
//! prevent.
//!
//! All operations take `&mut self`; the owning host serializes them. The
//! only operations that can block are `load` and `save`, which cross the
//! transport boundary.

pub mod draft;
pub mod events;
pub mod transport;

use serde_yaml::Value;
use thiserror::Error;

use crate::document::Document;

pub use draft::{DraftCache, DraftRecord};
pub use events::{SyncEvent, SyncObserver};
pub use transport::{DocumentTransport, TransportError};

/// Errors surfaced by synchronizer operations.
#[derive(Debug, Error)]
pub enum SyncError {
    /// The initial fetch failed; no baseline or working copy exists and
    /// the editing UI must stay blocked.
    #[error("failed to load document: {0}")]
    Load(#[source] TransportError),

    /// A save round-trip failed; the working copy, dirty flag, and draft
    /// are all preserved for retry.
    #[error("failed to save document: {0}")]
    Save(#[source] TransportError),

    /// An operation ran before a successful `load`.
    #[error("no document loaded")]
    NotLoaded,
}

/// Baseline/working-copy pair with the derived dirty flag.
#[derive(Debug, Clone)]
struct SyncState {
    baseline: Document,
    working: Document,
    dirty: bool,
}

/// The client configuration synchronizer.
///
/// One instance per editor session; construction and teardown follow the
/// session's lifecycle, and independent instances never share state.
pub struct Synchronizer {
    transport: Box<dyn DocumentTransport>,
    drafts: DraftCache,
    draft_key: String,
    observers: events::ObserverSet,
    state: Option<SyncState>,
}

impl Synchronizer {
    /// Creates a synchronizer over a transport and a draft cache. The
    /// draft key names this document's slot in the cache.
    #[must_use]
    pub fn new(
        transport: Box<dyn DocumentTransport>,
        drafts: DraftCache,
        draft_key: impl Into<String>,
    ) -> Self {
        Self {
            transport,
            drafts,
            draft_key: draft_key.into(),
            observers: events::ObserverSet::default(),
            state: None,
        }
    }

    /// Registers an observer for lifecycle events.
    pub fn subscribe(&mut self, observer: Box<dyn SyncObserver>) {
        self.observers.subscribe(observer);
    }

    /// Whether a document has been loaded.
    #[must_use]
    pub fn is_loaded(&self) -> bool {
        self.state.is_some()
    }

    /// Whether the working copy structurally differs from the baseline.
    #[must_use]
    pub fn is_dirty(&self) -> bool {
        self.state.as_ref().is_some_and(|state| state.dirty)
    }

    /// The live working copy, if loaded.
    #[must_use]
    pub fn working(&self) -> Option<&Document> {
        self.state.as_ref().map(|state| &state.working)
    }

    /// The last durably-saved copy, if loaded.
    #[must_use]
    pub fn baseline(&self) -> Option<&Document> {
        self.state.as_ref().map(|state| &state.baseline)
    }

    /// Names of top-level sections whose working value differs from the
    /// baseline.
    #[must_use]
    pub fn dirty_sections(&self) -> Vec<String> {
        let Some(state) = &self.state else {
            return Vec::new();
        };
        state
            .working
            .sections()
            .filter(|(name, value)| state.baseline.section(name) != Some(value))
            .map(|(name, _)| name.to_string())
            .collect()
    }

    /// Fetches the document and establishes baseline and working copy.
    ///
    /// If a non-expired draft exists, the working copy is restored from
    /// it and the dirty flag recomputed against the freshly fetched
    /// baseline — the draft may or may not actually differ. Otherwise the
    /// working copy is a structural copy of the baseline and the flag
    /// starts false. Emits [`SyncEvent::Loaded`] carrying the resulting
    /// working copy, plus a [`SyncEvent::DirtyChanged`] flip when a
    /// restored draft differs.
    ///
    /// # Errors
    ///
    /// Returns [`SyncError::Load`] on transport failure; no state is set.
    pub fn load(&mut self) -> Result<(), SyncError> {
        let baseline = match self.transport.fetch() {
            Ok(document) => document,
            Err(err) => {
                self.observers.emit(&SyncEvent::LoadFailed {
                    detail: err.to_string(),
                });
                return Err(SyncError::Load(err));
            },
        };
        let (working, dirty) = match self.drafts.load(&self.draft_key) {
            Some(record) => {
                let dirty = record.data != baseline;
                (record.data, dirty)
            },
            None => (baseline.clone(), false),
        };
        self.state = Some(SyncState {
            baseline,
            working: working.clone(),
            dirty,
        });
        self.observers.emit(&SyncEvent::Loaded { working });
        if dirty {
            self.observers.emit(&SyncEvent::DirtyChanged(true));
        }
        Ok(())
    }

    /// Sets one field of the working copy by dot-separated path.
    ///
    /// Recomputes the dirty flag structurally against the whole baseline,
    /// persists the working copy as a draft, and emits
    /// [`SyncEvent::Changed`] always plus [`SyncEvent::DirtyChanged`]
    /// only when the flag flips. Draft persistence failure is a warning,
    /// not an error.
    ///
    /// # Errors
    ///
    /// Returns [`SyncError::NotLoaded`] before a successful `load`.
    pub fn update(&mut self, path: &str, value: Value) -> Result<(), SyncError> {
        let state = self.state.as_mut().ok_or(SyncError::NotLoaded)?;
        state.working.set_path(path, value);
        let was_dirty = state.dirty;
        state.dirty = state.working != state.baseline;

        if let Err(err) = self.drafts.store(&self.draft_key, &state.working) {
            tracing::warn!(key = %self.draft_key, error = %err, "failed to persist draft");
        }

        self.observers.emit(&SyncEvent::Changed {
            path: path.to_string(),
        });
        if state.dirty != was_dirty {
            self.observers.emit(&SyncEvent::DirtyChanged(state.dirty));
        }
        Ok(())
    }

    /// Commits the working copy through the transport.
    ///
    /// A clean working copy is a successful no-op. Otherwise every dirty
    /// top-level section is submitted; on success the working copy is
    /// promoted to the new baseline, the dirty flag clears, and the draft
    /// is deleted. On failure everything — working copy, baseline, dirty
    /// flag, draft — is left exactly as it was, so the unsaved edits stay
    /// recoverable.
    ///
    /// # Errors
    ///
    /// Returns [`SyncError::Save`] on the first failed section submit,
    /// [`SyncError::NotLoaded`] before a successful `load`.
    pub fn save(&mut self) -> Result<(), SyncError> {
        let state = self.state.as_mut().ok_or(SyncError::NotLoaded)?;
        if !state.dirty {
            return Ok(());
        }
        self.observers.emit(&SyncEvent::Saving);

        let pending: Vec<(String, Value)> = state
            .working
            .sections()
            .filter(|(name, value)| state.baseline.section(name) != Some(value))
            .map(|(name, value)| (name.to_string(), value.clone()))
            .collect();
        for (section, value) in &pending {
            if let Err(err) = self.transport.submit(section, value) {
                self.observers.emit(&SyncEvent::SaveFailed {
                    detail: err.to_string(),
                });
                return Err(SyncError::Save(err));
            }
        }

        state.baseline = state.working.clone();
        state.dirty = false;
        self.drafts.clear(&self.draft_key);
        self.observers.emit(&SyncEvent::Saved);
        self.observers.emit(&SyncEvent::DirtyChanged(false));
        Ok(())
    }

    /// Discards the working copy back to a structural copy of the
    /// baseline, clears the dirty flag, and deletes the draft.
    ///
    /// # Errors
    ///
    /// Returns [`SyncError::NotLoaded`] before a successful `load`.
    pub fn reset(&mut self) -> Result<(), SyncError> {
        let state = self.state.as_mut().ok_or(SyncError::NotLoaded)?;
        let was_dirty = state.dirty;
        state.working = state.baseline.clone();
        state.dirty = false;
        self.drafts.clear(&self.draft_key);
        self.observers.emit(&SyncEvent::Reset);
        if was_dirty {
            self.observers.emit(&SyncEvent::DirtyChanged(false));
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use std::cell::RefCell;
    use std::rc::Rc;

    use pretty_assertions::assert_eq;
    use proptest::prelude::*;
    use serde_yaml::Value;

    use super::draft::DraftCache;
    use super::events::testing::Recorder;
    use super::events::SyncEvent;
    use super::transport::{DocumentTransport, TransportError};
    use super::{SyncError, Synchronizer};
    use crate::document::Document;

    const DRAFT_KEY: &str = "site-config";

    /// In-memory transport standing in for the daemon.
    #[derive(Clone, Default)]
    struct FakeTransport {
        document: Rc<RefCell<Document>>,
        submissions: Rc<RefCell<Vec<(String, Value)>>>,
        fail_fetch: Rc<RefCell<bool>>,
        fail_submit: Rc<RefCell<bool>>,
        // When set, submits fail once this many have already succeeded.
        fail_submit_after: Rc<RefCell<Option<usize>>>,
    }

    impl FakeTransport {
        fn seeded(yaml: &str) -> Self {
            let transport = Self::default();
            *transport.document.borrow_mut() = Document::from_yaml_str(yaml).expect("seed yaml");
            transport
        }
    }

    impl DocumentTransport for FakeTransport {
        fn fetch(&self) -> Result<Document, TransportError> {
            if *self.fail_fetch.borrow() {
                return Err(TransportError::Http("connection refused".to_string()));
            }
            Ok(self.document.borrow().clone())
        }

        fn submit(&self, section: &str, value: &Value) -> Result<(), TransportError> {
            let committed = self.submissions.borrow().len();
            let tripped = (*self.fail_submit_after.borrow()).is_some_and(|after| committed >= after);
            if *self.fail_submit.borrow() || tripped {
                return Err(TransportError::Rejected {
                    detail: "lock timeout".to_string(),
                });
            }
            self.document.borrow_mut().set_section(section, value.clone());
            self.submissions
                .borrow_mut()
                .push((section.to_string(), value.clone()));
            Ok(())
        }
    }

    struct Fixture {
        sync: Synchronizer,
        transport: FakeTransport,
        events: Rc<RefCell<Vec<SyncEvent>>>,
        _temp: tempfile::TempDir,
    }

    fn fixture(yaml: &str) -> Fixture {
        let temp = tempfile::tempdir().expect("tempdir");
        let transport = FakeTransport::seeded(yaml);
        let mut sync = Synchronizer::new(
            Box::new(transport.clone()),
            DraftCache::new(temp.path().join("drafts")),
            DRAFT_KEY,
        );
        let events = Rc::new(RefCell::new(Vec::new()));
        sync.subscribe(Box::new(Recorder(Rc::clone(&events))));
        Fixture {
            sync,
            transport,
            events,
            _temp: temp,
        }
    }

    fn text(value: &str) -> Value {
        Value::String(value.to_string())
    }

    fn dirty_flips(events: &[SyncEvent]) -> Vec<bool> {
        events
            .iter()
            .filter_map(|event| match event {
                SyncEvent::DirtyChanged(dirty) => Some(*dirty),
                _ => None,
            })
            .collect()
    }

    #[test]
    fn test_load_without_draft_starts_clean() {
        let mut fx = fixture("theme:\n  mode: light\n");
        fx.sync.load().expect("load");
        assert!(fx.sync.is_loaded());
        assert!(!fx.sync.is_dirty());
        assert_eq!(fx.sync.working(), fx.sync.baseline());
        let events = fx.events.borrow();
        match events.as_slice() {
            [SyncEvent::Loaded { working }] => {
                assert_eq!(Some(working), fx.sync.working());
            },
            other => panic!("expected a single loaded event, got {other:?}"),
        }
    }

    #[test]
    fn test_failed_load_leaves_no_state() {
        let fx = fixture("theme:\n  mode: light\n");
        let mut sync = fx.sync;
        *fx.transport.fail_fetch.borrow_mut() = true;
        let error = sync.load().expect_err("load must fail");
        assert!(matches!(error, SyncError::Load(_)));
        assert!(!sync.is_loaded());
        assert!(matches!(
            fx.events.borrow().first(),
            Some(SyncEvent::LoadFailed { .. })
        ));
    }

    #[test]
    fn test_update_marks_dirty_and_persists_draft() {
        let mut fx = fixture("theme:\n  mode: light\n");
        fx.sync.load().expect("load");
        fx.sync.update("theme.mode", text("dark")).expect("update");
        assert!(fx.sync.is_dirty());
        assert_eq!(
            fx.sync.working().and_then(|doc| doc.get_path("theme.mode")),
            Some(&text("dark"))
        );
        // Baseline untouched by edits.
        assert_eq!(
            fx.sync.baseline().and_then(|doc| doc.get_path("theme.mode")),
            Some(&text("light"))
        );
        assert_eq!(dirty_flips(&fx.events.borrow()), vec![true]);
    }

    #[test]
    fn test_edit_back_to_original_clears_dirty() {
        let mut fx = fixture("theme:\n  mode: light\n  accent: '#ff6600'\n");
        fx.sync.load().expect("load");
        fx.sync.update("theme.mode", text("dark")).expect("edit away");
        fx.sync.update("theme.accent", text("#00ff00")).expect("second edit");
        fx.sync.update("theme.mode", text("light")).expect("restore first");
        assert!(fx.sync.is_dirty(), "one field still differs");
        fx.sync
            .update("theme.accent", text("#ff6600"))
            .expect("restore second");
        assert!(!fx.sync.is_dirty(), "all fields match baseline again");
        // Exactly one flip on, one flip off — no notification storm.
        assert_eq!(dirty_flips(&fx.events.borrow()), vec![true, false]);
    }

    #[test]
    fn test_save_promotes_working_to_baseline_and_clears_draft() {
        let temp = tempfile::tempdir().expect("tempdir");
        let cache = DraftCache::new(temp.path().join("drafts"));
        let transport = FakeTransport::seeded("theme:\n  mode: light\nhero:\n  title: Hello\n");
        let mut sync = Synchronizer::new(Box::new(transport.clone()), cache.clone(), DRAFT_KEY);
        sync.load().expect("load");
        sync.update("theme.mode", text("dark")).expect("update");
        assert!(cache.contains(DRAFT_KEY), "draft written on edit");

        let working_at_save = sync.working().cloned().expect("working copy");
        sync.save().expect("save");
        assert!(!sync.is_dirty());
        assert_eq!(sync.baseline(), Some(&working_at_save));
        assert!(!cache.contains(DRAFT_KEY), "draft cleared after save");
        // Only the dirty section crossed the wire.
        let submissions = transport.submissions.borrow();
        assert_eq!(submissions.len(), 1);
        assert_eq!(submissions[0].0, "theme");
    }

    #[test]
    fn test_save_when_clean_is_a_silent_no_op() {
        let mut fx = fixture("theme:\n  mode: light\n");
        fx.sync.load().expect("load");
        fx.sync.save().expect("save");
        assert!(fx.transport.submissions.borrow().is_empty());
        let events = fx.events.borrow();
        assert!(
            matches!(events.as_slice(), [SyncEvent::Loaded { .. }]),
            "clean save must emit nothing beyond the load, got {events:?}"
        );
    }

    #[test]
    fn test_failed_save_preserves_working_dirty_and_draft() {
        let temp = tempfile::tempdir().expect("tempdir");
        let cache = DraftCache::new(temp.path().join("drafts"));
        let transport = FakeTransport::seeded("theme:\n  mode: light\n");
        let mut sync = Synchronizer::new(Box::new(transport.clone()), cache.clone(), DRAFT_KEY);
        let events = Rc::new(RefCell::new(Vec::new()));
        sync.subscribe(Box::new(Recorder(Rc::clone(&events))));

        sync.load().expect("load");
        sync.update("theme.mode", text("dark")).expect("update");
        let working_before = sync.working().cloned().expect("working");
        let baseline_before = sync.baseline().cloned().expect("baseline");

        *transport.fail_submit.borrow_mut() = true;
        let error = sync.save().expect_err("save must fail");
        assert!(matches!(error, SyncError::Save(_)));
        assert!(sync.is_dirty(), "dirty flag must survive a failed save");
        assert_eq!(sync.working(), Some(&working_before));
        assert_eq!(sync.baseline(), Some(&baseline_before));
        let draft = cache.load(DRAFT_KEY).expect("draft must survive a failed save");
        assert_eq!(draft.data, working_before);
        assert!(
            events
                .borrow()
                .iter()
                .any(|event| matches!(event, SyncEvent::SaveFailed { .. })),
            "failure must be announced to observers"
        );
    }

    #[test]
    fn test_mid_save_failure_leaves_earlier_sections_committed_server_side() {
        let temp = tempfile::tempdir().expect("tempdir");
        let cache = DraftCache::new(temp.path().join("drafts"));
        let transport = FakeTransport::seeded("theme:\n  mode: light\nhero:\n  title: Hello\n");
        let mut sync = Synchronizer::new(Box::new(transport.clone()), cache.clone(), DRAFT_KEY);
        sync.load().expect("load");
        sync.update("theme.mode", text("dark")).expect("edit theme");
        sync.update("hero.title", text("Portfolio")).expect("edit hero");

        // First section commits, second is rejected: the save loop is
        // section-granular, not transactional.
        *transport.fail_submit_after.borrow_mut() = Some(1);
        sync.save().expect_err("save must fail on the second section");

        // Client view: still dirty, baseline untouched, draft retained.
        assert!(sync.is_dirty());
        assert_eq!(
            sync.baseline().and_then(|doc| doc.get_path("theme.mode")),
            Some(&text("light"))
        );
        assert!(cache.contains(DRAFT_KEY));

        // Server view: the first section is already durably committed.
        let server = transport.document.borrow().clone();
        assert_eq!(server.get_path("theme.mode"), Some(&text("dark")));
        assert_eq!(server.get_path("hero.title"), Some(&text("Hello")));

        // A retry resubmits every section still dirty against the old
        // baseline — including the already-committed one, which is
        // idempotent — and converges.
        *transport.fail_submit_after.borrow_mut() = None;
        sync.save().expect("retry succeeds");
        assert!(!sync.is_dirty());
        let server = transport.document.borrow().clone();
        assert_eq!(server.get_path("theme.mode"), Some(&text("dark")));
        assert_eq!(server.get_path("hero.title"), Some(&text("Portfolio")));
        assert!(!cache.contains(DRAFT_KEY));
    }

    #[test]
    fn test_draft_restores_unsaved_edits_across_reload() {
        let temp = tempfile::tempdir().expect("tempdir");
        let drafts_dir = temp.path().join("drafts");
        let transport = FakeTransport::seeded("theme:\n  mode: light\n");

        // First session: edit without saving.
        let mut first = Synchronizer::new(
            Box::new(transport.clone()),
            DraftCache::new(&drafts_dir),
            DRAFT_KEY,
        );
        first.load().expect("first load");
        first.update("theme.mode", text("dark")).expect("update");
        drop(first);

        // Second session over the same cache: draft restored, dirtiness
        // recomputed against the freshly fetched baseline.
        let mut second = Synchronizer::new(
            Box::new(transport.clone()),
            DraftCache::new(&drafts_dir),
            DRAFT_KEY,
        );
        let events = Rc::new(RefCell::new(Vec::new()));
        second.subscribe(Box::new(Recorder(Rc::clone(&events))));
        second.load().expect("second load");
        assert!(second.is_dirty());
        assert_eq!(
            second.working().and_then(|doc| doc.get_path("theme.mode")),
            Some(&text("dark"))
        );
        assert_eq!(
            second.baseline().and_then(|doc| doc.get_path("theme.mode")),
            Some(&text("light"))
        );
        // The loaded payload is what a preview renders: it must be the
        // restored draft, not the baseline the transport served.
        let events = events.borrow();
        match events.as_slice() {
            [SyncEvent::Loaded { working }, SyncEvent::DirtyChanged(true)] => {
                assert_eq!(working.get_path("theme.mode"), Some(&text("dark")));
            },
            other => panic!("expected loaded-then-dirty, got {other:?}"),
        }
    }

    #[test]
    fn test_draft_equal_to_baseline_restores_clean() {
        let temp = tempfile::tempdir().expect("tempdir");
        let drafts_dir = temp.path().join("drafts");
        let transport = FakeTransport::seeded("theme:\n  mode: light\n");

        let mut first = Synchronizer::new(
            Box::new(transport.clone()),
            DraftCache::new(&drafts_dir),
            DRAFT_KEY,
        );
        first.load().expect("first load");
        first.update("theme.mode", text("dark")).expect("edit away");
        first.update("theme.mode", text("light")).expect("edit back");
        drop(first);

        let mut second = Synchronizer::new(
            Box::new(transport),
            DraftCache::new(&drafts_dir),
            DRAFT_KEY,
        );
        second.load().expect("second load");
        assert!(!second.is_dirty(), "draft equal to baseline is not dirty");
    }

    #[test]
    fn test_reset_discards_edits_and_draft() {
        let temp = tempfile::tempdir().expect("tempdir");
        let cache = DraftCache::new(temp.path().join("drafts"));
        let transport = FakeTransport::seeded("theme:\n  mode: light\n");
        let mut sync = Synchronizer::new(Box::new(transport), cache.clone(), DRAFT_KEY);
        sync.load().expect("load");
        sync.update("theme.mode", text("dark")).expect("update");
        sync.reset().expect("reset");
        assert!(!sync.is_dirty());
        assert_eq!(sync.working(), sync.baseline());
        assert!(!cache.contains(DRAFT_KEY), "reset clears the draft");
    }

    #[test]
    fn test_operations_before_load_are_rejected() {
        let mut fx = fixture("theme:\n  mode: light\n");
        assert!(matches!(
            fx.sync.update("theme.mode", text("dark")),
            Err(SyncError::NotLoaded)
        ));
        assert!(matches!(fx.sync.save(), Err(SyncError::NotLoaded)));
        assert!(matches!(fx.sync.reset(), Err(SyncError::NotLoaded)));
    }

    proptest! {
        /// Any sequence of edits that ends with every field back at its
        /// original value leaves the synchronizer clean.
        #[test]
        fn test_round_trip_to_origin_clears_dirty(
            edits in proptest::collection::vec(
                ("[a-c]", "[a-z]{1,8}"),
                1..12,
            )
        ) {
            let mut fx = fixture("fields:\n  a: origin-a\n  b: origin-b\n  c: origin-c\n");
            fx.sync.load().expect("load");
            let mut touched = Vec::new();
            for (field, value) in &edits {
                let path = format!("fields.{field}");
                fx.sync.update(&path, text(value)).expect("edit");
                touched.push(field.clone());
            }
            for field in &touched {
                let path = format!("fields.{field}");
                fx.sync
                    .update(&path, text(&format!("origin-{field}")))
                    .expect("restore");
            }
            prop_assert!(!fx.sync.is_dirty());
            // Flips alternate by construction; the last one, if any, is off.
            let flips = dirty_flips(&fx.events.borrow());
            prop_assert!(flips.last().map_or(true, |last| !*last));
        }
    }
}
