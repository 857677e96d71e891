//! Lifecycle notifications emitted by the synchronizer.
//!
//! Observers (editor panels, the preview renderer) register once and
//! receive every event in registration order. The dirty flag is special:
//! [`SyncEvent::DirtyChanged`] fires only when the flag actually flips,
//! decided by an explicit previous-value comparison in the synchronizer,
//! never once per mutation.

use crate::document::Document;

/// A synchronizer lifecycle event.
#[derive(Debug, Clone, PartialEq)]
pub enum SyncEvent {
    /// A document was fetched and a working copy established. Carries the
    /// resulting working copy so observers (a preview renderer, an editor
    /// panel) can render it without a handle back to the synchronizer —
    /// after a draft restore this is the draft, not the baseline.
    Loaded {
        /// The working copy as established by `load`.
        working: Document,
    },
    /// One field of the working copy changed.
    Changed {
        /// Dot-separated path of the edited field.
        path: String,
    },
    /// The dirty flag flipped to the carried value.
    DirtyChanged(bool),
    /// A save round-trip is starting.
    Saving,
    /// The working copy was durably saved and promoted to baseline.
    Saved,
    /// A save failed; working copy, dirty flag, and draft are untouched.
    SaveFailed {
        /// Failure detail for the UI.
        detail: String,
    },
    /// A load failed; no baseline or working copy was established.
    LoadFailed {
        /// Failure detail for the UI.
        detail: String,
    },
    /// The working copy was discarded back to the baseline.
    Reset,
}

/// An independent component interested in synchronizer transitions.
pub trait SyncObserver {
    /// Called for every emitted event, in registration order.
    fn on_event(&self, event: &SyncEvent);
}

/// Ordered observer fan-out.
#[derive(Default)]
pub(crate) struct ObserverSet {
    observers: Vec<Box<dyn SyncObserver>>,
}

impl ObserverSet {
    pub(crate) fn subscribe(&mut self, observer: Box<dyn SyncObserver>) {
        self.observers.push(observer);
    }

    pub(crate) fn emit(&self, event: &SyncEvent) {
        for observer in &self.observers {
            observer.on_event(event);
        }
    }
}
