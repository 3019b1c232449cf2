//! The observer callback interface.

use horizon_sections_core::{ChangeKind, IndexPath};
use parking_lot::Mutex;

use super::notifier::ChangeEvent;

/// Receives the change notifications of a
/// [`SectionsController`](super::SectionsController).
///
/// Every batch is delivered as `will_change_content`, zero or more
/// `did_change_section` / `did_change_object` calls, then
/// `did_change_content`. Section calls always come before object calls.
///
/// The controller holds its observer weakly and calls it synchronously on the
/// thread that drove the batch, with no controller lock held. Lookups made
/// from an object or section hook already answer from the new presentation.
/// Mutating the controller from any hook fails with a reentrancy error.
///
/// All hooks default to doing nothing.
pub trait ControllerObserver<O>: Send + Sync {
    /// A batch is about to be delivered.
    fn will_change_content(&self) {}

    /// An object was inserted, deleted, updated or moved.
    ///
    /// `index_path` is the position before the batch (`None` for inserts);
    /// `new_index_path` the position after it (`None` for deletes).
    fn did_change_object(
        &self,
        object: &O,
        index_path: Option<IndexPath>,
        kind: ChangeKind,
        new_index_path: Option<IndexPath>,
    ) {
        let _ = (object, index_path, kind, new_index_path);
    }

    /// A section was inserted or deleted.
    fn did_change_section(&self, section_index: usize, kind: ChangeKind) {
        let _ = (section_index, kind);
    }

    /// The batch is complete.
    fn did_change_content(&self) {}
}

/// One call received by a [`RecordingObserver`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ObserverCall<O> {
    /// `will_change_content`.
    WillChange,
    /// `did_change_object` or `did_change_section`.
    Event(ChangeEvent<O>),
    /// `did_change_content`.
    DidChange,
}

/// An observer that records every call it receives.
///
/// Useful for applying a whole batch at once, and in tests.
#[derive(Debug)]
pub struct RecordingObserver<O> {
    calls: Mutex<Vec<ObserverCall<O>>>,
}

impl<O> Default for RecordingObserver<O> {
    fn default() -> Self {
        Self {
            calls: Mutex::new(Vec::new()),
        }
    }
}

impl<O: Clone> RecordingObserver<O> {
    /// Create an empty recorder.
    pub fn new() -> Self {
        Self::default()
    }

    /// Every call received so far.
    pub fn calls(&self) -> Vec<ObserverCall<O>> {
        self.calls.lock().clone()
    }

    /// The events of every batch, without the bracketing calls.
    pub fn events(&self) -> Vec<ChangeEvent<O>> {
        self.calls
            .lock()
            .iter()
            .filter_map(|call| match call {
                ObserverCall::Event(event) => Some(event.clone()),
                _ => None,
            })
            .collect()
    }

    /// Number of completed batches.
    pub fn batch_count(&self) -> usize {
        self.calls
            .lock()
            .iter()
            .filter(|call| matches!(call, ObserverCall::DidChange))
            .count()
    }

    /// Returns the recorded calls and clears the recorder.
    pub fn take(&self) -> Vec<ObserverCall<O>> {
        std::mem::take(&mut *self.calls.lock())
    }
}

impl<O: Clone + Send + Sync> ControllerObserver<O> for RecordingObserver<O> {
    fn will_change_content(&self) {
        self.calls.lock().push(ObserverCall::WillChange);
    }

    fn did_change_object(
        &self,
        object: &O,
        index_path: Option<IndexPath>,
        kind: ChangeKind,
        new_index_path: Option<IndexPath>,
    ) {
        self.calls.lock().push(ObserverCall::Event(ChangeEvent::object(
            kind,
            object.clone(),
            index_path,
            new_index_path,
        )));
    }

    fn did_change_section(&self, section_index: usize, kind: ChangeKind) {
        self.calls
            .lock()
            .push(ObserverCall::Event(ChangeEvent::section(kind, section_index)));
    }

    fn did_change_content(&self) {
        self.calls.lock().push(ObserverCall::DidChange);
    }
}
