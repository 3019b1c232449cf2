//! Change batching and classification.
//!
//! A batch opens with [`ChangeNotifier::begin`], which captures the current
//! [`IndexMapper`] as the before-snapshot. Raw [`Mutation`] records are
//! buffered while the notifier is collecting. When the batch ends the
//! controller builds the after-snapshot and [`diff`] classifies every object
//! by identity:
//!
//! | before | after | event |
//! |---|---|---|
//! | present | absent | `Delete` at the before path |
//! | absent | present | `Insert` at the after path |
//! | present | present, other path | `Move` from before to after |
//! | present | present, same path, recorded as changed | `Update` |
//!
//! Sections are diffed by key. All section events come before all object
//! events. Section deletes run by descending before-index, then inserts by
//! ascending after-index. Object events are ordered deletes (descending
//! before-path), inserts (ascending after-path), moves (ascending
//! before-path), then updates (ascending path). Each object receives at most
//! one event per batch; an object inserted and removed inside one batch
//! receives none.

use std::collections::HashSet;
use std::fmt::Debug;
use std::hash::Hash;
use std::sync::Arc;

use horizon_sections_core::logging::targets;
use horizon_sections_core::{ChangeKind, ControllerError, IndexPath, NotifierState, Result};

use super::mapper::IndexMapper;
use super::observer::ControllerObserver;

/// A raw, unclassified mutation of the underlying collection.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum Mutation<O> {
    /// The object was created.
    Inserted(O),
    /// The object was removed.
    Deleted(O),
    /// An attribute of the object changed.
    Updated(O),
    /// The object was explicitly repositioned.
    Moved(O),
}

impl<O> Mutation<O> {
    /// The object the mutation applies to.
    pub fn object(&self) -> &O {
        match self {
            Mutation::Inserted(o) | Mutation::Deleted(o) | Mutation::Updated(o) | Mutation::Moved(o) => o,
        }
    }
}

/// One classified change delivered to the observer.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ChangeEvent<O> {
    /// What happened.
    pub kind: ChangeKind,
    /// The object, or `None` for a section event.
    pub object: Option<O>,
    /// Position before the batch (`Delete`, `Move`, `Update`).
    pub index_path: Option<IndexPath>,
    /// Position after the batch (`Insert`, `Move`, `Update`).
    pub new_index_path: Option<IndexPath>,
    /// Section index, for section events only.
    pub section_index: Option<usize>,
}

impl<O> ChangeEvent<O> {
    /// An object-level event.
    pub fn object(
        kind: ChangeKind,
        object: O,
        index_path: Option<IndexPath>,
        new_index_path: Option<IndexPath>,
    ) -> Self {
        Self {
            kind,
            object: Some(object),
            index_path,
            new_index_path,
            section_index: None,
        }
    }

    /// A section-level event.
    pub fn section(kind: ChangeKind, section_index: usize) -> Self {
        Self {
            kind,
            object: None,
            index_path: None,
            new_index_path: None,
            section_index: Some(section_index),
        }
    }

    /// Returns `true` for section-level events.
    pub fn is_section_event(&self) -> bool {
        self.object.is_none()
    }

    /// Delivers the event to the matching observer hook.
    pub fn dispatch(&self, observer: &dyn ControllerObserver<O>) {
        match (&self.object, self.section_index) {
            (Some(object), _) => {
                observer.did_change_object(object, self.index_path, self.kind, self.new_index_path)
            }
            (None, Some(section)) => observer.did_change_section(section, self.kind),
            (None, None) => {}
        }
    }
}

/// The batch state machine.
///
/// The notifier only tracks state and buffers; it never calls the observer
/// itself, so the controller can deliver callbacks without holding the lock
/// that guards the notifier.
#[derive(Debug)]
pub struct ChangeNotifier<O> {
    state: NotifierState,
    before: Option<Arc<IndexMapper<O>>>,
    records: Vec<Mutation<O>>,
}

impl<O> Default for ChangeNotifier<O> {
    fn default() -> Self {
        Self {
            state: NotifierState::Idle,
            before: None,
            records: Vec::new(),
        }
    }
}

impl<O> ChangeNotifier<O> {
    /// Create an idle notifier.
    pub fn new() -> Self {
        Self::default()
    }

    /// Current phase.
    pub fn state(&self) -> NotifierState {
        self.state
    }

    /// Number of buffered records.
    pub fn pending_records(&self) -> usize {
        self.records.len()
    }

    /// Opens a batch against `before`. Idle → Collecting.
    pub fn begin(&mut self, before: Arc<IndexMapper<O>>) -> Result<()> {
        if self.state != NotifierState::Idle {
            return Err(ControllerError::reentrancy("begin a batch", self.state));
        }
        self.state = NotifierState::Collecting;
        self.before = Some(before);
        tracing::trace!(target: targets::NOTIFIER, "collecting");
        Ok(())
    }

    /// Buffers a raw mutation. Only valid while collecting.
    pub fn record(&mut self, mutation: Mutation<O>) -> Result<()> {
        if self.state != NotifierState::Collecting {
            return Err(ControllerError::reentrancy("record a change", self.state));
        }
        self.records.push(mutation);
        Ok(())
    }

    /// Closes collection and hands out the before-snapshot and the records.
    /// Collecting → Emitting.
    pub fn start_emitting(&mut self) -> Result<(Arc<IndexMapper<O>>, Vec<Mutation<O>>)> {
        if self.state != NotifierState::Collecting {
            return Err(ControllerError::reentrancy("end a batch", self.state));
        }
        let before = self
            .before
            .take()
            .ok_or_else(|| ControllerError::reentrancy("end a batch", self.state))?;
        self.state = NotifierState::Emitting;
        tracing::trace!(target: targets::NOTIFIER, records = self.records.len(), "emitting");
        Ok((before, std::mem::take(&mut self.records)))
    }

    /// Emitting → Idle.
    pub fn finish(&mut self) {
        self.state = NotifierState::Idle;
        self.before = None;
    }

    /// Discards the open batch and returns its records. Collecting → Idle.
    pub fn abort(&mut self) -> Result<Vec<Mutation<O>>> {
        if self.state != NotifierState::Collecting {
            return Err(ControllerError::reentrancy("abort a batch", self.state));
        }
        self.state = NotifierState::Idle;
        self.before = None;
        tracing::trace!(target: targets::NOTIFIER, records = self.records.len(), "aborted");
        Ok(std::mem::take(&mut self.records))
    }
}

/// Classifies the difference between two snapshots into ordered events.
///
/// `records` only decides which unmoved objects report an `Update`; inserts,
/// deletes and moves are derived from the snapshots alone.
pub fn diff<O>(
    before: &IndexMapper<O>,
    after: &IndexMapper<O>,
    records: &[Mutation<O>],
) -> Vec<ChangeEvent<O>>
where
    O: Clone + Eq + Hash + Debug,
{
    let mut events = Vec::new();

    // Sections, by key.
    let before_sections = before.sections();
    let after_sections = after.sections();
    for index in (0..before_sections.len()).rev() {
        let key = before_sections[index].key();
        if !after_sections.iter().any(|s| s.key() == key) {
            events.push(ChangeEvent::section(ChangeKind::Delete, index));
        }
    }
    for (index, section) in after_sections.iter().enumerate() {
        if !before_sections.iter().any(|s| s.key() == section.key()) {
            events.push(ChangeEvent::section(ChangeKind::Insert, index));
        }
    }

    let changed: HashSet<&O> = records
        .iter()
        .filter(|m| matches!(m, Mutation::Updated(_) | Mutation::Moved(_)))
        .map(Mutation::object)
        .collect();

    let mut deletes = Vec::new();
    let mut moves = Vec::new();
    let mut updates = Vec::new();
    for (path, object) in before.iter() {
        match after.index_path(object) {
            Err(_) => deletes.push(ChangeEvent::object(ChangeKind::Delete, object.clone(), Some(path), None)),
            // Same coordinates in a replaced section still count as a move.
            Ok(new_path)
                if new_path != path
                    || before_sections[path.section()].key()
                        != after_sections[new_path.section()].key() =>
            {
                moves.push(ChangeEvent::object(
                    ChangeKind::Move,
                    object.clone(),
                    Some(path),
                    Some(new_path),
                ))
            }
            Ok(_) if changed.contains(object) => updates.push(ChangeEvent::object(
                ChangeKind::Update,
                object.clone(),
                Some(path),
                Some(path),
            )),
            Ok(_) => {}
        }
    }
    deletes.reverse();
    let inserts = after
        .iter()
        .filter(|(_, object)| !before.contains(object))
        .map(|(path, object)| ChangeEvent::object(ChangeKind::Insert, object.clone(), None, Some(path)));

    events.extend(deletes);
    events.extend(inserts);
    events.extend(moves);
    events.extend(updates);
    events
}
