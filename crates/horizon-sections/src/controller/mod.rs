//! The sections controller.
//!
//! [`SectionsController`] presents the objects of an [`ObjectSource`] as an
//! ordered list of titled sections and keeps that presentation in sync with
//! the source through batched change notifications.
//!
//! # Reading
//!
//! Every lookup answers from an immutable snapshot ([`IndexMapper`]) that is
//! replaced wholesale at the end of each batch: [`section_count`],
//! [`object_at`], [`index_path_of`] and friends never observe a half-applied
//! batch.
//!
//! # Writing
//!
//! The mutation methods ([`delete`], [`move_object`], [`commit`], ...) forward
//! to the source inside a change batch. If no batch is open they open and
//! close their own; if the caller has opened one with [`begin_changes`] they
//! join it, and the observer hears about everything at [`end_changes`].
//!
//! # Example
//!
//! ```
//! use std::sync::Arc;
//! use horizon_sections::controller::{ControllerConfig, RecordingObserver, SectionsController};
//! use horizon_sections::source::memory::{EntityDescription, MemoryStore};
//! use horizon_sections::source::{ObjectSource, SortDescriptor};
//!
//! let store = Arc::new(MemoryStore::new());
//! store.define_entity(EntityDescription::new("Event").attribute("day").attribute("title"));
//! for (day, title) in [(1i64, "standup"), (1, "review"), (2, "retro")] {
//!     let event = store.insert("Event").unwrap();
//!     store.set_attribute_value(&event, "day", day.into()).unwrap();
//!     store.set_attribute_value(&event, "title", title.into()).unwrap();
//! }
//!
//! let config = ControllerConfig::query("Event")
//!     .sort_by(SortDescriptor::ascending("day"))
//!     .sort_by(SortDescriptor::ascending("title"))
//!     .section_key_path("day");
//! let controller = Arc::new(SectionsController::new(store.clone(), config).unwrap());
//! controller.observe_source();
//!
//! let observer = Arc::new(RecordingObserver::new());
//! controller.set_observer(&observer);
//!
//! assert_eq!(controller.section_titles(), vec![Some("1".to_string()), Some("2".to_string())]);
//! let retro = controller.object_at((1, 0).into()).unwrap();
//! controller.delete(&retro).unwrap();
//! assert_eq!(controller.section_count(), 1);
//! assert_eq!(observer.batch_count(), 1);
//! ```
//!
//! [`section_count`]: SectionsController::section_count
//! [`object_at`]: SectionsController::object_at
//! [`index_path_of`]: SectionsController::index_path_of
//! [`delete`]: SectionsController::delete
//! [`move_object`]: SectionsController::move_object
//! [`commit`]: SectionsController::commit
//! [`begin_changes`]: SectionsController::begin_changes
//! [`end_changes`]: SectionsController::end_changes

mod config;
mod mapper;
mod notifier;
mod observer;
mod sectioner;

pub use config::{
    default_title_formatter, Binding, ContiguityCheck, ControllerConfig, FetchOptions,
    TitleFormatter,
};
pub use mapper::IndexMapper;
pub use notifier::{diff, ChangeEvent, ChangeNotifier, Mutation};
pub use observer::{ControllerObserver, ObserverCall, RecordingObserver};
pub use sectioner::{contiguity_violations, flatten, Section, Sectioner};

use std::collections::{BTreeMap, HashSet};
use std::fmt;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Weak};

use horizon_sections_core::logging::{span_names, targets};
use horizon_sections_core::{
    AttributeValue, ConnectionId, ControllerError, IndexPath, NotifierState, PerfSpan, Result,
};
use parking_lot::{Mutex, RwLock};

use crate::source::{ChangeSet, FetchRequest, ObjectSource, Predicate};

/// The binding after validation against the source.
#[derive(Debug, Clone)]
enum ResolvedBinding<O> {
    Query {
        entity: String,
    },
    Relationship {
        root: O,
        key_path: String,
        inverse_key_path: Option<String>,
        entity: String,
    },
}

impl<O> ResolvedBinding<O> {
    fn entity(&self) -> &str {
        match self {
            ResolvedBinding::Query { entity } | ResolvedBinding::Relationship { entity, .. } => {
                entity
            }
        }
    }
}

fn resolve_binding<S: ObjectSource>(
    source: &S,
    binding: Binding<S::Object>,
) -> Result<ResolvedBinding<S::Object>> {
    match binding {
        Binding::Query { entity } => {
            if !source.has_entity(&entity) {
                return Err(ControllerError::configuration(format!(
                    "unknown entity '{entity}'"
                )));
            }
            Ok(ResolvedBinding::Query { entity })
        }
        Binding::Relationship {
            root,
            key_path,
            inverse_key_path,
            entity,
        } => {
            let root = root.ok_or_else(|| {
                ControllerError::configuration(format!(
                    "relationship binding '{key_path}' has no root object"
                ))
            })?;
            let root_entity = source.entity_of(&root).ok_or_else(|| {
                ControllerError::configuration(format!("root object {root:?} is not in the store"))
            })?;
            let destination = source
                .relationship_destination(&root_entity, &key_path)
                .ok_or_else(|| {
                    ControllerError::configuration(format!(
                        "key path '{key_path}' is not a relationship of entity '{root_entity}'"
                    ))
                })?;
            if let Some(entity) = &entity
                && *entity != destination
            {
                return Err(ControllerError::configuration(format!(
                    "relationship '{key_path}' leads to '{destination}', not '{entity}'"
                )));
            }
            if let Some(inverse) = &inverse_key_path
                && source.relationship_destination(&destination, inverse).as_deref()
                    != Some(root_entity.as_str())
            {
                return Err(ControllerError::configuration(format!(
                    "inverse key path '{inverse}' does not lead from '{destination}' back to '{root_entity}'"
                )));
            }
            Ok(ResolvedBinding::Relationship {
                root,
                key_path,
                inverse_key_path,
                entity: destination,
            })
        }
    }
}

/// Presents the objects of an [`ObjectSource`] as sections and rows.
///
/// The controller is `Send + Sync` and is normally shared through an `Arc`
/// (required by [`observe_source`](Self::observe_source)). Batches are not
/// reentrant: while one is being emitted every mutating call fails with
/// [`ControllerError::Reentrancy`].
pub struct SectionsController<S: ObjectSource> {
    source: Arc<S>,
    binding: ResolvedBinding<S::Object>,
    predicate: Option<Predicate>,
    options: FetchOptions,
    title_formatter: TitleFormatter,
    snapshot: RwLock<Arc<IndexMapper<S::Object>>>,
    notifier: Mutex<ChangeNotifier<S::Object>>,
    /// Records that arrived while a batch was emitting, or that belonged to
    /// an aborted batch.
    deferred: Mutex<Vec<Mutation<S::Object>>>,
    /// Set when the store changed during emission; the emitting batch runs a
    /// follow-up batch once it has closed.
    rerun: AtomicBool,
    observer: RwLock<Option<Weak<dyn ControllerObserver<S::Object>>>>,
    connection: Mutex<Option<ConnectionId>>,
}

impl<S: ObjectSource + 'static> SectionsController<S> {
    /// Creates a controller and performs the initial fetch.
    ///
    /// Fails with [`ControllerError::Configuration`] if the binding does not
    /// resolve against `source`, and with [`ControllerError::Source`] if the
    /// initial fetch fails.
    pub fn new(source: Arc<S>, config: ControllerConfig<S::Object>) -> Result<Self> {
        let ControllerConfig {
            binding,
            predicate,
            options,
            title_formatter,
        } = config;
        let binding = resolve_binding(source.as_ref(), binding)?;

        let controller = Self {
            source,
            binding,
            predicate,
            options,
            title_formatter: title_formatter.unwrap_or_else(default_title_formatter),
            snapshot: RwLock::new(Arc::new(IndexMapper::empty())),
            notifier: Mutex::new(ChangeNotifier::new()),
            deferred: Mutex::new(Vec::new()),
            rerun: AtomicBool::new(false),
            observer: RwLock::new(None),
            connection: Mutex::new(None),
        };
        let initial = controller.fetch_snapshot(None)?;
        tracing::debug!(
            target: targets::CONTROLLER,
            entity = controller.binding.entity(),
            sections = initial.section_count(),
            objects = initial.object_count(),
            "controller created"
        );
        *controller.snapshot.write() = Arc::new(initial);
        Ok(controller)
    }

    /// Subscribes to the source's change signal.
    ///
    /// Change sets arriving while idle run a batch of their own; while a
    /// batch is collecting they join it; while one is emitting they are
    /// deferred to the next batch. The subscription holds the controller
    /// weakly and is removed when the controller drops.
    ///
    /// Returns `false` if the source does not publish changes.
    pub fn observe_source(self: &Arc<Self>) -> bool {
        let Some(signal) = self.source.changes() else {
            return false;
        };
        let mut connection = self.connection.lock();
        if connection.is_none() {
            let weak = Arc::downgrade(self);
            *connection = Some(signal.connect(move |changes: &ChangeSet<S::Object>| {
                if let Some(controller) = weak.upgrade() {
                    controller.handle_source_changes(changes);
                }
            }));
            tracing::debug!(target: targets::CONTROLLER, "observing source changes");
        }
        true
    }

    fn handle_source_changes(&self, changes: &ChangeSet<S::Object>) {
        match self.state() {
            NotifierState::Idle => {
                if let Err(err) = self.apply_changes(changes) {
                    tracing::error!(target: targets::CONTROLLER, error = %err, "store-driven batch failed");
                }
            }
            NotifierState::Collecting => {
                let mut notifier = self.notifier.lock();
                for mutation in mutations(changes) {
                    if let Err(err) = notifier.record(mutation) {
                        tracing::error!(target: targets::CONTROLLER, error = %err, "dropped store change");
                    }
                }
            }
            NotifierState::Emitting => {
                tracing::debug!(
                    target: targets::CONTROLLER,
                    changes = changes.len(),
                    "store changed while emitting; scheduling a follow-up batch"
                );
                self.deferred.lock().extend(mutations(changes));
                self.rerun.store(true, Ordering::SeqCst);
            }
        }
    }

    /// Registers the observer. The controller keeps only a weak reference.
    pub fn set_observer<T>(&self, observer: &Arc<T>)
    where
        T: ControllerObserver<S::Object> + 'static,
    {
        let weak = Arc::downgrade(observer);
        let weak: Weak<dyn ControllerObserver<S::Object>> = weak;
        *self.observer.write() = Some(weak);
    }

    /// Removes the observer.
    pub fn clear_observer(&self) {
        *self.observer.write() = None;
    }

    fn observer(&self) -> Option<Arc<dyn ControllerObserver<S::Object>>> {
        self.observer.read().as_ref().and_then(Weak::upgrade)
    }

    // =========================================================================
    // Lookups
    // =========================================================================

    /// The current snapshot.
    pub fn snapshot(&self) -> Arc<IndexMapper<S::Object>> {
        self.snapshot.read().clone()
    }

    /// The bound source.
    pub fn source(&self) -> &Arc<S> {
        &self.source
    }

    /// Ordering and grouping options.
    pub fn options(&self) -> &FetchOptions {
        &self.options
    }

    /// Entity of the presented objects.
    pub fn entity(&self) -> &str {
        self.binding.entity()
    }

    /// Current notifier phase.
    pub fn state(&self) -> NotifierState {
        self.notifier.lock().state()
    }

    /// Returns `true` if [`move_object`](Self::move_object) is supported.
    pub fn is_reorderable(&self) -> bool {
        self.options.manual_order().is_some()
    }

    /// Number of sections.
    pub fn section_count(&self) -> usize {
        self.snapshot.read().section_count()
    }

    /// Number of presented objects.
    pub fn object_count(&self) -> usize {
        self.snapshot.read().object_count()
    }

    /// Number of objects in `section`.
    pub fn object_count_in_section(&self, section: usize) -> Result<usize> {
        self.snapshot.read().object_count_in_section(section)
    }

    /// Title of `section`; `None` when no section key path is configured.
    pub fn title_for_section(&self, section: usize) -> Result<Option<String>> {
        self.snapshot
            .read()
            .title(section)
            .map(|title| title.map(str::to_owned))
    }

    /// Titles of every section, in order.
    pub fn section_titles(&self) -> Vec<Option<String>> {
        self.snapshot
            .read()
            .sections()
            .iter()
            .map(|section| section.title().map(str::to_owned))
            .collect()
    }

    /// Object at `path`.
    pub fn object_at(&self, path: IndexPath) -> Result<S::Object> {
        self.snapshot.read().object_at(path).cloned()
    }

    /// Index path of `object`.
    pub fn index_path_of(&self, object: &S::Object) -> Result<IndexPath> {
        self.snapshot.read().index_path(object)
    }

    /// The ordered objects of `section`.
    pub fn objects_in_section(&self, section: usize) -> Result<Vec<S::Object>> {
        self.snapshot
            .read()
            .section(section)
            .map(|section| section.objects().to_vec())
    }

    /// Every presented object, in presentation order.
    pub fn all_objects(&self) -> Vec<S::Object> {
        self.snapshot.read().all_objects()
    }

    /// Objects grouped by section title. Untitled sections map to `""`.
    pub fn sections_by_key(&self) -> BTreeMap<String, Vec<S::Object>> {
        let snapshot = self.snapshot();
        let mut groups: BTreeMap<String, Vec<S::Object>> = BTreeMap::new();
        for section in snapshot.sections() {
            groups
                .entry(section.title().unwrap_or_default().to_owned())
                .or_default()
                .extend(section.objects().iter().cloned());
        }
        groups
    }

    // =========================================================================
    // Batches
    // =========================================================================

    /// Opens a change batch and notifies `will_change_content`.
    pub fn begin_changes(&self) -> Result<()> {
        {
            let mut notifier = self.notifier.lock();
            notifier.begin(self.snapshot())?;
            for mutation in self.deferred.lock().drain(..) {
                notifier.record(mutation)?;
            }
        }
        tracing::debug!(target: targets::NOTIFIER, "batch opened");
        if let Some(observer) = self.observer() {
            observer.will_change_content();
        }
        Ok(())
    }

    /// Buffers a raw mutation into the open batch.
    pub fn record_change(&self, mutation: Mutation<S::Object>) -> Result<()> {
        self.notifier.lock().record(mutation)
    }

    /// Closes the open batch: refetches, diffs, emits the events and
    /// notifies `did_change_content`.
    ///
    /// If the refetch fails, the previous presentation is kept, the batch is
    /// still closed with `did_change_content` and the error is returned.
    ///
    /// Store changes published while the events were being delivered run as
    /// one or more follow-up batches before this returns.
    pub fn end_changes(&self) -> Result<()> {
        self.emit_batch()?;
        while self.rerun.swap(false, Ordering::SeqCst) {
            tracing::debug!(target: targets::NOTIFIER, "running follow-up batch");
            self.begin_changes()?;
            self.emit_batch()?;
        }
        Ok(())
    }

    fn emit_batch(&self) -> Result<()> {
        let _span = PerfSpan::new(span_names::BATCH);
        let (before, records) = self.notifier.lock().start_emitting()?;

        let after = match self.fetch_snapshot(Some(&before)) {
            Ok(after) => Arc::new(after),
            Err(err) => {
                tracing::debug!(target: targets::NOTIFIER, error = %err, "refetch failed; presentation unchanged");
                self.deferred.lock().extend(records);
                self.close_batch();
                return Err(err);
            }
        };

        let events = diff(&before, &after, &records);
        *self.snapshot.write() = after;
        tracing::debug!(
            target: targets::NOTIFIER,
            records = records.len(),
            events = events.len(),
            "batch diffed"
        );

        if let Some(observer) = self.observer() {
            for event in &events {
                tracing::trace!(
                    target: targets::NOTIFIER,
                    kind = %event.kind,
                    object = ?event.object,
                    from = ?event.index_path,
                    to = ?event.new_index_path,
                    section = ?event.section_index,
                    "change"
                );
                event.dispatch(observer.as_ref());
            }
        }
        self.close_batch();
        Ok(())
    }

    fn close_batch(&self) {
        if let Some(observer) = self.observer() {
            observer.did_change_content();
        }
        self.notifier.lock().finish();
    }

    /// Discards the open batch without changing the presentation. The
    /// observer still receives `did_change_content`.
    ///
    /// Buffered records are carried into the next batch so that updates are
    /// not lost.
    pub fn abort_changes(&self) -> Result<()> {
        let records = self.notifier.lock().abort()?;
        self.deferred.lock().extend(records);
        tracing::debug!(target: targets::NOTIFIER, "batch aborted");
        if let Some(observer) = self.observer() {
            observer.did_change_content();
        }
        Ok(())
    }

    /// Runs `f` inside a batch.
    ///
    /// Joins the open batch if there is one; otherwise opens a batch, ends it
    /// when `f` succeeds and aborts it when `f` fails.
    pub fn perform_batch<R>(&self, f: impl FnOnce(&Self) -> Result<R>) -> Result<R> {
        self.with_batch("perform a batch", || f(self))
    }

    /// Records a source change set and runs it as a batch.
    pub fn apply_changes(&self, changes: &ChangeSet<S::Object>) -> Result<()> {
        self.with_batch("apply store changes", || {
            for mutation in mutations(changes) {
                self.record_change(mutation)?;
            }
            Ok(())
        })
    }

    fn with_batch<R>(&self, operation: &'static str, f: impl FnOnce() -> Result<R>) -> Result<R> {
        let opened = match self.state() {
            NotifierState::Idle => {
                self.begin_changes()?;
                true
            }
            NotifierState::Collecting => false,
            state @ NotifierState::Emitting => {
                return Err(ControllerError::reentrancy(operation, state));
            }
        };
        match f() {
            Ok(value) => {
                if opened {
                    self.end_changes()?;
                }
                Ok(value)
            }
            Err(err) => {
                if opened {
                    self.abort_changes()?;
                }
                Err(err)
            }
        }
    }

    fn ensure_not_emitting(&self, operation: &'static str) -> Result<()> {
        match self.state() {
            state @ NotifierState::Emitting => Err(ControllerError::reentrancy(operation, state)),
            _ => Ok(()),
        }
    }

    // =========================================================================
    // Mutations
    // =========================================================================

    /// Creates a new object of the bound entity.
    ///
    /// In relationship mode the object is wired to the root: through the
    /// inverse key path when one is configured, otherwise by adding it to the
    /// root's relationship. The object is not presented until the next batch
    /// (for example [`refresh`](Self::refresh) or [`commit`](Self::commit)).
    pub fn create_object(&self) -> Result<S::Object> {
        self.ensure_not_emitting("create an object")?;
        let object = self.source.insert(self.binding.entity())?;
        if let ResolvedBinding::Relationship {
            root,
            key_path,
            inverse_key_path,
            ..
        } = &self.binding
        {
            match inverse_key_path {
                Some(inverse) => self.source.relate(&object, inverse, root)?,
                None => self.source.relate(root, key_path, &object)?,
            }
        }
        tracing::debug!(target: targets::CONTROLLER, ?object, "object created");
        Ok(object)
    }

    /// Removes `object` from the source.
    pub fn delete(&self, object: &S::Object) -> Result<()> {
        self.delete_objects(std::slice::from_ref(object))
    }

    /// Removes every object in `objects` from the source in one batch.
    ///
    /// Fails with [`ControllerError::NotFound`] before touching the source if
    /// any object is not presented.
    pub fn delete_objects(&self, objects: &[S::Object]) -> Result<()> {
        self.ensure_not_emitting("delete objects")?;
        let snapshot = self.snapshot();
        let mut seen = HashSet::new();
        let mut removals = Vec::with_capacity(objects.len());
        for object in objects {
            snapshot.index_path(object)?;
            if seen.insert(object) {
                removals.push(object.clone());
            }
        }
        self.remove_all(removals)
    }

    /// Removes the object at `path`.
    pub fn delete_at(&self, path: IndexPath) -> Result<()> {
        self.delete_at_paths(&[path])
    }

    /// Removes the objects at `paths` in one batch.
    ///
    /// Fails with [`ControllerError::NotFound`] before touching the source if
    /// any path does not resolve.
    pub fn delete_at_paths(&self, paths: &[IndexPath]) -> Result<()> {
        self.ensure_not_emitting("delete objects")?;
        let snapshot = self.snapshot();
        let mut removals = Vec::with_capacity(paths.len());
        for path in paths {
            let object = snapshot
                .object_at(*path)
                .map_err(|_| ControllerError::path_not_found(*path))?;
            if !removals.contains(object) {
                removals.push(object.clone());
            }
        }
        self.remove_all(removals)
    }

    fn remove_all(&self, objects: Vec<S::Object>) -> Result<()> {
        self.with_batch("delete objects", || {
            for object in &objects {
                self.source.remove(object)?;
                self.record_change(Mutation::Deleted(object.clone()))?;
            }
            self.source.process_pending_changes();
            tracing::debug!(target: targets::CONTROLLER, count = objects.len(), "objects deleted");
            Ok(())
        })
    }

    /// Moves `object` from `from` to `to` by rewriting the manual order key.
    ///
    /// `to` is interpreted after `object` has been taken out of `from`, so
    /// moving within a section uses the final row. Moving to another section
    /// also sets the object's section key to that section's key. Sections
    /// cannot be created by a move.
    ///
    /// Fails with [`ControllerError::UnsupportedOperation`] when the sort is
    /// not led by a manual order descriptor or when moving into another
    /// section that has no key, [`ControllerError::NotFound`]
    /// when `object` is not at `from`, and
    /// [`ControllerError::IndexOutOfRange`] when `to` is outside the
    /// presentation.
    pub fn move_object(&self, object: &S::Object, from: IndexPath, to: IndexPath) -> Result<()> {
        self.ensure_not_emitting("move an object")?;
        let order = self.options.manual_order().cloned().ok_or_else(|| {
            ControllerError::unsupported("the sort is attribute-derived and cannot be reordered")
        })?;

        let snapshot = self.snapshot();
        let at_from = snapshot
            .object_at(from)
            .map_err(|_| ControllerError::path_not_found(from))?;
        if at_from != object {
            return Err(ControllerError::NotFound(format!(
                "object {object:?} is not at {from}"
            )));
        }
        let target_section = snapshot.section(to.section())?;
        let target_key: Option<AttributeValue> = target_section.key().cloned();
        let key_path = self.options.section_key_path.as_deref();
        if from.section() != to.section() && key_path.is_some() && target_key.is_none() {
            // The source has no way to clear an attribute, so the object could
            // not be made to belong to the destination section.
            return Err(ControllerError::unsupported(format!(
                "section {} has no key to move objects into",
                to.section()
            )));
        }

        let mut sections: Vec<Vec<S::Object>> = snapshot
            .sections()
            .iter()
            .map(|section| section.objects().to_vec())
            .collect();
        sections[from.section()].remove(from.row());
        let destination = &mut sections[to.section()];
        if to.row() > destination.len() {
            return Err(ControllerError::row_out_of_range(to, destination.len()));
        }
        destination.insert(to.row(), object.clone());
        let ordered: Vec<S::Object> = sections.into_iter().flatten().collect();

        self.with_batch("move an object", || {
            if from.section() != to.section()
                && let (Some(key_path), Some(key)) = (key_path, target_key)
            {
                self.source.set_attribute_value(object, key_path, key)?;
            }

            let last = ordered.len().saturating_sub(1);
            for (position, member) in ordered.iter().enumerate() {
                let rank = if order.ascending { position } else { last - position };
                let value = AttributeValue::from(rank);
                if self.source.attribute_value(member, &order.key_path).as_ref() != Some(&value) {
                    self.source.set_attribute_value(member, &order.key_path, value)?;
                }
            }
            self.record_change(Mutation::Moved(object.clone()))?;
            self.source.process_pending_changes();
            tracing::debug!(target: targets::CONTROLLER, ?object, %from, %to, "object moved");
            Ok(())
        })
    }

    /// Saves the source.
    ///
    /// On failure the batch is aborted and the presentation stays exactly as
    /// it was; the source error is returned as
    /// [`ControllerError::Persistence`].
    pub fn commit(&self) -> Result<()> {
        self.with_batch("commit", || {
            self.source.save().map_err(ControllerError::Persistence)?;
            self.source.process_pending_changes();
            tracing::debug!(target: targets::CONTROLLER, "committed");
            Ok(())
        })
    }

    /// Processes pending source changes and re-synchronizes the presentation
    /// in one batch.
    pub fn refresh(&self) -> Result<()> {
        self.with_batch("refresh", || {
            self.source.process_pending_changes();
            Ok(())
        })
    }

    // =========================================================================
    // Snapshot construction
    // =========================================================================

    fn fetch_request(&self) -> FetchRequest<S::Object> {
        let request = match &self.binding {
            ResolvedBinding::Query { entity } => FetchRequest::entity(entity.clone()),
            ResolvedBinding::Relationship { root, key_path, .. } => {
                FetchRequest::relationship(root.clone(), key_path.clone())
            }
        };
        request
            .with_sort(self.options.sort_descriptors.clone())
            .with_predicate(self.predicate.clone())
    }

    fn fetch_snapshot(
        &self,
        before: Option<&IndexMapper<S::Object>>,
    ) -> Result<IndexMapper<S::Object>> {
        let _span = PerfSpan::new(span_names::SNAPSHOT);
        let mut objects = match &self.binding {
            ResolvedBinding::Relationship { root, .. } if !self.source.contains(root) => {
                tracing::warn!(target: targets::CONTROLLER, ?root, "relationship root was removed; presenting nothing");
                Vec::new()
            }
            _ => self.source.fetch(&self.fetch_request())?,
        };

        if let ResolvedBinding::Relationship {
            root,
            inverse_key_path: Some(inverse),
            ..
        } = &self.binding
        {
            objects.retain(|object| {
                if before.is_some_and(|b| b.contains(object)) {
                    return true;
                }
                let wired = self.source.related_objects(object, inverse).contains(root);
                if !wired {
                    tracing::warn!(
                        target: targets::CONTROLLER,
                        ?object,
                        inverse = inverse.as_str(),
                        "new member is not wired back to the root; not presented"
                    );
                }
                wired
            });
        }

        let formatter = self.title_formatter.as_ref();
        let sections = Sectioner::new(self.options.section_key_path.as_deref(), formatter)
            .check_contiguity(self.options.contiguity_check.is_enabled())
            .compute(objects, |object, key_path| {
                self.source.attribute_value(object, key_path)
            });
        Ok(IndexMapper::new(sections))
    }

    /// Renders the current sections as a tree.
    pub fn debug_tree(&self) -> String {
        crate::debug::SectionTreeDebug::new().format(&self.snapshot())
    }
}

fn mutations<O: Clone>(changes: &ChangeSet<O>) -> impl Iterator<Item = Mutation<O>> + '_ {
    let inserted = changes.inserted.iter().cloned().map(Mutation::Inserted);
    let deleted = changes.deleted.iter().cloned().map(Mutation::Deleted);
    let updated = changes.updated.iter().cloned().map(Mutation::Updated);
    inserted.chain(deleted).chain(updated)
}

impl<S: ObjectSource> Drop for SectionsController<S> {
    fn drop(&mut self) {
        if let Some(id) = self.connection.get_mut().take()
            && let Some(signal) = self.source.changes()
        {
            signal.disconnect(id);
        }
    }
}

impl<S: ObjectSource> fmt::Debug for SectionsController<S> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let snapshot = self.snapshot.read();
        f.debug_struct("SectionsController")
            .field("binding", &self.binding)
            .field("options", &self.options)
            .field("sections", &snapshot.section_count())
            .field("objects", &snapshot.object_count())
            .finish_non_exhaustive()
    }
}

static_assertions::assert_impl_all!(
    SectionsController<crate::source::memory::MemoryStore>: Send,
    Sync
);
