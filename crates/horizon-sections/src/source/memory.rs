//! An in-memory object store.
//!
//! [`MemoryStore`] implements [`ObjectSource`] over a schema of entities. Each
//! entity declares attributes and relationships; relationships may be to-one
//! or to-many and may name an inverse, which the store keeps in sync
//! automatically.
//!
//! Mutations are visible to fetches immediately and are also accumulated as a
//! pending [`ChangeSet`]. [`process_pending_changes`](ObjectSource::process_pending_changes)
//! delivers that change set through [`MemoryStore::objects_changed`], and
//! [`save`](ObjectSource::save) processes pending changes and marks the store
//! clean.
//!
//! # Example
//!
//! ```
//! use horizon_sections::source::memory::{EntityDescription, MemoryStore};
//! use horizon_sections::source::{FetchRequest, ObjectSource, SortDescriptor};
//!
//! let store = MemoryStore::new();
//! store.define_entity(EntityDescription::new("Task").attribute("title"));
//!
//! let task = store.insert("Task").unwrap();
//! store.set_attribute_value(&task, "title", "write docs".into()).unwrap();
//!
//! let request = FetchRequest::entity("Task").with_sort(vec![SortDescriptor::ascending("title")]);
//! assert_eq!(store.fetch(&request).unwrap(), vec![task]);
//! ```

use std::collections::HashMap;

use horizon_sections_core::logging::targets;
use horizon_sections_core::{AttributeValue, Signal, SourceError};
use parking_lot::RwLock;
use slotmap::{new_key_type, SlotMap};

use super::{compare_sort_keys, Attributes, ChangeSet, FetchRequest, FetchTarget, ObjectSource};

new_key_type! {
    /// Identity of an object in a [`MemoryStore`].
    pub struct ObjectId;
}

/// Describes one relationship of an entity.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RelationshipDescription {
    /// Entity on the target side.
    pub destination: String,
    /// Name of the inverse relationship on the destination entity, if any.
    pub inverse: Option<String>,
    /// Whether the relationship holds many targets.
    pub to_many: bool,
}

/// Describes an entity: its attributes and relationships.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EntityDescription {
    name: String,
    attributes: Vec<String>,
    relationships: HashMap<String, RelationshipDescription>,
}

impl EntityDescription {
    /// Creates an entity with no attributes or relationships.
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            attributes: Vec::new(),
            relationships: HashMap::new(),
        }
    }

    /// Declares an attribute.
    pub fn attribute(mut self, name: impl Into<String>) -> Self {
        let name = name.into();
        if !self.attributes.contains(&name) {
            self.attributes.push(name);
        }
        self
    }

    /// Declares a to-one relationship.
    pub fn to_one(
        mut self,
        name: impl Into<String>,
        destination: impl Into<String>,
        inverse: Option<&str>,
    ) -> Self {
        self.relationships.insert(
            name.into(),
            RelationshipDescription {
                destination: destination.into(),
                inverse: inverse.map(str::to_owned),
                to_many: false,
            },
        );
        self
    }

    /// Declares a to-many relationship.
    pub fn to_many(
        mut self,
        name: impl Into<String>,
        destination: impl Into<String>,
        inverse: Option<&str>,
    ) -> Self {
        self.relationships.insert(
            name.into(),
            RelationshipDescription {
                destination: destination.into(),
                inverse: inverse.map(str::to_owned),
                to_many: true,
            },
        );
        self
    }

    /// Returns the entity name.
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Returns `true` if the entity declares the attribute.
    pub fn has_attribute(&self, name: &str) -> bool {
        self.attributes.iter().any(|a| a == name)
    }

    /// Returns the relationship named `name`.
    pub fn relationship(&self, name: &str) -> Option<&RelationshipDescription> {
        self.relationships.get(name)
    }
}

#[derive(Debug)]
struct ObjectRecord {
    entity: String,
    sequence: u64,
    attributes: HashMap<String, AttributeValue>,
    relationships: HashMap<String, Vec<ObjectId>>,
}

#[derive(Debug, Default)]
struct StoreState {
    entities: HashMap<String, EntityDescription>,
    objects: SlotMap<ObjectId, ObjectRecord>,
    next_sequence: u64,
    pending: ChangeSet<ObjectId>,
    has_changes: bool,
    fail_next_save: Option<String>,
    save_count: usize,
}

impl StoreState {
    fn record(&self, id: ObjectId) -> Result<&ObjectRecord, SourceError> {
        self.objects
            .get(id)
            .ok_or_else(|| SourceError::unknown_object(id))
    }

    fn relationship_of(
        &self,
        id: ObjectId,
        key: &str,
    ) -> Result<RelationshipDescription, SourceError> {
        let entity = &self.record(id)?.entity;
        self.entities
            .get(entity)
            .and_then(|e| e.relationship(key))
            .cloned()
            .ok_or_else(|| SourceError::unknown_key_path(entity.clone(), key))
    }

    /// Resolves a dotted key path, following to-one hops through relationships.
    fn resolve(&self, id: ObjectId, key_path: &str) -> Option<AttributeValue> {
        let mut current = id;
        let mut components = key_path.split('.').peekable();
        while let Some(component) = components.next() {
            let record = self.objects.get(current)?;
            if components.peek().is_none() {
                return record.attributes.get(component).cloned();
            }
            current = *record.relationships.get(component)?.first()?;
        }
        None
    }

    fn mark_updated(&mut self, id: ObjectId) {
        self.has_changes = true;
        if !self.pending.inserted.contains(&id) && !self.pending.updated.contains(&id) {
            self.pending.updated.push(id);
        }
    }

    fn link(&mut self, from: ObjectId, key: &str, to: ObjectId) {
        if let Some(record) = self.objects.get_mut(from) {
            let targets = record.relationships.entry(key.to_owned()).or_default();
            if !targets.contains(&to) {
                targets.push(to);
            }
        }
        self.mark_updated(from);
    }

    fn unlink(&mut self, from: ObjectId, key: &str, to: ObjectId) {
        if let Some(targets) = self
            .objects
            .get_mut(from)
            .and_then(|record| record.relationships.get_mut(key))
        {
            targets.retain(|t| *t != to);
        }
        self.mark_updated(from);
    }

    /// Removes `to` from `from.key` and `from` from the inverse side.
    fn unlink_pair(&mut self, from: ObjectId, key: &str, to: ObjectId) {
        let inverse = self.relationship_of(from, key).ok().and_then(|r| r.inverse);
        self.unlink(from, key, to);
        if let Some(inverse) = inverse {
            self.unlink(to, &inverse, from);
        }
    }

    /// Clears a to-one relationship before it receives a new target.
    fn clear_to_one(&mut self, from: ObjectId, key: &str, keep: ObjectId) {
        let previous: Vec<ObjectId> = self
            .objects
            .get(from)
            .and_then(|record| record.relationships.get(key))
            .map(|targets| targets.iter().copied().filter(|t| *t != keep).collect())
            .unwrap_or_default();
        for old in previous {
            self.unlink_pair(from, key, old);
        }
    }
}

struct RecordAttributes<'a> {
    state: &'a StoreState,
    id: ObjectId,
}

impl Attributes for RecordAttributes<'_> {
    fn value(&self, key_path: &str) -> Option<AttributeValue> {
        self.state.resolve(self.id, key_path)
    }
}

/// A complete in-memory [`ObjectSource`].
///
/// The store is `Send + Sync`; all state lives behind a single
/// `parking_lot::RwLock`. The lock is never held while
/// [`objects_changed`](Self::objects_changed) is emitting, so connected slots
/// may call back into the store.
pub struct MemoryStore {
    state: RwLock<StoreState>,
    /// Emitted with each processed change set.
    pub objects_changed: Signal<ChangeSet<ObjectId>>,
}

impl Default for MemoryStore {
    fn default() -> Self {
        Self::new()
    }
}

impl MemoryStore {
    /// Creates an empty store with no entities.
    pub fn new() -> Self {
        Self {
            state: RwLock::new(StoreState::default()),
            objects_changed: Signal::new(),
        }
    }

    /// Adds (or replaces) an entity description.
    pub fn define_entity(&self, description: EntityDescription) {
        tracing::debug!(target: targets::SOURCE, entity = %description.name, "entity defined");
        self.state
            .write()
            .entities
            .insert(description.name.clone(), description);
    }

    /// Removes `target` from the relationship `key_path` of `object`, and
    /// `object` from the inverse side.
    pub fn unrelate(
        &self,
        object: &ObjectId,
        key_path: &str,
        target: &ObjectId,
    ) -> Result<(), SourceError> {
        let mut state = self.state.write();
        state.relationship_of(*object, key_path)?;
        state.record(*target)?;
        state.unlink_pair(*object, key_path, *target);
        Ok(())
    }

    /// Makes the next call to [`save`](ObjectSource::save) fail with
    /// [`SourceError::SaveRejected`].
    pub fn fail_next_save(&self, reason: impl Into<String>) {
        self.state.write().fail_next_save = Some(reason.into());
    }

    /// Returns `true` if the store has mutations that were not saved.
    pub fn has_changes(&self) -> bool {
        self.state.read().has_changes
    }

    /// Returns the number of successful saves.
    pub fn save_count(&self) -> usize {
        self.state.read().save_count
    }

    /// Returns the number of live objects.
    pub fn object_count(&self) -> usize {
        self.state.read().objects.len()
    }

    /// Returns the change set accumulated since the last processing.
    pub fn pending_changes(&self) -> ChangeSet<ObjectId> {
        self.state.read().pending.clone()
    }
}

impl ObjectSource for MemoryStore {
    type Object = ObjectId;

    fn fetch(&self, request: &FetchRequest<ObjectId>) -> Result<Vec<ObjectId>, SourceError> {
        let state = self.state.read();
        let candidates: Vec<ObjectId> = match &request.target {
            FetchTarget::Entity(entity) => {
                if !state.entities.contains_key(entity) {
                    return Err(SourceError::UnknownEntity(entity.clone()));
                }
                let mut ids: Vec<(u64, ObjectId)> = state
                    .objects
                    .iter()
                    .filter(|(_, record)| record.entity == *entity)
                    .map(|(id, record)| (record.sequence, id))
                    .collect();
                ids.sort_unstable_by_key(|(sequence, _)| *sequence);
                ids.into_iter().map(|(_, id)| id).collect()
            }
            FetchTarget::Relationship { root, key_path } => {
                state.relationship_of(*root, key_path)?;
                state
                    .record(*root)?
                    .relationships
                    .get(key_path)
                    .map(|targets| {
                        targets
                            .iter()
                            .copied()
                            .filter(|t| state.objects.contains_key(*t))
                            .collect()
                    })
                    .unwrap_or_default()
            }
        };

        let mut rows: Vec<(ObjectId, Vec<Option<AttributeValue>>)> = candidates
            .into_iter()
            .filter(|id| {
                request.predicate.as_ref().is_none_or(|predicate| {
                    predicate.evaluate(&RecordAttributes { state: &*state, id: *id })
                })
            })
            .map(|id| {
                let keys = request
                    .sort
                    .iter()
                    .map(|descriptor| state.resolve(id, &descriptor.key_path))
                    .collect();
                (id, keys)
            })
            .collect();
        rows.sort_by(|(_, a), (_, b)| compare_sort_keys(&request.sort, a, b));

        tracing::trace!(target: targets::SOURCE, count = rows.len(), "fetch");
        Ok(rows.into_iter().map(|(id, _)| id).collect())
    }

    fn insert(&self, entity: &str) -> Result<ObjectId, SourceError> {
        let mut state = self.state.write();
        if !state.entities.contains_key(entity) {
            return Err(SourceError::UnknownEntity(entity.to_owned()));
        }
        let sequence = state.next_sequence;
        state.next_sequence += 1;
        let id = state.objects.insert(ObjectRecord {
            entity: entity.to_owned(),
            sequence,
            attributes: HashMap::new(),
            relationships: HashMap::new(),
        });
        state.pending.inserted.push(id);
        state.has_changes = true;
        tracing::trace!(target: targets::SOURCE, ?id, entity, "object inserted");
        Ok(id)
    }

    fn remove(&self, object: &ObjectId) -> Result<(), SourceError> {
        let mut state = self.state.write();
        let links: Vec<(String, ObjectId)> = state
            .record(*object)?
            .relationships
            .iter()
            .flat_map(|(key, targets)| targets.iter().map(move |t| (key.clone(), *t)))
            .collect();
        for (key, target) in links {
            state.unlink_pair(*object, &key, target);
        }
        state.objects.remove(*object);

        let id = *object;
        state.pending.updated.retain(|o| *o != id);
        if let Some(position) = state.pending.inserted.iter().position(|o| *o == id) {
            state.pending.inserted.remove(position);
        } else {
            state.pending.deleted.push(id);
        }
        state.has_changes = true;
        tracing::trace!(target: targets::SOURCE, ?id, "object removed");
        Ok(())
    }

    fn save(&self) -> Result<(), SourceError> {
        if let Some(reason) = self.state.write().fail_next_save.take() {
            tracing::debug!(target: targets::SOURCE, %reason, "save rejected");
            return Err(SourceError::SaveRejected(reason));
        }
        self.process_pending_changes();
        let mut state = self.state.write();
        state.has_changes = false;
        state.save_count += 1;
        tracing::debug!(target: targets::SOURCE, saves = state.save_count, "store saved");
        Ok(())
    }

    fn attribute_value(&self, object: &ObjectId, key_path: &str) -> Option<AttributeValue> {
        self.state.read().resolve(*object, key_path)
    }

    fn set_attribute_value(
        &self,
        object: &ObjectId,
        key_path: &str,
        value: AttributeValue,
    ) -> Result<(), SourceError> {
        let mut state = self.state.write();
        let entity = state.record(*object)?.entity.clone();
        let declared = state
            .entities
            .get(&entity)
            .is_some_and(|e| e.has_attribute(key_path));
        if !declared {
            return Err(SourceError::unknown_key_path(entity, key_path));
        }
        if let Some(record) = state.objects.get_mut(*object) {
            record.attributes.insert(key_path.to_owned(), value);
        }
        state.mark_updated(*object);
        Ok(())
    }

    fn contains(&self, object: &ObjectId) -> bool {
        self.state.read().objects.contains_key(*object)
    }

    fn entity_of(&self, object: &ObjectId) -> Option<String> {
        self.state
            .read()
            .objects
            .get(*object)
            .map(|record| record.entity.clone())
    }

    fn has_entity(&self, entity: &str) -> bool {
        self.state.read().entities.contains_key(entity)
    }

    fn relationship_destination(&self, entity: &str, key_path: &str) -> Option<String> {
        self.state
            .read()
            .entities
            .get(entity)?
            .relationship(key_path)
            .map(|r| r.destination.clone())
    }

    fn related_objects(&self, object: &ObjectId, key_path: &str) -> Vec<ObjectId> {
        let state = self.state.read();
        state
            .objects
            .get(*object)
            .and_then(|record| record.relationships.get(key_path))
            .map(|targets| {
                targets
                    .iter()
                    .copied()
                    .filter(|t| state.objects.contains_key(*t))
                    .collect()
            })
            .unwrap_or_default()
    }

    fn relate(&self, object: &ObjectId, key_path: &str, target: &ObjectId) -> Result<(), SourceError> {
        let mut state = self.state.write();
        let relationship = state.relationship_of(*object, key_path)?;
        let target_entity = state.record(*target)?.entity.clone();
        if target_entity != relationship.destination {
            return Err(SourceError::unknown_key_path(target_entity, key_path));
        }

        if !relationship.to_many {
            state.clear_to_one(*object, key_path, *target);
        }
        state.link(*object, key_path, *target);

        if let Some(inverse) = relationship.inverse {
            let inverse_relationship = state.relationship_of(*target, &inverse)?;
            if !inverse_relationship.to_many {
                state.clear_to_one(*target, &inverse, *object);
            }
            state.link(*target, &inverse, *object);
        }
        Ok(())
    }

    fn process_pending_changes(&self) {
        let changes = std::mem::take(&mut self.state.write().pending);
        if changes.is_empty() {
            return;
        }
        tracing::debug!(
            target: targets::SOURCE,
            inserted = changes.inserted.len(),
            deleted = changes.deleted.len(),
            updated = changes.updated.len(),
            "processing pending changes"
        );
        self.objects_changed.emit(changes);
    }

    fn changes(&self) -> Option<&Signal<ChangeSet<ObjectId>>> {
        Some(&self.objects_changed)
    }
}

static_assertions::assert_impl_all!(MemoryStore: Send, Sync);
