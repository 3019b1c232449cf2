//! The object source collaborator.
//!
//! An [`ObjectSource`] is the store that owns domain objects. The controller
//! never owns objects itself: it holds handles (`ObjectSource::Object`) and
//! asks the source to fetch, create, remove and save them. Any persistence
//! engine can sit behind this trait; [`memory::MemoryStore`] is a complete
//! in-memory implementation.
//!
//! # Fetching
//!
//! A [`FetchRequest`] names what to fetch (every object of an entity, or the
//! target side of a relationship on a root object), how to order it
//! ([`SortDescriptor`]s, applied in sequence) and an optional [`Predicate`].
//! The source returns the objects already sorted; the controller relies on
//! that order and never re-sorts.
//!
//! # Change notification
//!
//! Sources that can tell when their contents change expose a
//! [`Signal<ChangeSet>`](ChangeSet) through [`ObjectSource::changes`] and
//! emit it from [`ObjectSource::process_pending_changes`].

pub mod memory;

use std::cmp::Ordering;
use std::fmt;
use std::hash::Hash;
use std::sync::Arc;

use horizon_sections_core::{AttributeValue, Signal, SourceError};
use serde::{Deserialize, Serialize};

/// Read access to the attributes of a single object.
///
/// Predicates evaluate against this view so they stay independent of the
/// store's internal representation.
pub trait Attributes {
    /// Returns the value at `key_path`, or `None` if it is unset or unknown.
    fn value(&self, key_path: &str) -> Option<AttributeValue>;
}

/// Type alias for a predicate function.
///
/// Returns `true` if the object should be included in the fetch result.
pub type PredicateFn = Arc<dyn Fn(&dyn Attributes) -> bool + Send + Sync>;

/// A filter applied by the source when fetching.
///
/// # Example
///
/// ```
/// use horizon_sections::source::Predicate;
///
/// let open = Predicate::equals("status", "open");
/// let urgent = Predicate::new("priority > 2", |attrs| {
///     attrs.value("priority").and_then(|v| v.as_integer()).unwrap_or(0) > 2
/// });
/// assert_eq!(open.description(), "status == open");
/// assert_eq!(urgent.description(), "priority > 2");
/// ```
#[derive(Clone)]
pub struct Predicate {
    description: String,
    test: PredicateFn,
}

impl Predicate {
    /// Creates a predicate from a closure and a human-readable description.
    pub fn new<F>(description: impl Into<String>, test: F) -> Self
    where
        F: Fn(&dyn Attributes) -> bool + Send + Sync + 'static,
    {
        Self {
            description: description.into(),
            test: Arc::new(test),
        }
    }

    /// Matches objects whose attribute at `key_path` equals `value`.
    pub fn equals(key_path: impl Into<String>, value: impl Into<AttributeValue>) -> Self {
        let key_path = key_path.into();
        let value = value.into();
        let description = format!("{key_path} == {value}");
        Self::new(description, move |attrs| {
            attrs.value(&key_path).as_ref() == Some(&value)
        })
    }

    /// Matches objects that have any value at `key_path`.
    pub fn is_set(key_path: impl Into<String>) -> Self {
        let key_path = key_path.into();
        let description = format!("{key_path} != nil");
        Self::new(description, move |attrs| attrs.value(&key_path).is_some())
    }

    /// Matches objects that satisfy both predicates.
    pub fn and(self, other: Predicate) -> Self {
        let description = format!("({}) AND ({})", self.description, other.description);
        Self::new(description, move |attrs| {
            self.evaluate(attrs) && other.evaluate(attrs)
        })
    }

    /// Returns the predicate's description.
    pub fn description(&self) -> &str {
        &self.description
    }

    /// Evaluates the predicate against an object's attributes.
    pub fn evaluate(&self, attrs: &dyn Attributes) -> bool {
        (self.test)(attrs)
    }
}

impl fmt::Debug for Predicate {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_tuple("Predicate").field(&self.description).finish()
    }
}

/// How a sort descriptor's key is maintained.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SortKind {
    /// The key is a regular attribute; its order is derived, not editable.
    #[default]
    Attribute,
    /// The key is an explicit position that the controller may rewrite to
    /// reorder objects.
    Manual,
}

fn default_ascending() -> bool {
    true
}

/// Describes one level of ordering for a fetch.
///
/// Unset values sort before set values in ascending order.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct SortDescriptor {
    /// Attribute key path to order by.
    pub key_path: String,
    /// Ascending (`true`) or descending order.
    #[serde(default = "default_ascending")]
    pub ascending: bool,
    /// Whether the key is a derived attribute or a manual position.
    #[serde(default)]
    pub kind: SortKind,
}

impl SortDescriptor {
    /// Orders by `key_path`, smallest first.
    pub fn ascending(key_path: impl Into<String>) -> Self {
        Self {
            key_path: key_path.into(),
            ascending: true,
            kind: SortKind::Attribute,
        }
    }

    /// Orders by `key_path`, largest first.
    pub fn descending(key_path: impl Into<String>) -> Self {
        Self {
            ascending: false,
            ..Self::ascending(key_path)
        }
    }

    /// Orders by an explicit integer position stored at `key_path`.
    ///
    /// A fetch sorted this way can be reordered by the controller.
    pub fn manual(key_path: impl Into<String>) -> Self {
        Self {
            kind: SortKind::Manual,
            ..Self::ascending(key_path)
        }
    }

    /// Returns `true` if this descriptor is a manual position.
    pub fn is_manual(&self) -> bool {
        self.kind == SortKind::Manual
    }

    /// Compares two (possibly unset) values under this descriptor.
    pub fn compare(&self, a: Option<&AttributeValue>, b: Option<&AttributeValue>) -> Ordering {
        let ordering = match (a, b) {
            (None, None) => Ordering::Equal,
            (None, Some(_)) => Ordering::Less,
            (Some(_), None) => Ordering::Greater,
            (Some(a), Some(b)) => a.compare(b),
        };
        if self.ascending {
            ordering
        } else {
            ordering.reverse()
        }
    }
}

/// Compares two rows of pre-extracted sort keys under a list of descriptors.
///
/// `a` and `b` hold one value per descriptor, in descriptor order.
pub fn compare_sort_keys(
    descriptors: &[SortDescriptor],
    a: &[Option<AttributeValue>],
    b: &[Option<AttributeValue>],
) -> Ordering {
    descriptors
        .iter()
        .zip(a.iter().zip(b.iter()))
        .map(|(descriptor, (a, b))| descriptor.compare(a.as_ref(), b.as_ref()))
        .find(|ordering| *ordering != Ordering::Equal)
        .unwrap_or(Ordering::Equal)
}

/// What a fetch request targets.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum FetchTarget<O> {
    /// Every object of the named entity.
    Entity(String),
    /// The target side of a relationship on a root object.
    Relationship {
        /// The object owning the relationship.
        root: O,
        /// The relationship key path on the root.
        key_path: String,
    },
}

/// A request for an ordered sequence of objects.
#[derive(Debug, Clone)]
pub struct FetchRequest<O> {
    /// What to fetch.
    pub target: FetchTarget<O>,
    /// Ordering, applied in sequence.
    pub sort: Vec<SortDescriptor>,
    /// Optional filter.
    pub predicate: Option<Predicate>,
}

impl<O> FetchRequest<O> {
    /// Creates a request for every object of an entity.
    pub fn entity(name: impl Into<String>) -> Self {
        Self {
            target: FetchTarget::Entity(name.into()),
            sort: Vec::new(),
            predicate: None,
        }
    }

    /// Creates a request for the target side of a relationship.
    pub fn relationship(root: O, key_path: impl Into<String>) -> Self {
        Self {
            target: FetchTarget::Relationship {
                root,
                key_path: key_path.into(),
            },
            sort: Vec::new(),
            predicate: None,
        }
    }

    /// Sets the sort descriptors.
    pub fn with_sort(mut self, sort: Vec<SortDescriptor>) -> Self {
        self.sort = sort;
        self
    }

    /// Sets the predicate.
    pub fn with_predicate(mut self, predicate: Option<Predicate>) -> Self {
        self.predicate = predicate;
        self
    }
}

/// Objects affected since the source last processed its pending changes.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ChangeSet<O> {
    /// Newly created objects.
    pub inserted: Vec<O>,
    /// Removed objects.
    pub deleted: Vec<O>,
    /// Objects whose attributes or relationships changed.
    pub updated: Vec<O>,
}

impl<O> Default for ChangeSet<O> {
    fn default() -> Self {
        Self {
            inserted: Vec::new(),
            deleted: Vec::new(),
            updated: Vec::new(),
        }
    }
}

impl<O> ChangeSet<O> {
    /// Returns `true` if no object is affected.
    pub fn is_empty(&self) -> bool {
        self.inserted.is_empty() && self.deleted.is_empty() && self.updated.is_empty()
    }

    /// Returns the number of affected objects.
    pub fn len(&self) -> usize {
        self.inserted.len() + self.deleted.len() + self.updated.len()
    }
}

/// The store collaborator the controller binds to.
///
/// All methods take `&self`; implementations use interior mutability so a
/// source can be shared between controllers and application code through an
/// `Arc`. Every call is made on the thread that owns the source.
pub trait ObjectSource: Send + Sync {
    /// Handle identifying one domain object. Two handles compare equal only
    /// if they identify the same object.
    type Object: Clone + Eq + Hash + fmt::Debug + Send + Sync + 'static;

    /// Returns the objects matching `request`, sorted by its descriptors.
    fn fetch(&self, request: &FetchRequest<Self::Object>) -> Result<Vec<Self::Object>, SourceError>;

    /// Allocates a new object of `entity`.
    fn insert(&self, entity: &str) -> Result<Self::Object, SourceError>;

    /// Removes an object.
    fn remove(&self, object: &Self::Object) -> Result<(), SourceError>;

    /// Persists all pending changes.
    fn save(&self) -> Result<(), SourceError>;

    /// Reads the value at `key_path` on `object`.
    fn attribute_value(&self, object: &Self::Object, key_path: &str) -> Option<AttributeValue>;

    /// Writes the value at `key_path` on `object`.
    fn set_attribute_value(
        &self,
        object: &Self::Object,
        key_path: &str,
        value: AttributeValue,
    ) -> Result<(), SourceError>;

    /// Returns `true` if the object currently exists in the store.
    fn contains(&self, object: &Self::Object) -> bool;

    /// Returns the entity name of `object`.
    fn entity_of(&self, object: &Self::Object) -> Option<String>;

    /// Returns `true` if `entity` is known to the store.
    fn has_entity(&self, entity: &str) -> bool;

    /// Returns the destination entity of the relationship `key_path` on
    /// `entity`, or `None` if the key path does not name a relationship.
    fn relationship_destination(&self, entity: &str, key_path: &str) -> Option<String>;

    /// Returns the objects on the target side of `key_path` on `object`.
    fn related_objects(&self, object: &Self::Object, key_path: &str) -> Vec<Self::Object>;

    /// Adds `target` to the relationship `key_path` of `object`, maintaining
    /// the inverse relationship if the store knows one.
    fn relate(
        &self,
        object: &Self::Object,
        key_path: &str,
        target: &Self::Object,
    ) -> Result<(), SourceError>;

    /// Delivers accumulated changes to [`changes`](Self::changes) listeners.
    fn process_pending_changes(&self) {}

    /// Signal emitted with each processed change set, if the source has one.
    fn changes(&self) -> Option<&Signal<ChangeSet<Self::Object>>> {
        None
    }
}
