//! Error types for Horizon Sections.

use crate::change::NotifierState;
use crate::index_path::IndexPath;

/// Errors reported by an object source (the store collaborator).
#[derive(Debug, thiserror::Error)]
pub enum SourceError {
    /// The entity is not known to the store.
    #[error("unknown entity '{0}'")]
    UnknownEntity(String),

    /// The object does not exist in the store (never inserted, or removed).
    #[error("unknown object {0}")]
    UnknownObject(String),

    /// The key path does not resolve on the entity.
    #[error("key path '{key_path}' does not resolve on entity '{entity}'")]
    UnknownKeyPath { entity: String, key_path: String },

    /// The store refused to save its pending changes.
    #[error("save rejected: {0}")]
    SaveRejected(String),

    /// Failure reported by a store backend.
    #[error("store backend failure: {0}")]
    Backend(#[source] Box<dyn std::error::Error + Send + Sync>),
}

impl SourceError {
    /// Create an unknown-object error from anything debuggable.
    pub fn unknown_object(object: impl std::fmt::Debug) -> Self {
        Self::UnknownObject(format!("{object:?}"))
    }

    /// Create an unknown-key-path error.
    pub fn unknown_key_path(entity: impl Into<String>, key_path: impl Into<String>) -> Self {
        Self::UnknownKeyPath {
            entity: entity.into(),
            key_path: key_path.into(),
        }
    }

    /// Wrap a backend error.
    pub fn backend(err: impl std::error::Error + Send + Sync + 'static) -> Self {
        Self::Backend(Box::new(err))
    }
}

/// The main error type for controller operations.
///
/// | Variant | Meaning | Caller reaction |
/// |---|---|---|
/// | `Configuration` | invalid binding at construction | fatal, do not retry |
/// | `NotFound` | stale object or index path | refresh and retry |
/// | `IndexOutOfRange` | lookup outside the presented bounds | programmer error |
/// | `Reentrancy` | batch overlap | programmer error |
/// | `UnsupportedOperation` | move on a non-reorderable sort | do not offer the operation |
/// | `Persistence` | the store failed to save | retry the commit or discard |
/// | `Source` | any other store failure | propagate |
#[derive(Debug, thiserror::Error)]
pub enum ControllerError {
    /// The controller binding is invalid.
    #[error("invalid controller configuration: {0}")]
    Configuration(String),

    /// The object or index path does not resolve to a presented object.
    #[error("not found: {0}")]
    NotFound(String),

    /// A section or row lookup is outside the presented bounds.
    #[error("{target} is out of range (limit {limit})")]
    IndexOutOfRange { target: String, limit: usize },

    /// A batch operation was attempted in the wrong notifier state.
    #[error("cannot {operation} while the change notifier is {state}")]
    Reentrancy {
        operation: &'static str,
        state: NotifierState,
    },

    /// The operation is not supported by the current binding.
    #[error("unsupported operation: {0}")]
    UnsupportedOperation(String),

    /// Saving the store failed; the presentation is unchanged.
    #[error("failed to persist changes: {0}")]
    Persistence(#[source] SourceError),

    /// A store primitive other than save failed.
    #[error("object source error: {0}")]
    Source(#[from] SourceError),
}

impl ControllerError {
    /// Create a configuration error.
    pub fn configuration(message: impl Into<String>) -> Self {
        Self::Configuration(message.into())
    }

    /// Create a not-found error for an object.
    pub fn object_not_found(object: impl std::fmt::Debug) -> Self {
        Self::NotFound(format!("object {object:?} is not presented"))
    }

    /// Create a not-found error for an index path.
    pub fn path_not_found(path: IndexPath) -> Self {
        Self::NotFound(format!("index path {path} does not resolve"))
    }

    /// Create an out-of-range error for a section lookup.
    pub fn section_out_of_range(section: usize, section_count: usize) -> Self {
        Self::IndexOutOfRange {
            target: format!("section {section}"),
            limit: section_count,
        }
    }

    /// Create an out-of-range error for a row lookup.
    pub fn row_out_of_range(path: IndexPath, row_count: usize) -> Self {
        Self::IndexOutOfRange {
            target: format!("row {} in section {}", path.row(), path.section()),
            limit: row_count,
        }
    }

    /// Create a reentrancy error.
    pub fn reentrancy(operation: &'static str, state: NotifierState) -> Self {
        Self::Reentrancy { operation, state }
    }

    /// Create an unsupported-operation error.
    pub fn unsupported(message: impl Into<String>) -> Self {
        Self::UnsupportedOperation(message.into())
    }

    /// Returns `true` if the caller may reasonably retry after refreshing.
    pub fn is_recoverable(&self) -> bool {
        matches!(
            self,
            Self::NotFound(_) | Self::UnsupportedOperation(_) | Self::Persistence(_)
        )
    }
}

/// A specialized Result type for controller operations.
pub type Result<T> = std::result::Result<T, ControllerError>;
