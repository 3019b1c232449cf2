//! Controller configuration.
//!
//! A controller is configured once, at construction, with a
//! [`ControllerConfig`]. The binding (what to fetch) is fixed for the lifetime
//! of the controller; presenting a different entity or root object requires a
//! new controller.
//!
//! The presentation part of the configuration ([`FetchOptions`]) is plain data
//! and can be loaded from TOML or JSON:
//!
//! ```
//! use horizon_sections::controller::FetchOptions;
//!
//! let options = FetchOptions::from_toml_str(r#"
//!     section_key_path = "day"
//!
//!     [[sort_descriptors]]
//!     key_path = "day"
//!
//!     [[sort_descriptors]]
//!     key_path = "starts_at"
//!     ascending = false
//! "#).unwrap();
//! assert_eq!(options.sort_descriptors.len(), 2);
//! ```

use std::fmt;
use std::sync::Arc;

use horizon_sections_core::{AttributeValue, ControllerError, Result};
use serde::{Deserialize, Serialize};

use crate::source::{Predicate, SortDescriptor};

/// Formats a section key into a section title.
pub type TitleFormatter = Arc<dyn Fn(&AttributeValue) -> String + Send + Sync>;

/// Returns the formatter that uses each value's
/// [`ValueDisplay`](horizon_sections_core::ValueDisplay) impl.
pub fn default_title_formatter() -> TitleFormatter {
    Arc::new(super::sectioner::display_title)
}

/// When the sectioner verifies that equal section keys are contiguous.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ContiguityCheck {
    /// Never check.
    Off,
    /// Check in builds with debug assertions enabled.
    #[default]
    DebugOnly,
    /// Always check.
    Always,
}

impl ContiguityCheck {
    /// Returns `true` if the check runs in the current build.
    pub fn is_enabled(self) -> bool {
        match self {
            ContiguityCheck::Off => false,
            ContiguityCheck::DebugOnly => cfg!(debug_assertions),
            ContiguityCheck::Always => true,
        }
    }
}

/// Ordering and grouping of the presented collection.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct FetchOptions {
    /// Sort descriptors, applied in sequence by the object source.
    pub sort_descriptors: Vec<SortDescriptor>,
    /// Key path whose value groups objects into sections. `None` presents a
    /// single untitled section.
    pub section_key_path: Option<String>,
    /// Verification of the contiguous-keys precondition.
    pub contiguity_check: ContiguityCheck,
}

impl FetchOptions {
    /// Create empty options.
    pub fn new() -> Self {
        Self::default()
    }

    /// Parse options from TOML.
    pub fn from_toml_str(input: &str) -> Result<Self> {
        toml::from_str(input)
            .map_err(|e| ControllerError::configuration(format!("invalid fetch options: {e}")))
    }

    /// Parse options from JSON.
    pub fn from_json_str(input: &str) -> Result<Self> {
        serde_json::from_str(input)
            .map_err(|e| ControllerError::configuration(format!("invalid fetch options: {e}")))
    }

    /// Append a sort descriptor.
    pub fn sort_by(mut self, descriptor: SortDescriptor) -> Self {
        self.sort_descriptors.push(descriptor);
        self
    }

    /// Set the section key path.
    pub fn section_key_path(mut self, key_path: impl Into<String>) -> Self {
        self.section_key_path = Some(key_path.into());
        self
    }

    /// Set the contiguity check mode.
    pub fn contiguity_check(mut self, check: ContiguityCheck) -> Self {
        self.contiguity_check = check;
        self
    }

    /// Returns the manual-order descriptor if the presentation can be
    /// reordered by hand.
    ///
    /// That is the case when a [`Manual`](crate::source::SortKind::Manual)
    /// descriptor exists and every descriptor before it sorts on the section
    /// key path. Any other leading descriptor would override the manual
    /// position.
    pub fn manual_order(&self) -> Option<&SortDescriptor> {
        for descriptor in &self.sort_descriptors {
            if descriptor.is_manual() {
                return Some(descriptor);
            }
            if self.section_key_path.as_deref() != Some(descriptor.key_path.as_str()) {
                return None;
            }
        }
        None
    }
}

/// What the controller is bound to.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Binding<O> {
    /// All objects of an entity.
    Query {
        /// Entity name.
        entity: String,
    },
    /// The target side of a relationship on a root object.
    Relationship {
        /// Owner of the relationship. Required.
        root: Option<O>,
        /// Relationship key path on the root.
        key_path: String,
        /// Inverse relationship on the members, pointing back at the root.
        inverse_key_path: Option<String>,
        /// Entity of the members. Derived from the relationship when unset.
        entity: Option<String>,
    },
}

/// Full configuration of a
/// [`SectionsController`](crate::controller::SectionsController).
///
/// # Example
///
/// ```
/// use horizon_sections::controller::{ControllerConfig, ContiguityCheck};
/// use horizon_sections::source::SortDescriptor;
///
/// let config = ControllerConfig::<u32>::query("Event")
///     .sort_by(SortDescriptor::ascending("day"))
///     .sort_by(SortDescriptor::ascending("title"))
///     .section_key_path("day")
///     .contiguity_check(ContiguityCheck::Always);
/// assert_eq!(config.options.sort_descriptors.len(), 2);
/// ```
#[derive(Clone)]
pub struct ControllerConfig<O> {
    /// What to fetch.
    pub binding: Binding<O>,
    /// Filter applied by the source.
    pub predicate: Option<Predicate>,
    /// Ordering and grouping.
    pub options: FetchOptions,
    /// Section title formatting. Defaults to [`default_title_formatter`].
    pub title_formatter: Option<TitleFormatter>,
}

impl<O> ControllerConfig<O> {
    fn with_binding(binding: Binding<O>) -> Self {
        Self {
            binding,
            predicate: None,
            options: FetchOptions::default(),
            title_formatter: None,
        }
    }

    /// Bind to every object of `entity`.
    pub fn query(entity: impl Into<String>) -> Self {
        Self::with_binding(Binding::Query {
            entity: entity.into(),
        })
    }

    /// Bind to the relationship `key_path` of a root object set with
    /// [`root`](Self::root).
    pub fn relationship(key_path: impl Into<String>) -> Self {
        Self::with_binding(Binding::Relationship {
            root: None,
            key_path: key_path.into(),
            inverse_key_path: None,
            entity: None,
        })
    }

    /// Set the root object of a relationship binding.
    pub fn root(mut self, object: O) -> Self {
        if let Binding::Relationship { root, .. } = &mut self.binding {
            *root = Some(object);
        }
        self
    }

    /// Set the inverse relationship of a relationship binding.
    pub fn inverse(mut self, key_path: impl Into<String>) -> Self {
        if let Binding::Relationship {
            inverse_key_path, ..
        } = &mut self.binding
        {
            *inverse_key_path = Some(key_path.into());
        }
        self
    }

    /// Set the entity: the queried entity, or the member entity of a
    /// relationship binding.
    pub fn entity(mut self, name: impl Into<String>) -> Self {
        match &mut self.binding {
            Binding::Query { entity } => *entity = name.into(),
            Binding::Relationship { entity, .. } => *entity = Some(name.into()),
        }
        self
    }

    /// Set the fetch predicate.
    pub fn predicate(mut self, predicate: Predicate) -> Self {
        self.predicate = Some(predicate);
        self
    }

    /// Append a sort descriptor.
    pub fn sort_by(mut self, descriptor: SortDescriptor) -> Self {
        self.options.sort_descriptors.push(descriptor);
        self
    }

    /// Set the section key path.
    pub fn section_key_path(mut self, key_path: impl Into<String>) -> Self {
        self.options.section_key_path = Some(key_path.into());
        self
    }

    /// Set the contiguity check mode.
    pub fn contiguity_check(mut self, check: ContiguityCheck) -> Self {
        self.options.contiguity_check = check;
        self
    }

    /// Replace the fetch options wholesale.
    pub fn options(mut self, options: FetchOptions) -> Self {
        self.options = options;
        self
    }

    /// Set a custom section title formatter.
    pub fn title_formatter<F>(mut self, formatter: F) -> Self
    where
        F: Fn(&AttributeValue) -> String + Send + Sync + 'static,
    {
        self.title_formatter = Some(Arc::new(formatter));
        self
    }
}

impl<O: fmt::Debug> fmt::Debug for ControllerConfig<O> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ControllerConfig")
            .field("binding", &self.binding)
            .field("predicate", &self.predicate)
            .field("options", &self.options)
            .field("custom_titles", &self.title_formatter.is_some())
            .finish()
    }
}
