//! Grouping a sorted flat sequence into sections.
//!
//! The sectioner walks the object source's already-sorted output once and
//! opens a new section every time the section key changes. It never reorders
//! anything, so flattening its output reproduces the input exactly.
//!
//! The sort must place objects with equal keys next to each other; otherwise
//! the same key opens more than one section. With a [`ContiguityCheck`]
//! enabled, such keys are reported with a warning.
//!
//! [`ContiguityCheck`]: super::ContiguityCheck

use horizon_sections_core::logging::targets;
use horizon_sections_core::{AttributeValue, ValueDisplay};

/// One titled group of presented objects.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Section<O> {
    key: Option<AttributeValue>,
    title: Option<String>,
    objects: Vec<O>,
}

impl<O> Section<O> {
    /// Create a section.
    pub fn new(key: Option<AttributeValue>, title: Option<String>, objects: Vec<O>) -> Self {
        Self {
            key,
            title,
            objects,
        }
    }

    /// The section key, or `None` for the implicit section and for objects
    /// with no value at the key path.
    pub fn key(&self) -> Option<&AttributeValue> {
        self.key.as_ref()
    }

    /// The display title, or `None` when no section key path is configured.
    pub fn title(&self) -> Option<&str> {
        self.title.as_deref()
    }

    /// The ordered objects of the section.
    pub fn objects(&self) -> &[O] {
        &self.objects
    }

    pub(crate) fn objects_mut(&mut self) -> &mut Vec<O> {
        &mut self.objects
    }

    /// Number of objects in the section.
    pub fn len(&self) -> usize {
        self.objects.len()
    }

    /// Returns `true` if the section holds no objects.
    pub fn is_empty(&self) -> bool {
        self.objects.is_empty()
    }
}

/// Groups sorted objects into sections.
pub struct Sectioner<'a> {
    key_path: Option<&'a str>,
    formatter: &'a dyn Fn(&AttributeValue) -> String,
    check_contiguity: bool,
}

impl<'a> Sectioner<'a> {
    /// Create a sectioner for `key_path`, titling sections with `formatter`.
    pub fn new(key_path: Option<&'a str>, formatter: &'a dyn Fn(&AttributeValue) -> String) -> Self {
        Self {
            key_path,
            formatter,
            check_contiguity: false,
        }
    }

    /// Enable or disable the contiguity check.
    pub fn check_contiguity(mut self, enabled: bool) -> Self {
        self.check_contiguity = enabled;
        self
    }

    /// Groups `objects`, reading each object's key through `key_of`.
    ///
    /// Without a key path the result is exactly one untitled section, even
    /// when `objects` is empty.
    pub fn compute<O, F>(&self, objects: Vec<O>, key_of: F) -> Vec<Section<O>>
    where
        F: Fn(&O, &str) -> Option<AttributeValue>,
    {
        let Some(key_path) = self.key_path else {
            return vec![Section::new(None, None, objects)];
        };

        let mut sections: Vec<Section<O>> = Vec::new();
        for object in objects {
            let key = key_of(&object, key_path);
            match sections.last_mut() {
                Some(open) if open.key == key => open.objects.push(object),
                _ => {
                    let title = key
                        .as_ref()
                        .map(|k| (self.formatter)(k))
                        .unwrap_or_default();
                    sections.push(Section::new(key, Some(title), vec![object]));
                }
            }
        }

        if self.check_contiguity {
            for index in contiguity_violations(&sections) {
                tracing::warn!(
                    target: targets::SECTIONER,
                    key_path,
                    section = index,
                    key = ?sections[index].key,
                    "section key reappears after its section closed; sort does not group by the section key"
                );
            }
        }
        sections
    }
}

/// Returns the indexes of sections whose key already opened an earlier
/// section.
pub fn contiguity_violations<O>(sections: &[Section<O>]) -> Vec<usize> {
    sections
        .iter()
        .enumerate()
        .filter(|(index, section)| sections[..*index].iter().any(|s| s.key == section.key))
        .map(|(index, _)| index)
        .collect()
}

/// Concatenates the sections' objects in presentation order.
pub fn flatten<O: Clone>(sections: &[Section<O>]) -> Vec<O> {
    sections
        .iter()
        .flat_map(|section| section.objects.iter().cloned())
        .collect()
}

/// Title formatting through [`ValueDisplay`].
pub(crate) fn display_title(value: &AttributeValue) -> String {
    value.display_string()
}
