//! Bidirectional object/index-path mapping.

use std::collections::HashMap;
use std::fmt::Debug;
use std::hash::Hash;

use horizon_sections_core::logging::targets;
use horizon_sections_core::{ControllerError, IndexPath, Result};

use super::sectioner::{flatten, Section};

/// An immutable snapshot of the presented sections and the mapping between
/// objects and their [`IndexPath`]s.
///
/// The mapping is derived from the sections alone: section is the position
/// in the section list, row the position inside that section. Every
/// presented object resolves to exactly one index path and every in-range
/// index path to exactly one object.
#[derive(Debug, Clone)]
pub struct IndexMapper<O> {
    sections: Vec<Section<O>>,
    paths: HashMap<O, IndexPath>,
}

impl<O: Clone + Eq + Hash + Debug> IndexMapper<O> {
    /// Builds the mapping for `sections`.
    ///
    /// An object appearing twice keeps its first index path; the duplicate
    /// is dropped from its section.
    pub fn new(mut sections: Vec<Section<O>>) -> Self {
        let mut paths = HashMap::new();
        for (section_index, section) in sections.iter_mut().enumerate() {
            let mut row = 0;
            section.objects_mut().retain(|object| {
                if paths.contains_key(object) {
                    tracing::warn!(target: targets::CONTROLLER, ?object, "duplicate object in fetch result");
                    return false;
                }
                paths.insert(object.clone(), IndexPath::new(section_index, row));
                row += 1;
                true
            });
        }
        Self { sections, paths }
    }

    /// An empty mapping with a single empty, untitled section.
    pub fn empty() -> Self {
        Self::new(vec![Section::new(None, None, Vec::new())])
    }

    /// The presented sections.
    pub fn sections(&self) -> &[Section<O>] {
        &self.sections
    }

    /// Number of sections.
    pub fn section_count(&self) -> usize {
        self.sections.len()
    }

    /// Total number of presented objects.
    pub fn object_count(&self) -> usize {
        self.paths.len()
    }

    /// Returns `true` if `object` is presented.
    pub fn contains(&self, object: &O) -> bool {
        self.paths.contains_key(object)
    }

    /// Returns the section at `section`.
    pub fn section(&self, section: usize) -> Result<&Section<O>> {
        self.sections
            .get(section)
            .ok_or_else(|| ControllerError::section_out_of_range(section, self.sections.len()))
    }

    /// Number of objects in `section`.
    pub fn object_count_in_section(&self, section: usize) -> Result<usize> {
        self.section(section).map(Section::len)
    }

    /// Title of `section`.
    pub fn title(&self, section: usize) -> Result<Option<&str>> {
        self.section(section).map(Section::title)
    }

    /// Index path of `object`.
    pub fn index_path(&self, object: &O) -> Result<IndexPath> {
        self.paths
            .get(object)
            .copied()
            .ok_or_else(|| ControllerError::object_not_found(object))
    }

    /// Object at `path`.
    pub fn object_at(&self, path: IndexPath) -> Result<&O> {
        let section = self.section(path.section())?;
        section
            .objects()
            .get(path.row())
            .ok_or_else(|| ControllerError::row_out_of_range(path, section.len()))
    }

    /// Every presented object in presentation order.
    pub fn all_objects(&self) -> Vec<O> {
        flatten(&self.sections)
    }

    /// Iterates `(index path, object)` pairs in presentation order.
    pub fn iter(&self) -> impl Iterator<Item = (IndexPath, &O)> + '_ {
        self.sections.iter().enumerate().flat_map(|(s, section)| {
            section
                .objects()
                .iter()
                .enumerate()
                .map(move |(r, object)| (IndexPath::new(s, r), object))
        })
    }
}
