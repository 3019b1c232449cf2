//! Index paths for addressing objects in a sectioned list.
//!
//! An `IndexPath` is the (section, row) coordinate a list surface uses to
//! locate a presented object. Unlike a hierarchical model index it is a plain
//! `Copy` value: section and row are enough to identify any position.

use std::fmt;

/// A (section, row) coordinate identifying an object's presentation position.
///
/// Index paths are only meaningful relative to the snapshot they were obtained
/// from. After a change batch (inserts, deletes, moves) a previously obtained
/// path may resolve to a different object or to nothing at all.
///
/// # Ordering
///
/// Index paths order by section first, then by row, which is the order in
/// which a list surface lays them out.
///
/// # Example
///
/// ```
/// use horizon_sections_core::IndexPath;
///
/// let path = IndexPath::new(1, 3);
/// assert_eq!(path.section(), 1);
/// assert_eq!(path.row(), 3);
/// assert!(IndexPath::new(0, 9) < path);
/// ```
#[derive(Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Default)]
pub struct IndexPath {
    section: usize,
    row: usize,
}

impl IndexPath {
    /// Creates an index path for the given section and row.
    #[inline]
    pub const fn new(section: usize, row: usize) -> Self {
        Self { section, row }
    }

    /// Returns the section component.
    #[inline]
    pub const fn section(&self) -> usize {
        self.section
    }

    /// Returns the row within the section.
    #[inline]
    pub const fn row(&self) -> usize {
        self.row
    }

    /// Returns a path in the same section at a different row.
    #[inline]
    pub const fn with_row(&self, row: usize) -> Self {
        Self::new(self.section, row)
    }

    /// Returns a path at the same row in a different section.
    #[inline]
    pub const fn with_section(&self, section: usize) -> Self {
        Self::new(section, self.row)
    }
}

impl fmt::Debug for IndexPath {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "IndexPath({}, {})", self.section, self.row)
    }
}

impl fmt::Display for IndexPath {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "({}, {})", self.section, self.row)
    }
}

impl From<(usize, usize)> for IndexPath {
    fn from((section, row): (usize, usize)) -> Self {
        Self::new(section, row)
    }
}

impl From<IndexPath> for (usize, usize) {
    fn from(path: IndexPath) -> Self {
        (path.section, path.row)
    }
}
