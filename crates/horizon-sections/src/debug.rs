//! Text rendering of a presentation for debugging.
//!
//! ```
//! use horizon_sections::controller::{IndexMapper, Section};
//! use horizon_sections::debug::{SectionTreeDebug, TreeStyle};
//! use horizon_sections_core::AttributeValue;
//!
//! let mapper = IndexMapper::new(vec![
//!     Section::new(Some(AttributeValue::from(1i64)), Some("1".into()), vec!["A", "B"]),
//!     Section::new(Some(AttributeValue::from(2i64)), Some("2".into()), vec!["C"]),
//! ]);
//! let text = SectionTreeDebug::new().style(TreeStyle::Ascii).format(&mapper);
//! assert_eq!(text, "\
//! Sections (2 sections, 3 objects):
//! +-- \"1\" [2]
//! |   +-- (0, 0) \"A\"
//! |   `-- (0, 1) \"B\"
//! `-- \"2\" [1]
//!     `-- (1, 0) \"C\"
//! ");
//! ```

use std::fmt::Debug;
use std::hash::Hash;

use crate::controller::IndexMapper;

/// Characters used to draw the tree.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum TreeStyle {
    /// ASCII characters for tree branches.
    Ascii,
    /// Unicode box-drawing characters.
    #[default]
    Unicode,
    /// One line per section, no object rows.
    Compact,
}

impl TreeStyle {
    /// (continuation, branch, last branch)
    fn glyphs(self) -> (&'static str, &'static str, &'static str) {
        match self {
            TreeStyle::Ascii => ("|   ", "+-- ", "`-- "),
            TreeStyle::Unicode => ("\u{2502}   ", "\u{251c}\u{2500}\u{2500} ", "\u{2514}\u{2500}\u{2500} "),
            TreeStyle::Compact => ("", "- ", "- "),
        }
    }
}

/// Renders the sections of an [`IndexMapper`] as an indented tree.
#[derive(Debug, Clone)]
pub struct SectionTreeDebug {
    style: TreeStyle,
    show_paths: bool,
    max_rows: Option<usize>,
}

impl Default for SectionTreeDebug {
    fn default() -> Self {
        Self::new()
    }
}

impl SectionTreeDebug {
    /// Create a renderer with Unicode glyphs and index paths shown.
    pub fn new() -> Self {
        Self {
            style: TreeStyle::default(),
            show_paths: true,
            max_rows: None,
        }
    }

    /// Set the drawing style.
    pub fn style(mut self, style: TreeStyle) -> Self {
        self.style = style;
        self
    }

    /// Show or hide the index path in front of each object.
    pub fn show_paths(mut self, show: bool) -> Self {
        self.show_paths = show;
        self
    }

    /// Limit the number of rows printed per section.
    pub fn max_rows(mut self, max: usize) -> Self {
        self.max_rows = Some(max);
        self
    }

    /// Renders `mapper`, labelling objects with their `Debug` output.
    pub fn format<O>(&self, mapper: &IndexMapper<O>) -> String
    where
        O: Clone + Eq + Hash + Debug,
    {
        self.format_with(mapper, |object| format!("{object:?}"))
    }

    /// Renders `mapper`, labelling objects with `label`.
    pub fn format_with<O, F>(&self, mapper: &IndexMapper<O>, label: F) -> String
    where
        O: Clone + Eq + Hash + Debug,
        F: Fn(&O) -> String,
    {
        let (continuation, branch, last_branch) = self.style.glyphs();
        let mut output = format!(
            "Sections ({} sections, {} objects):\n",
            mapper.section_count(),
            mapper.object_count()
        );

        let section_count = mapper.section_count();
        for (s, section) in mapper.sections().iter().enumerate() {
            let section_is_last = s + 1 == section_count;
            let title = match section.title() {
                Some(title) => format!("{title:?}"),
                None => "(untitled)".to_string(),
            };
            output.push_str(if section_is_last { last_branch } else { branch });
            output.push_str(&format!("{title} [{}]\n", section.len()));

            if self.style == TreeStyle::Compact {
                continue;
            }
            let indent = if section_is_last { "    " } else { continuation };
            let shown = self.max_rows.unwrap_or(usize::MAX).min(section.len());
            let hidden = section.len() - shown;
            for (r, object) in section.objects().iter().take(shown).enumerate() {
                let row_is_last = r + 1 == shown && hidden == 0;
                output.push_str(indent);
                output.push_str(if row_is_last { last_branch } else { branch });
                if self.show_paths {
                    output.push_str(&format!("({s}, {r}) "));
                }
                output.push_str(&label(object));
                output.push('\n');
            }
            if hidden > 0 {
                output.push_str(indent);
                output.push_str(last_branch);
                output.push_str(&format!("... {hidden} more\n"));
            }
        }
        output
    }
}
