//! Horizon Sections - sectioned list controllers over object stores.
//!
//! This is the main crate. It re-exports everything from
//! `horizon-sections-core` and adds:
//!
//! - [`source`]: the [`ObjectSource`](source::ObjectSource) collaborator
//!   trait and [`MemoryStore`](source::memory::MemoryStore), a complete
//!   in-memory implementation
//! - [`controller`]: [`SectionsController`](controller::SectionsController),
//!   which groups fetched objects into sections, maps them to index paths and
//!   reports changes as ordered insert/delete/update/move batches
//! - [`debug`]: a text rendering of the current sections
//!
//! # Example
//!
//! ```
//! use std::sync::Arc;
//! use horizon_sections::controller::{ControllerConfig, SectionsController};
//! use horizon_sections::source::memory::{EntityDescription, MemoryStore};
//! use horizon_sections::source::SortDescriptor;
//!
//! fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     let store = Arc::new(MemoryStore::new());
//!     store.define_entity(EntityDescription::new("Note").attribute("title"));
//!
//!     let config = ControllerConfig::query("Note").sort_by(SortDescriptor::ascending("title"));
//!     let controller = SectionsController::new(store, config)?;
//!     assert_eq!(controller.section_count(), 1);
//!     assert_eq!(controller.object_count(), 0);
//!     Ok(())
//! }
//! ```

pub use horizon_sections_core::*;

pub mod controller;
pub mod debug;
pub mod source;
