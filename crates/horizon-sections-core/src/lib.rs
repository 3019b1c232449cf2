//! Core types for Horizon Sections.
//!
//! This crate provides the foundations shared by the sectioned list
//! controller and the object sources it binds to:
//!
//! - **Index paths**: (section, row) coordinates of presented objects
//! - **Attribute values**: the typed values objects expose, with the
//!   display capability used for section titles
//! - **Change kinds**: the insert/delete/update/move classification and the
//!   notifier state machine phases
//! - **Signals**: synchronous slots for store change notifications
//! - **Errors**: the controller and object source error taxonomy
//!
//! # Example
//!
//! ```
//! use horizon_sections_core::{AttributeValue, IndexPath, ValueDisplay};
//!
//! let key = AttributeValue::from(2024i64);
//! assert_eq!(key.display_string(), "2024");
//!
//! let path = IndexPath::new(0, 2);
//! assert_eq!(path.to_string(), "(0, 2)");
//! ```

mod change;
mod error;
mod index_path;
pub mod logging;
pub mod signal;
mod value;

pub use change::{ChangeKind, NotifierState};
pub use error::{ControllerError, Result, SourceError};
pub use index_path::IndexPath;
pub use logging::PerfSpan;
pub use signal::{ConnectionId, Signal};
pub use value::{AttributeValue, CustomValue, Decimal, ParseDecimalError, ValueDisplay};
