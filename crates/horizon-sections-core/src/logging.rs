//! Logging facilities for Horizon Sections.
//!
//! Horizon Sections uses the `tracing` crate for instrumentation. To see logs,
//! install a tracing subscriber in your application:
//!
//! ```ignore
//! tracing_subscriber::fmt()
//!     .with_env_filter("horizon_sections=debug")
//!     .init();
//! ```
//!
//! Batches are logged at `debug`, individual change events at `trace`.
//! Precondition violations that do not fail an operation (a sort that does not
//! keep section keys contiguous, a relationship member that is not wired back
//! to its root) are logged at `warn`.

/// Span names used throughout Horizon Sections for tracing.
pub mod span_names {
    /// One complete change batch (collect, diff, emit).
    pub const BATCH: &str = "horizon_sections::batch";
    /// A snapshot fetch and sectioning pass.
    pub const SNAPSHOT: &str = "horizon_sections::snapshot";
}

/// Target names for log filtering.
///
/// Use these with `tracing` directives to filter logs by subsystem.
pub mod targets {
    /// Core types target.
    pub const CORE: &str = "horizon_sections_core";
    /// Signal system target.
    pub const SIGNAL: &str = "horizon_sections_core::signal";
    /// Controller (lookups and mutation facade) target.
    pub const CONTROLLER: &str = "horizon_sections::controller";
    /// Change notifier target.
    pub const NOTIFIER: &str = "horizon_sections::notifier";
    /// Sectioner target.
    pub const SECTIONER: &str = "horizon_sections::sectioner";
    /// Object source target.
    pub const SOURCE: &str = "horizon_sections::source";
    /// Performance spans target.
    pub const PERF: &str = "horizon_sections::perf";
}

/// A guard that keeps a tracing span entered until dropped.
///
/// This is useful for tracking the duration of operations.
#[derive(Debug)]
pub struct PerfSpan {
    #[allow(dead_code)]
    span: tracing::span::EnteredSpan,
}

impl PerfSpan {
    /// Create a new performance span.
    ///
    /// The span will be active until the guard is dropped.
    pub fn new(name: &'static str) -> Self {
        let span = tracing::info_span!(target: "horizon_sections::perf", "perf", operation = name);
        Self {
            span: span.entered(),
        }
    }
}
