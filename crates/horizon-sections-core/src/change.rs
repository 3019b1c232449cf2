//! Change classification shared by the notifier and its observers.

use std::fmt;

/// The kind of change reported for an object or a section.
///
/// Sections only ever report [`Insert`](ChangeKind::Insert) and
/// [`Delete`](ChangeKind::Delete); objects may report all four kinds.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ChangeKind {
    /// The object or section appeared.
    Insert,
    /// The object or section disappeared.
    Delete,
    /// The object kept its position but its attributes changed.
    Update,
    /// The object changed position.
    Move,
}

impl ChangeKind {
    /// Returns a lowercase name suitable for logs.
    pub fn as_str(&self) -> &'static str {
        match self {
            ChangeKind::Insert => "insert",
            ChangeKind::Delete => "delete",
            ChangeKind::Update => "update",
            ChangeKind::Move => "move",
        }
    }
}

impl fmt::Display for ChangeKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Phase of the change notifier state machine.
///
/// ```text
/// Idle ──begin──> Collecting ──end──> Emitting ──done──> Idle
///                     │
///                     └──abort──> Idle
/// ```
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub enum NotifierState {
    /// No batch is in progress.
    #[default]
    Idle,
    /// A batch is open and raw mutations are being buffered.
    Collecting,
    /// The batch is being diffed and delivered to the observer.
    Emitting,
}

impl NotifierState {
    /// Returns a lowercase name suitable for logs and error messages.
    pub fn as_str(&self) -> &'static str {
        match self {
            NotifierState::Idle => "idle",
            NotifierState::Collecting => "collecting",
            NotifierState::Emitting => "emitting",
        }
    }
}

impl fmt::Display for NotifierState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}
