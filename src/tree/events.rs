//! Structural change events

use crate::types::EntryId;

/// Event emitted after a structural mutation has committed
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TreeEvent {
    Renamed {
        target: EntryId,
        old_name: String,
        old_path: String,
        new_path: String,
    },
    /// Also emitted for a first attachment, with `old_parent_path = None`.
    Moved {
        target: EntryId,
        old_path: String,
        old_parent_path: Option<String>,
        new_path: String,
    },
    /// Emitted for the mutated entry and for every descendant whose path changed.
    PathChanged {
        target: EntryId,
        old_path: String,
        new_path: String,
    },
    Deleted {
        target: EntryId,
        path: String,
    },
}

impl TreeEvent {
    pub fn target(&self) -> EntryId {
        match self {
            TreeEvent::Renamed { target, .. }
            | TreeEvent::Moved { target, .. }
            | TreeEvent::PathChanged { target, .. }
            | TreeEvent::Deleted { target, .. } => *target,
        }
    }
}

/// Receives tree events, synchronously on the mutating thread
pub trait TreeListener: Send + Sync {
    fn on_event(&self, event: &TreeEvent);
}

impl<F> TreeListener for F
where
    F: Fn(&TreeEvent) + Send + Sync,
{
    fn on_event(&self, event: &TreeEvent) {
        self(event)
    }
}
