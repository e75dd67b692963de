//! Stage status (spec §3 "Stage status").

use serde::{Deserialize, Serialize};

/// The lifecycle state of an instance's current stage.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum StageStatus {
    /// Not currently being worked; eligible to be claimed by a tick.
    Pending,
    /// Claimed by a tick; exactly one worker may hold this at a time.
    Running,
    /// The instance finished at a terminal stage.
    Completed,
    /// The last unit of work failed; awaits `retry` or `cancel`.
    Error,
    /// Cancelled by an operator; no further ticks are scheduled.
    Cancelled,
}

impl StageStatus {
    /// Whether an instance in this status is done advancing on its own.
    pub fn is_terminal(self) -> bool {
        matches!(self, StageStatus::Completed | StageStatus::Cancelled)
    }
}
