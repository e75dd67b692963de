//! Error taxonomy surfaced by the builder and the engine (spec §7).

use std::fmt;

use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Raised by `FlowBuilder::build()` when the declared graph violates one of
/// the stage-definition invariants.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum BuildError {
    #[error("stage {0} already has an action attached")]
    DuplicateAction(String),
    #[error("`action()` called with no current stage in scope")]
    ActionWithoutStage,
    #[error("`wait_for()` called with no current stage in scope")]
    WaitForWithoutStage,
    #[error("stage {0} declares the event {1} more than once")]
    DuplicateEventHandler(String, String),
    #[error("stage {0} mixes event handlers with an action, automatic transition, or condition")]
    MixedWaitingAndActive(String),
    #[error("stage {0} is marked terminal but also declares an action, transition, condition, or handler")]
    TerminalStageNotPure(String),
    #[error("stage {0} has an action but no next stage or condition to continue to")]
    DanglingAction(String),
    #[error("stage {0} references undefined target stage {1}")]
    UnknownTargetStage(String, String),
    #[error("flow has neither an initial stage nor an initial condition")]
    MissingInitial,
    #[error("flow must not set both an initial stage and an initial condition")]
    AmbiguousInitial,
    #[error("top-level `condition()` called with stages already declared and no pending target to resolve")]
    ConditionWithoutTarget,
}

/// The error taxonomy surfaced by engine operations (spec §7).
#[derive(Debug, Error, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum FlowError {
    #[error("flow {0} is not registered")]
    UnknownFlow(String),
    #[error("instance not found")]
    NotFound,
    #[error("conflicting concurrent write")]
    Conflict,
    #[error("action failed: {0}")]
    ActionFailure(String),
    #[error("instance references undefined stage {0}")]
    UnknownStage(String),
    #[error("invalid operation: {0}")]
    InvalidOperation(String),
}

/// The error an action raises when it cannot produce a new state (spec §3
/// "Stage definition": "An action may fail (raise)").
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ActionError {
    pub error_type: String,
    pub message: String,
}

impl ActionError {
    pub fn new(error_type: impl Into<String>, message: impl Into<String>) -> Self {
        Self {
            error_type: error_type.into(),
            message: message.into(),
        }
    }
}

impl fmt::Display for ActionError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}: {}", self.error_type, self.message)
    }
}

impl std::error::Error for ActionError {}
