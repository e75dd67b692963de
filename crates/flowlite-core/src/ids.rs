//! Identifier types shared across the flow definition and engine.

use std::fmt;
use std::hash::Hash;

use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Globally unique identifier for a flow instance (spec: "128-bit").
pub type InstanceId = Uuid;

/// Identifies a registered flow definition, e.g. `"order-fulfillment"`.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct FlowId(pub String);

impl FlowId {
    pub fn new(id: impl Into<String>) -> Self {
        Self(id.into())
    }
}

impl fmt::Display for FlowId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl From<&str> for FlowId {
    fn from(s: &str) -> Self {
        Self(s.to_string())
    }
}

impl From<String> for FlowId {
    fn from(s: String) -> Self {
        Self(s)
    }
}

/// Bound satisfied by any type usable as a stage identifier: drawn from a
/// user-provided finite set and compared by value (spec §3 "Stage").
pub trait StageId: Clone + Eq + Hash + fmt::Debug + Send + Sync + 'static {}
impl<T: Clone + Eq + Hash + fmt::Debug + Send + Sync + 'static> StageId for T {}

/// Bound satisfied by any type usable as an event identifier (spec §3
/// "Event").
pub trait EventKind: Clone + Eq + Hash + fmt::Debug + Send + Sync + 'static {}
impl<T: Clone + Eq + Hash + fmt::Debug + Send + Sync + 'static> EventKind for T {}
