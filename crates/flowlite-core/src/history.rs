//! The History Store interface: an append-only journal (spec §4.E).

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::ids::{EventKind, FlowId, InstanceId, StageId};
use crate::status::StageStatus;

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct HistoryEntry<S, E> {
    pub flow_id: FlowId,
    pub instance_id: InstanceId,
    pub at: DateTime<Utc>,
    pub kind: HistoryEntryKind<S, E>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub enum HistoryEntryKind<S, E> {
    InstanceStarted { stage: S },
    EventAppended { event: E },
    StatusChanged { from: StageStatus, to: StageStatus },
    StageChanged { from: S, to: S },
    Error {
        stage: S,
        error_type: String,
        error_message: String,
        error_stack_trace: Option<String>,
    },
    Cancelled { stage: S },
}

/// Append-only journal. A failed append must never fail the tick that
/// produced it — the trait signature reflects that by returning no
/// `Result`: implementations are responsible for logging their own
/// best-effort write failures internally.
#[async_trait]
pub trait HistoryStore<S, E>: Send + Sync
where
    S: StageId,
    E: EventKind,
{
    async fn append(&self, entry: HistoryEntry<S, E>);

    async fn timeline(&self, flow_id: &FlowId, instance_id: InstanceId) -> Vec<HistoryEntry<S, E>>;
}
