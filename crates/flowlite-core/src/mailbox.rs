//! The Event Store interface: a durable per-instance mailbox (spec §4.C).

use async_trait::async_trait;
use uuid::Uuid;

use crate::ids::{EventKind, FlowId, InstanceId};

/// Storage id of one enqueued event, used to delete it once consumed.
pub type EventRowId = Uuid;

/// Durable per-instance mailbox of pending events.
#[async_trait]
pub trait EventStore<E: EventKind>: Send + Sync {
    /// Append an event to an instance's mailbox.
    async fn append(&self, flow_id: &FlowId, instance_id: InstanceId, event: E);

    /// Return one stored event whose kind is among `candidates`, with its
    /// storage id, or `None` if no candidate is present. Which candidate is
    /// returned when several are present is implementation-defined, but
    /// stable for a given store state.
    async fn peek(&self, flow_id: &FlowId, instance_id: InstanceId, candidates: &[E]) -> Option<(EventRowId, E)>;

    /// Remove a stored event by its row id. Idempotent; returns whether a
    /// row was actually removed.
    async fn delete(&self, event_row_id: EventRowId) -> bool;
}
