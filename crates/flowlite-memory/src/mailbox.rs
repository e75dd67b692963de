//! An in-memory [`EventStore`] mailbox.

use std::collections::HashMap;

use async_trait::async_trait;
use flowlite_core::{EventKind, EventRowId, EventStore, FlowId, InstanceId};
use tokio::sync::RwLock;
use uuid::Uuid;

pub struct InMemoryEventStore<E> {
    rows: RwLock<HashMap<EventRowId, (FlowId, InstanceId, E)>>,
}

impl<E> InMemoryEventStore<E> {
    pub fn new() -> Self {
        Self { rows: RwLock::new(HashMap::new()) }
    }
}

impl<E> Default for InMemoryEventStore<E> {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl<E: EventKind> EventStore<E> for InMemoryEventStore<E> {
    async fn append(&self, flow_id: &FlowId, instance_id: InstanceId, event: E) {
        let row_id = Uuid::new_v4();
        self.rows.write().await.insert(row_id, (flow_id.clone(), instance_id, event));
    }

    async fn peek(&self, flow_id: &FlowId, instance_id: InstanceId, candidates: &[E]) -> Option<(EventRowId, E)> {
        let rows = self.rows.read().await;
        rows.iter()
            .find(|(_, (f, i, e))| f == flow_id && *i == instance_id && candidates.contains(e))
            .map(|(id, (_, _, e))| (*id, e.clone()))
    }

    async fn delete(&self, event_row_id: EventRowId) -> bool {
        self.rows.write().await.remove(&event_row_id).is_some()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[derive(Debug, Clone, PartialEq, Eq, Hash)]
    enum Ev {
        Go,
        Stop,
    }

    #[tokio::test]
    async fn peek_finds_only_declared_candidates() {
        let store = InMemoryEventStore::<Ev>::new();
        let flow = FlowId::new("f");
        let instance = InstanceId::new_v4();
        store.append(&flow, instance, Ev::Stop).await;

        assert!(store.peek(&flow, instance, &[Ev::Go]).await.is_none());
        let found = store.peek(&flow, instance, &[Ev::Go, Ev::Stop]).await;
        assert_eq!(found.unwrap().1, Ev::Stop);
    }

    #[tokio::test]
    async fn delete_is_idempotent() {
        let store = InMemoryEventStore::<Ev>::new();
        let flow = FlowId::new("f");
        let instance = InstanceId::new_v4();
        store.append(&flow, instance, Ev::Go).await;
        let (row_id, _) = store.peek(&flow, instance, &[Ev::Go]).await.unwrap();

        assert!(store.delete(row_id).await);
        assert!(!store.delete(row_id).await);
    }
}
