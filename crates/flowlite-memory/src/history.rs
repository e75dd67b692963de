//! An in-memory append-only [`HistoryStore`].

use async_trait::async_trait;
use flowlite_core::{EventKind, FlowId, HistoryEntry, HistoryStore, InstanceId, StageId};
use tokio::sync::RwLock;

pub struct InMemoryHistoryStore<S, E> {
    entries: RwLock<Vec<HistoryEntry<S, E>>>,
}

impl<S, E> InMemoryHistoryStore<S, E> {
    pub fn new() -> Self {
        Self { entries: RwLock::new(Vec::new()) }
    }
}

impl<S, E> Default for InMemoryHistoryStore<S, E> {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl<S, E> HistoryStore<S, E> for InMemoryHistoryStore<S, E>
where
    S: StageId,
    E: EventKind,
{
    async fn append(&self, entry: HistoryEntry<S, E>) {
        self.entries.write().await.push(entry);
    }

    async fn timeline(&self, flow_id: &FlowId, instance_id: InstanceId) -> Vec<HistoryEntry<S, E>> {
        self.entries
            .read()
            .await
            .iter()
            .filter(|e| &e.flow_id == flow_id && e.instance_id == instance_id)
            .cloned()
            .collect()
    }
}
