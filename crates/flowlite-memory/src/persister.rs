//! An in-memory, thread-safe [`Persister`] backed by a `HashMap` behind a
//! `tokio::sync::RwLock` (the shape the donor's legacy workflow repository
//! used for its own in-process store).

use std::collections::HashMap;

use async_trait::async_trait;
use flowlite_core::{InstanceData, InstanceId, PersistError, Persister, StageId, StageStatus};
use tokio::sync::RwLock;

pub struct InMemoryPersister<S, D> {
    rows: RwLock<HashMap<InstanceId, InstanceData<S, D>>>,
}

impl<S, D> InMemoryPersister<S, D> {
    pub fn new() -> Self {
        Self { rows: RwLock::new(HashMap::new()) }
    }
}

impl<S, D> Default for InMemoryPersister<S, D> {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl<S, D> Persister<S, D> for InMemoryPersister<S, D>
where
    S: StageId,
    D: Clone + Send + Sync + 'static,
{
    async fn load(&self, instance_id: InstanceId) -> Result<InstanceData<S, D>, PersistError> {
        self.rows
            .read()
            .await
            .get(&instance_id)
            .cloned()
            .ok_or(PersistError::NotFound)
    }

    async fn save(&self, mut data: InstanceData<S, D>) -> Result<InstanceData<S, D>, PersistError> {
        data.version = data.version.wrapping_add(1);
        let mut rows = self.rows.write().await;
        rows.insert(data.flow_instance_id, data.clone());
        Ok(data)
    }

    async fn try_transition_stage_status(
        &self,
        instance_id: InstanceId,
        expected_stage: &S,
        expected_status: StageStatus,
        new_status: StageStatus,
    ) -> Result<bool, PersistError> {
        let mut rows = self.rows.write().await;
        let row = rows.get_mut(&instance_id).ok_or(PersistError::NotFound)?;
        if &row.stage == expected_stage && row.stage_status == expected_status {
            row.stage_status = new_status;
            Ok(true)
        } else {
            Ok(false)
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn claim_is_exclusive() {
        let persister: InMemoryPersister<&'static str, i32> = InMemoryPersister::new();
        let id = InstanceId::new_v4();
        persister
            .save(InstanceData {
                flow_instance_id: id,
                state: 0,
                stage: "start",
                stage_status: StageStatus::Pending,
                version: 0,
            })
            .await
            .unwrap();

        let first = persister
            .try_transition_stage_status(id, &"start", StageStatus::Pending, StageStatus::Running)
            .await
            .unwrap();
        let second = persister
            .try_transition_stage_status(id, &"start", StageStatus::Pending, StageStatus::Running)
            .await
            .unwrap();

        assert!(first);
        assert!(!second);
    }
}
