//! The State Persister interface (spec §4.B).

use async_trait::async_trait;
use thiserror::Error;

use crate::errors::FlowError;
use crate::ids::{InstanceId, StageId};
use crate::instance::InstanceData;
use crate::status::StageStatus;

/// Failure modes specific to the persistence layer. Converts into
/// [`FlowError`] at the engine boundary.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum PersistError {
    #[error("instance not found")]
    NotFound,
    #[error("conflicting concurrent write")]
    Conflict,
}

impl From<PersistError> for FlowError {
    fn from(e: PersistError) -> Self {
        match e {
            PersistError::NotFound => FlowError::NotFound,
            PersistError::Conflict => FlowError::Conflict,
        }
    }
}

/// Durable store for per-instance data. Implementations may block (a real
/// adapter awaits a network call); the engine never holds a lock across a
/// persister call.
#[async_trait]
pub trait Persister<S, D>: Send + Sync
where
    S: StageId,
    D: Send + Sync + 'static,
{
    async fn load(&self, instance_id: InstanceId) -> Result<InstanceData<S, D>, PersistError>;

    /// Persist the full record. Implementations must not silently drop
    /// fields the engine did not touch.
    async fn save(&self, data: InstanceData<S, D>) -> Result<InstanceData<S, D>, PersistError>;

    /// Atomic compare-and-set on `(stage, stage_status)`. Returns `Ok(true)`
    /// if the transition was applied, `Ok(false)` if the current record did
    /// not match `expected_stage`/`expected_status` (lost the race).
    async fn try_transition_stage_status(
        &self,
        instance_id: InstanceId,
        expected_stage: &S,
        expected_status: StageStatus,
        new_status: StageStatus,
    ) -> Result<bool, PersistError>;
}
