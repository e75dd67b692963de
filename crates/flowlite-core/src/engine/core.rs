//! The Flow Engine: registration and the public operations of spec §4.F.1.

use std::collections::HashMap;
use std::sync::Arc;

use chrono::Utc;
use tokio::sync::RwLock;
use uuid::Uuid;

use crate::errors::FlowError;
use crate::flow::definition::FlowDefinition;
use crate::history::{HistoryEntry, HistoryEntryKind, HistoryStore};
use crate::ids::{EventKind, FlowId, InstanceId, StageId};
use crate::instance::InstanceData;
use crate::mailbox::EventStore;
use crate::persister::Persister;
use crate::scheduler::TickScheduler;
use crate::status::StageStatus;

pub(crate) struct RegisteredFlow<S: StageId, E: EventKind, D> {
    pub(crate) definition: Arc<FlowDefinition<S, E, D>>,
    pub(crate) persister: Arc<dyn Persister<S, D>>,
}

impl<S: StageId, E: EventKind, D> Clone for RegisteredFlow<S, E, D> {
    fn clone(&self) -> Self {
        Self {
            definition: self.definition.clone(),
            persister: self.persister.clone(),
        }
    }
}

pub(crate) struct Inner<S: StageId, E: EventKind, D, M, H, Sch> {
    pub(crate) registry: RwLock<HashMap<FlowId, RegisteredFlow<S, E, D>>>,
    pub(crate) mailbox: M,
    pub(crate) history: H,
    pub(crate) scheduler: Sch,
}

/// Orchestrates flow instances: registration, the public commands of spec
/// §4.F.1, and (in `engine::tick`) the tick state machine of §4.F.2.
pub struct FlowEngine<S: StageId, E: EventKind, D, M, H, Sch> {
    pub(crate) inner: Arc<Inner<S, E, D, M, H, Sch>>,
}

impl<S, E, D, M, H, Sch> Clone for FlowEngine<S, E, D, M, H, Sch>
where
    S: StageId,
    E: EventKind,
{
    fn clone(&self) -> Self {
        Self { inner: self.inner.clone() }
    }
}

impl<S, E, D, M, H, Sch> FlowEngine<S, E, D, M, H, Sch>
where
    S: StageId,
    E: EventKind,
    D: Send + Sync + Clone + 'static,
    M: EventStore<E> + 'static,
    H: HistoryStore<S, E> + 'static,
    Sch: TickScheduler + 'static,
{
    pub fn new(mailbox: M, history: H, scheduler: Sch) -> Self {
        Self {
            inner: Arc::new(Inner {
                registry: RwLock::new(HashMap::new()),
                mailbox,
                history,
                scheduler,
            }),
        }
    }

    /// Install this engine as the scheduler's tick handler. Call once, after
    /// construction and before any instance is started.
    pub fn install_tick_handler(&self) {
        let engine = self.clone();
        self.inner.scheduler.set_tick_handler(Arc::new(move |flow_id, instance_id| {
            let engine = engine.clone();
            Box::pin(async move { engine.tick(flow_id, instance_id).await })
        }));
    }

    /// Register a flow definition under `flow_id` with the persister that
    /// owns its instances. Idempotent for repeated registration of a flow
    /// with the same shape; rejects silently-divergent redefinition.
    pub async fn register_flow(
        &self,
        flow_id: impl Into<FlowId>,
        flow: FlowDefinition<S, E, D>,
        persister: impl Persister<S, D> + 'static,
    ) -> Result<(), FlowError> {
        let flow_id = flow_id.into();
        let mut registry = self.inner.registry.write().await;
        if let Some(existing) = registry.get(&flow_id) {
            if existing.definition.shape_signature() != flow.shape_signature() {
                return Err(FlowError::InvalidOperation(format!(
                    "flow {flow_id} is already registered with a different definition"
                )));
            }
            return Ok(());
        }
        registry.insert(
            flow_id,
            RegisteredFlow {
                definition: Arc::new(flow),
                persister: Arc::new(persister),
            },
        );
        Ok(())
    }

    pub(crate) async fn get_registered(&self, flow_id: &FlowId) -> Result<RegisteredFlow<S, E, D>, FlowError> {
        let registry = self.inner.registry.read().await;
        registry
            .get(flow_id)
            .cloned()
            .ok_or_else(|| FlowError::UnknownFlow(flow_id.to_string()))
    }

    pub(crate) async fn append_history(&self, flow_id: &FlowId, instance_id: InstanceId, kind: HistoryEntryKind<S, E>) {
        self.inner
            .history
            .append(HistoryEntry {
                flow_id: flow_id.clone(),
                instance_id,
                at: Utc::now(),
                kind,
            })
            .await;
    }

    /// Start a brand-new instance at the flow's initial stage.
    pub async fn start_instance(&self, flow_id: impl Into<FlowId>, initial_state: D) -> Result<InstanceId, FlowError> {
        let flow_id = flow_id.into();
        let registered = self.get_registered(&flow_id).await?;
        let initial_stage = registered.definition.resolve_initial_stage(&initial_state);
        let instance_id = Uuid::new_v4();

        let data = InstanceData {
            flow_instance_id: instance_id,
            state: initial_state,
            stage: initial_stage.clone(),
            stage_status: StageStatus::Pending,
            version: 0,
        };
        registered.persister.save(data).await?;
        self.append_history(&flow_id, instance_id, HistoryEntryKind::InstanceStarted { stage: initial_stage })
            .await;
        self.inner.scheduler.schedule_tick(flow_id, instance_id).await;
        Ok(instance_id)
    }

    /// Resume ticking an instance that already exists in the persister
    /// (e.g. after a process restart).
    pub async fn start_existing_instance(&self, flow_id: impl Into<FlowId>, instance_id: InstanceId) -> Result<(), FlowError> {
        let flow_id = flow_id.into();
        let _ = self.get_registered(&flow_id).await?;
        self.inner.scheduler.schedule_tick(flow_id, instance_id).await;
        Ok(())
    }

    /// Append an event to an instance's mailbox and request a tick.
    pub async fn send_event(&self, flow_id: impl Into<FlowId>, instance_id: InstanceId, event: E) -> Result<(), FlowError> {
        let flow_id = flow_id.into();
        let _ = self.get_registered(&flow_id).await?;
        self.inner.mailbox.append(&flow_id, instance_id, event.clone()).await;
        self.append_history(&flow_id, instance_id, HistoryEntryKind::EventAppended { event }).await;
        self.inner.scheduler.schedule_tick(flow_id, instance_id).await;
        Ok(())
    }

    /// Move an instance in `Error` status back to `Pending` at its current
    /// stage and request a tick.
    pub async fn retry(&self, flow_id: impl Into<FlowId>, instance_id: InstanceId) -> Result<(), FlowError> {
        let flow_id = flow_id.into();
        let registered = self.get_registered(&flow_id).await?;
        let instance = registered.persister.load(instance_id).await?;
        if instance.stage_status != StageStatus::Error {
            return Err(FlowError::InvalidOperation("retry requires status Error".to_string()));
        }
        let ok = registered
            .persister
            .try_transition_stage_status(instance_id, &instance.stage, StageStatus::Error, StageStatus::Pending)
            .await?;
        if !ok {
            return Err(FlowError::InvalidOperation("retry lost a race with a concurrent writer".to_string()));
        }
        self.inner.scheduler.schedule_tick(flow_id, instance_id).await;
        Ok(())
    }

    /// Move an instance to `Cancelled`; no further ticks are scheduled.
    pub async fn cancel(&self, flow_id: impl Into<FlowId>, instance_id: InstanceId) -> Result<(), FlowError> {
        let flow_id = flow_id.into();
        let registered = self.get_registered(&flow_id).await?;
        let instance = registered.persister.load(instance_id).await?;
        let ok = registered
            .persister
            .try_transition_stage_status(instance_id, &instance.stage, instance.stage_status, StageStatus::Cancelled)
            .await?;
        if !ok {
            return Err(FlowError::InvalidOperation("cancel lost a race with a concurrent writer".to_string()));
        }
        self.append_history(&flow_id, instance_id, HistoryEntryKind::Cancelled { stage: instance.stage })
            .await;
        Ok(())
    }

    /// Force an instance to a specific stage. Only valid from `Pending` or
    /// `Error` (an operator override, not a normal transition).
    pub async fn change_stage(&self, flow_id: impl Into<FlowId>, instance_id: InstanceId, new_stage: S) -> Result<(), FlowError> {
        let flow_id = flow_id.into();
        let registered = self.get_registered(&flow_id).await?;
        let instance = registered.persister.load(instance_id).await?;
        if !matches!(instance.stage_status, StageStatus::Pending | StageStatus::Error) {
            return Err(FlowError::InvalidOperation(
                "change_stage requires status Pending or Error".to_string(),
            ));
        }
        let from = instance.stage.clone();
        let data = InstanceData {
            stage: new_stage.clone(),
            stage_status: StageStatus::Pending,
            ..instance
        };
        registered.persister.save(data).await?;
        self.append_history(&flow_id, instance_id, HistoryEntryKind::StageChanged { from, to: new_stage })
            .await;
        self.inner.scheduler.schedule_tick(flow_id, instance_id).await;
        Ok(())
    }

    pub async fn get_status(&self, flow_id: impl Into<FlowId>, instance_id: InstanceId) -> Result<(S, StageStatus), FlowError> {
        let flow_id = flow_id.into();
        let registered = self.get_registered(&flow_id).await?;
        let instance = registered.persister.load(instance_id).await?;
        Ok((instance.stage, instance.stage_status))
    }

    pub async fn history(&self, flow_id: impl Into<FlowId>, instance_id: InstanceId) -> Vec<HistoryEntry<S, E>> {
        let flow_id = flow_id.into();
        self.inner.history.timeline(&flow_id, instance_id).await
    }
}
