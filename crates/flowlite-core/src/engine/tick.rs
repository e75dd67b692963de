//! The tick state machine (spec §4.F.2): claim, classify, execute one unit
//! of work, in the fixed ordering action → persist → history → status CAS →
//! reschedule, with a dedicated error path.

use crate::engine::core::{FlowEngine, RegisteredFlow};
use crate::flow::condition::resolve_condition;
use crate::flow::definition::{StageDef, StageKind};
use crate::history::{HistoryEntryKind, HistoryStore};
use crate::ids::{EventKind, FlowId, InstanceId, StageId};
use crate::instance::InstanceData;
use crate::mailbox::EventStore;
use crate::persister::PersistError;
use crate::scheduler::TickScheduler;
use crate::status::StageStatus;

impl<S, E, D, M, H, Sch> FlowEngine<S, E, D, M, H, Sch>
where
    S: StageId,
    E: EventKind,
    D: Send + Sync + Clone + 'static,
    M: EventStore<E> + 'static,
    H: HistoryStore<S, E> + 'static,
    Sch: TickScheduler + 'static,
{
    /// Drives the tick state machine directly, bypassing the scheduler.
    /// Exposed for tests that need to simulate overlapping deliveries
    /// deterministically (spec scenario S6); not part of the normal
    /// operating path, which always goes through the installed scheduler.
    #[doc(hidden)]
    pub async fn tick_for_test(&self, flow_id: impl Into<FlowId>, instance_id: InstanceId) {
        self.tick(flow_id.into(), instance_id).await;
    }

    /// Entry point installed as the scheduler's tick handler. Errors are
    /// logged, never propagated: a delivery the engine cannot act on (an
    /// unregistered flow, a storage hiccup) must not crash the scheduler
    /// worker that drives it.
    pub(crate) async fn tick(&self, flow_id: FlowId, instance_id: InstanceId) {
        log::trace!("tick: flow={flow_id} instance={instance_id}");
        if let Err(err) = self.try_tick(&flow_id, instance_id).await {
            log::error!("tick failed: flow={flow_id} instance={instance_id}: {err}");
        }
    }

    async fn try_tick(&self, flow_id: &FlowId, instance_id: InstanceId) -> Result<(), crate::errors::FlowError> {
        let registered = self.get_registered(flow_id).await?;

        let instance = match registered.persister.load(instance_id).await {
            Ok(instance) => instance,
            Err(PersistError::NotFound) => {
                log::warn!("tick delivered for missing instance: flow={flow_id} instance={instance_id}");
                return Ok(());
            }
            Err(e) => return Err(e.into()),
        };

        if instance.stage_status != StageStatus::Pending {
            log::trace!(
                "tick skipped, not Pending: flow={flow_id} instance={instance_id} status={:?}",
                instance.stage_status
            );
            return Ok(());
        }

        let claimed = registered
            .persister
            .try_transition_stage_status(instance_id, &instance.stage, StageStatus::Pending, StageStatus::Running)
            .await?;
        if !claimed {
            log::trace!("claim lost: flow={flow_id} instance={instance_id}");
            return Ok(());
        }
        self.append_history(
            flow_id,
            instance_id,
            HistoryEntryKind::StatusChanged { from: StageStatus::Pending, to: StageStatus::Running },
        )
        .await;

        let Some(stage_def) = registered.definition.stage(&instance.stage) else {
            return self
                .fail_instance(
                    flow_id,
                    instance_id,
                    &registered,
                    instance.stage.clone(),
                    "UnknownStage",
                    format!("instance references undefined stage {:?}", instance.stage),
                )
                .await;
        };

        log::debug!(
            "stage classified: flow={flow_id} instance={instance_id} stage={:?} kind={:?}",
            instance.stage,
            stage_def.kind
        );

        match stage_def.kind {
            StageKind::Automatic | StageKind::ConditionOnly => {
                self.run_active(flow_id, instance_id, &registered, instance, stage_def).await
            }
            StageKind::Waiting => self.run_waiting(flow_id, instance_id, &registered, instance, stage_def).await,
            StageKind::Terminal => self.run_terminal(flow_id, instance_id, &registered, instance).await,
        }
    }

    async fn run_active(
        &self,
        flow_id: &FlowId,
        instance_id: InstanceId,
        registered: &RegisteredFlow<S, E, D>,
        instance: InstanceData<S, D>,
        stage_def: &StageDef<S, E, D>,
    ) -> Result<(), crate::errors::FlowError> {
        let current_stage = instance.stage.clone();

        // Per the resolved open question (spec §9): the target the engine
        // computes here always wins. An action cannot redirect control flow
        // by writing a stage-shaped field into its returned state — the
        // engine never reads one back out of `D`.
        let state_after_action = if let Some(action) = &stage_def.action {
            match action(instance.state) {
                Ok(state) => state,
                Err(err) => {
                    return self
                        .fail_instance(flow_id, instance_id, registered, current_stage, &err.error_type, err.message)
                        .await;
                }
            }
        } else {
            instance.state
        };

        let target_stage = if let Some(cond) = &stage_def.condition {
            resolve_condition(cond, &state_after_action)
        } else {
            stage_def
                .next_stage
                .clone()
                .expect("validated: Automatic stage always has next_stage")
        };

        let data = InstanceData {
            flow_instance_id: instance_id,
            state: state_after_action,
            stage: target_stage.clone(),
            stage_status: StageStatus::Running,
            version: instance.version,
        };
        registered.persister.save(data).await?;
        self.append_history(
            flow_id,
            instance_id,
            HistoryEntryKind::StageChanged { from: current_stage, to: target_stage.clone() },
        )
        .await;

        let released = registered
            .persister
            .try_transition_stage_status(instance_id, &target_stage, StageStatus::Running, StageStatus::Pending)
            .await?;
        if released {
            self.append_history(
                flow_id,
                instance_id,
                HistoryEntryKind::StatusChanged { from: StageStatus::Running, to: StageStatus::Pending },
            )
            .await;
            log::info!("stage advanced: flow={flow_id} instance={instance_id} stage={:?}", target_stage);
            self.inner.scheduler.schedule_tick(flow_id.clone(), instance_id).await;
        } else {
            log::warn!("lost claim releasing after stage advance: flow={flow_id} instance={instance_id}");
        }
        Ok(())
    }

    async fn run_waiting(
        &self,
        flow_id: &FlowId,
        instance_id: InstanceId,
        registered: &RegisteredFlow<S, E, D>,
        instance: InstanceData<S, D>,
        stage_def: &StageDef<S, E, D>,
    ) -> Result<(), crate::errors::FlowError> {
        let candidates: Vec<E> = stage_def.event_handlers.keys().cloned().collect();
        let found = self.inner.mailbox.peek(flow_id, instance_id, &candidates).await;

        let Some((row_id, event)) = found else {
            let released = registered
                .persister
                .try_transition_stage_status(instance_id, &instance.stage, StageStatus::Running, StageStatus::Pending)
                .await?;
            if released {
                self.append_history(
                    flow_id,
                    instance_id,
                    HistoryEntryKind::StatusChanged { from: StageStatus::Running, to: StageStatus::Pending },
                )
                .await;
            }
            return Ok(());
        };

        let current_stage = instance.stage.clone();
        let target = stage_def
            .event_handlers
            .get(&event)
            .expect("peek only returns a declared candidate");
        let target_stage = match target {
            crate::flow::condition::ConditionTarget::Stage(s) => s.clone(),
            crate::flow::condition::ConditionTarget::Condition(cond) => resolve_condition(cond, &instance.state),
        };

        let data = InstanceData {
            flow_instance_id: instance_id,
            state: instance.state,
            stage: target_stage.clone(),
            stage_status: StageStatus::Running,
            version: instance.version,
        };
        registered.persister.save(data).await?;
        self.inner.mailbox.delete(row_id).await;
        self.append_history(
            flow_id,
            instance_id,
            HistoryEntryKind::StageChanged { from: current_stage, to: target_stage.clone() },
        )
        .await;

        let released = registered
            .persister
            .try_transition_stage_status(instance_id, &target_stage, StageStatus::Running, StageStatus::Pending)
            .await?;
        if released {
            self.append_history(
                flow_id,
                instance_id,
                HistoryEntryKind::StatusChanged { from: StageStatus::Running, to: StageStatus::Pending },
            )
            .await;
            log::info!(
                "event consumed, stage advanced: flow={flow_id} instance={instance_id} event={:?} stage={:?}",
                event,
                target_stage
            );
            self.inner.scheduler.schedule_tick(flow_id.clone(), instance_id).await;
        }
        Ok(())
    }

    async fn run_terminal(
        &self,
        flow_id: &FlowId,
        instance_id: InstanceId,
        registered: &RegisteredFlow<S, E, D>,
        instance: InstanceData<S, D>,
    ) -> Result<(), crate::errors::FlowError> {
        let completed = registered
            .persister
            .try_transition_stage_status(instance_id, &instance.stage, StageStatus::Running, StageStatus::Completed)
            .await?;
        if completed {
            self.append_history(
                flow_id,
                instance_id,
                HistoryEntryKind::StatusChanged { from: StageStatus::Running, to: StageStatus::Completed },
            )
            .await;
            log::info!("instance completed: flow={flow_id} instance={instance_id} stage={:?}", instance.stage);
        }
        Ok(())
    }

    async fn fail_instance(
        &self,
        flow_id: &FlowId,
        instance_id: InstanceId,
        registered: &RegisteredFlow<S, E, D>,
        stage: S,
        error_type: &str,
        error_message: String,
    ) -> Result<(), crate::errors::FlowError> {
        let transitioned = registered
            .persister
            .try_transition_stage_status(instance_id, &stage, StageStatus::Running, StageStatus::Error)
            .await?;
        if transitioned {
            self.append_history(
                flow_id,
                instance_id,
                HistoryEntryKind::Error {
                    stage: stage.clone(),
                    error_type: error_type.to_string(),
                    error_message: error_message.clone(),
                    error_stack_trace: None,
                },
            )
            .await;
        }
        log::error!(
            "stage errored: flow={flow_id} instance={instance_id} stage={:?} error_type={error_type} message={error_message}",
            stage
        );
        Ok(())
    }
}
