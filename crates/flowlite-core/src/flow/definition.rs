//! Stage definitions and the flow definition they compose into (spec §3
//! "Stage definition", "Flow definition").

use std::collections::HashMap;
use std::sync::Arc;

use crate::errors::ActionError;
use crate::ids::{EventKind, StageId};

use super::condition::{resolve_condition, ConditionDef, ConditionTarget};

/// An action: a pure(-ish) transform of the domain state that may fail.
pub type Action<D> = Arc<dyn Fn(D) -> Result<D, ActionError> + Send + Sync>;

/// The classification a stage is assigned once, at build time (spec §8
/// invariant 1: "exactly one of {terminal, automatic, condition-only,
/// waiting} holds for every stage").
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StageKind {
    /// No outgoing edge; reaching it completes the instance.
    Terminal,
    /// Progresses unconditionally to a fixed `next_stage` (an action may
    /// run first).
    Automatic,
    /// Progresses by evaluating a condition tree (an action may run first).
    ConditionOnly,
    /// Progresses only when one of its declared events is delivered.
    Waiting,
}

/// One stage's definition: at most one of {action-bearing continuation,
/// event handlers} per spec invariant 1, plus the action's optional
/// diagram label.
pub struct StageDef<S: StageId, E: EventKind, D> {
    pub id: S,
    pub kind: StageKind,
    pub action: Option<Action<D>>,
    pub action_name: Option<String>,
    pub next_stage: Option<S>,
    pub condition: Option<ConditionDef<S, D>>,
    pub event_handlers: HashMap<E, ConditionTarget<S, D>>,
}

/// What a flow instance starts at: a fixed stage, or a condition evaluated
/// once against the initial state.
pub enum Initial<S, D> {
    Stage(S),
    Condition(ConditionDef<S, D>),
}

/// A validated, immutable flow graph (spec §3 "Flow definition").
pub struct FlowDefinition<S: StageId, E: EventKind, D> {
    pub stages: HashMap<S, StageDef<S, E, D>>,
    pub initial: Initial<S, D>,
}

impl<S: StageId, E: EventKind, D> FlowDefinition<S, E, D> {
    pub fn stage(&self, id: &S) -> Option<&StageDef<S, E, D>> {
        self.stages.get(id)
    }

    /// Resolve the instance's starting stage, evaluating `initial_condition`
    /// to exhaustion against the freshly constructed domain state if the
    /// flow declares one instead of a fixed `initial_stage`.
    pub fn resolve_initial_stage(&self, state: &D) -> S {
        match &self.initial {
            Initial::Stage(s) => s.clone(),
            Initial::Condition(cond) => resolve_condition(cond, state),
        }
    }

    /// A cheap structural fingerprint (stage ids, kinds, and edges; action
    /// and predicate closures are not comparable in Rust and are excluded)
    /// used to decide whether re-registering a flow under the same id is an
    /// idempotent no-op or a genuine redefinition.
    pub fn shape_signature(&self) -> String {
        let mut ids: Vec<&S> = self.stages.keys().collect();
        ids.sort_by_key(|s| format!("{:?}", s));

        let mut parts = Vec::with_capacity(ids.len());
        for id in ids {
            let def = &self.stages[id];
            let mut events: Vec<&E> = def.event_handlers.keys().collect();
            events.sort_by_key(|e| format!("{:?}", e));
            let handlers: Vec<String> = events
                .iter()
                .map(|e| format!("{:?}->{}", e, target_shape(&def.event_handlers[e])))
                .collect();
            parts.push(format!(
                "{:?}:{:?}:next={:?}:cond={}:handlers=[{}]",
                id,
                def.kind,
                def.next_stage,
                def.condition.is_some(),
                handlers.join(",")
            ));
        }
        parts.join(";")
    }
}

fn target_shape<S: StageId, D>(target: &ConditionTarget<S, D>) -> String {
    match target {
        ConditionTarget::Stage(s) => format!("{:?}", s),
        ConditionTarget::Condition(_) => "condition".to_string(),
    }
}
