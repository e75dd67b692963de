//! The fluent flow builder (spec §4.A).
//!
//! The donor DSL this is modeled on threads an implicit "currently open"
//! builder context through nested lambdas; Rust has no equivalent implicit
//! receiver, so this builder keeps that context explicit as a `cursor` field
//! the fluent calls below advance, per the design note that an implicit
//! chaining context should become an explicit builder object.

use std::collections::HashMap;
use std::sync::Arc;

use crate::errors::{ActionError, BuildError};
use crate::ids::{EventKind, StageId};

use super::condition::{ConditionDef, ConditionTarget, DEFAULT_CONDITION_DESCRIPTION};
use super::definition::{Action, FlowDefinition, Initial, StageDef, StageKind};

struct Draft<S: StageId, E: EventKind, D> {
    action: Option<Action<D>>,
    action_name: Option<String>,
    next_stage: Option<S>,
    condition: Option<ConditionDef<S, D>>,
    event_handlers: HashMap<E, ConditionTarget<S, D>>,
    explicit_end: bool,
}

impl<S: StageId, E: EventKind, D> Draft<S, E, D> {
    fn empty() -> Self {
        Self {
            action: None,
            action_name: None,
            next_stage: None,
            condition: None,
            event_handlers: HashMap::new(),
            explicit_end: false,
        }
    }
}

enum Cursor<S, E> {
    /// No open chaining slot.
    None,
    /// The previous stage is waiting for its continuation (next stage or
    /// condition) to be filled in by the following call.
    AfterStage(S),
    /// A `wait_for(event)` call opened a handler slot awaiting its target.
    AfterWaitFor(S, E),
}

/// Builds a [`FlowDefinition`] through a chain of `stage` / `action` /
/// `wait_for` / `condition` / `join` / `end` calls, ending in `build`.
pub struct FlowBuilder<S: StageId, E: EventKind, D> {
    drafts: HashMap<S, Draft<S, E, D>>,
    initial_stage: Option<S>,
    initial_condition: Option<ConditionDef<S, D>>,
    cursor: Cursor<S, E>,
    error: Option<BuildError>,
}

impl<S: StageId, E: EventKind, D> Default for FlowBuilder<S, E, D> {
    fn default() -> Self {
        Self::new()
    }
}

impl<S: StageId, E: EventKind, D> FlowBuilder<S, E, D> {
    pub fn new() -> Self {
        Self {
            drafts: HashMap::new(),
            initial_stage: None,
            initial_condition: None,
            cursor: Cursor::None,
            error: None,
        }
    }

    /// Declare or reference a stage. The very first `stage()` call (absent an
    /// earlier top-level `condition()`) becomes the flow's initial stage.
    pub fn stage(mut self, id: S) -> Self {
        self.resolve_pending(ConditionTarget::Stage(id.clone()));
        let is_first = self.drafts.is_empty();
        self.drafts.entry(id.clone()).or_insert_with(Draft::empty);
        if is_first && self.initial_condition.is_none() {
            self.initial_stage = Some(id.clone());
        }
        self.cursor = Cursor::AfterStage(id);
        self
    }

    /// Reference an already-declared (or not-yet-declared) stage as a
    /// chaining target without it becoming the initial stage.
    pub fn join(self, id: S) -> Self {
        self.stage(id)
    }

    /// Attach an action to the stage currently in scope.
    pub fn action(mut self, action: impl Fn(D) -> Result<D, ActionError> + Send + Sync + 'static) -> Self {
        match &self.cursor {
            Cursor::AfterStage(id) => {
                let id = id.clone();
                if let Some(draft) = self.drafts.get_mut(&id) {
                    if draft.action.is_some() {
                        self.error
                            .get_or_insert(BuildError::DuplicateAction(format!("{:?}", id)));
                    } else {
                        draft.action = Some(Arc::new(action));
                    }
                }
            }
            _ => {
                self.error.get_or_insert(BuildError::ActionWithoutStage);
            }
        }
        self
    }

    /// Like [`action`](Self::action) but also records a human-readable name
    /// for the diagram renderer (Rust cannot recover a closure's name at
    /// runtime). See `named_action!`.
    pub fn action_named(
        mut self,
        name: impl Into<String>,
        action: impl Fn(D) -> Result<D, ActionError> + Send + Sync + 'static,
    ) -> Self {
        let stage = match &self.cursor {
            Cursor::AfterStage(id) => Some(id.clone()),
            _ => None,
        };
        self = self.action(action);
        if let Some(stage) = stage {
            if let Some(draft) = self.drafts.get_mut(&stage) {
                draft.action_name = Some(name.into());
            }
        }
        self
    }

    /// Open an event-handler slot on the stage currently in scope; the next
    /// `stage`/`join`/`condition` call fills in its target.
    pub fn wait_for(mut self, event: E) -> Self {
        match &self.cursor {
            Cursor::AfterStage(id) => {
                let stage = id.clone();
                if let Some(draft) = self.drafts.get(&stage) {
                    if draft.event_handlers.contains_key(&event) {
                        self.error.get_or_insert(BuildError::DuplicateEventHandler(
                            format!("{:?}", stage),
                            format!("{:?}", event),
                        ));
                    }
                }
                self.cursor = Cursor::AfterWaitFor(stage, event);
            }
            _ => {
                self.error.get_or_insert(BuildError::WaitForWithoutStage);
            }
        }
        self
    }

    /// Attach a condition. Resolves the currently open chaining slot (a
    /// stage's continuation, or an event handler's target); if called before
    /// any stage has been declared, it instead becomes the flow's
    /// `initial_condition`.
    pub fn condition(
        mut self,
        predicate: impl Fn(&D) -> bool + Send + Sync + 'static,
        description: Option<impl Into<String>>,
        on_true: ConditionTarget<S, D>,
        on_false: ConditionTarget<S, D>,
    ) -> Self {
        let description = description
            .map(Into::into)
            .unwrap_or_else(|| DEFAULT_CONDITION_DESCRIPTION.to_string());
        let cond = ConditionDef::new(predicate, description, on_true, on_false);

        match std::mem::replace(&mut self.cursor, Cursor::None) {
            Cursor::None => {
                if self.drafts.is_empty() {
                    self.initial_condition = Some(cond);
                } else {
                    self.error.get_or_insert(BuildError::ConditionWithoutTarget);
                }
            }
            Cursor::AfterStage(prev) => {
                if let Some(draft) = self.drafts.get_mut(&prev) {
                    draft.condition = Some(cond);
                }
            }
            Cursor::AfterWaitFor(stage, event) => {
                if let Some(draft) = self.drafts.get_mut(&stage) {
                    draft
                        .event_handlers
                        .insert(event, ConditionTarget::Condition(Box::new(cond)));
                }
            }
        }
        self
    }

    /// Mark the stage currently in scope terminal. Also the implicit
    /// classification for any stage left with no action, next stage,
    /// condition, or handlers (spec §4.A "end()").
    pub fn end(mut self) -> Self {
        if let Cursor::AfterStage(id) = &self.cursor {
            if let Some(draft) = self.drafts.get_mut(id) {
                draft.explicit_end = true;
            }
            self.cursor = Cursor::None;
        }
        self
    }

    fn resolve_pending(&mut self, target: ConditionTarget<S, D>) {
        match std::mem::replace(&mut self.cursor, Cursor::None) {
            Cursor::None => {}
            Cursor::AfterStage(prev) => {
                if let Some(draft) = self.drafts.get_mut(&prev) {
                    if !draft.explicit_end && draft.next_stage.is_none() && draft.condition.is_none() {
                        match target {
                            ConditionTarget::Stage(id) => draft.next_stage = Some(id),
                            ConditionTarget::Condition(c) => draft.condition = Some(*c),
                        }
                    }
                }
            }
            Cursor::AfterWaitFor(stage, event) => {
                if let Some(draft) = self.drafts.get_mut(&stage) {
                    draft.event_handlers.insert(event, target);
                }
            }
        }
    }

    /// Validate the declared graph and produce an immutable [`FlowDefinition`].
    pub fn build(self) -> Result<FlowDefinition<S, E, D>, BuildError> {
        if let Some(err) = self.error {
            return Err(err);
        }

        let initial = match (self.initial_stage, self.initial_condition) {
            (Some(s), None) => Initial::Stage(s),
            (None, Some(c)) => Initial::Condition(c),
            (None, None) => return Err(BuildError::MissingInitial),
            (Some(_), Some(_)) => return Err(BuildError::AmbiguousInitial),
        };

        let mut stages = HashMap::with_capacity(self.drafts.len());
        for (id, draft) in self.drafts {
            let is_waiting = !draft.event_handlers.is_empty();
            let is_active = draft.action.is_some() || draft.next_stage.is_some() || draft.condition.is_some();

            if is_waiting && is_active {
                return Err(BuildError::MixedWaitingAndActive(format!("{:?}", id)));
            }
            if draft.explicit_end && (is_active || is_waiting) {
                return Err(BuildError::TerminalStageNotPure(format!("{:?}", id)));
            }

            let kind = if is_waiting {
                StageKind::Waiting
            } else if draft.condition.is_some() {
                StageKind::ConditionOnly
            } else if draft.next_stage.is_some() {
                StageKind::Automatic
            } else if draft.action.is_some() {
                return Err(BuildError::DanglingAction(format!("{:?}", id)));
            } else {
                StageKind::Terminal
            };

            stages.insert(
                id.clone(),
                StageDef {
                    id,
                    kind,
                    action: draft.action,
                    action_name: draft.action_name,
                    next_stage: draft.next_stage,
                    condition: draft.condition,
                    event_handlers: draft.event_handlers,
                },
            );
        }

        let definition = FlowDefinition { stages, initial };
        validate_references(&definition)?;
        Ok(definition)
    }
}

fn validate_references<S: StageId, E: EventKind, D>(def: &FlowDefinition<S, E, D>) -> Result<(), BuildError> {
    let mut referenced = Vec::new();
    if let Initial::Condition(cond) = &def.initial {
        collect_condition_targets(cond, &mut referenced);
    }
    for stage in def.stages.values() {
        if let Some(next) = &stage.next_stage {
            referenced.push(next.clone());
        }
        if let Some(cond) = &stage.condition {
            collect_condition_targets(cond, &mut referenced);
        }
        for target in stage.event_handlers.values() {
            collect_target(target, &mut referenced);
        }
    }
    for id in referenced {
        if !def.stages.contains_key(&id) {
            return Err(BuildError::UnknownTargetStage("<flow>".to_string(), format!("{:?}", id)));
        }
    }
    Ok(())
}

fn collect_condition_targets<S: Clone, D>(cond: &ConditionDef<S, D>, out: &mut Vec<S>) {
    collect_target(&cond.on_true, out);
    collect_target(&cond.on_false, out);
}

fn collect_target<S: Clone, D>(target: &ConditionTarget<S, D>, out: &mut Vec<S>) {
    match target {
        ConditionTarget::Stage(s) => out.push(s.clone()),
        ConditionTarget::Condition(c) => collect_condition_targets(c, out),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
    enum Stage {
        Start,
        Done,
    }

    #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
    enum Event {
        Go,
    }

    #[test]
    fn simple_action_chain_builds() {
        let def = FlowBuilder::<Stage, Event, i32>::new()
            .stage(Stage::Start)
            .action(|n| Ok(n + 1))
            .stage(Stage::Done)
            .end()
            .build()
            .unwrap();

        assert_eq!(def.stages.len(), 2);
        assert!(matches!(def.initial, Initial::Stage(Stage::Start)));
        assert_eq!(def.stages[&Stage::Start].kind, StageKind::Automatic);
        assert_eq!(def.stages[&Stage::Done].kind, StageKind::Terminal);
    }

    #[test]
    fn waiting_stage_builds() {
        let def = FlowBuilder::<Stage, Event, i32>::new()
            .stage(Stage::Start)
            .wait_for(Event::Go)
            .stage(Stage::Done)
            .end()
            .build()
            .unwrap();

        assert_eq!(def.stages[&Stage::Start].kind, StageKind::Waiting);
    }

    #[test]
    fn dangling_action_is_rejected() {
        let err = FlowBuilder::<Stage, Event, i32>::new()
            .stage(Stage::Start)
            .action(|n| Ok(n))
            .build()
            .unwrap_err();
        assert_eq!(err, BuildError::DanglingAction("Start".to_string()));
    }

    #[test]
    fn duplicate_action_is_rejected() {
        let err = FlowBuilder::<Stage, Event, i32>::new()
            .stage(Stage::Start)
            .action(|n| Ok(n))
            .action(|n| Ok(n))
            .stage(Stage::Done)
            .end()
            .build()
            .unwrap_err();
        assert_eq!(err, BuildError::DuplicateAction("Start".to_string()));
    }

    #[test]
    fn end_does_not_leak_into_next_declaration() {
        let def = FlowBuilder::<Stage, Event, i32>::new()
            .stage(Stage::Start)
            .end()
            .stage(Stage::Done)
            .end()
            .build()
            .unwrap();

        assert_eq!(def.stages[&Stage::Start].kind, StageKind::Terminal);
        assert!(def.stages[&Stage::Start].next_stage.is_none());
        assert_eq!(def.stages[&Stage::Done].kind, StageKind::Terminal);
    }

    #[test]
    fn mixing_wait_and_action_is_rejected() {
        let err = FlowBuilder::<Stage, Event, i32>::new()
            .stage(Stage::Start)
            .action(|n| Ok(n))
            .wait_for(Event::Go)
            .stage(Stage::Done)
            .end()
            .build()
            .unwrap_err();
        assert_eq!(err, BuildError::MixedWaitingAndActive("Start".to_string()));
    }
}
