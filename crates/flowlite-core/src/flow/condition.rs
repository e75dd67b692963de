//! Conditions: named predicates with a true/false branch (spec §3
//! "Condition").

use std::fmt;
use std::sync::Arc;

use crate::ids::StageId;

/// A side-effect-free predicate over the domain state plus its two branch
/// resolutions. `description` is shown on the rendered diagram and, unless
/// the caller supplies one, defaults to `"condition"` — Rust has no runtime
/// reflection over closures, so a meaningful description must be supplied
/// explicitly (see `named_condition!` for recovering one from a named `fn`
/// at compile time).
pub struct ConditionDef<S, D> {
    pub description: String,
    pub(crate) predicate: Arc<dyn Fn(&D) -> bool + Send + Sync>,
    pub on_true: ConditionTarget<S, D>,
    pub on_false: ConditionTarget<S, D>,
}

pub const DEFAULT_CONDITION_DESCRIPTION: &str = "condition";

impl<S, D> ConditionDef<S, D> {
    pub fn new(
        predicate: impl Fn(&D) -> bool + Send + Sync + 'static,
        description: impl Into<String>,
        on_true: ConditionTarget<S, D>,
        on_false: ConditionTarget<S, D>,
    ) -> Self {
        Self {
            description: description.into(),
            predicate: Arc::new(predicate),
            on_true,
            on_false,
        }
    }

    pub fn evaluate(&self, state: &D) -> bool {
        (self.predicate)(state)
    }
}

impl<S: Clone, D> Clone for ConditionDef<S, D> {
    fn clone(&self) -> Self {
        Self {
            description: self.description.clone(),
            predicate: self.predicate.clone(),
            on_true: self.on_true.clone(),
            on_false: self.on_false.clone(),
        }
    }
}

impl<S: fmt::Debug, D> fmt::Debug for ConditionDef<S, D> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ConditionDef")
            .field("description", &self.description)
            .field("on_true", &self.on_true)
            .field("on_false", &self.on_false)
            .finish()
    }
}

/// Where a condition branch, or an event handler, leads. There is no empty
/// variant: a branch always resolves to a stage or to another condition,
/// by construction (spec invariant 5).
pub enum ConditionTarget<S, D> {
    Stage(S),
    Condition(Box<ConditionDef<S, D>>),
}

impl<S, D> ConditionTarget<S, D> {
    pub fn stage(id: S) -> Self {
        Self::Stage(id)
    }

    pub fn branch(
        predicate: impl Fn(&D) -> bool + Send + Sync + 'static,
        description: impl Into<String>,
        on_true: ConditionTarget<S, D>,
        on_false: ConditionTarget<S, D>,
    ) -> Self {
        Self::Condition(Box::new(ConditionDef::new(predicate, description, on_true, on_false)))
    }
}

impl<S: Clone, D> Clone for ConditionTarget<S, D> {
    fn clone(&self) -> Self {
        match self {
            Self::Stage(s) => Self::Stage(s.clone()),
            Self::Condition(c) => Self::Condition(c.clone()),
        }
    }
}

impl<S: fmt::Debug, D> fmt::Debug for ConditionTarget<S, D> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Stage(s) => f.debug_tuple("Stage").field(s).finish(),
            Self::Condition(c) => f.debug_tuple("Condition").field(c).finish(),
        }
    }
}

/// Evaluate a (possibly nested) condition tree to the stage it ultimately
/// resolves to.
pub fn resolve_condition<S: StageId, D>(cond: &ConditionDef<S, D>, state: &D) -> S {
    let target = if cond.evaluate(state) {
        &cond.on_true
    } else {
        &cond.on_false
    };
    match target {
        ConditionTarget::Stage(s) => s.clone(),
        ConditionTarget::Condition(c) => resolve_condition(c, state),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn resolves_nested_condition_to_exhaustion() {
        let inner = ConditionDef::new(
            |n: &i32| *n > 10,
            "gt_ten",
            ConditionTarget::stage("big"),
            ConditionTarget::stage("medium"),
        );
        let outer = ConditionDef::new(
            |n: &i32| *n > 0,
            "positive",
            ConditionTarget::branch(|n: &i32| *n > 10, "gt_ten", ConditionTarget::stage("big"), ConditionTarget::stage("medium")),
            ConditionTarget::stage("negative_or_zero"),
        );
        let _ = inner;
        assert_eq!(resolve_condition(&outer, &5), "medium");
        assert_eq!(resolve_condition(&outer, &50), "big");
        assert_eq!(resolve_condition(&outer, &-1), "negative_or_zero");
    }
}
