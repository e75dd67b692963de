//! Ergonomic wrappers around builder calls that want a human-readable name
//! for a predicate or action. Rust has no runtime reflection over closures,
//! so where the donor DSL recovers a name from a function value at runtime,
//! these macros recover it from the `fn` path at compile time via
//! `stringify!`.

/// `named_condition!(builder, is_adult, on_true, on_false)` expands to
/// `builder.condition(is_adult, Some(stringify!(is_adult)), on_true, on_false)`.
#[macro_export]
macro_rules! named_condition {
    ($builder:expr, $predicate:path, $on_true:expr, $on_false:expr) => {
        $builder.condition($predicate, Some(::std::stringify!($predicate)), $on_true, $on_false)
    };
}

/// `named_action!(builder, charge_card)` expands to
/// `builder.action_named(stringify!(charge_card), charge_card)`.
#[macro_export]
macro_rules! named_action {
    ($builder:expr, $action:path) => {
        $builder.action_named(::std::stringify!($action), $action)
    };
}

#[cfg(test)]
mod tests {
    use crate::errors::ActionError;
    use crate::flow::builder::FlowBuilder;
    use crate::flow::condition::ConditionTarget;

    #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
    enum Stage {
        Start,
        Approved,
        Rejected,
    }

    #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
    enum Event {
        Go,
    }

    fn is_adult(age: &u32) -> bool {
        *age >= 18
    }

    fn charge_card(amount: u32) -> Result<u32, ActionError> {
        Ok(amount)
    }

    #[test]
    fn named_condition_uses_the_function_path_as_description() {
        let flow = named_condition!(
            FlowBuilder::<Stage, Event, u32>::new().stage(Stage::Start),
            is_adult,
            ConditionTarget::stage(Stage::Approved),
            ConditionTarget::stage(Stage::Rejected)
        )
        .stage(Stage::Approved)
        .end()
        .stage(Stage::Rejected)
        .end()
        .build()
        .expect("flow definition is valid");

        let diagram = crate::diagram::render(&flow);
        assert!(diagram.contains("is_adult"));
    }

    #[test]
    fn named_action_uses_the_function_path_as_the_diagram_label() {
        let flow = named_action!(FlowBuilder::<Stage, Event, u32>::new().stage(Stage::Start), charge_card)
            .end()
            .build()
            .expect("flow definition is valid");

        let diagram = crate::diagram::render(&flow);
        assert!(diagram.contains("charge_card()"));
    }
}
