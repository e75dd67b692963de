//! Pure diagram renderer (spec §6.3): a deterministic state-diagram
//! rendering of a [`FlowDefinition`], with stable slug ids for condition
//! nodes so repeated renders of an unchanged flow are byte-identical.

use std::collections::HashMap;

use crate::flow::condition::{ConditionDef, ConditionTarget};
use crate::flow::definition::{FlowDefinition, Initial, StageKind};
use crate::ids::{EventKind, StageId};

/// Render `flow` as a Mermaid `stateDiagram-v2` document.
pub fn render<S, E, D>(flow: &FlowDefinition<S, E, D>) -> String
where
    S: StageId,
    E: EventKind,
{
    let mut lines = vec!["stateDiagram-v2".to_string()];

    let mut stage_ids: Vec<S> = flow.stages.keys().cloned().collect();
    stage_ids.sort_by_key(|s| format!("{:?}", s));

    for id in &stage_ids {
        let def = &flow.stages[id];
        let label = match &def.action_name {
            Some(name) => format!("{:?}: {name}()", id),
            None => format!("{:?}", id),
        };
        lines.push(format!("state \"{}\" as {}", label, stage_node_id(id)));
    }

    let mut slug_counts: HashMap<String, u32> = HashMap::new();

    match &flow.initial {
        Initial::Stage(s) => lines.push(format!("[*] --> {}", stage_node_id(s))),
        Initial::Condition(cond) => {
            let id = walk_condition(cond, &mut lines, &mut slug_counts);
            lines.push(format!("[*] --> {id}"));
        }
    }

    for id in &stage_ids {
        let def = &flow.stages[id];
        match def.kind {
            StageKind::Automatic => {
                let target = def.next_stage.as_ref().expect("validated: Automatic stage has next_stage");
                lines.push(format!("{} --> {}", stage_node_id(id), stage_node_id(target)));
            }
            StageKind::ConditionOnly => {
                let cond = def.condition.as_ref().expect("validated: ConditionOnly stage has condition");
                let cond_id = walk_condition(cond, &mut lines, &mut slug_counts);
                lines.push(format!("{} --> {}", stage_node_id(id), cond_id));
            }
            StageKind::Waiting => {
                let mut events: Vec<&E> = def.event_handlers.keys().collect();
                events.sort_by_key(|e| format!("{:?}", e));
                for e in events {
                    let target_id = match &def.event_handlers[e] {
                        ConditionTarget::Stage(s) => stage_node_id(s),
                        ConditionTarget::Condition(c) => walk_condition(c, &mut lines, &mut slug_counts),
                    };
                    lines.push(format!("{} --> {} : onEvent {:?}", stage_node_id(id), target_id, e));
                }
            }
            StageKind::Terminal => {
                lines.push(format!("{} --> [*]", stage_node_id(id)));
            }
        }
    }

    lines.join("\n")
}

fn walk_condition<S: StageId, D>(
    cond: &ConditionDef<S, D>,
    lines: &mut Vec<String>,
    slug_counts: &mut HashMap<String, u32>,
) -> String {
    let base = format!("if_{}", slugify(&cond.description));
    let count = slug_counts.entry(base.clone()).or_insert(0);
    *count += 1;
    let id = if *count == 1 { base } else { format!("{base}_{count}") };
    lines.push(format!("state \"{}\" as {} <<choice>>", cond.description, id));

    let true_id = match &cond.on_true {
        ConditionTarget::Stage(s) => stage_node_id(s),
        ConditionTarget::Condition(c) => walk_condition(c, lines, slug_counts),
    };
    lines.push(format!("{id} --> {true_id} : {}", cond.description));

    let false_id = match &cond.on_false {
        ConditionTarget::Stage(s) => stage_node_id(s),
        ConditionTarget::Condition(c) => walk_condition(c, lines, slug_counts),
    };
    lines.push(format!("{id} --> {false_id} : NOT ({})", cond.description));

    id
}

fn stage_node_id<S: StageId>(s: &S) -> String {
    slugify(&format!("{:?}", s))
}

fn slugify(s: &str) -> String {
    s.to_lowercase()
        .chars()
        .map(|c| if c.is_ascii_alphanumeric() { c } else { '_' })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::flow::FlowBuilder;

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
    fn render_is_deterministic() {
        let def = FlowBuilder::<Stage, Event, i32>::new()
            .stage(Stage::Start)
            .action(|n| Ok(n + 1))
            .stage(Stage::Done)
            .end()
            .build()
            .unwrap();

        let first = render(&def);
        let second = render(&def);
        assert_eq!(first, second);
        assert!(first.contains("start --> done"));
    }
}
