//! A small demonstration binary: builds a toy approval flow and drives it
//! through start, send-event, retry, and cancel against the in-memory
//! adapters.

use std::time::Duration;

use flowlite_core::{named_action, named_condition, ActionError, ConditionTarget, FlowBuilder, FlowEngine, SchedulerConfig};
use flowlite_memory::{InMemoryEventStore, InMemoryHistoryStore, InMemoryPersister, InMemoryTickScheduler};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
enum Stage {
    Received,
    Review,
    Approved,
    Rejected,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
enum Event {
    Approve,
    Reject,
}

#[derive(Debug, Clone)]
struct Request {
    amount: u32,
    attempts: u32,
}

fn triage(mut req: Request) -> Result<Request, ActionError> {
    req.attempts += 1;
    if req.attempts == 1 && req.amount > 1_000_000 {
        return Err(ActionError::new("AmountTooLarge", "triage rejected implausible amount"));
    }
    Ok(req)
}

fn auto_approvable(req: &Request) -> bool {
    req.amount <= 500
}

#[tokio::main]
async fn main() {
    env_logger::init();

    let flow = named_condition!(
        named_action!(FlowBuilder::<Stage, Event, Request>::new().stage(Stage::Received), triage),
        auto_approvable,
        ConditionTarget::stage(Stage::Approved),
        ConditionTarget::stage(Stage::Review)
    )
        .stage(Stage::Review)
        .wait_for(Event::Approve)
        .join(Stage::Approved)
        .end()
        .stage(Stage::Review)
        .wait_for(Event::Reject)
        .join(Stage::Rejected)
        .end()
        .build()
        .expect("flow definition is valid");

    log::info!("diagram:\n{}", flowlite_core::diagram::render(&flow));

    let scheduler = InMemoryTickScheduler::new(SchedulerConfig::new(2, Duration::from_millis(25)));
    let engine = FlowEngine::new(InMemoryEventStore::new(), InMemoryHistoryStore::new(), scheduler);
    engine.install_tick_handler();

    engine
        .register_flow("approval", flow, InMemoryPersister::new())
        .await
        .expect("registration succeeds");

    let small = engine.start_instance("approval", Request { amount: 100, attempts: 0 }).await.unwrap();
    let large = engine
        .start_instance("approval", Request { amount: 2_000_000, attempts: 0 })
        .await
        .unwrap();
    tokio::time::sleep(Duration::from_millis(100)).await;

    println!("small request: {:?}", engine.get_status("approval", small).await.unwrap());
    println!("large request (first attempt rejected): {:?}", engine.get_status("approval", large).await.unwrap());

    engine.retry("approval", large).await.unwrap();
    tokio::time::sleep(Duration::from_millis(100)).await;
    println!("large request (retried): {:?}", engine.get_status("approval", large).await.unwrap());

    let pending = engine.start_instance("approval", Request { amount: 50_000, attempts: 0 }).await.unwrap();
    tokio::time::sleep(Duration::from_millis(100)).await;
    println!("needs review: {:?}", engine.get_status("approval", pending).await.unwrap());

    engine.send_event("approval", pending, Event::Approve).await.unwrap();
    tokio::time::sleep(Duration::from_millis(100)).await;
    println!("approved after review: {:?}", engine.get_status("approval", pending).await.unwrap());

    let cancelled = engine.start_instance("approval", Request { amount: 75_000, attempts: 0 }).await.unwrap();
    tokio::time::sleep(Duration::from_millis(100)).await;
    engine.cancel("approval", cancelled).await.unwrap();
    println!("cancelled: {:?}", engine.get_status("approval", cancelled).await.unwrap());

    for entry in engine.history("approval", small).await {
        println!("{:?}", entry);
    }
}
