//! The Tick Scheduler interface (spec §4.D): durable wake-ups with
//! at-least-once delivery and at most one in-flight handler invocation per
//! `(flow_id, instance_id)`.

use std::future::Future;
use std::pin::Pin;
use std::sync::Arc;

use async_trait::async_trait;

use crate::ids::{FlowId, InstanceId};

pub type BoxFuture = Pin<Box<dyn Future<Output = ()> + Send>>;

/// Callback the scheduler invokes for a due `(flow_id, instance_id)` tick.
pub type TickHandler = Arc<dyn Fn(FlowId, InstanceId) -> BoxFuture + Send + Sync>;

#[async_trait]
pub trait TickScheduler: Send + Sync {
    /// Register the single handler the scheduler drives every due tick
    /// through. Must be called once, before any `schedule_tick`.
    fn set_tick_handler(&self, handler: TickHandler);

    /// Durably record that `(flow_id, instance_id)` should be ticked.
    async fn schedule_tick(&self, flow_id: FlowId, instance_id: InstanceId);

    /// Stop accepting new work, wait for in-flight handlers to finish (or a
    /// grace period to elapse), then invoke `on_stopped`.
    async fn stop(&self, on_stopped: Box<dyn FnOnce() + Send>);
}
