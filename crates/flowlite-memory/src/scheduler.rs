//! An in-memory tick scheduler: a bounded `mpsc` work queue drained by a
//! fixed pool of `tokio::spawn` workers, with an explicit in-flight guard so
//! at most one handler invocation runs per `(flow_id, instance_id)` even
//! though several workers share the queue.

use std::collections::HashSet;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, RwLock};

use async_trait::async_trait;
use flowlite_core::{FlowId, InstanceId, SchedulerConfig, TickHandler, TickScheduler};
use tokio::sync::{mpsc, Mutex};
use tokio::task::JoinHandle;

type Key = (FlowId, InstanceId);

pub struct InMemoryTickScheduler {
    handler: Arc<RwLock<Option<TickHandler>>>,
    sender: mpsc::Sender<Key>,
    receiver: Arc<Mutex<mpsc::Receiver<Key>>>,
    in_flight: Arc<Mutex<HashSet<Key>>>,
    stopped: Arc<AtomicBool>,
    workers: Mutex<Vec<JoinHandle<()>>>,
    poll_interval: std::time::Duration,
}

impl InMemoryTickScheduler {
    pub fn new(config: SchedulerConfig) -> Self {
        let (sender, receiver) = mpsc::channel(1024);
        let scheduler = Self {
            handler: Arc::new(RwLock::new(None)),
            sender,
            receiver: Arc::new(Mutex::new(receiver)),
            in_flight: Arc::new(Mutex::new(HashSet::new())),
            stopped: Arc::new(AtomicBool::new(false)),
            workers: Mutex::new(Vec::new()),
            poll_interval: config.poll_interval,
        };
        scheduler.spawn_workers(config.workers);
        scheduler
    }

    fn spawn_workers(&self, count: usize) {
        let mut handles = self.workers.try_lock().expect("no contention at construction");
        for _ in 0..count.max(1) {
            let handler = self.handler.clone();
            let receiver = self.receiver.clone();
            let in_flight = self.in_flight.clone();
            let stopped = self.stopped.clone();
            let sender = self.sender.clone();
            let poll_interval = self.poll_interval;
            handles.push(tokio::spawn(async move {
                loop {
                    if stopped.load(Ordering::Acquire) {
                        break;
                    }
                    let item = {
                        let mut rx = receiver.lock().await;
                        tokio::time::timeout(poll_interval, rx.recv()).await
                    };
                    let (flow_id, instance_id) = match item {
                        Ok(Some(key)) => key,
                        Ok(None) => break,
                        Err(_elapsed) => continue,
                    };
                    let key = (flow_id.clone(), instance_id);

                    {
                        let mut guard = in_flight.lock().await;
                        if guard.contains(&key) {
                            drop(guard);
                            // Another worker already owns this instance; requeue for
                            // a later pass instead of dropping the delivery.
                            let _ = sender.send(key).await;
                            continue;
                        }
                        guard.insert(key.clone());
                    }

                    let fut = {
                        let guard = handler.read().expect("handler lock poisoned");
                        guard.as_ref().map(|h| h(flow_id, instance_id))
                    };
                    match fut {
                        Some(fut) => fut.await,
                        None => {
                            // No handler installed yet; requeue so the delivery
                            // isn't lost, same as the in-flight-collision case.
                            in_flight.lock().await.remove(&key);
                            let _ = sender.send(key).await;
                            continue;
                        }
                    }

                    in_flight.lock().await.remove(&key);
                }
            }));
        }
    }
}

#[async_trait]
impl TickScheduler for InMemoryTickScheduler {
    fn set_tick_handler(&self, handler: TickHandler) {
        *self.handler.write().expect("handler lock poisoned") = Some(handler);
    }

    async fn schedule_tick(&self, flow_id: FlowId, instance_id: InstanceId) {
        if self.sender.send((flow_id, instance_id)).await.is_err() {
            log::warn!("schedule_tick dropped: scheduler is shutting down");
        }
    }

    async fn stop(&self, on_stopped: Box<dyn FnOnce() + Send>) {
        self.stopped.store(true, Ordering::Release);
        let mut workers = self.workers.lock().await;
        for w in workers.drain(..) {
            let _ = w.await;
        }
        on_stopped();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::AtomicUsize;

    #[tokio::test]
    async fn delivers_scheduled_ticks() {
        let scheduler = InMemoryTickScheduler::new(SchedulerConfig::new(2, std::time::Duration::from_millis(10)));
        let seen = Arc::new(AtomicUsize::new(0));
        let seen_clone = seen.clone();
        scheduler.set_tick_handler(Arc::new(move |_flow, _instance| {
            let seen = seen_clone.clone();
            Box::pin(async move {
                seen.fetch_add(1, Ordering::SeqCst);
            })
        }));

        scheduler.schedule_tick(FlowId::new("f"), InstanceId::new_v4()).await;
        tokio::time::sleep(std::time::Duration::from_millis(50)).await;
        assert_eq!(seen.load(Ordering::SeqCst), 1);

        let (tx, rx) = std::sync::mpsc::channel();
        scheduler.stop(Box::new(move || { let _ = tx.send(()); })).await;
        rx.recv_timeout(std::time::Duration::from_secs(1)).unwrap();
    }
}
