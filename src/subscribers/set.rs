//! # SubscriberSet: per-subscriber queues fed from the event listener.
//!
//! ```text
//! emit(&Event) ──► accepts(kind)? ──► try_send ──► [queue] ──► worker ──► on_event()
//!                        │ no              │ full/closed
//!                        ▼                 ▼
//!                      skip          dropped += 1
//! ```
//!
//! `emit` never waits on a subscriber. A build emits a handful of events while
//! consumer restarts can burst, so overflow is counted rather than logged per
//! event, and the totals are reported on shutdown.

use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};

use futures::FutureExt;
use tokio::{sync::mpsc, task::JoinHandle};
use tracing::{debug, error, warn};

use crate::core::panic_message;
use crate::events::Event;

use super::Subscribe;

struct Lane {
    sub: Arc<dyn Subscribe>,
    tx: mpsc::Sender<Arc<Event>>,
    dropped: AtomicU64,
}

pub struct SubscriberSet {
    lanes: Vec<Lane>,
    workers: Vec<JoinHandle<()>>,
}

impl SubscriberSet {
    /// Spawns one worker per subscriber. Requires a tokio runtime.
    #[must_use]
    pub fn new(subs: Vec<Arc<dyn Subscribe>>) -> Self {
        let (lanes, workers) = subs
            .into_iter()
            .map(|sub| {
                let (tx, rx) = mpsc::channel(sub.queue_capacity().max(1));
                let worker = tokio::spawn(drain(Arc::clone(&sub), rx));
                let lane = Lane {
                    sub,
                    tx,
                    dropped: AtomicU64::new(0),
                };
                (lane, worker)
            })
            .unzip();
        Self { lanes, workers }
    }

    /// Queues `event` for every subscriber that accepts its kind.
    pub fn emit(&self, event: &Event) {
        let mut shared: Option<Arc<Event>> = None;
        for lane in self.lanes.iter().filter(|l| l.sub.accepts(event.kind)) {
            let ev = shared.get_or_insert_with(|| Arc::new(event.clone()));
            if lane.tx.try_send(Arc::clone(ev)).is_err() {
                lane.dropped.fetch_add(1, Ordering::Relaxed);
            }
        }
    }

    /// Events dropped so far for the subscriber named `name`.
    pub fn dropped(&self, name: &str) -> u64 {
        self.lanes
            .iter()
            .filter(|l| l.sub.name() == name)
            .map(|l| l.dropped.load(Ordering::Relaxed))
            .sum()
    }

    /// Closes every queue, waits for workers to finish what is queued and
    /// reports subscribers that lost events.
    pub async fn shutdown(self) {
        for lane in &self.lanes {
            let dropped = lane.dropped.load(Ordering::Relaxed);
            if dropped > 0 {
                warn!(subscriber = lane.sub.name(), dropped, "subscriber queue overflowed");
            }
        }
        drop(self.lanes);
        for worker in self.workers {
            let _ = worker.await;
        }
        debug!("subscribers drained");
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.lanes.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.lanes.is_empty()
    }
}

async fn drain(sub: Arc<dyn Subscribe>, mut rx: mpsc::Receiver<Arc<Event>>) {
    while let Some(ev) = rx.recv().await {
        let handled = std::panic::AssertUnwindSafe(sub.on_event(&ev))
            .catch_unwind()
            .await;
        if let Err(panic) = handled {
            error!(
                subscriber = sub.name(),
                panic = %panic_message(panic.as_ref()),
                kind = ?ev.kind,
                "subscriber panicked"
            );
        }
    }
}

#[cfg(test)]
mod tests {
    use std::time::Duration;

    use async_trait::async_trait;

    use super::*;
    use crate::events::EventKind;
    use crate::testkit::Recorder;

    struct Exploder;

    #[async_trait]
    impl Subscribe for Exploder {
        async fn on_event(&self, _event: &Event) {
            panic!("boom");
        }
        fn name(&self) -> &'static str {
            "exploder"
        }
    }

    /// Only wants consumer lifecycle events and handles them slowly.
    struct SlowLifecycle {
        rec: Recorder,
    }

    #[async_trait]
    impl Subscribe for SlowLifecycle {
        async fn on_event(&self, event: &Event) {
            tokio::time::sleep(Duration::from_millis(20)).await;
            self.rec.on_event(event).await;
        }
        fn name(&self) -> &'static str {
            "slow-lifecycle"
        }
        fn accepts(&self, kind: EventKind) -> bool {
            !kind.is_pipeline()
        }
        fn queue_capacity(&self) -> usize {
            1
        }
    }

    #[tokio::test]
    async fn panicking_subscriber_does_not_starve_others() {
        let rec = Arc::new(Recorder::default());
        let set = SubscriberSet::new(vec![Arc::new(Exploder) as Arc<dyn Subscribe>, rec.clone()]);
        assert_eq!(set.len(), 2);

        set.emit(&Event::new(EventKind::DeliveryReceived));
        set.emit(&Event::new(EventKind::BuildSucceeded));
        set.shutdown().await;

        assert_eq!(
            rec.kinds(),
            vec![EventKind::DeliveryReceived, EventKind::BuildSucceeded]
        );
    }

    #[tokio::test]
    async fn filtered_kinds_are_not_queued_and_overflow_is_counted() {
        let slow = Arc::new(SlowLifecycle {
            rec: Recorder::default(),
        });
        let set = SubscriberSet::new(vec![slow.clone() as Arc<dyn Subscribe>]);

        // Pipeline events never reach the queue, so they cannot overflow it.
        set.emit(&Event::new(EventKind::DeliveryReceived));
        set.emit(&Event::new(EventKind::BuildSucceeded));
        assert_eq!(set.dropped("slow-lifecycle"), 0);

        for _ in 0..5 {
            set.emit(&Event::new(EventKind::ConsumerCrashed));
        }
        let dropped = set.dropped("slow-lifecycle");
        assert!(dropped >= 3, "dropped {dropped}");
        set.shutdown().await;

        let kinds = slow.rec.kinds();
        assert!(kinds.iter().all(|k| *k == EventKind::ConsumerCrashed));
        assert_eq!(kinds.len() as u64 + dropped, 5);
    }
}
