//! # QueueSupervisor: one consumer instance.
//!
//! Owns a broker session for its whole life and hands deliveries to the
//! orchestrator one at a time. It never loops on its own failures: when it
//! exits it either asks the scheduler for a fresh instance or reports done.
//!
//! ```text
//! run()
//!   ├─► publish ConsumerStarting
//!   ├─► consume()
//!   │      ├─ catch_unwind(connect) (cancellable) ─► ConsumerConnected
//!   │      ├─ catch_unwind(loop { cancelled? ─► stop ; next_delivery ─► orchestrator.handle })
//!   │      └─ session.close() (also after a panic)
//!   └─► exit
//!        ├─ cancelled                ─► ConsumerStopped ─► Done::Stopped
//!        └─ crashed (err / panic / stream end)
//!             ├─ handled > 0 → consecutive = 0
//!             └─ RestartPolicy::decide(consecutive)
//!                  ├─ Restart { delay } ─► RestartScheduled ─► sleep ─► RestartRequest
//!                  └─ GiveUp            ─► RestartsExhausted ─► Done::Exhausted
//! ```

use std::panic::AssertUnwindSafe;
use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};

use futures::FutureExt;
use tokio::{select, sync::mpsc, time};
use tokio_util::sync::CancellationToken;
use tracing::debug;

use crate::{
    broker::{Broker, ResponsePublisher, Session},
    events::{Bus, Event, EventKind},
    pipeline::Orchestrator,
    policies::{RestartDecision, RestartPolicy},
};

use super::panic_message;

/// Asks the scheduler to start a fresh instance.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) struct RestartRequest {
    /// Consecutive restarts without progress, including this one.
    pub consecutive: u32,
}

/// Final report of an instance that will not be replaced.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum Done {
    Stopped,
    Exhausted { restarts: u32 },
}

enum Exit {
    Stopped,
    Crashed(String),
}

pub(crate) struct Channels {
    pub restart: mpsc::Sender<RestartRequest>,
    pub done: mpsc::Sender<Done>,
}

pub(crate) struct QueueSupervisor {
    pub id: u64,
    pub consecutive: u32,
    pub broker: Arc<dyn Broker>,
    pub orchestrator: Arc<Orchestrator>,
    pub policy: RestartPolicy,
    pub bus: Bus,
    pub channels: Channels,
}

impl QueueSupervisor {
    pub async fn run(self, cancel: CancellationToken) {
        self.bus.publish(
            Event::new(EventKind::ConsumerStarting)
                .with_consumer(self.id)
                .with_restarts(self.consecutive),
        );

        let handled = AtomicU64::new(0);
        let exit = self.consume(&handled, &cancel).await;
        let handled = handled.load(Ordering::Relaxed);

        if cancel.is_cancelled() {
            self.stop().await;
            return;
        }
        let reason = match exit {
            Exit::Crashed(reason) => reason,
            Exit::Stopped => "stopped without cancellation".to_string(),
        };
        self.bus.publish(
            Event::new(EventKind::ConsumerCrashed)
                .with_consumer(self.id)
                .with_reason(reason),
        );

        let consecutive = if handled > 0 { 0 } else { self.consecutive };
        match self.policy.decide(consecutive) {
            RestartDecision::GiveUp => {
                self.bus.publish(
                    Event::new(EventKind::RestartsExhausted)
                        .with_consumer(self.id)
                        .with_restarts(consecutive),
                );
                let _ = self
                    .channels
                    .done
                    .send(Done::Exhausted {
                        restarts: consecutive,
                    })
                    .await;
            }
            RestartDecision::Restart { delay } => {
                let next = consecutive + 1;
                self.bus.publish(
                    Event::new(EventKind::RestartScheduled)
                        .with_consumer(self.id)
                        .with_restarts(next)
                        .with_delay(delay),
                );
                let sleep = time::sleep(delay);
                tokio::pin!(sleep);
                select! {
                    _ = &mut sleep => {}
                    _ = cancel.cancelled() => {
                        self.stop().await;
                        return;
                    }
                }
                let _ = self
                    .channels
                    .restart
                    .send(RestartRequest { consecutive: next })
                    .await;
            }
        }
    }

    async fn stop(&self) {
        self.bus
            .publish(Event::new(EventKind::ConsumerStopped).with_consumer(self.id));
        let _ = self.channels.done.send(Done::Stopped).await;
    }

    async fn consume(&self, handled: &AtomicU64, cancel: &CancellationToken) -> Exit {
        let connected = select! {
            res = AssertUnwindSafe(self.broker.connect()).catch_unwind() => res,
            _ = cancel.cancelled() => return Exit::Stopped,
        };
        let mut session = match connected {
            Ok(Ok(session)) => session,
            Ok(Err(e)) => return Exit::Crashed(e.to_string()),
            Err(panic) => return Exit::Crashed(crash_reason(panic.as_ref())),
        };
        self.bus
            .publish(Event::new(EventKind::ConsumerConnected).with_consumer(self.id));

        // The session outlives the unwind scope so it is closed even after a panic.
        let exit = match AssertUnwindSafe(self.deliver(session.as_mut(), handled, cancel))
            .catch_unwind()
            .await
        {
            Ok(exit) => exit,
            Err(panic) => Exit::Crashed(crash_reason(panic.as_ref())),
        };
        session.close().await;
        exit
    }

    async fn deliver(
        &self,
        session: &mut dyn Session,
        handled: &AtomicU64,
        cancel: &CancellationToken,
    ) -> Exit {
        let publisher = ResponsePublisher::new(session.sink());
        loop {
            if cancel.is_cancelled() {
                return Exit::Stopped;
            }
            let next = select! {
                biased;
                _ = cancel.cancelled() => return Exit::Stopped,
                next = session.next_delivery() => next,
            };
            let delivery = match next {
                Ok(Some(delivery)) => delivery,
                Ok(None) => return Exit::Crashed("delivery stream closed".into()),
                Err(e) => return Exit::Crashed(e.to_string()),
            };
            match self.orchestrator.handle(delivery, &publisher, cancel).await {
                Ok(outcome) => {
                    handled.fetch_add(1, Ordering::Relaxed);
                    debug!(consumer = self.id, ?outcome, "delivery handled");
                }
                Err(e) => return Exit::Crashed(e.to_string()),
            }
        }
    }
}

fn crash_reason(panic: &(dyn std::any::Any + Send)) -> String {
    format!("panic: {}", panic_message(panic))
}
