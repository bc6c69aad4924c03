//! # Supervisor: restart scheduler, signals and graceful shutdown.
//!
//! The [`Supervisor`] owns the event bus, the [`SubscriberSet`] and the single
//! active [`QueueSupervisor`](super::consumer::QueueSupervisor) instance.
//!
//! ## High-level architecture
//! ```text
//! run_until(shutdown):
//!   listener: Bus.subscribe() ─► SubscriberSet::emit(&Event)
//!   restart_tx ◄── RestartRequest { consecutive: 0 }        (first instance)
//!
//!   loop select {
//!     shutdown fired        ─► break
//!     restart_rx.recv()     ─► spawn QueueSupervisor #n (child token)
//!     done_rx.recv()
//!        ├─ Exhausted       ─► Err(RestartsExhausted)
//!        └─ Stopped         ─► Ok(())
//!   }
//!
//! Shutdown path:
//!   Bus.publish(ShutdownRequested)
//!   runtime_token.cancel()  → instance stops at its next checkpoint
//!   wait for the active instance up to cfg.grace:
//!      ├─ joined   → AllStoppedWithin, Ok(())
//!      └─ timeout  → GraceExceeded,    Err(GraceExceeded)
//! ```
//!
//! Only one instance is alive at a time: an instance requests its replacement
//! as the last thing it does, and the scheduler spawns it after that.

use std::future::Future;
use std::io;
use std::sync::Arc;

use tokio::{
    sync::{broadcast::error::RecvError, mpsc},
    task::JoinHandle,
};
use tokio_util::sync::CancellationToken;
use tracing::{info, warn};

use crate::{
    broker::Broker,
    core::{
        SupervisorConfig,
        consumer::{Channels, Done, QueueSupervisor, RestartRequest},
        shutdown,
    },
    error::RuntimeError,
    events::{Bus, Event, EventKind},
    pipeline::Orchestrator,
    subscribers::SubscriberSet,
};

/// Process-level supervisor of the queue consumer.
pub struct Supervisor {
    cfg: SupervisorConfig,
    bus: Bus,
    subs: SubscriberSet,
    broker: Arc<dyn Broker>,
    orchestrator: Arc<Orchestrator>,
}

impl Supervisor {
    pub(crate) fn new_internal(
        cfg: SupervisorConfig,
        bus: Bus,
        subs: SubscriberSet,
        broker: Arc<dyn Broker>,
        orchestrator: Arc<Orchestrator>,
    ) -> Self {
        Self {
            cfg,
            bus,
            subs,
            broker,
            orchestrator,
        }
    }

    /// Runs until a termination signal arrives or the restart policy gives up.
    pub async fn run(self) -> Result<(), RuntimeError> {
        self.run_until(shutdown::wait_for_shutdown_signal()).await
    }

    /// Runs until `shutdown` completes or the restart policy gives up.
    ///
    /// An `Err` from `shutdown` means signal handlers could not be installed.
    pub async fn run_until<F>(self, shutdown: F) -> Result<(), RuntimeError>
    where
        F: Future<Output = io::Result<()>>,
    {
        let Supervisor {
            cfg,
            bus,
            subs,
            broker,
            orchestrator,
        } = self;

        let stop_listener = CancellationToken::new();
        let listener = subscriber_listener(&bus, subs, stop_listener.clone());

        let scheduler = Scheduler {
            cfg,
            bus,
            broker,
            orchestrator,
        };
        let result = scheduler.drive(shutdown).await;

        stop_listener.cancel();
        let _ = listener.await;
        result
    }
}

struct Scheduler {
    cfg: SupervisorConfig,
    bus: Bus,
    broker: Arc<dyn Broker>,
    orchestrator: Arc<Orchestrator>,
}

impl Scheduler {
    async fn drive<F>(&self, shutdown: F) -> Result<(), RuntimeError>
    where
        F: Future<Output = io::Result<()>>,
    {
        let runtime_token = CancellationToken::new();
        let (restart_tx, mut restart_rx) = mpsc::channel::<RestartRequest>(4);
        let (done_tx, mut done_rx) = mpsc::channel::<Done>(4);

        let mut next_id: u64 = 0;
        let mut active: Option<JoinHandle<()>> = None;
        let _ = restart_tx.send(RestartRequest { consecutive: 0 }).await;

        tokio::pin!(shutdown);
        loop {
            tokio::select! {
                res = &mut shutdown => {
                    if let Err(e) = res {
                        runtime_token.cancel();
                        return Err(RuntimeError::Signal(e));
                    }
                    info!("termination signal received");
                    break;
                }
                Some(req) = restart_rx.recv() => {
                    next_id += 1;
                    let instance = QueueSupervisor {
                        id: next_id,
                        consecutive: req.consecutive,
                        broker: Arc::clone(&self.broker),
                        orchestrator: Arc::clone(&self.orchestrator),
                        policy: self.cfg.restart,
                        bus: self.bus.clone(),
                        channels: Channels {
                            restart: restart_tx.clone(),
                            done: done_tx.clone(),
                        },
                    };
                    active = Some(tokio::spawn(instance.run(runtime_token.child_token())));
                }
                Some(done) = done_rx.recv() => match done {
                    Done::Exhausted { restarts } => {
                        runtime_token.cancel();
                        return Err(RuntimeError::RestartsExhausted { restarts });
                    }
                    Done::Stopped => return Ok(()),
                },
            }
        }

        self.bus.publish(Event::new(EventKind::ShutdownRequested));
        runtime_token.cancel();
        self.wait_with_grace(active).await
    }

    /// Waits for the active instance within the configured grace period.
    async fn wait_with_grace(&self, active: Option<JoinHandle<()>>) -> Result<(), RuntimeError> {
        let grace = self.cfg.grace;
        let joined = match active {
            Some(handle) => tokio::time::timeout(grace, handle).await.is_ok(),
            None => true,
        };

        if joined {
            self.bus.publish(Event::new(EventKind::AllStoppedWithin));
            Ok(())
        } else {
            self.bus.publish(Event::new(EventKind::GraceExceeded));
            Err(RuntimeError::GraceExceeded { grace })
        }
    }
}

/// Forwards bus events to the subscriber set until `stop`, then drains and closes it.
fn subscriber_listener(bus: &Bus, set: SubscriberSet, stop: CancellationToken) -> JoinHandle<()> {
    let mut rx = bus.subscribe();
    tokio::spawn(async move {
        loop {
            tokio::select! {
                biased;
                ev = rx.recv() => match ev {
                    Ok(ev) => set.emit(&ev),
                    Err(RecvError::Lagged(skipped)) => {
                        warn!(skipped, "event listener lagged");
                    }
                    Err(RecvError::Closed) => break,
                },
                _ = stop.cancelled() => {
                    while let Ok(ev) = rx.try_recv() {
                        set.emit(&ev);
                    }
                    break;
                }
            }
        }
        set.shutdown().await;
    })
}
