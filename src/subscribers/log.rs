//! # LogWriter: renders runtime events through `tracing`.
//!
//! ```text
//! INFO  consumer connected consumer=3
//! WARN  restart scheduled consumer=3 restarts=2 delay_ms=3000
//! WARN  stage failed application=65f0… stage=pull fault=user reason="branch dev not found"
//! INFO  build succeeded application=65f0… image=applications/app:4be1…
//! ```

use async_trait::async_trait;
use tracing::{error, info, warn};

use crate::events::{Event, EventKind};
use crate::model::Fault;
use crate::subscribers::Subscribe;

#[derive(Default)]
pub struct LogWriter;

impl LogWriter {
    #[must_use]
    pub fn new() -> Self {
        Self
    }
}

#[async_trait]
impl Subscribe for LogWriter {
    async fn on_event(&self, e: &Event) {
        let app = e.application.as_deref().unwrap_or("");
        let reason = e.reason.as_deref().unwrap_or("");
        match e.kind {
            EventKind::ShutdownRequested => info!("shutdown requested"),
            EventKind::AllStoppedWithin => info!("consumer stopped within grace"),
            EventKind::GraceExceeded => error!("grace exceeded, forcing exit"),
            EventKind::ConsumerStarting => {
                info!(consumer = e.consumer, restarts = e.restarts, "consumer starting")
            }
            EventKind::ConsumerConnected => info!(consumer = e.consumer, "consumer connected"),
            EventKind::ConsumerStopped => info!(consumer = e.consumer, "consumer stopped"),
            EventKind::ConsumerCrashed => {
                error!(consumer = e.consumer, reason, "consumer crashed")
            }
            EventKind::RestartScheduled => warn!(
                consumer = e.consumer,
                restarts = e.restarts,
                delay_ms = e.delay_ms,
                "restart scheduled"
            ),
            EventKind::RestartsExhausted => error!(
                consumer = e.consumer,
                restarts = e.restarts,
                "restarts exhausted, not restarting"
            ),
            EventKind::DeliveryReceived => info!("received build request"),
            EventKind::StageFailed => {
                let fault = e.fault.map(|f| f.as_str()).unwrap_or("");
                if e.fault == Some(Fault::Service) {
                    error!(application = app, stage = e.stage, fault, reason, "stage failed");
                } else {
                    warn!(application = app, stage = e.stage, fault, reason, "stage failed");
                }
            }
            EventKind::BuildSkipped => {
                info!(application = app, stage = e.stage, "application is being deleted, skipping")
            }
            EventKind::BuildCancelled => {
                warn!(application = app, stage = e.stage, "build interrupted, requeued")
            }
            EventKind::BuildSucceeded => {
                info!(application = app, image = reason, "build succeeded")
            }
        }
    }

    fn name(&self) -> &'static str {
        "log-writer"
    }
}
