//! # Runtime events emitted by the supervisors and the pipeline.
//!
//! The [`EventKind`] enum classifies event types across three categories:
//! - **Process events**: shutdown flow (requested, stopped within grace, grace exceeded)
//! - **Consumer events**: queue supervisor lifecycle (starting, connected, crashed, restarts)
//! - **Pipeline events**: per-delivery outcomes (received, failed, skipped, succeeded)
//!
//! The [`Event`] struct carries optional metadata such as the application id,
//! failing stage, fault, restart count and delays.
//!
//! ## Ordering guarantees
//! Each event has a globally unique sequence number (`seq`) that increases monotonically.
//!
//! ## Example
//! ```rust
//! use image_builder::{Event, EventKind};
//! use image_builder::model::Fault;
//!
//! let ev = Event::new(EventKind::StageFailed)
//!     .with_application("65f0c0ffee")
//!     .with_stage("pull")
//!     .with_fault(Fault::User)
//!     .with_reason("branch dev not found");
//!
//! assert_eq!(ev.kind, EventKind::StageFailed);
//! assert_eq!(ev.application.as_deref(), Some("65f0c0ffee"));
//! ```

use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering as AtomicOrdering};
use std::time::{Duration, SystemTime};

use crate::model::Fault;

/// Global sequence counter for event ordering.
static EVENT_SEQ: AtomicU64 = AtomicU64::new(0);

/// Classification of runtime events.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EventKind {
    // === Process events ===
    /// Termination signal observed; consumers are being cancelled.
    ShutdownRequested,

    /// The queue supervisor stopped within the grace period.
    AllStoppedWithin,

    /// Grace period exceeded; the process exits anyway.
    GraceExceeded,

    // === Consumer events ===
    /// A queue supervisor instance is starting.
    ///
    /// Sets: `consumer`, `restarts`
    ConsumerStarting,

    /// Broker connection, queues and consumer are ready.
    ///
    /// Sets: `consumer`
    ConsumerConnected,

    /// Consumer exited after cancellation.
    ///
    /// Sets: `consumer`
    ConsumerStopped,

    /// Consumer failed (connect error, broker fault, stream loss or panic).
    ///
    /// Sets: `consumer`, `reason`
    ConsumerCrashed,

    /// A fresh consumer was requested from the scheduler.
    ///
    /// Sets: `consumer`, `restarts` (consecutive count after this restart), `delay_ms`
    RestartScheduled,

    /// Restart policy gave up.
    ///
    /// Sets: `consumer`, `restarts`
    RestartsExhausted,

    // === Pipeline events ===
    /// A delivery was taken off the request queue.
    DeliveryReceived,

    /// A stage failed.
    ///
    /// Sets: `application`, `stage`, `fault`, `reason`
    StageFailed,

    /// The request was acknowledged without building (application being deleted).
    ///
    /// Sets: `application`, `stage`
    BuildSkipped,

    /// The request was interrupted by shutdown and returned to the queue.
    ///
    /// Sets: `application`, `stage`
    BuildCancelled,

    /// Image built (and pushed when a registry is configured).
    ///
    /// Sets: `application`, `reason` (image name)
    BuildSucceeded,
}

impl EventKind {
    /// True for events emitted while handling a single delivery.
    pub fn is_pipeline(self) -> bool {
        matches!(
            self,
            EventKind::DeliveryReceived
                | EventKind::StageFailed
                | EventKind::BuildSkipped
                | EventKind::BuildCancelled
                | EventKind::BuildSucceeded
        )
    }
}

/// Runtime event with optional metadata.
#[derive(Clone, Debug)]
pub struct Event {
    /// Globally unique, monotonically increasing sequence number.
    pub seq: u64,
    /// Wall-clock timestamp.
    pub at: SystemTime,
    /// Event classification.
    pub kind: EventKind,

    /// Queue supervisor instance id.
    pub consumer: Option<u64>,
    /// Consecutive restart count.
    pub restarts: Option<u32>,
    /// Delay before the next restart in milliseconds (compact).
    pub delay_ms: Option<u32>,
    /// Application the delivery targets.
    pub application: Option<Arc<str>>,
    /// Pipeline stage label.
    pub stage: Option<&'static str>,
    /// Fault classification of a failed stage.
    pub fault: Option<Fault>,
    /// Human-readable reason.
    pub reason: Option<Arc<str>>,
}

impl Event {
    /// Creates a new event of the given kind with current timestamp and next sequence number.
    pub fn new(kind: EventKind) -> Self {
        Self {
            seq: EVENT_SEQ.fetch_add(1, AtomicOrdering::Relaxed),
            at: SystemTime::now(),
            kind,
            consumer: None,
            restarts: None,
            delay_ms: None,
            application: None,
            stage: None,
            fault: None,
            reason: None,
        }
    }

    #[inline]
    pub fn with_consumer(mut self, id: u64) -> Self {
        self.consumer = Some(id);
        self
    }

    #[inline]
    pub fn with_restarts(mut self, n: u32) -> Self {
        self.restarts = Some(n);
        self
    }

    /// Attaches a restart delay (stored as milliseconds).
    #[inline]
    pub fn with_delay(mut self, d: Duration) -> Self {
        let ms = d.as_millis().min(u128::from(u32::MAX)) as u32;
        self.delay_ms = Some(ms);
        self
    }

    #[inline]
    pub fn with_application(mut self, id: impl Into<Arc<str>>) -> Self {
        self.application = Some(id.into());
        self
    }

    #[inline]
    pub fn with_stage(mut self, stage: &'static str) -> Self {
        self.stage = Some(stage);
        self
    }

    #[inline]
    pub fn with_fault(mut self, fault: Fault) -> Self {
        self.fault = Some(fault);
        self
    }

    #[inline]
    pub fn with_reason(mut self, reason: impl Into<Arc<str>>) -> Self {
        self.reason = Some(reason.into());
        self
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn seq_is_monotonic() {
        let a = Event::new(EventKind::DeliveryReceived);
        let b = Event::new(EventKind::DeliveryReceived);
        assert!(b.seq > a.seq);
    }

    #[test]
    fn delay_saturates() {
        let ev = Event::new(EventKind::RestartScheduled).with_delay(Duration::from_secs(u64::MAX));
        assert_eq!(ev.delay_ms, Some(u32::MAX));
    }
}
