//! # Event subscriber trait.
//!
//! [`Subscribe`] is the extension point for plugging event handlers into the worker.
//!
//! ```text
//! SubscriberSet ──► [bounded queue] ──► worker task ──► subscriber.on_event()
//!                                    └─► panic caught and logged
//! ```
//!
//! - A slow subscriber only affects its own queue.
//! - Queue overflow drops the event for this subscriber only.
//! - Events are processed sequentially (FIFO) per subscriber.

use async_trait::async_trait;

use crate::events::{Event, EventKind};

#[async_trait]
pub trait Subscribe: Send + Sync + 'static {
    /// Processes a single event from a dedicated worker task.
    async fn on_event(&self, event: &Event);

    /// Name used in overflow and panic logs.
    fn name(&self) -> &'static str {
        std::any::type_name::<Self>()
    }

    /// Filters events before they are queued. Default: every kind.
    fn accepts(&self, _kind: EventKind) -> bool {
        true
    }

    /// Preferred queue capacity, clamped to at least 1. Default: 1024.
    fn queue_capacity(&self) -> usize {
        1024
    }
}
