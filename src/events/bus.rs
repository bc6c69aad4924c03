//! # Event bus for broadcasting runtime events.
//!
//! [`Bus`] is a thin wrapper around [`tokio::sync::broadcast`]:
//!
//! ```text
//! Publishers (many):                     Listener (one):
//!   QueueSupervisor ──┐
//!   Orchestrator    ──┼──► Bus ──► Supervisor listener ──► SubscriberSet
//!   Supervisor      ──┘
//! ```
//!
//! - `publish()` never blocks; events sent with no receiver are dropped.
//! - Receivers that fall more than `capacity` events behind skip the oldest ones.

use tokio::sync::broadcast;

use super::event::Event;

#[derive(Clone, Debug)]
pub struct Bus {
    tx: broadcast::Sender<Event>,
}

impl Bus {
    /// Creates a new bus; capacity is clamped to at least 1.
    pub fn new(capacity: usize) -> Self {
        let (tx, _rx) = broadcast::channel::<Event>(capacity.max(1));
        Self { tx }
    }

    pub fn publish(&self, ev: Event) {
        let _ = self.tx.send(ev);
    }

    /// Creates a receiver that observes events sent after this call.
    pub fn subscribe(&self) -> broadcast::Receiver<Event> {
        self.tx.subscribe()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::events::EventKind;

    #[tokio::test]
    async fn subscribers_see_later_events_only() {
        let bus = Bus::new(0);
        bus.publish(Event::new(EventKind::DeliveryReceived));
        let mut rx = bus.subscribe();
        bus.publish(Event::new(EventKind::BuildSucceeded));
        assert_eq!(rx.recv().await.unwrap().kind, EventKind::BuildSucceeded);
    }
}
