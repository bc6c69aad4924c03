use std::sync::Arc;

use crate::{
    broker::Broker,
    core::SupervisorConfig,
    events::Bus,
    pipeline::Orchestrator,
    providers::Providers,
    subscribers::{Subscribe, SubscriberSet},
};

use super::supervisor::Supervisor;

/// Builder for constructing a [`Supervisor`].
pub struct SupervisorBuilder {
    cfg: SupervisorConfig,
    broker: Arc<dyn Broker>,
    providers: Providers,
    subscribers: Vec<Arc<dyn Subscribe>>,
}

impl SupervisorBuilder {
    pub fn new(cfg: SupervisorConfig, broker: Arc<dyn Broker>, providers: Providers) -> Self {
        Self {
            cfg,
            broker,
            providers,
            subscribers: Vec::new(),
        }
    }

    /// Sets event subscribers.
    ///
    /// Each one gets a dedicated worker with a bounded queue.
    pub fn with_subscribers(mut self, subscribers: Vec<Arc<dyn Subscribe>>) -> Self {
        self.subscribers = subscribers;
        self
    }

    /// Wires the bus, subscriber workers and orchestrator.
    ///
    /// Must be called inside a tokio runtime: subscriber workers are spawned here.
    pub fn build(self) -> Supervisor {
        let bus = Bus::new(self.cfg.bus_capacity_clamped());
        let subs = SubscriberSet::new(self.subscribers);
        let orchestrator = Arc::new(Orchestrator::new(self.providers, bus.clone()));
        Supervisor::new_internal(self.cfg, bus, subs, self.broker, orchestrator)
    }
}
