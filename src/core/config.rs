//! # Supervisor runtime settings.
//!
//! Built from the `supervisor` section of the application config; every
//! field has a default matching the production worker.

use std::time::Duration;

use crate::policies::RestartPolicy;

#[derive(Clone, Debug)]
pub struct SupervisorConfig {
    /// How long shutdown waits for the queue supervisor before giving up.
    pub grace: Duration,

    /// Event bus ring buffer size. Lagging listeners skip older events.
    pub bus_capacity: usize,

    /// Consecutive-restart bound and delays between restarts.
    pub restart: RestartPolicy,
}

impl SupervisorConfig {
    /// Bus capacity clamped to a minimum of 1.
    #[inline]
    pub fn bus_capacity_clamped(&self) -> usize {
        self.bus_capacity.max(1)
    }
}

impl Default for SupervisorConfig {
    /// `grace = 15s`, `bus_capacity = 1024`, five restarts 3 s apart.
    fn default() -> Self {
        Self {
            grace: Duration::from_secs(15),
            bus_capacity: 1024,
            restart: RestartPolicy::default(),
        }
    }
}
