//! # Restart policy for the queue supervisor.
//!
//! [`RestartPolicy::decide`] maps the number of consecutive restarts already
//! performed to a [`RestartDecision`]:
//!
//! ```text
//! consecutive = 0              → Restart { delay: 0 }            (first restart is immediate)
//! 0 < consecutive < max        → Restart { delay: backoff.next(consecutive - 1) }
//! consecutive >= max           → GiveUp
//! ```
//!
//! The caller resets `consecutive` to zero once an instance handled a delivery.

use std::time::Duration;

use super::BackoffPolicy;

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum RestartDecision {
    Restart { delay: Duration },
    GiveUp,
}

#[derive(Clone, Copy, Debug)]
pub struct RestartPolicy {
    /// Consecutive restarts allowed before giving up.
    pub max_restarts: u32,
    pub backoff: BackoffPolicy,
}

impl Default for RestartPolicy {
    /// Five consecutive restarts, 3 s apart.
    fn default() -> Self {
        Self {
            max_restarts: 5,
            backoff: BackoffPolicy::default(),
        }
    }
}

impl RestartPolicy {
    pub fn decide(&self, consecutive: u32) -> RestartDecision {
        if consecutive >= self.max_restarts {
            return RestartDecision::GiveUp;
        }
        let delay = match consecutive {
            0 => Duration::ZERO,
            n => self.backoff.next(n - 1),
        };
        RestartDecision::Restart { delay }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn first_restart_is_immediate_then_delayed() {
        let p = RestartPolicy::default();
        assert_eq!(p.decide(0), RestartDecision::Restart { delay: Duration::ZERO });
        assert_eq!(
            p.decide(1),
            RestartDecision::Restart {
                delay: Duration::from_secs(3)
            }
        );
        assert_eq!(
            p.decide(4),
            RestartDecision::Restart {
                delay: Duration::from_secs(3)
            }
        );
    }

    #[test]
    fn gives_up_at_bound() {
        let p = RestartPolicy::default();
        assert_eq!(p.decide(5), RestartDecision::GiveUp);
        assert_eq!(p.decide(100), RestartDecision::GiveUp);

        let never = RestartPolicy {
            max_restarts: 0,
            ..Default::default()
        };
        assert_eq!(never.decide(0), RestartDecision::GiveUp);
    }
}
