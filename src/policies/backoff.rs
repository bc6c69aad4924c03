//! # Backoff between queue supervisor restarts.
//!
//! The delay for attempt `n` is `first × factor^n`, clamped to `max`, then jittered.
//! The base is derived from the attempt number alone so jitter never feeds back.
//!
//! ```rust
//! use std::time::Duration;
//! use image_builder::{BackoffPolicy, JitterPolicy};
//!
//! let backoff = BackoffPolicy {
//!     first: Duration::from_secs(1),
//!     max: Duration::from_secs(10),
//!     factor: 2.0,
//!     jitter: JitterPolicy::None,
//! };
//! assert_eq!(backoff.next(0), Duration::from_secs(1));
//! assert_eq!(backoff.next(2), Duration::from_secs(4));
//! assert_eq!(backoff.next(10), Duration::from_secs(10));
//! ```

use std::time::Duration;

use crate::policies::jitter::JitterPolicy;

#[derive(Clone, Copy, Debug)]
pub struct BackoffPolicy {
    pub first: Duration,
    pub max: Duration,
    /// Multiplicative growth factor; `1.0` keeps the delay constant.
    pub factor: f64,
    pub jitter: JitterPolicy,
}

impl Default for BackoffPolicy {
    /// Constant 3 s between restarts, no jitter.
    fn default() -> Self {
        Self {
            first: Duration::from_secs(3),
            max: Duration::from_secs(60),
            factor: 1.0,
            jitter: JitterPolicy::None,
        }
    }
}

impl BackoffPolicy {
    /// Constant delay without jitter.
    pub fn constant(delay: Duration) -> Self {
        Self {
            first: delay,
            max: delay,
            factor: 1.0,
            jitter: JitterPolicy::None,
        }
    }

    /// Delay for the given attempt (0-indexed).
    pub fn next(&self, attempt: u32) -> Duration {
        let exp = attempt.min(i32::MAX as u32) as i32;
        let secs = self.first.as_secs_f64() * self.factor.powi(exp);
        let base = if !secs.is_finite() || secs < 0.0 || secs > self.max.as_secs_f64() {
            self.max
        } else {
            Duration::from_secs_f64(secs)
        };
        self.jitter.apply(base)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_is_constant_three_seconds() {
        let p = BackoffPolicy::default();
        for attempt in 0..8 {
            assert_eq!(p.next(attempt), Duration::from_secs(3));
        }
    }

    #[test]
    fn exponential_is_capped() {
        let p = BackoffPolicy {
            first: Duration::from_millis(100),
            max: Duration::from_secs(1),
            factor: 2.0,
            jitter: JitterPolicy::None,
        };
        assert_eq!(p.next(1), Duration::from_millis(200));
        assert_eq!(p.next(3), Duration::from_millis(800));
        assert_eq!(p.next(4), Duration::from_secs(1));
        assert_eq!(p.next(u32::MAX), Duration::from_secs(1));
    }

    #[test]
    fn first_above_max_is_clamped() {
        let p = BackoffPolicy {
            first: Duration::from_secs(10),
            max: Duration::from_secs(5),
            factor: 1.0,
            jitter: JitterPolicy::None,
        };
        assert_eq!(p.next(0), Duration::from_secs(5));
    }
}
