//! # Jitter for restart delays.
//!
//! - [`JitterPolicy::None`] exact delay
//! - [`JitterPolicy::Full`] random in `[0, delay]`
//! - [`JitterPolicy::Equal`] `delay/2 + random[0, delay/2]`
//!
//! Several workers that lose the same broker at once otherwise reconnect in lockstep.

use rand::Rng;
use serde::Deserialize;
use std::time::Duration;

#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum JitterPolicy {
    #[default]
    None,
    Full,
    Equal,
}

impl JitterPolicy {
    pub fn apply(&self, delay: Duration) -> Duration {
        let ms = delay.as_millis().min(u128::from(u64::MAX)) as u64;
        if ms == 0 {
            return Duration::ZERO;
        }
        let mut rng = rand::rng();
        match self {
            JitterPolicy::None => delay,
            JitterPolicy::Full => Duration::from_millis(rng.random_range(0..=ms)),
            JitterPolicy::Equal => {
                let half = ms / 2;
                Duration::from_millis(half + rng.random_range(0..=half))
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn none_is_identity() {
        assert_eq!(JitterPolicy::None.apply(Duration::from_secs(3)), Duration::from_secs(3));
    }

    #[test]
    fn bounds_hold() {
        let base = Duration::from_millis(1000);
        for _ in 0..100 {
            assert!(JitterPolicy::Full.apply(base) <= base);
            let eq = JitterPolicy::Equal.apply(base);
            assert!(eq >= Duration::from_millis(500) && eq <= base);
        }
        assert_eq!(JitterPolicy::Equal.apply(Duration::ZERO), Duration::ZERO);
    }
}
