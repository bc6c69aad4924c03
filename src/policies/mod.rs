//! Restart policies for the queue supervisor.
//!
//! ## Contents
//! - [`RestartPolicy`] whether to restart after a crash, given the consecutive count
//! - [`BackoffPolicy`] how long to wait before restarts after the first
//! - [`JitterPolicy`]  randomization of that wait
//!
//! ## Quick wiring
//! ```text
//! QueueSupervisor exits (crash / connect error / stream loss)
//!      └─► RestartPolicy::decide(consecutive)
//!           ├─ Restart { delay } → sleep (cancellable) → RestartRequest to the scheduler
//!           └─ GiveUp            → Done::Exhausted → RuntimeError::RestartsExhausted
//! ```

mod backoff;
mod jitter;
mod restart;

pub use backoff::BackoffPolicy;
pub use jitter::JitterPolicy;
pub use restart::{RestartDecision, RestartPolicy};
