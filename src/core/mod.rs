//! Runtime core: queue consumption and process lifecycle.
//!
//! The public API from this module is [`Supervisor`] (built with
//! [`SupervisorBuilder`]), which owns the restart scheduler and graceful shutdown.
//!
//! Internal modules:
//! - [`consumer`]: one queue supervisor instance, crash recovery and restart decision;
//! - [`supervisor`]: restart-request scheduler, signals, grace deadline;
//! - [`shutdown`]: termination signal handling;
//! - [`builder`]: wiring of bus, subscribers and orchestrator.

mod builder;
mod config;
mod consumer;
mod shutdown;
mod supervisor;

use std::any::Any;

pub use builder::SupervisorBuilder;
pub use config::SupervisorConfig;
pub use supervisor::Supervisor;

/// Best-effort text of a caught panic payload.
pub(crate) fn panic_message(panic: &(dyn Any + Send)) -> String {
    if let Some(s) = panic.downcast_ref::<&str>() {
        (*s).to_string()
    } else if let Some(s) = panic.downcast_ref::<String>() {
        s.clone()
    } else {
        "unknown panic payload".to_string()
    }
}

#[cfg(test)]
mod tests {
    use super::panic_message;

    #[test]
    fn extracts_both_payload_kinds() {
        let p = std::panic::catch_unwind(|| panic!("static")).unwrap_err();
        assert_eq!(panic_message(p.as_ref()), "static");
        let p = std::panic::catch_unwind(|| panic!("{}", 42)).unwrap_err();
        assert_eq!(panic_message(p.as_ref()), "42");
    }
}
