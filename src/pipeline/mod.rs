//! # Build pipeline.
//!
//! - [`Orchestrator`] drives one delivery through the stage sequence
//! - [`fault`] decides what happens to a delivery whose stage failed
//! - [`plan`] synthesizes a build config when the caller gave none
//! - [`WorkDir`] guarantees the pulled tree is reclaimed

pub mod fault;
mod orchestrator;
pub mod plan;
mod workdir;

pub use fault::{AckAction, ack_for, classify};
pub use orchestrator::{DEFAULT_CONNECTOR, Orchestrator, Outcome, Stage};
pub use workdir::WorkDir;
