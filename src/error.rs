//! Error types used by the worker runtime and the build pipeline.
//!
//! This module defines two main error enums:
//!
//! - [`RuntimeError`] errors raised by the process supervisor itself.
//! - [`StageError`] errors raised by a single pipeline stage while handling one delivery.
//!
//! Both types provide `as_label` for logs; [`StageError::fault`] assigns blame.
//! Seam-specific errors (broker, store, providers) live next to their traits.

use std::time::Duration;
use thiserror::Error;

use crate::model::Fault;

/// # Errors produced by the worker runtime.
///
/// These end [`Supervisor::run`](crate::Supervisor::run) with a non-zero exit.
#[non_exhaustive]
#[derive(Error, Debug)]
pub enum RuntimeError {
    /// Shutdown grace period was exceeded; the queue supervisor never reported completion.
    #[error("shutdown timeout {grace:?} exceeded; forcing termination")]
    GraceExceeded {
        /// The configured grace duration.
        grace: Duration,
    },

    /// The queue supervisor crashed more often in a row than the restart policy allows.
    #[error("queue supervisor gave up after {restarts} consecutive restarts")]
    RestartsExhausted {
        /// Consecutive restarts performed before giving up.
        restarts: u32,
    },

    /// Termination signal handlers could not be installed.
    #[error("failed to install signal handlers: {0}")]
    Signal(#[from] std::io::Error),
}

impl RuntimeError {
    /// Returns a short stable label (snake_case) for use in logs.
    ///
    /// # Example
    /// ```
    /// use image_builder::RuntimeError;
    /// use std::time::Duration;
    ///
    /// let err = RuntimeError::GraceExceeded { grace: Duration::from_secs(15) };
    /// assert_eq!(err.as_label(), "runtime_grace_exceeded");
    /// ```
    pub fn as_label(&self) -> &'static str {
        match self {
            RuntimeError::GraceExceeded { .. } => "runtime_grace_exceeded",
            RuntimeError::RestartsExhausted { .. } => "runtime_restarts_exhausted",
            RuntimeError::Signal(_) => "runtime_signal",
        }
    }
}

/// # Errors produced by one pipeline stage.
///
/// Every variant maps to exactly one [`Fault`]:
/// `Decode`, `Input` and `BuildFailure` blame the caller, the rest blame the worker.
#[non_exhaustive]
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum StageError {
    /// The delivery body is not a well-formed build request.
    #[error("invalid request: {0}")]
    Decode(String),

    /// The application state could not be read.
    #[error("cannot read application state: {0}")]
    Gate(String),

    /// The caller's repository, credentials or build configuration are unusable.
    #[error("{0}")]
    Input(String),

    /// The user's source failed to build; `output` carries the engine diagnostics.
    #[error("{message}")]
    BuildFailure {
        /// Short summary.
        message: String,
        /// Raw build-engine output.
        output: String,
    },

    /// The worker or one of its collaborators failed.
    #[error("{0}")]
    Infrastructure(String),

    /// The source-control API throttled us.
    #[error("rate limited: {0}")]
    RateLimited(String),
}

impl StageError {
    /// Who is to blame for this failure.
    pub fn fault(&self) -> Fault {
        match self {
            StageError::Decode(_) | StageError::Input(_) | StageError::BuildFailure { .. } => {
                Fault::User
            }
            StageError::Gate(_) | StageError::Infrastructure(_) | StageError::RateLimited(_) => {
                Fault::Service
            }
        }
    }

    /// Returns a short stable label (snake_case) for use in logs.
    pub fn as_label(&self) -> &'static str {
        match self {
            StageError::Decode(_) => "stage_decode",
            StageError::Gate(_) => "stage_gate",
            StageError::Input(_) => "stage_input",
            StageError::BuildFailure { .. } => "stage_build_failure",
            StageError::Infrastructure(_) => "stage_infrastructure",
            StageError::RateLimited(_) => "stage_rate_limited",
        }
    }

    /// Message placed in the response; build failures include the raw engine output.
    pub fn as_message(&self) -> String {
        match self {
            StageError::BuildFailure { message, output } if !output.is_empty() => {
                format!("{message}\n{output}")
            }
            other => other.to_string(),
        }
    }

    /// Engine output attached to a build failure, empty otherwise.
    pub fn build_output(&self) -> &str {
        match self {
            StageError::BuildFailure { output, .. } => output,
            _ => "",
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn fault_mapping() {
        assert_eq!(StageError::Decode("x".into()).fault(), Fault::User);
        assert_eq!(StageError::Input("x".into()).fault(), Fault::User);
        assert_eq!(
            StageError::BuildFailure {
                message: "m".into(),
                output: "o".into()
            }
            .fault(),
            Fault::User
        );
        assert_eq!(StageError::Gate("x".into()).fault(), Fault::Service);
        assert_eq!(StageError::Infrastructure("x".into()).fault(), Fault::Service);
        assert_eq!(StageError::RateLimited("x".into()).fault(), Fault::Service);
    }

    #[test]
    fn build_failure_message_carries_output() {
        let err = StageError::BuildFailure {
            message: "build failed".into(),
            output: "npm ERR! missing script: build".into(),
        };
        let msg = err.as_message();
        assert!(msg.starts_with("build failed"));
        assert!(msg.contains("npm ERR!"));
        assert_eq!(err.build_output(), "npm ERR! missing script: build");
    }
}
