//! # Fault classifier.
//!
//! Pure mapping from a [`Fault`] to what happens to the original delivery:
//!
//! ```text
//! Fault::Service ──► Nack { requeue: true }   (redelivered, possibly forever)
//! Fault::User    ──► Ack                      (consumed, never redelivered)
//! ```
//!
//! A response is published in both cases. There is no dead-letter queue and no
//! delivery-count tracking: a service fault that keeps recurring keeps
//! redelivering until an operator fixes the worker or its infrastructure.

use crate::error::StageError;
use crate::model::Fault;

/// Acknowledgement decision for one delivery.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum AckAction {
    Ack,
    Nack { requeue: bool },
}

/// Maps a fault to its acknowledgement.
pub fn ack_for(fault: Fault) -> AckAction {
    match fault {
        Fault::Service => AckAction::Nack { requeue: true },
        Fault::User => AckAction::Ack,
    }
}

/// Classifies a stage error in one step.
pub fn classify(err: &StageError) -> (Fault, AckAction) {
    let fault = err.fault();
    (fault, ack_for(fault))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn service_faults_requeue() {
        assert_eq!(ack_for(Fault::Service), AckAction::Nack { requeue: true });
        let (fault, ack) = classify(&StageError::RateLimited("403".into()));
        assert_eq!(fault, Fault::Service);
        assert_eq!(ack, AckAction::Nack { requeue: true });
    }

    #[test]
    fn user_faults_ack() {
        assert_eq!(ack_for(Fault::User), AckAction::Ack);
        let (fault, ack) = classify(&StageError::Input("inexisting root directory".into()));
        assert_eq!(fault, Fault::User);
        assert_eq!(ack, AckAction::Ack);
    }
}
