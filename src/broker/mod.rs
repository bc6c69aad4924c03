//! # Message broker seam.
//!
//! The queue supervisor talks to the broker only through these traits:
//!
//! ```text
//! Broker::connect() ──► Session ──► next_delivery() ──► Delivery { body, acker }
//!                          │                                   └─► settle(AckAction)
//!                          └─► sink() ──► ResponseSink::publish(json)
//! ```
//!
//! [`AmqpBroker`] is the production implementation; tests plug in-memory fakes.

mod amqp;
mod publisher;

use std::fmt;
use std::sync::Arc;

use async_trait::async_trait;
use thiserror::Error;

use crate::pipeline::AckAction;

pub use amqp::AmqpBroker;
pub use publisher::ResponsePublisher;

/// # Errors raised by the broker seam.
#[non_exhaustive]
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum BrokerError {
    #[error("broker connect failed: {0}")]
    Connect(String),

    /// Channel setup (qos, queue declaration, consume) failed.
    #[error("broker channel setup failed: {0}")]
    Setup(String),

    #[error("delivery stream failed: {0}")]
    Stream(String),

    #[error("acknowledgement failed: {0}")]
    Settle(String),

    #[error("response publish failed: {0}")]
    Publish(String),

    #[error("response encoding failed: {0}")]
    Encode(String),
}

impl BrokerError {
    /// Returns a short stable label (snake_case) for use in logs.
    pub fn as_label(&self) -> &'static str {
        match self {
            BrokerError::Connect(_) => "broker_connect",
            BrokerError::Setup(_) => "broker_setup",
            BrokerError::Stream(_) => "broker_stream",
            BrokerError::Settle(_) => "broker_settle",
            BrokerError::Publish(_) => "broker_publish",
            BrokerError::Encode(_) => "broker_encode",
        }
    }
}

/// Acknowledgement handle of one delivery.
#[async_trait]
pub trait Acknowledge: Send + Sync {
    async fn ack(&self) -> Result<(), BrokerError>;

    async fn nack(&self, requeue: bool) -> Result<(), BrokerError>;
}

/// Destination of build responses.
#[async_trait]
pub trait ResponseSink: Send + Sync {
    async fn publish(&self, body: Vec<u8>) -> Result<(), BrokerError>;
}

/// One message taken off the request queue, paired with its acknowledgement handle.
pub struct Delivery {
    pub body: Vec<u8>,
    acker: Box<dyn Acknowledge>,
}

impl Delivery {
    pub fn new(body: Vec<u8>, acker: impl Acknowledge + 'static) -> Self {
        Self {
            body,
            acker: Box::new(acker),
        }
    }

    /// Applies the acknowledgement decision.
    pub async fn settle(&self, action: AckAction) -> Result<(), BrokerError> {
        match action {
            AckAction::Ack => self.acker.ack().await,
            AckAction::Nack { requeue } => self.acker.nack(requeue).await,
        }
    }
}

impl fmt::Debug for Delivery {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Delivery")
            .field("body_len", &self.body.len())
            .finish_non_exhaustive()
    }
}

/// A live connection/channel pair owned by one queue supervisor instance.
#[async_trait]
pub trait Session: Send {
    /// Waits for the next delivery; `Ok(None)` means the consumer stream ended.
    async fn next_delivery(&mut self) -> Result<Option<Delivery>, BrokerError>;

    fn sink(&self) -> Arc<dyn ResponseSink>;

    /// Closes channel and connection; errors are logged, not returned.
    async fn close(&mut self);
}

#[async_trait]
pub trait Broker: Send + Sync + 'static {
    /// Opens a connection, declares both queues and starts consuming.
    async fn connect(&self) -> Result<Box<dyn Session>, BrokerError>;
}
