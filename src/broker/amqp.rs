//! AMQP 0-9-1 broker backed by `lapin`.
//!
//! Both queues are durable. The consumer runs with manual acknowledgement and
//! prefetch 1, so a worker never holds more than one unsettled request.

use std::sync::Arc;

use async_trait::async_trait;
use futures::StreamExt;
use lapin::{
    BasicProperties, Channel, Connection, ConnectionProperties, Consumer,
    acker::Acker,
    options::{
        BasicAckOptions, BasicConsumeOptions, BasicNackOptions, BasicPublishOptions,
        BasicQosOptions, QueueDeclareOptions,
    },
    types::FieldTable,
};
use tracing::{debug, warn};

use super::{Acknowledge, Broker, BrokerError, Delivery, ResponseSink, Session};

const CONTENT_TYPE: &str = "application/json";

#[derive(Clone, Debug)]
pub struct AmqpBroker {
    uri: String,
    request_queue: String,
    response_queue: String,
}

impl AmqpBroker {
    pub fn new(
        uri: impl Into<String>,
        request_queue: impl Into<String>,
        response_queue: impl Into<String>,
    ) -> Self {
        Self {
            uri: uri.into(),
            request_queue: request_queue.into(),
            response_queue: response_queue.into(),
        }
    }

    async fn declare(&self, channel: &Channel, queue: &str) -> Result<(), BrokerError> {
        channel
            .queue_declare(
                queue,
                QueueDeclareOptions {
                    durable: true,
                    ..QueueDeclareOptions::default()
                },
                FieldTable::default(),
            )
            .await
            .map_err(|e| BrokerError::Setup(format!("declare {queue}: {e}")))?;
        Ok(())
    }
}

#[async_trait]
impl Broker for AmqpBroker {
    async fn connect(&self) -> Result<Box<dyn Session>, BrokerError> {
        let conn = Connection::connect(&self.uri, ConnectionProperties::default())
            .await
            .map_err(|e| BrokerError::Connect(e.to_string()))?;
        let channel = conn
            .create_channel()
            .await
            .map_err(|e| BrokerError::Setup(format!("channel: {e}")))?;

        channel
            .basic_qos(1, BasicQosOptions::default())
            .await
            .map_err(|e| BrokerError::Setup(format!("qos: {e}")))?;
        self.declare(&channel, &self.response_queue).await?;
        self.declare(&channel, &self.request_queue).await?;

        let consumer = channel
            .basic_consume(
                &self.request_queue,
                "",
                BasicConsumeOptions {
                    no_ack: false,
                    ..BasicConsumeOptions::default()
                },
                FieldTable::default(),
            )
            .await
            .map_err(|e| BrokerError::Setup(format!("consume: {e}")))?;

        debug!(queue = %self.request_queue, "amqp consumer ready");
        let sink = Arc::new(AmqpSink {
            channel: channel.clone(),
            queue: self.response_queue.clone(),
        });
        Ok(Box::new(AmqpSession {
            conn,
            channel,
            consumer,
            sink,
        }))
    }
}

struct AmqpSession {
    conn: Connection,
    channel: Channel,
    consumer: Consumer,
    sink: Arc<AmqpSink>,
}

#[async_trait]
impl Session for AmqpSession {
    async fn next_delivery(&mut self) -> Result<Option<Delivery>, BrokerError> {
        match self.consumer.next().await {
            None => Ok(None),
            Some(Err(e)) => Err(BrokerError::Stream(e.to_string())),
            Some(Ok(d)) => Ok(Some(Delivery::new(d.data, AmqpAcker(d.acker)))),
        }
    }

    fn sink(&self) -> Arc<dyn ResponseSink> {
        self.sink.clone()
    }

    async fn close(&mut self) {
        if let Err(e) = self.channel.close(200, "worker stopping").await {
            warn!(error = %e, "amqp channel close failed");
        }
        if let Err(e) = self.conn.close(200, "worker stopping").await {
            warn!(error = %e, "amqp connection close failed");
        }
    }
}

struct AmqpAcker(Acker);

#[async_trait]
impl Acknowledge for AmqpAcker {
    async fn ack(&self) -> Result<(), BrokerError> {
        self.0
            .ack(BasicAckOptions::default())
            .await
            .map_err(|e| BrokerError::Settle(e.to_string()))
    }

    async fn nack(&self, requeue: bool) -> Result<(), BrokerError> {
        self.0
            .nack(BasicNackOptions {
                requeue,
                multiple: false,
            })
            .await
            .map_err(|e| BrokerError::Settle(e.to_string()))
    }
}

struct AmqpSink {
    channel: Channel,
    queue: String,
}

#[async_trait]
impl ResponseSink for AmqpSink {
    async fn publish(&self, body: Vec<u8>) -> Result<(), BrokerError> {
        self.channel
            .basic_publish(
                "",
                &self.queue,
                BasicPublishOptions::default(),
                &body,
                BasicProperties::default().with_content_type(CONTENT_TYPE.into()),
            )
            .await
            .map_err(|e| BrokerError::Publish(e.to_string()))?
            .await
            .map_err(|e| BrokerError::Publish(e.to_string()))?;
        Ok(())
    }
}
