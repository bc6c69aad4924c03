use std::sync::Arc;

use tracing::debug;

use crate::model::BuildResponse;

use super::{BrokerError, ResponseSink};

/// Serializes build outcomes onto the response queue.
#[derive(Clone)]
pub struct ResponsePublisher {
    sink: Arc<dyn ResponseSink>,
}

impl ResponsePublisher {
    pub fn new(sink: Arc<dyn ResponseSink>) -> Self {
        Self { sink }
    }

    pub async fn publish(&self, response: &BuildResponse) -> Result<(), BrokerError> {
        let body = response
            .to_json()
            .map_err(|e| BrokerError::Encode(e.to_string()))?;
        debug!(
            application = %response.application_id,
            status = ?response.status,
            bytes = body.len(),
            "publishing build response"
        );
        self.sink.publish(body).await
    }
}
