use crate::payload::StatusReport;
use crate::transport::{encode, Transport};
use crate::worker::{PublishError, StatusPublisher};
use async_trait::async_trait;
use std::sync::Arc;

/// Publishes reports onto the status topic, keyed by job id.
pub struct TransportPublisher {
    transport: Arc<dyn Transport>,
    topic: String,
}

impl TransportPublisher {
    pub fn new(transport: Arc<dyn Transport>, topic: impl Into<String>) -> Self {
        Self {
            transport,
            topic: topic.into(),
        }
    }
}

#[async_trait]
impl StatusPublisher for TransportPublisher {
    async fn publish(&self, report: StatusReport) -> Result<(), PublishError> {
        let value = encode(&report)?;
        self.transport
            .send(&self.topic, Some(&report.job_id), value)
            .await?;
        Ok(())
    }
}
