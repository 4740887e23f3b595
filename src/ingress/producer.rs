use crate::partition::Partitioner;
use crate::payload::{AggregatedStatus, Payload, StatusReport};
use crate::status::{StatusAggregator, StatusStore};
use crate::transport::{encode, Transport};
use std::sync::Arc;
use std::time::Duration;
use thiserror::Error;
use tracing::{debug, info};

#[derive(Debug, Error)]
pub enum IngressError {
    #[error("transport error: {0}")]
    Transport(#[from] crate::transport::TransportError),

    #[error("codec error: {0}")]
    Codec(#[from] crate::transport::CodecError),
}

/// Ingress side of the pipeline: splits payloads onto the payload topic and
/// gathers the replicas' status reports.
pub struct IngressProducer {
    transport: Arc<dyn Transport>,
    partitioner: Partitioner,
    payload_topic: String,
    expected_replicas: usize,
    aggregator: Arc<StatusAggregator>,
    store: Arc<StatusStore>,
}

impl IngressProducer {
    pub fn new(
        transport: Arc<dyn Transport>,
        partitioner: Partitioner,
        payload_topic: impl Into<String>,
        expected_replicas: usize,
    ) -> Self {
        Self {
            transport,
            partitioner,
            payload_topic: payload_topic.into(),
            expected_replicas,
            aggregator: Arc::new(StatusAggregator::new(expected_replicas)),
            store: Arc::new(StatusStore::new()),
        }
    }

    /// Splits a payload and publishes every sub-payload keyed by its sub-job
    /// id. Returns the number of sub-payloads sent.
    ///
    /// The expectation is recorded before anything is published, so a fast
    /// replica's report always finds it.
    pub async fn send(&self, payload: &Payload) -> Result<usize, IngressError> {
        let sub_payloads = self.partitioner.split(payload);
        if sub_payloads.is_empty() {
            debug!(job_id = %payload.job_id, "Empty payload, nothing to send");
            return Ok(0);
        }

        self.aggregator.record_expectation(
            &payload.job_id,
            self.expected_replicas,
            sub_payloads.len(),
        );

        for sub in &sub_payloads {
            let value = encode(sub)?;
            self.transport
                .send(&self.payload_topic, Some(&sub.job_id), value)
                .await?;
        }

        info!(
            job_id = %payload.job_id,
            records = payload.records.len(),
            sub_payloads = sub_payloads.len(),
            "Payload sent"
        );
        Ok(sub_payloads.len())
    }

    /// Feeds one replica's report into the store and the aggregator.
    pub fn on_status(&self, report: StatusReport) {
        debug!(
            job_id = %report.job_id,
            cluster_id = ?report.cluster_id,
            success = report.success,
            batches = report.batch_count,
            "Status received"
        );
        self.store.put(report.clone());
        self.aggregator.on_report(report);
    }

    pub fn aggregated_status(&self, job_id: &str) -> Option<AggregatedStatus> {
        self.aggregator.get_aggregated(job_id)
    }

    /// Stored status for a sub-job id, or the merged status of an original job.
    pub fn status(&self, job_id: &str) -> Option<StatusReport> {
        self.store.get(job_id)
    }

    pub fn evict_idle(&self, max_idle: Duration) -> usize {
        self.aggregator.evict_idle(max_idle)
    }

    pub fn aggregator(&self) -> &Arc<StatusAggregator> {
        &self.aggregator
    }

    pub fn store(&self) -> &Arc<StatusStore> {
        &self.store
    }
}
