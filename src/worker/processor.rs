use crate::worker::batch::Batch;
use async_trait::async_trait;
use thiserror::Error;
use tracing::debug;

#[derive(Debug, Error)]
pub enum ProcessError {
    #[error("forced failure for key {0}")]
    ForcedKey(String),

    #[error("simulated random failure")]
    Random,

    #[error("batch processing failed: {0}")]
    Other(String),
}

/// Work applied to one batch. An `Err` (or a panic) marks the batch failed;
/// it never stops the worker that ran it.
#[async_trait]
pub trait BatchProcessor: Send + Sync {
    async fn process(&self, batch: &Batch) -> Result<(), ProcessError>;
}

/// Processor that accepts every batch, except for configured test failures.
#[derive(Debug, Clone, Default)]
pub struct InjectedFailureProcessor {
    fail_key: Option<String>,
    random_failure_probability: f64,
}

impl InjectedFailureProcessor {
    pub fn new(fail_key: Option<String>, random_failure_probability: f64) -> Self {
        Self {
            fail_key: fail_key.filter(|k| !k.trim().is_empty()),
            random_failure_probability: random_failure_probability.clamp(0.0, 1.0),
        }
    }
}

#[async_trait]
impl BatchProcessor for InjectedFailureProcessor {
    async fn process(&self, batch: &Batch) -> Result<(), ProcessError> {
        debug!(
            job_id = %batch.job_id,
            batch = %batch.batch_id,
            records = batch.records.len(),
            "Processing batch"
        );

        if let Some(fail_key) = &self.fail_key {
            if batch.records.iter().any(|r| r.key() == Some(fail_key.as_str())) {
                return Err(ProcessError::ForcedKey(fail_key.clone()));
            }
        }

        if self.random_failure_probability > 0.0
            && fastrand::f64() < self.random_failure_probability
        {
            return Err(ProcessError::Random);
        }

        Ok(())
    }
}
