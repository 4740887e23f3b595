use crate::worker::batch::{BatchId, BatchOutcome};
use dashmap::mapref::entry::Entry;
use dashmap::DashMap;
use std::collections::HashMap;
use thiserror::Error;
use tokio::sync::mpsc;
use tracing::{debug, warn};

#[derive(Debug, Error)]
pub enum TrackerError {
    #[error("job {0} is already being tracked")]
    AlreadyTracked(String),
}

/// Final view of a job, returned once by [`JobTracker::finalize`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct JobSummary {
    pub success: bool,
    pub batch_count: usize,
    pub partition_id: Option<u32>,
}

struct JobState {
    partition_id: Option<u32>,
    outcomes: HashMap<BatchId, Option<BatchOutcome>>,
    pending: usize,
    signaled: bool,
}

impl JobState {
    fn summary(&self) -> JobSummary {
        JobSummary {
            success: self
                .outcomes
                .values()
                .all(|o| matches!(o, Some(BatchOutcome::Success))),
            batch_count: self.outcomes.len(),
            partition_id: self.partition_id,
        }
    }
}

/// Per-job batch outcome tracking with exactly-once completion signaling.
///
/// Each job's state is mutated under its map shard lock, so recording an
/// outcome and deciding whether to signal happen as one step. A job id is
/// pushed onto the completion channel at most once per registration.
pub struct JobTracker {
    jobs: DashMap<String, JobState>,
    completions: mpsc::UnboundedSender<String>,
}

impl JobTracker {
    /// Creates a tracker and the receiving end of its completion channel.
    /// The receiver must have exactly one consumer.
    pub fn new() -> (Self, mpsc::UnboundedReceiver<String>) {
        let (completions, rx) = mpsc::unbounded_channel();
        (
            Self {
                jobs: DashMap::new(),
                completions,
            },
            rx,
        )
    }

    /// Starts tracking a job with its full set of expected batch ids.
    ///
    /// Must be called before any batch of the job can report. A job with no
    /// batches is complete immediately.
    pub fn register(
        &self,
        job_id: &str,
        partition_id: Option<u32>,
        batch_ids: impl IntoIterator<Item = BatchId>,
    ) -> Result<usize, TrackerError> {
        match self.jobs.entry(job_id.to_string()) {
            Entry::Occupied(_) => Err(TrackerError::AlreadyTracked(job_id.to_string())),
            Entry::Vacant(slot) => {
                let outcomes: HashMap<BatchId, Option<BatchOutcome>> =
                    batch_ids.into_iter().map(|id| (id, None)).collect();
                let expected = outcomes.len();
                let _guard = slot.insert(JobState {
                    partition_id,
                    outcomes,
                    pending: expected,
                    signaled: expected == 0,
                });
                debug!(job_id = %job_id, batches = expected, "Tracking job");
                if expected == 0 {
                    self.signal(job_id);
                }
                Ok(expected)
            }
        }
    }

    /// Records a batch outcome. Returns true if this call completed the job
    /// and signaled it.
    ///
    /// A failure is never overwritten by a later success for the same batch.
    pub fn record(&self, job_id: &str, batch_id: &BatchId, outcome: BatchOutcome) -> bool {
        let Some(mut state) = self.jobs.get_mut(job_id) else {
            debug!(job_id = %job_id, batch = %batch_id, "Outcome for untracked job ignored");
            return false;
        };

        let previous = match state.outcomes.get_mut(batch_id) {
            None => {
                warn!(job_id = %job_id, batch = %batch_id, "Outcome for unexpected batch ignored");
                return false;
            }
            Some(slot) => {
                let previous = *slot;
                if previous != Some(BatchOutcome::Failure) {
                    *slot = Some(outcome);
                }
                previous
            }
        };

        if previous.is_none() {
            state.pending -= 1;
        } else {
            debug!(job_id = %job_id, batch = %batch_id, "Repeated outcome for batch");
        }

        if state.pending == 0 && !state.signaled {
            state.signaled = true;
            self.signal(job_id);
            return true;
        }
        false
    }

    /// Removes a signaled job and returns its summary. Returns `None` for an
    /// unknown job or one that has not completed.
    pub fn finalize(&self, job_id: &str) -> Option<JobSummary> {
        self.jobs
            .remove_if(job_id, |_, state| state.signaled)
            .map(|(_, state)| state.summary())
    }

    /// Drops tracking state for a job without signaling it.
    pub fn abandon(&self, job_id: &str) {
        if self.jobs.remove(job_id).is_some() {
            debug!(job_id = %job_id, "Abandoned job tracking");
        }
    }

    /// Drops the state of every tracked job. Returns how many were dropped.
    pub fn clear(&self) -> usize {
        let dropped = self.jobs.len();
        self.jobs.clear();
        dropped
    }

    pub fn is_tracked(&self, job_id: &str) -> bool {
        self.jobs.contains_key(job_id)
    }

    pub fn active_jobs(&self) -> usize {
        self.jobs.len()
    }

    fn signal(&self, job_id: &str) {
        if self.completions.send(job_id.to_string()).is_err() {
            debug!(job_id = %job_id, "Completion channel closed");
        }
    }
}
