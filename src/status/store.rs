use crate::payload::{original_job_id, StatusReport};
use dashmap::DashMap;
use std::collections::HashSet;
use tracing::debug;

/// In-memory table of status reports keyed by the (sub-)job id they carry.
///
/// Lookups by an original job id that was never stored directly are answered
/// by merging every stored sub-job of that job.
#[derive(Default)]
pub struct StatusStore {
    statuses: DashMap<String, StatusReport>,
}

impl StatusStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn put(&self, report: StatusReport) {
        self.statuses.insert(report.job_id.clone(), report);
    }

    /// Direct match first, then the merged view of all sub-jobs of `job_id`.
    pub fn get(&self, job_id: &str) -> Option<StatusReport> {
        if let Some(direct) = self.statuses.get(job_id) {
            return Some(direct.clone());
        }
        self.get_aggregated(job_id)
    }

    /// Merges every stored sub-job of `original_id`: success is the AND,
    /// batch count the sum, completion time the latest. The cluster id is the
    /// first one found, which is arbitrary when several clusters wrote.
    pub fn get_aggregated(&self, original_id: &str) -> Option<StatusReport> {
        let parts: Vec<StatusReport> = self
            .statuses
            .iter()
            .filter(|entry| original_job_id(entry.key()) == original_id)
            .map(|entry| entry.value().clone())
            .collect();

        let latest = parts.iter().map(|r| r.completed_at).max()?;
        let merged = StatusReport {
            job_id: original_id.to_string(),
            success: parts.iter().all(|r| r.success),
            batch_count: parts.iter().map(|r| r.batch_count).sum(),
            completed_at: latest,
            cluster_id: parts.iter().find_map(|r| r.cluster_id.clone()),
            partition_id: None,
        };

        debug!(
            job_id = %original_id,
            parts = parts.len(),
            success = merged.success,
            "Merged sub-job statuses"
        );

        Some(merged)
    }

    /// Number of distinct original jobs with at least one stored report.
    pub fn job_count(&self) -> usize {
        self.statuses
            .iter()
            .map(|entry| original_job_id(entry.key()).to_string())
            .collect::<HashSet<_>>()
            .len()
    }

    /// Number of stored reports.
    pub fn len(&self) -> usize {
        self.statuses.len()
    }

    pub fn is_empty(&self) -> bool {
        self.statuses.is_empty()
    }

    pub fn snapshot(&self) -> Vec<StatusReport> {
        self.statuses.iter().map(|entry| entry.value().clone()).collect()
    }

    pub fn clear(&self) {
        self.statuses.clear();
    }
}
