use crate::payload::{original_job_id, partition_suffix, AggregatedStatus, StatusReport};
use dashmap::DashMap;
use std::collections::{BTreeSet, HashMap, HashSet};
use std::time::{Duration, Instant};
use tracing::debug;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
struct Expectation {
    replicas: usize,
    partitions: usize,
}

impl Expectation {
    fn total(&self) -> usize {
        self.replicas * self.partitions
    }
}

/// (cluster, partition) a report is counted under. A redelivered report for
/// the same pair replaces the earlier one.
type ReplicaSlot = (Option<String>, Option<u32>);

struct ClusterStatusAggregator {
    expectation: Option<Expectation>,
    received: HashMap<ReplicaSlot, StatusReport>,
    last_updated: Instant,
}

impl ClusterStatusAggregator {
    fn new(expectation: Option<Expectation>) -> Self {
        Self {
            expectation,
            received: HashMap::new(),
            last_updated: Instant::now(),
        }
    }

    fn aggregate(&self, fallback: Expectation) -> AggregatedStatus {
        let expected = self.expectation.unwrap_or(fallback).total();
        let all_reported = self.received.len() >= expected;
        let reports = self.received.values();

        let distinct_cluster_ids: BTreeSet<String> =
            reports.clone().filter_map(|r| r.cluster_id.clone()).collect();
        let distinct_partitions = self
            .received
            .keys()
            .map(|(_, partition)| *partition)
            .collect::<HashSet<_>>()
            .len();

        AggregatedStatus {
            all_reported,
            all_successful: all_reported && reports.clone().all(|r| r.success),
            any_successful: reports.clone().any(|r| r.success),
            total_batch_count: reports.map(|r| r.batch_count).sum(),
            replies_received: self.received.len(),
            distinct_cluster_ids,
            distinct_partitions,
        }
    }
}

/// Scatter-gather view over status reports from every replica and partition
/// of a job, keyed by original job id.
pub struct StatusAggregator {
    jobs: DashMap<String, ClusterStatusAggregator>,
    default_replicas: usize,
}

impl StatusAggregator {
    /// `default_replicas` is assumed for jobs whose first report arrives
    /// before any expectation was recorded.
    pub fn new(default_replicas: usize) -> Self {
        Self {
            jobs: DashMap::new(),
            default_replicas: default_replicas.max(1),
        }
    }

    /// Records how many reports a job needs. Only the first call per job
    /// takes effect.
    pub fn record_expectation(&self, job_id: &str, expected_replicas: usize, expected_partitions: usize) {
        let expectation = Expectation {
            replicas: expected_replicas,
            partitions: expected_partitions,
        };
        let mut entry = self
            .jobs
            .entry(job_id.to_string())
            .or_insert_with(|| ClusterStatusAggregator::new(None));
        if entry.expectation.is_none() {
            entry.expectation = Some(expectation);
            debug!(
                job_id = %job_id,
                replicas = expected_replicas,
                partitions = expected_partitions,
                "Recorded status expectation"
            );
        }
    }

    /// Adds a report under its original job id. The report's job id may be a
    /// sub-job id; its partition comes from `partition_id` or the id suffix.
    pub fn on_report(&self, report: StatusReport) {
        let job_id = original_job_id(&report.job_id).to_string();
        let partition = report.partition_id.or_else(|| partition_suffix(&report.job_id));
        let slot = (report.cluster_id.clone(), partition);

        let mut entry = self
            .jobs
            .entry(job_id.clone())
            .or_insert_with(|| ClusterStatusAggregator::new(None));
        if entry.received.insert(slot, report).is_some() {
            debug!(job_id = %job_id, "Replaced redelivered status report");
        }
        entry.last_updated = Instant::now();
    }

    pub fn get_aggregated(&self, job_id: &str) -> Option<AggregatedStatus> {
        self.jobs
            .get(job_id)
            .map(|agg| agg.aggregate(self.fallback_expectation()))
    }

    /// Drops all state for a job. Returns whether it was tracked.
    pub fn remove(&self, job_id: &str) -> bool {
        self.jobs.remove(job_id).is_some()
    }

    /// Drops jobs that have not received a report or expectation within
    /// `max_idle`. Returns how many were evicted.
    pub fn evict_idle(&self, max_idle: Duration) -> usize {
        let before = self.jobs.len();
        self.jobs
            .retain(|_, agg| agg.last_updated.elapsed() < max_idle);
        let evicted = before.saturating_sub(self.jobs.len());
        if evicted > 0 {
            debug!(evicted, "Evicted idle status aggregators");
        }
        evicted
    }

    pub fn tracked_jobs(&self) -> usize {
        self.jobs.len()
    }

    fn fallback_expectation(&self) -> Expectation {
        Expectation {
            replicas: self.default_replicas,
            partitions: 1,
        }
    }
}
