use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::BTreeSet;

/// Opaque data point carried by a record. The pipeline never inspects it.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Datapoint(pub serde_json::Value);

/// A keyed record. Records sharing a `tsid` must be processed in order,
/// so they always land in the same partition and the same batch.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Record {
    pub tsid: Option<String>,
    #[serde(default)]
    pub datapoints: Vec<Datapoint>,
}

impl Record {
    pub fn new(tsid: impl Into<String>, datapoints: Vec<Datapoint>) -> Self {
        Self {
            tsid: Some(tsid.into()),
            datapoints,
        }
    }

    /// A record with no key. Routed to partition 0.
    pub fn unkeyed(datapoints: Vec<Datapoint>) -> Self {
        Self {
            tsid: None,
            datapoints,
        }
    }

    pub fn key(&self) -> Option<&str> {
        self.tsid.as_deref()
    }
}

/// One unit of ingestion work.
///
/// A payload produced by the partitioner has `partition_id` set and a job id
/// of the form `<original>-p<partition>`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Payload {
    pub job_id: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub partition_id: Option<u32>,
    #[serde(default)]
    pub records: Vec<Record>,
}

impl Payload {
    pub fn new(job_id: impl Into<String>, records: Vec<Record>) -> Self {
        Self {
            job_id: job_id.into(),
            partition_id: None,
            records,
        }
    }

    pub fn for_partition(job_id: impl Into<String>, partition_id: u32, records: Vec<Record>) -> Self {
        Self {
            job_id: job_id.into(),
            partition_id: Some(partition_id),
            records,
        }
    }

    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }
}

/// One replica's completion report for one (sub-)job.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StatusReport {
    pub job_id: String,
    pub success: bool,
    /// Number of distinct keys (batches) in the reported unit
    pub batch_count: usize,
    pub completed_at: DateTime<Utc>,
    pub cluster_id: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub partition_id: Option<u32>,
}

impl StatusReport {
    pub fn new(
        job_id: impl Into<String>,
        success: bool,
        batch_count: usize,
        cluster_id: Option<String>,
        partition_id: Option<u32>,
    ) -> Self {
        Self {
            job_id: job_id.into(),
            success,
            batch_count,
            completed_at: Utc::now(),
            cluster_id,
            partition_id,
        }
    }
}

/// Combined view of every replica's reports for one original job.
/// Recomputed from the received reports on every read.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AggregatedStatus {
    pub all_reported: bool,
    pub all_successful: bool,
    pub any_successful: bool,
    pub total_batch_count: usize,
    pub replies_received: usize,
    pub distinct_cluster_ids: BTreeSet<String>,
    pub distinct_partitions: usize,
}
