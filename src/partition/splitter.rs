use crate::partition::hashing::bucket_for;
use crate::payload::{sub_job_id, Payload, Record};
use std::collections::BTreeMap;
use thiserror::Error;
use tracing::debug;

#[derive(Debug, Error)]
pub enum PartitionError {
    #[error("number of partitions must be greater than zero")]
    ZeroPartitions,
}

/// Splits payloads into per-partition sub-payloads by key hash.
///
/// All records with the same key land in the same partition, and records keep
/// their original relative order inside a partition.
#[derive(Debug, Clone)]
pub struct Partitioner {
    num_partitions: u32,
}

impl Partitioner {
    pub fn new(num_partitions: u32) -> Result<Self, PartitionError> {
        if num_partitions == 0 {
            return Err(PartitionError::ZeroPartitions);
        }
        Ok(Self { num_partitions })
    }

    pub fn num_partitions(&self) -> u32 {
        self.num_partitions
    }

    /// Partition for a key. Absent keys go to partition 0.
    pub fn partition_of(&self, key: Option<&str>) -> u32 {
        bucket_for(key, self.num_partitions)
    }

    /// Splits a payload into one sub-payload per partition that has data,
    /// ordered by partition id. An empty payload yields no sub-payloads.
    pub fn split(&self, payload: &Payload) -> Vec<Payload> {
        if payload.is_empty() {
            return Vec::new();
        }

        let mut by_partition: BTreeMap<u32, Vec<Record>> = BTreeMap::new();
        for record in &payload.records {
            by_partition
                .entry(self.partition_of(record.key()))
                .or_default()
                .push(record.clone());
        }

        debug!(
            job_id = %payload.job_id,
            records = payload.records.len(),
            partitions = by_partition.len(),
            "Split payload"
        );

        by_partition
            .into_iter()
            .map(|(partition_id, records)| {
                Payload::for_partition(
                    sub_job_id(&payload.job_id, partition_id),
                    partition_id,
                    records,
                )
            })
            .collect()
    }
}
