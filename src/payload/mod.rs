pub mod job_id;
pub mod types;

pub use job_id::{original_job_id, partition_suffix, sub_job_id, PARTITION_MARKER};
pub use types::{AggregatedStatus, Datapoint, Payload, Record, StatusReport};
