use crate::worker::WorkerPoolConfig;
use serde::{Deserialize, Serialize};
use std::time::Duration;

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct Config {
    #[serde(default)]
    pub partitioning: PartitioningConfig,
    #[serde(default)]
    pub workers: WorkersConfig,
    #[serde(default)]
    pub cluster: ClusterConfig,
    #[serde(default)]
    pub topics: TopicsConfig,
    #[serde(default)]
    pub aggregation: AggregationConfig,
    #[serde(default)]
    pub failure_injection: FailureInjectionConfig,
}

impl Config {
    /// Cluster id from config, falling back to the host name and then to a
    /// random id.
    pub fn cluster_id(&self) -> String {
        if let Some(id) = self.cluster.id.as_ref().filter(|id| !id.trim().is_empty()) {
            return id.clone();
        }
        hostname::get()
            .ok()
            .and_then(|h| h.into_string().ok())
            .filter(|h| !h.is_empty())
            .unwrap_or_else(|| format!("shardpipe-{}", uuid::Uuid::new_v4()))
    }

    /// Pool settings for one replica with the given cluster id.
    pub fn worker_pool_config(&self, cluster_id: impl Into<String>) -> WorkerPoolConfig {
        WorkerPoolConfig {
            cluster_id: cluster_id.into(),
            num_workers: self.workers.num_workers,
            queue_capacity: self.workers.queue_capacity,
            poll_interval: self.workers.poll_interval,
            settle_delay: self.workers.settle_delay,
            shutdown_grace: self.workers.shutdown_grace,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PartitioningConfig {
    #[serde(default = "default_num_partitions")]
    pub num_partitions: u32,
}

fn default_num_partitions() -> u32 {
    3
}

impl Default for PartitioningConfig {
    fn default() -> Self {
        Self {
            num_partitions: default_num_partitions(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct WorkersConfig {
    #[serde(default = "default_num_workers")]
    pub num_workers: usize,
    #[serde(default = "default_queue_capacity")]
    pub queue_capacity: usize,
    #[serde(default = "default_poll_interval", with = "humantime_serde")]
    pub poll_interval: Duration,
    #[serde(default = "default_settle_delay", with = "humantime_serde")]
    pub settle_delay: Duration,
    #[serde(default = "default_shutdown_grace", with = "humantime_serde")]
    pub shutdown_grace: Duration,
}

fn default_num_workers() -> usize {
    4
}

fn default_queue_capacity() -> usize {
    100
}

fn default_poll_interval() -> Duration {
    Duration::from_millis(500)
}

fn default_settle_delay() -> Duration {
    Duration::from_millis(100)
}

fn default_shutdown_grace() -> Duration {
    Duration::from_secs(5)
}

impl Default for WorkersConfig {
    fn default() -> Self {
        Self {
            num_workers: default_num_workers(),
            queue_capacity: default_queue_capacity(),
            poll_interval: default_poll_interval(),
            settle_delay: default_settle_delay(),
            shutdown_grace: default_shutdown_grace(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ClusterConfig {
    /// Identity stamped on status reports. Defaults to the host name.
    #[serde(default)]
    pub id: Option<String>,
    #[serde(default = "default_expected_replicas")]
    pub expected_replicas: usize,
}

fn default_expected_replicas() -> usize {
    3
}

impl Default for ClusterConfig {
    fn default() -> Self {
        Self {
            id: None,
            expected_replicas: default_expected_replicas(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TopicsConfig {
    #[serde(default = "default_payload_topic")]
    pub payload: String,
    #[serde(default = "default_status_topic")]
    pub status: String,
}

fn default_payload_topic() -> String {
    "payload-topic".to_string()
}

fn default_status_topic() -> String {
    "payload-status".to_string()
}

impl Default for TopicsConfig {
    fn default() -> Self {
        Self {
            payload: default_payload_topic(),
            status: default_status_topic(),
        }
    }
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct AggregationConfig {
    /// Jobs with no report for this long are dropped. None keeps them forever.
    #[serde(default, with = "humantime_serde")]
    pub idle_eviction: Option<Duration>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct FailureInjectionConfig {
    #[serde(default)]
    pub fail_key: Option<String>,
    #[serde(default)]
    pub random_failure_probability: f64,
}
