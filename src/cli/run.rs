use crate::config::{load_config, Config};
use crate::ingress::{run_status_consumer, IngressError, IngressProducer};
use crate::partition::{PartitionError, Partitioner};
use crate::payload::{AggregatedStatus, Payload, StatusReport};
use crate::replica::Replica;
use crate::transport::{InMemoryBroker, Transport};
use crate::worker::{BatchProcessor, InjectedFailureProcessor};
use serde::Serialize;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;
use thiserror::Error;
use tokio::sync::watch;
use tracing::{info, warn};

const STATUS_POLL_INTERVAL: Duration = Duration::from_millis(50);

#[derive(Debug, Error)]
pub enum RunError {
    #[error("config error: {0}")]
    Config(#[from] crate::config::ConfigError),

    #[error("partitioner error: {0}")]
    Partition(#[from] PartitionError),

    #[error("failed to read payload file '{path}': {source}")]
    PayloadRead {
        path: PathBuf,
        source: std::io::Error,
    },

    #[error("failed to parse payload: {0}")]
    PayloadParse(#[from] serde_json::Error),

    #[error("ingress error: {0}")]
    Ingress(#[from] IngressError),

    #[error("task join error: {0}")]
    Join(#[from] tokio::task::JoinError),
}

/// Outcome of one `run`, printed as JSON.
#[derive(Debug, Clone, Serialize)]
pub struct RunSummary {
    pub job_id: String,
    pub sub_payloads: usize,
    pub timed_out: bool,
    pub aggregated: Option<AggregatedStatus>,
    pub status: Option<StatusReport>,
}

pub async fn run(
    config_path: Option<PathBuf>,
    payload_path: PathBuf,
    timeout: Duration,
) -> Result<(), Box<dyn std::error::Error>> {
    let config = match config_path {
        Some(path) => {
            info!(config_path = %path.display(), "Loading configuration");
            load_config(&path)?
        }
        None => {
            info!("No config file found, using built-in defaults");
            Config::default()
        }
    };

    let payload = read_payload(&payload_path)?;
    let summary = run_pipeline(&config, payload, timeout).await?;

    println!("{}", serde_json::to_string_pretty(&summary)?);
    Ok(())
}

pub fn read_payload(path: &Path) -> Result<Payload, RunError> {
    let text = std::fs::read_to_string(path).map_err(|source| RunError::PayloadRead {
        path: path.to_path_buf(),
        source,
    })?;
    Ok(serde_json::from_str(&text)?)
}

/// Runs one payload through `cluster.expected_replicas` replicas on an
/// in-memory broker and waits until every replica reported every partition,
/// the timeout expires or Ctrl+C is pressed.
pub async fn run_pipeline(
    config: &Config,
    payload: Payload,
    timeout: Duration,
) -> Result<RunSummary, RunError> {
    let broker: Arc<dyn Transport> = Arc::new(InMemoryBroker::new());
    let partitioner = Partitioner::new(config.partitioning.num_partitions)?;
    let producer = Arc::new(IngressProducer::new(
        Arc::clone(&broker),
        partitioner,
        config.topics.payload.clone(),
        config.cluster.expected_replicas,
    ));

    let (shutdown_tx, shutdown_rx) = watch::channel(false);

    // Subscribe before any replica can publish
    let status_subscription = broker.subscribe(&config.topics.status);
    let consumer_handle = tokio::spawn(run_status_consumer(
        status_subscription,
        Arc::clone(&producer),
        shutdown_rx.clone(),
    ));

    let evictor_handle = config.aggregation.idle_eviction.map(|max_idle| {
        tokio::spawn(run_evictor(Arc::clone(&producer), max_idle, shutdown_rx.clone()))
    });

    let processor: Arc<dyn BatchProcessor> = Arc::new(InjectedFailureProcessor::new(
        config.failure_injection.fail_key.clone(),
        config.failure_injection.random_failure_probability,
    ));
    let base_id = config.cluster_id();
    let replicas: Vec<Replica> = (1..=config.cluster.expected_replicas)
        .map(|n| {
            Replica::start(
                Arc::clone(&broker),
                config.worker_pool_config(format!("{}-{}", base_id, n)),
                Arc::clone(&processor),
                &config.topics.payload,
                &config.topics.status,
            )
        })
        .collect();
    info!(replicas = replicas.len(), cluster_id = %base_id, "Replicas started");

    let job_id = payload.job_id.clone();
    let sent = producer.send(&payload).await;

    let timed_out = match &sent {
        Ok(0) => {
            warn!(job_id = %job_id, "Payload has no records, nothing to wait for");
            false
        }
        Ok(_) => {
            tokio::select! {
                reported = wait_for_all_reported(&producer, &job_id, timeout) => !reported,
                _ = tokio::signal::ctrl_c() => {
                    info!("Received Ctrl+C, shutting down");
                    false
                }
            }
        }
        Err(_) => false,
    };

    if timed_out {
        warn!(job_id = %job_id, timeout = ?timeout, "Timed out waiting for replica reports");
    }

    for replica in &replicas {
        replica.shutdown().await;
    }
    let _ = shutdown_tx.send(true);
    consumer_handle.await?;
    if let Some(handle) = evictor_handle {
        handle.await?;
    }

    let sub_payloads = sent?;
    Ok(RunSummary {
        aggregated: producer.aggregated_status(&job_id),
        status: producer.status(&job_id),
        job_id,
        sub_payloads,
        timed_out,
    })
}

/// Returns true once the job is fully reported, false on timeout.
async fn wait_for_all_reported(producer: &IngressProducer, job_id: &str, timeout: Duration) -> bool {
    let wait = async {
        loop {
            if producer
                .aggregated_status(job_id)
                .is_some_and(|status| status.all_reported)
            {
                return;
            }
            tokio::time::sleep(STATUS_POLL_INTERVAL).await;
        }
    };
    tokio::time::timeout(timeout, wait).await.is_ok()
}

async fn run_evictor(producer: Arc<IngressProducer>, max_idle: Duration, mut shutdown: watch::Receiver<bool>) {
    let mut interval = tokio::time::interval(max_idle);
    // The first tick completes immediately
    interval.tick().await;

    loop {
        tokio::select! {
            _ = shutdown.changed() => break,
            _ = interval.tick() => {
                let evicted = producer.evict_idle(max_idle);
                if evicted > 0 {
                    info!(evicted, "Evicted idle jobs");
                }
            }
        }
    }
}
