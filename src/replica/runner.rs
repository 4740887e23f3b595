use crate::payload::Payload;
use crate::replica::publisher::TransportPublisher;
use crate::transport::{decode, CodecError, Message, Subscription, Transport};
use crate::worker::{BatchProcessor, PoolError, SubmitOutcome, WorkerPool, WorkerPoolConfig};
use std::sync::Arc;
use thiserror::Error;
use tokio::sync::watch;
use tokio::task::JoinHandle;
use tracing::{debug, info, warn};

#[derive(Debug, Error)]
pub enum ReplicaError {
    #[error("failed to decode payload: {0}")]
    Codec(#[from] CodecError),

    #[error(transparent)]
    Pool(#[from] PoolError),
}

/// One processing replica: a worker pool fed from the payload topic and
/// reporting onto the status topic.
pub struct Replica {
    pool: Arc<WorkerPool>,
    shutdown_tx: watch::Sender<bool>,
    consumer: tokio::sync::Mutex<Option<JoinHandle<()>>>,
}

impl Replica {
    /// Subscribes to the payload topic and starts the pool. Subscription
    /// happens before this returns, so payloads sent afterwards are seen.
    pub fn start(
        transport: Arc<dyn Transport>,
        config: WorkerPoolConfig,
        processor: Arc<dyn BatchProcessor>,
        payload_topic: &str,
        status_topic: &str,
    ) -> Self {
        let publisher = Arc::new(TransportPublisher::new(Arc::clone(&transport), status_topic));
        let pool = Arc::new(WorkerPool::start(config, processor, publisher));
        let subscription = transport.subscribe(payload_topic);

        let (shutdown_tx, shutdown_rx) = watch::channel(false);
        let consumer = tokio::spawn(run_payload_consumer(
            subscription,
            Arc::clone(&pool),
            shutdown_rx,
        ));

        Self {
            pool,
            shutdown_tx,
            consumer: tokio::sync::Mutex::new(Some(consumer)),
        }
    }

    pub fn pool(&self) -> &Arc<WorkerPool> {
        &self.pool
    }

    pub fn cluster_id(&self) -> &str {
        self.pool.cluster_id()
    }

    /// Stops consuming, then shuts the pool down. Safe to call more than once.
    pub async fn shutdown(&self) {
        let _ = self.shutdown_tx.send(true);
        // Pool shutdown first so a consumer blocked in submit is released.
        self.pool.shutdown().await;
        if let Some(handle) = self.consumer.lock().await.take() {
            let _ = handle.await;
        }
    }
}

/// Decodes one payload message and submits it.
pub async fn handle_payload_message(
    pool: &WorkerPool,
    message: &Message,
) -> Result<SubmitOutcome, ReplicaError> {
    let payload: Payload = decode(&message.value)?;
    Ok(pool.submit(payload).await?)
}

/// Feeds the payload topic into a worker pool until shutdown, until the
/// subscription closes or until the pool stops accepting work.
pub async fn run_payload_consumer(
    mut subscription: Subscription,
    pool: Arc<WorkerPool>,
    mut shutdown: watch::Receiver<bool>,
) {
    info!(cluster_id = %pool.cluster_id(), "Payload consumer started");

    loop {
        let message = tokio::select! {
            biased;
            _ = shutdown.changed() => break,
            next = subscription.recv() => match next {
                Some(message) => message,
                None => break,
            },
        };

        match handle_payload_message(&pool, &message).await {
            Ok(SubmitOutcome::Accepted { batches }) => {
                debug!(key = ?message.key, batches, "Payload accepted");
            }
            Ok(SubmitOutcome::Duplicate) => {
                debug!(key = ?message.key, "Duplicate payload ignored");
            }
            Err(ReplicaError::Pool(PoolError::ShuttingDown)) => break,
            Err(e) => warn!(key = ?message.key, error = %e, "Skipping payload message"),
        }
    }

    info!(cluster_id = %pool.cluster_id(), "Payload consumer stopped");
}
