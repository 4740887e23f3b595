use crate::partition::bucket_for;
use crate::payload::{Payload, StatusReport};
use crate::worker::batch::{group_by_key, Batch, BatchId, BatchOutcome};
use crate::worker::processor::BatchProcessor;
use crate::worker::publisher::StatusPublisher;
use crate::worker::tracker::{JobTracker, TrackerError};
use futures::FutureExt;
use std::panic::AssertUnwindSafe;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;
use thiserror::Error;
use tokio::sync::{mpsc, watch};
use tokio::task::JoinHandle;
use tokio::time::Instant;
use tracing::{debug, error, info, warn};

#[derive(Debug, Error)]
pub enum PoolError {
    #[error("worker pool is shutting down")]
    ShuttingDown,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SubmitOutcome {
    /// All batches were enqueued; a status report will follow.
    Accepted { batches: usize },
    /// A job with the same id is still in flight; the submission was ignored.
    Duplicate,
}

#[derive(Debug, Clone)]
pub struct WorkerPoolConfig {
    /// Identity stamped on every status report from this pool
    pub cluster_id: String,
    pub num_workers: usize,
    /// Capacity of each worker's queue; a full queue blocks `submit`
    pub queue_capacity: usize,
    /// How often an idle worker re-checks the shutdown flag
    pub poll_interval: Duration,
    /// Delay between a completion signal and finalizing the job
    pub settle_delay: Duration,
    /// How long `shutdown` waits for in-flight work before aborting it
    pub shutdown_grace: Duration,
}

impl Default for WorkerPoolConfig {
    fn default() -> Self {
        Self {
            cluster_id: "local".to_string(),
            num_workers: 4,
            queue_capacity: 100,
            poll_interval: Duration::from_millis(500),
            settle_delay: Duration::from_millis(100),
            shutdown_grace: Duration::from_secs(5),
        }
    }
}

impl WorkerPoolConfig {
    pub fn with_cluster_id(mut self, cluster_id: impl Into<String>) -> Self {
        self.cluster_id = cluster_id.into();
        self
    }
}

#[derive(Default)]
struct PoolStats {
    completed: AtomicUsize,
    successful: AtomicUsize,
    successful_ids: Mutex<Vec<String>>,
}

impl PoolStats {
    fn record(&self, job_id: &str, success: bool) {
        self.completed.fetch_add(1, Ordering::SeqCst);
        if success {
            self.successful.fetch_add(1, Ordering::SeqCst);
            if let Ok(mut ids) = self.successful_ids.lock() {
                ids.push(job_id.to_string());
            }
        }
    }
}

/// Fixed set of workers, each draining its own bounded queue.
///
/// `submit` groups a payload by key, routes each key's batch to a worker by
/// key hash and returns once everything is enqueued. When every batch of a
/// job has an outcome, a single finalizer task publishes one
/// [`StatusReport`] for it.
pub struct WorkerPool {
    cluster_id: String,
    queues: Vec<mpsc::Sender<Batch>>,
    tracker: Arc<JobTracker>,
    stats: Arc<PoolStats>,
    shutdown_tx: watch::Sender<bool>,
    drain_tx: watch::Sender<bool>,
    shutting_down: AtomicBool,
    shutdown_grace: Duration,
    tasks: tokio::sync::Mutex<PoolTasks>,
}

#[derive(Default)]
struct PoolTasks {
    workers: Vec<JoinHandle<()>>,
    finalizer: Option<JoinHandle<()>>,
}

impl WorkerPool {
    /// Spawns the workers and the finalizer. Must be called inside a tokio runtime.
    pub fn start(
        config: WorkerPoolConfig,
        processor: Arc<dyn BatchProcessor>,
        publisher: Arc<dyn StatusPublisher>,
    ) -> Self {
        let num_workers = config.num_workers.max(1);
        let (tracker, completions) = JobTracker::new();
        let tracker = Arc::new(tracker);
        let stats = Arc::new(PoolStats::default());
        let (shutdown_tx, shutdown_rx) = watch::channel(false);
        let (drain_tx, drain_rx) = watch::channel(false);

        let mut queues = Vec::with_capacity(num_workers);
        let mut workers = Vec::with_capacity(num_workers);
        for worker_id in 0..num_workers {
            let (tx, rx) = mpsc::channel(config.queue_capacity.max(1));
            queues.push(tx);
            workers.push(tokio::spawn(run_worker(
                worker_id,
                rx,
                shutdown_rx.clone(),
                Arc::clone(&processor),
                Arc::clone(&tracker),
                config.poll_interval,
            )));
        }

        let finalizer = Finalizer {
            cluster_id: config.cluster_id.clone(),
            tracker: Arc::clone(&tracker),
            publisher,
            stats: Arc::clone(&stats),
        };
        let finalizer = tokio::spawn(run_finalizer(
            finalizer,
            completions,
            drain_rx,
            config.settle_delay,
        ));

        info!(
            cluster_id = %config.cluster_id,
            workers = num_workers,
            queue_capacity = config.queue_capacity,
            "Worker pool started"
        );

        Self {
            cluster_id: config.cluster_id,
            queues,
            tracker,
            stats,
            shutdown_tx,
            drain_tx,
            shutting_down: AtomicBool::new(false),
            shutdown_grace: config.shutdown_grace,
            tasks: tokio::sync::Mutex::new(PoolTasks {
                workers,
                finalizer: Some(finalizer),
            }),
        }
    }

    /// Enqueues a payload for processing.
    ///
    /// Blocks while the target worker queue is full. Processing failures are
    /// reported only through the eventual status report; the only error is
    /// the pool shutting down before everything was enqueued, in which case
    /// no report is emitted for the job.
    pub async fn submit(&self, payload: Payload) -> Result<SubmitOutcome, PoolError> {
        let mut shutdown = self.shutdown_tx.subscribe();
        if self.is_shutting_down() {
            return Err(PoolError::ShuttingDown);
        }

        let Payload {
            job_id,
            partition_id,
            records,
        } = payload;
        let batches = group_by_key(&job_id, records);
        let batch_count = batches.len();

        // Tracking must exist before the first batch can report.
        if let Err(TrackerError::AlreadyTracked(_)) = self.tracker.register(
            &job_id,
            partition_id,
            batches.iter().map(|b| b.batch_id.clone()),
        ) {
            warn!(job_id = %job_id, "Job already in flight, ignoring resubmission");
            return Ok(SubmitOutcome::Duplicate);
        }

        for batch in batches {
            let queue = &self.queues[self.route(&batch.batch_id)];
            let enqueued = tokio::select! {
                biased;
                _ = shutdown.changed() => false,
                sent = queue.send(batch) => sent.is_ok(),
            };
            if !enqueued {
                warn!(job_id = %job_id, "Enqueue interrupted by shutdown, abandoning job");
                self.tracker.abandon(&job_id);
                return Err(PoolError::ShuttingDown);
            }
        }

        debug!(
            job_id = %job_id,
            partition_id = ?partition_id,
            batches = batch_count,
            "Job enqueued"
        );

        Ok(SubmitOutcome::Accepted {
            batches: batch_count,
        })
    }

    /// Stops the pool. Workers stop pulling new batches and in-flight work
    /// gets `shutdown_grace` to finish. Jobs completed by then are still
    /// finalized and reported; anything else is aborted and its tracking
    /// state dropped. Once this returns no further jobs are finalized or
    /// reported.
    pub async fn shutdown(&self) {
        if !self.shutting_down.swap(true, Ordering::SeqCst) {
            info!(cluster_id = %self.cluster_id, "Shutting down worker pool");
        }
        let _ = self.shutdown_tx.send(true);

        let mut tasks = self.tasks.lock().await;
        let deadline = Instant::now() + self.shutdown_grace;
        for handle in tasks.workers.drain(..) {
            self.join_or_abort(handle, deadline, "Worker").await;
        }

        // Workers are gone, so every completion has been signaled by now.
        let _ = self.drain_tx.send(true);
        if let Some(handle) = tasks.finalizer.take() {
            self.join_or_abort(handle, deadline, "Finalizer").await;
        }

        let abandoned = self.tracker.clear();
        if abandoned > 0 {
            warn!(cluster_id = %self.cluster_id, jobs = abandoned, "Incomplete jobs abandoned");
        }
        info!(cluster_id = %self.cluster_id, "Worker pool stopped");
    }

    async fn join_or_abort(&self, mut handle: JoinHandle<()>, deadline: Instant, task: &str) {
        if tokio::time::timeout_at(deadline, &mut handle).await.is_err() {
            warn!(cluster_id = %self.cluster_id, task, "Task still running after grace period, aborting");
            handle.abort();
            let _ = handle.await;
        }
    }

    pub fn cluster_id(&self) -> &str {
        &self.cluster_id
    }

    pub fn is_shutting_down(&self) -> bool {
        self.shutting_down.load(Ordering::SeqCst)
    }

    pub fn completed_jobs(&self) -> usize {
        self.stats.completed.load(Ordering::SeqCst)
    }

    pub fn successful_jobs(&self) -> usize {
        self.stats.successful.load(Ordering::SeqCst)
    }

    pub fn successful_job_ids(&self) -> Vec<String> {
        self.stats
            .successful_ids
            .lock()
            .map(|ids| ids.clone())
            .unwrap_or_default()
    }

    /// Jobs registered but not yet finalized.
    pub fn active_jobs(&self) -> usize {
        self.tracker.active_jobs()
    }

    fn route(&self, batch_id: &BatchId) -> usize {
        bucket_for(batch_id.key(), self.queues.len() as u32) as usize
    }
}

async fn run_worker(
    worker_id: usize,
    mut queue: mpsc::Receiver<Batch>,
    mut shutdown: watch::Receiver<bool>,
    processor: Arc<dyn BatchProcessor>,
    tracker: Arc<JobTracker>,
    poll_interval: Duration,
) {
    debug!(worker_id, "Worker started");

    loop {
        if *shutdown.borrow() {
            break;
        }

        let batch = tokio::select! {
            biased;
            _ = shutdown.changed() => break,
            polled = tokio::time::timeout(poll_interval, queue.recv()) => match polled {
                Ok(Some(batch)) => batch,
                Ok(None) => break,
                // Poll timeout: loop around and re-check shutdown
                Err(_) => continue,
            },
        };

        let outcome = execute_batch(processor.as_ref(), &batch).await;
        tracker.record(&batch.job_id, &batch.batch_id, outcome);
    }

    debug!(worker_id, "Worker stopped");
}

async fn execute_batch(processor: &dyn BatchProcessor, batch: &Batch) -> BatchOutcome {
    match AssertUnwindSafe(processor.process(batch)).catch_unwind().await {
        Ok(Ok(())) => BatchOutcome::Success,
        Ok(Err(e)) => {
            warn!(job_id = %batch.job_id, batch = %batch.batch_id, error = %e, "Batch failed");
            BatchOutcome::Failure
        }
        Err(_) => {
            error!(job_id = %batch.job_id, batch = %batch.batch_id, "Batch processor panicked");
            BatchOutcome::Failure
        }
    }
}

struct Finalizer {
    cluster_id: String,
    tracker: Arc<JobTracker>,
    publisher: Arc<dyn StatusPublisher>,
    stats: Arc<PoolStats>,
}

impl Finalizer {
    async fn finalize(&self, job_id: &str) {
        let Some(summary) = self.tracker.finalize(job_id) else {
            debug!(job_id = %job_id, "Job already finalized");
            return;
        };

        self.stats.record(job_id, summary.success);
        info!(
            job_id = %job_id,
            success = summary.success,
            batches = summary.batch_count,
            "Job completed"
        );

        let report = StatusReport::new(
            job_id,
            summary.success,
            summary.batch_count,
            Some(self.cluster_id.clone()),
            summary.partition_id,
        );
        if let Err(e) = self.publisher.publish(report).await {
            error!(job_id = %job_id, error = %e, "Failed to publish status report");
        }
    }
}

/// Sole consumer of the completion channel. Jobs are finalized one at a time
/// in signal order. Once draining starts the settle delay is skipped and every
/// job already signaled is finalized before the task exits.
async fn run_finalizer(
    finalizer: Finalizer,
    mut completions: mpsc::UnboundedReceiver<String>,
    mut drain: watch::Receiver<bool>,
    settle_delay: Duration,
) {
    loop {
        let job_id = tokio::select! {
            biased;
            _ = drain.changed() => break,
            next = completions.recv() => match next {
                Some(job_id) => job_id,
                None => break,
            },
        };

        let draining = tokio::select! {
            biased;
            _ = drain.changed() => true,
            _ = tokio::time::sleep(settle_delay) => false,
        };
        finalizer.finalize(&job_id).await;
        if draining {
            break;
        }
    }

    while let Ok(job_id) = completions.try_recv() {
        finalizer.finalize(&job_id).await;
    }

    debug!(cluster_id = %finalizer.cluster_id, "Finalizer stopped");
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::payload::Record;
    use crate::worker::processor::{InjectedFailureProcessor, ProcessError};
    use crate::worker::publisher::ChannelPublisher;
    use async_trait::async_trait;
    use tokio::sync::Semaphore;

    fn test_config() -> WorkerPoolConfig {
        WorkerPoolConfig {
            cluster_id: "cluster-test".to_string(),
            num_workers: 4,
            queue_capacity: 100,
            poll_interval: Duration::from_millis(50),
            settle_delay: Duration::from_millis(10),
            shutdown_grace: Duration::from_millis(500),
        }
    }

    fn make_payload(job_id: &str, records: usize, distinct_keys: usize) -> Payload {
        let records = (0..records)
            .map(|i| Record::new(format!("tsid{}", i % distinct_keys), vec![]))
            .collect();
        Payload::new(job_id, records)
    }

    async fn next_report(rx: &mut mpsc::UnboundedReceiver<StatusReport>) -> StatusReport {
        tokio::time::timeout(Duration::from_secs(5), rx.recv())
            .await
            .expect("timed out waiting for status report")
            .expect("publisher channel closed")
    }

    /// Blocks every batch until a permit is released.
    struct GatedProcessor {
        gate: Arc<Semaphore>,
    }

    #[async_trait]
    impl BatchProcessor for GatedProcessor {
        async fn process(&self, _batch: &Batch) -> Result<(), ProcessError> {
            let permit = self
                .gate
                .acquire()
                .await
                .map_err(|e| ProcessError::Other(e.to_string()))?;
            permit.forget();
            Ok(())
        }
    }

    struct PanickingProcessor;

    #[async_trait]
    impl BatchProcessor for PanickingProcessor {
        async fn process(&self, batch: &Batch) -> Result<(), ProcessError> {
            if batch.batch_id.key() == Some("tsid0") {
                panic!("boom");
            }
            Ok(())
        }
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 4)]
    async fn test_successful_job_reports_distinct_key_count() {
        let (publisher, mut rx) = ChannelPublisher::new();
        let pool = WorkerPool::start(
            test_config(),
            Arc::new(InjectedFailureProcessor::default()),
            Arc::new(publisher),
        );

        let outcome = pool.submit(make_payload("job-1", 100, 10)).await.unwrap();
        assert_eq!(outcome, SubmitOutcome::Accepted { batches: 10 });

        let report = next_report(&mut rx).await;
        assert_eq!(report.job_id, "job-1");
        assert!(report.success);
        assert_eq!(report.batch_count, 10);
        assert_eq!(report.cluster_id.as_deref(), Some("cluster-test"));
        assert_eq!(report.partition_id, None);

        assert_eq!(pool.completed_jobs(), 1);
        assert_eq!(pool.successful_jobs(), 1);
        assert_eq!(pool.successful_job_ids(), vec!["job-1".to_string()]);
        assert_eq!(pool.active_jobs(), 0);
        pool.shutdown().await;
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 4)]
    async fn test_fail_key_fails_job_but_keeps_count() {
        let (publisher, mut rx) = ChannelPublisher::new();
        let pool = WorkerPool::start(
            test_config(),
            Arc::new(InjectedFailureProcessor::new(Some("tsid3".to_string()), 0.0)),
            Arc::new(publisher),
        );

        pool.submit(make_payload("job-fail", 50, 5)).await.unwrap();

        let report = next_report(&mut rx).await;
        assert!(!report.success);
        assert_eq!(report.batch_count, 5);
        assert_eq!(pool.completed_jobs(), 1);
        assert_eq!(pool.successful_jobs(), 0);
        pool.shutdown().await;
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 4)]
    async fn test_partition_id_carried_into_report() {
        let (publisher, mut rx) = ChannelPublisher::new();
        let pool = WorkerPool::start(
            test_config(),
            Arc::new(InjectedFailureProcessor::default()),
            Arc::new(publisher),
        );

        let sub = Payload::for_partition(
            "job-p2",
            2,
            vec![Record::new("a", vec![]), Record::new("b", vec![])],
        );
        pool.submit(sub).await.unwrap();

        let report = next_report(&mut rx).await;
        assert_eq!(report.job_id, "job-p2");
        assert_eq!(report.partition_id, Some(2));
        assert_eq!(report.batch_count, 2);
        pool.shutdown().await;
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 4)]
    async fn test_panicking_batch_is_a_failure() {
        let (publisher, mut rx) = ChannelPublisher::new();
        let pool = WorkerPool::start(test_config(), Arc::new(PanickingProcessor), Arc::new(publisher));

        pool.submit(make_payload("job-panic", 20, 4)).await.unwrap();
        let report = next_report(&mut rx).await;
        assert!(!report.success);
        assert_eq!(report.batch_count, 4);

        // Workers survive the panic
        pool.submit(Payload::new("job-after", vec![Record::new("x", vec![])]))
            .await
            .unwrap();
        let report = next_report(&mut rx).await;
        assert_eq!(report.job_id, "job-after");
        assert!(report.success);
        pool.shutdown().await;
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 4)]
    async fn test_empty_payload_completes_immediately() {
        let (publisher, mut rx) = ChannelPublisher::new();
        let pool = WorkerPool::start(
            test_config(),
            Arc::new(InjectedFailureProcessor::default()),
            Arc::new(publisher),
        );

        let outcome = pool.submit(Payload::new("empty", vec![])).await.unwrap();
        assert_eq!(outcome, SubmitOutcome::Accepted { batches: 0 });
        let report = next_report(&mut rx).await;
        assert!(report.success);
        assert_eq!(report.batch_count, 0);
        pool.shutdown().await;
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 4)]
    async fn test_duplicate_in_flight_submission_ignored() {
        let gate = Arc::new(Semaphore::new(0));
        let (publisher, mut rx) = ChannelPublisher::new();
        let pool = WorkerPool::start(
            test_config(),
            Arc::new(GatedProcessor { gate: Arc::clone(&gate) }),
            Arc::new(publisher),
        );

        pool.submit(make_payload("dup", 3, 3)).await.unwrap();
        let second = pool.submit(make_payload("dup", 3, 3)).await.unwrap();
        assert_eq!(second, SubmitOutcome::Duplicate);

        gate.add_permits(3);
        let report = next_report(&mut rx).await;
        assert_eq!(report.job_id, "dup");
        assert_eq!(report.batch_count, 3);

        // Exactly one report for the job
        tokio::time::sleep(Duration::from_millis(100)).await;
        assert!(rx.try_recv().is_err());
        assert_eq!(pool.completed_jobs(), 1);
        pool.shutdown().await;
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 4)]
    async fn test_full_queue_blocks_submit() {
        let gate = Arc::new(Semaphore::new(0));
        let (publisher, mut rx) = ChannelPublisher::new();
        let config = WorkerPoolConfig {
            num_workers: 1,
            queue_capacity: 1,
            ..test_config()
        };
        let pool = Arc::new(WorkerPool::start(
            config,
            Arc::new(GatedProcessor { gate: Arc::clone(&gate) }),
            Arc::new(publisher),
        ));

        // One batch in the worker, one in the queue, the rest must wait.
        let submitter = {
            let pool = Arc::clone(&pool);
            tokio::spawn(async move { pool.submit(make_payload("slow", 5, 5)).await })
        };
        tokio::time::sleep(Duration::from_millis(200)).await;
        assert!(!submitter.is_finished());

        gate.add_permits(5);
        let outcome = submitter.await.unwrap().unwrap();
        assert_eq!(outcome, SubmitOutcome::Accepted { batches: 5 });
        let report = next_report(&mut rx).await;
        assert!(report.success);
        pool.shutdown().await;
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 4)]
    async fn test_no_completions_after_shutdown() {
        let (publisher, mut rx) = ChannelPublisher::new();
        let pool = WorkerPool::start(
            test_config(),
            Arc::new(InjectedFailureProcessor::default()),
            Arc::new(publisher),
        );

        pool.submit(make_payload("before", 50, 5)).await.unwrap();
        next_report(&mut rx).await;
        let completed_before = pool.completed_jobs();

        pool.shutdown().await;
        tokio::time::sleep(Duration::from_millis(200)).await;

        assert_eq!(pool.completed_jobs(), completed_before);
        assert!(matches!(
            pool.submit(make_payload("after", 5, 5)).await,
            Err(PoolError::ShuttingDown)
        ));
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 4)]
    async fn test_shutdown_abandons_incomplete_jobs() {
        let gate = Arc::new(Semaphore::new(0));
        let (publisher, mut rx) = ChannelPublisher::new();
        let config = WorkerPoolConfig {
            shutdown_grace: Duration::from_millis(100),
            ..test_config()
        };
        let pool = WorkerPool::start(
            config,
            Arc::new(GatedProcessor { gate: Arc::clone(&gate) }),
            Arc::new(publisher),
        );

        pool.submit(make_payload("stuck", 8, 8)).await.unwrap();
        tokio::time::sleep(Duration::from_millis(100)).await;

        pool.shutdown().await;
        let completed = pool.completed_jobs();

        // Releasing the gate after shutdown must not produce a report.
        gate.add_permits(8);
        tokio::time::sleep(Duration::from_millis(200)).await;
        assert_eq!(pool.completed_jobs(), completed);
        assert_eq!(completed, 0);
        assert!(rx.try_recv().is_err());
        assert_eq!(pool.active_jobs(), 0);
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 4)]
    async fn test_job_settling_at_shutdown_is_still_reported() {
        let (publisher, mut rx) = ChannelPublisher::new();
        let config = WorkerPoolConfig {
            settle_delay: Duration::from_millis(300),
            shutdown_grace: Duration::from_secs(2),
            ..test_config()
        };
        let pool = WorkerPool::start(
            config,
            Arc::new(InjectedFailureProcessor::default()),
            Arc::new(publisher),
        );

        pool.submit(make_payload("settling", 2, 2)).await.unwrap();
        // Both batches are done and the job is signaled, but still settling
        tokio::time::sleep(Duration::from_millis(100)).await;
        assert_eq!(pool.active_jobs(), 1);
        assert_eq!(pool.completed_jobs(), 0);

        pool.shutdown().await;

        assert_eq!(pool.completed_jobs(), 1);
        assert_eq!(pool.successful_job_ids(), vec!["settling".to_string()]);
        assert_eq!(pool.active_jobs(), 0);
        let report = rx.try_recv().unwrap();
        assert_eq!(report.job_id, "settling");
        assert!(report.success);
        assert_eq!(report.batch_count, 2);
        assert!(rx.try_recv().is_err());
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 4)]
    async fn test_in_flight_batch_finishing_within_grace_is_reported() {
        let gate = Arc::new(Semaphore::new(0));
        let (publisher, mut rx) = ChannelPublisher::new();
        let config = WorkerPoolConfig {
            shutdown_grace: Duration::from_secs(2),
            ..test_config()
        };
        let pool = WorkerPool::start(
            config,
            Arc::new(GatedProcessor { gate: Arc::clone(&gate) }),
            Arc::new(publisher),
        );

        // A single key, so one batch, held inside the processor
        pool.submit(make_payload("in-flight", 3, 1)).await.unwrap();
        tokio::time::sleep(Duration::from_millis(100)).await;

        let releaser = {
            let gate = Arc::clone(&gate);
            tokio::spawn(async move {
                tokio::time::sleep(Duration::from_millis(100)).await;
                gate.add_permits(1);
            })
        };
        pool.shutdown().await;
        releaser.await.unwrap();

        assert_eq!(pool.completed_jobs(), 1);
        let report = rx.try_recv().unwrap();
        assert_eq!(report.job_id, "in-flight");
        assert!(report.success);
        assert_eq!(report.batch_count, 1);

        // Counters stay frozen once shutdown has returned
        gate.add_permits(10);
        tokio::time::sleep(Duration::from_millis(200)).await;
        assert_eq!(pool.completed_jobs(), 1);
        assert!(rx.try_recv().is_err());
        assert_eq!(pool.active_jobs(), 0);
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 4)]
    async fn test_shutdown_is_idempotent() {
        let (publisher, _rx) = ChannelPublisher::new();
        let pool = WorkerPool::start(
            test_config(),
            Arc::new(InjectedFailureProcessor::default()),
            Arc::new(publisher),
        );
        pool.shutdown().await;
        pool.shutdown().await;
        assert!(pool.is_shutting_down());
    }
}
