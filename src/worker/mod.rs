pub mod batch;
pub mod pool;
pub mod processor;
pub mod publisher;
pub mod tracker;

pub use batch::{Batch, BatchId, BatchOutcome};
pub use pool::{PoolError, SubmitOutcome, WorkerPool, WorkerPoolConfig};
pub use processor::{BatchProcessor, InjectedFailureProcessor, ProcessError};
pub use publisher::{ChannelPublisher, PublishError, StatusPublisher};
pub use tracker::{JobSummary, JobTracker, TrackerError};
