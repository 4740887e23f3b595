use crate::payload::StatusReport;
use async_trait::async_trait;
use thiserror::Error;
use tokio::sync::mpsc;

#[derive(Debug, Error)]
pub enum PublishError {
    #[error("status channel closed")]
    ChannelClosed,

    #[error("transport error: {0}")]
    Transport(#[from] crate::transport::TransportError),

    #[error("codec error: {0}")]
    Codec(#[from] crate::transport::CodecError),
}

/// Destination for a replica's completion reports.
#[async_trait]
pub trait StatusPublisher: Send + Sync {
    async fn publish(&self, report: StatusReport) -> Result<(), PublishError>;
}

/// Publishes reports onto an in-process channel.
#[derive(Debug, Clone)]
pub struct ChannelPublisher {
    tx: mpsc::UnboundedSender<StatusReport>,
}

impl ChannelPublisher {
    pub fn new() -> (Self, mpsc::UnboundedReceiver<StatusReport>) {
        let (tx, rx) = mpsc::unbounded_channel();
        (Self { tx }, rx)
    }
}

#[async_trait]
impl StatusPublisher for ChannelPublisher {
    async fn publish(&self, report: StatusReport) -> Result<(), PublishError> {
        self.tx.send(report).map_err(|_| PublishError::ChannelClosed)
    }
}
