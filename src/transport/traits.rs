use async_trait::async_trait;
use tokio::sync::mpsc;

/// A message as delivered to a subscriber.
#[derive(Debug, Clone, PartialEq)]
pub struct Message {
    pub topic: String,
    pub key: Option<String>,
    pub value: Vec<u8>,
}

/// Stream of messages for one subscriber of one topic.
pub type Subscription = mpsc::UnboundedReceiver<Message>;

/// Publish/subscribe transport between the ingress side and replicas.
#[async_trait]
pub trait Transport: Send + Sync {
    async fn send(&self, topic: &str, key: Option<&str>, value: Vec<u8>) -> Result<(), TransportError>;

    /// Every subscriber of a topic receives every message sent after it
    /// subscribed.
    fn subscribe(&self, topic: &str) -> Subscription;
}

#[derive(Debug, thiserror::Error)]
pub enum TransportError {
    #[error("transport closed")]
    Closed,

    #[error("no subscribers for topic {0}")]
    NoSubscribers(String),
}
