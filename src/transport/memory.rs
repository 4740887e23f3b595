use crate::transport::traits::{Message, Subscription, Transport, TransportError};
use async_trait::async_trait;
use std::collections::HashMap;
use std::sync::Mutex;
use tokio::sync::mpsc;
use tracing::{debug, warn};

/// In-process broker. Each subscriber behaves like its own consumer group:
/// it sees every message published to the topic after it subscribed.
#[derive(Default)]
pub struct InMemoryBroker {
    topics: Mutex<HashMap<String, Vec<mpsc::UnboundedSender<Message>>>>,
}

impl InMemoryBroker {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn subscriber_count(&self, topic: &str) -> usize {
        self.topics
            .lock()
            .map(|topics| topics.get(topic).map_or(0, |subs| subs.iter().filter(|s| !s.is_closed()).count()))
            .unwrap_or(0)
    }
}

#[async_trait]
impl Transport for InMemoryBroker {
    async fn send(&self, topic: &str, key: Option<&str>, value: Vec<u8>) -> Result<(), TransportError> {
        let mut topics = self.topics.lock().map_err(|_| TransportError::Closed)?;
        let subscribers = topics.entry(topic.to_string()).or_default();
        subscribers.retain(|s| !s.is_closed());

        if subscribers.is_empty() {
            warn!(topic = %topic, "Dropping message, topic has no subscribers");
            return Err(TransportError::NoSubscribers(topic.to_string()));
        }

        let message = Message {
            topic: topic.to_string(),
            key: key.map(str::to_string),
            value,
        };
        for subscriber in subscribers.iter() {
            let _ = subscriber.send(message.clone());
        }

        debug!(topic = %topic, key = ?key, subscribers = subscribers.len(), "Published message");
        Ok(())
    }

    fn subscribe(&self, topic: &str) -> Subscription {
        let (tx, rx) = mpsc::unbounded_channel();
        if let Ok(mut topics) = self.topics.lock() {
            topics.entry(topic.to_string()).or_default().push(tx);
        }
        rx
    }
}
