use crate::ingress::producer::IngressProducer;
use crate::payload::StatusReport;
use crate::transport::{decode, Subscription};
use std::sync::Arc;
use tokio::sync::watch;
use tracing::{info, warn};

/// Drains the status topic into the producer until shutdown or until the
/// subscription closes. Undecodable messages are logged and skipped.
pub async fn run_status_consumer(
    mut subscription: Subscription,
    producer: Arc<IngressProducer>,
    mut shutdown: watch::Receiver<bool>,
) {
    info!("Status consumer started");

    loop {
        let message = tokio::select! {
            _ = shutdown.changed() => break,
            next = subscription.recv() => match next {
                Some(message) => message,
                None => break,
            },
        };

        match decode::<StatusReport>(&message.value) {
            Ok(report) => producer.on_status(report),
            Err(e) => warn!(topic = %message.topic, key = ?message.key, error = %e, "Skipping undecodable status message"),
        }
    }

    info!("Status consumer stopped");
}
