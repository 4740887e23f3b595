pub mod publisher;
pub mod runner;

pub use publisher::TransportPublisher;
pub use runner::{handle_payload_message, run_payload_consumer, Replica, ReplicaError};
