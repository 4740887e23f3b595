pub mod consumer;
pub mod producer;

pub use consumer::run_status_consumer;
pub use producer::{IngressError, IngressProducer};
