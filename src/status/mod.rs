pub mod aggregator;
pub mod store;

pub use aggregator::StatusAggregator;
pub use store::StatusStore;
