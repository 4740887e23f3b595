pub mod hashing;
pub mod splitter;

pub use hashing::bucket_for;
pub use splitter::{PartitionError, Partitioner};
