pub mod codec;
pub mod memory;
pub mod traits;

pub use codec::{decode, encode, CodecError};
pub use memory::InMemoryBroker;
pub use traits::{Message, Subscription, Transport, TransportError};
