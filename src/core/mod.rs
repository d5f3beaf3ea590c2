pub mod config;
pub mod node;
pub mod peer;
pub mod protocol;

pub use config::{Config, RegistryConfig};
pub use node::{FetchOutcome, Node};
pub use peer::PeerRecord;
pub use protocol::{Message, PeerList, RegisterAck};
