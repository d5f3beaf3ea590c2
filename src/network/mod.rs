pub mod codec;
pub mod connection;
pub mod discovery;
pub mod messaging;
pub mod registry;
pub mod transport;

pub use connection::Connection;
pub use discovery::RegistryClient;
pub use messaging::RequestHandler;
pub use registry::{PeerRegistry, RegistryServer};
pub use transport::Transport;
