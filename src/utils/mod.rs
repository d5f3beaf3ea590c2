pub mod error;
pub mod logger;

pub use error::{P2PError, Result};
pub use logger::setup_logging;
