use serde::{Deserialize, Serialize};
use std::fmt;

/// A peer as the registry knows it. Two records are the same peer iff both
/// fields match.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct PeerRecord {
    pub address: String,
    pub port: u16,
}

impl PeerRecord {
    pub fn new(address: impl Into<String>, port: u16) -> Self {
        Self {
            address: address.into(),
            port,
        }
    }

    /// `host:port` form accepted by `TcpStream::connect`, bracketing IPv6 literals.
    pub fn connect_addr(&self) -> String {
        if self.address.contains(':') && !self.address.starts_with('[') {
            format!("[{}]:{}", self.address, self.port)
        } else {
            format!("{}:{}", self.address, self.port)
        }
    }
}

impl fmt::Display for PeerRecord {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.connect_addr())
    }
}
