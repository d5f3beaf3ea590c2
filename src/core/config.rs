use serde::{Deserialize, Serialize};
use std::path::PathBuf;
use std::time::Duration;

use crate::network::codec::MAX_CHUNK_SIZE;
use crate::storage::CHUNK_SIZE;
use crate::utils::{P2PError, Result};

pub const DEFAULT_REGISTRY_PORT: u16 = 8000;
pub const DEFAULT_PEER_PORT: u16 = 10000;
pub const DEFAULT_IO_TIMEOUT_SECS: u64 = 10;
pub const DEFAULT_CHUNK_ATTEMPTS: usize = 3;

#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct Config {
    /// Interface the server role binds to.
    pub bind_address: String,
    /// Port the server role binds to; 0 picks an ephemeral port.
    pub port: u16,
    /// Address other peers should use to reach this node.
    pub advertise_address: String,
    pub shared_dir: PathBuf,
    /// `host:port` of the registry.
    pub registry_addr: String,
    pub chunk_size: usize,
    pub io_timeout_secs: u64,
    pub max_chunk_attempts: usize,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            bind_address: "0.0.0.0".to_string(),
            port: DEFAULT_PEER_PORT,
            advertise_address: "127.0.0.1".to_string(),
            shared_dir: PathBuf::from("./files"),
            registry_addr: format!("127.0.0.1:{}", DEFAULT_REGISTRY_PORT),
            chunk_size: CHUNK_SIZE,
            io_timeout_secs: DEFAULT_IO_TIMEOUT_SECS,
            max_chunk_attempts: DEFAULT_CHUNK_ATTEMPTS,
        }
    }
}

impl Config {
    pub fn io_timeout(&self) -> Duration {
        Duration::from_secs(self.io_timeout_secs)
    }

    pub fn bind_addr(&self) -> String {
        format!("{}:{}", self.bind_address, self.port)
    }

    pub fn validate(&self) -> Result<()> {
        if self.chunk_size == 0 {
            return Err(P2PError::ConfigError("chunk_size must be non-zero".to_string()));
        }
        if self.chunk_size > MAX_CHUNK_SIZE {
            return Err(P2PError::ConfigError(format!(
                "chunk_size {} exceeds the {} byte limit for one chunk reply",
                self.chunk_size, MAX_CHUNK_SIZE
            )));
        }
        if self.max_chunk_attempts == 0 {
            return Err(P2PError::ConfigError(
                "max_chunk_attempts must be at least 1".to_string(),
            ));
        }
        if self.io_timeout_secs == 0 {
            return Err(P2PError::ConfigError(
                "io_timeout_secs must be non-zero".to_string(),
            ));
        }
        if self.registry_addr.is_empty() {
            return Err(P2PError::ConfigError("registry_addr is empty".to_string()));
        }
        Ok(())
    }
}

#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct RegistryConfig {
    pub bind_address: String,
    pub port: u16,
    pub io_timeout_secs: u64,
}

impl Default for RegistryConfig {
    fn default() -> Self {
        Self {
            bind_address: "0.0.0.0".to_string(),
            port: DEFAULT_REGISTRY_PORT,
            io_timeout_secs: DEFAULT_IO_TIMEOUT_SECS,
        }
    }
}

impl RegistryConfig {
    pub fn io_timeout(&self) -> Duration {
        Duration::from_secs(self.io_timeout_secs)
    }

    pub fn bind_addr(&self) -> String {
        format!("{}:{}", self.bind_address, self.port)
    }
}
