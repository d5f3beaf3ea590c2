//! Mini Share
//!
//! Peers find each other through a rendezvous registry, advertise files as
//! chunk manifests, and pull those files chunk by chunk with per-chunk
//! SHA-256 verification and retry.

pub mod core;
pub mod network;
pub mod storage;
pub mod transfer;
pub mod utils;

// Re-export main types
pub use crate::core::{Config, FetchOutcome, Node, PeerRecord, RegistryConfig};
pub use network::{PeerRegistry, RegistryClient, RegistryServer};
pub use storage::{CHUNK_SIZE, Chunk, ChunkManifest, FileManager};
pub use transfer::{DownloadStrategy, SequentialDownloader, TransferProgress, TransferStatus};
pub use utils::error::{P2PError, Result};

// Version information
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
