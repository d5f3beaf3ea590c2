use async_trait::async_trait;
use log::{debug, info, warn};
use tokio::time::Duration;

use crate::core::protocol::{FILE_NOT_FOUND, decode_chunk_data};
use crate::core::{Message, PeerRecord};
use crate::network::Transport;
use crate::storage::{ChunkManifest, HashUtils, verify};
use crate::transfer::TransferProgress;
use crate::utils::{P2PError, Result};

/// How a node turns a filename and a candidate peer list into verified bytes.
#[async_trait]
pub trait DownloadStrategy: Send + Sync {
    async fn download(
        &self,
        filename: &str,
        peers: &[PeerRecord],
        progress: &TransferProgress,
    ) -> Result<Vec<u8>>;
}

/// One source peer, one chunk at a time, in file order.
///
/// The first peer that returns a manifest serves the whole file. A chunk that
/// fails every attempt aborts the download; no other peer is tried for it.
pub struct SequentialDownloader {
    io_timeout: Duration,
    max_attempts: usize,
}

impl SequentialDownloader {
    pub fn new(io_timeout: Duration, max_attempts: usize) -> Self {
        Self {
            io_timeout,
            max_attempts: max_attempts.max(1),
        }
    }

    pub async fn request_manifest(
        &self,
        peer: &PeerRecord,
        filename: &str,
    ) -> Result<ChunkManifest> {
        let reply: Option<Message> = Transport::request(
            &peer.connect_addr(),
            &Message::file_request(filename),
            self.io_timeout,
        )
        .await?;

        match reply {
            Some(Message::Error { message }) if message == FILE_NOT_FOUND => {
                Err(P2PError::FileNotFound(filename.to_string()))
            }
            Some(Message::Error { message }) => Err(P2PError::RemoteError(message)),
            Some(message @ Message::FileInfo { .. }) => {
                let manifest = message.into_manifest().ok_or_else(|| {
                    P2PError::InvalidResponse("Expected file info response".to_string())
                })?;
                if manifest.filename != filename {
                    return Err(P2PError::InvalidResponse(format!(
                        "asked for '{}' but got manifest for '{}'",
                        filename, manifest.filename
                    )));
                }
                manifest.validate()?;
                Ok(manifest)
            }
            Some(other) => Err(P2PError::InvalidResponse(format!(
                "Expected file info response, got '{}'",
                other.action()
            ))),
            None => Err(P2PError::NoResponse(peer.to_string())),
        }
    }

    pub async fn request_chunk(
        &self,
        peer: &PeerRecord,
        filename: &str,
        chunk_index: usize,
    ) -> Result<Vec<u8>> {
        let reply: Option<Message> = Transport::request(
            &peer.connect_addr(),
            &Message::chunk_request(filename, chunk_index),
            self.io_timeout,
        )
        .await?;

        match reply {
            Some(Message::ChunkData {
                chunk_index: got,
                data,
                ..
            }) => {
                if got != chunk_index {
                    return Err(P2PError::InvalidResponse(format!(
                        "asked for chunk {} but got chunk {}",
                        chunk_index, got
                    )));
                }
                decode_chunk_data(&data)
            }
            Some(Message::Error { message }) => Err(P2PError::RemoteError(message)),
            Some(other) => Err(P2PError::InvalidResponse(format!(
                "Expected chunk response, got '{}'",
                other.action()
            ))),
            None => Err(P2PError::NoResponse(peer.to_string())),
        }
    }

    async fn download_from(
        &self,
        peer: &PeerRecord,
        manifest: &ChunkManifest,
        progress: &TransferProgress,
    ) -> Result<Vec<u8>> {
        let filename = manifest.filename.as_str();
        progress.downloading(peer, manifest.num_chunks).await;

        let mut file_data = Vec::new();
        for (index, expected_hash) in manifest.chunk_hashes.iter().enumerate() {
            let data = self
                .fetch_verified_chunk(peer, filename, index, expected_hash)
                .await?;

            progress.chunk_completed(data.len()).await;
            file_data.extend_from_slice(&data);
            info!(
                "Chunk {}/{} of '{}' downloaded and verified",
                index + 1,
                manifest.num_chunks,
                filename
            );
        }

        Ok(file_data)
    }

    async fn fetch_verified_chunk(
        &self,
        peer: &PeerRecord,
        filename: &str,
        index: usize,
        expected_hash: &str,
    ) -> Result<Vec<u8>> {
        let mut last_error = None;

        for attempt in 1..=self.max_attempts {
            match self.request_chunk(peer, filename, index).await {
                Ok(data) if verify(&data, expected_hash) => return Ok(data),
                Ok(data) => {
                    let actual = HashUtils::hash_data(&data);
                    warn!(
                        "Chunk {} of '{}' from {} failed integrity check (attempt {}/{}): expected {}, got {}",
                        index,
                        filename,
                        peer,
                        attempt,
                        self.max_attempts,
                        &expected_hash[..8.min(expected_hash.len())],
                        &actual[..8]
                    );
                    last_error = Some(P2PError::ChunkVerificationFailed(format!(
                        "chunk {} of '{}' from {}",
                        index, filename, peer
                    )));
                }
                Err(e) => {
                    warn!(
                        "Error downloading chunk {} of '{}' from {} (attempt {}/{}): {}",
                        index, filename, peer, attempt, self.max_attempts, e
                    );
                    last_error = Some(e);
                }
            }
        }

        Err(match last_error {
            Some(e) if e.is_integrity_failure() => e,
            Some(e) => P2PError::IncompleteDownload(format!(
                "chunk {} of '{}' failed {} attempts: {}",
                index, filename, self.max_attempts, e
            )),
            None => P2PError::IncompleteDownload(format!("chunk {} of '{}'", index, filename)),
        })
    }
}

#[async_trait]
impl DownloadStrategy for SequentialDownloader {
    async fn download(
        &self,
        filename: &str,
        peers: &[PeerRecord],
        progress: &TransferProgress,
    ) -> Result<Vec<u8>> {
        if peers.is_empty() {
            return Err(P2PError::NoPeersAvailable);
        }

        for peer in peers {
            debug!("Asking {} for '{}'", peer, filename);
            match self.request_manifest(peer, filename).await {
                Ok(manifest) => {
                    info!(
                        "File info for '{}' received from {}: {} chunks",
                        filename, peer, manifest.num_chunks
                    );
                    return self.download_from(peer, &manifest, progress).await;
                }
                Err(P2PError::FileNotFound(_)) => {
                    info!("Peer {} does not have '{}'", peer, filename);
                }
                Err(e) => {
                    warn!("Failed to get file info from peer {}: {}", peer, e);
                }
            }
        }

        Err(P2PError::FileNotFound(filename.to_string()))
    }
}
