use async_trait::async_trait;
use log::{debug, error, warn};
use serde_json::Value;
use std::net::SocketAddr;
use std::sync::Arc;

use crate::core::Message;
use crate::core::protocol::{
    CHUNK_OUT_OF_RANGE, FILE_NOT_FOUND, INTERNAL_ERROR, UNSUPPORTED_ACTION, reply_value,
};
use crate::network::RequestHandler;
use crate::storage::FileManager;
use crate::utils::P2PError;

/// Server role of a node: answers manifest and chunk requests from the shared root.
pub struct Uploader {
    file_manager: Arc<FileManager>,
}

impl Uploader {
    pub fn new(file_manager: Arc<FileManager>) -> Self {
        Self { file_manager }
    }

    pub async fn handle_request(&self, request: Message) -> Message {
        match request {
            Message::FileRequest { filename } => self.handle_file_request(&filename).await,
            Message::GetChunk {
                filename,
                chunk_index,
            } => self.handle_chunk_request(&filename, chunk_index).await,
            other => {
                debug!("Unhandled request type: {}", other.action());
                Message::error(UNSUPPORTED_ACTION)
            }
        }
    }

    async fn handle_file_request(&self, filename: &str) -> Message {
        match self.file_manager.manifest(filename).await {
            Ok(manifest) => {
                debug!(
                    "Serving manifest for '{}' ({} chunks)",
                    filename, manifest.num_chunks
                );
                Message::file_info(manifest)
            }
            Err(e) => error_reply(filename, e),
        }
    }

    async fn handle_chunk_request(&self, filename: &str, chunk_index: usize) -> Message {
        match self.file_manager.read_chunk(filename, chunk_index).await {
            Ok(data) => {
                debug!(
                    "Serving chunk {} of '{}' ({} bytes)",
                    chunk_index,
                    filename,
                    data.len()
                );
                Message::chunk_data(filename, chunk_index, &data)
            }
            Err(e) => error_reply(filename, e),
        }
    }
}

fn error_reply(filename: &str, err: P2PError) -> Message {
    match err {
        P2PError::FileNotFound(_) => {
            debug!("Requested file '{}' is not available", filename);
            Message::error(FILE_NOT_FOUND)
        }
        P2PError::ChunkOutOfRange { index, .. } => {
            debug!("Chunk {} of '{}' is out of range", index, filename);
            Message::error(CHUNK_OUT_OF_RANGE)
        }
        other => {
            error!("Failed to serve '{}': {}", filename, other);
            Message::error(INTERNAL_ERROR)
        }
    }
}

#[async_trait]
impl RequestHandler for Uploader {
    async fn handle(&self, request: Value, from: SocketAddr) -> Option<Value> {
        let reply = match serde_json::from_value::<Message>(request) {
            Ok(message) => {
                debug!("'{}' request from {}", message.action(), from);
                self.handle_request(message).await
            }
            Err(e) => {
                warn!("Unrecognized request from {}: {}", from, e);
                Message::error(UNSUPPORTED_ACTION)
            }
        };

        Some(reply_value(&reply))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::protocol::decode_chunk_data;
    use crate::storage::{HashUtils, verify};
    use serde_json::json;
    use tempfile::tempdir;

    async fn uploader_with(content: &[u8]) -> (tempfile::TempDir, Uploader) {
        let dir = tempdir().unwrap();
        std::fs::write(dir.path().join("a.txt"), content).unwrap();
        let file_manager = FileManager::new(dir.path().to_path_buf(), 4).await.unwrap();
        file_manager.publish("a.txt").await.unwrap();
        (dir, Uploader::new(Arc::new(file_manager)))
    }

    #[tokio::test]
    async fn test_file_request_returns_manifest() {
        let (_dir, uploader) = uploader_with(b"ABCDEFG").await;

        match uploader.handle_request(Message::file_request("a.txt")).await {
            Message::FileInfo {
                filename,
                chunk_size,
                num_chunks,
                chunk_hashes,
            } => {
                assert_eq!(filename, "a.txt");
                assert_eq!(chunk_size, 4);
                assert_eq!(num_chunks, 2);
                assert_eq!(chunk_hashes[0], HashUtils::hash_data(b"ABCD"));
            }
            other => panic!("unexpected reply {:?}", other),
        }
    }

    #[tokio::test]
    async fn test_get_chunk_returns_exact_bytes() {
        let (_dir, uploader) = uploader_with(b"ABCDEFG").await;

        let manifest = uploader
            .handle_request(Message::file_request("a.txt"))
            .await
            .into_manifest()
            .unwrap();

        match uploader.handle_request(Message::chunk_request("a.txt", 1)).await {
            Message::ChunkData {
                chunk_index, data, ..
            } => {
                assert_eq!(chunk_index, 1);
                let bytes = decode_chunk_data(&data).unwrap();
                assert_eq!(bytes, b"EFG");
                assert!(verify(&bytes, manifest.hash_at(1).unwrap()));
            }
            other => panic!("unexpected reply {:?}", other),
        }
    }

    #[tokio::test]
    async fn test_missing_and_out_of_range() {
        let (dir, uploader) = uploader_with(b"ABCDEFG").await;

        assert_eq!(
            uploader.handle_request(Message::file_request("nope")).await,
            Message::error(FILE_NOT_FOUND)
        );
        assert_eq!(
            uploader.handle_request(Message::chunk_request("a.txt", 2)).await,
            Message::error(CHUNK_OUT_OF_RANGE)
        );
        assert_eq!(
            uploader
                .handle_request(Message::chunk_request("../a.txt", 0))
                .await,
            Message::error(FILE_NOT_FOUND)
        );

        std::fs::remove_file(dir.path().join("a.txt")).unwrap();
        assert_eq!(
            uploader.handle_request(Message::file_request("a.txt")).await,
            Message::error(FILE_NOT_FOUND)
        );
    }

    #[tokio::test]
    async fn test_unknown_requests_get_error() {
        let (_dir, uploader) = uploader_with(b"x").await;
        let from: SocketAddr = "127.0.0.1:5555".parse().unwrap();

        let reply = uploader.handle(json!({"action": "get_peers"}), from).await;
        assert_eq!(reply, Some(json!({"action": "error", "message": UNSUPPORTED_ACTION})));

        let reply = uploader.handle(json!({"action": "delete_file"}), from).await;
        assert_eq!(reply.unwrap()["action"], "error");
    }
}
