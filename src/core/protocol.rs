use log::error;
use serde::{Deserialize, Serialize};
use serde_json::{Value, json};

use crate::core::PeerRecord;
use crate::network::codec;
use crate::storage::ChunkManifest;
use crate::utils::Result;

pub const STATUS_REGISTERED: &str = "registered";
pub const FILE_NOT_FOUND: &str = "File not found";
pub const CHUNK_OUT_OF_RANGE: &str = "Chunk index out of range";
pub const UNSUPPORTED_ACTION: &str = "Unsupported action";
pub const INTERNAL_ERROR: &str = "Internal error";

/// Every request, plus the replies peers send, tagged by `action` on the wire.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "action", rename_all = "snake_case")]
pub enum Message {
    // Registry requests
    Register {
        address: String,
        port: u16,
    },
    GetPeers,

    // Peer requests
    FileRequest {
        filename: String,
    },
    GetChunk {
        filename: String,
        chunk_index: usize,
    },

    // Peer replies
    FileInfo {
        filename: String,
        chunk_size: usize,
        num_chunks: usize,
        chunk_hashes: Vec<String>,
    },
    ChunkData {
        filename: String,
        chunk_index: usize,
        data: String,
    },
    Error {
        message: String,
    },
}

/// Registry reply to `register`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RegisterAck {
    pub status: String,
}

/// Registry reply to `get_peers`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PeerList {
    pub peers: Vec<PeerRecord>,
}

impl Message {
    pub fn register(record: &PeerRecord) -> Self {
        Message::Register {
            address: record.address.clone(),
            port: record.port,
        }
    }

    pub fn file_request(filename: &str) -> Self {
        Message::FileRequest {
            filename: filename.to_string(),
        }
    }

    pub fn chunk_request(filename: &str, chunk_index: usize) -> Self {
        Message::GetChunk {
            filename: filename.to_string(),
            chunk_index,
        }
    }

    pub fn file_info(manifest: ChunkManifest) -> Self {
        Message::FileInfo {
            filename: manifest.filename,
            chunk_size: manifest.chunk_size,
            num_chunks: manifest.num_chunks,
            chunk_hashes: manifest.chunk_hashes,
        }
    }

    pub fn chunk_data(filename: &str, chunk_index: usize, data: &[u8]) -> Self {
        Message::ChunkData {
            filename: filename.to_string(),
            chunk_index,
            data: codec::encode_chunk(data),
        }
    }

    pub fn error(message: impl Into<String>) -> Self {
        Message::Error {
            message: message.into(),
        }
    }

    /// The wire name of this message, for logs.
    pub fn action(&self) -> &'static str {
        match self {
            Message::Register { .. } => "register",
            Message::GetPeers => "get_peers",
            Message::FileRequest { .. } => "file_request",
            Message::GetChunk { .. } => "get_chunk",
            Message::FileInfo { .. } => "file_info",
            Message::ChunkData { .. } => "chunk_data",
            Message::Error { .. } => "error",
        }
    }

    /// Turns a `file_info` reply back into a manifest; `None` for any other message.
    pub fn into_manifest(self) -> Option<ChunkManifest> {
        match self {
            Message::FileInfo {
                filename,
                chunk_size,
                num_chunks,
                chunk_hashes,
            } => Some(ChunkManifest {
                filename,
                chunk_size,
                num_chunks,
                chunk_hashes,
            }),
            _ => None,
        }
    }
}

impl RegisterAck {
    pub fn registered() -> Self {
        Self {
            status: STATUS_REGISTERED.to_string(),
        }
    }

    pub fn is_registered(&self) -> bool {
        self.status == STATUS_REGISTERED
    }
}

/// Converts a reply for the wire. If it cannot be serialized the failure is
/// logged and the peer gets an internal-error reply instead.
pub fn reply_value<T: Serialize>(reply: &T) -> Value {
    serde_json::to_value(reply).unwrap_or_else(|e| {
        error!("Failed to serialize reply: {}", e);
        json!({"action": "error", "message": INTERNAL_ERROR})
    })
}

/// Decodes the `data` field of a `chunk_data` reply.
pub fn decode_chunk_data(data: &str) -> Result<Vec<u8>> {
    codec::decode_chunk(data)
}
