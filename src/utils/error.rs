use thiserror::Error;

pub type Result<T> = std::result::Result<T, P2PError>;

#[derive(Error, Debug)]
pub enum P2PError {
    #[error("I/O error: {0}")]
    IoError(String),

    #[error("Network error: {0}")]
    NetworkError(String),

    #[error("Connection failed: {0}")]
    ConnectionFailed(String),

    #[error("Timed out: {0}")]
    Timeout(String),

    #[error("Serialization error: {0}")]
    SerializationError(String),

    #[error("Encoding error: {0}")]
    EncodingError(String),

    #[error("Message too large: {0} bytes")]
    MessageTooLarge(usize),

    #[error("File not found: {0}")]
    FileNotFound(String),

    #[error("Invalid file name: {0}")]
    InvalidFileName(String),

    #[error("Chunk index {index} out of range for {filename}")]
    ChunkOutOfRange { filename: String, index: usize },

    #[error("Chunk verification failed: {0}")]
    ChunkVerificationFailed(String),

    #[error("Invalid response: {0}")]
    InvalidResponse(String),

    #[error("Remote error: {0}")]
    RemoteError(String),

    #[error("No response from {0}")]
    NoResponse(String),

    #[error("No peers available")]
    NoPeersAvailable,

    #[error("Download incomplete: {0}")]
    IncompleteDownload(String),

    #[error("Download cancelled: {0}")]
    Cancelled(String),

    #[error("Configuration error: {0}")]
    ConfigError(String),
}

impl P2PError {
    /// True for failures caused by bytes that arrived but did not hash to the expected value.
    pub fn is_integrity_failure(&self) -> bool {
        matches!(self, P2PError::ChunkVerificationFailed(_))
    }
}

impl From<std::io::Error> for P2PError {
    fn from(err: std::io::Error) -> Self {
        P2PError::IoError(err.to_string())
    }
}

impl From<serde_json::Error> for P2PError {
    fn from(err: serde_json::Error) -> Self {
        P2PError::SerializationError(err.to_string())
    }
}

impl From<base64::DecodeError> for P2PError {
    fn from(err: base64::DecodeError) -> Self {
        P2PError::EncodingError(err.to_string())
    }
}
