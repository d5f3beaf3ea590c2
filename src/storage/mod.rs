pub mod chunk;
pub mod file_manager;
pub mod hash;
pub mod manifest;

pub use chunk::{CHUNK_SIZE, Chunk, hash_chunks, read_chunk_at, split, verify};
pub use file_manager::{FileManager, SharedFileSummary};
pub use hash::HashUtils;
pub use manifest::ChunkManifest;
