use log::debug;
use std::io::SeekFrom;
use tokio::io::{AsyncRead, AsyncReadExt, AsyncSeek, AsyncSeekExt};

use crate::storage::HashUtils;
use crate::utils::{P2PError, Result};

pub const CHUNK_SIZE: usize = 64 * 1024; // 64KB chunks

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Chunk {
    pub index: usize,
    pub hash: String,
    pub data: Vec<u8>,
}

impl Chunk {
    pub fn new(index: usize, data: Vec<u8>) -> Self {
        let hash = HashUtils::hash_data(&data);
        Self { index, hash, data }
    }

    pub fn verify(&self) -> bool {
        verify(&self.data, &self.hash)
    }

    pub fn len(&self) -> usize {
        self.data.len()
    }

    pub fn is_empty(&self) -> bool {
        self.data.is_empty()
    }
}

/// Splits `source` into consecutive pieces of at most `chunk_size` bytes, hashing each.
///
/// Only the final piece may be short, and an empty source yields no pieces.
pub async fn split<R>(mut source: R, chunk_size: usize) -> Result<Vec<Chunk>>
where
    R: AsyncRead + Unpin,
{
    check_chunk_size(chunk_size)?;

    let mut chunks = Vec::new();
    loop {
        let data = read_up_to(&mut source, chunk_size).await?;
        if data.is_empty() {
            break;
        }
        chunks.push(Chunk::new(chunks.len(), data));
    }

    debug!("Split source into {} chunks of <= {} bytes", chunks.len(), chunk_size);
    Ok(chunks)
}

/// Same walk as [`split`] but keeps only the hashes, so a manifest never holds the file in memory.
pub async fn hash_chunks<R>(mut source: R, chunk_size: usize) -> Result<Vec<String>>
where
    R: AsyncRead + Unpin,
{
    check_chunk_size(chunk_size)?;

    let mut hashes = Vec::new();
    loop {
        let data = read_up_to(&mut source, chunk_size).await?;
        if data.is_empty() {
            break;
        }
        hashes.push(HashUtils::hash_data(&data));
    }
    Ok(hashes)
}

pub fn verify(chunk_data: &[u8], expected_hash: &str) -> bool {
    HashUtils::verify_data(chunk_data, expected_hash)
}

/// Reads the piece at `index` without resplitting. Past end-of-file this returns
/// whatever remains, possibly nothing.
pub async fn read_chunk_at<F>(file: &mut F, chunk_size: usize, index: usize) -> Result<Vec<u8>>
where
    F: AsyncRead + AsyncSeek + Unpin,
{
    check_chunk_size(chunk_size)?;

    let offset = (index as u64)
        .checked_mul(chunk_size as u64)
        .ok_or_else(|| P2PError::IoError(format!("Chunk offset overflow at index {}", index)))?;

    file.seek(SeekFrom::Start(offset)).await?;
    read_up_to(file, chunk_size).await
}

/// Number of pieces a file of `size` bytes splits into.
pub fn chunk_count(size: u64, chunk_size: usize) -> usize {
    size.div_ceil(chunk_size as u64) as usize
}

fn check_chunk_size(chunk_size: usize) -> Result<()> {
    if chunk_size == 0 {
        return Err(P2PError::ConfigError("chunk size must be non-zero".to_string()));
    }
    Ok(())
}

// A single read() may come back short, so keep reading until the piece is full or EOF.
async fn read_up_to<R>(source: &mut R, limit: usize) -> Result<Vec<u8>>
where
    R: AsyncRead + Unpin,
{
    let mut buffer = Vec::with_capacity(limit);
    (&mut *source)
        .take(limit as u64)
        .read_to_end(&mut buffer)
        .await?;
    Ok(buffer)
}
