use serde::{Deserialize, Serialize};

use crate::storage::HashUtils;
use crate::utils::{P2PError, Result};

/// How a file is divided: one hash per chunk, in file order.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ChunkManifest {
    pub filename: String,
    pub chunk_size: usize,
    pub num_chunks: usize,
    pub chunk_hashes: Vec<String>,
}

impl ChunkManifest {
    pub fn new(filename: String, chunk_size: usize, chunk_hashes: Vec<String>) -> Self {
        Self {
            filename,
            chunk_size,
            num_chunks: chunk_hashes.len(),
            chunk_hashes,
        }
    }

    pub fn hash_at(&self, index: usize) -> Option<&str> {
        self.chunk_hashes.get(index).map(String::as_str)
    }

    /// Checks a manifest received from a remote peer before any chunk is requested.
    pub fn validate(&self) -> Result<()> {
        if self.chunk_size == 0 {
            return Err(P2PError::InvalidResponse(format!(
                "manifest for {} has zero chunk size",
                self.filename
            )));
        }
        if self.num_chunks != self.chunk_hashes.len() {
            return Err(P2PError::InvalidResponse(format!(
                "manifest for {} lists {} chunks but {} hashes",
                self.filename,
                self.num_chunks,
                self.chunk_hashes.len()
            )));
        }
        if let Some(bad) = self
            .chunk_hashes
            .iter()
            .position(|h| !HashUtils::is_well_formed(h))
        {
            return Err(P2PError::InvalidResponse(format!(
                "manifest for {} has a malformed hash at index {}",
                self.filename, bad
            )));
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sample() -> ChunkManifest {
        ChunkManifest::new(
            "a.txt".to_string(),
            4,
            vec![HashUtils::hash_data(b"ABCD"), HashUtils::hash_data(b"EFG")],
        )
    }

    #[test]
    fn test_new_counts_hashes() {
        let manifest = sample();
        assert_eq!(manifest.num_chunks, 2);
        assert_eq!(manifest.hash_at(1), Some(HashUtils::hash_data(b"EFG").as_str()));
        assert_eq!(manifest.hash_at(2), None);
        assert!(manifest.validate().is_ok());
    }

    #[test]
    fn test_validate_rejects_count_mismatch() {
        let mut manifest = sample();
        manifest.num_chunks = 3;
        assert!(matches!(manifest.validate(), Err(P2PError::InvalidResponse(_))));
    }

    #[test]
    fn test_validate_rejects_malformed_hash() {
        let mut manifest = sample();
        manifest.chunk_hashes[0] = "not-a-hash".to_string();
        assert!(manifest.validate().is_err());
    }

    #[test]
    fn test_empty_manifest_is_valid() {
        let manifest = ChunkManifest::new("empty".to_string(), 4, Vec::new());
        assert_eq!(manifest.num_chunks, 0);
        assert!(manifest.validate().is_ok());
    }
}
