use log::{debug, info, warn};
use std::collections::HashMap;
use std::path::{Component, Path, PathBuf};
use tokio::fs as async_fs;
use tokio::io::AsyncWriteExt;
use tokio::sync::RwLock;

use crate::storage::{ChunkManifest, chunk};
use crate::utils::{P2PError, Result};

/// What a node remembers about a file it chose to share.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SharedFileSummary {
    pub num_chunks: usize,
    pub chunk_hashes: Vec<String>,
}

/// Owns the shared-files root and the index of files published from it.
///
/// The index is only a presence check; manifests served to other peers are
/// always recomputed from disk.
pub struct FileManager {
    shared_dir: PathBuf,
    chunk_size: usize,
    shared: RwLock<HashMap<String, SharedFileSummary>>,
}

impl FileManager {
    pub async fn new(shared_dir: PathBuf, chunk_size: usize) -> Result<Self> {
        if chunk_size == 0 {
            return Err(P2PError::ConfigError("chunk size must be non-zero".to_string()));
        }

        async_fs::create_dir_all(&shared_dir)
            .await
            .map_err(|e| P2PError::IoError(format!("Failed to create directory: {}", e)))?;

        Ok(Self {
            shared_dir,
            chunk_size,
            shared: RwLock::new(HashMap::new()),
        })
    }

    pub fn shared_dir(&self) -> &Path {
        &self.shared_dir
    }

    pub fn chunk_size(&self) -> usize {
        self.chunk_size
    }

    /// Maps a wire filename onto the shared root. Only a single plain path
    /// component is accepted, so requests cannot escape the root.
    pub fn resolve(&self, filename: &str) -> Option<PathBuf> {
        let mut components = Path::new(filename).components();
        match (components.next(), components.next()) {
            (Some(Component::Normal(name)), None) if name == filename => {
                Some(self.shared_dir.join(name))
            }
            _ => None,
        }
    }

    /// Hashes a file already present under the shared root and adds it to the index.
    pub async fn publish(&self, filename: &str) -> Result<SharedFileSummary> {
        let path = self.existing_path(filename).await?;

        let file = async_fs::File::open(&path)
            .await
            .map_err(|e| P2PError::IoError(format!("Failed to open file: {}", e)))?;
        let chunk_hashes = chunk::hash_chunks(file, self.chunk_size).await?;

        let summary = SharedFileSummary {
            num_chunks: chunk_hashes.len(),
            chunk_hashes,
        };

        self.shared
            .write()
            .await
            .insert(filename.to_string(), summary.clone());

        info!(
            "File '{}' is now shared ({} chunks)",
            filename, summary.num_chunks
        );
        Ok(summary)
    }

    pub async fn is_shared(&self, filename: &str) -> bool {
        self.shared.read().await.contains_key(filename)
    }

    /// Builds a fresh manifest from the current bytes on disk.
    ///
    /// Fails with `FileNotFound` if the file was never shared or has since
    /// disappeared from the shared root.
    pub async fn manifest(&self, filename: &str) -> Result<ChunkManifest> {
        if !self.is_shared(filename).await {
            return Err(P2PError::FileNotFound(filename.to_string()));
        }

        let path = self.existing_path(filename).await.inspect_err(|_| {
            warn!("Shared file '{}' is missing from {:?}", filename, self.shared_dir);
        })?;

        let file = async_fs::File::open(&path)
            .await
            .map_err(|e| P2PError::IoError(format!("Failed to open file: {}", e)))?;
        let chunk_hashes = chunk::hash_chunks(file, self.chunk_size).await?;

        debug!("Built manifest for '{}': {} chunks", filename, chunk_hashes.len());
        Ok(ChunkManifest::new(
            filename.to_string(),
            self.chunk_size,
            chunk_hashes,
        ))
    }

    /// Reads one chunk of a file under the shared root.
    pub async fn read_chunk(&self, filename: &str, index: usize) -> Result<Vec<u8>> {
        let path = self.existing_path(filename).await?;

        let mut file = async_fs::File::open(&path)
            .await
            .map_err(|e| P2PError::IoError(format!("Failed to open file: {}", e)))?;
        let size = file.metadata().await?.len();

        if index >= chunk::chunk_count(size, self.chunk_size) {
            return Err(P2PError::ChunkOutOfRange {
                filename: filename.to_string(),
                index,
            });
        }

        chunk::read_chunk_at(&mut file, self.chunk_size, index).await
    }

    pub async fn list_shared(&self) -> Vec<(String, SharedFileSummary)> {
        let shared = self.shared.read().await;
        let mut files: Vec<_> = shared
            .iter()
            .map(|(name, summary)| (name.clone(), summary.clone()))
            .collect();
        files.sort_by(|a, b| a.0.cmp(&b.0));
        files
    }

    /// Writes a fully assembled download, replacing any existing file at `output_path`.
    ///
    /// The bytes go to a temporary file next to the destination which is renamed
    /// into place once complete. A failed or abandoned write leaves the
    /// destination untouched and removes the temporary file.
    pub async fn reconstruct_file(&self, data: &[u8], output_path: &Path) -> Result<()> {
        let dir = match output_path.parent() {
            Some(parent) if !parent.as_os_str().is_empty() => parent,
            _ => Path::new("."),
        };

        let (std_file, temp_path) = tempfile::Builder::new()
            .prefix(".mini-share-")
            .suffix(".part")
            .tempfile_in(dir)
            .map_err(|e| P2PError::IoError(format!("Failed to create temp file: {}", e)))?
            .into_parts();
        let mut file = async_fs::File::from_std(std_file);

        file.write_all(data)
            .await
            .map_err(|e| P2PError::IoError(format!("Failed to write file: {}", e)))?;

        file.flush()
            .await
            .map_err(|e| P2PError::IoError(format!("Failed to flush file: {}", e)))?;
        file.sync_all()
            .await
            .map_err(|e| P2PError::IoError(format!("Failed to sync file: {}", e)))?;
        drop(file);

        temp_path.persist(output_path).map_err(|e| {
            P2PError::IoError(format!("Failed to move file into place: {}", e.error))
        })?;

        info!("File reconstructed: {:?} ({} bytes)", output_path, data.len());
        Ok(())
    }

    async fn existing_path(&self, filename: &str) -> Result<PathBuf> {
        let path = self
            .resolve(filename)
            .ok_or_else(|| P2PError::FileNotFound(filename.to_string()))?;

        match async_fs::metadata(&path).await {
            Ok(meta) if meta.is_file() => Ok(path),
            _ => Err(P2PError::FileNotFound(filename.to_string())),
        }
    }
}
