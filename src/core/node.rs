use log::{info, warn};
use std::future::Future;
use std::net::SocketAddr;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tokio::sync::watch;

use crate::core::{Config, PeerRecord};
use crate::network::{RegistryClient, Transport, messaging};
use crate::storage::{FileManager, SharedFileSummary};
use crate::transfer::{
    DownloadStrategy, SequentialDownloader, TransferStatus, TransferTracker, Uploader,
};
use crate::utils::{P2PError, Result};

/// Result of a successful `fetch`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FetchOutcome {
    pub filename: String,
    pub output: PathBuf,
    pub bytes: usize,
}

/// A participant: serves its shared files to others and downloads from them.
pub struct Node {
    pub config: Config,
    file_manager: Arc<FileManager>,
    registry: RegistryClient,
    uploader: Arc<Uploader>,
    downloader: Arc<dyn DownloadStrategy>,
    transfers: TransferTracker,
    shutdown_tx: watch::Sender<bool>,
}

impl Node {
    pub async fn new(config: Config) -> Result<Self> {
        config.validate()?;

        let file_manager =
            Arc::new(FileManager::new(config.shared_dir.clone(), config.chunk_size).await?);
        let registry = RegistryClient::new(config.registry_addr.clone(), config.io_timeout());
        let uploader = Arc::new(Uploader::new(file_manager.clone()));
        let transfers = TransferTracker::new();
        let downloader = Arc::new(SequentialDownloader::new(
            config.io_timeout(),
            config.max_chunk_attempts,
        ));
        let (shutdown_tx, _) = watch::channel(false);

        Ok(Self {
            config,
            file_manager,
            registry,
            uploader,
            downloader,
            transfers,
            shutdown_tx,
        })
    }

    /// Swaps the download algorithm, keeping manifests and verification unchanged.
    pub fn with_downloader(mut self, downloader: Arc<dyn DownloadStrategy>) -> Self {
        self.downloader = downloader;
        self
    }

    pub fn shared_dir(&self) -> &Path {
        self.file_manager.shared_dir()
    }

    /// Where a download of `filename` lands inside the shared root. Names that
    /// are not a single plain path component are refused.
    pub fn download_path(&self, filename: &str) -> Result<PathBuf> {
        self.file_manager
            .resolve(filename)
            .ok_or_else(|| P2PError::InvalidFileName(filename.to_string()))
    }

    /// Binds the server role and serves in the background until `shutdown`.
    /// Returns the bound address, which carries the real port when configured with 0.
    pub async fn start_server(&self) -> Result<SocketAddr> {
        let listener = Transport::listen(&self.config.bind_addr()).await?;
        let addr = listener.local_addr()?;

        let mut shutdown_rx = self.shutdown_tx.subscribe();
        let shutdown = async move {
            let _ = shutdown_rx.wait_for(|stop| *stop).await;
        };

        info!(
            "Peer serving '{}' on {}",
            self.config.shared_dir.display(),
            addr
        );
        tokio::spawn(messaging::serve(
            listener,
            self.uploader.clone(),
            self.config.io_timeout(),
            shutdown,
        ));

        Ok(addr)
    }

    /// Announces this node to the registry as `advertise_address:port`.
    pub async fn register(&self, port: u16) -> Result<PeerRecord> {
        let record = PeerRecord::new(self.config.advertise_address.clone(), port);
        self.registry.register(&record).await?;
        Ok(record)
    }

    pub async fn peers(&self) -> Result<Vec<PeerRecord>> {
        self.registry.get_peers().await
    }

    pub async fn publish(&self, filename: &str) -> Result<SharedFileSummary> {
        self.file_manager.publish(filename).await.inspect_err(|e| {
            warn!("Could not share '{}': {}", filename, e);
        })
    }

    pub async fn fetch(&self, filename: &str, output: &Path) -> Result<FetchOutcome> {
        self.fetch_until(filename, output, std::future::pending())
            .await
    }

    /// Like `fetch`, but gives up as soon as `cancel` resolves. Nothing is
    /// written unless every chunk arrived and verified.
    pub async fn fetch_until<C>(
        &self,
        filename: &str,
        output: &Path,
        cancel: C,
    ) -> Result<FetchOutcome>
    where
        C: Future<Output = ()>,
    {
        let progress = self.transfers.start(filename, output).await;
        info!(
            "Starting download {} of '{}' -> {:?}",
            progress.id(),
            filename,
            output
        );

        let download = async {
            let peers = self.registry.get_peers().await?;
            if peers.is_empty() {
                return Err(P2PError::NoPeersAvailable);
            }
            self.downloader.download(filename, &peers, &progress).await
        };

        let downloaded = tokio::select! {
            result = download => result,
            _ = cancel => Err(P2PError::Cancelled(filename.to_string())),
        };

        let result = match downloaded {
            Ok(data) => self
                .file_manager
                .reconstruct_file(&data, output)
                .await
                .map(|_| FetchOutcome {
                    filename: filename.to_string(),
                    output: output.to_path_buf(),
                    bytes: data.len(),
                }),
            Err(e) => Err(e),
        };

        match &result {
            Ok(outcome) => {
                progress.completed().await;
                info!(
                    "File '{}' downloaded successfully ({} bytes)",
                    filename, outcome.bytes
                );
            }
            Err(e) => {
                progress.failed(e.to_string()).await;
                warn!("Download of '{}' failed: {}", filename, e);
            }
        }
        result
    }

    pub async fn shared_files(&self) -> Vec<(String, usize)> {
        self.file_manager
            .list_shared()
            .await
            .into_iter()
            .map(|(name, summary)| (name, summary.num_chunks))
            .collect()
    }

    pub async fn transfers(&self) -> Vec<TransferStatus> {
        self.transfers.snapshot().await
    }

    /// Stops the server role. Downloads already running are unaffected.
    pub fn shutdown(&self) {
        self.shutdown_tx.send_replace(true);
    }
}

impl Drop for Node {
    fn drop(&mut self) {
        self.shutdown();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::RegistryConfig;
    use crate::network::RegistryServer;
    use crate::transfer::{TransferProgress, TransferState};
    use async_trait::async_trait;
    use tempfile::tempdir;
    use tokio::time::Duration;

    async fn start_registry() -> String {
        let config = RegistryConfig {
            bind_address: "127.0.0.1".to_string(),
            port: 0,
            ..RegistryConfig::default()
        };
        let server = RegistryServer::bind(&config).await.unwrap();
        let addr = server.local_addr().unwrap().to_string();
        tokio::spawn(server.run());
        addr
    }

    fn config_for(dir: &Path, registry_addr: String) -> Config {
        Config {
            bind_address: "127.0.0.1".to_string(),
            port: 0,
            shared_dir: dir.to_path_buf(),
            registry_addr,
            chunk_size: 4,
            io_timeout_secs: 5,
            ..Config::default()
        }
    }

    struct StalledDownloader;

    #[async_trait]
    impl DownloadStrategy for StalledDownloader {
        async fn download(
            &self,
            _filename: &str,
            _peers: &[PeerRecord],
            _progress: &TransferProgress,
        ) -> Result<Vec<u8>> {
            std::future::pending().await
        }
    }

    #[tokio::test]
    async fn test_fetch_with_empty_registry_fails() {
        let dir = tempdir().unwrap();
        let node = Node::new(config_for(dir.path(), start_registry().await))
            .await
            .unwrap();
        let output = dir.path().join("out.txt");

        let result = node.fetch("a.txt", &output).await;
        assert!(matches!(result, Err(P2PError::NoPeersAvailable)));
        assert!(!output.exists());

        let status = &node.transfers().await[0];
        assert!(matches!(status.state, TransferState::Failed { .. }));
    }

    #[tokio::test]
    async fn test_publish_missing_file_reports() {
        let dir = tempdir().unwrap();
        let node = Node::new(config_for(dir.path(), start_registry().await))
            .await
            .unwrap();

        assert!(matches!(
            node.publish("missing.txt").await,
            Err(P2PError::FileNotFound(_))
        ));
        assert!(node.shared_files().await.is_empty());
    }

    #[tokio::test]
    async fn test_fetch_can_be_cancelled() {
        let registry_addr = start_registry().await;
        let dir = tempdir().unwrap();
        let node = Node::new(config_for(dir.path(), registry_addr))
            .await
            .unwrap()
            .with_downloader(Arc::new(StalledDownloader));

        // the registry must list someone or fetch fails before downloading
        node.register(4242).await.unwrap();

        let output = dir.path().join("out.txt");
        let result = node
            .fetch_until(
                "a.txt",
                &output,
                tokio::time::sleep(Duration::from_millis(100)),
            )
            .await;

        assert!(matches!(result, Err(P2PError::Cancelled(_))));
        assert!(!output.exists());
    }

    #[tokio::test]
    async fn test_download_path_stays_inside_shared_dir() {
        let dir = tempdir().unwrap();
        let node = Node::new(config_for(dir.path(), "127.0.0.1:1".to_string()))
            .await
            .unwrap();

        assert_eq!(
            node.download_path("a.txt").unwrap(),
            dir.path().join("a.txt")
        );
        for name in ["../x", "/etc/passwd", "sub/a.txt", ".."] {
            assert!(matches!(
                node.download_path(name),
                Err(P2PError::InvalidFileName(_))
            ));
        }
    }

    #[tokio::test]
    async fn test_invalid_config_is_rejected() {
        let dir = tempdir().unwrap();
        let config = Config {
            max_chunk_attempts: 0,
            ..config_for(dir.path(), "127.0.0.1:1".to_string())
        };
        assert!(matches!(
            Node::new(config).await,
            Err(P2PError::ConfigError(_))
        ));
    }
}
