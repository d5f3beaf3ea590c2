use std::collections::HashMap;
use std::fmt;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};
use tokio::sync::RwLock;

use crate::core::PeerRecord;

/// Identifies one `fetch` call. Two fetches of the same file get distinct ids.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct TransferId(u64);

impl fmt::Display for TransferId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "#{}", self.0)
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TransferState {
    Locating,
    Downloading { peer: PeerRecord },
    Completed,
    Failed { reason: String },
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TransferStatus {
    pub id: TransferId,
    pub filename: String,
    pub output: PathBuf,
    pub total_chunks: usize,
    pub completed_chunks: usize,
    pub bytes_downloaded: u64,
    pub state: TransferState,
}

impl fmt::Display for TransferStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} {}: ", self.id, self.filename)?;
        match &self.state {
            TransferState::Locating => write!(f, "locating peers"),
            TransferState::Downloading { peer } => write!(
                f,
                "{}/{} chunks ({} bytes) from {}",
                self.completed_chunks, self.total_chunks, self.bytes_downloaded, peer
            ),
            TransferState::Completed => write!(
                f,
                "completed ({} bytes) -> {}",
                self.bytes_downloaded,
                self.output.display()
            ),
            TransferState::Failed { reason } => write!(f, "failed ({})", reason),
        }
    }
}

/// In-memory status of every download this node has attempted, one entry per `fetch`.
#[derive(Clone, Default)]
pub struct TransferTracker {
    transfers: Arc<RwLock<HashMap<TransferId, TransferStatus>>>,
    next_id: Arc<AtomicU64>,
}

impl TransferTracker {
    pub fn new() -> Self {
        Self::default()
    }

    /// Opens a new entry and returns the handle that updates it.
    pub async fn start(&self, filename: &str, output: &Path) -> TransferProgress {
        let id = TransferId(self.next_id.fetch_add(1, Ordering::Relaxed) + 1);
        self.transfers.write().await.insert(
            id,
            TransferStatus {
                id,
                filename: filename.to_string(),
                output: output.to_path_buf(),
                total_chunks: 0,
                completed_chunks: 0,
                bytes_downloaded: 0,
                state: TransferState::Locating,
            },
        );

        TransferProgress {
            tracker: self.clone(),
            id,
        }
    }

    pub async fn get(&self, id: TransferId) -> Option<TransferStatus> {
        self.transfers.read().await.get(&id).cloned()
    }

    /// Every entry, oldest first.
    pub async fn snapshot(&self) -> Vec<TransferStatus> {
        let mut all: Vec<_> = self.transfers.read().await.values().cloned().collect();
        all.sort_by_key(|status| status.id);
        all
    }

    async fn update<F>(&self, id: TransferId, apply: F)
    where
        F: FnOnce(&mut TransferStatus),
    {
        if let Some(status) = self.transfers.write().await.get_mut(&id) {
            apply(status);
        }
    }
}

/// Handle for the entry of a single transfer.
#[derive(Clone)]
pub struct TransferProgress {
    tracker: TransferTracker,
    id: TransferId,
}

impl TransferProgress {
    pub fn id(&self) -> TransferId {
        self.id
    }

    pub async fn downloading(&self, peer: &PeerRecord, total_chunks: usize) {
        self.tracker
            .update(self.id, |status| {
                status.total_chunks = total_chunks;
                status.completed_chunks = 0;
                status.bytes_downloaded = 0;
                status.state = TransferState::Downloading { peer: peer.clone() };
            })
            .await;
    }

    pub async fn chunk_completed(&self, bytes: usize) {
        self.tracker
            .update(self.id, |status| {
                status.completed_chunks += 1;
                status.bytes_downloaded += bytes as u64;
            })
            .await;
    }

    pub async fn completed(&self) {
        self.tracker
            .update(self.id, |status| status.state = TransferState::Completed)
            .await;
    }

    pub async fn failed(&self, reason: String) {
        self.tracker
            .update(self.id, |status| {
                status.state = TransferState::Failed { reason }
            })
            .await;
    }

    pub async fn status(&self) -> Option<TransferStatus> {
        self.tracker.get(self.id).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_lifecycle() {
        let tracker = TransferTracker::new();
        let peer = PeerRecord::new("127.0.0.1", 10001);

        let progress = tracker.start("a.txt", Path::new("out/a.txt")).await;
        assert_eq!(progress.status().await.unwrap().state, TransferState::Locating);

        progress.downloading(&peer, 2).await;
        progress.chunk_completed(4).await;
        let status = progress.status().await.unwrap();
        assert_eq!(status.completed_chunks, 1);
        assert_eq!(status.bytes_downloaded, 4);
        assert_eq!(
            status.to_string(),
            "#1 a.txt: 1/2 chunks (4 bytes) from 127.0.0.1:10001"
        );

        progress.chunk_completed(3).await;
        progress.completed().await;
        let status = tracker.get(progress.id()).await.unwrap();
        assert_eq!(status.state, TransferState::Completed);
        assert_eq!(status.to_string(), "#1 a.txt: completed (7 bytes) -> out/a.txt");
    }

    #[tokio::test]
    async fn test_same_file_to_two_outputs_is_tracked_separately() {
        let tracker = TransferTracker::new();
        let first_peer = PeerRecord::new("127.0.0.1", 10001);
        let second_peer = PeerRecord::new("127.0.0.1", 10002);

        let first = tracker.start("a.txt", Path::new("one/a.txt")).await;
        let second = tracker.start("a.txt", Path::new("two/a.txt")).await;
        assert_ne!(first.id(), second.id());

        first.downloading(&first_peer, 2).await;
        first.chunk_completed(4).await;
        first.chunk_completed(3).await;
        second.downloading(&second_peer, 2).await;
        second.chunk_completed(4).await;
        first.completed().await;

        let first = first.status().await.unwrap();
        let second = second.status().await.unwrap();
        assert_eq!(first.completed_chunks, 2);
        assert_eq!(first.state, TransferState::Completed);
        assert_eq!(first.output, PathBuf::from("one/a.txt"));
        assert_eq!(second.completed_chunks, 1);
        assert!(second.completed_chunks <= second.total_chunks);
        assert_eq!(second.state, TransferState::Downloading { peer: second_peer });
        assert_eq!(tracker.snapshot().await.len(), 2);
    }

    #[tokio::test]
    async fn test_snapshot_is_in_start_order() {
        let tracker = TransferTracker::new();
        tracker.start("b", Path::new("b")).await;
        let a = tracker.start("a", Path::new("a")).await;
        a.failed("no peers".to_string()).await;

        let names: Vec<_> = tracker
            .snapshot()
            .await
            .into_iter()
            .map(|s| s.filename)
            .collect();
        assert_eq!(names, vec!["b", "a"]);
    }
}
