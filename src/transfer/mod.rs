pub mod downloader;
pub mod progress;
pub mod uploader;

pub use downloader::{DownloadStrategy, SequentialDownloader};
pub use progress::{TransferId, TransferProgress, TransferState, TransferStatus, TransferTracker};
pub use uploader::Uploader;
