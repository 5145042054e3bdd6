//! pagefetch — segmented download library
//!
//! `pagefetch` downloads a single remote file over HTTP(S) with multiple
//! concurrent byte-range requests. The destination file is created at its
//! final size up front and partitioned into page-aligned segments; each
//! worker streams its range directly into a sliding mmap window of the
//! file, so downloaded bytes never pass through an intermediate buffer.
//!
//! The library is written so the CLI can reuse the same primitives; the
//! `DownloadManager` is the entry point for embedding.
//!
//! # Example
//!
//! ```no_run
//! use pagefetch::{DownloadManager, DownloadRequest, DownloaderKind};
//! use tokio_util::sync::CancellationToken;
//! # async {
//! let request = DownloadRequest {
//!     kind: DownloaderKind::Http,
//!     url: "https://example.com/file.bin".to_string(),
//!     threads: 5,
//!     window_pages: 256,
//! };
//! let manager = DownloadManager::init(request, ".".as_ref()).await.unwrap();
//! manager.download(CancellationToken::new()).await.unwrap();
//! # };
//! ```

pub mod config;
pub mod manager;
pub mod plan;
pub mod transport;
pub mod utils;
pub mod window;

pub use manager::{DownloadManager, DownloadRequest, PROGRESS_INTERVAL};
pub use plan::{PAGE_SIZE, Segment, split_segments};
pub use transport::{Downloader, DownloaderKind};
pub use window::WindowWriter;
