//! Download coordination: destination setup, worker fan-out and progress.

use std::fs::{File, OpenOptions};
use std::os::unix::fs::OpenOptionsExt;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};
use std::time::Duration;

use anyhow::{Context, Result, anyhow};
use indicatif::{ProgressBar, ProgressStyle};
use tokio::task::JoinHandle;
use tokio::time::timeout;
use tokio_util::sync::CancellationToken;

use crate::plan::split_segments;
use crate::transport::{Downloader, DownloaderKind};
use crate::utils::filename_from_url;
use crate::window::WindowWriter;

/// Refresh budget of one progress-loop pass, split across the outstanding
/// worker handles as the per-handle poll timeout.
pub const PROGRESS_INTERVAL: Duration = Duration::from_millis(3000);

/// Immutable description of one download.
#[derive(Debug, Clone)]
pub struct DownloadRequest {
    pub kind: DownloaderKind,
    pub url: String,
    /// Requested worker count. Clamped to 1 when the server lacks range
    /// support, and to the page count for small files.
    pub threads: usize,
    /// Pages mapped per worker window.
    pub window_pages: u64,
}

/// Coordinates one segmented download into a pre-sized destination file.
///
/// The destination fd is shared with all workers for mapping; segments are
/// byte-disjoint, so the workers' windows never overlap and no locking is
/// involved anywhere on the write path.
pub struct DownloadManager {
    transport: Downloader,
    file: Arc<File>,
    file_size: u64,
    output_path: PathBuf,
    threads: usize,
    window_pages: u64,
}

impl DownloadManager {
    /// Probes the resource and prepares the destination file.
    ///
    /// On failure the coordinator is not runnable and a partially created
    /// destination file may be left on disk; nothing is rolled back.
    pub async fn init(request: DownloadRequest, save_dir: &Path) -> Result<Self> {
        let transport = Downloader::connect(request.kind, &request.url).await?;

        let filename = filename_from_url(&request.url);
        println!("filename: {filename}");

        let mut threads = request.threads;
        if !transport.range_supported() {
            println!("server does not accept range requests, adjusting to a single worker");
            threads = 1;
        }

        let file_size = transport.file_size();
        println!("file size: {file_size} bytes");

        let output_path = save_dir.join(filename);
        let file = create_sized_file(&output_path, file_size)
            .with_context(|| format!("failed to create {}", output_path.display()))?;

        Ok(Self {
            transport,
            file: Arc::new(file),
            file_size,
            output_path,
            threads,
            window_pages: request.window_pages,
        })
    }

    pub fn file_size(&self) -> u64 {
        self.file_size
    }

    pub fn output_path(&self) -> &Path {
        &self.output_path
    }

    /// Runs the download to completion.
    ///
    /// Spawns one ranged-GET worker per segment and drives the progress bar
    /// while harvesting worker results. The first harvested failure cancels
    /// `cancel` so the surviving transfers stop at their next chunk, and
    /// aborts the download; cancelling the token from outside (Ctrl-C) has
    /// the same effect. No segment is retried.
    pub async fn download(&self, cancel: CancellationToken) -> Result<()> {
        if self.file_size == 0 {
            println!("empty resource, nothing to transfer");
            return Ok(());
        }

        let segments = split_segments(self.file_size, self.threads);
        let counters: Vec<Arc<AtomicU64>> = segments
            .iter()
            .map(|_| Arc::new(AtomicU64::new(0)))
            .collect();

        let mut pending: Vec<JoinHandle<Result<WindowWriter>>> =
            Vec::with_capacity(segments.len());
        for (segment, counter) in segments.iter().zip(&counters) {
            let transport = self.transport.clone();
            let mut writer =
                WindowWriter::new(self.file.clone(), segment, self.window_pages, counter.clone());
            let token = cancel.clone();
            let segment = *segment;
            pending.push(tokio::spawn(async move {
                // The sink can only answer the transport with a bool, so the
                // write error is parked here and rethrown over the generic
                // "aborted by sink" failure.
                let mut sink_error = None;
                let transfer = transport
                    .fetch_range(segment.start, segment.end, |chunk| {
                        if token.is_cancelled() {
                            return false;
                        }
                        match writer.write(chunk) {
                            Ok(()) => true,
                            Err(err) => {
                                sink_error = Some(err);
                                false
                            }
                        }
                    })
                    .await;
                match sink_error {
                    Some(err) => Err(err),
                    None => transfer.map(|()| writer),
                }
            }));
        }

        let bar = ProgressBar::new(self.file_size).with_style(progress_style()?);
        let mut finished = Vec::with_capacity(pending.len());
        while !pending.is_empty() {
            let mut wait = PROGRESS_INTERVAL / pending.len() as u32;
            let mut i = 0;
            while i < pending.len() {
                // Racy by design: the counters are relaxed and the sum is a
                // best-effort estimate for display only.
                let total: u64 = counters.iter().map(|c| c.load(Ordering::Relaxed)).sum();
                bar.set_position(total);

                let Ok(joined) = timeout(wait, &mut pending[i]).await else {
                    i += 1;
                    continue;
                };
                match joined {
                    Ok(Ok(writer)) => {
                        finished.push(writer);
                        pending.swap_remove(i);
                        if !pending.is_empty() {
                            wait = PROGRESS_INTERVAL / pending.len() as u32;
                        }
                    }
                    Ok(Err(err)) => {
                        cancel.cancel();
                        bar.abandon();
                        return Err(err);
                    }
                    Err(err) => {
                        cancel.cancel();
                        bar.abandon();
                        return Err(anyhow!(err).context("download worker died"));
                    }
                }
            }
        }

        release_all(finished)?;
        bar.set_position(self.file_size);
        bar.finish();
        println!("saved to {}", self.output_path.display());
        Ok(())
    }
}

/// Flushes and unmaps every worker window, attempting all of them even when
/// one fails.
fn release_all(writers: Vec<WindowWriter>) -> Result<()> {
    let mut failure = None;
    for writer in writers {
        if let Err(err) = writer.release() {
            eprintln!("window release failed: {err:#}");
            failure = Some(err);
        }
    }
    match failure {
        Some(err) => Err(err),
        None => Ok(()),
    }
}

fn progress_style() -> Result<ProgressStyle> {
    Ok(
        ProgressStyle::with_template("[{bar:100}] {percent:>3}% {binary_bytes_per_sec}")?
            .progress_chars("=> "),
    )
}

/// Creates the destination file truncated, mode 0o777, and reserves its
/// final length up front so workers can map their windows anywhere in it.
fn create_sized_file(path: &Path, len: u64) -> Result<File> {
    let file = OpenOptions::new()
        .read(true)
        .write(true)
        .create(true)
        .truncate(true)
        .mode(0o777)
        .open(path)?;
    file.set_len(len)?;
    Ok(file)
}
