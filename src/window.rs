//! Per-worker mmap windows over the destination file.
//!
//! Each worker owns a `WindowWriter` that keeps a sliding writable view of
//! up to the configured page budget mapped at its current position inside
//! its segment. Incoming bytes are copied straight into the mapping; when a
//! window fills up it is flushed, unmapped and the cursor slides forward.

use std::fs::File;
use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};

use anyhow::{Context, Result, bail, ensure};
use memmap2::{MmapMut, MmapOptions};

use crate::plan::{PAGE_SIZE, Segment};

/// Sliding writable mmap cursor over one worker's segment.
///
/// Segments of different workers are byte-disjoint, so writers never need
/// to coordinate; each one maps and mutates only its own region of the
/// shared destination file.
pub struct WindowWriter {
    file: Arc<File>,
    /// Currently mapped view, `None` before the first byte arrives and
    /// after release.
    window: Option<MmapMut>,
    /// Write offset into the current window.
    window_pos: usize,
    /// Next page of the destination file to map.
    cursor_page: u64,
    /// Pages of the segment not yet mapped.
    remaining_pages: u64,
    /// Window budget: maximum pages mapped at once.
    window_pages: u64,
    /// Bytes accepted so far, read by the progress loop without
    /// synchronization.
    downloaded: Arc<AtomicU64>,
}

impl WindowWriter {
    pub fn new(
        file: Arc<File>,
        segment: &Segment,
        window_pages: u64,
        downloaded: Arc<AtomicU64>,
    ) -> Self {
        Self {
            file,
            window: None,
            window_pos: 0,
            cursor_page: segment.first_page,
            remaining_pages: segment.page_count,
            window_pages: window_pages.max(1),
            downloaded,
        }
    }

    /// Slides the window forward: flushes and unmaps the current view, then
    /// maps the next `min(window_pages, remaining_pages)` pages.
    ///
    /// Running out of pages while data keeps arriving means the segment
    /// arithmetic and the transferred byte count disagree, so that case is
    /// an error rather than a silent extension.
    fn remap(&mut self) -> Result<()> {
        if let Some(window) = self.window.take() {
            window.flush().context("failed to flush window to disk")?;
        }
        ensure!(
            self.remaining_pages > 0,
            "no pages left to map at page {}",
            self.cursor_page
        );

        let to_map = self.remaining_pages.min(self.window_pages);
        let window = unsafe {
            MmapOptions::new()
                .offset(self.cursor_page * PAGE_SIZE)
                .len((to_map * PAGE_SIZE) as usize)
                .map_mut(&*self.file)
        }
        .with_context(|| format!("failed to map {} pages at page {}", to_map, self.cursor_page))?;

        self.window = Some(window);
        self.window_pos = 0;
        self.cursor_page += to_map;
        self.remaining_pages -= to_map;
        Ok(())
    }

    /// Copies a block of downloaded bytes into the segment, remapping the
    /// window as it fills.
    ///
    /// This is the body of the transport sink; the full incoming length is
    /// added to the progress counter once the copy has been placed.
    pub fn write(&mut self, data: &[u8]) -> Result<()> {
        let mut rest = data;
        while !rest.is_empty() {
            let exhausted = self
                .window
                .as_ref()
                .map_or(true, |window| self.window_pos == window.len());
            if exhausted {
                self.remap()?;
            }
            let Some(window) = self.window.as_mut() else {
                bail!("no window mapped after remap");
            };
            let take = rest.len().min(window.len() - self.window_pos);
            window[self.window_pos..self.window_pos + take].copy_from_slice(&rest[..take]);
            self.window_pos += take;
            rest = &rest[take..];
        }
        self.downloaded.fetch_add(data.len() as u64, Ordering::Relaxed);
        Ok(())
    }

    /// Flushes and unmaps the final window, forcing the remaining dirty
    /// pages back to the file.
    pub fn release(mut self) -> Result<()> {
        if let Some(window) = self.window.take() {
            window.flush().context("failed to flush final window")?;
        }
        Ok(())
    }
}
