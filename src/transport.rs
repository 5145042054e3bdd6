//! HTTP transport: resource probing and ranged GETs.

use std::time::Duration;

use anyhow::{Context, Result, anyhow, bail, ensure};
use reqwest::header::{CONTENT_LENGTH, RANGE};
use reqwest::{Client, Response, StatusCode};

const TCP_KEEPIDLE: Duration = Duration::from_secs(120);
const TCP_KEEPINTVL: Duration = Duration::from_secs(60);
const USER_AGENT: &str = concat!("pagefetch/", env!("CARGO_PKG_VERSION"));

/// Protocol selector for a download request.
///
/// Only HTTP(S) exists today; kept as a tagged enum so further transports
/// slot in without touching the coordinator.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DownloaderKind {
    Http,
}

/// A transport bound to one URL, probed and ready to serve byte ranges.
#[derive(Debug, Clone)]
pub enum Downloader {
    Http(HttpDownloader),
}

impl Downloader {
    /// Builds the transport for `kind` and probes the resource.
    pub async fn connect(kind: DownloaderKind, url: &str) -> Result<Self> {
        match kind {
            DownloaderKind::Http => Ok(Self::Http(HttpDownloader::connect(url).await?)),
        }
    }

    /// Total resource length in bytes.
    pub fn file_size(&self) -> u64 {
        match self {
            Self::Http(downloader) => downloader.file_size,
        }
    }

    /// Whether the server honors `Range` requests.
    pub fn range_supported(&self) -> bool {
        match self {
            Self::Http(downloader) => downloader.range_supported,
        }
    }

    /// Streams the inclusive byte range `[start, end]` into `sink`.
    ///
    /// The sink returns `false` to abort the transfer, which surfaces as an
    /// error here.
    pub async fn fetch_range(
        &self,
        start: u64,
        end: u64,
        sink: impl FnMut(&[u8]) -> bool,
    ) -> Result<()> {
        match self {
            Self::Http(downloader) => downloader.fetch_range(start, end, sink).await,
        }
    }
}

/// HTTP(S) implementation on a shared `reqwest` client.
#[derive(Debug, Clone)]
pub struct HttpDownloader {
    client: Client,
    url: String,
    file_size: u64,
    range_supported: bool,
}

impl HttpDownloader {
    async fn connect(url: &str) -> Result<Self> {
        let client = Client::builder()
            .user_agent(USER_AGENT)
            .tcp_keepalive(TCP_KEEPIDLE)
            .tcp_keepalive_interval(TCP_KEEPINTVL)
            .build()
            .context("failed to build HTTP client")?;

        let probe = client
            .head(url)
            .header(RANGE, "bytes=0-")
            .send()
            .await
            .with_context(|| format!("failed to reach {url}"))?;

        // A 416 only marks the server range-oblivious; the size still comes
        // off this same response.
        let range_supported = if probe.status() == StatusCode::RANGE_NOT_SATISFIABLE {
            false
        } else {
            ensure!(
                probe.status().is_success(),
                "resource probe failed with status {}",
                probe.status()
            );
            true
        };
        let file_size = content_length(&probe)?;

        Ok(Self {
            client,
            url: url.to_string(),
            file_size,
            range_supported,
        })
    }

    async fn fetch_range(
        &self,
        start: u64,
        end: u64,
        mut sink: impl FnMut(&[u8]) -> bool,
    ) -> Result<()> {
        let mut response = self
            .client
            .get(&self.url)
            .header(RANGE, format!("bytes={start}-{end}"))
            .send()
            .await
            .with_context(|| format!("range request {start}-{end} failed"))?;
        ensure!(
            response.status().is_success(),
            "range {start}-{end} rejected with status {}",
            response.status()
        );

        while let Some(chunk) = response.chunk().await? {
            if !sink(&chunk) {
                bail!("transfer of range {start}-{end} aborted by sink");
            }
        }
        Ok(())
    }
}

fn content_length(response: &Response) -> Result<u64> {
    response
        .headers()
        .get(CONTENT_LENGTH)
        .ok_or_else(|| anyhow!("Content-Length not found in response header"))?
        .to_str()?
        .parse::<u64>()
        .context("invalid Content-Length header")
}
