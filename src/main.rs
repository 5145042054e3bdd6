//! Command-line entrypoint for `pagefetch`.

mod args;

use std::path::Path;

use anyhow::Result;
use args::Args;
use clap::Parser;
use pagefetch::config::Settings;
use pagefetch::manager::{DownloadManager, DownloadRequest};
use pagefetch::transport::DownloaderKind;
use tokio_util::sync::CancellationToken;

#[tokio::main]
async fn main() {
    let args = Args::parse();

    if args.version {
        println!(
            "version: {}.{}",
            env!("CARGO_PKG_VERSION_MAJOR"),
            env!("CARGO_PKG_VERSION_MINOR")
        );
        std::process::exit(0);
    }

    // clap enforced presence of both flags when `--version` is absent.
    let (Some(url), Some(dir)) = (args.url, args.dir) else {
        std::process::exit(2);
    };

    let settings = Settings::load().unwrap_or_default();
    let request = DownloadRequest {
        kind: DownloaderKind::Http,
        url,
        threads: args.threads.or(settings.threads).unwrap_or(5),
        window_pages: args.window_pages.or(settings.window_pages).unwrap_or(256),
    };

    let cancel = CancellationToken::new();
    let signal_token = cancel.clone();
    tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            eprintln!("\ninterrupted, stopping workers...");
            signal_token.cancel();
        }
    });

    if let Err(err) = run(request, &dir, cancel).await {
        eprintln!("error: {err:#}");
        std::process::exit(255);
    }
}

async fn run(request: DownloadRequest, dir: &Path, cancel: CancellationToken) -> Result<()> {
    let manager = DownloadManager::init(request, dir).await?;
    manager.download(cancel).await
}
