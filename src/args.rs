use std::path::PathBuf;

use clap::Parser;

/// A segmented, multi-connection file downloader.
///
/// Splits the remote file into page-aligned segments and downloads them in
/// parallel, each worker streaming its byte range straight into an mmap
/// window of the destination file.
#[derive(Parser, Debug)]
#[command(author, version, about, long_about = None, disable_version_flag = true)]
pub struct Args {
    /// The URL of the file to download.
    #[arg(short, long, required_unless_present = "version")]
    pub url: Option<String>,

    /// Directory to save the downloaded file in.
    #[arg(short, long, required_unless_present = "version")]
    pub dir: Option<PathBuf>,

    /// The number of concurrent download workers to use.
    #[arg(short = 't', long)]
    pub threads: Option<usize>,

    /// Pages of the destination file mapped per worker window.
    #[arg(short = 'p', long)]
    pub window_pages: Option<u64>,

    /// Print version information and exit.
    #[arg(short = 'v', long = "version")]
    pub version: bool,
}
