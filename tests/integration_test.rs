use std::path::Path;

use pagefetch::{DownloadManager, DownloadRequest, DownloaderKind};
use tokio_util::sync::CancellationToken;
use wiremock::matchers::{header, method};
use wiremock::{Mock, MockServer, ResponseTemplate};

fn payload(len: usize) -> Vec<u8> {
    (0..len).map(|i| (i * 7 % 251) as u8).collect()
}

async fn fetch(url: String, dir: &Path, threads: usize, window_pages: u64) -> anyhow::Result<()> {
    let request = DownloadRequest {
        kind: DownloaderKind::Http,
        url,
        threads,
        window_pages,
    };
    let manager = DownloadManager::init(request, dir).await?;
    manager.download(CancellationToken::new()).await
}

#[tokio::test]
async fn stitches_three_segments_into_one_file() {
    let server = MockServer::start().await;
    let body = payload(10_000);

    // The probe is a HEAD, so only the Content-Length of the body survives.
    Mock::given(method("HEAD"))
        .respond_with(ResponseTemplate::new(206).set_body_bytes(body.clone()))
        .mount(&server)
        .await;

    // 10000 bytes is three pages; four requested workers clamp to three.
    for (range, slice) in [
        ("bytes=0-4095", &body[..4096]),
        ("bytes=4096-8191", &body[4096..8192]),
        ("bytes=8192-9999", &body[8192..]),
    ] {
        Mock::given(method("GET"))
            .and(header("Range", range))
            .respond_with(ResponseTemplate::new(206).set_body_bytes(slice.to_vec()))
            .mount(&server)
            .await;
    }

    let dir = tempfile::tempdir().unwrap();
    fetch(format!("{}/data.bin", server.uri()), dir.path(), 4, 256)
        .await
        .expect("download failed");

    let written = std::fs::read(dir.path().join("data.bin")).unwrap();
    assert_eq!(written, body, "segments were not stitched correctly");
}

#[tokio::test]
async fn remaps_windows_inside_a_segment() {
    let server = MockServer::start().await;
    let body = payload(10_000);

    Mock::given(method("HEAD"))
        .respond_with(ResponseTemplate::new(206).set_body_bytes(body.clone()))
        .mount(&server)
        .await;

    // Two workers over three pages: worker 0 takes two pages and, with a
    // one-page window budget, has to slide its window mid-transfer.
    for (range, slice) in [
        ("bytes=0-8191", &body[..8192]),
        ("bytes=8192-9999", &body[8192..]),
    ] {
        Mock::given(method("GET"))
            .and(header("Range", range))
            .respond_with(ResponseTemplate::new(206).set_body_bytes(slice.to_vec()))
            .mount(&server)
            .await;
    }

    let dir = tempfile::tempdir().unwrap();
    fetch(format!("{}/data.bin", server.uri()), dir.path(), 2, 1)
        .await
        .expect("download failed");

    let written = std::fs::read(dir.path().join("data.bin")).unwrap();
    assert_eq!(written, body);
}

#[tokio::test]
async fn degrades_to_a_single_worker_without_range_support() {
    let server = MockServer::start().await;
    let body = payload(5000);

    // The single probe gets a 416; the resource size is read off that same
    // response's Content-Length.
    Mock::given(method("HEAD"))
        .and(header("Range", "bytes=0-"))
        .respond_with(ResponseTemplate::new(416).set_body_bytes(body.clone()))
        .mount(&server)
        .await;

    // A range-oblivious server answers the one worker with the full body.
    Mock::given(method("GET"))
        .respond_with(ResponseTemplate::new(200).set_body_bytes(body.clone()))
        .mount(&server)
        .await;

    let dir = tempfile::tempdir().unwrap();
    fetch(format!("{}/file.iso", server.uri()), dir.path(), 8, 256)
        .await
        .expect("download failed");

    let written = std::fs::read(dir.path().join("file.iso")).unwrap();
    assert_eq!(written, body);
}

#[tokio::test]
async fn empty_resource_produces_an_empty_file() {
    let server = MockServer::start().await;

    Mock::given(method("HEAD"))
        .respond_with(ResponseTemplate::new(206).set_body_bytes(Vec::new()))
        .mount(&server)
        .await;

    let dir = tempfile::tempdir().unwrap();
    fetch(format!("{}/empty.bin", server.uri()), dir.path(), 5, 256)
        .await
        .expect("download failed");

    let metadata = std::fs::metadata(dir.path().join("empty.bin")).unwrap();
    assert_eq!(metadata.len(), 0);
}

#[tokio::test]
async fn rerunning_overwrites_the_destination() {
    let server = MockServer::start().await;
    let body = payload(3000);

    Mock::given(method("HEAD"))
        .respond_with(ResponseTemplate::new(206).set_body_bytes(body.clone()))
        .mount(&server)
        .await;
    Mock::given(method("GET"))
        .and(header("Range", "bytes=0-2999"))
        .respond_with(ResponseTemplate::new(206).set_body_bytes(body.clone()))
        .mount(&server)
        .await;

    let dir = tempfile::tempdir().unwrap();
    let url = format!("{}/data.bin", server.uri());
    fetch(url.clone(), dir.path(), 3, 256).await.expect("first run");
    fetch(url, dir.path(), 3, 256).await.expect("second run");

    let written = std::fs::read(dir.path().join("data.bin")).unwrap();
    assert_eq!(written, body);
}

#[tokio::test]
async fn a_failing_segment_aborts_the_download() {
    let server = MockServer::start().await;
    let body = payload(8192);

    Mock::given(method("HEAD"))
        .respond_with(ResponseTemplate::new(206).set_body_bytes(body.clone()))
        .mount(&server)
        .await;

    // Only the first segment is served; the second range gets a 404.
    Mock::given(method("GET"))
        .and(header("Range", "bytes=0-4095"))
        .respond_with(ResponseTemplate::new(206).set_body_bytes(body[..4096].to_vec()))
        .mount(&server)
        .await;

    let dir = tempfile::tempdir().unwrap();
    let err = fetch(format!("{}/data.bin", server.uri()), dir.path(), 2, 256)
        .await
        .expect_err("download should fail");
    assert!(err.to_string().contains("rejected with status"));

    // The partially written destination is left behind.
    assert!(dir.path().join("data.bin").exists());
}

#[tokio::test]
async fn init_fails_when_the_probe_is_rejected() {
    let server = MockServer::start().await;
    let dir = tempfile::tempdir().unwrap();

    let request = DownloadRequest {
        kind: DownloaderKind::Http,
        url: format!("{}/missing.bin", server.uri()),
        threads: 5,
        window_pages: 256,
    };
    assert!(DownloadManager::init(request, dir.path()).await.is_err());
    assert!(!dir.path().join("missing.bin").exists());
}
