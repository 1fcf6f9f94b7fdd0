//! Asset downloads against a mock media host.

mod common;

use std::time::Duration;

use deviantart_favorites::api::{DeviantArtApi, RateLimiter};
use deviantart_favorites::download::{Downloader, ItemFailure, OutcomeStatus};
use deviantart_favorites::media::{AssetCandidate, AssetReference};
use tempfile::TempDir;
use wiremock::matchers::{method, path};
use wiremock::{Mock, MockServer, ResponseTemplate};

use common::*;

fn asset(server: &MockServer, id: &str) -> AssetReference {
    AssetReference {
        deviation_id: id.into(),
        title: "Harbour".into(),
        artist_handle: "painter".into(),
        candidate: AssetCandidate {
            url: format!("{}/media/{}.png", server.uri(), id),
            width: 1920,
            height: 1080,
            mime_type: "image/png".into(),
            is_download_variant: true,
            filesize: None,
        },
        extension: "png".into(),
    }
}

#[tokio::test]
async fn test_download_writes_file() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/media/D1.png"))
        .respond_with(ResponseTemplate::new(200).set_body_bytes(b"png-bytes".to_vec()))
        .expect(1)
        .mount(&server)
        .await;

    let dir = TempDir::new().unwrap();
    let api = api(&server);
    let downloader = Downloader::new(&api, fast_retry(3));

    let outcome = downloader.fetch(&asset(&server, "D1"), dir.path()).await;

    assert!(outcome.is_success());
    assert_eq!(outcome.attempts, 1);
    let local = outcome.local_path().unwrap();
    assert_eq!(local, dir.path().join("painter_Harbour_D1.png"));
    assert_eq!(std::fs::read(local).unwrap(), b"png-bytes");
}

#[tokio::test]
async fn test_not_found_is_not_retried() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/media/D1.png"))
        .respond_with(ResponseTemplate::new(404))
        .expect(1)
        .mount(&server)
        .await;

    let dir = TempDir::new().unwrap();
    let api = api(&server);
    let downloader = Downloader::new(&api, fast_retry(3));

    let outcome = downloader.fetch(&asset(&server, "D1"), dir.path()).await;

    assert_eq!(outcome.attempts, 1);
    assert!(matches!(
        outcome.status,
        OutcomeStatus::Failed {
            reason: ItemFailure::DownloadError {
                status: Some(404),
                ..
            }
        }
    ));
    assert_eq!(std::fs::read_dir(dir.path()).unwrap().count(), 0);
}

#[tokio::test]
async fn test_server_errors_exhaust_attempts() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/media/D1.png"))
        .respond_with(ResponseTemplate::new(503))
        .expect(3)
        .mount(&server)
        .await;

    let dir = TempDir::new().unwrap();
    let api = api(&server);
    let downloader = Downloader::new(&api, fast_retry(3));

    let outcome = downloader.fetch(&asset(&server, "D1"), dir.path()).await;

    assert!(outcome.is_failure());
    assert_eq!(outcome.attempts, 3);
    assert_eq!(outcome.retries(), 2);
    assert!(matches!(
        outcome.status,
        OutcomeStatus::Failed {
            reason: ItemFailure::DownloadError {
                status: Some(503),
                ..
            }
        }
    ));
}

#[tokio::test]
async fn test_recovers_after_transient_error() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/media/D1.png"))
        .respond_with(ResponseTemplate::new(502))
        .up_to_n_times(1)
        .mount(&server)
        .await;
    Mock::given(method("GET"))
        .and(path("/media/D1.png"))
        .respond_with(ResponseTemplate::new(200).set_body_bytes(b"ok".to_vec()))
        .mount(&server)
        .await;

    let dir = TempDir::new().unwrap();
    let api = api(&server);
    let downloader = Downloader::new(&api, fast_retry(3));

    let outcome = downloader.fetch(&asset(&server, "D1"), dir.path()).await;

    assert!(outcome.is_success());
    assert_eq!(outcome.attempts, 2);
}

#[tokio::test]
async fn test_existing_file_is_not_requested() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/media/D1.png"))
        .respond_with(ResponseTemplate::new(200).set_body_bytes(b"new".to_vec()))
        .expect(0)
        .mount(&server)
        .await;

    let dir = TempDir::new().unwrap();
    let existing = dir.path().join("painter_Harbour_D1.png");
    std::fs::write(&existing, b"old").unwrap();

    let api = api(&server);
    let downloader = Downloader::new(&api, fast_retry(3));
    let outcome = downloader.fetch(&asset(&server, "D1"), dir.path()).await;

    assert_eq!(outcome.attempts, 0);
    assert!(matches!(
        outcome.status,
        OutcomeStatus::Succeeded {
            already_present: true,
            ..
        }
    ));
    assert_eq!(std::fs::read(&existing).unwrap(), b"old");
}

#[tokio::test]
async fn test_stalled_host_times_out() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/media/D1.png"))
        .respond_with(
            ResponseTemplate::new(200)
                .set_body_bytes(b"late".to_vec())
                .set_delay(Duration::from_secs(60)),
        )
        .mount(&server)
        .await;

    let dir = TempDir::new().unwrap();
    let api = DeviantArtApi::with_read_timeout(
        &endpoints(&server),
        RateLimiter::disabled(),
        Duration::from_millis(200),
    )
    .unwrap();
    let downloader = Downloader::new(&api, fast_retry(2));

    let outcome = tokio::time::timeout(
        Duration::from_secs(10),
        downloader.fetch(&asset(&server, "D1"), dir.path()),
    )
    .await
    .expect("download should give up on a silent host");

    assert_eq!(outcome.attempts, 2);
    assert!(matches!(
        outcome.status,
        OutcomeStatus::Failed {
            reason: ItemFailure::DownloadError { status: None, .. }
        }
    ));
    assert_eq!(std::fs::read_dir(dir.path()).unwrap().count(), 0);
}
