//! Manifest requests against a mock release server.

use std::time::Duration;

use selfswap::core::{ErrorKind, UpdateError};
use selfswap::test_utils::init_test_logging;
use selfswap::update::{ManifestFetcher, ManifestFormat};
use wiremock::matchers::{header, method, path};
use wiremock::{Mock, MockServer, ResponseTemplate};

const DIGEST: &str = "dffd6021bb2bd5b0af676290809ec3a53191dd81c7f70a4b28688a362182986f";

fn fetcher(timeout: Duration) -> ManifestFetcher {
    init_test_logging(None);
    ManifestFetcher::new(timeout, ManifestFormat::Auto).unwrap()
}

#[tokio::test]
async fn test_requests_bypass_caches() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/release.json"))
        .and(header("cache-control", "no-cache"))
        .and(header("pragma", "no-cache"))
        .respond_with(ResponseTemplate::new(200).set_body_string(format!(
            r#"{{"version": "1.4.0", "download_url": "https://cdn.example.com/app-1.4.0.zip", "sha256": "sha256:{DIGEST}"}}"#
        )))
        .expect(1)
        .mount(&server)
        .await;

    let manifest = fetcher(Duration::from_secs(5)).fetch(&format!("{}/release.json", server.uri())).await.unwrap();

    assert_eq!(manifest.version, "1.4.0");
    assert_eq!(manifest.artifact_url, "https://cdn.example.com/app-1.4.0.zip");
    assert!(manifest.is_verifiable());
    server.verify().await;
}

#[tokio::test]
async fn test_slow_server_times_out() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .respond_with(
            ResponseTemplate::new(200)
                .set_body_string(r#"{"version": "1.4.0", "download_url": "x", "checksum": "y"}"#)
                .set_delay(Duration::from_secs(5)),
        )
        .mount(&server)
        .await;

    let err = fetcher(Duration::from_secs(1))
        .fetch(&format!("{}/release.json", server.uri()))
        .await
        .unwrap_err();

    assert_eq!(err.kind(), ErrorKind::Timeout);
    assert!(err.kind().is_transient());
}

#[tokio::test]
async fn test_http_error_status_is_network_error() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .respond_with(ResponseTemplate::new(503))
        .mount(&server)
        .await;

    let err = fetcher(Duration::from_secs(5))
        .fetch(&format!("{}/release.json", server.uri()))
        .await
        .unwrap_err();

    assert!(matches!(err, UpdateError::NetworkError { ref reason, .. } if reason.contains("503")));
}

#[tokio::test]
async fn test_malformed_documents_are_parse_errors() {
    let server = MockServer::start().await;
    for (route, body) in [
        ("/html", "<html>Not Found</html>"),
        ("/missing-url", r#"{"version": "1.4.0"}"#),
        ("/bad-checksum", r#"{"version": "1.4.0", "download_url": "https://x/app.zip", "checksum": "ab"}"#),
    ] {
        Mock::given(method("GET"))
            .and(path(route))
            .respond_with(ResponseTemplate::new(200).set_body_string(body))
            .mount(&server)
            .await;
    }

    let fetcher = fetcher(Duration::from_secs(5));
    for route in ["/html", "/missing-url", "/bad-checksum"] {
        let err = fetcher.fetch(&format!("{}{route}", server.uri())).await.unwrap_err();
        assert_eq!(err.kind(), ErrorKind::Parse, "{route}: {err}");
    }
}

#[tokio::test]
async fn test_unreachable_server_is_network_error() {
    // Bind then drop a server so the port is closed.
    let uri = {
        let server = MockServer::start().await;
        server.uri()
    };

    let err = fetcher(Duration::from_secs(2)).fetch(&format!("{uri}/release.json")).await.unwrap_err();
    assert!(matches!(err.kind(), ErrorKind::Network | ErrorKind::Timeout));
}
