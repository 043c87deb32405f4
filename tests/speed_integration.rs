//! Integration tests for the throughput probe.

use dload_core::download::{DownloadError, HttpClient, IpVersion, SpeedTest};
use dload_core::Suppress;
use wiremock::matchers::{method, path};
use wiremock::{Mock, MockServer, ResponseTemplate};

#[tokio::test]
async fn test_measure_throughput_counts_every_byte() {
    let mock_server = MockServer::start().await;
    let body = vec![7_u8; 256 * 1024];
    Mock::given(method("GET"))
        .and(path("/ipv6/10MB.zip"))
        .respond_with(ResponseTemplate::new(200).set_body_bytes(body.clone()))
        .expect(1)
        .mount(&mock_server)
        .await;

    let test = SpeedTest::new(10)
        .expect("10MB is published")
        .with_ip_version(IpVersion::V6)
        .with_url_template(format!("{}/{{ip}}/{{size}}.zip", mock_server.uri()))
        .with_progress(false);

    let report = HttpClient::new()
        .measure_throughput(&test)
        .await
        .expect("probe should succeed");

    assert_eq!(report.bytes, body.len() as u64);
    assert!(report.mbps() >= 0.0);
}

#[tokio::test]
async fn test_measure_throughput_with_progress_output() {
    let mock_server = MockServer::start().await;
    Mock::given(method("GET"))
        .respond_with(ResponseTemplate::new(200).set_body_bytes(vec![1_u8; 4096]))
        .mount(&mock_server)
        .await;

    let test = SpeedTest::new(1024)
        .expect("1GB is published")
        .with_url_template(format!("{}/{{size}}.zip", mock_server.uri()));
    assert!(test.url().ends_with("/1GB.zip"));

    let report = HttpClient::new()
        .measure_throughput(&test)
        .await
        .expect("probe should succeed");
    assert_eq!(report.bytes, 4096);
}

#[tokio::test]
async fn test_measure_throughput_http_error_is_false_when_suppressed() {
    let mock_server = MockServer::start().await;
    Mock::given(method("GET"))
        .respond_with(ResponseTemplate::new(503))
        .mount(&mock_server)
        .await;

    let test = SpeedTest::new(5)
        .expect("5MB is published")
        .with_url_template(format!("{}/{{size}}.zip", mock_server.uri()))
        .with_progress(false);
    let client = HttpClient::new();

    let err = client
        .measure_throughput(&test)
        .await
        .expect_err("503 should fail");
    assert!(matches!(err, DownloadError::HttpStatus { status: 503, .. }));

    assert!(!client.measure_throughput(&test).await.succeeded());
}
