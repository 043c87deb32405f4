//! Integration tests for the batch downloader.

use std::sync::Arc;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::time::Duration;

use dload_core::download::{BaseDir, BatchDownloader, BatchInput, DownloadError, HttpClient};
use dload_core::Suppress;
use tempfile::TempDir;
use tokio::io::{AsyncReadExt, AsyncWriteExt};
use tokio::net::{TcpListener, TcpStream};
use wiremock::matchers::{method, path};
use wiremock::{Mock, MockServer, ResponseTemplate};

// ==================== Concurrency Limit Tests ====================

/// Minimal HTTP server that counts requests in flight.
///
/// Each connection is handled on its own task with an async delay, so the
/// server never serializes overlapping requests. A request counts as in
/// flight from the moment its headers arrive until just before the response
/// is written, which the client cannot observe as finished any earlier.
struct InFlightServer {
    uri: String,
    current: Arc<AtomicUsize>,
    peak: Arc<AtomicUsize>,
    served: Arc<AtomicUsize>,
    accept_loop: tokio::task::JoinHandle<()>,
}

impl InFlightServer {
    async fn start(delay: Duration) -> Self {
        let listener = TcpListener::bind("127.0.0.1:0")
            .await
            .expect("bind local listener");
        let addr = listener.local_addr().expect("listener address");
        let current = Arc::new(AtomicUsize::new(0));
        let peak = Arc::new(AtomicUsize::new(0));
        let served = Arc::new(AtomicUsize::new(0));

        let counters = (Arc::clone(&current), Arc::clone(&peak), Arc::clone(&served));
        let accept_loop = tokio::spawn(async move {
            while let Ok((socket, _)) = listener.accept().await {
                let (current, peak, served) = (
                    Arc::clone(&counters.0),
                    Arc::clone(&counters.1),
                    Arc::clone(&counters.2),
                );
                tokio::spawn(async move {
                    serve_one(socket, delay, &current, &peak, &served).await;
                });
            }
        });

        Self {
            uri: format!("http://{addr}"),
            current,
            peak,
            served,
            accept_loop,
        }
    }
}

impl Drop for InFlightServer {
    fn drop(&mut self) {
        self.accept_loop.abort();
    }
}

async fn serve_one(
    mut socket: TcpStream,
    delay: Duration,
    current: &AtomicUsize,
    peak: &AtomicUsize,
    served: &AtomicUsize,
) {
    let mut request = Vec::new();
    let mut buf = [0_u8; 1024];
    while !request.windows(4).any(|w| w == b"\r\n\r\n") {
        match socket.read(&mut buf).await {
            Ok(0) | Err(_) => return,
            Ok(n) => request.extend_from_slice(&buf[..n]),
        }
    }

    let in_flight = current.fetch_add(1, Ordering::SeqCst) + 1;
    peak.fetch_max(in_flight, Ordering::SeqCst);
    tokio::time::sleep(delay).await;
    current.fetch_sub(1, Ordering::SeqCst);
    served.fetch_add(1, Ordering::SeqCst);

    let response = b"HTTP/1.1 200 OK\r\nContent-Length: 7\r\nConnection: close\r\n\r\ncontent";
    let _ = socket.write_all(response).await;
    let _ = socket.shutdown().await;
}

fn client_in(dir: &std::path::Path) -> HttpClient {
    HttpClient::builder()
        .base_dir(BaseDir::from_path(dir))
        .build()
        .expect("client should build")
}

/// Runs more jobs than workers and checks that exactly `max_threads`
/// requests were ever in flight at once.
async fn assert_concurrency_bound(max_threads: usize) {
    let server = InFlightServer::start(Duration::from_millis(150)).await;

    let job_count = max_threads * 2 + 3;
    let urls: Vec<String> = (0..job_count)
        .map(|i| format!("{}/file{i}.bin", server.uri))
        .collect();

    let temp_dir = TempDir::new().expect("failed to create temp dir");
    let out_dir = temp_dir.path().join("out");
    let batch = BatchDownloader::new(client_in(temp_dir.path()))
        .with_max_threads(max_threads)
        .with_stagger(Duration::ZERO);

    batch
        .run(BatchInput::Urls(urls), Some(&out_dir))
        .await
        .expect("batch should succeed");

    // Every job has finished by the time run returns.
    assert_eq!(server.served.load(Ordering::SeqCst), job_count);
    assert_eq!(server.current.load(Ordering::SeqCst), 0);
    for i in 0..job_count {
        let file = out_dir.join(format!("file{i}.bin"));
        assert_eq!(std::fs::read(&file).expect("file written"), b"content");
    }

    let observed_peak = server.peak.load(Ordering::SeqCst);
    assert_eq!(
        observed_peak, max_threads,
        "Peak concurrency {observed_peak} should reach but not exceed the limit of {max_threads}"
    );
}

#[tokio::test]
async fn test_batch_runs_exactly_one_worker() {
    assert_concurrency_bound(1).await;
}

#[tokio::test]
async fn test_batch_runs_exactly_five_workers() {
    assert_concurrency_bound(5).await;
}

#[tokio::test]
async fn test_batch_runs_exactly_ten_workers() {
    assert_concurrency_bound(10).await;
}

// ==================== Error Isolation Tests ====================

#[tokio::test]
async fn test_batch_failure_reports_false_and_keeps_successes() {
    let mock_server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/f1.bin"))
        .respond_with(ResponseTemplate::new(200).set_body_bytes(b"first".to_vec()))
        .mount(&mock_server)
        .await;
    Mock::given(method("GET"))
        .and(path("/f2.bin"))
        .respond_with(ResponseTemplate::new(500))
        .mount(&mock_server)
        .await;

    let temp_dir = TempDir::new().expect("failed to create temp dir");
    let dir = temp_dir.path().join("D");
    let batch = BatchDownloader::new(client_in(temp_dir.path()))
        .with_max_threads(2)
        .with_stagger(Duration::ZERO);
    let urls = vec![
        format!("{}/f1.bin", mock_server.uri()),
        format!("{}/f2.bin", mock_server.uri()),
    ];

    let succeeded = batch.run(urls.into(), Some(&dir)).await.succeeded();

    assert!(!succeeded);
    assert_eq!(std::fs::read(dir.join("f1.bin")).expect("f1 written"), b"first");
    assert!(!dir.join("f2.bin").exists());
}

#[tokio::test]
async fn test_batch_failure_propagates_first_error() {
    let mock_server = MockServer::start().await;
    Mock::given(method("GET"))
        .respond_with(ResponseTemplate::new(404))
        .mount(&mock_server)
        .await;

    let temp_dir = TempDir::new().expect("failed to create temp dir");
    let batch = BatchDownloader::new(client_in(temp_dir.path())).with_stagger(Duration::ZERO);
    let err = batch
        .run(
            vec![format!("{}/gone.bin", mock_server.uri())].into(),
            Some(temp_dir.path()),
        )
        .await
        .expect_err("404 should fail the batch");

    assert!(
        matches!(err, DownloadError::HttpStatus { status: 404, .. }),
        "{err:?}"
    );
}

#[tokio::test]
async fn test_batch_reads_url_file() {
    let mock_server = MockServer::start().await;
    Mock::given(method("GET"))
        .respond_with(ResponseTemplate::new(200).set_body_bytes(b"x".to_vec()))
        .expect(2)
        .mount(&mock_server)
        .await;

    let temp_dir = TempDir::new().expect("failed to create temp dir");
    let list = temp_dir.path().join("urls.txt");
    std::fs::write(
        &list,
        format!(
            "{uri}/one.bin\n\n   \n{uri}/two.bin   \n",
            uri = mock_server.uri()
        ),
    )
    .expect("write url list");

    let out = temp_dir.path().join("files");
    BatchDownloader::new(client_in(temp_dir.path()))
        .with_max_threads(2)
        .with_stagger(Duration::ZERO)
        .run(BatchInput::File(list), Some(&out))
        .await
        .expect("batch should succeed");

    assert!(out.join("one.bin").is_file());
    assert!(out.join("two.bin").is_file());
}
