//! HTTP client wrapper for fetching and saving remote resources.
//!
//! This module provides the `HttpClient` struct which issues single blocking
//! style requests (one GET or HEAD per call) and streams bodies to disk.

use std::collections::BTreeMap;
use std::path::{Path, PathBuf};
use std::time::Duration;

use futures_util::StreamExt;
use reqwest::Client;
use reqwest::header::CONTENT_DISPOSITION;
use reqwest::redirect::Policy;
use serde::de::DeserializeOwned;
use tokio::fs::File;
use tokio::io::{AsyncWriteExt, BufWriter};
use tracing::{debug, info, instrument};
use url::Url;

use super::base_dir::BaseDir;
use super::constants::CONNECT_TIMEOUT_SECS;
use super::error::DownloadError;
use super::filename::resolve_filename;
use super::options::FetchOptions;
use crate::user_agent;

/// HTTP client for fetching resources and saving them to disk.
///
/// This client is designed to be created once and reused for multiple
/// requests, taking advantage of connection pooling. Clones share the pool.
///
/// # Example
///
/// ```no_run
/// use dload_core::{FetchOptions, HttpClient};
///
/// # async fn example() -> Result<(), Box<dyn std::error::Error>> {
/// let client = HttpClient::new();
/// let path = client
///     .save("https://example.com/file.pdf", None, &FetchOptions::default())
///     .await?;
/// println!("Saved to: {}", path.display());
/// # Ok(())
/// # }
/// ```
#[derive(Debug, Clone)]
pub struct HttpClient {
    client: Client,
    no_redirect_client: Client,
    base_dir: BaseDir,
}

/// Builder for [`HttpClient`].
#[derive(Debug, Clone)]
pub struct HttpClientBuilder {
    connect_timeout: Duration,
    user_agent: String,
    base_dir: BaseDir,
}

impl Default for HttpClientBuilder {
    fn default() -> Self {
        Self {
            connect_timeout: Duration::from_secs(CONNECT_TIMEOUT_SECS),
            user_agent: user_agent::default_user_agent(),
            base_dir: BaseDir::current(),
        }
    }
}

impl HttpClientBuilder {
    /// Sets the TCP connect timeout.
    #[must_use]
    pub fn connect_timeout(mut self, timeout: Duration) -> Self {
        self.connect_timeout = timeout;
        self
    }

    /// Overrides the `User-Agent` header.
    #[must_use]
    pub fn user_agent(mut self, user_agent: impl Into<String>) -> Self {
        self.user_agent = user_agent.into();
        self
    }

    /// Sets the directory that anchors relative and derived destinations.
    #[must_use]
    pub fn base_dir(mut self, base_dir: BaseDir) -> Self {
        self.base_dir = base_dir;
        self
    }

    /// Builds the client.
    ///
    /// # Errors
    ///
    /// Returns the reqwest builder error if the TLS backend or system
    /// configuration cannot be initialized.
    pub fn build(self) -> Result<HttpClient, reqwest::Error> {
        let base = || {
            Client::builder()
                .connect_timeout(self.connect_timeout)
                .gzip(true)
                .user_agent(self.user_agent.clone())
        };
        Ok(HttpClient {
            client: base().build()?,
            no_redirect_client: base().redirect(Policy::none()).build()?,
            base_dir: self.base_dir,
        })
    }
}

impl Default for HttpClient {
    fn default() -> Self {
        Self::new()
    }
}

impl HttpClient {
    /// Creates a new HTTP client with default settings.
    ///
    /// Default configuration:
    /// - Connect timeout: 30 seconds
    /// - Gzip decompression: enabled
    /// - Base directory: process working directory
    ///
    /// # Panics
    ///
    /// Panics if the HTTP client builder fails to build with the static
    /// configuration. This should never happen in practice.
    #[must_use]
    #[allow(clippy::expect_used)]
    pub fn new() -> Self {
        Self::builder()
            .build()
            .expect("failed to build HTTP client with static configuration")
    }

    /// Returns a builder for custom configuration.
    #[must_use]
    pub fn builder() -> HttpClientBuilder {
        HttpClientBuilder::default()
    }

    /// The directory that anchors relative and derived destinations.
    #[must_use]
    pub fn base_dir(&self) -> &BaseDir {
        &self.base_dir
    }

    /// Returns a reference to the underlying reqwest client.
    #[must_use]
    pub fn inner(&self) -> &Client {
        &self.client
    }

    /// Fetches the response body as raw bytes.
    ///
    /// # Errors
    ///
    /// Returns `DownloadError` if the URL is invalid, the request fails, or
    /// the server returns a non-success status.
    #[instrument(skip(self, opts), fields(url = %url))]
    pub async fn fetch_bytes(
        &self,
        url: &str,
        opts: &FetchOptions,
    ) -> Result<Vec<u8>, DownloadError> {
        let response = self.send_get(url, opts.timeout).await?;
        let body = within(url, opts.timeout, response.bytes()).await?;
        debug!(bytes = body.len(), "fetched body");
        Ok(body.to_vec())
    }

    /// Fetches the response body as text.
    ///
    /// With `encoding` set, the body is decoded with that label (for example
    /// `"iso-8859-1"`) regardless of the response `Content-Type` charset.
    /// Otherwise the response charset is used, defaulting to UTF-8.
    ///
    /// # Errors
    ///
    /// Same as [`fetch_bytes`](Self::fetch_bytes), plus
    /// [`DownloadError::Decode`] for an unknown encoding label.
    #[instrument(skip(self, opts), fields(url = %url))]
    pub async fn fetch_text(
        &self,
        url: &str,
        encoding: Option<&str>,
        opts: &FetchOptions,
    ) -> Result<String, DownloadError> {
        let forced = encoding
            .map(str::trim)
            .filter(|label| !label.is_empty())
            .map(|label| {
                encoding_rs::Encoding::for_label(label.as_bytes()).ok_or_else(|| {
                    DownloadError::decode(url, format!("unknown encoding label '{label}'"))
                })
            })
            .transpose()?;

        let response = self.send_get(url, opts.timeout).await?;
        match forced {
            Some(encoding) => {
                let body = within(url, opts.timeout, response.bytes()).await?;
                let (text, _, _) = encoding.decode(&body);
                Ok(text.into_owned())
            }
            None => within(url, opts.timeout, response.text()).await,
        }
    }

    /// Fetches the response body and parses it as JSON.
    ///
    /// # Errors
    ///
    /// Same as [`fetch_bytes`](Self::fetch_bytes), plus
    /// [`DownloadError::Decode`] if the body is not valid JSON.
    pub async fn fetch_json(
        &self,
        url: &str,
        opts: &FetchOptions,
    ) -> Result<serde_json::Value, DownloadError> {
        self.fetch_json_as(url, opts).await
    }

    /// Fetches the response body and deserializes it into `T`.
    ///
    /// # Errors
    ///
    /// Same as [`fetch_json`](Self::fetch_json).
    #[instrument(skip(self, opts), fields(url = %url))]
    pub async fn fetch_json_as<T: DeserializeOwned>(
        &self,
        url: &str,
        opts: &FetchOptions,
    ) -> Result<T, DownloadError> {
        let body = self.fetch_bytes(url, opts).await?;
        serde_json::from_slice(&body).map_err(|e| DownloadError::decode(url, e.to_string()))
    }

    /// Issues a HEAD request and returns the response headers.
    ///
    /// Header names are lowercase; repeated headers are joined with `", "`.
    /// With `follow_redirects` off, a 3xx answer is returned as-is so its
    /// `location` can be inspected.
    ///
    /// # Errors
    ///
    /// Returns `DownloadError` if the request fails or the server answers
    /// with a 4xx/5xx status.
    #[instrument(skip(self, opts), fields(url = %url))]
    pub async fn fetch_headers(
        &self,
        url: &str,
        follow_redirects: bool,
        opts: &FetchOptions,
    ) -> Result<BTreeMap<String, String>, DownloadError> {
        validate_url(url)?;
        let client = if follow_redirects {
            &self.client
        } else {
            &self.no_redirect_client
        };
        let response = within(url, opts.timeout, client.head(url).send()).await?;

        let status = response.status();
        if status.is_client_error() || status.is_server_error() {
            return Err(DownloadError::http_status(url, status.as_u16()));
        }

        let mut headers: BTreeMap<String, String> = BTreeMap::new();
        for (name, value) in response.headers() {
            let value = String::from_utf8_lossy(value.as_bytes()).into_owned();
            headers
                .entry(name.as_str().to_string())
                .and_modify(|existing| {
                    existing.push_str(", ");
                    existing.push_str(&value);
                })
                .or_insert(value);
        }
        Ok(headers)
    }

    /// Streams a GET response to disk and returns the absolute destination.
    ///
    /// The destination is `path` anchored at the base directory when given,
    /// otherwise the base directory joined with a name from the
    /// `Content-Disposition` header, the URL, or a synthesized fallback.
    ///
    /// With `opts.overwrite` off, an existing destination is returned
    /// untouched. For an explicit `path` this check happens before any
    /// request is sent; for a derived name it happens once the response
    /// headers are known. The check is not atomic with the write.
    ///
    /// # Errors
    ///
    /// Returns `DownloadError` if:
    /// - The URL is invalid
    /// - The request fails (network error, timeout)
    /// - The server returns an error status (4xx, 5xx)
    /// - Creating directories or writing to disk fails
    #[must_use = "save result contains the path to the downloaded file"]
    #[instrument(skip(self, opts), fields(url = %url))]
    pub async fn save(
        &self,
        url: &str,
        path: Option<&Path>,
        opts: &FetchOptions,
    ) -> Result<PathBuf, DownloadError> {
        let explicit = path
            .filter(|p| !p.to_string_lossy().trim().is_empty())
            .map(|p| self.base_dir.resolve(p));

        if let Some(destination) = &explicit
            && !opts.overwrite
            && is_file(destination).await
        {
            debug!(path = %destination.display(), "destination exists, skipping request");
            return Ok(destination.clone());
        }

        let response = self.send_get(url, opts.timeout).await?;

        let destination = match explicit {
            Some(destination) => destination,
            None => {
                let content_disposition = response
                    .headers()
                    .get(CONTENT_DISPOSITION)
                    .and_then(|v| v.to_str().ok());
                let filename = resolve_filename(url, content_disposition);
                let destination = self.base_dir.dir().join(filename);
                if !opts.overwrite && is_file(&destination).await {
                    debug!(path = %destination.display(), "destination exists, skipping body");
                    return Ok(destination);
                }
                destination
            }
        };
        debug!(path = %destination.display(), "resolved output path");

        ensure_parent_dir(&destination).await?;
        let mut file = File::create(&destination)
            .await
            .map_err(|e| DownloadError::io(destination.clone(), e))?;

        // Stream response body to file, with cleanup on error
        let stream_result = stream_to_file(&mut file, response, url, &destination, opts).await;
        if stream_result.is_err() {
            debug!(path = %destination.display(), "cleaning up partial file after error");
            let _ = tokio::fs::remove_file(&destination).await;
        }
        let bytes_written = stream_result?;

        info!(path = %destination.display(), bytes = bytes_written, "download complete");
        Ok(destination)
    }

    /// Sends a GET and rejects non-success statuses.
    pub(crate) async fn send_get(
        &self,
        url: &str,
        timeout: Duration,
    ) -> Result<reqwest::Response, DownloadError> {
        validate_url(url)?;
        let response = within(url, timeout, self.client.get(url).send()).await?;

        if !response.status().is_success() {
            return Err(DownloadError::http_status(url, response.status().as_u16()));
        }
        Ok(response)
    }
}

/// Awaits a reqwest future, mapping elapsed time to [`DownloadError::Timeout`].
pub(crate) async fn within<T>(
    url: &str,
    timeout: Duration,
    fut: impl Future<Output = Result<T, reqwest::Error>>,
) -> Result<T, DownloadError> {
    tokio::time::timeout(timeout, fut)
        .await
        .map_err(|_| DownloadError::timeout(url))?
        .map_err(|e| DownloadError::network(url, e))
}

/// Next body chunk, or `None` at the end of the stream.
///
/// The timeout applies to each read, so long transfers are not cut short.
pub(crate) async fn next_chunk<S>(
    stream: &mut S,
    url: &str,
    timeout: Duration,
) -> Result<Option<bytes::Bytes>, DownloadError>
where
    S: futures_util::Stream<Item = Result<bytes::Bytes, reqwest::Error>> + Unpin,
{
    match tokio::time::timeout(timeout, stream.next()).await {
        Err(_) => Err(DownloadError::timeout(url)),
        Ok(None) => Ok(None),
        Ok(Some(chunk)) => chunk.map(Some).map_err(|e| DownloadError::network(url, e)),
    }
}

fn validate_url(url: &str) -> Result<Url, DownloadError> {
    Url::parse(url).map_err(|_| DownloadError::invalid_url(url))
}

async fn is_file(path: &Path) -> bool {
    tokio::fs::metadata(path)
        .await
        .is_ok_and(|meta| meta.is_file())
}

/// Creates the parent directory of `path` if it is missing.
pub(crate) async fn ensure_parent_dir(path: &Path) -> Result<(), DownloadError> {
    if let Some(parent) = path.parent()
        && !parent.as_os_str().is_empty()
    {
        tokio::fs::create_dir_all(parent)
            .await
            .map_err(|e| DownloadError::io(parent, e))?;
    }
    Ok(())
}

/// Streams response body to file, returning bytes written.
///
/// This is extracted to enable cleanup on error in the caller.
async fn stream_to_file(
    file: &mut File,
    response: reqwest::Response,
    url: &str,
    file_path: &Path,
    opts: &FetchOptions,
) -> Result<u64, DownloadError> {
    let mut writer = BufWriter::with_capacity(opts.chunk_size.max(1), file);
    let mut stream = response.bytes_stream();
    let mut bytes_written: u64 = 0;

    while let Some(chunk) = next_chunk(&mut stream, url, opts.timeout).await? {
        if chunk.is_empty() {
            continue;
        }

        writer
            .write_all(&chunk)
            .await
            .map_err(|e| DownloadError::io(file_path.to_path_buf(), e))?;

        bytes_written += chunk.len() as u64;
    }

    // Ensure all data is flushed to disk
    writer
        .flush()
        .await
        .map_err(|e| DownloadError::io(file_path.to_path_buf(), e))?;

    Ok(bytes_written)
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[test]
    fn test_client_builder_keeps_base_dir() {
        let temp_dir = TempDir::new().unwrap();
        let client = HttpClient::builder()
            .base_dir(BaseDir::from_path(temp_dir.path()))
            .build()
            .unwrap();
        assert_eq!(client.base_dir().dir(), temp_dir.path());
    }

    #[test]
    fn test_validate_url_rejects_garbage() {
        assert!(matches!(
            validate_url("not a url"),
            Err(DownloadError::InvalidUrl { .. })
        ));
        assert!(validate_url("https://example.com/x").is_ok());
    }

    #[tokio::test]
    async fn test_fetch_bytes_invalid_url_never_sends() {
        let client = HttpClient::new();
        let result = client
            .fetch_bytes("::not-a-url::", &FetchOptions::default())
            .await;
        assert!(matches!(result, Err(DownloadError::InvalidUrl { .. })));
    }

    #[tokio::test]
    async fn test_fetch_text_unknown_encoding_is_decode_error() {
        // The label check runs before any request is sent.
        let client = HttpClient::new();
        let result = client
            .fetch_text(
                "http://127.0.0.1:9/never",
                Some("not-a-charset"),
                &FetchOptions::default(),
            )
            .await;
        assert!(matches!(result, Err(DownloadError::Decode { .. })));
    }

    #[tokio::test]
    async fn test_save_existing_explicit_path_skips_request() {
        let temp_dir = TempDir::new().unwrap();
        let existing = temp_dir.path().join("kept.bin");
        std::fs::write(&existing, b"old").unwrap();

        // Port 9 (discard) would fail if a request were made.
        let client = HttpClient::new();
        let saved = client
            .save(
                "http://127.0.0.1:9/file.bin",
                Some(&existing),
                &FetchOptions::default(),
            )
            .await
            .unwrap();
        assert_eq!(saved, existing);
        assert_eq!(std::fs::read(&existing).unwrap(), b"old");
    }

    #[tokio::test]
    async fn test_ensure_parent_dir_creates_nested() {
        let temp_dir = TempDir::new().unwrap();
        let target = temp_dir.path().join("a").join("b").join("c.bin");
        ensure_parent_dir(&target).await.unwrap();
        assert!(temp_dir.path().join("a").join("b").is_dir());
    }
}
