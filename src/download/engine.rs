//! Batch downloader for saving many URLs with bounded concurrency.
//!
//! This module provides the [`BatchDownloader`] which fans a list of URLs out
//! over concurrently running tasks, using a semaphore as the admission gate.
//!
//! # Example
//!
//! ```no_run
//! use std::path::Path;
//! use dload_core::{BatchDownloader, BatchInput, HttpClient};
//!
//! # async fn example() -> Result<(), Box<dyn std::error::Error>> {
//! let batch = BatchDownloader::new(HttpClient::new()).with_max_threads(4);
//! let urls = vec![
//!     "https://example.com/a.bin".to_string(),
//!     "https://example.com/b.bin".to_string(),
//! ];
//! batch
//!     .run(BatchInput::Urls(urls), Some(Path::new("./downloads")))
//!     .await?;
//! # Ok(())
//! # }
//! ```

use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex, PoisonError};
use std::time::Duration;

use tokio::sync::Semaphore;
use tracing::{debug, info, instrument, warn};

use super::constants::{DEFAULT_MAX_THREADS, DEFAULT_STAGGER, DEFAULT_TIMEOUT};
use super::filename::default_filename;
use super::options::FetchOptions;
use super::{DownloadError, HttpClient};

/// URLs for a batch run.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum BatchInput {
    /// URLs held in memory.
    Urls(Vec<String>),
    /// Text file with one URL per non-blank line.
    File(PathBuf),
}

impl From<Vec<String>> for BatchInput {
    fn from(urls: Vec<String>) -> Self {
        Self::Urls(urls)
    }
}

impl From<Vec<&str>> for BatchInput {
    fn from(urls: Vec<&str>) -> Self {
        Self::Urls(urls.into_iter().map(str::to_string).collect())
    }
}

impl BatchInput {
    /// Materializes the URL list, reading the file for [`BatchInput::File`].
    ///
    /// # Errors
    ///
    /// Returns [`DownloadError::Io`] if the URL file cannot be read.
    pub async fn into_urls(self) -> Result<Vec<String>, DownloadError> {
        match self {
            Self::Urls(urls) => Ok(urls),
            Self::File(path) => {
                let raw = tokio::fs::read_to_string(&path)
                    .await
                    .map_err(|e| DownloadError::io(path.clone(), e))?;
                Ok(parse_url_lines(&raw))
            }
        }
    }
}

fn parse_url_lines(raw: &str) -> Vec<String> {
    raw.lines()
        .filter(|line| !line.trim().is_empty())
        .map(|line| line.trim_end().to_string())
        .collect()
}

/// Saves many URLs concurrently, never overwriting existing files.
///
/// # Concurrency Model
///
/// - Each URL runs in its own Tokio task
/// - A semaphore permit is acquired before spawning each task and held
///   until the task finishes, so at most `max_threads` saves are in flight
/// - A short pause follows each launch to stagger connection setup
/// - Every task is awaited before [`run`](Self::run) returns
///
/// # Failures
///
/// Failed saves are pushed onto a shared list. Once all tasks finish, the
/// first recorded error is returned. Tasks race to record, so "first" is
/// whichever failure took the lock first, not the earliest URL in the input.
#[derive(Debug, Clone)]
pub struct BatchDownloader {
    client: HttpClient,
    max_threads: usize,
    stagger: Duration,
    timeout: Duration,
}

impl BatchDownloader {
    /// Creates a batch downloader with one worker and default pacing.
    #[must_use]
    pub fn new(client: HttpClient) -> Self {
        Self {
            client,
            max_threads: DEFAULT_MAX_THREADS,
            stagger: DEFAULT_STAGGER,
            timeout: DEFAULT_TIMEOUT,
        }
    }

    /// Sets the number of concurrent saves. Zero is raised to one.
    #[must_use]
    pub fn with_max_threads(mut self, max_threads: usize) -> Self {
        self.max_threads = max_threads.max(1);
        self
    }

    /// Sets the pause inserted after each task launch.
    #[must_use]
    pub fn with_stagger(mut self, stagger: Duration) -> Self {
        self.stagger = stagger;
        self
    }

    /// Sets the per-request timeout applied to every save.
    #[must_use]
    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }

    /// Returns the configured concurrency limit.
    #[must_use]
    pub fn max_threads(&self) -> usize {
        self.max_threads
    }

    /// Saves every URL in `input`.
    ///
    /// With `dir`, each URL is saved as `dir/<name from URL>` and `dir` is
    /// created if missing (relative `dir` is anchored at the client's base
    /// directory). Without `dir`, each save resolves its own destination.
    ///
    /// # Errors
    ///
    /// Returns the first recorded save failure after all tasks finish, or
    /// [`DownloadError::Io`] if the URL file or `dir` cannot be read/created.
    #[instrument(skip(self, input), fields(max_threads = self.max_threads))]
    pub async fn run(&self, input: BatchInput, dir: Option<&Path>) -> Result<(), DownloadError> {
        let urls = input.into_urls().await?;

        let destination_dir = match dir.filter(|d| !d.as_os_str().is_empty()) {
            Some(dir) => {
                let dir = self.client.base_dir().resolve(dir);
                tokio::fs::create_dir_all(&dir)
                    .await
                    .map_err(|e| DownloadError::io(dir.clone(), e))?;
                Some(dir)
            }
            None => None,
        };

        let semaphore = Arc::new(Semaphore::new(self.max_threads));
        let errors: Arc<Mutex<Vec<DownloadError>>> = Arc::new(Mutex::new(Vec::new()));
        let completed = Arc::new(AtomicUsize::new(0));
        let opts = FetchOptions::default()
            .with_timeout(self.timeout)
            .with_overwrite(false);
        let mut handles = Vec::with_capacity(urls.len());

        info!(urls = urls.len(), "starting batch download");

        for url in urls {
            let target = destination_dir
                .as_ref()
                .map(|dir| dir.join(default_filename(&url)));

            // Acquire semaphore permit (blocks if at concurrency limit).
            // The semaphore is never closed while we hold the Arc.
            let Ok(permit) = Arc::clone(&semaphore).acquire_owned().await else {
                break;
            };

            let client = self.client.clone();
            let errors = Arc::clone(&errors);
            let completed = Arc::clone(&completed);
            debug!(url = %url, target = ?target, "launching download task");

            let task_url = url.clone();
            let handle = tokio::spawn(async move {
                // Permit is dropped when this block exits (RAII)
                let _permit = permit;
                match client.save(&task_url, target.as_deref(), &opts).await {
                    Ok(path) => {
                        debug!(url = %task_url, path = %path.display(), "batch item saved");
                        completed.fetch_add(1, Ordering::SeqCst);
                    }
                    Err(e) => {
                        warn!(url = %task_url, error = %e, "batch item failed");
                        errors
                            .lock()
                            .unwrap_or_else(PoisonError::into_inner)
                            .push(e);
                    }
                }
            });
            handles.push((url, handle));

            tokio::time::sleep(self.stagger).await;
        }

        debug!(task_count = handles.len(), "waiting for downloads to complete");

        for (url, handle) in handles {
            if let Err(e) = handle.await {
                warn!(url = %url, error = %e, "download task panicked");
                errors
                    .lock()
                    .unwrap_or_else(PoisonError::into_inner)
                    .push(DownloadError::TaskPanicked { url });
            }
        }

        let mut errors = std::mem::take(&mut *errors.lock().unwrap_or_else(PoisonError::into_inner));
        info!(
            completed = completed.load(Ordering::SeqCst),
            failed = errors.len(),
            "batch download complete"
        );

        if errors.is_empty() {
            Ok(())
        } else {
            Err(errors.swap_remove(0))
        }
    }
}
