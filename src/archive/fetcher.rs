//! Save a remote zip archive and unpack it next to the base directory.

use std::path::{Path, PathBuf};
use std::time::Duration;

use tracing::{debug, info, instrument};

use super::extract::extract_zip;
use crate::download::constants::DEFAULT_TIMEOUT;
use crate::download::{DownloadError, FetchOptions, HttpClient};

/// Downloads zip archives and extracts them.
///
/// # Example
///
/// ```no_run
/// use dload_core::{ArchiveFetcher, HttpClient};
///
/// # async fn example() -> Result<(), Box<dyn std::error::Error>> {
/// let fetcher = ArchiveFetcher::new(HttpClient::new());
/// let dir = fetcher
///     .save_and_extract("https://example.com/assets.zip", None, true)
///     .await?;
/// println!("Extracted into {}", dir.display());
/// # Ok(())
/// # }
/// ```
#[derive(Debug, Clone)]
pub struct ArchiveFetcher {
    client: HttpClient,
    timeout: Duration,
}

impl ArchiveFetcher {
    /// Creates a fetcher that downloads with `client`.
    #[must_use]
    pub fn new(client: HttpClient) -> Self {
        Self {
            client,
            timeout: DEFAULT_TIMEOUT,
        }
    }

    /// Sets the timeout used for the archive download.
    #[must_use]
    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }

    /// The underlying HTTP client.
    #[must_use]
    pub fn client(&self) -> &HttpClient {
        &self.client
    }

    /// Saves the zip at `url` into the base directory, always overwriting,
    /// and extracts it.
    ///
    /// The archive name comes from the filename resolver, so a
    /// `Content-Disposition` name wins over the URL. Entries go into
    /// `extract_path` (anchored at the base directory) when given, otherwise
    /// into a directory named after the archive without its extension. The
    /// archive is removed afterwards only when `delete_after` is set.
    ///
    /// Returns the absolute extraction directory.
    ///
    /// # Errors
    ///
    /// Returns the download error unchanged, [`DownloadError::Archive`] if
    /// the file is not a readable zip, or [`DownloadError::Io`] for local
    /// filesystem failures.
    #[instrument(skip(self), fields(url = %url))]
    pub async fn save_and_extract(
        &self,
        url: &str,
        extract_path: Option<&Path>,
        delete_after: bool,
    ) -> Result<PathBuf, DownloadError> {
        let opts = FetchOptions::default()
            .with_timeout(self.timeout)
            .with_overwrite(true);
        let archive_path = self.client.save(url, None, &opts).await?;

        let destination = match extract_path.filter(|p| !p.to_string_lossy().trim().is_empty()) {
            Some(path) => self.client.base_dir().resolve(path),
            None => archive_path.with_extension(""),
        };
        debug!(
            archive = %archive_path.display(),
            destination = %destination.display(),
            "resolved extraction directory"
        );

        let files = {
            let archive_path = archive_path.clone();
            let destination = destination.clone();
            tokio::task::spawn_blocking(move || extract_zip(&archive_path, &destination))
                .await
                .map_err(|_| DownloadError::TaskPanicked {
                    url: url.to_string(),
                })??
        };

        if delete_after && tokio::fs::metadata(&archive_path).await.is_ok_and(|m| m.is_file()) {
            tokio::fs::remove_file(&archive_path)
                .await
                .map_err(|e| DownloadError::io(archive_path.clone(), e))?;
            debug!(archive = %archive_path.display(), "removed archive after extraction");
        }

        info!(destination = %destination.display(), files, "extraction complete");
        Ok(destination)
    }
}
