//! Clone a git repository by downloading its default-branch archive.

use std::path::{Path, PathBuf};
use std::sync::LazyLock;

use regex::Regex;
use serde::Deserialize;
use tracing::{debug, instrument, warn};
use url::Url;

use super::fetcher::ArchiveFetcher;
use crate::download::constants::{FALLBACK_BRANCH, GITHUB_API_BASE};
use crate::download::{DownloadError, FetchOptions};

#[allow(clippy::expect_used)]
static GIT_SUFFIX: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"(?i)\.git$").expect("git suffix regex is valid") // Static pattern, safe to panic
});

const GITHUB_HOST: &str = "github.com";

#[derive(Debug, Deserialize)]
struct RepoMetadata {
    default_branch: Option<String>,
}

/// Fetches repository snapshots as zip archives.
///
/// # Example
///
/// ```no_run
/// use dload_core::{ArchiveFetcher, HttpClient, RepositoryFetcher};
///
/// # async fn example() -> Result<(), Box<dyn std::error::Error>> {
/// let repos = RepositoryFetcher::new(ArchiveFetcher::new(HttpClient::new()));
/// let dir = repos
///     .clone_archive("https://github.com/x011/dload.git", None)
///     .await?;
/// println!("Cloned into {}", dir.display());
/// # Ok(())
/// # }
/// ```
#[derive(Debug, Clone)]
pub struct RepositoryFetcher {
    archive: ArchiveFetcher,
    api_base: String,
    metadata_host: String,
}

impl RepositoryFetcher {
    /// Creates a fetcher that looks up default branches on the GitHub API.
    #[must_use]
    pub fn new(archive: ArchiveFetcher) -> Self {
        Self {
            archive,
            api_base: GITHUB_API_BASE.to_string(),
            metadata_host: GITHUB_HOST.to_string(),
        }
    }

    /// Overrides the metadata API base URL.
    #[must_use]
    pub fn with_api_base(mut self, api_base: impl Into<String>) -> Self {
        self.api_base = api_base.into().trim_end_matches('/').to_string();
        self
    }

    /// Overrides the repository host whose URLs get a default-branch lookup.
    #[must_use]
    pub fn with_metadata_host(mut self, host: impl Into<String>) -> Self {
        self.metadata_host = host.into();
        self
    }

    /// Downloads the default branch of `git_url` and extracts it.
    ///
    /// `git_url` must end in `.git` (any case). The default branch is looked
    /// up on the metadata API for hosted repositories and falls back to
    /// `master` when the lookup fails or is inconclusive. An explicit
    /// `target_dir` must end with a path separator; without one the snapshot
    /// lands in a directory named after the repository.
    ///
    /// # Errors
    ///
    /// Returns [`DownloadError::InvalidRepositoryUrl`] or
    /// [`DownloadError::InvalidDestination`] before any request is sent, and
    /// otherwise the errors of [`ArchiveFetcher::save_and_extract`].
    #[instrument(skip(self), fields(url = %git_url))]
    pub async fn clone_archive(
        &self,
        git_url: &str,
        target_dir: Option<&Path>,
    ) -> Result<PathBuf, DownloadError> {
        let repo_url = repository_url(git_url)?;

        let destination = match target_dir.filter(|p| !p.as_os_str().is_empty()) {
            Some(dir) => {
                let raw = dir.to_string_lossy();
                if !raw.ends_with(['/', '\\']) {
                    return Err(DownloadError::InvalidDestination {
                        path: raw.into_owned(),
                    });
                }
                dir.to_path_buf()
            }
            None => self
                .archive
                .client()
                .base_dir()
                .dir()
                .join(repository_name(&repo_url)),
        };

        let branch = self.default_branch(&repo_url).await;
        let archive_url = format!("{repo_url}/archive/refs/heads/{branch}.zip");
        debug!(%archive_url, destination = %destination.display(), "resolved repository archive");

        let stale = self
            .archive
            .client()
            .base_dir()
            .dir()
            .join(format!("{branch}.zip"));
        if tokio::fs::metadata(&stale).await.is_ok_and(|m| m.is_file()) {
            tokio::fs::remove_file(&stale)
                .await
                .map_err(|e| DownloadError::io(stale.clone(), e))?;
            debug!(path = %stale.display(), "removed stale archive");
        }

        self.archive
            .save_and_extract(&archive_url, Some(&destination), true)
            .await
    }

    /// Default branch from the metadata API, or `master`.
    async fn default_branch(&self, repo_url: &str) -> String {
        let Some(api_url) = self.metadata_url(repo_url) else {
            return FALLBACK_BRANCH.to_string();
        };

        let opts = FetchOptions::default();
        match self
            .archive
            .client()
            .fetch_json_as::<RepoMetadata>(&api_url, &opts)
            .await
        {
            Ok(RepoMetadata {
                default_branch: Some(branch),
            }) if !branch.trim().is_empty() => branch.trim().to_string(),
            Ok(_) => {
                debug!(%api_url, "no default branch in metadata, using fallback");
                FALLBACK_BRANCH.to_string()
            }
            Err(e) => {
                warn!(%api_url, error = %e, "default branch lookup failed, using fallback");
                FALLBACK_BRANCH.to_string()
            }
        }
    }

    fn metadata_url(&self, repo_url: &str) -> Option<String> {
        let parsed = Url::parse(repo_url).ok()?;
        if !parsed
            .host_str()
            .is_some_and(|host| host.eq_ignore_ascii_case(&self.metadata_host))
        {
            return None;
        }
        let mut segments = parsed.path_segments()?.filter(|s| !s.is_empty());
        let owner = segments.next()?;
        let repo = segments.next()?;
        Some(format!("{}/repos/{owner}/{repo}", self.api_base))
    }
}

/// The repository URL without its `.git` suffix.
fn repository_url(git_url: &str) -> Result<String, DownloadError> {
    let trimmed = git_url.trim();
    if !GIT_SUFFIX.is_match(trimmed) {
        return Err(DownloadError::InvalidRepositoryUrl {
            url: git_url.to_string(),
        });
    }
    Ok(GIT_SUFFIX.replace(trimmed, "").into_owned())
}

fn repository_name(repo_url: &str) -> &str {
    repo_url
        .trim_end_matches('/')
        .rsplit('/')
        .next()
        .unwrap_or(repo_url)
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;
    use crate::download::{BaseDir, ErrorKind, HttpClient};
    use tempfile::TempDir;

    fn fetcher(base: &Path) -> RepositoryFetcher {
        let client = HttpClient::builder()
            .base_dir(BaseDir::from_path(base))
            .build()
            .unwrap();
        RepositoryFetcher::new(ArchiveFetcher::new(client))
    }

    #[test]
    fn test_repository_url_strips_suffix_any_case() {
        assert_eq!(
            repository_url("https://github.com/x011/dload.git").unwrap(),
            "https://github.com/x011/dload"
        );
        assert_eq!(
            repository_url("  https://host/a/b.GIT ").unwrap(),
            "https://host/a/b"
        );
    }

    #[test]
    fn test_repository_url_rejects_missing_suffix() {
        for url in ["not-a-git-url", "https://github.com/x011/dload", "x.git/"] {
            let err = repository_url(url).unwrap_err();
            assert_eq!(err.kind(), ErrorKind::InvalidInput);
        }
    }

    #[test]
    fn test_repository_name_is_last_segment() {
        assert_eq!(repository_name("https://github.com/x011/dload"), "dload");
        assert_eq!(repository_name("plain"), "plain");
    }

    #[test]
    fn test_metadata_url_only_for_metadata_host() {
        let temp_dir = TempDir::new().unwrap();
        let repos = fetcher(temp_dir.path());
        assert_eq!(
            repos.metadata_url("https://GitHub.com/x011/dload").as_deref(),
            Some("https://api.github.com/repos/x011/dload")
        );
        assert_eq!(repos.metadata_url("https://gitlab.com/x011/dload"), None);
        assert_eq!(repos.metadata_url("https://github.com/x011"), None);
    }

    #[tokio::test]
    async fn test_clone_rejects_non_git_url_without_network() {
        let temp_dir = TempDir::new().unwrap();
        let err = fetcher(temp_dir.path())
            .clone_archive("not-a-git-url", None)
            .await
            .unwrap_err();
        assert!(matches!(err, DownloadError::InvalidRepositoryUrl { .. }));
    }

    #[tokio::test]
    async fn test_clone_rejects_destination_without_separator() {
        let temp_dir = TempDir::new().unwrap();
        let target = temp_dir.path().join("checkout");
        let err = fetcher(temp_dir.path())
            .clone_archive("http://127.0.0.1:9/a/b.git", Some(&target))
            .await
            .unwrap_err();
        assert!(matches!(err, DownloadError::InvalidDestination { .. }));
        assert!(!target.exists());
    }

    #[tokio::test]
    async fn test_clone_accepts_either_trailing_separator() {
        let temp_dir = TempDir::new().unwrap();
        for suffix in ["/", "\\"] {
            let checkout = temp_dir.path().join("checkout");
            let target = PathBuf::from(format!("{}{suffix}", checkout.display()));
            let err = fetcher(temp_dir.path())
                .clone_archive("http://127.0.0.1:9/a/b.git", Some(&target))
                .await
                .unwrap_err();
            assert!(
                !matches!(err, DownloadError::InvalidDestination { .. }),
                "{suffix} should pass the destination gate: {err:?}"
            );
        }
    }
}
