//! Zip archive downloads and repository snapshots.
//!
//! [`ArchiveFetcher`] saves a zip archive through the
//! [`HttpClient`](crate::download::HttpClient) and extracts it;
//! [`RepositoryFetcher`] turns a `.git` URL into the archive of its default
//! branch and hands it to the archive fetcher.
//!
//! A file that is not a readable zip is reported as
//! [`DownloadError::Archive`](crate::download::DownloadError::Archive), never
//! as a network failure.

mod extract;
mod fetcher;
mod repository;

pub use extract::extract_zip;
pub use fetcher::ArchiveFetcher;
pub use repository::RepositoryFetcher;
