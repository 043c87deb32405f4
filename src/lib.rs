//! dload Core Library
//!
//! Fetch remote resources over HTTP, FTP and `file://`, save them to disk,
//! unpack zip archives and repository snapshots, and save many URLs with
//! bounded concurrency.
//!
//! # Architecture
//!
//! The library is organized into the following modules:
//! - [`download`] - Filename resolution, single-resource fetches, batch saves
//!   and the throughput probe
//! - [`archive`] - Save-and-extract and repository clone-by-archive
//! - [`policy`] - Turning errors into empty values for callers that do not
//!   want to handle them
//!
//! # Example
//!
//! ```no_run
//! use dload_core::{FetchOptions, HttpClient};
//!
//! # async fn example() -> Result<(), Box<dyn std::error::Error>> {
//! let client = HttpClient::new();
//! let text = client
//!     .fetch_text("https://example.com/", None, &FetchOptions::default())
//!     .await?;
//! println!("{} characters", text.len());
//! # Ok(())
//! # }
//! ```

// Clippy lints - strict for library code
#![deny(clippy::unwrap_used)]
#![deny(clippy::expect_used)]
#![warn(clippy::pedantic)]
#![allow(clippy::module_name_repetitions)]

pub mod archive;
pub mod download;
pub mod policy;
mod user_agent;

// Re-export commonly used types
pub use archive::{ArchiveFetcher, RepositoryFetcher};
pub use download::{
    BaseDir, BatchDownloader, BatchInput, DownloadError, ErrorKind, FetchOptions, HttpClient,
    HttpClientBuilder, IpVersion, SpeedTest, ThroughputReport,
};
pub use policy::{Empty, Suppress};
