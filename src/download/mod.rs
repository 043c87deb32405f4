//! HTTP download engine for fetching resources and streaming files to disk.
//!
//! This module provides functionality for fetching single resources over
//! HTTP/HTTPS (bytes, text, JSON, headers), saving them to disk, copying
//! `ftp://` and `file://` resources, and saving many URLs concurrently.
//!
//! # Features
//!
//! - Streaming saves (memory-efficient for large files)
//! - Filename resolution from Content-Disposition headers and URLs
//! - Overwrite protection that skips the request when a file is present
//! - Bounded-concurrency batch saves that wait for every task
//! - Structured error types with full context
//!
//! # Example
//!
//! ```no_run
//! use dload_core::download::{FetchOptions, HttpClient};
//!
//! # async fn example() -> Result<(), Box<dyn std::error::Error>> {
//! let client = HttpClient::new();
//! let file_path = client
//!     .save("https://example.com/paper.pdf", None, &FetchOptions::default())
//!     .await?;
//! println!("Downloaded: {}", file_path.display());
//! # Ok(())
//! # }
//! ```

mod base_dir;
mod client;
pub mod constants;
mod engine;
mod error;
pub mod filename;
mod ftp;
mod options;
mod speed;

pub use base_dir::BaseDir;
pub use client::{HttpClient, HttpClientBuilder};
pub use engine::{BatchDownloader, BatchInput};
pub use error::{DownloadError, ErrorKind};
pub use options::FetchOptions;
pub use speed::{
    DEFAULT_SPEED_TEST_URL, IpVersion, SPEED_TEST_SIZES_MB, SpeedTest, ThroughputReport,
};
