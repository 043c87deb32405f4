//! Per-call options shared by the fetch and save operations.

use std::time::Duration;

use super::constants::{DEFAULT_CHUNK_SIZE, DEFAULT_TIMEOUT};

/// Options applied to a single fetch or save call.
///
/// ```
/// use std::time::Duration;
/// use dload_core::FetchOptions;
///
/// let opts = FetchOptions::default()
///     .with_timeout(Duration::from_secs(5))
///     .with_overwrite(true);
/// assert!(opts.overwrite);
/// assert_eq!(opts.chunk_size, 8192);
/// ```
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct FetchOptions {
    /// Limit for connecting and receiving headers, and for each body read.
    pub timeout: Duration,
    /// Write-buffer size used while streaming a body to disk.
    pub chunk_size: usize,
    /// Replace an existing destination file instead of returning it untouched.
    pub overwrite: bool,
}

impl Default for FetchOptions {
    fn default() -> Self {
        Self {
            timeout: DEFAULT_TIMEOUT,
            chunk_size: DEFAULT_CHUNK_SIZE,
            overwrite: false,
        }
    }
}

impl FetchOptions {
    /// Sets the request timeout.
    #[must_use]
    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }

    /// Sets the streaming chunk size. Zero is raised to one byte.
    #[must_use]
    pub fn with_chunk_size(mut self, chunk_size: usize) -> Self {
        self.chunk_size = chunk_size.max(1);
        self
    }

    /// Sets whether existing files are overwritten.
    #[must_use]
    pub fn with_overwrite(mut self, overwrite: bool) -> Self {
        self.overwrite = overwrite;
        self
    }
}
