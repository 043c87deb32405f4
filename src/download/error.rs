//! Error types for the download module.
//!
//! This module defines structured errors for all fetch, save, and extract
//! operations, providing context-rich error messages for debugging and user
//! feedback.

use std::path::PathBuf;

use thiserror::Error;

/// Coarse classification of a [`DownloadError`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorKind {
    /// DNS, connection, TLS, timeout, or FTP session failure.
    Transport,
    /// The server answered with a non-success status.
    Status,
    /// The response body could not be parsed or decoded.
    MalformedBody,
    /// Local filesystem failure (permission, missing path, full disk).
    Filesystem,
    /// The downloaded archive is not a readable zip file.
    CorruptedArchive,
    /// The caller supplied a URL or path that cannot be used.
    InvalidInput,
}

/// Errors that can occur while fetching or saving remote resources.
#[derive(Debug, Error)]
pub enum DownloadError {
    /// Network-level error (DNS resolution, connection refused, TLS errors, etc.)
    #[error("network error downloading {url}: {source}")]
    Network {
        /// The URL that failed to download.
        url: String,
        /// The underlying network error.
        #[source]
        source: reqwest::Error,
    },

    /// Request timed out before completion.
    #[error("timeout downloading {url}")]
    Timeout {
        /// The URL that timed out.
        url: String,
    },

    /// HTTP error response (4xx client errors, 5xx server errors).
    #[error("HTTP {status} downloading {url}")]
    HttpStatus {
        /// The URL that returned an error status.
        url: String,
        /// The HTTP status code.
        status: u16,
    },

    /// File system error during download (create file, write, etc.)
    #[error("IO error writing to {path}: {source}")]
    Io {
        /// The file path where the error occurred.
        path: PathBuf,
        /// The underlying IO error.
        #[source]
        source: std::io::Error,
    },

    /// The provided URL is malformed or invalid.
    #[error("invalid URL: {url}")]
    InvalidUrl {
        /// The invalid URL string.
        url: String,
    },

    /// The response body could not be interpreted (bad JSON, unknown charset).
    #[error("malformed response from {url}: {reason}")]
    Decode {
        /// The URL whose body failed to decode.
        url: String,
        /// What went wrong.
        reason: String,
    },

    /// The archive on disk is not a valid zip file.
    #[error("corrupted archive {path}: {source}")]
    Archive {
        /// The archive path.
        path: PathBuf,
        /// The underlying zip error.
        #[source]
        source: zip::result::ZipError,
    },

    /// Repository URL does not end with `.git`.
    #[error("invalid repository URL {url}: must end with .git")]
    InvalidRepositoryUrl {
        /// The rejected URL.
        url: String,
    },

    /// An explicit clone destination that does not look like a directory path.
    #[error("invalid destination {path}: must end with a path separator")]
    InvalidDestination {
        /// The rejected destination.
        path: String,
    },

    /// FTP session failure (connect, login, transfer).
    #[error("FTP error downloading {url}: {source}")]
    Ftp {
        /// The FTP URL.
        url: String,
        /// The underlying FTP error.
        #[source]
        source: suppaftp::FtpError,
    },

    /// The alternate transport was handed a scheme it cannot open.
    #[error("unsupported scheme '{scheme}' in {url}")]
    UnsupportedScheme {
        /// The URL.
        url: String,
        /// The scheme found in the URL.
        scheme: String,
    },

    /// Throughput probe size outside the published test files.
    #[error("invalid speed test size {size}MB: expected one of 5, 10, 20, 50, 100, 200, 512, 1024")]
    InvalidSpeedTestSize {
        /// The requested size in megabytes.
        size: u32,
    },

    /// A batch worker panicked before recording a result.
    #[error("download task for {url} panicked")]
    TaskPanicked {
        /// The URL the task was downloading.
        url: String,
    },
}

impl DownloadError {
    /// Creates a network error from a reqwest error.
    ///
    /// Timeouts are promoted to [`DownloadError::Timeout`].
    pub fn network(url: impl Into<String>, source: reqwest::Error) -> Self {
        if source.is_timeout() {
            return Self::Timeout { url: url.into() };
        }
        Self::Network {
            url: url.into(),
            source,
        }
    }

    /// Creates an HTTP status error.
    pub fn http_status(url: impl Into<String>, status: u16) -> Self {
        Self::HttpStatus {
            url: url.into(),
            status,
        }
    }

    /// Creates a timeout error.
    pub fn timeout(url: impl Into<String>) -> Self {
        Self::Timeout { url: url.into() }
    }

    /// Creates an IO error.
    pub fn io(path: impl Into<PathBuf>, source: std::io::Error) -> Self {
        Self::Io {
            path: path.into(),
            source,
        }
    }

    /// Creates an invalid URL error.
    pub fn invalid_url(url: impl Into<String>) -> Self {
        Self::InvalidUrl { url: url.into() }
    }

    /// Creates a malformed-body error.
    pub fn decode(url: impl Into<String>, reason: impl Into<String>) -> Self {
        Self::Decode {
            url: url.into(),
            reason: reason.into(),
        }
    }

    /// Creates a corrupted-archive error.
    ///
    /// IO failures reported through the zip reader stay filesystem errors.
    pub fn archive(path: impl Into<PathBuf>, source: zip::result::ZipError) -> Self {
        match source {
            zip::result::ZipError::Io(io) => Self::Io {
                path: path.into(),
                source: io,
            },
            other => Self::Archive {
                path: path.into(),
                source: other,
            },
        }
    }

    /// Creates a corrupted-archive error for a failed read of entry data.
    ///
    /// Checksum mismatches and decompression failures inside an entry surface
    /// as IO errors from the entry reader.
    pub fn corrupted_entry(path: impl Into<PathBuf>, source: std::io::Error) -> Self {
        Self::Archive {
            path: path.into(),
            source: zip::result::ZipError::Io(source),
        }
    }

    /// Creates an FTP error.
    ///
    /// Socket timeouts are promoted to [`DownloadError::Timeout`].
    pub fn ftp(url: impl Into<String>, source: suppaftp::FtpError) -> Self {
        let timed_out = matches!(
            &source,
            suppaftp::FtpError::ConnectionError(io)
                if matches!(io.kind(), std::io::ErrorKind::TimedOut | std::io::ErrorKind::WouldBlock)
        );
        if timed_out {
            return Self::Timeout { url: url.into() };
        }
        Self::Ftp {
            url: url.into(),
            source,
        }
    }

    /// Returns the coarse category of this error.
    #[must_use]
    pub fn kind(&self) -> ErrorKind {
        match self {
            Self::Network { .. } | Self::Timeout { .. } | Self::Ftp { .. } => {
                ErrorKind::Transport
            }
            Self::HttpStatus { .. } => ErrorKind::Status,
            Self::Decode { .. } => ErrorKind::MalformedBody,
            Self::Io { .. } | Self::TaskPanicked { .. } => ErrorKind::Filesystem,
            Self::Archive { .. } => ErrorKind::CorruptedArchive,
            Self::InvalidUrl { .. }
            | Self::InvalidRepositoryUrl { .. }
            | Self::InvalidDestination { .. }
            | Self::UnsupportedScheme { .. }
            | Self::InvalidSpeedTestSize { .. } => ErrorKind::InvalidInput,
        }
    }
}
