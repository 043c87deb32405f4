//! Error suppression for callers that prefer empty values over errors.
//!
//! Every operation in this crate returns `Result<T, DownloadError>`. Use `?`
//! to propagate, or [`Suppress::or_empty`] to log the failure and continue
//! with the type's empty value:
//!
//! ```no_run
//! use dload_core::{FetchOptions, HttpClient, Suppress};
//!
//! # async fn example() {
//! let client = HttpClient::new();
//! let body = client
//!     .fetch_bytes("https://example.com/data.bin", &FetchOptions::default())
//!     .await
//!     .or_empty();
//! if body.is_empty() {
//!     println!("nothing fetched");
//! }
//! # }
//! ```

use std::collections::BTreeMap;
use std::fmt::Display;
use std::path::PathBuf;

use tracing::warn;

/// Types with a sentinel "nothing fetched" value.
pub trait Empty {
    /// Returns the empty value.
    fn empty() -> Self;
}

impl Empty for Vec<u8> {
    fn empty() -> Self {
        Vec::new()
    }
}

impl Empty for String {
    fn empty() -> Self {
        String::new()
    }
}

impl Empty for PathBuf {
    fn empty() -> Self {
        PathBuf::new()
    }
}

impl Empty for serde_json::Value {
    /// An empty JSON object.
    fn empty() -> Self {
        serde_json::Value::Object(serde_json::Map::new())
    }
}

impl Empty for BTreeMap<String, String> {
    fn empty() -> Self {
        BTreeMap::new()
    }
}

impl Empty for bool {
    fn empty() -> Self {
        false
    }
}

impl Empty for () {
    fn empty() -> Self {}
}

/// Converts a failed result into an empty value or a boolean outcome.
pub trait Suppress {
    /// The success payload.
    type Output;

    /// Returns the payload, or logs the error and returns the empty value.
    fn or_empty(self) -> Self::Output
    where
        Self::Output: Empty;

    /// Returns `true` on success; logs the error and returns `false` otherwise.
    fn succeeded(self) -> bool;
}

impl<T, E: Display> Suppress for Result<T, E> {
    type Output = T;

    fn or_empty(self) -> T
    where
        T: Empty,
    {
        match self {
            Ok(value) => value,
            Err(e) => {
                warn!(error = %e, "suppressed error");
                T::empty()
            }
        }
    }

    fn succeeded(self) -> bool {
        match self {
            Ok(_) => true,
            Err(e) => {
                warn!(error = %e, "suppressed error");
                false
            }
        }
    }
}
