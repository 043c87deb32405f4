//! Constants for the download module (timeouts, chunking, batch pacing).

use std::time::Duration;

/// Default HTTP connect timeout (30 seconds).
pub const CONNECT_TIMEOUT_SECS: u64 = 30;

/// Default per-request timeout applied by every fetch operation.
pub const DEFAULT_TIMEOUT: Duration = Duration::from_secs(30);

/// Default write-buffer size while streaming a response to disk.
pub const DEFAULT_CHUNK_SIZE: usize = 8192;

/// Default number of concurrent batch workers.
pub const DEFAULT_MAX_THREADS: usize = 1;

/// Default pause between successive batch worker launches.
pub const DEFAULT_STAGGER: Duration = Duration::from_millis(50);

/// Prefix for synthesized file names when neither header nor URL yields one.
pub const SYNTHESIZED_NAME_PREFIX: &str = "dload";

/// Number of low-order digits of the unix time used in synthesized names.
pub const SYNTHESIZED_NAME_DIGITS: usize = 5;

/// Branch used when the default branch of a repository cannot be determined.
pub const FALLBACK_BRANCH: &str = "master";

/// Repository metadata API queried for default branches of github.com URLs.
pub const GITHUB_API_BASE: &str = "https://api.github.com";
