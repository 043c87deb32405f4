//! CLI argument definitions using clap derive macros.

use std::path::PathBuf;

use clap::{Parser, Subcommand};

use dload_core::IpVersion;

/// Fetch remote files and save them locally.
///
/// Each subcommand maps to one library operation. Errors exit non-zero
/// unless `--no-raise` is given, in which case the empty result is printed.
#[derive(Parser, Debug)]
#[command(name = "dload")]
#[command(author, version, about)]
pub struct Args {
    /// Increase output verbosity (-v for debug, -vv for trace)
    #[arg(short, long, action = clap::ArgAction::Count, global = true)]
    pub verbose: u8,

    /// Suppress non-error output
    #[arg(short, long, global = true)]
    pub quiet: bool,

    /// Print an empty result instead of failing
    #[arg(long, global = true)]
    pub no_raise: bool,

    /// Per-request timeout in seconds (1-3600)
    #[arg(long, global = true, value_parser = clap::value_parser!(u64).range(1..=3600))]
    pub timeout: Option<u64>,

    /// Base directory for relative and derived destinations
    #[arg(short = 'C', long, global = true)]
    pub base_dir: Option<PathBuf>,

    /// Config file (defaults to $XDG_CONFIG_HOME/dload/config.toml)
    #[arg(long, global = true)]
    pub config: Option<PathBuf>,

    #[command(subcommand)]
    pub command: Command,
}

/// Operations exposed by the binary.
#[derive(Subcommand, Debug, PartialEq, Eq)]
pub enum Command {
    /// Write the response body to stdout as raw bytes
    Bytes {
        /// Resource URL
        url: String,
    },

    /// Stream a resource to disk and print the saved path
    Save {
        /// Resource URL
        url: String,
        /// Destination file (derived from the response when omitted)
        path: Option<PathBuf>,
        /// Replace an existing destination file
        #[arg(long)]
        overwrite: bool,
        /// Write-buffer size in bytes
        #[arg(long, value_parser = clap::value_parser!(u64).range(1..=16_777_216))]
        chunk_size: Option<u64>,
    },

    /// Print the response body as text
    Text {
        /// Resource URL
        url: String,
        /// Decode with this encoding label instead of the response charset
        #[arg(long)]
        encoding: Option<String>,
    },

    /// Print the response body as pretty JSON
    Json {
        /// Resource URL
        url: String,
    },

    /// Print response headers from a HEAD request
    Headers {
        /// Resource URL
        url: String,
        /// Report a redirect response instead of following it
        #[arg(long)]
        no_redirects: bool,
    },

    /// Save an ftp:// or file:// resource
    Ftp {
        /// Resource URL
        url: String,
        /// Destination file (URL file name when omitted)
        path: Option<PathBuf>,
        /// Replace an existing destination file
        #[arg(long)]
        overwrite: bool,
    },

    /// Save many URLs concurrently
    Multi {
        /// URLs to save
        #[arg(required_unless_present = "file", conflicts_with = "file")]
        urls: Vec<String>,
        /// Text file with one URL per line
        #[arg(short, long)]
        file: Option<PathBuf>,
        /// Shared destination directory
        #[arg(short, long)]
        dir: Option<PathBuf>,
        /// Maximum concurrent downloads (1-100)
        #[arg(short = 't', long, value_parser = clap::value_parser!(u64).range(1..=100))]
        max_threads: Option<u64>,
        /// Delay between worker launches in milliseconds (max 60000)
        #[arg(long, value_parser = clap::value_parser!(u64).range(0..=60000))]
        stagger_ms: Option<u64>,
    },

    /// Measure download throughput against a public test file
    Speed {
        /// Test file size in MB: 5, 10, 20, 50, 100, 200, 512 or 1024
        #[arg(default_value_t = 5)]
        size: u32,
        /// IP family of the test host (ipv4 or ipv6)
        #[arg(long, default_value = "ipv4")]
        ip: IpVersion,
        /// Test host port
        #[arg(long, default_value_t = 80)]
        port: u16,
        /// Test file URL template with {ip}, {port} and {size} placeholders
        #[arg(long)]
        url_template: Option<String>,
    },

    /// Save a zip archive and extract it
    Unzip {
        /// Archive URL
        url: String,
        /// Extraction directory (archive name without extension when omitted)
        extract_path: Option<PathBuf>,
        /// Remove the archive after extraction
        #[arg(long)]
        delete_after: bool,
    },

    /// Download the default branch of a git repository as a snapshot
    Clone {
        /// Repository URL ending in .git
        git_url: String,
        /// Target directory, must end with a path separator
        target_dir: Option<PathBuf>,
        /// Repository metadata API base URL
        #[arg(long)]
        api_base: Option<String>,
    },
}
