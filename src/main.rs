//! CLI entry point for the dload tool.

use std::collections::BTreeMap;
use std::io::{self, Write};
use std::path::Path;
use std::time::Duration;

use anyhow::{Context, Result};
use clap::Parser;
use dload_core::download::constants::{
    DEFAULT_CHUNK_SIZE, DEFAULT_MAX_THREADS, DEFAULT_STAGGER, DEFAULT_TIMEOUT,
};
use dload_core::{
    ArchiveFetcher, BaseDir, BatchDownloader, BatchInput, DownloadError, Empty, FetchOptions,
    HttpClient, RepositoryFetcher, SpeedTest, Suppress, ThroughputReport,
};
use tracing::{debug, info};

mod app_config;
mod cli;

use app_config::{FileConfig, load_file_config_from};
use cli::{Args, Command};

/// Settings resolved from CLI flags over config file values.
#[derive(Debug)]
struct Settings {
    timeout: Duration,
    chunk_size: usize,
    max_threads: usize,
    stagger: Duration,
    no_raise: bool,
    quiet: bool,
}

#[tokio::main]
async fn main() -> Result<()> {
    // Parse CLI arguments first (before tracing, so --help works without logs)
    let args = Args::parse();

    // Priority: RUST_LOG env var > quiet flag > verbose flag > default (info)
    let default_level = if args.quiet {
        "error"
    } else {
        match args.verbose {
            0 => "info",
            1 => "debug",
            _ => "trace",
        }
    };

    let filter = tracing_subscriber::EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new(default_level));

    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(io::stderr)
        .init();

    debug!(?args, "CLI arguments parsed");

    let loaded = load_file_config_from(args.config.as_deref())?;
    if let Some(path) = &loaded.path {
        debug!(path = %path.display(), loaded = loaded.config.is_some(), "config file");
    }
    let file_config = loaded.config.unwrap_or_default();

    let client = build_client(&args, &file_config)?;
    let settings = Settings {
        timeout: args
            .timeout
            .or(file_config.timeout_secs)
            .map_or(DEFAULT_TIMEOUT, Duration::from_secs),
        chunk_size: file_config.chunk_size.unwrap_or(DEFAULT_CHUNK_SIZE),
        max_threads: file_config.max_threads.unwrap_or(DEFAULT_MAX_THREADS),
        stagger: file_config
            .stagger_ms
            .map_or(DEFAULT_STAGGER, Duration::from_millis),
        no_raise: args.no_raise,
        quiet: args.quiet,
    };

    run(args.command, &client, &settings).await
}

fn build_client(args: &Args, file_config: &FileConfig) -> Result<HttpClient> {
    let base_dir = args
        .base_dir
        .as_ref()
        .or(file_config.output_dir.as_ref())
        .map_or_else(BaseDir::current, BaseDir::from_path);

    let mut builder = HttpClient::builder().base_dir(base_dir);
    if let Some(user_agent) = &file_config.user_agent {
        builder = builder.user_agent(user_agent.clone());
    }
    builder.build().context("Failed to build HTTP client")
}

async fn run(command: Command, client: &HttpClient, settings: &Settings) -> Result<()> {
    let opts = FetchOptions::default()
        .with_timeout(settings.timeout)
        .with_chunk_size(settings.chunk_size);

    match command {
        Command::Bytes { url } => {
            let body = settle(client.fetch_bytes(&url, &opts).await, settings)?;
            let mut stdout = io::stdout().lock();
            stdout.write_all(&body)?;
            stdout.flush()?;
        }
        Command::Save {
            url,
            path,
            overwrite,
            chunk_size,
        } => {
            let mut opts = opts.with_overwrite(overwrite);
            if let Some(chunk_size) = chunk_size {
                opts = opts.with_chunk_size(usize::try_from(chunk_size)?);
            }
            let saved = settle(client.save(&url, path.as_deref(), &opts).await, settings)?;
            print_path(&saved);
        }
        Command::Text { url, encoding } => {
            let text = settle(
                client.fetch_text(&url, encoding.as_deref(), &opts).await,
                settings,
            )?;
            print!("{text}");
        }
        Command::Json { url } => {
            let value = settle(client.fetch_json(&url, &opts).await, settings)?;
            println!("{}", serde_json::to_string_pretty(&value)?);
        }
        Command::Headers { url, no_redirects } => {
            let headers = settle(
                client.fetch_headers(&url, !no_redirects, &opts).await,
                settings,
            )?;
            print_headers(&headers);
        }
        Command::Ftp {
            url,
            path,
            overwrite,
        } => {
            let opts = opts.with_overwrite(overwrite);
            let saved = settle(
                client
                    .save_via_transport(&url, path.as_deref(), &opts)
                    .await,
                settings,
            )?;
            print_path(&saved);
        }
        Command::Multi {
            urls,
            file,
            dir,
            max_threads,
            stagger_ms,
        } => {
            let max_threads = match max_threads {
                Some(n) => usize::try_from(n)?,
                None => settings.max_threads,
            };
            let batch = BatchDownloader::new(client.clone())
                .with_max_threads(max_threads)
                .with_stagger(stagger_ms.map_or(settings.stagger, Duration::from_millis))
                .with_timeout(settings.timeout);
            let input = match file {
                Some(file) => BatchInput::File(file),
                None => BatchInput::Urls(urls),
            };
            let outcome = batch.run(input, dir.as_deref()).await;
            report_outcome(outcome, settings)?;
        }
        Command::Speed {
            size,
            ip,
            port,
            url_template,
        } => {
            let outcome: Result<ThroughputReport, DownloadError> = async {
                let mut test = SpeedTest::new(size)?
                    .with_ip_version(ip)
                    .with_port(port)
                    .with_progress(!settings.quiet);
                if let Some(template) = url_template {
                    test = test.with_url_template(template);
                }
                client.measure_throughput(&test).await
            }
            .await;
            let outcome = outcome.map(|report| {
                info!(mbps = report.mbps(), bytes = report.bytes, "throughput");
            });
            report_outcome(outcome, settings)?;
        }
        Command::Unzip {
            url,
            extract_path,
            delete_after,
        } => {
            let fetcher = ArchiveFetcher::new(client.clone()).with_timeout(settings.timeout);
            let extracted = settle(
                fetcher
                    .save_and_extract(&url, extract_path.as_deref(), delete_after)
                    .await,
                settings,
            )?;
            print_path(&extracted);
        }
        Command::Clone {
            git_url,
            target_dir,
            api_base,
        } => {
            let mut repos = RepositoryFetcher::new(
                ArchiveFetcher::new(client.clone()).with_timeout(settings.timeout),
            );
            if let Some(api_base) = api_base {
                repos = repos.with_api_base(api_base);
            }
            let cloned = settle(
                repos.clone_archive(&git_url, target_dir.as_deref()).await,
                settings,
            )?;
            print_path(&cloned);
        }
    }
    Ok(())
}

/// Propagates the error, or with `--no-raise` logs it and yields the empty value.
fn settle<T: Empty>(result: Result<T, DownloadError>, settings: &Settings) -> Result<T> {
    if settings.no_raise {
        Ok(result.or_empty())
    } else {
        Ok(result?)
    }
}

/// For operations with a boolean outcome. With `--no-raise` prints `true` or
/// `false`; otherwise propagates the error.
fn report_outcome(outcome: Result<(), DownloadError>, settings: &Settings) -> Result<()> {
    if settings.no_raise {
        println!("{}", outcome.succeeded());
        return Ok(());
    }
    Ok(outcome?)
}

fn print_path(path: &Path) {
    println!("{}", path.display());
}

fn print_headers(headers: &BTreeMap<String, String>) {
    for (name, value) in headers {
        println!("{name}: {value}");
    }
}
