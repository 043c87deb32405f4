//! Download throughput probe against public test files.

use std::fmt;
use std::str::FromStr;
use std::time::{Duration, Instant};

use indicatif::{ProgressBar, ProgressDrawTarget, ProgressStyle};
use reqwest::header::CONTENT_LENGTH;
use tracing::{debug, info, instrument};

use super::client::{HttpClient, next_chunk};
use super::constants::DEFAULT_TIMEOUT;
use super::error::DownloadError;

/// Default test file location. `{ip}`, `{port}` and `{size}` are substituted.
pub const DEFAULT_SPEED_TEST_URL: &str =
    "http://{ip}.download.thinkbroadband.com:{port}/{size}.zip";

const PROGRESS_WIDTH: usize = 30;

/// Published test file sizes, in megabytes.
pub const SPEED_TEST_SIZES_MB: [u32; 8] = [5, 10, 20, 50, 100, 200, 512, 1024];

/// IP family used to reach the test host.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum IpVersion {
    /// `ipv4.` host prefix.
    #[default]
    V4,
    /// `ipv6.` host prefix.
    V6,
}

impl IpVersion {
    /// Host prefix for this IP family.
    #[must_use]
    pub fn as_str(self) -> &'static str {
        match self {
            Self::V4 => "ipv4",
            Self::V6 => "ipv6",
        }
    }
}

impl FromStr for IpVersion {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "ipv4" | "4" => Ok(Self::V4),
            "ipv6" | "6" => Ok(Self::V6),
            other => Err(format!("unknown IP version '{other}': expected ipv4 or ipv6")),
        }
    }
}

impl fmt::Display for IpVersion {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A configured throughput probe.
#[derive(Debug, Clone)]
pub struct SpeedTest {
    size_mb: u32,
    ip_version: IpVersion,
    port: u16,
    url_template: String,
    show_progress: bool,
}

impl SpeedTest {
    /// Creates a probe for one of [`SPEED_TEST_SIZES_MB`].
    ///
    /// # Errors
    ///
    /// Returns [`DownloadError::InvalidSpeedTestSize`] for any other size.
    pub fn new(size_mb: u32) -> Result<Self, DownloadError> {
        if !SPEED_TEST_SIZES_MB.contains(&size_mb) {
            return Err(DownloadError::InvalidSpeedTestSize { size: size_mb });
        }
        Ok(Self {
            size_mb,
            ip_version: IpVersion::V4,
            port: 80,
            url_template: DEFAULT_SPEED_TEST_URL.to_string(),
            show_progress: true,
        })
    }

    /// Sets the IP family.
    #[must_use]
    pub fn with_ip_version(mut self, ip_version: IpVersion) -> Self {
        self.ip_version = ip_version;
        self
    }

    /// Sets the port.
    #[must_use]
    pub fn with_port(mut self, port: u16) -> Self {
        self.port = port;
        self
    }

    /// Overrides the test file URL template.
    #[must_use]
    pub fn with_url_template(mut self, template: impl Into<String>) -> Self {
        self.url_template = template.into();
        self
    }

    /// Enables or disables the stdout progress bar and summary line.
    #[must_use]
    pub fn with_progress(mut self, show_progress: bool) -> Self {
        self.show_progress = show_progress;
        self
    }

    /// File label used by the test host: `1GB` for 1024, otherwise `<n>MB`.
    #[must_use]
    pub fn size_label(&self) -> String {
        if self.size_mb == 1024 {
            "1GB".to_string()
        } else {
            format!("{}MB", self.size_mb)
        }
    }

    /// The URL this probe downloads.
    #[must_use]
    pub fn url(&self) -> String {
        self.url_template
            .replace("{ip}", self.ip_version.as_str())
            .replace("{port}", &self.port.to_string())
            .replace("{size}", &self.size_label())
    }
}

/// Outcome of a throughput probe.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ThroughputReport {
    /// Bytes received.
    pub bytes: u64,
    /// Wall time from request to last byte.
    pub elapsed: Duration,
}

impl ThroughputReport {
    /// Average throughput in megabits per second.
    #[must_use]
    #[allow(clippy::cast_precision_loss)]
    pub fn mbps(&self) -> f64 {
        let secs = self.elapsed.as_secs_f64();
        if secs > 0.0 {
            self.bytes as f64 * 8.0 / secs / 1_000_000.0
        } else {
            0.0
        }
    }
}

impl HttpClient {
    /// Downloads a test file, discarding the body, and reports throughput.
    ///
    /// When progress is enabled and the server sends `Content-Length`, a
    /// bar with the running rate is drawn on stdout; a
    /// `<label> = <secs> seconds` line is printed at the end.
    ///
    /// # Errors
    ///
    /// Returns `DownloadError` if the request fails or the server returns a
    /// non-success status.
    #[instrument(skip(self, test), fields(url = %test.url()))]
    pub async fn measure_throughput(
        &self,
        test: &SpeedTest,
    ) -> Result<ThroughputReport, DownloadError> {
        let url = test.url();
        let start = Instant::now();
        let response = self.send_get(&url, DEFAULT_TIMEOUT).await?;

        let total = response
            .headers()
            .get(CONTENT_LENGTH)
            .and_then(|v| v.to_str().ok())
            .and_then(|v| v.trim().parse::<u64>().ok());
        debug!(?total, "speed test response received");

        let progress = match total {
            Some(total) if test.show_progress => Some(progress_bar(total)),
            _ => None,
        };

        let mut stream = response.bytes_stream();
        let mut downloaded: u64 = 0;
        while let Some(chunk) = next_chunk(&mut stream, &url, DEFAULT_TIMEOUT).await? {
            downloaded += chunk.len() as u64;
            if let Some(bar) = &progress {
                let report = ThroughputReport {
                    bytes: downloaded,
                    elapsed: start.elapsed(),
                };
                bar.set_position(downloaded);
                bar.set_message(format!("{:.2} Mbps", report.mbps()));
            }
        }

        let report = ThroughputReport {
            bytes: downloaded,
            elapsed: start.elapsed(),
        };
        if let Some(bar) = progress {
            bar.finish();
        }
        if test.show_progress {
            println!(
                "{} = {:.2} seconds",
                test.size_label(),
                report.elapsed.as_secs_f64()
            );
        }
        info!(
            bytes = report.bytes,
            elapsed_ms = report.elapsed.as_millis(),
            mbps = report.mbps(),
            "speed test complete"
        );
        Ok(report)
    }
}

fn progress_bar(total: u64) -> ProgressBar {
    let bar = ProgressBar::with_draw_target(Some(total), ProgressDrawTarget::stdout());
    let template = format!("[{{bar:{PROGRESS_WIDTH}}}] {{msg}}");
    bar.set_style(
        ProgressStyle::with_template(&template)
            .unwrap_or_else(|_| ProgressStyle::default_bar())
            .progress_chars("= "),
    );
    bar
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    #[test]
    fn test_speed_test_rejects_unpublished_sizes() {
        for size in [0, 1, 6, 1000, 2048] {
            assert!(matches!(
                SpeedTest::new(size),
                Err(DownloadError::InvalidSpeedTestSize { size: s }) if s == size
            ));
        }
        for size in SPEED_TEST_SIZES_MB {
            assert!(SpeedTest::new(size).is_ok());
        }
    }

    #[test]
    fn test_speed_test_url_labels() {
        let test = SpeedTest::new(5).unwrap();
        assert_eq!(
            test.url(),
            "http://ipv4.download.thinkbroadband.com:80/5MB.zip"
        );

        let test = SpeedTest::new(1024)
            .unwrap()
            .with_ip_version(IpVersion::V6)
            .with_port(8080);
        assert_eq!(
            test.url(),
            "http://ipv6.download.thinkbroadband.com:8080/1GB.zip"
        );
    }

    #[test]
    fn test_ip_version_parse() {
        assert_eq!("ipv4".parse::<IpVersion>().unwrap(), IpVersion::V4);
        assert_eq!("IPv6".parse::<IpVersion>().unwrap(), IpVersion::V6);
        assert!("ipx".parse::<IpVersion>().is_err());
    }

    #[test]
    fn test_report_mbps() {
        let report = ThroughputReport {
            bytes: 1_000_000,
            elapsed: Duration::from_secs(1),
        };
        assert!((report.mbps() - 8.0).abs() < f64::EPSILON);

        let report = ThroughputReport {
            bytes: 10,
            elapsed: Duration::ZERO,
        };
        assert!(report.mbps().abs() < f64::EPSILON);
    }
}
