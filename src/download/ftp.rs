//! Saving over non-HTTP transports (`ftp://` and `file://`).
//!
//! There is no response header here, so the destination name comes from the
//! URL path or the synthesized fallback, never from `Content-Disposition`.

use std::io::{self, BufWriter, Read, Write};
use std::net::{TcpStream, ToSocketAddrs};
use std::path::{Path, PathBuf};
use std::time::Duration;

use suppaftp::types::FileType;
use suppaftp::{FtpError, FtpStream};
use tracing::{debug, info, instrument};
use url::Url;

use super::client::{HttpClient, ensure_parent_dir};
use super::error::DownloadError;
use super::filename::default_filename;
use super::options::FetchOptions;

const DEFAULT_FTP_PORT: u16 = 21;
const ANONYMOUS_USER: &str = "anonymous";
const ANONYMOUS_PASSWORD: &str = "anonymous@";

impl HttpClient {
    /// Copies an `ftp://` or `file://` resource to disk.
    ///
    /// Destination and overwrite rules match [`save`](Self::save), except the
    /// existence check always runs before connecting. FTP credentials may be
    /// embedded in the URL; otherwise an anonymous login is used. The timeout
    /// in `opts` applies to every FTP socket read and write.
    ///
    /// # Errors
    ///
    /// Returns [`DownloadError::UnsupportedScheme`] for other schemes,
    /// [`DownloadError::Ftp`] for FTP session failures,
    /// [`DownloadError::Timeout`] when the server stops responding, and
    /// [`DownloadError::Io`] for local filesystem failures.
    #[instrument(skip(self, opts), fields(url = %url))]
    pub async fn save_via_transport(
        &self,
        url: &str,
        path: Option<&Path>,
        opts: &FetchOptions,
    ) -> Result<PathBuf, DownloadError> {
        let parsed = Url::parse(url).map_err(|_| DownloadError::invalid_url(url))?;
        if !matches!(parsed.scheme(), "ftp" | "file") {
            return Err(DownloadError::UnsupportedScheme {
                url: url.to_string(),
                scheme: parsed.scheme().to_string(),
            });
        }

        let destination = match path.filter(|p| !p.to_string_lossy().trim().is_empty()) {
            Some(path) => self.base_dir().resolve(path),
            None => self.base_dir().dir().join(default_filename(url)),
        };

        if !opts.overwrite
            && tokio::fs::metadata(&destination)
                .await
                .is_ok_and(|meta| meta.is_file())
        {
            debug!(path = %destination.display(), "destination exists, skipping transfer");
            return Ok(destination);
        }

        let bytes = if parsed.scheme() == "file" {
            copy_local_file(&parsed, url, &destination).await?
        } else {
            let url_owned = url.to_string();
            let target = destination.clone();
            let timeout = opts.timeout;
            let chunk_size = opts.chunk_size;
            tokio::task::spawn_blocking(move || {
                ftp_retrieve(&parsed, &url_owned, &target, timeout, chunk_size)
            })
            .await
            .map_err(|_| DownloadError::TaskPanicked {
                url: url.to_string(),
            })??
        };

        info!(path = %destination.display(), bytes, "transfer complete");
        Ok(destination)
    }
}

async fn copy_local_file(
    parsed: &Url,
    url: &str,
    destination: &Path,
) -> Result<u64, DownloadError> {
    let source = parsed
        .to_file_path()
        .map_err(|()| DownloadError::invalid_url(url))?;
    // Opening the source first keeps a missing source from creating directories.
    tokio::fs::metadata(&source)
        .await
        .map_err(|e| DownloadError::io(source.clone(), e))?;
    ensure_parent_dir(destination).await?;
    tokio::fs::copy(&source, destination)
        .await
        .map_err(|e| DownloadError::io(destination, e))
}

fn ftp_retrieve(
    parsed: &Url,
    url: &str,
    destination: &Path,
    timeout: Duration,
    chunk_size: usize,
) -> Result<u64, DownloadError> {
    let host = parsed
        .host_str()
        .filter(|host| !host.is_empty())
        .ok_or_else(|| DownloadError::invalid_url(url))?;
    let port = parsed.port().unwrap_or(DEFAULT_FTP_PORT);
    let addr = (host, port)
        .to_socket_addrs()
        .map_err(|e| DownloadError::ftp(url, FtpError::ConnectionError(e)))?
        .next()
        .ok_or_else(|| DownloadError::invalid_url(url))?;

    // The timeout bounds every socket operation, including the greeting.
    let control = TcpStream::connect_timeout(&addr, timeout)
        .map_err(|e| DownloadError::ftp(url, FtpError::ConnectionError(e)))?;
    set_socket_timeouts(&control, timeout).map_err(|e| DownloadError::ftp(url, e))?;
    let mut ftp = FtpStream::connect_with_stream(control).map_err(|e| DownloadError::ftp(url, e))?;

    let user = decode_component(parsed.username());
    let password = parsed.password().map(decode_component).unwrap_or_default();
    let (user, password) = if user.is_empty() {
        (ANONYMOUS_USER.to_string(), ANONYMOUS_PASSWORD.to_string())
    } else {
        (user, password)
    };
    ftp.login(user.as_str(), password.as_str())
        .map_err(|e| DownloadError::ftp(url, e))?;
    ftp.transfer_type(FileType::Binary)
        .map_err(|e| DownloadError::ftp(url, e))?;

    let mut segments: Vec<String> = parsed
        .path_segments()
        .map(|segments| segments.map(decode_component).collect())
        .unwrap_or_default();
    let file_name = segments
        .pop()
        .filter(|name| !name.is_empty())
        .ok_or_else(|| DownloadError::invalid_url(url))?;
    for dir in segments.iter().filter(|dir| !dir.is_empty()) {
        ftp.cwd(dir.as_str()).map_err(|e| DownloadError::ftp(url, e))?;
    }

    let mut reader = ftp
        .retr_as_stream(file_name.as_str())
        .map_err(|e| DownloadError::ftp(url, e))?;
    set_socket_timeouts(reader.get_ref(), timeout).map_err(|e| DownloadError::ftp(url, e))?;

    let parent_result = destination
        .parent()
        .filter(|parent| !parent.as_os_str().is_empty())
        .map_or(Ok(()), std::fs::create_dir_all);
    parent_result.map_err(|e| DownloadError::io(destination, e))?;

    let file =
        std::fs::File::create(destination).map_err(|e| DownloadError::io(destination, e))?;
    let writer = BufWriter::with_capacity(chunk_size.max(1), file);
    let bytes = match copy_data(&mut reader, writer, url, destination, chunk_size) {
        Ok(bytes) => bytes,
        Err(e) => {
            let _ = std::fs::remove_file(destination);
            return Err(e);
        }
    };

    ftp.finalize_retr_stream(reader)
        .map_err(|e| DownloadError::ftp(url, e))?;
    if let Err(e) = ftp.quit() {
        debug!(error = %e, "FTP quit failed after transfer");
    }
    Ok(bytes)
}

fn set_socket_timeouts(stream: &TcpStream, timeout: Duration) -> Result<(), FtpError> {
    stream
        .set_read_timeout(Some(timeout))
        .and_then(|()| stream.set_write_timeout(Some(timeout)))
        .map_err(FtpError::ConnectionError)
}

/// Streams the data connection to disk. Read failures belong to the
/// transfer, write failures to the destination.
fn copy_data(
    reader: &mut impl Read,
    mut writer: BufWriter<std::fs::File>,
    url: &str,
    destination: &Path,
    chunk_size: usize,
) -> Result<u64, DownloadError> {
    let mut buf = vec![0_u8; chunk_size.max(1)];
    let mut total = 0_u64;
    loop {
        let n = match reader.read(&mut buf) {
            Ok(0) => break,
            Ok(n) => n,
            Err(e) if e.kind() == io::ErrorKind::Interrupted => continue,
            Err(e) => return Err(DownloadError::ftp(url, FtpError::ConnectionError(e))),
        };
        writer
            .write_all(&buf[..n])
            .map_err(|e| DownloadError::io(destination, e))?;
        total += n as u64;
    }
    writer
        .flush()
        .map_err(|e| DownloadError::io(destination, e))?;
    Ok(total)
}

fn decode_component(raw: &str) -> String {
    urlencoding::decode(raw).map_or_else(|_| raw.to_string(), std::borrow::Cow::into_owned)
}
