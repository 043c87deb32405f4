//! Zip extraction onto the local filesystem.

use std::fs::File;
use std::io::{self, BufWriter, Read, Write};
use std::path::Path;

use tracing::{debug, warn};

use crate::download::DownloadError;

/// Extracts every entry of the zip at `archive_path` into `dest`.
///
/// `dest` and any intermediate directories are created. Entries whose names
/// would escape `dest` (absolute paths, `..`) are skipped. Returns the number
/// of files written.
///
/// # Errors
///
/// Returns [`DownloadError::Archive`] if the file is not a readable zip or an
/// entry fails its checksum or decompression, and [`DownloadError::Io`] for
/// filesystem failures. A file left half-written by a bad entry is removed.
pub fn extract_zip(archive_path: &Path, dest: &Path) -> Result<usize, DownloadError> {
    debug!(archive = %archive_path.display(), dest = %dest.display(), "extracting zip archive");

    let file = File::open(archive_path).map_err(|e| DownloadError::io(archive_path, e))?;
    let mut archive =
        zip::ZipArchive::new(file).map_err(|e| DownloadError::archive(archive_path, e))?;

    std::fs::create_dir_all(dest).map_err(|e| DownloadError::io(dest, e))?;

    let mut written = 0;
    for index in 0..archive.len() {
        let mut entry = archive
            .by_index(index)
            .map_err(|e| DownloadError::archive(archive_path, e))?;

        let Some(relative) = entry.enclosed_name() else {
            warn!(entry = entry.name(), "skipping entry with unsafe path");
            continue;
        };
        let out_path = dest.join(relative);

        if entry.is_dir() {
            std::fs::create_dir_all(&out_path).map_err(|e| DownloadError::io(&out_path, e))?;
            continue;
        }

        if let Some(parent) = out_path.parent() {
            std::fs::create_dir_all(parent).map_err(|e| DownloadError::io(parent, e))?;
        }
        let out = File::create(&out_path).map_err(|e| DownloadError::io(&out_path, e))?;
        if let Err(e) = copy_entry(&mut entry, out, archive_path, &out_path) {
            let _ = std::fs::remove_file(&out_path);
            return Err(e);
        }
        written += 1;
    }

    debug!(files = written, "zip extraction complete");
    Ok(written)
}

/// Copies one entry to `out`, keeping entry read failures apart from write
/// failures.
fn copy_entry(
    entry: &mut impl Read,
    out: File,
    archive_path: &Path,
    out_path: &Path,
) -> Result<u64, DownloadError> {
    let mut writer = BufWriter::new(out);
    let mut buf = [0_u8; 8192];
    let mut total = 0_u64;
    loop {
        let n = match entry.read(&mut buf) {
            Ok(0) => break,
            Ok(n) => n,
            Err(e) if e.kind() == io::ErrorKind::Interrupted => continue,
            Err(e) => return Err(DownloadError::corrupted_entry(archive_path, e)),
        };
        writer
            .write_all(&buf[..n])
            .map_err(|e| DownloadError::io(out_path, e))?;
        total += n as u64;
    }
    writer.flush().map_err(|e| DownloadError::io(out_path, e))?;
    Ok(total)
}
