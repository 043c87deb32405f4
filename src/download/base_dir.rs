//! Base directory that anchors relative download destinations.

use std::path::{Path, PathBuf};

/// Directory used for downloads that do not name an absolute destination.
///
/// Defaults to the process working directory at the time of resolution.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct BaseDir {
    explicit: Option<PathBuf>,
}

impl BaseDir {
    /// Uses the process working directory.
    #[must_use]
    pub fn current() -> Self {
        Self::default()
    }

    /// Uses an explicit directory. Relative paths are anchored at the
    /// working directory when resolved.
    #[must_use]
    pub fn from_path(dir: impl Into<PathBuf>) -> Self {
        Self {
            explicit: Some(dir.into()),
        }
    }

    /// Uses the directory that contains `source_file`, so downloads land next
    /// to the calling program's source or script.
    #[must_use]
    pub fn from_source_file(source_file: impl AsRef<Path>) -> Self {
        match source_file.as_ref().parent() {
            Some(parent) if !parent.as_os_str().is_empty() => Self::from_path(parent),
            _ => Self::current(),
        }
    }

    /// The absolute directory this base resolves to.
    ///
    /// Falls back to `.` if the working directory is unavailable.
    #[must_use]
    pub fn dir(&self) -> PathBuf {
        let cwd = std::env::current_dir().unwrap_or_else(|_| PathBuf::from("."));
        match &self.explicit {
            Some(dir) => absolutize(&cwd, &expand_home(dir)),
            None => cwd,
        }
    }

    /// Anchors `path` at this base: expands a leading `~` and joins relative
    /// paths onto [`dir`](Self::dir).
    #[must_use]
    pub fn resolve(&self, path: impl AsRef<Path>) -> PathBuf {
        let expanded = expand_home(path.as_ref());
        absolutize(&self.dir(), &expanded)
    }
}

fn absolutize(base: &Path, path: &Path) -> PathBuf {
    if path.is_absolute() {
        path.to_path_buf()
    } else {
        base.join(path)
    }
}

/// Expands a leading `~` or `~/` using `$HOME`. Other paths are unchanged.
fn expand_home(path: &Path) -> PathBuf {
    let Some(raw) = path.to_str() else {
        return path.to_path_buf();
    };
    let rest = if raw == "~" {
        ""
    } else if let Some(rest) = raw.strip_prefix("~/") {
        rest
    } else {
        return path.to_path_buf();
    };
    match std::env::var_os("HOME").filter(|home| !home.is_empty()) {
        Some(home) => PathBuf::from(home).join(rest),
        None => path.to_path_buf(),
    }
}
