use std::io;
use std::path::{Path, PathBuf};

use thiserror::Error;

use crate::plugin::source::SourceKind;

const ENOENT: i32 = 2;

#[derive(Debug, Error)]
pub enum InstallError {
    #[error("no {kind} matching `{pattern}` in {}", dir.display())]
    MissingSource {
        kind: SourceKind,
        pattern: String,
        dir: PathBuf,
    },

    #[error("{} {kind}s match `{pattern}`: {}", matches.len(), join_paths(matches))]
    AmbiguousSource {
        kind: SourceKind,
        pattern: String,
        matches: Vec<PathBuf>,
    },

    #[error("invalid {kind} pattern `{pattern}`: {reason}")]
    InvalidPattern {
        kind: SourceKind,
        pattern: String,
        reason: String,
    },

    #[error("target directory not found: {}", path.display())]
    TargetNotFound { path: PathBuf },

    #[error("permission denied: {}", path.display())]
    Permission {
        path: PathBuf,
        #[source]
        source: io::Error,
    },

    #[error("{}: {source}", path.display())]
    Filesystem {
        path: PathBuf,
        #[source]
        source: io::Error,
    },
}

impl InstallError {
    /// Classify an I/O failure on `path`.
    pub fn io(path: impl AsRef<Path>, source: io::Error) -> Self {
        let path = path.as_ref().to_path_buf();
        if source.kind() == io::ErrorKind::PermissionDenied {
            Self::Permission { path, source }
        } else {
            Self::Filesystem { path, source }
        }
    }

    /// Map a directory walk failure, keeping the underlying OS error when
    /// there is one.
    pub fn walk(dir: impl AsRef<Path>, err: ignore::Error) -> Self {
        let message = err.to_string();
        let source = err
            .into_io_error()
            .unwrap_or_else(|| io::Error::other(message));
        Self::io(dir, source)
    }

    /// Process exit status for this error. OS-backed failures surface the
    /// errno of the failing call.
    pub fn exit_code(&self) -> u8 {
        match self {
            Self::MissingSource { .. } | Self::AmbiguousSource { .. } => 2,
            Self::InvalidPattern { .. } => 1,
            Self::TargetNotFound { .. } => errno_code(ENOENT),
            Self::Permission { source, .. } | Self::Filesystem { source, .. } => {
                source.raw_os_error().map_or(1, errno_code)
            }
        }
    }
}

fn errno_code(errno: i32) -> u8 {
    match u8::try_from(errno) {
        Ok(0) | Err(_) => 1,
        Ok(code) => code,
    }
}

fn join_paths(paths: &[PathBuf]) -> String {
    paths
        .iter()
        .map(|path| path.display().to_string())
        .collect::<Vec<_>>()
        .join(", ")
}
