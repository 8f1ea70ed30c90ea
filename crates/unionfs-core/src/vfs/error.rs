//! Backend error types.

use std::io;
use thiserror::Error;

/// Failure reported by an upstream's backend.
#[derive(Debug, Error)]
pub enum VfsError {
    #[error("no such file or directory: {0}")]
    NotFound(String),

    #[error("{0} already exists")]
    AlreadyExists(String),

    /// The backend refuses all writes.
    #[error("backend is read-only")]
    ReadOnly,

    /// A path component that must be a directory is a file.
    #[error("{0}: not a directory")]
    NotADirectory(String),

    /// `..` or a symlink would leave the backend root.
    #[error("{0} is outside the backend root")]
    PathEscapesRoot(String),

    #[error("bad path: {0}")]
    InvalidPath(String),

    #[error(transparent)]
    Io(#[from] io::Error),

    #[error("{0}")]
    Other(String),
}

impl VfsError {
    pub fn not_found(path: impl Into<String>) -> Self {
        Self::NotFound(path.into())
    }

    pub fn already_exists(path: impl Into<String>) -> Self {
        Self::AlreadyExists(path.into())
    }

    pub fn not_a_directory(path: impl Into<String>) -> Self {
        Self::NotADirectory(path.into())
    }

    pub fn invalid_path(path: impl Into<String>) -> Self {
        Self::InvalidPath(path.into())
    }

    pub fn other(msg: impl Into<String>) -> Self {
        Self::Other(msg.into())
    }

    /// True when the error only says "nothing at this path".
    ///
    /// Existence checks treat these as `false`; everything else is an
    /// upstream failure. A file standing where a parent directory should
    /// be counts as absence too.
    pub fn is_absent(&self) -> bool {
        match self {
            VfsError::NotFound(_) | VfsError::NotADirectory(_) => true,
            VfsError::Io(e) => matches!(
                e.kind(),
                io::ErrorKind::NotFound | io::ErrorKind::NotADirectory
            ),
            _ => false,
        }
    }
}

pub type VfsResult<T> = Result<T, VfsError>;
