//! Crate-specific error types for filemap-io.

use std::fmt;
use std::io;
use std::path::PathBuf;

use thiserror::Error;

use crate::handle::FileHandle;

/// Result alias for filemap-io operations.
pub type Result<T> = std::result::Result<T, FilemapError>;

/// Error type covering the open, map, unmap and close lifecycle.
#[derive(Debug, Error)]
pub enum FilemapError {
    /// The file could not be opened (missing, permission denied, ...).
    #[error("`{}`: cannot open: {source}", .path.display())]
    OpenFailed {
        /// Path passed to open.
        path: PathBuf,
        /// Underlying OS error.
        source: io::Error,
    },

    /// The raw descriptor or native handle could not be derived from the opened file.
    #[error("`{}`: cannot derive file descriptor: {reason}", .path.display())]
    DescriptorDerivationFailed {
        /// Path of the opened file.
        path: PathBuf,
        /// What went wrong.
        reason: &'static str,
    },

    /// The size query (stat) failed.
    #[error("`{}`: cannot retrieve file size: {source}", .path.display())]
    SizeQueryFailed {
        /// Path of the opened file.
        path: PathBuf,
        /// Underlying OS error.
        source: io::Error,
    },

    /// Creating the mapping object or mapping the view failed.
    #[error("`{}`: cannot map: {source}", .path.display())]
    MapFailed {
        /// Path of the mapped file.
        path: PathBuf,
        /// Underlying OS error.
        source: io::Error,
    },

    /// Releasing the view failed. The buffer reference is left in place.
    #[error("`{}`: cannot unmap: {source}", .path.display())]
    UnmapFailed {
        /// Path of the mapped file.
        path: PathBuf,
        /// Underlying OS error.
        source: io::Error,
    },

    /// The OS close call failed.
    #[error("`{}`: cannot close: {source}", .path.display())]
    CloseFailed {
        /// Path of the closed file.
        path: PathBuf,
        /// Underlying OS error.
        source: io::Error,
    },

    /// An argument was empty or did not belong to the handle it was passed with.
    #[error("invalid argument: {0}")]
    InvalidArgument(&'static str),

    /// `tear_down` was given an absent buffer reference.
    #[error("nothing to unmap")]
    NothingToUnmap,

    /// `tear_down` was called on a handle whose recorded size is zero.
    #[error("`{}`: invalid size", .path.display())]
    InvalidSize {
        /// Path of the handle.
        path: PathBuf,
    },

    /// `establish` was called while a mapping over the handle is active.
    #[error("`{}`: already mapped", .path.display())]
    AlreadyMapped {
        /// Path of the handle.
        path: PathBuf,
    },

    /// `close` was called while a mapping over the handle is active.
    #[error("`{}`: still mapped", .path.display())]
    StillMapped {
        /// Path of the handle.
        path: PathBuf,
    },

    /// Error when a requested offset/length pair is out of bounds.
    #[error("range out of bounds: offset={offset}, len={len}, total={total}")]
    OutOfBounds {
        /// Requested offset.
        offset: u64,
        /// Requested length.
        len: u64,
        /// Total size of the mapping.
        total: u64,
    },

    /// Error when an advise hint is rejected by the OS.
    #[error("advise failed: {0}")]
    AdviceFailed(String),
}

/// Error returned by [`FileHandle::close`].
///
/// Mirrors `std::io::IntoInnerError`: when the close is refused because a
/// mapping is still active, the handle is handed back untouched.
pub enum CloseError {
    /// The handle still has an active mapping; nothing was released.
    StillMapped(FileHandle),
    /// The OS close call failed. The descriptor is released regardless.
    Failed(FilemapError),
}

impl CloseError {
    /// Recover the handle if the close was refused.
    #[must_use]
    pub fn into_handle(self) -> Option<FileHandle> {
        match self {
            CloseError::StillMapped(handle) => Some(handle),
            CloseError::Failed(_) => None,
        }
    }
}

impl fmt::Debug for CloseError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            CloseError::StillMapped(handle) => {
                f.debug_tuple("StillMapped").field(&handle.path()).finish()
            }
            CloseError::Failed(err) => f.debug_tuple("Failed").field(err).finish(),
        }
    }
}

impl fmt::Display for CloseError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            CloseError::StillMapped(handle) => {
                write!(f, "`{}`: still mapped", handle.path().display())
            }
            CloseError::Failed(err) => err.fmt(f),
        }
    }
}

impl std::error::Error for CloseError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            CloseError::StillMapped(_) => None,
            CloseError::Failed(err) => Some(err),
        }
    }
}

impl From<CloseError> for FilemapError {
    fn from(err: CloseError) -> Self {
        match err {
            CloseError::StillMapped(handle) => FilemapError::StillMapped {
                path: handle.path().to_path_buf(),
            },
            CloseError::Failed(err) => err,
        }
    }
}
