//! File handle lifecycle: open, size, close.

use std::fmt;
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicU64, Ordering};

use log::{debug, warn};

#[cfg(feature = "advise")]
use crate::advise::MapAdvice;
use crate::descriptor::{Descriptor, MapBackend};
use crate::errors::{CloseError, FilemapError, Result};
use crate::options::{HandleOptions, OpenMode};
use crate::stats;

static NEXT_HANDLE_ID: AtomicU64 = AtomicU64::new(1);

/// Whether a handle currently has an active mapping.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MapState {
    /// No view is mapped.
    Unmapped,
    /// A view has been established and not torn down yet.
    Mapped,
}

/// An opened backing file, ready to be mapped.
///
/// The handle records the file's size once, at open time. It is not
/// refreshed if the file changes afterwards.
///
/// Dropping a handle releases the file. Dropping it while a mapping is
/// active leaks the view rather than invalidating buffers that still point
/// into it; a warning is logged.
///
/// # Examples
///
/// ```no_run
/// use filemap_io::FileHandle;
///
/// let mut handle = FileHandle::open("data.bin")?;
/// let mut buffer = Some(handle.establish()?);
/// if let Some(bytes) = &buffer {
///     assert_eq!(bytes.len() as u64, handle.size());
/// }
/// handle.tear_down(&mut buffer)?;
/// assert!(buffer.is_none());
/// handle.close()?;
/// # Ok::<(), filemap_io::FilemapError>(())
/// ```
pub struct FileHandle {
    pub(crate) id: u64,
    pub(crate) path: PathBuf,
    pub(crate) size: u64,
    pub(crate) mode: OpenMode,
    // `None` only once the descriptor has been released by close or drop.
    pub(crate) descriptor: Option<Descriptor>,
    pub(crate) state: MapState,
    #[cfg(feature = "advise")]
    pub(crate) advice: Option<MapAdvice>,
}

impl fmt::Debug for FileHandle {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("FileHandle")
            .field("path", &self.path)
            .field("size", &self.size)
            .field("mode", &self.mode)
            .field("state", &self.state)
            .finish()
    }
}

impl FileHandle {
    /// Open an existing file for reading.
    ///
    /// # Errors
    ///
    /// Returns `FilemapError::InvalidArgument` if `path` is empty.
    /// Returns `FilemapError::OpenFailed` if the OS open fails.
    /// Returns `FilemapError::DescriptorDerivationFailed` if no usable native descriptor is available.
    /// Returns `FilemapError::SizeQueryFailed` if the file size cannot be read.
    pub fn open<P: AsRef<Path>>(path: P) -> Result<Self> {
        Self::open_with_options(path.as_ref(), &HandleOptions::new())
    }

    /// Open a file with an `fopen`-style mode string such as `"rb"` or `"r+"`.
    ///
    /// # Errors
    ///
    /// Returns `FilemapError::InvalidArgument` if `mode` is not recognised,
    /// otherwise the same errors as [`FileHandle::open`].
    pub fn open_with_mode<P: AsRef<Path>>(path: P, mode: &str) -> Result<Self> {
        let mode: OpenMode = mode.parse().map_err(|err| {
            warn!("`{}`: invalid opening mode {mode:?}", path.as_ref().display());
            err
        })?;
        HandleOptions::new().mode(mode).open(path)
    }

    /// Start building a handle with non-default options.
    #[must_use]
    pub fn options() -> HandleOptions {
        HandleOptions::new()
    }

    pub(crate) fn open_with_options(path: &Path, options: &HandleOptions) -> Result<Self> {
        if path.as_os_str().is_empty() {
            warn!("No file path provided");
            return Err(FilemapError::InvalidArgument("empty path"));
        }

        let file = options.mode.to_open_options().open(path).map_err(|source| {
            warn!("`{}`: can't open the file: {source}", path.display());
            FilemapError::OpenFailed {
                path: path.to_path_buf(),
                source,
            }
        })?;

        let descriptor = Descriptor::derive(file).map_err(|reason| {
            warn!("`{}`: {reason}", path.display());
            FilemapError::DescriptorDerivationFailed {
                path: path.to_path_buf(),
                reason,
            }
        })?;

        let size = descriptor
            .file()
            .metadata()
            .map_err(|source| {
                warn!("`{}`: can't retrieve file stats: {source}", path.display());
                FilemapError::SizeQueryFailed {
                    path: path.to_path_buf(),
                    source,
                }
            })?
            .len();

        stats::handle_opened();
        debug!("`{}`: opened, {size} bytes", path.display());

        Ok(Self {
            id: NEXT_HANDLE_ID.fetch_add(1, Ordering::Relaxed),
            path: path.to_path_buf(),
            size,
            mode: options.mode,
            descriptor: Some(descriptor),
            state: MapState::Unmapped,
            #[cfg(feature = "advise")]
            advice: options.advice,
        })
    }

    /// Path the handle was opened with.
    #[must_use]
    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Size of the file in bytes, as recorded at open time.
    #[must_use]
    pub fn size(&self) -> u64 {
        self.size
    }

    /// Whether the file was empty at open time.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.size == 0
    }

    /// Mode the file was opened with.
    #[must_use]
    pub fn mode(&self) -> OpenMode {
        self.mode
    }

    /// Current mapping state.
    #[must_use]
    pub fn state(&self) -> MapState {
        self.state
    }

    /// Whether a mapping over this handle is active.
    #[must_use]
    pub fn is_mapped(&self) -> bool {
        self.state == MapState::Mapped
    }

    /// Close the file and release the descriptor bundle.
    ///
    /// # Errors
    ///
    /// Returns `CloseError::StillMapped` with the handle, untouched, if a
    /// mapping is still active. Tear it down and close again.
    ///
    /// Returns `CloseError::Failed` wrapping `FilemapError::CloseFailed` if
    /// the OS close call fails. The descriptor counts as released either way,
    /// so there is nothing left to retry.
    pub fn close(mut self) -> std::result::Result<(), CloseError> {
        if self.state == MapState::Mapped {
            warn!("`{}`: can't close while mapped", self.path.display());
            return Err(CloseError::StillMapped(self));
        }
        let Some(descriptor) = self.descriptor.take() else {
            return Ok(());
        };
        stats::handle_released();
        self.size = 0;
        match descriptor.release() {
            Ok(()) => {
                debug!("`{}`: closed", self.path.display());
                Ok(())
            }
            Err(source) => {
                warn!("`{}`: can't close the file: {source}", self.path.display());
                Err(CloseError::Failed(FilemapError::CloseFailed {
                    path: std::mem::take(&mut self.path),
                    source,
                }))
            }
        }
    }
}

/// Raw descriptor of the opened file, or `-1` once it has been released.
#[cfg(unix)]
impl std::os::unix::io::AsRawFd for FileHandle {
    fn as_raw_fd(&self) -> std::os::unix::io::RawFd {
        use std::os::unix::io::AsRawFd;
        self.descriptor
            .as_ref()
            .map_or(-1, |descriptor| descriptor.file().as_raw_fd())
    }
}

/// Native file handle, or null once it has been released.
#[cfg(windows)]
impl std::os::windows::io::AsRawHandle for FileHandle {
    fn as_raw_handle(&self) -> std::os::windows::io::RawHandle {
        use std::os::windows::io::AsRawHandle;
        self.descriptor
            .as_ref()
            .map_or(std::ptr::null_mut(), |descriptor| descriptor.file().as_raw_handle())
    }
}

impl Drop for FileHandle {
    fn drop(&mut self) {
        let Some(descriptor) = self.descriptor.take() else {
            return;
        };
        if self.state == MapState::Mapped {
            warn!(
                "`{}`: handle dropped while mapped, leaking the view",
                self.path.display()
            );
        }
        stats::handle_released();
        if let Err(err) = descriptor.release() {
            warn!("`{}`: can't close the file: {err}", self.path.display());
        }
    }
}
