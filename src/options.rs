//! Open modes and the handle builder.

use std::fs::OpenOptions;
use std::path::Path;
use std::str::FromStr;

#[cfg(feature = "advise")]
use crate::advise::MapAdvice;
use crate::errors::{FilemapError, Result};
use crate::handle::FileHandle;

/// How the backing file is opened, parsed from an `fopen`-style mode string.
///
/// Read access is always requested on top of what the mode asks for: every
/// mapping made from a handle is a read-only view, whatever the mode.
///
/// | Mode | Effect |
/// |------|--------|
/// | `r`  | open existing |
/// | `r+` | open existing, also writable |
/// | `w`, `w+` | create or truncate, writable |
/// | `wx`, `w+x` | create, fail if it exists |
/// | `a`, `a+` | create if missing, append |
///
/// `b` and `t` are accepted anywhere after the first character and ignored.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct OpenMode {
    write: bool,
    append: bool,
    truncate: bool,
    create: bool,
    create_new: bool,
}

impl OpenMode {
    /// Plain read-only access (`"rb"`).
    pub const READ_ONLY: OpenMode = OpenMode {
        write: false,
        append: false,
        truncate: false,
        create: false,
        create_new: false,
    };

    /// Whether the file was opened without write access.
    #[must_use]
    pub fn is_read_only(&self) -> bool {
        !self.write && !self.append
    }

    pub(crate) fn to_open_options(self) -> OpenOptions {
        let mut options = OpenOptions::new();
        options
            .read(true)
            .write(self.write)
            .append(self.append)
            .truncate(self.truncate)
            .create(self.create)
            .create_new(self.create_new);
        options
    }
}

impl Default for OpenMode {
    fn default() -> Self {
        Self::READ_ONLY
    }
}

impl FromStr for OpenMode {
    type Err = FilemapError;

    fn from_str(mode: &str) -> Result<Self> {
        let mut chars = mode.chars();
        let mut parsed = match chars.next() {
            Some('r') => Self::READ_ONLY,
            Some('w') => OpenMode {
                write: true,
                truncate: true,
                create: true,
                ..Self::READ_ONLY
            },
            Some('a') => OpenMode {
                append: true,
                create: true,
                ..Self::READ_ONLY
            },
            _ => return Err(FilemapError::InvalidArgument("unsupported open mode")),
        };
        let exclusive_allowed = parsed.truncate;
        for c in chars {
            match c {
                '+' if !parsed.append => parsed.write = true,
                '+' | 'b' | 't' => {}
                'x' if exclusive_allowed => parsed.create_new = true,
                _ => return Err(FilemapError::InvalidArgument("unsupported open mode")),
            }
        }
        Ok(parsed)
    }
}

/// Builder for [`FileHandle`] carrying the open mode and mapping hints.
///
/// # Examples
///
/// ```no_run
/// use filemap_io::{FileHandle, OpenMode};
///
/// let mode: OpenMode = "r+b".parse()?;
/// let handle = FileHandle::options().mode(mode).open("data.bin")?;
/// assert!(!handle.mode().is_read_only());
/// # Ok::<(), filemap_io::FilemapError>(())
/// ```
#[derive(Debug, Clone, Default)]
pub struct HandleOptions {
    pub(crate) mode: OpenMode,
    #[cfg(feature = "advise")]
    pub(crate) advice: Option<MapAdvice>,
}

impl HandleOptions {
    /// Default options: read-only mode, no advice.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Set the open mode.
    #[must_use]
    pub fn mode(mut self, mode: OpenMode) -> Self {
        self.mode = mode;
        self
    }

    /// Apply `advice` to every mapping established from the handle.
    ///
    /// The hint is best-effort: if the OS rejects it, a warning is logged and
    /// the mapping is still returned.
    #[cfg(feature = "advise")]
    #[must_use]
    pub fn advice(mut self, advice: MapAdvice) -> Self {
        self.advice = Some(advice);
        self
    }

    /// Open `path` with these options.
    ///
    /// # Errors
    ///
    /// See [`FileHandle::open`].
    pub fn open<P: AsRef<Path>>(&self, path: P) -> Result<FileHandle> {
        FileHandle::open_with_options(path.as_ref(), self)
    }
}
