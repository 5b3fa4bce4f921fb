//! High-level API for the open/map/unmap/close lifecycle.
//!
//! Provides free functions that wrap the `FileHandle` methods, plus scoped
//! helpers that guarantee release on every exit path.

use std::path::Path;

use crate::errors::{CloseError, Result};
use crate::handle::FileHandle;
use crate::mapping::BufferRef;

/// Open an existing file for reading.
///
/// # Errors
///
/// Returns errors from `FileHandle::open`.
pub fn open<P: AsRef<Path>>(path: P) -> Result<FileHandle> {
    FileHandle::open(path)
}

/// Open a file with an `fopen`-style mode string.
///
/// # Errors
///
/// Returns errors from `FileHandle::open_with_mode`.
pub fn open_with_mode<P: AsRef<Path>>(path: P, mode: &str) -> Result<FileHandle> {
    FileHandle::open_with_mode(path, mode)
}

/// Size recorded when the handle was opened.
#[must_use]
pub fn size(handle: &FileHandle) -> u64 {
    handle.size()
}

/// Close a handle.
///
/// # Errors
///
/// Returns errors from `FileHandle::close`.
pub fn close(handle: FileHandle) -> std::result::Result<(), CloseError> {
    handle.close()
}

/// Map the handle's whole file read-only.
///
/// # Errors
///
/// Returns errors from `FileHandle::establish`.
pub fn establish(handle: &mut FileHandle) -> Result<BufferRef> {
    handle.establish()
}

/// Unmap the view in `buffer`, resetting it to `None` on success.
///
/// # Errors
///
/// Returns errors from `FileHandle::tear_down`.
pub fn tear_down(handle: &mut FileHandle, buffer: &mut Option<BufferRef>) -> Result<()> {
    handle.tear_down(buffer)
}

/// Open `path`, map it, run `f` over the bytes, then unmap and close.
///
/// An empty file is passed to `f` as an empty slice without being mapped.
/// If `f` panics or any step fails, the mapping and the file are still
/// released.
///
/// # Errors
///
/// Returns the first error from opening, mapping, unmapping or closing.
///
/// # Examples
///
/// ```no_run
/// let lines = filemap_io::with_mapping("data.txt", |bytes| {
///     bytes.iter().filter(|&&b| b == b'\n').count()
/// })?;
/// # Ok::<(), filemap_io::FilemapError>(())
/// ```
pub fn with_mapping<P, F, R>(path: P, f: F) -> Result<R>
where
    P: AsRef<Path>,
    F: FnOnce(&[u8]) -> R,
{
    let mut handle = FileHandle::open(path)?;
    let output = if handle.is_empty() {
        f(&[])
    } else {
        let mapping = handle.map()?;
        let output = f(&mapping);
        mapping.unmap()?;
        output
    };
    handle.close()?;
    Ok(output)
}

/// Copy the contents of `path` out of a temporary mapping.
///
/// # Errors
///
/// Returns errors from `with_mapping`.
pub fn read_mapped<P: AsRef<Path>>(path: P) -> Result<Vec<u8>> {
    with_mapping(path, <[u8]>::to_vec)
}
