//! Establishing and tearing down the read-only view of a handle's file.

use std::fmt;
use std::io;
use std::ops::Deref;
use std::path::Path;
use std::ptr::NonNull;

use log::{debug, warn};

use crate::descriptor::MapBackend;
use crate::errors::{FilemapError, Result};
use crate::handle::{FileHandle, MapState};
use crate::stats;
use crate::utils::slice_range;

/// Reference to an established, read-only view of a whole file.
///
/// Only [`FileHandle::establish`] creates one, and only a successful
/// [`FileHandle::tear_down`] on the same handle consumes it. Callers keep it
/// in an `Option<BufferRef>` that tear-down resets to `None`.
///
/// The bytes stay readable for as long as the `BufferRef` exists. Dropping
/// it without tearing down leaks the view.
#[must_use = "dropping a BufferRef leaks the view and leaves the handle mapped"]
pub struct BufferRef {
    ptr: NonNull<u8>,
    len: usize,
    owner: u64,
}

// SAFETY: the view is read-only and never remapped while the BufferRef exists.
unsafe impl Send for BufferRef {}
// SAFETY: as above; shared access only ever reads.
unsafe impl Sync for BufferRef {}

impl BufferRef {
    /// Start of the mapped region.
    #[must_use]
    pub fn as_ptr(&self) -> *const u8 {
        self.ptr.as_ptr()
    }

    /// Length of the mapped region, equal to the handle's size.
    #[must_use]
    pub fn len(&self) -> usize {
        self.len
    }

    /// Always `false`: zero-length files are never mapped.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.len == 0
    }

    /// The mapped bytes.
    #[must_use]
    pub fn as_slice(&self) -> &[u8] {
        // SAFETY: `ptr..ptr+len` is a live read-only mapping until this
        // BufferRef is consumed by tear_down, which needs it uniquely.
        unsafe { std::slice::from_raw_parts(self.ptr.as_ptr(), self.len) }
    }
}

impl Deref for BufferRef {
    type Target = [u8];

    fn deref(&self) -> &[u8] {
        self.as_slice()
    }
}

impl AsRef<[u8]> for BufferRef {
    fn as_ref(&self) -> &[u8] {
        self.as_slice()
    }
}

impl fmt::Debug for BufferRef {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("BufferRef")
            .field("ptr", &self.ptr)
            .field("len", &self.len)
            .finish()
    }
}

impl FileHandle {
    /// Map the whole file read-only and return a reference to the view.
    ///
    /// Zero-length files are rejected without calling into the OS, so the
    /// behavior is the same on every platform.
    ///
    /// The view is private and read-only. As with any file mapping, another
    /// process truncating the file while it is mapped makes reads past the
    /// new end fault.
    ///
    /// # Errors
    ///
    /// Returns `FilemapError::AlreadyMapped` if a mapping is already active.
    /// Returns `FilemapError::MapFailed` if the file is empty, too large for
    /// the address space, or the OS mapping call fails. No partial mapping
    /// state is kept on failure.
    pub fn establish(&mut self) -> Result<BufferRef> {
        if self.state == MapState::Mapped {
            warn!("`{}`: already mapped", self.path.display());
            return Err(FilemapError::AlreadyMapped {
                path: self.path.clone(),
            });
        }
        if self.size == 0 {
            return Err(self.map_failed(io::Error::new(
                io::ErrorKind::InvalidInput,
                "cannot map zero-length file",
            )));
        }
        let len = usize::try_from(self.size).map_err(|_| {
            self.map_failed(io::Error::new(
                io::ErrorKind::InvalidInput,
                "file too large for the address space",
            ))
        })?;
        let Some(descriptor) = self.descriptor.as_mut() else {
            return Err(FilemapError::InvalidArgument("handle already released"));
        };
        let ptr = match descriptor.map_view(len) {
            Ok(ptr) => ptr,
            Err(source) => return Err(self.map_failed(source)),
        };

        self.state = MapState::Mapped;
        stats::mapping_established();
        let buffer = BufferRef {
            ptr,
            len,
            owner: self.id,
        };

        #[cfg(feature = "advise")]
        if let Some(advice) = self.advice {
            if let Err(err) = buffer.advise(0, self.size, advice) {
                warn!("`{}`: ignoring {advice:?} advice: {err}", self.path.display());
            }
        }

        debug!("`{}`: mapped {len} bytes", self.path.display());
        Ok(buffer)
    }

    /// Release the view referenced by `buffer` and reset it to `None`.
    ///
    /// # Errors
    ///
    /// Checked in this order:
    /// - `FilemapError::NothingToUnmap` if `buffer` is `None`.
    /// - `FilemapError::InvalidSize` if the handle's size is zero.
    /// - `FilemapError::InvalidArgument` if `buffer` was established by another handle.
    /// - `FilemapError::UnmapFailed` if the OS release call fails. `buffer`
    ///   is left as it was and the handle stays mapped.
    pub fn tear_down(&mut self, buffer: &mut Option<BufferRef>) -> Result<()> {
        let Some(mapped) = buffer.as_ref() else {
            warn!("No buffer provided to unmap");
            return Err(FilemapError::NothingToUnmap);
        };
        if self.size == 0 {
            warn!("`{}`: the size of the file is invalid", self.path.display());
            return Err(FilemapError::InvalidSize {
                path: self.path.clone(),
            });
        }
        if mapped.owner != self.id {
            warn!("`{}`: buffer was mapped from another handle", self.path.display());
            return Err(FilemapError::InvalidArgument(
                "buffer reference belongs to another handle",
            ));
        }
        let Some(descriptor) = self.descriptor.as_mut() else {
            return Err(FilemapError::InvalidArgument("handle already released"));
        };

        // SAFETY: `mapped` came from `establish` on this handle (owner check)
        // and is still present, so it has not been torn down.
        if let Err(source) = unsafe { descriptor.unmap_view(mapped.ptr, mapped.len) } {
            warn!("`{}`: can't unmap memory: {source}", self.path.display());
            return Err(FilemapError::UnmapFailed {
                path: self.path.clone(),
                source,
            });
        }

        *buffer = None;
        self.state = MapState::Unmapped;
        stats::mapping_released();
        debug!("`{}`: unmapped", self.path.display());
        Ok(())
    }

    /// Map the file and return a guard that unmaps when dropped.
    ///
    /// The guard borrows the handle mutably, so the handle cannot be closed or
    /// mapped again while the guard lives.
    ///
    /// # Errors
    ///
    /// Same as [`FileHandle::establish`].
    pub fn map(&mut self) -> Result<Mapping<'_>> {
        let buffer = self.establish()?;
        Ok(Mapping {
            handle: self,
            buffer: Some(buffer),
        })
    }

    fn map_failed(&self, source: io::Error) -> FilemapError {
        warn!("`{}`: can't memory map: {source}", self.path.display());
        FilemapError::MapFailed {
            path: self.path.clone(),
            source,
        }
    }
}

/// Scoped read-only mapping of a [`FileHandle`].
///
/// # Examples
///
/// ```no_run
/// use filemap_io::FileHandle;
///
/// let mut handle = FileHandle::open("data.bin")?;
/// {
///     let mapping = handle.map()?;
///     println!("first byte: {:?}", mapping.first());
/// } // unmapped here
/// handle.close()?;
/// # Ok::<(), filemap_io::FilemapError>(())
/// ```
#[must_use = "dropping a Mapping unmaps it immediately"]
pub struct Mapping<'a> {
    handle: &'a mut FileHandle,
    buffer: Option<BufferRef>,
}

impl Mapping<'_> {
    /// The mapped bytes.
    #[must_use]
    pub fn as_slice(&self) -> &[u8] {
        self.buffer.as_ref().map_or(&[][..], BufferRef::as_slice)
    }

    /// Length of the mapping in bytes.
    #[must_use]
    pub fn len(&self) -> usize {
        self.as_slice().len()
    }

    /// Whether the mapping is empty.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Path of the mapped file.
    #[must_use]
    pub fn path(&self) -> &Path {
        self.handle.path()
    }

    /// Bounds-checked view of `[offset, offset + len)`.
    ///
    /// # Errors
    ///
    /// Returns `FilemapError::OutOfBounds` if the range exceeds the mapping.
    pub fn get(&self, offset: u64, len: u64) -> Result<&[u8]> {
        let bytes = self.as_slice();
        let (start, end) = slice_range(offset, len, bytes.len() as u64)?;
        Ok(&bytes[start..end])
    }

    #[cfg(feature = "advise")]
    pub(crate) fn buffer(&self) -> Option<&BufferRef> {
        self.buffer.as_ref()
    }

    /// Tear the mapping down now and report the result.
    ///
    /// If this fails, dropping the guard tries once more and logs the outcome.
    ///
    /// # Errors
    ///
    /// Same as [`FileHandle::tear_down`].
    pub fn unmap(mut self) -> Result<()> {
        self.handle.tear_down(&mut self.buffer)
    }
}

impl Deref for Mapping<'_> {
    type Target = [u8];

    fn deref(&self) -> &[u8] {
        self.as_slice()
    }
}

impl AsRef<[u8]> for Mapping<'_> {
    fn as_ref(&self) -> &[u8] {
        self.as_slice()
    }
}

impl fmt::Debug for Mapping<'_> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Mapping")
            .field("path", &self.handle.path())
            .field("len", &self.len())
            .finish()
    }
}

impl Drop for Mapping<'_> {
    fn drop(&mut self) {
        if self.buffer.is_some() {
            if let Err(err) = self.handle.tear_down(&mut self.buffer) {
                warn!("{err}");
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs;
    use std::path::PathBuf;

    fn tmp_path(name: &str) -> PathBuf {
        let mut p = std::env::temp_dir();
        p.push(format!("filemap_io_mapping_test_{}_{}", name, std::process::id()));
        p
    }

    #[test]
    fn tear_down_rejects_zero_size_handle() {
        let path = tmp_path("zero_size_handle");
        fs::write(&path, b"payload").expect("write");

        let mut handle = FileHandle::open(&path).expect("open");
        let mut buffer = Some(handle.establish().expect("establish"));

        handle.size = 0;
        let err = handle.tear_down(&mut buffer).unwrap_err();
        assert!(matches!(err, FilemapError::InvalidSize { .. }));
        assert!(buffer.is_some());
        assert!(handle.is_mapped());

        handle.size = 7;
        handle.tear_down(&mut buffer).expect("tear down");
        assert!(buffer.is_none());
        handle.close().expect("close");

        fs::remove_file(&path).expect("cleanup");
    }

    #[test]
    #[cfg(unix)]
    fn failed_unmap_keeps_buffer_and_state() {
        let path = tmp_path("failed_unmap");
        fs::write(&path, vec![3u8; 8192]).expect("write");

        let mut handle = FileHandle::open(&path).expect("open");
        let mut buffer = Some(handle.establish().expect("establish"));

        // munmap rejects an address that is not page aligned
        let base = buffer.as_ref().map(|b| b.ptr).expect("buffer");
        if let Some(b) = buffer.as_mut() {
            b.ptr = NonNull::new(base.as_ptr().wrapping_add(1)).expect("non-null");
        }
        let err = handle.tear_down(&mut buffer).unwrap_err();
        match &err {
            FilemapError::UnmapFailed { path: p, source } => {
                assert_eq!(p, &path);
                assert_eq!(source.raw_os_error(), Some(libc::EINVAL));
            }
            other => panic!("expected UnmapFailed, got {other:?}"),
        }
        assert!(buffer.is_some());
        assert!(handle.is_mapped());

        if let Some(b) = buffer.as_mut() {
            b.ptr = base;
        }
        assert!(buffer.as_deref().is_some_and(|b| b.iter().all(|&b| b == 3)));
        handle.tear_down(&mut buffer).expect("tear down");
        assert!(buffer.is_none());
        assert!(!handle.is_mapped());
        handle.close().expect("close");

        fs::remove_file(&path).expect("cleanup");
    }

    #[test]
    fn establish_on_empty_file_keeps_handle_unmapped() {
        let path = tmp_path("empty_file");
        fs::write(&path, b"").expect("write");

        let mut handle = FileHandle::open(&path).expect("open");
        let err = handle.establish().unwrap_err();
        match err {
            FilemapError::MapFailed { source, .. } => {
                assert_eq!(source.kind(), io::ErrorKind::InvalidInput);
            }
            other => panic!("expected MapFailed, got {other:?}"),
        }
        assert_eq!(handle.state(), MapState::Unmapped);
        handle.close().expect("close");

        fs::remove_file(&path).expect("cleanup");
    }

    #[test]
    fn mapping_guard_get_is_bounds_checked() {
        let path = tmp_path("guard_get");
        fs::write(&path, b"hello, mapping").expect("write");

        let mut handle = FileHandle::open(&path).expect("open");
        {
            let mapping = handle.map().expect("map");
            assert_eq!(mapping.get(7, 7).expect("get"), b"mapping");
            assert_eq!(mapping.get(14, 0).expect("empty tail"), b"");
            let err = mapping.get(10, 10).unwrap_err();
            assert_eq!(
                err.to_string(),
                "range out of bounds: offset=10, len=10, total=14"
            );
        }
        assert!(!handle.is_mapped());
        handle.close().expect("close");

        fs::remove_file(&path).expect("cleanup");
    }
}
