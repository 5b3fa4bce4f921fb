//! Platform descriptor bundle and the mapping capability it provides.
//!
//! A [`Descriptor`] owns the opened file plus whatever native identifiers the
//! platform needs to map it. On Unix that is the raw file descriptor. On
//! Windows it is the native file handle and, while a view is mapped, the
//! handle of the file-mapping object.

use std::fs::File;
use std::io;
use std::ptr::NonNull;

/// Map and unmap a read-only, whole-file view.
pub(crate) trait MapBackend {
    /// Map `len` bytes of the file, starting at offset zero, read-only and private.
    fn map_view(&mut self, len: usize) -> io::Result<NonNull<u8>>;

    /// Release a view previously returned by [`MapBackend::map_view`].
    ///
    /// # Safety
    ///
    /// `ptr` and `len` must come from a successful `map_view` call on this
    /// backend that has not been released yet.
    unsafe fn unmap_view(&mut self, ptr: NonNull<u8>, len: usize) -> io::Result<()>;

    /// Close every native resource held by the bundle.
    fn release(self) -> io::Result<()>;
}

/// Descriptor bundle of one opened file.
pub(crate) enum Descriptor {
    #[cfg(unix)]
    Unix(unix::UnixDescriptor),
    #[cfg(windows)]
    Windows(windows::WindowsDescriptor),
}

impl Descriptor {
    /// Derive the bundle from an opened file.
    pub(crate) fn derive(file: File) -> Result<Self, &'static str> {
        cfg_if::cfg_if! {
            if #[cfg(unix)] {
                unix::UnixDescriptor::derive(file).map(Descriptor::Unix)
            } else {
                windows::WindowsDescriptor::derive(file).map(Descriptor::Windows)
            }
        }
    }

    pub(crate) fn file(&self) -> &File {
        match self {
            #[cfg(unix)]
            Descriptor::Unix(d) => d.file(),
            #[cfg(windows)]
            Descriptor::Windows(d) => d.file(),
        }
    }
}

impl MapBackend for Descriptor {
    fn map_view(&mut self, len: usize) -> io::Result<NonNull<u8>> {
        match self {
            #[cfg(unix)]
            Descriptor::Unix(d) => d.map_view(len),
            #[cfg(windows)]
            Descriptor::Windows(d) => d.map_view(len),
        }
    }

    unsafe fn unmap_view(&mut self, ptr: NonNull<u8>, len: usize) -> io::Result<()> {
        match self {
            #[cfg(unix)]
            Descriptor::Unix(d) => d.unmap_view(ptr, len),
            #[cfg(windows)]
            Descriptor::Windows(d) => d.unmap_view(ptr, len),
        }
    }

    fn release(self) -> io::Result<()> {
        match self {
            #[cfg(unix)]
            Descriptor::Unix(d) => d.release(),
            #[cfg(windows)]
            Descriptor::Windows(d) => d.release(),
        }
    }
}

#[cfg(unix)]
mod unix {
    use std::fs::File;
    use std::io;
    use std::os::unix::io::{AsRawFd, IntoRawFd, RawFd};
    use std::ptr::{self, NonNull};

    use super::MapBackend;

    pub(crate) struct UnixDescriptor {
        file: File,
    }

    impl UnixDescriptor {
        pub(crate) fn derive(file: File) -> Result<Self, &'static str> {
            if file.as_raw_fd() < 0 {
                return Err("negative file descriptor");
            }
            Ok(Self { file })
        }

        pub(crate) fn file(&self) -> &File {
            &self.file
        }

        fn fd(&self) -> RawFd {
            self.file.as_raw_fd()
        }
    }

    impl MapBackend for UnixDescriptor {
        fn map_view(&mut self, len: usize) -> io::Result<NonNull<u8>> {
            // SAFETY: a null hint lets the kernel pick the address; fd is open for reading.
            let addr = unsafe {
                libc::mmap(
                    ptr::null_mut(),
                    len as libc::size_t,
                    libc::PROT_READ,
                    libc::MAP_PRIVATE,
                    self.fd(),
                    0,
                )
            };
            if addr == libc::MAP_FAILED {
                return Err(io::Error::last_os_error());
            }
            NonNull::new(addr.cast::<u8>())
                .ok_or_else(|| io::Error::new(io::ErrorKind::Other, "mmap returned a null address"))
        }

        unsafe fn unmap_view(&mut self, ptr: NonNull<u8>, len: usize) -> io::Result<()> {
            if libc::munmap(ptr.as_ptr().cast::<libc::c_void>(), len as libc::size_t) != 0 {
                return Err(io::Error::last_os_error());
            }
            Ok(())
        }

        fn release(self) -> io::Result<()> {
            let fd = self.file.into_raw_fd();
            // SAFETY: we own `fd` after `into_raw_fd`; it is closed exactly once here.
            if unsafe { libc::close(fd) } != 0 {
                return Err(io::Error::last_os_error());
            }
            Ok(())
        }
    }
}

#[cfg(windows)]
mod windows {
    use std::ffi::c_void;
    use std::fs::File;
    use std::io;
    use std::os::windows::io::{AsRawHandle, IntoRawHandle};
    use std::ptr::{self, NonNull};

    use super::MapBackend;

    type Handle = *mut c_void;

    const INVALID_HANDLE_VALUE: Handle = -1isize as Handle;
    const PAGE_READONLY: u32 = 0x02;
    const FILE_MAP_READ: u32 = 0x0004;

    #[allow(non_snake_case)]
    extern "system" {
        fn CreateFileMappingW(
            hFile: Handle,
            lpFileMappingAttributes: *const c_void,
            flProtect: u32,
            dwMaximumSizeHigh: u32,
            dwMaximumSizeLow: u32,
            lpName: *const u16,
        ) -> Handle;

        fn MapViewOfFile(
            hFileMappingObject: Handle,
            dwDesiredAccess: u32,
            dwFileOffsetHigh: u32,
            dwFileOffsetLow: u32,
            dwNumberOfBytesToMap: usize,
        ) -> *mut c_void;

        fn UnmapViewOfFile(lpBaseAddress: *const c_void) -> i32;

        fn CloseHandle(hObject: Handle) -> i32;
    }

    pub(crate) struct WindowsDescriptor {
        file: File,
        // Set only between a successful map_view and the matching unmap_view.
        mapping: Option<Handle>,
    }

    // SAFETY: both handles are process-wide kernel object handles, usable from
    // any thread. Shared references only reach the file, never the raw handles.
    unsafe impl Send for WindowsDescriptor {}
    unsafe impl Sync for WindowsDescriptor {}

    impl WindowsDescriptor {
        pub(crate) fn derive(file: File) -> Result<Self, &'static str> {
            let handle = file.as_raw_handle();
            if handle.is_null() || handle == INVALID_HANDLE_VALUE {
                return Err("invalid native file handle");
            }
            Ok(Self {
                file,
                mapping: None,
            })
        }

        pub(crate) fn file(&self) -> &File {
            &self.file
        }
    }

    impl MapBackend for WindowsDescriptor {
        fn map_view(&mut self, _len: usize) -> io::Result<NonNull<u8>> {
            // SAFETY: the file handle is valid for the lifetime of `self.file`.
            let mapping = unsafe {
                CreateFileMappingW(
                    self.file.as_raw_handle(),
                    ptr::null(),
                    PAGE_READONLY,
                    0,
                    0,
                    ptr::null(),
                )
            };
            if mapping.is_null() {
                return Err(io::Error::last_os_error());
            }
            self.mapping = Some(mapping);

            // SAFETY: `mapping` was just created read-only; a zero length maps the whole file.
            let view = unsafe { MapViewOfFile(mapping, FILE_MAP_READ, 0, 0, 0) };
            match NonNull::new(view.cast::<u8>()) {
                Some(view) => Ok(view),
                None => {
                    let err = io::Error::last_os_error();
                    self.mapping = None;
                    // SAFETY: `mapping` is owned by us and not referenced by any view.
                    unsafe { CloseHandle(mapping) };
                    Err(err)
                }
            }
        }

        unsafe fn unmap_view(&mut self, ptr: NonNull<u8>, _len: usize) -> io::Result<()> {
            // The view keeps its own reference on the section, so the mapping
            // object can go first. On failure the view is still intact.
            if let Some(mapping) = self.mapping {
                if CloseHandle(mapping) == 0 {
                    return Err(io::Error::last_os_error());
                }
                self.mapping = None;
            }
            if UnmapViewOfFile(ptr.as_ptr() as *const c_void) == 0 {
                return Err(io::Error::last_os_error());
            }
            Ok(())
        }

        fn release(mut self) -> io::Result<()> {
            let mut result = Ok(());
            if let Some(mapping) = self.mapping.take() {
                // SAFETY: we own the mapping handle; it is closed exactly once here.
                if unsafe { CloseHandle(mapping) } == 0 {
                    result = Err(io::Error::last_os_error());
                }
            }
            let handle = self.file.into_raw_handle();
            // SAFETY: we own `handle` after `into_raw_handle`.
            if unsafe { CloseHandle(handle) } == 0 && result.is_ok() {
                result = Err(io::Error::last_os_error());
            }
            result
        }
    }
}
