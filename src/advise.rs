//! Access-pattern hints for an established mapping.

use crate::errors::{FilemapError, Result};
use crate::mapping::{BufferRef, Mapping};
use crate::utils::{align_down, page_size, slice_range};

/// Memory access pattern advice for the OS.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MapAdvice {
    /// Normal access pattern (default).
    Normal,
    /// Random access pattern.
    Random,
    /// Sequential access pattern.
    Sequential,
    /// Will need this range soon.
    WillNeed,
    /// Won't need this range soon.
    DontNeed,
}

impl BufferRef {
    /// Advise the OS about expected access patterns for `[offset, offset + len)`.
    ///
    /// The start of the range is rounded down to a page boundary. The advice
    /// is a hint and may be ignored; it never changes the mapped bytes.
    ///
    /// # Platform-specific behavior
    ///
    /// - **Unix**: Uses `madvise`
    /// - **Windows**: Uses `PrefetchVirtualMemory` for `WillNeed`, no-op for others
    ///
    /// # Errors
    ///
    /// Returns `FilemapError::OutOfBounds` if the range exceeds the mapping.
    /// Returns `FilemapError::AdviceFailed` if the system call fails.
    pub fn advise(&self, offset: u64, len: u64, advice: MapAdvice) -> Result<()> {
        if len == 0 {
            return Ok(());
        }
        let (start, end) = slice_range(offset, len, self.len() as u64)?;
        let start = align_down(start, page_size());
        let length = end - start;

        // SAFETY: `start` is within the mapping, validated above.
        let addr = unsafe { self.as_ptr().add(start) };

        #[cfg(unix)]
        {
            use libc::{
                madvise, MADV_DONTNEED, MADV_NORMAL, MADV_RANDOM, MADV_SEQUENTIAL, MADV_WILLNEED,
            };

            let advice_flag = match advice {
                MapAdvice::Normal => MADV_NORMAL,
                MapAdvice::Random => MADV_RANDOM,
                MapAdvice::Sequential => MADV_SEQUENTIAL,
                MapAdvice::WillNeed => MADV_WILLNEED,
                MapAdvice::DontNeed => MADV_DONTNEED,
            };

            // SAFETY: page-aligned address and length inside our own mapping.
            let result = unsafe { madvise(addr as *mut libc::c_void, length, advice_flag) };
            if result != 0 {
                let err = std::io::Error::last_os_error();
                return Err(FilemapError::AdviceFailed(format!("madvise failed: {err}")));
            }
        }

        #[cfg(windows)]
        {
            if matches!(advice, MapAdvice::WillNeed) {
                #[allow(non_snake_case)]
                #[repr(C)]
                struct WIN32_MEMORY_RANGE_ENTRY {
                    VirtualAddress: *mut core::ffi::c_void,
                    NumberOfBytes: usize,
                }

                #[allow(non_snake_case)]
                extern "system" {
                    fn PrefetchVirtualMemory(
                        hProcess: *mut core::ffi::c_void,
                        NumberOfEntries: usize,
                        VirtualAddresses: *const WIN32_MEMORY_RANGE_ENTRY,
                        Flags: u32,
                    ) -> i32;

                    fn GetCurrentProcess() -> *mut core::ffi::c_void;
                }

                let entry = WIN32_MEMORY_RANGE_ENTRY {
                    VirtualAddress: addr as *mut core::ffi::c_void,
                    NumberOfBytes: length,
                };

                // SAFETY: the range lies inside our own mapped view.
                let result = unsafe { PrefetchVirtualMemory(GetCurrentProcess(), 1, &entry, 0) };
                if result == 0 {
                    let err = std::io::Error::last_os_error();
                    return Err(FilemapError::AdviceFailed(format!(
                        "PrefetchVirtualMemory failed: {err}"
                    )));
                }
            }
        }

        Ok(())
    }
}

impl Mapping<'_> {
    /// Advise the OS about expected access patterns for part of the mapping.
    ///
    /// # Errors
    ///
    /// Same as [`BufferRef::advise`].
    pub fn advise(&self, offset: u64, len: u64, advice: MapAdvice) -> Result<()> {
        match self.buffer() {
            Some(buffer) => buffer.advise(offset, len, advice),
            None => Err(FilemapError::InvalidArgument("mapping already torn down")),
        }
    }
}
