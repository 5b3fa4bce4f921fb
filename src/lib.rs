//! # filemap-io: read-only memory mapping of whole files
//!
//! This crate opens a file, records its size, and exposes its contents as a
//! read-only memory-mapped byte region, with an explicit lifecycle:
//! open, establish, read, tear down, close.
//!
//! ## Features
//!
//! - **Explicit lifecycle**: every step reports its own error
//! - **Enforced state**: a handle knows whether it is mapped; misuse is an error, not UB
//! - **Scoped mappings**: `Mapping` guards and `with_mapping` release on every exit path
//! - **Cross-platform**: `mmap` on Unix, `CreateFileMappingW`/`MapViewOfFile` on Windows
//!
//! ## Quick Start
//!
//! ```no_run
//! use filemap_io::FileHandle;
//!
//! let mut handle = FileHandle::open("data.bin")?;
//! let mut buffer = Some(handle.establish()?);
//! if let Some(bytes) = &buffer {
//!     println!("{} bytes, starts with {:?}", bytes.len(), &bytes[..4]);
//! }
//! handle.tear_down(&mut buffer)?;
//! handle.close()?;
//! # Ok::<(), filemap_io::FilemapError>(())
//! ```
//!
//! ## Modules
//!
//! - [`errors`]: Error types for all operations
//! - [`handle`]: `FileHandle` open/size/close
//! - [`mapping`]: establish/tear-down and the scoped `Mapping`
//! - [`options`]: open modes and the handle builder
//! - [`manager`]: High-level convenience functions
//! - [`stats`]: Live resource counters
//!
//! ## Feature Flags
//!
//! - `advise` (default): access-pattern hints on mappings

#![cfg_attr(not(test), deny(clippy::unwrap_used))]
#![deny(missing_docs)]

#[cfg(not(any(unix, windows)))]
compile_error!("filemap-io supports Unix and Windows targets only");

pub mod errors;
pub mod utils;
mod descriptor;
pub mod handle;
pub mod options;
pub mod mapping;
#[cfg(feature = "advise")]
pub mod advise;
pub mod stats;
pub mod manager;

pub use errors::{CloseError, FilemapError, Result};
pub use handle::{FileHandle, MapState};
pub use mapping::{BufferRef, Mapping};
pub use options::{HandleOptions, OpenMode};
pub use stats::{live_resources, ResourceCounts};
pub use manager::{
    close, establish, open, open_with_mode, read_mapped, size, tear_down, with_mapping,
};

#[cfg(feature = "advise")]
pub use advise::MapAdvice;
