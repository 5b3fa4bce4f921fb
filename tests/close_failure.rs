//! Close reporting an OS failure.
//!
//! Kept in its own binary: the test closes a raw descriptor behind the
//! handle's back, and a parallel test could otherwise be handed the freed
//! descriptor number and lose it.
#![cfg(unix)]

use filemap_io::{live_resources, CloseError, FileHandle, FilemapError, ResourceCounts};
use std::fs;
use std::os::unix::io::AsRawFd;

#[test]
fn close_reports_os_failure_and_releases_handle() -> anyhow::Result<()> {
    let dir = tempfile::tempdir()?;
    let path = dir.path().join("closed_underneath.bin");
    fs::write(&path, b"contents")?;

    let handle = FileHandle::open(&path)?;
    assert_eq!(live_resources().handles, 1);

    let fd = handle.as_raw_fd();
    assert!(fd >= 0);
    // SAFETY: `fd` is owned by `handle`, which only closes it again below.
    assert_eq!(unsafe { libc::close(fd) }, 0);

    match handle.close() {
        Err(CloseError::Failed(FilemapError::CloseFailed { path: p, source })) => {
            assert_eq!(p, path);
            assert_eq!(source.raw_os_error(), Some(libc::EBADF));
        }
        other => panic!("expected CloseFailed, got {other:?}"),
    }
    // The descriptor counts as released even though close failed
    assert_eq!(live_resources(), ResourceCounts::default());
    Ok(())
}
