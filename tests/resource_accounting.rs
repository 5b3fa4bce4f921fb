//! Leak checks through the live resource counters.
//!
//! Kept as a single test in its own binary: the counters are process-wide,
//! so parallel tests would see each other's handles.

use filemap_io::{live_resources, with_mapping, FileHandle, ResourceCounts};
use std::fs;

#[test]
fn canonical_sequences_release_everything() -> anyhow::Result<()> {
    let dir = tempfile::tempdir()?;
    let path = dir.path().join("accounting.bin");
    fs::write(&path, vec![0x5a_u8; 12_345])?;

    let baseline = live_resources();
    assert_eq!(baseline, ResourceCounts::default());

    // open -> establish -> read -> tear down -> close
    let mut handle = FileHandle::open(&path)?;
    assert_eq!(live_resources().handles, 1);
    let mut buffer = Some(handle.establish()?);
    assert_eq!(
        live_resources(),
        ResourceCounts {
            handles: 1,
            mappings: 1
        }
    );
    assert!(buffer.as_deref().is_some_and(|b| b.iter().all(|&b| b == 0x5a)));
    handle.tear_down(&mut buffer)?;
    assert_eq!(live_resources().mappings, 0);
    handle.close()?;
    assert_eq!(live_resources(), baseline);

    // Failed open allocates nothing
    assert!(FileHandle::open(dir.path().join("non_existing_file")).is_err());
    assert_eq!(live_resources(), baseline);

    // Failed establish on an empty file keeps only the handle
    let empty = dir.path().join("empty.bin");
    fs::write(&empty, b"")?;
    let mut handle = FileHandle::open(&empty)?;
    assert!(handle.establish().is_err());
    assert_eq!(live_resources().mappings, 0);
    drop(handle);
    assert_eq!(live_resources(), baseline);

    // Scoped variants
    let mut handle = FileHandle::open(&path)?;
    {
        let mapping = handle.map()?;
        assert_eq!(mapping.len(), 12_345);
        assert_eq!(live_resources().mappings, 1);
    }
    handle.close()?;
    let len = with_mapping(&path, <[u8]>::len)?;
    assert_eq!(len, 12_345);
    assert_eq!(live_resources(), baseline);

    Ok(())
}
