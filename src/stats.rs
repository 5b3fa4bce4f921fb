//! Process-wide counters of live OS resources held by this crate.
//!
//! Handles are counted from a successful open until their descriptor bundle
//! is released. Mappings are counted from a successful establish until a
//! successful tear-down, so a view leaked by dropping its handle while
//! mapped stays counted.

use std::sync::atomic::{AtomicUsize, Ordering};

static OPEN_HANDLES: AtomicUsize = AtomicUsize::new(0);
static ACTIVE_MAPPINGS: AtomicUsize = AtomicUsize::new(0);

/// Snapshot of live resources.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct ResourceCounts {
    /// Handles whose file is still open.
    pub handles: usize,
    /// Views that have been established and not torn down.
    pub mappings: usize,
}

/// Current number of open handles and active mappings in this process.
#[must_use]
pub fn live_resources() -> ResourceCounts {
    ResourceCounts {
        handles: OPEN_HANDLES.load(Ordering::Acquire),
        mappings: ACTIVE_MAPPINGS.load(Ordering::Acquire),
    }
}

pub(crate) fn handle_opened() {
    OPEN_HANDLES.fetch_add(1, Ordering::AcqRel);
}

pub(crate) fn handle_released() {
    OPEN_HANDLES.fetch_sub(1, Ordering::AcqRel);
}

pub(crate) fn mapping_established() {
    ACTIVE_MAPPINGS.fetch_add(1, Ordering::AcqRel);
}

pub(crate) fn mapping_released() {
    ACTIVE_MAPPINGS.fetch_sub(1, Ordering::AcqRel);
}
