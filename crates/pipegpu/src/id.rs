//! Process-unique resource identities

use std::fmt;
use std::sync::atomic::{AtomicU32, Ordering};

static NEXT_RESOURCE_ID: AtomicU32 = AtomicU32::new(1);

/// Identity of a logical resource
///
/// Ids are minted from a process-wide counter starting at 1 and are never
/// reused, so an id names the same object for the lifetime of its registry.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct ResourceId(u32);

impl ResourceId {
    /// Mints a fresh id
    pub fn mint() -> Self {
        Self(NEXT_RESOURCE_ID.fetch_add(1, Ordering::Relaxed))
    }

    /// The raw numeric value
    pub fn get(self) -> u32 {
        self.0
    }
}

impl fmt::Display for ResourceId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "#{}", self.0)
    }
}
