//! Allocation accounting.
//!
//! Entity memory is owned by the cache through `Rc`; the [`Allocator`] is
//! told about every entity construction and destruction and about every
//! transient payload buffer, so callers can budget and audit memory.

use std::cell::Cell;

use serde::Serialize;

/// Observer of the cache's allocations.
pub trait Allocator {
    fn allocate(&self, size: usize, align: usize);

    fn free(&self, size: usize, align: usize);

    fn stats(&self) -> AllocStats;
}

/// Allocation counters.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct AllocStats {
    /// Allocations not yet freed.
    pub live_allocations: usize,
    /// Bytes not yet freed.
    pub live_bytes: usize,
    /// Largest `live_bytes` ever observed.
    pub peak_bytes: usize,
    /// Allocations ever made.
    pub total_allocations: u64,
}

/// Default allocator: counts and checks.
#[derive(Debug, Default)]
pub struct TrackingAllocator {
    stats: Cell<AllocStats>,
}

impl TrackingAllocator {
    pub fn new() -> Self {
        Self::default()
    }
}

impl Allocator for TrackingAllocator {
    fn allocate(&self, size: usize, align: usize) {
        assert!(align.is_power_of_two(), "alignment {align} is not a power of two");
        let mut stats = self.stats.get();
        stats.live_allocations += 1;
        stats.live_bytes += size;
        stats.peak_bytes = stats.peak_bytes.max(stats.live_bytes);
        stats.total_allocations += 1;
        self.stats.set(stats);
    }

    fn free(&self, size: usize, _align: usize) {
        let mut stats = self.stats.get();
        assert!(
            stats.live_allocations > 0 && stats.live_bytes >= size,
            "free of {size} bytes with nothing matching outstanding"
        );
        stats.live_allocations -= 1;
        stats.live_bytes -= size;
        self.stats.set(stats);
    }

    fn stats(&self) -> AllocStats {
        self.stats.get()
    }
}
