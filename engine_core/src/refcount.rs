//! Intrusive reference count.
//!
//! Every cached entity embeds one [`RefCount`]. Only [`crate::handle::Handle`]
//! mutates it: cloning a handle increments, dropping one decrements. Reaching
//! zero does not free anything; the handle turns the zero-crossing into a
//! release request for the next flush.

use std::cell::Cell;

/// Single-threaded intrusive counter.
#[derive(Debug, Default)]
pub struct RefCount {
    count: Cell<usize>,
    revivals: Cell<u64>,
}

impl RefCount {
    pub fn new() -> Self {
        Self::default()
    }

    /// Current number of live references.
    pub fn get(&self) -> usize {
        self.count.get()
    }

    /// Adds one reference.
    pub fn increment(&self) {
        let current = self.count.get();
        if current == 0 {
            self.revivals.set(self.revivals.get() + 1);
        }
        self.count.set(current + 1);
    }

    /// How many times the count has climbed from zero.
    ///
    /// Two equal readings with a zero count in both mean nobody held a
    /// reference in between.
    pub fn revivals(&self) -> u64 {
        self.revivals.get()
    }

    /// Removes one reference and returns `true` when the count reached zero.
    ///
    /// # Panics
    ///
    /// Decrementing a count that is already zero is a double release and
    /// panics in every build.
    pub fn decrement(&self) -> bool {
        let current = self.count.get();
        assert!(current > 0, "reference count decremented below zero");
        self.count.set(current - 1);
        current == 1
    }

    pub fn is_zero(&self) -> bool {
        self.count.get() == 0
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn decrement_reports_zero_crossing() {
        let rc = RefCount::new();
        rc.increment();
        rc.increment();
        assert!(!rc.decrement());
        assert!(rc.decrement());
        assert!(rc.is_zero());
    }

    #[test]
    fn revivals_count_climbs_from_zero_only() {
        let rc = RefCount::new();
        rc.increment();
        rc.increment();
        assert_eq!(rc.revivals(), 1);
        rc.decrement();
        rc.decrement();
        rc.increment();
        assert_eq!(rc.revivals(), 2);
    }

    #[test]
    #[should_panic(expected = "below zero")]
    fn decrement_at_zero_panics() {
        let rc = RefCount::new();
        rc.decrement();
    }
}
