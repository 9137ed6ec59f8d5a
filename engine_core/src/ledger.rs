//! Pending-request ledger.
//!
//! Two request sequences. The pending half accumulates requests between
//! flushes and is consumed LIFO during Pass A; the deferred half is where
//! Pass A puts release candidates for Pass B. Both halves are plain heap
//! vectors owned by the ledger, never tick-scoped memory.

use std::cell::RefCell;
use std::path::PathBuf;
use std::rc::{Rc, Weak};

use crate::resource::ErasedResource;

/// A request queued for the next flush.
///
/// The target is weak: a queued request never keeps its entity alive.
pub struct PendingRequest {
    pub target: Weak<dyn ErasedResource>,
    /// Present for "finish loading" requests, absent for "consider freeing".
    pub load_path: Option<PathBuf>,
    /// Target's revival count when Pass A deferred it.
    pub revivals: u64,
}

impl PendingRequest {
    pub fn load(target: Weak<dyn ErasedResource>, path: PathBuf) -> Self {
        Self {
            target,
            load_path: Some(path),
            revivals: 0,
        }
    }

    pub fn release(target: Weak<dyn ErasedResource>) -> Self {
        Self {
            target,
            load_path: None,
            revivals: 0,
        }
    }

    pub fn is_release(&self) -> bool {
        self.load_path.is_none()
    }
}

/// Double-buffered request storage.
///
/// `pending` accumulates between flushes and is drained by Pass A;
/// `deferred` holds the release candidates Pass A found and Pass B drains.
#[derive(Debug)]
pub struct Ledger<R> {
    pending: Vec<R>,
    deferred: Vec<R>,
}

impl<R> Default for Ledger<R> {
    fn default() -> Self {
        Self {
            pending: Vec::new(),
            deferred: Vec::new(),
        }
    }
}

impl<R> Ledger<R> {
    /// Appends to the pending half.
    pub fn push(&mut self, request: R) {
        self.pending.push(request);
    }

    /// Takes the most recent pending request.
    pub fn pop_pending(&mut self) -> Option<R> {
        self.pending.pop()
    }

    /// Appends a release candidate to the deferred half.
    pub fn defer(&mut self, request: R) {
        self.deferred.push(request);
    }

    /// Takes the most recent release candidate.
    pub fn pop_deferred(&mut self) -> Option<R> {
        self.deferred.pop()
    }

    /// Drops the pending half's backing storage once it has been drained.
    pub fn shrink_pending(&mut self) {
        debug_assert!(self.pending.is_empty());
        self.pending = Vec::new();
    }

    pub fn pending_len(&self) -> usize {
        self.pending.len()
    }

    pub fn deferred_len(&self) -> usize {
        self.deferred.len()
    }

    pub fn pending_capacity(&self) -> usize {
        self.pending.capacity()
    }

    pub fn is_empty(&self) -> bool {
        self.pending.is_empty() && self.deferred.is_empty()
    }
}

/// Shared handle to the cache's ledger.
///
/// Entities hold one of these as their release hook. Each call borrows the
/// ledger only for the duration of a single push or pop, so handles may be
/// dropped while a flush is running.
#[derive(Clone, Default)]
pub struct RequestQueue {
    inner: Rc<RefCell<Ledger<PendingRequest>>>,
}

impl RequestQueue {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn push(&self, request: PendingRequest) {
        self.inner.borrow_mut().push(request);
    }

    pub fn pop_pending(&self) -> Option<PendingRequest> {
        self.inner.borrow_mut().pop_pending()
    }

    pub fn defer(&self, request: PendingRequest) {
        self.inner.borrow_mut().defer(request);
    }

    pub fn pop_deferred(&self) -> Option<PendingRequest> {
        self.inner.borrow_mut().pop_deferred()
    }

    pub fn shrink_pending(&self) {
        self.inner.borrow_mut().shrink_pending();
    }

    pub fn pending_len(&self) -> usize {
        self.inner.borrow().pending_len()
    }

    pub fn deferred_len(&self) -> usize {
        self.inner.borrow().deferred_len()
    }

    pub fn is_empty(&self) -> bool {
        self.inner.borrow().is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn pending_is_consumed_lifo() {
        let mut ledger = Ledger::default();
        ledger.push(1);
        ledger.push(2);
        ledger.push(3);
        assert_eq!(ledger.pop_pending(), Some(3));
        assert_eq!(ledger.pop_pending(), Some(2));
        assert_eq!(ledger.pop_pending(), Some(1));
        assert_eq!(ledger.pop_pending(), None);
    }

    #[test]
    fn deferred_half_is_separate() {
        let mut ledger = Ledger::default();
        ledger.push("load");
        ledger.defer("release");
        assert_eq!(ledger.pending_len(), 1);
        assert_eq!(ledger.deferred_len(), 1);

        assert_eq!(ledger.pop_deferred(), Some("release"));
        assert_eq!(ledger.pop_pending(), Some("load"));
        assert!(ledger.is_empty());
    }

    #[test]
    fn requests_pushed_while_draining_are_drained_too() {
        let mut ledger = Ledger::default();
        ledger.push(1);
        let mut seen = Vec::new();
        while let Some(r) = ledger.pop_pending() {
            if r < 3 {
                ledger.push(r + 1);
            }
            seen.push(r);
        }
        assert_eq!(seen, vec![1, 2, 3]);
    }

    #[test]
    fn draining_pending_leaves_deferred_alone() {
        let mut ledger = Ledger::default();
        ledger.push(1);
        ledger.push(2);
        while let Some(r) = ledger.pop_pending() {
            ledger.defer(r * 10);
        }
        ledger.shrink_pending();
        assert_eq!(ledger.pending_len(), 0);
        assert_eq!(ledger.deferred_len(), 2);

        ledger.push(3);
        assert_eq!(ledger.pop_deferred(), Some(10));
        assert_eq!(ledger.pop_deferred(), Some(20));
        assert_eq!(ledger.pop_pending(), Some(3));
    }

    #[test]
    fn shrink_releases_capacity() {
        let mut ledger = Ledger::default();
        for i in 0..64 {
            ledger.push(i);
        }
        while ledger.pop_pending().is_some() {}
        assert!(ledger.pending_capacity() >= 64);
        ledger.shrink_pending();
        assert_eq!(ledger.pending_capacity(), 0);
    }
}
