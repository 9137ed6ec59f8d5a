//! Resource cache.
//!
//! Owns the id index and the request ledger. `create` deduplicates by name
//! and defers the actual load; dropping the last [`Handle`] defers the actual
//! destruction. Both happen in [`ResourceCache::update`], once per tick:
//!
//! - Pass A drains the pending ledger half LIFO. A target at zero references
//!   becomes a release candidate; a target still `Created` is loaded; anything
//!   else is stale and dropped.
//! - Pass B drains the release candidates, rechecks that each stayed at zero
//!   since Pass A saw it, then unindexes and destroys it.
//!
//! A name requested again before Pass B reaches it finds the still-indexed
//! entity and rescues it; its release request is then stale.

use std::cell::{Cell, RefCell};
use std::path::Path;
use std::rc::{Rc, Weak};

use anyhow::Context;
use serde::Serialize;
use tracing::{debug, info, trace, warn};

use crate::config::{EngineConfig, ReclaimPolicy};
use crate::event::{CacheEvent, EventQueue};
use crate::handle::Handle;
use crate::id::ResourceId;
use crate::ledger::{PendingRequest, RequestQueue};
use crate::loader::{ByteLoader, CacheDirResolver, FileSystemLoader, LoadError, PathResolver};
use crate::memory::{AllocStats, Allocator, TrackingAllocator};
use crate::resource::{
    Entry, ErasedResource, LoadContext, Resource, ResourceHeader, ResourceInfo, ResourceState,
};
use crate::table::ResourceTable;

/// Cache lifecycle.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CacheState {
    /// Constructed, `initialize()` not called yet.
    Uninitialized,
    /// Accepting `create` and `update`.
    Running,
    /// `shutdown()` has run.
    ShutDown,
}

/// Snapshot of cache counters.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct CacheStats {
    /// Entities in the index.
    pub resident: usize,
    /// Requests waiting for the next Pass A.
    pub pending_requests: usize,
    /// Release candidates waiting for Pass B.
    pub deferred_releases: usize,
    pub loads_attempted: u64,
    pub loads_failed: u64,
    pub destroyed: u64,
    pub flushes: u64,
    pub memory: AllocStats,
}

/// Entities still indexed when the cache shut down.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct LeakReport {
    pub leaked: Vec<ResourceInfo>,
}

impl LeakReport {
    pub fn is_clean(&self) -> bool {
        self.leaked.is_empty()
    }
}

#[derive(Debug, Default)]
struct Counters {
    loads_attempted: Cell<u64>,
    loads_failed: Cell<u64>,
    destroyed: Cell<u64>,
    flushes: Cell<u64>,
}

fn bump(counter: &Cell<u64>) {
    counter.set(counter.get() + 1);
}

/// Marks a flush in progress; a second concurrent flush is a caller bug.
struct FlushGuard<'a> {
    flag: &'a Cell<bool>,
}

impl<'a> FlushGuard<'a> {
    fn enter(flag: &'a Cell<bool>) -> Self {
        assert!(!flag.get(), "ResourceCache::update re-entered during a flush");
        flag.set(true);
        Self { flag }
    }
}

impl Drop for FlushGuard<'_> {
    fn drop(&mut self) {
        self.flag.set(false);
    }
}

/// Reference-counted asset cache with deferred loading and reclamation.
pub struct ResourceCache {
    loader: Box<dyn ByteLoader>,
    resolver: Box<dyn PathResolver>,
    allocator: Box<dyn Allocator>,
    index: RefCell<ResourceTable<Rc<dyn ErasedResource>>>,
    requests: RequestQueue,
    events: RefCell<EventQueue>,
    reclaim: ReclaimPolicy,
    shutdown_flush_limit: u32,
    keep_debug_names: bool,
    state: CacheState,
    flushing: Cell<bool>,
    next_serial: Cell<u64>,
    counters: Counters,
}

impl ResourceCache {
    /// Creates a cache reading through `loader`, resolving names into
    /// `cfg.cache_dir`.
    pub fn new(cfg: &EngineConfig, loader: Box<dyn ByteLoader>) -> Self {
        Self {
            loader,
            resolver: Box::new(CacheDirResolver::new(&cfg.cache_dir)),
            allocator: Box::new(TrackingAllocator::new()),
            index: RefCell::new(ResourceTable::new()),
            requests: RequestQueue::new(),
            events: RefCell::new(EventQueue::default()),
            reclaim: cfg.reclaim,
            shutdown_flush_limit: cfg.shutdown_flush_limit,
            keep_debug_names: cfg.keep_debug_names,
            state: CacheState::Uninitialized,
            flushing: Cell::new(false),
            next_serial: Cell::new(0),
            counters: Counters::default(),
        }
    }

    /// Creates a cache reading from disk below `cfg.root_dir`.
    pub fn from_config(cfg: &EngineConfig) -> Self {
        Self::new(cfg, Box::new(FileSystemLoader::new(&cfg.root_dir)))
    }

    /// Replaces the name resolver.
    pub fn with_resolver(mut self, resolver: Box<dyn PathResolver>) -> Self {
        self.resolver = resolver;
        self
    }

    /// Replaces the allocator. Only valid before anything was created.
    pub fn with_allocator(mut self, allocator: Box<dyn Allocator>) -> Self {
        assert!(
            self.next_serial.get() == 0,
            "allocator replaced after resources were created"
        );
        self.allocator = allocator;
        self
    }

    pub fn state(&self) -> CacheState {
        self.state
    }

    fn assert_running(&self, op: &str) {
        assert!(
            self.state == CacheState::Running,
            "ResourceCache::{op} called while {:?}",
            self.state
        );
    }

    /// Starts the cache.
    pub fn initialize(&mut self) -> anyhow::Result<()> {
        anyhow::ensure!(
            self.state == CacheState::Uninitialized,
            "resource cache initialized twice"
        );
        self.loader
            .initialize()
            .context("initialize byte loader")?;
        self.state = CacheState::Running;
        info!(reclaim = ?self.reclaim, "Resource cache initialized");
        Ok(())
    }

    /// Returns a handle to the asset called `name`, creating it on a miss.
    ///
    /// A miss constructs the entity in `Created` state, indexes it and queues
    /// its load for the next flush. A hit only adds a reference, even if the
    /// entity is waiting to be released.
    ///
    /// # Panics
    ///
    /// If the cache is not running, or if `name` is already cached as a
    /// different asset type.
    pub fn create<T: Resource>(&self, name: &str) -> Handle<T> {
        self.assert_running("create");
        self.lookup_or_create(name).unwrap_or_else(|error| match error {
            LoadError::Malformed(reason) => panic!("{reason}"),
            other => panic!("{other}"),
        })
    }

    /// Shared body of [`ResourceCache::create`] and [`LoadContext::create`].
    ///
    /// A name already cached as another asset type is a `Malformed` error so
    /// a payload naming the wrong kind only fails its own load.
    pub(crate) fn lookup_or_create<T: Resource>(&self, name: &str) -> Result<Handle<T>, LoadError> {
        let id = ResourceId::from_name(name);

        let existing = self.index.borrow().get(id).cloned();
        if let Some(existing) = existing {
            let kind = existing.kind();
            let rescued = existing.header().ref_count() == 0;
            let entry = existing.into_any().downcast::<Entry<T>>().map_err(|_| {
                LoadError::Malformed(format!(
                    "{name} ({id}) is cached as a {kind}, requested as a {}",
                    T::KIND
                ))
            })?;
            trace!(%id, %name, rescued, "Resource cache hit");
            return Ok(Handle::acquire(entry));
        }

        let serial = self.next_serial.get();
        self.next_serial.set(serial + 1);

        let debug_name = self.keep_debug_names.then_some(name);
        let header = ResourceHeader::new(id, serial, debug_name, self.requests.clone());
        let entry = Rc::new(Entry::<T>::new(header));
        let (size, align) = entry.footprint();
        self.allocator.allocate(size, align);

        let erased: Rc<dyn ErasedResource> = entry.clone();
        let path = self.resolver.resolve(name);
        self.requests
            .push(PendingRequest::load(Rc::downgrade(&erased), path));
        let inserted = self.index.borrow_mut().insert(id, erased);
        assert!(inserted.is_ok(), "resource id {id} indexed twice");

        debug!(%id, %name, kind = T::KIND, serial, "Resource created");
        Ok(Handle::acquire(entry))
    }

    /// Gives up a handle. Same as dropping it.
    pub fn destroy<T: Resource>(&self, handle: Handle<T>) {
        drop(handle);
    }

    pub fn find_by_name(&self, name: &str) -> Option<ResourceInfo> {
        self.find_by_id(ResourceId::from_name(name))
    }

    pub fn find_by_id(&self, id: ResourceId) -> Option<ResourceInfo> {
        self.index
            .borrow()
            .get(id)
            .map(|resource| ResourceInfo::of(resource.as_ref()))
    }

    /// Number of indexed entities.
    pub fn len(&self) -> usize {
        self.index.borrow().len()
    }

    pub fn is_empty(&self) -> bool {
        self.index.borrow().is_empty()
    }

    /// Whether any request is waiting for a flush.
    pub fn has_pending_requests(&self) -> bool {
        !self.requests.is_empty()
    }

    /// Snapshot of every indexed entity.
    pub fn resident(&self) -> Vec<ResourceInfo> {
        self.index
            .borrow()
            .iter()
            .map(|(_, resource)| ResourceInfo::of(resource.as_ref()))
            .collect()
    }

    pub fn stats(&self) -> CacheStats {
        CacheStats {
            resident: self.len(),
            pending_requests: self.requests.pending_len(),
            deferred_releases: self.requests.deferred_len(),
            loads_attempted: self.counters.loads_attempted.get(),
            loads_failed: self.counters.loads_failed.get(),
            destroyed: self.counters.destroyed.get(),
            flushes: self.counters.flushes.get(),
            memory: self.allocator.stats(),
        }
    }

    pub fn allocation_stats(&self) -> AllocStats {
        self.allocator.stats()
    }

    /// Takes the events recorded since the last call.
    pub fn drain_events(&self) -> Vec<CacheEvent> {
        self.events.borrow_mut().drain()
    }

    /// Per-tick flush. Call exactly once per tick.
    ///
    /// # Panics
    ///
    /// If the cache is not running or a flush is already in progress (for
    /// example when called from inside a [`Resource::load`]).
    pub fn update(&self) {
        self.assert_running("update");
        let _guard = FlushGuard::enter(&self.flushing);

        match self.reclaim {
            ReclaimPolicy::SameTick => {
                self.process_pending();
                self.reclaim_deferred();
            }
            ReclaimPolicy::NextTick => {
                self.reclaim_deferred();
                self.process_pending();
            }
        }

        bump(&self.counters.flushes);
        trace!(
            resident = self.len(),
            pending = self.requests.pending_len(),
            deferred = self.requests.deferred_len(),
            "Resource flush complete"
        );
    }

    /// Pass A.
    fn process_pending(&self) {
        while let Some(request) = self.requests.pop_pending() {
            let Some(target) = request.target.upgrade() else {
                trace!("Dropping request for a destroyed resource");
                continue;
            };
            let header = target.header();

            if header.ref_count.is_zero() {
                // An unloaded candidate keeps its path so a rescue can still load it.
                let load_path = request
                    .load_path
                    .filter(|_| header.state() == ResourceState::Created);
                self.requests.defer(PendingRequest {
                    target: request.target,
                    load_path,
                    revivals: header.ref_count.revivals(),
                });
            } else if header.state() == ResourceState::Created {
                match request.load_path.as_deref() {
                    Some(path) => self.load_entity(target.as_ref(), path),
                    None => trace!(id = %header.id(), "Stale release request, load still queued"),
                }
            } else {
                trace!(
                    id = %header.id(),
                    release = request.is_release(),
                    "Stale request dropped"
                );
            }
        }
        self.requests.shrink_pending();
    }

    fn load_entity(&self, target: &dyn ErasedResource, path: &Path) {
        let header = target.header();
        let id = header.id();
        bump(&self.counters.loads_attempted);

        let result = self.loader.load(path).and_then(|data| {
            if data.is_empty() {
                return Err(LoadError::Empty);
            }
            self.allocator.allocate(data.len(), 1);
            let ctx = LoadContext::new(self, id);
            let applied = target.apply_payload(&data, &ctx);
            self.allocator.free(data.len(), 1);
            applied
        });

        match result {
            Ok(()) => {
                header.set_state(ResourceState::Loaded);
                debug!(%id, kind = target.kind(), path = %path.display(), "Resource loaded");
                self.events.borrow_mut().push(CacheEvent::Loaded {
                    id,
                    kind: target.kind(),
                });
            }
            Err(error) => {
                header.set_state(ResourceState::Invalid);
                bump(&self.counters.loads_failed);
                warn!(
                    %id,
                    kind = target.kind(),
                    path = %path.display(),
                    %error,
                    "Resource failed to load"
                );
                self.events.borrow_mut().push(CacheEvent::Failed {
                    id,
                    kind: target.kind(),
                    error,
                });
            }
        }
    }

    /// Pass B.
    fn reclaim_deferred(&self) {
        while let Some(request) = self.requests.pop_deferred() {
            let Some(target) = request.target.upgrade() else {
                continue;
            };
            let header = target.header();
            // Rescued since Pass A, even if released again: that later release
            // has its own request and gets its own wait.
            let rescued = !header.ref_count.is_zero()
                || header.ref_count.revivals() != request.revivals;
            if !rescued {
                self.destroy_entity(target);
            } else if header.state() == ResourceState::Created && request.load_path.is_some() {
                trace!(id = %header.id(), "Unloaded release candidate rescued, load requeued");
                self.requests.push(request);
            } else {
                trace!(id = %header.id(), "Release candidate rescued");
            }
        }
    }

    fn destroy_entity(&self, target: Rc<dyn ErasedResource>) {
        let id = target.header().id();
        let kind = target.kind();
        let (size, align) = target.footprint();

        let removed = self.index.borrow_mut().remove(id);
        assert!(
            removed
                .as_ref()
                .is_some_and(|r| r.header().serial() == target.header().serial()),
            "release candidate {id} was not the indexed instance"
        );
        drop(removed);

        // Last strong reference: dropping it runs the asset's destructor,
        // which may release handles to other entities.
        debug_assert_eq!(Rc::strong_count(&target), 1);
        let weak: Weak<dyn ErasedResource> = Rc::downgrade(&target);
        drop(target);
        debug_assert!(weak.upgrade().is_none());

        self.allocator.free(size, align);
        bump(&self.counters.destroyed);
        debug!(%id, kind, "Resource destroyed");
        self.events
            .borrow_mut()
            .push(CacheEvent::Destroyed { id, kind });
    }

    /// Flushes until no request is left (or the flush limit is hit), then
    /// reports whatever is still indexed.
    pub fn shutdown(&mut self) -> LeakReport {
        self.assert_running("shutdown");

        let mut flushes = 0;
        while self.has_pending_requests() && flushes < self.shutdown_flush_limit {
            self.update();
            flushes += 1;
        }
        if self.has_pending_requests() {
            warn!(
                flushes,
                pending = self.requests.pending_len(),
                "Resource cache shut down with requests outstanding"
            );
        }

        let report = LeakReport {
            leaked: self.resident(),
        };
        if report.is_clean() {
            info!(flushes, "Resource cache shut down cleanly");
        } else {
            warn!(count = report.leaked.len(), "Some resources are leaking");
            for leak in &report.leaked {
                warn!(
                    resource = %leak.label(),
                    kind = leak.kind,
                    ref_count = leak.ref_count,
                    "Leaked resource"
                );
            }
        }

        self.state = CacheState::ShutDown;
        report
    }
}

impl Drop for ResourceCache {
    fn drop(&mut self) {
        if self.state == CacheState::Running {
            warn!(resident = self.len(), "Resource cache dropped without shutdown()");
        }
    }
}
