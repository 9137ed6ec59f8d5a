//! Cacheable entities.
//!
//! An entity is an [`Entry`]: a [`ResourceHeader`] (id, lifecycle state,
//! intrusive count, release hook) plus a slot that receives the asset once
//! its bytes have been loaded. Concrete asset types plug in by implementing
//! [`Resource`]; the cache only sees them through [`ErasedResource`].

use std::any::Any;
use std::cell::{Cell, OnceCell};
use std::rc::{Rc, Weak};

use serde::{Deserialize, Serialize};

use crate::cache::ResourceCache;
use crate::handle::Handle;
use crate::id::ResourceId;
use crate::ledger::{PendingRequest, RequestQueue};
use crate::loader::LoadError;
use crate::refcount::RefCount;

/// Lifecycle state of an entity.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum ResourceState {
    /// Constructed and indexed, payload not applied yet.
    Created,
    /// Payload applied.
    Loaded,
    /// Loading failed. Terminal, the cache never retries.
    Invalid,
}

impl ResourceState {
    pub fn is_pending(self) -> bool {
        self == ResourceState::Created
    }

    pub fn is_loaded(self) -> bool {
        self == ResourceState::Loaded
    }

    pub fn is_valid(self) -> bool {
        self != ResourceState::Invalid
    }

    pub fn is_ready(self) -> bool {
        self.is_loaded() && self.is_valid()
    }
}

/// An asset type the cache can load from bytes.
pub trait Resource: Sized + 'static {
    /// Short type tag used in logs and reports.
    const KIND: &'static str;

    /// Builds the asset from its payload.
    ///
    /// The payload buffer is released right after this returns, so anything
    /// the asset keeps must be copied out. Dependencies are requested through
    /// `ctx`.
    fn load(data: &[u8], ctx: &LoadContext<'_>) -> Result<Self, LoadError>;
}

/// What a [`Resource::load`] call may do besides parsing.
pub struct LoadContext<'a> {
    cache: &'a ResourceCache,
    id: ResourceId,
}

impl<'a> LoadContext<'a> {
    pub(crate) fn new(cache: &'a ResourceCache, id: ResourceId) -> Self {
        Self { cache, id }
    }

    /// Id of the entity being loaded.
    pub fn id(&self) -> ResourceId {
        self.id
    }

    pub(crate) fn cache(&self) -> &'a ResourceCache {
        self.cache
    }

    /// Requests a dependency. Its load runs later in the same flush.
    ///
    /// Fails with [`LoadError::Malformed`] when `name` is already cached as
    /// a different asset type.
    pub fn create<U: Resource>(&self, name: &str) -> Result<Handle<U>, LoadError> {
        self.cache.lookup_or_create::<U>(name)
    }
}

/// State shared by every entity regardless of its asset type.
pub struct ResourceHeader {
    id: ResourceId,
    serial: u64,
    state: Cell<ResourceState>,
    pub(crate) ref_count: RefCount,
    debug_name: Option<Box<str>>,
    requests: RequestQueue,
}

impl ResourceHeader {
    pub(crate) fn new(
        id: ResourceId,
        serial: u64,
        debug_name: Option<&str>,
        requests: RequestQueue,
    ) -> Self {
        Self {
            id,
            serial,
            state: Cell::new(ResourceState::Created),
            ref_count: RefCount::new(),
            debug_name: debug_name.map(Into::into),
            requests,
        }
    }

    pub fn id(&self) -> ResourceId {
        self.id
    }

    /// Construction order number; distinct for every instance ever built.
    pub fn serial(&self) -> u64 {
        self.serial
    }

    pub fn state(&self) -> ResourceState {
        self.state.get()
    }

    pub(crate) fn set_state(&self, state: ResourceState) {
        debug_assert_eq!(self.state.get(), ResourceState::Created);
        self.state.set(state);
    }

    pub fn ref_count(&self) -> usize {
        self.ref_count.get()
    }

    pub fn debug_name(&self) -> Option<&str> {
        self.debug_name.as_deref()
    }

    /// Release hook: queues a "consider freeing" request for `target`.
    pub(crate) fn release(&self, target: Weak<dyn ErasedResource>) {
        self.requests.push(PendingRequest::release(target));
    }
}

/// Storage for one cached asset.
pub struct Entry<T> {
    pub(crate) header: ResourceHeader,
    asset: OnceCell<T>,
}

impl<T: Resource> Entry<T> {
    pub(crate) fn new(header: ResourceHeader) -> Self {
        Self {
            header,
            asset: OnceCell::new(),
        }
    }

    pub(crate) fn asset(&self) -> Option<&T> {
        self.asset.get()
    }
}

/// Type-erased view of an [`Entry`] used by the index and the ledger.
pub trait ErasedResource: 'static {
    fn header(&self) -> &ResourceHeader;

    fn kind(&self) -> &'static str;

    /// Size and alignment reported to the allocator.
    fn footprint(&self) -> (usize, usize);

    /// Parses `data` and stores the asset. Does not touch the state.
    fn apply_payload(&self, data: &[u8], ctx: &LoadContext<'_>) -> Result<(), LoadError>;

    fn into_any(self: Rc<Self>) -> Rc<dyn Any>;
}

impl<T: Resource> ErasedResource for Entry<T> {
    fn header(&self) -> &ResourceHeader {
        &self.header
    }

    fn kind(&self) -> &'static str {
        T::KIND
    }

    fn footprint(&self) -> (usize, usize) {
        (std::mem::size_of::<Self>(), std::mem::align_of::<Self>())
    }

    fn apply_payload(&self, data: &[u8], ctx: &LoadContext<'_>) -> Result<(), LoadError> {
        let asset = T::load(data, ctx)?;
        if self.asset.set(asset).is_err() {
            panic!("resource {} loaded twice", self.header.id);
        }
        Ok(())
    }

    fn into_any(self: Rc<Self>) -> Rc<dyn Any> {
        self
    }
}

/// Non-owning snapshot of an indexed entity.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ResourceInfo {
    pub id: ResourceId,
    pub serial: u64,
    pub kind: &'static str,
    pub state: ResourceState,
    pub ref_count: usize,
    pub name: Option<String>,
}

impl ResourceInfo {
    pub(crate) fn of(resource: &dyn ErasedResource) -> Self {
        let header = resource.header();
        Self {
            id: header.id(),
            serial: header.serial(),
            kind: resource.kind(),
            state: header.state(),
            ref_count: header.ref_count(),
            name: header.debug_name().map(str::to_string),
        }
    }

    /// Name if known, otherwise the id.
    pub fn label(&self) -> String {
        match &self.name {
            Some(name) => name.clone(),
            None => format!("#{}", self.id),
        }
    }
}
