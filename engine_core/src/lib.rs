//! `engine_core`
//!
//! Reference-counted resource cache used by the engine and its tools.
//!
//! Design goals:
//! - Assets are shared by name and live exactly as long as someone holds a
//!   [`Handle`](handle::Handle) to them.
//! - Loading and destruction are batched into one flush per tick, never run
//!   from inside `create` or a handle drop.
//! - Byte sources, name resolution and allocation accounting are traits, so
//!   tools and tests can swap them out.
//! - Single-threaded. No `unsafe`.

pub mod assets;
pub mod cache;
pub mod config;
pub mod event;
pub mod handle;
pub mod id;
pub mod ledger;
pub mod loader;
pub mod memory;
pub mod refcount;
pub mod resource;
pub mod table;

#[cfg(test)]
pub(crate) mod test_support;

pub use cache::{CacheState, CacheStats, LeakReport, ResourceCache};
pub use handle::Handle;
pub use id::ResourceId;
pub use resource::{LoadContext, Resource, ResourceInfo, ResourceState};

pub mod prelude {
    //! Commonly used exports.

    pub use crate::assets::{Material, Mesh, Texture};
    pub use crate::cache::*;
    pub use crate::config::*;
    pub use crate::event::CacheEvent;
    pub use crate::handle::Handle;
    pub use crate::id::ResourceId;
    pub use crate::loader::*;
    pub use crate::memory::{AllocStats, Allocator, TrackingAllocator};
    pub use crate::resource::{LoadContext, Resource, ResourceInfo, ResourceState};
}
