//! Helpers shared by unit tests.

use crate::cache::ResourceCache;
use crate::config::EngineConfig;
use crate::id::ResourceId;
use crate::loader::MemoryLoader;
use crate::resource::LoadContext;

/// A running cache over `loader` with debug names kept.
pub(crate) fn running_cache(loader: MemoryLoader) -> ResourceCache {
    let cfg = EngineConfig {
        keep_debug_names: true,
        ..Default::default()
    };
    let mut cache = ResourceCache::new(&cfg, Box::new(loader));
    cache.initialize().expect("memory loader initializes");
    cache
}

/// Runs `f` with a load context on a throwaway cache.
pub(crate) fn with_load_context<R>(f: impl FnOnce(&LoadContext<'_>) -> R) -> R {
    let cache = running_cache(MemoryLoader::new());
    let ctx = LoadContext::new(&cache, ResourceId(0));
    f(&ctx)
}
