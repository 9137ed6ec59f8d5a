//! Configuration system.
//!
//! Loads engine configuration from JSON strings/files (file IO left to app).

use serde::{Deserialize, Serialize};

/// When release candidates found by a flush are destroyed.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ReclaimPolicy {
    /// In the same `update()` that found them at zero references.
    #[default]
    SameTick,
    /// At the start of the following `update()`, unless picked up again.
    NextTick,
}

/// Root configuration shared by the cache and the viewer.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EngineConfig {
    /// Filesystem root of the byte loader.
    #[serde(default = "default_root_dir")]
    pub root_dir: String,
    /// Directory, below the root, that asset names resolve into.
    #[serde(default = "default_cache_dir")]
    pub cache_dir: String,
    /// Viewer tick rate.
    #[serde(default = "default_tick_hz")]
    pub tick_hz: u32,
    #[serde(default)]
    pub reclaim: ReclaimPolicy,
    /// Flushes `shutdown()` may run while draining requests.
    #[serde(default = "default_shutdown_flush_limit")]
    pub shutdown_flush_limit: u32,
    /// Keep logical names on entities for diagnostics.
    #[serde(default = "default_keep_debug_names")]
    pub keep_debug_names: bool,
}

fn default_root_dir() -> String {
    ".".to_string()
}

fn default_cache_dir() -> String {
    "cache".to_string()
}

fn default_tick_hz() -> u32 {
    30
}

fn default_shutdown_flush_limit() -> u32 {
    16
}

fn default_keep_debug_names() -> bool {
    cfg!(debug_assertions)
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            root_dir: default_root_dir(),
            cache_dir: default_cache_dir(),
            tick_hz: default_tick_hz(),
            reclaim: ReclaimPolicy::default(),
            shutdown_flush_limit: default_shutdown_flush_limit(),
            keep_debug_names: default_keep_debug_names(),
        }
    }
}

impl EngineConfig {
    /// Parses config from JSON.
    pub fn from_json_str(s: &str) -> serde_json::Result<Self> {
        serde_json::from_str(s)
    }
}
