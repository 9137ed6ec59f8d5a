//! Asset viewer.
//!
//! Holds handles on behalf of an operator typing console commands and flushes
//! the resource cache once per fixed tick. It supports:
//! - Loading and releasing textures, materials and meshes by name
//! - Inspecting a cached entity without taking a reference
//! - Cache status and JSON statistics
//!
//! The asset type is picked from the name's extension: `.btx` textures,
//! `.bmt` materials, `.bmh` meshes.

use std::collections::BTreeMap;
use std::time::Duration;

use anyhow::{bail, ensure, Context};
use engine_core::{
    assets::{Material, Mesh, Texture},
    cache::{LeakReport, ResourceCache},
    config::EngineConfig,
    event::CacheEvent,
    handle::Handle,
    loader::ByteLoader,
    resource::{Resource, ResourceState},
};
use tokio::{sync::mpsc, time::Instant};
use tracing::{debug, info, warn};

/// Creates `name` as a `T`, refusing names already cached as another type.
fn create_checked<T: Resource>(cache: &ResourceCache, name: &str) -> anyhow::Result<Handle<T>> {
    if let Some(info) = cache.find_by_name(name) {
        ensure!(
            info.kind == T::KIND,
            "{name:?} is already cached as a {}, not a {}",
            info.kind,
            T::KIND
        );
    }
    Ok(cache.create(name))
}

/// A handle held by the viewer, whatever its asset type.
#[derive(Debug)]
pub enum HeldHandle {
    Texture(Handle<Texture>),
    Material(Handle<Material>),
    Mesh(Handle<Mesh>),
}

impl HeldHandle {
    /// Requests `name` as the asset type its extension names.
    pub fn acquire(cache: &ResourceCache, name: &str) -> anyhow::Result<Self> {
        let ext = name.rsplit_once('.').map(|(_, ext)| ext).unwrap_or_default();
        Ok(match ext {
            "btx" => HeldHandle::Texture(create_checked(cache, name)?),
            "bmt" => HeldHandle::Material(create_checked(cache, name)?),
            "bmh" => HeldHandle::Mesh(create_checked(cache, name)?),
            _ => bail!("unknown asset extension in {name:?} (expected .btx, .bmt or .bmh)"),
        })
    }

    pub fn state(&self) -> ResourceState {
        match self {
            HeldHandle::Texture(h) => h.state(),
            HeldHandle::Material(h) => h.state(),
            HeldHandle::Mesh(h) => h.state(),
        }
    }

    /// One-line summary for `status`.
    pub fn describe(&self) -> String {
        match self {
            HeldHandle::Texture(h) => match h.get() {
                Some(t) => {
                    let (w, hgt) = t
                        .levels
                        .first()
                        .map(|l| (l.width, l.height))
                        .unwrap_or_default();
                    format!("texture {w}x{hgt}, {} mips, {} bytes", t.levels.len(), t.byte_size())
                }
                None => format!("texture {:?}", h.state()),
            },
            HeldHandle::Material(h) => match h.get() {
                Some(m) => format!(
                    "material program={} set={} textures={} ready={}",
                    m.program_id,
                    m.set_id,
                    m.textures.len(),
                    m.textures_ready()
                ),
                None => format!("material {:?}", h.state()),
            },
            HeldHandle::Mesh(h) => match h.get() {
                Some(m) => format!(
                    "mesh {} vertices, {} sub-meshes",
                    m.vertex_count(),
                    m.sub_meshes.len()
                ),
                None => format!("mesh {:?}", h.state()),
            },
        }
    }
}

/// Viewer run state.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ViewerState {
    Running,
    /// `quit` was entered; the main loop should stop and shut down.
    Quitting,
}

pub struct AssetViewer {
    pub cfg: EngineConfig,
    cache: ResourceCache,
    /// Handles held by console commands, by asset name.
    held: BTreeMap<String, HeldHandle>,
    tick: u64,
    state: ViewerState,

    /// Channel for console commands from stdin.
    console_rx: Option<mpsc::Receiver<String>>,
}

impl AssetViewer {
    /// Creates a viewer reading assets from disk below `cfg.root_dir`.
    pub fn new(cfg: EngineConfig) -> anyhow::Result<Self> {
        let cache = ResourceCache::from_config(&cfg);
        Self::with_cache(cfg, cache)
    }

    /// Creates a viewer over a custom byte loader.
    pub fn with_loader(cfg: EngineConfig, loader: Box<dyn ByteLoader>) -> anyhow::Result<Self> {
        let cache = ResourceCache::new(&cfg, loader);
        Self::with_cache(cfg, cache)
    }

    fn with_cache(cfg: EngineConfig, mut cache: ResourceCache) -> anyhow::Result<Self> {
        cache.initialize().context("initialize resource cache")?;
        Ok(Self {
            cfg,
            cache,
            held: BTreeMap::new(),
            tick: 0,
            state: ViewerState::Running,
            console_rx: None,
        })
    }

    /// Sets the console input channel (for stdin commands).
    pub fn set_console_input(&mut self, rx: mpsc::Receiver<String>) {
        self.console_rx = Some(rx);
    }

    pub fn state(&self) -> ViewerState {
        self.state
    }

    pub fn tick(&self) -> u64 {
        self.tick
    }

    pub fn cache(&self) -> &ResourceCache {
        &self.cache
    }

    pub fn held(&self, name: &str) -> Option<&HeldHandle> {
        self.held.get(name)
    }

    /// Runs the viewer for a number of ticks.
    pub async fn run_for_ticks(&mut self, ticks: u32) -> anyhow::Result<()> {
        let dt = Duration::from_secs_f32(1.0 / self.cfg.tick_hz.max(1) as f32);
        let mut next = Instant::now();

        for _ in 0..ticks {
            next += dt;
            self.step()?;
            if self.state == ViewerState::Quitting {
                break;
            }
            tokio::time::sleep_until(next).await;
        }
        Ok(())
    }

    /// One tick: console commands, then the cache flush.
    ///
    /// Returns the console output produced during the tick.
    pub fn step(&mut self) -> anyhow::Result<Vec<String>> {
        let mut out = self.process_console_commands()?;
        self.cache.update();
        out.extend(self.report_events());
        self.tick += 1;
        Ok(out)
    }

    fn process_console_commands(&mut self) -> anyhow::Result<Vec<String>> {
        // Collect lines first to avoid borrow conflict
        let lines: Vec<String> = if let Some(ref mut rx) = self.console_rx {
            let mut collected = Vec::new();
            while let Ok(line) = rx.try_recv() {
                collected.push(line);
            }
            collected
        } else {
            Vec::new()
        };

        let mut out = Vec::new();
        for line in lines {
            out.extend(self.exec_console(&line)?);
        }
        Ok(out)
    }

    fn report_events(&mut self) -> Vec<String> {
        let mut out = Vec::new();
        for event in self.cache.drain_events() {
            match event {
                CacheEvent::Loaded { id, kind } => {
                    debug!(%id, kind, tick = self.tick, "Loaded");
                    out.push(format!("loaded {kind} {id}"));
                }
                CacheEvent::Failed { id, kind, error } => {
                    warn!(%id, kind, %error, "Load failed");
                    out.push(format!("failed {kind} {id}: {error}"));
                }
                CacheEvent::Destroyed { id, kind } => {
                    debug!(%id, kind, tick = self.tick, "Destroyed");
                    out.push(format!("destroyed {kind} {id}"));
                }
            }
        }
        out
    }

    /// Executes a console command.
    pub fn exec_console(&mut self, line: &str) -> anyhow::Result<Vec<String>> {
        let tokens: Vec<&str> = line.split_whitespace().collect();
        if tokens.is_empty() {
            return Ok(Vec::new());
        }

        match tokens[0] {
            "load" => {
                let Some(&name) = tokens.get(1) else {
                    return Ok(vec!["Usage: load <name>".to_string()]);
                };
                if self.held.contains_key(name) {
                    return Ok(vec![format!("'{name}' is already held")]);
                }
                match HeldHandle::acquire(&self.cache, name) {
                    Ok(handle) => {
                        let state = handle.state();
                        self.held.insert(name.to_string(), handle);
                        Ok(vec![format!("Holding '{name}' ({state:?})")])
                    }
                    Err(e) => Ok(vec![format!("Cannot load: {e}")]),
                }
            }
            "release" => {
                let Some(&name) = tokens.get(1) else {
                    return Ok(vec!["Usage: release <name>".to_string()]);
                };
                match self.held.remove(name) {
                    Some(_) => Ok(vec![format!("Released '{name}'")]),
                    None => Ok(vec![format!("'{name}' is not held")]),
                }
            }
            "find" => {
                let Some(&name) = tokens.get(1) else {
                    return Ok(vec!["Usage: find <name>".to_string()]);
                };
                match self.cache.find_by_name(name) {
                    Some(info) => Ok(vec![format!(
                        "{} {} id={} serial={} state={:?} refs={}",
                        info.kind,
                        info.label(),
                        info.id,
                        info.serial,
                        info.state,
                        info.ref_count
                    )]),
                    None => Ok(vec![format!("'{name}' is not cached")]),
                }
            }
            "status" => {
                let mut out = Vec::new();
                out.push(format!("Viewer state: {:?}", self.state));
                out.push(format!("Tick: {}", self.tick));
                out.push(format!("Resident: {}", self.cache.len()));
                out.push(format!("Held: {}", self.held.len()));
                for (name, handle) in &self.held {
                    out.push(format!("  {name}: {}", handle.describe()));
                }
                Ok(out)
            }
            "resident" => Ok(self
                .cache
                .resident()
                .into_iter()
                .map(|info| {
                    format!(
                        "  {} {} {:?} refs={}",
                        info.kind,
                        info.label(),
                        info.state,
                        info.ref_count
                    )
                })
                .collect()),
            "stats" => {
                let json =
                    serde_json::to_string_pretty(&self.cache.stats()).context("serialize stats")?;
                Ok(json.lines().map(str::to_string).collect())
            }
            "quit" | "exit" => {
                info!("Viewer shutting down");
                self.state = ViewerState::Quitting;
                Ok(vec!["Bye".to_string()])
            }
            other => Ok(vec![format!("Unknown command: {other}")]),
        }
    }

    /// Drops every held handle, drains the cache and reports leaks.
    pub fn shutdown(mut self) -> LeakReport {
        let held = self.held.len();
        self.held.clear();
        let report = self.cache.shutdown();
        info!(held, leaked = report.leaked.len(), tick = self.tick, "Viewer stopped");
        report
    }
}
