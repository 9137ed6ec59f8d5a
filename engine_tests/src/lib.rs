//! Fixtures shared by the integration tests.
//!
//! Payload builders go through the asset encoders, so every fixture is a
//! well-formed compiled asset unless a test corrupts it on purpose.

use std::path::{Path, PathBuf};

use bytes::Bytes;
use engine_core::assets::{
    AttributeType, IndexType, MaterialDesc, MeshDesc, MipLevel, SubMeshDesc, Texture,
    TextureFlags, VertexAttribute, VertexSemantic,
};
use engine_core::cache::ResourceCache;
use engine_core::config::{EngineConfig, ReclaimPolicy};
use engine_core::loader::MemoryLoader;

pub fn init_tracing() {
    let _ = tracing_subscriber::fmt()
        .with_env_filter("info")
        .with_test_writer()
        .try_init();
}

/// A `.btx` payload with `mips` levels halving from `size`x`size`.
pub fn texture(size: u32, mips: usize) -> Bytes {
    let levels = (0..mips)
        .map(|i| {
            let edge = (size >> i).max(1);
            MipLevel {
                width: edge,
                height: edge,
                data: Bytes::from(vec![i as u8; (edge * edge * 4) as usize]),
            }
        })
        .collect();
    Texture {
        internal_format: 0x8058,
        external_format: 0x1908,
        flags: TextureFlags::empty(),
        levels,
    }
    .encode()
    .expect("texture fixture encodes")
}

/// A `.bmt` payload binding `textures` to units 0, 1, ...
pub fn material(textures: &[&str]) -> Bytes {
    MaterialDesc {
        program_id: 1,
        set_id: 0,
        textures: textures
            .iter()
            .enumerate()
            .map(|(unit, name)| (unit as u32, name.to_string()))
            .collect(),
    }
    .encode()
    .expect("material fixture encodes")
}

/// A `.bmh` payload: a position-only triangle per material.
pub fn mesh(materials: &[&str]) -> Bytes {
    MeshDesc {
        index_type: IndexType::U16,
        attributes: vec![VertexAttribute {
            semantic: VertexSemantic::Position,
            ty: AttributeType::Float,
            components: 3,
            offset: 0,
        }],
        vertex_data: Bytes::from(vec![0u8; 3 * 12]),
        sub_meshes: materials
            .iter()
            .map(|name| SubMeshDesc {
                indices: Bytes::from_static(&[0, 0, 1, 0, 2, 0]),
                material: name.to_string(),
            })
            .collect(),
    }
    .encode()
    .expect("mesh fixture encodes")
}

/// Path a name resolves to under the default cache directory.
pub fn cache_path(name: &str) -> PathBuf {
    Path::new(&EngineConfig::default().cache_dir).join(name)
}

/// In-memory loader holding `assets` under the default cache directory.
pub fn loader_with(assets: &[(&str, Bytes)]) -> MemoryLoader {
    let loader = MemoryLoader::new();
    for (name, data) in assets {
        loader.insert(cache_path(name), data.clone());
    }
    loader
}

/// A small scene: one mesh using two materials that share a texture.
pub fn scene_loader() -> MemoryLoader {
    loader_with(&[
        ("level.bmh", mesh(&["rock.bmt", "moss.bmt"])),
        ("rock.bmt", material(&["rock.btx", "detail.btx"])),
        ("moss.bmt", material(&["moss.btx", "detail.btx"])),
        ("rock.btx", texture(64, 7)),
        ("moss.btx", texture(32, 6)),
        ("detail.btx", texture(16, 5)),
    ])
}

pub fn config(reclaim: ReclaimPolicy) -> EngineConfig {
    EngineConfig {
        reclaim,
        keep_debug_names: true,
        ..Default::default()
    }
}

/// An initialized cache over `loader`.
pub fn running_cache(loader: &MemoryLoader, reclaim: ReclaimPolicy) -> ResourceCache {
    let mut cache = ResourceCache::new(&config(reclaim), Box::new(loader.clone()));
    cache
        .initialize()
        .expect("memory loader always initializes");
    cache
}

/// A scratch directory removed on drop.
pub struct TempRoot {
    path: PathBuf,
}

impl TempRoot {
    pub fn new(tag: &str) -> anyhow::Result<Self> {
        let path = std::env::temp_dir().join(format!(
            "engine_tests_{tag}_{}_{:08x}",
            std::process::id(),
            rand::random::<u32>()
        ));
        std::fs::create_dir_all(&path)?;
        Ok(Self { path })
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Writes `data` to `<root>/<relative>`, creating parent directories.
    pub fn write(&self, relative: impl AsRef<Path>, data: &[u8]) -> anyhow::Result<()> {
        let full = self.path.join(relative);
        if let Some(parent) = full.parent() {
            std::fs::create_dir_all(parent)?;
        }
        std::fs::write(full, data)?;
        Ok(())
    }
}

impl Drop for TempRoot {
    fn drop(&mut self) {
        if let Err(error) = std::fs::remove_dir_all(&self.path) {
            tracing::warn!(path = %self.path.display(), %error, "Failed to remove temp root");
        }
    }
}
