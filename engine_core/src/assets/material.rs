//! Material asset (`.bmt`).
//!
//! Layout: `program_id, set_id, texture_count`, then per texture
//! `unit, name[256]`. Every named texture is requested from the cache while
//! the material loads, so it finishes loading within the same flush.

use bytes::Bytes;

use super::texture::Texture;
use super::{PayloadReader, PayloadWriter};
use crate::handle::Handle;
use crate::loader::LoadError;
use crate::resource::{LoadContext, Resource};

/// Texture units a material can bind.
pub const MAX_TEXTURE_UNITS: usize = 8;

/// A texture bound to a unit.
#[derive(Debug, Clone)]
pub struct MaterialTexture {
    pub unit: u32,
    pub texture: Handle<Texture>,
}

#[derive(Debug, Clone)]
pub struct Material {
    pub program_id: u32,
    pub set_id: u32,
    pub textures: Vec<MaterialTexture>,
}

impl Material {
    /// Texture bound to `unit`, if any.
    pub fn texture(&self, unit: u32) -> Option<&Handle<Texture>> {
        self.textures
            .iter()
            .find(|binding| binding.unit == unit)
            .map(|binding| &binding.texture)
    }

    /// Whether every bound texture has loaded.
    pub fn textures_ready(&self) -> bool {
        self.textures.iter().all(|binding| binding.texture.is_ready())
    }
}

impl Resource for Material {
    const KIND: &'static str = "material";

    fn load(data: &[u8], ctx: &LoadContext<'_>) -> Result<Self, LoadError> {
        let mut r = PayloadReader::new(data);
        let program_id = r.read_u32()?;
        let set_id = r.read_u32()?;
        let count = r.read_len()?;
        if count > MAX_TEXTURE_UNITS {
            return Err(LoadError::Malformed(format!(
                "material binds {count} textures, at most {MAX_TEXTURE_UNITS} units exist"
            )));
        }

        let mut textures = Vec::with_capacity(count);
        for _ in 0..count {
            let unit = r.read_u32()?;
            if unit as usize >= MAX_TEXTURE_UNITS {
                return Err(LoadError::Malformed(format!("texture unit {unit} out of range")));
            }
            let name = r.read_name()?;
            textures.push(MaterialTexture {
                unit,
                texture: ctx.create::<Texture>(&name)?,
            });
        }

        Ok(Self {
            program_id,
            set_id,
            textures,
        })
    }
}

/// Source description of a material, for [`MaterialDesc::encode`].
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct MaterialDesc {
    pub program_id: u32,
    pub set_id: u32,
    /// `(unit, texture name)` pairs.
    pub textures: Vec<(u32, String)>,
}

impl MaterialDesc {
    /// Serializes into the `.bmt` layout.
    pub fn encode(&self) -> anyhow::Result<Bytes> {
        anyhow::ensure!(
            self.textures.len() <= MAX_TEXTURE_UNITS,
            "material binds {} textures, at most {MAX_TEXTURE_UNITS} units exist",
            self.textures.len()
        );

        let mut w = PayloadWriter::new();
        w.put_u32(self.program_id);
        w.put_u32(self.set_id);
        w.put_len(self.textures.len())?;
        for (unit, name) in &self.textures {
            anyhow::ensure!(
                (*unit as usize) < MAX_TEXTURE_UNITS,
                "texture unit {unit} out of range"
            );
            w.put_u32(*unit);
            w.put_name(name)?;
        }
        Ok(w.finish())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::loader::MemoryLoader;
    use crate::test_support::running_cache;

    fn desc() -> MaterialDesc {
        MaterialDesc {
            program_id: 3,
            set_id: 1,
            textures: vec![(0, "rock.btx".into()), (2, "rock_n.btx".into())],
        }
    }

    #[test]
    fn load_requests_each_texture() {
        let cache = running_cache(MemoryLoader::new());
        let ctx = LoadContext::new(&cache, crate::id::ResourceId(0));

        let material = Material::load(&desc().encode().unwrap(), &ctx).unwrap();
        assert_eq!(material.program_id, 3);
        assert_eq!(material.textures.len(), 2);
        assert_eq!(material.texture(2).unwrap().name(), Some("rock_n.btx"));
        assert!(material.texture(1).is_none());
        assert!(!material.textures_ready());

        let info = cache.find_by_name("rock.btx").unwrap();
        assert_eq!(info.kind, "texture");
        assert_eq!(info.ref_count, 1);
    }

    #[test]
    fn too_many_units_is_malformed() {
        let mut w = PayloadWriter::new();
        w.put_u32(0);
        w.put_u32(0);
        w.put_len(MAX_TEXTURE_UNITS + 1).unwrap();
        let data = w.finish();

        let result = crate::test_support::with_load_context(|ctx| Material::load(&data, ctx).err());
        assert!(matches!(result, Some(LoadError::Malformed(_))));
    }

    #[test]
    fn encode_rejects_bad_unit() {
        let mut bad = desc();
        bad.textures.push((9, "x.btx".into()));
        assert!(bad.encode().is_err());
    }
}
