//! Texture asset (`.btx`).
//!
//! Layout: `internal_format, external_format, mip_count, flags`, then per
//! level `size, width, height, data[size]`. Levels past [`MAX_MIP_LEVELS`]
//! are ignored.

use bytes::Bytes;

use super::{PayloadReader, PayloadWriter};
use crate::loader::LoadError;
use crate::resource::{LoadContext, Resource};

/// Mip levels kept per texture.
pub const MAX_MIP_LEVELS: usize = 16;

bitflags::bitflags! {
    /// Texture header flags.
    #[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
    pub struct TextureFlags: u32 {
        const COMPRESSED = 1 << 0;
    }
}

/// One mip level. `data` is a view into the texture's single pixel buffer.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MipLevel {
    pub width: u32,
    pub height: u32,
    pub data: Bytes,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Texture {
    pub internal_format: u32,
    pub external_format: u32,
    pub flags: TextureFlags,
    pub levels: Vec<MipLevel>,
}

impl Texture {
    pub fn is_compressed(&self) -> bool {
        self.flags.contains(TextureFlags::COMPRESSED)
    }

    /// Bytes of pixel data across all levels.
    pub fn byte_size(&self) -> usize {
        self.levels.iter().map(|level| level.data.len()).sum()
    }

    /// Serializes into the `.btx` layout.
    pub fn encode(&self) -> anyhow::Result<Bytes> {
        anyhow::ensure!(!self.levels.is_empty(), "texture has no mip levels");
        anyhow::ensure!(
            self.levels.len() <= MAX_MIP_LEVELS,
            "texture has {} mip levels, at most {MAX_MIP_LEVELS} are supported",
            self.levels.len()
        );

        let mut w = PayloadWriter::new();
        w.put_u32(self.internal_format);
        w.put_u32(self.external_format);
        w.put_len(self.levels.len())?;
        w.put_u32(self.flags.bits());
        for level in &self.levels {
            w.put_len(level.data.len())?;
            w.put_u32(level.width);
            w.put_u32(level.height);
            w.put_bytes(&level.data);
        }
        Ok(w.finish())
    }
}

impl Resource for Texture {
    const KIND: &'static str = "texture";

    fn load(data: &[u8], _ctx: &LoadContext<'_>) -> Result<Self, LoadError> {
        // One copy for the whole payload; levels are slices of it.
        let payload = Bytes::copy_from_slice(data);
        let mut r = PayloadReader::new(&payload);

        let internal_format = r.read_u32()?;
        let external_format = r.read_u32()?;
        let mip_count = r.read_len()?;
        let raw_flags = r.read_u32()?;
        let flags = TextureFlags::from_bits(raw_flags)
            .ok_or_else(|| LoadError::Malformed(format!("unknown texture flags {raw_flags:#x}")))?;
        if mip_count == 0 {
            return Err(LoadError::Malformed("texture has no mip levels".into()));
        }

        let count = mip_count.min(MAX_MIP_LEVELS);
        let mut levels = Vec::with_capacity(count);
        for _ in 0..count {
            let size = r.read_len()?;
            let width = r.read_u32()?;
            let height = r.read_u32()?;
            let pixels = r.read_bytes(size)?;
            levels.push(MipLevel {
                width,
                height,
                data: payload.slice_ref(pixels),
            });
        }

        Ok(Self {
            internal_format,
            external_format,
            flags,
            levels,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn level(width: u32, height: u32) -> MipLevel {
        let len = (width * height * 4) as usize;
        MipLevel {
            width,
            height,
            data: Bytes::from(vec![0xab; len]),
        }
    }

    fn sample() -> Texture {
        Texture {
            internal_format: 0x8058,
            external_format: 0x1908,
            flags: TextureFlags::empty(),
            levels: vec![level(4, 4), level(2, 2), level(1, 1)],
        }
    }

    fn decode(data: &[u8]) -> Result<Texture, LoadError> {
        crate::test_support::with_load_context(|ctx| Texture::load(data, ctx))
    }

    #[test]
    fn encoded_texture_loads() {
        let texture = sample();
        let loaded = decode(&texture.encode().unwrap()).unwrap();
        assert_eq!(loaded, texture);
        assert_eq!(loaded.byte_size(), 64 + 16 + 4);
        assert!(!loaded.is_compressed());
    }

    #[test]
    fn levels_past_the_limit_are_ignored() {
        let mut w = PayloadWriter::new();
        w.put_u32(1);
        w.put_u32(2);
        w.put_u32(20);
        w.put_u32(TextureFlags::COMPRESSED.bits());
        for _ in 0..20 {
            w.put_u32(1);
            w.put_u32(1);
            w.put_u32(1);
            w.put_bytes(&[7]);
        }

        let loaded = decode(&w.finish()).unwrap();
        assert_eq!(loaded.levels.len(), MAX_MIP_LEVELS);
        assert!(loaded.is_compressed());
    }

    #[test]
    fn truncated_level_fails() {
        let data = sample().encode().unwrap();
        let err = decode(&data[..data.len() - 1]).unwrap_err();
        assert!(matches!(err, LoadError::Truncated { .. }));
    }

    #[test]
    fn zero_levels_is_malformed() {
        let mut w = PayloadWriter::new();
        for value in [1, 2, 0, 0] {
            w.put_u32(value);
        }
        assert!(matches!(decode(&w.finish()), Err(LoadError::Malformed(_))));
    }
}
