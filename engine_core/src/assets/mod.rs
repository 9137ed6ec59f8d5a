//! Engine asset types.
//!
//! Compiled assets are flat little-endian records. [`PayloadReader`] does the
//! bounds-checked reads every loader needs; [`PayloadWriter`] is its inverse
//! for the offline compilers and for test fixtures.

pub mod material;
pub mod mesh;
pub mod texture;

use anyhow::ensure;
use bytes::{Buf, BufMut, Bytes, BytesMut};

use crate::loader::LoadError;

pub use material::{Material, MaterialDesc, MaterialTexture, MAX_TEXTURE_UNITS};
pub use mesh::{
    AttributeType, IndexType, Mesh, MeshDesc, SubMesh, SubMeshDesc, VertexAttribute,
    VertexSemantic, MAX_SUB_MESHES,
};
pub use texture::{MipLevel, Texture, TextureFlags, MAX_MIP_LEVELS};

/// Fixed width of a name field, NUL padded.
pub const NAME_LEN: usize = 256;

/// Cursor over an asset payload.
pub struct PayloadReader<'a> {
    data: &'a [u8],
}

impl<'a> PayloadReader<'a> {
    pub fn new(data: &'a [u8]) -> Self {
        Self { data }
    }

    pub fn remaining(&self) -> usize {
        self.data.len()
    }

    fn need(&self, needed: usize) -> Result<(), LoadError> {
        if self.data.len() < needed {
            return Err(LoadError::Truncated {
                needed,
                remaining: self.data.len(),
            });
        }
        Ok(())
    }

    pub fn read_u32(&mut self) -> Result<u32, LoadError> {
        self.need(4)?;
        Ok(self.data.get_u32_le())
    }

    /// Reads a `u32` used as a length or count.
    pub fn read_len(&mut self) -> Result<usize, LoadError> {
        let value = self.read_u32()?;
        usize::try_from(value).map_err(|_| LoadError::Malformed(format!("length {value} overflows")))
    }

    pub fn read_bytes(&mut self, len: usize) -> Result<&'a [u8], LoadError> {
        self.need(len)?;
        let (head, tail) = self.data.split_at(len);
        self.data = tail;
        Ok(head)
    }

    /// Reads a NUL padded [`NAME_LEN`] field.
    pub fn read_name(&mut self) -> Result<String, LoadError> {
        let field = self.read_bytes(NAME_LEN)?;
        let end = field.iter().position(|&b| b == 0).unwrap_or(NAME_LEN);
        if end == 0 {
            return Err(LoadError::Malformed("empty name field".into()));
        }
        std::str::from_utf8(&field[..end])
            .map(str::to_string)
            .map_err(|e| LoadError::Malformed(format!("name is not utf-8: {e}")))
    }
}

/// Builds asset payloads.
#[derive(Debug, Default)]
pub struct PayloadWriter {
    buf: BytesMut,
}

impl PayloadWriter {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn put_u32(&mut self, value: u32) {
        self.buf.put_u32_le(value);
    }

    /// Writes a length or count, which must fit the format's `u32`.
    pub fn put_len(&mut self, len: usize) -> anyhow::Result<()> {
        let value = u32::try_from(len)?;
        self.put_u32(value);
        Ok(())
    }

    pub fn put_bytes(&mut self, data: &[u8]) {
        self.buf.put_slice(data);
    }

    /// Writes `name` into a NUL padded [`NAME_LEN`] field.
    pub fn put_name(&mut self, name: &str) -> anyhow::Result<()> {
        ensure!(!name.is_empty(), "asset name is empty");
        ensure!(
            name.len() < NAME_LEN,
            "asset name {name:?} does not fit in {NAME_LEN} bytes"
        );
        ensure!(!name.contains('\0'), "asset name {name:?} contains NUL");
        self.buf.put_slice(name.as_bytes());
        self.buf.put_bytes(0, NAME_LEN - name.len());
        Ok(())
    }

    pub fn finish(self) -> Bytes {
        self.buf.freeze()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn reader_reports_truncation() {
        let mut reader = PayloadReader::new(&[1, 0]);
        assert_eq!(
            reader.read_u32(),
            Err(LoadError::Truncated {
                needed: 4,
                remaining: 2
            })
        );
    }

    #[test]
    fn name_field_is_padded() {
        let mut writer = PayloadWriter::new();
        writer.put_name("stone.btx").unwrap();
        writer.put_u32(7);
        let data = writer.finish();
        assert_eq!(data.len(), NAME_LEN + 4);

        let mut reader = PayloadReader::new(&data);
        assert_eq!(reader.read_name().unwrap(), "stone.btx");
        assert_eq!(reader.read_u32().unwrap(), 7);
        assert_eq!(reader.remaining(), 0);
    }

    #[test]
    fn oversized_name_is_rejected() {
        let mut writer = PayloadWriter::new();
        assert!(writer.put_name(&"x".repeat(NAME_LEN)).is_err());
    }

    #[test]
    fn blank_name_field_is_malformed() {
        let zeros = [0u8; NAME_LEN];
        let mut reader = PayloadReader::new(&zeros);
        assert!(matches!(reader.read_name(), Err(LoadError::Malformed(_))));
    }
}
