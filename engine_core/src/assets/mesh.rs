//! Mesh asset (`.bmh`).
//!
//! Layout: header `index_type, sub_mesh_count, input_count, vertex_data_size`,
//! then `input_count` vertex inputs `semantic, type, size, offset`, the vertex
//! data, and per sub-mesh `index_count, indices, material_name[256]`.

use bytes::Bytes;

use super::material::Material;
use super::{PayloadReader, PayloadWriter};
use crate::handle::Handle;
use crate::loader::LoadError;
use crate::resource::{LoadContext, Resource};

/// Sub-meshes a mesh can hold.
pub const MAX_SUB_MESHES: usize = 32;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum IndexType {
    U8 = 0,
    U16 = 1,
    U32 = 2,
}

impl IndexType {
    pub fn size(self) -> usize {
        match self {
            IndexType::U8 => 1,
            IndexType::U16 => 2,
            IndexType::U32 => 4,
        }
    }

    fn from_raw(raw: u32) -> Result<Self, LoadError> {
        match raw {
            0 => Ok(IndexType::U8),
            1 => Ok(IndexType::U16),
            2 => Ok(IndexType::U32),
            _ => Err(LoadError::Malformed(format!("unknown index type {raw}"))),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum VertexSemantic {
    Position = 0,
    Normal = 1,
    Tangent = 2,
    Binormal = 3,
    Color = 4,
    TexCoord0 = 5,
    TexCoord1 = 6,
}

impl VertexSemantic {
    pub const COUNT: usize = 7;

    fn from_raw(raw: u32) -> Result<Self, LoadError> {
        Ok(match raw {
            0 => VertexSemantic::Position,
            1 => VertexSemantic::Normal,
            2 => VertexSemantic::Tangent,
            3 => VertexSemantic::Binormal,
            4 => VertexSemantic::Color,
            5 => VertexSemantic::TexCoord0,
            6 => VertexSemantic::TexCoord1,
            _ => return Err(LoadError::Malformed(format!("unknown vertex semantic {raw}"))),
        })
    }
}

/// Component storage of a vertex input.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AttributeType {
    UByte = 0,
    Short = 1,
    Half = 2,
    Float = 3,
    /// 2_10_10_10 packed normal, counted as four one-byte components.
    PackedNormal = 4,
}

impl AttributeType {
    pub fn component_size(self) -> u32 {
        match self {
            AttributeType::UByte | AttributeType::PackedNormal => 1,
            AttributeType::Short | AttributeType::Half => 2,
            AttributeType::Float => 4,
        }
    }

    pub fn normalized(self) -> bool {
        matches!(self, AttributeType::UByte | AttributeType::PackedNormal)
    }

    fn from_raw(raw: u32) -> Result<Self, LoadError> {
        Ok(match raw {
            0 => AttributeType::UByte,
            1 => AttributeType::Short,
            2 => AttributeType::Half,
            3 => AttributeType::Float,
            4 => AttributeType::PackedNormal,
            _ => return Err(LoadError::Malformed(format!("unknown attribute type {raw}"))),
        })
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct VertexAttribute {
    pub semantic: VertexSemantic,
    pub ty: AttributeType,
    pub components: u32,
    pub offset: u32,
}

impl VertexAttribute {
    pub fn normalized(&self) -> bool {
        self.ty.normalized()
    }

    /// Bytes per vertex.
    pub fn byte_size(&self) -> u32 {
        self.components * self.ty.component_size()
    }
}

#[derive(Debug, Clone)]
pub struct SubMesh {
    pub index_count: u32,
    pub indices: Bytes,
    pub material: Handle<Material>,
}

#[derive(Debug, Clone)]
pub struct Mesh {
    pub index_type: IndexType,
    pub attributes: Vec<VertexAttribute>,
    pub vertex_data: Bytes,
    pub sub_meshes: Vec<SubMesh>,
}

impl Mesh {
    /// Bytes per vertex across all inputs.
    pub fn stride(&self) -> u32 {
        self.attributes.iter().map(VertexAttribute::byte_size).sum()
    }

    pub fn vertex_count(&self) -> usize {
        match self.stride() {
            0 => 0,
            stride => self.vertex_data.len() / stride as usize,
        }
    }

    pub fn attribute(&self, semantic: VertexSemantic) -> Option<&VertexAttribute> {
        self.attributes.iter().find(|a| a.semantic == semantic)
    }
}

impl Resource for Mesh {
    const KIND: &'static str = "mesh";

    fn load(data: &[u8], ctx: &LoadContext<'_>) -> Result<Self, LoadError> {
        let payload = Bytes::copy_from_slice(data);
        let mut r = PayloadReader::new(&payload);

        let index_type = IndexType::from_raw(r.read_u32()?)?;
        let sub_mesh_count = r.read_len()?;
        let input_count = r.read_len()?;
        let vertex_data_size = r.read_len()?;
        if sub_mesh_count > MAX_SUB_MESHES {
            return Err(LoadError::Malformed(format!(
                "mesh has {sub_mesh_count} sub-meshes, at most {MAX_SUB_MESHES} are supported"
            )));
        }
        if input_count > VertexSemantic::COUNT {
            return Err(LoadError::Malformed(format!(
                "mesh declares {input_count} vertex inputs"
            )));
        }

        let mut attributes = Vec::with_capacity(input_count);
        for _ in 0..input_count {
            let semantic = VertexSemantic::from_raw(r.read_u32()?)?;
            let ty = AttributeType::from_raw(r.read_u32()?)?;
            let size = r.read_u32()?;
            let offset = r.read_u32()?;
            if size % ty.component_size() != 0 {
                return Err(LoadError::Malformed(format!(
                    "{semantic:?} input size {size} is not a multiple of {ty:?}"
                )));
            }
            attributes.push(VertexAttribute {
                semantic,
                ty,
                components: size / ty.component_size(),
                offset,
            });
        }

        let vertex_data = payload.slice_ref(r.read_bytes(vertex_data_size)?);

        let mut sub_meshes = Vec::with_capacity(sub_mesh_count);
        for _ in 0..sub_mesh_count {
            let index_count = r.read_u32()?;
            let len = (index_count as usize)
                .checked_mul(index_type.size())
                .ok_or_else(|| LoadError::Malformed(format!("{index_count} indices overflow")))?;
            let indices = payload.slice_ref(r.read_bytes(len)?);
            let material_name = r.read_name()?;
            sub_meshes.push(SubMesh {
                index_count,
                indices,
                material: ctx.create::<Material>(&material_name)?,
            });
        }

        Ok(Self {
            index_type,
            attributes,
            vertex_data,
            sub_meshes,
        })
    }
}

/// Source description of one sub-mesh.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SubMeshDesc {
    pub indices: Bytes,
    pub material: String,
}

/// Source description of a mesh, for [`MeshDesc::encode`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MeshDesc {
    pub index_type: IndexType,
    pub attributes: Vec<VertexAttribute>,
    pub vertex_data: Bytes,
    pub sub_meshes: Vec<SubMeshDesc>,
}

impl MeshDesc {
    /// Serializes into the `.bmh` layout.
    pub fn encode(&self) -> anyhow::Result<Bytes> {
        anyhow::ensure!(
            self.sub_meshes.len() <= MAX_SUB_MESHES,
            "mesh has {} sub-meshes, at most {MAX_SUB_MESHES} are supported",
            self.sub_meshes.len()
        );
        anyhow::ensure!(
            self.attributes.len() <= VertexSemantic::COUNT,
            "mesh declares {} vertex inputs",
            self.attributes.len()
        );

        let mut w = PayloadWriter::new();
        w.put_u32(self.index_type as u32);
        w.put_len(self.sub_meshes.len())?;
        w.put_len(self.attributes.len())?;
        w.put_len(self.vertex_data.len())?;
        for attribute in &self.attributes {
            w.put_u32(attribute.semantic as u32);
            w.put_u32(attribute.ty as u32);
            w.put_u32(attribute.byte_size());
            w.put_u32(attribute.offset);
        }
        w.put_bytes(&self.vertex_data);
        for sub_mesh in &self.sub_meshes {
            let size = self.index_type.size();
            anyhow::ensure!(
                sub_mesh.indices.len() % size == 0,
                "index buffer of {} bytes does not hold whole {:?} indices",
                sub_mesh.indices.len(),
                self.index_type
            );
            w.put_len(sub_mesh.indices.len() / size)?;
            w.put_bytes(&sub_mesh.indices);
            w.put_name(&sub_mesh.material)?;
        }
        Ok(w.finish())
    }
}
