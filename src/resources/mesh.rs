//! Mesh data and vertex formats.

use bytemuck::Pod;
use parking_lot::{RwLock, RwLockReadGuard};

use crate::core::{ChangeTracker, IdTag, MutGuard, UniqueId};
use crate::shader::ShaderFieldBaseType;

/// Storage type of a single vertex attribute component.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub enum StorageType {
    UInt8,
    Int8,
    UNorm8,
    SNorm8,
    UInt16,
    Int16,
    UNorm16,
    SNorm16,
    UInt32,
    Int32,
    Float16,
    #[default]
    Float32,
}

impl StorageType {
    #[must_use]
    pub fn byte_size(self) -> usize {
        match self {
            Self::UInt8 | Self::Int8 | Self::UNorm8 | Self::SNorm8 => 1,
            Self::UInt16 | Self::Int16 | Self::UNorm16 | Self::SNorm16 | Self::Float16 => 2,
            Self::UInt32 | Self::Int32 | Self::Float32 => 4,
        }
    }

    /// Type the attribute has once fetched into a shader.
    #[must_use]
    pub fn shader_base_type(self) -> ShaderFieldBaseType {
        match self {
            Self::UInt8 | Self::UInt16 | Self::UInt32 => ShaderFieldBaseType::UInt32,
            Self::Int8 | Self::Int16 | Self::Int32 => ShaderFieldBaseType::Int32,
            Self::UNorm8
            | Self::SNorm8
            | Self::UNorm16
            | Self::SNorm16
            | Self::Float16
            | Self::Float32 => ShaderFieldBaseType::Float32,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct MeshVertexAttribute {
    pub name: String,
    pub num_components: u8,
    pub storage_type: StorageType,
}

impl MeshVertexAttribute {
    pub fn new(name: impl Into<String>, num_components: u8, storage_type: StorageType) -> Self {
        Self {
            name: name.into(),
            num_components,
            storage_type,
        }
    }

    #[must_use]
    pub fn byte_size(&self) -> usize {
        self.storage_type.byte_size() * self.num_components as usize
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub enum PrimitiveType {
    #[default]
    TriangleList,
    TriangleStrip,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub enum WindingOrder {
    CW,
    #[default]
    CCW,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub enum IndexFormat {
    #[default]
    UInt16,
    UInt32,
}

impl IndexFormat {
    #[must_use]
    pub fn byte_size(self) -> usize {
        match self {
            Self::UInt16 => 2,
            Self::UInt32 => 4,
        }
    }

    #[must_use]
    pub fn to_wgpu(self) -> wgpu::IndexFormat {
        match self {
            Self::UInt16 => wgpu::IndexFormat::Uint16,
            Self::UInt32 => wgpu::IndexFormat::Uint32,
        }
    }
}

/// Layout of a mesh's vertex and index data.
///
/// Hashed by value when computing pipeline keys.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Default)]
pub struct MeshFormat {
    pub primitive_type: PrimitiveType,
    pub winding_order: WindingOrder,
    pub index_format: IndexFormat,
    pub vertex_attributes: Vec<MeshVertexAttribute>,
}

impl MeshFormat {
    /// Size of one interleaved vertex in bytes.
    #[must_use]
    pub fn vertex_size(&self) -> usize {
        self.vertex_attributes
            .iter()
            .map(MeshVertexAttribute::byte_size)
            .sum()
    }
}

#[derive(Debug, Clone, Default)]
pub struct MeshData {
    pub format: MeshFormat,
    pub vertex_data: Vec<u8>,
    pub index_data: Vec<u8>,
}

impl MeshData {
    #[must_use]
    pub fn num_vertices(&self) -> usize {
        match self.format.vertex_size() {
            0 => 0,
            size => self.vertex_data.len() / size,
        }
    }

    #[must_use]
    pub fn num_indices(&self) -> usize {
        self.index_data.len() / self.format.index_format.byte_size()
    }
}

/// CPU-side mesh. The GPU copy is created and synced through the versioned resource cache.
#[derive(Debug)]
pub struct Mesh {
    id: UniqueId,
    pub label: String,
    data: RwLock<MeshData>,
    tracker: ChangeTracker,
}

impl Mesh {
    #[must_use]
    pub fn new() -> Self {
        Self {
            id: UniqueId::next(IdTag::Mesh),
            label: "Mesh".to_string(),
            data: RwLock::new(MeshData::default()),
            tracker: ChangeTracker::new(),
        }
    }

    pub fn with_data<V: Pod, I: Pod>(format: MeshFormat, vertices: &[V], indices: &[I]) -> Self {
        let mesh = Self::new();
        *mesh.data.write() = MeshData {
            format,
            vertex_data: bytemuck::cast_slice(vertices).to_vec(),
            index_data: bytemuck::cast_slice(indices).to_vec(),
        };
        mesh
    }

    #[must_use]
    pub fn with_label(mut self, label: impl Into<String>) -> Self {
        self.label = label.into();
        self
    }

    #[inline]
    #[must_use]
    pub fn id(&self) -> UniqueId {
        self.id
    }

    #[inline]
    #[must_use]
    pub fn version(&self) -> u64 {
        self.tracker.version()
    }

    #[must_use]
    pub fn format(&self) -> MeshFormat {
        self.data.read().format.clone()
    }

    pub fn read(&self) -> RwLockReadGuard<'_, MeshData> {
        self.data.read()
    }

    /// Replaces format and data in one content change.
    pub fn update<V: Pod, I: Pod>(&self, format: MeshFormat, vertices: &[V], indices: &[I]) {
        {
            let mut data = self.data.write();
            data.format = format;
            data.vertex_data = bytemuck::cast_slice(vertices).to_vec();
            data.index_data = bytemuck::cast_slice(indices).to_vec();
        }
        self.tracker.changed();
    }

    pub fn update_vertices<V: Pod>(&self, vertices: &[V]) {
        self.data.write().vertex_data = bytemuck::cast_slice(vertices).to_vec();
        self.tracker.changed();
    }

    /// Exclusive access; the version is bumped once when the guard drops.
    pub fn data_mut(&mut self) -> MutGuard<'_, MeshData> {
        MutGuard::new(self.data.get_mut(), &self.tracker)
    }
}

impl Default for Mesh {
    fn default() -> Self {
        Self::new()
    }
}

/// Cloning copies the content under a fresh id.
impl Clone for Mesh {
    fn clone(&self) -> Self {
        Self {
            id: UniqueId::next(IdTag::Mesh),
            label: self.label.clone(),
            data: RwLock::new(self.data.read().clone()),
            tracker: self.tracker.clone(),
        }
    }
}
