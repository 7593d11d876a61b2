//! Vertex Layout Generator
//!
//! Turns a [`MeshFormat`] into the single interleaved vertex buffer layout the
//! generated `Input` struct reads from. Attribute `i` lands at shader
//! location `i`, matching the order the shader generator assigns.

use wgpu::VertexFormat;

use crate::errors::{GfxError, Result};
use crate::renderer::backend::VertexBufferLayoutDesc;
use crate::resources::{MeshFormat, MeshVertexAttribute, StorageType};

/// Maps one attribute to a wgpu vertex format.
///
/// 8 and 16 bit formats only exist with 1, 2 or 4 components.
#[allow(clippy::match_same_arms)]
pub fn vertex_format(attribute: &MeshVertexAttribute) -> Result<VertexFormat> {
    use StorageType as S;
    use VertexFormat as F;

    let format = match (attribute.storage_type, attribute.num_components) {
        (S::Float32, 1) => Some(F::Float32),
        (S::Float32, 2) => Some(F::Float32x2),
        (S::Float32, 3) => Some(F::Float32x3),
        (S::Float32, 4) => Some(F::Float32x4),
        (S::Float16, 1) => Some(F::Float16),
        (S::Float16, 2) => Some(F::Float16x2),
        (S::Float16, 4) => Some(F::Float16x4),
        (S::UInt32, 1) => Some(F::Uint32),
        (S::UInt32, 2) => Some(F::Uint32x2),
        (S::UInt32, 3) => Some(F::Uint32x3),
        (S::UInt32, 4) => Some(F::Uint32x4),
        (S::Int32, 1) => Some(F::Sint32),
        (S::Int32, 2) => Some(F::Sint32x2),
        (S::Int32, 3) => Some(F::Sint32x3),
        (S::Int32, 4) => Some(F::Sint32x4),
        (S::UInt16, 1) => Some(F::Uint16),
        (S::UInt16, 2) => Some(F::Uint16x2),
        (S::UInt16, 4) => Some(F::Uint16x4),
        (S::Int16, 1) => Some(F::Sint16),
        (S::Int16, 2) => Some(F::Sint16x2),
        (S::Int16, 4) => Some(F::Sint16x4),
        (S::UNorm16, 1) => Some(F::Unorm16),
        (S::UNorm16, 2) => Some(F::Unorm16x2),
        (S::UNorm16, 4) => Some(F::Unorm16x4),
        (S::SNorm16, 1) => Some(F::Snorm16),
        (S::SNorm16, 2) => Some(F::Snorm16x2),
        (S::SNorm16, 4) => Some(F::Snorm16x4),
        (S::UInt8, 1) => Some(F::Uint8),
        (S::UInt8, 2) => Some(F::Uint8x2),
        (S::UInt8, 4) => Some(F::Uint8x4),
        (S::Int8, 1) => Some(F::Sint8),
        (S::Int8, 2) => Some(F::Sint8x2),
        (S::Int8, 4) => Some(F::Sint8x4),
        (S::UNorm8, 1) => Some(F::Unorm8),
        (S::UNorm8, 2) => Some(F::Unorm8x2),
        (S::UNorm8, 4) => Some(F::Unorm8x4),
        (S::SNorm8, 1) => Some(F::Snorm8),
        (S::SNorm8, 2) => Some(F::Snorm8x2),
        (S::SNorm8, 4) => Some(F::Snorm8x4),
        _ => None,
    };

    format.ok_or_else(|| GfxError::UnsupportedVertexFormat {
        name: attribute.name.clone(),
        storage: attribute.storage_type,
        components: attribute.num_components,
    })
}

/// Builds the vertex buffer layout of `format`.
pub fn vertex_buffer_layout(format: &MeshFormat) -> Result<VertexBufferLayoutDesc> {
    let mut offset = 0u64;
    let mut attributes = Vec::with_capacity(format.vertex_attributes.len());
    for (location, attribute) in format.vertex_attributes.iter().enumerate() {
        attributes.push(wgpu::VertexAttribute {
            format: vertex_format(attribute)?,
            offset,
            shader_location: location as u32,
        });
        offset += attribute.byte_size() as u64;
    }

    Ok(VertexBufferLayoutDesc {
        array_stride: offset,
        step_mode: wgpu::VertexStepMode::Vertex,
        attributes,
    })
}
