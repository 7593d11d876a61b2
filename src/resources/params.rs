//! Shader parameter values and per-object parameter storage.

use std::collections::BTreeMap;
use std::sync::Arc;

use glam::{Mat4, Vec2, Vec3, Vec4};

use super::texture::Texture;
use crate::shader::{NumType, StructLayout};

/// A value assignable to a shader parameter.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum ParamValue {
    Float(f32),
    Float2(Vec2),
    Float3(Vec3),
    Float4(Vec4),
    Float4x4(Mat4),
    Int(i32),
    UInt(u32),
}

impl ParamValue {
    /// Shader type a parameter holding this value is declared with.
    #[must_use]
    pub fn num_type(&self) -> NumType {
        match self {
            Self::Float(_) => NumType::FLOAT,
            Self::Float2(_) => NumType::FLOAT2,
            Self::Float3(_) => NumType::FLOAT3,
            Self::Float4(_) => NumType::FLOAT4,
            Self::Float4x4(_) => NumType::FLOAT4X4,
            Self::Int(_) => NumType::INT32,
            Self::UInt(_) => NumType::UINT32,
        }
    }

    #[must_use]
    pub fn as_bytes(&self) -> &[u8] {
        match self {
            Self::Float(v) => bytemuck::bytes_of(v),
            Self::Float2(v) => bytemuck::bytes_of(v),
            Self::Float3(v) => bytemuck::bytes_of(v),
            Self::Float4(v) => bytemuck::bytes_of(v),
            Self::Float4x4(v) => bytemuck::bytes_of(v),
            Self::Int(v) => bytemuck::bytes_of(v),
            Self::UInt(v) => bytemuck::bytes_of(v),
        }
    }
}

impl From<f32> for ParamValue {
    fn from(value: f32) -> Self {
        Self::Float(value)
    }
}

impl From<Vec2> for ParamValue {
    fn from(value: Vec2) -> Self {
        Self::Float2(value)
    }
}

impl From<Vec3> for ParamValue {
    fn from(value: Vec3) -> Self {
        Self::Float3(value)
    }
}

impl From<Vec4> for ParamValue {
    fn from(value: Vec4) -> Self {
        Self::Float4(value)
    }
}

impl From<Mat4> for ParamValue {
    fn from(value: Mat4) -> Self {
        Self::Float4x4(value)
    }
}

impl From<i32> for ParamValue {
    fn from(value: i32) -> Self {
        Self::Int(value)
    }
}

impl From<u32> for ParamValue {
    fn from(value: u32) -> Self {
        Self::UInt(value)
    }
}

/// A texture bound to a named slot.
#[derive(Debug, Clone, Default)]
pub struct TextureParameter {
    pub texture: Option<Arc<Texture>>,
    /// Index `N` of the `texCoordN` input sampled by default
    pub default_texcoord_binding: u8,
}

impl TextureParameter {
    #[must_use]
    pub fn new(texture: Arc<Texture>) -> Self {
        Self {
            texture: Some(texture),
            default_texcoord_binding: 0,
        }
    }

    #[must_use]
    pub fn with_texcoord(mut self, index: u8) -> Self {
        self.default_texcoord_binding = index;
        self
    }
}

/// Named parameter values and textures.
///
/// Ordered maps keep hashing and packing deterministic.
#[derive(Debug, Clone, Default)]
pub struct ParameterStorage {
    pub basic: BTreeMap<String, ParamValue>,
    pub textures: BTreeMap<String, TextureParameter>,
}

impl ParameterStorage {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    pub fn set_param(&mut self, name: &str, value: impl Into<ParamValue>) {
        self.basic.insert(name.to_string(), value.into());
    }

    pub fn set_texture(&mut self, name: &str, parameter: TextureParameter) {
        self.textures.insert(name.to_string(), parameter);
    }

    #[must_use]
    pub fn get_param(&self, name: &str) -> Option<&ParamValue> {
        self.basic.get(name)
    }

    /// Copies values over `other`'s, later writes win.
    pub fn merge_from(&mut self, other: &ParameterStorage) {
        self.basic
            .extend(other.basic.iter().map(|(k, v)| (k.clone(), *v)));
        self.textures
            .extend(other.textures.iter().map(|(k, v)| (k.clone(), v.clone())));
    }

    /// Writes every value that has a matching field in `layout` into `out`.
    ///
    /// Values whose type differs from the field are skipped. Returns the
    /// number of fields written.
    pub fn pack_into(&self, layout: &StructLayout, out: &mut [u8]) -> usize {
        let mut written = 0;
        for (name, value) in &self.basic {
            let Some(item) = layout.find(name) else {
                continue;
            };
            if item.ty.as_num() != Some(&value.num_type()) {
                log::warn!(
                    "Parameter '{name}' has type {} but the field is {}",
                    value.num_type(),
                    item.ty
                );
                continue;
            }
            let bytes = value.as_bytes();
            let len = bytes.len().min(item.size);
            if let Some(dst) = out.get_mut(item.offset..item.offset + len) {
                dst.copy_from_slice(&bytes[..len]);
                written += 1;
            }
        }
        written
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::shader::{AddressSpace, StructLayoutBuilder};

    #[test]
    fn test_pack_into_layout() {
        let mut builder = StructLayoutBuilder::new(AddressSpace::Uniform);
        builder.push("alpha", NumType::FLOAT).unwrap();
        builder.push("color", NumType::FLOAT4).unwrap();
        let layout = builder.finalize();

        let mut params = ParameterStorage::new();
        params.set_param("color", Vec4::new(1.0, 0.5, 0.25, 1.0));
        params.set_param("alpha", 0.5f32);
        params.set_param("unused", 3u32);

        let mut out = vec![0u8; layout.size];
        assert_eq!(params.pack_into(&layout, &mut out), 2);

        let color_offset = layout.find("color").unwrap().offset;
        let read_f32 = |offset: usize| {
            f32::from_le_bytes(out[offset..offset + 4].try_into().unwrap())
        };
        assert_eq!(read_f32(color_offset), 1.0);
        assert_eq!(read_f32(color_offset + 8), 0.25);
        assert_eq!(read_f32(0), 0.5);
    }

    #[test]
    fn test_type_mismatch_is_skipped() {
        let mut builder = StructLayoutBuilder::new(AddressSpace::Uniform);
        builder.push("roughness", NumType::FLOAT).unwrap();
        let layout = builder.finalize();

        let mut params = ParameterStorage::new();
        params.set_param("roughness", 1u32);
        let mut out = vec![0u8; layout.size];
        assert_eq!(params.pack_into(&layout, &mut out), 0);
    }

    #[test]
    fn test_merge_later_wins() {
        let mut base = ParameterStorage::new();
        base.set_param("a", 1.0f32);
        let mut top = ParameterStorage::new();
        top.set_param("a", 2.0f32);
        base.merge_from(&top);
        assert_eq!(base.get_param("a"), Some(&ParamValue::Float(2.0)));
    }
}
