//! WGSL value types used by the generator and buffer layouts.

use std::fmt;

/// Unit type of a scalar, vector or matrix.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum ShaderFieldBaseType {
    Bool,
    UInt8,
    Int8,
    UInt16,
    Int16,
    UInt32,
    Int32,
    Float16,
    Float32,
}

impl ShaderFieldBaseType {
    #[inline]
    #[must_use]
    pub fn is_float(self) -> bool {
        matches!(self, Self::Float16 | Self::Float32)
    }

    #[inline]
    #[must_use]
    pub fn is_integer(self) -> bool {
        !self.is_float()
    }

    /// Size of one component as stored by WGSL.
    ///
    /// WGSL has no 8/16-bit integers, those widen to 32 bits in shader memory.
    #[must_use]
    pub fn byte_size(self) -> usize {
        match self {
            Self::Float16 => 2,
            _ => 4,
        }
    }

    #[must_use]
    pub fn wgsl_name(self) -> &'static str {
        match self {
            Self::Bool => "bool",
            Self::UInt8 | Self::UInt16 | Self::UInt32 => "u32",
            Self::Int8 | Self::Int16 | Self::Int32 => "i32",
            Self::Float16 => "f16",
            Self::Float32 => "f32",
        }
    }
}

/// A WGSL numerical type: scalar, vector or matrix.
///
/// `num_components` is the vector width (rows for a matrix) and
/// `matrix_dimension` the column count, 1 for scalars and vectors.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct NumType {
    pub base_type: ShaderFieldBaseType,
    pub num_components: u8,
    pub matrix_dimension: u8,
    pub atomic: bool,
}

impl NumType {
    pub const FLOAT: Self = Self::new(ShaderFieldBaseType::Float32, 1);
    pub const FLOAT2: Self = Self::new(ShaderFieldBaseType::Float32, 2);
    pub const FLOAT3: Self = Self::new(ShaderFieldBaseType::Float32, 3);
    pub const FLOAT4: Self = Self::new(ShaderFieldBaseType::Float32, 4);
    pub const FLOAT2X2: Self = Self::matrix(ShaderFieldBaseType::Float32, 2, 2);
    pub const FLOAT3X3: Self = Self::matrix(ShaderFieldBaseType::Float32, 3, 3);
    pub const FLOAT4X4: Self = Self::matrix(ShaderFieldBaseType::Float32, 4, 4);
    pub const UINT32: Self = Self::new(ShaderFieldBaseType::UInt32, 1);
    pub const INT32: Self = Self::new(ShaderFieldBaseType::Int32, 1);
    pub const INT2: Self = Self::new(ShaderFieldBaseType::Int32, 2);
    pub const INT3: Self = Self::new(ShaderFieldBaseType::Int32, 3);
    pub const INT4: Self = Self::new(ShaderFieldBaseType::Int32, 4);
    pub const BOOL: Self = Self::new(ShaderFieldBaseType::Bool, 1);

    #[must_use]
    pub const fn new(base_type: ShaderFieldBaseType, num_components: u8) -> Self {
        Self {
            base_type,
            num_components,
            matrix_dimension: 1,
            atomic: false,
        }
    }

    #[must_use]
    pub const fn matrix(base_type: ShaderFieldBaseType, columns: u8, rows: u8) -> Self {
        Self {
            base_type,
            num_components: rows,
            matrix_dimension: columns,
            atomic: false,
        }
    }

    #[must_use]
    pub const fn as_atomic(mut self) -> Self {
        self.atomic = true;
        self
    }

    #[inline]
    #[must_use]
    pub fn is_matrix(&self) -> bool {
        self.matrix_dimension > 1
    }

    fn vector_size(&self) -> usize {
        self.base_type.byte_size() * self.num_components as usize
    }

    fn vector_alignment(&self) -> usize {
        let scalar = self.base_type.byte_size();
        match self.num_components {
            1 => scalar,
            2 => scalar * 2,
            _ => scalar * 4,
        }
    }

    /// Size in bytes following the WGSL memory layout rules.
    #[must_use]
    pub fn byte_size(&self) -> usize {
        if self.is_matrix() {
            let column_stride = align_to(self.vector_size(), self.vector_alignment());
            column_stride * self.matrix_dimension as usize
        } else {
            self.vector_size()
        }
    }

    /// Alignment in bytes following the WGSL memory layout rules.
    #[must_use]
    pub fn wgsl_alignment(&self) -> usize {
        self.vector_alignment()
    }

    #[must_use]
    pub fn wgsl_name(&self) -> String {
        let scalar = self.base_type.wgsl_name();
        let name = if self.is_matrix() {
            format!(
                "mat{}x{}<{scalar}>",
                self.matrix_dimension, self.num_components
            )
        } else if self.num_components > 1 {
            format!("vec{}<{scalar}>", self.num_components)
        } else {
            scalar.to_string()
        };

        if self.atomic {
            format!("atomic<{name}>")
        } else {
            name
        }
    }
}

impl Default for NumType {
    fn default() -> Self {
        Self::FLOAT
    }
}

impl fmt::Display for NumType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.wgsl_name())
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub enum TextureDimension {
    D1,
    #[default]
    D2,
    Cube,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub enum TextureSampleType {
    #[default]
    Float,
    UInt,
    Int,
}

/// Type of a texture binding.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub struct TextureType {
    pub dimension: TextureDimension,
    pub format: TextureSampleType,
}

impl TextureType {
    #[must_use]
    pub const fn new(dimension: TextureDimension, format: TextureSampleType) -> Self {
        Self { dimension, format }
    }

    #[must_use]
    pub fn wgsl_name(&self) -> String {
        let dim = match self.dimension {
            TextureDimension::D1 => "1d",
            TextureDimension::D2 => "2d",
            TextureDimension::Cube => "cube",
        };
        let sample = match self.format {
            TextureSampleType::Float => "f32",
            TextureSampleType::UInt => "u32",
            TextureSampleType::Int => "i32",
        };
        format!("texture_{dim}<{sample}>")
    }

    #[must_use]
    pub fn view_dimension(&self) -> wgpu::TextureViewDimension {
        match self.dimension {
            TextureDimension::D1 => wgpu::TextureViewDimension::D1,
            TextureDimension::D2 => wgpu::TextureViewDimension::D2,
            TextureDimension::Cube => wgpu::TextureViewDimension::Cube,
        }
    }

    #[must_use]
    pub fn sample_type(&self) -> wgpu::TextureSampleType {
        match self.format {
            TextureSampleType::Float => wgpu::TextureSampleType::Float { filterable: true },
            TextureSampleType::UInt => wgpu::TextureSampleType::Uint,
            TextureSampleType::Int => wgpu::TextureSampleType::Sint,
        }
    }

    #[must_use]
    pub fn sampler_binding_type(&self) -> wgpu::SamplerBindingType {
        if self.format == TextureSampleType::Float {
            wgpu::SamplerBindingType::Filtering
        } else {
            wgpu::SamplerBindingType::NonFiltering
        }
    }
}

/// Type of a buffer struct field.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum FieldType {
    Num(NumType),
    /// Fixed-length array of numbers
    Array { element: NumType, length: usize },
}

impl FieldType {
    #[must_use]
    pub fn wgsl_name(&self) -> String {
        match self {
            Self::Num(num) => num.wgsl_name(),
            Self::Array { element, length } => format!("array<{}, {length}>", element.wgsl_name()),
        }
    }

    #[must_use]
    pub fn as_num(&self) -> Option<&NumType> {
        match self {
            Self::Num(num) => Some(num),
            Self::Array { .. } => None,
        }
    }
}

impl From<NumType> for FieldType {
    fn from(value: NumType) -> Self {
        Self::Num(value)
    }
}

impl fmt::Display for FieldType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.wgsl_name())
    }
}

/// A name + numerical type pair (struct members, stage inputs and outputs).
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct NamedNumType {
    pub name: String,
    pub ty: NumType,
}

impl NamedNumType {
    pub fn new(name: impl Into<String>, ty: NumType) -> Self {
        Self {
            name: name.into(),
            ty,
        }
    }
}

#[inline]
#[must_use]
pub fn align_to(value: usize, alignment: usize) -> usize {
    if alignment == 0 {
        return value;
    }
    value.div_ceil(alignment) * alignment
}

/// Replaces characters WGSL does not accept in identifiers.
#[must_use]
pub fn sanitize_identifier(name: &str) -> String {
    name.chars()
        .map(|c| if c.is_ascii_alphanumeric() || c == '_' { c } else { '_' })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_wgsl_names() {
        assert_eq!(NumType::FLOAT.wgsl_name(), "f32");
        assert_eq!(NumType::FLOAT3.wgsl_name(), "vec3<f32>");
        assert_eq!(NumType::FLOAT4X4.wgsl_name(), "mat4x4<f32>");
        assert_eq!(NumType::UINT32.as_atomic().wgsl_name(), "atomic<u32>");
        assert_eq!(
            NumType::new(ShaderFieldBaseType::UInt8, 4).wgsl_name(),
            "vec4<u32>"
        );
    }

    #[test]
    fn test_wgsl_layout_rules() {
        assert_eq!(NumType::FLOAT3.byte_size(), 12);
        assert_eq!(NumType::FLOAT3.wgsl_alignment(), 16);
        assert_eq!(NumType::FLOAT2.wgsl_alignment(), 8);
        assert_eq!(NumType::FLOAT4X4.byte_size(), 64);
        assert_eq!(NumType::FLOAT3X3.byte_size(), 48);
    }

    #[test]
    fn test_texture_names() {
        assert_eq!(TextureType::default().wgsl_name(), "texture_2d<f32>");
        let cube = TextureType::new(TextureDimension::Cube, TextureSampleType::UInt);
        assert_eq!(cube.wgsl_name(), "texture_cube<u32>");
    }

    #[test]
    fn test_sanitize() {
        assert_eq!(sanitize_identifier("base.color-0"), "base_color_0");
    }
}
