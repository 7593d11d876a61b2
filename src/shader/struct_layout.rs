//! Buffer struct types and their WGSL memory layouts.

use rustc_hash::FxHashMap;

use super::types::{FieldType, NumType, align_to};
use crate::errors::{GfxError, Result};

/// Memory class of a buffer binding.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub enum AddressSpace {
    #[default]
    Uniform,
    Storage,
    StorageRW,
}

impl AddressSpace {
    #[must_use]
    pub fn wgsl_qualifier(self) -> &'static str {
        match self {
            Self::Uniform => "uniform",
            Self::Storage => "storage",
            Self::StorageRW => "storage, read_write",
        }
    }

    #[must_use]
    pub fn binding_type(self) -> wgpu::BufferBindingType {
        match self {
            Self::Uniform => wgpu::BufferBindingType::Uniform,
            Self::Storage => wgpu::BufferBindingType::Storage { read_only: true },
            Self::StorageRW => wgpu::BufferBindingType::Storage { read_only: false },
        }
    }
}

/// How many instances of the struct a buffer binding holds.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub enum Dimension {
    /// One single struct
    #[default]
    One,
    /// A runtime-sized array indexed by the draw instance index
    PerInstance,
    /// A runtime-sized array indexed explicitly
    Dynamic,
    /// A fixed-size array indexed explicitly
    Fixed(usize),
}

impl Dimension {
    #[inline]
    #[must_use]
    pub fn is_array(self) -> bool {
        !matches!(self, Self::One)
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct StructField {
    pub name: String,
    pub ty: FieldType,
}

/// Declared field list of a buffer struct, in declaration order.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Default)]
pub struct StructType {
    pub fields: Vec<StructField>,
}

impl StructType {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Adds a field; re-adding an identical declaration is a no-op.
    pub fn add_field(&mut self, name: &str, ty: impl Into<FieldType>) -> Result<()> {
        let ty = ty.into();
        if let Some(existing) = self.fields.iter().find(|f| f.name == name) {
            if existing.ty == ty {
                return Ok(());
            }
            return Err(GfxError::DuplicateField(name.to_string()));
        }
        self.fields.push(StructField {
            name: name.to_string(),
            ty,
        });
        Ok(())
    }

    #[must_use]
    pub fn find_field(&self, name: &str) -> Option<&StructField> {
        self.fields.iter().find(|f| f.name == name)
    }

    #[inline]
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.fields.is_empty()
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StructLayoutItem {
    pub offset: usize,
    pub size: usize,
    pub ty: FieldType,
}

impl StructLayoutItem {
    fn is_equal_ignore_offset(&self, other: &StructLayoutItem) -> bool {
        self.size == other.size && self.ty == other.ty
    }
}

/// Computed byte layout of a struct.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct StructLayout {
    pub items: Vec<StructLayoutItem>,
    pub field_names: Vec<String>,
    pub size: usize,
    pub max_alignment: usize,
}

impl StructLayout {
    /// Size of this struct inside an array.
    #[must_use]
    pub fn array_stride(&self) -> usize {
        align_to(self.size, self.max_alignment)
    }

    #[must_use]
    pub fn find(&self, name: &str) -> Option<&StructLayoutItem> {
        self.field_names
            .iter()
            .position(|n| n == name)
            .map(|index| &self.items[index])
    }
}

/// Name of the padding member appended by [`StructLayoutBuilder::force_alignment_to`].
pub const PADDING_FIELD_NAME: &str = "_array_padding_";

/// Incremental WGSL struct layout builder.
#[derive(Debug, Clone)]
pub struct StructLayoutBuilder {
    mapping: FxHashMap<String, usize>,
    layout: StructLayout,
    offset: usize,
    address_space: AddressSpace,
}

impl StructLayoutBuilder {
    #[must_use]
    pub fn new(address_space: AddressSpace) -> Self {
        Self {
            mapping: FxHashMap::default(),
            layout: StructLayout::default(),
            offset: 0,
            address_space,
        }
    }

    #[must_use]
    pub fn address_space(&self) -> AddressSpace {
        self.address_space
    }

    fn field_alignment(&self, ty: &FieldType) -> usize {
        match ty {
            FieldType::Num(num) => num.wgsl_alignment(),
            FieldType::Array { element, .. } => {
                let align = element.wgsl_alignment();
                if self.address_space == AddressSpace::Uniform {
                    align_to(align, 16)
                } else {
                    align
                }
            }
        }
    }

    fn field_size(&self, ty: &FieldType) -> usize {
        match ty {
            FieldType::Num(num) => num.byte_size(),
            FieldType::Array { element, length } => {
                let stride = align_to(element.byte_size(), self.field_alignment(ty));
                stride * length
            }
        }
    }

    #[must_use]
    pub fn generate_next(&self, ty: FieldType) -> StructLayoutItem {
        let alignment = self.field_alignment(&ty);
        StructLayoutItem {
            offset: align_to(self.offset, alignment),
            size: self.field_size(&ty),
            ty,
        }
    }

    pub fn push(&mut self, name: &str, ty: impl Into<FieldType>) -> Result<&StructLayoutItem> {
        let item = self.generate_next(ty.into());

        if let Some(&index) = self.mapping.get(name) {
            if self.layout.items[index].is_equal_ignore_offset(&item) {
                return Ok(&self.layout.items[index]);
            }
            return Err(GfxError::DuplicateField(name.to_string()));
        }

        self.offset = self.offset.max(item.offset + item.size);
        let alignment = self.field_alignment(&item.ty);
        self.layout.max_alignment = self.layout.max_alignment.max(alignment);

        let index = self.layout.items.len();
        self.layout.field_names.push(name.to_string());
        self.layout.items.push(item);
        self.mapping.insert(name.to_string(), index);
        Ok(&self.layout.items[index])
    }

    /// Rebuilds the layout keeping only fields accepted by `filter`.
    ///
    /// Kept fields stay in declaration order.
    pub fn optimize(&mut self, mut filter: impl FnMut(&str, &StructLayoutItem) -> bool) {
        let kept: Vec<(String, FieldType)> = self
            .layout
            .field_names
            .iter()
            .zip(&self.layout.items)
            .filter(|(name, item)| filter(name, item))
            .map(|(name, item)| (name.clone(), item.ty))
            .collect();

        self.offset = 0;
        self.mapping.clear();
        self.layout = StructLayout::default();
        for (name, ty) in kept {
            // Names were unique before the rebuild.
            let item = self.generate_next(ty);
            self.offset = self.offset.max(item.offset + item.size);
            self.layout.max_alignment = self.layout.max_alignment.max(self.field_alignment(&ty));
            self.mapping.insert(name.clone(), self.layout.items.len());
            self.layout.field_names.push(name);
            self.layout.items.push(item);
        }
    }

    /// Pads the struct so its array stride is a multiple of `alignment`.
    ///
    /// Returns the padding item when one had to be added.
    pub fn force_alignment_to(&mut self, alignment: usize) -> Result<Option<StructLayoutItem>> {
        let stride = self.current_layout().array_stride();
        let aligned = align_to(stride, alignment);
        let padding = aligned - stride;
        if padding == 0 {
            return Ok(None);
        }

        let ty = if self.address_space == AddressSpace::Uniform {
            // Uniform arrays need a 16 byte element stride.
            FieldType::Array {
                element: NumType::FLOAT4,
                length: padding / 16,
            }
        } else {
            FieldType::Array {
                element: NumType::FLOAT,
                length: padding / 4,
            }
        };
        self.push(PADDING_FIELD_NAME, ty).cloned().map(Some)
    }

    fn update_output(&mut self) {
        if self.address_space == AddressSpace::Uniform {
            self.layout.max_alignment = align_to(self.layout.max_alignment.max(1), 16);
        }
        self.layout.size = align_to(self.offset, self.layout.max_alignment);
    }

    /// Returns the layout as it is currently.
    pub fn current_layout(&mut self) -> &StructLayout {
        self.update_output();
        &self.layout
    }

    #[must_use]
    pub fn finalize(mut self) -> StructLayout {
        self.update_output();
        self.layout
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_vec3_followed_by_scalar_packs() {
        let mut builder = StructLayoutBuilder::new(AddressSpace::Storage);
        builder.push("a", NumType::FLOAT3).unwrap();
        let b = builder.push("b", NumType::FLOAT).unwrap().clone();
        assert_eq!(b.offset, 12);
        let layout = builder.finalize();
        assert_eq!(layout.size, 16);
        assert_eq!(layout.max_alignment, 16);
    }

    #[test]
    fn test_uniform_rounds_alignment_to_16() {
        let mut builder = StructLayoutBuilder::new(AddressSpace::Uniform);
        builder.push("f", NumType::FLOAT).unwrap();
        let layout = builder.finalize();
        assert_eq!(layout.max_alignment, 16);
        assert_eq!(layout.size, 16);
    }

    #[test]
    fn test_duplicate_field_type_conflict() {
        let mut builder = StructLayoutBuilder::new(AddressSpace::Storage);
        builder.push("x", NumType::FLOAT).unwrap();
        assert!(builder.push("x", NumType::FLOAT).is_ok());
        assert!(matches!(
            builder.push("x", NumType::FLOAT4),
            Err(GfxError::DuplicateField(_))
        ));
    }

    #[test]
    fn test_optimize_keeps_declaration_order() {
        let mut builder = StructLayoutBuilder::new(AddressSpace::Storage);
        builder.push("world", NumType::FLOAT4X4).unwrap();
        builder.push("color", NumType::FLOAT4).unwrap();
        builder.push("roughness", NumType::FLOAT).unwrap();
        builder.optimize(|name, _| name != "color");
        let layout = builder.finalize();
        assert_eq!(layout.field_names, vec!["world", "roughness"]);
        assert_eq!(layout.find("roughness").unwrap().offset, 64);
    }

    #[test]
    fn test_force_alignment_pads_storage_with_floats() {
        let mut builder = StructLayoutBuilder::new(AddressSpace::Storage);
        builder.push("world", NumType::FLOAT4X4).unwrap();
        let pad = builder.force_alignment_to(256).unwrap().unwrap();
        assert_eq!(
            pad.ty,
            FieldType::Array {
                element: NumType::FLOAT,
                length: 48
            }
        );
        assert_eq!(builder.finalize().array_stride(), 256);
    }

    #[test]
    fn test_force_alignment_noop_when_aligned() {
        let mut builder = StructLayoutBuilder::new(AddressSpace::Uniform);
        builder.push("v", NumType::FLOAT4).unwrap();
        assert!(builder.force_alignment_to(16).unwrap().is_none());
    }

    #[test]
    fn test_add_field_is_idempotent() {
        let mut s = StructType::new();
        s.add_field("a", NumType::FLOAT).unwrap();
        s.add_field("a", NumType::FLOAT).unwrap();
        assert_eq!(s.fields.len(), 1);
        assert!(s.add_field("a", NumType::INT32).is_err());
    }
}
