//! The generator context seam between blocks and the code generators.

use std::collections::BTreeMap;
use std::fmt;

use super::blocks::Block;
use super::entry_point::ProgrammableGraphicsStage;
use super::struct_layout::{Dimension, StructLayout, StructLayoutItem};
use super::types::{FieldType, NumType, TextureType};

/// A single problem found while generating shader code.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct GeneratorError {
    pub message: String,
}

impl GeneratorError {
    pub fn new(message: impl Into<String>) -> Self {
        Self {
            message: message.into(),
        }
    }
}

impl fmt::Display for GeneratorError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.message)
    }
}

impl std::error::Error for GeneratorError {}

/// A buffer as seen from shader code.
#[derive(Debug, Clone, Default)]
pub struct BufferDefinition {
    /// WGSL variable holding the buffer, `u_{name}`
    pub variable_name: String,
    pub layout: StructLayout,
    pub dimension: Dimension,
}

impl BufferDefinition {
    #[must_use]
    pub fn find_field(&self, name: &str) -> Option<&StructLayoutItem> {
        self.layout.find(name)
    }
}

/// A texture slot as seen from shader code.
#[derive(Debug, Clone, Default)]
pub struct TextureDefinition {
    pub variable_name: String,
    pub default_texcoord_variable_name: String,
    pub default_sampler_variable_name: String,
    pub ty: TextureType,
}

/// Everything a stage can reference by name.
///
/// Maps are ordered so iteration (and the generated code) is deterministic.
#[derive(Debug, Clone, Default)]
pub struct GeneratorDefinitions {
    pub buffers: BTreeMap<String, BufferDefinition>,
    pub textures: BTreeMap<String, TextureDefinition>,
    pub inputs: BTreeMap<String, NumType>,
    pub globals: BTreeMap<String, NumType>,
    pub outputs: BTreeMap<String, NumType>,
}

/// Field created on demand when a stage reads or writes an unknown name.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DynamicField {
    pub ty: NumType,
    /// WGSL builtin this field maps to, a location is assigned otherwise
    pub builtin: Option<String>,
}

impl DynamicField {
    #[must_use]
    pub fn located(ty: NumType) -> Self {
        Self { ty, builtin: None }
    }

    pub fn builtin(ty: NumType, builtin: impl Into<String>) -> Self {
        Self {
            ty,
            builtin: Some(builtin.into()),
        }
    }
}

/// Creates stage inputs and outputs that are not declared up front.
///
/// Handlers are consulted in registration order; the first one returning a
/// field wins.
pub trait DynamicFieldHandler: Send + Sync {
    fn create_input(&self, _stage: ProgrammableGraphicsStage, _name: &str) -> Option<DynamicField> {
        None
    }

    fn create_output(
        &self,
        _stage: ProgrammableGraphicsStage,
        _name: &str,
        _requested: NumType,
    ) -> Option<DynamicField> {
        None
    }
}

/// The always-present handlers.
///
/// - vertex input `vertex_index` maps to the vertex index builtin
/// - any vertex output is accepted, `position` maps to the position builtin
/// - any fragment output is accepted, `depth` maps to `frag_depth`
#[derive(Debug, Clone, Copy, Default)]
pub struct BuiltinDynamicFields;

impl DynamicFieldHandler for BuiltinDynamicFields {
    fn create_input(&self, stage: ProgrammableGraphicsStage, name: &str) -> Option<DynamicField> {
        match (stage, name) {
            (ProgrammableGraphicsStage::Vertex, "vertex_index") => {
                Some(DynamicField::builtin(NumType::UINT32, "vertex_index"))
            }
            _ => None,
        }
    }

    fn create_output(
        &self,
        stage: ProgrammableGraphicsStage,
        name: &str,
        requested: NumType,
    ) -> Option<DynamicField> {
        match (stage, name) {
            (ProgrammableGraphicsStage::Vertex, "position") => {
                Some(DynamicField::builtin(requested, "position"))
            }
            (ProgrammableGraphicsStage::Fragment, "depth") => {
                Some(DynamicField::builtin(requested, "frag_depth"))
            }
            _ => Some(DynamicField::located(requested)),
        }
    }
}

/// Access point used by [`Block::apply`].
///
/// Implemented by the WGSL emitting context and by the binding indexer.
pub trait GeneratorContext {
    /// Writes to the current output (function body or header scope).
    fn write(&mut self, text: &str);

    /// Starts writing code placed before the function being generated.
    fn push_header_scope(&mut self);
    fn pop_header_scope(&mut self);

    fn read_global(&mut self, name: &str);
    fn begin_write_global(&mut self, name: &str, ty: NumType);
    fn end_write_global(&mut self);

    fn has_input(&self, name: &str) -> bool;
    fn read_input(&mut self, name: &str);

    fn has_output(&self, name: &str) -> bool;
    fn write_output(&mut self, name: &str, ty: NumType);

    fn has_texture(&self, name: &str, default_texcoord_required: bool) -> bool;
    fn texture(&mut self, name: &str);
    fn texture_default_texture_coordinate(&mut self, name: &str);
    fn texture_default_sampler(&mut self, name: &str);

    /// Reads `field` from `buffer`; array buffers other than per-instance ones need `index`.
    fn read_buffer(&mut self, field: &str, ty: FieldType, buffer: &str, index: Option<&Block>);

    fn definitions(&self) -> &GeneratorDefinitions;

    fn push_error(&mut self, error: GeneratorError);

    fn generate_temp_variable(&mut self) -> String;
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_builtin_handlers() {
        let h = BuiltinDynamicFields;
        let vi = h
            .create_input(ProgrammableGraphicsStage::Vertex, "vertex_index")
            .unwrap();
        assert_eq!(vi.builtin.as_deref(), Some("vertex_index"));
        assert!(
            h.create_input(ProgrammableGraphicsStage::Fragment, "vertex_index")
                .is_none()
        );

        let pos = h
            .create_output(ProgrammableGraphicsStage::Vertex, "position", NumType::FLOAT4)
            .unwrap();
        assert_eq!(pos.builtin.as_deref(), Some("position"));

        let depth = h
            .create_output(ProgrammableGraphicsStage::Fragment, "depth", NumType::FLOAT)
            .unwrap();
        assert_eq!(depth.builtin.as_deref(), Some("frag_depth"));

        let other = h
            .create_output(ProgrammableGraphicsStage::Vertex, "normal", NumType::FLOAT3)
            .unwrap();
        assert!(other.builtin.is_none());
    }
}
