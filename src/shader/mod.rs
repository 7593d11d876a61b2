//! Shader Generation
//!
//! Declarative shader building blocks and the WGSL generator that assembles
//! them into a complete module.
//!
//! - [`types`]: WGSL numerical and texture types
//! - [`struct_layout`]: buffer struct layouts following the WGSL alignment rules
//! - [`textures`]: texture slot numbering
//! - [`blocks`]: composable code blocks
//! - [`entry_point`]: stage entry points and their dependency ordering
//! - [`context`]: the context blocks are evaluated against
//! - [`generator`]: WGSL emission and binding discovery

pub mod blocks;
pub mod context;
pub mod entry_point;
pub mod generator;
pub mod struct_layout;
pub mod textures;
pub mod types;

pub use blocks::Block;
pub use context::{
    BufferDefinition, BuiltinDynamicFields, DynamicField, DynamicFieldHandler, GeneratorContext,
    GeneratorDefinitions, GeneratorError, TextureDefinition,
};
pub use entry_point::{
    DependencyCycle, DependencyType, EntryPoint, NamedDependency, ProgrammableGraphicsStage,
    sort_entry_points,
};
pub use generator::{
    BufferBinding, Generator, GeneratorOutput, IndexedBindings, IndexedBufferBinding,
    IndexedOutput, IndexedTextureBinding,
};
pub use struct_layout::{
    AddressSpace, Dimension, StructLayout, StructLayoutBuilder, StructLayoutItem, StructType,
};
pub use textures::{TextureBinding, TextureBindingLayout, TextureBindingLayoutBuilder};
pub use types::{FieldType, NamedNumType, NumType, ShaderFieldBaseType, TextureType};
