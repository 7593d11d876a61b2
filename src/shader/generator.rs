//! WGSL code generator.
//!
//! The generator turns entry points from all active features into a single
//! WGSL module. It runs in two flavors over the same blocks:
//!
//! - [`Generator::build`] emits source text.
//! - [`Generator::index_bindings`] only records which buffer fields, textures
//!   and fragment outputs the blocks touch, so the pipeline builder can strip
//!   unused data before the final build.
//!
//! Both are pure functions of the generator definition and the entry points.

use std::collections::BTreeMap;
use std::sync::Arc;

use super::blocks::Block;
use super::context::{
    BufferDefinition, BuiltinDynamicFields, DynamicField, DynamicFieldHandler, GeneratorContext,
    GeneratorDefinitions, GeneratorError, TextureDefinition,
};
use super::entry_point::{EntryPoint, ProgrammableGraphicsStage, sort_entry_points};
use super::struct_layout::{AddressSpace, Dimension, StructLayout};
use super::textures::TextureBindingLayout;
use super::types::{FieldType, NamedNumType, NumType, TextureType, sanitize_identifier};
use crate::resources::MeshFormat;

/// Private variable holding the draw instance index in both stages.
pub const INSTANCE_INDEXER: &str = "u_instanceIndex";

const VERTEX_INPUT_STRUCT: &str = "Input";
const VERTEX_OUTPUT_STRUCT: &str = "VertOutput";
const FRAGMENT_INPUT_STRUCT: &str = "FragInput";
const FRAGMENT_OUTPUT_STRUCT: &str = "Output";

// ============================================================================
// Definitions & Results
// ============================================================================

/// A buffer bound to the generated shader.
#[derive(Debug, Clone, Default)]
pub struct BufferBinding {
    pub name: String,
    pub bind_group: u32,
    pub binding: u32,
    pub layout: StructLayout,
    pub address_space: AddressSpace,
    pub dimension: Dimension,
}

#[derive(Debug, Clone, Default)]
pub struct GeneratorOutput {
    pub wgsl_source: String,
    pub errors: Vec<GeneratorError>,
}

impl GeneratorOutput {
    /// Logs the source and every error at error level.
    pub fn dump_errors(&self) {
        if self.errors.is_empty() {
            return;
        }
        log::error!("Failed to generate shader code:");
        log::error!("{}\n------------------", self.wgsl_source);
        for error in &self.errors {
            log::error!(">  {error}");
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct IndexedBufferBinding {
    pub name: String,
    pub accessed_fields: BTreeMap<String, FieldType>,
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct IndexedTextureBinding {
    pub name: String,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct IndexedOutput {
    pub name: String,
    pub ty: NumType,
}

/// Bindings referenced by a set of entry points.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct IndexedBindings {
    pub buffer_bindings: Vec<IndexedBufferBinding>,
    pub texture_bindings: Vec<IndexedTextureBinding>,
    pub outputs: Vec<IndexedOutput>,
}

impl IndexedBindings {
    #[must_use]
    pub fn find_buffer(&self, name: &str) -> Option<&IndexedBufferBinding> {
        self.buffer_bindings.iter().find(|b| b.name == name)
    }

    #[must_use]
    pub fn uses_texture(&self, name: &str) -> bool {
        self.texture_bindings.iter().any(|t| t.name == name)
    }

    fn buffer_mut(&mut self, name: &str) -> &mut IndexedBufferBinding {
        let index = match self.buffer_bindings.iter().position(|b| b.name == name) {
            Some(index) => index,
            None => {
                self.buffer_bindings.push(IndexedBufferBinding {
                    name: name.to_string(),
                    ..Default::default()
                });
                self.buffer_bindings.len() - 1
            }
        };
        &mut self.buffer_bindings[index]
    }

    fn add_texture(&mut self, name: &str) {
        if !self.uses_texture(name) {
            self.texture_bindings.push(IndexedTextureBinding {
                name: name.to_string(),
            });
        }
    }

    pub fn dump(&self) {
        log::debug!("Indexed Bindings:");
        for buffer in &self.buffer_bindings {
            log::debug!(" buffer[{}]:", buffer.name);
            for (name, ty) in &buffer.accessed_fields {
                log::debug!(" - {name} ({ty})");
            }
        }
        for texture in &self.texture_bindings {
            log::debug!(" texture[{}]", texture.name);
        }
        for output in &self.outputs {
            log::debug!(" output[{}]: {}", output.name, output.ty);
        }
    }
}

// ============================================================================
// Stage IO
// ============================================================================

#[derive(Debug, Clone)]
struct StructField {
    base: NamedNumType,
    location: Option<u32>,
    builtin: Option<String>,
}

impl StructField {
    fn located(base: NamedNumType, location: u32) -> Self {
        Self {
            base,
            location: Some(location),
            builtin: None,
        }
    }

    fn plain(base: NamedNumType) -> Self {
        Self {
            base,
            location: None,
            builtin: None,
        }
    }
}

fn next_location(fields: &[StructField]) -> u32 {
    fields
        .iter()
        .filter_map(|f| f.location)
        .map(|l| l + 1)
        .max()
        .unwrap_or(0)
}

fn push_dynamic_field(fields: &mut Vec<StructField>, name: &str, field: DynamicField) -> NumType {
    if let Some(existing) = fields.iter().find(|f| f.base.name == name) {
        return existing.base.ty;
    }
    let base = NamedNumType::new(name, field.ty);
    let new_field = match field.builtin {
        Some(builtin) => StructField {
            base,
            location: None,
            builtin: Some(builtin),
        },
        None => StructField::located(base, next_location(fields)),
    };
    fields.push(new_field);
    field.ty
}

#[derive(Debug, Default)]
struct StageIo {
    input_fields: Vec<StructField>,
    output_fields: Vec<StructField>,
}

struct PipelineIo {
    vertex_input_fields: Vec<NamedNumType>,
    fragment_input_fields: Vec<NamedNumType>,
    output_fields: Vec<NamedNumType>,
    vertex: StageIo,
    fragment: StageIo,
}

impl PipelineIo {
    fn new(mesh_format: &MeshFormat, output_fields: &[NamedNumType]) -> Self {
        let vertex_input_fields: Vec<NamedNumType> = mesh_format
            .vertex_attributes
            .iter()
            .map(|attr| {
                NamedNumType::new(
                    attr.name.clone(),
                    NumType::new(attr.storage_type.shader_base_type(), attr.num_components),
                )
            })
            .collect();

        let mut vertex = StageIo::default();
        let mut fragment = StageIo::default();
        for (location, field) in (0u32..).zip(&vertex_input_fields) {
            vertex.input_fields.push(StructField::located(field.clone(), location));
        }
        for (location, field) in (0u32..).zip(output_fields) {
            fragment.output_fields.push(StructField::located(field.clone(), location));
        }
        vertex.output_fields.push(StructField::located(
            NamedNumType::new("instanceIndex", NumType::UINT32),
            0,
        ));

        Self {
            vertex_input_fields,
            fragment_input_fields: Vec::new(),
            output_fields: output_fields.to_vec(),
            vertex,
            fragment,
        }
    }

    fn setup_definitions(&self, definitions: &mut GeneratorDefinitions, stage: ProgrammableGraphicsStage) {
        let (inputs, outputs): (&[NamedNumType], &[NamedNumType]) = match stage {
            ProgrammableGraphicsStage::Vertex => (self.vertex_input_fields.as_slice(), &[]),
            ProgrammableGraphicsStage::Fragment => {
                (self.fragment_input_fields.as_slice(), self.output_fields.as_slice())
            }
        };
        definitions.inputs = inputs.iter().map(|f| (f.name.clone(), f.ty)).collect();
        definitions.outputs = outputs.iter().map(|f| (f.name.clone(), f.ty)).collect();
    }

    fn stage_io(&mut self, stage: ProgrammableGraphicsStage) -> &mut StageIo {
        match stage {
            ProgrammableGraphicsStage::Vertex => &mut self.vertex,
            ProgrammableGraphicsStage::Fragment => &mut self.fragment,
        }
    }

    /// Forwards vertex outputs to fragment inputs. Only the position builtin crosses stages.
    fn interpolate_vertex_outputs(&mut self) {
        for field in &self.vertex.output_fields {
            let crosses = field.builtin.as_deref().is_none_or(|b| b == "position");
            if crosses {
                self.fragment_input_fields.push(field.base.clone());
                self.fragment.input_fields.push(field.clone());
            }
        }
    }
}

/// Dynamic field creation for one stage.
struct DynamicFields<'a> {
    stage: ProgrammableGraphicsStage,
    io: &'a mut StageIo,
    handlers: &'a [Arc<dyn DynamicFieldHandler>],
}

impl DynamicFields<'_> {
    fn create_input(&mut self, name: &str) -> Option<NumType> {
        let field = self
            .handlers
            .iter()
            .find_map(|h| h.create_input(self.stage, name))?;
        Some(push_dynamic_field(&mut self.io.input_fields, name, field))
    }

    fn create_output(&mut self, name: &str, requested: NumType) -> Option<NumType> {
        let field = self
            .handlers
            .iter()
            .find_map(|h| h.create_output(self.stage, name, requested))?;
        Some(push_dynamic_field(&mut self.io.output_fields, name, field))
    }
}

// ============================================================================
// WGSL Context
// ============================================================================

struct WgslContext<'a> {
    result: String,
    headers: Vec<String>,
    header_stack: Vec<usize>,
    input_variable_name: String,
    output_variable_name: String,
    globals_variable_name: String,
    definitions: GeneratorDefinitions,
    errors: Vec<GeneratorError>,
    dynamic: DynamicFields<'a>,
    temp_counter: usize,
}

impl WgslContext<'_> {
    fn output(&mut self) -> &mut String {
        match self.header_stack.last() {
            Some(&index) => &mut self.headers[index],
            None => &mut self.result,
        }
    }
}

impl GeneratorContext for WgslContext<'_> {
    fn write(&mut self, text: &str) {
        self.output().push_str(text);
    }

    fn push_header_scope(&mut self) {
        self.header_stack.push(self.headers.len());
        self.headers.push(String::new());
    }

    fn pop_header_scope(&mut self) {
        self.header_stack.pop();
    }

    fn read_global(&mut self, name: &str) {
        if self.definitions.globals.contains_key(name) {
            let text = format!("{}.{name}", self.globals_variable_name);
            self.write(&text);
        } else {
            self.push_error(GeneratorError::new(format!("Global {name} does not exist")));
        }
    }

    fn begin_write_global(&mut self, name: &str, ty: NumType) {
        match self.definitions.globals.get(name) {
            Some(existing) if *existing != ty => {
                let message =
                    format!("Global {name} ({ty}) doesn't match previously written type {existing}");
                self.push_error(GeneratorError::new(message));
            }
            Some(_) => {}
            None => {
                self.definitions.globals.insert(name.to_string(), ty);
            }
        }
        let text = format!("{}.{name} = ", self.globals_variable_name);
        self.write(&text);
    }

    fn end_write_global(&mut self) {
        self.write(";\n");
    }

    fn has_input(&self, name: &str) -> bool {
        self.definitions.inputs.contains_key(name)
    }

    fn read_input(&mut self, name: &str) {
        if !self.definitions.inputs.contains_key(name) {
            let Some(ty) = self.dynamic.create_input(name) else {
                self.push_error(GeneratorError::new(format!("Input {name} does not exist")));
                return;
            };
            self.definitions.inputs.insert(name.to_string(), ty);
        }
        let text = format!("{}.{name}", self.input_variable_name);
        self.write(&text);
    }

    fn has_output(&self, name: &str) -> bool {
        self.definitions.outputs.contains_key(name)
    }

    fn write_output(&mut self, name: &str, ty: NumType) {
        let existing = match self.definitions.outputs.get(name) {
            Some(existing) => *existing,
            None => {
                let Some(created) = self.dynamic.create_output(name, ty) else {
                    self.push_error(GeneratorError::new(format!("Output {name} does not exist")));
                    return;
                };
                self.definitions.outputs.insert(name.to_string(), created);
                created
            }
        };

        if existing != ty {
            self.push_error(GeneratorError::new(format!(
                "Output {name} ({existing}) doesn't match previously expected type {ty}"
            )));
            return;
        }

        let text = format!("{}.{name}", self.output_variable_name);
        self.write(&text);
    }

    fn has_texture(&self, name: &str, default_texcoord_required: bool) -> bool {
        match self.definitions.textures.get(name) {
            Some(texture) => {
                !default_texcoord_required || self.has_input(&texture.default_texcoord_variable_name)
            }
            None => false,
        }
    }

    fn texture(&mut self, name: &str) {
        match self.definitions.textures.get(name) {
            Some(texture) => {
                let text = texture.variable_name.clone();
                self.write(&text);
            }
            None => self.push_error(GeneratorError::new(format!("Texture {name} does not exist"))),
        }
    }

    fn texture_default_texture_coordinate(&mut self, name: &str) {
        let Some(texture) = self.definitions.textures.get(name) else {
            return;
        };
        let texcoord = texture.default_texcoord_variable_name.clone();
        if self.has_input(&texcoord) {
            self.read_input(&texcoord);
        } else {
            self.write("vec2<f32>(0.0, 0.0)");
        }
    }

    fn texture_default_sampler(&mut self, name: &str) {
        if let Some(texture) = self.definitions.textures.get(name) {
            let text = texture.default_sampler_variable_name.clone();
            self.write(&text);
        }
    }

    fn read_buffer(&mut self, field: &str, ty: FieldType, buffer: &str, index: Option<&Block>) {
        let Some(definition) = self.definitions.buffers.get(buffer) else {
            self.push_error(GeneratorError::new(format!("Buffer \"{buffer}\" is not defined")));
            return;
        };
        let Some(item) = definition.find_field(field) else {
            self.push_error(GeneratorError::new(format!(
                "Field \"{field}\" not found in buffer \"{buffer}\""
            )));
            return;
        };
        if item.ty != ty {
            let message = format!(
                "Field \"{field}\", shader expected type {ty} but provided was {}",
                item.ty
            );
            self.push_error(GeneratorError::new(message));
            return;
        }

        let variable = definition.variable_name.clone();
        let dimension = definition.dimension;
        let field = sanitize_identifier(field);
        match dimension {
            Dimension::One => self.write(&format!("{variable}.{field}")),
            Dimension::PerInstance => {
                self.write(&format!("{variable}.elements[{INSTANCE_INDEXER}].{field}"));
            }
            Dimension::Dynamic | Dimension::Fixed(_) => {
                let Some(index) = index else {
                    self.push_error(GeneratorError::new(format!(
                        "Can not access buffer \"{buffer}\" without index since it's an array"
                    )));
                    return;
                };
                self.write(&format!("{variable}.elements["));
                index.apply(self);
                self.write(&format!("].{field}"));
            }
        }
    }

    fn definitions(&self) -> &GeneratorDefinitions {
        &self.definitions
    }

    fn push_error(&mut self, error: GeneratorError) {
        self.errors.push(error);
    }

    fn generate_temp_variable(&mut self) -> String {
        let name = format!("_tmp{}", self.temp_counter);
        self.temp_counter += 1;
        name
    }
}

// ============================================================================
// Indexer Context
// ============================================================================

struct IndexerContext<'a> {
    result: IndexedBindings,
    definitions: GeneratorDefinitions,
    dynamic: DynamicFields<'a>,
    temp_counter: usize,
}

impl GeneratorContext for IndexerContext<'_> {
    fn write(&mut self, _text: &str) {}

    fn push_header_scope(&mut self) {}

    fn pop_header_scope(&mut self) {}

    fn read_global(&mut self, _name: &str) {}

    fn begin_write_global(&mut self, name: &str, ty: NumType) {
        self.definitions.globals.insert(name.to_string(), ty);
    }

    fn end_write_global(&mut self) {}

    fn has_input(&self, name: &str) -> bool {
        self.definitions.inputs.contains_key(name)
    }

    fn read_input(&mut self, name: &str) {
        if !self.definitions.inputs.contains_key(name)
            && let Some(ty) = self.dynamic.create_input(name)
        {
            self.definitions.inputs.insert(name.to_string(), ty);
        }
    }

    fn has_output(&self, name: &str) -> bool {
        self.definitions.outputs.contains_key(name)
    }

    fn write_output(&mut self, name: &str, ty: NumType) {
        if !self.definitions.outputs.contains_key(name)
            && let Some(created) = self.dynamic.create_output(name, ty)
        {
            self.definitions.outputs.insert(name.to_string(), created);
        }
    }

    fn has_texture(&self, name: &str, default_texcoord_required: bool) -> bool {
        match self.definitions.textures.get(name) {
            Some(texture) => {
                !default_texcoord_required || self.has_input(&texture.default_texcoord_variable_name)
            }
            None => false,
        }
    }

    fn texture(&mut self, name: &str) {
        self.result.add_texture(name);
    }

    fn texture_default_texture_coordinate(&mut self, name: &str) {
        self.result.add_texture(name);
    }

    fn texture_default_sampler(&mut self, name: &str) {
        self.result.add_texture(name);
    }

    fn read_buffer(&mut self, field: &str, ty: FieldType, buffer: &str, index: Option<&Block>) {
        self.result
            .buffer_mut(buffer)
            .accessed_fields
            .insert(field.to_string(), ty);
        if let Some(index) = index {
            index.apply(self);
        }
    }

    fn definitions(&self) -> &GeneratorDefinitions {
        &self.definitions
    }

    fn push_error(&mut self, _error: GeneratorError) {}

    fn generate_temp_variable(&mut self) -> String {
        let name = format!("_tmp{}", self.temp_counter);
        self.temp_counter += 1;
        name
    }
}

// ============================================================================
// Code Emission Helpers
// ============================================================================

fn generate_struct(output: &mut String, type_name: &str, fields: &[StructField], interpolated: bool) {
    output.push_str(&format!("struct {type_name} {{\n"));
    for field in fields {
        let ty = &field.base.ty;
        output.push('\t');
        if let Some(builtin) = &field.builtin {
            output.push_str(&format!("@builtin({builtin}) "));
        } else if let Some(location) = field.location {
            output.push_str(&format!("@location({location}) "));
            // Integer vertex outputs require flat interpolation
            if interpolated && ty.base_type.is_integer() {
                output.push_str("@interpolate(flat) ");
            }
        }
        output.push_str(&format!(
            "{}: {},\n",
            sanitize_identifier(&field.base.name),
            ty.wgsl_name()
        ));
    }
    output.push_str("};\n");
}

fn generate_buffer(output: &mut String, binding: &BufferBinding, variable_name: &str) {
    let struct_name = format!("{}_t", sanitize_identifier(&binding.name));
    output.push_str(&format!("struct {struct_name} {{\n"));
    for (name, item) in binding.layout.field_names.iter().zip(&binding.layout.items) {
        output.push_str(&format!(
            "\t{}: {},\n",
            sanitize_identifier(name),
            item.ty.wgsl_name()
        ));
    }
    output.push_str("};\n");

    let container_name = format!("{}_container", sanitize_identifier(&binding.name));
    let var_type = match binding.dimension {
        Dimension::One => struct_name,
        Dimension::Fixed(length) => {
            output.push_str(&format!(
                "struct {container_name} {{ elements: array<{struct_name}, {length}> }};\n"
            ));
            container_name
        }
        Dimension::PerInstance | Dimension::Dynamic => {
            output.push_str(&format!(
                "struct {container_name} {{ elements: array<{struct_name}> }};\n"
            ));
            container_name
        }
    };

    output.push_str(&format!(
        "@group({}) @binding({})\nvar<{}> {variable_name}: {var_type};\n",
        binding.bind_group,
        binding.binding,
        binding.address_space.wgsl_qualifier()
    ));
}

fn generate_texture_vars(output: &mut String, def: &TextureDefinition, group: u32, binding: u32, sampler_binding: u32) {
    output.push_str(&format!(
        "@group({group}) @binding({binding})\nvar {}: {};\n",
        def.variable_name,
        def.ty.wgsl_name()
    ));
    output.push_str(&format!(
        "@group({group}) @binding({sampler_binding})\nvar {}: sampler;\n",
        def.default_sampler_variable_name
    ));
}

// ============================================================================
// Stages
// ============================================================================

struct Stage<'e> {
    stage: ProgrammableGraphicsStage,
    entry_points: Vec<&'e EntryPoint>,
    extra_parameters: Vec<String>,
    main_header: Vec<String>,
    input_struct_name: &'static str,
    output_struct_name: &'static str,
    input_variable_name: String,
    output_variable_name: String,
    globals_struct_name: String,
    globals_variable_name: String,
}

impl<'e> Stage<'e> {
    fn new(
        stage: ProgrammableGraphicsStage,
        input_struct_name: &'static str,
        output_struct_name: &'static str,
    ) -> Self {
        let title = stage.title();
        Self {
            stage,
            entry_points: Vec::new(),
            extra_parameters: Vec::new(),
            main_header: Vec::new(),
            input_struct_name,
            output_struct_name,
            input_variable_name: format!("p_{title}_input"),
            output_variable_name: format!("p_{title}_output"),
            globals_struct_name: format!("{title}_globals_t"),
            globals_variable_name: format!("p_{title}_globals"),
        }
    }

    fn process(
        &self,
        io: &mut StageIo,
        handlers: &[Arc<dyn DynamicFieldHandler>],
        definitions: GeneratorDefinitions,
    ) -> (String, Vec<GeneratorError>) {
        let stage_name = self.stage.wgsl_name();

        let mut context = WgslContext {
            result: String::new(),
            headers: Vec::new(),
            header_stack: Vec::new(),
            input_variable_name: self.input_variable_name.clone(),
            output_variable_name: self.output_variable_name.clone(),
            globals_variable_name: self.globals_variable_name.clone(),
            definitions,
            errors: Vec::new(),
            dynamic: DynamicFields {
                stage: self.stage,
                io,
                handlers,
            },
            temp_counter: 0,
        };

        let mut function_names = Vec::with_capacity(self.entry_points.len());
        for (index, entry_point) in self.entry_points.iter().enumerate() {
            let function_name = format!("entryPoint_{stage_name}_{index}");
            context.write(&format!("fn {function_name}() {{\n"));
            entry_point.code.apply(&mut context);
            context.write("}\n");
            function_names.push(function_name);
        }

        // Dynamic fields may have been added while applying the entry points.
        let has_input = !context.dynamic.io.input_fields.is_empty();
        let has_output = !context.dynamic.io.output_fields.is_empty();

        let mut params = Vec::new();
        if has_input {
            params.push(format!("in: {}", self.input_struct_name));
        }
        params.extend(self.extra_parameters.iter().cloned());
        let return_type = if has_output {
            format!("-> {} ", self.output_struct_name)
        } else {
            String::new()
        };

        context.write(&format!(
            "@{stage_name}\nfn {stage_name}_main({}) {return_type}{{\n",
            params.join(", ")
        ));
        if has_input {
            context.write(&format!("\t{} = in;\n", self.input_variable_name));
        }
        for line in &self.main_header {
            context.write(&format!("\t{line}\n"));
        }
        for function_name in &function_names {
            context.write(&format!("\t{function_name}();\n"));
        }
        if has_output {
            context.write(&format!("\treturn {};\n", self.output_variable_name));
        }
        context.write("}\n");

        let mut source = String::new();
        if !context.definitions.globals.is_empty() {
            let fields: Vec<StructField> = context
                .definitions
                .globals
                .iter()
                .map(|(name, ty)| StructField::plain(NamedNumType::new(name.clone(), *ty)))
                .collect();
            generate_struct(&mut source, &self.globals_struct_name, &fields, false);
            source.push_str(&format!(
                "var<private> {}: {};\n",
                self.globals_variable_name, self.globals_struct_name
            ));
        }
        for header in context.headers {
            source.push_str(&header);
        }
        source.push_str(&context.result);

        (source, context.errors)
    }
}

// ============================================================================
// Generator
// ============================================================================

/// Shader generator definition: everything except the entry points.
#[derive(Clone, Default)]
pub struct Generator {
    pub mesh_format: MeshFormat,
    /// Fragment outputs, one per color render target
    pub output_fields: Vec<NamedNumType>,
    pub buffer_bindings: Vec<BufferBinding>,
    pub texture_binding_layout: TextureBindingLayout,
    pub texture_bind_group: u32,
    /// Extra handlers consulted before the built-in ones
    pub dynamic_handlers: Vec<Arc<dyn DynamicFieldHandler>>,
}

impl Generator {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    fn all_handlers(&self) -> Vec<Arc<dyn DynamicFieldHandler>> {
        let mut handlers = self.dynamic_handlers.clone();
        handlers.push(Arc::new(BuiltinDynamicFields));
        handlers
    }

    fn texture_definition(name: &str, texcoord: u8, ty: TextureType) -> TextureDefinition {
        let identifier = sanitize_identifier(name);
        TextureDefinition {
            variable_name: format!("t_{identifier}"),
            default_texcoord_variable_name: format!("texCoord{texcoord}"),
            default_sampler_variable_name: format!("s_{identifier}"),
            ty,
        }
    }

    fn partition<'e>(entry_points: &[&'e EntryPoint]) -> [Vec<&'e EntryPoint>; 2] {
        let mut stages: [Vec<&EntryPoint>; 2] = [Vec::new(), Vec::new()];
        for entry_point in entry_points {
            stages[entry_point.stage.index()].push(entry_point);
        }
        stages
    }

    /// Generates the WGSL module.
    ///
    /// On a dependency cycle the source is empty and the error list names the
    /// entry points involved.
    #[must_use]
    pub fn build(&self, entry_points: &[&EntryPoint]) -> GeneratorOutput {
        let mut output = GeneratorOutput::default();

        let [vertex_entry_points, fragment_entry_points] = Self::partition(entry_points);
        let mut stages = [
            Stage::new(
                ProgrammableGraphicsStage::Vertex,
                VERTEX_INPUT_STRUCT,
                VERTEX_OUTPUT_STRUCT,
            ),
            Stage::new(
                ProgrammableGraphicsStage::Fragment,
                FRAGMENT_INPUT_STRUCT,
                FRAGMENT_OUTPUT_STRUCT,
            ),
        ];
        stages[0].entry_points = vertex_entry_points;
        stages[1].entry_points = fragment_entry_points;

        for stage in &mut stages {
            if let Err(cycle) = sort_entry_points(&mut stage.entry_points) {
                output.errors.push(GeneratorError::new(format!(
                    "Dependency cycle between {} entry points: {}",
                    stage.stage.wgsl_name(),
                    cycle.involved.join(", ")
                )));
            }
        }
        if !output.errors.is_empty() {
            return output;
        }

        let mut header_code = String::with_capacity(2 << 12);
        header_code.push_str(&format!("var<private> {INSTANCE_INDEXER}: u32;\n"));

        let vertex_output = stages[0].output_variable_name.clone();
        stages[0]
            .extra_parameters
            .push("@builtin(instance_index) _instanceIndex: u32".to_string());
        stages[0]
            .main_header
            .push(format!("{INSTANCE_INDEXER} = _instanceIndex;"));
        stages[0]
            .main_header
            .push(format!("{vertex_output}.instanceIndex = {INSTANCE_INDEXER};"));
        let fragment_input = stages[1].input_variable_name.clone();
        stages[1]
            .main_header
            .push(format!("{INSTANCE_INDEXER} = {fragment_input}.instanceIndex;"));

        let mut definitions = GeneratorDefinitions::default();
        for binding in &self.buffer_bindings {
            let variable_name = format!("u_{}", sanitize_identifier(&binding.name));
            if !binding.layout.items.is_empty() {
                generate_buffer(&mut header_code, binding, &variable_name);
            }
            definitions.buffers.insert(
                binding.name.clone(),
                BufferDefinition {
                    variable_name,
                    layout: binding.layout.clone(),
                    dimension: binding.dimension,
                },
            );
        }

        for texture in &self.texture_binding_layout.bindings {
            let def = Self::texture_definition(&texture.name, texture.default_texcoord_binding, texture.ty);
            generate_texture_vars(
                &mut header_code,
                &def,
                self.texture_bind_group,
                texture.binding,
                texture.default_sampler_binding,
            );
            definitions.textures.insert(texture.name.clone(), def);
        }

        let handlers = self.all_handlers();
        let mut pipeline_io = PipelineIo::new(&self.mesh_format, &self.output_fields);
        let mut stages_code = String::with_capacity(2 << 12);
        for stage in &stages {
            let mut stage_definitions = definitions.clone();
            pipeline_io.setup_definitions(&mut stage_definitions, stage.stage);
            let io = pipeline_io.stage_io(stage.stage);
            let (code, errors) = stage.process(io, &handlers, stage_definitions);
            output.errors.extend(errors);
            stages_code.push_str(&code);

            if stage.stage == ProgrammableGraphicsStage::Vertex {
                pipeline_io.interpolate_vertex_outputs();
            }
        }

        // IO structs depend on the dynamic fields created by the stage code.
        let [vertex, fragment] = &stages;
        let io_structs = [
            (&pipeline_io.vertex.input_fields, vertex.input_struct_name, &vertex.input_variable_name, false),
            (&pipeline_io.vertex.output_fields, vertex.output_struct_name, &vertex.output_variable_name, true),
            (&pipeline_io.fragment.input_fields, fragment.input_struct_name, &fragment.input_variable_name, true),
            (&pipeline_io.fragment.output_fields, fragment.output_struct_name, &fragment.output_variable_name, false),
        ];
        for (fields, struct_name, variable_name, interpolated) in io_structs {
            if fields.is_empty() {
                continue;
            }
            generate_struct(&mut header_code, struct_name, fields, interpolated);
            header_code.push_str(&format!("var<private> {variable_name}: {struct_name};\n"));
        }

        output.wgsl_source = header_code + &stages_code;
        output
    }

    /// Records the bindings and fragment outputs the entry points reference.
    ///
    /// Entry points that cannot be ordered are visited in their given order;
    /// [`Generator::build`] reports the cycle.
    #[must_use]
    pub fn index_bindings(&self, entry_points: &[&EntryPoint]) -> IndexedBindings {
        let mut stages = Self::partition(entry_points);
        for stage in &mut stages {
            // Ordering only affects which outputs exist when a block checks for them.
            let _ = sort_entry_points(stage);
        }

        let mut base_definitions = GeneratorDefinitions::default();
        for binding in &self.buffer_bindings {
            base_definitions.buffers.insert(
                binding.name.clone(),
                BufferDefinition {
                    variable_name: String::new(),
                    layout: binding.layout.clone(),
                    dimension: binding.dimension,
                },
            );
        }
        for texture in &self.texture_binding_layout.bindings {
            let def = Self::texture_definition(&texture.name, texture.default_texcoord_binding, texture.ty);
            base_definitions.textures.insert(texture.name.clone(), def);
        }

        let handlers = self.all_handlers();
        let mut pipeline_io = PipelineIo::new(&self.mesh_format, &self.output_fields);
        let mut result = IndexedBindings::default();
        for (stage, stage_entry_points) in ProgrammableGraphicsStage::ALL.into_iter().zip(&stages) {
            let mut definitions = base_definitions.clone();
            pipeline_io.setup_definitions(&mut definitions, stage);

            let mut context = IndexerContext {
                result: std::mem::take(&mut result),
                definitions,
                dynamic: DynamicFields {
                    stage,
                    io: pipeline_io.stage_io(stage),
                    handlers: &handlers,
                },
                temp_counter: 0,
            };
            for entry_point in stage_entry_points {
                entry_point.code.apply(&mut context);
            }

            if stage == ProgrammableGraphicsStage::Fragment {
                context.result.outputs = context
                    .definitions
                    .outputs
                    .iter()
                    .map(|(name, ty)| IndexedOutput {
                        name: name.clone(),
                        ty: *ty,
                    })
                    .collect();
            }
            result = context.result;

            if stage == ProgrammableGraphicsStage::Vertex {
                pipeline_io.interpolate_vertex_outputs();
            }
        }

        result
    }
}
