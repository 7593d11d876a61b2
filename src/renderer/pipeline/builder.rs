//! Pipeline Builder
//!
//! Turns one representative drawable and the pipeline step it is drawn in into
//! a [`CompiledPipeline`]. The shader generator runs twice:
//!
//! 1. **Discovery**: every declared parameter is laid out, and
//!    [`Generator::index_bindings`] records which buffer fields the entry
//!    points actually read.
//! 2. **Final**: buffer structs are rebuilt with only the referenced fields,
//!    aligned for dynamic offsets, and the WGSL is generated and compiled.
//!
//! Feature order is step features, drawable features, then material features;
//! parameters, texture slots and fixed-function state follow that order.

use std::sync::Arc;

use super::cache::{CompiledPipeline, DynamicBufferRef, PipelineBufferBinding};
use super::hash::Hash128;
use super::shader_manager::ShaderManager;
use super::vertex::vertex_buffer_layout;
use crate::errors::{GfxError, Result};
use crate::renderer::backend::{BindGroupLayoutHandle, GpuBackend, PipelineLayoutHandle, RenderPipelineDesc};
use crate::resources::{
    BindGroupId, Drawable, Feature, FeaturePipelineState, ParameterStorage, PipelineStep, PrimitiveType,
    TextureParameter, WindingOrder,
};
use crate::shader::{
    AddressSpace, Block, BufferBinding, Dimension, DynamicFieldHandler, EntryPoint, Generator,
    IndexedBindings, NumType, ProgrammableGraphicsStage, StructLayoutBuilder, TextureBindingLayout,
    TextureBindingLayoutBuilder, TextureType,
};

/// Per-draw buffer, bind group 0.
pub const OBJECT_BUFFER: &str = "object";
/// Per-view buffer, bind group 1.
pub const VIEW_BUFFER: &str = "view";
/// Name of the built-in entry point forwarding pass-through vertex inputs.
pub const INTERPOLATE_ENTRY_POINT: &str = "interpolate";

/// A buffer binding while the pipeline is being built.
#[derive(Debug, Clone)]
pub struct BuilderBufferBinding {
    pub name: String,
    pub bind_group: BindGroupId,
    pub layout_builder: StructLayoutBuilder,
    pub dimension: Dimension,
    pub has_dynamic_offset: bool,
    unused: bool,
}

impl BuilderBufferBinding {
    pub fn new(
        name: impl Into<String>,
        bind_group: BindGroupId,
        address_space: AddressSpace,
        dimension: Dimension,
    ) -> Self {
        Self {
            name: name.into(),
            bind_group,
            layout_builder: StructLayoutBuilder::new(address_space),
            dimension,
            has_dynamic_offset: false,
            unused: false,
        }
    }

    #[must_use]
    pub fn with_dynamic_offset(mut self) -> Self {
        self.has_dynamic_offset = true;
        self
    }

    #[inline]
    #[must_use]
    pub fn address_space(&self) -> AddressSpace {
        self.layout_builder.address_space()
    }

    /// Whether the discovery pass found no reads of this buffer.
    #[inline]
    #[must_use]
    pub fn is_unused(&self) -> bool {
        self.unused
    }
}

pub struct PipelineBuilder<'a> {
    drawable: &'a Drawable,
    step: &'a PipelineStep,
    limits: &'a wgpu::Limits,
    features: Vec<&'a Feature>,
    buffer_bindings: Vec<BuilderBufferBinding>,
    texture_bindings: TextureBindingLayoutBuilder,
    dynamic_handlers: Vec<Arc<dyn DynamicFieldHandler>>,
    extra_entry_points: Vec<EntryPoint>,
    base_draw_parameters: ParameterStorage,
    base_view_parameters: ParameterStorage,
}

impl<'a> PipelineBuilder<'a> {
    #[must_use]
    pub fn new(drawable: &'a Drawable, step: &'a PipelineStep, limits: &'a wgpu::Limits) -> Self {
        let features = step
            .features
            .iter()
            .chain(&drawable.features)
            .chain(drawable.material.iter().flat_map(|m| &m.features))
            .map(|feature| &**feature)
            .collect();

        Self {
            drawable,
            step,
            limits,
            features,
            buffer_bindings: Vec::new(),
            texture_bindings: TextureBindingLayoutBuilder::new(),
            dynamic_handlers: Vec::new(),
            extra_entry_points: Vec::new(),
            base_draw_parameters: ParameterStorage::new(),
            base_view_parameters: ParameterStorage::new(),
        }
    }

    #[inline]
    #[must_use]
    pub fn drawable(&self) -> &'a Drawable {
        self.drawable
    }

    #[inline]
    #[must_use]
    pub fn step(&self) -> &'a PipelineStep {
        self.step
    }

    #[inline]
    #[must_use]
    pub fn features(&self) -> &[&'a Feature] {
        &self.features
    }

    #[inline]
    #[must_use]
    pub fn limits(&self) -> &wgpu::Limits {
        self.limits
    }

    // ========================================================================
    // Modifier API
    // ========================================================================

    /// Adds a buffer binding, or returns the existing one with that name.
    pub fn add_buffer_binding(&mut self, binding: BuilderBufferBinding) -> &mut BuilderBufferBinding {
        let index = match self.buffer_bindings.iter().position(|b| b.name == binding.name) {
            Some(index) => {
                log::warn!("Buffer binding '{}' declared twice, keeping the first", binding.name);
                index
            }
            None => {
                self.buffer_bindings.push(binding);
                self.buffer_bindings.len() - 1
            }
        };
        &mut self.buffer_bindings[index]
    }

    pub fn buffer_binding_mut(&mut self, name: &str) -> Option<&mut BuilderBufferBinding> {
        self.buffer_bindings.iter_mut().find(|b| b.name == name)
    }

    pub fn add_texture_slot(&mut self, name: &str, ty: TextureType, default_texcoord_binding: u8) {
        self.texture_bindings
            .add_or_update_slot(name, ty, default_texcoord_binding);
    }

    pub fn add_entry_point(&mut self, entry_point: EntryPoint) {
        self.extra_entry_points.push(entry_point);
    }

    pub fn add_dynamic_handler(&mut self, handler: Arc<dyn DynamicFieldHandler>) {
        self.dynamic_handlers.push(handler);
    }

    // ========================================================================
    // Build
    // ========================================================================

    /// Fixed-function state of all features folded left to right.
    #[must_use]
    pub fn combined_state(&self) -> FeaturePipelineState {
        self.features
            .iter()
            .fold(FeaturePipelineState::default(), |acc, f| acc.combine(&f.state))
    }

    fn declare_standard_bindings(&mut self) -> Result<()> {
        let object = self.add_buffer_binding(
            BuilderBufferBinding::new(
                OBJECT_BUFFER,
                BindGroupId::Draw,
                AddressSpace::Storage,
                Dimension::PerInstance,
            )
            .with_dynamic_offset(),
        );
        for field in ["world", "invWorld", "invTransWorld"] {
            object.layout_builder.push(field, NumType::FLOAT4X4)?;
        }

        let view = self.add_buffer_binding(
            BuilderBufferBinding::new(VIEW_BUFFER, BindGroupId::View, AddressSpace::Uniform, Dimension::One)
                .with_dynamic_offset(),
        );
        for field in ["view", "proj", "invView", "invProj"] {
            view.layout_builder.push(field, NumType::FLOAT4X4)?;
        }
        view.layout_builder.push("viewport", NumType::FLOAT4)?;
        Ok(())
    }

    fn declare_parameters(&mut self) -> Result<()> {
        let features = self.features.clone();
        for feature in &features {
            for param in &feature.shader_params {
                let buffer = match param.bind_group {
                    BindGroupId::Draw => OBJECT_BUFFER,
                    BindGroupId::View => VIEW_BUFFER,
                };
                if let Some(binding) = self.buffer_binding_mut(buffer) {
                    binding.layout_builder.push(&param.name, param.ty)?;
                }
                match param.bind_group {
                    BindGroupId::Draw => self.base_draw_parameters.set_param(&param.name, param.default_value),
                    BindGroupId::View => self.base_view_parameters.set_param(&param.name, param.default_value),
                }
            }

            for texture in &feature.texture_params {
                if texture.bind_group != BindGroupId::Draw {
                    log::warn!(
                        "Texture '{}' of feature '{}' requests the view bind group, binding it per draw",
                        texture.name,
                        feature.label
                    );
                }
                self.texture_bindings.add_or_update_slot(&texture.name, texture.ty, 0);
                self.base_draw_parameters.set_texture(
                    &texture.name,
                    TextureParameter {
                        texture: texture.default_texture.clone(),
                        default_texcoord_binding: 0,
                    },
                );
            }
        }

        for feature in &features {
            if let Some(modifier) = &feature.pipeline_modifier {
                modifier.build_pipeline(self);
            }
        }

        // Material texture parameters pick the coordinate set of existing slots.
        if let Some(material) = &self.drawable.material {
            for (name, parameter) in &material.parameters.textures {
                self.texture_bindings
                    .try_update_slot(name, parameter.default_texcoord_binding);
            }
        }
        Ok(())
    }

    /// Generator definition with bindings numbered per group.
    ///
    /// Unused buffers get no binding once the discovery pass marked them.
    fn make_generator(&mut self, base: &Generator) -> Generator {
        let mut generator = base.clone();
        generator.buffer_bindings.clear();

        let mut counters = [0u32; 2];
        for binding in &mut self.buffer_bindings {
            if binding.unused {
                continue;
            }
            let group = binding.bind_group.index();
            let slot = &mut counters[group as usize];
            generator.buffer_bindings.push(BufferBinding {
                name: binding.name.clone(),
                bind_group: group,
                binding: *slot,
                layout: binding.layout_builder.current_layout().clone(),
                address_space: binding.address_space(),
                dimension: binding.dimension,
            });
            *slot += 1;
        }

        let (texture_layout, _) = self
            .texture_bindings
            .current_layout(counters[BindGroupId::Draw.index() as usize]);
        generator.texture_binding_layout = texture_layout;
        generator.texture_bind_group = BindGroupId::Draw.index();
        generator
    }

    /// Strips fields nobody reads and applies offset alignment.
    fn optimize_buffers(&mut self, indexed: &IndexedBindings) -> Result<()> {
        for binding in &mut self.buffer_bindings {
            let accessed = match indexed.find_buffer(&binding.name) {
                Some(accessed) if !accessed.accessed_fields.is_empty() => accessed,
                _ => {
                    log::debug!("Buffer binding '{}' is unused", binding.name);
                    binding.unused = true;
                    continue;
                }
            };
            binding
                .layout_builder
                .optimize(|name, _| accessed.accessed_fields.contains_key(name));

            let address_space = binding.address_space();
            let alignment = if binding.has_dynamic_offset {
                match address_space {
                    AddressSpace::Uniform => self.limits.min_uniform_buffer_offset_alignment,
                    AddressSpace::Storage | AddressSpace::StorageRW => {
                        self.limits.min_storage_buffer_offset_alignment
                    }
                }
            } else if address_space == AddressSpace::Uniform {
                16
            } else {
                0
            };
            if alignment > 0 {
                binding.layout_builder.force_alignment_to(alignment as usize)?;
            }
        }
        Ok(())
    }

    fn verify_usage(&self, discovered: &IndexedBindings, final_pass: &IndexedBindings) -> Result<()> {
        for binding in self.buffer_bindings.iter().filter(|b| !b.unused) {
            let before = discovered.find_buffer(&binding.name).map(|b| &b.accessed_fields);
            let after = final_pass.find_buffer(&binding.name).map(|b| &b.accessed_fields);
            if before != after {
                return Err(GfxError::BindingUsageMismatch {
                    buffer: binding.name.clone(),
                });
            }
        }
        Ok(())
    }

    fn pipeline_buffer_bindings(&mut self, generator: &Generator) -> [Vec<PipelineBufferBinding>; 2] {
        let mut groups: [Vec<PipelineBufferBinding>; 2] = [Vec::new(), Vec::new()];
        for binding in &mut self.buffer_bindings {
            let assigned = generator
                .buffer_bindings
                .iter()
                .find(|b| b.name == binding.name)
                .map(|b| b.binding);
            groups[binding.bind_group.index() as usize].push(PipelineBufferBinding {
                name: binding.name.clone(),
                bind_group: binding.bind_group,
                binding: assigned,
                layout: binding.layout_builder.current_layout().clone(),
                address_space: binding.address_space(),
                dimension: binding.dimension,
                has_dynamic_offset: binding.has_dynamic_offset,
            });
        }
        groups
    }

    /// Runs both generator passes and creates every backend object.
    pub fn build(
        mut self,
        backend: &dyn GpuBackend,
        shaders: &mut ShaderManager,
        hash: Hash128,
    ) -> Result<CompiledPipeline> {
        log::debug!("Building pipeline {hash:032x} for step '{}'", self.step.label);

        let state = self.combined_state();
        self.declare_standard_bindings()?;
        self.declare_parameters()?;

        let mesh_format = self.drawable.mesh.format();
        let vertex_layout = vertex_buffer_layout(&mesh_format)?;

        let base = Generator {
            mesh_format: mesh_format.clone(),
            output_fields: self.step.render_target_layout.color_output_fields()?,
            dynamic_handlers: self.dynamic_handlers.clone(),
            ..Generator::default()
        };

        let features = self.features.clone();
        let extra_entry_points = std::mem::take(&mut self.extra_entry_points);
        let interpolate = EntryPoint::new(
            INTERPOLATE_ENTRY_POINT,
            ProgrammableGraphicsStage::Vertex,
            Block::default_interpolation(),
        );
        let entry_points: Vec<&EntryPoint> = features
            .iter()
            .flat_map(|f| &f.shader_entry_points)
            .chain(&extra_entry_points)
            .chain(std::iter::once(&interpolate))
            .collect();

        // Discovery pass
        let discovery = self.make_generator(&base);
        let discovered = discovery.index_bindings(&entry_points);
        self.optimize_buffers(&discovered)?;

        // Final pass
        let generator = self.make_generator(&base);
        self.verify_usage(&discovered, &generator.index_bindings(&entry_points))?;
        let output = generator.build(&entry_points);
        if !output.errors.is_empty() {
            output.dump_errors();
            return Err(GfxError::ShaderGeneration(output.errors));
        }

        let [draw_buffer_bindings, view_buffer_bindings] = self.pipeline_buffer_bindings(&generator);
        let texture_bindings = generator.texture_binding_layout.clone();

        let label = format!("{} {hash:032x}", self.step.label);
        let (shader_module, _) = shaders.get_or_compile(backend, &label, &output.wgsl_source)?;

        let draw_entries = layout_entries(&draw_buffer_bindings, Some(&texture_bindings));
        let view_entries = layout_entries(&view_buffer_bindings, None);
        let draw_layout = backend.create_bind_group_layout(&format!("{label} draw"), &draw_entries)?;
        let view_layout = match backend.create_bind_group_layout(&format!("{label} view"), &view_entries) {
            Ok(layout) => layout,
            Err(e) => {
                backend.destroy_bind_group_layout(draw_layout);
                return Err(e);
            }
        };
        let bind_group_layouts = vec![draw_layout, view_layout];
        let pipeline_layout = match backend.create_pipeline_layout(&label, &bind_group_layouts) {
            Ok(layout) => layout,
            Err(e) => {
                release_partial(backend, &bind_group_layouts, None);
                return Err(e);
            }
        };

        let layout = &self.step.render_target_layout;
        let write_mask = state.color_write.unwrap_or(wgpu::ColorWrites::ALL);
        let color_targets = layout
            .color_targets()
            .map(|target| {
                Some(wgpu::ColorTargetState {
                    format: target.format,
                    blend: state.blend,
                    write_mask,
                })
            })
            .collect();
        let depth_stencil = layout.depth_target().map(|target| wgpu::DepthStencilState {
            format: target.format,
            depth_write_enabled: Some(state.depth_write.unwrap_or(true)),
            depth_compare: Some(state.depth_compare.unwrap_or(wgpu::CompareFunction::Less)),
            stencil: wgpu::StencilState::default(),
            bias: wgpu::DepthBiasState::default(),
        });

        let (topology, strip_index_format) = match mesh_format.primitive_type {
            PrimitiveType::TriangleList => (wgpu::PrimitiveTopology::TriangleList, None),
            PrimitiveType::TriangleStrip => (
                wgpu::PrimitiveTopology::TriangleStrip,
                Some(mesh_format.index_format.to_wgpu()),
            ),
        };
        let front_face = match mesh_format.winding_order {
            WindingOrder::CW => wgpu::FrontFace::Cw,
            WindingOrder::CCW => wgpu::FrontFace::Ccw,
        };

        let desc = RenderPipelineDesc {
            label: label.clone(),
            layout: pipeline_layout,
            shader: shader_module,
            vertex_entry: "vertex_main".to_string(),
            fragment_entry: "fragment_main".to_string(),
            vertex_buffers: vec![vertex_layout],
            color_targets,
            primitive: wgpu::PrimitiveState {
                topology,
                strip_index_format,
                front_face,
                cull_mode: cull_mode(&state, self.step.flipped),
                ..Default::default()
            },
            depth_stencil,
            multisample: wgpu::MultisampleState::default(),
        };
        let pipeline = match backend.create_render_pipeline(&desc) {
            Ok(pipeline) => pipeline,
            Err(e) => {
                release_partial(backend, &bind_group_layouts, Some(pipeline_layout));
                return Err(e);
            }
        };

        let dynamic_buffer_refs = dynamic_refs(&draw_buffer_bindings, BindGroupId::Draw)
            .chain(dynamic_refs(&view_buffer_bindings, BindGroupId::View))
            .collect();

        Ok(CompiledPipeline {
            hash,
            pipeline,
            pipeline_layout,
            bind_group_layouts,
            shader_module,
            draw_buffer_bindings,
            view_buffer_bindings,
            texture_bindings,
            dynamic_buffer_refs,
            render_target_layout: layout.clone(),
            state,
            base_draw_parameters: self.base_draw_parameters,
            base_view_parameters: self.base_view_parameters,
            wgsl_source: output.wgsl_source,
        })
    }
}

/// `Back` by default, `Front` when the front face is flipped, swapped again
/// when the view renders flipped.
fn cull_mode(state: &FeaturePipelineState, flipped: bool) -> Option<wgpu::Face> {
    if state.culling == Some(false) {
        return None;
    }
    let flip = state.flip_front_face.unwrap_or(false) != flipped;
    Some(if flip { wgpu::Face::Front } else { wgpu::Face::Back })
}

fn layout_entries(
    buffers: &[PipelineBufferBinding],
    textures: Option<&TextureBindingLayout>,
) -> Vec<wgpu::BindGroupLayoutEntry> {
    let mut entries = Vec::new();
    for buffer in buffers {
        let Some(binding) = buffer.binding else {
            continue;
        };
        let visibility = match buffer.address_space {
            AddressSpace::StorageRW => wgpu::ShaderStages::FRAGMENT,
            AddressSpace::Uniform | AddressSpace::Storage => wgpu::ShaderStages::VERTEX_FRAGMENT,
        };
        entries.push(wgpu::BindGroupLayoutEntry {
            binding,
            visibility,
            ty: wgpu::BindingType::Buffer {
                ty: buffer.address_space.binding_type(),
                has_dynamic_offset: buffer.has_dynamic_offset,
                min_binding_size: None,
            },
            count: None,
        });
    }

    for texture in textures.iter().flat_map(|t| &t.bindings) {
        entries.push(wgpu::BindGroupLayoutEntry {
            binding: texture.binding,
            visibility: wgpu::ShaderStages::VERTEX_FRAGMENT,
            ty: wgpu::BindingType::Texture {
                sample_type: texture.ty.sample_type(),
                view_dimension: texture.ty.view_dimension(),
                multisampled: false,
            },
            count: None,
        });
        entries.push(wgpu::BindGroupLayoutEntry {
            binding: texture.default_sampler_binding,
            visibility: wgpu::ShaderStages::VERTEX_FRAGMENT,
            ty: wgpu::BindingType::Sampler(texture.ty.sampler_binding_type()),
            count: None,
        });
    }
    entries
}

fn dynamic_refs(
    bindings: &[PipelineBufferBinding],
    bind_group: BindGroupId,
) -> impl Iterator<Item = DynamicBufferRef> + '_ {
    bindings
        .iter()
        .enumerate()
        .filter(|(_, b)| b.has_dynamic_offset && !b.is_unused())
        .map(move |(index, _)| DynamicBufferRef { bind_group, index })
}

fn release_partial(
    backend: &dyn GpuBackend,
    bind_group_layouts: &[BindGroupLayoutHandle],
    pipeline_layout: Option<PipelineLayoutHandle>,
) {
    if let Some(layout) = pipeline_layout {
        backend.destroy_pipeline_layout(layout);
    }
    for layout in bind_group_layouts {
        backend.destroy_bind_group_layout(*layout);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_cull_mode() {
        let default = FeaturePipelineState::default();
        assert_eq!(cull_mode(&default, false), Some(wgpu::Face::Back));
        assert_eq!(cull_mode(&default, true), Some(wgpu::Face::Front));

        let flipped_face = FeaturePipelineState {
            flip_front_face: Some(true),
            ..Default::default()
        };
        assert_eq!(cull_mode(&flipped_face, false), Some(wgpu::Face::Front));
        assert_eq!(cull_mode(&flipped_face, true), Some(wgpu::Face::Back));

        let no_culling = FeaturePipelineState {
            culling: Some(false),
            ..Default::default()
        };
        assert_eq!(cull_mode(&no_culling, true), None);
    }

    #[test]
    fn test_combined_state_last_write_wins() {
        use crate::resources::{Mesh, RenderTargetLayout};

        let a = Arc::new(Feature::new("a").with_state(FeaturePipelineState {
            depth_write: Some(false),
            culling: Some(false),
            ..Default::default()
        }));
        let b = Arc::new(Feature::new("b").with_state(FeaturePipelineState {
            depth_write: Some(true),
            ..Default::default()
        }));
        let step = PipelineStep::new(
            "main",
            RenderTargetLayout::color_depth(wgpu::TextureFormat::Rgba8Unorm, None),
        )
        .with_feature(a);
        let drawable = Drawable::new(Arc::new(Mesh::new())).with_feature(b);
        let limits = wgpu::Limits::default();
        let builder = PipelineBuilder::new(&drawable, &step, &limits);

        let state = builder.combined_state();
        assert_eq!(state.depth_write, Some(true));
        assert_eq!(state.culling, Some(false));
        assert_eq!(builder.features().len(), 2);
    }
}
