//! Pipeline Builder Tests
//!
//! Tests for:
//! - End-to-end build: generated globals, stripped buffer fields, offset alignment
//! - Pipeline cache hits and shader module sharing
//! - Texture slots and bind group layouts
//! - Mesh format changes selecting a new pipeline
//! - Pipeline modifiers adding bindings and dynamic field handlers
//! - Failure paths: generator errors, backend faults and unstable binding usage cache nothing
//! - Device loss clearing compiled pipelines, with or without a frame in between

use std::sync::Arc;

use glam::Vec4;
use kiln::errors::GfxError;
use kiln::renderer::backend::{HeadlessBackend, HeadlessFaults, HeadlessInstance, OffscreenOutput};
use kiln::renderer::pipeline::{BuilderBufferBinding, PipelineBuilder};
use kiln::renderer::{Renderer, RendererSettings};
use kiln::resources::{
    BindGroupId, Drawable, Feature, FeaturePipelineState, Material, Mesh, MeshFormat,
    MeshVertexAttribute, NamedShaderParam, NamedTextureParam, ParamValue, PipelineModifier,
    PipelineStep, RenderTargetLayout, StorageType, Texture, TextureParameter,
};
use kiln::shader::{
    AddressSpace, Block, Dimension, DynamicField, DynamicFieldHandler, EntryPoint, FieldType,
    GeneratorContext, NumType, ProgrammableGraphicsStage,
};

// ============================================================================
// Helpers
// ============================================================================

fn setup() -> (Renderer, HeadlessInstance) {
    let _ = env_logger::builder().is_test(true).try_init();
    let instance = HeadlessInstance::new();
    let mut renderer = Renderer::new(
        Arc::new(instance.clone()),
        Box::new(OffscreenOutput::new(wgpu::TextureFormat::Rgba8UnormSrgb, 64, 64)),
        RendererSettings::default(),
    );
    renderer.request_device();
    (renderer, instance)
}

fn backend(instance: &HeadlessInstance) -> Arc<HeadlessBackend> {
    instance.last_backend().expect("device was requested")
}

fn mesh_with(attributes: Vec<MeshVertexAttribute>) -> Arc<Mesh> {
    let format = MeshFormat {
        vertex_attributes: attributes,
        ..Default::default()
    };
    Arc::new(Mesh::with_data(format, &[0.0f32; 15], &[0u16, 1, 2]).with_label("test"))
}

fn position_mesh() -> Arc<Mesh> {
    mesh_with(vec![MeshVertexAttribute::new("position", 3, StorageType::Float32)])
}

fn step() -> PipelineStep {
    PipelineStep::new(
        "opaque",
        RenderTargetLayout::color_depth(
            wgpu::TextureFormat::Rgba8UnormSrgb,
            Some(wgpu::TextureFormat::Depth32Float),
        ),
    )
}

/// World and view-projection transform writing a `worldPosition` global.
fn transform_feature() -> Arc<Feature> {
    let code = Block::compound([
        Block::write_global(
            "worldPosition",
            NumType::FLOAT4,
            Block::compound([
                Block::read_object("world", NumType::FLOAT4X4),
                Block::direct(" * vec4<f32>("),
                Block::read_input("position"),
                Block::direct(", 1.0)"),
            ]),
        ),
        Block::write_output(
            "position",
            NumType::FLOAT4,
            Block::compound([
                Block::read_buffer("proj", NumType::FLOAT4X4, "view"),
                Block::direct(" * "),
                Block::read_buffer("view", NumType::FLOAT4X4, "view"),
                Block::direct(" * "),
                Block::read_global("worldPosition"),
            ]),
        ),
    ]);
    Arc::new(Feature::new("transform").with_entry_point(EntryPoint::new(
        "transform",
        ProgrammableGraphicsStage::Vertex,
        code,
    )))
}

/// Writes the `tint` parameter to the color target. Also declares an unused `gloss`.
fn tint_feature() -> Arc<Feature> {
    Arc::new(
        Feature::new("tint")
            .with_param(NamedShaderParam::new("tint", Vec4::ONE))
            .with_param(NamedShaderParam::new("gloss", 0.25f32))
            .with_entry_point(EntryPoint::new(
                "tint",
                ProgrammableGraphicsStage::Fragment,
                Block::write_output("color", NumType::FLOAT4, Block::read_object("tint", NumType::FLOAT4)),
            )),
    )
}

fn constant_color_feature() -> Arc<Feature> {
    Arc::new(Feature::new("constant").with_entry_point(EntryPoint::new(
        "constant",
        ProgrammableGraphicsStage::Fragment,
        Block::write_output("color", NumType::FLOAT4, Block::direct("vec4<f32>(1.0)")),
    )))
}

fn lit_step() -> PipelineStep {
    step().with_feature(transform_feature())
}

// ============================================================================
// End To End
// ============================================================================

#[test]
fn world_position_global_is_declared_once() {
    let (mut renderer, _instance) = setup();
    let step = lit_step();
    let drawable = Drawable::new(position_mesh()).with_feature(tint_feature());

    let pipeline = renderer.build_or_get_pipeline(&drawable, &step).unwrap();

    let source = &pipeline.wgsl_source;
    assert!(
        source.contains("struct Vertex_globals_t {\n\tworldPosition: vec4<f32>,\n};"),
        "{source}"
    );
    assert_eq!(source.matches("worldPosition: ").count(), 1);
}

#[test]
fn fragment_reads_interpolated_world_position() {
    let (mut renderer, instance) = setup();
    let vertex = Block::compound([
        Block::write_global(
            "worldPosition",
            NumType::FLOAT4,
            Block::compound([
                Block::read_object("world", NumType::FLOAT4X4),
                Block::direct(" * vec4<f32>("),
                Block::read_input("position"),
                Block::direct(", 1.0)"),
            ]),
        ),
        Block::write_output("worldPosition", NumType::FLOAT4, Block::read_global("worldPosition")),
        Block::write_output("position", NumType::FLOAT4, Block::read_global("worldPosition")),
    ]);
    let feature = Arc::new(
        Feature::new("world position")
            .with_entry_point(EntryPoint::new("world", ProgrammableGraphicsStage::Vertex, vertex))
            .with_entry_point(EntryPoint::new(
                "shade",
                ProgrammableGraphicsStage::Fragment,
                Block::write_output("color", NumType::FLOAT4, Block::read_input("worldPosition")),
            )),
    );
    let step = step();
    let drawable = Drawable::new(position_mesh()).with_feature(Arc::clone(&feature));

    let first = renderer.build_or_get_pipeline(&drawable, &step).unwrap();
    assert!(
        first
            .wgsl_source
            .contains("struct Vertex_globals_t {\n\tworldPosition: vec4<f32>,\n};")
    );

    let resubmitted = Drawable::new(position_mesh()).with_feature(feature);
    let second = renderer.build_or_get_pipeline(&resubmitted, &step).unwrap();
    assert!(Arc::ptr_eq(&first, &second));
    assert_eq!(backend(&instance).stats().render_pipelines, 1);
}

#[test]
fn unread_fields_are_stripped() {
    let (mut renderer, _instance) = setup();
    let step = lit_step();
    let drawable = Drawable::new(position_mesh()).with_feature(tint_feature());

    let pipeline = renderer.build_or_get_pipeline(&drawable, &step).unwrap();

    let object = pipeline.find_draw_buffer_binding("object").unwrap();
    let fields = &object.layout.field_names;
    assert!(fields.iter().any(|f| f == "world"));
    assert!(fields.iter().any(|f| f == "tint"));
    assert!(!fields.iter().any(|f| f == "invWorld" || f == "gloss"));

    let view = pipeline.find_view_buffer_binding("view").unwrap();
    let fields = &view.layout.field_names;
    assert!(fields.iter().any(|f| f == "view"));
    assert!(fields.iter().any(|f| f == "proj"));
    assert!(!fields.iter().any(|f| f == "invView" || f == "viewport"));

    // Defaults are kept even for stripped fields.
    assert_eq!(
        pipeline.base_draw_parameters.get_param("tint"),
        Some(&ParamValue::from(Vec4::ONE))
    );
    assert!(pipeline.base_draw_parameters.get_param("gloss").is_some());
}

#[test]
fn dynamic_offset_buffers_are_aligned() {
    let (mut renderer, _instance) = setup();
    let limits = wgpu::Limits::default();
    let step = lit_step();
    let drawable = Drawable::new(position_mesh()).with_feature(tint_feature());

    let pipeline = renderer.build_or_get_pipeline(&drawable, &step).unwrap();

    let object = pipeline.find_draw_buffer_binding("object").unwrap();
    let view = pipeline.find_view_buffer_binding("view").unwrap();
    assert!(object.has_dynamic_offset && view.has_dynamic_offset);
    assert_eq!(
        object.layout.array_stride() % limits.min_storage_buffer_offset_alignment as usize,
        0
    );
    assert_eq!(
        view.layout.array_stride() % limits.min_uniform_buffer_offset_alignment as usize,
        0
    );
    assert_eq!(pipeline.dynamic_buffer_refs.len(), 2);
    for reference in &pipeline.dynamic_buffer_refs {
        assert!(pipeline.resolve_dynamic_ref(*reference).is_some());
    }
}

#[test]
fn unread_buffer_gets_no_binding() {
    let (mut renderer, instance) = setup();
    let step = step();
    let position_only = Arc::new(Feature::new("object only").with_entry_point(EntryPoint::new(
        "position",
        ProgrammableGraphicsStage::Vertex,
        Block::write_output(
            "position",
            NumType::FLOAT4,
            Block::compound([
                Block::read_object("world", NumType::FLOAT4X4),
                Block::direct(" * vec4<f32>("),
                Block::read_input("position"),
                Block::direct(", 1.0)"),
            ]),
        ),
    )));
    let drawable = Drawable::new(position_mesh())
        .with_feature(position_only)
        .with_feature(constant_color_feature());

    let pipeline = renderer.build_or_get_pipeline(&drawable, &step).unwrap();

    assert!(pipeline.find_view_buffer_binding("view").unwrap().is_unused());
    assert_eq!(pipeline.find_draw_buffer_binding("object").unwrap().binding, Some(0));
    assert_eq!(pipeline.dynamic_buffer_refs.len(), 1);

    let backend = backend(&instance);
    let view_entries = backend
        .bind_group_layout_entries(pipeline.bind_group_layouts[BindGroupId::View.index() as usize])
        .unwrap();
    assert!(view_entries.is_empty());
}

// ============================================================================
// Caching
// ============================================================================

#[test]
fn resubmission_is_a_cache_hit() {
    let (mut renderer, instance) = setup();
    let step = lit_step();
    let drawable = Drawable::new(position_mesh()).with_feature(tint_feature());

    let first = renderer.build_or_get_pipeline(&drawable, &step).unwrap();
    let second = renderer.build_or_get_pipeline(&drawable, &step).unwrap();

    assert!(Arc::ptr_eq(&first, &second));
    assert_eq!(renderer.pipeline_cache().len(), 1);
    let stats = backend(&instance).stats();
    assert_eq!(stats.render_pipelines, 1);
    assert_eq!(stats.shader_modules, 1);
}

#[test]
fn structurally_equal_drawables_share_pipeline() {
    let (mut renderer, _instance) = setup();
    let step = lit_step();
    let tint = tint_feature();
    let a = Drawable::new(position_mesh()).with_feature(Arc::clone(&tint));
    let b = Drawable::new(position_mesh()).with_feature(tint);

    let first = renderer.build_or_get_pipeline(&a, &step).unwrap();
    let second = renderer.build_or_get_pipeline(&b, &step).unwrap();
    assert!(Arc::ptr_eq(&first, &second));
}

#[test]
fn state_only_difference_shares_shader_module() {
    let (mut renderer, instance) = setup();
    let step = lit_step();
    let tint = tint_feature();
    let blended = Arc::new(Feature::new("blend").with_state(FeaturePipelineState {
        blend: Some(wgpu::BlendState::ALPHA_BLENDING),
        depth_write: Some(false),
        ..Default::default()
    }));

    let opaque = Drawable::new(position_mesh()).with_feature(Arc::clone(&tint));
    let transparent = Drawable::new(position_mesh()).with_feature(tint).with_feature(blended);

    let a = renderer.build_or_get_pipeline(&opaque, &step).unwrap();
    let b = renderer.build_or_get_pipeline(&transparent, &step).unwrap();

    assert_ne!(a.hash, b.hash);
    assert_eq!(a.shader_module, b.shader_module);
    let backend = backend(&instance);
    assert_eq!(backend.stats().shader_modules, 1);
    assert_eq!(backend.stats().render_pipelines, 2);

    let desc = backend.render_pipeline_desc(b.pipeline).unwrap();
    let target = desc.color_targets[0].as_ref().unwrap();
    assert_eq!(target.blend, Some(wgpu::BlendState::ALPHA_BLENDING));
    assert!(!desc.depth_stencil.as_ref().unwrap().depth_write_enabled);
}

#[test]
fn mesh_format_change_rebuilds_pipeline() {
    let (mut renderer, instance) = setup();
    let step = lit_step();
    let mesh = position_mesh();
    let drawable = Drawable::new(Arc::clone(&mesh)).with_feature(tint_feature());

    let before = renderer.build_or_get_pipeline(&drawable, &step).unwrap();
    assert!(!before.wgsl_source.contains("texCoord0"));

    let format = MeshFormat {
        vertex_attributes: vec![
            MeshVertexAttribute::new("position", 3, StorageType::Float32),
            MeshVertexAttribute::new("texCoord0", 2, StorageType::Float32),
        ],
        ..Default::default()
    };
    mesh.update(format, &[0.0f32; 15], &[0u16, 1, 2]);

    // No invalidation needed, the mesh format is hashed on every lookup.
    let after = renderer.build_or_get_pipeline(&drawable, &step).unwrap();
    assert!(!Arc::ptr_eq(&before, &after));
    assert!(
        after
            .wgsl_source
            .contains("p_Vertex_output.texCoord0 = p_Vertex_input.texCoord0;"),
        "{}",
        after.wgsl_source
    );
    assert_eq!(renderer.pipeline_cache().len(), 2);
    assert_eq!(backend(&instance).stats().render_pipelines, 2);
}

// ============================================================================
// Fixed Function State
// ============================================================================

#[test]
fn flipped_step_swaps_culled_face() {
    let (mut renderer, instance) = setup();
    let drawable = Drawable::new(position_mesh()).with_feature(tint_feature());
    let normal = lit_step();
    let flipped = lit_step().flipped(true);

    let a = renderer.build_or_get_pipeline(&drawable, &normal).unwrap();
    let b = renderer.build_or_get_pipeline(&drawable, &flipped).unwrap();

    let backend = backend(&instance);
    let a = backend.render_pipeline_desc(a.pipeline).unwrap();
    let b = backend.render_pipeline_desc(b.pipeline).unwrap();
    assert_eq!(a.primitive.cull_mode, Some(wgpu::Face::Back));
    assert_eq!(b.primitive.cull_mode, Some(wgpu::Face::Front));
    assert_eq!(a.primitive.topology, wgpu::PrimitiveTopology::TriangleList);
    assert_eq!(
        a.depth_stencil.as_ref().unwrap().depth_compare,
        wgpu::CompareFunction::Less
    );
}

// ============================================================================
// Textures
// ============================================================================

#[test]
fn texture_slot_follows_draw_buffers() {
    let (mut renderer, instance) = setup();
    let step = lit_step();
    let textured = Arc::new(
        Feature::new("textured")
            .with_texture(NamedTextureParam::new("baseColor"))
            .with_entry_point(EntryPoint::new(
                "albedo",
                ProgrammableGraphicsStage::Fragment,
                Block::write_output("color", NumType::FLOAT4, Block::sample_texture("baseColor")),
            )),
    );
    let material = Arc::new(Material::new("textured").with_feature(textured).with_texture(
        "baseColor",
        TextureParameter::new(Arc::new(Texture::solid_color("white", [255; 4]))).with_texcoord(0),
    ));
    let mesh = mesh_with(vec![
        MeshVertexAttribute::new("position", 3, StorageType::Float32),
        MeshVertexAttribute::new("texCoord0", 2, StorageType::Float32),
    ]);
    let drawable = Drawable::new(mesh).with_material(material);

    let pipeline = renderer.build_or_get_pipeline(&drawable, &step).unwrap();

    let slot = pipeline.texture_bindings.find("baseColor").unwrap();
    assert_eq!(slot.binding, 1);
    assert_eq!(slot.default_sampler_binding, 2);

    let entries = backend(&instance)
        .bind_group_layout_entries(pipeline.bind_group_layouts[BindGroupId::Draw.index() as usize])
        .unwrap();
    assert_eq!(entries.len(), 3);
    assert!(matches!(entries[1].ty, wgpu::BindingType::Texture { .. }));
    assert!(matches!(entries[2].ty, wgpu::BindingType::Sampler(_)));
}

// ============================================================================
// Modifiers
// ============================================================================

struct FogModifier;

impl PipelineModifier for FogModifier {
    fn build_pipeline(&self, builder: &mut PipelineBuilder<'_>) {
        builder
            .add_buffer_binding(BuilderBufferBinding::new(
                "fog",
                BindGroupId::Draw,
                AddressSpace::Uniform,
                Dimension::One,
            ))
            .layout_builder
            .push("density", NumType::FLOAT)
            .unwrap();
        builder.add_entry_point(EntryPoint::new(
            "fog",
            ProgrammableGraphicsStage::Fragment,
            Block::write_output(
                "color",
                NumType::FLOAT4,
                Block::compound([
                    Block::direct("vec4<f32>("),
                    Block::read_buffer("density", NumType::FLOAT, "fog"),
                    Block::direct(")"),
                ]),
            ),
        ));
    }
}

#[test]
fn modifier_adds_buffer_binding() {
    let (mut renderer, _instance) = setup();
    let step = lit_step();
    let fog = Arc::new(Feature::new("fog").with_modifier(Arc::new(FogModifier)));
    let drawable = Drawable::new(position_mesh()).with_feature(fog);

    let pipeline = renderer.build_or_get_pipeline(&drawable, &step).unwrap();

    let fog = pipeline.find_draw_buffer_binding("fog").unwrap();
    assert_eq!(fog.binding, Some(1));
    assert!(!fog.has_dynamic_offset);
    assert_eq!(fog.layout.array_stride() % 16, 0);
    assert!(pipeline.wgsl_source.contains("density"));
}

/// Maps the fragment input `sampleIndex` to the sample index builtin.
struct SampleIndexInput;

impl DynamicFieldHandler for SampleIndexInput {
    fn create_input(&self, stage: ProgrammableGraphicsStage, name: &str) -> Option<DynamicField> {
        (stage == ProgrammableGraphicsStage::Fragment && name == "sampleIndex")
            .then(|| DynamicField::builtin(NumType::UINT32, "sample_index"))
    }
}

struct SampleIndexModifier;

impl PipelineModifier for SampleIndexModifier {
    fn build_pipeline(&self, builder: &mut PipelineBuilder<'_>) {
        builder.add_dynamic_handler(Arc::new(SampleIndexInput));
    }
}

fn sample_index_feature() -> Feature {
    Feature::new("sample shade").with_entry_point(EntryPoint::new(
        "shade",
        ProgrammableGraphicsStage::Fragment,
        Block::write_output(
            "color",
            NumType::FLOAT4,
            Block::compound([
                Block::direct("vec4<f32>(f32("),
                Block::read_input("sampleIndex"),
                Block::direct("))"),
            ]),
        ),
    ))
}

#[test]
fn modifier_registers_dynamic_field_handler() {
    let (mut renderer, _instance) = setup();
    let step = lit_step();

    let unhandled = Drawable::new(position_mesh()).with_feature(Arc::new(sample_index_feature()));
    assert!(matches!(
        renderer.build_or_get_pipeline(&unhandled, &step),
        Err(GfxError::ShaderGeneration(_))
    ));

    let handled = Arc::new(sample_index_feature().with_modifier(Arc::new(SampleIndexModifier)));
    let drawable = Drawable::new(position_mesh()).with_feature(handled);
    let pipeline = renderer.build_or_get_pipeline(&drawable, &step).unwrap();

    let source = &pipeline.wgsl_source;
    assert!(source.contains("@builtin(sample_index) sampleIndex: u32,"), "{source}");
    assert!(source.contains("p_Fragment_input.sampleIndex"), "{source}");
}

// ============================================================================
// Failures
// ============================================================================

#[test]
fn generator_error_is_not_cached() {
    let (mut renderer, instance) = setup();
    let step = lit_step();
    let broken = Arc::new(Feature::new("broken").with_entry_point(EntryPoint::new(
        "normal",
        ProgrammableGraphicsStage::Fragment,
        Block::write_output("color", NumType::FLOAT4, Block::read_input("normal")),
    )));
    let drawable = Drawable::new(position_mesh()).with_feature(broken);

    for _ in 0..2 {
        let result = renderer.build_or_get_pipeline(&drawable, &step);
        assert!(matches!(result, Err(GfxError::ShaderGeneration(ref errors)) if !errors.is_empty()));
    }
    assert!(renderer.pipeline_cache().is_empty());
    assert_eq!(backend(&instance).stats().shader_modules, 0);
}

#[test]
fn backend_failure_releases_partial_objects() {
    let (mut renderer, instance) = setup();
    let step = lit_step();
    let drawable = Drawable::new(position_mesh()).with_feature(tint_feature());
    let backend = backend(&instance);

    backend.set_faults(HeadlessFaults::RENDER_PIPELINE);
    assert!(renderer.build_or_get_pipeline(&drawable, &step).is_err());
    assert!(renderer.pipeline_cache().is_empty());
    // Only the cached shader module survives.
    assert_eq!(backend.live_objects(), 1);

    backend.set_faults(HeadlessFaults::empty());
    assert!(renderer.build_or_get_pipeline(&drawable, &step).is_ok());
    assert_eq!(backend.stats().shader_modules, 1);
}

#[test]
fn unsupported_vertex_format_fails_build() {
    let (mut renderer, _instance) = setup();
    let step = lit_step();
    let mesh = mesh_with(vec![
        MeshVertexAttribute::new("position", 3, StorageType::Float32),
        MeshVertexAttribute::new("color", 3, StorageType::UNorm8),
    ]);
    let drawable = Drawable::new(mesh).with_feature(tint_feature());

    assert!(matches!(
        renderer.build_or_get_pipeline(&drawable, &step),
        Err(GfxError::UnsupportedVertexFormat { .. })
    ));
}

#[test]
fn layout_dependent_block_is_a_usage_mismatch() {
    let (mut renderer, instance) = setup();
    let step = step();
    // Reads `world` while `invWorld` is declared, and `invWorld` once it was stripped.
    let unstable = Block::custom(|ctx: &mut dyn GeneratorContext| {
        let stripped = ctx
            .definitions()
            .buffers
            .get("object")
            .is_some_and(|object| object.find_field("invWorld").is_none());
        let field = if stripped { "invWorld" } else { "world" };
        ctx.read_buffer(field, FieldType::Num(NumType::FLOAT4X4), "object", None);
    });
    let feature = Arc::new(Feature::new("unstable").with_entry_point(EntryPoint::new(
        "position",
        ProgrammableGraphicsStage::Vertex,
        Block::write_output(
            "position",
            NumType::FLOAT4,
            Block::compound([unstable, Block::direct(" * vec4<f32>(0.0, 0.0, 0.0, 1.0)")]),
        ),
    )));
    let drawable = Drawable::new(position_mesh())
        .with_feature(feature)
        .with_feature(constant_color_feature());

    let result = renderer.build_or_get_pipeline(&drawable, &step);
    assert!(
        matches!(result, Err(GfxError::BindingUsageMismatch { ref buffer }) if buffer == "object"),
        "{result:?}"
    );
    assert!(renderer.pipeline_cache().is_empty());
    assert_eq!(backend(&instance).stats().shader_modules, 0);
}

// ============================================================================
// Device Loss
// ============================================================================

#[test]
fn device_loss_clears_pipelines() {
    let (mut renderer, instance) = setup();
    let step = lit_step();
    let drawable = Drawable::new(position_mesh()).with_feature(tint_feature());

    renderer.build_or_get_pipeline(&drawable, &step).unwrap();
    backend(&instance).lose_device();
    assert!(renderer.begin_frame());

    assert!(renderer.pipeline_cache().is_empty());
    assert_eq!(renderer.shader_manager().module_count(), 0);

    renderer.build_or_get_pipeline(&drawable, &step).unwrap();
    assert_eq!(instance.created_backends().len(), 2);
    assert_eq!(backend(&instance).stats().render_pipelines, 1);
}

#[test]
fn device_loss_between_frames_clears_pipelines() {
    let (mut renderer, instance) = setup();
    let step = lit_step();
    let drawable = Drawable::new(position_mesh()).with_feature(tint_feature());

    renderer.build_or_get_pipeline(&drawable, &step).unwrap();
    backend(&instance).lose_device();

    // No frame started, the loss is noticed by the build itself.
    assert!(matches!(
        renderer.build_or_get_pipeline(&drawable, &step),
        Err(GfxError::ContextNotReady("incomplete"))
    ));
    assert!(renderer.pipeline_cache().is_empty());
    assert_eq!(renderer.shader_manager().module_count(), 0);

    assert!(renderer.begin_frame());
    renderer.build_or_get_pipeline(&drawable, &step).unwrap();
    assert_eq!(instance.created_backends().len(), 2);
    assert_eq!(renderer.pipeline_cache().len(), 1);
}
