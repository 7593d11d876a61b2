//! Pipeline Hash Tests
//!
//! Tests for:
//! - Determinism: structurally identical graphs produce identical keys
//! - Sensitivity: texcoord binding, feature identity and mesh format change the key
//! - Memoization: shared materials are traversed once per hash cache

use std::sync::Arc;

use kiln::core::{IdTag, UniqueId};
use kiln::renderer::pipeline::{
    Hash128, PipelineHashCache, PipelineHashCollector, PipelineHashStorage, pipeline_key,
};
use kiln::resources::{
    Drawable, Feature, Material, Mesh, MeshFormat, MeshVertexAttribute, NamedShaderParam,
    PipelineStep, RenderTargetLayout, StorageType, TextureParameter, Texture,
};

fn position_format() -> MeshFormat {
    MeshFormat {
        vertex_attributes: vec![MeshVertexAttribute::new("position", 3, StorageType::Float32)],
        ..Default::default()
    }
}

fn mesh(format: MeshFormat) -> Arc<Mesh> {
    Arc::new(Mesh::with_data(format, &[0.0f32; 9], &[0u16, 1, 2]))
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

fn key(drawable: &Drawable, step: &PipelineStep) -> Hash128 {
    pipeline_key(drawable, step, &mut PipelineHashCache::new())
}

fn textured_material(feature: &Arc<Feature>, texcoord: u8) -> Arc<Material> {
    let texture = Arc::new(Texture::solid_color("white", [255; 4]));
    Arc::new(
        Material::new("textured")
            .with_feature(Arc::clone(feature))
            .with_texture("baseColor", TextureParameter::new(texture).with_texcoord(texcoord)),
    )
}

// ============================================================================
// Determinism
// ============================================================================

#[test]
fn identical_graphs_hash_identically() {
    let feature = Arc::new(Feature::new("lit").with_param(NamedShaderParam::new("roughness", 0.5f32)));
    let step = step();

    let a = Drawable::new(mesh(position_format())).with_material(textured_material(&feature, 0));
    let b = Drawable::new(mesh(position_format())).with_material(textured_material(&feature, 0));

    assert_eq!(key(&a, &step), key(&b, &step));
}

#[test]
fn memoized_key_matches_fresh_key() {
    let feature = Arc::new(Feature::new("lit"));
    let step = step();
    let drawable = Drawable::new(mesh(position_format())).with_material(textured_material(&feature, 0));

    let mut cache = PipelineHashCache::new();
    let first = pipeline_key(&drawable, &step, &mut cache);
    let second = pipeline_key(&drawable, &step, &mut cache);

    assert_eq!(first, second);
    assert_eq!(first, key(&drawable, &step));
}

#[test]
fn parameter_values_do_not_affect_key() {
    let feature = Arc::new(Feature::new("lit"));
    let step = step();
    let material = |value: f32| Arc::new(Material::new("m").with_feature(Arc::clone(&feature)).with_param("tint", value));

    let a = Drawable::new(mesh(position_format())).with_material(material(0.0));
    let b = Drawable::new(mesh(position_format())).with_material(material(1.0));

    assert_eq!(key(&a, &step), key(&b, &step));
}

// ============================================================================
// Sensitivity
// ============================================================================

#[test]
fn texcoord_binding_changes_key() {
    let feature = Arc::new(Feature::new("lit"));
    let step = step();

    let a = Drawable::new(mesh(position_format())).with_material(textured_material(&feature, 0));
    let b = Drawable::new(mesh(position_format())).with_material(textured_material(&feature, 1));

    assert_ne!(key(&a, &step), key(&b, &step));
}

#[test]
fn feature_identity_changes_key() {
    let step = step();
    let first = Arc::new(Feature::new("lit"));
    let second = Arc::new(Feature::new("lit"));

    let a = Drawable::new(mesh(position_format())).with_feature(first);
    let b = Drawable::new(mesh(position_format())).with_feature(second);

    assert_ne!(key(&a, &step), key(&b, &step));
}

#[test]
fn mesh_format_changes_key() {
    let step = step();
    let mut with_uv = position_format();
    with_uv
        .vertex_attributes
        .push(MeshVertexAttribute::new("texCoord0", 2, StorageType::Float32));

    let a = Drawable::new(mesh(position_format()));
    let b = Drawable::new(mesh(with_uv));

    assert_ne!(key(&a, &step), key(&b, &step));
}

#[test]
fn step_flip_changes_key() {
    let drawable = Drawable::new(mesh(position_format()));
    let normal = step();
    let flipped = step().flipped(true);

    assert_ne!(key(&drawable, &normal), key(&drawable, &flipped));
}

// ============================================================================
// Memoization
// ============================================================================

/// Counts memoized material hashes on top of a regular cache.
#[derive(Default)]
struct CountingStorage {
    inner: PipelineHashCache,
    material_hashes: usize,
}

impl PipelineHashStorage for CountingStorage {
    fn get_hash(&self, id: UniqueId) -> Option<Hash128> {
        self.inner.get_hash(id)
    }

    fn add_hash(&mut self, id: UniqueId, hash: Hash128) {
        if id.tag() == Some(IdTag::Material) {
            self.material_hashes += 1;
        }
        self.inner.add_hash(id, hash);
    }
}

#[test]
fn shared_material_is_traversed_once() {
    let feature = Arc::new(Feature::new("lit"));
    let material = textured_material(&feature, 0);
    let a = Drawable::new(mesh(position_format())).with_material(Arc::clone(&material));
    let b = Drawable::new(mesh(position_format())).with_material(material);

    let mut storage = CountingStorage::default();
    let mut collector = PipelineHashCollector::with_storage(&mut storage);
    collector.hash_reference(&a);
    collector.hash_reference(&b);
    drop(collector);

    assert_eq!(storage.material_hashes, 1);
}

#[test]
fn owners_of_shared_material_get_same_key() {
    let feature = Arc::new(Feature::new("lit"));
    let material = textured_material(&feature, 0);
    let step = step();
    let a = Drawable::new(mesh(position_format())).with_material(Arc::clone(&material));
    let b = Drawable::new(mesh(position_format())).with_material(material);

    let mut cache = PipelineHashCache::new();
    assert_eq!(
        pipeline_key(&a, &step, &mut cache),
        pipeline_key(&b, &step, &mut cache)
    );
}

#[test]
fn stale_hash_until_invalidated() {
    let feature = Arc::new(Feature::new("lit"));
    let step = step();
    let mesh = mesh(position_format());
    let mut material = Arc::new(Material::new("m").with_feature(feature));
    let mut cache = PipelineHashCache::new();

    let before = pipeline_key(
        &Drawable::new(Arc::clone(&mesh)).with_material(Arc::clone(&material)),
        &step,
        &mut cache,
    );

    Arc::get_mut(&mut material)
        .unwrap()
        .parameters
        .set_texture("baseColor", TextureParameter::default().with_texcoord(1));
    let drawable = Drawable::new(mesh).with_material(Arc::clone(&material));

    assert_eq!(pipeline_key(&drawable, &step, &mut cache), before);
    assert!(cache.invalidate(material.id()));
    assert_ne!(pipeline_key(&drawable, &step, &mut cache), before);
}
