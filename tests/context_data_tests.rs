//! Versioned Resource Cache Tests
//!
//! Tests for:
//! - Upload on first use, at most one sync per frame
//! - Frame-based eviction boundaries
//! - Registry sweep of dropped entities
//! - Re-creation after device loss

use std::sync::Arc;

use kiln::errors::GfxError;
use kiln::renderer::backend::{HeadlessBackend, HeadlessInstance, OffscreenOutput};
use kiln::renderer::{Renderer, RendererSettings};
use kiln::resources::{Buffer, Mesh, MeshFormat, MeshVertexAttribute, StorageType, Texture};

fn renderer(instance: &HeadlessInstance) -> Renderer {
    let mut renderer = Renderer::new(
        Arc::new(instance.clone()),
        Box::new(OffscreenOutput::new(wgpu::TextureFormat::Rgba8Unorm, 16, 16)),
        RendererSettings::default(),
    );
    renderer.request_device();
    renderer
}

fn backend(instance: &HeadlessInstance) -> Arc<HeadlessBackend> {
    instance.last_backend().expect("device was requested")
}

fn triangle() -> Arc<Mesh> {
    let format = MeshFormat {
        vertex_attributes: vec![MeshVertexAttribute::new("position", 3, StorageType::Float32)],
        ..Default::default()
    };
    Arc::new(Mesh::with_data(format, &[0.0f32; 9], &[0u16, 1, 2]))
}

// ============================================================================
// Sync
// ============================================================================

#[test]
fn mesh_uploads_on_first_use() {
    let instance = HeadlessInstance::new();
    let mut renderer = renderer(&instance);
    let mesh = triangle();

    let entry = renderer.get_or_update(mesh.as_ref(), 1).unwrap();
    assert_eq!(entry.data.num_vertices, 3);
    assert_eq!(entry.data.num_indices, 3);
    let vertex_buffer = entry.data.vertex_buffer.unwrap();

    let backend = backend(&instance);
    assert_eq!(backend.stats().buffers, 2);
    assert_eq!(backend.buffer_data(vertex_buffer).unwrap(), vec![0u8; 36]);
}

#[test]
fn at_most_one_sync_per_frame() {
    let instance = HeadlessInstance::new();
    let mut renderer = renderer(&instance);
    let mesh = triangle();
    let backend = backend(&instance);

    renderer.get_or_update(mesh.as_ref(), 1).unwrap();
    let writes = backend.stats().buffer_writes;

    mesh.update_vertices(&[1.0f32; 9]);
    renderer.get_or_update(mesh.as_ref(), 1).unwrap();
    assert_eq!(backend.stats().buffer_writes, writes);

    let entry = renderer.get_or_update(mesh.as_ref(), 2).unwrap();
    assert_eq!(entry.version, mesh.version());
    assert!(backend.stats().buffer_writes > writes);

    // Unchanged content is not re-uploaded.
    let writes = backend.stats().buffer_writes;
    renderer.get_or_update(mesh.as_ref(), 3).unwrap();
    assert_eq!(backend.stats().buffer_writes, writes);
}

#[test]
fn texture_recreated_on_resize() {
    let instance = HeadlessInstance::new();
    let mut renderer = renderer(&instance);
    let texture = Arc::new(Texture::solid_color("white", [255; 4]));
    let backend = backend(&instance);
    // The offscreen output is not acquired yet.
    assert_eq!(backend.stats().textures, 0);

    let entry = renderer.get_or_update(texture.as_ref(), 1).unwrap();
    assert!(entry.data.texture.is_some());
    assert_eq!(backend.stats().textures, 1);
    assert_eq!(backend.stats().texture_writes, 1);

    texture.resize(4, 4);
    let entry = renderer.get_or_update(texture.as_ref(), 2).unwrap();
    assert_eq!(entry.data.desc.unwrap().width, 4);
    assert_eq!(backend.stats().textures, 2);
    assert_eq!(backend.stats().destroyed, 1);
}

#[test]
fn buffer_contents_follow_updates() {
    let instance = HeadlessInstance::new();
    let mut renderer = renderer(&instance);
    let buffer = Arc::new(Buffer::new(&[1u32, 2, 3, 4], wgpu::BufferUsages::UNIFORM, Some("params")));

    let handle = renderer.get_or_update(buffer.as_ref(), 1).unwrap().data.buffer.unwrap();
    buffer.update(&[5u32, 6, 7, 8]);
    renderer.get_or_update(buffer.as_ref(), 2).unwrap();

    let contents = backend(&instance).buffer_data(handle).unwrap();
    assert_eq!(contents, bytemuck::cast_slice::<u32, u8>(&[5, 6, 7, 8]).to_vec());
}

#[test]
fn requires_ready_device() {
    let mut renderer = Renderer::new(
        Arc::new(HeadlessInstance::new()),
        Box::new(OffscreenOutput::new(wgpu::TextureFormat::Rgba8Unorm, 16, 16)),
        RendererSettings::default(),
    );
    let mesh = triangle();
    assert!(matches!(
        renderer.get_or_update(mesh.as_ref(), 1),
        Err(GfxError::ContextNotReady("uninitialized"))
    ));
}

// ============================================================================
// Eviction
// ============================================================================

#[test]
fn eviction_boundary() {
    let instance = HeadlessInstance::new();
    let mut renderer = renderer(&instance);
    let mesh = triangle();
    let backend = backend(&instance);

    renderer.get_or_update(mesh.as_ref(), 10).unwrap();

    assert_eq!(renderer.evict_stale(15, 5).unwrap(), 0);
    assert_eq!(renderer.context_data().len(), 1);

    assert_eq!(renderer.evict_stale(16, 5).unwrap(), 1);
    assert!(renderer.context_data().is_empty());
    assert_eq!(backend.stats().destroyed, 2);
}

#[test]
fn touched_entries_survive() {
    let instance = HeadlessInstance::new();
    let mut renderer = renderer(&instance);
    let old = triangle();
    let fresh = triangle();

    renderer.get_or_update(old.as_ref(), 1).unwrap();
    renderer.get_or_update(fresh.as_ref(), 1).unwrap();
    renderer.get_or_update(fresh.as_ref(), 9).unwrap();

    assert_eq!(renderer.evict_stale(10, 4).unwrap(), 1);
    assert_eq!(renderer.context_data().len(), 1);
}

// ============================================================================
// Registry
// ============================================================================

#[test]
fn sweep_releases_dropped_entities() {
    let instance = HeadlessInstance::new();
    let mut renderer = renderer(&instance);
    let mesh = triangle();
    let id = mesh.id();

    renderer.registry().register(&mesh);
    renderer.get_or_update(mesh.as_ref(), 1).unwrap();
    assert!(renderer.sweep().unwrap().is_empty());

    drop(mesh);
    assert_eq!(renderer.sweep().unwrap(), vec![id]);
    assert!(renderer.context_data().is_empty());
    assert!(!renderer.registry().contains(id));
    assert_eq!(backend(&instance).live_objects(), 0);
}

#[test]
fn registration_from_other_threads() {
    let instance = HeadlessInstance::new();
    let renderer = renderer(&instance);
    let registry = Arc::clone(renderer.registry());

    let meshes: Vec<Arc<Mesh>> = std::thread::spawn(move || {
        let meshes: Vec<_> = (0..8).map(|_| triangle()).collect();
        for mesh in &meshes {
            registry.register(mesh);
        }
        meshes
    })
    .join()
    .unwrap();

    assert_eq!(renderer.registry().len(), meshes.len());
}

// ============================================================================
// Device Loss
// ============================================================================

#[test]
fn device_loss_recreates_on_new_device() {
    let instance = HeadlessInstance::new();
    let mut renderer = renderer(&instance);
    let mesh = triangle();

    renderer.get_or_update(mesh.as_ref(), 1).unwrap();
    backend(&instance).lose_device();

    assert!(renderer.begin_frame());
    assert!(renderer.context_data().is_empty());
    assert_eq!(instance.created_backends().len(), 2);

    let frame = renderer.frame();
    let entry = renderer.get_or_update(mesh.as_ref(), frame).unwrap();
    assert!(entry.data.vertex_buffer.is_some());
    assert_eq!(entry.generation, 2);
    assert_eq!(backend(&instance).stats().buffers, 2);
}
