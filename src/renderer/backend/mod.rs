//! GPU Backend Seam
//!
//! Everything above this module talks to the GPU through [`GpuBackend`]:
//! object creation returns opaque slot-map handles and descriptors are plain
//! data built from `wgpu` types. Two implementations exist:
//!
//! - [`WgpuBackend`]: a real `wgpu::Device` + `wgpu::Queue`
//! - [`HeadlessBackend`]: records objects and call counts, can inject faults
//!
//! Adapter and device acquisition are abstracted as [`GpuInstance`] and
//! [`GpuAdapter`] so the context state machine can poll them without knowing
//! which backend it drives.

pub mod headless;
pub mod output;
pub mod wgpu_backend;

use std::sync::Arc;

use futures::future::BoxFuture;
use slotmap::new_key_type;

use crate::errors::Result;
use crate::renderer::settings::ContextSettings;

pub use headless::{HeadlessAdapter, HeadlessBackend, HeadlessFaults, HeadlessInstance, HeadlessStats};
pub use output::{OffscreenOutput, OutputImage, RenderOutput};
pub use wgpu_backend::{WgpuAdapter, WgpuBackend, WgpuInstance};

new_key_type! {
    pub struct ShaderModuleHandle;
    pub struct BindGroupLayoutHandle;
    pub struct PipelineLayoutHandle;
    pub struct RenderPipelineHandle;
    pub struct BufferHandle;
    pub struct TextureHandle;
    pub struct SamplerHandle;
}

// ============================================================================
// Descriptors
// ============================================================================

#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct VertexBufferLayoutDesc {
    pub array_stride: u64,
    pub step_mode: wgpu::VertexStepMode,
    pub attributes: Vec<wgpu::VertexAttribute>,
}

/// Everything needed to create a render pipeline.
#[derive(Debug, Clone)]
pub struct RenderPipelineDesc {
    pub label: String,
    pub layout: PipelineLayoutHandle,
    pub shader: ShaderModuleHandle,
    pub vertex_entry: String,
    pub fragment_entry: String,
    pub vertex_buffers: Vec<VertexBufferLayoutDesc>,
    pub color_targets: Vec<Option<wgpu::ColorTargetState>>,
    pub primitive: wgpu::PrimitiveState,
    pub depth_stencil: Option<wgpu::DepthStencilState>,
    pub multisample: wgpu::MultisampleState,
}

#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct BufferDesc {
    pub label: String,
    pub size: u64,
    pub usage: wgpu::BufferUsages,
}

#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct TextureCreateDesc {
    pub label: String,
    pub size: wgpu::Extent3d,
    pub mip_level_count: u32,
    pub sample_count: u32,
    pub dimension: wgpu::TextureDimension,
    pub view_dimension: wgpu::TextureViewDimension,
    pub format: wgpu::TextureFormat,
    pub usage: wgpu::TextureUsages,
}

/// Region and layout of a texel upload.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TextureWrite {
    pub mip_level: u32,
    pub bytes_per_row: u32,
    pub rows_per_image: u32,
    pub size: wgpu::Extent3d,
}

// ============================================================================
// Backend
// ============================================================================

/// Object-safe GPU device interface.
pub trait GpuBackend: Send + Sync {
    fn limits(&self) -> wgpu::Limits;

    fn create_shader_module(&self, label: &str, wgsl_source: &str) -> Result<ShaderModuleHandle>;
    fn create_bind_group_layout(
        &self,
        label: &str,
        entries: &[wgpu::BindGroupLayoutEntry],
    ) -> Result<BindGroupLayoutHandle>;
    fn create_pipeline_layout(
        &self,
        label: &str,
        bind_group_layouts: &[BindGroupLayoutHandle],
    ) -> Result<PipelineLayoutHandle>;
    fn create_render_pipeline(&self, desc: &RenderPipelineDesc) -> Result<RenderPipelineHandle>;

    fn create_buffer(&self, desc: &BufferDesc) -> Result<BufferHandle>;
    fn write_buffer(&self, buffer: BufferHandle, offset: u64, data: &[u8]) -> Result<()>;

    fn create_texture(&self, desc: &TextureCreateDesc) -> Result<TextureHandle>;
    fn write_texture(&self, texture: TextureHandle, write: &TextureWrite, data: &[u8]) -> Result<()>;

    fn create_sampler(&self, label: &str, state: &crate::resources::SamplerState)
    -> Result<SamplerHandle>;

    fn destroy_shader_module(&self, handle: ShaderModuleHandle);
    fn destroy_bind_group_layout(&self, handle: BindGroupLayoutHandle);
    fn destroy_pipeline_layout(&self, handle: PipelineLayoutHandle);
    fn destroy_render_pipeline(&self, handle: RenderPipelineHandle);
    fn destroy_buffer(&self, handle: BufferHandle);
    fn destroy_texture(&self, handle: TextureHandle);
    fn destroy_sampler(&self, handle: SamplerHandle);

    /// Whether the device was lost. Every object created so far is invalid once true.
    fn is_lost(&self) -> bool;
}

// ============================================================================
// Acquisition
// ============================================================================

/// Entry point of adapter acquisition.
pub trait GpuInstance: Send + Sync {
    fn request_adapter(&self, settings: &ContextSettings) -> BoxFuture<'static, Result<Arc<dyn GpuAdapter>>>;
}

pub trait GpuAdapter: Send + Sync {
    /// Human readable adapter description for logs.
    fn describe(&self) -> String;

    fn request_device(&self, settings: &ContextSettings) -> BoxFuture<'static, Result<Arc<dyn GpuBackend>>>;
}
