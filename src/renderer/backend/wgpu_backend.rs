//! `wgpu` implementation of the backend seam.
//!
//! Objects live in slot maps behind a `parking_lot::RwLock`; creation runs
//! inside a validation error scope so failures surface as [`GfxError`]s
//! instead of uncaptured device errors.

use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};

use futures::future::BoxFuture;
use parking_lot::RwLock;
use slotmap::SlotMap;

use super::{
    BindGroupLayoutHandle, BufferDesc, BufferHandle, GpuAdapter, GpuBackend, GpuInstance,
    PipelineLayoutHandle, RenderPipelineDesc, RenderPipelineHandle, SamplerHandle,
    ShaderModuleHandle, TextureCreateDesc, TextureHandle, TextureWrite,
};
use crate::errors::{GfxError, Result};
use crate::renderer::settings::ContextSettings;
use crate::resources::SamplerState;

#[derive(Default)]
struct WgpuObjects {
    shader_modules: SlotMap<ShaderModuleHandle, wgpu::ShaderModule>,
    bind_group_layouts: SlotMap<BindGroupLayoutHandle, wgpu::BindGroupLayout>,
    pipeline_layouts: SlotMap<PipelineLayoutHandle, wgpu::PipelineLayout>,
    render_pipelines: SlotMap<RenderPipelineHandle, wgpu::RenderPipeline>,
    buffers: SlotMap<BufferHandle, wgpu::Buffer>,
    textures: SlotMap<TextureHandle, wgpu::Texture>,
    samplers: SlotMap<SamplerHandle, wgpu::Sampler>,
}

pub struct WgpuBackend {
    device: wgpu::Device,
    queue: wgpu::Queue,
    objects: RwLock<WgpuObjects>,
    lost: Arc<AtomicBool>,
}

impl WgpuBackend {
    #[must_use]
    pub fn new(device: wgpu::Device, queue: wgpu::Queue) -> Self {
        let lost = Arc::new(AtomicBool::new(false));
        let flag = Arc::clone(&lost);
        device.set_device_lost_callback(move |reason, message| {
            log::error!("GPU device lost ({reason:?}): {message}");
            flag.store(true, Ordering::Release);
        });
        Self {
            device,
            queue,
            objects: RwLock::new(WgpuObjects::default()),
            lost,
        }
    }

    #[inline]
    #[must_use]
    pub fn device(&self) -> &wgpu::Device {
        &self.device
    }

    #[inline]
    #[must_use]
    pub fn queue(&self) -> &wgpu::Queue {
        &self.queue
    }

    /// Runs `f` for a live render pipeline.
    pub fn with_render_pipeline<R>(
        &self,
        handle: RenderPipelineHandle,
        f: impl FnOnce(&wgpu::RenderPipeline) -> R,
    ) -> Option<R> {
        self.objects.read().render_pipelines.get(handle).map(f)
    }

    /// Runs `f` with the validation error of the calls it makes, if any.
    fn scoped<T>(&self, f: impl FnOnce() -> T) -> std::result::Result<T, String> {
        let scope = self.device.push_error_scope(wgpu::ErrorFilter::Validation);
        let out = f();
        match pollster::block_on(scope.pop()) {
            Some(err) => Err(err.to_string()),
            None => Ok(out),
        }
    }

    fn check_lost(&self) -> Result<()> {
        if self.is_lost() {
            Err(GfxError::DeviceLost)
        } else {
            Ok(())
        }
    }
}

fn to_wgpu_sampler<'a>(label: &'a str, state: &SamplerState) -> wgpu::SamplerDescriptor<'a> {
    wgpu::SamplerDescriptor {
        label: Some(label),
        address_mode_u: state.address_mode_u,
        address_mode_v: state.address_mode_v,
        address_mode_w: state.address_mode_w,
        mag_filter: state.mag_filter,
        min_filter: state.min_filter,
        mipmap_filter: state.mipmap_filter,
        compare: state.compare,
        anisotropy_clamp: state.anisotropy_clamp,
        ..Default::default()
    }
}

impl GpuBackend for WgpuBackend {
    fn limits(&self) -> wgpu::Limits {
        self.device.limits()
    }

    fn create_shader_module(&self, label: &str, wgsl_source: &str) -> Result<ShaderModuleHandle> {
        self.check_lost()?;
        let module = self
            .scoped(|| {
                self.device.create_shader_module(wgpu::ShaderModuleDescriptor {
                    label: Some(label),
                    source: wgpu::ShaderSource::Wgsl(wgsl_source.into()),
                })
            })
            .map_err(|message| GfxError::ShaderCompilationFailed {
                label: label.to_string(),
                message,
            })?;
        Ok(self.objects.write().shader_modules.insert(module))
    }

    fn create_bind_group_layout(
        &self,
        label: &str,
        entries: &[wgpu::BindGroupLayoutEntry],
    ) -> Result<BindGroupLayoutHandle> {
        self.check_lost()?;
        let layout = self
            .scoped(|| {
                self.device
                    .create_bind_group_layout(&wgpu::BindGroupLayoutDescriptor {
                        label: Some(label),
                        entries,
                    })
            })
            .map_err(|message| GfxError::LayoutCreateFailed {
                label: label.to_string(),
                message,
            })?;
        Ok(self.objects.write().bind_group_layouts.insert(layout))
    }

    fn create_pipeline_layout(
        &self,
        label: &str,
        bind_group_layouts: &[BindGroupLayoutHandle],
    ) -> Result<PipelineLayoutHandle> {
        self.check_lost()?;
        let layout = {
            let objects = self.objects.read();
            let layouts = bind_group_layouts
                .iter()
                .map(|h| {
                    objects
                        .bind_group_layouts
                        .get(*h)
                        .map(Some)
                        .ok_or(GfxError::InvalidHandle("bind group layout"))
                })
                .collect::<Result<Vec<_>>>()?;
            self.scoped(|| {
                self.device
                    .create_pipeline_layout(&wgpu::PipelineLayoutDescriptor {
                        label: Some(label),
                        bind_group_layouts: &layouts,
                        immediate_size: 0,
                    })
            })
            .map_err(|message| GfxError::LayoutCreateFailed {
                label: label.to_string(),
                message,
            })?
        };
        Ok(self.objects.write().pipeline_layouts.insert(layout))
    }

    fn create_render_pipeline(&self, desc: &RenderPipelineDesc) -> Result<RenderPipelineHandle> {
        self.check_lost()?;
        let pipeline = {
            let objects = self.objects.read();
            let layout = objects
                .pipeline_layouts
                .get(desc.layout)
                .ok_or(GfxError::InvalidHandle("pipeline layout"))?;
            let module = objects
                .shader_modules
                .get(desc.shader)
                .ok_or(GfxError::InvalidHandle("shader module"))?;
            let vertex_buffers: Vec<wgpu::VertexBufferLayout<'_>> = desc
                .vertex_buffers
                .iter()
                .map(|b| wgpu::VertexBufferLayout {
                    array_stride: b.array_stride,
                    step_mode: b.step_mode,
                    attributes: &b.attributes,
                })
                .collect();

            self.scoped(|| {
                self.device
                    .create_render_pipeline(&wgpu::RenderPipelineDescriptor {
                        label: Some(&desc.label),
                        layout: Some(layout),
                        vertex: wgpu::VertexState {
                            module,
                            entry_point: Some(&desc.vertex_entry),
                            buffers: &vertex_buffers,
                            compilation_options: wgpu::PipelineCompilationOptions::default(),
                        },
                        fragment: Some(wgpu::FragmentState {
                            module,
                            entry_point: Some(&desc.fragment_entry),
                            targets: &desc.color_targets,
                            compilation_options: wgpu::PipelineCompilationOptions::default(),
                        }),
                        primitive: desc.primitive,
                        depth_stencil: desc.depth_stencil.clone(),
                        multisample: desc.multisample,
                        multiview_mask: None,
                        cache: None,
                    })
            })
            .map_err(GfxError::PipelineCreateFailed)?
        };
        Ok(self.objects.write().render_pipelines.insert(pipeline))
    }

    fn create_buffer(&self, desc: &BufferDesc) -> Result<BufferHandle> {
        self.check_lost()?;
        // Writes must be 4 byte aligned, so is the buffer.
        let size = desc.size.max(4).next_multiple_of(wgpu::COPY_BUFFER_ALIGNMENT);
        let buffer = self
            .scoped(|| {
                self.device.create_buffer(&wgpu::BufferDescriptor {
                    label: Some(&desc.label),
                    size,
                    usage: desc.usage,
                    mapped_at_creation: false,
                })
            })
            .map_err(|message| GfxError::ResourceFailed {
                kind: "buffer",
                label: desc.label.clone(),
                message,
            })?;
        Ok(self.objects.write().buffers.insert(buffer))
    }

    fn write_buffer(&self, buffer: BufferHandle, offset: u64, data: &[u8]) -> Result<()> {
        self.check_lost()?;
        let objects = self.objects.read();
        let target = objects
            .buffers
            .get(buffer)
            .ok_or(GfxError::InvalidHandle("buffer"))?;
        let padding = data.len().next_multiple_of(wgpu::COPY_BUFFER_ALIGNMENT as usize) - data.len();
        if padding == 0 {
            self.queue.write_buffer(target, offset, data);
        } else {
            let mut padded = Vec::with_capacity(data.len() + padding);
            padded.extend_from_slice(data);
            padded.resize(data.len() + padding, 0);
            self.queue.write_buffer(target, offset, &padded);
        }
        Ok(())
    }

    fn create_texture(&self, desc: &TextureCreateDesc) -> Result<TextureHandle> {
        self.check_lost()?;
        let texture = self
            .scoped(|| {
                self.device.create_texture(&wgpu::TextureDescriptor {
                    label: Some(&desc.label),
                    size: desc.size,
                    mip_level_count: desc.mip_level_count,
                    sample_count: desc.sample_count,
                    dimension: desc.dimension,
                    format: desc.format,
                    usage: desc.usage,
                    view_formats: &[],
                })
            })
            .map_err(|message| GfxError::ResourceFailed {
                kind: "texture",
                label: desc.label.clone(),
                message,
            })?;
        Ok(self.objects.write().textures.insert(texture))
    }

    fn write_texture(&self, texture: TextureHandle, write: &TextureWrite, data: &[u8]) -> Result<()> {
        self.check_lost()?;
        let objects = self.objects.read();
        let target = objects
            .textures
            .get(texture)
            .ok_or(GfxError::InvalidHandle("texture"))?;
        self.queue.write_texture(
            wgpu::TexelCopyTextureInfo {
                texture: target,
                mip_level: write.mip_level,
                origin: wgpu::Origin3d::ZERO,
                aspect: wgpu::TextureAspect::All,
            },
            data,
            wgpu::TexelCopyBufferLayout {
                offset: 0,
                bytes_per_row: Some(write.bytes_per_row),
                rows_per_image: Some(write.rows_per_image),
            },
            write.size,
        );
        Ok(())
    }

    fn create_sampler(&self, label: &str, state: &SamplerState) -> Result<SamplerHandle> {
        self.check_lost()?;
        let sampler = self
            .scoped(|| self.device.create_sampler(&to_wgpu_sampler(label, state)))
            .map_err(|message| GfxError::ResourceFailed {
                kind: "sampler",
                label: label.to_string(),
                message,
            })?;
        Ok(self.objects.write().samplers.insert(sampler))
    }

    fn destroy_shader_module(&self, handle: ShaderModuleHandle) {
        self.objects.write().shader_modules.remove(handle);
    }

    fn destroy_bind_group_layout(&self, handle: BindGroupLayoutHandle) {
        self.objects.write().bind_group_layouts.remove(handle);
    }

    fn destroy_pipeline_layout(&self, handle: PipelineLayoutHandle) {
        self.objects.write().pipeline_layouts.remove(handle);
    }

    fn destroy_render_pipeline(&self, handle: RenderPipelineHandle) {
        self.objects.write().render_pipelines.remove(handle);
    }

    fn destroy_buffer(&self, handle: BufferHandle) {
        if let Some(buffer) = self.objects.write().buffers.remove(handle) {
            buffer.destroy();
        }
    }

    fn destroy_texture(&self, handle: TextureHandle) {
        if let Some(texture) = self.objects.write().textures.remove(handle) {
            texture.destroy();
        }
    }

    fn destroy_sampler(&self, handle: SamplerHandle) {
        self.objects.write().samplers.remove(handle);
    }

    fn is_lost(&self) -> bool {
        self.lost.load(Ordering::Acquire)
    }
}

// ============================================================================
// Acquisition
// ============================================================================

/// Adapter source over a `wgpu::Instance`.
#[derive(Clone)]
pub struct WgpuInstance {
    instance: wgpu::Instance,
}

impl WgpuInstance {
    #[must_use]
    pub fn new(instance: wgpu::Instance) -> Self {
        Self { instance }
    }
}

impl Default for WgpuInstance {
    fn default() -> Self {
        Self::new(wgpu::Instance::default())
    }
}

impl GpuInstance for WgpuInstance {
    fn request_adapter(&self, settings: &ContextSettings) -> BoxFuture<'static, Result<Arc<dyn GpuAdapter>>> {
        let instance = self.instance.clone();
        let power_preference = settings.power_preference;
        let force_fallback_adapter = settings.force_fallback_adapter;
        Box::pin(async move {
            let adapter = instance
                .request_adapter(&wgpu::RequestAdapterOptions {
                    power_preference,
                    compatible_surface: None,
                    force_fallback_adapter,
                })
                .await
                .map_err(|e| GfxError::AdapterRequestFailed(e.to_string()))?;
            Ok(Arc::new(WgpuAdapter { adapter }) as Arc<dyn GpuAdapter>)
        })
    }
}

pub struct WgpuAdapter {
    adapter: wgpu::Adapter,
}

impl GpuAdapter for WgpuAdapter {
    fn describe(&self) -> String {
        let info = self.adapter.get_info();
        format!("{} ({:?})", info.name, info.backend)
    }

    fn request_device(&self, settings: &ContextSettings) -> BoxFuture<'static, Result<Arc<dyn GpuBackend>>> {
        let adapter = self.adapter.clone();
        let label = settings.label.clone();
        let required_features = settings.required_features;
        let required_limits = settings.required_limits.clone();
        Box::pin(async move {
            let (device, queue) = adapter
                .request_device(&wgpu::DeviceDescriptor {
                    label: Some(&label),
                    required_features,
                    required_limits,
                    memory_hints: wgpu::MemoryHints::Performance,
                    ..Default::default()
                })
                .await?;
            Ok(Arc::new(WgpuBackend::new(device, queue)) as Arc<dyn GpuBackend>)
        })
    }
}
