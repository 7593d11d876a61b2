//! A backend without a GPU.
//!
//! Records every created object and counts calls so cache behavior can be
//! observed. Faults can be injected per object kind, and the device can be
//! marked lost at any time.

use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use std::task::Poll;

use bitflags::bitflags;
use futures::future::BoxFuture;
use parking_lot::Mutex;
use slotmap::SlotMap;

use super::{
    BindGroupLayoutHandle, BufferDesc, BufferHandle, GpuAdapter, GpuBackend, GpuInstance,
    PipelineLayoutHandle, RenderPipelineDesc, RenderPipelineHandle, SamplerHandle,
    ShaderModuleHandle, TextureCreateDesc, TextureHandle, TextureWrite,
};
use crate::errors::{GfxError, Result};
use crate::renderer::settings::ContextSettings;
use crate::resources::SamplerState;

bitflags! {
    /// Object kinds whose creation fails on purpose.
    #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
    pub struct HeadlessFaults: u32 {
        const SHADER_MODULE = 1 << 0;
        const BIND_GROUP_LAYOUT = 1 << 1;
        const PIPELINE_LAYOUT = 1 << 2;
        const RENDER_PIPELINE = 1 << 3;
        const BUFFER = 1 << 4;
        const TEXTURE = 1 << 5;
        const SAMPLER = 1 << 6;
    }
}

/// Call counters.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct HeadlessStats {
    pub shader_modules: u32,
    pub bind_group_layouts: u32,
    pub pipeline_layouts: u32,
    pub render_pipelines: u32,
    pub buffers: u32,
    pub buffer_writes: u32,
    pub textures: u32,
    pub texture_writes: u32,
    pub samplers: u32,
    pub destroyed: u32,
}

#[derive(Default)]
struct HeadlessState {
    shader_modules: SlotMap<ShaderModuleHandle, String>,
    bind_group_layouts: SlotMap<BindGroupLayoutHandle, Vec<wgpu::BindGroupLayoutEntry>>,
    pipeline_layouts: SlotMap<PipelineLayoutHandle, Vec<BindGroupLayoutHandle>>,
    render_pipelines: SlotMap<RenderPipelineHandle, RenderPipelineDesc>,
    buffers: SlotMap<BufferHandle, (BufferDesc, Vec<u8>)>,
    textures: SlotMap<TextureHandle, TextureCreateDesc>,
    samplers: SlotMap<SamplerHandle, SamplerState>,
    stats: HeadlessStats,
    faults: HeadlessFaults,
}

impl HeadlessState {
    fn live_objects(&self) -> usize {
        self.shader_modules.len()
            + self.bind_group_layouts.len()
            + self.pipeline_layouts.len()
            + self.render_pipelines.len()
            + self.buffers.len()
            + self.textures.len()
            + self.samplers.len()
    }
}

pub struct HeadlessBackend {
    limits: wgpu::Limits,
    state: Mutex<HeadlessState>,
    lost: AtomicBool,
}

impl Default for HeadlessBackend {
    fn default() -> Self {
        Self::new()
    }
}

impl HeadlessBackend {
    #[must_use]
    pub fn new() -> Self {
        Self::with_limits(wgpu::Limits::default())
    }

    #[must_use]
    pub fn with_limits(limits: wgpu::Limits) -> Self {
        Self {
            limits,
            state: Mutex::new(HeadlessState::default()),
            lost: AtomicBool::new(false),
        }
    }

    pub fn set_faults(&self, faults: HeadlessFaults) {
        self.state.lock().faults = faults;
    }

    #[must_use]
    pub fn stats(&self) -> HeadlessStats {
        self.state.lock().stats
    }

    /// Objects created and not yet destroyed.
    #[must_use]
    pub fn live_objects(&self) -> usize {
        self.state.lock().live_objects()
    }

    #[must_use]
    pub fn shader_source(&self, handle: ShaderModuleHandle) -> Option<String> {
        self.state.lock().shader_modules.get(handle).cloned()
    }

    #[must_use]
    pub fn bind_group_layout_entries(
        &self,
        handle: BindGroupLayoutHandle,
    ) -> Option<Vec<wgpu::BindGroupLayoutEntry>> {
        self.state.lock().bind_group_layouts.get(handle).cloned()
    }

    #[must_use]
    pub fn render_pipeline_desc(&self, handle: RenderPipelineHandle) -> Option<RenderPipelineDesc> {
        self.state.lock().render_pipelines.get(handle).cloned()
    }

    #[must_use]
    pub fn buffer_data(&self, handle: BufferHandle) -> Option<Vec<u8>> {
        self.state.lock().buffers.get(handle).map(|(_, data)| data.clone())
    }

    /// Marks the device lost; later creations fail with [`GfxError::DeviceLost`].
    pub fn lose_device(&self) {
        log::warn!("Headless device lost");
        self.lost.store(true, Ordering::Release);
    }

    fn check(&self, state: &HeadlessState, fault: HeadlessFaults, what: &str) -> Result<()> {
        if self.is_lost() {
            return Err(GfxError::DeviceLost);
        }
        if state.faults.contains(fault) {
            return Err(GfxError::PipelineCreateFailed(format!("injected {what} fault")));
        }
        Ok(())
    }
}

impl GpuBackend for HeadlessBackend {
    fn limits(&self) -> wgpu::Limits {
        self.limits.clone()
    }

    fn create_shader_module(&self, label: &str, wgsl_source: &str) -> Result<ShaderModuleHandle> {
        let mut state = self.state.lock();
        if let Err(e) = self.check(&state, HeadlessFaults::SHADER_MODULE, "shader module") {
            return Err(GfxError::ShaderCompilationFailed {
                label: label.to_string(),
                message: e.to_string(),
            });
        }
        state.stats.shader_modules += 1;
        Ok(state.shader_modules.insert(wgsl_source.to_string()))
    }

    fn create_bind_group_layout(
        &self,
        label: &str,
        entries: &[wgpu::BindGroupLayoutEntry],
    ) -> Result<BindGroupLayoutHandle> {
        let mut state = self.state.lock();
        if let Err(e) = self.check(&state, HeadlessFaults::BIND_GROUP_LAYOUT, "bind group layout") {
            return Err(GfxError::LayoutCreateFailed {
                label: label.to_string(),
                message: e.to_string(),
            });
        }
        state.stats.bind_group_layouts += 1;
        Ok(state.bind_group_layouts.insert(entries.to_vec()))
    }

    fn create_pipeline_layout(
        &self,
        label: &str,
        bind_group_layouts: &[BindGroupLayoutHandle],
    ) -> Result<PipelineLayoutHandle> {
        let mut state = self.state.lock();
        if let Err(e) = self.check(&state, HeadlessFaults::PIPELINE_LAYOUT, "pipeline layout") {
            return Err(GfxError::LayoutCreateFailed {
                label: label.to_string(),
                message: e.to_string(),
            });
        }
        if let Some(missing) = bind_group_layouts
            .iter()
            .find(|h| !state.bind_group_layouts.contains_key(**h))
        {
            log::error!("Pipeline layout '{label}' references dead layout {missing:?}");
            return Err(GfxError::InvalidHandle("bind group layout"));
        }
        state.stats.pipeline_layouts += 1;
        Ok(state.pipeline_layouts.insert(bind_group_layouts.to_vec()))
    }

    fn create_render_pipeline(&self, desc: &RenderPipelineDesc) -> Result<RenderPipelineHandle> {
        let mut state = self.state.lock();
        self.check(&state, HeadlessFaults::RENDER_PIPELINE, "render pipeline")?;
        if !state.pipeline_layouts.contains_key(desc.layout) {
            return Err(GfxError::InvalidHandle("pipeline layout"));
        }
        if !state.shader_modules.contains_key(desc.shader) {
            return Err(GfxError::InvalidHandle("shader module"));
        }
        state.stats.render_pipelines += 1;
        Ok(state.render_pipelines.insert(desc.clone()))
    }

    fn create_buffer(&self, desc: &BufferDesc) -> Result<BufferHandle> {
        let mut state = self.state.lock();
        if let Err(e) = self.check(&state, HeadlessFaults::BUFFER, "buffer") {
            return Err(GfxError::ResourceFailed {
                kind: "buffer",
                label: desc.label.clone(),
                message: e.to_string(),
            });
        }
        state.stats.buffers += 1;
        let data = vec![0u8; desc.size as usize];
        Ok(state.buffers.insert((desc.clone(), data)))
    }

    fn write_buffer(&self, buffer: BufferHandle, offset: u64, data: &[u8]) -> Result<()> {
        if self.is_lost() {
            return Err(GfxError::DeviceLost);
        }
        let mut state = self.state.lock();
        let (desc, contents) = state
            .buffers
            .get_mut(buffer)
            .ok_or(GfxError::InvalidHandle("buffer"))?;
        let start = offset as usize;
        let Some(dst) = contents.get_mut(start..start + data.len()) else {
            return Err(GfxError::ResourceFailed {
                kind: "buffer",
                label: desc.label.clone(),
                message: format!("write of {} bytes at {offset} out of bounds", data.len()),
            });
        };
        dst.copy_from_slice(data);
        state.stats.buffer_writes += 1;
        Ok(())
    }

    fn create_texture(&self, desc: &TextureCreateDesc) -> Result<TextureHandle> {
        let mut state = self.state.lock();
        if let Err(e) = self.check(&state, HeadlessFaults::TEXTURE, "texture") {
            return Err(GfxError::ResourceFailed {
                kind: "texture",
                label: desc.label.clone(),
                message: e.to_string(),
            });
        }
        state.stats.textures += 1;
        Ok(state.textures.insert(desc.clone()))
    }

    fn write_texture(&self, texture: TextureHandle, _write: &TextureWrite, _data: &[u8]) -> Result<()> {
        if self.is_lost() {
            return Err(GfxError::DeviceLost);
        }
        let mut state = self.state.lock();
        if !state.textures.contains_key(texture) {
            return Err(GfxError::InvalidHandle("texture"));
        }
        state.stats.texture_writes += 1;
        Ok(())
    }

    fn create_sampler(&self, label: &str, sampler: &SamplerState) -> Result<SamplerHandle> {
        let mut state = self.state.lock();
        if let Err(e) = self.check(&state, HeadlessFaults::SAMPLER, "sampler") {
            return Err(GfxError::ResourceFailed {
                kind: "sampler",
                label: label.to_string(),
                message: e.to_string(),
            });
        }
        state.stats.samplers += 1;
        Ok(state.samplers.insert(*sampler))
    }

    fn destroy_shader_module(&self, handle: ShaderModuleHandle) {
        let mut state = self.state.lock();
        if state.shader_modules.remove(handle).is_some() {
            state.stats.destroyed += 1;
        }
    }

    fn destroy_bind_group_layout(&self, handle: BindGroupLayoutHandle) {
        let mut state = self.state.lock();
        if state.bind_group_layouts.remove(handle).is_some() {
            state.stats.destroyed += 1;
        }
    }

    fn destroy_pipeline_layout(&self, handle: PipelineLayoutHandle) {
        let mut state = self.state.lock();
        if state.pipeline_layouts.remove(handle).is_some() {
            state.stats.destroyed += 1;
        }
    }

    fn destroy_render_pipeline(&self, handle: RenderPipelineHandle) {
        let mut state = self.state.lock();
        if state.render_pipelines.remove(handle).is_some() {
            state.stats.destroyed += 1;
        }
    }

    fn destroy_buffer(&self, handle: BufferHandle) {
        let mut state = self.state.lock();
        if state.buffers.remove(handle).is_some() {
            state.stats.destroyed += 1;
        }
    }

    fn destroy_texture(&self, handle: TextureHandle) {
        let mut state = self.state.lock();
        if state.textures.remove(handle).is_some() {
            state.stats.destroyed += 1;
        }
    }

    fn destroy_sampler(&self, handle: SamplerHandle) {
        let mut state = self.state.lock();
        if state.samplers.remove(handle).is_some() {
            state.stats.destroyed += 1;
        }
    }

    fn is_lost(&self) -> bool {
        self.lost.load(Ordering::Acquire)
    }
}

// ============================================================================
// Acquisition
// ============================================================================

/// Resolves after being polled `polls` extra times.
fn delayed<T, F>(polls: usize, produce: F) -> BoxFuture<'static, T>
where
    T: Send + 'static,
    F: FnOnce() -> T + Send + 'static,
{
    let mut remaining = polls;
    let mut produce = Some(produce);
    Box::pin(futures::future::poll_fn(move |cx| {
        if remaining > 0 {
            remaining -= 1;
            cx.waker().wake_by_ref();
            return Poll::Pending;
        }
        match produce.take() {
            Some(produce) => Poll::Ready(produce()),
            None => Poll::Pending,
        }
    }))
}

type BackendList = Arc<Mutex<Vec<Arc<HeadlessBackend>>>>;

/// Instance handing out [`HeadlessBackend`]s.
///
/// Requests complete after a configurable number of polls so the context
/// state machine can be observed in its requesting state.
#[derive(Clone, Default)]
pub struct HeadlessInstance {
    pub adapter_delay_polls: usize,
    pub device_delay_polls: usize,
    pub fail_adapter: bool,
    pub fail_device: bool,
    pub limits: wgpu::Limits,
    created: BackendList,
}

impl HeadlessInstance {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Every backend created through this instance, oldest first.
    #[must_use]
    pub fn created_backends(&self) -> Vec<Arc<HeadlessBackend>> {
        self.created.lock().clone()
    }

    #[must_use]
    pub fn last_backend(&self) -> Option<Arc<HeadlessBackend>> {
        self.created.lock().last().cloned()
    }
}

impl GpuInstance for HeadlessInstance {
    fn request_adapter(&self, _settings: &ContextSettings) -> BoxFuture<'static, Result<Arc<dyn GpuAdapter>>> {
        let fail = self.fail_adapter;
        let adapter = HeadlessAdapter {
            limits: self.limits.clone(),
            device_delay_polls: self.device_delay_polls,
            fail_device: self.fail_device,
            created: Arc::clone(&self.created),
        };
        delayed(self.adapter_delay_polls, move || {
            if fail {
                Err(GfxError::AdapterRequestFailed("no headless adapter".to_string()))
            } else {
                Ok(Arc::new(adapter) as Arc<dyn GpuAdapter>)
            }
        })
    }
}

pub struct HeadlessAdapter {
    limits: wgpu::Limits,
    device_delay_polls: usize,
    fail_device: bool,
    created: BackendList,
}

impl GpuAdapter for HeadlessAdapter {
    fn describe(&self) -> String {
        "Headless".to_string()
    }

    fn request_device(&self, _settings: &ContextSettings) -> BoxFuture<'static, Result<Arc<dyn GpuBackend>>> {
        let fail = self.fail_device;
        let limits = self.limits.clone();
        let created = Arc::clone(&self.created);
        delayed(self.device_delay_polls, move || {
            if fail {
                return Err(GfxError::DeviceRequestFailed("headless device refused".to_string()));
            }
            let backend = Arc::new(HeadlessBackend::with_limits(limits));
            created.lock().push(Arc::clone(&backend));
            Ok(backend as Arc<dyn GpuBackend>)
        })
    }
}
