//! Renderer
//!
//! [`Renderer`] ties the device context to the caches sitting on top of it:
//!
//! - versioned GPU copies of meshes, textures and buffers ([`context_data`])
//! - pipeline keys and compiled pipelines ([`pipeline`])
//! - samplers ([`sampler_cache`])
//!
//! Every cache is dropped wholesale when the device is lost or the context is
//! suspended; CPU-side entities are never touched.

pub mod backend;
pub mod context;
pub mod context_data;
pub mod pipeline;
pub mod sampler_cache;
pub mod settings;

use std::sync::Arc;

use self::backend::{GpuBackend, GpuInstance, RenderOutput, SamplerHandle};
use self::context::Context;
use self::context_data::{ContextData, ContextDataSource, ContextDataStorage, ResourceRegistry};
use self::pipeline::{
    CompiledPipeline, Hash128, PipelineBuilder, PipelineCache, PipelineHashCache, ShaderManager,
    pipeline_key,
};
use self::sampler_cache::SamplerCache;
use crate::core::UniqueId;
use crate::errors::{GfxError, Result};
use crate::resources::{Drawable, PipelineStep, SamplerState};

pub use self::context::{ContextState, FrameState};
pub use self::settings::{CacheSettings, ContextSettings, RendererSettings};

pub struct Renderer {
    context: Context,
    cache_settings: CacheSettings,

    context_data: ContextDataStorage,
    registry: Arc<ResourceRegistry>,
    samplers: SamplerCache,
    hash_cache: PipelineHashCache,
    pipelines: PipelineCache,
    shaders: ShaderManager,

    frame: u64,
    /// Device generation the caches were filled under
    synced_generation: u64,
}

impl Renderer {
    pub fn new(
        instance: Arc<dyn GpuInstance>,
        output: Box<dyn RenderOutput>,
        settings: RendererSettings,
    ) -> Self {
        Self {
            context: Context::new(instance, output, settings.context),
            cache_settings: settings.cache,
            context_data: ContextDataStorage::new(),
            registry: Arc::new(ResourceRegistry::new()),
            samplers: SamplerCache::new(),
            hash_cache: PipelineHashCache::new(),
            pipelines: PipelineCache::new(),
            shaders: ShaderManager::new(),
            frame: 0,
            synced_generation: 0,
        }
    }

    #[inline]
    #[must_use]
    pub fn context(&self) -> &Context {
        &self.context
    }

    /// Number of frames begun so far.
    #[inline]
    #[must_use]
    pub fn frame(&self) -> u64 {
        self.frame
    }

    /// Registry other threads add GPU-backed entities to.
    #[must_use]
    pub fn registry(&self) -> &Arc<ResourceRegistry> {
        &self.registry
    }

    #[must_use]
    pub fn context_data(&self) -> &ContextDataStorage {
        &self.context_data
    }

    #[must_use]
    pub fn pipeline_cache(&self) -> &PipelineCache {
        &self.pipelines
    }

    #[must_use]
    pub fn shader_manager(&self) -> &ShaderManager {
        &self.shaders
    }

    #[must_use]
    pub fn sampler_cache(&self) -> &SamplerCache {
        &self.samplers
    }

    // ========================================================================
    // Lifecycle
    // ========================================================================

    pub fn request_device(&mut self) {
        self.context.request_device();
        self.sync_generation();
    }

    /// Starts a frame. Returns `false` while no device is ready.
    pub fn begin_frame(&mut self) -> bool {
        if self.context.check_device_lost() {
            self.drop_gpu_state();
        }
        if !self.context.begin_frame() {
            return false;
        }
        self.sync_generation();
        self.frame += 1;
        true
    }

    /// Presents the frame, then evicts stale entries and sweeps dropped entities.
    pub fn end_frame(&mut self) -> Result<()> {
        self.context.end_frame()?;

        if let Some(backend) = self.context.backend().cloned() {
            self.registry.sweep(&mut self.context_data, backend.as_ref());
            self.context_data.evict_stale(
                self.frame,
                self.cache_settings.eviction_threshold_frames,
                backend.as_ref(),
            );
            self.samplers.evict_stale(
                self.frame,
                self.cache_settings.sampler_eviction_threshold_frames,
                backend.as_ref(),
            );
        }
        Ok(())
    }

    pub fn suspend(&mut self) {
        self.drop_gpu_state();
        self.context.suspend();
    }

    pub fn resume(&mut self) {
        self.context.resume();
        self.sync_generation();
    }

    fn sync_generation(&mut self) {
        let generation = self.context.generation();
        if generation != self.synced_generation {
            if self.synced_generation != 0 {
                self.drop_gpu_state();
            }
            self.synced_generation = generation;
        }
    }

    /// Forgets every GPU object without releasing it.
    fn drop_gpu_state(&mut self) {
        log::info!(
            "Dropping GPU state: {} pipelines, {} shader modules, {} resources, {} samplers",
            self.pipelines.len(),
            self.shaders.module_count(),
            self.context_data.len(),
            self.samplers.len()
        );
        self.pipelines.clear();
        self.shaders.clear();
        self.context_data.invalidate_all();
        self.samplers.clear();
    }

    /// The current device. A loss noticed here drops GPU state right away, so
    /// nothing is cached against the lost device before the next frame.
    fn backend(&mut self) -> Result<Arc<dyn GpuBackend>> {
        if self.context.check_device_lost() {
            self.drop_gpu_state();
        }
        self.context
            .backend()
            .cloned()
            .ok_or(GfxError::ContextNotReady(self.context.state().as_str()))
    }

    // ========================================================================
    // Resources
    // ========================================================================

    /// GPU copy of `entity`, synced at most once per `frame`.
    pub fn get_or_update<S: ContextDataSource>(
        &mut self,
        entity: &S,
        frame: u64,
    ) -> Result<&mut ContextData<S::Data>> {
        let backend = self.backend()?;
        let generation = self.context.generation();
        Ok(self
            .context_data
            .get_or_update(entity, frame, backend.as_ref(), generation))
    }

    /// Releases entries unused for more than `threshold` frames.
    pub fn evict_stale(&mut self, frame: u64, threshold: u64) -> Result<usize> {
        let backend = self.backend()?;
        Ok(self.context_data.evict_stale(frame, threshold, backend.as_ref()))
    }

    /// Releases the GPU copies of registered entities that were dropped.
    pub fn sweep(&mut self) -> Result<Vec<UniqueId>> {
        let backend = self.backend()?;
        Ok(self.registry.sweep(&mut self.context_data, backend.as_ref()))
    }

    pub fn sampler(&mut self, state: &SamplerState) -> Result<SamplerHandle> {
        let backend = self.backend()?;
        self.samplers.get_or_create(state, self.frame, backend.as_ref())
    }

    // ========================================================================
    // Pipelines
    // ========================================================================

    pub fn pipeline_key(&mut self, drawable: &Drawable, step: &PipelineStep) -> Hash128 {
        pipeline_key(drawable, step, &mut self.hash_cache)
    }

    /// Returns the pipeline for `drawable` in `step`, building it on a miss.
    ///
    /// A failed build caches nothing; the next call retries.
    pub fn build_or_get_pipeline(
        &mut self,
        drawable: &Drawable,
        step: &PipelineStep,
    ) -> Result<Arc<CompiledPipeline>> {
        let backend = self.backend()?;
        let key = pipeline_key(drawable, step, &mut self.hash_cache);
        if let Some(pipeline) = self.pipelines.get(key) {
            return Ok(pipeline);
        }

        let limits = backend.limits();
        let compiled = PipelineBuilder::new(drawable, step, &limits).build(backend.as_ref(), &mut self.shaders, key)?;
        log::debug!(
            "Pipeline {key:032x} built ({} cached)",
            self.pipelines.len() + 1
        );
        Ok(self.pipelines.insert(key, compiled))
    }

    /// Forgets every memoized sub-hash.
    pub fn reset_hash_cache(&mut self) {
        self.hash_cache.reset();
    }

    /// Forgets the memoized hash of one object after a change to something it hashes.
    pub fn invalidate_hash(&mut self, id: UniqueId) -> bool {
        self.hash_cache.invalidate(id)
    }
}
