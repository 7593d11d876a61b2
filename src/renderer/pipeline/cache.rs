//! Pipeline Cache
//!
//! Flat map from the 128-bit pipeline key to the compiled pipeline. A hit
//! skips the builder entirely; entries are immutable once inserted and only
//! dropped all at once (device loss).

use std::sync::Arc;

use rustc_hash::FxHashMap;

use super::hash::Hash128;
use crate::renderer::backend::{
    BindGroupLayoutHandle, GpuBackend, PipelineLayoutHandle, RenderPipelineHandle, ShaderModuleHandle,
};
use crate::resources::{BindGroupId, FeaturePipelineState, ParameterStorage, RenderTargetLayout};
use crate::shader::{AddressSpace, Dimension, StructLayout, TextureBindingLayout};

/// A buffer binding as the compiled pipeline expects it.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PipelineBufferBinding {
    pub name: String,
    pub bind_group: BindGroupId,
    /// Binding index inside the group, `None` when no entry point reads the buffer
    pub binding: Option<u32>,
    /// Layout after unused fields were stripped
    pub layout: StructLayout,
    pub address_space: AddressSpace,
    pub dimension: Dimension,
    pub has_dynamic_offset: bool,
}

impl PipelineBufferBinding {
    #[inline]
    #[must_use]
    pub fn is_unused(&self) -> bool {
        self.binding.is_none()
    }
}

/// Reference to a buffer binding taking a dynamic offset at bind time.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct DynamicBufferRef {
    pub bind_group: BindGroupId,
    /// Index into the group's binding list of the compiled pipeline
    pub index: usize,
}

/// Everything produced by one pipeline build. Never mutated after creation.
#[derive(Debug)]
pub struct CompiledPipeline {
    pub hash: Hash128,
    pub pipeline: RenderPipelineHandle,
    pub pipeline_layout: PipelineLayoutHandle,
    /// Indexed by bind group: draw, then view
    pub bind_group_layouts: Vec<BindGroupLayoutHandle>,
    pub shader_module: ShaderModuleHandle,
    pub draw_buffer_bindings: Vec<PipelineBufferBinding>,
    pub view_buffer_bindings: Vec<PipelineBufferBinding>,
    pub texture_bindings: TextureBindingLayout,
    pub dynamic_buffer_refs: Vec<DynamicBufferRef>,
    pub render_target_layout: RenderTargetLayout,
    pub state: FeaturePipelineState,
    pub base_draw_parameters: ParameterStorage,
    pub base_view_parameters: ParameterStorage,
    pub wgsl_source: String,
}

impl CompiledPipeline {
    #[must_use]
    pub fn find_draw_buffer_binding(&self, name: &str) -> Option<&PipelineBufferBinding> {
        self.draw_buffer_bindings.iter().find(|b| b.name == name)
    }

    #[must_use]
    pub fn find_view_buffer_binding(&self, name: &str) -> Option<&PipelineBufferBinding> {
        self.view_buffer_bindings.iter().find(|b| b.name == name)
    }

    #[must_use]
    pub fn resolve_dynamic_ref(&self, reference: DynamicBufferRef) -> Option<&PipelineBufferBinding> {
        match reference.bind_group {
            BindGroupId::Draw => self.draw_buffer_bindings.get(reference.index),
            BindGroupId::View => self.view_buffer_bindings.get(reference.index),
        }
    }

    /// Destroys the backend objects owned by this pipeline.
    ///
    /// The shader module belongs to the module cache and is left alone.
    pub fn release(&self, backend: &dyn GpuBackend) {
        backend.destroy_render_pipeline(self.pipeline);
        backend.destroy_pipeline_layout(self.pipeline_layout);
        for layout in &self.bind_group_layouts {
            backend.destroy_bind_group_layout(*layout);
        }
    }
}

#[derive(Debug, Default)]
pub struct PipelineCache {
    pipelines: FxHashMap<Hash128, Arc<CompiledPipeline>>,
}

impl PipelineCache {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    #[inline]
    #[must_use]
    pub fn get(&self, hash: Hash128) -> Option<Arc<CompiledPipeline>> {
        self.pipelines.get(&hash).cloned()
    }

    /// Stores a freshly built pipeline.
    ///
    /// Called once per miss; a second insert under the same key keeps the first
    /// pipeline and returns it.
    pub fn insert(&mut self, hash: Hash128, pipeline: CompiledPipeline) -> Arc<CompiledPipeline> {
        self.pipelines
            .entry(hash)
            .or_insert_with(|| Arc::new(pipeline))
            .clone()
    }

    /// Drops every pipeline without touching the backend (device loss).
    pub fn clear(&mut self) {
        self.pipelines.clear();
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.pipelines.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.pipelines.is_empty()
    }
}
