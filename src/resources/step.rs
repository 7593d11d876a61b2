use std::sync::Arc;

use super::feature::Feature;
use super::render_target::RenderTargetLayout;
use crate::core::{IdTag, UniqueId};
use crate::renderer::pipeline::{HashReference, PipelineHash, PipelineHashCollector};

/// A render pass description: target layout plus features applied to every
/// drawable rendered by it.
#[derive(Debug)]
pub struct PipelineStep {
    id: UniqueId,
    pub label: String,
    pub features: Vec<Arc<Feature>>,
    pub render_target_layout: RenderTargetLayout,
    /// Rendering with a flipped Y axis, which swaps the culled face
    pub flipped: bool,
}

impl PipelineStep {
    pub fn new(label: impl Into<String>, render_target_layout: RenderTargetLayout) -> Self {
        Self {
            id: UniqueId::next(IdTag::PipelineStep),
            label: label.into(),
            features: Vec::new(),
            render_target_layout,
            flipped: false,
        }
    }

    #[inline]
    #[must_use]
    pub fn id(&self) -> UniqueId {
        self.id
    }

    #[must_use]
    pub fn with_feature(mut self, feature: Arc<Feature>) -> Self {
        self.features.push(feature);
        self
    }

    #[must_use]
    pub fn flipped(mut self, flipped: bool) -> Self {
        self.flipped = flipped;
        self
    }
}

impl PipelineHash for PipelineStep {
    fn pipeline_hash(&self, collector: &mut PipelineHashCollector<'_>) {
        collector.hash_value(&self.render_target_layout);
        collector.hash_value(&self.flipped);
        collector.hash_value(&self.features.len());
        for feature in &self.features {
            collector.hash_reference(feature.as_ref());
        }
    }
}

impl HashReference for PipelineStep {
    fn hash_id(&self) -> UniqueId {
        self.id
    }
}
