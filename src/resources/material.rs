use std::sync::Arc;

use super::feature::Feature;
use super::params::{ParamValue, ParameterStorage, TextureParameter};
use crate::core::{IdTag, UniqueId};
use crate::renderer::pipeline::{HashReference, PipelineHash, PipelineHashCollector};

/// Features plus the parameter values they are drawn with.
///
/// Shared between drawables through `Arc`, so its hash is memoized once.
#[derive(Debug)]
pub struct Material {
    id: UniqueId,
    pub label: String,
    pub features: Vec<Arc<Feature>>,
    pub parameters: ParameterStorage,
}

impl Material {
    pub fn new(label: impl Into<String>) -> Self {
        Self {
            id: UniqueId::next(IdTag::Material),
            label: label.into(),
            features: Vec::new(),
            parameters: ParameterStorage::default(),
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
    pub fn with_param(mut self, name: &str, value: impl Into<ParamValue>) -> Self {
        self.parameters.set_param(name, value);
        self
    }

    #[must_use]
    pub fn with_texture(mut self, name: &str, parameter: TextureParameter) -> Self {
        self.parameters.set_texture(name, parameter);
        self
    }
}

impl Clone for Material {
    fn clone(&self) -> Self {
        Self {
            id: UniqueId::next(IdTag::Material),
            label: self.label.clone(),
            features: self.features.clone(),
            parameters: self.parameters.clone(),
        }
    }
}

impl PipelineHash for Material {
    fn pipeline_hash(&self, collector: &mut PipelineHashCollector<'_>) {
        collector.hash_value(&self.features.len());
        for feature in &self.features {
            collector.hash_reference(feature.as_ref());
        }
        // Only the texture slots shape the pipeline; basic values live in buffers.
        collector.hash_value(&self.parameters.textures.len());
        for (name, parameter) in &self.parameters.textures {
            collector.hash_value(name);
            collector.hash_value(&parameter.default_texcoord_binding);
        }
    }
}

impl HashReference for Material {
    fn hash_id(&self) -> UniqueId {
        self.id
    }
}
