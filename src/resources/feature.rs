//! Rendering features: reusable bundles of shader code, parameters and
//! fixed-function state that together define a pipeline.

use std::fmt;
use std::sync::Arc;

use super::params::ParamValue;
use super::texture::Texture;
use crate::core::{IdTag, UniqueId};
use crate::renderer::pipeline::{
    HashReference, PipelineBuilder, PipelineHash, PipelineHashCollector,
};
use crate::shader::{EntryPoint, NumType, TextureType};

/// Fixed-function state a feature may override.
///
/// `None` leaves the value of earlier features (or the default) in place.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub struct FeaturePipelineState {
    pub blend: Option<wgpu::BlendState>,
    pub color_write: Option<wgpu::ColorWrites>,
    pub depth_write: Option<bool>,
    pub depth_compare: Option<wgpu::CompareFunction>,
    pub culling: Option<bool>,
    pub flip_front_face: Option<bool>,
}

impl FeaturePipelineState {
    /// Overlays `other` on top of `self`, per field.
    #[must_use]
    pub fn combine(&self, other: &Self) -> Self {
        Self {
            blend: other.blend.or(self.blend),
            color_write: other.color_write.or(self.color_write),
            depth_write: other.depth_write.or(self.depth_write),
            depth_compare: other.depth_compare.or(self.depth_compare),
            culling: other.culling.or(self.culling),
            flip_front_face: other.flip_front_face.or(self.flip_front_face),
        }
    }
}

/// Bind group a parameter lives in.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub enum BindGroupId {
    /// Per draw, group 0
    #[default]
    Draw,
    /// Per view, group 1
    View,
}

impl BindGroupId {
    #[must_use]
    pub fn index(self) -> u32 {
        match self {
            Self::Draw => 0,
            Self::View => 1,
        }
    }
}

/// A numeric shader parameter declared by a feature.
#[derive(Debug, Clone)]
pub struct NamedShaderParam {
    pub name: String,
    pub ty: NumType,
    pub bind_group: BindGroupId,
    pub default_value: ParamValue,
}

impl NamedShaderParam {
    pub fn new(name: impl Into<String>, default_value: impl Into<ParamValue>) -> Self {
        let default_value = default_value.into();
        Self {
            name: name.into(),
            ty: default_value.num_type(),
            bind_group: BindGroupId::Draw,
            default_value,
        }
    }

    #[must_use]
    pub fn in_group(mut self, bind_group: BindGroupId) -> Self {
        self.bind_group = bind_group;
        self
    }
}

/// A texture slot declared by a feature.
#[derive(Debug, Clone)]
pub struct NamedTextureParam {
    pub name: String,
    pub ty: TextureType,
    pub bind_group: BindGroupId,
    pub default_texture: Option<Arc<Texture>>,
}

impl NamedTextureParam {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            ty: TextureType::default(),
            bind_group: BindGroupId::Draw,
            default_texture: None,
        }
    }

    #[must_use]
    pub fn with_type(mut self, ty: TextureType) -> Self {
        self.ty = ty;
        self
    }
}

/// Hook run while a pipeline is being built, after parameters are declared.
///
/// Used by features that need extra buffer bindings or texture slots.
pub trait PipelineModifier: Send + Sync {
    fn build_pipeline(&self, builder: &mut PipelineBuilder<'_>);
}

pub struct Feature {
    id: UniqueId,
    pub label: String,
    pub state: FeaturePipelineState,
    pub shader_entry_points: Vec<EntryPoint>,
    pub shader_params: Vec<NamedShaderParam>,
    pub texture_params: Vec<NamedTextureParam>,
    pub pipeline_modifier: Option<Arc<dyn PipelineModifier>>,
}

impl Feature {
    pub fn new(label: impl Into<String>) -> Self {
        Self {
            id: UniqueId::next(IdTag::Feature),
            label: label.into(),
            state: FeaturePipelineState::default(),
            shader_entry_points: Vec::new(),
            shader_params: Vec::new(),
            texture_params: Vec::new(),
            pipeline_modifier: None,
        }
    }

    #[inline]
    #[must_use]
    pub fn id(&self) -> UniqueId {
        self.id
    }

    #[must_use]
    pub fn with_entry_point(mut self, entry_point: EntryPoint) -> Self {
        self.shader_entry_points.push(entry_point);
        self
    }

    #[must_use]
    pub fn with_param(mut self, param: NamedShaderParam) -> Self {
        self.shader_params.push(param);
        self
    }

    #[must_use]
    pub fn with_texture(mut self, param: NamedTextureParam) -> Self {
        self.texture_params.push(param);
        self
    }

    #[must_use]
    pub fn with_state(mut self, state: FeaturePipelineState) -> Self {
        self.state = state;
        self
    }

    #[must_use]
    pub fn with_modifier(mut self, modifier: Arc<dyn PipelineModifier>) -> Self {
        self.pipeline_modifier = Some(modifier);
        self
    }
}

impl fmt::Debug for Feature {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Feature")
            .field("id", &self.id)
            .field("label", &self.label)
            .field("state", &self.state)
            .field("entry_points", &self.shader_entry_points.len())
            .field("shader_params", &self.shader_params)
            .field("texture_params", &self.texture_params)
            .field("has_modifier", &self.pipeline_modifier.is_some())
            .finish()
    }
}

/// Cloning copies the declarations under a fresh id.
impl Clone for Feature {
    fn clone(&self) -> Self {
        Self {
            id: UniqueId::next(IdTag::Feature),
            label: self.label.clone(),
            state: self.state,
            shader_entry_points: self.shader_entry_points.clone(),
            shader_params: self.shader_params.clone(),
            texture_params: self.texture_params.clone(),
            pipeline_modifier: self.pipeline_modifier.clone(),
        }
    }
}

impl PipelineHash for Feature {
    fn pipeline_hash(&self, collector: &mut PipelineHashCollector<'_>) {
        // Entry point code and modifiers are not hashable; the id stands in for them.
        collector.hash_value(&self.id);
        collector.hash_value(&self.state);
        collector.hash_value(&self.shader_params.len());
        for param in &self.shader_params {
            collector.hash_value(&param.name);
            collector.hash_value(&param.ty);
            collector.hash_value(&param.bind_group);
            collector.hash_bytes(param.default_value.as_bytes());
        }
        collector.hash_value(&self.texture_params.len());
        for param in &self.texture_params {
            collector.hash_value(&param.name);
            collector.hash_value(&param.ty);
            collector.hash_value(&param.bind_group);
        }
    }
}

impl HashReference for Feature {
    fn hash_id(&self) -> UniqueId {
        self.id
    }
}
