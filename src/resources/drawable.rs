use std::sync::Arc;

use glam::Mat4;

use super::feature::Feature;
use super::material::Material;
use super::mesh::Mesh;
use super::params::ParameterStorage;
use crate::core::{IdTag, UniqueId};
use crate::renderer::pipeline::{HashReference, PipelineHash, PipelineHashCollector};

/// One mesh drawn with a material and extra features.
#[derive(Debug)]
pub struct Drawable {
    id: UniqueId,
    pub mesh: Arc<Mesh>,
    pub material: Option<Arc<Material>>,
    pub features: Vec<Arc<Feature>>,
    pub parameters: ParameterStorage,
    pub transform: Mat4,
}

impl Drawable {
    #[must_use]
    pub fn new(mesh: Arc<Mesh>) -> Self {
        Self {
            id: UniqueId::next(IdTag::Drawable),
            mesh,
            material: None,
            features: Vec::new(),
            parameters: ParameterStorage::default(),
            transform: Mat4::IDENTITY,
        }
    }

    #[inline]
    #[must_use]
    pub fn id(&self) -> UniqueId {
        self.id
    }

    #[must_use]
    pub fn with_material(mut self, material: Arc<Material>) -> Self {
        self.material = Some(material);
        self
    }

    #[must_use]
    pub fn with_feature(mut self, feature: Arc<Feature>) -> Self {
        self.features.push(feature);
        self
    }

    #[must_use]
    pub fn with_transform(mut self, transform: Mat4) -> Self {
        self.transform = transform;
        self
    }
}

impl Clone for Drawable {
    fn clone(&self) -> Self {
        Self {
            id: UniqueId::next(IdTag::Drawable),
            mesh: Arc::clone(&self.mesh),
            material: self.material.clone(),
            features: self.features.clone(),
            parameters: self.parameters.clone(),
            transform: self.transform,
        }
    }
}

impl PipelineHash for Drawable {
    fn pipeline_hash(&self, collector: &mut PipelineHashCollector<'_>) {
        // The mesh is hashed by format so meshes with the same layout share pipelines.
        collector.hash_value(&self.mesh.format());
        collector.hash_value(&self.features.len());
        for feature in &self.features {
            collector.hash_reference(feature.as_ref());
        }
        collector.hash_value(&self.material.is_some());
        if let Some(material) = &self.material {
            collector.hash_reference(material.as_ref());
        }
    }
}

impl HashReference for Drawable {
    fn hash_id(&self) -> UniqueId {
        self.id
    }
}
