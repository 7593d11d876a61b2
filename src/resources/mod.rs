//! CPU-side entities.
//!
//! Nothing in here touches the GPU. GPU-backed entities (mesh, texture,
//! buffer) carry a content version that the versioned resource cache syncs
//! against; the rest (feature, material, drawable, pipeline step) feed the
//! pipeline hash and the pipeline builder.

pub mod buffer;
pub mod drawable;
pub mod feature;
pub mod material;
pub mod mesh;
pub mod params;
pub mod render_target;
pub mod step;
pub mod texture;

pub use buffer::Buffer;
pub use drawable::Drawable;
pub use feature::{
    BindGroupId, Feature, FeaturePipelineState, NamedShaderParam, NamedTextureParam,
    PipelineModifier,
};
pub use material::Material;
pub use mesh::{
    IndexFormat, Mesh, MeshData, MeshFormat, MeshVertexAttribute, PrimitiveType, StorageType,
    WindingOrder,
};
pub use params::{ParamValue, ParameterStorage, TextureParameter};
pub use render_target::{RenderTarget, RenderTargetLayout};
pub use step::PipelineStep;
pub use texture::{SamplerState, Texture, TextureDesc};
