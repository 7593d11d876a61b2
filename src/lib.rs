//! # Kiln
//!
//! Pipeline compilation and caching core for a wgpu renderer.
//!
//! - [`core`]: entity identities, content versions, cache entry aging, from
//!   the `kiln_core` member crate
//! - [`resources`]: CPU-side meshes, textures, buffers, features, materials
//!   and drawables
//! - [`shader`]: declarative shader blocks and the WGSL generator
//! - [`renderer`]: the device context, versioned GPU resource cache, pipeline
//!   hashing, building and caching

#![warn(clippy::all)]
#![warn(clippy::pedantic)]
#![allow(clippy::cast_precision_loss)]
#![allow(clippy::cast_possible_truncation)]
#![allow(clippy::module_name_repetitions)]
#![allow(clippy::missing_errors_doc)]
#![allow(clippy::missing_panics_doc)]
#![allow(clippy::too_many_arguments)]

pub use kiln_core as core;
pub mod errors;
pub mod renderer;
pub mod resources;
pub mod shader;

pub use crate::core::{IdTag, UniqueId};
pub use crate::errors::{GfxError, Result};
pub use crate::renderer::backend::{GpuBackend, HeadlessBackend, HeadlessInstance, OffscreenOutput, WgpuInstance};
pub use crate::renderer::context::Context;
pub use crate::renderer::pipeline::{CompiledPipeline, Hash128, PipelineBuilder};
pub use crate::renderer::{CacheSettings, ContextSettings, ContextState, FrameState, Renderer, RendererSettings};
pub use crate::resources::{
    Buffer, Drawable, Feature, FeaturePipelineState, Material, Mesh, MeshFormat, PipelineStep,
    RenderTargetLayout, SamplerState, Texture,
};
pub use crate::shader::{Block, EntryPoint, Generator, ProgrammableGraphicsStage};
