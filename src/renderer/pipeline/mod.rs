//! 渲染管线模块
//!
//! - [`hash`] / [`hash_cache`]: 128 位管线键及其子哈希缓存
//! - [`builder`]: 两遍着色器生成 + 管线创建
//! - [`cache`]: 管线缓存（键 → 已编译管线）
//! - [`shader_manager`]: 按最终 WGSL 去重的着色器模块缓存
//! - [`vertex`]: 顶点布局生成

pub mod builder;
pub mod cache;
pub mod hash;
pub mod hash_cache;
pub mod shader_manager;
pub mod vertex;

pub use builder::{
    BuilderBufferBinding, INTERPOLATE_ENTRY_POINT, OBJECT_BUFFER, PipelineBuilder, VIEW_BUFFER,
};
pub use cache::{CompiledPipeline, DynamicBufferRef, PipelineBufferBinding, PipelineCache};
pub use hash::{
    Hash128, HashReference, PipelineHash, PipelineHashCollector, PipelineHashStorage, hash_object,
};
pub use hash_cache::PipelineHashCache;
pub use shader_manager::ShaderManager;
pub use vertex::{vertex_buffer_layout, vertex_format};

use crate::resources::{Drawable, PipelineStep};

/// Pipeline key of `drawable` rendered by `step`.
///
/// The drawable is hashed inline on every call, so a mesh format change is
/// always picked up. Sub-hashes of the step, material and features are
/// memoized in `cache`; invalidate an object there after changing anything
/// it hashes.
pub fn pipeline_key(drawable: &Drawable, step: &PipelineStep, cache: &mut PipelineHashCache) -> Hash128 {
    let mut collector = PipelineHashCollector::with_storage(cache);
    collector.hash_reference(step);
    drawable.pipeline_hash(&mut collector);
    collector.finish()
}
