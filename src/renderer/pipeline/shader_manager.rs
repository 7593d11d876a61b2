//! Shader Module Cache
//!
//! Deduplicates compiled shader modules by hashing the **final** WGSL source
//! with xxh3-128. Pipelines whose keys differ but whose generated source is
//! identical (e.g. differing only in blend state) share one module.

use rustc_hash::FxHashMap;
use xxhash_rust::xxh3::xxh3_128;

use crate::errors::Result;
use crate::renderer::backend::{GpuBackend, ShaderModuleHandle};

#[derive(Debug, Default)]
pub struct ShaderManager {
    /// xxh3-128 of final WGSL → compiled module.
    module_cache: FxHashMap<u128, ShaderModuleHandle>,
}

impl ShaderManager {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Compiles `source` (or returns the cached module).
    ///
    /// Returns `(module, source_hash)`. Failed compilations are not cached.
    pub fn get_or_compile(
        &mut self,
        backend: &dyn GpuBackend,
        label: &str,
        source: &str,
    ) -> Result<(ShaderModuleHandle, u128)> {
        let hash = xxh3_128(source.as_bytes());
        if let Some(module) = self.module_cache.get(&hash) {
            return Ok((*module, hash));
        }

        log::trace!("Compiling shader module {label} ({hash:032x}):\n{source}");
        let module = backend.create_shader_module(label, source)?;
        self.module_cache.insert(hash, module);
        Ok((module, hash))
    }

    /// Returns the number of cached shader modules.
    #[must_use]
    pub fn module_count(&self) -> usize {
        self.module_cache.len()
    }

    /// Forgets every module without touching the backend.
    pub fn clear(&mut self) {
        self.module_cache.clear();
    }
}
