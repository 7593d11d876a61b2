//! Sampler deduplication.
//!
//! Samplers are keyed by their full [`SamplerState`]. Lookups take the shared
//! lock; only inserting a new sampler takes the exclusive one.

use std::sync::atomic::{AtomicU64, Ordering};

use parking_lot::RwLock;
use rustc_hash::FxHashMap;

use super::backend::{GpuBackend, SamplerHandle};
use crate::core::is_stale;
use crate::errors::Result;
use crate::resources::SamplerState;

#[derive(Debug)]
struct SamplerEntry {
    handle: SamplerHandle,
    last_touched: AtomicU64,
}

#[derive(Debug, Default)]
pub struct SamplerCache {
    entries: RwLock<FxHashMap<SamplerState, SamplerEntry>>,
}

impl SamplerCache {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Returns the sampler for `state`, creating it on first use.
    pub fn get_or_create(&self, state: &SamplerState, frame: u64, backend: &dyn GpuBackend) -> Result<SamplerHandle> {
        if let Some(entry) = self.entries.read().get(state) {
            entry.last_touched.store(frame, Ordering::Relaxed);
            return Ok(entry.handle);
        }

        let mut entries = self.entries.write();
        // Another thread may have inserted it between the locks.
        if let Some(entry) = entries.get(state) {
            entry.last_touched.store(frame, Ordering::Relaxed);
            return Ok(entry.handle);
        }
        let handle = backend.create_sampler("Cached Sampler", state)?;
        entries.insert(
            *state,
            SamplerEntry {
                handle,
                last_touched: AtomicU64::new(frame),
            },
        );
        Ok(handle)
    }

    /// Destroys samplers unused for more than `threshold` frames.
    pub fn evict_stale(&self, frame: u64, threshold: u64, backend: &dyn GpuBackend) -> usize {
        let mut entries = self.entries.write();
        let before = entries.len();
        entries.retain(|_, entry| {
            if is_stale(entry.last_touched.load(Ordering::Relaxed), frame, threshold) {
                backend.destroy_sampler(entry.handle);
                false
            } else {
                true
            }
        });
        before - entries.len()
    }

    /// Forgets every sampler without touching the backend.
    pub fn clear(&self) {
        self.entries.write().clear();
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.entries.read().len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.entries.read().is_empty()
    }
}
