use bytemuck::Pod;
use parking_lot::{RwLock, RwLockReadGuard};

use crate::core::{ChangeTracker, IdTag, UniqueId};

/// Generic CPU-side data buffer.
///
/// Holds the CPU copy of vertex, index, uniform or storage data. The GPU copy
/// is synced through the versioned resource cache.
#[derive(Debug)]
pub struct Buffer {
    id: UniqueId,
    pub label: String,
    usage: wgpu::BufferUsages,
    data: RwLock<Vec<u8>>,
    tracker: ChangeTracker,
}

impl Buffer {
    pub fn new<T: Pod>(data: &[T], usage: wgpu::BufferUsages, label: Option<&str>) -> Self {
        Self::from_bytes(bytemuck::cast_slice(data), usage, label)
    }

    #[must_use]
    pub fn from_bytes(data: &[u8], usage: wgpu::BufferUsages, label: Option<&str>) -> Self {
        Self {
            id: UniqueId::next(IdTag::Buffer),
            label: label.unwrap_or("Buffer").to_string(),
            usage,
            data: RwLock::new(data.to_vec()),
            tracker: ChangeTracker::new(),
        }
    }

    #[must_use]
    pub fn with_capacity(capacity: usize, usage: wgpu::BufferUsages, label: Option<&str>) -> Self {
        Self::from_bytes(&vec![0u8; capacity], usage, label)
    }

    #[inline]
    #[must_use]
    pub fn id(&self) -> UniqueId {
        self.id
    }

    #[inline]
    #[must_use]
    pub fn version(&self) -> u64 {
        self.tracker.version()
    }

    #[inline]
    #[must_use]
    pub fn usage(&self) -> wgpu::BufferUsages {
        self.usage
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.data.read().len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.data.read().is_empty()
    }

    pub fn update<T: Pod>(&self, data: &[T]) {
        *self.data.write() = bytemuck::cast_slice(data).to_vec();
        self.tracker.changed();
    }

    pub fn read_data(&self) -> RwLockReadGuard<'_, Vec<u8>> {
        self.data.read()
    }
}

/// Cloning copies the content under a fresh id.
impl Clone for Buffer {
    fn clone(&self) -> Self {
        Self {
            id: UniqueId::next(IdTag::Buffer),
            label: self.label.clone(),
            usage: self.usage,
            data: RwLock::new(self.data.read().clone()),
            tracker: self.tracker.clone(),
        }
    }
}
