//! Versioned GPU Resource Cache
//!
//! Keeps backend copies of meshes, textures and buffers in sync with their
//! CPU-side content. Each entity kind has its own [`ContextDataTable`] keyed by
//! the id part of the entity's [`UniqueId`]; [`ContextDataStorage`] groups the
//! three tables and routes `(kind, id)` pairs to the right one.
//!
//! A lookup compares the entity version at most once per frame:
//!
//! ```text
//! get_or_update(entity, frame)
//!   ├─ absent or from an older device generation → init_context_data
//!   └─ last_checked != frame
//!        ├─ version changed → update_context_data
//!        └─ last_checked = frame
//! ```
//!
//! Backend failures during init or update are logged and leave the handles
//! empty; the next content change retries.

use std::any::Any;
use std::sync::{Arc, Weak};

use parking_lot::RwLock;
use rustc_hash::FxHashMap;

use super::backend::{BufferDesc, BufferHandle, GpuBackend, TextureCreateDesc, TextureHandle, TextureWrite};
use crate::core::{IdTag, UniqueId, is_stale};
use crate::resources::{Buffer, Mesh, MeshFormat, SamplerState, Texture, TextureDesc};

/// Sentinel for "never checked" and "never synced".
const NEVER: u64 = u64::MAX;

// ============================================================================
// Traits
// ============================================================================

/// Backend objects owned by a cache entry.
pub trait GpuObjectData: Send + Sync {
    /// Destroys the backend objects.
    fn release(&mut self, backend: &dyn GpuBackend);
}

/// An entity with a versioned backend copy.
pub trait ContextDataSource {
    type Data: GpuObjectData;

    fn id(&self) -> UniqueId;
    fn version(&self) -> u64;

    /// One-time creation of the backend data.
    fn init_context_data(&self, backend: &dyn GpuBackend) -> Self::Data;

    /// Re-uploads content after a version change.
    fn update_context_data(&self, data: &mut Self::Data, backend: &dyn GpuBackend);

    /// The table holding this kind in `storage`.
    fn table(storage: &mut ContextDataStorage) -> &mut ContextDataTable<Self::Data>;
}

// ============================================================================
// ContextData
// ============================================================================

/// Backend data of one entity plus its sync bookkeeping.
#[derive(Debug)]
pub struct ContextData<T> {
    pub data: T,
    /// Last frame the entity version was compared
    pub last_checked: u64,
    /// Entity version the data was last synced to
    pub version: u64,
    /// Device generation the data was created against
    pub generation: u64,
}

impl<T> ContextData<T> {
    fn new(data: T, generation: u64) -> Self {
        Self {
            data,
            last_checked: NEVER,
            version: NEVER,
            generation,
        }
    }

    #[inline]
    #[must_use]
    pub fn is_synced_to(&self, version: u64) -> bool {
        self.version == version
    }
}

// ============================================================================
// Tables
// ============================================================================

#[derive(Debug)]
pub struct ContextDataTable<T> {
    entries: FxHashMap<u64, ContextData<T>>,
}

impl<T> Default for ContextDataTable<T> {
    fn default() -> Self {
        Self {
            entries: FxHashMap::default(),
        }
    }
}

impl<T: GpuObjectData> ContextDataTable<T> {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Finds or creates the entry of `entity` and syncs it once per frame.
    pub fn get_or_update<S>(
        &mut self,
        entity: &S,
        frame: u64,
        backend: &dyn GpuBackend,
        generation: u64,
    ) -> &mut ContextData<T>
    where
        S: ContextDataSource<Data = T> + ?Sized,
    {
        let key = entity.id().id_part();
        let entry = match self.entries.entry(key) {
            std::collections::hash_map::Entry::Occupied(occupied) => {
                let entry = occupied.into_mut();
                if entry.generation != generation {
                    // Objects of a lost device are gone already, do not release them.
                    log::debug!("Re-creating context data of {} for generation {generation}", entity.id());
                    *entry = ContextData::new(entity.init_context_data(backend), generation);
                }
                entry
            }
            std::collections::hash_map::Entry::Vacant(vacant) => {
                vacant.insert(ContextData::new(entity.init_context_data(backend), generation))
            }
        };

        if entry.last_checked != frame {
            let version = entity.version();
            if entry.version != version {
                entity.update_context_data(&mut entry.data, backend);
                entry.version = version;
            }
            entry.last_checked = frame;
        }
        entry
    }

    #[must_use]
    pub fn get(&self, id: UniqueId) -> Option<&ContextData<T>> {
        self.entries.get(&id.id_part())
    }

    /// Removes and releases the entry of `id`.
    pub fn remove(&mut self, id: UniqueId, backend: &dyn GpuBackend) -> bool {
        match self.entries.remove(&id.id_part()) {
            Some(mut entry) => {
                entry.data.release(backend);
                true
            }
            None => false,
        }
    }

    /// Releases entries not checked for more than `threshold` frames.
    ///
    /// Returns the number of evicted entries.
    pub fn evict_stale(&mut self, frame: u64, threshold: u64, backend: &dyn GpuBackend) -> usize {
        let before = self.entries.len();
        self.entries.retain(|_, entry| {
            if is_stale(entry.last_checked, frame, threshold) {
                entry.data.release(backend);
                false
            } else {
                true
            }
        });
        before - self.entries.len()
    }

    /// Drops every entry without touching the backend.
    pub fn invalidate_all(&mut self) {
        self.entries.clear();
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

/// Mesh, texture and buffer tables behind one dispatcher.
#[derive(Debug, Default)]
pub struct ContextDataStorage {
    pub meshes: ContextDataTable<MeshContextData>,
    pub textures: ContextDataTable<TextureContextData>,
    pub buffers: ContextDataTable<BufferContextData>,
}

impl ContextDataStorage {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    pub fn get_or_update<S: ContextDataSource>(
        &mut self,
        entity: &S,
        frame: u64,
        backend: &dyn GpuBackend,
        generation: u64,
    ) -> &mut ContextData<S::Data> {
        S::table(self).get_or_update(entity, frame, backend, generation)
    }

    /// Routes removal by the id's tag. Ids of other kinds are ignored.
    pub fn remove(&mut self, id: UniqueId, backend: &dyn GpuBackend) -> bool {
        match id.tag() {
            Some(IdTag::Mesh) => self.meshes.remove(id, backend),
            Some(IdTag::Texture) => self.textures.remove(id, backend),
            Some(IdTag::Buffer) => self.buffers.remove(id, backend),
            _ => false,
        }
    }

    pub fn evict_stale(&mut self, frame: u64, threshold: u64, backend: &dyn GpuBackend) -> usize {
        let evicted = self.meshes.evict_stale(frame, threshold, backend)
            + self.textures.evict_stale(frame, threshold, backend)
            + self.buffers.evict_stale(frame, threshold, backend);
        if evicted > 0 {
            log::debug!("Evicted {evicted} stale context data entries at frame {frame}");
        }
        evicted
    }

    pub fn invalidate_all(&mut self) {
        self.meshes.invalidate_all();
        self.textures.invalidate_all();
        self.buffers.invalidate_all();
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.meshes.len() + self.textures.len() + self.buffers.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

// ============================================================================
// Registry
// ============================================================================

/// Thread-safe set of GPU-backed entities whose context data should be
/// dropped once they are.
///
/// Any thread may [`register`](Self::register); the render thread calls
/// [`sweep`](Self::sweep) once per frame.
#[derive(Default)]
pub struct ResourceRegistry {
    entries: RwLock<FxHashMap<UniqueId, Weak<dyn Any + Send + Sync>>>,
}

impl ResourceRegistry {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    pub fn register<T: ContextDataSource + Any + Send + Sync>(&self, entity: &Arc<T>) {
        let weak = Arc::downgrade(entity);
        let weak: Weak<dyn Any + Send + Sync> = weak;
        self.entries.write().insert(entity.id(), weak);
    }

    #[must_use]
    pub fn contains(&self, id: UniqueId) -> bool {
        self.entries.read().contains_key(&id)
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.entries.read().len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.entries.read().is_empty()
    }

    /// Forgets dropped entities and releases their context data.
    ///
    /// Returns the ids that were removed.
    pub fn sweep(&self, storage: &mut ContextDataStorage, backend: &dyn GpuBackend) -> Vec<UniqueId> {
        let dead: Vec<UniqueId> = {
            let entries = self.entries.read();
            entries
                .iter()
                .filter(|(_, weak)| weak.strong_count() == 0)
                .map(|(id, _)| *id)
                .collect()
        };
        if dead.is_empty() {
            return dead;
        }

        let mut entries = self.entries.write();
        for id in &dead {
            entries.remove(id);
            storage.remove(*id, backend);
        }
        log::trace!("Swept {} dropped resources", dead.len());
        dead
    }
}

// ============================================================================
// Mesh
// ============================================================================

#[derive(Debug, Default)]
pub struct MeshContextData {
    pub vertex_buffer: Option<BufferHandle>,
    pub index_buffer: Option<BufferHandle>,
    pub vertex_capacity: u64,
    pub index_capacity: u64,
    pub num_vertices: usize,
    pub num_indices: usize,
    pub format: MeshFormat,
}

impl GpuObjectData for MeshContextData {
    fn release(&mut self, backend: &dyn GpuBackend) {
        if let Some(buffer) = self.vertex_buffer.take() {
            backend.destroy_buffer(buffer);
        }
        if let Some(buffer) = self.index_buffer.take() {
            backend.destroy_buffer(buffer);
        }
        self.vertex_capacity = 0;
        self.index_capacity = 0;
    }
}

/// Writes `data` into `slot`, re-creating the buffer when it is too small.
fn upload_into(
    backend: &dyn GpuBackend,
    slot: &mut Option<BufferHandle>,
    capacity: &mut u64,
    label: &str,
    usage: wgpu::BufferUsages,
    data: &[u8],
) {
    if data.is_empty() {
        return;
    }
    let size = data.len() as u64;
    if slot.is_none() || size > *capacity {
        if let Some(old) = slot.take() {
            log::debug!("Resizing buffer {label:?} from {capacity} to {size}");
            backend.destroy_buffer(old);
        }
        *capacity = 0;
        match backend.create_buffer(&BufferDesc {
            label: label.to_string(),
            size,
            usage: usage | wgpu::BufferUsages::COPY_DST,
        }) {
            Ok(buffer) => {
                *slot = Some(buffer);
                *capacity = size;
            }
            Err(e) => {
                log::error!("{e}");
                return;
            }
        }
    }
    if let Some(buffer) = *slot
        && let Err(e) = backend.write_buffer(buffer, 0, data)
    {
        log::error!("{e}");
    }
}

impl ContextDataSource for Mesh {
    type Data = MeshContextData;

    fn id(&self) -> UniqueId {
        Mesh::id(self)
    }

    fn version(&self) -> u64 {
        Mesh::version(self)
    }

    fn init_context_data(&self, _backend: &dyn GpuBackend) -> MeshContextData {
        MeshContextData::default()
    }

    fn update_context_data(&self, data: &mut MeshContextData, backend: &dyn GpuBackend) {
        let mesh = self.read();
        upload_into(
            backend,
            &mut data.vertex_buffer,
            &mut data.vertex_capacity,
            &format!("{} vertices", self.label),
            wgpu::BufferUsages::VERTEX,
            &mesh.vertex_data,
        );
        upload_into(
            backend,
            &mut data.index_buffer,
            &mut data.index_capacity,
            &format!("{} indices", self.label),
            wgpu::BufferUsages::INDEX,
            &mesh.index_data,
        );
        data.num_vertices = mesh.num_vertices();
        data.num_indices = mesh.num_indices();
        data.format = mesh.format.clone();
    }

    fn table(storage: &mut ContextDataStorage) -> &mut ContextDataTable<MeshContextData> {
        &mut storage.meshes
    }
}

// ============================================================================
// Texture
// ============================================================================

#[derive(Debug, Default)]
pub struct TextureContextData {
    pub texture: Option<TextureHandle>,
    /// Description the backend texture was created with
    pub desc: Option<TextureDesc>,
    pub sampler: SamplerState,
}

impl GpuObjectData for TextureContextData {
    fn release(&mut self, backend: &dyn GpuBackend) {
        if let Some(texture) = self.texture.take() {
            backend.destroy_texture(texture);
        }
        self.desc = None;
    }
}

impl ContextDataSource for Texture {
    type Data = TextureContextData;

    fn id(&self) -> UniqueId {
        Texture::id(self)
    }

    fn version(&self) -> u64 {
        Texture::version(self)
    }

    fn init_context_data(&self, _backend: &dyn GpuBackend) -> TextureContextData {
        TextureContextData::default()
    }

    fn update_context_data(&self, data: &mut TextureContextData, backend: &dyn GpuBackend) {
        let desc = self.desc();
        data.sampler = self.sampler();

        // Size or format changes need a new texture; sampler-only changes do not.
        if data.desc != Some(desc) {
            data.release(backend);
            let mut usage = wgpu::TextureUsages::TEXTURE_BINDING | wgpu::TextureUsages::COPY_DST;
            if self.data().is_none() {
                usage |= wgpu::TextureUsages::RENDER_ATTACHMENT;
            }
            match backend.create_texture(&TextureCreateDesc {
                label: self.label.clone(),
                size: desc.extent(),
                mip_level_count: desc.mip_level_count,
                sample_count: 1,
                dimension: desc.dimension,
                view_dimension: desc.view_dimension,
                format: desc.format,
                usage,
            }) {
                Ok(texture) => {
                    data.texture = Some(texture);
                    data.desc = Some(desc);
                }
                Err(e) => {
                    log::error!("{e}");
                    return;
                }
            }
        }

        let content = self.data();
        let (Some(texture), Some(texels)) = (data.texture, (*content).as_ref()) else {
            return;
        };
        let write = TextureWrite {
            mip_level: 0,
            bytes_per_row: desc.width * desc.bytes_per_pixel(),
            rows_per_image: desc.height,
            size: desc.extent(),
        };
        if let Err(e) = backend.write_texture(texture, &write, texels) {
            log::error!("{e}");
        }
    }

    fn table(storage: &mut ContextDataStorage) -> &mut ContextDataTable<TextureContextData> {
        &mut storage.textures
    }
}

// ============================================================================
// Buffer
// ============================================================================

#[derive(Debug, Default)]
pub struct BufferContextData {
    pub buffer: Option<BufferHandle>,
    pub capacity: u64,
}

impl GpuObjectData for BufferContextData {
    fn release(&mut self, backend: &dyn GpuBackend) {
        if let Some(buffer) = self.buffer.take() {
            backend.destroy_buffer(buffer);
        }
        self.capacity = 0;
    }
}

impl ContextDataSource for Buffer {
    type Data = BufferContextData;

    fn id(&self) -> UniqueId {
        Buffer::id(self)
    }

    fn version(&self) -> u64 {
        Buffer::version(self)
    }

    fn init_context_data(&self, _backend: &dyn GpuBackend) -> BufferContextData {
        BufferContextData::default()
    }

    fn update_context_data(&self, data: &mut BufferContextData, backend: &dyn GpuBackend) {
        let bytes = self.read_data();
        upload_into(
            backend,
            &mut data.buffer,
            &mut data.capacity,
            &self.label,
            self.usage(),
            &bytes,
        );
    }

    fn table(storage: &mut ContextDataStorage) -> &mut ContextDataTable<BufferContextData> {
        &mut storage.buffers
    }
}
