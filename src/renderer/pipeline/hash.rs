//! Content hashing for pipeline keys.
//!
//! A [`PipelineHashCollector`] walks the drawable → material → feature graph
//! and produces a 128-bit xxh3 digest. Plain values are fed with
//! [`hash_value`](PipelineHashCollector::hash_value); shared objects go through
//! [`hash_reference`](PipelineHashCollector::hash_reference), which memoizes
//! their digest in a [`PipelineHashStorage`] so an object referenced by many
//! owners is traversed once.
//!
//! Numbers are always fed as fixed-width little-endian bytes, so digests do not
//! depend on the platform.

use std::hash::{Hash, Hasher};

use xxhash_rust::xxh3::Xxh3;

use crate::core::UniqueId;

/// A 128-bit content hash.
pub type Hash128 = u128;

/// Memoized sub-hashes keyed by object identity.
pub trait PipelineHashStorage {
    fn get_hash(&self, id: UniqueId) -> Option<Hash128>;
    fn add_hash(&mut self, id: UniqueId, hash: Hash128);
}

/// Contribution of an object to a pipeline key.
///
/// Implementations visit their fields in declaration order.
pub trait PipelineHash {
    fn pipeline_hash(&self, collector: &mut PipelineHashCollector<'_>);
}

/// A shared object whose digest can be memoized under its id.
pub trait HashReference: PipelineHash {
    fn hash_id(&self) -> UniqueId;
}

/// `std::hash::Hasher` adapter writing integers little-endian into xxh3.
struct LeHasher<'h>(&'h mut Xxh3);

impl Hasher for LeHasher<'_> {
    fn finish(&self) -> u64 {
        self.0.digest()
    }

    fn write(&mut self, bytes: &[u8]) {
        self.0.update(bytes);
    }

    fn write_u16(&mut self, i: u16) {
        self.0.update(&i.to_le_bytes());
    }

    fn write_u32(&mut self, i: u32) {
        self.0.update(&i.to_le_bytes());
    }

    fn write_u64(&mut self, i: u64) {
        self.0.update(&i.to_le_bytes());
    }

    fn write_u128(&mut self, i: u128) {
        self.0.update(&i.to_le_bytes());
    }

    fn write_usize(&mut self, i: usize) {
        self.0.update(&(i as u64).to_le_bytes());
    }

    fn write_i16(&mut self, i: i16) {
        self.0.update(&i.to_le_bytes());
    }

    fn write_i32(&mut self, i: i32) {
        self.0.update(&i.to_le_bytes());
    }

    fn write_i64(&mut self, i: i64) {
        self.0.update(&i.to_le_bytes());
    }

    fn write_i128(&mut self, i: i128) {
        self.0.update(&i.to_le_bytes());
    }

    fn write_isize(&mut self, i: isize) {
        self.0.update(&(i as i64).to_le_bytes());
    }
}

/// Streaming hash builder with optional memoization.
pub struct PipelineHashCollector<'a> {
    hasher: Xxh3,
    storage: Option<&'a mut dyn PipelineHashStorage>,
}

impl PipelineHashCollector<'static> {
    /// A collector without memoization; every reference is traversed.
    #[must_use]
    pub fn new() -> Self {
        Self {
            hasher: Xxh3::new(),
            storage: None,
        }
    }
}

impl Default for PipelineHashCollector<'static> {
    fn default() -> Self {
        Self::new()
    }
}

impl<'a> PipelineHashCollector<'a> {
    pub fn with_storage(storage: &'a mut dyn PipelineHashStorage) -> Self {
        Self {
            hasher: Xxh3::new(),
            storage: Some(storage),
        }
    }

    /// Feeds a plain value.
    pub fn hash_value<T: Hash + ?Sized>(&mut self, value: &T) {
        value.hash(&mut LeHasher(&mut self.hasher));
    }

    /// Feeds raw bytes with a length prefix.
    pub fn hash_bytes(&mut self, bytes: &[u8]) {
        self.hasher.update(&(bytes.len() as u64).to_le_bytes());
        self.hasher.update(bytes);
    }

    /// Feeds the digest of a shared object, computing and storing it on a miss.
    pub fn hash_reference<T: HashReference + ?Sized>(&mut self, object: &T) {
        let digest = match self.storage.as_deref_mut() {
            Some(storage) => {
                let id = object.hash_id();
                if let Some(hash) = storage.get_hash(id) {
                    hash
                } else {
                    let mut child = PipelineHashCollector {
                        hasher: Xxh3::new(),
                        storage: Some(&mut *storage),
                    };
                    object.pipeline_hash(&mut child);
                    let hash = child.finish();
                    storage.add_hash(id, hash);
                    hash
                }
            }
            None => {
                let mut child = PipelineHashCollector::new();
                object.pipeline_hash(&mut child);
                child.finish()
            }
        };
        self.hasher.update(&digest.to_le_bytes());
    }

    #[must_use]
    pub fn finish(&self) -> Hash128 {
        self.hasher.digest128()
    }
}

/// Digest of `object` on its own, as it would be stored for its id.
pub fn hash_object<T: PipelineHash + ?Sized>(
    object: &T,
    storage: Option<&mut dyn PipelineHashStorage>,
) -> Hash128 {
    let mut collector = PipelineHashCollector {
        hasher: Xxh3::new(),
        storage,
    };
    object.pipeline_hash(&mut collector);
    collector.finish()
}
