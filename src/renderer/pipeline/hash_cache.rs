use rustc_hash::FxHashMap;

use super::hash::{Hash128, HashReference, PipelineHashStorage, hash_object};
use crate::core::{IdTag, UniqueId};

/// Per-tag table of memoized object hashes.
///
/// Entries never expire on their own: callers [`invalidate`](Self::invalidate)
/// an object after changing something it hashes, or [`reset`](Self::reset)
/// the whole cache after structural changes.
#[derive(Debug, Default)]
pub struct PipelineHashCache {
    tables: [FxHashMap<u64, Hash128>; IdTag::COUNT],
}

impl PipelineHashCache {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    pub fn reset(&mut self) {
        for table in &mut self.tables {
            table.clear();
        }
    }

    /// Forgets one object's hash. Returns whether an entry existed.
    pub fn invalidate(&mut self, id: UniqueId) -> bool {
        match id.tag() {
            Some(tag) => self.tables[tag.index()].remove(&id.id_part()).is_some(),
            None => false,
        }
    }

    #[must_use]
    pub fn find(&self, id: UniqueId) -> Option<Hash128> {
        self.get_hash(id)
    }

    /// Re-hashes `object` even if a hash is stored, and stores the result.
    pub fn update<T: HashReference + ?Sized>(&mut self, object: &T) -> Hash128 {
        let id = object.hash_id();
        self.invalidate(id);
        let hash = hash_object(object, Some(&mut *self));
        self.add_hash(id, hash);
        hash
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.tables.iter().map(FxHashMap::len).sum()
    }

    #[must_use]
    pub fn len_of(&self, tag: IdTag) -> usize {
        self.tables[tag.index()].len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.tables.iter().all(FxHashMap::is_empty)
    }
}

impl PipelineHashStorage for PipelineHashCache {
    fn get_hash(&self, id: UniqueId) -> Option<Hash128> {
        let tag = id.tag()?;
        self.tables[tag.index()].get(&id.id_part()).copied()
    }

    fn add_hash(&mut self, id: UniqueId, hash: Hash128) {
        if let Some(tag) = id.tag() {
            self.tables[tag.index()].insert(id.id_part(), hash);
        } else {
            log::warn!("Ignoring hash for untagged id {id}");
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_partitioned_by_tag() {
        let mut cache = PipelineHashCache::new();
        let raw = UniqueId::from_raw(5);
        cache.add_hash(raw.with_tag(IdTag::Mesh), 1);
        cache.add_hash(raw.with_tag(IdTag::Feature), 2);

        assert_eq!(cache.find(raw.with_tag(IdTag::Mesh)), Some(1));
        assert_eq!(cache.find(raw.with_tag(IdTag::Feature)), Some(2));
        assert_eq!(cache.len(), 2);
        assert_eq!(cache.len_of(IdTag::Mesh), 1);
    }

    #[test]
    fn test_invalidate_and_reset() {
        let mut cache = PipelineHashCache::new();
        let a = UniqueId::next(IdTag::Material);
        let b = UniqueId::next(IdTag::Material);
        cache.add_hash(a, 10);
        cache.add_hash(b, 20);

        assert!(cache.invalidate(a));
        assert!(!cache.invalidate(a));
        assert_eq!(cache.find(b), Some(20));

        cache.reset();
        assert!(cache.is_empty());
    }
}
