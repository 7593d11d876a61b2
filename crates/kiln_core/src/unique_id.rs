//! Tagged Unique Identifiers
//!
//! Every cacheable entity (mesh, texture, buffer, material, feature, drawable,
//! pipeline step, view) is minted a [`UniqueId`] on construction. The id is the
//! key for every Kiln cache.
//!
//! Layout of the 64-bit value:
//!
//! | bits    | meaning                         |
//! |---------|---------------------------------|
//! | 63..56  | [`IdTag`] (entity kind)          |
//! | 55..0   | per-tag monotonically increasing counter |
//!
//! Each tag owns its own atomic counter. Only uniqueness is required, so the
//! counters use relaxed ordering.

use std::fmt;
use std::sync::atomic::{AtomicU64, Ordering};

const TAG_SHIFT: u32 = 56;
const ID_MASK: u64 = (1 << TAG_SHIFT) - 1;

/// Entity kind stored in the high byte of a [`UniqueId`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
#[repr(u8)]
pub enum IdTag {
    Mesh = 0,
    Texture = 1,
    Buffer = 2,
    Material = 3,
    Feature = 4,
    Drawable = 5,
    PipelineStep = 6,
    View = 7,
}

impl IdTag {
    pub const COUNT: usize = 8;

    pub const ALL: [IdTag; Self::COUNT] = [
        IdTag::Mesh,
        IdTag::Texture,
        IdTag::Buffer,
        IdTag::Material,
        IdTag::Feature,
        IdTag::Drawable,
        IdTag::PipelineStep,
        IdTag::View,
    ];

    #[inline]
    #[must_use]
    pub fn from_u8(value: u8) -> Option<Self> {
        Self::ALL.get(value as usize).copied()
    }

    #[inline]
    #[must_use]
    pub const fn index(self) -> usize {
        self as usize
    }
}

/// A tagged, process-unique handle for a cacheable object.
#[derive(Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Default)]
pub struct UniqueId(u64);

static COUNTERS: [AtomicU64; IdTag::COUNT] = [
    AtomicU64::new(0),
    AtomicU64::new(0),
    AtomicU64::new(0),
    AtomicU64::new(0),
    AtomicU64::new(0),
    AtomicU64::new(0),
    AtomicU64::new(0),
    AtomicU64::new(0),
];

impl UniqueId {
    /// Mints the next id for `tag`.
    #[must_use]
    pub fn next(tag: IdTag) -> Self {
        let counter = COUNTERS[tag.index()].fetch_add(1, Ordering::Relaxed);
        Self(counter & ID_MASK).with_tag(tag)
    }

    /// Builds an id from a raw counter value, without a tag.
    #[inline]
    #[must_use]
    pub const fn from_raw(value: u64) -> Self {
        Self(value)
    }

    #[inline]
    #[must_use]
    pub const fn raw(self) -> u64 {
        self.0
    }

    /// Returns the same counter value carrying `tag`.
    #[inline]
    #[must_use]
    pub const fn with_tag(self, tag: IdTag) -> Self {
        Self((self.0 & ID_MASK) | ((tag as u64) << TAG_SHIFT))
    }

    /// The raw tag byte.
    #[inline]
    #[must_use]
    pub const fn tag_bits(self) -> u8 {
        (self.0 >> TAG_SHIFT) as u8
    }

    #[inline]
    #[must_use]
    pub fn tag(self) -> Option<IdTag> {
        IdTag::from_u8(self.tag_bits())
    }

    /// The per-tag counter part.
    #[inline]
    #[must_use]
    pub const fn id_part(self) -> u64 {
        self.0 & ID_MASK
    }

    /// Resets every tag counter to zero.
    ///
    /// Test isolation only: ids handed out before the reset will be minted
    /// again, so this must never run while live entities exist.
    #[doc(hidden)]
    pub fn reset_counters() {
        for counter in &COUNTERS {
            counter.store(0, Ordering::Relaxed);
        }
    }
}

impl fmt::Debug for UniqueId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self.tag() {
            Some(tag) => write!(f, "UniqueId({tag:?}:{})", self.id_part()),
            None => write!(f, "UniqueId(?{}:{})", self.tag_bits(), self.id_part()),
        }
    }
}

impl fmt::Display for UniqueId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        fmt::Debug::fmt(self, f)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rustc_hash::FxHashSet;

    #[test]
    fn test_tag_roundtrip() {
        for tag in IdTag::ALL {
            let id = UniqueId::from_raw(0x1234_5678).with_tag(tag);
            assert_eq!(id.tag(), Some(tag));
            assert_eq!(id.id_part(), 0x1234_5678);
        }
    }

    #[test]
    fn test_retag_keeps_counter() {
        let id = UniqueId::next(IdTag::Mesh);
        let retagged = id.with_tag(IdTag::View);
        assert_eq!(retagged.tag(), Some(IdTag::View));
        assert_eq!(retagged.id_part(), id.id_part());
    }

    #[test]
    fn test_same_tag_ids_are_distinct() {
        let ids: Vec<_> = (0..1000).map(|_| UniqueId::next(IdTag::Buffer)).collect();
        let set: FxHashSet<_> = ids.iter().copied().collect();
        assert_eq!(set.len(), ids.len());
    }

    #[test]
    fn test_counter_is_masked() {
        let id = UniqueId::from_raw(u64::MAX).with_tag(IdTag::Feature);
        assert_eq!(id.id_part(), ID_MASK);
        assert_eq!(id.tag(), Some(IdTag::Feature));
    }
}
