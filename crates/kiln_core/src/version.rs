use std::sync::atomic::{AtomicU64, Ordering};

/// Content version counter for GPU-backed entities.
///
/// Incremented exactly once per content-mutating operation. Readers compare it
/// against the version their cached GPU copy was synced to.
#[derive(Debug, Default)]
pub struct ChangeTracker {
    version: AtomicU64,
}

impl ChangeTracker {
    #[must_use]
    pub fn new() -> Self {
        Self {
            version: AtomicU64::new(0),
        }
    }

    /// Marks as modified, increments version by 1
    pub fn changed(&self) -> u64 {
        self.version.fetch_add(1, Ordering::AcqRel).wrapping_add(1)
    }

    /// Gets the current version number
    #[must_use]
    pub fn version(&self) -> u64 {
        self.version.load(Ordering::Acquire)
    }
}

impl Clone for ChangeTracker {
    fn clone(&self) -> Self {
        Self {
            version: AtomicU64::new(self.version()),
        }
    }
}

/// Mutable guard - bumps the owner's version when the scope ends
pub struct MutGuard<'a, T> {
    data: &'a mut T,
    tracker: &'a ChangeTracker,
}

impl<'a, T> MutGuard<'a, T> {
    pub fn new(data: &'a mut T, tracker: &'a ChangeTracker) -> Self {
        Self { data, tracker }
    }
}

impl<T> std::ops::Deref for MutGuard<'_, T> {
    type Target = T;

    fn deref(&self) -> &Self::Target {
        self.data
    }
}

impl<T> std::ops::DerefMut for MutGuard<'_, T> {
    fn deref_mut(&mut self) -> &mut Self::Target {
        self.data
    }
}

impl<T> Drop for MutGuard<'_, T> {
    fn drop(&mut self) {
        self.tracker.changed();
    }
}
