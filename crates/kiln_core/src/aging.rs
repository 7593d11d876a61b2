//! Frame-based cache entry aging.
//!
//! Keyed caches attach a `last_touched` frame number to each entry. An entry
//! survives while `current_frame - last_touched <= threshold` and is dropped
//! once the difference exceeds the threshold.

/// Returns `true` when an entry last touched at `last_touched` should be evicted.
#[inline]
#[must_use]
pub fn is_stale(last_touched: u64, current_frame: u64, threshold: u64) -> bool {
    current_frame.saturating_sub(last_touched) > threshold
}
