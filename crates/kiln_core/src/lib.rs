//! # Kiln Core
//!
//! Primitives shared by every cache: identities, versions and entry aging.

pub mod aging;
pub mod unique_id;
pub mod version;

pub use aging::is_stale;
pub use unique_id::{IdTag, UniqueId};
pub use version::{ChangeTracker, MutGuard};
