//! Renderer Settings
//!
//! Plain configuration structs consumed when the context and renderer are
//! created. Every field has a documented default.
//!
//! # Quick Start
//!
//! ```rust,ignore
//! use kiln::renderer::{RendererSettings, CacheSettings};
//!
//! let settings = RendererSettings {
//!     cache: CacheSettings {
//!         eviction_threshold_frames: 240,
//!         ..Default::default()
//!     },
//!     ..Default::default()
//! };
//! ```

// ---------------------------------------------------------------------------
// ContextSettings
// ---------------------------------------------------------------------------

/// Adapter and device request configuration.
///
/// | Field                    | Description                        | Default            |
/// |--------------------------|------------------------------------|--------------------|
/// | `label`                  | Device debug label                 | `"kiln device"`    |
/// | `power_preference`       | GPU adapter selection strategy     | `HighPerformance`  |
/// | `required_features`      | Required wgpu features             | Empty              |
/// | `required_limits`        | Required wgpu limits               | Default            |
/// | `force_fallback_adapter` | Use the software adapter           | `false`            |
/// | `acquire_attempts`       | Output acquire tries per frame     | `2`                |
#[derive(Debug, Clone)]
pub struct ContextSettings {
    /// Debug label given to the device.
    pub label: String,

    /// GPU adapter selection preference.
    ///
    /// - `HighPerformance`: Prefer discrete / dedicated GPU
    /// - `LowPower`: Prefer integrated GPU (better battery life)
    pub power_preference: wgpu::PowerPreference,

    /// Required wgpu features that must be supported by the adapter.
    ///
    /// The device request fails if these features are unavailable.
    pub required_features: wgpu::Features,

    /// Required wgpu limits (max buffer sizes, binding counts, etc.).
    pub required_limits: wgpu::Limits,

    /// Request the fallback (software) adapter.
    pub force_fallback_adapter: bool,

    /// How many times `begin_frame` tries to acquire the output image,
    /// recreating the output between tries.
    pub acquire_attempts: u32,
}

impl Default for ContextSettings {
    fn default() -> Self {
        Self {
            label: "kiln device".to_string(),
            power_preference: wgpu::PowerPreference::HighPerformance,
            required_features: wgpu::Features::empty(),
            required_limits: wgpu::Limits::default(),
            force_fallback_adapter: false,
            acquire_attempts: 2,
        }
    }
}

// ---------------------------------------------------------------------------
// CacheSettings
// ---------------------------------------------------------------------------

/// Eviction thresholds of the frame-aged caches.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CacheSettings {
    /// Versioned resource entries unused for more frames than this are released.
    pub eviction_threshold_frames: u64,
    /// Samplers unused for more frames than this are released.
    pub sampler_eviction_threshold_frames: u64,
}

impl Default for CacheSettings {
    fn default() -> Self {
        Self {
            eviction_threshold_frames: 120,
            sampler_eviction_threshold_frames: 600,
        }
    }
}

// ---------------------------------------------------------------------------
// RendererSettings
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Default)]
pub struct RendererSettings {
    pub context: ContextSettings,
    pub cache: CacheSettings,
}
