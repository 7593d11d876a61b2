use parking_lot::{RwLock, RwLockReadGuard};
use wgpu::{AddressMode, TextureDimension, TextureFormat, TextureViewDimension};

use crate::core::{ChangeTracker, IdTag, UniqueId};

// ============================================================================
// Sampler State
// ============================================================================

/// Sampler parameters attached to a texture.
///
/// Hashable so identical states share one backend sampler.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct SamplerState {
    pub address_mode_u: AddressMode,
    pub address_mode_v: AddressMode,
    pub address_mode_w: AddressMode,
    pub mag_filter: wgpu::FilterMode,
    pub min_filter: wgpu::FilterMode,
    pub mipmap_filter: wgpu::MipmapFilterMode,
    /// Comparison function for depth textures (shadow PCF)
    pub compare: Option<wgpu::CompareFunction>,
    /// 1 disables anisotropic filtering
    pub anisotropy_clamp: u16,
}

impl Default for SamplerState {
    fn default() -> Self {
        Self {
            address_mode_u: AddressMode::Repeat,
            address_mode_v: AddressMode::Repeat,
            address_mode_w: AddressMode::Repeat,
            mag_filter: wgpu::FilterMode::Linear,
            min_filter: wgpu::FilterMode::Linear,
            mipmap_filter: wgpu::MipmapFilterMode::Linear,
            compare: None,
            anisotropy_clamp: 1,
        }
    }
}

impl SamplerState {
    #[must_use]
    pub fn clamped() -> Self {
        Self {
            address_mode_u: AddressMode::ClampToEdge,
            address_mode_v: AddressMode::ClampToEdge,
            address_mode_w: AddressMode::ClampToEdge,
            ..Default::default()
        }
    }
}

// ============================================================================
// Texture
// ============================================================================

/// Storage description of a texture.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct TextureDesc {
    pub width: u32,
    pub height: u32,
    /// Depth for 3D textures, layer count for arrays and cube maps
    pub depth_or_array_layers: u32,
    pub dimension: TextureDimension,
    pub view_dimension: TextureViewDimension,
    pub format: TextureFormat,
    pub mip_level_count: u32,
}

impl TextureDesc {
    #[must_use]
    pub fn new_2d(width: u32, height: u32, format: TextureFormat) -> Self {
        Self {
            width,
            height,
            depth_or_array_layers: 1,
            dimension: TextureDimension::D2,
            view_dimension: TextureViewDimension::D2,
            format,
            mip_level_count: 1,
        }
    }

    #[must_use]
    pub fn new_cube(size: u32, format: TextureFormat) -> Self {
        Self {
            depth_or_array_layers: 6,
            view_dimension: TextureViewDimension::Cube,
            ..Self::new_2d(size, size, format)
        }
    }

    #[must_use]
    pub fn extent(&self) -> wgpu::Extent3d {
        wgpu::Extent3d {
            width: self.width,
            height: self.height,
            depth_or_array_layers: self.depth_or_array_layers,
        }
    }

    /// Bytes per texel, 4 when the format has no single block size.
    #[must_use]
    pub fn bytes_per_pixel(&self) -> u32 {
        self.format
            .block_copy_size(Some(wgpu::TextureAspect::All))
            .unwrap_or(4)
    }
}

#[derive(Debug, Clone)]
struct TextureContent {
    desc: TextureDesc,
    data: Option<Vec<u8>>,
    sampler: SamplerState,
}

/// CPU-side texture: description, optional texel data and sampler state.
///
/// Every content change (data, size, format or sampler) bumps the version once.
#[derive(Debug)]
pub struct Texture {
    id: UniqueId,
    pub label: String,
    content: RwLock<TextureContent>,
    tracker: ChangeTracker,
}

impl Texture {
    #[must_use]
    pub fn new(label: &str, desc: TextureDesc, data: Option<Vec<u8>>) -> Self {
        let sampler = if desc.view_dimension == TextureViewDimension::Cube {
            SamplerState::clamped()
        } else {
            SamplerState::default()
        };
        Self {
            id: UniqueId::next(IdTag::Texture),
            label: label.to_string(),
            content: RwLock::new(TextureContent { desc, data, sampler }),
            tracker: ChangeTracker::new(),
        }
    }

    #[must_use]
    pub fn new_2d(label: &str, width: u32, height: u32, data: Option<Vec<u8>>, format: TextureFormat) -> Self {
        Self::new(label, TextureDesc::new_2d(width, height, format), data)
    }

    /// A 1x1 RGBA8 texture filled with `color`.
    #[must_use]
    pub fn solid_color(label: &str, color: [u8; 4]) -> Self {
        Self::new_2d(label, 1, 1, Some(color.to_vec()), TextureFormat::Rgba8Unorm)
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

    #[must_use]
    pub fn desc(&self) -> TextureDesc {
        self.content.read().desc
    }

    #[must_use]
    pub fn sampler(&self) -> SamplerState {
        self.content.read().sampler
    }

    /// Texel data, `None` for render targets.
    pub fn data(&self) -> parking_lot::MappedRwLockReadGuard<'_, Option<Vec<u8>>> {
        RwLockReadGuard::map(self.content.read(), |c| &c.data)
    }

    pub fn set_data(&self, data: Vec<u8>) {
        self.content.write().data = Some(data);
        self.tracker.changed();
    }

    pub fn set_sampler(&self, sampler: SamplerState) {
        self.content.write().sampler = sampler;
        self.tracker.changed();
    }

    /// Changes the size, dropping texel data that no longer fits.
    pub fn resize(&self, width: u32, height: u32) {
        {
            let mut content = self.content.write();
            if content.desc.width == width && content.desc.height == height {
                return;
            }
            content.desc.width = width;
            content.desc.height = height;
            content.data = None;
        }
        self.tracker.changed();
    }

    pub fn set_format(&self, format: TextureFormat) {
        {
            let mut content = self.content.write();
            if content.desc.format == format {
                return;
            }
            content.desc.format = format;
            content.data = None;
        }
        self.tracker.changed();
    }
}

/// Cloning copies the content under a fresh id.
impl Clone for Texture {
    fn clone(&self) -> Self {
        Self {
            id: UniqueId::next(IdTag::Texture),
            label: self.label.clone(),
            content: RwLock::new(self.content.read().clone()),
            tracker: self.tracker.clone(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_each_change_bumps_once() {
        let texture = Texture::solid_color("white", [255; 4]);
        assert_eq!(texture.version(), 0);

        texture.set_data(vec![0; 4]);
        assert_eq!(texture.version(), 1);

        texture.set_sampler(SamplerState::clamped());
        assert_eq!(texture.version(), 2);

        let _ = texture.desc();
        let _ = texture.sampler();
        assert_eq!(texture.version(), 2);
    }

    #[test]
    fn test_resize_same_size_is_noop() {
        let texture = Texture::new_2d("rt", 64, 64, None, TextureFormat::Rgba8Unorm);
        texture.resize(64, 64);
        assert_eq!(texture.version(), 0);
        texture.resize(128, 64);
        assert_eq!(texture.version(), 1);
        assert_eq!(texture.desc().width, 128);
    }

    #[test]
    fn test_cube_defaults_to_clamp() {
        let texture = Texture::new("env", TextureDesc::new_cube(16, TextureFormat::Rgba16Float), None);
        assert_eq!(texture.sampler().address_mode_u, AddressMode::ClampToEdge);
        assert_eq!(texture.desc().depth_or_array_layers, 6);
    }
}
