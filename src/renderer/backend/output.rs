//! Frame output images.

use super::{GpuBackend, TextureCreateDesc, TextureHandle};
use crate::errors::{GfxError, Result};

/// The image a frame renders into.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct OutputImage {
    pub texture: TextureHandle,
    pub format: wgpu::TextureFormat,
    pub size: (u32, u32),
}

/// Source of per-frame output images (a swapchain or an offscreen target).
pub trait RenderOutput {
    fn acquire(&mut self, backend: &dyn GpuBackend) -> Result<OutputImage>;

    /// Rebuilds the output after an acquire failure or a device change.
    fn recreate(&mut self, backend: &dyn GpuBackend);

    fn present(&mut self);

    /// Drops backend objects, the next acquire recreates them.
    fn release(&mut self, backend: &dyn GpuBackend);

    /// Forgets backend objects of a lost device without destroying them.
    fn invalidate(&mut self);
}

/// Renders into a backend texture.
#[derive(Debug)]
pub struct OffscreenOutput {
    format: wgpu::TextureFormat,
    size: (u32, u32),
    texture: Option<TextureHandle>,
    presented: u64,
}

impl OffscreenOutput {
    #[must_use]
    pub fn new(format: wgpu::TextureFormat, width: u32, height: u32) -> Self {
        Self {
            format,
            size: (width, height),
            texture: None,
            presented: 0,
        }
    }

    pub fn resize(&mut self, backend: &dyn GpuBackend, width: u32, height: u32) {
        if self.size != (width, height) {
            self.size = (width, height);
            self.release(backend);
        }
    }

    /// Number of frames presented so far.
    #[must_use]
    pub fn presented_frames(&self) -> u64 {
        self.presented
    }

    fn create(&self, backend: &dyn GpuBackend) -> Result<TextureHandle> {
        if self.size.0 == 0 || self.size.1 == 0 {
            return Err(GfxError::OutputAcquireFailed("zero sized output".to_string()));
        }
        backend.create_texture(&TextureCreateDesc {
            label: "Offscreen Output".to_string(),
            size: wgpu::Extent3d {
                width: self.size.0,
                height: self.size.1,
                depth_or_array_layers: 1,
            },
            mip_level_count: 1,
            sample_count: 1,
            dimension: wgpu::TextureDimension::D2,
            view_dimension: wgpu::TextureViewDimension::D2,
            format: self.format,
            usage: wgpu::TextureUsages::RENDER_ATTACHMENT | wgpu::TextureUsages::COPY_SRC,
        })
    }
}

impl RenderOutput for OffscreenOutput {
    fn acquire(&mut self, backend: &dyn GpuBackend) -> Result<OutputImage> {
        let texture = match self.texture {
            Some(texture) => texture,
            None => {
                let texture = self
                    .create(backend)
                    .map_err(|e| GfxError::OutputAcquireFailed(e.to_string()))?;
                self.texture = Some(texture);
                texture
            }
        };
        Ok(OutputImage {
            texture,
            format: self.format,
            size: self.size,
        })
    }

    fn recreate(&mut self, backend: &dyn GpuBackend) {
        self.release(backend);
    }

    fn present(&mut self) {
        self.presented += 1;
    }

    fn release(&mut self, backend: &dyn GpuBackend) {
        if let Some(texture) = self.texture.take() {
            backend.destroy_texture(texture);
        }
    }

    fn invalidate(&mut self) {
        self.texture = None;
    }
}
