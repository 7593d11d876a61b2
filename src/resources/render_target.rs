use crate::errors::{GfxError, Result};
use crate::shader::{NamedNumType, NumType, ShaderFieldBaseType};

#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct RenderTarget {
    /// Fragment output field written to this target
    pub name: String,
    pub format: wgpu::TextureFormat,
}

impl RenderTarget {
    pub fn new(name: impl Into<String>, format: wgpu::TextureFormat) -> Self {
        Self {
            name: name.into(),
            format,
        }
    }
}

/// Targets a pipeline step renders into.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Default)]
pub struct RenderTargetLayout {
    pub targets: Vec<RenderTarget>,
    pub depth_target_index: Option<usize>,
}

impl RenderTargetLayout {
    /// A single `color` target with an optional `depth` target.
    #[must_use]
    pub fn color_depth(color: wgpu::TextureFormat, depth: Option<wgpu::TextureFormat>) -> Self {
        let mut layout = Self {
            targets: vec![RenderTarget::new("color", color)],
            depth_target_index: None,
        };
        if let Some(depth) = depth {
            layout.depth_target_index = Some(layout.targets.len());
            layout.targets.push(RenderTarget::new("depth", depth));
        }
        layout
    }

    #[must_use]
    pub fn depth_target(&self) -> Option<&RenderTarget> {
        self.depth_target_index.and_then(|i| self.targets.get(i))
    }

    /// Targets excluding the depth target, in declaration order.
    pub fn color_targets(&self) -> impl Iterator<Item = &RenderTarget> {
        self.targets
            .iter()
            .enumerate()
            .filter(move |(i, _)| Some(*i) != self.depth_target_index)
            .map(|(_, target)| target)
    }

    /// Fragment output fields matching the color targets.
    pub fn color_output_fields(&self) -> Result<Vec<NamedNumType>> {
        self.color_targets()
            .map(|target| {
                let base_type = match target.format.sample_type(None, None) {
                    Some(wgpu::TextureSampleType::Float { .. }) => ShaderFieldBaseType::Float32,
                    Some(wgpu::TextureSampleType::Uint) => ShaderFieldBaseType::UInt32,
                    Some(wgpu::TextureSampleType::Sint) => ShaderFieldBaseType::Int32,
                    _ => return Err(GfxError::UnsupportedTargetFormat(target.format)),
                };
                let components = target.format.components();
                Ok(NamedNumType::new(
                    target.name.clone(),
                    NumType::new(base_type, components),
                ))
            })
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_output_fields_skip_depth() {
        let layout = RenderTargetLayout::color_depth(
            wgpu::TextureFormat::Rgba8UnormSrgb,
            Some(wgpu::TextureFormat::Depth32Float),
        );
        let fields = layout.color_output_fields().unwrap();
        assert_eq!(fields, vec![NamedNumType::new("color", NumType::FLOAT4)]);
        assert_eq!(layout.depth_target().unwrap().name, "depth");
    }

    #[test]
    fn test_integer_target() {
        let layout = RenderTargetLayout {
            targets: vec![RenderTarget::new("objectId", wgpu::TextureFormat::R32Uint)],
            depth_target_index: None,
        };
        let fields = layout.color_output_fields().unwrap();
        assert_eq!(fields[0].ty, NumType::UINT32);
    }
}
