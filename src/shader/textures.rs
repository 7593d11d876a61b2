//! Texture slot bindings shared by the generator and the pipeline layout.

use super::types::TextureType;

/// One texture slot and its default sampler.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct TextureBinding {
    pub name: String,
    pub binding: u32,
    pub default_sampler_binding: u32,
    /// Index `N` of the `texCoordN` input sampled by default
    pub default_texcoord_binding: u8,
    pub ty: TextureType,
}

#[derive(Debug, Clone, PartialEq, Eq, Hash, Default)]
pub struct TextureBindingLayout {
    pub bindings: Vec<TextureBinding>,
}

impl TextureBindingLayout {
    #[must_use]
    pub fn find(&self, name: &str) -> Option<&TextureBinding> {
        self.bindings.iter().find(|b| b.name == name)
    }

    #[inline]
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.bindings.is_empty()
    }
}

#[derive(Debug, Clone)]
struct TextureSlot {
    name: String,
    ty: TextureType,
    default_texcoord_binding: u8,
}

/// Collects texture slots in declaration order and assigns bindings.
///
/// Each slot takes two consecutive bindings: the texture, then its sampler.
#[derive(Debug, Clone, Default)]
pub struct TextureBindingLayoutBuilder {
    slots: Vec<TextureSlot>,
}

impl TextureBindingLayoutBuilder {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    pub fn add_or_update_slot(&mut self, name: &str, ty: TextureType, default_texcoord_binding: u8) {
        if let Some(slot) = self.slots.iter_mut().find(|s| s.name == name) {
            slot.ty = ty;
            slot.default_texcoord_binding = default_texcoord_binding;
        } else {
            self.slots.push(TextureSlot {
                name: name.to_string(),
                ty,
                default_texcoord_binding,
            });
        }
    }

    /// Changes the default texture coordinate of an existing slot.
    ///
    /// Returns `false` when no slot has that name.
    pub fn try_update_slot(&mut self, name: &str, default_texcoord_binding: u8) -> bool {
        match self.slots.iter_mut().find(|s| s.name == name) {
            Some(slot) => {
                slot.default_texcoord_binding = default_texcoord_binding;
                true
            }
            None => false,
        }
    }

    /// Produces the layout with bindings starting at `first_binding`.
    ///
    /// Also returns the next free binding index.
    #[must_use]
    pub fn current_layout(&self, first_binding: u32) -> (TextureBindingLayout, u32) {
        let mut counter = first_binding;
        let bindings = self
            .slots
            .iter()
            .map(|slot| {
                let binding = counter;
                counter += 2;
                TextureBinding {
                    name: slot.name.clone(),
                    binding,
                    default_sampler_binding: binding + 1,
                    default_texcoord_binding: slot.default_texcoord_binding,
                    ty: slot.ty,
                }
            })
            .collect();
        (TextureBindingLayout { bindings }, counter)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_interleaved_bindings() {
        let mut builder = TextureBindingLayoutBuilder::new();
        builder.add_or_update_slot("baseColor", TextureType::default(), 0);
        builder.add_or_update_slot("normalMap", TextureType::default(), 0);
        let (layout, next) = builder.current_layout(2);
        assert_eq!(layout.bindings[0].binding, 2);
        assert_eq!(layout.bindings[0].default_sampler_binding, 3);
        assert_eq!(layout.bindings[1].binding, 4);
        assert_eq!(next, 6);
    }

    #[test]
    fn test_update_texcoord() {
        let mut builder = TextureBindingLayoutBuilder::new();
        builder.add_or_update_slot("baseColor", TextureType::default(), 0);
        assert!(builder.try_update_slot("baseColor", 1));
        assert!(!builder.try_update_slot("missing", 1));
        let (layout, _) = builder.current_layout(0);
        assert_eq!(layout.find("baseColor").unwrap().default_texcoord_binding, 1);
    }
}
