//! Composable shader code blocks.
//!
//! A [`Block`] is evaluated against a [`GeneratorContext`], which either emits
//! WGSL text (final pass) or only records which bindings are referenced
//! (discovery pass). Blocks never emit text directly for field accesses; they
//! always go through the context so that both passes see the same accesses.

use std::fmt;
use std::sync::Arc;

use super::context::GeneratorContext;
use super::types::{FieldType, NumType};

/// Prefixes of vertex inputs forwarded by [`Block::DefaultInterpolation`].
pub const DEFAULT_INTERPOLATION_PREFIXES: [&str; 2] = ["texCoord", "color"];

/// Code generation callback run at generation time.
pub type CustomCallback = Arc<dyn Fn(&mut dyn GeneratorContext) + Send + Sync>;

#[derive(Clone)]
pub struct CustomBlock(pub CustomCallback);

impl fmt::Debug for CustomBlock {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("CustomBlock(..)")
    }
}

#[derive(Debug, Clone)]
pub enum Block {
    /// Literal WGSL text
    Direct(String),
    /// Children applied in order
    Compound(Vec<Block>),
    /// Applies `inner` when the input exists, otherwise `otherwise`
    WithInput {
        name: String,
        inner: Box<Block>,
        otherwise: Option<Box<Block>>,
    },
    /// Applies `inner` when the output exists, otherwise `otherwise`
    WithOutput {
        name: String,
        inner: Box<Block>,
        otherwise: Option<Box<Block>>,
    },
    /// Applies `inner` when the texture is bound, otherwise `otherwise`
    WithTexture {
        name: String,
        default_texcoord_required: bool,
        inner: Box<Block>,
        otherwise: Option<Box<Block>>,
    },
    /// `output.name = inner;`
    WriteOutput {
        name: String,
        ty: NumType,
        inner: Box<Block>,
    },
    ReadInput(String),
    /// `globals.name = inner;`
    WriteGlobal {
        name: String,
        ty: NumType,
        inner: Box<Block>,
    },
    ReadGlobal(String),
    ReadBuffer {
        field: String,
        ty: FieldType,
        buffer: String,
        index: Option<Box<Block>>,
    },
    /// `textureSample(t, s, coordinate)`, with the default coordinate when none is given
    SampleTexture {
        name: String,
        coordinate: Option<Box<Block>>,
    },
    /// Converts a clip-space depth value to linear view depth using the view projection
    LinearizeDepth(Box<Block>),
    Custom(CustomBlock),
    /// Forwards prefixed vertex inputs to vertex outputs nobody wrote
    DefaultInterpolation { match_prefixes: Vec<String> },
}

impl Block {
    #[must_use]
    pub fn empty() -> Self {
        Self::Compound(Vec::new())
    }

    pub fn direct(text: impl Into<String>) -> Self {
        Self::Direct(text.into())
    }

    pub fn compound(children: impl IntoIterator<Item = Block>) -> Self {
        Self::Compound(children.into_iter().collect())
    }

    pub fn read_input(name: impl Into<String>) -> Self {
        Self::ReadInput(name.into())
    }

    pub fn read_global(name: impl Into<String>) -> Self {
        Self::ReadGlobal(name.into())
    }

    pub fn write_output(name: impl Into<String>, ty: NumType, inner: impl Into<Block>) -> Self {
        Self::WriteOutput {
            name: name.into(),
            ty,
            inner: Box::new(inner.into()),
        }
    }

    pub fn write_global(name: impl Into<String>, ty: NumType, inner: impl Into<Block>) -> Self {
        Self::WriteGlobal {
            name: name.into(),
            ty,
            inner: Box::new(inner.into()),
        }
    }

    /// Reads a field of the per-draw `object` buffer.
    pub fn read_object(field: impl Into<String>, ty: impl Into<FieldType>) -> Self {
        Self::read_buffer(field, ty, "object")
    }

    pub fn read_buffer(
        field: impl Into<String>,
        ty: impl Into<FieldType>,
        buffer: impl Into<String>,
    ) -> Self {
        Self::ReadBuffer {
            field: field.into(),
            ty: ty.into(),
            buffer: buffer.into(),
            index: None,
        }
    }

    pub fn read_buffer_indexed(
        field: impl Into<String>,
        ty: impl Into<FieldType>,
        buffer: impl Into<String>,
        index: impl Into<Block>,
    ) -> Self {
        Self::ReadBuffer {
            field: field.into(),
            ty: ty.into(),
            buffer: buffer.into(),
            index: Some(Box::new(index.into())),
        }
    }

    pub fn sample_texture(name: impl Into<String>) -> Self {
        Self::SampleTexture {
            name: name.into(),
            coordinate: None,
        }
    }

    pub fn sample_texture_at(name: impl Into<String>, coordinate: impl Into<Block>) -> Self {
        Self::SampleTexture {
            name: name.into(),
            coordinate: Some(Box::new(coordinate.into())),
        }
    }

    pub fn with_input(name: impl Into<String>, inner: impl Into<Block>) -> Self {
        Self::WithInput {
            name: name.into(),
            inner: Box::new(inner.into()),
            otherwise: None,
        }
    }

    pub fn with_output(name: impl Into<String>, inner: impl Into<Block>) -> Self {
        Self::WithOutput {
            name: name.into(),
            inner: Box::new(inner.into()),
            otherwise: None,
        }
    }

    pub fn with_texture(name: impl Into<String>, inner: impl Into<Block>) -> Self {
        Self::WithTexture {
            name: name.into(),
            default_texcoord_required: true,
            inner: Box::new(inner.into()),
            otherwise: None,
        }
    }

    /// Sets the fallback branch of a `With*` block. Other blocks are returned unchanged.
    #[must_use]
    pub fn otherwise(mut self, block: impl Into<Block>) -> Self {
        match &mut self {
            Self::WithInput { otherwise, .. }
            | Self::WithOutput { otherwise, .. }
            | Self::WithTexture { otherwise, .. } => *otherwise = Some(Box::new(block.into())),
            _ => {}
        }
        self
    }

    pub fn custom(callback: impl Fn(&mut dyn GeneratorContext) + Send + Sync + 'static) -> Self {
        Self::Custom(CustomBlock(Arc::new(callback)))
    }

    #[must_use]
    pub fn default_interpolation() -> Self {
        Self::DefaultInterpolation {
            match_prefixes: DEFAULT_INTERPOLATION_PREFIXES
                .iter()
                .map(ToString::to_string)
                .collect(),
        }
    }

    pub fn apply(&self, ctx: &mut dyn GeneratorContext) {
        match self {
            Self::Direct(text) => ctx.write(text),
            Self::Compound(children) => {
                for child in children {
                    child.apply(ctx);
                }
            }
            Self::WithInput {
                name,
                inner,
                otherwise,
            } => {
                let present = ctx.has_input(name);
                apply_branch(ctx, present, inner, otherwise.as_deref());
            }
            Self::WithOutput {
                name,
                inner,
                otherwise,
            } => {
                let present = ctx.has_output(name);
                apply_branch(ctx, present, inner, otherwise.as_deref());
            }
            Self::WithTexture {
                name,
                default_texcoord_required,
                inner,
                otherwise,
            } => {
                let present = ctx.has_texture(name, *default_texcoord_required);
                apply_branch(ctx, present, inner, otherwise.as_deref());
            }
            Self::WriteOutput { name, ty, inner } => {
                ctx.write_output(name, *ty);
                ctx.write(" = ");
                inner.apply(ctx);
                ctx.write(";\n");
            }
            Self::ReadInput(name) => ctx.read_input(name),
            Self::WriteGlobal { name, ty, inner } => {
                ctx.begin_write_global(name, *ty);
                inner.apply(ctx);
                ctx.end_write_global();
            }
            Self::ReadGlobal(name) => ctx.read_global(name),
            Self::ReadBuffer {
                field,
                ty,
                buffer,
                index,
            } => ctx.read_buffer(field, *ty, buffer, index.as_deref()),
            Self::SampleTexture { name, coordinate } => {
                ctx.write("textureSample(");
                ctx.texture(name);
                ctx.write(", ");
                ctx.texture_default_sampler(name);
                ctx.write(", ");
                match coordinate {
                    Some(coordinate) => coordinate.apply(ctx),
                    None => ctx.texture_default_texture_coordinate(name),
                }
                ctx.write(")");
            }
            Self::LinearizeDepth(input) => {
                // proj[2][2] and proj[3][2] of a zero-to-one, negative-z forward frustum
                let func_name = ctx.generate_temp_variable();
                ctx.push_header_scope();
                ctx.write(&format!(
                    "fn {func_name}(proj: mat4x4<f32>, clip_depth: f32) -> f32 {{\n\
                     \tlet a = proj[2][2];\n\
                     \tlet b = proj[3][2];\n\
                     \treturn b / (clip_depth + a);\n\
                     }}\n"
                ));
                ctx.pop_header_scope();

                ctx.write(&format!("{func_name}("));
                ctx.read_buffer("proj", FieldType::Num(NumType::FLOAT4X4), "view", None);
                ctx.write(", ");
                input.apply(ctx);
                ctx.write(")");
            }
            Self::Custom(custom) => (custom.0)(ctx),
            Self::DefaultInterpolation { match_prefixes } => {
                let candidates: Vec<(String, NumType)> = ctx
                    .definitions()
                    .inputs
                    .iter()
                    .filter(|(name, _)| match_prefixes.iter().any(|p| name.starts_with(p.as_str())))
                    .map(|(name, ty)| (name.clone(), *ty))
                    .collect();

                for (name, ty) in candidates {
                    if ctx.has_output(&name) {
                        continue;
                    }
                    ctx.write_output(&name, ty);
                    ctx.write(" = ");
                    ctx.read_input(&name);
                    ctx.write(";\n");
                }
            }
        }
    }
}

fn apply_branch(
    ctx: &mut dyn GeneratorContext,
    present: bool,
    inner: &Block,
    otherwise: Option<&Block>,
) {
    if present {
        inner.apply(ctx);
    } else if let Some(otherwise) = otherwise {
        otherwise.apply(ctx);
    }
}

impl From<&str> for Block {
    fn from(value: &str) -> Self {
        Self::Direct(value.to_string())
    }
}

impl From<String> for Block {
    fn from(value: String) -> Self {
        Self::Direct(value)
    }
}

impl From<Vec<Block>> for Block {
    fn from(value: Vec<Block>) -> Self {
        Self::Compound(value)
    }
}
