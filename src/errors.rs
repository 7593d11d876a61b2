//! Error Types
//!
//! This module defines the error types used throughout the crate.
//!
//! # Overview
//!
//! The main error type [`GfxError`] covers all failure modes including:
//! - Adapter and device acquisition failures
//! - Backend object creation failures (shader modules, layouts, pipelines)
//! - Shader generation failures (a list of collected [`GeneratorError`]s)
//! - Frame output acquisition failures
//!
//! # Usage
//!
//! All fallible public APIs return [`Result<T>`] which is an alias for
//! `std::result::Result<T, GfxError>`.
//!
//! ```rust,ignore
//! use kiln::errors::{GfxError, Result};
//!
//! fn build() -> Result<()> {
//!     // Operations that may fail return Result
//!     Ok(())
//! }
//! ```

use thiserror::Error;

use crate::shader::GeneratorError;

/// The main error type for the pipeline and resource caching layer.
#[derive(Error, Debug)]
pub enum GfxError {
    // ========================================================================
    // Device & Context Errors
    // ========================================================================
    /// Failed to request a compatible GPU adapter.
    #[error("Failed to request GPU adapter: {0}")]
    AdapterRequestFailed(String),

    /// Failed to create the GPU device.
    #[error("Failed to create GPU device: {0}")]
    DeviceCreateFailed(#[from] wgpu::RequestDeviceError),

    /// Failed to create the GPU device (backend specific reason).
    #[error("Failed to create GPU device: {0}")]
    DeviceRequestFailed(String),

    /// The device was lost while the operation was running.
    #[error("GPU device lost")]
    DeviceLost,

    /// The operation requires a ready device.
    #[error("Context is not ready (state: {0})")]
    ContextNotReady(&'static str),

    // ========================================================================
    // Backend Object Errors
    // ========================================================================
    /// Shader module compilation failed.
    #[error("Failed to compile shader module '{label}': {message}")]
    ShaderCompilationFailed {
        /// Debug label of the module
        label: String,
        /// Backend provided diagnostic
        message: String,
    },

    /// A bind group layout or pipeline layout could not be created.
    #[error("Failed to create layout '{label}': {message}")]
    LayoutCreateFailed {
        /// Debug label of the layout
        label: String,
        /// Backend provided diagnostic
        message: String,
    },

    /// Render pipeline creation failed.
    #[error("Failed to build pipeline: {0}")]
    PipelineCreateFailed(String),

    /// A buffer, texture or sampler could not be created or written.
    #[error("Failed to create or write {kind} '{label}': {message}")]
    ResourceFailed {
        /// Object kind
        kind: &'static str,
        /// Debug label of the object
        label: String,
        /// Backend provided diagnostic
        message: String,
    },

    /// A handle did not resolve to a live backend object.
    #[error("Invalid backend handle: {0}")]
    InvalidHandle(&'static str),

    // ========================================================================
    // Shader Generation Errors
    // ========================================================================
    /// Shader generation produced one or more errors.
    #[error("Shader generation failed with {} error(s): {}", .0.len(), format_generator_errors(.0))]
    ShaderGeneration(Vec<GeneratorError>),

    /// Discovery and final generator passes disagree on the referenced fields.
    #[error("Buffer '{buffer}' field usage changed between discovery and final pass")]
    BindingUsageMismatch {
        /// Name of the offending buffer binding
        buffer: String,
    },

    // ========================================================================
    // Layout & Format Errors
    // ========================================================================
    /// Two declarations of the same struct field disagree on the type.
    #[error("Struct layout has duplicate field '{0}' with a different type")]
    DuplicateField(String),

    /// A mesh vertex attribute has no matching vertex format.
    #[error("Unsupported vertex attribute '{name}' ({storage:?} x{components})")]
    UnsupportedVertexFormat {
        /// Attribute name
        name: String,
        /// Storage type of the attribute
        storage: crate::resources::StorageType,
        /// Component count
        components: u8,
    },

    /// A render target format cannot be written from a shader.
    #[error("Unsupported render target format {0:?}")]
    UnsupportedTargetFormat(wgpu::TextureFormat),

    // ========================================================================
    // Frame Output Errors
    // ========================================================================
    /// Acquiring the frame output failed.
    #[error("Failed to acquire frame output: {0}")]
    OutputAcquireFailed(String),

    /// `end_frame` was called without a matching `begin_frame`.
    #[error("end_frame called without an active frame")]
    NoActiveFrame,
}

fn format_generator_errors(errors: &[GeneratorError]) -> String {
    errors
        .iter()
        .map(ToString::to_string)
        .collect::<Vec<_>>()
        .join("; ")
}

/// Alias for `Result<T, GfxError>`.
pub type Result<T> = std::result::Result<T, GfxError>;
