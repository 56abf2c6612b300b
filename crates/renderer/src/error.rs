//! Error type for renderer setup and frame submission.

use std::path::PathBuf;

/// Errors raised by the renderer. Everything except `Surface` is a setup failure.
#[derive(thiserror::Error, Debug)]
pub enum RenderError {
    #[error("no suitable GPU adapter found")]
    AdapterUnavailable,

    #[error("failed to create surface: {0}")]
    CreateSurface(#[from] wgpu::CreateSurfaceError),

    #[error("failed to request device: {0}")]
    RequestDevice(#[from] wgpu::RequestDeviceError),

    #[error("surface error: {0}")]
    Surface(#[from] wgpu::SurfaceError),

    #[error("shader '{label}' failed to compile: {message}")]
    ShaderCompile { label: String, message: String },

    #[error("uniform struct '{name}' not found in shader '{label}'")]
    UniformStructMissing { label: String, name: String },

    #[error("uniform layout of '{label}' does not match the host struct: {reason}")]
    UniformLayout { label: String, reason: String },

    #[error("render target '{label}' is incomplete: {reason}")]
    IncompleteTarget { label: String, reason: String },

    #[error("render target '{0}' has no depth attachment")]
    MissingDepthAttachment(String),

    #[error("invalid texture '{label}': {reason}")]
    InvalidTexture { label: String, reason: String },

    #[error("failed to load texture {path}: {source}")]
    TextureLoad {
        path: PathBuf,
        source: image::ImageError,
    },

    #[error("pass '{pass}' samples target '{target}' before it is rendered")]
    PassOrder { pass: String, target: String },

    #[error("frame capture failed: {0}")]
    Capture(String),
}

/// Result type alias for renderer operations
pub type RenderResult<T> = Result<T, RenderError>;
