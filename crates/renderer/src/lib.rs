//! Multi-pass water rendering on wgpu: mirrored camera, offscreen refraction and reflection
//! targets, clip-plane passes and a dudv-distorted water surface.

pub mod camera;
pub mod capture;
pub mod clip;
pub mod context;
pub mod error;
pub mod mesh;
pub mod mirror;
pub mod pass;
pub mod pipeline;
pub mod preview;
pub mod scene;
pub mod shader;
pub mod target;
pub mod texture;
pub mod vertex;
pub mod water;

pub use camera::*;
pub use capture::FrameCapture;
pub use clip::*;
pub use context::RenderContext;
pub use error::{RenderError, RenderResult};
pub use mesh::*;
pub use mirror::MirrorCamera;
pub use pass::*;
pub use preview::TargetPreview;
pub use scene::*;
pub use target::*;
pub use texture::*;
pub use vertex::*;
pub use water::*;
