//! Core types shared by the water demo crates.
//!
//! This crate provides the foundational types used across all systems:
//! - Transform for model matrices (scene meshes, water tiles)
//! - Plane equations for clipping and mirroring
//! - Frame timing

pub mod plane;
pub mod time;
pub mod transform;

pub use plane::*;
pub use time::*;
pub use transform::*;

// Re-export commonly used types
pub use glam::{Mat4, Quat, Vec2, Vec3, Vec4};
