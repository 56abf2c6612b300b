//! Camera reflected across the horizontal water plane.

use engine_core::Plane;

use crate::camera::CameraPose;

/// Derives a mirrored pose from the primary camera every frame. Holds no camera state.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct MirrorCamera {
    plane: Plane,
}

impl MirrorCamera {
    /// Mirror across `y = height`.
    pub fn new(height: f32) -> Self {
        Self {
            plane: Plane::horizontal(height),
        }
    }

    pub fn plane(&self) -> Plane {
        self.plane
    }

    /// Position reflected through the plane; pitch mirrored about the horizon so the forward
    /// vector's y component flips sign. Yaw, and therefore the right vector, is unchanged.
    pub fn derive(&self, primary: &CameraPose) -> CameraPose {
        CameraPose {
            position: self.plane.reflect_point(primary.position),
            yaw: primary.yaw,
            pitch: -std::f32::consts::PI - primary.pitch,
        }
    }
}
