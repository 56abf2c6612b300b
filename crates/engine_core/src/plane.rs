//! Plane equations used for clipping and mirroring.
//!
//! A plane is stored as `(normal, d)` with the convention that a point `p` lies on the
//! visible side iff `dot(normal, p) + d >= 0`.

use glam::{Vec3, Vec4};

/// Plane equation `dot(normal, p) + d = 0`.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Plane {
    pub normal: Vec3,
    pub d: f32,
}

impl Plane {
    pub fn new(normal: Vec3, d: f32) -> Self {
        Self { normal, d }
    }

    /// Horizontal plane `y = height` with an upward normal.
    pub fn horizontal(height: f32) -> Self {
        Self::new(Vec3::Y, -height)
    }

    /// Signed distance from the plane (positive on the normal side).
    /// Only a true distance when `normal` is unit length.
    pub fn signed_distance(&self, point: Vec3) -> f32 {
        self.normal.dot(point) + self.d
    }

    /// Boundary-inclusive visibility test.
    pub fn is_visible(&self, point: Vec3) -> bool {
        self.signed_distance(point) >= 0.0
    }

    /// Same plane with the visible side swapped.
    pub fn flipped(&self) -> Self {
        Self::new(-self.normal, -self.d)
    }

    /// Move the plane along its normal by `amount`.
    pub fn offset(&self, amount: f32) -> Self {
        Self::new(self.normal, self.d - amount * self.normal.length())
    }

    /// Mirror a point across the plane. `normal` must be unit length.
    pub fn reflect_point(&self, point: Vec3) -> Vec3 {
        point - 2.0 * self.signed_distance(point) * self.normal
    }

    /// Mirror a direction across the plane. `normal` must be unit length.
    pub fn reflect_direction(&self, dir: Vec3) -> Vec3 {
        dir - 2.0 * dir.dot(self.normal) * self.normal
    }

    /// `(nx, ny, nz, d)` for shader upload.
    pub fn to_vec4(&self) -> Vec4 {
        self.normal.extend(self.d)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn horizontal_plane_sides() {
        let plane = Plane::horizontal(2.0);
        assert!(plane.is_visible(Vec3::new(0.0, 3.0, 0.0)));
        assert!(!plane.is_visible(Vec3::new(0.0, 1.0, 0.0)));
        // On the plane counts as visible.
        assert!(plane.is_visible(Vec3::new(5.0, 2.0, -5.0)));
    }

    #[test]
    fn flipped_swaps_sides() {
        let plane = Plane::horizontal(2.0).flipped();
        assert!(plane.is_visible(Vec3::new(0.0, 1.0, 0.0)));
        assert!(!plane.is_visible(Vec3::new(0.0, 3.0, 0.0)));
    }

    #[test]
    fn offset_moves_along_normal() {
        let plane = Plane::horizontal(2.0).offset(0.5);
        assert!((plane.signed_distance(Vec3::new(0.0, 2.5, 0.0))).abs() < 1e-6);
        let down = Plane::horizontal(2.0).flipped().offset(0.5);
        assert!((down.signed_distance(Vec3::new(0.0, 1.5, 0.0))).abs() < 1e-6);
    }

    #[test]
    fn reflect_point_across_horizontal_plane() {
        let plane = Plane::horizontal(2.2);
        let p = plane.reflect_point(Vec3::new(1.0, 5.0, -3.0));
        assert!((p - Vec3::new(1.0, -0.6, -3.0)).length() < 1e-5);
    }

    #[test]
    fn reflect_direction_negates_normal_component() {
        let plane = Plane::horizontal(10.0);
        let d = plane.reflect_direction(Vec3::new(0.3, -0.8, 0.5));
        assert!((d - Vec3::new(0.3, 0.8, 0.5)).length() < 1e-6);
    }

    #[test]
    fn to_vec4_layout() {
        let v = Plane::new(Vec3::new(0.0, -1.0, 0.0), 2.2).to_vec4();
        assert_eq!(v, Vec4::new(0.0, -1.0, 0.0, 2.2));
    }
}
