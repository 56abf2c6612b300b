//! Clip planes for the offscreen water passes.
//!
//! Scene shaders carry two plane slots. Slot 0 holds the refraction plane (keeps geometry under
//! the water), slot 1 the reflection plane (keeps geometry above it, lifted by a small bias so
//! the shoreline does not bleed into the reflection).

use engine_core::{Plane, Vec4};

/// The water surface seen as a pair of clip planes.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct WaterPlane {
    pub height: f32,
    pub bias: f32,
}

impl WaterPlane {
    pub const DEFAULT_BIAS: f32 = 0.125;

    pub fn new(height: f32, bias: f32) -> Self {
        Self { height, bias }
    }

    /// Admits `y <= height`.
    pub fn refraction_clip(&self) -> Plane {
        Plane::horizontal(self.height).flipped()
    }

    /// Admits `y >= height + bias`.
    pub fn reflection_clip(&self) -> Plane {
        Plane::horizontal(self.height).offset(self.bias)
    }
}

/// Which clip slots are enabled for a pass, and with what plane.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ClipState {
    pub planes: [Option<Plane>; 2],
}

impl ClipState {
    pub const DISABLED: Self = Self { planes: [None, None] };

    pub fn refraction(water: &WaterPlane) -> Self {
        Self {
            planes: [Some(water.refraction_clip()), None],
        }
    }

    pub fn reflection(water: &WaterPlane) -> Self {
        Self {
            planes: [None, Some(water.reflection_clip())],
        }
    }

    /// CPU mirror of the fragment test: a point survives if every enabled plane admits it.
    pub fn admits(&self, point: engine_core::Vec3) -> bool {
        self.planes.iter().flatten().all(|plane| plane.is_visible(point))
    }

    /// Plane equation for `slot`; a disabled slot uploads zeros.
    pub fn plane_vec4(&self, slot: usize) -> Vec4 {
        self.planes
            .get(slot)
            .copied()
            .flatten()
            .map(|plane| plane.to_vec4())
            .unwrap_or(Vec4::ZERO)
    }

    /// `(slot0, slot1, 0, 0)` with 1.0 for enabled slots.
    pub fn enabled_mask(&self) -> Vec4 {
        let flag = |slot: usize| if self.planes[slot].is_some() { 1.0 } else { 0.0 };
        Vec4::new(flag(0), flag(1), 0.0, 0.0)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use engine_core::Vec3;

    fn at(y: f32) -> Vec3 {
        Vec3::new(1.5, y, -3.0)
    }

    #[test]
    fn refraction_and_reflection_clip_opposite_sides() {
        let water = WaterPlane::new(2.2, WaterPlane::DEFAULT_BIAS);
        let refraction = ClipState::refraction(&water);
        let reflection = ClipState::reflection(&water);

        assert!(refraction.admits(at(2.0)));
        assert!(!refraction.admits(at(2.5)));
        assert!(reflection.admits(at(2.5)));
        assert!(!reflection.admits(at(2.0)));
    }

    #[test]
    fn surface_point_admitted_once_with_bias() {
        let water = WaterPlane::new(2.2, WaterPlane::DEFAULT_BIAS);
        let on_surface = at(2.2);
        let admitted = [
            ClipState::refraction(&water).admits(on_surface),
            ClipState::reflection(&water).admits(on_surface),
        ];
        assert_eq!(admitted, [true, false]);
    }

    #[test]
    fn surface_point_admitted_by_both_without_bias() {
        let water = WaterPlane::new(2.2, 0.0);
        let on_surface = at(2.2);
        assert!(ClipState::refraction(&water).admits(on_surface));
        assert!(ClipState::reflection(&water).admits(on_surface));
    }

    #[test]
    fn reflection_plane_sits_at_biased_height() {
        let water = WaterPlane::new(2.2, 0.125);
        assert!(water.reflection_clip().signed_distance(at(2.325)).abs() < 1e-5);
    }

    #[test]
    fn disabled_state_uploads_zero_planes() {
        let state = ClipState::DISABLED;
        assert!(state.admits(at(-100.0)));
        assert_eq!(state.plane_vec4(0), Vec4::ZERO);
        assert_eq!(state.plane_vec4(1), Vec4::ZERO);
        assert_eq!(state.enabled_mask(), Vec4::ZERO);
    }

    #[test]
    fn enabled_slots_are_flagged() {
        let water = WaterPlane::new(2.2, 0.125);
        let refraction = ClipState::refraction(&water);
        assert_eq!(refraction.enabled_mask(), Vec4::new(1.0, 0.0, 0.0, 0.0));
        assert_eq!(refraction.plane_vec4(0), Vec4::new(0.0, -1.0, 0.0, 2.2));
        let reflection = ClipState::reflection(&water);
        assert_eq!(reflection.enabled_mask(), Vec4::new(0.0, 1.0, 0.0, 0.0));
        assert_eq!(reflection.plane_vec4(0), Vec4::ZERO);
    }
}
