//! Free-fly camera driven by mouse look and WASD.
//!
//! Orientation is stored as spherical angles with pitch measured from +Y, so a level view has
//! `pitch = -pi/2` and the forward vector is `(sin p cos y, cos p, sin p sin y)`. Pitch is not
//! clamped: looking straight up or down passes through the pole and flips the view.

use glam::{Mat4, Vec3};

/// Eye position plus yaw/pitch. Everything else about the view is derived from these.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct CameraPose {
    pub position: Vec3,
    /// Radians around +Y.
    pub yaw: f32,
    /// Radians from +Y.
    pub pitch: f32,
}

impl CameraPose {
    pub fn new(position: Vec3, yaw: f32, pitch: f32) -> Self {
        Self { position, yaw, pitch }
    }

    /// Pose at `position` facing `target`. Falls back to a level view down -Z when the two coincide.
    pub fn looking_at(position: Vec3, target: Vec3) -> Self {
        let dir = (target - position).try_normalize().unwrap_or(Vec3::NEG_Z);
        let pitch = -dir.y.clamp(-1.0, 1.0).acos();
        let yaw = (-dir.z).atan2(-dir.x);
        Self { position, yaw, pitch }
    }

    pub fn forward(&self) -> Vec3 {
        let (sin_p, cos_p) = self.pitch.sin_cos();
        let (sin_y, cos_y) = self.yaw.sin_cos();
        Vec3::new(sin_p * cos_y, cos_p, sin_p * sin_y)
    }

    /// Horizontal right vector; depends on yaw only.
    pub fn right(&self) -> Vec3 {
        let a = self.yaw - std::f32::consts::FRAC_PI_2;
        Vec3::new(a.cos(), 0.0, a.sin())
    }

    pub fn up(&self) -> Vec3 {
        self.right().cross(self.forward())
    }

    pub fn view_matrix(&self) -> Mat4 {
        Mat4::look_at_rh(self.position, self.position + self.forward(), self.up())
    }
}

/// Movement keys held this frame.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct MoveKeys {
    pub forward: bool,
    pub backward: bool,
    pub right: bool,
    pub left: bool,
}

/// View and projection for one camera, plus the eye they were built from.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct EyeView {
    pub view: Mat4,
    pub projection: Mat4,
    pub eye: Vec3,
}

/// Camera controller with configurable FOV and clipping planes.
#[derive(Debug, Clone)]
pub struct Camera {
    pub pose: CameraPose,
    /// Field of view in degrees.
    pub fov_degrees: f32,
    /// Near clipping plane.
    pub near: f32,
    /// Far clipping plane.
    pub far: f32,
    /// Aspect ratio (width / height).
    pub aspect: f32,
    /// Radians per pixel of mouse motion.
    pub mouse_speed: f32,
    /// World units per second.
    pub move_speed: f32,
}

impl Default for Camera {
    fn default() -> Self {
        Self {
            pose: CameraPose::new(Vec3::new(5.7, 9.7, -5.9), 5.4, -2.3),
            fov_degrees: 45.0,
            near: 0.1,
            far: 2000.0,
            aspect: 800.0 / 600.0,
            mouse_speed: 0.005,
            move_speed: 5.0,
        }
    }
}

impl Camera {
    /// Update aspect ratio (call on window resize).
    pub fn set_aspect(&mut self, width: u32, height: u32) {
        self.aspect = width as f32 / height.max(1) as f32;
    }

    /// Apply a cursor delta in pixels. Moving the mouse up (negative dy) raises the view.
    pub fn process_mouse(&mut self, delta_x: f32, delta_y: f32) {
        self.pose.yaw += self.mouse_speed * delta_x;
        self.pose.pitch += self.mouse_speed * -delta_y;
    }

    /// Move along forward/right for each held key. Opposing keys cancel.
    pub fn process_movement(&mut self, keys: MoveKeys, dt: f32) {
        let step = dt * self.move_speed;
        let forward = self.pose.forward();
        let right = self.pose.right();
        if keys.forward {
            self.pose.position += forward * step;
        }
        if keys.backward {
            self.pose.position -= forward * step;
        }
        if keys.right {
            self.pose.position += right * step;
        }
        if keys.left {
            self.pose.position -= right * step;
        }
    }

    pub fn view_matrix(&self) -> Mat4 {
        self.pose.view_matrix()
    }

    pub fn projection_matrix(&self) -> Mat4 {
        Mat4::perspective_rh(self.fov_degrees.to_radians(), self.aspect, self.near, self.far)
    }

    pub fn position(&self) -> Vec3 {
        self.pose.position
    }

    /// Primary view for this frame.
    pub fn eye_view(&self) -> EyeView {
        EyeView {
            view: self.view_matrix(),
            projection: self.projection_matrix(),
            eye: self.pose.position,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn approx(a: Vec3, b: Vec3) -> bool {
        (a - b).length() < 1e-4
    }

    #[test]
    fn looking_at_recovers_direction() {
        let targets = [
            Vec3::new(0.0, 5.0, -1.0),
            Vec3::new(3.0, 2.0, 1.0),
            Vec3::new(-1.0, 8.0, 4.0),
        ];
        let eye = Vec3::new(0.0, 5.0, 0.0);
        for target in targets {
            let pose = CameraPose::looking_at(eye, target);
            assert!(approx(pose.forward(), (target - eye).normalize()));
        }
    }

    #[test]
    fn basis_is_orthonormal() {
        let pose = CameraPose::new(Vec3::ZERO, 5.4, -2.3);
        let (f, r, u) = (pose.forward(), pose.right(), pose.up());
        assert!((f.length() - 1.0).abs() < 1e-5);
        assert!((u.length() - 1.0).abs() < 1e-5);
        assert!(f.dot(r).abs() < 1e-5);
        assert!(f.dot(u).abs() < 1e-5);
        assert!(r.dot(u).abs() < 1e-5);
    }

    #[test]
    fn right_ignores_pitch() {
        let a = CameraPose::new(Vec3::ZERO, 1.0, -0.3);
        let b = CameraPose::new(Vec3::ZERO, 1.0, -2.9);
        assert!(approx(a.right(), b.right()));
        assert_eq!(a.right().y, 0.0);
    }

    #[test]
    fn level_view_has_up_along_y() {
        let pose = CameraPose::looking_at(Vec3::ZERO, Vec3::new(0.0, 0.0, -1.0));
        assert!(approx(pose.up(), Vec3::Y));
    }

    #[test]
    fn mouse_updates_yaw_and_inverted_pitch() {
        let mut camera = Camera::default();
        let before = camera.pose;
        camera.process_mouse(10.0, 4.0);
        assert!((camera.pose.yaw - (before.yaw + 0.05)).abs() < 1e-6);
        assert!((camera.pose.pitch - (before.pitch - 0.02)).abs() < 1e-6);
    }

    #[test]
    fn forward_key_moves_speed_times_dt() {
        let mut camera = Camera {
            pose: CameraPose::looking_at(Vec3::ZERO, Vec3::new(0.0, 0.0, -1.0)),
            ..Default::default()
        };
        camera.process_movement(
            MoveKeys {
                forward: true,
                ..Default::default()
            },
            1.0,
        );
        assert!(approx(camera.position(), Vec3::new(0.0, 0.0, -5.0)));
    }

    #[test]
    fn opposing_keys_cancel() {
        let mut camera = Camera::default();
        let start = camera.position();
        camera.process_movement(
            MoveKeys {
                forward: true,
                backward: true,
                right: true,
                left: true,
            },
            0.5,
        );
        assert!(approx(camera.position(), start));
    }

    #[test]
    fn strafe_follows_right_vector() {
        let mut camera = Camera::default();
        let start = camera.position();
        let right = camera.pose.right();
        camera.process_movement(
            MoveKeys {
                left: true,
                ..Default::default()
            },
            0.1,
        );
        assert!(approx(camera.position(), start - right * 0.5));
    }

    #[test]
    fn view_matrix_maps_eye_to_origin() {
        let camera = Camera::default();
        let p = camera.view_matrix().transform_point3(camera.position());
        assert!(approx(p, Vec3::ZERO));
        let ahead = camera.position() + camera.pose.forward() * 3.0;
        let q = camera.view_matrix().transform_point3(ahead);
        assert!(approx(q, Vec3::new(0.0, 0.0, -3.0)));
    }
}
