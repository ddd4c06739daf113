// SPDX-License-Identifier: CEPL-1.0
use crate::input::{InputState, MoveKeys};
use glam::{Mat4, Vec3};

/// Free-moving look-at camera. Z is up.
#[derive(Clone, Debug)]
pub struct Camera {
    pub pos: Vec3,
    pub look_at: Vec3,
    pub up: Vec3,
    pub forward: Vec3,
    pub fovy: f32,
    pub z_near: f32,
    pub z_far: f32,
    pub speed: f32,
    aspect: f32,
}

impl Default for Camera {
    fn default() -> Self {
        Self {
            pos: Vec3::new(2.0, 2.0, 2.0),
            look_at: Vec3::ZERO,
            up: Vec3::Z,
            forward: Vec3::new(-2.0, -2.0, -2.0),
            fovy: 45f32.to_radians(),
            z_near: 0.1,
            z_far: 10.0,
            speed: 2.0,
            aspect: 4.0 / 3.0,
        }
    }
}

impl Camera {
    pub fn new(width: u32, height: u32) -> Self {
        let mut cam = Self::default();
        cam.set_viewport(width, height);
        cam
    }

    /// Zero-sized viewports keep the previous aspect.
    pub fn set_viewport(&mut self, width: u32, height: u32) {
        if width > 0 && height > 0 {
            self.aspect = width as f32 / height as f32;
        }
    }

    pub fn update(&mut self, input: &InputState, dt: f32) {
        let mut dir = Vec3::ZERO;
        if input.is_held(MoveKeys::FORWARD) {
            dir += self.forward;
        }
        if input.is_held(MoveKeys::BACKWARD) {
            dir -= self.forward;
        }
        // LEFT/RIGHT are tracked but do not move the camera.
        if !input.held().intersects(MoveKeys::FORWARD | MoveKeys::BACKWARD) {
            return;
        }
        self.pos += dir * dt * self.speed;
        self.look_at = self.pos + self.forward;
    }

    pub fn view(&self) -> Mat4 {
        Mat4::look_at_rh(self.pos, self.look_at, self.up)
    }

    /// Depth range 0..1 with clip-space Y pointing down.
    pub fn projection(&self) -> Mat4 {
        let mut proj = Mat4::perspective_rh(self.fovy, self.aspect, self.z_near, self.z_far);
        proj.y_axis.y *= -1.0;
        proj
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use glam::Vec4;

    #[test]
    fn idle_input_leaves_camera_still() {
        let mut cam = Camera::new(800, 600);
        cam.update(&InputState::new(), 1.0);
        assert_eq!(cam.pos, Vec3::new(2.0, 2.0, 2.0));
        assert_eq!(cam.look_at, Vec3::ZERO);
    }

    #[test]
    fn forward_moves_along_forward_vector() {
        let mut cam = Camera::new(800, 600);
        let mut input = InputState::new();
        input.set(MoveKeys::FORWARD, true);
        cam.update(&input, 0.25);
        // 2 + (-2 * 0.25 * 2)
        assert!((cam.pos - Vec3::splat(1.0)).length() < 1e-5);
        assert!((cam.look_at - Vec3::splat(-1.0)).length() < 1e-5);
    }

    #[test]
    fn opposite_keys_cancel() {
        let mut cam = Camera::new(800, 600);
        let mut input = InputState::new();
        input.set(MoveKeys::FORWARD | MoveKeys::BACKWARD, true);
        cam.update(&input, 1.0);
        assert!((cam.pos - Vec3::splat(2.0)).length() < 1e-5);
    }

    #[test]
    fn side_keys_do_not_move() {
        let mut cam = Camera::new(800, 600);
        let mut input = InputState::new();
        input.set(MoveKeys::LEFT | MoveKeys::RIGHT, true);
        cam.update(&input, 0.5);
        assert_eq!(cam.pos, Vec3::new(2.0, 2.0, 2.0));
        assert_eq!(cam.look_at, Vec3::ZERO);

        input.set(MoveKeys::RIGHT, false);
        input.set(MoveKeys::FORWARD, true);
        cam.update(&input, 0.25);
        // only the forward component counts
        assert!((cam.pos - Vec3::splat(1.0)).length() < 1e-5);
    }

    #[test]
    fn projection_flips_y() {
        let cam = Camera::new(800, 600);
        let p = cam.projection();
        assert!(p.y_axis.y < 0.0);
        assert!(p.x_axis.x > 0.0);
    }

    #[test]
    fn view_puts_target_in_front() {
        let cam = Camera::new(800, 600);
        let origin = cam.view() * Vec4::new(0.0, 0.0, 0.0, 1.0);
        // right handed: in front means negative z in view space
        assert!(origin.z < 0.0);
        assert!((origin.z + 12f32.sqrt()).abs() < 1e-4);
    }

    #[test]
    fn zero_viewport_keeps_aspect() {
        let mut cam = Camera::new(1000, 500);
        cam.set_viewport(0, 0);
        assert!((cam.aspect - 2.0).abs() < 1e-6);
    }
}
