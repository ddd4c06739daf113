// SPDX-License-Identifier: CEPL-1.0
use bytemuck::{Pod, Zeroable};
use glam::Mat4;

/// Uniform block at set 0, binding 0. Three column-major mat4s, std140
/// compatible without padding.
#[repr(C)]
#[derive(Clone, Copy, Debug, PartialEq, Pod, Zeroable)]
pub struct UniformData {
    pub model: Mat4,
    pub view: Mat4,
    pub proj: Mat4,
}

impl Default for UniformData {
    fn default() -> Self {
        Self {
            model: Mat4::IDENTITY,
            view: Mat4::IDENTITY,
            proj: Mat4::IDENTITY,
        }
    }
}

/// Rotation about +Z at 90 degrees per second.
pub fn model_spin(elapsed_secs: f32) -> Mat4 {
    Mat4::from_rotation_z(elapsed_secs * 90f32.to_radians())
}
