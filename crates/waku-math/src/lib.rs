// SPDX-License-Identifier: CEPL-1.0
//! Camera, input and per-frame transform math.

pub mod camera;
pub mod input;
pub mod uniform;

pub use camera::Camera;
pub use glam;
pub use input::{InputState, MoveKeys};
pub use uniform::{model_spin, UniformData};
