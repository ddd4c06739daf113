// SPDX-License-Identifier: CEPL-1.0
use anyhow::Result;
use raw_window_handle::{HasDisplayHandle, HasWindowHandle};

pub mod config;
pub mod host;
pub mod mesh;
pub mod scene;

pub use config::{PresentModePref, RenderConfig};
pub use host::{wait_for_nonzero_extent, WindowHost};
pub use mesh::{MeshData, Vertex, VertexKey};
pub use scene::{SceneAssets, ShaderSet, TextureData};
pub use waku_math::UniformData;

#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct RenderSize {
    pub width: u32,
    pub height: u32,
}

impl RenderSize {
    pub fn new(width: u32, height: u32) -> Self {
        Self { width, height }
    }

    /// Either side zero, e.g. a minimized window.
    pub fn is_empty(&self) -> bool {
        self.width == 0 || self.height == 0
    }
}

/// What a call to [`Renderer::render`] did.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum FrameStatus {
    Presented,
    /// The surface went out of date before anything was drawn. The
    /// swapchain has been rebuilt and the next call draws normally.
    Skipped,
}

pub trait Renderer {
    fn new(
        window: &dyn HasWindowHandle,
        display: &dyn HasDisplayHandle,
        size: RenderSize,
        cfg: &RenderConfig,
        scene: &SceneAssets,
    ) -> Result<Self>
    where
        Self: Sized;

    /// Mark the swapchain stale. The rebuild happens after the next present.
    fn request_resize(&mut self);

    /// One acquire, record, submit, present cycle. `uniforms` is written into
    /// the frame slot only after that slot's previous GPU work has retired.
    fn render(&mut self, host: &mut dyn WindowHost, uniforms: &UniformData)
        -> Result<FrameStatus>;

    /// Current swapchain extent.
    fn extent(&self) -> RenderSize;

    /// Block until the device has finished all submitted work.
    fn wait_idle(&mut self) -> Result<()>;
}
