// SPDX-License-Identifier: CEPL-1.0
use ash::vk;
use thiserror::Error;

/// Failures the caller may want to tell apart. Everything else travels as
/// `anyhow::Error` with context naming the driver call.
#[derive(Debug, Error)]
pub enum RenderError {
    #[error("failed to load the Vulkan loader: {0}")]
    Loader(#[from] ash::LoadingError),
    #[error("no GPU offers graphics, present, swapchain and sampler anisotropy")]
    NoSuitableGpu,
    #[error("surface reports no formats")]
    NoSurfaceFormats,
    #[error("surface reports no present modes")]
    NoPresentModes,
    #[error("no depth format supports optimal-tiling depth attachments")]
    NoDepthFormat,
    #[error("no memory type matches bits {type_bits:#x} with {flags:?}")]
    NoMemoryType {
        type_bits: u32,
        flags: vk::MemoryPropertyFlags,
    },
    #[error("unsupported layout transition {from:?} -> {to:?}")]
    UnsupportedLayoutTransition {
        from: vk::ImageLayout,
        to: vk::ImageLayout,
    },
    #[error("shader blob is not valid SPIR-V")]
    BadSpirv(#[source] std::io::Error),
    #[error("no shaders supplied and builtin shaders are not compiled in")]
    NoShaders,
}
