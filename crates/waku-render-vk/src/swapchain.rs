// SPDX-License-Identifier: CEPL-1.0
//! Presentable image chain, per-image views, shared depth attachment and
//! framebuffers. Rebuilt wholesale, never patched.

use crate::device::Gpu;
use crate::error::RenderError;
use crate::upload::{create_image, GpuImage};
use crate::unwind::Unwind;
use anyhow::{Context, Result};
use ash::{vk, Device};
use tracing::info;
use waku_render::{wait_for_nonzero_extent, PresentModePref, RenderSize, WindowHost};

/// B8G8R8A8_SRGB + SRGB_NONLINEAR when offered, else whatever comes first.
pub fn choose_surface_format(formats: &[vk::SurfaceFormatKHR]) -> Result<vk::SurfaceFormatKHR> {
    let first = formats.first().ok_or(RenderError::NoSurfaceFormats)?;
    Ok(formats
        .iter()
        .copied()
        .find(|f| {
            f.format == vk::Format::B8G8R8A8_SRGB
                && f.color_space == vk::ColorSpaceKHR::SRGB_NONLINEAR
        })
        .unwrap_or(*first))
}

/// FIFO is always supported, so it is the fallback for everything.
pub fn choose_present_mode(
    modes: &[vk::PresentModeKHR],
    pref: PresentModePref,
) -> Result<vk::PresentModeKHR> {
    if modes.is_empty() {
        return Err(RenderError::NoPresentModes.into());
    }
    let wanted = match pref {
        PresentModePref::Mailbox => vk::PresentModeKHR::MAILBOX,
        PresentModePref::Fifo => vk::PresentModeKHR::FIFO,
    };
    Ok(if modes.contains(&wanted) {
        wanted
    } else {
        vk::PresentModeKHR::FIFO
    })
}

/// `current_extent` unless the surface reports the u32::MAX sentinel, in
/// which case the window size clamped into the supported range.
pub fn choose_extent(caps: &vk::SurfaceCapabilitiesKHR, window: RenderSize) -> vk::Extent2D {
    if caps.current_extent.width != u32::MAX {
        return caps.current_extent;
    }
    vk::Extent2D {
        width: window
            .width
            .clamp(caps.min_image_extent.width, caps.max_image_extent.width),
        height: window
            .height
            .clamp(caps.min_image_extent.height, caps.max_image_extent.height),
    }
}

/// One more than the minimum, capped by the maximum (0 means no maximum).
pub fn image_count(caps: &vk::SurfaceCapabilitiesKHR) -> u32 {
    let want = caps.min_image_count + 1;
    if caps.max_image_count > 0 {
        want.min(caps.max_image_count)
    } else {
        want
    }
}

pub struct SwapchainBundle {
    pub swapchain: vk::SwapchainKHR,
    pub format: vk::SurfaceFormatKHR,
    pub present_mode: vk::PresentModeKHR,
    pub extent: vk::Extent2D,
    pub images: Vec<vk::Image>,
    pub views: Vec<vk::ImageView>,
    pub depth: GpuImage,
    pub framebuffers: Vec<vk::Framebuffer>,
}

impl SwapchainBundle {
    /// Swapchain, views and depth. Framebuffers come later, once the render
    /// pass for this format exists.
    pub unsafe fn create(gpu: &Gpu, window: RenderSize, pref: PresentModePref) -> Result<Self> {
        let surf = &gpu.surface_loader;
        let caps = unsafe { surf.get_physical_device_surface_capabilities(gpu.phys, gpu.surface) }
            .context("get_physical_device_surface_capabilities")?;
        let formats = unsafe { surf.get_physical_device_surface_formats(gpu.phys, gpu.surface) }
            .context("get_physical_device_surface_formats")?;
        let modes = unsafe { surf.get_physical_device_surface_present_modes(gpu.phys, gpu.surface) }
            .context("get_physical_device_surface_present_modes")?;

        let format = choose_surface_format(&formats)?;
        let present_mode = choose_present_mode(&modes, pref)?;
        let extent = choose_extent(&caps, window);
        let min_image_count = image_count(&caps);

        info!(
            "swapchain: format={:?}/{:?} present_mode={:?} extent={}x{} images(min={} → picked={})",
            format.format,
            format.color_space,
            present_mode,
            extent.width,
            extent.height,
            caps.min_image_count,
            min_image_count
        );

        // Two families need CONCURRENT or an ownership transfer per frame.
        let family_indices = [gpu.families.graphics, gpu.families.present];
        let (sharing_mode, family_count, p_families) = if gpu.families.is_shared() {
            (vk::SharingMode::EXCLUSIVE, 0, std::ptr::null())
        } else {
            (vk::SharingMode::CONCURRENT, 2, family_indices.as_ptr())
        };

        let info = vk::SwapchainCreateInfoKHR {
            s_type: vk::StructureType::SWAPCHAIN_CREATE_INFO_KHR,
            surface: gpu.surface,
            min_image_count,
            image_format: format.format,
            image_color_space: format.color_space,
            image_extent: extent,
            image_array_layers: 1,
            image_usage: vk::ImageUsageFlags::COLOR_ATTACHMENT,
            image_sharing_mode: sharing_mode,
            queue_family_index_count: family_count,
            p_queue_family_indices: p_families,
            pre_transform: caps.current_transform,
            composite_alpha: vk::CompositeAlphaFlagsKHR::OPAQUE,
            present_mode,
            clipped: vk::TRUE,
            old_swapchain: vk::SwapchainKHR::null(),
            ..Default::default()
        };
        let swapchain = unsafe { gpu.swapchain_loader.create_swapchain(&info, None) }
            .context("create_swapchain")?;
        let mut guard = Unwind::new(gpu);
        guard.push(move |g: &Gpu| unsafe { g.swapchain_loader.destroy_swapchain(swapchain, None) });

        let images = unsafe { gpu.swapchain_loader.get_swapchain_images(swapchain) }
            .context("get_swapchain_images")?;

        let mut views = Vec::with_capacity(images.len());
        for &image in &images {
            let view_ci = vk::ImageViewCreateInfo {
                s_type: vk::StructureType::IMAGE_VIEW_CREATE_INFO,
                image,
                view_type: vk::ImageViewType::TYPE_2D,
                format: format.format,
                subresource_range: color_range(),
                ..Default::default()
            };
            let view = unsafe { gpu.device.create_image_view(&view_ci, None) }
                .context("create_image_view(swapchain)")?;
            guard.push(move |g: &Gpu| unsafe { g.device.destroy_image_view(view, None) });
            views.push(view);
        }

        let depth = unsafe {
            create_image(
                &gpu.device,
                &gpu.memory_properties(),
                extent.width,
                extent.height,
                gpu.depth_format,
                vk::ImageUsageFlags::DEPTH_STENCIL_ATTACHMENT,
                vk::ImageAspectFlags::DEPTH,
            )
        }
        .context("depth attachment")?;

        guard.disarm();
        Ok(Self {
            swapchain,
            format,
            present_mode,
            extent,
            images,
            views,
            depth,
            framebuffers: Vec::new(),
        })
    }

    /// One framebuffer per swapchain image, each sharing the depth view.
    pub unsafe fn create_framebuffers(
        &mut self,
        device: &Device,
        render_pass: vk::RenderPass,
    ) -> Result<()> {
        for &view in &self.views {
            let attachments = [view, self.depth.view];
            let ci = vk::FramebufferCreateInfo {
                s_type: vk::StructureType::FRAMEBUFFER_CREATE_INFO,
                render_pass,
                attachment_count: attachments.len() as u32,
                p_attachments: attachments.as_ptr(),
                width: self.extent.width,
                height: self.extent.height,
                layers: 1,
                ..Default::default()
            };
            self.framebuffers.push(
                unsafe { device.create_framebuffer(&ci, None) }.context("create_framebuffer")?,
            );
        }
        Ok(())
    }

    pub fn render_size(&self) -> RenderSize {
        RenderSize::new(self.extent.width, self.extent.height)
    }

    /// Framebuffers, depth, views, then the swapchain itself. The device
    /// must be idle.
    pub unsafe fn destroy(&mut self, gpu: &Gpu) {
        let d = &gpu.device;
        unsafe {
            for fb in self.framebuffers.drain(..) {
                d.destroy_framebuffer(fb, None);
            }
            self.depth.destroy(d);
            for view in self.views.drain(..) {
                d.destroy_image_view(view, None);
            }
            gpu.swapchain_loader.destroy_swapchain(self.swapchain, None);
        }
        self.images.clear();
        self.swapchain = vk::SwapchainKHR::null();
    }
}

fn color_range() -> vk::ImageSubresourceRange {
    vk::ImageSubresourceRange {
        aspect_mask: vk::ImageAspectFlags::COLOR,
        base_mip_level: 0,
        level_count: 1,
        base_array_layer: 0,
        layer_count: 1,
    }
}

/// The three steps of a swapchain rebuild, split out so the ordering in
/// [`recreate`] does not depend on a live device.
pub trait SwapchainLifecycle {
    fn wait_device_idle(&mut self) -> Result<()>;
    fn destroy_swapchain(&mut self);
    fn create_swapchain(&mut self, window: RenderSize) -> Result<()>;
}

// STRICT ORDER (recreate):
// 1) park on window events while the framebuffer is 0x0
// 2) device idle, nothing in flight may reference old views/framebuffers
// 3) destroy everything tied to the old swapchain
// 4) create against the current window size
/// Returns `false` when the window closed while minimized; nothing is
/// touched in that case.
pub fn recreate<T>(target: &mut T, host: &mut dyn WindowHost) -> Result<bool>
where
    T: SwapchainLifecycle + ?Sized,
{
    let Some(size) = wait_for_nonzero_extent(host) else {
        info!("window closing during swapchain rebuild, skipped");
        return Ok(false);
    };
    target.wait_device_idle()?;
    target.destroy_swapchain();
    target.create_swapchain(size)?;
    info!("swapchain rebuilt for {}x{}", size.width, size.height);
    Ok(true)
}
