// SPDX-License-Identifier: CEPL-1.0
#![deny(unsafe_op_in_unsafe_fn)]

use anyhow::{Context, Result};
use ash::vk;
use raw_window_handle::{HasDisplayHandle, HasWindowHandle};
use tracing::{debug, info};
use waku_render::{
    FrameStatus, PresentModePref, RenderConfig, RenderSize, Renderer, SceneAssets, ShaderSet,
    UniformData, WindowHost,
};

pub mod commands;
pub mod device;
pub mod error;
pub mod frame;
pub mod pipeline;
pub mod swapchain;
mod unwind;
pub mod upload;

pub use error::RenderError;
pub use frame::{AcquireOutcome, FrameDriver, FrameEngine, PresentOutcome, SlotPhase, TickOutcome};

use commands::{record_draw, DrawInputs};
use device::Gpu;
use frame::FrameSlots;
use pipeline::{builtin_shaders, create_descriptor_set_layout, PipelineBundle};
use swapchain::{recreate, SwapchainBundle, SwapchainLifecycle};
use unwind::Unwind;
use upload::{create_texture_sampler, GpuBuffer, GpuImage, Uploader};

pub struct VkRenderer {
    engine: FrameEngine,
    state: GpuState,
}

/// Every Vulkan object the renderer owns, in roughly creation order.
struct GpuState {
    gpu: Gpu,
    present_mode: PresentModePref,
    clear_color: [f32; 4],
    shaders: ShaderSet,

    set_layout: vk::DescriptorSetLayout,
    cmd_pool: vk::CommandPool,

    vertex_buffer: GpuBuffer,
    index_buffer: GpuBuffer,
    index_count: u32,
    texture: GpuImage,
    sampler: vk::Sampler,

    // None only between destroy and create during a rebuild.
    swapchain: Option<SwapchainBundle>,
    pipeline: PipelineBundle,
    frames: FrameSlots,
}

/// Scene shaders first, then whatever build.rs compiled in.
fn resolve_shaders(scene: &SceneAssets) -> Result<ShaderSet, RenderError> {
    scene
        .shaders
        .clone()
        .or_else(builtin_shaders)
        .ok_or(RenderError::NoShaders)
}

/// Swapchain, a pipeline for its format, and framebuffers for both. On
/// error nothing made here survives.
unsafe fn create_presentation(
    gpu: &Gpu,
    size: RenderSize,
    present_mode: PresentModePref,
    shaders: &ShaderSet,
    set_layout: vk::DescriptorSetLayout,
) -> Result<(SwapchainBundle, PipelineBundle)> {
    let mut swapchain = unsafe { SwapchainBundle::create(gpu, size, present_mode) }?;
    let built = unsafe {
        PipelineBundle::create(
            &gpu.device,
            shaders,
            swapchain.format.format,
            gpu.depth_format,
            set_layout,
        )
    };
    let pipeline = match built {
        Ok(p) => p,
        Err(e) => {
            unsafe { swapchain.destroy(gpu) };
            return Err(e);
        }
    };
    if let Err(e) = unsafe { swapchain.create_framebuffers(&gpu.device, pipeline.render_pass) } {
        unsafe {
            swapchain.destroy(gpu);
            pipeline.destroy(&gpu.device);
        }
        return Err(e);
    }
    Ok((swapchain, pipeline))
}

impl GpuState {
    // STRICT ORDER:
    // 1) device
    // 2) descriptor layout + command pool
    // 3) static uploads (vertex, index, texture) + sampler
    // 4) frame slots, which reference the texture and sampler
    // 5) swapchain, then the pipeline for its format, then framebuffers
    // A failure at any step destroys everything made before it, device last.
    unsafe fn new(
        window: &dyn HasWindowHandle,
        display: &dyn HasDisplayHandle,
        size: RenderSize,
        cfg: &RenderConfig,
        scene: &SceneAssets,
    ) -> Result<Self> {
        let shaders = resolve_shaders(scene)?;
        let gpu = unsafe { Gpu::new(window, display, cfg) }?;
        let mut guard = Unwind::new(&gpu);
        guard.push(|g: &Gpu| unsafe { g.destroy() });
        let device = &gpu.device;

        let set_layout = unsafe { create_descriptor_set_layout(device) }?;
        guard.push(move |g: &Gpu| unsafe { g.device.destroy_descriptor_set_layout(set_layout, None) });
        let pool_ci = vk::CommandPoolCreateInfo {
            s_type: vk::StructureType::COMMAND_POOL_CREATE_INFO,
            flags: vk::CommandPoolCreateFlags::RESET_COMMAND_BUFFER,
            queue_family_index: gpu.families.graphics,
            ..Default::default()
        };
        let cmd_pool =
            unsafe { device.create_command_pool(&pool_ci, None) }.context("create_command_pool")?;
        guard.push(move |g: &Gpu| unsafe { g.device.destroy_command_pool(cmd_pool, None) });

        let mem_props = gpu.memory_properties();
        let uploader = Uploader::new(device, mem_props, gpu.graphics_queue, cmd_pool);
        let vertex_buffer = unsafe {
            uploader.upload_buffer(
                bytemuck::cast_slice(&scene.mesh.vertices),
                vk::BufferUsageFlags::VERTEX_BUFFER,
            )
        }
        .context("vertex buffer")?;
        guard.push(move |g: &Gpu| unsafe { vertex_buffer.destroy(&g.device) });
        let index_buffer = unsafe {
            uploader.upload_buffer(
                bytemuck::cast_slice(&scene.mesh.indices),
                vk::BufferUsageFlags::INDEX_BUFFER,
            )
        }
        .context("index buffer")?;
        guard.push(move |g: &Gpu| unsafe { index_buffer.destroy(&g.device) });
        let texture = unsafe { uploader.upload_texture(&scene.texture) }.context("texture")?;
        guard.push(move |g: &Gpu| unsafe { texture.destroy(&g.device) });
        let sampler = unsafe { create_texture_sampler(device, gpu.max_anisotropy) }?;
        guard.push(move |g: &Gpu| unsafe { g.device.destroy_sampler(sampler, None) });
        info!(
            "uploaded {} vertices, {} indices, {}x{} texture",
            scene.mesh.vertices.len(),
            scene.mesh.indices.len(),
            scene.texture.width,
            scene.texture.height
        );

        let mut frames = unsafe {
            FrameSlots::create(
                device,
                &mem_props,
                cmd_pool,
                set_layout,
                texture.view,
                sampler,
                cfg.slot_count(),
            )
        }?;
        let presentation =
            unsafe { create_presentation(&gpu, size, cfg.present_mode, &shaders, set_layout) };
        let (swapchain, pipeline) = match presentation {
            Ok(p) => p,
            Err(e) => {
                unsafe { frames.destroy(device) };
                return Err(e);
            }
        };

        guard.disarm();
        Ok(Self {
            gpu,
            present_mode: cfg.present_mode,
            clear_color: cfg.clear_color,
            shaders,
            set_layout,
            cmd_pool,
            vertex_buffer,
            index_buffer,
            index_count: scene.mesh.index_count(),
            texture,
            sampler,
            swapchain: Some(swapchain),
            pipeline,
            frames,
        })
    }

    fn swapchain(&self) -> Result<&SwapchainBundle> {
        self.swapchain
            .as_ref()
            .context("swapchain missing after a failed rebuild")
    }
}

impl SwapchainLifecycle for GpuState {
    fn wait_device_idle(&mut self) -> Result<()> {
        unsafe { self.gpu.device.device_wait_idle() }.context("device_wait_idle")
    }

    fn destroy_swapchain(&mut self) {
        if let Some(mut sc) = self.swapchain.take() {
            unsafe { sc.destroy(&self.gpu) };
        }
    }

    fn create_swapchain(&mut self, window: RenderSize) -> Result<()> {
        let mut sc = unsafe { SwapchainBundle::create(&self.gpu, window, self.present_mode) }?;

        // Format changes are rare (monitor moves); plain resizes keep the pipeline.
        if sc.format.format != self.pipeline.color_format {
            info!(
                "surface format {:?} -> {:?}, rebuilding pipeline",
                self.pipeline.color_format, sc.format.format
            );
            let built = unsafe {
                PipelineBundle::create(
                    &self.gpu.device,
                    &self.shaders,
                    sc.format.format,
                    self.gpu.depth_format,
                    self.set_layout,
                )
            };
            match built {
                Ok(p) => {
                    let old = std::mem::replace(&mut self.pipeline, p);
                    unsafe { old.destroy(&self.gpu.device) };
                }
                Err(e) => {
                    unsafe { sc.destroy(&self.gpu) };
                    return Err(e);
                }
            }
        }

        if let Err(e) = unsafe { sc.create_framebuffers(&self.gpu.device, self.pipeline.render_pass) }
        {
            unsafe { sc.destroy(&self.gpu) };
            return Err(e);
        }
        self.swapchain = Some(sc);
        Ok(())
    }
}

impl FrameDriver for GpuState {
    fn wait_for_slot(&mut self, slot: usize) -> Result<()> {
        let fence = self.frames.slots[slot].in_flight;
        unsafe { self.gpu.device.wait_for_fences(&[fence], true, u64::MAX) }
            .context("wait_for_fences")
    }

    fn acquire_image(&mut self, slot: usize) -> Result<AcquireOutcome> {
        let sc = self.swapchain()?.swapchain;
        let sem = self.frames.slots[slot].image_acquired;
        let res = unsafe {
            self.gpu
                .swapchain_loader
                .acquire_next_image(sc, u64::MAX, sem, vk::Fence::null())
        };
        match res {
            Ok((image_index, suboptimal)) => Ok(AcquireOutcome::Ready {
                image_index,
                suboptimal,
            }),
            Err(vk::Result::ERROR_OUT_OF_DATE_KHR) => Ok(AcquireOutcome::OutOfDate),
            Err(e) => Err(e).context("acquire_next_image"),
        }
    }

    fn reset_slot_fence(&mut self, slot: usize) -> Result<()> {
        let fence = self.frames.slots[slot].in_flight;
        unsafe { self.gpu.device.reset_fences(&[fence]) }.context("reset_fences")
    }

    fn record_commands(&mut self, slot: usize, image_index: u32) -> Result<()> {
        let sc = self.swapchain()?;
        let framebuffer = *sc
            .framebuffers
            .get(image_index as usize)
            .context("acquired image has no framebuffer")?;
        let f = &self.frames.slots[slot];
        let draw = DrawInputs {
            render_pass: self.pipeline.render_pass,
            framebuffer,
            extent: sc.extent,
            pipeline: self.pipeline.pipeline,
            layout: self.pipeline.layout,
            vertex_buffer: self.vertex_buffer.buffer,
            index_buffer: self.index_buffer.buffer,
            index_count: self.index_count,
            descriptor_set: f.descriptor_set,
            clear_color: self.clear_color,
        };
        unsafe { record_draw(&self.gpu.device, f.cmd, &draw) }
    }

    fn write_uniforms(&mut self, slot: usize, data: &UniformData) -> Result<()> {
        self.frames.slots[slot].write_uniforms(data);
        Ok(())
    }

    fn submit(&mut self, slot: usize) -> Result<()> {
        let f = &self.frames.slots[slot];
        let wait_stage = vk::PipelineStageFlags::COLOR_ATTACHMENT_OUTPUT;
        let info = vk::SubmitInfo {
            s_type: vk::StructureType::SUBMIT_INFO,
            wait_semaphore_count: 1,
            p_wait_semaphores: &f.image_acquired,
            p_wait_dst_stage_mask: &wait_stage,
            command_buffer_count: 1,
            p_command_buffers: &f.cmd,
            signal_semaphore_count: 1,
            p_signal_semaphores: &f.render_finished,
            ..Default::default()
        };
        unsafe {
            self.gpu.device.queue_submit(
                self.gpu.graphics_queue,
                std::slice::from_ref(&info),
                f.in_flight,
            )
        }
        .context("queue_submit")
    }

    fn present(&mut self, slot: usize, image_index: u32) -> Result<PresentOutcome> {
        let sc = self.swapchain()?.swapchain;
        let f = &self.frames.slots[slot];
        let info = vk::PresentInfoKHR {
            s_type: vk::StructureType::PRESENT_INFO_KHR,
            wait_semaphore_count: 1,
            p_wait_semaphores: &f.render_finished,
            swapchain_count: 1,
            p_swapchains: &sc,
            p_image_indices: &image_index,
            ..Default::default()
        };
        let res = unsafe {
            self.gpu
                .swapchain_loader
                .queue_present(self.gpu.present_queue, &info)
        };
        match res {
            Ok(false) => Ok(PresentOutcome::Presented),
            Ok(true) => Ok(PresentOutcome::Suboptimal),
            Err(vk::Result::ERROR_OUT_OF_DATE_KHR) => Ok(PresentOutcome::OutOfDate),
            Err(e) => Err(e).context("queue_present"),
        }
    }

    fn rebuild_swapchain(&mut self, host: &mut dyn WindowHost) -> Result<()> {
        recreate(self, host)?;
        Ok(())
    }
}

// STRICT TEARDOWN ORDER:
// 1) device idle
// 2) frame slots (sync objects, uniform buffers, descriptor pool)
// 3) pipeline + render pass
// 4) swapchain (framebuffers, depth, views)
// 5) static buffers, texture, sampler
// 6) descriptor layout, command pool
// 7) device, surface, messenger, instance
impl Drop for GpuState {
    fn drop(&mut self) {
        unsafe {
            let d = &self.gpu.device;
            d.device_wait_idle().ok();

            self.frames.destroy(d);
            self.pipeline.destroy(d);
            if let Some(mut sc) = self.swapchain.take() {
                sc.destroy(&self.gpu);
            }

            self.index_buffer.destroy(d);
            self.vertex_buffer.destroy(d);
            self.texture.destroy(d);
            d.destroy_sampler(self.sampler, None);
            d.destroy_descriptor_set_layout(self.set_layout, None);
            d.destroy_command_pool(self.cmd_pool, None);

            self.gpu.destroy();
        }
        debug!("vulkan teardown complete");
    }
}

impl Renderer for VkRenderer {
    fn new(
        window: &dyn HasWindowHandle,
        display: &dyn HasDisplayHandle,
        size: RenderSize,
        cfg: &RenderConfig,
        scene: &SceneAssets,
    ) -> Result<Self> {
        let state = unsafe { GpuState::new(window, display, size, cfg, scene) }?;
        let engine = FrameEngine::new(cfg.slot_count());
        let extent = state.swapchain()?.extent;
        info!(
            "Vulkan renderer ready ({}x{}, {} frames in flight)",
            extent.width,
            extent.height,
            engine.slot_count()
        );
        Ok(Self { engine, state })
    }

    fn request_resize(&mut self) {
        self.engine.request_resize();
    }

    fn render(
        &mut self,
        host: &mut dyn WindowHost,
        uniforms: &UniformData,
    ) -> Result<FrameStatus> {
        let status = match self.engine.tick(&mut self.state, host, uniforms)? {
            TickOutcome::Presented => FrameStatus::Presented,
            TickOutcome::Skipped => FrameStatus::Skipped,
        };
        Ok(status)
    }

    fn extent(&self) -> RenderSize {
        self.state
            .swapchain
            .as_ref()
            .map(SwapchainBundle::render_size)
            .unwrap_or_default()
    }

    fn wait_idle(&mut self) -> Result<()> {
        self.state.wait_device_idle()
    }
}
