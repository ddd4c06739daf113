// SPDX-License-Identifier: CEPL-1.0
//! Host to device transfers through staging buffers, plus the buffer and
//! image allocation helpers everything else builds on.

use crate::error::RenderError;
use crate::unwind::Unwind;
use anyhow::{Context, Result};
use ash::{vk, Device};
use tracing::debug;
use waku_render::TextureData;

pub const TEXTURE_FORMAT: vk::Format = vk::Format::R8G8B8A8_SRGB;

#[derive(Clone, Copy, Debug)]
pub struct GpuBuffer {
    pub buffer: vk::Buffer,
    pub memory: vk::DeviceMemory,
    /// Payload size. The allocation may be larger.
    pub size: vk::DeviceSize,
}

impl GpuBuffer {
    pub unsafe fn destroy(&self, device: &Device) {
        unsafe {
            device.destroy_buffer(self.buffer, None);
            device.free_memory(self.memory, None);
        }
    }
}

#[derive(Clone, Copy, Debug)]
pub struct GpuImage {
    pub image: vk::Image,
    pub memory: vk::DeviceMemory,
    pub view: vk::ImageView,
}

impl GpuImage {
    pub unsafe fn destroy(&self, device: &Device) {
        unsafe {
            device.destroy_image_view(self.view, None);
            device.destroy_image(self.image, None);
            device.free_memory(self.memory, None);
        }
    }
}

pub fn find_memory_type(
    props: &vk::PhysicalDeviceMemoryProperties,
    type_bits: u32,
    flags: vk::MemoryPropertyFlags,
) -> Result<u32> {
    (0..props.memory_type_count)
        .find(|&i| {
            (type_bits & (1 << i)) != 0
                && props.memory_types[i as usize].property_flags.contains(flags)
        })
        .ok_or_else(|| RenderError::NoMemoryType { type_bits, flags }.into())
}

/// Access and stage masks for one image layout change.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct LayoutTransition {
    pub src_access: vk::AccessFlags,
    pub dst_access: vk::AccessFlags,
    pub src_stage: vk::PipelineStageFlags,
    pub dst_stage: vk::PipelineStageFlags,
}

/// The two transitions a texture upload needs. Anything else is a bug in
/// the caller and is reported as [`RenderError::UnsupportedLayoutTransition`].
pub fn transition_masks(
    from: vk::ImageLayout,
    to: vk::ImageLayout,
) -> Result<LayoutTransition, RenderError> {
    use vk::ImageLayout as L;
    match (from, to) {
        (L::UNDEFINED, L::TRANSFER_DST_OPTIMAL) => Ok(LayoutTransition {
            src_access: vk::AccessFlags::empty(),
            dst_access: vk::AccessFlags::TRANSFER_WRITE,
            src_stage: vk::PipelineStageFlags::TOP_OF_PIPE,
            dst_stage: vk::PipelineStageFlags::TRANSFER,
        }),
        (L::TRANSFER_DST_OPTIMAL, L::SHADER_READ_ONLY_OPTIMAL) => Ok(LayoutTransition {
            src_access: vk::AccessFlags::TRANSFER_WRITE,
            dst_access: vk::AccessFlags::SHADER_READ,
            src_stage: vk::PipelineStageFlags::TRANSFER,
            dst_stage: vk::PipelineStageFlags::FRAGMENT_SHADER,
        }),
        _ => Err(RenderError::UnsupportedLayoutTransition { from, to }),
    }
}

/// Zero-sized buffers are invalid, so empty payloads get one byte. Nothing
/// is left behind on error.
unsafe fn create_buffer_raw(
    device: &Device,
    mem_props: &vk::PhysicalDeviceMemoryProperties,
    size: vk::DeviceSize,
    usage: vk::BufferUsageFlags,
    flags: vk::MemoryPropertyFlags,
) -> Result<GpuBuffer> {
    let bci = vk::BufferCreateInfo {
        s_type: vk::StructureType::BUFFER_CREATE_INFO,
        size: size.max(1),
        usage,
        sharing_mode: vk::SharingMode::EXCLUSIVE,
        ..Default::default()
    };
    let buffer = unsafe { device.create_buffer(&bci, None) }.context("create_buffer")?;
    let mut guard = Unwind::new(device);
    guard.push(move |d: &Device| unsafe { d.destroy_buffer(buffer, None) });

    let req = unsafe { device.get_buffer_memory_requirements(buffer) };
    let memory_type_index = find_memory_type(mem_props, req.memory_type_bits, flags)?;
    let mai = vk::MemoryAllocateInfo {
        s_type: vk::StructureType::MEMORY_ALLOCATE_INFO,
        allocation_size: req.size,
        memory_type_index,
        ..Default::default()
    };
    let memory = unsafe { device.allocate_memory(&mai, None) }.context("allocate_memory(buffer)")?;
    guard.push(move |d: &Device| unsafe { d.free_memory(memory, None) });
    unsafe { device.bind_buffer_memory(buffer, memory, 0) }.context("bind_buffer_memory")?;

    guard.disarm();
    Ok(GpuBuffer {
        buffer,
        memory,
        size,
    })
}

/// Host-visible, host-coherent buffer.
pub unsafe fn create_host_buffer(
    device: &Device,
    mem_props: &vk::PhysicalDeviceMemoryProperties,
    size: vk::DeviceSize,
    usage: vk::BufferUsageFlags,
) -> Result<GpuBuffer> {
    unsafe {
        create_buffer_raw(
            device,
            mem_props,
            size,
            usage,
            vk::MemoryPropertyFlags::HOST_VISIBLE | vk::MemoryPropertyFlags::HOST_COHERENT,
        )
    }
}

/// Device-local, optimal-tiling 2D image with a view.
pub unsafe fn create_image(
    device: &Device,
    mem_props: &vk::PhysicalDeviceMemoryProperties,
    width: u32,
    height: u32,
    format: vk::Format,
    usage: vk::ImageUsageFlags,
    aspect: vk::ImageAspectFlags,
) -> Result<GpuImage> {
    let img_ci = vk::ImageCreateInfo {
        s_type: vk::StructureType::IMAGE_CREATE_INFO,
        image_type: vk::ImageType::TYPE_2D,
        format,
        extent: vk::Extent3D {
            width,
            height,
            depth: 1,
        },
        mip_levels: 1,
        array_layers: 1,
        samples: vk::SampleCountFlags::TYPE_1,
        tiling: vk::ImageTiling::OPTIMAL,
        usage,
        sharing_mode: vk::SharingMode::EXCLUSIVE,
        initial_layout: vk::ImageLayout::UNDEFINED,
        ..Default::default()
    };
    let image = unsafe { device.create_image(&img_ci, None) }.context("create_image")?;
    let mut guard = Unwind::new(device);
    guard.push(move |d: &Device| unsafe { d.destroy_image(image, None) });

    let req = unsafe { device.get_image_memory_requirements(image) };
    let memory_type_index = find_memory_type(
        mem_props,
        req.memory_type_bits,
        vk::MemoryPropertyFlags::DEVICE_LOCAL,
    )?;
    let alloc = vk::MemoryAllocateInfo {
        s_type: vk::StructureType::MEMORY_ALLOCATE_INFO,
        allocation_size: req.size,
        memory_type_index,
        ..Default::default()
    };
    let memory = unsafe { device.allocate_memory(&alloc, None) }.context("allocate_memory(image)")?;
    guard.push(move |d: &Device| unsafe { d.free_memory(memory, None) });
    unsafe { device.bind_image_memory(image, memory, 0) }.context("bind_image_memory")?;

    let view_ci = vk::ImageViewCreateInfo {
        s_type: vk::StructureType::IMAGE_VIEW_CREATE_INFO,
        image,
        view_type: vk::ImageViewType::TYPE_2D,
        format,
        subresource_range: vk::ImageSubresourceRange {
            aspect_mask: aspect,
            base_mip_level: 0,
            level_count: 1,
            base_array_layer: 0,
            layer_count: 1,
        },
        ..Default::default()
    };
    let view = unsafe { device.create_image_view(&view_ci, None) }.context("create_image_view")?;
    guard.disarm();
    Ok(GpuImage {
        image,
        memory,
        view,
    })
}

/// LINEAR filtering, REPEAT addressing, anisotropy at the device maximum.
pub unsafe fn create_texture_sampler(device: &Device, max_anisotropy: f32) -> Result<vk::Sampler> {
    let ci = vk::SamplerCreateInfo {
        s_type: vk::StructureType::SAMPLER_CREATE_INFO,
        mag_filter: vk::Filter::LINEAR,
        min_filter: vk::Filter::LINEAR,
        address_mode_u: vk::SamplerAddressMode::REPEAT,
        address_mode_v: vk::SamplerAddressMode::REPEAT,
        address_mode_w: vk::SamplerAddressMode::REPEAT,
        anisotropy_enable: vk::TRUE,
        max_anisotropy,
        border_color: vk::BorderColor::INT_OPAQUE_BLACK,
        unnormalized_coordinates: vk::FALSE,
        compare_enable: vk::FALSE,
        compare_op: vk::CompareOp::ALWAYS,
        mipmap_mode: vk::SamplerMipmapMode::LINEAR,
        mip_lod_bias: 0.0,
        min_lod: 0.0,
        max_lod: 0.0,
        ..Default::default()
    };
    unsafe { device.create_sampler(&ci, None) }.context("create_sampler")
}

/// One-shot transfer context. Every call submits to `queue` and waits for
/// it to go idle before returning, so nothing here overlaps with anything.
pub struct Uploader<'a> {
    device: &'a Device,
    mem_props: vk::PhysicalDeviceMemoryProperties,
    queue: vk::Queue,
    pool: vk::CommandPool,
}

impl<'a> Uploader<'a> {
    pub fn new(
        device: &'a Device,
        mem_props: vk::PhysicalDeviceMemoryProperties,
        queue: vk::Queue,
        pool: vk::CommandPool,
    ) -> Self {
        Self {
            device,
            mem_props,
            queue,
            pool,
        }
    }

    /// Staging buffer already holding `bytes`.
    unsafe fn stage(&self, bytes: &[u8], usage: vk::BufferUsageFlags) -> Result<GpuBuffer> {
        let d = self.device;
        let staging =
            unsafe { create_host_buffer(d, &self.mem_props, bytes.len() as vk::DeviceSize, usage) }?;
        if !bytes.is_empty() {
            let ptr = unsafe {
                d.map_memory(staging.memory, 0, staging.size, vk::MemoryMapFlags::empty())
            }
            .context("map_memory(staging)")?;
            // SAFETY: the mapping covers at least bytes.len() bytes.
            unsafe {
                std::ptr::copy_nonoverlapping(bytes.as_ptr(), ptr.cast::<u8>(), bytes.len());
                d.unmap_memory(staging.memory);
            }
        }
        Ok(staging)
    }

    /// Record `f` into a throwaway command buffer, submit, and block until
    /// the queue is idle.
    unsafe fn one_shot<F>(&self, f: F) -> Result<()>
    where
        F: FnOnce(vk::CommandBuffer) -> Result<()>,
    {
        let d = self.device;
        let ai = vk::CommandBufferAllocateInfo {
            s_type: vk::StructureType::COMMAND_BUFFER_ALLOCATE_INFO,
            command_pool: self.pool,
            level: vk::CommandBufferLevel::PRIMARY,
            command_buffer_count: 1,
            ..Default::default()
        };
        let cmd = unsafe { d.allocate_command_buffers(&ai) }
            .context("allocate_command_buffers(one-shot)")?[0];

        let run = || -> Result<()> {
            let bi = vk::CommandBufferBeginInfo {
                s_type: vk::StructureType::COMMAND_BUFFER_BEGIN_INFO,
                flags: vk::CommandBufferUsageFlags::ONE_TIME_SUBMIT,
                ..Default::default()
            };
            unsafe { d.begin_command_buffer(cmd, &bi) }.context("begin_command_buffer")?;
            f(cmd)?;
            unsafe { d.end_command_buffer(cmd) }.context("end_command_buffer")?;

            let si = vk::SubmitInfo {
                s_type: vk::StructureType::SUBMIT_INFO,
                command_buffer_count: 1,
                p_command_buffers: &cmd,
                ..Default::default()
            };
            unsafe { d.queue_submit(self.queue, std::slice::from_ref(&si), vk::Fence::null()) }
                .context("queue_submit(one-shot)")?;
            unsafe { d.queue_wait_idle(self.queue) }.context("queue_wait_idle")?;
            Ok(())
        };
        let result = run();
        unsafe { d.free_command_buffers(self.pool, std::slice::from_ref(&cmd)) };
        result
    }

    /// Device-local buffer holding `bytes`. `usage` gains TRANSFER_DST.
    pub unsafe fn upload_buffer(
        &self,
        bytes: &[u8],
        usage: vk::BufferUsageFlags,
    ) -> Result<GpuBuffer> {
        let d = self.device;
        let staging = unsafe { self.stage(bytes, vk::BufferUsageFlags::TRANSFER_SRC) }?;
        let dst = match unsafe {
            create_buffer_raw(
                d,
                &self.mem_props,
                bytes.len() as vk::DeviceSize,
                usage | vk::BufferUsageFlags::TRANSFER_DST,
                vk::MemoryPropertyFlags::DEVICE_LOCAL,
            )
        } {
            Ok(b) => b,
            Err(e) => {
                unsafe { staging.destroy(d) };
                return Err(e);
            }
        };

        let copied = if bytes.is_empty() {
            Ok(())
        } else {
            unsafe {
                self.one_shot(|cmd| {
                    let region = vk::BufferCopy {
                        src_offset: 0,
                        dst_offset: 0,
                        size: staging.size,
                    };
                    d.cmd_copy_buffer(cmd, staging.buffer, dst.buffer, std::slice::from_ref(&region));
                    Ok(())
                })
            }
        };
        unsafe { staging.destroy(d) };
        if let Err(e) = copied {
            unsafe { dst.destroy(d) };
            return Err(e);
        }
        debug!("uploaded {} bytes ({:?})", bytes.len(), usage);
        Ok(dst)
    }

    /// Sampled RGBA8 texture in SHADER_READ_ONLY_OPTIMAL.
    pub unsafe fn upload_texture(&self, tex: &TextureData) -> Result<GpuImage> {
        let d = self.device;
        let staging = unsafe { self.stage(&tex.rgba, vk::BufferUsageFlags::TRANSFER_SRC) }?;
        let image = match unsafe {
            create_image(
                d,
                &self.mem_props,
                tex.width,
                tex.height,
                TEXTURE_FORMAT,
                vk::ImageUsageFlags::TRANSFER_DST | vk::ImageUsageFlags::SAMPLED,
                vk::ImageAspectFlags::COLOR,
            )
        } {
            Ok(i) => i,
            Err(e) => {
                unsafe { staging.destroy(d) };
                return Err(e);
            }
        };

        let recorded = unsafe {
            self.one_shot(|cmd| {
                self.cmd_transition(
                    cmd,
                    image.image,
                    vk::ImageLayout::UNDEFINED,
                    vk::ImageLayout::TRANSFER_DST_OPTIMAL,
                )?;
                self.cmd_copy_buffer_to_image(cmd, staging.buffer, image.image, tex.width, tex.height);
                self.cmd_transition(
                    cmd,
                    image.image,
                    vk::ImageLayout::TRANSFER_DST_OPTIMAL,
                    vk::ImageLayout::SHADER_READ_ONLY_OPTIMAL,
                )
            })
        };
        unsafe { staging.destroy(d) };
        if let Err(e) = recorded {
            unsafe { image.destroy(d) };
            return Err(e);
        }
        debug!("uploaded texture {}x{} ({} bytes)", tex.width, tex.height, tex.byte_len());
        Ok(image)
    }

    fn cmd_transition(
        &self,
        cmd: vk::CommandBuffer,
        image: vk::Image,
        from: vk::ImageLayout,
        to: vk::ImageLayout,
    ) -> Result<()> {
        let masks = transition_masks(from, to)?;
        let barrier = vk::ImageMemoryBarrier {
            s_type: vk::StructureType::IMAGE_MEMORY_BARRIER,
            old_layout: from,
            new_layout: to,
            src_queue_family_index: vk::QUEUE_FAMILY_IGNORED,
            dst_queue_family_index: vk::QUEUE_FAMILY_IGNORED,
            image,
            subresource_range: vk::ImageSubresourceRange {
                aspect_mask: vk::ImageAspectFlags::COLOR,
                base_mip_level: 0,
                level_count: 1,
                base_array_layer: 0,
                layer_count: 1,
            },
            src_access_mask: masks.src_access,
            dst_access_mask: masks.dst_access,
            ..Default::default()
        };
        unsafe {
            self.device.cmd_pipeline_barrier(
                cmd,
                masks.src_stage,
                masks.dst_stage,
                vk::DependencyFlags::empty(),
                &[],
                &[],
                std::slice::from_ref(&barrier),
            );
        }
        Ok(())
    }

    fn cmd_copy_buffer_to_image(
        &self,
        cmd: vk::CommandBuffer,
        buffer: vk::Buffer,
        image: vk::Image,
        width: u32,
        height: u32,
    ) {
        let region = vk::BufferImageCopy {
            buffer_offset: 0,
            buffer_row_length: 0,
            buffer_image_height: 0,
            image_subresource: vk::ImageSubresourceLayers {
                aspect_mask: vk::ImageAspectFlags::COLOR,
                mip_level: 0,
                base_array_layer: 0,
                layer_count: 1,
            },
            image_offset: vk::Offset3D { x: 0, y: 0, z: 0 },
            image_extent: vk::Extent3D {
                width,
                height,
                depth: 1,
            },
        };
        unsafe {
            self.device.cmd_copy_buffer_to_image(
                cmd,
                buffer,
                image,
                vk::ImageLayout::TRANSFER_DST_OPTIMAL,
                std::slice::from_ref(&region),
            );
        }
    }

    /// Copy a device buffer back to the host. `src` needs TRANSFER_SRC usage.
    pub unsafe fn read_back(&self, src: &GpuBuffer) -> Result<Vec<u8>> {
        if src.size == 0 {
            return Ok(Vec::new());
        }
        let d = self.device;
        let host = unsafe {
            create_host_buffer(d, &self.mem_props, src.size, vk::BufferUsageFlags::TRANSFER_DST)
        }?;
        let result = (|| -> Result<Vec<u8>> {
            unsafe {
                self.one_shot(|cmd| {
                    let region = vk::BufferCopy {
                        src_offset: 0,
                        dst_offset: 0,
                        size: src.size,
                    };
                    d.cmd_copy_buffer(cmd, src.buffer, host.buffer, std::slice::from_ref(&region));
                    Ok(())
                })
            }?;
            let ptr = unsafe { d.map_memory(host.memory, 0, host.size, vk::MemoryMapFlags::empty()) }
                .context("map_memory(read_back)")?;
            // SAFETY: mapped range is host.size bytes and coherent.
            let out =
                unsafe { std::slice::from_raw_parts(ptr.cast::<u8>(), host.size as usize) }.to_vec();
            unsafe { d.unmap_memory(host.memory) };
            Ok(out)
        })();
        unsafe { host.destroy(d) };
        result
    }
}
