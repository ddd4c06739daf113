// SPDX-License-Identifier: CEPL-1.0
use anyhow::{Context, Result};
use ash::{vk, Device};

/// Everything one draw of the mesh binds. Built fresh each tick since the
/// framebuffer follows the acquired image.
#[derive(Clone, Copy, Debug)]
pub struct DrawInputs {
    pub render_pass: vk::RenderPass,
    pub framebuffer: vk::Framebuffer,
    pub extent: vk::Extent2D,
    pub pipeline: vk::Pipeline,
    pub layout: vk::PipelineLayout,
    pub vertex_buffer: vk::Buffer,
    pub index_buffer: vk::Buffer,
    pub index_count: u32,
    pub descriptor_set: vk::DescriptorSet,
    pub clear_color: [f32; 4],
}

/// Color for attachment 0, depth 1.0 (far plane) for attachment 1.
pub fn clear_values(color: [f32; 4]) -> [vk::ClearValue; 2] {
    [
        vk::ClearValue {
            color: vk::ClearColorValue { float32: color },
        },
        vk::ClearValue {
            depth_stencil: vk::ClearDepthStencilValue {
                depth: 1.0,
                stencil: 0,
            },
        },
    ]
}

pub fn full_viewport(extent: vk::Extent2D) -> vk::Viewport {
    vk::Viewport {
        x: 0.0,
        y: 0.0,
        width: extent.width as f32,
        height: extent.height as f32,
        min_depth: 0.0,
        max_depth: 1.0,
    }
}

pub fn full_scissor(extent: vk::Extent2D) -> vk::Rect2D {
    vk::Rect2D {
        offset: vk::Offset2D { x: 0, y: 0 },
        extent,
    }
}

// STRICT ORDER:
// reset -> begin -> render pass -> viewport/scissor -> pipeline ->
// vertex/index -> descriptor set -> draw -> end pass -> end
/// The pool must have RESET_COMMAND_BUFFER so this reset leaves sibling
/// slots' buffers alone.
pub unsafe fn record_draw(device: &Device, cmd: vk::CommandBuffer, draw: &DrawInputs) -> Result<()> {
    unsafe {
        device
            .reset_command_buffer(cmd, vk::CommandBufferResetFlags::empty())
            .context("reset_command_buffer")?;
        let begin = vk::CommandBufferBeginInfo {
            s_type: vk::StructureType::COMMAND_BUFFER_BEGIN_INFO,
            ..Default::default()
        };
        device
            .begin_command_buffer(cmd, &begin)
            .context("begin_command_buffer")?;

        let clears = clear_values(draw.clear_color);
        let rp_begin = vk::RenderPassBeginInfo {
            s_type: vk::StructureType::RENDER_PASS_BEGIN_INFO,
            render_pass: draw.render_pass,
            framebuffer: draw.framebuffer,
            render_area: full_scissor(draw.extent),
            clear_value_count: clears.len() as u32,
            p_clear_values: clears.as_ptr(),
            ..Default::default()
        };
        device.cmd_begin_render_pass(cmd, &rp_begin, vk::SubpassContents::INLINE);

        device.cmd_set_viewport(cmd, 0, &[full_viewport(draw.extent)]);
        device.cmd_set_scissor(cmd, 0, &[full_scissor(draw.extent)]);
        device.cmd_bind_pipeline(cmd, vk::PipelineBindPoint::GRAPHICS, draw.pipeline);
        device.cmd_bind_vertex_buffers(cmd, 0, &[draw.vertex_buffer], &[0]);
        device.cmd_bind_index_buffer(cmd, draw.index_buffer, 0, vk::IndexType::UINT32);
        device.cmd_bind_descriptor_sets(
            cmd,
            vk::PipelineBindPoint::GRAPHICS,
            draw.layout,
            0,
            &[draw.descriptor_set],
            &[],
        );
        device.cmd_draw_indexed(cmd, draw.index_count, 1, 0, 0, 0);

        device.cmd_end_render_pass(cmd);
        device.end_command_buffer(cmd).context("end_command_buffer")?;
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn clears_color_and_far_depth() {
        let clears = clear_values([0.1, 0.2, 0.3, 1.0]);
        // SAFETY: reading the variants we just wrote.
        unsafe {
            assert_eq!(clears[0].color.float32, [0.1, 0.2, 0.3, 1.0]);
            assert_eq!(clears[1].depth_stencil.depth, 1.0);
            assert_eq!(clears[1].depth_stencil.stencil, 0);
        }
    }

    #[test]
    fn viewport_and_scissor_cover_extent() {
        let extent = vk::Extent2D {
            width: 1280,
            height: 720,
        };
        let vp = full_viewport(extent);
        assert_eq!((vp.width, vp.height, vp.min_depth, vp.max_depth), (1280.0, 720.0, 0.0, 1.0));
        let sc = full_scissor(extent);
        assert_eq!((sc.offset.x, sc.offset.y), (0, 0));
        assert_eq!(sc.extent, extent);
    }
}
