use ash::vk;
use crate::renderer::internals::transfer::LayoutTransition;

/// Everything needed to open the default render pass for one frame
#[derive(Debug, Clone, Copy)]
pub struct RenderPassBegin {
    pub render_pass: vk::RenderPass,
    pub framebuffer: vk::Framebuffer,
    pub extent: vk::Extent2D,
    pub clear_color: [f32; 4],
    pub clear_depth: f32,
    pub clear_stencil: u32,
}

/// The commands the renderer records, one method per `vkCmd*` call it makes
pub trait CommandRecorder {
    fn begin_render_pass(&mut self, begin: &RenderPassBegin);
    fn end_render_pass(&mut self);
    fn set_viewport(&mut self, viewport: vk::Viewport);
    fn set_scissor(&mut self, scissor: vk::Rect2D);
    fn bind_graphics_pipeline(&mut self, pipeline: vk::Pipeline);
    fn bind_descriptor_set(&mut self, layout: vk::PipelineLayout, set: vk::DescriptorSet);
    fn bind_vertex_buffer(&mut self, buffer: vk::Buffer, offset: vk::DeviceSize);
    fn draw(
        &mut self,
        vertex_count: u32,
        instance_count: u32,
        first_vertex: u32,
        first_instance: u32,
    );
    fn image_barrier(&mut self, image: vk::Image, transition: &LayoutTransition);
    fn copy_buffer(&mut self, src: vk::Buffer, dst: vk::Buffer, size: vk::DeviceSize);
    fn copy_buffer_to_image(&mut self, src: vk::Buffer, image: vk::Image, extent: vk::Extent2D);
}

/// Records into a command buffer that is already in the recording state
pub struct VkCommandRecorder<'a> {
    device: &'a ash::Device,
    cmd: vk::CommandBuffer,
}

impl<'a> VkCommandRecorder<'a> {
    pub fn new(device: &'a ash::Device, cmd: vk::CommandBuffer) -> Self {
        Self { device, cmd }
    }
}

impl CommandRecorder for VkCommandRecorder<'_> {
    fn begin_render_pass(&mut self, begin: &RenderPassBegin) {
        let clear_values = [
            vk::ClearValue {
                color: vk::ClearColorValue {
                    float32: begin.clear_color,
                },
            },
            vk::ClearValue {
                depth_stencil: vk::ClearDepthStencilValue {
                    depth: begin.clear_depth,
                    stencil: begin.clear_stencil,
                },
            },
        ];
        let begin_info = vk::RenderPassBeginInfo::default()
            .render_pass(begin.render_pass)
            .framebuffer(begin.framebuffer)
            .render_area(vk::Rect2D {
                offset: vk::Offset2D { x: 0, y: 0 },
                extent: begin.extent,
            })
            .clear_values(&clear_values);
        unsafe {
            self.device.cmd_begin_render_pass(
                self.cmd,
                &begin_info,
                vk::SubpassContents::INLINE,
            );
        }
    }

    fn end_render_pass(&mut self) {
        unsafe { self.device.cmd_end_render_pass(self.cmd) }
    }

    fn set_viewport(&mut self, viewport: vk::Viewport) {
        unsafe { self.device.cmd_set_viewport(self.cmd, 0, &[viewport]) }
    }

    fn set_scissor(&mut self, scissor: vk::Rect2D) {
        unsafe { self.device.cmd_set_scissor(self.cmd, 0, &[scissor]) }
    }

    fn bind_graphics_pipeline(&mut self, pipeline: vk::Pipeline) {
        unsafe {
            self.device.cmd_bind_pipeline(
                self.cmd,
                vk::PipelineBindPoint::GRAPHICS,
                pipeline,
            );
        }
    }

    fn bind_descriptor_set(&mut self, layout: vk::PipelineLayout, set: vk::DescriptorSet) {
        unsafe {
            self.device.cmd_bind_descriptor_sets(
                self.cmd,
                vk::PipelineBindPoint::GRAPHICS,
                layout,
                0,
                &[set],
                &[],
            );
        }
    }

    fn bind_vertex_buffer(&mut self, buffer: vk::Buffer, offset: vk::DeviceSize) {
        unsafe {
            self.device.cmd_bind_vertex_buffers(self.cmd, 0, &[buffer], &[offset]);
        }
    }

    fn draw(
        &mut self,
        vertex_count: u32,
        instance_count: u32,
        first_vertex: u32,
        first_instance: u32,
    ) {
        unsafe {
            self.device.cmd_draw(
                self.cmd,
                vertex_count,
                instance_count,
                first_vertex,
                first_instance,
            );
        }
    }

    fn image_barrier(&mut self, image: vk::Image, transition: &LayoutTransition) {
        let barrier = vk::ImageMemoryBarrier::default()
            .old_layout(transition.old)
            .new_layout(transition.new)
            .src_queue_family_index(vk::QUEUE_FAMILY_IGNORED)
            .dst_queue_family_index(vk::QUEUE_FAMILY_IGNORED)
            .image(image)
            .subresource_range(vk::ImageSubresourceRange {
                aspect_mask: vk::ImageAspectFlags::COLOR,
                base_mip_level: 0,
                level_count: 1,
                base_array_layer: 0,
                layer_count: 1,
            })
            .src_access_mask(transition.src_access)
            .dst_access_mask(transition.dst_access);
        unsafe {
            self.device.cmd_pipeline_barrier(
                self.cmd,
                transition.src_stage,
                transition.dst_stage,
                vk::DependencyFlags::empty(),
                &[],
                &[],
                &[barrier],
            );
        }
    }

    fn copy_buffer(&mut self, src: vk::Buffer, dst: vk::Buffer, size: vk::DeviceSize) {
        let region = vk::BufferCopy {
            src_offset: 0,
            dst_offset: 0,
            size,
        };
        unsafe { self.device.cmd_copy_buffer(self.cmd, src, dst, &[region]) }
    }

    fn copy_buffer_to_image(&mut self, src: vk::Buffer, image: vk::Image, extent: vk::Extent2D) {
        // Zero row length and height mean tightly packed pixels
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
                width: extent.width,
                height: extent.height,
                depth: 1,
            },
        };
        unsafe {
            self.device.cmd_copy_buffer_to_image(
                self.cmd,
                src,
                image,
                vk::ImageLayout::TRANSFER_DST_OPTIMAL,
                &[region],
            );
        }
    }
}
