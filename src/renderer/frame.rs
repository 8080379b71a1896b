use ash::vk;
use crate::renderer::internals::commands::{CommandRecorder, RenderPassBegin};
use crate::renderer::resources::object::ObjectResourceSet;
use crate::renderer::resources::pipeline::PipelineState;

pub const CLEAR_COLOR: [f32; 4] = [0.0, 0.0, 0.0, 1.0];
pub const CLEAR_DEPTH: f32 = 1.0;
pub const CLEAR_STENCIL: u32 = 0;

/// Where a frame is rendered to
#[derive(Debug, Clone, Copy)]
pub struct FrameTarget {
    pub render_pass: vk::RenderPass,
    pub framebuffer: vk::Framebuffer,
    pub extent: vk::Extent2D,
}

/// Records the commands of one frame: clear, full-target viewport, then a
/// single draw of the object when there is one
pub struct FrameRenderer;

impl FrameRenderer {
    pub fn record(
        recorder: &mut dyn CommandRecorder,
        target: &FrameTarget,
        pipeline: &PipelineState,
        object: Option<&ObjectResourceSet>,
    ) {
        recorder.begin_render_pass(&RenderPassBegin {
            render_pass: target.render_pass,
            framebuffer: target.framebuffer,
            extent: target.extent,
            clear_color: CLEAR_COLOR,
            clear_depth: CLEAR_DEPTH,
            clear_stencil: CLEAR_STENCIL,
        });

        recorder.set_viewport(vk::Viewport {
            x: 0.0,
            y: 0.0,
            width: target.extent.width as f32,
            height: target.extent.height as f32,
            min_depth: 0.0,
            max_depth: 1.0,
        });
        recorder.set_scissor(vk::Rect2D {
            offset: vk::Offset2D { x: 0, y: 0 },
            extent: target.extent,
        });

        recorder.bind_graphics_pipeline(pipeline.pipeline);

        if let Some(object) = object {
            if let (Some(set), Some(vertex_buffer)) = (object.descriptor_set(), object.vertex_buffer()) {
                recorder.bind_descriptor_set(pipeline.layout, set);
                recorder.bind_vertex_buffer(vertex_buffer, 0);
                recorder.draw(object.vertex_count(), 1, 0, 0);
            }
        }

        recorder.end_render_pass();
    }
}
