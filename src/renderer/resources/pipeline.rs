use std::ffi::CStr;
use ash::vk;
use crate::renderer::config::RenderConfig;
use crate::renderer::error::RenderError;
use crate::renderer::internals::handles::{DeviceHandle, HandleDestroyer};
use crate::renderer::resources::descriptor::DescriptorManager;
use crate::renderer::resources::shader::GraphicsShader;
use crate::renderer::resources::vertex::Vertex;

const SHADER_ENTRY_POINT: &CStr = c"main";

/// The graphics pipeline, its layout and the descriptor set layout the
/// layout was created from
pub struct PipelineState {
    pub pipeline: vk::Pipeline,
    pub layout: vk::PipelineLayout,
    pub descriptors: DescriptorManager,
}

impl PipelineState {
    pub fn new(
        device: &ash::Device,
        render_pass: vk::RenderPass,
        config: &RenderConfig,
    ) -> Result<Self, RenderError> {
        let mut descriptors = DescriptorManager::new(device)?;

        let built = GraphicsShader::new(config, device).and_then(|shader| {
            GraphicsPipelineBuilder::new(device, render_pass)
                .with_shader(shader)
                .with_descriptor_set_layout(descriptors.layout)
                .with_input_topology(vk::PrimitiveTopology::TRIANGLE_LIST)
                .with_polygon_mode(vk::PolygonMode::FILL)
                .with_cull_mode(vk::CullModeFlags::BACK, vk::FrontFace::CLOCKWISE)
                .with_blending_disabled()
                .with_depth_test(true, Some(vk::CompareOp::LESS_OR_EQUAL))
                .build()
        });

        match built {
            Ok((pipeline, layout)) => Ok(Self {
                pipeline,
                layout,
                descriptors,
            }),
            Err(err) => {
                descriptors.release(device);
                Err(err)
            }
        }
    }

    pub fn is_released(&self) -> bool {
        self.pipeline == vk::Pipeline::null()
            && self.layout == vk::PipelineLayout::null()
            && self.descriptors.layout == vk::DescriptorSetLayout::null()
    }

    /// Destroys the pipeline, then its layout, then the descriptor set layout
    pub fn release(&mut self, destroyer: &impl HandleDestroyer) {
        destroyer.destroy(DeviceHandle::Pipeline(self.pipeline));
        destroyer.destroy(DeviceHandle::PipelineLayout(self.layout));
        self.descriptors.release(destroyer);
        self.pipeline = vk::Pipeline::null();
        self.layout = vk::PipelineLayout::null();
    }
}

impl Drop for PipelineState {
    fn drop(&mut self) {
        if !self.is_released() {
            log::warn!("Dropping PipelineState without releasing it");
        }
    }
}

pub struct GraphicsPipelineBuilder<'a> {
    device: &'a ash::Device,
    render_pass: vk::RenderPass,

    input_assembly: vk::PipelineInputAssemblyStateCreateInfo<'static>,
    rasterization: vk::PipelineRasterizationStateCreateInfo<'static>,
    color_blend_attachment: vk::PipelineColorBlendAttachmentState,
    multisample: vk::PipelineMultisampleStateCreateInfo<'static>,
    depth_stencil: vk::PipelineDepthStencilStateCreateInfo<'static>,
    shader: Option<GraphicsShader<'a>>,
    descriptor_set_layout: Option<vk::DescriptorSetLayout>,
}

impl<'a> GraphicsPipelineBuilder<'a> {
    pub fn new(device: &'a ash::Device, render_pass: vk::RenderPass) -> Self {
        Self {
            device,
            render_pass,

            input_assembly: Self::default_input_assembly_info(),
            rasterization: Self::default_rasterization_info(),
            color_blend_attachment: Self::default_color_blend_state(),
            multisample: Self::default_multisample_info(),
            depth_stencil: Self::default_depth_stencil_info(),
            shader: None,
            descriptor_set_layout: None,
        }
    }

    pub fn with_shader(mut self, shader: GraphicsShader<'a>) -> Self {
        let _ = self.shader.replace(shader);
        self
    }

    pub fn with_descriptor_set_layout(mut self, layout: vk::DescriptorSetLayout) -> Self {
        let _ = self.descriptor_set_layout.replace(layout);
        self
    }

    pub fn with_input_topology(mut self, topology: vk::PrimitiveTopology) -> Self {
        self.input_assembly.topology = topology;
        self.input_assembly.primitive_restart_enable = vk::FALSE;
        self
    }

    pub fn with_polygon_mode(mut self, mode: vk::PolygonMode) -> Self {
        self.rasterization.polygon_mode = mode;
        self.rasterization.line_width = 1.0;
        self
    }

    pub fn with_cull_mode(
        mut self,
        cull_mode: vk::CullModeFlags,
        front_face: vk::FrontFace,
    ) -> Self {
        self.rasterization.cull_mode = cull_mode;
        self.rasterization.front_face = front_face;
        self
    }

    pub fn with_blending_disabled(mut self) -> Self {
        self.color_blend_attachment.color_write_mask = vk::ColorComponentFlags::RGBA;
        self.color_blend_attachment.blend_enable = vk::FALSE;
        self
    }

    pub fn with_depth_test(mut self, enable: bool, compare: Option<vk::CompareOp>) -> Self {
        let enable_flag = if enable { vk::TRUE } else { vk::FALSE };
        self.depth_stencil.depth_test_enable = enable_flag;
        self.depth_stencil.depth_write_enable = enable_flag;
        self.depth_stencil.depth_compare_op = if enable {
            compare.unwrap_or(vk::CompareOp::LESS_OR_EQUAL)
        } else {
            vk::CompareOp::ALWAYS
        };
        self
    }

    /// Creates the pipeline layout and the pipeline. The shader modules are
    /// destroyed before this returns, the pipeline no longer needs them.
    pub fn build(mut self) -> Result<(vk::Pipeline, vk::PipelineLayout), RenderError> {
        let device = self.device;

        let shader = self
            .shader
            .take()
            .ok_or(RenderError::Vulkan(vk::Result::ERROR_INITIALIZATION_FAILED))?;

        let set_layouts = self.descriptor_set_layout.as_slice();
        let layout_info = vk::PipelineLayoutCreateInfo::default().set_layouts(set_layouts);
        let pipeline_layout = unsafe { device.create_pipeline_layout(&layout_info, None)? };

        let shader_stages = [
            vk::PipelineShaderStageCreateInfo::default()
                .stage(vk::ShaderStageFlags::VERTEX)
                .module(shader.vert_mod)
                .name(SHADER_ENTRY_POINT),
            vk::PipelineShaderStageCreateInfo::default()
                .stage(vk::ShaderStageFlags::FRAGMENT)
                .module(shader.frag_mod)
                .name(SHADER_ENTRY_POINT),
        ];

        let vertex_input_description = Vertex::input_description();
        let vertex_input = vk::PipelineVertexInputStateCreateInfo::default()
            .vertex_binding_descriptions(&vertex_input_description.bindings)
            .vertex_attribute_descriptions(&vertex_input_description.attributes)
            .flags(vertex_input_description.flags);

        // Viewport and scissor are set per frame
        let viewport_state = vk::PipelineViewportStateCreateInfo::default()
            .viewport_count(1)
            .scissor_count(1);
        let dynamic_states = [vk::DynamicState::VIEWPORT, vk::DynamicState::SCISSOR];
        let dynamic_info = vk::PipelineDynamicStateCreateInfo::default()
            .dynamic_states(&dynamic_states);

        let color_blend_attachments = [self.color_blend_attachment];
        let color_blend_info = vk::PipelineColorBlendStateCreateInfo::default()
            .logic_op_enable(false)
            .logic_op(vk::LogicOp::COPY)
            .attachments(&color_blend_attachments);

        let pipeline_info = vk::GraphicsPipelineCreateInfo::default()
            .stages(&shader_stages)
            .vertex_input_state(&vertex_input)
            .input_assembly_state(&self.input_assembly)
            .viewport_state(&viewport_state)
            .rasterization_state(&self.rasterization)
            .multisample_state(&self.multisample)
            .depth_stencil_state(&self.depth_stencil)
            .color_blend_state(&color_blend_info)
            .dynamic_state(&dynamic_info)
            .layout(pipeline_layout)
            .render_pass(self.render_pass)
            .subpass(0);

        let created = unsafe {
            device.create_graphics_pipelines(vk::PipelineCache::null(), &[pipeline_info], None)
        };
        drop(shader);

        match created {
            Ok(pipelines) => match pipelines.into_iter().next() {
                Some(pipeline) => Ok((pipeline, pipeline_layout)),
                None => {
                    HandleDestroyer::destroy(device, DeviceHandle::PipelineLayout(pipeline_layout));
                    Err(RenderError::Vulkan(vk::Result::ERROR_INITIALIZATION_FAILED))
                }
            },
            Err((_, err)) => {
                log::error!("Failed to create graphics pipeline: {}", err);
                HandleDestroyer::destroy(device, DeviceHandle::PipelineLayout(pipeline_layout));
                Err(err.into())
            }
        }
    }

    fn default_input_assembly_info() -> vk::PipelineInputAssemblyStateCreateInfo<'static> {
        vk::PipelineInputAssemblyStateCreateInfo::default()
            .topology(vk::PrimitiveTopology::TRIANGLE_LIST)
            .primitive_restart_enable(false)
    }

    fn default_rasterization_info() -> vk::PipelineRasterizationStateCreateInfo<'static> {
        vk::PipelineRasterizationStateCreateInfo::default()
            .depth_clamp_enable(false)
            // Discards all primitives before rasterization stage if true
            .rasterizer_discard_enable(false)
            .polygon_mode(vk::PolygonMode::FILL)
            .line_width(1.0)
            .cull_mode(vk::CullModeFlags::NONE)
            .front_face(vk::FrontFace::CLOCKWISE)
            // No depth bias
            .depth_bias_enable(false)
            .depth_bias_constant_factor(0.0)
            .depth_bias_clamp(0.0)
            .depth_bias_slope_factor(0.0)
    }

    fn default_color_blend_state() -> vk::PipelineColorBlendAttachmentState {
        vk::PipelineColorBlendAttachmentState::default()
            .color_write_mask(vk::ColorComponentFlags::RGBA)
            .blend_enable(false)
    }

    fn default_multisample_info() -> vk::PipelineMultisampleStateCreateInfo<'static> {
        vk::PipelineMultisampleStateCreateInfo::default()
            .sample_shading_enable(false)
            // 1 sample per pixel means no multisampling
            .rasterization_samples(vk::SampleCountFlags::TYPE_1)
            .min_sample_shading(1.0)
            .alpha_to_coverage_enable(false)
            .alpha_to_one_enable(false)
    }

    fn default_depth_stencil_info() -> vk::PipelineDepthStencilStateCreateInfo<'static> {
        vk::PipelineDepthStencilStateCreateInfo::default()
            .depth_test_enable(true)
            .depth_write_enable(true)
            .depth_compare_op(vk::CompareOp::LESS_OR_EQUAL)
            .depth_bounds_test_enable(false)
            .min_depth_bounds(0.0)
            .max_depth_bounds(1.0)
            .stencil_test_enable(false)
    }
}
