//! Test doubles for the device-facing seams of the renderer

use std::cell::RefCell;
use ash::vk;
use crate::renderer::core::device::RenderDevice;
use crate::renderer::core::instance::RenderInstance;
use crate::renderer::internals::commands::{CommandRecorder, RenderPassBegin};
use crate::renderer::internals::handles::{DeviceHandle, HandleDestroyer};
use crate::renderer::internals::memory::MemoryAllocator;
use crate::renderer::internals::transfer::{LayoutTransition, TransferEngine};
use crate::renderer::resources::buffer::GpuBuffer;
use crate::renderer::resources::descriptor::ObjectDescriptors;
use crate::renderer::resources::factory::ResourceFactory;
use crate::renderer::resources::image::GpuImage;
use crate::renderer::resources::model::Model;
use crate::renderer::resources::object::ObjectResourceSet;

/// Builds a non-null handle that is never handed to a driver
pub fn fake<T: vk::Handle>(raw: u64) -> T {
    T::from_raw(raw)
}

/// Remembers every handle it is asked to destroy, in order
#[derive(Default)]
pub struct DestroyLog {
    destroyed: RefCell<Vec<DeviceHandle>>,
}

impl DestroyLog {
    pub fn destroyed(&self) -> Vec<DeviceHandle> {
        self.destroyed.borrow().clone()
    }
}

impl HandleDestroyer for DestroyLog {
    fn destroy(&self, handle: DeviceHandle) {
        if !handle.is_null() {
            self.destroyed.borrow_mut().push(handle);
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub enum Recorded {
    BeginRenderPass {
        render_pass: vk::RenderPass,
        framebuffer: vk::Framebuffer,
        width: u32,
        height: u32,
        clear_color: [f32; 4],
        clear_depth: f32,
        clear_stencil: u32,
    },
    EndRenderPass,
    SetViewport {
        width: f32,
        height: f32,
        min_depth: f32,
        max_depth: f32,
    },
    SetScissor {
        width: u32,
        height: u32,
    },
    BindPipeline(vk::Pipeline),
    BindDescriptorSet {
        layout: vk::PipelineLayout,
        set: vk::DescriptorSet,
    },
    BindVertexBuffer {
        buffer: vk::Buffer,
        offset: vk::DeviceSize,
    },
    Draw {
        vertex_count: u32,
        instance_count: u32,
        first_vertex: u32,
        first_instance: u32,
    },
    ImageBarrier {
        image: vk::Image,
        old: vk::ImageLayout,
        new: vk::ImageLayout,
    },
    CopyBuffer {
        src: vk::Buffer,
        dst: vk::Buffer,
        size: vk::DeviceSize,
    },
    CopyBufferToImage {
        src: vk::Buffer,
        image: vk::Image,
        width: u32,
        height: u32,
    },
}

#[derive(Default)]
pub struct RecordingCommands {
    pub commands: Vec<Recorded>,
}

impl RecordingCommands {
    pub fn draws(&self) -> Vec<&Recorded> {
        self.commands
            .iter()
            .filter(|c| matches!(c, Recorded::Draw { .. }))
            .collect()
    }

    pub fn position(&self, predicate: impl Fn(&Recorded) -> bool) -> Option<usize> {
        self.commands.iter().position(predicate)
    }
}

impl CommandRecorder for RecordingCommands {
    fn begin_render_pass(&mut self, begin: &RenderPassBegin) {
        self.commands.push(Recorded::BeginRenderPass {
            render_pass: begin.render_pass,
            framebuffer: begin.framebuffer,
            width: begin.extent.width,
            height: begin.extent.height,
            clear_color: begin.clear_color,
            clear_depth: begin.clear_depth,
            clear_stencil: begin.clear_stencil,
        });
    }

    fn end_render_pass(&mut self) {
        self.commands.push(Recorded::EndRenderPass);
    }

    fn set_viewport(&mut self, viewport: vk::Viewport) {
        self.commands.push(Recorded::SetViewport {
            width: viewport.width,
            height: viewport.height,
            min_depth: viewport.min_depth,
            max_depth: viewport.max_depth,
        });
    }

    fn set_scissor(&mut self, scissor: vk::Rect2D) {
        self.commands.push(Recorded::SetScissor {
            width: scissor.extent.width,
            height: scissor.extent.height,
        });
    }

    fn bind_graphics_pipeline(&mut self, pipeline: vk::Pipeline) {
        self.commands.push(Recorded::BindPipeline(pipeline));
    }

    fn bind_descriptor_set(&mut self, layout: vk::PipelineLayout, set: vk::DescriptorSet) {
        self.commands.push(Recorded::BindDescriptorSet { layout, set });
    }

    fn bind_vertex_buffer(&mut self, buffer: vk::Buffer, offset: vk::DeviceSize) {
        self.commands.push(Recorded::BindVertexBuffer { buffer, offset });
    }

    fn draw(
        &mut self,
        vertex_count: u32,
        instance_count: u32,
        first_vertex: u32,
        first_instance: u32,
    ) {
        self.commands.push(Recorded::Draw {
            vertex_count,
            instance_count,
            first_vertex,
            first_instance,
        });
    }

    fn image_barrier(&mut self, image: vk::Image, transition: &LayoutTransition) {
        self.commands.push(Recorded::ImageBarrier {
            image,
            old: transition.old,
            new: transition.new,
        });
    }

    fn copy_buffer(&mut self, src: vk::Buffer, dst: vk::Buffer, size: vk::DeviceSize) {
        self.commands.push(Recorded::CopyBuffer { src, dst, size });
    }

    fn copy_buffer_to_image(&mut self, src: vk::Buffer, image: vk::Image, extent: vk::Extent2D) {
        self.commands.push(Recorded::CopyBufferToImage {
            src,
            image,
            width: extent.width,
            height: extent.height,
        });
    }
}

/// An object whose handles are all fake, with the given geometry
pub fn fake_object(model: Model) -> ObjectResourceSet {
    ObjectResourceSet::from_parts(
        model,
        GpuBuffer::from_raw_parts(fake(10), fake(11), 132, vk::BufferUsageFlags::VERTEX_BUFFER),
        GpuBuffer::from_raw_parts(fake(20), fake(21), 192, vk::BufferUsageFlags::UNIFORM_BUFFER),
        GpuImage {
            image: fake(30),
            memory: fake(31),
            view: fake(32),
            width: 2,
            height: 2,
            format: vk::Format::R8G8B8A8_UNORM,
        },
        ObjectDescriptors {
            pool: fake(40),
            set: fake(41),
        },
    )
}

/// Runs `test` against a headless device, or skips it when the machine has
/// no Vulkan driver
pub fn with_factory(test: impl FnOnce(&ash::Device, &ResourceFactory)) {
    let instance = match RenderInstance::new(None) {
        Ok(instance) => instance,
        Err(err) => {
            eprintln!("Skipping GPU test, no Vulkan instance: {err}");
            return;
        }
    };
    let device = match RenderDevice::new(&instance, None) {
        Ok(device) => device,
        Err(err) => {
            eprintln!("Skipping GPU test, no Vulkan device: {err}");
            return;
        }
    };

    let memory = MemoryAllocator::new(device.memory_properties);
    let transfer = TransferEngine::new(&device.logical, device.queue, device.command_pool);
    let factory = ResourceFactory::new(&device.logical, &memory, transfer);
    test(&device.logical, &factory);
}
