use ash::vk;
use crate::renderer::error::RenderError;
use crate::renderer::internals::commands::{CommandRecorder, VkCommandRecorder};

/// Layouts, access masks and pipeline stages of one image memory barrier
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct LayoutTransition {
    pub old: vk::ImageLayout,
    pub new: vk::ImageLayout,
    pub src_access: vk::AccessFlags,
    pub dst_access: vk::AccessFlags,
    pub src_stage: vk::PipelineStageFlags,
    pub dst_stage: vk::PipelineStageFlags,
}

impl LayoutTransition {
    /// Only the two transitions a texture upload goes through are supported
    pub fn between(
        old: vk::ImageLayout,
        new: vk::ImageLayout,
    ) -> Result<Self, RenderError> {
        match (old, new) {
            (vk::ImageLayout::UNDEFINED, vk::ImageLayout::TRANSFER_DST_OPTIMAL) => Ok(Self {
                old,
                new,
                src_access: vk::AccessFlags::empty(),
                dst_access: vk::AccessFlags::TRANSFER_WRITE,
                src_stage: vk::PipelineStageFlags::TOP_OF_PIPE,
                dst_stage: vk::PipelineStageFlags::TRANSFER,
            }),
            (
                vk::ImageLayout::TRANSFER_DST_OPTIMAL,
                vk::ImageLayout::SHADER_READ_ONLY_OPTIMAL,
            ) => Ok(Self {
                old,
                new,
                src_access: vk::AccessFlags::TRANSFER_WRITE,
                dst_access: vk::AccessFlags::SHADER_READ,
                src_stage: vk::PipelineStageFlags::TRANSFER,
                dst_stage: vk::PipelineStageFlags::FRAGMENT_SHADER,
            }),
            _ => Err(RenderError::UnsupportedLayoutTransition { old, new }),
        }
    }
}

/// Records the full texture upload: make the image writable, copy the
/// staging pixels in, then hand the image over to the fragment shader.
pub fn record_texture_upload(
    recorder: &mut dyn CommandRecorder,
    staging: vk::Buffer,
    image: vk::Image,
    extent: vk::Extent2D,
) -> Result<(), RenderError> {
    let to_transfer_dst = LayoutTransition::between(
        vk::ImageLayout::UNDEFINED,
        vk::ImageLayout::TRANSFER_DST_OPTIMAL,
    )?;
    let to_shader_read = LayoutTransition::between(
        vk::ImageLayout::TRANSFER_DST_OPTIMAL,
        vk::ImageLayout::SHADER_READ_ONLY_OPTIMAL,
    )?;

    recorder.image_barrier(image, &to_transfer_dst);
    recorder.copy_buffer_to_image(staging, image, extent);
    recorder.image_barrier(image, &to_shader_read);

    Ok(())
}

/// Executes short command sequences on the graphics queue and blocks until
/// the queue is idle again
pub struct TransferEngine<'a> {
    device: &'a ash::Device,
    queue: vk::Queue,
    command_pool: vk::CommandPool,
}

impl<'a> TransferEngine<'a> {
    pub fn new(
        device: &'a ash::Device,
        queue: vk::Queue,
        command_pool: vk::CommandPool,
    ) -> Self {
        Self {
            device,
            queue,
            command_pool,
        }
    }

    pub fn begin_one_shot(&self) -> Result<vk::CommandBuffer, RenderError> {
        let allocate_info = vk::CommandBufferAllocateInfo::default()
            .command_pool(self.command_pool)
            .command_buffer_count(1)
            .level(vk::CommandBufferLevel::PRIMARY);
        let cmd = unsafe { self.device.allocate_command_buffers(&allocate_info)? }
            .into_iter()
            .next()
            .ok_or(RenderError::Vulkan(vk::Result::ERROR_OUT_OF_DEVICE_MEMORY))?;

        // This command buffer will be used exactly once before being freed
        let begin_info = vk::CommandBufferBeginInfo::default()
            .flags(vk::CommandBufferUsageFlags::ONE_TIME_SUBMIT);
        if let Err(err) = unsafe { self.device.begin_command_buffer(cmd, &begin_info) } {
            self.free(cmd);
            return Err(err.into());
        }

        Ok(cmd)
    }

    /// Ends, submits and waits for `cmd`, then frees it. When only the wait
    /// fails the buffer may still be pending, so it is left to the pool.
    pub fn end_one_shot(&self, cmd: vk::CommandBuffer) -> Result<(), RenderError> {
        if let Err(err) = self.submit(cmd) {
            self.free(cmd);
            return Err(err);
        }
        unsafe { self.device.queue_wait_idle(self.queue)? };
        self.free(cmd);
        Ok(())
    }

    pub fn immediate_submit<F>(&self, func: F) -> Result<(), RenderError>
    where
        F: FnOnce(&mut dyn CommandRecorder) -> Result<(), RenderError>,
    {
        let cmd = self.begin_one_shot()?;

        let mut recorder = VkCommandRecorder::new(self.device, cmd);
        if let Err(err) = func(&mut recorder) {
            self.free(cmd);
            return Err(err);
        }

        self.end_one_shot(cmd)
    }

    pub fn copy_buffer(
        &self,
        src: vk::Buffer,
        dst: vk::Buffer,
        size: vk::DeviceSize,
    ) -> Result<(), RenderError> {
        self.immediate_submit(|recorder| {
            recorder.copy_buffer(src, dst, size);
            Ok(())
        })
    }

    pub fn copy_buffer_to_image(
        &self,
        src: vk::Buffer,
        image: vk::Image,
        extent: vk::Extent2D,
    ) -> Result<(), RenderError> {
        self.immediate_submit(|recorder| {
            recorder.copy_buffer_to_image(src, image, extent);
            Ok(())
        })
    }

    pub fn transition_image_layout(
        &self,
        image: vk::Image,
        old: vk::ImageLayout,
        new: vk::ImageLayout,
    ) -> Result<(), RenderError> {
        // Validate before a command buffer is allocated
        let transition = LayoutTransition::between(old, new)?;
        self.immediate_submit(|recorder| {
            recorder.image_barrier(image, &transition);
            Ok(())
        })
    }

    fn submit(&self, cmd: vk::CommandBuffer) -> Result<(), RenderError> {
        let command_buffers = [cmd];
        let submit = vk::SubmitInfo::default().command_buffers(&command_buffers);
        unsafe {
            self.device.end_command_buffer(cmd)?;
            self.device.queue_submit(self.queue, &[submit], vk::Fence::null())?;
        }
        Ok(())
    }

    fn free(&self, cmd: vk::CommandBuffer) {
        unsafe {
            self.device.free_command_buffers(self.command_pool, &[cmd]);
        }
    }
}
