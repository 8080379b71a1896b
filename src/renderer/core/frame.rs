use ash::vk;
use color_eyre::Result;

/// Per-frame synchronization and the command buffer the frame records into
pub struct FrameSync {
    pub command_buffer: vk::CommandBuffer,

    // Signals when the swapchain image is ready to be rendered to.
    pub image_available: vk::Semaphore,

    // Signals when rendering commands have finished and the image can be presented.
    pub render_finished: vk::Semaphore,

    // Signals when the frame's commands have finished execution.
    pub in_flight: vk::Fence,
}

impl FrameSync {
    pub fn new(device: &ash::Device, command_pool: vk::CommandPool) -> Result<Self> {
        let mut frame = Self {
            command_buffer: vk::CommandBuffer::null(),
            image_available: vk::Semaphore::null(),
            render_finished: vk::Semaphore::null(),
            in_flight: vk::Fence::null(),
        };
        if let Err(err) = frame.create_objects(device, command_pool) {
            frame.destroy(device, command_pool);
            return Err(err);
        }
        Ok(frame)
    }

    /// Creates `count` frames
    pub fn many(device: &ash::Device, command_pool: vk::CommandPool, count: usize) -> Result<Vec<Self>> {
        let mut frames = Vec::with_capacity(count);
        for _ in 0..count {
            match Self::new(device, command_pool) {
                Ok(frame) => frames.push(frame),
                Err(err) => {
                    for mut frame in frames {
                        frame.destroy(device, command_pool);
                    }
                    return Err(err);
                }
            }
        }
        Ok(frames)
    }

    fn create_objects(&mut self, device: &ash::Device, command_pool: vk::CommandPool) -> Result<()> {
        let alloc_info = vk::CommandBufferAllocateInfo::default()
            .command_pool(command_pool)
            .level(vk::CommandBufferLevel::PRIMARY)
            .command_buffer_count(1);
        unsafe {
            self.command_buffer = device.allocate_command_buffers(&alloc_info)?[0];
            self.image_available = device.create_semaphore(&vk::SemaphoreCreateInfo::default(), None)?;
            self.render_finished = device.create_semaphore(&vk::SemaphoreCreateInfo::default(), None)?;
            self.in_flight = device.create_fence(
                &vk::FenceCreateInfo::default().flags(vk::FenceCreateFlags::SIGNALED),
                None,
            )?;
        }
        Ok(())
    }

    /// Ends the recording and submits it. The fence is reset only right
    /// before the submit that signals it again, so a failed recording never
    /// leaves it unsignaled.
    pub fn submit(
        &self,
        device: &ash::Device,
        queue: vk::Queue,
        wait: &[vk::Semaphore],
        signal: &[vk::Semaphore],
    ) -> Result<(), vk::Result> {
        let wait_stages = vec![vk::PipelineStageFlags::COLOR_ATTACHMENT_OUTPUT; wait.len()];
        let command_buffers = [self.command_buffer];
        let submit_info = vk::SubmitInfo::default()
            .wait_semaphores(wait)
            .wait_dst_stage_mask(&wait_stages)
            .command_buffers(&command_buffers)
            .signal_semaphores(signal);
        unsafe {
            device.end_command_buffer(self.command_buffer)?;
            device.reset_fences(&[self.in_flight])?;
            device.queue_submit(queue, &[submit_info], self.in_flight)
        }
    }

    pub fn destroy(&mut self, device: &ash::Device, command_pool: vk::CommandPool) {
        unsafe {
            if self.command_buffer != vk::CommandBuffer::null() {
                device.free_command_buffers(command_pool, &[self.command_buffer]);
            }
            device.destroy_semaphore(self.image_available, None);
            device.destroy_semaphore(self.render_finished, None);
            device.destroy_fence(self.in_flight, None);
        }
        self.command_buffer = vk::CommandBuffer::null();
        self.image_available = vk::Semaphore::null();
        self.render_finished = vk::Semaphore::null();
        self.in_flight = vk::Fence::null();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::renderer::core::device::RenderDevice;
    use crate::renderer::core::instance::RenderInstance;

    const ONE_SECOND: u64 = 1_000_000_000;

    fn begin(device: &ash::Device, frame: &FrameSync) {
        unsafe {
            device
                .begin_command_buffer(frame.command_buffer, &vk::CommandBufferBeginInfo::default())
                .unwrap();
        }
    }

    #[test]
    fn fence_stays_signaled_until_submit() {
        let Ok(instance) = RenderInstance::new(None) else {
            eprintln!("Skipping GPU test, no Vulkan instance");
            return;
        };
        let Ok(device) = RenderDevice::new(&instance, None) else {
            eprintln!("Skipping GPU test, no Vulkan device");
            return;
        };
        let logical = &device.logical;
        let mut frames = FrameSync::many(logical, device.command_pool, 2).unwrap();
        assert_eq!(frames.len(), 2);

        for frame in &frames {
            unsafe {
                logical.wait_for_fences(&[frame.in_flight], true, ONE_SECOND).unwrap();
            }
            begin(logical, frame);
            // Recording alone must not touch the fence
            assert!(unsafe { logical.get_fence_status(frame.in_flight) }.unwrap());

            frame.submit(logical, device.queue, &[], &[]).unwrap();
            unsafe {
                logical.wait_for_fences(&[frame.in_flight], true, ONE_SECOND).unwrap();
            }
        }

        for frame in &mut frames {
            frame.destroy(logical, device.command_pool);
            assert_eq!(frame.in_flight, vk::Fence::null());
        }
    }
}
