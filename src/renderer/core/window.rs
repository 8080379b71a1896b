use std::sync::Arc;
use ash::vk;
use color_eyre::Result;
use winit::window::Window;
use crate::renderer::config::RenderConfig;
use crate::renderer::core::device::RenderDevice;
use crate::renderer::core::frame::FrameSync;
use crate::renderer::core::instance::RenderInstance;
use crate::renderer::core::target::RenderTarget;
use crate::renderer::error::RenderError;
use crate::renderer::host::HostWindow;

/// A winit window with everything needed to present into it: the Vulkan
/// instance, the device, the swapchain and the frames in flight
pub struct VulkanWindow {
    frames: Vec<FrameSync>,
    target: RenderTarget,
    device: RenderDevice,
    instance: RenderInstance,
    window: Arc<Window>,

    current_frame: usize,
    image_index: u32,
    needs_recreate: bool,
}

impl VulkanWindow {
    pub fn new(window: Arc<Window>, config: &RenderConfig) -> Result<Self> {
        let instance = RenderInstance::new(Some(window.as_ref()))?;
        let surface = instance.create_surface(&window)?;
        let destroy_surface = |instance: &RenderInstance| unsafe {
            instance.surface_loader.destroy_surface(surface, None);
        };

        let device = match RenderDevice::new(&instance, Some(surface)) {
            Ok(device) => device,
            Err(err) => {
                destroy_surface(&instance);
                return Err(err);
            }
        };

        let mut target = match RenderTarget::new(
            &instance,
            &device,
            surface,
            window_extent(&window),
            config.vsync,
        ) {
            Ok(target) => target,
            Err(err) => {
                drop(device);
                destroy_surface(&instance);
                return Err(err);
            }
        };

        let frames = match FrameSync::many(&device.logical, device.command_pool, config.frames_in_flight.max(1)) {
            Ok(frames) => frames,
            Err(err) => {
                target.destroy(&device.logical);
                drop(device);
                destroy_surface(&instance);
                return Err(err);
            }
        };

        Ok(Self {
            frames,
            target,
            device,
            instance,
            window,
            current_frame: 0,
            image_index: 0,
            needs_recreate: false,
        })
    }

    pub fn window(&self) -> &Window {
        &self.window
    }

    /// Marks the swapchain for recreation before the next frame
    pub fn resize(&mut self) {
        self.needs_recreate = true;
    }

    /// Waits for the current frame slot, acquires a swapchain image and
    /// starts recording. Returns `false` when there is nothing to render to
    /// yet, e.g. while minimized or right after the swapchain went stale.
    pub fn begin_frame(&mut self) -> Result<bool> {
        let extent = window_extent(&self.window);
        if extent.width == 0 || extent.height == 0 {
            return Ok(false);
        }
        if self.needs_recreate {
            self.target.recreate(&self.instance, &self.device, extent)?;
            self.needs_recreate = false;
        }

        let device = &self.device.logical;
        let frame = &self.frames[self.current_frame];
        unsafe { device.wait_for_fences(&[frame.in_flight], true, u64::MAX)? };

        let acquired = unsafe {
            self.target.swapchain_loader.acquire_next_image(
                self.target.swapchain,
                u64::MAX,
                frame.image_available,
                vk::Fence::null(),
            )
        };
        match acquired {
            Ok((image_index, suboptimal)) => {
                self.image_index = image_index;
                self.needs_recreate |= suboptimal;
            }
            Err(vk::Result::ERROR_OUT_OF_DATE_KHR) => {
                self.needs_recreate = true;
                return Ok(false);
            }
            Err(err) => return Err(err.into()),
        }

        // The fence is reset on submit
        unsafe {
            device.reset_command_buffer(frame.command_buffer, vk::CommandBufferResetFlags::empty())?;
            device.begin_command_buffer(
                frame.command_buffer,
                &vk::CommandBufferBeginInfo::default()
                    .flags(vk::CommandBufferUsageFlags::ONE_TIME_SUBMIT),
            )?;
        }

        Ok(true)
    }
}

impl HostWindow for VulkanWindow {
    fn device(&self) -> &Arc<ash::Device> {
        &self.device.logical
    }

    fn physical_device_memory_properties(&self) -> vk::PhysicalDeviceMemoryProperties {
        self.device.memory_properties
    }

    fn default_render_pass(&self) -> vk::RenderPass {
        self.target.render_pass
    }

    fn current_framebuffer(&self) -> vk::Framebuffer {
        self.target
            .framebuffers
            .get(self.image_index as usize)
            .copied()
            .unwrap_or_default()
    }

    fn current_command_buffer(&self) -> vk::CommandBuffer {
        self.frames
            .get(self.current_frame)
            .map(|frame| frame.command_buffer)
            .unwrap_or_default()
    }

    fn swap_chain_image_size(&self) -> vk::Extent2D {
        self.target.extent
    }

    fn graphics_queue(&self) -> vk::Queue {
        self.device.queue
    }

    fn graphics_command_pool(&self) -> vk::CommandPool {
        self.device.command_pool
    }

    fn frame_ready(&mut self) -> Result<(), RenderError> {
        let device = &self.device.logical;
        let frame = &self.frames[self.current_frame];

        let signal_semaphores = [frame.render_finished];
        frame.submit(device, self.device.queue, &[frame.image_available], &signal_semaphores)?;

        let swapchains = [self.target.swapchain];
        let image_indices = [self.image_index];
        let present_info = vk::PresentInfoKHR::default()
            .wait_semaphores(&signal_semaphores)
            .swapchains(&swapchains)
            .image_indices(&image_indices);
        let presented = unsafe {
            self.target.swapchain_loader.queue_present(self.device.queue, &present_info)
        };

        self.current_frame = (self.current_frame + 1) % self.frames.len();

        match presented {
            Ok(suboptimal) => {
                self.needs_recreate |= suboptimal;
                Ok(())
            }
            Err(vk::Result::ERROR_OUT_OF_DATE_KHR) => {
                self.needs_recreate = true;
                Ok(())
            }
            Err(err) => Err(err.into()),
        }
    }

    fn request_update(&self) {
        self.window.request_redraw();
    }
}

impl Drop for VulkanWindow {
    fn drop(&mut self) {
        let device = &self.device.logical;
        unsafe {
            if let Err(err) = device.device_wait_idle() {
                log::warn!("Failed to wait for device idle: {err}");
            }
        }
        for frame in &mut self.frames {
            frame.destroy(device, self.device.command_pool);
        }
        self.target.destroy(device);
        unsafe {
            self.instance.surface_loader.destroy_surface(self.target.surface, None);
        }
    }
}

fn window_extent(window: &Window) -> vk::Extent2D {
    let size = window.inner_size();
    vk::Extent2D {
        width: size.width,
        height: size.height,
    }
}
