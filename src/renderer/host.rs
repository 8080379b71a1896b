use std::sync::Arc;
use ash::vk;
use crate::renderer::error::RenderError;

/// The window side of the renderer: owns the device and the swapchain and
/// hands out the per-frame targets the renderer records into.
///
/// The current framebuffer and command buffer are only meaningful between
/// the host starting a frame and the renderer calling [`HostWindow::frame_ready`].
pub trait HostWindow {
    fn device(&self) -> &Arc<ash::Device>;
    fn physical_device_memory_properties(&self) -> vk::PhysicalDeviceMemoryProperties;
    fn default_render_pass(&self) -> vk::RenderPass;
    fn current_framebuffer(&self) -> vk::Framebuffer;
    fn current_command_buffer(&self) -> vk::CommandBuffer;
    fn swap_chain_image_size(&self) -> vk::Extent2D;
    fn graphics_queue(&self) -> vk::Queue;
    fn graphics_command_pool(&self) -> vk::CommandPool;

    /// Submits the recorded command buffer and presents the frame
    fn frame_ready(&mut self) -> Result<(), RenderError>;

    /// Asks for another frame to be scheduled
    fn request_update(&self);
}
