use ash::vk;
use ash::vk::Handle;

/// A single Vulkan object owned by one of the renderer's resource sets
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DeviceHandle {
    Buffer(vk::Buffer),
    Memory(vk::DeviceMemory),
    Image(vk::Image),
    ImageView(vk::ImageView),
    Sampler(vk::Sampler),
    DescriptorPool(vk::DescriptorPool),
    DescriptorSetLayout(vk::DescriptorSetLayout),
    Pipeline(vk::Pipeline),
    PipelineLayout(vk::PipelineLayout),
}

impl DeviceHandle {
    pub fn is_null(&self) -> bool {
        let raw = match *self {
            Self::Buffer(h) => h.as_raw(),
            Self::Memory(h) => h.as_raw(),
            Self::Image(h) => h.as_raw(),
            Self::ImageView(h) => h.as_raw(),
            Self::Sampler(h) => h.as_raw(),
            Self::DescriptorPool(h) => h.as_raw(),
            Self::DescriptorSetLayout(h) => h.as_raw(),
            Self::Pipeline(h) => h.as_raw(),
            Self::PipelineLayout(h) => h.as_raw(),
        };
        raw == 0
    }
}

/// Destroys device objects on behalf of the resource sets.
///
/// Release code calls `destroy` in the order the objects must go away, which
/// lets tests substitute a recorder for the real device.
pub trait HandleDestroyer {
    fn destroy(&self, handle: DeviceHandle);
}

impl HandleDestroyer for ash::Device {
    fn destroy(&self, handle: DeviceHandle) {
        if handle.is_null() {
            return;
        }
        unsafe {
            match handle {
                DeviceHandle::Buffer(h) => self.destroy_buffer(h, None),
                DeviceHandle::Memory(h) => self.free_memory(h, None),
                DeviceHandle::Image(h) => self.destroy_image(h, None),
                DeviceHandle::ImageView(h) => self.destroy_image_view(h, None),
                DeviceHandle::Sampler(h) => self.destroy_sampler(h, None),
                DeviceHandle::DescriptorPool(h) => self.destroy_descriptor_pool(h, None),
                DeviceHandle::DescriptorSetLayout(h) => self.destroy_descriptor_set_layout(h, None),
                DeviceHandle::Pipeline(h) => self.destroy_pipeline(h, None),
                DeviceHandle::PipelineLayout(h) => self.destroy_pipeline_layout(h, None),
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn null_handles_are_detected() {
        assert!(DeviceHandle::Buffer(vk::Buffer::null()).is_null());
        assert!(!DeviceHandle::Buffer(vk::Buffer::from_raw(7)).is_null());
        assert!(DeviceHandle::Pipeline(vk::Pipeline::null()).is_null());
    }
}
