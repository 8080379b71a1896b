use std::ptr::NonNull;
use ash::vk;
use crate::renderer::error::RenderError;
use crate::renderer::internals::handles::{DeviceHandle, HandleDestroyer};

/// A buffer together with the dedicated memory bound to it
#[derive(Debug)]
pub struct GpuBuffer {
    pub handle: vk::Buffer,
    pub memory: vk::DeviceMemory,
    pub size: vk::DeviceSize,
    pub usage: vk::BufferUsageFlags,
}

impl GpuBuffer {
    pub fn from_raw_parts(
        handle: vk::Buffer,
        memory: vk::DeviceMemory,
        size: vk::DeviceSize,
        usage: vk::BufferUsageFlags,
    ) -> Self {
        Self {
            handle,
            memory,
            size,
            usage,
        }
    }

    /// Copies `data` to the start of the buffer. The memory must be host visible
    /// and coherent.
    pub fn write<T: Copy>(
        &self,
        device: &ash::Device,
        data: &[T],
    ) -> Result<(), RenderError> {
        let mapped = unsafe {
            device.map_memory(self.memory, 0, self.size, vk::MemoryMapFlags::empty())?
        };
        let Some(mapped) = NonNull::new(mapped.cast::<u8>()) else {
            unsafe { device.unmap_memory(self.memory) };
            return Err(RenderError::Vulkan(vk::Result::ERROR_MEMORY_MAP_FAILED));
        };

        let result = unsafe {
            let mut raw_allocation =
                presser::RawAllocation::from_raw_parts(mapped, self.size as usize);
            let mut slab = raw_allocation.borrow_as_slab();
            presser::copy_from_slice_to_offset(data, &mut slab, 0)
        };

        unsafe { device.unmap_memory(self.memory) };

        result.map(|_| ()).map_err(RenderError::StagingCopy)
    }

    pub fn is_released(&self) -> bool {
        self.handle == vk::Buffer::null() && self.memory == vk::DeviceMemory::null()
    }

    /// Destroys the buffer, then frees its memory. Safe to call twice.
    pub fn release(&mut self, destroyer: &impl HandleDestroyer) {
        destroyer.destroy(DeviceHandle::Buffer(self.handle));
        destroyer.destroy(DeviceHandle::Memory(self.memory));
        self.handle = vk::Buffer::null();
        self.memory = vk::DeviceMemory::null();
    }
}

impl Drop for GpuBuffer {
    fn drop(&mut self) {
        if !self.is_released() {
            log::warn!("Dropping GpuBuffer of {} bytes without releasing it", self.size);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::renderer::testing::{fake, DestroyLog};

    #[test]
    fn buffer_is_destroyed_before_its_memory() {
        let log = DestroyLog::default();
        let mut buffer = GpuBuffer::from_raw_parts(
            fake(10),
            fake(11),
            64,
            vk::BufferUsageFlags::VERTEX_BUFFER,
        );

        buffer.release(&log);
        buffer.release(&log);

        assert!(buffer.is_released());
        assert_eq!(
            log.destroyed(),
            vec![
                DeviceHandle::Buffer(fake(10)),
                DeviceHandle::Memory(fake(11)),
            ]
        );
    }
}
