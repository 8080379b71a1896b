use ash::vk;
use crate::renderer::error::RenderError;

/// Returns the first memory type allowed by `type_filter` whose property
/// flags contain `properties`.
pub fn find_memory_type_index(
    memory_properties: &vk::PhysicalDeviceMemoryProperties,
    type_filter: u32,
    properties: vk::MemoryPropertyFlags,
) -> Option<u32> {
    memory_properties
        .memory_types
        .iter()
        .take(memory_properties.memory_type_count as usize)
        .enumerate()
        .find(|(i, memory_type)| {
            type_filter & (1 << i) != 0
                && memory_type.property_flags.contains(properties)
        })
        .map(|(i, _)| i as u32)
}

/// Picks memory types and allocates dedicated device memory for buffers and images
pub struct MemoryAllocator {
    memory_properties: vk::PhysicalDeviceMemoryProperties,
}

impl MemoryAllocator {
    pub fn new(memory_properties: vk::PhysicalDeviceMemoryProperties) -> Self {
        Self { memory_properties }
    }

    pub fn find_memory_type(
        &self,
        type_filter: u32,
        properties: vk::MemoryPropertyFlags,
    ) -> Result<u32, RenderError> {
        find_memory_type_index(&self.memory_properties, type_filter, properties)
            .ok_or(RenderError::NoSuitableMemoryType {
                type_filter,
                properties,
            })
    }

    pub fn allocate(
        &self,
        device: &ash::Device,
        requirements: vk::MemoryRequirements,
        properties: vk::MemoryPropertyFlags,
    ) -> Result<vk::DeviceMemory, RenderError> {
        let memory_type_index =
            self.find_memory_type(requirements.memory_type_bits, properties)?;
        let allocate_info = vk::MemoryAllocateInfo::default()
            .allocation_size(requirements.size)
            .memory_type_index(memory_type_index);
        Ok(unsafe { device.allocate_memory(&allocate_info, None)? })
    }

    /// Allocates memory for `buffer` and binds it at offset 0
    pub fn allocate_for_buffer(
        &self,
        device: &ash::Device,
        buffer: vk::Buffer,
        properties: vk::MemoryPropertyFlags,
    ) -> Result<vk::DeviceMemory, RenderError> {
        let requirements = unsafe { device.get_buffer_memory_requirements(buffer) };
        let memory = self.allocate(device, requirements, properties)?;
        if let Err(err) = unsafe { device.bind_buffer_memory(buffer, memory, 0) } {
            unsafe { device.free_memory(memory, None) };
            return Err(err.into());
        }
        Ok(memory)
    }

    /// Allocates memory for `image` and binds it at offset 0
    pub fn allocate_for_image(
        &self,
        device: &ash::Device,
        image: vk::Image,
        properties: vk::MemoryPropertyFlags,
    ) -> Result<vk::DeviceMemory, RenderError> {
        let requirements = unsafe { device.get_image_memory_requirements(image) };
        let memory = self.allocate(device, requirements, properties)?;
        if let Err(err) = unsafe { device.bind_image_memory(image, memory, 0) } {
            unsafe { device.free_memory(memory, None) };
            return Err(err.into());
        }
        Ok(memory)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn memory_properties(types: &[vk::MemoryPropertyFlags]) -> vk::PhysicalDeviceMemoryProperties {
        let mut props = vk::PhysicalDeviceMemoryProperties::default();
        props.memory_type_count = types.len() as u32;
        for (i, flags) in types.iter().enumerate() {
            props.memory_types[i] = vk::MemoryType {
                property_flags: *flags,
                heap_index: 0,
            };
        }
        props
    }

    const HOST: vk::MemoryPropertyFlags = vk::MemoryPropertyFlags::from_raw(
        vk::MemoryPropertyFlags::HOST_VISIBLE.as_raw()
            | vk::MemoryPropertyFlags::HOST_COHERENT.as_raw(),
    );

    #[test]
    fn first_matching_type_wins() {
        let props = memory_properties(&[
            vk::MemoryPropertyFlags::DEVICE_LOCAL,
            HOST,
            HOST | vk::MemoryPropertyFlags::HOST_CACHED,
        ]);

        assert_eq!(find_memory_type_index(&props, 0b111, HOST), Some(1));
        assert_eq!(find_memory_type_index(&props, 0b100, HOST), Some(2));
        assert_eq!(
            find_memory_type_index(&props, 0b111, vk::MemoryPropertyFlags::DEVICE_LOCAL),
            Some(0)
        );
    }

    #[test]
    fn lowest_index_over_every_filter() {
        let types = [
            vk::MemoryPropertyFlags::DEVICE_LOCAL,
            HOST,
            vk::MemoryPropertyFlags::DEVICE_LOCAL | HOST,
            HOST,
        ];
        let props = memory_properties(&types);
        let wanted = [vk::MemoryPropertyFlags::DEVICE_LOCAL, HOST, vk::MemoryPropertyFlags::empty()];

        for filter in 0u32..16 {
            for properties in wanted {
                let expected = (0..types.len())
                    .find(|&i| filter & (1 << i) != 0 && types[i].contains(properties))
                    .map(|i| i as u32);
                assert_eq!(
                    find_memory_type_index(&props, filter, properties),
                    expected,
                    "filter {filter:#06b}, properties {properties:?}"
                );
            }
        }
    }

    #[test]
    fn types_past_the_count_are_ignored() {
        let mut props = memory_properties(&[vk::MemoryPropertyFlags::DEVICE_LOCAL]);
        props.memory_types[1].property_flags = HOST;

        assert_eq!(find_memory_type_index(&props, 0b11, HOST), None);
    }

    #[test]
    fn no_match_is_an_error() {
        let allocator = MemoryAllocator::new(memory_properties(&[
            vk::MemoryPropertyFlags::DEVICE_LOCAL,
        ]));

        let err = allocator.find_memory_type(0b1, HOST).unwrap_err();
        assert!(matches!(
            err,
            RenderError::NoSuitableMemoryType { type_filter: 0b1, .. }
        ));
    }
}
