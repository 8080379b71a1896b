use ash::vk;
use smallvec::SmallVec;
use crate::renderer::error::RenderError;
use crate::renderer::internals::handles::{DeviceHandle, HandleDestroyer};

pub const TEXTURE_BINDING: u32 = 0;
pub const UNIFORM_BINDING: u32 = 1;

pub struct DescriptorSetLayoutBuilder {
    bindings: SmallVec<[vk::DescriptorSetLayoutBinding<'static>; 2]>,
}

impl DescriptorSetLayoutBuilder {
    pub fn new() -> Self {
        Self {
            bindings: SmallVec::new(),
        }
    }

    pub fn add_binding(
        mut self,
        binding: u32,
        descriptor_type: vk::DescriptorType,
        stages: vk::ShaderStageFlags,
    ) -> Self {
        self.bindings.push(
            vk::DescriptorSetLayoutBinding::default()
                .binding(binding)
                .descriptor_type(descriptor_type)
                .descriptor_count(1)
                .stage_flags(stages),
        );
        self
    }

    /// One pool size per descriptor type, enough for a single set
    pub fn pool_sizes(&self) -> Vec<vk::DescriptorPoolSize> {
        let mut sizes: Vec<vk::DescriptorPoolSize> = Vec::new();
        for binding in &self.bindings {
            match sizes.iter_mut().find(|s| s.ty == binding.descriptor_type) {
                Some(size) => size.descriptor_count += binding.descriptor_count,
                None => sizes.push(vk::DescriptorPoolSize {
                    ty: binding.descriptor_type,
                    descriptor_count: binding.descriptor_count,
                }),
            }
        }
        sizes
    }

    pub fn build(&self, device: &ash::Device) -> Result<vk::DescriptorSetLayout, RenderError> {
        let layout_info = vk::DescriptorSetLayoutCreateInfo::default().bindings(&self.bindings);
        Ok(unsafe { device.create_descriptor_set_layout(&layout_info, None)? })
    }
}

/// The object descriptor set layout: a sampled texture for the fragment
/// stage and the transform uniforms for the vertex stage
pub fn object_layout() -> DescriptorSetLayoutBuilder {
    DescriptorSetLayoutBuilder::new()
        .add_binding(
            TEXTURE_BINDING,
            vk::DescriptorType::COMBINED_IMAGE_SAMPLER,
            vk::ShaderStageFlags::FRAGMENT,
        )
        .add_binding(
            UNIFORM_BINDING,
            vk::DescriptorType::UNIFORM_BUFFER,
            vk::ShaderStageFlags::VERTEX,
        )
}

/// Owns the descriptor set layout shared by the pipeline and every object
pub struct DescriptorManager {
    pub layout: vk::DescriptorSetLayout,
    pool_sizes: Vec<vk::DescriptorPoolSize>,
}

impl DescriptorManager {
    pub fn new(device: &ash::Device) -> Result<Self, RenderError> {
        let builder = object_layout();
        Ok(Self {
            layout: builder.build(device)?,
            pool_sizes: builder.pool_sizes(),
        })
    }

    #[cfg(test)]
    pub fn from_layout(layout: vk::DescriptorSetLayout) -> Self {
        Self {
            layout,
            pool_sizes: object_layout().pool_sizes(),
        }
    }

    /// Creates a pool sized for exactly one object set and allocates the set
    pub fn allocate_object_set(
        &self,
        device: &ash::Device,
    ) -> Result<ObjectDescriptors, RenderError> {
        let pool_info = vk::DescriptorPoolCreateInfo::default()
            .pool_sizes(&self.pool_sizes)
            .max_sets(1);
        let pool = unsafe { device.create_descriptor_pool(&pool_info, None)? };

        let layouts = [self.layout];
        let allocate_info = vk::DescriptorSetAllocateInfo::default()
            .descriptor_pool(pool)
            .set_layouts(&layouts);
        let set = match unsafe { device.allocate_descriptor_sets(&allocate_info) } {
            Ok(sets) => sets.into_iter().next(),
            Err(err) => {
                HandleDestroyer::destroy(device, DeviceHandle::DescriptorPool(pool));
                return Err(err.into());
            }
        };
        let Some(set) = set else {
            HandleDestroyer::destroy(device, DeviceHandle::DescriptorPool(pool));
            return Err(RenderError::Vulkan(vk::Result::ERROR_OUT_OF_POOL_MEMORY));
        };

        Ok(ObjectDescriptors { pool, set })
    }

    /// Points the object set at its texture and uniform buffer
    pub fn write_object_set(
        &self,
        device: &ash::Device,
        set: vk::DescriptorSet,
        texture_view: vk::ImageView,
        sampler: vk::Sampler,
        uniform_buffer: vk::Buffer,
        uniform_range: vk::DeviceSize,
    ) {
        let image_info = [vk::DescriptorImageInfo {
            sampler,
            image_view: texture_view,
            image_layout: vk::ImageLayout::SHADER_READ_ONLY_OPTIMAL,
        }];
        let buffer_info = [vk::DescriptorBufferInfo {
            buffer: uniform_buffer,
            offset: 0,
            range: uniform_range,
        }];
        let writes = [
            vk::WriteDescriptorSet::default()
                .dst_set(set)
                .dst_binding(TEXTURE_BINDING)
                .descriptor_type(vk::DescriptorType::COMBINED_IMAGE_SAMPLER)
                .image_info(&image_info),
            vk::WriteDescriptorSet::default()
                .dst_set(set)
                .dst_binding(UNIFORM_BINDING)
                .descriptor_type(vk::DescriptorType::UNIFORM_BUFFER)
                .buffer_info(&buffer_info),
        ];
        unsafe { device.update_descriptor_sets(&writes, &[]) };
    }

    pub fn release(&mut self, destroyer: &impl HandleDestroyer) {
        destroyer.destroy(DeviceHandle::DescriptorSetLayout(self.layout));
        self.layout = vk::DescriptorSetLayout::null();
    }
}

/// The pool and the single set allocated from it for one object. Destroying
/// the pool frees the set.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ObjectDescriptors {
    pub pool: vk::DescriptorPool,
    pub set: vk::DescriptorSet,
}

impl ObjectDescriptors {
    pub fn release(&mut self, destroyer: &impl HandleDestroyer) {
        destroyer.destroy(DeviceHandle::DescriptorPool(self.pool));
        self.pool = vk::DescriptorPool::null();
        self.set = vk::DescriptorSet::null();
    }
}
