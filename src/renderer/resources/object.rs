use ash::vk;
use image::RgbaImage;
use crate::renderer::error::RenderError;
use crate::renderer::internals::handles::HandleDestroyer;
use crate::renderer::resources::buffer::GpuBuffer;
use crate::renderer::resources::descriptor::{DescriptorManager, ObjectDescriptors};
use crate::renderer::resources::factory::ResourceFactory;
use crate::renderer::resources::image::GpuImage;
use crate::renderer::resources::model::Model;
use crate::renderer::shader_data::UniformBufferObject;

/// Everything the GPU needs to draw one object
pub struct ObjectResourceSet {
    pub model: Model,
    vertex_buffer: Option<GpuBuffer>,
    uniform_buffer: Option<GpuBuffer>,
    texture: Option<GpuImage>,
    descriptors: Option<ObjectDescriptors>,
}

impl ObjectResourceSet {
    /// Uploads the model's vertices, creates the uniform buffer and binds
    /// both with `texture` into a fresh descriptor set. The set takes
    /// ownership of `texture`, even on failure.
    pub fn create(
        device: &ash::Device,
        factory: &ResourceFactory,
        descriptors: &DescriptorManager,
        sampler: vk::Sampler,
        model: Model,
        texture: GpuImage,
    ) -> Result<Self, RenderError> {
        let mut object = Self {
            model,
            vertex_buffer: None,
            uniform_buffer: None,
            texture: Some(texture),
            descriptors: None,
        };

        if let Err(err) = object.create_buffers(factory) {
            object.release(device);
            return Err(err);
        }
        if let Err(err) = object.rebuild_descriptors(device, descriptors, sampler) {
            object.release(device);
            return Err(err);
        }

        log::info!("Created object with {} vertices", object.vertex_count());

        Ok(object)
    }

    #[cfg(test)]
    pub fn from_parts(
        model: Model,
        vertex_buffer: GpuBuffer,
        uniform_buffer: GpuBuffer,
        texture: GpuImage,
        descriptors: ObjectDescriptors,
    ) -> Self {
        Self {
            model,
            vertex_buffer: Some(vertex_buffer),
            uniform_buffer: Some(uniform_buffer),
            texture: Some(texture),
            descriptors: Some(descriptors),
        }
    }

    fn create_buffers(&mut self, factory: &ResourceFactory) -> Result<(), RenderError> {
        self.vertex_buffer = Some(factory.upload_via_staging(
            &self.model.vertices,
            vk::BufferUsageFlags::VERTEX_BUFFER,
            vk::MemoryPropertyFlags::DEVICE_LOCAL,
        )?);
        self.uniform_buffer = Some(factory.create_host_buffer(
            size_of::<UniformBufferObject>() as vk::DeviceSize,
            vk::BufferUsageFlags::UNIFORM_BUFFER,
        )?);
        Ok(())
    }

    /// Destroys the previous descriptor pool, then allocates and writes a
    /// new set for the current texture and uniform buffer
    fn rebuild_descriptors(
        &mut self,
        device: &ash::Device,
        manager: &DescriptorManager,
        sampler: vk::Sampler,
    ) -> Result<(), RenderError> {
        if let Some(mut previous) = self.descriptors.take() {
            previous.release(device);
        }

        let (Some(texture), Some(uniform_buffer)) = (&self.texture, &self.uniform_buffer) else {
            return Err(RenderError::NoActiveObject);
        };

        let descriptors = manager.allocate_object_set(device)?;
        manager.write_object_set(
            device,
            descriptors.set,
            texture.view,
            sampler,
            uniform_buffer.handle,
            uniform_buffer.size,
        );
        self.descriptors = Some(descriptors);

        Ok(())
    }

    /// Uploads `pixels` and rebinds the descriptor set to the new image. The
    /// caller must make sure the device no longer uses the old texture.
    pub fn replace_texture(
        &mut self,
        device: &ash::Device,
        factory: &ResourceFactory,
        manager: &DescriptorManager,
        sampler: vk::Sampler,
        pixels: &RgbaImage,
    ) -> Result<(), RenderError> {
        let new_texture = factory.upload_texture(pixels)?;
        self.swap_texture(device, new_texture, |object| {
            object.rebuild_descriptors(device, manager, sampler)
        })
    }

    /// Installs `texture` and runs `rebind`. The old texture is released only
    /// after `rebind` returned, whatever its outcome.
    fn swap_texture(
        &mut self,
        destroyer: &impl HandleDestroyer,
        texture: GpuImage,
        rebind: impl FnOnce(&mut Self) -> Result<(), RenderError>,
    ) -> Result<(), RenderError> {
        let old_texture = self.texture.replace(texture);
        let result = rebind(self);
        if let Some(mut old_texture) = old_texture {
            old_texture.release(destroyer);
        }
        result
    }

    pub fn update_uniforms(
        &self,
        device: &ash::Device,
        ubo: &UniformBufferObject,
    ) -> Result<(), RenderError> {
        match &self.uniform_buffer {
            Some(buffer) => buffer.write(device, std::slice::from_ref(ubo)),
            None => Err(RenderError::NoActiveObject),
        }
    }

    pub fn vertex_count(&self) -> u32 {
        self.model.vertex_count()
    }

    pub fn vertex_buffer(&self) -> Option<vk::Buffer> {
        self.vertex_buffer.as_ref().map(|b| b.handle)
    }

    pub fn descriptor_set(&self) -> Option<vk::DescriptorSet> {
        self.descriptors.map(|d| d.set)
    }

    pub fn is_released(&self) -> bool {
        self.vertex_buffer.is_none()
            && self.uniform_buffer.is_none()
            && self.texture.is_none()
            && self.descriptors.is_none()
    }

    /// Tears down in dependency order: the descriptor pool that references
    /// the buffers and texture goes first, then the buffers, then the texture
    pub fn release(&mut self, destroyer: &impl HandleDestroyer) {
        if let Some(mut descriptors) = self.descriptors.take() {
            descriptors.release(destroyer);
        }
        if let Some(mut buffer) = self.vertex_buffer.take() {
            buffer.release(destroyer);
        }
        if let Some(mut buffer) = self.uniform_buffer.take() {
            buffer.release(destroyer);
        }
        if let Some(mut texture) = self.texture.take() {
            texture.release(destroyer);
        }
    }
}

impl Drop for ObjectResourceSet {
    fn drop(&mut self) {
        if !self.is_released() {
            log::warn!("Dropping ObjectResourceSet without releasing it");
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::renderer::internals::handles::DeviceHandle;
    use crate::renderer::resources::texture::{create_texture_sampler, default_texture};
    use crate::renderer::testing::{fake, fake_object, with_factory, DestroyLog};

    fn fake_texture(first: u64) -> GpuImage {
        GpuImage {
            image: fake(first),
            memory: fake(first + 1),
            view: fake(first + 2),
            width: 4,
            height: 4,
            format: vk::Format::R8G8B8A8_UNORM,
        }
    }

    #[test]
    fn teardown_runs_in_dependency_order() {
        let log = DestroyLog::default();
        let mut object = fake_object(Model::triangle());

        object.release(&log);

        assert_eq!(
            log.destroyed(),
            vec![
                DeviceHandle::DescriptorPool(fake(40)),
                DeviceHandle::Buffer(fake(10)),
                DeviceHandle::Memory(fake(11)),
                DeviceHandle::Buffer(fake(20)),
                DeviceHandle::Memory(fake(21)),
                DeviceHandle::ImageView(fake(32)),
                DeviceHandle::Image(fake(30)),
                DeviceHandle::Memory(fake(31)),
            ]
        );
        assert!(object.is_released());
    }

    #[test]
    fn release_is_idempotent() {
        let log = DestroyLog::default();
        let mut object = fake_object(Model::triangle());

        object.release(&log);
        let first = log.destroyed().len();
        object.release(&log);

        assert_eq!(log.destroyed().len(), first);
        assert_eq!(object.vertex_buffer(), None);
        assert_eq!(object.descriptor_set(), None);
    }

    #[test]
    fn old_texture_is_released_after_the_rebind() {
        let log = DestroyLog::default();
        let mut object = fake_object(Model::triangle());

        object
            .swap_texture(&log, fake_texture(50), |object| {
                assert!(log.destroyed().is_empty());
                assert_eq!(object.texture.as_ref().map(|t| t.view), Some(fake(52)));
                if let Some(mut previous) = object.descriptors.take() {
                    previous.release(&log);
                }
                object.descriptors = Some(ObjectDescriptors {
                    pool: fake(60),
                    set: fake(61),
                });
                Ok(())
            })
            .unwrap();

        assert_eq!(
            log.destroyed(),
            vec![
                DeviceHandle::DescriptorPool(fake(40)),
                DeviceHandle::ImageView(fake(32)),
                DeviceHandle::Image(fake(30)),
                DeviceHandle::Memory(fake(31)),
            ]
        );
        assert_eq!(object.descriptor_set(), Some(fake(61)));
        object.release(&DestroyLog::default());
    }

    #[test]
    fn failed_rebind_still_releases_the_old_texture() {
        let log = DestroyLog::default();
        let mut object = fake_object(Model::triangle());

        let err = object
            .swap_texture(&log, fake_texture(50), |_| Err(RenderError::NoActiveObject))
            .unwrap_err();

        assert!(matches!(err, RenderError::NoActiveObject));
        assert_eq!(
            log.destroyed(),
            vec![
                DeviceHandle::ImageView(fake(32)),
                DeviceHandle::Image(fake(30)),
                DeviceHandle::Memory(fake(31)),
            ]
        );
        assert_eq!(object.texture.as_ref().map(|t| t.view), Some(fake(52)));
        object.release(&DestroyLog::default());
    }

    #[test]
    fn loaded_texture_gets_a_fresh_descriptor_set() {
        with_factory(|device, factory| {
            let mut manager = DescriptorManager::new(device).unwrap();
            let sampler = create_texture_sampler(device).unwrap();
            let texture = factory.upload_texture(&default_texture()).unwrap();
            let mut object = ObjectResourceSet::create(
                device,
                factory,
                &manager,
                sampler,
                Model::triangle(),
                texture,
            )
            .unwrap();

            let before = object.descriptors.unwrap();
            let old_view = object.texture.as_ref().map(|t| t.view).unwrap();
            assert_ne!(before.set, vk::DescriptorSet::null());

            let pixels = RgbaImage::from_pixel(4, 4, image::Rgba([255, 0, 0, 255]));
            object
                .replace_texture(device, factory, &manager, sampler, &pixels)
                .unwrap();

            let after = object.descriptors.unwrap();
            let new_texture = object.texture.as_ref().unwrap();
            assert_ne!(after.pool, before.pool);
            assert_ne!(after.set, vk::DescriptorSet::null());
            assert_ne!(new_texture.view, old_view);
            assert_eq!((new_texture.width, new_texture.height), (4, 4));
            assert_eq!(object.descriptor_set(), Some(after.set));

            object.release(device);
            HandleDestroyer::destroy(device, DeviceHandle::Sampler(sampler));
            manager.release(device);
        });
    }
}
