use ash::vk;
use image::RgbaImage;
use crate::renderer::error::{LoadError, RenderError};
use crate::renderer::internals::handles::{DeviceHandle, HandleDestroyer};
use crate::renderer::internals::memory::MemoryAllocator;
use crate::renderer::internals::transfer::{record_texture_upload, TransferEngine};
use crate::renderer::resources::buffer::GpuBuffer;
use crate::renderer::resources::image::{create_image_view, GpuImage};

/// Format every uploaded texture is stored in
pub const TEXTURE_FORMAT: vk::Format = vk::Format::R8G8B8A8_UNORM;

const STAGING_PROPERTIES: vk::MemoryPropertyFlags = vk::MemoryPropertyFlags::from_raw(
    vk::MemoryPropertyFlags::HOST_VISIBLE.as_raw()
        | vk::MemoryPropertyFlags::HOST_COHERENT.as_raw(),
);

/// Creates buffers and images and fills device-local ones through staging
/// buffers. Every partially created object is released again on failure.
pub struct ResourceFactory<'a> {
    device: &'a ash::Device,
    memory: &'a MemoryAllocator,
    transfer: TransferEngine<'a>,
}

impl<'a> ResourceFactory<'a> {
    pub fn new(
        device: &'a ash::Device,
        memory: &'a MemoryAllocator,
        transfer: TransferEngine<'a>,
    ) -> Self {
        Self {
            device,
            memory,
            transfer,
        }
    }

    pub fn create_buffer(
        &self,
        size: vk::DeviceSize,
        usage: vk::BufferUsageFlags,
        properties: vk::MemoryPropertyFlags,
    ) -> Result<GpuBuffer, RenderError> {
        if size == 0 {
            return Err(RenderError::EmptyUpload);
        }

        let buffer_info = vk::BufferCreateInfo::default()
            .size(size)
            .usage(usage)
            .sharing_mode(vk::SharingMode::EXCLUSIVE);
        let handle = unsafe { self.device.create_buffer(&buffer_info, None)? };

        let memory = match self.memory.allocate_for_buffer(self.device, handle, properties) {
            Ok(memory) => memory,
            Err(err) => {
                HandleDestroyer::destroy(self.device, DeviceHandle::Buffer(handle));
                return Err(err);
            }
        };

        Ok(GpuBuffer::from_raw_parts(handle, memory, size, usage))
    }

    /// Host-visible, coherent buffer that can be written with [`GpuBuffer::write`]
    pub fn create_host_buffer(
        &self,
        size: vk::DeviceSize,
        usage: vk::BufferUsageFlags,
    ) -> Result<GpuBuffer, RenderError> {
        self.create_buffer(size, usage, STAGING_PROPERTIES)
    }

    /// Copies `data` into a new buffer through a temporary staging buffer.
    /// `TRANSFER_DST` is added to `usage`.
    pub fn upload_via_staging<T: bytemuck::Pod>(
        &self,
        data: &[T],
        usage: vk::BufferUsageFlags,
        properties: vk::MemoryPropertyFlags,
    ) -> Result<GpuBuffer, RenderError> {
        let size = std::mem::size_of_val(data) as vk::DeviceSize;

        let mut staging = self.create_host_buffer(size, vk::BufferUsageFlags::TRANSFER_SRC)?;
        let result = self.fill_from_staging(&staging, data, size, usage, properties);
        staging.release(self.device);

        result
    }

    fn fill_from_staging<T: bytemuck::Pod>(
        &self,
        staging: &GpuBuffer,
        data: &[T],
        size: vk::DeviceSize,
        usage: vk::BufferUsageFlags,
        properties: vk::MemoryPropertyFlags,
    ) -> Result<GpuBuffer, RenderError> {
        staging.write(self.device, data)?;

        let mut buffer = self.create_buffer(
            size,
            usage | vk::BufferUsageFlags::TRANSFER_DST,
            properties,
        )?;
        if let Err(err) = self.transfer.copy_buffer(staging.handle, buffer.handle, size) {
            buffer.release(self.device);
            return Err(err);
        }

        Ok(buffer)
    }

    /// Creates a device-local 2D image with a single mip level and a view
    /// covering it. The image starts out in `UNDEFINED` layout.
    pub fn create_image(
        &self,
        width: u32,
        height: u32,
        format: vk::Format,
        usage: vk::ImageUsageFlags,
        aspect: vk::ImageAspectFlags,
    ) -> Result<GpuImage, RenderError> {
        let image_info = vk::ImageCreateInfo::default()
            .image_type(vk::ImageType::TYPE_2D)
            .format(format)
            .extent(vk::Extent3D {
                width,
                height,
                depth: 1,
            })
            .mip_levels(1)
            .array_layers(1)
            .samples(vk::SampleCountFlags::TYPE_1)
            .tiling(vk::ImageTiling::OPTIMAL)
            .usage(usage)
            .sharing_mode(vk::SharingMode::EXCLUSIVE)
            .initial_layout(vk::ImageLayout::UNDEFINED);
        let image = unsafe { self.device.create_image(&image_info, None)? };

        let memory = match self.memory.allocate_for_image(
            self.device,
            image,
            vk::MemoryPropertyFlags::DEVICE_LOCAL,
        ) {
            Ok(memory) => memory,
            Err(err) => {
                HandleDestroyer::destroy(self.device, DeviceHandle::Image(image));
                return Err(err);
            }
        };

        let mut gpu_image = GpuImage {
            image,
            memory,
            view: vk::ImageView::null(),
            width,
            height,
            format,
        };
        match create_image_view(self.device, image, format, aspect) {
            Ok(view) => gpu_image.view = view,
            Err(err) => {
                gpu_image.release(self.device);
                return Err(err);
            }
        }

        Ok(gpu_image)
    }

    /// Uploads RGBA8 pixels into a sampled image left in
    /// `SHADER_READ_ONLY_OPTIMAL` layout
    pub fn upload_texture(&self, pixels: &RgbaImage) -> Result<GpuImage, RenderError> {
        let (width, height) = pixels.dimensions();
        if width == 0 || height == 0 {
            return Err(LoadError::EmptyTexture { width, height }.into());
        }

        let bytes = pixels.as_raw().as_slice();
        let mut staging = self.create_host_buffer(
            bytes.len() as vk::DeviceSize,
            vk::BufferUsageFlags::TRANSFER_SRC,
        )?;
        let result = staging
            .write(self.device, bytes)
            .and_then(|()| self.upload_image_from(&staging, width, height));
        staging.release(self.device);

        result
    }

    fn upload_image_from(
        &self,
        staging: &GpuBuffer,
        width: u32,
        height: u32,
    ) -> Result<GpuImage, RenderError> {
        let mut texture = self.create_image(
            width,
            height,
            TEXTURE_FORMAT,
            vk::ImageUsageFlags::TRANSFER_DST | vk::ImageUsageFlags::SAMPLED,
            vk::ImageAspectFlags::COLOR,
        )?;

        let extent = texture.extent();
        let image = texture.image;
        let staging = staging.handle;
        if let Err(err) = self.transfer.immediate_submit(|recorder| {
            record_texture_upload(recorder, staging, image, extent)
        }) {
            texture.release(self.device);
            return Err(err);
        }

        Ok(texture)
    }
}
