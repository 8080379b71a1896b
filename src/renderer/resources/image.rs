use ash::vk;
use crate::renderer::error::RenderError;
use crate::renderer::internals::handles::{DeviceHandle, HandleDestroyer};

/// A 2D image, its dedicated memory and the view used to sample or attach it
#[derive(Debug)]
pub struct GpuImage {
    pub image: vk::Image,
    pub memory: vk::DeviceMemory,
    pub view: vk::ImageView,
    pub width: u32,
    pub height: u32,
    pub format: vk::Format,
}

impl GpuImage {
    pub fn extent(&self) -> vk::Extent2D {
        vk::Extent2D {
            width: self.width,
            height: self.height,
        }
    }

    pub fn is_released(&self) -> bool {
        self.view == vk::ImageView::null()
            && self.image == vk::Image::null()
            && self.memory == vk::DeviceMemory::null()
    }

    /// Destroys the view, then the image, then frees the memory
    pub fn release(&mut self, destroyer: &impl HandleDestroyer) {
        destroyer.destroy(DeviceHandle::ImageView(self.view));
        destroyer.destroy(DeviceHandle::Image(self.image));
        destroyer.destroy(DeviceHandle::Memory(self.memory));
        self.view = vk::ImageView::null();
        self.image = vk::Image::null();
        self.memory = vk::DeviceMemory::null();
    }
}

impl Drop for GpuImage {
    fn drop(&mut self) {
        if !self.is_released() {
            log::warn!(
                "Dropping {}x{} GpuImage without releasing it",
                self.width,
                self.height
            );
        }
    }
}

pub fn create_image_view(
    device: &ash::Device,
    image: vk::Image,
    format: vk::Format,
    aspect: vk::ImageAspectFlags,
) -> Result<vk::ImageView, RenderError> {
    let view_info = vk::ImageViewCreateInfo::default()
        .view_type(vk::ImageViewType::TYPE_2D)
        .image(image)
        .format(format)
        .components(vk::ComponentMapping {
            r: vk::ComponentSwizzle::IDENTITY,
            g: vk::ComponentSwizzle::IDENTITY,
            b: vk::ComponentSwizzle::IDENTITY,
            a: vk::ComponentSwizzle::IDENTITY,
        })
        .subresource_range(vk::ImageSubresourceRange {
            aspect_mask: aspect,
            base_mip_level: 0,
            level_count: 1,
            base_array_layer: 0,
            layer_count: 1,
        });
    Ok(unsafe { device.create_image_view(&view_info, None)? })
}
