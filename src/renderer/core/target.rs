use ash::prelude::VkResult;
use ash::vk;
use color_eyre::eyre::OptionExt;
use color_eyre::Result;
use crate::renderer::core::device::RenderDevice;
use crate::renderer::core::instance::RenderInstance;
use crate::renderer::internals::memory::MemoryAllocator;
use crate::renderer::internals::transfer::TransferEngine;
use crate::renderer::resources::factory::ResourceFactory;
use crate::renderer::resources::image::GpuImage;

const DEPTH_FORMAT_CANDIDATES: [vk::Format; 3] = [
    vk::Format::D24_UNORM_S8_UINT,
    vk::Format::D32_SFLOAT_S8_UINT,
    vk::Format::D16_UNORM_S8_UINT,
];

/// Presentation target of the renderer: the surface, its swapchain, a
/// shared depth-stencil buffer and one framebuffer per swapchain image
pub struct RenderTarget {
    pub surface: vk::SurfaceKHR,
    pub surface_format: vk::SurfaceFormatKHR,
    pub present_mode: vk::PresentModeKHR,
    pub extent: vk::Extent2D,

    pub swapchain: vk::SwapchainKHR,
    pub swapchain_loader: ash::khr::swapchain::Device,
    pub swapchain_images: Vec<vk::Image>,
    pub swapchain_image_views: Vec<vk::ImageView>,

    pub depth_format: vk::Format,
    depth_image: Option<GpuImage>,

    pub render_pass: vk::RenderPass,
    pub framebuffers: Vec<vk::Framebuffer>,
}

impl RenderTarget {
    pub fn new(
        instance: &RenderInstance,
        device: &RenderDevice,
        surface: vk::SurfaceKHR,
        window_size: vk::Extent2D,
        vsync: bool,
    ) -> Result<Self> {
        let surface_formats = unsafe {
            instance.surface_loader
                .get_physical_device_surface_formats(device.physical, surface)?
        };
        let surface_present_modes = unsafe {
            instance.surface_loader
                .get_physical_device_surface_present_modes(device.physical, surface)?
        };

        let surface_format = choose_surface_format(&surface_formats)
            .ok_or_eyre("No surface format available")?;
        let present_mode = choose_present_mode(&surface_present_modes, vsync);
        let depth_format = Self::find_depth_format(instance, device)?;
        let swapchain_loader = ash::khr::swapchain::Device::new(&instance.instance, &device.logical);

        let render_pass = Self::create_render_pass(
            &device.logical,
            surface_format.format,
            depth_format,
        )?;

        let mut target = Self {
            surface,
            surface_format,
            present_mode,
            extent: window_size,
            swapchain: vk::SwapchainKHR::null(),
            swapchain_loader,
            swapchain_images: Vec::new(),
            swapchain_image_views: Vec::new(),
            depth_format,
            depth_image: None,
            render_pass,
            framebuffers: Vec::new(),
        };
        if let Err(err) = target.create_swapchain_resources(instance, device, window_size) {
            target.destroy(&device.logical);
            return Err(err);
        }

        log::info!(
            "Render target created: {}x{}, {:?}, {:?}",
            target.extent.width,
            target.extent.height,
            surface_format.format,
            present_mode,
        );

        Ok(target)
    }

    /// Rebuilds the swapchain and everything sized after it. The render pass
    /// survives since the formats do not change.
    pub fn recreate(
        &mut self,
        instance: &RenderInstance,
        device: &RenderDevice,
        window_size: vk::Extent2D,
    ) -> Result<()> {
        unsafe { device.logical.device_wait_idle()? };
        self.destroy_size_dependent(&device.logical);
        self.create_swapchain_resources(instance, device, window_size)?;
        log::debug!("Swapchain recreated at {}x{}", self.extent.width, self.extent.height);
        Ok(())
    }

    /// Destroys everything but the surface, which belongs to the instance
    pub fn destroy(&mut self, device: &ash::Device) {
        self.destroy_size_dependent(device);
        unsafe {
            if self.swapchain != vk::SwapchainKHR::null() {
                self.swapchain_loader.destroy_swapchain(self.swapchain, None);
                self.swapchain = vk::SwapchainKHR::null();
            }
            if self.render_pass != vk::RenderPass::null() {
                device.destroy_render_pass(self.render_pass, None);
                self.render_pass = vk::RenderPass::null();
            }
        }
    }

    fn create_swapchain_resources(
        &mut self,
        instance: &RenderInstance,
        device: &RenderDevice,
        window_size: vk::Extent2D,
    ) -> Result<()> {
        let surface_capabilities = unsafe {
            instance.surface_loader
                .get_physical_device_surface_capabilities(device.physical, self.surface)?
        };
        let image_extent = choose_extent(&surface_capabilities, window_size);
        let min_image_count = choose_image_count(&surface_capabilities);
        let pre_transform = if surface_capabilities
            .supported_transforms
            .contains(vk::SurfaceTransformFlagsKHR::IDENTITY)
        {
            vk::SurfaceTransformFlagsKHR::IDENTITY
        } else {
            surface_capabilities.current_transform
        };

        let old_swapchain = self.swapchain;
        let swapchain_info = vk::SwapchainCreateInfoKHR::default()
            .surface(self.surface)
            .min_image_count(min_image_count)
            .image_format(self.surface_format.format)
            .image_color_space(self.surface_format.color_space)
            .image_extent(image_extent)
            .image_usage(vk::ImageUsageFlags::COLOR_ATTACHMENT)
            .image_sharing_mode(vk::SharingMode::EXCLUSIVE)
            .pre_transform(pre_transform)
            .composite_alpha(vk::CompositeAlphaFlagsKHR::OPAQUE)
            .present_mode(self.present_mode)
            .clipped(true)
            .image_array_layers(1)
            .old_swapchain(old_swapchain);

        let swapchain = unsafe {
            self.swapchain_loader.create_swapchain(&swapchain_info, None)?
        };
        if old_swapchain != vk::SwapchainKHR::null() {
            unsafe { self.swapchain_loader.destroy_swapchain(old_swapchain, None) };
        }
        self.swapchain = swapchain;
        self.extent = image_extent;

        self.swapchain_images = unsafe {
            self.swapchain_loader.get_swapchain_images(swapchain)?
        };
        self.swapchain_image_views = Self::create_swapchain_image_views(
            &device.logical,
            &self.swapchain_images,
            self.surface_format.format,
        )?;

        let memory = MemoryAllocator::new(device.memory_properties);
        let factory = ResourceFactory::new(
            &device.logical,
            &memory,
            TransferEngine::new(&device.logical, device.queue, device.command_pool),
        );
        let depth_image = factory.create_image(
            image_extent.width,
            image_extent.height,
            self.depth_format,
            vk::ImageUsageFlags::DEPTH_STENCIL_ATTACHMENT,
            depth_aspect(self.depth_format),
        )?;
        let depth_view = depth_image.view;
        self.depth_image = Some(depth_image);

        self.framebuffers = self.swapchain_image_views
            .iter()
            .map(|view| {
                let attachments = [*view, depth_view];
                let framebuffer_info = vk::FramebufferCreateInfo::default()
                    .render_pass(self.render_pass)
                    .attachments(&attachments)
                    .width(image_extent.width)
                    .height(image_extent.height)
                    .layers(1);
                unsafe {
                    device.logical.create_framebuffer(&framebuffer_info, None)
                }
            })
            .collect::<VkResult<Vec<vk::Framebuffer>>>()?;

        Ok(())
    }

    fn destroy_size_dependent(&mut self, device: &ash::Device) {
        unsafe {
            for framebuffer in self.framebuffers.drain(..) {
                device.destroy_framebuffer(framebuffer, None);
            }
            for view in self.swapchain_image_views.drain(..) {
                device.destroy_image_view(view, None);
            }
        }
        if let Some(mut depth_image) = self.depth_image.take() {
            depth_image.release(device);
        }
        self.swapchain_images.clear();
    }

    fn create_swapchain_image_views(
        device: &ash::Device,
        swapchain_images: &[vk::Image],
        swapchain_image_format: vk::Format,
    ) -> Result<Vec<vk::ImageView>> {
        let views = swapchain_images
            .iter()
            .map(|image| {
                let view_info = vk::ImageViewCreateInfo::default()
                    .view_type(vk::ImageViewType::TYPE_2D)
                    .format(swapchain_image_format)
                    .components(vk::ComponentMapping {
                        r: vk::ComponentSwizzle::R,
                        g: vk::ComponentSwizzle::G,
                        b: vk::ComponentSwizzle::B,
                        a: vk::ComponentSwizzle::A,
                    })
                    .subresource_range(vk::ImageSubresourceRange {
                        aspect_mask: vk::ImageAspectFlags::COLOR,
                        base_mip_level: 0,
                        level_count: 1,
                        base_array_layer: 0,
                        layer_count: 1,
                    })
                    .image(*image);
                unsafe {
                    device.create_image_view(&view_info, None)
                }
            })
            .collect::<VkResult<Vec<vk::ImageView>>>()?;
        Ok(views)
    }

    /// One subpass writing the swapchain image and the depth-stencil buffer,
    /// both cleared at the start of the pass
    fn create_render_pass(
        device: &ash::Device,
        color_format: vk::Format,
        depth_format: vk::Format,
    ) -> Result<vk::RenderPass> {
        let attachments = [
            vk::AttachmentDescription::default()
                .format(color_format)
                .samples(vk::SampleCountFlags::TYPE_1)
                .load_op(vk::AttachmentLoadOp::CLEAR)
                .store_op(vk::AttachmentStoreOp::STORE)
                .stencil_load_op(vk::AttachmentLoadOp::DONT_CARE)
                .stencil_store_op(vk::AttachmentStoreOp::DONT_CARE)
                .initial_layout(vk::ImageLayout::UNDEFINED)
                .final_layout(vk::ImageLayout::PRESENT_SRC_KHR),
            vk::AttachmentDescription::default()
                .format(depth_format)
                .samples(vk::SampleCountFlags::TYPE_1)
                .load_op(vk::AttachmentLoadOp::CLEAR)
                .store_op(vk::AttachmentStoreOp::DONT_CARE)
                .stencil_load_op(vk::AttachmentLoadOp::CLEAR)
                .stencil_store_op(vk::AttachmentStoreOp::DONT_CARE)
                .initial_layout(vk::ImageLayout::UNDEFINED)
                .final_layout(vk::ImageLayout::DEPTH_STENCIL_ATTACHMENT_OPTIMAL),
        ];
        let color_refs = [vk::AttachmentReference {
            attachment: 0,
            layout: vk::ImageLayout::COLOR_ATTACHMENT_OPTIMAL,
        }];
        let depth_ref = vk::AttachmentReference {
            attachment: 1,
            layout: vk::ImageLayout::DEPTH_STENCIL_ATTACHMENT_OPTIMAL,
        };
        let subpasses = [vk::SubpassDescription::default()
            .pipeline_bind_point(vk::PipelineBindPoint::GRAPHICS)
            .color_attachments(&color_refs)
            .depth_stencil_attachment(&depth_ref)];
        let stages = vk::PipelineStageFlags::COLOR_ATTACHMENT_OUTPUT
            | vk::PipelineStageFlags::EARLY_FRAGMENT_TESTS;
        let dependencies = [vk::SubpassDependency::default()
            .src_subpass(vk::SUBPASS_EXTERNAL)
            .dst_subpass(0)
            .src_stage_mask(stages)
            .src_access_mask(vk::AccessFlags::empty())
            .dst_stage_mask(stages)
            .dst_access_mask(
                vk::AccessFlags::COLOR_ATTACHMENT_WRITE
                    | vk::AccessFlags::DEPTH_STENCIL_ATTACHMENT_WRITE,
            )];

        let render_pass_info = vk::RenderPassCreateInfo::default()
            .attachments(&attachments)
            .subpasses(&subpasses)
            .dependencies(&dependencies);

        Ok(unsafe { device.create_render_pass(&render_pass_info, None)? })
    }

    fn find_depth_format(instance: &RenderInstance, device: &RenderDevice) -> Result<vk::Format> {
        DEPTH_FORMAT_CANDIDATES
            .into_iter()
            .find(|format| {
                let props = unsafe {
                    instance.instance
                        .get_physical_device_format_properties(device.physical, *format)
                };
                props
                    .optimal_tiling_features
                    .contains(vk::FormatFeatureFlags::DEPTH_STENCIL_ATTACHMENT)
            })
            .ok_or_eyre("No supported depth-stencil format")
    }
}

impl Drop for RenderTarget {
    fn drop(&mut self) {
        if self.render_pass != vk::RenderPass::null() {
            log::warn!("Dropping RenderTarget without destroying it");
        }
    }
}

fn choose_surface_format(formats: &[vk::SurfaceFormatKHR]) -> Option<vk::SurfaceFormatKHR> {
    formats
        .iter()
        .find(|format| {
            format.format == vk::Format::B8G8R8A8_UNORM
                && format.color_space == vk::ColorSpaceKHR::SRGB_NONLINEAR
        })
        .or_else(|| formats.first())
        .copied()
}

/// FIFO is the only mode every driver has to support
fn choose_present_mode(modes: &[vk::PresentModeKHR], vsync: bool) -> vk::PresentModeKHR {
    if vsync {
        return vk::PresentModeKHR::FIFO;
    }
    [vk::PresentModeKHR::MAILBOX, vk::PresentModeKHR::IMMEDIATE]
        .into_iter()
        .find(|mode| modes.contains(mode))
        .unwrap_or(vk::PresentModeKHR::FIFO)
}

fn choose_extent(
    capabilities: &vk::SurfaceCapabilitiesKHR,
    window_size: vk::Extent2D,
) -> vk::Extent2D {
    if capabilities.current_extent.width != u32::MAX {
        capabilities.current_extent
    } else {
        vk::Extent2D {
            width: window_size.width.clamp(
                capabilities.min_image_extent.width,
                capabilities.max_image_extent.width,
            ),
            height: window_size.height.clamp(
                capabilities.min_image_extent.height,
                capabilities.max_image_extent.height,
            ),
        }
    }
}

fn choose_image_count(capabilities: &vk::SurfaceCapabilitiesKHR) -> u32 {
    let min = capabilities.min_image_count;
    let max = capabilities.max_image_count;
    // One more than the minimum so acquiring never waits on the driver
    if max > 0 && min + 1 > max {
        max
    } else {
        min + 1
    }
}

fn depth_aspect(format: vk::Format) -> vk::ImageAspectFlags {
    match format {
        vk::Format::D16_UNORM | vk::Format::D32_SFLOAT => vk::ImageAspectFlags::DEPTH,
        _ => vk::ImageAspectFlags::DEPTH | vk::ImageAspectFlags::STENCIL,
    }
}
