use std::ffi::{c_char, CStr};
use std::sync::Arc;
use ash::vk;
use color_eyre::eyre::OptionExt;
use color_eyre::Result;
use crate::renderer::core::instance::RenderInstance;

/// Logical device with a single graphics queue that can also present when
/// created for a surface
pub struct RenderDevice {
    pub logical: Arc<ash::Device>,
    pub physical: vk::PhysicalDevice,
    pub queue_family_index: u32,
    pub queue: vk::Queue,
    pub command_pool: vk::CommandPool,
    pub memory_properties: vk::PhysicalDeviceMemoryProperties,
}

impl RenderDevice {
    pub fn new(instance: &RenderInstance, surface: Option<vk::SurfaceKHR>) -> Result<Self> {
        let (physical, queue_family_index) = Self::select_physical_device(instance, surface)?;

        let logical = Self::create_logical_device(
            &instance.instance,
            physical,
            queue_family_index,
            surface.is_some(),
        )?;
        let queue = unsafe { logical.get_device_queue(queue_family_index, 0) };

        let pool_info = vk::CommandPoolCreateInfo::default()
            .flags(vk::CommandPoolCreateFlags::RESET_COMMAND_BUFFER)
            .queue_family_index(queue_family_index);
        let command_pool = match unsafe { logical.create_command_pool(&pool_info, None) } {
            Ok(pool) => pool,
            Err(err) => {
                unsafe { logical.destroy_device(None) };
                return Err(err.into());
            }
        };

        let memory_properties = unsafe {
            instance.instance.get_physical_device_memory_properties(physical)
        };

        let properties = unsafe { instance.instance.get_physical_device_properties(physical) };
        log::info!(
            "Using {:?} ({:?})",
            properties.device_name_as_c_str().unwrap_or(c"unknown"),
            properties.device_type,
        );

        Ok(Self {
            logical: Arc::new(logical),
            physical,
            queue_family_index,
            queue,
            command_pool,
            memory_properties,
        })
    }

    fn select_physical_device(
        instance: &RenderInstance,
        surface: Option<vk::SurfaceKHR>,
    ) -> Result<(vk::PhysicalDevice, u32)> {
        let req_device_exts = Self::get_required_device_extensions(surface.is_some());
        let instance_fns = &instance.instance;
        Ok(unsafe {
            instance_fns
                .enumerate_physical_devices()?
                .into_iter()
                // Filter out devices that do not contain the required device extensions
                .filter(|device| {
                    let supported_extensions = instance_fns
                        .enumerate_device_extension_properties(*device)
                        .unwrap_or_default();

                    req_device_exts.iter().all(|req_ext| {
                        supported_extensions
                            .iter()
                            .filter_map(|sup_ext| sup_ext.extension_name_as_c_str().ok())
                            .any(|sup_ext| sup_ext == *req_ext)
                    })
                })
                // Filter out devices without a graphics queue that can present
                .filter_map(|device| {
                    instance_fns
                        .get_physical_device_queue_family_properties(device)
                        .iter()
                        .enumerate()
                        .position(|(i, q)| {
                            let supports_graphics = q.queue_flags.contains(vk::QueueFlags::GRAPHICS);
                            match surface {
                                Some(surface) => {
                                    let supports_present = instance
                                        .surface_loader
                                        .get_physical_device_surface_support(device, i as u32, surface)
                                        .unwrap_or(false);
                                    supports_graphics && supports_present
                                }
                                None => supports_graphics,
                            }
                        })
                        .map(|index| (device, index as u32))
                })
                .min_by_key(|(device, _)| {
                    let props = instance_fns.get_physical_device_properties(*device);
                    device_type_rank(props.device_type)
                })
                .ok_or_eyre("No suitable physical device found")?
        })
    }

    fn create_logical_device(
        instance: &ash::Instance,
        physical_device: vk::PhysicalDevice,
        queue_family_index: u32,
        presents: bool,
    ) -> Result<ash::Device> {
        let queue_priorities = [1.0];
        let queue_create_infos = [
            vk::DeviceQueueCreateInfo::default()
                .queue_family_index(queue_family_index)
                .queue_priorities(&queue_priorities),
        ];

        let enabled_extension_names = Self::get_required_device_extensions(presents)
            .iter()
            .map(|ext| ext.as_ptr())
            .collect::<Vec<*const c_char>>();

        let device_create_info = vk::DeviceCreateInfo::default()
            .queue_create_infos(&queue_create_infos)
            .enabled_extension_names(&enabled_extension_names);

        Ok(unsafe {
            instance.create_device(physical_device, &device_create_info, None)?
        })
    }

    fn get_required_device_extensions(presents: bool) -> Vec<&'static CStr> {
        let mut exts = Vec::new();
        if presents {
            exts.push(ash::khr::swapchain::NAME);
        }

        #[cfg(target_os = "macos")]
        exts.push(ash::khr::portability_subset::NAME);

        exts
    }
}

impl Drop for RenderDevice {
    fn drop(&mut self) {
        unsafe {
            if let Err(err) = self.logical.device_wait_idle() {
                log::warn!("Failed to wait for device idle before destruction: {err}");
            }
            self.logical.destroy_command_pool(self.command_pool, None);
            self.logical.destroy_device(None);
        }
    }
}

/// Lower is preferred
fn device_type_rank(device_type: vk::PhysicalDeviceType) -> u32 {
    match device_type {
        vk::PhysicalDeviceType::DISCRETE_GPU => 0,
        vk::PhysicalDeviceType::INTEGRATED_GPU => 1,
        vk::PhysicalDeviceType::VIRTUAL_GPU => 2,
        vk::PhysicalDeviceType::CPU => 3,
        vk::PhysicalDeviceType::OTHER => 4,
        _ => 5,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn discrete_gpus_are_preferred() {
        let mut types = vec![
            vk::PhysicalDeviceType::CPU,
            vk::PhysicalDeviceType::INTEGRATED_GPU,
            vk::PhysicalDeviceType::DISCRETE_GPU,
            vk::PhysicalDeviceType::VIRTUAL_GPU,
        ];
        types.sort_by_key(|t| device_type_rank(*t));

        assert_eq!(types[0], vk::PhysicalDeviceType::DISCRETE_GPU);
        assert_eq!(types[3], vk::PhysicalDeviceType::CPU);
    }

    #[test]
    fn swapchain_is_only_required_for_presentation() {
        assert!(!RenderDevice::get_required_device_extensions(true).is_empty());
        assert!(!RenderDevice::get_required_device_extensions(false).contains(&ash::khr::swapchain::NAME));
    }
}
