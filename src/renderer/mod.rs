pub mod camera;
pub mod config;
pub mod core;
pub mod error;
pub mod frame;
pub mod host;
pub mod internals;
pub mod resources;
pub mod shader_data;

#[cfg(test)]
mod testing;

use std::path::Path;
use ash::vk;
use glam::{Mat4, Quat};
use image::RgbaImage;
use crate::renderer::camera::Camera;
use crate::renderer::config::RenderConfig;
use crate::renderer::error::{LoadError, RenderError};
use crate::renderer::frame::{FrameRenderer, FrameTarget};
use crate::renderer::host::HostWindow;
use crate::renderer::internals::commands::VkCommandRecorder;
use crate::renderer::internals::handles::{DeviceHandle, HandleDestroyer};
use crate::renderer::internals::memory::MemoryAllocator;
use crate::renderer::internals::transfer::TransferEngine;
use crate::renderer::resources::factory::ResourceFactory;
use crate::renderer::resources::model::Model;
use crate::renderer::resources::object::ObjectResourceSet;
use crate::renderer::resources::pipeline::PipelineState;
use crate::renderer::resources::texture;
use crate::renderer::shader_data::UniformBufferObject;

/// Lifecycle of the renderer's GPU resources, driven by the host window
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RendererState {
    Uninitialized,
    ResourcesReady,
    FrameInFlight,
    Released,
}

/// Identifies the object currently held by the renderer. Replacing or
/// releasing the object invalidates the handle.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct ObjectHandle(u64);

/// Resources that live between `init_resources` and `release_resources`
struct GpuState {
    memory: MemoryAllocator,
    pipeline: PipelineState,
    sampler: vk::Sampler,
    object: Option<(ObjectHandle, ObjectResourceSet)>,
    /// Pixels of the texture every new object starts out with
    texture: RgbaImage,
}

impl GpuState {
    fn release(&mut self, destroyer: &impl HandleDestroyer) {
        if let Some((_, mut object)) = self.object.take() {
            object.release(destroyer);
        }
        destroyer.destroy(DeviceHandle::Sampler(self.sampler));
        self.sampler = vk::Sampler::null();
        self.pipeline.release(destroyer);
    }
}

pub struct Renderer {
    config: RenderConfig,
    state: RendererState,
    camera: Camera,
    rotation: Quat,
    gpu: Option<GpuState>,
    next_handle: u64,
}

impl Renderer {
    pub fn new(config: RenderConfig) -> Self {
        Self {
            config,
            state: RendererState::Uninitialized,
            camera: Camera::new(),
            rotation: Quat::IDENTITY,
            gpu: None,
            next_handle: 0,
        }
    }

    pub fn state(&self) -> RendererState {
        self.state
    }

    pub fn active_object(&self) -> Option<ObjectHandle> {
        self.gpu
            .as_ref()
            .and_then(|gpu| gpu.object.as_ref())
            .map(|(handle, _)| *handle)
    }

    pub fn set_object_rotation(&mut self, rotation: Quat) {
        self.rotation = rotation;
    }

    pub fn zoom(&mut self, delta: f32) {
        self.camera.zoom(delta);
        log::trace!("Camera distance {:.2}", self.camera.distance());
    }

    /// Creates the pipeline, sampler and descriptor layout, then the built-in
    /// triangle with a plain white texture
    pub fn init_resources(&mut self, host: &dyn HostWindow) -> Result<ObjectHandle, RenderError> {
        self.expect_state("init_resources", &[RendererState::Uninitialized, RendererState::Released])?;

        let device: &ash::Device = host.device();
        let memory = MemoryAllocator::new(host.physical_device_memory_properties());
        let mut pipeline = PipelineState::new(device, host.default_render_pass(), &self.config)?;
        let sampler = match texture::create_texture_sampler(device) {
            Ok(sampler) => sampler,
            Err(err) => {
                pipeline.release(device);
                return Err(err);
            }
        };

        let mut gpu = GpuState {
            memory,
            pipeline,
            sampler,
            object: None,
            texture: texture::default_texture(),
        };
        let handle = self.issue_handle();
        match Self::create_object(host, &gpu, Model::triangle()) {
            Ok(object) => gpu.object = Some((handle, object)),
            Err(err) => {
                gpu.release(device);
                return Err(err);
            }
        }

        self.gpu = Some(gpu);
        self.state = RendererState::ResourcesReady;
        log::info!("Renderer resources initialized");

        Ok(handle)
    }

    /// Records the frame into the host's current command buffer and hands
    /// it back for submission.
    pub fn start_next_frame(&mut self, host: &mut dyn HostWindow) -> Result<(), RenderError> {
        self.expect_state("start_next_frame", &[RendererState::ResourcesReady])?;
        let Some(gpu) = self.gpu.as_ref() else {
            return Err(self.invalid_state("start_next_frame"));
        };

        self.state = RendererState::FrameInFlight;

        let extent = host.swap_chain_image_size();
        let object = gpu.object.as_ref().map(|(_, object)| object);
        let recorded = {
            let device: &ash::Device = host.device();
            let uploaded = match object {
                Some(object) => {
                    let ubo = object_uniforms(&self.camera, self.rotation, object.model.transformation, extent);
                    object.update_uniforms(device, &ubo)
                }
                None => Ok(()),
            };

            let target = FrameTarget {
                render_pass: host.default_render_pass(),
                framebuffer: host.current_framebuffer(),
                extent,
            };
            let mut recorder = VkCommandRecorder::new(device, host.current_command_buffer());
            FrameRenderer::record(&mut recorder, &target, &gpu.pipeline, object);
            uploaded
        };

        // The host expects the frame back even if the uniforms are stale
        let submitted = host.frame_ready();
        self.state = RendererState::ResourcesReady;
        host.request_update();

        recorded.and(submitted)
    }

    /// Waits for the device, then releases the object, the sampler and the
    /// pipeline in that order
    pub fn release_resources(&mut self, host: &dyn HostWindow) -> Result<(), RenderError> {
        if self.state == RendererState::FrameInFlight {
            return Err(self.invalid_state("release_resources"));
        }
        let Some(mut gpu) = self.gpu.take() else {
            return Ok(());
        };

        let device: &ash::Device = host.device();
        let idle = unsafe { device.device_wait_idle() };
        gpu.release(device);
        self.state = RendererState::Released;
        log::info!("Renderer resources released");

        idle.map_err(Into::into)
    }

    /// Loads `.obj` files as the new object and images as its texture
    pub fn load_asset(&mut self, host: &dyn HostWindow, path: &Path) -> Result<(), RenderError> {
        let extension = path
            .extension()
            .and_then(|ext| ext.to_str())
            .map(str::to_ascii_lowercase);
        match extension.as_deref() {
            Some("obj") => self.load_model(host, path).map(|_| ()),
            Some("png" | "jpg" | "jpeg") => self.add_texture_image(host, path),
            _ => Err(LoadError::UnsupportedAsset(path.to_path_buf()).into()),
        }
    }

    pub fn load_model(&mut self, host: &dyn HostWindow, path: &Path) -> Result<ObjectHandle, RenderError> {
        self.expect_state("load_model", &[RendererState::ResourcesReady])?;
        let model = Model::load_obj(path)?;
        self.add_object(host, model)
    }

    /// Replaces the current object. The new object is fully created before
    /// the old one is released, so a failure leaves the old one in place.
    pub fn add_object(&mut self, host: &dyn HostWindow, model: Model) -> Result<ObjectHandle, RenderError> {
        self.expect_state("add_object", &[RendererState::ResourcesReady])?;
        let handle = self.issue_handle();
        let Some(gpu) = self.gpu.as_mut() else {
            return Err(self.invalid_state("add_object"));
        };

        let device: &ash::Device = host.device();
        unsafe { device.device_wait_idle()? };

        let object = Self::create_object(host, gpu, model)?;
        if let Some((_, mut previous)) = gpu.object.replace((handle, object)) {
            previous.release(device);
        }

        Ok(handle)
    }

    /// Uses the image at `path` as the texture of the current object, if
    /// any, and of every object added later
    pub fn add_texture_image(&mut self, host: &dyn HostWindow, path: &Path) -> Result<(), RenderError> {
        self.expect_state("add_texture_image", &[RendererState::ResourcesReady])?;
        let pixels = texture::decode(path)?;
        let Some(gpu) = self.gpu.as_mut() else {
            return Err(self.invalid_state("add_texture_image"));
        };
        let GpuState {
            memory,
            pipeline,
            sampler,
            object,
            texture,
        } = gpu;
        *texture = pixels;
        let Some((_, object)) = object.as_mut() else {
            log::debug!("No active object, keeping the texture for the next one");
            return Ok(());
        };

        let device: &ash::Device = host.device();
        unsafe { device.device_wait_idle()? };

        let factory = resource_factory(host, memory);
        object.replace_texture(device, &factory, &pipeline.descriptors, *sampler, texture)
    }

    pub fn release_object(&mut self, host: &dyn HostWindow, handle: ObjectHandle) -> Result<(), RenderError> {
        self.expect_state("release_object", &[RendererState::ResourcesReady])?;
        let Some(gpu) = self.gpu.as_mut() else {
            return Err(self.invalid_state("release_object"));
        };
        match &gpu.object {
            Some((current, _)) if *current == handle => {}
            _ => return Err(RenderError::StaleHandle(handle)),
        }

        let device: &ash::Device = host.device();
        unsafe { device.device_wait_idle()? };
        if let Some((_, mut object)) = gpu.object.take() {
            object.release(device);
        }

        Ok(())
    }

    fn create_object(
        host: &dyn HostWindow,
        gpu: &GpuState,
        model: Model,
    ) -> Result<ObjectResourceSet, RenderError> {
        let device: &ash::Device = host.device();
        let factory = resource_factory(host, &gpu.memory);
        let texture = factory.upload_texture(&gpu.texture)?;
        ObjectResourceSet::create(
            device,
            &factory,
            &gpu.pipeline.descriptors,
            gpu.sampler,
            model,
            texture,
        )
    }

    fn issue_handle(&mut self) -> ObjectHandle {
        self.next_handle += 1;
        ObjectHandle(self.next_handle)
    }

    fn expect_state(
        &self,
        operation: &'static str,
        allowed: &[RendererState],
    ) -> Result<(), RenderError> {
        if allowed.contains(&self.state) {
            Ok(())
        } else {
            Err(self.invalid_state(operation))
        }
    }

    fn invalid_state(&self, operation: &'static str) -> RenderError {
        RenderError::InvalidState {
            operation,
            state: self.state,
        }
    }
}

impl Drop for Renderer {
    fn drop(&mut self) {
        if self.gpu.is_some() {
            log::warn!("Dropping Renderer without calling release_resources");
        }
    }
}

fn resource_factory<'a>(host: &'a dyn HostWindow, memory: &'a MemoryAllocator) -> ResourceFactory<'a> {
    let device: &ash::Device = host.device();
    let transfer = TransferEngine::new(device, host.graphics_queue(), host.graphics_command_pool());
    ResourceFactory::new(device, memory, transfer)
}

/// Object rotation on top of the model's own normalization, seen through
/// the camera
fn object_uniforms(
    camera: &Camera,
    rotation: Quat,
    transformation: Mat4,
    extent: vk::Extent2D,
) -> UniformBufferObject {
    UniformBufferObject {
        model: Mat4::from_quat(rotation) * transformation,
        view: camera.view_mat(),
        proj: camera.proj_mat(extent),
    }
}
