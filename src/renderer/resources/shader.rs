use std::fs::File;
use std::path::Path;
use ash::vk;
use crate::renderer::config::RenderConfig;
use crate::renderer::error::RenderError;

/// Vertex and fragment modules, destroyed when dropped
pub struct GraphicsShader<'a> {
    pub vert_mod: vk::ShaderModule,
    pub frag_mod: vk::ShaderModule,
    device: &'a ash::Device,
}

impl<'a> GraphicsShader<'a> {
    pub fn new(config: &RenderConfig, device: &'a ash::Device) -> Result<Self, RenderError> {
        let vert_mod = create_shader_module(&config.vertex_shader_path(), device)?;
        let frag_mod = match create_shader_module(&config.fragment_shader_path(), device) {
            Ok(frag_mod) => frag_mod,
            Err(err) => {
                unsafe { device.destroy_shader_module(vert_mod, None) };
                return Err(err);
            }
        };
        Ok(Self {
            vert_mod,
            frag_mod,
            device,
        })
    }
}

impl Drop for GraphicsShader<'_> {
    fn drop(&mut self) {
        unsafe {
            self.device.destroy_shader_module(self.vert_mod, None);
            self.device.destroy_shader_module(self.frag_mod, None);
        }
    }
}

/// Reads SPIR-V words, checking the length and the magic number
pub fn read_spirv(path: &Path) -> Result<Vec<u32>, RenderError> {
    let shader_load = |source| RenderError::ShaderLoad {
        path: path.to_path_buf(),
        source,
    };
    let mut file = File::open(path).map_err(shader_load)?;
    ash::util::read_spv(&mut file).map_err(shader_load)
}

fn create_shader_module(path: &Path, device: &ash::Device) -> Result<vk::ShaderModule, RenderError> {
    let code = read_spirv(path)?;

    let shader_module_info = vk::ShaderModuleCreateInfo::default().code(&code);
    let shader_module = unsafe { device.create_shader_module(&shader_module_info, None)? };

    log::debug!("Created shader module from {:?}", path);

    Ok(shader_module)
}
