use std::path::PathBuf;

/// Directory `build.rs` writes the compiled SPIR-V into
pub const DEFAULT_SHADER_DIR: &str = concat!(env!("CARGO_MANIFEST_DIR"), "/shaders-built");

/// Contains configuration options for the renderer like vsync and where the shaders live
#[derive(Debug, Clone)]
pub struct RenderConfig {
    pub vsync: bool,
    pub shader_dir: PathBuf,
    /// Stem of `<name>.vert.spv` and `<name>.frag.spv`
    pub shader_name: String,
    pub frames_in_flight: usize,
}

impl RenderConfig {
    pub fn vertex_shader_path(&self) -> PathBuf {
        self.shader_dir.join(format!("{}.vert.spv", self.shader_name))
    }

    pub fn fragment_shader_path(&self) -> PathBuf {
        self.shader_dir.join(format!("{}.frag.spv", self.shader_name))
    }
}

impl Default for RenderConfig {
    fn default() -> Self {
        Self {
            vsync: true,
            shader_dir: PathBuf::from(DEFAULT_SHADER_DIR),
            shader_name: "shader".to_owned(),
            frames_in_flight: 2,
        }
    }
}
