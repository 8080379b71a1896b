use std::path::PathBuf;
use ash::vk;
use thiserror::Error;
use crate::renderer::{ObjectHandle, RendererState};

/// Errors raised by the frame renderer and its resource helpers
#[derive(Debug, Error)]
pub enum RenderError {
    #[error("Vulkan call failed: {0}")]
    Vulkan(#[from] vk::Result),

    #[error("No memory type matches filter {type_filter:#034b} with properties {properties:?}")]
    NoSuitableMemoryType {
        type_filter: u32,
        properties: vk::MemoryPropertyFlags,
    },

    #[error("Unsupported image layout transition {old:?} -> {new:?}")]
    UnsupportedLayoutTransition {
        old: vk::ImageLayout,
        new: vk::ImageLayout,
    },

    #[error("Failed to load shader {path:?}")]
    ShaderLoad {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("Failed to copy into mapped memory: {0:?}")]
    StagingCopy(presser::CopyError),

    #[error("Refusing to upload an empty buffer")]
    EmptyUpload,

    #[error("`{operation}` called while the renderer is {state:?}")]
    InvalidState {
        operation: &'static str,
        state: RendererState,
    },

    #[error("No object is loaded")]
    NoActiveObject,

    #[error("Object handle {0:?} no longer refers to the loaded object")]
    StaleHandle(ObjectHandle),

    #[error(transparent)]
    Load(#[from] LoadError),
}

/// Errors raised while reading user-provided assets
#[derive(Debug, Error)]
pub enum LoadError {
    #[error("Failed to parse OBJ file {path:?}")]
    Obj {
        path: PathBuf,
        #[source]
        source: tobj::LoadError,
    },

    #[error("{attribute} index {index} is out of range for {len} elements")]
    IndexOutOfRange {
        attribute: &'static str,
        index: usize,
        len: usize,
    },

    #[error("Mesh contains no triangles")]
    EmptyMesh,

    #[error("Failed to decode texture {path:?}")]
    Texture {
        path: PathBuf,
        #[source]
        source: image::ImageError,
    },

    #[error("Texture has no pixels ({width}x{height})")]
    EmptyTexture {
        width: u32,
        height: u32,
    },

    #[error("Don't know how to load {0:?}")]
    UnsupportedAsset(PathBuf),
}
