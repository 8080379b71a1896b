//! GPU-side objects the renderer creates and releases explicitly, plus the
//! CPU-side geometry they are built from.

pub mod buffer;
pub mod descriptor;
pub mod factory;
pub mod image;
pub mod mesh;
pub mod model;
pub mod object;
pub mod pipeline;
pub mod shader;
pub mod texture;
pub mod vertex;
