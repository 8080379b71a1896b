//! "Core" objects own the Vulkan instance, the device and the presentation
//! target. Together they form the host window the renderer draws into.

pub mod device;
pub mod frame;
pub mod instance;
pub mod target;
pub mod window;
