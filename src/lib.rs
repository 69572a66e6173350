//! Flint - a Vulkan device/resource/swapchain substrate.
//!
//! The crate brings up a GPU device context, negotiates and recreates a
//! presentable swapchain across resize events, allocates memory-backed
//! buffers and textures, and builds render targets (render passes +
//! framebuffers, including multisample resolve). Command recording,
//! descriptor sets, samplers, and pipelines are the contract of the layer
//! above; see [`graphics::Graphics`].

pub mod assets;
pub mod backend;
pub mod config;
pub mod graphics;

pub use backend::VulkanContext;
pub use config::Config;
pub use graphics::Graphics;
