// Backend module - Vulkan abstraction layer
//
// Design: Thin wrapper around ash with safety and ergonomics
// Ownership: every resource owns exactly its own handle/memory/view triple

pub mod buffer;
pub mod context;
pub mod device;
pub mod format;
pub mod render_target;
pub mod shader;
pub mod swapchain;
pub mod sync;
pub mod texture;

pub use buffer::{Buffer, BufferUsage, IndexFormat};
pub use context::{CommandBuffer, DescriptorSet, Fence, RenderPipeline, Semaphore, VulkanContext};
pub use device::VulkanDevice;
pub use format::{PixelFormat, TextureUsage};
pub use render_target::{BackBufferTargets, DepthStencilTarget, RenderTarget};
pub use shader::Shader;
pub use swapchain::Swapchain;
pub use sync::FrameSync;
pub use texture::{Texture, TextureType};
