// Frame-pacing primitives
//
// Two semaphores order acquire -> submit -> present on the GPU timeline for
// the whole device lifetime; one pre-signaled fence per command buffer lets
// the host reuse a frame's command buffer only after the GPU is done with it.

use anyhow::{Context, Result};
use ash::vk;

use super::VulkanDevice;

pub struct FrameSync {
    pub present_complete: vk::Semaphore,
    pub render_complete: vk::Semaphore,
    /// One fence per command buffer, created signaled so the first frame
    /// does not block.
    pub fences: Vec<vk::Fence>,
}

impl FrameSync {
    pub fn new(device: &VulkanDevice, command_buffer_count: usize) -> Result<Self> {
        let semaphore_info = vk::SemaphoreCreateInfo::builder();
        let fence_info = vk::FenceCreateInfo::builder().flags(vk::FenceCreateFlags::SIGNALED);

        let present_complete =
            unsafe { device.device.create_semaphore(&semaphore_info, None) }
                .context("Failed to create present-complete semaphore")?;
        let render_complete =
            unsafe { device.device.create_semaphore(&semaphore_info, None) }
                .context("Failed to create render-complete semaphore")?;

        let fences = (0..command_buffer_count)
            .map(|_| {
                unsafe { device.device.create_fence(&fence_info, None) }
                    .context("Failed to create frame fence")
            })
            .collect::<Result<Vec<_>>>()?;

        Ok(Self {
            present_complete,
            render_complete,
            fences,
        })
    }

    pub fn destroy(&mut self, device: &ash::Device) {
        unsafe {
            for &fence in &self.fences {
                device.destroy_fence(fence, None);
            }
            device.destroy_semaphore(self.render_complete, None);
            device.destroy_semaphore(self.present_complete, None);
        }
        self.fences.clear();
        self.render_complete = vk::Semaphore::null();
        self.present_complete = vk::Semaphore::null();
    }
}

/// Create the reset-capable command pool on the graphics queue family.
pub fn create_command_pool(device: &VulkanDevice) -> Result<vk::CommandPool> {
    let pool_info = vk::CommandPoolCreateInfo::builder()
        .queue_family_index(device.graphics_queue_family)
        .flags(vk::CommandPoolCreateFlags::RESET_COMMAND_BUFFER);

    unsafe { device.device.create_command_pool(&pool_info, None) }
        .context("Failed to create command pool")
}

/// Allocate one primary command buffer per back buffer.
pub fn allocate_command_buffers(
    device: &VulkanDevice,
    command_pool: vk::CommandPool,
    count: u32,
) -> Result<Vec<vk::CommandBuffer>> {
    let alloc_info = vk::CommandBufferAllocateInfo::builder()
        .command_pool(command_pool)
        .level(vk::CommandBufferLevel::PRIMARY)
        .command_buffer_count(count);

    unsafe { device.device.allocate_command_buffers(&alloc_info) }
        .context("Failed to allocate command buffers")
}
