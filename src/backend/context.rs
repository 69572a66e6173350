// Vulkan graphics context - owner of the whole substrate
//
// Composes device, surface, swapchain, depth/stencil target, back-buffer
// render targets, command buffers, and frame pacing, and exposes the
// resource API. Teardown runs in reverse bring-up order.
//
// The command-recording facade is part of the public contract but lives in
// a separate layer; its entry points here are inert.

use anyhow::{Context as _, Result};
use ash::vk;
use raw_window_handle::{RawDisplayHandle, RawWindowHandle};
use std::sync::Arc;

use crate::assets;
use crate::config::Config;
use crate::graphics::Graphics;

use super::buffer::{Buffer, BufferUsage, IndexFormat};
use super::format::{PixelFormat, TextureUsage};
use super::render_target::{BackBufferTargets, DepthStencilTarget, RenderTarget};
use super::shader::Shader;
use super::swapchain::{create_surface, find_present_queue_family, Swapchain};
use super::sync::{allocate_command_buffers, create_command_pool, FrameSync};
use super::texture::{Texture, TextureType};
use super::VulkanDevice;

/// A recorded-command handle. Recording belongs to the command facade.
pub struct CommandBuffer {
    pub command_buffer: vk::CommandBuffer,
}

pub struct Semaphore {
    pub semaphore: vk::Semaphore,
}

pub struct Fence {
    pub fence: vk::Fence,
}

/// Owned by the pipeline layer built on top of this substrate.
pub struct RenderPipeline {
    pub pipeline: vk::Pipeline,
}

/// Owned by the descriptor layer built on top of this substrate.
pub struct DescriptorSet {
    pub descriptor_set: vk::DescriptorSet,
}

/// The Vulkan implementation of the [`Graphics`] contract.
pub struct VulkanContext {
    // Configuration bundle, fixed at construction
    title: String,
    width: u32,
    height: u32,
    fullscreen: bool,
    vsync: bool,
    multisampling: u32,
    validation: bool,

    initialized: bool,
    resized: bool,

    // Substrate state, populated by initialize()
    device: Option<Arc<VulkanDevice>>,
    surface: vk::SurfaceKHR,
    surface_loader: Option<ash::extensions::khr::Surface>,
    present_queue_family: u32,
    swapchain: Option<Swapchain>,
    command_pool: vk::CommandPool,
    command_buffers: Vec<vk::CommandBuffer>,
    depth_stencil: Option<DepthStencilTarget>,
    back_buffer_targets: Option<BackBufferTargets>,
    sync: Option<FrameSync>,
}

impl VulkanContext {
    pub fn new(config: &Config) -> Self {
        Self {
            title: config.window.title.clone(),
            width: config.window.width,
            height: config.window.height,
            fullscreen: config.window.fullscreen,
            vsync: config.graphics.vsync,
            multisampling: config.graphics.multisampling,
            validation: config.debug.validation,
            initialized: false,
            resized: false,
            device: None,
            surface: vk::SurfaceKHR::null(),
            surface_loader: None,
            present_queue_family: 0,
            swapchain: None,
            command_pool: vk::CommandPool::null(),
            command_buffers: Vec::new(),
            depth_stencil: None,
            back_buffer_targets: None,
            sync: None,
        }
    }

    pub fn fullscreen(&self) -> bool {
        self.fullscreen
    }

    pub fn multisampling(&self) -> u32 {
        self.multisampling
    }

    /// Number of back buffers in the current swapchain.
    pub fn back_buffer_count(&self) -> u32 {
        self.swapchain
            .as_ref()
            .map(|swapchain| swapchain.back_buffer_count())
            .unwrap_or(0)
    }

    /// Framebuffer count of the default presentation path.
    pub fn framebuffer_count(&self) -> usize {
        self.back_buffer_targets
            .as_ref()
            .map(|targets| targets.framebuffers.len())
            .unwrap_or(0)
    }

    pub fn graphics_queue_family(&self) -> Option<u32> {
        self.device.as_ref().map(|device| device.graphics_queue_family)
    }

    pub fn present_queue_family(&self) -> Option<u32> {
        self.device.as_ref().map(|_| self.present_queue_family)
    }

    fn device(&self) -> Result<&Arc<VulkanDevice>> {
        self.device.as_ref().context("Graphics context not initialized")
    }
}

impl Graphics for VulkanContext {
    type Buffer = Buffer;
    type Texture = Texture;
    type RenderTarget = RenderTarget;
    type Shader = Shader;
    type CommandBuffer = CommandBuffer;
    type RenderPipeline = RenderPipeline;
    type DescriptorSet = DescriptorSet;
    type Semaphore = Semaphore;
    type Fence = Fence;

    fn initialize(
        &mut self,
        display_handle: RawDisplayHandle,
        window_handle: RawWindowHandle,
    ) -> Result<()> {
        if self.initialized {
            return Ok(());
        }

        log::info!(
            "Initializing graphics: {}x{}, vsync {}, {}x MSAA",
            self.width,
            self.height,
            self.vsync,
            self.multisampling
        );

        // State is stored as it is created so a failed bring-up still tears
        // down in reverse order on drop
        let device = VulkanDevice::new(&self.title, display_handle, self.validation)?;
        self.device = Some(device.clone());

        let (surface, surface_loader) = create_surface(&device, display_handle, window_handle)?;
        self.surface = surface;
        self.present_queue_family = find_present_queue_family(&device, &surface_loader, surface)?;
        self.surface_loader = Some(surface_loader);
        self.command_pool = create_command_pool(&device)?;

        let swapchain = Swapchain::new(
            device.clone(),
            surface,
            self.surface_loader.as_ref().context("Surface loader missing")?,
            self.width,
            self.height,
            self.vsync,
        )?;

        self.command_buffers =
            allocate_command_buffers(&device, self.command_pool, swapchain.back_buffer_count())?;

        let depth_stencil = DepthStencilTarget::new(&device, self.width, self.height)?;

        let back_buffer_targets = BackBufferTargets::new(
            &device,
            swapchain.format,
            depth_stencil.format,
            &swapchain.image_views,
            depth_stencil.view,
            self.width,
            self.height,
        )?;

        let sync = FrameSync::new(&device, self.command_buffers.len())?;

        self.swapchain = Some(swapchain);
        self.depth_stencil = Some(depth_stencil);
        self.back_buffer_targets = Some(back_buffer_targets);
        self.sync = Some(sync);

        self.initialized = true;
        self.resized = true;

        log::info!("Graphics initialized");
        Ok(())
    }

    fn is_initialized(&self) -> bool {
        self.initialized
    }

    fn resize(&mut self, width: u32, height: u32) -> Result<()> {
        if !self.resized {
            return Ok(());
        }
        self.resized = false;

        log::info!("Resizing graphics: {}x{}", width, height);

        let device = self.device()?.clone();
        let surface_loader = self
            .surface_loader
            .as_ref()
            .context("Surface not initialized")?;

        // Nothing may be in flight while the extent-dependent resources
        // are torn down
        device.wait_idle()?;

        self.width = width;
        self.height = height;

        // Depth/stencil target
        if let Some(ref mut depth_stencil) = self.depth_stencil {
            depth_stencil.destroy(&device.device);
        }
        self.depth_stencil = Some(DepthStencilTarget::new(&device, width, height)?);

        // Render pass + framebuffers go away before the swapchain they bind
        if let Some(ref mut targets) = self.back_buffer_targets {
            targets.destroy(&device.device);
        }
        self.back_buffer_targets = None;

        // Swapchain, passing the old handle as a recreation hint
        let swapchain = match self.swapchain.take() {
            Some(old) => Swapchain::recreate(
                old,
                self.surface,
                surface_loader,
                width,
                height,
                self.vsync,
            )?,
            None => Swapchain::new(
                device.clone(),
                self.surface,
                surface_loader,
                width,
                height,
                self.vsync,
            )?,
        };

        // Rebuild the presentation path against the new back-buffer views
        let depth_stencil = self
            .depth_stencil
            .as_ref()
            .context("Depth/stencil target missing")?;
        self.back_buffer_targets = Some(BackBufferTargets::new(
            &device,
            swapchain.format,
            depth_stencil.format,
            &swapchain.image_views,
            depth_stencil.view,
            width,
            height,
        )?);

        // Command buffers, one per back buffer
        if !self.command_buffers.is_empty() {
            unsafe {
                device
                    .device
                    .free_command_buffers(self.command_pool, &self.command_buffers);
            }
        }
        self.command_buffers =
            allocate_command_buffers(&device, self.command_pool, swapchain.back_buffer_count())?;

        // Keep one fence per command buffer; the semaphores live on
        if let Some(ref mut sync) = self.sync {
            if sync.fences.len() != self.command_buffers.len() {
                unsafe {
                    for &fence in &sync.fences {
                        device.device.destroy_fence(fence, None);
                    }
                }
                let fence_info =
                    vk::FenceCreateInfo::builder().flags(vk::FenceCreateFlags::SIGNALED);
                sync.fences = (0..self.command_buffers.len())
                    .map(|_| {
                        unsafe { device.device.create_fence(&fence_info, None) }
                            .context("Failed to create frame fence")
                    })
                    .collect::<Result<Vec<_>>>()?;
            }
        }

        self.swapchain = Some(swapchain);

        device.wait_idle()?;
        self.resized = true;
        Ok(())
    }

    fn is_resized(&self) -> bool {
        self.resized
    }

    fn width(&self) -> u32 {
        self.width
    }

    fn height(&self) -> u32 {
        self.height
    }

    fn create_buffer(
        &mut self,
        usage: BufferUsage,
        size: u64,
        stride: u64,
        host_visible: bool,
    ) -> Result<Buffer> {
        Buffer::new(self.device()?, usage, size, stride, host_visible)
    }

    fn create_vertex_buffer(
        &mut self,
        size: u64,
        vertex_stride: u64,
        host_visible: bool,
    ) -> Result<Buffer> {
        self.create_buffer(BufferUsage::Vertex, size, vertex_stride, host_visible)
    }

    fn create_index_buffer(
        &mut self,
        size: u64,
        index_format: IndexFormat,
        host_visible: bool,
    ) -> Result<Buffer> {
        self.create_buffer(BufferUsage::Index, size, index_format.stride(), host_visible)
    }

    fn create_uniform_buffer(&mut self, size: u64, host_visible: bool) -> Result<Buffer> {
        self.create_buffer(BufferUsage::Uniform, size, size, host_visible)
    }

    fn destroy_buffer(&mut self, mut buffer: Buffer) {
        if let Some(ref device) = self.device {
            buffer.destroy(&device.device);
        }
    }

    fn create_texture_1d(
        &mut self,
        width: u32,
        format: PixelFormat,
        usage: TextureUsage,
        sample_count: u32,
        host_visible: bool,
    ) -> Result<Texture> {
        Texture::new(
            self.device()?,
            TextureType::D1,
            width,
            1,
            1,
            1,
            format,
            usage,
            sample_count,
            host_visible,
        )
    }

    fn create_texture_2d(
        &mut self,
        width: u32,
        height: u32,
        mip_levels: u32,
        format: PixelFormat,
        usage: TextureUsage,
        sample_count: u32,
        host_visible: bool,
    ) -> Result<Texture> {
        Texture::new(
            self.device()?,
            TextureType::D2,
            width,
            height,
            1,
            mip_levels,
            format,
            usage,
            sample_count,
            host_visible,
        )
    }

    fn create_texture_3d(
        &mut self,
        width: u32,
        height: u32,
        depth: u32,
        format: PixelFormat,
        usage: TextureUsage,
        sample_count: u32,
        host_visible: bool,
    ) -> Result<Texture> {
        Texture::new(
            self.device()?,
            TextureType::D3,
            width,
            height,
            depth,
            1,
            format,
            usage,
            sample_count,
            host_visible,
        )
    }

    fn destroy_texture(&mut self, mut texture: Texture) {
        if let Some(ref device) = self.device {
            texture.destroy(&device.device);
        }
    }

    fn create_render_target(
        &mut self,
        width: u32,
        height: u32,
        color_attachment_count: u32,
        color_format: PixelFormat,
        depth_stencil_format: PixelFormat,
        sample_count: u32,
    ) -> Result<RenderTarget> {
        RenderTarget::new(
            self.device()?,
            width,
            height,
            color_attachment_count,
            color_format,
            depth_stencil_format,
            sample_count,
        )
    }

    fn destroy_render_target(&mut self, mut render_target: RenderTarget) {
        if let Some(ref device) = self.device {
            render_target.destroy(&device.device);
        }
    }

    fn create_shader(&mut self, url: &str) -> Result<Shader> {
        let bytes = assets::read_shader(url)?;
        Shader::new(self.device()?, &bytes)
    }

    fn destroy_shader(&mut self, mut shader: Shader) {
        if let Some(ref device) = self.device {
            shader.destroy(&device.device);
        }
    }

    // ------------------------------------------------------------------
    // Command facade - contract only; recording lives in a separate layer
    // ------------------------------------------------------------------

    fn create_command_buffer(&mut self) -> Option<CommandBuffer> {
        None
    }

    fn destroy_command_buffer(&mut self, _command_buffer: CommandBuffer) {}

    fn create_semaphore(&mut self) -> Option<Semaphore> {
        None
    }

    fn destroy_semaphore(&mut self, _semaphore: Semaphore) {}

    fn create_fence(&mut self) -> Option<Fence> {
        None
    }

    fn destroy_fence(&mut self, _fence: Fence) {}

    fn acquire_next_image(&mut self, _signal: &Semaphore, _fence: &Fence) {}

    fn wait_for_fence(&mut self, _fence: &Fence) {}

    fn submit(
        &mut self,
        _command_buffer: &CommandBuffer,
        _signal_semaphores: &[&Semaphore],
        _wait_semaphores: &[&Semaphore],
    ) {
    }

    fn present(&mut self, _wait_semaphores: &[&Semaphore]) {}

    fn cmd_begin(&mut self, _command_buffer: &CommandBuffer) {}

    fn cmd_end(&mut self, _command_buffer: &CommandBuffer) {}

    fn cmd_begin_render_pass(&mut self, _command_buffer: &CommandBuffer) {}

    fn cmd_end_render_pass(&mut self, _command_buffer: &CommandBuffer) {}

    fn cmd_set_viewport(
        &mut self,
        _command_buffer: &CommandBuffer,
        _x: f32,
        _y: f32,
        _width: f32,
        _height: f32,
        _depth_min: f32,
        _depth_max: f32,
    ) {
    }

    fn cmd_set_scissor(
        &mut self,
        _command_buffer: &CommandBuffer,
        _x: i32,
        _y: i32,
        _width: u32,
        _height: u32,
    ) {
    }

    fn cmd_clear_color_attachment(
        &mut self,
        _command_buffer: &CommandBuffer,
        _attachment_index: u32,
        _clear_value: [f32; 4],
    ) {
    }

    fn cmd_bind_render_pipeline(
        &mut self,
        _command_buffer: &CommandBuffer,
        _pipeline: &RenderPipeline,
    ) {
    }

    fn cmd_bind_descriptor_set(
        &mut self,
        _command_buffer: &CommandBuffer,
        _pipeline: &RenderPipeline,
        _descriptor_set: &DescriptorSet,
    ) {
    }

    fn cmd_bind_vertex_buffers(&mut self, _command_buffer: &CommandBuffer, _vertex_buffers: &[&Buffer]) {
    }

    fn cmd_bind_index_buffer(&mut self, _command_buffer: &CommandBuffer, _index_buffer: &Buffer) {}

    fn cmd_draw(&mut self, _command_buffer: &CommandBuffer, _vertex_count: u32, _vertex_start: u32) {}

    fn cmd_draw_indexed(
        &mut self,
        _command_buffer: &CommandBuffer,
        _index_count: u32,
        _index_start: u32,
    ) {
    }

    fn cmd_transition_image(
        &mut self,
        _command_buffer: &CommandBuffer,
        _texture: &Texture,
        _usage_prev: TextureUsage,
        _usage_next: TextureUsage,
    ) {
    }

    fn cmd_transition_render_pass(
        &mut self,
        _command_buffer: &CommandBuffer,
        _render_target: &RenderTarget,
        _usage_prev: TextureUsage,
        _usage_next: TextureUsage,
    ) {
    }
}

impl Drop for VulkanContext {
    fn drop(&mut self) {
        let Some(device) = self.device.clone() else {
            return;
        };

        log::info!("Cleaning up graphics resources...");
        let _ = device.wait_idle();

        unsafe {
            // Reverse order of creation
            if let Some(ref mut sync) = self.sync {
                sync.destroy(&device.device);
            }
            if !self.command_buffers.is_empty() {
                device
                    .device
                    .free_command_buffers(self.command_pool, &self.command_buffers);
                self.command_buffers.clear();
            }
            if self.command_pool != vk::CommandPool::null() {
                device.device.destroy_command_pool(self.command_pool, None);
                self.command_pool = vk::CommandPool::null();
            }
            if let Some(ref mut targets) = self.back_buffer_targets {
                targets.destroy(&device.device);
            }
            if let Some(ref mut depth_stencil) = self.depth_stencil {
                depth_stencil.destroy(&device.device);
            }
            // Back-buffer views, then the swapchain itself
            self.swapchain = None;
            // Surface precedes the instance the device owner is holding
            if self.surface != vk::SurfaceKHR::null() {
                if let Some(ref surface_loader) = self.surface_loader {
                    surface_loader.destroy_surface(self.surface, None);
                }
                self.surface = vk::SurfaceKHR::null();
            }
        }

        self.device = None;
        log::info!("Cleanup complete");
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn resize_is_a_no_op_until_initialized() {
        let mut context = VulkanContext::new(&Config::default());
        assert!(!context.is_initialized());
        assert!(!context.is_resized());
        // The resize flag is not armed, so no device work is attempted
        context.resize(800, 600).unwrap();
        assert_eq!(context.width(), 1280);
        assert_eq!(context.height(), 720);
    }

    #[test]
    fn context_reflects_config_bundle() {
        let config: Config = toml::from_str(
            r#"
            [window]
            width = 640
            height = 480
            fullscreen = true

            [graphics]
            vsync = true
            multisampling = 8
            "#,
        )
        .unwrap();
        let context = VulkanContext::new(&config);
        assert_eq!(context.width(), 640);
        assert_eq!(context.height(), 480);
        assert!(context.fullscreen());
        assert_eq!(context.multisampling(), 8);
        assert_eq!(context.back_buffer_count(), 0);
        assert_eq!(context.framebuffer_count(), 0);
    }
}
