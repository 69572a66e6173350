// Backend-agnostic graphics contract
//
// Every hardware backend implements this trait; the Vulkan context is one
// implementor. The device/resource/swapchain substrate is fully functional;
// the command-recording facade is part of the contract but is the
// responsibility of a separate layer.

use anyhow::Result;
use raw_window_handle::{RawDisplayHandle, RawWindowHandle};

use crate::backend::{BufferUsage, IndexFormat, PixelFormat, TextureUsage};

pub trait Graphics {
    type Buffer;
    type Texture;
    type RenderTarget;
    type Shader;
    type CommandBuffer;
    type RenderPipeline;
    type DescriptorSet;
    type Semaphore;
    type Fence;

    // ------------------------------------------------------------------
    // Lifecycle
    // ------------------------------------------------------------------

    /// Bring up the device, surface, swapchain, render targets, and frame
    /// pacing. A no-op when already initialized.
    fn initialize(
        &mut self,
        display_handle: RawDisplayHandle,
        window_handle: RawWindowHandle,
    ) -> Result<()>;

    fn is_initialized(&self) -> bool;

    /// Rebuild the extent-dependent resources for a new surface size.
    /// A no-op unless a prior resize completed (or initialization armed
    /// the flag).
    fn resize(&mut self, width: u32, height: u32) -> Result<()>;

    fn is_resized(&self) -> bool;

    fn width(&self) -> u32;
    fn height(&self) -> u32;

    // ------------------------------------------------------------------
    // Resources
    // ------------------------------------------------------------------

    fn create_buffer(
        &mut self,
        usage: BufferUsage,
        size: u64,
        stride: u64,
        host_visible: bool,
    ) -> Result<Self::Buffer>;

    fn create_vertex_buffer(
        &mut self,
        size: u64,
        vertex_stride: u64,
        host_visible: bool,
    ) -> Result<Self::Buffer>;

    fn create_index_buffer(
        &mut self,
        size: u64,
        index_format: IndexFormat,
        host_visible: bool,
    ) -> Result<Self::Buffer>;

    fn create_uniform_buffer(&mut self, size: u64, host_visible: bool) -> Result<Self::Buffer>;

    fn destroy_buffer(&mut self, buffer: Self::Buffer);

    fn create_texture_1d(
        &mut self,
        width: u32,
        format: PixelFormat,
        usage: TextureUsage,
        sample_count: u32,
        host_visible: bool,
    ) -> Result<Self::Texture>;

    #[allow(clippy::too_many_arguments)]
    fn create_texture_2d(
        &mut self,
        width: u32,
        height: u32,
        mip_levels: u32,
        format: PixelFormat,
        usage: TextureUsage,
        sample_count: u32,
        host_visible: bool,
    ) -> Result<Self::Texture>;

    #[allow(clippy::too_many_arguments)]
    fn create_texture_3d(
        &mut self,
        width: u32,
        height: u32,
        depth: u32,
        format: PixelFormat,
        usage: TextureUsage,
        sample_count: u32,
        host_visible: bool,
    ) -> Result<Self::Texture>;

    fn destroy_texture(&mut self, texture: Self::Texture);

    #[allow(clippy::too_many_arguments)]
    fn create_render_target(
        &mut self,
        width: u32,
        height: u32,
        color_attachment_count: u32,
        color_format: PixelFormat,
        depth_stencil_format: PixelFormat,
        sample_count: u32,
    ) -> Result<Self::RenderTarget>;

    fn destroy_render_target(&mut self, render_target: Self::RenderTarget);

    /// Load a compiled shader by URL, resolved against the asset root.
    fn create_shader(&mut self, url: &str) -> Result<Self::Shader>;

    fn destroy_shader(&mut self, shader: Self::Shader);

    // ------------------------------------------------------------------
    // Command facade (contract only in this substrate)
    // ------------------------------------------------------------------

    fn create_command_buffer(&mut self) -> Option<Self::CommandBuffer>;
    fn destroy_command_buffer(&mut self, command_buffer: Self::CommandBuffer);

    fn create_semaphore(&mut self) -> Option<Self::Semaphore>;
    fn destroy_semaphore(&mut self, semaphore: Self::Semaphore);

    fn create_fence(&mut self) -> Option<Self::Fence>;
    fn destroy_fence(&mut self, fence: Self::Fence);

    fn acquire_next_image(&mut self, signal: &Self::Semaphore, fence: &Self::Fence);
    fn wait_for_fence(&mut self, fence: &Self::Fence);

    fn submit(
        &mut self,
        command_buffer: &Self::CommandBuffer,
        signal_semaphores: &[&Self::Semaphore],
        wait_semaphores: &[&Self::Semaphore],
    );

    fn present(&mut self, wait_semaphores: &[&Self::Semaphore]);

    fn cmd_begin(&mut self, command_buffer: &Self::CommandBuffer);
    fn cmd_end(&mut self, command_buffer: &Self::CommandBuffer);

    fn cmd_begin_render_pass(&mut self, command_buffer: &Self::CommandBuffer);
    fn cmd_end_render_pass(&mut self, command_buffer: &Self::CommandBuffer);

    #[allow(clippy::too_many_arguments)]
    fn cmd_set_viewport(
        &mut self,
        command_buffer: &Self::CommandBuffer,
        x: f32,
        y: f32,
        width: f32,
        height: f32,
        depth_min: f32,
        depth_max: f32,
    );

    fn cmd_set_scissor(
        &mut self,
        command_buffer: &Self::CommandBuffer,
        x: i32,
        y: i32,
        width: u32,
        height: u32,
    );

    fn cmd_clear_color_attachment(
        &mut self,
        command_buffer: &Self::CommandBuffer,
        attachment_index: u32,
        clear_value: [f32; 4],
    );

    fn cmd_bind_render_pipeline(
        &mut self,
        command_buffer: &Self::CommandBuffer,
        pipeline: &Self::RenderPipeline,
    );

    fn cmd_bind_descriptor_set(
        &mut self,
        command_buffer: &Self::CommandBuffer,
        pipeline: &Self::RenderPipeline,
        descriptor_set: &Self::DescriptorSet,
    );

    fn cmd_bind_vertex_buffers(
        &mut self,
        command_buffer: &Self::CommandBuffer,
        vertex_buffers: &[&Self::Buffer],
    );

    fn cmd_bind_index_buffer(
        &mut self,
        command_buffer: &Self::CommandBuffer,
        index_buffer: &Self::Buffer,
    );

    fn cmd_draw(&mut self, command_buffer: &Self::CommandBuffer, vertex_count: u32, vertex_start: u32);

    fn cmd_draw_indexed(
        &mut self,
        command_buffer: &Self::CommandBuffer,
        index_count: u32,
        index_start: u32,
    );

    fn cmd_transition_image(
        &mut self,
        command_buffer: &Self::CommandBuffer,
        texture: &Self::Texture,
        usage_prev: TextureUsage,
        usage_next: TextureUsage,
    );

    fn cmd_transition_render_pass(
        &mut self,
        command_buffer: &Self::CommandBuffer,
        render_target: &Self::RenderTarget,
        usage_prev: TextureUsage,
        usage_next: TextureUsage,
    );
}
