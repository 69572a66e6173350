// Render targets - render passes and the framebuffers that bind them
//
// Two construction paths: the fixed two-attachment back-buffer pass used
// for presentation, and a generic offscreen pass with an arbitrary color
// attachment count, optional depth/stencil, and multisample resolve.

use anyhow::{bail, Context, Result};
use ash::vk;

use super::buffer::find_memory_type;
use super::format::{to_vk_format, to_vk_samples, PixelFormat, TextureUsage};
use super::texture::{Texture, TextureType};
use super::VulkanDevice;

/// Depth/stencil formats in preference order; the first one the device can
/// serve as an optimal-tiling attachment wins.
const DEPTH_STENCIL_FORMATS: [vk::Format; 5] = [
    vk::Format::D32_SFLOAT_S8_UINT,
    vk::Format::D32_SFLOAT,
    vk::Format::D24_UNORM_S8_UINT,
    vk::Format::D16_UNORM_S8_UINT,
    vk::Format::D16_UNORM,
];

pub fn select_depth_stencil_format(device: &VulkanDevice) -> Result<vk::Format> {
    for &format in DEPTH_STENCIL_FORMATS.iter() {
        let props = unsafe {
            device
                .instance
                .get_physical_device_format_properties(device.physical_device, format)
        };
        if props
            .optimal_tiling_features
            .contains(vk::FormatFeatureFlags::DEPTH_STENCIL_ATTACHMENT)
        {
            return Ok(format);
        }
    }
    bail!("No supported depth/stencil format found");
}

/// The shared depth/stencil image backing the default back-buffer pass.
/// Sized to the current surface extent; rebuilt on resize.
pub struct DepthStencilTarget {
    pub format: vk::Format,
    pub extent: vk::Extent2D,
    pub image: vk::Image,
    pub memory: vk::DeviceMemory,
    pub view: vk::ImageView,
}

impl DepthStencilTarget {
    pub fn new(device: &VulkanDevice, width: u32, height: u32) -> Result<Self> {
        let format = select_depth_stencil_format(device)?;
        log::debug!("Depth/stencil format: {:?}", format);

        let image_info = vk::ImageCreateInfo::builder()
            .image_type(vk::ImageType::TYPE_2D)
            .format(format)
            .extent(vk::Extent3D {
                width,
                height,
                depth: 1,
            })
            .mip_levels(1)
            .array_layers(1)
            .samples(vk::SampleCountFlags::TYPE_1)
            .tiling(vk::ImageTiling::OPTIMAL)
            .usage(vk::ImageUsageFlags::DEPTH_STENCIL_ATTACHMENT)
            .sharing_mode(vk::SharingMode::EXCLUSIVE)
            .initial_layout(vk::ImageLayout::UNDEFINED);

        let image = unsafe { device.device.create_image(&image_info, None) }
            .context("Failed to create depth/stencil image")?;

        let mem_requirements = unsafe { device.device.get_image_memory_requirements(image) };
        let memory_type_index = find_memory_type(
            &device.memory_properties,
            mem_requirements.memory_type_bits,
            vk::MemoryPropertyFlags::empty(),
        )
        .context("Failed to find compatible memory for depth/stencil buffer")?;

        let alloc_info = vk::MemoryAllocateInfo::builder()
            .allocation_size(mem_requirements.size)
            .memory_type_index(memory_type_index);

        let memory = unsafe { device.device.allocate_memory(&alloc_info, None) }
            .context("Failed to allocate depth/stencil memory")?;
        unsafe { device.device.bind_image_memory(image, memory, 0) }
            .context("Failed to bind depth/stencil memory")?;

        let view_info = vk::ImageViewCreateInfo::builder()
            .image(image)
            .view_type(vk::ImageViewType::TYPE_2D)
            .format(format)
            .components(vk::ComponentMapping {
                r: vk::ComponentSwizzle::R,
                g: vk::ComponentSwizzle::G,
                b: vk::ComponentSwizzle::B,
                a: vk::ComponentSwizzle::A,
            })
            .subresource_range(vk::ImageSubresourceRange {
                aspect_mask: vk::ImageAspectFlags::DEPTH,
                base_mip_level: 0,
                level_count: 1,
                base_array_layer: 0,
                layer_count: 1,
            });

        let view = unsafe { device.device.create_image_view(&view_info, None) }
            .context("Failed to create depth/stencil view")?;

        Ok(Self {
            format,
            extent: vk::Extent2D { width, height },
            image,
            memory,
            view,
        })
    }

    pub(crate) fn destroy(&mut self, device: &ash::Device) {
        unsafe {
            device.destroy_image_view(self.view, None);
            device.destroy_image(self.image, None);
            device.free_memory(self.memory, None);
        }
        self.view = vk::ImageView::null();
        self.image = vk::Image::null();
        self.memory = vk::DeviceMemory::null();
    }
}

/// The default presentation path: one render pass over color + depth, and
/// one framebuffer per back buffer. Framebuffer count always equals the
/// back-buffer count.
pub struct BackBufferTargets {
    pub render_pass: vk::RenderPass,
    pub framebuffers: Vec<vk::Framebuffer>,
}

impl BackBufferTargets {
    pub fn new(
        device: &VulkanDevice,
        color_format: vk::Format,
        depth_stencil_format: vk::Format,
        back_buffer_views: &[vk::ImageView],
        depth_stencil_view: vk::ImageView,
        width: u32,
        height: u32,
    ) -> Result<Self> {
        let render_pass = Self::create_render_pass(device, color_format, depth_stencil_format)?;

        let framebuffers = back_buffer_views
            .iter()
            .map(|&view| {
                let attachments = [view, depth_stencil_view];
                let framebuffer_info = vk::FramebufferCreateInfo::builder()
                    .render_pass(render_pass)
                    .attachments(&attachments)
                    .width(width)
                    .height(height)
                    .layers(1);

                unsafe { device.device.create_framebuffer(&framebuffer_info, None) }
                    .context("Failed to create back-buffer framebuffer")
            })
            .collect::<Result<Vec<_>>>()?;

        Ok(Self {
            render_pass,
            framebuffers,
        })
    }

    fn create_render_pass(
        device: &VulkanDevice,
        color_format: vk::Format,
        depth_stencil_format: vk::Format,
    ) -> Result<vk::RenderPass> {
        let attachments = [
            // Color: cleared, stored, presented
            vk::AttachmentDescription::builder()
                .format(color_format)
                .samples(vk::SampleCountFlags::TYPE_1)
                .load_op(vk::AttachmentLoadOp::CLEAR)
                .store_op(vk::AttachmentStoreOp::STORE)
                .stencil_load_op(vk::AttachmentLoadOp::DONT_CARE)
                .stencil_store_op(vk::AttachmentStoreOp::DONT_CARE)
                .initial_layout(vk::ImageLayout::UNDEFINED)
                .final_layout(vk::ImageLayout::PRESENT_SRC_KHR)
                .build(),
            // Depth/stencil: cleared, not stored
            vk::AttachmentDescription::builder()
                .format(depth_stencil_format)
                .samples(vk::SampleCountFlags::TYPE_1)
                .load_op(vk::AttachmentLoadOp::CLEAR)
                .store_op(vk::AttachmentStoreOp::DONT_CARE)
                .stencil_load_op(vk::AttachmentLoadOp::DONT_CARE)
                .stencil_store_op(vk::AttachmentStoreOp::DONT_CARE)
                .initial_layout(vk::ImageLayout::UNDEFINED)
                .final_layout(vk::ImageLayout::DEPTH_STENCIL_ATTACHMENT_OPTIMAL)
                .build(),
        ];

        let color_reference = [vk::AttachmentReference {
            attachment: 0,
            layout: vk::ImageLayout::COLOR_ATTACHMENT_OPTIMAL,
        }];
        let depth_stencil_reference = vk::AttachmentReference {
            attachment: 1,
            layout: vk::ImageLayout::DEPTH_STENCIL_ATTACHMENT_OPTIMAL,
        };

        let subpass = vk::SubpassDescription::builder()
            .pipeline_bind_point(vk::PipelineBindPoint::GRAPHICS)
            .color_attachments(&color_reference)
            .depth_stencil_attachment(&depth_stencil_reference)
            .build();

        // Bracket the pass: gate attachment writes behind prior external
        // reads, and external reads behind the attachment writes
        let dependencies = [
            vk::SubpassDependency::builder()
                .src_subpass(vk::SUBPASS_EXTERNAL)
                .dst_subpass(0)
                .src_stage_mask(vk::PipelineStageFlags::BOTTOM_OF_PIPE)
                .dst_stage_mask(vk::PipelineStageFlags::COLOR_ATTACHMENT_OUTPUT)
                .src_access_mask(vk::AccessFlags::MEMORY_READ)
                .dst_access_mask(
                    vk::AccessFlags::COLOR_ATTACHMENT_READ | vk::AccessFlags::COLOR_ATTACHMENT_WRITE,
                )
                .dependency_flags(vk::DependencyFlags::BY_REGION)
                .build(),
            vk::SubpassDependency::builder()
                .src_subpass(0)
                .dst_subpass(vk::SUBPASS_EXTERNAL)
                .src_stage_mask(vk::PipelineStageFlags::COLOR_ATTACHMENT_OUTPUT)
                .dst_stage_mask(vk::PipelineStageFlags::BOTTOM_OF_PIPE)
                .src_access_mask(
                    vk::AccessFlags::COLOR_ATTACHMENT_READ | vk::AccessFlags::COLOR_ATTACHMENT_WRITE,
                )
                .dst_access_mask(vk::AccessFlags::MEMORY_READ)
                .dependency_flags(vk::DependencyFlags::BY_REGION)
                .build(),
        ];

        let subpasses = [subpass];
        let render_pass_info = vk::RenderPassCreateInfo::builder()
            .attachments(&attachments)
            .subpasses(&subpasses)
            .dependencies(&dependencies);

        unsafe { device.device.create_render_pass(&render_pass_info, None) }
            .context("Failed to create back-buffer render pass")
    }

    pub(crate) fn destroy(&mut self, device: &ash::Device) {
        unsafe {
            for &framebuffer in &self.framebuffers {
                device.destroy_framebuffer(framebuffer, None);
            }
            device.destroy_render_pass(self.render_pass, None);
        }
        self.framebuffers.clear();
        self.render_pass = vk::RenderPass::null();
    }
}

/// Total native attachment count for the generic path: multisampling
/// doubles every logical color attachment (resolve + multisample pair) and
/// a depth/stencil attachment occupies one more slot.
pub(crate) fn attachment_count(
    color_attachment_count: u32,
    sample_count: u32,
    has_depth_stencil: bool,
) -> u32 {
    let mut count = if sample_count > 1 {
        2 * color_attachment_count
    } else {
        color_attachment_count
    };
    if has_depth_stencil {
        count += 1;
    }
    count
}

/// An offscreen render target: render pass, owned attachment textures, and
/// the framebuffer binding their views.
pub struct RenderTarget {
    pub width: u32,
    pub height: u32,
    pub color_attachment_count: u32,
    pub color_format: PixelFormat,
    pub depth_stencil_format: PixelFormat,
    pub sample_count: u32,
    pub render_pass: vk::RenderPass,
    pub framebuffer: vk::Framebuffer,
    pub color_attachments: Vec<Texture>,
    pub color_multisample_attachments: Vec<Texture>,
    pub depth_stencil_attachment: Option<Texture>,
}

impl RenderTarget {
    pub fn new(
        device: &VulkanDevice,
        width: u32,
        height: u32,
        color_attachment_count: u32,
        color_format: PixelFormat,
        depth_stencil_format: PixelFormat,
        sample_count: u32,
    ) -> Result<Self> {
        let has_depth_stencil = depth_stencil_format != PixelFormat::Undefined;
        let multisampled = sample_count > 1;

        let render_pass = Self::create_render_pass(
            device,
            color_attachment_count,
            color_format,
            depth_stencil_format,
            sample_count,
        )?;

        // Allocate the attachment textures and collect their views in
        // attachment-index order
        let mut color_attachments = Vec::with_capacity(color_attachment_count as usize);
        let mut color_multisample_attachments = Vec::new();
        let mut depth_stencil_attachment = None;
        let mut image_views = Vec::with_capacity(attachment_count(
            color_attachment_count,
            sample_count,
            has_depth_stencil,
        ) as usize);

        for _ in 0..color_attachment_count {
            let color = Texture::new(
                device,
                TextureType::D2,
                width,
                height,
                1,
                1,
                color_format,
                TextureUsage::COLOR_ATTACHMENT,
                1,
                false,
            )?;
            image_views.push(color.view);
            color_attachments.push(color);

            if multisampled {
                let multisample = Texture::new(
                    device,
                    TextureType::D2,
                    width,
                    height,
                    1,
                    1,
                    color_format,
                    TextureUsage::COLOR_ATTACHMENT,
                    sample_count,
                    false,
                )?;
                image_views.push(multisample.view);
                color_multisample_attachments.push(multisample);
            }
        }

        if has_depth_stencil {
            let depth_stencil = Texture::new(
                device,
                TextureType::D2,
                width,
                height,
                1,
                1,
                depth_stencil_format,
                TextureUsage::DEPTH_STENCIL_ATTACHMENT,
                sample_count,
                false,
            )?;
            image_views.push(depth_stencil.view);
            depth_stencil_attachment = Some(depth_stencil);
        }

        let framebuffer_info = vk::FramebufferCreateInfo::builder()
            .render_pass(render_pass)
            .attachments(&image_views)
            .width(width)
            .height(height)
            .layers(1);

        let framebuffer = unsafe { device.device.create_framebuffer(&framebuffer_info, None) }
            .context("Failed to create render target framebuffer")?;

        Ok(Self {
            width,
            height,
            color_attachment_count,
            color_format,
            depth_stencil_format,
            sample_count,
            render_pass,
            framebuffer,
            color_attachments,
            color_multisample_attachments,
            depth_stencil_attachment,
        })
    }

    fn create_render_pass(
        device: &VulkanDevice,
        color_attachment_count: u32,
        color_format: PixelFormat,
        depth_stencil_format: PixelFormat,
        sample_count: u32,
    ) -> Result<vk::RenderPass> {
        let has_depth_stencil = depth_stencil_format != PixelFormat::Undefined;
        let multisampled = sample_count > 1;
        let vk_color_format = to_vk_format(color_format);
        let vk_samples = to_vk_samples(sample_count);

        let mut attachments = Vec::with_capacity(attachment_count(
            color_attachment_count,
            sample_count,
            has_depth_stencil,
        ) as usize);
        let mut color_references = Vec::with_capacity(color_attachment_count as usize);
        let mut resolve_references = Vec::new();
        let mut depth_stencil_reference = None;

        let color_attachment = |samples: vk::SampleCountFlags| {
            vk::AttachmentDescription::builder()
                .format(vk_color_format)
                .samples(samples)
                .load_op(vk::AttachmentLoadOp::CLEAR)
                .store_op(vk::AttachmentStoreOp::STORE)
                .stencil_load_op(vk::AttachmentLoadOp::CLEAR)
                .stencil_store_op(vk::AttachmentStoreOp::STORE)
                .initial_layout(vk::ImageLayout::COLOR_ATTACHMENT_OPTIMAL)
                .final_layout(vk::ImageLayout::COLOR_ATTACHMENT_OPTIMAL)
                .build()
        };

        if multisampled {
            // Each logical color attachment expands into a single-sample
            // resolve target (even index) and the multisample attachment the
            // subpass renders into (odd index)
            for i in 0..color_attachment_count {
                let resolve_index = 2 * i;
                let multisample_index = resolve_index + 1;
                attachments.push(color_attachment(vk::SampleCountFlags::TYPE_1));
                attachments.push(color_attachment(vk_samples));

                color_references.push(vk::AttachmentReference {
                    attachment: multisample_index,
                    layout: vk::ImageLayout::COLOR_ATTACHMENT_OPTIMAL,
                });
                resolve_references.push(vk::AttachmentReference {
                    attachment: resolve_index,
                    layout: vk::ImageLayout::COLOR_ATTACHMENT_OPTIMAL,
                });
            }
        } else {
            for i in 0..color_attachment_count {
                attachments.push(color_attachment(vk::SampleCountFlags::TYPE_1));
                color_references.push(vk::AttachmentReference {
                    attachment: i,
                    layout: vk::ImageLayout::COLOR_ATTACHMENT_OPTIMAL,
                });
            }
        }

        if has_depth_stencil {
            let index = attachments.len() as u32;
            attachments.push(
                vk::AttachmentDescription::builder()
                    .format(to_vk_format(depth_stencil_format))
                    .samples(vk_samples)
                    .load_op(vk::AttachmentLoadOp::CLEAR)
                    .store_op(vk::AttachmentStoreOp::STORE)
                    .stencil_load_op(vk::AttachmentLoadOp::CLEAR)
                    .stencil_store_op(vk::AttachmentStoreOp::STORE)
                    .initial_layout(vk::ImageLayout::DEPTH_STENCIL_ATTACHMENT_OPTIMAL)
                    .final_layout(vk::ImageLayout::DEPTH_STENCIL_ATTACHMENT_OPTIMAL)
                    .build(),
            );
            depth_stencil_reference = Some(vk::AttachmentReference {
                attachment: index,
                layout: vk::ImageLayout::DEPTH_STENCIL_ATTACHMENT_OPTIMAL,
            });
        }

        let mut subpass = vk::SubpassDescription::builder()
            .pipeline_bind_point(vk::PipelineBindPoint::GRAPHICS)
            .color_attachments(&color_references);
        if multisampled {
            subpass = subpass.resolve_attachments(&resolve_references);
        }
        if let Some(ref reference) = depth_stencil_reference {
            subpass = subpass.depth_stencil_attachment(reference);
        }
        let subpasses = [subpass.build()];

        // Self-dependency so barriers may be issued within the subpass
        let dependencies = [vk::SubpassDependency::builder()
            .src_subpass(0)
            .dst_subpass(0)
            .src_stage_mask(vk::PipelineStageFlags::COLOR_ATTACHMENT_OUTPUT)
            .dst_stage_mask(vk::PipelineStageFlags::COLOR_ATTACHMENT_OUTPUT)
            .src_access_mask(vk::AccessFlags::COLOR_ATTACHMENT_WRITE)
            .dst_access_mask(vk::AccessFlags::COLOR_ATTACHMENT_WRITE)
            .dependency_flags(vk::DependencyFlags::BY_REGION)
            .build()];

        let render_pass_info = vk::RenderPassCreateInfo::builder()
            .attachments(&attachments)
            .subpasses(&subpasses)
            .dependencies(&dependencies);

        unsafe { device.device.create_render_pass(&render_pass_info, None) }
            .context("Failed to create render target render pass")
    }

    pub(crate) fn destroy(&mut self, device: &ash::Device) {
        unsafe {
            device.destroy_framebuffer(self.framebuffer, None);
            device.destroy_render_pass(self.render_pass, None);
        }
        self.framebuffer = vk::Framebuffer::null();
        self.render_pass = vk::RenderPass::null();
        for texture in &mut self.color_attachments {
            texture.destroy(device);
        }
        for texture in &mut self.color_multisample_attachments {
            texture.destroy(device);
        }
        if let Some(ref mut texture) = self.depth_stencil_attachment {
            texture.destroy(device);
        }
        self.color_attachments.clear();
        self.color_multisample_attachments.clear();
        self.depth_stencil_attachment = None;
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn multisampling_doubles_color_attachments() {
        // 1 color * 4x samples + depth/stencil = 2*1 + 1 = 3
        assert_eq!(attachment_count(1, 4, true), 3);
        assert_eq!(attachment_count(2, 4, true), 5);
        assert_eq!(attachment_count(2, 8, false), 4);
    }

    #[test]
    fn single_sample_keeps_one_attachment_per_color() {
        assert_eq!(attachment_count(1, 1, false), 1);
        assert_eq!(attachment_count(1, 1, true), 2);
        assert_eq!(attachment_count(3, 1, true), 4);
    }

    #[test]
    fn depth_formats_are_ordered_most_capable_first() {
        assert_eq!(DEPTH_STENCIL_FORMATS[0], vk::Format::D32_SFLOAT_S8_UINT);
        assert_eq!(
            DEPTH_STENCIL_FORMATS[DEPTH_STENCIL_FORMATS.len() - 1],
            vk::Format::D16_UNORM
        );
    }
}
