// Surface + swapchain - Window presentation
//
// Owns the chain of presentable back-buffer images and their views.
// Recreated wholesale on resize; the prior swapchain handle is passed to
// the driver as a reuse hint before it is destroyed.

use anyhow::{bail, Context, Result};
use ash::vk;
use raw_window_handle::{RawDisplayHandle, RawWindowHandle};
use std::sync::Arc;

use super::VulkanDevice;

/// Create the platform presentation surface from raw window handles.
pub fn create_surface(
    device: &VulkanDevice,
    display_handle: RawDisplayHandle,
    window_handle: RawWindowHandle,
) -> Result<(vk::SurfaceKHR, ash::extensions::khr::Surface)> {
    let surface_loader = ash::extensions::khr::Surface::new(device.entry(), &device.instance);
    let surface = unsafe {
        ash_window::create_surface(
            device.entry(),
            &device.instance,
            display_handle,
            window_handle,
            None,
        )
    }
    .context("Failed to create surface")?;
    Ok((surface, surface_loader))
}

/// Find the queue family used for both rendering and presentation.
/// Asymmetric graphics/present queues are not supported.
pub fn find_present_queue_family(
    device: &VulkanDevice,
    surface_loader: &ash::extensions::khr::Surface,
    surface: vk::SurfaceKHR,
) -> Result<u32> {
    let mut supports_present = Vec::with_capacity(device.queue_family_properties.len());
    for i in 0..device.queue_family_properties.len() {
        let supported = unsafe {
            surface_loader.get_physical_device_surface_support(
                device.physical_device,
                i as u32,
                surface,
            )
        }
        .context("Surface support query failed")?;
        supports_present.push(supported);
    }

    select_present_family(&device.queue_family_properties, &supports_present)
        .context("No queue family supports both graphics and presentation")
}

/// Pick the first family that can both render and present.
pub(crate) fn select_present_family(
    families: &[vk::QueueFamilyProperties],
    supports_present: &[bool],
) -> Option<u32> {
    families
        .iter()
        .zip(supports_present.iter())
        .position(|(family, &present)| {
            family.queue_flags.contains(vk::QueueFlags::GRAPHICS) && present
        })
        .map(|index| index as u32)
}

/// Select the swapchain surface format.
///
/// A single undefined entry means the device has no preference; default to
/// 8-bit BGRA with the nonlinear sRGB color space. Otherwise prefer an
/// exact BGRA/sRGB match and fall back to the first reported format.
pub(crate) fn choose_surface_format(formats: &[vk::SurfaceFormatKHR]) -> vk::SurfaceFormatKHR {
    if formats.len() == 1 && formats[0].format == vk::Format::UNDEFINED {
        return vk::SurfaceFormatKHR {
            format: vk::Format::B8G8R8A8_UNORM,
            color_space: vk::ColorSpaceKHR::SRGB_NONLINEAR,
        };
    }
    formats
        .iter()
        .copied()
        .find(|f| {
            f.format == vk::Format::B8G8R8A8_UNORM
                && f.color_space == vk::ColorSpaceKHR::SRGB_NONLINEAR
        })
        .unwrap_or(formats[0])
}

/// Select the present mode. Vsync always means FIFO; otherwise prefer
/// mailbox, then immediate, then the always-available FIFO.
pub(crate) fn choose_present_mode(
    modes: &[vk::PresentModeKHR],
    vsync: bool,
) -> vk::PresentModeKHR {
    let mut chosen = vk::PresentModeKHR::FIFO;
    if !vsync {
        for &mode in modes {
            if mode == vk::PresentModeKHR::MAILBOX {
                return vk::PresentModeKHR::MAILBOX;
            }
            if chosen != vk::PresentModeKHR::MAILBOX && mode == vk::PresentModeKHR::IMMEDIATE {
                chosen = vk::PresentModeKHR::IMMEDIATE;
            }
        }
    }
    chosen
}

/// Back-buffer count: the reported minimum, clamped down when the device
/// declares a maximum (0 means unbounded).
pub(crate) fn clamp_back_buffer_count(capabilities: &vk::SurfaceCapabilitiesKHR) -> u32 {
    let mut count = capabilities.min_image_count;
    if capabilities.max_image_count > 0 && count > capabilities.max_image_count {
        count = capabilities.max_image_count;
    }
    count
}

pub struct Swapchain {
    pub swapchain: vk::SwapchainKHR,
    pub loader: ash::extensions::khr::Swapchain,
    pub images: Vec<vk::Image>,
    pub image_views: Vec<vk::ImageView>,
    pub format: vk::Format,
    pub color_space: vk::ColorSpaceKHR,
    pub present_mode: vk::PresentModeKHR,
    pub extent: vk::Extent2D,
    device: Arc<VulkanDevice>,
}

impl Swapchain {
    pub fn new(
        device: Arc<VulkanDevice>,
        surface: vk::SurfaceKHR,
        surface_loader: &ash::extensions::khr::Surface,
        width: u32,
        height: u32,
        vsync: bool,
    ) -> Result<Self> {
        Self::create(
            device,
            surface,
            surface_loader,
            width,
            height,
            vsync,
            vk::SwapchainKHR::null(),
        )
    }

    /// Rebuild the swapchain for a new extent. The old back-buffer views go
    /// away first; the old handle is handed to the driver as a reuse hint
    /// and destroyed once the new swapchain exists.
    pub fn recreate(
        mut old: Swapchain,
        surface: vk::SurfaceKHR,
        surface_loader: &ash::extensions::khr::Surface,
        width: u32,
        height: u32,
        vsync: bool,
    ) -> Result<Self> {
        unsafe {
            for &view in &old.image_views {
                old.device.device.destroy_image_view(view, None);
            }
        }
        old.image_views.clear();

        let hint = old.swapchain;
        old.swapchain = vk::SwapchainKHR::null();
        let device = old.device.clone();

        let new = Self::create(device, surface, surface_loader, width, height, vsync, hint)?;
        unsafe { new.loader.destroy_swapchain(hint, None) };
        Ok(new)
    }

    fn create(
        device: Arc<VulkanDevice>,
        surface: vk::SurfaceKHR,
        surface_loader: &ash::extensions::khr::Surface,
        width: u32,
        height: u32,
        vsync: bool,
        old_swapchain: vk::SwapchainKHR,
    ) -> Result<Self> {
        log::info!("Creating swapchain: {}x{}", width, height);

        let capabilities = unsafe {
            surface_loader
                .get_physical_device_surface_capabilities(device.physical_device, surface)
        }
        .context("Surface capabilities query failed")?;

        let formats = unsafe {
            surface_loader.get_physical_device_surface_formats(device.physical_device, surface)
        }
        .context("Surface format query failed")?;
        if formats.is_empty() {
            bail!("Device reports no surface formats");
        }

        let present_modes = unsafe {
            surface_loader
                .get_physical_device_surface_present_modes(device.physical_device, surface)
        }
        .context("Present mode query failed")?;

        let surface_format = choose_surface_format(&formats);
        let present_mode = choose_present_mode(&present_modes, vsync);
        let back_buffer_count = clamp_back_buffer_count(&capabilities);

        log::info!(
            "Surface format: {:?}/{:?}, present mode: {:?}, back buffers: {}",
            surface_format.format,
            surface_format.color_space,
            present_mode,
            back_buffer_count
        );

        // Prefer a non-rotated transform
        let pre_transform = if capabilities
            .supported_transforms
            .contains(vk::SurfaceTransformFlagsKHR::IDENTITY)
        {
            vk::SurfaceTransformFlagsKHR::IDENTITY
        } else {
            capabilities.current_transform
        };

        // Allow copying out of back buffers when the format supports it
        let format_props = unsafe {
            device
                .instance
                .get_physical_device_format_properties(device.physical_device, surface_format.format)
        };
        let mut image_usage = vk::ImageUsageFlags::COLOR_ATTACHMENT;
        if format_props
            .optimal_tiling_features
            .contains(vk::FormatFeatureFlags::BLIT_DST)
        {
            image_usage |= vk::ImageUsageFlags::TRANSFER_SRC;
        }

        let extent = vk::Extent2D { width, height };
        let create_info = vk::SwapchainCreateInfoKHR::builder()
            .surface(surface)
            .min_image_count(back_buffer_count)
            .image_format(surface_format.format)
            .image_color_space(surface_format.color_space)
            .image_extent(extent)
            .image_array_layers(1)
            .image_usage(image_usage)
            .image_sharing_mode(vk::SharingMode::EXCLUSIVE)
            .pre_transform(pre_transform)
            .composite_alpha(vk::CompositeAlphaFlagsKHR::OPAQUE)
            .present_mode(present_mode)
            .clipped(true)
            .old_swapchain(old_swapchain);

        let loader = ash::extensions::khr::Swapchain::new(&device.instance, &device.device);
        let swapchain = unsafe { loader.create_swapchain(&create_info, None) }
            .context("Failed to create swapchain")?;

        let images = unsafe { loader.get_swapchain_images(swapchain) }
            .context("Failed to get swapchain images")?;

        let image_views = images
            .iter()
            .map(|&image| {
                let view_info = vk::ImageViewCreateInfo::builder()
                    .image(image)
                    .view_type(vk::ImageViewType::TYPE_2D)
                    .format(surface_format.format)
                    .components(vk::ComponentMapping {
                        r: vk::ComponentSwizzle::IDENTITY,
                        g: vk::ComponentSwizzle::IDENTITY,
                        b: vk::ComponentSwizzle::IDENTITY,
                        a: vk::ComponentSwizzle::IDENTITY,
                    })
                    .subresource_range(vk::ImageSubresourceRange {
                        aspect_mask: vk::ImageAspectFlags::COLOR,
                        base_mip_level: 0,
                        level_count: 1,
                        base_array_layer: 0,
                        layer_count: 1,
                    });

                unsafe { device.device.create_image_view(&view_info, None) }
                    .context("Failed to create back-buffer image view")
            })
            .collect::<Result<Vec<_>>>()?;

        Ok(Self {
            swapchain,
            loader,
            images,
            image_views,
            format: surface_format.format,
            color_space: surface_format.color_space,
            present_mode,
            extent,
            device,
        })
    }

    /// Number of back buffers in the rotation.
    pub fn back_buffer_count(&self) -> u32 {
        self.images.len() as u32
    }
}

impl Drop for Swapchain {
    fn drop(&mut self) {
        unsafe {
            for &view in &self.image_views {
                self.device.device.destroy_image_view(view, None);
            }
            if self.swapchain != vk::SwapchainKHR::null() {
                self.loader.destroy_swapchain(self.swapchain, None);
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn single_undefined_entry_defaults_to_bgra_srgb() {
        let formats = [vk::SurfaceFormatKHR {
            format: vk::Format::UNDEFINED,
            color_space: vk::ColorSpaceKHR::SRGB_NONLINEAR,
        }];
        let chosen = choose_surface_format(&formats);
        assert_eq!(chosen.format, vk::Format::B8G8R8A8_UNORM);
        assert_eq!(chosen.color_space, vk::ColorSpaceKHR::SRGB_NONLINEAR);
    }

    #[test]
    fn exact_bgra_srgb_match_is_preferred() {
        let formats = [
            vk::SurfaceFormatKHR {
                format: vk::Format::R8G8B8A8_UNORM,
                color_space: vk::ColorSpaceKHR::SRGB_NONLINEAR,
            },
            vk::SurfaceFormatKHR {
                format: vk::Format::B8G8R8A8_UNORM,
                color_space: vk::ColorSpaceKHR::SRGB_NONLINEAR,
            },
        ];
        assert_eq!(choose_surface_format(&formats).format, vk::Format::B8G8R8A8_UNORM);
    }

    #[test]
    fn falls_back_to_first_reported_format() {
        let formats = [
            vk::SurfaceFormatKHR {
                format: vk::Format::R8G8B8A8_UNORM,
                color_space: vk::ColorSpaceKHR::SRGB_NONLINEAR,
            },
            vk::SurfaceFormatKHR {
                format: vk::Format::R16G16B16A16_SFLOAT,
                color_space: vk::ColorSpaceKHR::SRGB_NONLINEAR,
            },
        ];
        assert_eq!(choose_surface_format(&formats).format, vk::Format::R8G8B8A8_UNORM);
    }

    #[test]
    fn vsync_always_selects_fifo() {
        let modes = [
            vk::PresentModeKHR::MAILBOX,
            vk::PresentModeKHR::IMMEDIATE,
            vk::PresentModeKHR::FIFO,
        ];
        assert_eq!(choose_present_mode(&modes, true), vk::PresentModeKHR::FIFO);
    }

    #[test]
    fn mailbox_preferred_without_vsync() {
        let modes = [
            vk::PresentModeKHR::IMMEDIATE,
            vk::PresentModeKHR::MAILBOX,
            vk::PresentModeKHR::FIFO,
        ];
        assert_eq!(choose_present_mode(&modes, false), vk::PresentModeKHR::MAILBOX);
    }

    #[test]
    fn immediate_used_when_mailbox_absent() {
        let modes = [vk::PresentModeKHR::FIFO, vk::PresentModeKHR::IMMEDIATE];
        assert_eq!(choose_present_mode(&modes, false), vk::PresentModeKHR::IMMEDIATE);
    }

    #[test]
    fn fifo_is_the_final_fallback() {
        let modes = [vk::PresentModeKHR::FIFO];
        assert_eq!(choose_present_mode(&modes, false), vk::PresentModeKHR::FIFO);
    }

    #[test]
    fn back_buffer_count_is_min_clamped_by_max() {
        let mut caps = vk::SurfaceCapabilitiesKHR::default();
        caps.min_image_count = 2;
        caps.max_image_count = 0; // unbounded
        assert_eq!(clamp_back_buffer_count(&caps), 2);

        caps.min_image_count = 4;
        caps.max_image_count = 3;
        assert_eq!(clamp_back_buffer_count(&caps), 3);

        caps.min_image_count = 2;
        caps.max_image_count = 8;
        assert_eq!(clamp_back_buffer_count(&caps), 2);
    }

    #[test]
    fn present_family_requires_graphics_and_present() {
        let families = [
            vk::QueueFamilyProperties {
                queue_flags: vk::QueueFlags::GRAPHICS,
                ..Default::default()
            },
            vk::QueueFamilyProperties {
                queue_flags: vk::QueueFlags::GRAPHICS | vk::QueueFlags::COMPUTE,
                ..Default::default()
            },
        ];
        assert_eq!(select_present_family(&families, &[false, true]), Some(1));
        assert_eq!(select_present_family(&families, &[false, false]), None);
    }
}
