// GPU memory-backed textures (1D/2D/3D images)
//
// Creation order is fixed: image, memory, bind, optional persistent map,
// then the view. The view's aspect mask is derived from the pixel format.

use anyhow::{bail, Context, Result};
use ash::vk;
use std::ffi::c_void;

use super::buffer::find_memory_type;
use super::format::{
    aspect_mask, to_vk_format, to_vk_format_features, to_vk_image_usage, to_vk_samples,
    PixelFormat, TextureUsage,
};
use super::VulkanDevice;

/// Texture dimensionality.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TextureType {
    D1,
    D2,
    D3,
}

impl TextureType {
    fn image_type(self) -> vk::ImageType {
        match self {
            TextureType::D1 => vk::ImageType::TYPE_1D,
            TextureType::D2 => vk::ImageType::TYPE_2D,
            TextureType::D3 => vk::ImageType::TYPE_3D,
        }
    }

    fn view_type(self) -> vk::ImageViewType {
        match self {
            TextureType::D1 => vk::ImageViewType::TYPE_1D,
            TextureType::D2 => vk::ImageViewType::TYPE_2D,
            TextureType::D3 => vk::ImageViewType::TYPE_3D,
        }
    }
}

/// A memory-backed GPU image with its view.
pub struct Texture {
    pub ty: TextureType,
    pub width: u32,
    pub height: u32,
    pub depth: u32,
    pub mip_levels: u32,
    pub format: PixelFormat,
    pub usage: TextureUsage,
    pub sample_count: u32,
    pub host_visible: bool,
    pub image: vk::Image,
    pub memory: vk::DeviceMemory,
    pub view: vk::ImageView,
    mapped: *mut c_void,
}

impl Texture {
    #[allow(clippy::too_many_arguments)]
    pub(crate) fn new(
        device: &VulkanDevice,
        ty: TextureType,
        width: u32,
        height: u32,
        depth: u32,
        mip_levels: u32,
        format: PixelFormat,
        usage: TextureUsage,
        sample_count: u32,
        host_visible: bool,
    ) -> Result<Self> {
        let vk_format = to_vk_format(format);
        let tiling = if host_visible {
            vk::ImageTiling::LINEAR
        } else {
            vk::ImageTiling::OPTIMAL
        };

        // Sampled textures must always support copy in/out
        let mut usage_flags = to_vk_image_usage(usage);
        if usage_flags.contains(vk::ImageUsageFlags::SAMPLED) {
            usage_flags |= vk::ImageUsageFlags::TRANSFER_SRC | vk::ImageUsageFlags::TRANSFER_DST;
        }

        // Reject format/tiling combinations the device cannot serve
        let format_props = unsafe {
            device
                .instance
                .get_physical_device_format_properties(device.physical_device, vk_format)
        };
        let required_features = to_vk_format_features(usage_flags);
        let available_features = if host_visible {
            format_props.linear_tiling_features
        } else {
            format_props.optimal_tiling_features
        };
        if (available_features & required_features).is_empty() {
            bail!(
                "Format {:?} is not supported for {} images with usage {:?}",
                format,
                if host_visible { "host-visible" } else { "device-local" },
                usage
            );
        }

        // Clamp mip levels to what the device reports for this combination
        let image_format_props = unsafe {
            device.instance.get_physical_device_image_format_properties(
                device.physical_device,
                vk_format,
                ty.image_type(),
                tiling,
                usage_flags,
                vk::ImageCreateFlags::empty(),
            )
        }
        .context("Image format properties query failed")?;
        let mip_levels = clamp_mip_levels(mip_levels, image_format_props.max_mip_levels);

        let image_info = vk::ImageCreateInfo::builder()
            .image_type(ty.image_type())
            .format(vk_format)
            .extent(vk::Extent3D {
                width,
                height,
                depth,
            })
            .mip_levels(mip_levels)
            .array_layers(1)
            .samples(to_vk_samples(sample_count))
            .tiling(tiling)
            .usage(usage_flags)
            .sharing_mode(vk::SharingMode::EXCLUSIVE)
            .initial_layout(vk::ImageLayout::UNDEFINED);

        let image = unsafe { device.device.create_image(&image_info, None) }
            .context("Failed to create image")?;

        let mem_requirements = unsafe { device.device.get_image_memory_requirements(image) };

        let mem_flags = if host_visible {
            vk::MemoryPropertyFlags::HOST_VISIBLE | vk::MemoryPropertyFlags::HOST_COHERENT
        } else {
            vk::MemoryPropertyFlags::DEVICE_LOCAL
        };

        let memory_type_index = find_memory_type(
            &device.memory_properties,
            mem_requirements.memory_type_bits,
            mem_flags,
        )
        .context("Failed to find compatible memory for texture")?;

        let alloc_info = vk::MemoryAllocateInfo::builder()
            .allocation_size(mem_requirements.size)
            .memory_type_index(memory_type_index);

        let memory = unsafe { device.device.allocate_memory(&alloc_info, None) }
            .context("Failed to allocate image memory")?;

        unsafe { device.device.bind_image_memory(image, memory, 0) }
            .context("Failed to bind image memory")?;

        let mapped = if host_visible {
            unsafe {
                device
                    .device
                    .map_memory(memory, 0, vk::WHOLE_SIZE, vk::MemoryMapFlags::empty())
            }
            .context("Failed to map image memory")?
        } else {
            std::ptr::null_mut()
        };

        let view_info = vk::ImageViewCreateInfo::builder()
            .image(image)
            .view_type(ty.view_type())
            .format(vk_format)
            .components(vk::ComponentMapping {
                r: vk::ComponentSwizzle::R,
                g: vk::ComponentSwizzle::G,
                b: vk::ComponentSwizzle::B,
                a: vk::ComponentSwizzle::A,
            })
            .subresource_range(vk::ImageSubresourceRange {
                aspect_mask: aspect_mask(vk_format),
                base_mip_level: 0,
                level_count: mip_levels,
                base_array_layer: 0,
                layer_count: 1,
            });

        let view = unsafe { device.device.create_image_view(&view_info, None) }
            .context("Failed to create image view")?;

        Ok(Self {
            ty,
            width,
            height,
            depth,
            mip_levels,
            format,
            usage,
            sample_count,
            host_visible,
            image,
            memory,
            view,
            mapped,
        })
    }

    /// Persistently mapped host pointer, or null for device-local textures.
    pub fn mapped_ptr(&self) -> *mut c_void {
        self.mapped
    }

    pub(crate) fn destroy(&mut self, device: &ash::Device) {
        unsafe {
            device.free_memory(self.memory, None);
            device.destroy_image(self.image, None);
            device.destroy_image_view(self.view, None);
        }
        self.memory = vk::DeviceMemory::null();
        self.image = vk::Image::null();
        self.view = vk::ImageView::null();
        self.mapped = std::ptr::null_mut();
    }
}

/// Clamp a requested mip chain to the device-reported maximum. Single-level
/// requests pass through untouched.
pub(crate) fn clamp_mip_levels(requested: u32, device_max: u32) -> u32 {
    if requested > 1 {
        requested.min(device_max)
    } else {
        requested
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn mip_levels_clamp_to_device_maximum() {
        assert_eq!(clamp_mip_levels(10, 5), 5);
        assert_eq!(clamp_mip_levels(3, 5), 3);
        assert_eq!(clamp_mip_levels(1, 5), 1);
    }

    #[test]
    fn texture_types_map_to_matching_image_and_view_types() {
        assert_eq!(TextureType::D1.image_type(), vk::ImageType::TYPE_1D);
        assert_eq!(TextureType::D2.image_type(), vk::ImageType::TYPE_2D);
        assert_eq!(TextureType::D3.image_type(), vk::ImageType::TYPE_3D);
        assert_eq!(TextureType::D1.view_type(), vk::ImageViewType::TYPE_1D);
        assert_eq!(TextureType::D2.view_type(), vk::ImageViewType::TYPE_2D);
        assert_eq!(TextureType::D3.view_type(), vk::ImageViewType::TYPE_3D);
    }
}
