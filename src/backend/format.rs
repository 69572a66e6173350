// Portable format/sample/usage enumerations and their Vulkan mappings
//
// The pixel-format table is the binary contract between callers and the
// hardware path: every portable format maps to exactly one VkFormat.

use ash::vk;

/// Portable pixel formats supported by the resource allocator.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum PixelFormat {
    Undefined,
    R8Unorm,
    R16Unorm,
    R16Float,
    R32Uint,
    R32Float,
    Rg8Unorm,
    Rg16Unorm,
    Rg16Float,
    Rg32Uint,
    Rg32Float,
    Rgb8Unorm,
    Rgb16Unorm,
    Rgb16Float,
    Rgb32Uint,
    Rgb32Float,
    Bgra8Unorm,
    Rgba8Unorm,
    Rgba16Unorm,
    Rgba16Float,
    Rgba32Uint,
    Rgba32Float,
    D16Unorm,
    X8D24Unorm,
    D32Float,
    S8Uint,
    D16UnormS8Uint,
    D24UnormS8Uint,
    D32FloatS8Uint,
}

impl PixelFormat {
    /// All formats other than `Undefined`, in table order.
    pub const ALL: [PixelFormat; 28] = [
        PixelFormat::R8Unorm,
        PixelFormat::R16Unorm,
        PixelFormat::R16Float,
        PixelFormat::R32Uint,
        PixelFormat::R32Float,
        PixelFormat::Rg8Unorm,
        PixelFormat::Rg16Unorm,
        PixelFormat::Rg16Float,
        PixelFormat::Rg32Uint,
        PixelFormat::Rg32Float,
        PixelFormat::Rgb8Unorm,
        PixelFormat::Rgb16Unorm,
        PixelFormat::Rgb16Float,
        PixelFormat::Rgb32Uint,
        PixelFormat::Rgb32Float,
        PixelFormat::Bgra8Unorm,
        PixelFormat::Rgba8Unorm,
        PixelFormat::Rgba16Unorm,
        PixelFormat::Rgba16Float,
        PixelFormat::Rgba32Uint,
        PixelFormat::Rgba32Float,
        PixelFormat::D16Unorm,
        PixelFormat::X8D24Unorm,
        PixelFormat::D32Float,
        PixelFormat::S8Uint,
        PixelFormat::D16UnormS8Uint,
        PixelFormat::D24UnormS8Uint,
        PixelFormat::D32FloatS8Uint,
    ];
}

/// Map a portable pixel format to its Vulkan format.
pub fn to_vk_format(format: PixelFormat) -> vk::Format {
    match format {
        PixelFormat::Undefined => vk::Format::UNDEFINED,
        PixelFormat::R8Unorm => vk::Format::R8_UNORM,
        PixelFormat::R16Unorm => vk::Format::R16_UNORM,
        PixelFormat::R16Float => vk::Format::R16_SFLOAT,
        PixelFormat::R32Uint => vk::Format::R32_UINT,
        PixelFormat::R32Float => vk::Format::R32_SFLOAT,
        PixelFormat::Rg8Unorm => vk::Format::R8G8_UNORM,
        PixelFormat::Rg16Unorm => vk::Format::R16G16_UNORM,
        PixelFormat::Rg16Float => vk::Format::R16G16_SFLOAT,
        PixelFormat::Rg32Uint => vk::Format::R32G32_UINT,
        PixelFormat::Rg32Float => vk::Format::R32G32_SFLOAT,
        PixelFormat::Rgb8Unorm => vk::Format::R8G8B8_UNORM,
        PixelFormat::Rgb16Unorm => vk::Format::R16G16B16_UNORM,
        PixelFormat::Rgb16Float => vk::Format::R16G16B16_SFLOAT,
        PixelFormat::Rgb32Uint => vk::Format::R32G32B32_UINT,
        PixelFormat::Rgb32Float => vk::Format::R32G32B32_SFLOAT,
        PixelFormat::Bgra8Unorm => vk::Format::B8G8R8A8_UNORM,
        PixelFormat::Rgba8Unorm => vk::Format::R8G8B8A8_UNORM,
        PixelFormat::Rgba16Unorm => vk::Format::R16G16B16A16_UNORM,
        PixelFormat::Rgba16Float => vk::Format::R16G16B16A16_SFLOAT,
        PixelFormat::Rgba32Uint => vk::Format::R32G32B32A32_UINT,
        PixelFormat::Rgba32Float => vk::Format::R32G32B32A32_SFLOAT,
        PixelFormat::D16Unorm => vk::Format::D16_UNORM,
        PixelFormat::X8D24Unorm => vk::Format::X8_D24_UNORM_PACK32,
        PixelFormat::D32Float => vk::Format::D32_SFLOAT,
        PixelFormat::S8Uint => vk::Format::S8_UINT,
        PixelFormat::D16UnormS8Uint => vk::Format::D16_UNORM_S8_UINT,
        PixelFormat::D24UnormS8Uint => vk::Format::D24_UNORM_S8_UINT,
        PixelFormat::D32FloatS8Uint => vk::Format::D32_SFLOAT_S8_UINT,
    }
}

/// Map a sample count to the Vulkan sample flag.
/// Counts outside {1, 2, 4, 8, 16} fall back to single-sampling.
pub fn to_vk_samples(sample_count: u32) -> vk::SampleCountFlags {
    match sample_count {
        2 => vk::SampleCountFlags::TYPE_2,
        4 => vk::SampleCountFlags::TYPE_4,
        8 => vk::SampleCountFlags::TYPE_8,
        16 => vk::SampleCountFlags::TYPE_16,
        _ => vk::SampleCountFlags::TYPE_1,
    }
}

bitflags::bitflags! {
    /// Logical texture usage, mapped onto `vk::ImageUsageFlags`.
    #[derive(Debug, Clone, Copy, PartialEq, Eq)]
    pub struct TextureUsage: u32 {
        const TRANSFER_SRC = 1 << 0;
        const TRANSFER_DST = 1 << 1;
        const SAMPLED = 1 << 2;
        const STORAGE = 1 << 3;
        const COLOR_ATTACHMENT = 1 << 4;
        const DEPTH_STENCIL_ATTACHMENT = 1 << 5;
    }
}

pub fn to_vk_image_usage(usage: TextureUsage) -> vk::ImageUsageFlags {
    let mut result = vk::ImageUsageFlags::empty();
    if usage.contains(TextureUsage::TRANSFER_SRC) {
        result |= vk::ImageUsageFlags::TRANSFER_SRC;
    }
    if usage.contains(TextureUsage::TRANSFER_DST) {
        result |= vk::ImageUsageFlags::TRANSFER_DST;
    }
    if usage.contains(TextureUsage::SAMPLED) {
        result |= vk::ImageUsageFlags::SAMPLED;
    }
    if usage.contains(TextureUsage::STORAGE) {
        result |= vk::ImageUsageFlags::STORAGE;
    }
    if usage.contains(TextureUsage::COLOR_ATTACHMENT) {
        result |= vk::ImageUsageFlags::COLOR_ATTACHMENT;
    }
    if usage.contains(TextureUsage::DEPTH_STENCIL_ATTACHMENT) {
        result |= vk::ImageUsageFlags::DEPTH_STENCIL_ATTACHMENT;
    }
    result
}

/// Derive the format features an image usage requires, used to validate a
/// format/tiling combination before image creation.
pub fn to_vk_format_features(usage: vk::ImageUsageFlags) -> vk::FormatFeatureFlags {
    let mut result = vk::FormatFeatureFlags::empty();
    if usage.contains(vk::ImageUsageFlags::SAMPLED) {
        result |= vk::FormatFeatureFlags::SAMPLED_IMAGE;
    }
    if usage.contains(vk::ImageUsageFlags::STORAGE) {
        result |= vk::FormatFeatureFlags::STORAGE_IMAGE;
    }
    if usage.contains(vk::ImageUsageFlags::COLOR_ATTACHMENT) {
        result |= vk::FormatFeatureFlags::COLOR_ATTACHMENT;
    }
    if usage.contains(vk::ImageUsageFlags::DEPTH_STENCIL_ATTACHMENT) {
        result |= vk::FormatFeatureFlags::DEPTH_STENCIL_ATTACHMENT;
    }
    result
}

/// Image aspect for a view of the given format: depth-only, stencil-only,
/// combined depth/stencil, or color.
pub fn aspect_mask(format: vk::Format) -> vk::ImageAspectFlags {
    match format {
        vk::Format::D16_UNORM | vk::Format::X8_D24_UNORM_PACK32 | vk::Format::D32_SFLOAT => {
            vk::ImageAspectFlags::DEPTH
        }
        vk::Format::S8_UINT => vk::ImageAspectFlags::STENCIL,
        vk::Format::D16_UNORM_S8_UINT
        | vk::Format::D24_UNORM_S8_UINT
        | vk::Format::D32_SFLOAT_S8_UINT => {
            vk::ImageAspectFlags::DEPTH | vk::ImageAspectFlags::STENCIL
        }
        _ => vk::ImageAspectFlags::COLOR,
    }
}

/// Uniform buffer sizes are padded to this boundary.
pub const UNIFORM_BUFFER_ALIGNMENT: u64 = 256;

/// Round `size` up to the next multiple of `alignment`.
pub fn align_up(size: u64, alignment: u64) -> u64 {
    ((size + alignment - 1) / alignment) * alignment
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashSet;

    #[test]
    fn format_mapping_is_total_and_injective() {
        let mut seen = HashSet::new();
        for &format in PixelFormat::ALL.iter() {
            let vk_format = to_vk_format(format);
            assert_ne!(vk_format, vk::Format::UNDEFINED, "{:?} maps to UNDEFINED", format);
            assert!(seen.insert(vk_format), "{:?} collides with another format", format);
        }
        assert_eq!(to_vk_format(PixelFormat::Undefined), vk::Format::UNDEFINED);
    }

    #[test]
    fn sample_counts_map_to_matching_flags() {
        assert_eq!(to_vk_samples(1), vk::SampleCountFlags::TYPE_1);
        assert_eq!(to_vk_samples(2), vk::SampleCountFlags::TYPE_2);
        assert_eq!(to_vk_samples(4), vk::SampleCountFlags::TYPE_4);
        assert_eq!(to_vk_samples(8), vk::SampleCountFlags::TYPE_8);
        assert_eq!(to_vk_samples(16), vk::SampleCountFlags::TYPE_16);
    }

    #[test]
    fn unsupported_sample_counts_default_to_one() {
        for count in [0, 3, 5, 7, 32, 64] {
            assert_eq!(to_vk_samples(count), vk::SampleCountFlags::TYPE_1);
        }
    }

    #[test]
    fn sampled_usage_requires_sampled_feature() {
        let features = to_vk_format_features(
            vk::ImageUsageFlags::SAMPLED | vk::ImageUsageFlags::COLOR_ATTACHMENT,
        );
        assert!(features.contains(vk::FormatFeatureFlags::SAMPLED_IMAGE));
        assert!(features.contains(vk::FormatFeatureFlags::COLOR_ATTACHMENT));
        assert!(!features.contains(vk::FormatFeatureFlags::DEPTH_STENCIL_ATTACHMENT));
    }

    #[test]
    fn aspect_mask_distinguishes_depth_stencil_and_color() {
        assert_eq!(aspect_mask(vk::Format::D32_SFLOAT), vk::ImageAspectFlags::DEPTH);
        assert_eq!(aspect_mask(vk::Format::S8_UINT), vk::ImageAspectFlags::STENCIL);
        assert_eq!(
            aspect_mask(vk::Format::D24_UNORM_S8_UINT),
            vk::ImageAspectFlags::DEPTH | vk::ImageAspectFlags::STENCIL
        );
        assert_eq!(aspect_mask(vk::Format::B8G8R8A8_UNORM), vk::ImageAspectFlags::COLOR);
    }

    #[test]
    fn align_up_rounds_to_uniform_boundary() {
        assert_eq!(align_up(100, UNIFORM_BUFFER_ALIGNMENT), 256);
        assert_eq!(align_up(256, UNIFORM_BUFFER_ALIGNMENT), 256);
        assert_eq!(align_up(257, UNIFORM_BUFFER_ALIGNMENT), 512);
        assert_eq!(align_up(0, UNIFORM_BUFFER_ALIGNMENT), 0);
    }
}
