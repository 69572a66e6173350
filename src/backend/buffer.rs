// GPU memory-backed buffers for vertex, index, and uniform data
//
// A buffer exclusively owns its device memory; host-visible buffers stay
// mapped for their entire lifetime.

use anyhow::{Context, Result};
use ash::vk;
use std::ffi::c_void;

use super::format::{align_up, UNIFORM_BUFFER_ALIGNMENT};
use super::VulkanDevice;

/// Logical buffer usage, mapped onto `vk::BufferUsageFlags`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BufferUsage {
    Vertex,
    Index,
    Uniform,
}

/// Element width of an index buffer.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum IndexFormat {
    U16,
    U32,
}

impl IndexFormat {
    pub fn stride(self) -> u64 {
        match self {
            IndexFormat::U16 => std::mem::size_of::<u16>() as u64,
            IndexFormat::U32 => std::mem::size_of::<u32>() as u64,
        }
    }
}

/// A memory-backed GPU buffer.
pub struct Buffer {
    pub usage: BufferUsage,
    pub size: u64,
    pub stride: u64,
    pub host_visible: bool,
    pub buffer: vk::Buffer,
    pub memory: vk::DeviceMemory,
    mapped: *mut c_void,
}

impl Buffer {
    /// Create a buffer and bind freshly allocated memory to it.
    ///
    /// Uniform buffer sizes are padded to a 256-byte boundary. Host-visible
    /// buffers are mapped once here and stay mapped until destruction.
    pub(crate) fn new(
        device: &VulkanDevice,
        usage: BufferUsage,
        size: u64,
        stride: u64,
        host_visible: bool,
    ) -> Result<Self> {
        let size = match usage {
            BufferUsage::Uniform => align_up(size, UNIFORM_BUFFER_ALIGNMENT),
            _ => size,
        };

        let usage_flags = match usage {
            BufferUsage::Vertex => vk::BufferUsageFlags::VERTEX_BUFFER,
            BufferUsage::Index => vk::BufferUsageFlags::INDEX_BUFFER,
            BufferUsage::Uniform => vk::BufferUsageFlags::UNIFORM_BUFFER,
        };

        let buffer_info = vk::BufferCreateInfo::builder()
            .size(size)
            .usage(usage_flags)
            .sharing_mode(vk::SharingMode::EXCLUSIVE);

        let buffer = unsafe { device.device.create_buffer(&buffer_info, None) }
            .context("Failed to create buffer")?;

        let mem_requirements = unsafe { device.device.get_buffer_memory_requirements(buffer) };

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
        .context("Failed to find compatible memory for buffer")?;

        let alloc_info = vk::MemoryAllocateInfo::builder()
            .allocation_size(mem_requirements.size)
            .memory_type_index(memory_type_index);

        let memory = unsafe { device.device.allocate_memory(&alloc_info, None) }
            .context("Failed to allocate buffer memory")?;

        unsafe { device.device.bind_buffer_memory(buffer, memory, 0) }
            .context("Failed to bind buffer memory")?;

        let mapped = if host_visible {
            unsafe {
                device
                    .device
                    .map_memory(memory, 0, vk::WHOLE_SIZE, vk::MemoryMapFlags::empty())
            }
            .context("Failed to map buffer memory")?
        } else {
            std::ptr::null_mut()
        };

        Ok(Self {
            usage,
            size,
            stride,
            host_visible,
            buffer,
            memory,
            mapped,
        })
    }

    /// Persistently mapped host pointer, or null for device-local buffers.
    pub fn mapped_ptr(&self) -> *mut c_void {
        self.mapped
    }

    pub(crate) fn destroy(&mut self, device: &ash::Device) {
        unsafe {
            device.free_memory(self.memory, None);
            device.destroy_buffer(self.buffer, None);
        }
        self.memory = vk::DeviceMemory::null();
        self.buffer = vk::Buffer::null();
        self.mapped = std::ptr::null_mut();
    }
}

/// Scan the device's memory types from the least-significant bit of
/// `type_bits` and return the first index whose property flags are a
/// superset of `required`.
pub fn find_memory_type(
    memory_properties: &vk::PhysicalDeviceMemoryProperties,
    mut type_bits: u32,
    required: vk::MemoryPropertyFlags,
) -> Option<u32> {
    for i in 0..memory_properties.memory_type_count {
        if (type_bits & 1) == 1
            && memory_properties.memory_types[i as usize]
                .property_flags
                .contains(required)
        {
            return Some(i);
        }
        type_bits >>= 1;
    }
    None
}

#[cfg(test)]
mod tests {
    use super::*;

    fn memory_properties(types: &[vk::MemoryPropertyFlags]) -> vk::PhysicalDeviceMemoryProperties {
        let mut props = vk::PhysicalDeviceMemoryProperties::default();
        props.memory_type_count = types.len() as u32;
        for (i, &flags) in types.iter().enumerate() {
            props.memory_types[i].property_flags = flags;
        }
        props
    }

    #[test]
    fn returns_lowest_matching_index() {
        let props = memory_properties(&[
            vk::MemoryPropertyFlags::DEVICE_LOCAL,
            vk::MemoryPropertyFlags::HOST_VISIBLE | vk::MemoryPropertyFlags::HOST_COHERENT,
            vk::MemoryPropertyFlags::HOST_VISIBLE | vk::MemoryPropertyFlags::HOST_COHERENT,
        ]);
        let found = find_memory_type(
            &props,
            0b111,
            vk::MemoryPropertyFlags::HOST_VISIBLE | vk::MemoryPropertyFlags::HOST_COHERENT,
        );
        assert_eq!(found, Some(1));
    }

    #[test]
    fn found_index_bit_is_set_in_type_bits() {
        let props = memory_properties(&[
            vk::MemoryPropertyFlags::DEVICE_LOCAL,
            vk::MemoryPropertyFlags::DEVICE_LOCAL,
        ]);
        // Index 0 matches the properties but is masked out of type_bits
        let found = find_memory_type(&props, 0b10, vk::MemoryPropertyFlags::DEVICE_LOCAL);
        assert_eq!(found, Some(1));
    }

    #[test]
    fn property_flags_must_be_superset() {
        let props = memory_properties(&[vk::MemoryPropertyFlags::HOST_VISIBLE]);
        let found = find_memory_type(
            &props,
            0b1,
            vk::MemoryPropertyFlags::HOST_VISIBLE | vk::MemoryPropertyFlags::HOST_COHERENT,
        );
        assert_eq!(found, None);
    }

    #[test]
    fn no_match_reports_none() {
        let props = memory_properties(&[vk::MemoryPropertyFlags::DEVICE_LOCAL]);
        assert_eq!(
            find_memory_type(&props, 0, vk::MemoryPropertyFlags::DEVICE_LOCAL),
            None
        );
        assert_eq!(
            find_memory_type(&props, 0b1, vk::MemoryPropertyFlags::HOST_VISIBLE),
            None
        );
    }

    #[test]
    fn empty_property_requirement_matches_any_type() {
        let props = memory_properties(&[vk::MemoryPropertyFlags::DEVICE_LOCAL]);
        assert_eq!(
            find_memory_type(&props, 0b1, vk::MemoryPropertyFlags::empty()),
            Some(0)
        );
    }

    #[test]
    fn index_format_strides() {
        assert_eq!(IndexFormat::U16.stride(), 2);
        assert_eq!(IndexFormat::U32.stride(), 4);
    }
}
