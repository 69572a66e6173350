// Shader module creation
//
// Vulkan consumes SPIR-V bytecode. Bytes come from the asset layer; this
// module only realigns them to 32-bit words and creates the module.

use anyhow::{Context, Result};
use ash::vk;
use std::io::Cursor;

use super::VulkanDevice;

/// A compiled shader module.
pub struct Shader {
    pub module: vk::ShaderModule,
}

impl Shader {
    /// Create a shader module from SPIR-V bytes.
    pub(crate) fn new(device: &VulkanDevice, bytes: &[u8]) -> Result<Self> {
        let code = ash::util::read_spv(&mut Cursor::new(bytes))
            .context("Shader bytecode is not valid SPIR-V")?;

        let create_info = vk::ShaderModuleCreateInfo::builder().code(&code);

        let module = unsafe { device.device.create_shader_module(&create_info, None) }
            .context("Failed to create shader module")?;

        Ok(Self { module })
    }

    pub(crate) fn destroy(&mut self, device: &ash::Device) {
        unsafe {
            device.destroy_shader_module(self.module, None);
        }
        self.module = vk::ShaderModule::null();
    }
}
