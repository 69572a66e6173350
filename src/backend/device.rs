// Vulkan device context - Core GPU interface
//
// Responsibilities:
// - Instance creation with validation layers
// - Physical device selection (scored, prefer discrete GPU)
// - Queue family resolution (graphics + dedicated compute when available)
// - Logical device + queue creation

use anyhow::{bail, Context, Result};
use ash::{vk, Entry};
use raw_window_handle::RawDisplayHandle;
use std::ffi::{CStr, CString};
use std::sync::Arc;

/// Vulkan device wrapper with automatic cleanup.
pub struct VulkanDevice {
    // Vulkan handles (order matters for drop!)
    pub device: ash::Device,
    pub physical_device: vk::PhysicalDevice,
    pub instance: ash::Instance,
    entry: Entry,

    // Queue handles
    pub graphics_queue: vk::Queue,
    pub graphics_queue_family: u32,
    pub compute_queue_family: u32,

    // Debug utils (if validation enabled)
    debug_utils: Option<(ash::extensions::ext::DebugUtils, vk::DebugUtilsMessengerEXT)>,

    // Device properties (cached; read-only after creation)
    pub properties: vk::PhysicalDeviceProperties,
    pub memory_properties: vk::PhysicalDeviceMemoryProperties,
    pub queue_family_properties: Vec<vk::QueueFamilyProperties>,
}

impl VulkanDevice {
    /// Open the best available GPU.
    ///
    /// `display_handle` determines the platform surface extensions the
    /// instance must carry; `enable_validation` wires up the Khronos
    /// validation layer and debug messenger.
    pub fn new(
        app_name: &str,
        display_handle: RawDisplayHandle,
        enable_validation: bool,
    ) -> Result<Arc<Self>> {
        log::info!("Creating Vulkan device: {}", app_name);

        let entry = unsafe { Entry::load() }
            .context("Failed to load Vulkan library. Is Vulkan installed?")?;

        let instance = Self::create_instance(&entry, app_name, display_handle, enable_validation)?;

        let debug_utils = if enable_validation {
            Some(Self::setup_debug_messenger(&entry, &instance)?)
        } else {
            None
        };

        let physical_device = Self::pick_physical_device(&instance)?;

        let properties = unsafe { instance.get_physical_device_properties(physical_device) };
        let memory_properties =
            unsafe { instance.get_physical_device_memory_properties(physical_device) };
        let queue_family_properties =
            unsafe { instance.get_physical_device_queue_family_properties(physical_device) };
        if queue_family_properties.is_empty() {
            bail!("Selected GPU reports no queue families");
        }

        let graphics_queue_family =
            find_queue_family(&queue_family_properties, vk::QueueFlags::GRAPHICS)
                .context("No graphics-capable queue family found")?;
        let compute_queue_family =
            find_queue_family(&queue_family_properties, vk::QueueFlags::COMPUTE)
                .context("No compute-capable queue family found")?;

        log::info!(
            "Selected GPU: {}",
            unsafe { CStr::from_ptr(properties.device_name.as_ptr()) }.to_string_lossy()
        );
        log::info!(
            "API Version: {}.{}.{}",
            vk::api_version_major(properties.api_version),
            vk::api_version_minor(properties.api_version),
            vk::api_version_patch(properties.api_version)
        );
        log::debug!(
            "Queue families: graphics={}, compute={}",
            graphics_queue_family,
            compute_queue_family
        );

        let (device, graphics_queue) = Self::create_logical_device(
            &instance,
            physical_device,
            graphics_queue_family,
            compute_queue_family,
            enable_validation,
        )?;

        Ok(Arc::new(Self {
            device,
            physical_device,
            instance,
            entry,
            graphics_queue,
            graphics_queue_family,
            compute_queue_family,
            debug_utils,
            properties,
            memory_properties,
            queue_family_properties,
        }))
    }

    pub fn entry(&self) -> &Entry {
        &self.entry
    }

    fn create_instance(
        entry: &Entry,
        app_name: &str,
        display_handle: RawDisplayHandle,
        enable_validation: bool,
    ) -> Result<ash::Instance> {
        let app_name_cstr = CString::new(app_name)?;
        let engine_name = CString::new("flint")?;

        let app_info = vk::ApplicationInfo::builder()
            .application_name(&app_name_cstr)
            .application_version(vk::make_api_version(0, 0, 1, 0))
            .engine_name(&engine_name)
            .engine_version(vk::make_api_version(0, 0, 1, 0))
            .api_version(vk::API_VERSION_1_0);

        // Platform surface extensions for the window system in use
        let mut extensions = ash_window::enumerate_required_extensions(display_handle)
            .context("No surface extensions for this display")?
            .to_vec();
        if enable_validation {
            extensions.push(ash::extensions::ext::DebugUtils::name().as_ptr());
        }

        let layer_names = if enable_validation {
            vec![c"VK_LAYER_KHRONOS_validation".as_ptr()]
        } else {
            vec![]
        };

        let create_info = vk::InstanceCreateInfo::builder()
            .application_info(&app_info)
            .enabled_extension_names(&extensions)
            .enabled_layer_names(&layer_names);

        let instance = unsafe { entry.create_instance(&create_info, None) }
            .context("Failed to create Vulkan instance")?;

        Ok(instance)
    }

    fn setup_debug_messenger(
        entry: &Entry,
        instance: &ash::Instance,
    ) -> Result<(ash::extensions::ext::DebugUtils, vk::DebugUtilsMessengerEXT)> {
        let debug_utils = ash::extensions::ext::DebugUtils::new(entry, instance);

        let create_info = vk::DebugUtilsMessengerCreateInfoEXT::builder()
            .message_severity(
                vk::DebugUtilsMessageSeverityFlagsEXT::WARNING
                    | vk::DebugUtilsMessageSeverityFlagsEXT::ERROR,
            )
            .message_type(
                vk::DebugUtilsMessageTypeFlagsEXT::GENERAL
                    | vk::DebugUtilsMessageTypeFlagsEXT::VALIDATION
                    | vk::DebugUtilsMessageTypeFlagsEXT::PERFORMANCE,
            )
            .pfn_user_callback(Some(debug_callback));

        let messenger = unsafe { debug_utils.create_debug_utils_messenger(&create_info, None) }
            .context("Failed to create debug messenger")?;

        Ok((debug_utils, messenger))
    }

    fn pick_physical_device(instance: &ash::Instance) -> Result<vk::PhysicalDevice> {
        let devices = unsafe { instance.enumerate_physical_devices() }
            .context("Failed to enumerate physical devices")?;

        if devices.is_empty() {
            bail!("No Vulkan-capable GPU found");
        }

        // Score every device; highest score wins, first enumerated wins ties
        let mut best_device = None;
        let mut best_score = 0;

        for device in devices {
            let props = unsafe { instance.get_physical_device_properties(device) };
            let features = unsafe { instance.get_physical_device_features(device) };
            let score = score_physical_device(&props, &features);

            log::debug!(
                "Candidate GPU {} scored {}",
                unsafe { CStr::from_ptr(props.device_name.as_ptr()) }.to_string_lossy(),
                score
            );

            if best_device.is_none() || score > best_score {
                best_score = score;
                best_device = Some(device);
            }
        }

        best_device.ok_or_else(|| anyhow::anyhow!("No suitable GPU found"))
    }

    fn create_logical_device(
        instance: &ash::Instance,
        physical_device: vk::PhysicalDevice,
        graphics_queue_family: u32,
        compute_queue_family: u32,
        enable_validation: bool,
    ) -> Result<(ash::Device, vk::Queue)> {
        let queue_priorities = [0.0];
        let mut queue_create_infos = vec![vk::DeviceQueueCreateInfo::builder()
            .queue_family_index(graphics_queue_family)
            .queue_priorities(&queue_priorities)
            .build()];
        if compute_queue_family != graphics_queue_family {
            queue_create_infos.push(
                vk::DeviceQueueCreateInfo::builder()
                    .queue_family_index(compute_queue_family)
                    .queue_priorities(&queue_priorities)
                    .build(),
            );
        }

        // The swapchain extension is always required; the debug marker
        // extension only when validating and the driver exposes it
        let mut extensions = vec![ash::extensions::khr::Swapchain::name().as_ptr()];
        if enable_validation
            && Self::is_device_extension_present(
                instance,
                physical_device,
                ash::extensions::ext::DebugMarker::name(),
            )?
        {
            extensions.push(ash::extensions::ext::DebugMarker::name().as_ptr());
        }

        let layer_names = if enable_validation {
            vec![c"VK_LAYER_KHRONOS_validation".as_ptr()]
        } else {
            vec![]
        };

        let features = vk::PhysicalDeviceFeatures::default();
        let create_info = vk::DeviceCreateInfo::builder()
            .queue_create_infos(&queue_create_infos)
            .enabled_extension_names(&extensions)
            .enabled_layer_names(&layer_names)
            .enabled_features(&features);

        let device = unsafe { instance.create_device(physical_device, &create_info, None) }
            .context("Failed to create logical device")?;

        let graphics_queue = unsafe { device.get_device_queue(graphics_queue_family, 0) };

        Ok((device, graphics_queue))
    }

    fn is_device_extension_present(
        instance: &ash::Instance,
        physical_device: vk::PhysicalDevice,
        name: &CStr,
    ) -> Result<bool> {
        let extensions = unsafe { instance.enumerate_device_extension_properties(physical_device) }
            .context("Failed to enumerate device extensions")?;
        Ok(extensions
            .iter()
            .any(|ext| unsafe { CStr::from_ptr(ext.extension_name.as_ptr()) } == name))
    }

    /// Block until all submitted GPU work has drained.
    pub fn wait_idle(&self) -> Result<()> {
        unsafe { self.device.device_wait_idle() }.context("Device-idle wait failed")?;
        Ok(())
    }
}

impl Drop for VulkanDevice {
    fn drop(&mut self) {
        log::info!("Destroying Vulkan device...");

        let _ = self.wait_idle();

        unsafe {
            self.device.destroy_device(None);
            if let Some((debug_utils, messenger)) = self.debug_utils.take() {
                debug_utils.destroy_debug_utils_messenger(messenger, None);
            }
            self.instance.destroy_instance(None);
        }
    }
}

/// Score a physical device: discrete GPUs are strongly preferred, larger
/// 2D image limits break the ranking, and missing geometry-shader support
/// disqualifies the device outright.
pub(crate) fn score_physical_device(
    properties: &vk::PhysicalDeviceProperties,
    features: &vk::PhysicalDeviceFeatures,
) -> u32 {
    if features.geometry_shader != vk::TRUE {
        return 0;
    }
    let mut score = 0;
    if properties.device_type == vk::PhysicalDeviceType::DISCRETE_GPU {
        score += 1000;
    }
    score += properties.limits.max_image_dimension2_d;
    score
}

/// Resolve a queue family for the requested capability.
///
/// Compute requests prefer a dedicated family (compute without graphics)
/// and fall back to the first family with compute support, which may be
/// the graphics family.
pub(crate) fn find_queue_family(
    families: &[vk::QueueFamilyProperties],
    flags: vk::QueueFlags,
) -> Option<u32> {
    if flags.contains(vk::QueueFlags::COMPUTE) {
        let dedicated = families.iter().enumerate().find(|(_, family)| {
            family.queue_flags.contains(flags)
                && !family.queue_flags.contains(vk::QueueFlags::GRAPHICS)
        });
        if let Some((index, _)) = dedicated {
            return Some(index as u32);
        }
    }
    families
        .iter()
        .position(|family| family.queue_flags.contains(flags))
        .map(|index| index as u32)
}

// Debug callback for validation layers
unsafe extern "system" fn debug_callback(
    message_severity: vk::DebugUtilsMessageSeverityFlagsEXT,
    _message_type: vk::DebugUtilsMessageTypeFlagsEXT,
    p_callback_data: *const vk::DebugUtilsMessengerCallbackDataEXT,
    _p_user_data: *mut std::ffi::c_void,
) -> vk::Bool32 {
    let message = CStr::from_ptr((*p_callback_data).p_message);

    match message_severity {
        vk::DebugUtilsMessageSeverityFlagsEXT::ERROR => {
            log::error!("[Vulkan] {}", message.to_string_lossy());
        }
        vk::DebugUtilsMessageSeverityFlagsEXT::WARNING => {
            log::warn!("[Vulkan] {}", message.to_string_lossy());
        }
        _ => {
            log::debug!("[Vulkan] {}", message.to_string_lossy());
        }
    }

    vk::FALSE
}

#[cfg(test)]
mod tests {
    use super::*;

    fn device_props(
        device_type: vk::PhysicalDeviceType,
        max_dim: u32,
    ) -> vk::PhysicalDeviceProperties {
        let mut props = vk::PhysicalDeviceProperties::default();
        props.device_type = device_type;
        props.limits.max_image_dimension2_d = max_dim;
        props
    }

    fn features(geometry_shader: bool) -> vk::PhysicalDeviceFeatures {
        vk::PhysicalDeviceFeatures {
            geometry_shader: if geometry_shader { vk::TRUE } else { vk::FALSE },
            ..Default::default()
        }
    }

    fn family(flags: vk::QueueFlags) -> vk::QueueFamilyProperties {
        vk::QueueFamilyProperties {
            queue_flags: flags,
            ..Default::default()
        }
    }

    #[test]
    fn score_combines_discrete_bonus_and_image_limit() {
        let discrete = score_physical_device(
            &device_props(vk::PhysicalDeviceType::DISCRETE_GPU, 4096),
            &features(true),
        );
        let integrated = score_physical_device(
            &device_props(vk::PhysicalDeviceType::INTEGRATED_GPU, 4096),
            &features(true),
        );
        assert_eq!(discrete, 1000 + 4096);
        assert_eq!(integrated, 4096);
        assert!(discrete > integrated);
    }

    #[test]
    fn missing_geometry_shader_disqualifies() {
        let score = score_physical_device(
            &device_props(vk::PhysicalDeviceType::DISCRETE_GPU, 16384),
            &features(false),
        );
        assert_eq!(score, 0);
    }

    #[test]
    fn graphics_family_is_first_with_graphics_support() {
        let families = [
            family(vk::QueueFlags::TRANSFER),
            family(vk::QueueFlags::GRAPHICS | vk::QueueFlags::COMPUTE),
            family(vk::QueueFlags::GRAPHICS),
        ];
        assert_eq!(find_queue_family(&families, vk::QueueFlags::GRAPHICS), Some(1));
    }

    #[test]
    fn compute_prefers_dedicated_family() {
        let families = [
            family(vk::QueueFlags::GRAPHICS | vk::QueueFlags::COMPUTE),
            family(vk::QueueFlags::COMPUTE | vk::QueueFlags::TRANSFER),
        ];
        assert_eq!(find_queue_family(&families, vk::QueueFlags::COMPUTE), Some(1));
    }

    #[test]
    fn compute_falls_back_to_shared_family() {
        let families = [
            family(vk::QueueFlags::TRANSFER),
            family(vk::QueueFlags::GRAPHICS | vk::QueueFlags::COMPUTE),
        ];
        assert_eq!(find_queue_family(&families, vk::QueueFlags::COMPUTE), Some(1));
    }

    #[test]
    fn no_matching_family_reports_none() {
        let families = [family(vk::QueueFlags::TRANSFER)];
        assert_eq!(find_queue_family(&families, vk::QueueFlags::GRAPHICS), None);
    }
}
