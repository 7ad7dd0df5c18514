// Vulkan Device - Core GPU interface
//
// Responsibilities, in creation order:
// - Instance creation (surface extensions for the window's platform, optional validation)
// - Surface creation from the native window handle
// - Physical device selection (first GPU with a graphics+present queue family)
// - Logical device + queue creation
// - Memory allocator setup

use anyhow::{Context, Result};
use ash::{vk, Entry};
use gpu_allocator::vulkan::{Allocator, AllocatorCreateDesc};
use parking_lot::Mutex;
use raw_window_handle::{RawDisplayHandle, RawWindowHandle};
use std::ffi::{CStr, CString};
use std::mem::ManuallyDrop;
use std::sync::Arc;

use super::surface;

/// Instance-level objects: everything that must outlive the logical device.
///
/// Dropping this destroys surface, debug messenger and instance in that order,
/// so a failure anywhere after instance creation cleans up on its own.
struct InstanceContext {
    entry: Entry,
    instance: ash::Instance,
    debug_utils: Option<(ash::ext::debug_utils::Instance, vk::DebugUtilsMessengerEXT)>,
    surface_loader: ash::khr::surface::Instance,
    surface: vk::SurfaceKHR,
}

impl Drop for InstanceContext {
    fn drop(&mut self) {
        unsafe {
            if self.surface != vk::SurfaceKHR::null() {
                self.surface_loader.destroy_surface(self.surface, None);
            }
            if let Some((debug_utils, messenger)) = self.debug_utils.take() {
                debug_utils.destroy_debug_utils_messenger(messenger, None);
            }
            self.instance.destroy_instance(None);
        }
    }
}

/// Vulkan device wrapper with automatic cleanup
pub struct VulkanDevice {
    // Dropped explicitly (allocator, then device) before `context`
    allocator: ManuallyDrop<Mutex<Allocator>>,
    pub device: ash::Device,
    pub physical_device: vk::PhysicalDevice,

    // Queue handles: one family serves graphics and presentation
    pub queue: vk::Queue,
    pub queue_family: u32,

    // Device properties (cached for logging and limits)
    pub properties: vk::PhysicalDeviceProperties,

    context: InstanceContext,
}

impl VulkanDevice {
    /// Create the instance, surface and device for a native window.
    ///
    /// # Arguments
    /// * `app_name` - Application name reported to the driver
    /// * `enable_validation` - Enable Vulkan validation layers (debug only)
    /// * `display` / `window` - Raw handles of the window to present into
    pub fn new(
        app_name: &str,
        enable_validation: bool,
        display: RawDisplayHandle,
        window: RawWindowHandle,
    ) -> Result<Arc<Self>> {
        log::info!("Creating Vulkan device: {}", app_name);

        // Step 1: Load Vulkan library
        let entry = unsafe { Entry::load() }
            .context("Failed to load Vulkan library. Is Vulkan installed?")?;

        // Step 2: Create instance
        let (instance, enable_validation) =
            Self::create_instance(&entry, app_name, enable_validation, display)?;
        let surface_loader = ash::khr::surface::Instance::new(&entry, &instance);
        let mut context = InstanceContext {
            entry,
            instance,
            debug_utils: None,
            surface_loader,
            surface: vk::SurfaceKHR::null(),
        };

        // Step 3: Setup debug messenger if validation enabled
        if enable_validation {
            context.debug_utils = Some(Self::setup_debug_messenger(&context.entry, &context.instance)?);
        }

        // Step 4: Surface from the window handle
        context.surface = unsafe {
            surface::create_surface(&context.entry, &context.instance, display, window)
        }?;

        // Step 5: Pick physical device (GPU)
        let (physical_device, queue_family) = Self::pick_physical_device(&context)?;

        // Step 6: Create logical device
        let (device, queue) =
            Self::create_logical_device(&context.instance, physical_device, queue_family)?;

        let properties = unsafe {
            context.instance.get_physical_device_properties(physical_device)
        };

        log::info!("Selected GPU: {}",
            unsafe { CStr::from_ptr(properties.device_name.as_ptr()) }
                .to_string_lossy());
        log::info!("API Version: {}.{}.{}",
            vk::api_version_major(properties.api_version),
            vk::api_version_minor(properties.api_version),
            vk::api_version_patch(properties.api_version));

        // Step 7: Create memory allocator
        let allocator = match Self::create_allocator(&context.instance, physical_device, &device) {
            Ok(allocator) => allocator,
            Err(e) => {
                unsafe { device.destroy_device(None) };
                return Err(e);
            }
        };

        Ok(Arc::new(Self {
            allocator: ManuallyDrop::new(Mutex::new(allocator)),
            device,
            physical_device,
            queue,
            queue_family,
            properties,
            context,
        }))
    }

    pub fn instance(&self) -> &ash::Instance {
        &self.context.instance
    }

    pub fn surface(&self) -> vk::SurfaceKHR {
        self.context.surface
    }

    pub fn surface_loader(&self) -> &ash::khr::surface::Instance {
        &self.context.surface_loader
    }

    /// The shared GPU memory allocator
    pub fn allocator(&self) -> &Mutex<Allocator> {
        &self.allocator
    }

    fn create_instance(
        entry: &Entry,
        app_name: &str,
        enable_validation: bool,
        display: RawDisplayHandle,
    ) -> Result<(ash::Instance, bool)> {
        let app_name_cstr = CString::new(app_name)?;
        let engine_name = CString::new("legacy-vk")?;

        let app_info = vk::ApplicationInfo::default()
            .application_name(&app_name_cstr)
            .application_version(vk::make_api_version(0, 0, 1, 0))
            .engine_name(&engine_name)
            .engine_version(vk::make_api_version(0, 0, 1, 0))
            .api_version(vk::API_VERSION_1_1);

        // Surface extensions for this platform
        let mut extensions = surface::required_instance_extensions(display)?;
        if enable_validation {
            extensions.push(ash::ext::debug_utils::NAME.as_ptr());
        }

        let layer_names = if enable_validation {
            vec![c"VK_LAYER_KHRONOS_validation".as_ptr()]
        } else {
            vec![]
        };

        let create_info = vk::InstanceCreateInfo::default()
            .application_info(&app_info)
            .enabled_extension_names(&extensions)
            .enabled_layer_names(&layer_names);

        // Returns whether validation actually ended up enabled
        match unsafe { entry.create_instance(&create_info, None) } {
            Ok(instance) => Ok((instance, enable_validation)),
            // Validation layers are often missing on end-user machines
            Err(e) if enable_validation => {
                log::warn!("Instance creation with validation failed ({:?}), retrying without", e);
                let extensions = surface::required_instance_extensions(display)?;
                let create_info = vk::InstanceCreateInfo::default()
                    .application_info(&app_info)
                    .enabled_extension_names(&extensions);
                let instance = unsafe { entry.create_instance(&create_info, None) }
                    .context("Failed to create Vulkan instance")?;
                Ok((instance, false))
            }
            Err(e) => Err(e).context("Failed to create Vulkan instance"),
        }
    }

    fn setup_debug_messenger(
        entry: &Entry,
        instance: &ash::Instance,
    ) -> Result<(ash::ext::debug_utils::Instance, vk::DebugUtilsMessengerEXT)> {
        let debug_utils = ash::ext::debug_utils::Instance::new(entry, instance);

        let create_info = vk::DebugUtilsMessengerCreateInfoEXT::default()
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

        let messenger = unsafe {
            debug_utils.create_debug_utils_messenger(&create_info, None)
        }
        .context("Failed to create debug messenger")?;

        Ok((debug_utils, messenger))
    }

    /// First device with a queue family that does both graphics and present.
    fn pick_physical_device(context: &InstanceContext) -> Result<(vk::PhysicalDevice, u32)> {
        let devices = unsafe { context.instance.enumerate_physical_devices() }?;

        if devices.is_empty() {
            anyhow::bail!("No Vulkan-capable GPU found");
        }

        for device in devices {
            let queue_families = unsafe {
                context.instance.get_physical_device_queue_family_properties(device)
            };

            for (index, family) in queue_families.iter().enumerate() {
                if !family.queue_flags.contains(vk::QueueFlags::GRAPHICS) {
                    continue;
                }
                let index = index as u32;
                let present = unsafe {
                    context.surface_loader.get_physical_device_surface_support(
                        device,
                        index,
                        context.surface,
                    )
                }
                .unwrap_or(false);

                if present {
                    return Ok((device, index));
                }
            }
        }

        anyhow::bail!("No GPU with a graphics queue that can present to this surface")
    }

    fn create_logical_device(
        instance: &ash::Instance,
        physical_device: vk::PhysicalDevice,
        queue_family: u32,
    ) -> Result<(ash::Device, vk::Queue)> {
        let queue_priorities = [1.0];
        let queue_create_info = vk::DeviceQueueCreateInfo::default()
            .queue_family_index(queue_family)
            .queue_priorities(&queue_priorities);

        let extensions = [ash::khr::swapchain::NAME.as_ptr()];

        let create_info = vk::DeviceCreateInfo::default()
            .queue_create_infos(std::slice::from_ref(&queue_create_info))
            .enabled_extension_names(&extensions);

        let device = unsafe {
            instance.create_device(physical_device, &create_info, None)
        }
        .context("Failed to create logical device")?;

        let queue = unsafe { device.get_device_queue(queue_family, 0) };

        Ok((device, queue))
    }

    fn create_allocator(
        instance: &ash::Instance,
        physical_device: vk::PhysicalDevice,
        device: &ash::Device,
    ) -> Result<Allocator> {
        let allocator = Allocator::new(&AllocatorCreateDesc {
            instance: instance.clone(),
            device: device.clone(),
            physical_device,
            debug_settings: Default::default(),
            buffer_device_address: false,
            allocation_sizes: Default::default(),
        })
        .context("Failed to create GPU allocator")?;

        Ok(allocator)
    }

    /// Wait for device to be idle (e.g., before cleanup)
    pub fn wait_idle(&self) -> Result<()> {
        unsafe { self.device.device_wait_idle() }?;
        Ok(())
    }
}

impl Drop for VulkanDevice {
    fn drop(&mut self) {
        log::info!("Destroying Vulkan device...");

        let _ = self.wait_idle();

        // Allocator frees its memory blocks through the device, so it goes first.
        // `context` (surface, messenger, instance) drops after this body.
        unsafe {
            ManuallyDrop::drop(&mut self.allocator);
            self.device.destroy_device(None);
        }
    }
}

// Debug callback for validation layers
unsafe extern "system" fn debug_callback(
    message_severity: vk::DebugUtilsMessageSeverityFlagsEXT,
    _message_type: vk::DebugUtilsMessageTypeFlagsEXT,
    p_callback_data: *const vk::DebugUtilsMessengerCallbackDataEXT<'_>,
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
