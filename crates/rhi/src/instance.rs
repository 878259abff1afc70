//! Vulkan instance management.
//!
//! This module handles VkInstance creation, instance extension and layer
//! checks, and the validation debug messenger.
//!
//! # Overview
//!
//! The [`Instance`] struct owns the Vulkan instance. Required extensions are
//! checked against what the loader reports before creation; a missing one is
//! an error rather than a driver failure later on. When validation is
//! requested the Khronos layer must be present, and its messages are routed
//! into `tracing` with severity and category.
//!
//! # Example
//!
//! ```no_run
//! use trigon_rhi::instance::Instance;
//!
//! # fn example() -> trigon_rhi::RhiResult<()> {
//! let extensions = [ash::khr::surface::NAME];
//! let instance = Instance::new(c"Trigon", &extensions, cfg!(debug_assertions))?;
//! let vk_instance = instance.handle();
//! # Ok(())
//! # }
//! ```

use std::ffi::{CStr, c_char};

use ash::{Entry, vk};
use tracing::{debug, error, info, trace, warn};

use crate::error::{RhiError, RhiResult};

/// The Khronos validation layer name.
pub const VALIDATION_LAYER_NAME: &CStr = c"VK_LAYER_KHRONOS_validation";

/// Vulkan instance wrapper with optional validation layer support.
///
/// This struct manages the lifetime of the Vulkan instance and its associated
/// debug utilities. When dropped, it properly cleans up all Vulkan resources.
pub struct Instance {
    /// Vulkan entry point loader
    entry: Entry,
    /// Vulkan instance handle
    instance: ash::Instance,
    /// Debug utils extension loader (only present when validation is enabled)
    debug_utils: Option<ash::ext::debug_utils::Instance>,
    /// Debug messenger handle (only present when validation is enabled)
    debug_messenger: Option<vk::DebugUtilsMessengerEXT>,
}

impl Instance {
    /// Creates a new Vulkan instance.
    ///
    /// # Arguments
    ///
    /// * `app_name` - Application name reported to the driver
    /// * `required_extensions` - Instance extensions the caller needs (surface extensions)
    /// * `enable_validation` - Enable the validation layer and debug messenger
    ///
    /// # Errors
    ///
    /// Returns an error if:
    /// - Vulkan library cannot be loaded
    /// - A required extension is not available ([`RhiError::MissingExtension`])
    /// - Validation is requested but the layer is missing ([`RhiError::MissingLayer`])
    /// - Instance or debug messenger creation fails
    pub fn new(
        app_name: &CStr,
        required_extensions: &[&CStr],
        enable_validation: bool,
    ) -> RhiResult<Self> {
        let entry = unsafe { Entry::load()? };

        let available = unsafe { entry.enumerate_instance_extension_properties(None)? };
        let available_names: Vec<&CStr> = available
            .iter()
            .filter_map(|ext| ext.extension_name_as_c_str().ok())
            .collect();
        debug!("Available instance extensions: {:?}", available_names);

        let mut wanted: Vec<&CStr> = required_extensions.to_vec();
        if enable_validation {
            wanted.push(ash::ext::debug_utils::NAME);
        }

        let missing = missing_names(&wanted, &available_names);
        if !missing.is_empty() {
            return Err(RhiError::MissingExtension(missing.join(", ")));
        }

        // Portability drivers (MoltenVK) are only enumerated when asked for.
        let portability = available_names.contains(&ash::khr::portability_enumeration::NAME);
        if portability {
            wanted.push(ash::khr::portability_enumeration::NAME);
        }

        if enable_validation && !Self::is_validation_layer_available(&entry)? {
            return Err(RhiError::MissingLayer(
                VALIDATION_LAYER_NAME.to_string_lossy().into_owned(),
            ));
        }

        debug!("Enabled instance extensions: {:?}", wanted);

        let app_info = vk::ApplicationInfo::default()
            .application_name(app_name)
            .application_version(vk::make_api_version(0, 1, 0, 0))
            .engine_name(c"Trigon")
            .engine_version(vk::make_api_version(0, 1, 0, 0))
            .api_version(vk::API_VERSION_1_0);

        let extension_ptrs: Vec<*const c_char> = wanted.iter().map(|name| name.as_ptr()).collect();
        let layers = if enable_validation {
            vec![VALIDATION_LAYER_NAME.as_ptr()]
        } else {
            vec![]
        };

        let flags = if portability {
            vk::InstanceCreateFlags::ENUMERATE_PORTABILITY_KHR
        } else {
            vk::InstanceCreateFlags::empty()
        };

        let create_info = vk::InstanceCreateInfo::default()
            .flags(flags)
            .application_info(&app_info)
            .enabled_extension_names(&extension_ptrs)
            .enabled_layer_names(&layers);

        let instance = unsafe { entry.create_instance(&create_info, None)? };

        info!("Vulkan instance created (API version 1.0)");

        let (debug_utils, debug_messenger) = if enable_validation {
            let debug_utils = ash::ext::debug_utils::Instance::new(&entry, &instance);
            let messenger = match Self::setup_debug_messenger(&debug_utils) {
                Ok(messenger) => messenger,
                Err(e) => {
                    unsafe { instance.destroy_instance(None) };
                    return Err(e);
                }
            };
            info!("Validation layers enabled");
            (Some(debug_utils), Some(messenger))
        } else {
            (None, None)
        };

        Ok(Self {
            entry,
            instance,
            debug_utils,
            debug_messenger,
        })
    }

    /// Returns the Vulkan instance handle.
    #[inline]
    pub fn handle(&self) -> &ash::Instance {
        &self.instance
    }

    /// Returns the Vulkan entry point loader.
    #[inline]
    pub fn entry(&self) -> &Entry {
        &self.entry
    }

    /// Returns whether validation layers are enabled.
    #[inline]
    pub fn has_validation(&self) -> bool {
        self.debug_messenger.is_some()
    }

    /// Checks if the Khronos validation layer is available.
    fn is_validation_layer_available(entry: &Entry) -> RhiResult<bool> {
        let available_layers = unsafe { entry.enumerate_instance_layer_properties()? };

        Ok(available_layers
            .iter()
            .any(|layer| layer.layer_name_as_c_str() == Ok(VALIDATION_LAYER_NAME)))
    }

    fn setup_debug_messenger(
        debug_utils: &ash::ext::debug_utils::Instance,
    ) -> RhiResult<vk::DebugUtilsMessengerEXT> {
        let create_info = vk::DebugUtilsMessengerCreateInfoEXT::default()
            .message_severity(
                vk::DebugUtilsMessageSeverityFlagsEXT::VERBOSE
                    | vk::DebugUtilsMessageSeverityFlagsEXT::WARNING
                    | vk::DebugUtilsMessageSeverityFlagsEXT::ERROR,
            )
            .message_type(
                vk::DebugUtilsMessageTypeFlagsEXT::GENERAL
                    | vk::DebugUtilsMessageTypeFlagsEXT::VALIDATION
                    | vk::DebugUtilsMessageTypeFlagsEXT::PERFORMANCE,
            )
            .pfn_user_callback(Some(debug_callback));

        let messenger = unsafe { debug_utils.create_debug_utils_messenger(&create_info, None)? };
        debug!("Debug messenger created");
        Ok(messenger)
    }
}

impl Drop for Instance {
    fn drop(&mut self) {
        unsafe {
            if let (Some(debug_utils), Some(messenger)) = (&self.debug_utils, self.debug_messenger)
            {
                debug_utils.destroy_debug_utils_messenger(messenger, None);
            }
            self.instance.destroy_instance(None);
        }
        info!("Vulkan instance destroyed");
    }
}

/// Returns the names in `required` that do not appear in `available`.
pub fn missing_names(required: &[&CStr], available: &[&CStr]) -> Vec<String> {
    required
        .iter()
        .filter(|name| !available.contains(name))
        .map(|name| name.to_string_lossy().into_owned())
        .collect()
}

fn message_category(message_type: vk::DebugUtilsMessageTypeFlagsEXT) -> &'static str {
    match message_type {
        vk::DebugUtilsMessageTypeFlagsEXT::GENERAL => "general",
        vk::DebugUtilsMessageTypeFlagsEXT::VALIDATION => "validation",
        vk::DebugUtilsMessageTypeFlagsEXT::PERFORMANCE => "performance",
        _ => "unknown",
    }
}

/// Routes validation layer messages into `tracing`.
///
/// # Safety
///
/// Called by the Vulkan loader; `p_callback_data` is either null or valid for
/// the duration of the call.
unsafe extern "system" fn debug_callback(
    message_severity: vk::DebugUtilsMessageSeverityFlagsEXT,
    message_type: vk::DebugUtilsMessageTypeFlagsEXT,
    p_callback_data: *const vk::DebugUtilsMessengerCallbackDataEXT,
    _user_data: *mut std::ffi::c_void,
) -> vk::Bool32 {
    if p_callback_data.is_null() {
        return vk::FALSE;
    }

    let callback_data = unsafe { &*p_callback_data };
    let message = if callback_data.p_message.is_null() {
        std::borrow::Cow::Borrowed("(no message)")
    } else {
        unsafe { CStr::from_ptr(callback_data.p_message).to_string_lossy() }
    };

    let category = message_category(message_type);

    match message_severity {
        vk::DebugUtilsMessageSeverityFlagsEXT::ERROR => error!(category, "[Vulkan] {}", message),
        vk::DebugUtilsMessageSeverityFlagsEXT::WARNING => warn!(category, "[Vulkan] {}", message),
        vk::DebugUtilsMessageSeverityFlagsEXT::INFO => info!(category, "[Vulkan] {}", message),
        _ => trace!(category, "[Vulkan] {}", message),
    }

    // Never abort the call that triggered the message.
    vk::FALSE
}

#[cfg(test)]
mod tests {
    use super::*;

    fn skip_without_driver(result: RhiResult<Instance>) -> Option<Instance> {
        match result {
            Ok(instance) => Some(instance),
            Err(
                e @ (RhiError::LoadingError(_)
                | RhiError::MissingExtension(_)
                | RhiError::MissingLayer(_)
                | RhiError::VulkanError(vk::Result::ERROR_INCOMPATIBLE_DRIVER)),
            ) => {
                eprintln!("Skipping test: {e}");
                None
            }
            Err(e) => panic!("Unexpected error: {e:?}"),
        }
    }

    #[test]
    fn test_instance_creation_without_validation() {
        if let Some(instance) = skip_without_driver(Instance::new(c"test", &[], false)) {
            assert!(!instance.has_validation());
        }
    }

    #[test]
    fn test_instance_creation_with_validation() {
        if let Some(instance) = skip_without_driver(Instance::new(c"test", &[], true)) {
            assert!(instance.has_validation());
            assert!(instance.debug_utils.is_some());
        }
    }

    #[test]
    fn test_unknown_extension_is_reported() {
        match Instance::new(c"test", &[c"VK_TRIGON_not_a_real_extension"], false) {
            Err(RhiError::MissingExtension(names)) => {
                assert!(names.contains("VK_TRIGON_not_a_real_extension"));
            }
            Err(RhiError::LoadingError(_)) => eprintln!("Skipping test: Vulkan not available"),
            other => panic!("expected MissingExtension, got {:?}", other.err()),
        }
    }

    #[test]
    fn test_missing_names() {
        let available = [ash::khr::surface::NAME, ash::ext::debug_utils::NAME];
        let required = [ash::khr::surface::NAME, ash::khr::swapchain::NAME];

        assert_eq!(
            missing_names(&required, &available),
            vec!["VK_KHR_swapchain".to_string()]
        );
        assert!(missing_names(&available, &available).is_empty());
    }

    #[test]
    fn test_message_category() {
        assert_eq!(
            message_category(vk::DebugUtilsMessageTypeFlagsEXT::VALIDATION),
            "validation"
        );
        assert_eq!(
            message_category(vk::DebugUtilsMessageTypeFlagsEXT::PERFORMANCE),
            "performance"
        );
    }
}
