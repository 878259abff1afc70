//! Physical device (GPU) selection.
//!
//! # Overview
//!
//! Every adapter the instance reports is turned into an [`AdapterProbe`]: the
//! handful of facts selection cares about. Scoring is then a pure function of
//! the probe:
//!
//! - adapters missing a geometry shader, a graphics queue family, a present
//!   queue family, a required device extension, surface formats or present
//!   modes score 0 and are never picked
//! - otherwise the score is `1000` for discrete GPUs plus the maximum 2D
//!   image dimension
//!
//! The highest score wins; on a tie the adapter enumerated first is kept.
//!
//! # Example
//!
//! ```no_run
//! use trigon_rhi::instance::Instance;
//! use trigon_rhi::physical_device::select_physical_device;
//! use ash::vk;
//!
//! # fn example(instance: &Instance, surface: vk::SurfaceKHR) -> trigon_rhi::RhiResult<()> {
//! let surface_loader = ash::khr::surface::Instance::new(instance.entry(), instance.handle());
//! let adapter = select_physical_device(
//!     instance.handle(),
//!     &surface_loader,
//!     surface,
//!     &[ash::khr::swapchain::NAME],
//! )?;
//! println!("Selected GPU: {}", adapter.device_name());
//! # Ok(())
//! # }
//! ```

use std::ffi::CStr;

use ash::vk;
use tracing::{debug, info, warn};

use crate::error::{RhiError, RhiResult};
use crate::instance::missing_names;

/// Queue family indices for graphics and presentation.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct QueueFamilyIndices {
    /// Index of the queue family that supports graphics operations.
    pub graphics_family: Option<u32>,
    /// Index of the queue family that supports presentation to the surface.
    pub present_family: Option<u32>,
}

impl QueueFamilyIndices {
    /// Checks if both graphics and present families were found.
    #[inline]
    pub fn is_complete(&self) -> bool {
        self.graphics_family.is_some() && self.present_family.is_some()
    }

    /// Returns the unique queue family indices, graphics first.
    pub fn unique_families(&self) -> Vec<u32> {
        let mut families = Vec::with_capacity(2);

        if let Some(graphics) = self.graphics_family {
            families.push(graphics);
        }
        if let Some(present) = self.present_family
            && !families.contains(&present)
        {
            families.push(present);
        }

        families
    }
}

/// Why an adapter can never be selected.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Rejection {
    /// No geometry shader support.
    NoGeometryShader,
    /// No queue family with graphics support.
    NoGraphicsQueue,
    /// No queue family that can present to the surface.
    NoPresentQueue,
    /// One or more required device extensions are missing.
    MissingExtensions,
    /// The surface reports no formats for this adapter.
    NoSurfaceFormats,
    /// The surface reports no present modes for this adapter.
    NoPresentModes,
}

/// The facts adapter selection is based on.
#[derive(Clone, Debug, Default)]
pub struct AdapterProbe {
    /// Device name as reported by the driver.
    pub name: String,
    /// Whether this is a discrete GPU.
    pub discrete: bool,
    /// `maxImageDimension2D` limit.
    pub max_image_dimension_2d: u32,
    /// Geometry shader feature support.
    pub geometry_shader: bool,
    /// Resolved queue families.
    pub queue_families: QueueFamilyIndices,
    /// Required device extensions this adapter does not support.
    pub missing_extensions: Vec<String>,
    /// Number of surface formats offered.
    pub format_count: usize,
    /// Number of present modes offered.
    pub present_mode_count: usize,
}

impl AdapterProbe {
    /// Returns the first reason this adapter is disqualified, if any.
    pub fn rejection(&self) -> Option<Rejection> {
        if !self.geometry_shader {
            Some(Rejection::NoGeometryShader)
        } else if self.queue_families.graphics_family.is_none() {
            Some(Rejection::NoGraphicsQueue)
        } else if self.queue_families.present_family.is_none() {
            Some(Rejection::NoPresentQueue)
        } else if !self.missing_extensions.is_empty() {
            Some(Rejection::MissingExtensions)
        } else if self.format_count == 0 {
            Some(Rejection::NoSurfaceFormats)
        } else if self.present_mode_count == 0 {
            Some(Rejection::NoPresentModes)
        } else {
            None
        }
    }
}

/// Scores an adapter; 0 means disqualified.
pub fn score_adapter(probe: &AdapterProbe) -> u32 {
    if probe.rejection().is_some() {
        return 0;
    }

    let base: u32 = if probe.discrete { 1000 } else { 0 };
    base.saturating_add(probe.max_image_dimension_2d)
}

/// Returns the index of the best adapter, or `None` if none scores above 0.
///
/// Only a strictly greater score replaces the current best, so the first
/// enumerated adapter wins ties.
pub fn pick_best(probes: &[AdapterProbe]) -> Option<usize> {
    let mut best: Option<(usize, u32)> = None;

    for (index, probe) in probes.iter().enumerate() {
        let score = score_adapter(probe);
        if score > 0 && best.is_none_or(|(_, best_score)| score > best_score) {
            best = Some((index, score));
        }
    }

    best.map(|(index, _)| index)
}

/// Information about the selected physical device.
#[derive(Clone)]
pub struct PhysicalDeviceInfo {
    /// Vulkan physical device handle.
    pub device: vk::PhysicalDevice,
    /// Device properties (name, limits, API version, etc.).
    pub properties: vk::PhysicalDeviceProperties,
    /// Memory properties (heap sizes, memory types).
    pub memory_properties: vk::PhysicalDeviceMemoryProperties,
    /// Queue family indices for graphics and presentation.
    pub queue_families: QueueFamilyIndices,
}

impl PhysicalDeviceInfo {
    /// Returns the device name as a string.
    pub fn device_name(&self) -> &str {
        self.properties
            .device_name_as_c_str()
            .ok()
            .and_then(|name| name.to_str().ok())
            .unwrap_or("Unknown Device")
    }

    /// Returns a human-readable string for the device type.
    pub fn device_type_name(&self) -> &'static str {
        match self.properties.device_type {
            vk::PhysicalDeviceType::DISCRETE_GPU => "Discrete GPU",
            vk::PhysicalDeviceType::INTEGRATED_GPU => "Integrated GPU",
            vk::PhysicalDeviceType::VIRTUAL_GPU => "Virtual GPU",
            vk::PhysicalDeviceType::CPU => "CPU",
            _ => "Other",
        }
    }

    /// Returns the graphics queue family index.
    #[inline]
    pub fn graphics_family(&self) -> u32 {
        self.queue_families.graphics_family.unwrap_or_default()
    }

    /// Returns the present queue family index.
    #[inline]
    pub fn present_family(&self) -> u32 {
        self.queue_families.present_family.unwrap_or_default()
    }
}

impl std::fmt::Display for PhysicalDeviceInfo {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{} ({})", self.device_name(), self.device_type_name())
    }
}

impl std::fmt::Debug for PhysicalDeviceInfo {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("PhysicalDeviceInfo")
            .field("name", &self.device_name())
            .field("type", &self.device_type_name())
            .field("queue_families", &self.queue_families)
            .finish()
    }
}

/// Selects the most suitable physical device for rendering to `surface`.
///
/// # Errors
///
/// - [`RhiError::MissingExtension`] if nothing qualifies and some adapter was
///   rejected for missing device extensions
/// - [`RhiError::NoSuitableGpu`] if nothing qualifies otherwise
pub fn select_physical_device(
    instance: &ash::Instance,
    surface_loader: &ash::khr::surface::Instance,
    surface: vk::SurfaceKHR,
    required_extensions: &[&CStr],
) -> RhiResult<PhysicalDeviceInfo> {
    let devices = unsafe { instance.enumerate_physical_devices()? };

    if devices.is_empty() {
        warn!("No Vulkan-capable GPUs found");
        return Err(RhiError::NoSuitableGpu);
    }

    info!("Found {} GPU(s)", devices.len());

    let mut probes = Vec::with_capacity(devices.len());
    for &device in &devices {
        let probe = probe_adapter(instance, surface_loader, surface, device, required_extensions)?;
        match probe.rejection() {
            Some(reason) => info!("Adapter '{}' scored 0 ({:?})", probe.name, reason),
            None => info!("Adapter '{}' scored {}", probe.name, score_adapter(&probe)),
        }
        probes.push(probe);
    }

    let Some(best) = pick_best(&probes) else {
        let missing: Vec<&str> = probes
            .iter()
            .filter(|p| p.rejection() == Some(Rejection::MissingExtensions))
            .flat_map(|p| p.missing_extensions.iter().map(String::as_str))
            .collect();

        if !missing.is_empty() {
            return Err(RhiError::MissingExtension(missing.join(", ")));
        }
        warn!("No suitable GPU found with required capabilities");
        return Err(RhiError::NoSuitableGpu);
    };

    let device = devices[best];
    let selected = PhysicalDeviceInfo {
        device,
        properties: unsafe { instance.get_physical_device_properties(device) },
        memory_properties: unsafe { instance.get_physical_device_memory_properties(device) },
        queue_families: probes[best].queue_families,
    };

    info!(
        "Selected GPU: '{}' ({}), score {}",
        selected.device_name(),
        selected.device_type_name(),
        score_adapter(&probes[best])
    );

    Ok(selected)
}

fn probe_adapter(
    instance: &ash::Instance,
    surface_loader: &ash::khr::surface::Instance,
    surface: vk::SurfaceKHR,
    device: vk::PhysicalDevice,
    required_extensions: &[&CStr],
) -> RhiResult<AdapterProbe> {
    let properties = unsafe { instance.get_physical_device_properties(device) };
    let features = unsafe { instance.get_physical_device_features(device) };

    let name = properties
        .device_name_as_c_str()
        .map(|name| name.to_string_lossy().into_owned())
        .unwrap_or_else(|_| "Unknown".to_string());

    let extensions = unsafe { instance.enumerate_device_extension_properties(device)? };
    let extension_names: Vec<&CStr> = extensions
        .iter()
        .filter_map(|ext| ext.extension_name_as_c_str().ok())
        .collect();
    let missing_extensions = missing_names(required_extensions, &extension_names);

    // Surface query failures count as "nothing offered".
    let format_count = unsafe {
        surface_loader
            .get_physical_device_surface_formats(device, surface)
            .map(|formats| formats.len())
            .unwrap_or(0)
    };
    let present_mode_count = unsafe {
        surface_loader
            .get_physical_device_surface_present_modes(device, surface)
            .map(|modes| modes.len())
            .unwrap_or(0)
    };

    let queue_families = find_queue_families(instance, device, surface, surface_loader);

    debug!(
        "Adapter '{}': discrete={}, maxImageDimension2D={}, families={:?}",
        name,
        properties.device_type == vk::PhysicalDeviceType::DISCRETE_GPU,
        properties.limits.max_image_dimension2_d,
        queue_families
    );

    Ok(AdapterProbe {
        name,
        discrete: properties.device_type == vk::PhysicalDeviceType::DISCRETE_GPU,
        max_image_dimension_2d: properties.limits.max_image_dimension2_d,
        geometry_shader: features.geometry_shader == vk::TRUE,
        queue_families,
        missing_extensions,
        format_count,
        present_mode_count,
    })
}

/// Finds graphics and present queue families, preferring a single family
/// that supports both.
fn find_queue_families(
    instance: &ash::Instance,
    device: vk::PhysicalDevice,
    surface: vk::SurfaceKHR,
    surface_loader: &ash::khr::surface::Instance,
) -> QueueFamilyIndices {
    let queue_families = unsafe { instance.get_physical_device_queue_family_properties(device) };

    let mut indices = QueueFamilyIndices::default();

    for (i, family) in queue_families.iter().enumerate() {
        let i = i as u32;

        if family.queue_count == 0 {
            continue;
        }

        let has_graphics = family.queue_flags.contains(vk::QueueFlags::GRAPHICS);
        let present_support = unsafe {
            surface_loader
                .get_physical_device_surface_support(device, i, surface)
                .unwrap_or(false)
        };

        if has_graphics && present_support {
            return QueueFamilyIndices {
                graphics_family: Some(i),
                present_family: Some(i),
            };
        }
        if has_graphics && indices.graphics_family.is_none() {
            indices.graphics_family = Some(i);
        }
        if present_support && indices.present_family.is_none() {
            indices.present_family = Some(i);
        }
    }

    indices
}
