//! Swapchain configuration policy.
//!
//! Everything here is a pure decision over what the surface reports, so the
//! choices can be checked without a GPU. [`crate::presentation`] turns a
//! [`PresentationPlan`] into live Vulkan objects.
//!
//! # Policy
//!
//! - Surface format: `B8G8R8A8_SRGB` with `SRGB_NONLINEAR`, else the first listed
//! - Present mode: `MAILBOX`, else `FIFO` (always available)
//! - Extent: the surface's current extent when defined, else the desired size
//!   clamped to the surface's limits
//! - Image count: one more than the minimum, capped by the maximum when set
//! - Sharing: concurrent across graphics and present families when they
//!   differ, exclusive otherwise

use ash::vk;
use tracing::{debug, warn};

use crate::error::{RhiError, RhiResult};

/// Swapchain surface support details.
#[derive(Debug, Clone)]
pub struct SwapchainSupportDetails {
    /// Surface capabilities (min/max image count, extents, transforms, etc.)
    pub capabilities: vk::SurfaceCapabilitiesKHR,
    /// Supported surface formats (format and color space combinations)
    pub formats: Vec<vk::SurfaceFormatKHR>,
    /// Supported present modes (FIFO, MAILBOX, IMMEDIATE, etc.)
    pub present_modes: Vec<vk::PresentModeKHR>,
}

impl SwapchainSupportDetails {
    /// Queries swapchain support details for a physical device and surface.
    pub fn query(
        physical_device: vk::PhysicalDevice,
        surface: vk::SurfaceKHR,
        surface_loader: &ash::khr::surface::Instance,
    ) -> RhiResult<Self> {
        let capabilities = unsafe {
            surface_loader.get_physical_device_surface_capabilities(physical_device, surface)?
        };

        let formats = unsafe {
            surface_loader.get_physical_device_surface_formats(physical_device, surface)?
        };

        let present_modes = unsafe {
            surface_loader.get_physical_device_surface_present_modes(physical_device, surface)?
        };

        debug!(
            "Swapchain support: {} formats, {} present modes, image count {}..{}",
            formats.len(),
            present_modes.len(),
            capabilities.min_image_count,
            capabilities.max_image_count
        );

        Ok(Self {
            capabilities,
            formats,
            present_modes,
        })
    }

    /// Returns true if at least one format and one present mode are available.
    #[inline]
    pub fn is_adequate(&self) -> bool {
        !self.formats.is_empty() && !self.present_modes.is_empty()
    }
}

/// How swapchain images are shared between queue families.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum ImageSharing {
    /// Graphics and present use the same family.
    Exclusive,
    /// Images are shared by the graphics and present families.
    Concurrent([u32; 2]),
}

impl ImageSharing {
    /// Picks the sharing mode for the given graphics and present families.
    pub fn for_families(graphics_family: u32, present_family: u32) -> Self {
        if graphics_family == present_family {
            Self::Exclusive
        } else {
            Self::Concurrent([graphics_family, present_family])
        }
    }

    /// Converts to the Vulkan sharing mode.
    pub fn mode(&self) -> vk::SharingMode {
        match self {
            Self::Exclusive => vk::SharingMode::EXCLUSIVE,
            Self::Concurrent(_) => vk::SharingMode::CONCURRENT,
        }
    }

    /// Queue family indices to declare on the swapchain (empty when exclusive).
    pub fn queue_family_indices(&self) -> &[u32] {
        match self {
            Self::Exclusive => &[],
            Self::Concurrent(families) => families,
        }
    }
}

/// Every parameter of a swapchain, decided up front.
#[derive(Clone, Copy, Debug)]
pub struct PresentationPlan {
    /// Chosen surface format and color space.
    pub surface_format: vk::SurfaceFormatKHR,
    /// Chosen present mode.
    pub present_mode: vk::PresentModeKHR,
    /// Image extent.
    pub extent: vk::Extent2D,
    /// Minimum number of images requested.
    pub image_count: u32,
    /// Queue family sharing.
    pub sharing: ImageSharing,
    /// Transform the surface currently applies.
    pub pre_transform: vk::SurfaceTransformFlagsKHR,
}

impl PresentationPlan {
    /// Applies the swapchain policy to `support` for a window of the desired size.
    ///
    /// # Errors
    ///
    /// Returns [`RhiError::SurfaceError`] if the surface offers no formats or
    /// no present modes.
    pub fn new(
        support: &SwapchainSupportDetails,
        graphics_family: u32,
        present_family: u32,
        desired_width: u32,
        desired_height: u32,
    ) -> RhiResult<Self> {
        if !support.is_adequate() {
            return Err(RhiError::SurfaceError(
                "surface offers no formats or present modes".to_string(),
            ));
        }

        Ok(Self {
            surface_format: choose_surface_format(&support.formats),
            present_mode: choose_present_mode(&support.present_modes),
            extent: choose_extent(&support.capabilities, desired_width, desired_height),
            image_count: choose_image_count(&support.capabilities),
            sharing: ImageSharing::for_families(graphics_family, present_family),
            pre_transform: support.capabilities.current_transform,
        })
    }
}

/// Chooses the surface format: sRGB BGRA if offered, else the first listed.
pub fn choose_surface_format(formats: &[vk::SurfaceFormatKHR]) -> vk::SurfaceFormatKHR {
    let preferred = formats.iter().find(|f| {
        f.format == vk::Format::B8G8R8A8_SRGB && f.color_space == vk::ColorSpaceKHR::SRGB_NONLINEAR
    });

    match (preferred, formats.first()) {
        (Some(&format), _) => format,
        (None, Some(&first)) => {
            debug!("Preferred surface format unavailable, using {:?}", first.format);
            first
        }
        (None, None) => {
            warn!("Surface reported no formats, assuming B8G8R8A8_SRGB");
            vk::SurfaceFormatKHR {
                format: vk::Format::B8G8R8A8_SRGB,
                color_space: vk::ColorSpaceKHR::SRGB_NONLINEAR,
            }
        }
    }
}

/// Chooses the present mode: MAILBOX if offered, else FIFO.
pub fn choose_present_mode(present_modes: &[vk::PresentModeKHR]) -> vk::PresentModeKHR {
    if present_modes.contains(&vk::PresentModeKHR::MAILBOX) {
        vk::PresentModeKHR::MAILBOX
    } else {
        vk::PresentModeKHR::FIFO
    }
}

/// Chooses the swapchain extent.
///
/// A current extent of `u32::MAX` means the surface size is determined by
/// the swapchain, so the desired size is clamped to the surface's limits.
pub fn choose_extent(
    capabilities: &vk::SurfaceCapabilitiesKHR,
    width: u32,
    height: u32,
) -> vk::Extent2D {
    if capabilities.current_extent.width != u32::MAX {
        return capabilities.current_extent;
    }

    vk::Extent2D {
        // Not `clamp`: drivers may briefly report min > max around minimize.
        width: width
            .max(capabilities.min_image_extent.width)
            .min(capabilities.max_image_extent.width),
        height: height
            .max(capabilities.min_image_extent.height)
            .min(capabilities.max_image_extent.height),
    }
}

/// One image more than the minimum, capped when the surface sets a maximum.
pub fn choose_image_count(capabilities: &vk::SurfaceCapabilitiesKHR) -> u32 {
    let preferred = capabilities.min_image_count + 1;

    // A max_image_count of 0 means no maximum.
    if capabilities.max_image_count > 0 {
        preferred.min(capabilities.max_image_count)
    } else {
        preferred
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn format(format: vk::Format, color_space: vk::ColorSpaceKHR) -> vk::SurfaceFormatKHR {
        vk::SurfaceFormatKHR {
            format,
            color_space,
        }
    }

    fn resizable_surface() -> SwapchainSupportDetails {
        SwapchainSupportDetails {
            capabilities: vk::SurfaceCapabilitiesKHR {
                min_image_count: 2,
                max_image_count: 0,
                current_extent: vk::Extent2D {
                    width: u32::MAX,
                    height: u32::MAX,
                },
                min_image_extent: vk::Extent2D {
                    width: 1,
                    height: 1,
                },
                max_image_extent: vk::Extent2D {
                    width: 4096,
                    height: 4096,
                },
                ..Default::default()
            },
            formats: vec![format(
                vk::Format::B8G8R8A8_SRGB,
                vk::ColorSpaceKHR::SRGB_NONLINEAR,
            )],
            present_modes: vec![vk::PresentModeKHR::FIFO],
        }
    }

    #[test]
    fn test_choose_surface_format_prefers_srgb() {
        let formats = [
            format(vk::Format::R8G8B8A8_UNORM, vk::ColorSpaceKHR::SRGB_NONLINEAR),
            format(vk::Format::B8G8R8A8_SRGB, vk::ColorSpaceKHR::SRGB_NONLINEAR),
        ];

        let selected = choose_surface_format(&formats);
        assert_eq!(selected.format, vk::Format::B8G8R8A8_SRGB);
    }

    #[test]
    fn test_choose_surface_format_falls_back_to_first() {
        // B8G8R8A8_UNORM is not the preferred pair; the first entry wins.
        let formats = [
            format(vk::Format::R16G16B16A16_SFLOAT, vk::ColorSpaceKHR::EXTENDED_SRGB_LINEAR_EXT),
            format(vk::Format::B8G8R8A8_UNORM, vk::ColorSpaceKHR::SRGB_NONLINEAR),
            format(vk::Format::B8G8R8A8_SRGB, vk::ColorSpaceKHR::DISPLAY_P3_NONLINEAR_EXT),
        ];

        let selected = choose_surface_format(&formats);
        assert_eq!(selected, formats[0]);
    }

    #[test]
    fn test_choose_present_mode() {
        let modes = [
            vk::PresentModeKHR::FIFO,
            vk::PresentModeKHR::MAILBOX,
            vk::PresentModeKHR::IMMEDIATE,
        ];
        assert_eq!(choose_present_mode(&modes), vk::PresentModeKHR::MAILBOX);

        assert_eq!(
            choose_present_mode(&[vk::PresentModeKHR::FIFO]),
            vk::PresentModeKHR::FIFO
        );
        assert_eq!(
            choose_present_mode(&[vk::PresentModeKHR::IMMEDIATE, vk::PresentModeKHR::FIFO]),
            vk::PresentModeKHR::FIFO
        );
    }

    #[test]
    fn test_choose_extent_uses_current() {
        let capabilities = vk::SurfaceCapabilitiesKHR {
            current_extent: vk::Extent2D {
                width: 1920,
                height: 1080,
            },
            ..Default::default()
        };

        let extent = choose_extent(&capabilities, 800, 600);
        assert_eq!((extent.width, extent.height), (1920, 1080));
    }

    #[test]
    fn test_choose_extent_clamps_to_limits() {
        let capabilities = vk::SurfaceCapabilitiesKHR {
            current_extent: vk::Extent2D {
                width: u32::MAX,
                height: u32::MAX,
            },
            min_image_extent: vk::Extent2D {
                width: 100,
                height: 100,
            },
            max_image_extent: vk::Extent2D {
                width: 2000,
                height: 2000,
            },
            ..Default::default()
        };

        let extent = choose_extent(&capabilities, 3000, 50);
        assert_eq!((extent.width, extent.height), (2000, 100));

        let extent = choose_extent(&capabilities, 800, 600);
        assert_eq!((extent.width, extent.height), (800, 600));
    }

    #[test]
    fn test_choose_extent_inverted_limits() {
        let capabilities = vk::SurfaceCapabilitiesKHR {
            current_extent: vk::Extent2D {
                width: u32::MAX,
                height: u32::MAX,
            },
            min_image_extent: vk::Extent2D {
                width: 500,
                height: 300,
            },
            max_image_extent: vk::Extent2D {
                width: 400,
                height: 200,
            },
            ..Default::default()
        };

        let extent = choose_extent(&capabilities, 800, 100);
        assert_eq!((extent.width, extent.height), (400, 200));
    }

    #[test]
    fn test_choose_image_count() {
        let capped = vk::SurfaceCapabilitiesKHR {
            min_image_count: 2,
            max_image_count: 2,
            ..Default::default()
        };
        assert_eq!(choose_image_count(&capped), 2);

        let roomy = vk::SurfaceCapabilitiesKHR {
            min_image_count: 2,
            max_image_count: 8,
            ..Default::default()
        };
        assert_eq!(choose_image_count(&roomy), 3);

        let unlimited = vk::SurfaceCapabilitiesKHR {
            min_image_count: 3,
            max_image_count: 0,
            ..Default::default()
        };
        assert_eq!(choose_image_count(&unlimited), 4);
    }

    #[test]
    fn test_image_sharing() {
        let shared = ImageSharing::for_families(0, 0);
        assert_eq!(shared, ImageSharing::Exclusive);
        assert_eq!(shared.mode(), vk::SharingMode::EXCLUSIVE);
        assert!(shared.queue_family_indices().is_empty());

        let split = ImageSharing::for_families(0, 2);
        assert_eq!(split.mode(), vk::SharingMode::CONCURRENT);
        assert_eq!(split.queue_family_indices(), &[0, 2]);
    }

    #[test]
    fn test_plan_follows_window_size() {
        let support = resizable_surface();

        let plan = PresentationPlan::new(&support, 0, 0, 1024, 700).unwrap();
        assert_eq!((plan.extent.width, plan.extent.height), (1024, 700));
        assert_eq!(plan.image_count, 3);
        assert_eq!(plan.present_mode, vk::PresentModeKHR::FIFO);
        assert_eq!(plan.sharing, ImageSharing::Exclusive);

        let plan = PresentationPlan::new(&support, 0, 1, 5000, 20).unwrap();
        assert_eq!((plan.extent.width, plan.extent.height), (4096, 20));
        assert_eq!(plan.sharing, ImageSharing::Concurrent([0, 1]));
    }

    #[test]
    fn test_plan_rejects_inadequate_surface() {
        let mut support = resizable_surface();
        support.present_modes.clear();
        assert!(matches!(
            PresentationPlan::new(&support, 0, 0, 800, 600),
            Err(RhiError::SurfaceError(_))
        ));
    }
}
