//! Device context: instance, surface, adapter and logical device.
//!
//! Built once at startup and never rebuilt. Presentation objects borrow from
//! it and must be dropped first.

use std::mem::ManuallyDrop;
use std::sync::Arc;

use tracing::info;

use trigon_platform::{Surface, Window, required_instance_extensions};
use trigon_rhi::device::{DEVICE_EXTENSIONS, Device};
use trigon_rhi::instance::Instance;
use trigon_rhi::physical_device::{PhysicalDeviceInfo, select_physical_device};
use trigon_rhi::swapchain::SwapchainSupportDetails;

use crate::error::RendererResult;

/// Long-lived Vulkan objects shared by everything else.
pub struct DeviceContext {
    /// Dropped first.
    device: ManuallyDrop<Arc<Device>>,
    /// Dropped after the device.
    surface: ManuallyDrop<Surface>,
    /// Dropped last.
    instance: ManuallyDrop<Instance>,
    adapter: PhysicalDeviceInfo,
}

impl DeviceContext {
    /// Creates the instance, the window surface, picks an adapter and opens
    /// the logical device.
    pub fn create(window: &Window, enable_validation: bool) -> RendererResult<Self> {
        let required = required_instance_extensions(window.raw_display_handle()?)?;
        let instance = Instance::new(c"Trigon", &required, enable_validation)?;

        let surface = window.create_surface(instance.entry(), instance.handle())?;

        let adapter = select_physical_device(
            instance.handle(),
            surface.loader(),
            surface.handle(),
            DEVICE_EXTENSIONS,
        )?;
        info!("Using adapter {}", adapter);

        let device = Device::new(&instance, &adapter, DEVICE_EXTENSIONS)?;

        Ok(Self {
            device: ManuallyDrop::new(device),
            surface: ManuallyDrop::new(surface),
            instance: ManuallyDrop::new(instance),
            adapter,
        })
    }

    #[inline]
    pub fn instance(&self) -> &Instance {
        &self.instance
    }

    #[inline]
    pub fn surface(&self) -> &Surface {
        &self.surface
    }

    #[inline]
    pub fn device(&self) -> &Arc<Device> {
        &self.device
    }

    #[inline]
    pub fn adapter(&self) -> &PhysicalDeviceInfo {
        &self.adapter
    }

    /// Re-queries the surface. Capabilities change with the window size.
    pub fn query_surface_support(&self) -> RendererResult<SwapchainSupportDetails> {
        Ok(SwapchainSupportDetails::query(
            self.adapter.device,
            self.surface.handle(),
            self.surface.loader(),
        )?)
    }
}

impl Drop for DeviceContext {
    fn drop(&mut self) {
        // SAFETY: each field is dropped exactly once, in dependency order.
        unsafe {
            ManuallyDrop::drop(&mut self.device);
            ManuallyDrop::drop(&mut self.surface);
            ManuallyDrop::drop(&mut self.instance);
        }
        info!("Device context destroyed");
    }
}
