//! Presentation bundle: swapchain, image views and framebuffers.
//!
//! # Overview
//!
//! A [`PresentationBundle`] is built whole from a [`PresentationPlan`] and
//! replaced whole when the surface changes. Each piece is its own RAII
//! wrapper, so a failure halfway through creation (say, the third
//! framebuffer) releases everything created before it.
//!
//! Fields drop in declaration order: framebuffers, then views, then the
//! swapchain that owns the images.
//!
//! # Example
//!
//! ```no_run
//! use std::sync::Arc;
//! use trigon_rhi::device::Device;
//! use trigon_rhi::instance::Instance;
//! use trigon_rhi::presentation::PresentationBundle;
//! use trigon_rhi::render_pass::RenderPass;
//! use trigon_rhi::swapchain::PresentationPlan;
//! use ash::vk;
//!
//! # fn example(
//! #     instance: &Instance,
//! #     device: Arc<Device>,
//! #     surface: vk::SurfaceKHR,
//! #     plan: &PresentationPlan,
//! # ) -> trigon_rhi::RhiResult<()> {
//! let render_pass = RenderPass::new_color(device.clone(), plan.surface_format.format)?;
//! let bundle = PresentationBundle::create(instance, device, surface, plan, &render_pass, None)?;
//! assert!(bundle.is_consistent());
//! # Ok(())
//! # }
//! ```

use std::sync::Arc;

use ash::vk;
use tracing::{debug, info};

use crate::device::Device;
use crate::error::RhiResult;
use crate::instance::Instance;
use crate::render_pass::{Framebuffer, RenderPass};
use crate::swapchain::PresentationPlan;

/// 2D color view over one swapchain image.
pub struct ImageView {
    device: Arc<Device>,
    view: vk::ImageView,
}

impl ImageView {
    /// Creates a 2D view with identity swizzle over the first mip and layer.
    pub fn new_color_2d(device: Arc<Device>, image: vk::Image, format: vk::Format) -> RhiResult<Self> {
        let create_info = vk::ImageViewCreateInfo::default()
            .image(image)
            .view_type(vk::ImageViewType::TYPE_2D)
            .format(format)
            .components(vk::ComponentMapping::default())
            .subresource_range(
                vk::ImageSubresourceRange::default()
                    .aspect_mask(vk::ImageAspectFlags::COLOR)
                    .base_mip_level(0)
                    .level_count(1)
                    .base_array_layer(0)
                    .layer_count(1),
            );

        let view = unsafe { device.handle().create_image_view(&create_info, None)? };
        Ok(Self { device, view })
    }

    /// Returns the Vulkan image view handle.
    #[inline]
    pub fn handle(&self) -> vk::ImageView {
        self.view
    }
}

impl Drop for ImageView {
    fn drop(&mut self) {
        unsafe { self.device.handle().destroy_image_view(self.view, None) };
    }
}

/// Owning swapchain handle.
struct SwapchainHandle {
    loader: ash::khr::swapchain::Device,
    handle: vk::SwapchainKHR,
}

impl Drop for SwapchainHandle {
    fn drop(&mut self) {
        unsafe { self.loader.destroy_swapchain(self.handle, None) };
    }
}

/// The presentable image queue and everything built per image.
pub struct PresentationBundle {
    /// One framebuffer per image view.
    framebuffers: Vec<Framebuffer>,
    /// One view per swapchain image.
    image_views: Vec<ImageView>,
    /// Images owned by the swapchain.
    images: Vec<vk::Image>,
    /// Swapchain handle and loader.
    swapchain: SwapchainHandle,
    /// Format and color space the images were created with.
    surface_format: vk::SurfaceFormatKHR,
    /// Image extent.
    extent: vk::Extent2D,
    /// Present mode in use.
    present_mode: vk::PresentModeKHR,
}

impl PresentationBundle {
    /// Creates a swapchain for `surface` following `plan`, then one view and
    /// one framebuffer per image.
    ///
    /// When `old` is given its swapchain is passed as `oldSwapchain`; the
    /// caller must have waited for the device to go idle and drops `old`
    /// afterwards.
    pub fn create(
        instance: &Instance,
        device: Arc<Device>,
        surface: vk::SurfaceKHR,
        plan: &PresentationPlan,
        render_pass: &RenderPass,
        old: Option<&PresentationBundle>,
    ) -> RhiResult<Self> {
        let loader = ash::khr::swapchain::Device::new(instance.handle(), device.handle());

        let old_swapchain = old.map_or(vk::SwapchainKHR::null(), |bundle| bundle.swapchain.handle);

        info!(
            "Creating swapchain: {}x{}, format {:?}, color space {:?}, present mode {:?}, {} images, {:?}",
            plan.extent.width,
            plan.extent.height,
            plan.surface_format.format,
            plan.surface_format.color_space,
            plan.present_mode,
            plan.image_count,
            plan.sharing
        );

        let create_info = vk::SwapchainCreateInfoKHR::default()
            .surface(surface)
            .min_image_count(plan.image_count)
            .image_format(plan.surface_format.format)
            .image_color_space(plan.surface_format.color_space)
            .image_extent(plan.extent)
            .image_array_layers(1)
            .image_usage(vk::ImageUsageFlags::COLOR_ATTACHMENT)
            .image_sharing_mode(plan.sharing.mode())
            .queue_family_indices(plan.sharing.queue_family_indices())
            .pre_transform(plan.pre_transform)
            .composite_alpha(vk::CompositeAlphaFlagsKHR::OPAQUE)
            .present_mode(plan.present_mode)
            .clipped(true)
            .old_swapchain(old_swapchain);

        let handle = unsafe { loader.create_swapchain(&create_info, None)? };
        let swapchain = SwapchainHandle { loader, handle };

        let images = unsafe { swapchain.loader.get_swapchain_images(swapchain.handle)? };

        let image_views = images
            .iter()
            .map(|&image| ImageView::new_color_2d(device.clone(), image, plan.surface_format.format))
            .collect::<RhiResult<Vec<_>>>()?;

        let framebuffers = image_views
            .iter()
            .map(|view| Framebuffer::new(device.clone(), render_pass, view.handle(), plan.extent))
            .collect::<RhiResult<Vec<_>>>()?;

        debug!(
            "Presentation bundle ready: {} images, {} views, {} framebuffers",
            images.len(),
            image_views.len(),
            framebuffers.len()
        );

        Ok(Self {
            framebuffers,
            image_views,
            images,
            swapchain,
            surface_format: plan.surface_format,
            extent: plan.extent,
            present_mode: plan.present_mode,
        })
    }

    /// Acquires the next image, signaling `semaphore` once it is available.
    ///
    /// Returns `(image_index, suboptimal)`. `ERROR_OUT_OF_DATE_KHR` is
    /// returned as an error for the caller to classify.
    pub fn acquire_next_image(&self, semaphore: vk::Semaphore) -> Result<(u32, bool), vk::Result> {
        unsafe {
            self.swapchain.loader.acquire_next_image(
                self.swapchain.handle,
                u64::MAX,
                semaphore,
                vk::Fence::null(),
            )
        }
    }

    /// Queues `image_index` for presentation after `wait_semaphore` signals.
    ///
    /// Returns `true` if the swapchain is suboptimal.
    pub fn present(
        &self,
        queue: vk::Queue,
        image_index: u32,
        wait_semaphore: vk::Semaphore,
    ) -> Result<bool, vk::Result> {
        let swapchains = [self.swapchain.handle];
        let image_indices = [image_index];
        let wait_semaphores = [wait_semaphore];

        let present_info = vk::PresentInfoKHR::default()
            .wait_semaphores(&wait_semaphores)
            .swapchains(&swapchains)
            .image_indices(&image_indices);

        unsafe { self.swapchain.loader.queue_present(queue, &present_info) }
    }

    /// Returns the framebuffer for an acquired image, if the index is valid.
    #[inline]
    pub fn framebuffer(&self, image_index: u32) -> Option<vk::Framebuffer> {
        self.framebuffers
            .get(image_index as usize)
            .map(Framebuffer::handle)
    }

    /// Returns the image format.
    #[inline]
    pub fn format(&self) -> vk::Format {
        self.surface_format.format
    }

    /// Returns the image extent.
    #[inline]
    pub fn extent(&self) -> vk::Extent2D {
        self.extent
    }

    /// Returns the present mode.
    #[inline]
    pub fn present_mode(&self) -> vk::PresentModeKHR {
        self.present_mode
    }

    /// Returns the number of swapchain images.
    #[inline]
    pub fn image_count(&self) -> usize {
        self.images.len()
    }

    /// Whether there is exactly one view and one framebuffer per image.
    pub fn is_consistent(&self) -> bool {
        self.images.len() == self.image_views.len()
            && self.image_views.len() == self.framebuffers.len()
    }
}

impl Drop for PresentationBundle {
    fn drop(&mut self) {
        info!(
            "Destroying presentation bundle ({}x{}, {} images)",
            self.extent.width,
            self.extent.height,
            self.images.len()
        );
    }
}
