//! Swapchain management.
//!
//! This module owns the chain of presentable images and their views, and
//! rebuilds them against the current surface extent.
//!
//! # Overview
//!
//! - [`SwapchainSupportDetails`] is queried fresh for every (re)creation
//! - [`choose_surface_format`], [`choose_present_mode`], [`choose_extent`],
//!   [`determine_image_count`] and [`image_sharing`] are pure and decide the
//!   creation parameters
//! - [`Swapchain::acquire_next_image`] and [`Swapchain::present`] classify the
//!   presentation engine's answers into [`AcquireOutcome`] / [`PresentOutcome`]
//!   so that out-of-date and suboptimal are values, not errors
//!
//! # Example
//!
//! ```no_run
//! use std::sync::Arc;
//! use vkframe_rhi::device::Device;
//! use vkframe_rhi::surface::Surface;
//! use vkframe_rhi::swapchain::{AcquireOutcome, Swapchain};
//! use vkframe_rhi::vk;
//!
//! # fn example(device: Arc<Device>, surface: Arc<Surface>, semaphore: vk::Semaphore) -> Result<(), vkframe_rhi::RhiError> {
//! let mut swapchain = Swapchain::new(device.clone(), surface, vk::Extent2D { width: 800, height: 600 })?;
//!
//! match swapchain.acquire_next_image(semaphore)? {
//!     AcquireOutcome::Ready { image_index, .. } => { /* record and present */ let _ = image_index; }
//!     AcquireOutcome::OutOfDate => {
//!         device.wait_idle()?;
//!         swapchain.recreate(vk::Extent2D { width: 1024, height: 768 })?;
//!     }
//! }
//! # Ok(())
//! # }
//! ```

use std::sync::Arc;

use ash::vk;
use tracing::{debug, info};

use crate::device::Device;
use crate::error::{RhiError, RhiResult};
use crate::surface::Surface;

/// Preferred surface format.
pub const PREFERRED_SURFACE_FORMAT: vk::SurfaceFormatKHR = vk::SurfaceFormatKHR {
    format: vk::Format::B8G8R8A8_SRGB,
    color_space: vk::ColorSpaceKHR::SRGB_NONLINEAR,
};

/// Swapchain surface support details.
#[derive(Debug, Clone, Default)]
pub struct SwapchainSupportDetails {
    /// Surface capabilities (image count limits, extents, transforms)
    pub capabilities: vk::SurfaceCapabilitiesKHR,
    /// Supported surface formats
    pub formats: Vec<vk::SurfaceFormatKHR>,
    /// Supported present modes
    pub present_modes: Vec<vk::PresentModeKHR>,
}

impl SwapchainSupportDetails {
    /// Queries swapchain support details for a physical device and surface.
    ///
    /// # Errors
    ///
    /// Returns an error if any of the queries fail.
    pub fn query(physical_device: vk::PhysicalDevice, surface: &Surface) -> RhiResult<Self> {
        let loader = surface.loader();
        let handle = surface.handle();

        let capabilities = unsafe {
            loader
                .get_physical_device_surface_capabilities(physical_device, handle)
                .map_err(map_surface_error)?
        };
        let formats = unsafe {
            loader
                .get_physical_device_surface_formats(physical_device, handle)
                .map_err(map_surface_error)?
        };
        let present_modes = unsafe {
            loader
                .get_physical_device_surface_present_modes(physical_device, handle)
                .map_err(map_surface_error)?
        };

        debug!(
            "Swapchain support: {} formats, {} present modes, image count: {}-{}",
            formats.len(),
            present_modes.len(),
            capabilities.min_image_count,
            if capabilities.max_image_count == 0 {
                "unbounded".to_string()
            } else {
                capabilities.max_image_count.to_string()
            }
        );

        Ok(Self {
            capabilities,
            formats,
            present_modes,
        })
    }

    /// At least one format and one present mode are available.
    #[inline]
    pub fn is_adequate(&self) -> bool {
        !self.formats.is_empty() && !self.present_modes.is_empty()
    }
}

/// Queue-family sharing for swapchain images.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct ImageSharing {
    /// Exclusive or concurrent access.
    pub mode: vk::SharingMode,
    /// Families declared for concurrent access; empty when exclusive.
    pub queue_family_indices: Vec<u32>,
}

/// Result of asking for the next presentable image.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum AcquireOutcome {
    /// An image was acquired; `suboptimal` asks for a recreation after present.
    Ready {
        /// Index into the swapchain images.
        image_index: u32,
        /// The chain still works but no longer matches the surface exactly.
        suboptimal: bool,
    },
    /// The chain no longer matches the surface and must be rebuilt first.
    OutOfDate,
}

/// Result of queueing an image for presentation.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum PresentOutcome {
    /// Presented and the chain matches the surface.
    Optimal,
    /// Presented, but the chain should be rebuilt.
    Suboptimal,
    /// Not presented; the chain must be rebuilt.
    OutOfDate,
}

impl PresentOutcome {
    /// Whether the chain should be rebuilt after this present.
    #[inline]
    pub fn needs_recreate(self) -> bool {
        !matches!(self, PresentOutcome::Optimal)
    }
}

/// Vulkan swapchain wrapper.
///
/// Owns the image views; the images themselves belong to the presentation
/// engine and go away with the chain handle.
pub struct Swapchain {
    device: Arc<Device>,
    surface: Arc<Surface>,
    loader: ash::khr::swapchain::Device,
    swapchain: vk::SwapchainKHR,
    images: Vec<vk::Image>,
    image_views: Vec<vk::ImageView>,
    surface_format: vk::SurfaceFormatKHR,
    extent: vk::Extent2D,
}

impl Swapchain {
    /// Creates a new swapchain.
    ///
    /// # Arguments
    ///
    /// * `device` - The logical device
    /// * `surface` - The surface to present to
    /// * `framebuffer_extent` - Current framebuffer size in pixels, used when the
    ///   surface leaves the extent to the application
    ///
    /// # Errors
    ///
    /// Returns an error if:
    /// - Surface queries fail (a lost surface maps to [`RhiError::SurfaceLost`])
    /// - The surface reports no formats or present modes
    /// - Swapchain or image view creation fails
    pub fn new(
        device: Arc<Device>,
        surface: Arc<Surface>,
        framebuffer_extent: vk::Extent2D,
    ) -> RhiResult<Self> {
        let loader = ash::khr::swapchain::Device::new(device.instance().handle(), device.handle());

        let mut swapchain = Self {
            device,
            surface,
            loader,
            swapchain: vk::SwapchainKHR::null(),
            images: Vec::new(),
            image_views: Vec::new(),
            surface_format: PREFERRED_SURFACE_FORMAT,
            extent: vk::Extent2D::default(),
        };
        if !swapchain.build(framebuffer_extent)? {
            return Err(RhiError::SwapchainError(format!(
                "Cannot create a swapchain for a {}x{} framebuffer",
                framebuffer_extent.width, framebuffer_extent.height
            )));
        }
        Ok(swapchain)
    }

    /// Extent a chain built now for `framebuffer_extent` would get, or
    /// `None` when the surface currently has no area.
    ///
    /// # Errors
    ///
    /// Returns an error if the surface query fails.
    pub fn surface_extent(
        &self,
        framebuffer_extent: vk::Extent2D,
    ) -> RhiResult<Option<vk::Extent2D>> {
        let support = SwapchainSupportDetails::query(self.device.physical_device(), &self.surface)?;
        Ok(renderable_extent(&support.capabilities, framebuffer_extent))
    }

    /// Rebuilds the chain for a new framebuffer size.
    ///
    /// The device must be idle: the old views are destroyed once the new
    /// chain exists. Returns `Ok(false)` and leaves the old chain untouched
    /// when the surface has no area.
    ///
    /// # Errors
    ///
    /// Returns an error if the new chain creation fails. On error the old
    /// chain has already been retired and must not be presented to.
    pub fn recreate(&mut self, framebuffer_extent: vk::Extent2D) -> RhiResult<bool> {
        info!(
            "Recreating swapchain for framebuffer {}x{}",
            framebuffer_extent.width, framebuffer_extent.height
        );

        self.build(framebuffer_extent)
    }

    fn build(&mut self, framebuffer_extent: vk::Extent2D) -> RhiResult<bool> {
        let support = SwapchainSupportDetails::query(self.device.physical_device(), &self.surface)?;

        if !support.is_adequate() {
            return Err(RhiError::SwapchainError(
                "Inadequate swapchain support (no formats or present modes)".to_string(),
            ));
        }

        let surface_format = choose_surface_format(&support.formats);
        let present_mode = choose_present_mode(&support.present_modes);
        let Some(extent) = renderable_extent(&support.capabilities, framebuffer_extent) else {
            debug!("Surface has no area, swapchain left as is");
            return Ok(false);
        };
        let image_count = determine_image_count(&support.capabilities);

        let queue_families = self.device.queue_families();
        let sharing = match (queue_families.graphics_family, queue_families.present_family) {
            (Some(graphics), Some(present)) => image_sharing(graphics, present),
            _ => {
                return Err(RhiError::SwapchainError(
                    "Device has no present queue family".to_string(),
                ));
            }
        };

        info!(
            "Creating swapchain: {}x{}, format {:?}, color space {:?}, present mode {:?}, {} images, {:?}",
            extent.width,
            extent.height,
            surface_format.format,
            surface_format.color_space,
            present_mode,
            image_count,
            sharing.mode
        );

        let old_swapchain = self.swapchain;
        let create_info = vk::SwapchainCreateInfoKHR::default()
            .surface(self.surface.handle())
            .min_image_count(image_count)
            .image_format(surface_format.format)
            .image_color_space(surface_format.color_space)
            .image_extent(extent)
            .image_array_layers(1)
            .image_usage(vk::ImageUsageFlags::COLOR_ATTACHMENT)
            .image_sharing_mode(sharing.mode)
            .queue_family_indices(&sharing.queue_family_indices)
            .pre_transform(support.capabilities.current_transform)
            .composite_alpha(vk::CompositeAlphaFlagsKHR::OPAQUE)
            .present_mode(present_mode)
            .clipped(true)
            .old_swapchain(old_swapchain);

        let created = unsafe { self.loader.create_swapchain(&create_info, None) };

        // The old chain is retired by the create call whether it succeeded or not.
        self.destroy_chain();

        let swapchain = created.map_err(map_surface_error)?;
        self.swapchain = swapchain;

        self.images = unsafe { self.loader.get_swapchain_images(swapchain)? };
        self.image_views = create_image_views(&self.device, &self.images, surface_format.format)?;
        self.surface_format = surface_format;
        self.extent = extent;

        info!("Swapchain created with {} images", self.images.len());
        Ok(true)
    }

    /// Acquires the next image, signaling `semaphore` when it is ready.
    ///
    /// # Errors
    ///
    /// Returns [`RhiError::SurfaceLost`] if the surface is gone, or the Vulkan
    /// error for any other failure. Out-of-date is an [`AcquireOutcome`].
    pub fn acquire_next_image(&self, semaphore: vk::Semaphore) -> RhiResult<AcquireOutcome> {
        let result = unsafe {
            self.loader
                .acquire_next_image(self.swapchain, u64::MAX, semaphore, vk::Fence::null())
        };
        classify_acquire(result)
    }

    /// Queues `image_index` for presentation after `wait_semaphore`.
    ///
    /// # Errors
    ///
    /// Returns [`RhiError::SurfaceLost`] if the surface is gone, or the Vulkan
    /// error for any other failure. Out-of-date and suboptimal are
    /// [`PresentOutcome`]s.
    pub fn present(
        &self,
        queue: vk::Queue,
        image_index: u32,
        wait_semaphore: vk::Semaphore,
    ) -> RhiResult<PresentOutcome> {
        let swapchains = [self.swapchain];
        let image_indices = [image_index];
        let wait_semaphores = [wait_semaphore];

        let present_info = vk::PresentInfoKHR::default()
            .wait_semaphores(&wait_semaphores)
            .swapchains(&swapchains)
            .image_indices(&image_indices);

        let result = unsafe { self.loader.queue_present(queue, &present_info) };
        classify_present(result)
    }

    /// Returns the swapchain handle.
    #[inline]
    pub fn handle(&self) -> vk::SwapchainKHR {
        self.swapchain
    }

    /// Returns the image format.
    #[inline]
    pub fn format(&self) -> vk::Format {
        self.surface_format.format
    }

    /// Returns the swapchain extent.
    #[inline]
    pub fn extent(&self) -> vk::Extent2D {
        self.extent
    }

    /// Returns the number of swapchain images.
    #[inline]
    pub fn image_count(&self) -> usize {
        self.images.len()
    }

    /// Returns all image views, one per image.
    #[inline]
    pub fn image_views(&self) -> &[vk::ImageView] {
        &self.image_views
    }

    fn destroy_chain(&mut self) {
        for &image_view in &self.image_views {
            unsafe {
                self.device.handle().destroy_image_view(image_view, None);
            }
        }
        self.image_views.clear();
        self.images.clear();

        if self.swapchain != vk::SwapchainKHR::null() {
            unsafe {
                self.loader.destroy_swapchain(self.swapchain, None);
            }
            self.swapchain = vk::SwapchainKHR::null();
        }
    }
}

impl Drop for Swapchain {
    fn drop(&mut self) {
        let image_count = self.images.len();
        self.destroy_chain();
        info!(
            "Swapchain destroyed (was {}x{}, {} images)",
            self.extent.width, self.extent.height, image_count
        );
    }
}

/// Chooses the surface format: the preferred sRGB BGRA tuple if offered,
/// otherwise the first supported tuple.
///
/// `formats` must not be empty.
pub fn choose_surface_format(formats: &[vk::SurfaceFormatKHR]) -> vk::SurfaceFormatKHR {
    formats
        .iter()
        .copied()
        .find(|format| {
            format.format == PREFERRED_SURFACE_FORMAT.format
                && format.color_space == PREFERRED_SURFACE_FORMAT.color_space
        })
        .or_else(|| formats.first().copied())
        .unwrap_or(PREFERRED_SURFACE_FORMAT)
}

/// Chooses MAILBOX if available, else FIFO.
pub fn choose_present_mode(present_modes: &[vk::PresentModeKHR]) -> vk::PresentModeKHR {
    if present_modes.contains(&vk::PresentModeKHR::MAILBOX) {
        vk::PresentModeKHR::MAILBOX
    } else {
        vk::PresentModeKHR::FIFO
    }
}

/// Chooses the swapchain extent.
///
/// A defined current extent is used as is. When the surface reports
/// `u32::MAX` the framebuffer size is clamped to the surface limits.
pub fn choose_extent(
    capabilities: &vk::SurfaceCapabilitiesKHR,
    framebuffer: vk::Extent2D,
) -> vk::Extent2D {
    if capabilities.current_extent.width != u32::MAX {
        return capabilities.current_extent;
    }

    let min = capabilities.min_image_extent;
    let max = capabilities.max_image_extent;
    vk::Extent2D {
        width: framebuffer.width.clamp(min.width, max.width.max(min.width)),
        height: framebuffer.height.clamp(min.height, max.height.max(min.height)),
    }
}

/// [`choose_extent`], or `None` when the result has no area.
///
/// A minimized window can report a defined current extent of 0x0 before
/// the window system delivers the resize.
pub fn renderable_extent(
    capabilities: &vk::SurfaceCapabilitiesKHR,
    framebuffer: vk::Extent2D,
) -> Option<vk::Extent2D> {
    let extent = choose_extent(capabilities, framebuffer);
    (extent.width > 0 && extent.height > 0).then_some(extent)
}

/// One more image than the minimum, capped by the maximum when there is one.
pub fn determine_image_count(capabilities: &vk::SurfaceCapabilitiesKHR) -> u32 {
    let preferred = capabilities.min_image_count + 1;
    if capabilities.max_image_count > 0 {
        preferred.min(capabilities.max_image_count)
    } else {
        preferred
    }
}

/// Concurrent sharing across exactly both families when they differ,
/// exclusive otherwise.
pub fn image_sharing(graphics_family: u32, present_family: u32) -> ImageSharing {
    if graphics_family != present_family {
        ImageSharing {
            mode: vk::SharingMode::CONCURRENT,
            queue_family_indices: vec![graphics_family, present_family],
        }
    } else {
        ImageSharing {
            mode: vk::SharingMode::EXCLUSIVE,
            queue_family_indices: Vec::new(),
        }
    }
}

/// Maps a raw `vkAcquireNextImageKHR` result to an outcome.
pub fn classify_acquire(result: Result<(u32, bool), vk::Result>) -> RhiResult<AcquireOutcome> {
    match result {
        Ok((image_index, suboptimal)) => Ok(AcquireOutcome::Ready {
            image_index,
            suboptimal,
        }),
        Err(vk::Result::ERROR_OUT_OF_DATE_KHR) => {
            debug!("Swapchain out of date during acquire");
            Ok(AcquireOutcome::OutOfDate)
        }
        Err(e) => Err(map_surface_error(e)),
    }
}

/// Maps a raw `vkQueuePresentKHR` result to an outcome.
pub fn classify_present(result: Result<bool, vk::Result>) -> RhiResult<PresentOutcome> {
    match result {
        Ok(false) => Ok(PresentOutcome::Optimal),
        Ok(true) | Err(vk::Result::SUBOPTIMAL_KHR) => {
            debug!("Swapchain suboptimal during present");
            Ok(PresentOutcome::Suboptimal)
        }
        Err(vk::Result::ERROR_OUT_OF_DATE_KHR) => {
            debug!("Swapchain out of date during present");
            Ok(PresentOutcome::OutOfDate)
        }
        Err(e) => Err(map_surface_error(e)),
    }
}

fn map_surface_error(result: vk::Result) -> RhiError {
    match result {
        vk::Result::ERROR_SURFACE_LOST_KHR => RhiError::SurfaceLost,
        other => RhiError::VulkanError(other),
    }
}

fn create_image_views(
    device: &Device,
    images: &[vk::Image],
    format: vk::Format,
) -> RhiResult<Vec<vk::ImageView>> {
    let mut image_views = Vec::with_capacity(images.len());

    for &image in images {
        let create_info = vk::ImageViewCreateInfo::default()
            .image(image)
            .view_type(vk::ImageViewType::TYPE_2D)
            .format(format)
            .components(vk::ComponentMapping::default())
            .subresource_range(
                vk::ImageSubresourceRange::default()
                    .aspect_mask(vk::ImageAspectFlags::COLOR)
                    .level_count(1)
                    .layer_count(1),
            );

        match unsafe { device.handle().create_image_view(&create_info, None) } {
            Ok(view) => image_views.push(view),
            Err(e) => {
                for view in image_views {
                    unsafe { device.handle().destroy_image_view(view, None) };
                }
                return Err(e.into());
            }
        }
    }

    debug!("Created {} swapchain image views", image_views.len());
    Ok(image_views)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn surface_format(format: vk::Format, color_space: vk::ColorSpaceKHR) -> vk::SurfaceFormatKHR {
        vk::SurfaceFormatKHR {
            format,
            color_space,
        }
    }

    fn same_format(a: vk::SurfaceFormatKHR, b: vk::SurfaceFormatKHR) -> bool {
        a.format == b.format && a.color_space == b.color_space
    }

    fn dims(extent: vk::Extent2D) -> (u32, u32) {
        (extent.width, extent.height)
    }

    fn capabilities(current: (u32, u32), min: (u32, u32), max: (u32, u32)) -> vk::SurfaceCapabilitiesKHR {
        vk::SurfaceCapabilitiesKHR {
            current_extent: vk::Extent2D {
                width: current.0,
                height: current.1,
            },
            min_image_extent: vk::Extent2D {
                width: min.0,
                height: min.1,
            },
            max_image_extent: vk::Extent2D {
                width: max.0,
                height: max.1,
            },
            ..Default::default()
        }
    }

    #[test]
    fn test_choose_surface_format_prefers_srgb_bgra() {
        let formats = [
            surface_format(vk::Format::R8G8B8A8_UNORM, vk::ColorSpaceKHR::SRGB_NONLINEAR),
            surface_format(vk::Format::B8G8R8A8_UNORM, vk::ColorSpaceKHR::SRGB_NONLINEAR),
            PREFERRED_SURFACE_FORMAT,
        ];
        assert!(same_format(choose_surface_format(&formats), PREFERRED_SURFACE_FORMAT));
    }

    #[test]
    fn test_choose_surface_format_falls_back_to_first() {
        let formats = [
            surface_format(vk::Format::R8G8B8A8_UNORM, vk::ColorSpaceKHR::SRGB_NONLINEAR),
            surface_format(vk::Format::B8G8R8A8_UNORM, vk::ColorSpaceKHR::SRGB_NONLINEAR),
        ];
        assert!(same_format(choose_surface_format(&formats), formats[0]));
    }

    #[test]
    fn test_choose_surface_format_requires_matching_color_space() {
        let formats = [
            surface_format(vk::Format::R16G16B16A16_SFLOAT, vk::ColorSpaceKHR::EXTENDED_SRGB_LINEAR_EXT),
            surface_format(vk::Format::B8G8R8A8_SRGB, vk::ColorSpaceKHR::DISPLAY_P3_NONLINEAR_EXT),
        ];
        assert!(same_format(choose_surface_format(&formats), formats[0]));
    }

    #[test]
    fn test_choose_present_mode() {
        assert_eq!(
            choose_present_mode(&[vk::PresentModeKHR::FIFO, vk::PresentModeKHR::MAILBOX]),
            vk::PresentModeKHR::MAILBOX
        );
        assert_eq!(
            choose_present_mode(&[vk::PresentModeKHR::IMMEDIATE, vk::PresentModeKHR::FIFO]),
            vk::PresentModeKHR::FIFO
        );
        assert_eq!(
            choose_present_mode(&[
                vk::PresentModeKHR::IMMEDIATE,
                vk::PresentModeKHR::FIFO_RELAXED
            ]),
            vk::PresentModeKHR::FIFO
        );
    }

    #[test]
    fn test_choose_extent_uses_defined_current_extent() {
        // Current extent is outside min/max on purpose: it must not be clamped.
        let caps = capabilities((1920, 1080), (2000, 2000), (4000, 4000));
        let extent = choose_extent(&caps, vk::Extent2D { width: 10, height: 10 });
        assert_eq!(dims(extent), (1920, 1080));
    }

    #[test]
    fn test_renderable_extent_zero_current_extent() {
        // Surface already minimized while the window still reports its old size.
        let caps = capabilities((0, 0), (0, 0), (4000, 4000));
        assert!(renderable_extent(&caps, vk::Extent2D { width: 800, height: 600 }).is_none());

        let caps = capabilities((1024, 0), (0, 0), (4000, 4000));
        assert!(renderable_extent(&caps, vk::Extent2D { width: 800, height: 600 }).is_none());

        let caps = capabilities((1024, 768), (0, 0), (4000, 4000));
        let extent = renderable_extent(&caps, vk::Extent2D { width: 0, height: 0 }).unwrap();
        assert_eq!(dims(extent), (1024, 768));

        let caps = capabilities((u32::MAX, u32::MAX), (0, 0), (4000, 4000));
        assert!(renderable_extent(&caps, vk::Extent2D { width: 0, height: 600 }).is_none());
    }

    #[test]
    fn test_choose_extent_clamps_framebuffer() {
        let caps = capabilities((u32::MAX, u32::MAX), (100, 100), (2000, 1000));

        let inside = choose_extent(&caps, vk::Extent2D { width: 800, height: 600 });
        assert_eq!(dims(inside), (800, 600));

        let too_big = choose_extent(&caps, vk::Extent2D { width: 5000, height: 5000 });
        assert_eq!(dims(too_big), (2000, 1000));

        let too_small = choose_extent(&caps, vk::Extent2D { width: 1, height: 50 });
        assert_eq!(dims(too_small), (100, 100));
    }

    #[test]
    fn test_determine_image_count() {
        let mut caps = vk::SurfaceCapabilitiesKHR {
            min_image_count: 2,
            max_image_count: 0,
            ..Default::default()
        };
        assert_eq!(determine_image_count(&caps), 3);

        caps.max_image_count = 2;
        assert_eq!(determine_image_count(&caps), 2);

        caps.max_image_count = 8;
        assert_eq!(determine_image_count(&caps), 3);
    }

    #[test]
    fn test_image_sharing() {
        let concurrent = image_sharing(0, 2);
        assert_eq!(concurrent.mode, vk::SharingMode::CONCURRENT);
        assert_eq!(concurrent.queue_family_indices, vec![0, 2]);

        let exclusive = image_sharing(1, 1);
        assert_eq!(exclusive.mode, vk::SharingMode::EXCLUSIVE);
        assert!(exclusive.queue_family_indices.is_empty());
    }

    #[test]
    fn test_classify_acquire() {
        assert_eq!(
            classify_acquire(Ok((2, false))).unwrap(),
            AcquireOutcome::Ready {
                image_index: 2,
                suboptimal: false
            }
        );
        assert_eq!(
            classify_acquire(Ok((0, true))).unwrap(),
            AcquireOutcome::Ready {
                image_index: 0,
                suboptimal: true
            }
        );
        assert_eq!(
            classify_acquire(Err(vk::Result::ERROR_OUT_OF_DATE_KHR)).unwrap(),
            AcquireOutcome::OutOfDate
        );
        assert!(matches!(
            classify_acquire(Err(vk::Result::ERROR_SURFACE_LOST_KHR)),
            Err(RhiError::SurfaceLost)
        ));
        assert!(matches!(
            classify_acquire(Err(vk::Result::ERROR_DEVICE_LOST)),
            Err(RhiError::VulkanError(vk::Result::ERROR_DEVICE_LOST))
        ));
    }

    #[test]
    fn test_classify_present() {
        assert_eq!(classify_present(Ok(false)).unwrap(), PresentOutcome::Optimal);
        assert_eq!(classify_present(Ok(true)).unwrap(), PresentOutcome::Suboptimal);
        assert_eq!(
            classify_present(Err(vk::Result::ERROR_OUT_OF_DATE_KHR)).unwrap(),
            PresentOutcome::OutOfDate
        );
        assert!(matches!(
            classify_present(Err(vk::Result::ERROR_SURFACE_LOST_KHR)),
            Err(RhiError::SurfaceLost)
        ));
        assert!(!PresentOutcome::Optimal.needs_recreate());
        assert!(PresentOutcome::Suboptimal.needs_recreate());
        assert!(PresentOutcome::OutOfDate.needs_recreate());
    }

    #[test]
    fn test_support_details_adequacy() {
        let mut details = SwapchainSupportDetails::default();
        assert!(!details.is_adequate());

        details.formats.push(PREFERRED_SURFACE_FORMAT);
        assert!(!details.is_adequate());

        details.present_modes.push(vk::PresentModeKHR::FIFO);
        assert!(details.is_adequate());
    }
}
