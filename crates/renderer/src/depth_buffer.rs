//! Depth attachment sized to the swapchain.
//!
//! The format is the first of [`DEPTH_FORMAT_CANDIDATES`] the device supports
//! as an optimally tiled depth/stencil attachment. The image is transitioned
//! to DEPTH_STENCIL_ATTACHMENT_OPTIMAL right after creation.

use std::sync::Arc;

use ash::vk;
use tracing::info;

use vkframe_rhi::device::Device;
use vkframe_rhi::image::Image;
use vkframe_rhi::transfer::TransferEngine;
use vkframe_rhi::{RhiError, RhiResult};

/// Depth formats in order of preference.
pub const DEPTH_FORMAT_CANDIDATES: [vk::Format; 3] = [
    vk::Format::D32_SFLOAT,
    vk::Format::D32_SFLOAT_S8_UINT,
    vk::Format::D24_UNORM_S8_UINT,
];

/// Picks the depth format for this device.
///
/// # Errors
///
/// Returns [`RhiError::InvalidResource`] if none of the candidates is
/// supported.
pub fn find_depth_format(device: &Device) -> RhiResult<vk::Format> {
    device
        .find_supported_format(
            &DEPTH_FORMAT_CANDIDATES,
            vk::ImageTiling::OPTIMAL,
            vk::FormatFeatureFlags::DEPTH_STENCIL_ATTACHMENT,
        )
        .ok_or_else(|| RhiError::InvalidResource("no supported depth format".to_string()))
}

/// Depth image and view for the render pass's depth attachment.
pub struct DepthBuffer {
    image: Image,
}

impl DepthBuffer {
    /// Creates the depth image and moves it into the attachment layout.
    ///
    /// # Errors
    ///
    /// Returns an error if image creation or the layout transition fails.
    pub fn new(
        device: Arc<Device>,
        transfer: &TransferEngine,
        extent: vk::Extent2D,
        format: vk::Format,
    ) -> RhiResult<Self> {
        let mut image = Image::new(
            device,
            extent,
            format,
            vk::ImageUsageFlags::DEPTH_STENCIL_ATTACHMENT,
        )?;
        transfer
            .transition_image_layout(&mut image, vk::ImageLayout::DEPTH_STENCIL_ATTACHMENT_OPTIMAL)?;

        info!(
            "Created depth buffer: {}x{} ({:?})",
            extent.width, extent.height, format
        );

        Ok(Self { image })
    }

    #[inline]
    pub fn image_view(&self) -> vk::ImageView {
        self.image.view()
    }

    #[inline]
    pub fn format(&self) -> vk::Format {
        self.image.format()
    }

    #[inline]
    pub fn extent(&self) -> vk::Extent2D {
        self.image.extent()
    }
}
