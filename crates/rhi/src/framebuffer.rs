//! Framebuffers binding swapchain views to a render pass.

use std::sync::Arc;

use ash::vk;
use tracing::debug;

use crate::device::Device;
use crate::error::RhiResult;
use crate::render_pass::RenderPass;

/// Vulkan framebuffer wrapper.
pub struct Framebuffer {
    device: Arc<Device>,
    framebuffer: vk::Framebuffer,
    extent: vk::Extent2D,
}

impl Framebuffer {
    /// Creates a framebuffer over `attachments`, ordered as the render pass
    /// declares them.
    ///
    /// # Errors
    ///
    /// Returns an error if framebuffer creation fails.
    pub fn new(
        device: Arc<Device>,
        render_pass: &RenderPass,
        attachments: &[vk::ImageView],
        extent: vk::Extent2D,
    ) -> RhiResult<Self> {
        let create_info = vk::FramebufferCreateInfo::default()
            .render_pass(render_pass.handle())
            .attachments(attachments)
            .width(extent.width)
            .height(extent.height)
            .layers(1);

        let framebuffer = unsafe { device.handle().create_framebuffer(&create_info, None)? };

        Ok(Self {
            device,
            framebuffer,
            extent,
        })
    }

    /// Creates one framebuffer per swapchain view, each sharing `depth_view`.
    ///
    /// # Errors
    ///
    /// Returns the first creation error; framebuffers created before it are
    /// dropped.
    pub fn for_swapchain(
        device: &Arc<Device>,
        render_pass: &RenderPass,
        color_views: &[vk::ImageView],
        depth_view: vk::ImageView,
        extent: vk::Extent2D,
    ) -> RhiResult<Vec<Self>> {
        let framebuffers = color_views
            .iter()
            .map(|&color| Self::new(device.clone(), render_pass, &[color, depth_view], extent))
            .collect::<RhiResult<Vec<_>>>()?;

        debug!(
            "Created {} framebuffers ({}x{})",
            framebuffers.len(),
            extent.width,
            extent.height
        );
        Ok(framebuffers)
    }

    #[inline]
    pub fn handle(&self) -> vk::Framebuffer {
        self.framebuffer
    }

    #[inline]
    pub fn extent(&self) -> vk::Extent2D {
        self.extent
    }
}

impl Drop for Framebuffer {
    fn drop(&mut self) {
        unsafe {
            self.device
                .handle()
                .destroy_framebuffer(self.framebuffer, None);
        }
    }
}
