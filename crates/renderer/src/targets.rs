//! The swapchain and everything sized or formatted after it.
//!
//! Rebuild order on recreation: check the surface extent, wait idle, drop the
//! framebuffers, recreate the swapchain, then render pass, depth buffer,
//! framebuffers and pipeline. A zero-area window or surface defers the
//! rebuild and leaves every object as it was.

use std::sync::Arc;

use ash::vk;
use tracing::{debug, info};

use vkframe_rhi::device::Device;
use vkframe_rhi::framebuffer::Framebuffer;
use vkframe_rhi::pipeline::{Pipeline, PipelineDesc, PipelineLayout};
use vkframe_rhi::render_pass::RenderPass;
use vkframe_rhi::surface::Surface;
use vkframe_rhi::swapchain::Swapchain;
use vkframe_rhi::transfer::TransferEngine;
use vkframe_rhi::{RhiError, RhiResult};

use crate::depth_buffer::{DepthBuffer, find_depth_format};

/// Whether a framebuffer of this size can back a swapchain.
#[inline]
pub fn has_area(extent: vk::Extent2D) -> bool {
    extent.width > 0 && extent.height > 0
}

/// Whether a rebuild for `window` can go ahead, asking `surface_extent` only
/// once the window itself has an area.
///
/// # Errors
///
/// Returns the error of the surface query.
pub fn can_rebuild(
    window: vk::Extent2D,
    surface_extent: impl FnOnce(vk::Extent2D) -> RhiResult<Option<vk::Extent2D>>,
) -> RhiResult<bool> {
    if !has_area(window) {
        debug!(
            "Deferring swapchain rebuild for {}x{} framebuffer",
            window.width, window.height
        );
        return Ok(false);
    }
    if surface_extent(window)?.is_none() {
        debug!("Deferring swapchain rebuild: surface has no area");
        return Ok(false);
    }
    Ok(true)
}

/// Objects rebuilt together with the swapchain.
struct Dependents {
    render_pass: RenderPass,
    depth: DepthBuffer,
    framebuffers: Vec<Framebuffer>,
    pipeline: Pipeline,
}

/// Swapchain, render pass, depth buffer, framebuffers and pipeline.
pub struct RenderTargets {
    device: Arc<Device>,
    // Field order is drop order: users of the swapchain views go first.
    pipeline: Pipeline,
    framebuffers: Vec<Framebuffer>,
    depth: DepthBuffer,
    render_pass: RenderPass,
    swapchain: Swapchain,
    depth_format: vk::Format,
}

impl RenderTargets {
    /// Creates the swapchain for `extent` and builds its dependents.
    ///
    /// # Errors
    ///
    /// Returns an error if the device has no depth format or any creation
    /// fails.
    pub fn new(
        device: Arc<Device>,
        surface: Arc<Surface>,
        transfer: &TransferEngine,
        desc: &PipelineDesc,
        layout: &PipelineLayout,
        extent: vk::Extent2D,
    ) -> RhiResult<Self> {
        let depth_format = find_depth_format(&device)?;
        let swapchain = Swapchain::new(device.clone(), surface, extent)?;
        let deps = Self::build_dependents(&device, &swapchain, depth_format, transfer, desc, layout)?;

        info!(
            "Render targets ready: {} image(s) at {}x{}",
            swapchain.image_count(),
            swapchain.extent().width,
            swapchain.extent().height
        );

        Ok(Self {
            device,
            pipeline: deps.pipeline,
            framebuffers: deps.framebuffers,
            depth: deps.depth,
            render_pass: deps.render_pass,
            swapchain,
            depth_format,
        })
    }

    /// Rebuilds everything for a framebuffer of `extent`.
    ///
    /// Returns `Ok(false)` without touching anything when `extent` or the
    /// surface's current extent has no area.
    ///
    /// # Errors
    ///
    /// Returns an error if the wait or any recreation fails.
    pub fn rebuild(
        &mut self,
        extent: vk::Extent2D,
        transfer: &TransferEngine,
        desc: &PipelineDesc,
        layout: &PipelineLayout,
    ) -> RhiResult<bool> {
        if !can_rebuild(extent, |window| self.swapchain.surface_extent(window))? {
            return Ok(false);
        }

        self.device.wait_idle()?;
        self.framebuffers.clear();
        if !self.swapchain.recreate(extent)? {
            // The surface shrank to nothing since the check; the retry runs
            // before the next acquire, so no framebuffer is needed until then.
            return Ok(false);
        }

        let deps = Self::build_dependents(
            &self.device,
            &self.swapchain,
            self.depth_format,
            transfer,
            desc,
            layout,
        )?;
        self.pipeline = deps.pipeline;
        self.framebuffers = deps.framebuffers;
        self.depth = deps.depth;
        self.render_pass = deps.render_pass;

        info!(
            "Render targets rebuilt at {}x{} (depth {:?})",
            self.swapchain.extent().width,
            self.swapchain.extent().height,
            self.depth.format()
        );
        Ok(true)
    }

    fn build_dependents(
        device: &Arc<Device>,
        swapchain: &Swapchain,
        depth_format: vk::Format,
        transfer: &TransferEngine,
        desc: &PipelineDesc,
        layout: &PipelineLayout,
    ) -> RhiResult<Dependents> {
        let extent = swapchain.extent();
        let render_pass = RenderPass::new(device.clone(), swapchain.format(), depth_format)?;
        let depth = DepthBuffer::new(device.clone(), transfer, extent, depth_format)?;
        let framebuffers = Framebuffer::for_swapchain(
            device,
            &render_pass,
            swapchain.image_views(),
            depth.image_view(),
            extent,
        )?;
        let pipeline = Pipeline::new(device.clone(), desc, layout, &render_pass, extent)?;

        Ok(Dependents {
            render_pass,
            depth,
            framebuffers,
            pipeline,
        })
    }

    #[inline]
    pub fn swapchain(&self) -> &Swapchain {
        &self.swapchain
    }

    #[inline]
    pub fn render_pass(&self) -> &RenderPass {
        &self.render_pass
    }

    #[inline]
    pub fn pipeline(&self) -> &Pipeline {
        &self.pipeline
    }

    /// Current swapchain extent.
    #[inline]
    pub fn extent(&self) -> vk::Extent2D {
        self.swapchain.extent()
    }

    /// Framebuffer wrapping swapchain image `image_index`.
    ///
    /// # Errors
    ///
    /// Returns [`RhiError::InvalidResource`] for an index the swapchain did
    /// not hand out.
    pub fn framebuffer(&self, image_index: u32) -> RhiResult<&Framebuffer> {
        self.framebuffers.get(image_index as usize).ok_or_else(|| {
            RhiError::InvalidResource(format!(
                "no framebuffer for swapchain image {}",
                image_index
            ))
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_has_area() {
        assert!(has_area(vk::Extent2D { width: 800, height: 600 }));
        assert!(!has_area(vk::Extent2D { width: 0, height: 600 }));
        assert!(!has_area(vk::Extent2D { width: 800, height: 0 }));
        assert!(!has_area(vk::Extent2D::default()));
    }

    #[test]
    fn test_can_rebuild_checks_surface_before_teardown() {
        let window = vk::Extent2D { width: 800, height: 600 };

        let mut queried = false;
        let minimized = can_rebuild(vk::Extent2D::default(), |_| {
            queried = true;
            Ok(Some(window))
        })
        .unwrap();
        assert!(!minimized);
        assert!(!queried);

        assert!(!can_rebuild(window, |_| Ok(None)).unwrap());
        assert!(can_rebuild(window, |_| Ok(Some(window))).unwrap());

        let lost = can_rebuild(window, |_| Err(RhiError::SurfaceLost));
        assert!(matches!(lost, Err(RhiError::SurfaceLost)));
    }
}
