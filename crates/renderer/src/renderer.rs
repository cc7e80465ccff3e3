//! Top-level renderer.
//!
//! [`GpuContext`] holds the objects created once per window: instance,
//! surface, logical device and a transfer engine for asset uploads.
//! [`Renderer`] owns the frame slots and render targets and runs the frame
//! loop, handing each frame's command buffer to a [`FrameRecorder`].
//!
//! # Resource Destruction Order
//!
//! Every Vulkan object is an RAII wrapper holding an `Arc` to what it was
//! created from, so a [`Renderer`] can be dropped before or after its
//! [`GpuContext`]. Before anything is released the renderer drains its frame
//! fences and waits for the device to go idle.

use std::sync::Arc;

use ash::vk;
use raw_window_handle::HasDisplayHandle;
use tracing::{debug, error, info};

use vkframe_core::{DeviceSelection, RendererConfig};
use vkframe_platform::{ResizeSignal, Window};
use vkframe_rhi::device::Device;
use vkframe_rhi::instance::Instance;
use vkframe_rhi::physical_device::{REQUIRED_DEVICE_EXTENSIONS, SelectionPolicy, select_device};
use vkframe_rhi::pipeline::{PipelineDesc, PipelineLayout};
use vkframe_rhi::surface::Surface;
use vkframe_rhi::swapchain::{AcquireOutcome, PresentOutcome};
use vkframe_rhi::transfer::TransferEngine;
use vkframe_rhi::{RhiError, RhiResult};

use crate::MAX_FRAMES_IN_FLIGHT;
use crate::frame::{FrameBackend, FrameScheduler, FrameStatus};
use crate::frame_manager::FrameSlots;
use crate::recorder::{FrameContext, FrameRecorder};
use crate::targets::RenderTargets;

/// Maps the configured selection mode onto the device selector's policy.
pub fn selection_policy(selection: DeviceSelection) -> SelectionPolicy {
    match selection {
        DeviceSelection::FirstSuitable => SelectionPolicy::FirstSuitable,
        DeviceSelection::PreferDiscrete => SelectionPolicy::PreferDiscrete,
    }
}

/// Framebuffer size of `window` as a Vulkan extent.
pub fn window_extent(window: &Window) -> vk::Extent2D {
    let (width, height) = window.framebuffer_size();
    vk::Extent2D { width, height }
}

/// Instance, surface and device for one window.
pub struct GpuContext {
    transfer: TransferEngine,
    device: Arc<Device>,
    surface: Arc<Surface>,
    instance: Arc<Instance>,
}

impl GpuContext {
    /// Creates the instance, surface and device for `window`.
    ///
    /// # Errors
    ///
    /// Returns [`RhiError::SurfaceError`] if the window handles are
    /// unavailable, [`RhiError::NoSuitableDevice`] if no GPU can render to
    /// the surface, or the error of any failed creation.
    pub fn new(window: &Window, config: &RendererConfig) -> RhiResult<Self> {
        let display = window
            .display_handle()
            .map_err(|e| RhiError::SurfaceError(format!("Failed to get display handle: {}", e)))?
            .as_raw();

        let instance = Instance::new(c"vkframe", config.validation, Some(display))?;
        let surface = Surface::new(instance.clone(), window)?;

        let capabilities = select_device(
            &instance,
            &surface,
            REQUIRED_DEVICE_EXTENSIONS,
            selection_policy(config.device_selection),
        )?;
        let device = Device::new(instance.clone(), &capabilities, REQUIRED_DEVICE_EXTENSIONS)?;
        let transfer = TransferEngine::new(device.clone())?;

        info!("GPU context ready on {}", capabilities.device_name());

        Ok(Self {
            transfer,
            device,
            surface,
            instance,
        })
    }

    #[inline]
    pub fn instance(&self) -> &Arc<Instance> {
        &self.instance
    }

    #[inline]
    pub fn surface(&self) -> &Arc<Surface> {
        &self.surface
    }

    #[inline]
    pub fn device(&self) -> &Arc<Device> {
        &self.device
    }

    /// Transfer engine for uploading assets.
    #[inline]
    pub fn transfer(&self) -> &TransferEngine {
        &self.transfer
    }
}

/// Everything the frame backend touches, apart from the scheduler.
struct RenderState {
    // Slots drop first so no fence outlives the targets it guards.
    slots: FrameSlots,
    targets: RenderTargets,
    layout: PipelineLayout,
    desc: PipelineDesc,
    transfer: TransferEngine,
    device: Arc<Device>,
    clear_color: [f32; 4],
}

impl RenderState {
    fn clear_values(&self) -> [vk::ClearValue; 2] {
        [
            vk::ClearValue {
                color: vk::ClearColorValue {
                    float32: self.clear_color,
                },
            },
            vk::ClearValue {
                depth_stencil: vk::ClearDepthStencilValue {
                    depth: 1.0,
                    stencil: 0,
                },
            },
        ]
    }
}

/// [`FrameBackend`] over the real device for one `draw_frame` call.
struct FrameDriver<'a> {
    state: &'a mut RenderState,
    window: &'a Window,
    recorder: &'a mut dyn FrameRecorder,
}

impl FrameBackend for FrameDriver<'_> {
    fn wait_for_slot(&mut self, slot: usize) -> RhiResult<()> {
        self.state.slots.wait(slot)
    }

    fn acquire(&mut self, slot: usize) -> RhiResult<AcquireOutcome> {
        let semaphore = self.state.slots.get(slot)?.image_available().handle();
        self.state.targets.swapchain().acquire_next_image(semaphore)
    }

    fn record(&mut self, slot: usize, image_index: u32) -> RhiResult<()> {
        let state = &*self.state;
        let frame_slot = state.slots.get(slot)?;
        let framebuffer = state.targets.framebuffer(image_index)?;
        let extent = state.targets.extent();
        let pipeline = state.targets.pipeline().handle();

        let cmd = frame_slot.begin_recording()?;
        cmd.begin_render_pass(
            state.targets.render_pass().handle(),
            framebuffer.handle(),
            extent,
            &state.clear_values(),
        );
        cmd.bind_pipeline(pipeline);

        let frame = FrameContext {
            command_buffer: cmd,
            frame_index: slot,
            image_index,
            extent,
            pipeline,
            pipeline_layout: state.layout.handle(),
        };
        self.recorder.record(&frame)?;

        cmd.end_render_pass();
        cmd.end()
    }

    fn submit(&mut self, slot: usize) -> RhiResult<()> {
        self.state.slots.get(slot)?.submit(&self.state.device)
    }

    fn present(&mut self, slot: usize, image_index: u32) -> RhiResult<PresentOutcome> {
        let semaphore = self.state.slots.get(slot)?.render_finished().handle();
        self.state.targets.swapchain().present(
            self.state.device.present_queue(),
            image_index,
            semaphore,
        )
    }

    fn recreate_swapchain(&mut self) -> RhiResult<bool> {
        let state = &mut *self.state;
        state.targets.rebuild(
            window_extent(self.window),
            &state.transfer,
            &state.desc,
            &state.layout,
        )
    }
}

/// Frame loop over a window's swapchain.
pub struct Renderer {
    scheduler: FrameScheduler,
    state: RenderState,
    resize_signal: ResizeSignal,
}

impl Renderer {
    /// Builds the pipeline layout, render targets and frame slots.
    ///
    /// # Errors
    ///
    /// Returns [`RhiError::PipelineError`] or [`RhiError::ShaderError`] for
    /// a bad `desc`, or the error of any failed creation.
    pub fn new(
        context: &GpuContext,
        window: &Window,
        desc: PipelineDesc,
        clear_color: [f32; 4],
    ) -> RhiResult<Self> {
        desc.validate()?;
        let device = context.device().clone();

        let layout = PipelineLayout::new(
            device.clone(),
            &desc.set_layouts,
            &desc.push_constant_ranges,
        )?;
        let transfer = TransferEngine::new(device.clone())?;
        let targets = RenderTargets::new(
            device.clone(),
            context.surface().clone(),
            &transfer,
            &desc,
            &layout,
            window_extent(window),
        )?;
        let slots = FrameSlots::new(device.clone(), MAX_FRAMES_IN_FLIGHT)?;

        info!("Renderer initialized with {} frame(s) in flight", slots.len());

        Ok(Self {
            scheduler: FrameScheduler::new(MAX_FRAMES_IN_FLIGHT),
            state: RenderState {
                slots,
                targets,
                layout,
                desc,
                transfer,
                device,
                clear_color,
            },
            resize_signal: window.resize_signal(),
        })
    }

    /// Runs one iteration of the frame loop for `window`.
    ///
    /// Out-of-date and suboptimal swapchains are rebuilt internally; a
    /// zero-area window yields [`FrameStatus::Deferred`] until it has an area
    /// again.
    ///
    /// # Errors
    ///
    /// Returns [`RhiError::SurfaceLost`], errors from `recorder`, or any
    /// other Vulkan failure.
    pub fn draw_frame(
        &mut self,
        window: &Window,
        recorder: &mut dyn FrameRecorder,
    ) -> RhiResult<FrameStatus> {
        let resized = self.resize_signal.take();
        if resized {
            debug!("Resize reported since last frame");
        }

        let mut driver = FrameDriver {
            state: &mut self.state,
            window,
            recorder,
        };
        self.scheduler.draw_frame(&mut driver, resized)
    }

    /// Waits for every frame in flight, then for the device to go idle.
    ///
    /// # Errors
    ///
    /// Returns an error if either wait fails.
    pub fn shutdown(&self) -> RhiResult<()> {
        self.state.slots.drain()?;
        self.state.device.wait_idle()?;
        info!(
            "Renderer idle after {} swapchain recreation(s)",
            self.scheduler.recreations()
        );
        Ok(())
    }

    /// Slot the next frame will use.
    #[inline]
    pub fn current_frame(&self) -> usize {
        self.scheduler.current_frame()
    }

    /// Current swapchain extent.
    #[inline]
    pub fn extent(&self) -> vk::Extent2D {
        self.state.targets.extent()
    }

    #[inline]
    pub fn device(&self) -> &Arc<Device> {
        &self.state.device
    }

    /// Number of swapchain recreations so far.
    #[inline]
    pub fn recreations(&self) -> u64 {
        self.scheduler.recreations()
    }
}

impl Drop for Renderer {
    fn drop(&mut self) {
        if let Err(e) = self.shutdown() {
            error!("Failed to drain frames during renderer drop: {}", e);
        }
    }
}
