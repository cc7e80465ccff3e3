//! The seam between the frame loop and application drawing code.

use ash::vk;
use vkframe_rhi::RhiResult;
use vkframe_rhi::command::CommandBuffer;

/// State handed to [`FrameRecorder::record`] for one frame.
///
/// The render pass has already begun on the acquired image's framebuffer
/// and the pipeline is bound; the recorder only adds draw work.
pub struct FrameContext<'a> {
    /// The slot's command buffer, in the recording state.
    pub command_buffer: &'a CommandBuffer,
    /// Frame slot in `0..MAX_FRAMES_IN_FLIGHT`. Per-slot resources indexed by
    /// it are no longer in use by the GPU.
    pub frame_index: usize,
    /// Acquired swapchain image.
    pub image_index: u32,
    pub extent: vk::Extent2D,
    pub pipeline: vk::Pipeline,
    pub pipeline_layout: vk::PipelineLayout,
}

/// Records the draw commands of a frame.
pub trait FrameRecorder {
    /// Records draw commands into `frame.command_buffer`.
    ///
    /// # Errors
    ///
    /// An error aborts the frame before submission.
    fn record(&mut self, frame: &FrameContext<'_>) -> RhiResult<()>;
}

impl<F> FrameRecorder for F
where
    F: FnMut(&FrameContext<'_>) -> RhiResult<()>,
{
    fn record(&mut self, frame: &FrameContext<'_>) -> RhiResult<()> {
        self(frame)
    }
}
