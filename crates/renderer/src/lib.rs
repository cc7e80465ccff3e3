//! Frame orchestration on top of the Vulkan abstraction layer.
//!
//! This crate runs the render loop:
//! - Frame pacing over [`MAX_FRAMES_IN_FLIGHT`] slots ([`frame`], [`frame_manager`])
//! - Swapchain recreation together with its dependent objects ([`targets`])
//! - The hand-off of each frame's command buffer to application code ([`recorder`])

pub mod depth_buffer;
pub mod frame;
pub mod frame_manager;
pub mod recorder;
pub mod renderer;
pub mod targets;
pub mod ubo;

#[cfg(test)]
mod test_support;

pub use frame::{FrameBackend, FrameScheduler, FrameStatus};
pub use recorder::{FrameContext, FrameRecorder};
pub use renderer::{GpuContext, Renderer};
pub use ubo::{UniformBufferObject, UniformBuffers};

/// Maximum number of frames that can be in flight simultaneously.
pub const MAX_FRAMES_IN_FLIGHT: usize = 2;
