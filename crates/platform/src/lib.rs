//! Platform layer for the frame orchestration workspace.
//!
//! This crate provides the windowing collaborator:
//! - Window management via winit
//! - Raw window handles for Vulkan surface creation
//! - The resize notification handle polled by the frame loop

mod resize;
mod window;

pub use resize::ResizeSignal;
pub use window::Window;

// Re-export winit types that users might need
pub use winit::event::WindowEvent;
pub use winit::event_loop::{ActiveEventLoop, EventLoop};
