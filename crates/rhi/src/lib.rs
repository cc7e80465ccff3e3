//! Vulkan abstraction layer (Render Hardware Interface).
//!
//! This crate wraps `ash` in RAII types and provides:
//! - Instance, surface and device creation with capability-based selection
//! - Swapchain management with explicit acquire/present outcomes
//! - Command recording and synchronization primitives
//! - Buffer and image allocation through gpu-allocator
//! - Staged uploads and layout transitions ([`transfer::TransferEngine`])
//! - Render pass, framebuffer, pipeline and descriptor creation

mod error;

pub mod buffer;
pub mod command;
pub mod descriptor;
pub mod device;
pub mod framebuffer;
pub mod image;
pub mod instance;
pub mod memory;
pub mod physical_device;
pub mod pipeline;
pub mod render_pass;
pub mod sampler;
pub mod shader;
pub mod surface;
pub mod swapchain;
pub mod sync;
pub mod texture;
pub mod transfer;
pub mod vertex;

#[cfg(test)]
mod test_support;

pub use error::{RhiError, RhiResult};

// Re-export ash types that users might need
pub use ash::vk;
