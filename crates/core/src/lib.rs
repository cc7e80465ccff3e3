//! Core utilities shared by the frame orchestration crates.
//!
//! This crate provides foundational types used across the workspace:
//! - Error types and result aliases
//! - Logging initialization
//! - Frame timing
//! - TOML configuration

pub mod config;
mod error;
mod logging;
mod timer;

pub use config::{Config, DeviceSelection, RendererConfig, ShaderConfig, WindowConfig};
pub use error::{Error, Result};
pub use logging::init_logging;
pub use timer::Timer;
