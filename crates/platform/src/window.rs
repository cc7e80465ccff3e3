//! Window management using winit.
//!
//! This module provides window creation and the raw handles needed to build
//! a Vulkan surface.

use std::sync::Arc;

use raw_window_handle::{
    DisplayHandle, HandleError, HasDisplayHandle, HasWindowHandle, WindowHandle,
};
use winit::dpi::PhysicalSize;
use winit::event_loop::ActiveEventLoop;
use winit::window::{Window as WinitWindow, WindowAttributes};

use vkframe_core::{Error, Result, WindowConfig};

use crate::resize::ResizeSignal;

/// A window wrapper that tracks the framebuffer size and forwards resize
/// notifications to the frame loop through a [`ResizeSignal`].
pub struct Window {
    window: Arc<WinitWindow>,
    width: u32,
    height: u32,
    resize_signal: ResizeSignal,
}

impl Window {
    /// Create a new resizable window from the window configuration.
    pub fn new(event_loop: &ActiveEventLoop, config: &WindowConfig) -> Result<Self> {
        let attrs = WindowAttributes::default()
            .with_title(config.title.as_str())
            .with_inner_size(PhysicalSize::new(config.width, config.height))
            .with_resizable(true);

        let window = event_loop
            .create_window(attrs)
            .map_err(|e| Error::Window(e.to_string()))?;

        let size = window.inner_size();
        tracing::info!("Window created: {}x{}", size.width, size.height);

        Ok(Self {
            window: Arc::new(window),
            width: size.width,
            height: size.height,
            resize_signal: ResizeSignal::new(),
        })
    }

    /// Get a reference to the underlying winit window.
    pub fn inner(&self) -> &WinitWindow {
        &self.window
    }

    /// Current framebuffer size in physical pixels.
    ///
    /// Either component is zero while the window is minimized.
    pub fn framebuffer_size(&self) -> (u32, u32) {
        (self.width, self.height)
    }

    /// Whether the framebuffer currently has zero area.
    pub fn is_minimized(&self) -> bool {
        self.width == 0 || self.height == 0
    }

    /// A handle to this window's resize notification.
    pub fn resize_signal(&self) -> ResizeSignal {
        self.resize_signal.clone()
    }

    /// Update the stored size and raise the resize notification.
    ///
    /// Call this from the `Resized` window event.
    pub fn resize(&mut self, width: u32, height: u32) {
        self.width = width;
        self.height = height;
        self.resize_signal.notify();
        tracing::debug!("Window resized: {}x{}", width, height);
    }

    /// Request a redraw of the window.
    pub fn request_redraw(&self) {
        self.window.request_redraw();
    }
}

impl HasDisplayHandle for Window {
    fn display_handle(&self) -> std::result::Result<DisplayHandle<'_>, HandleError> {
        self.window.display_handle()
    }
}

impl HasWindowHandle for Window {
    fn window_handle(&self) -> std::result::Result<WindowHandle<'_>, HandleError> {
        self.window.window_handle()
    }
}
