//! Presentation surface.

use std::sync::Arc;

use ash::vk;
use raw_window_handle::{HasDisplayHandle, HasWindowHandle};
use tracing::{debug, info};

use crate::error::{RhiError, RhiResult};
use crate::instance::Instance;

/// RAII wrapper for a `vk::SurfaceKHR`.
///
/// Holds the instance alive until the surface is destroyed.
pub struct Surface {
    instance: Arc<Instance>,
    handle: vk::SurfaceKHR,
    loader: ash::khr::surface::Instance,
}

impl Surface {
    /// Creates a surface for a window.
    ///
    /// # Errors
    ///
    /// Returns [`RhiError::SurfaceError`] if the window handles are unavailable,
    /// the instance was created headless, or surface creation fails.
    pub fn new<W>(instance: Arc<Instance>, window: &W) -> RhiResult<Arc<Self>>
    where
        W: HasDisplayHandle + HasWindowHandle,
    {
        if !instance.supports_surfaces() {
            return Err(RhiError::SurfaceError(
                "instance was created without surface extensions".to_string(),
            ));
        }

        let display_handle = window
            .display_handle()
            .map_err(|e| RhiError::SurfaceError(format!("Failed to get display handle: {}", e)))?;
        let window_handle = window
            .window_handle()
            .map_err(|e| RhiError::SurfaceError(format!("Failed to get window handle: {}", e)))?;

        // SAFETY: the handles come from a live window and the instance enabled
        // the extensions ash_window reported for this display.
        let handle = unsafe {
            ash_window::create_surface(
                instance.entry(),
                instance.handle(),
                display_handle.as_raw(),
                window_handle.as_raw(),
                None,
            )
            .map_err(|e| RhiError::SurfaceError(format!("Failed to create surface: {}", e)))?
        };

        let loader = ash::khr::surface::Instance::new(instance.entry(), instance.handle());

        info!("Vulkan surface created");

        Ok(Arc::new(Self {
            instance,
            handle,
            loader,
        }))
    }

    /// Raw surface handle.
    #[inline]
    pub fn handle(&self) -> vk::SurfaceKHR {
        self.handle
    }

    /// Surface extension loader used for capability queries.
    #[inline]
    pub fn loader(&self) -> &ash::khr::surface::Instance {
        &self.loader
    }

    /// The instance the surface was created from.
    #[inline]
    pub fn instance(&self) -> &Arc<Instance> {
        &self.instance
    }

    /// Whether `queue_family` on `physical_device` can present to this surface.
    pub fn supports_present(
        &self,
        physical_device: vk::PhysicalDevice,
        queue_family: u32,
    ) -> RhiResult<bool> {
        let supported = unsafe {
            self.loader
                .get_physical_device_surface_support(physical_device, queue_family, self.handle)?
        };
        Ok(supported)
    }
}

impl Drop for Surface {
    fn drop(&mut self) {
        // SAFETY: every swapchain built on this surface holds an Arc to it, so
        // none is alive at this point.
        unsafe {
            self.loader.destroy_surface(self.handle, None);
        }
        debug!("Vulkan surface destroyed");
    }
}

unsafe impl Send for Surface {}
unsafe impl Sync for Surface {}
