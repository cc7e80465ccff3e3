//! Synchronization primitives for Vulkan.
//!
//! This module provides wrappers for Vulkan synchronization objects:
//! - [`Semaphore`] - GPU-to-GPU ordering between queue operations
//! - [`Fence`] - GPU-to-host completion signal
//!
//! # Example
//!
//! ```no_run
//! use std::sync::Arc;
//! use vkframe_rhi::device::Device;
//! use vkframe_rhi::sync::{Semaphore, Fence};
//!
//! # fn example(device: Arc<Device>) -> Result<(), vkframe_rhi::RhiError> {
//! let image_available = Semaphore::new(device.clone())?;
//!
//! // Created signaled so the first wait returns immediately
//! let frame_complete = Fence::new(device.clone(), true)?;
//! frame_complete.wait(u64::MAX)?;
//! frame_complete.reset()?;
//! # Ok(())
//! # }
//! ```

use std::sync::Arc;

use ash::vk;
use tracing::debug;

use crate::device::Device;
use crate::error::RhiResult;

/// Vulkan semaphore wrapper.
///
/// Orders queue operations on the GPU; the host never waits on it.
pub struct Semaphore {
    device: Arc<Device>,
    semaphore: vk::Semaphore,
}

impl Semaphore {
    /// Creates a new binary semaphore.
    ///
    /// # Errors
    ///
    /// Returns an error if semaphore creation fails.
    pub fn new(device: Arc<Device>) -> RhiResult<Self> {
        let create_info = vk::SemaphoreCreateInfo::default();
        let semaphore = unsafe { device.handle().create_semaphore(&create_info, None)? };

        Ok(Self { device, semaphore })
    }

    /// Returns the Vulkan semaphore handle.
    #[inline]
    pub fn handle(&self) -> vk::Semaphore {
        self.semaphore
    }
}

impl Drop for Semaphore {
    fn drop(&mut self) {
        unsafe {
            self.device.handle().destroy_semaphore(self.semaphore, None);
        }
    }
}

/// Vulkan fence wrapper.
///
/// Signaled by the GPU when a submission completes; the host waits on it
/// before touching resources that submission used.
pub struct Fence {
    device: Arc<Device>,
    fence: vk::Fence,
}

impl Fence {
    /// Creates a new fence.
    ///
    /// # Arguments
    ///
    /// * `device` - The logical device
    /// * `signaled` - Create the fence in the signaled state
    ///
    /// # Errors
    ///
    /// Returns an error if fence creation fails.
    pub fn new(device: Arc<Device>, signaled: bool) -> RhiResult<Self> {
        let flags = if signaled {
            vk::FenceCreateFlags::SIGNALED
        } else {
            vk::FenceCreateFlags::empty()
        };

        let create_info = vk::FenceCreateInfo::default().flags(flags);
        let fence = unsafe { device.handle().create_fence(&create_info, None)? };

        debug!("Created fence (signaled: {})", signaled);

        Ok(Self { device, fence })
    }

    /// Returns the Vulkan fence handle.
    #[inline]
    pub fn handle(&self) -> vk::Fence {
        self.fence
    }

    /// Blocks until the fence is signaled or `timeout` nanoseconds elapse.
    ///
    /// # Errors
    ///
    /// Returns `vk::Result::TIMEOUT` as an error if the wait times out, or the
    /// Vulkan error if the wait fails.
    pub fn wait(&self, timeout: u64) -> RhiResult<()> {
        unsafe {
            self.device
                .handle()
                .wait_for_fences(&[self.fence], true, timeout)?
        };
        Ok(())
    }

    /// Resets the fence to the unsignaled state.
    ///
    /// The fence must not be pending on any queue.
    ///
    /// # Errors
    ///
    /// Returns an error if the reset operation fails.
    pub fn reset(&self) -> RhiResult<()> {
        unsafe { self.device.handle().reset_fences(&[self.fence])? };
        Ok(())
    }

    /// Non-blocking check of the fence state.
    pub fn is_signaled(&self) -> bool {
        let result = unsafe { self.device.handle().get_fence_status(self.fence) };
        matches!(result, Ok(true))
    }

    /// Blocks until every fence in `fences` is signaled.
    ///
    /// # Errors
    ///
    /// Returns an error if the wait fails.
    pub fn wait_all<'a, I>(device: &Device, fences: I, timeout: u64) -> RhiResult<()>
    where
        I: IntoIterator<Item = &'a Fence>,
    {
        let handles: Vec<vk::Fence> = fences.into_iter().map(Fence::handle).collect();
        if handles.is_empty() {
            return Ok(());
        }
        unsafe { device.handle().wait_for_fences(&handles, true, timeout)? };
        Ok(())
    }
}

impl Drop for Fence {
    fn drop(&mut self) {
        unsafe {
            self.device.handle().destroy_fence(self.fence, None);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test_support::headless_device;

    #[test]
    fn test_semaphore_is_send_sync() {
        fn assert_send_sync<T: Send + Sync>() {}
        assert_send_sync::<Semaphore>();
    }

    #[test]
    fn test_fence_is_send_sync() {
        fn assert_send_sync<T: Send + Sync>() {}
        assert_send_sync::<Fence>();
    }

    #[test]
    fn test_fence_signal_state() {
        let Some(device) = headless_device() else {
            return;
        };

        let fence = Fence::new(device.clone(), true).unwrap();
        assert!(fence.is_signaled());
        fence.wait(0).unwrap();

        fence.reset().unwrap();
        assert!(!fence.is_signaled());

        let unsignaled = Fence::new(device.clone(), false).unwrap();
        assert!(!unsignaled.is_signaled());
    }

    #[test]
    fn test_wait_all_signaled() {
        let Some(device) = headless_device() else {
            return;
        };

        let fences = [
            Fence::new(device.clone(), true).unwrap(),
            Fence::new(device.clone(), true).unwrap(),
        ];
        Fence::wait_all(&device, &fences, 0).unwrap();
        Fence::wait_all(&device, &[], 0).unwrap();
    }
}
