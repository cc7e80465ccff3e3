//! Shared helpers for tests that need a real device.

use std::sync::Arc;

use crate::device::Device;
use crate::error::RhiError;
use crate::instance::Instance;
use crate::physical_device::select_headless_device;

/// Creates a headless device, or `None` (after printing why) when the machine
/// has no Vulkan loader or no usable GPU.
pub(crate) fn headless_device() -> Option<Arc<Device>> {
    let instance = match Instance::new(c"vkframe-test", false, None) {
        Ok(instance) => instance,
        Err(RhiError::LoadingError(_)) => {
            eprintln!("Skipping test: Vulkan not available");
            return None;
        }
        Err(e) => {
            eprintln!("Skipping test: instance creation failed: {}", e);
            return None;
        }
    };

    let caps = match select_headless_device(&instance) {
        Ok(caps) => caps,
        Err(e) => {
            eprintln!("Skipping test: {}", e);
            return None;
        }
    };

    match Device::new(instance, &caps, &[]) {
        Ok(device) => Some(device),
        Err(e) => {
            eprintln!("Skipping test: device creation failed: {}", e);
            None
        }
    }
}
