//! Headless device for tests that touch real Vulkan objects.

use std::sync::Arc;

use vkframe_rhi::RhiError;
use vkframe_rhi::device::Device;
use vkframe_rhi::instance::Instance;
use vkframe_rhi::physical_device::select_headless_device;

pub(crate) fn headless_device() -> Option<Arc<Device>> {
    let instance = match Instance::new(c"vkframe-renderer-test", false, None) {
        Ok(instance) => instance,
        Err(RhiError::LoadingError(_)) => {
            eprintln!("Skipping test: Vulkan not available");
            return None;
        }
        Err(e) => {
            eprintln!("Skipping test: {}", e);
            return None;
        }
    };
    let caps = select_headless_device(&instance)
        .map_err(|e| eprintln!("Skipping test: {}", e))
        .ok()?;
    Device::new(instance, &caps, &[])
        .map_err(|e| eprintln!("Skipping test: {}", e))
        .ok()
}
