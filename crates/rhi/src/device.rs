//! Vulkan logical device and queue management.
//!
//! This module handles VkDevice creation, queue retrieval, and gpu-allocator
//! initialization.
//!
//! # Example
//!
//! ```no_run
//! use std::sync::Arc;
//! use vkframe_rhi::device::Device;
//! use vkframe_rhi::instance::Instance;
//! use vkframe_rhi::physical_device::{select_headless_device};
//!
//! # fn example() -> Result<(), vkframe_rhi::RhiError> {
//! let instance = Instance::new(c"demo", false, None)?;
//! let caps = select_headless_device(&instance)?;
//! let device = Device::new(instance, &caps, &[])?;
//! device.wait_idle()?;
//! # Ok(())
//! # }
//! ```

use std::ffi::{CStr, c_char};
use std::mem::ManuallyDrop;
use std::sync::{Arc, Mutex, MutexGuard};

use ash::vk;
use gpu_allocator::vulkan::{Allocator, AllocatorCreateDesc};
use tracing::{debug, info};

use crate::error::{RhiError, RhiResult};
use crate::instance::Instance;
use crate::physical_device::{DeviceCapabilities, QueueFamilyIndices};

/// Vulkan logical device wrapper.
///
/// Shared through `Arc`. Every resource wrapper keeps a clone, so the device
/// outlives all objects created from it, and the device in turn keeps the
/// instance alive.
pub struct Device {
    instance: Arc<Instance>,
    device: ash::Device,
    physical_device: vk::PhysicalDevice,
    memory_properties: vk::PhysicalDeviceMemoryProperties,
    allocator: ManuallyDrop<Mutex<Allocator>>,
    graphics_queue: vk::Queue,
    present_queue: vk::Queue,
    queue_families: QueueFamilyIndices,
}

impl Device {
    /// Creates a logical device with one queue per unique family.
    ///
    /// # Arguments
    ///
    /// * `instance` - The Vulkan instance
    /// * `capabilities` - The selected device and queue families
    /// * `extensions` - Device extensions to enable
    ///
    /// # Errors
    ///
    /// Returns an error if device creation or allocator initialization fails.
    pub fn new(
        instance: Arc<Instance>,
        capabilities: &DeviceCapabilities,
        extensions: &[&CStr],
    ) -> RhiResult<Arc<Self>> {
        let queue_families = capabilities.queue_families();
        let unique_families = queue_families.unique_families();
        let queue_priorities = [1.0f32];

        let queue_create_infos: Vec<vk::DeviceQueueCreateInfo> = unique_families
            .iter()
            .map(|&family| {
                vk::DeviceQueueCreateInfo::default()
                    .queue_family_index(family)
                    .queue_priorities(&queue_priorities)
            })
            .collect();

        debug!(
            "Creating {} queue(s) for families: {:?}",
            queue_create_infos.len(),
            unique_families
        );

        let features = vk::PhysicalDeviceFeatures::default();
        let extension_names: Vec<*const c_char> =
            extensions.iter().map(|ext| ext.as_ptr()).collect();

        let create_info = vk::DeviceCreateInfo::default()
            .queue_create_infos(&queue_create_infos)
            .enabled_extension_names(&extension_names)
            .enabled_features(&features);

        let device = unsafe {
            instance
                .handle()
                .create_device(capabilities.physical_device, &create_info, None)?
        };

        info!("Logical device created with {} extension(s)", extensions.len());

        let graphics_queue = unsafe { device.get_device_queue(capabilities.graphics_family, 0) };
        let present_queue = unsafe { device.get_device_queue(capabilities.present_family, 0) };
        debug!(
            "Queues retrieved: graphics family {}, present family {}",
            capabilities.graphics_family, capabilities.present_family
        );

        let allocator = match Allocator::new(&AllocatorCreateDesc {
            instance: instance.handle().clone(),
            device: device.clone(),
            physical_device: capabilities.physical_device,
            debug_settings: Default::default(),
            buffer_device_address: false,
            allocation_sizes: Default::default(),
        }) {
            Ok(allocator) => allocator,
            Err(e) => {
                unsafe { device.destroy_device(None) };
                return Err(e.into());
            }
        };

        info!("GPU memory allocator initialized");

        Ok(Arc::new(Self {
            instance,
            device,
            physical_device: capabilities.physical_device,
            memory_properties: capabilities.memory_properties,
            allocator: ManuallyDrop::new(Mutex::new(allocator)),
            graphics_queue,
            present_queue,
            queue_families,
        }))
    }

    /// Returns the Vulkan logical device handle.
    #[inline]
    pub fn handle(&self) -> &ash::Device {
        &self.device
    }

    /// Returns the instance this device was created from.
    #[inline]
    pub fn instance(&self) -> &Arc<Instance> {
        &self.instance
    }

    /// Returns the physical device handle.
    #[inline]
    pub fn physical_device(&self) -> vk::PhysicalDevice {
        self.physical_device
    }

    /// Memory heaps and types of the physical device.
    #[inline]
    pub fn memory_properties(&self) -> &vk::PhysicalDeviceMemoryProperties {
        &self.memory_properties
    }

    /// Returns the graphics queue handle.
    #[inline]
    pub fn graphics_queue(&self) -> vk::Queue {
        self.graphics_queue
    }

    /// Returns the presentation queue handle.
    #[inline]
    pub fn present_queue(&self) -> vk::Queue {
        self.present_queue
    }

    /// Returns the queue family indices.
    #[inline]
    pub fn queue_families(&self) -> &QueueFamilyIndices {
        &self.queue_families
    }

    /// Locks the GPU memory allocator.
    ///
    /// # Errors
    ///
    /// Returns [`RhiError::AllocatorPoisoned`] if another thread panicked while
    /// holding the lock.
    pub fn lock_allocator(&self) -> RhiResult<MutexGuard<'_, Allocator>> {
        self.allocator
            .lock()
            .map_err(|_| RhiError::AllocatorPoisoned)
    }

    /// Returns the first format in `candidates` whose tiling features contain
    /// `features`.
    pub fn find_supported_format(
        &self,
        candidates: &[vk::Format],
        tiling: vk::ImageTiling,
        features: vk::FormatFeatureFlags,
    ) -> Option<vk::Format> {
        candidates.iter().copied().find(|&format| {
            let props = unsafe {
                self.instance
                    .handle()
                    .get_physical_device_format_properties(self.physical_device, format)
            };
            match tiling {
                vk::ImageTiling::LINEAR => props.linear_tiling_features.contains(features),
                vk::ImageTiling::OPTIMAL => props.optimal_tiling_features.contains(features),
                _ => false,
            }
        })
    }

    /// Waits for the device to become idle.
    ///
    /// # Errors
    ///
    /// Returns an error if the wait fails.
    pub fn wait_idle(&self) -> RhiResult<()> {
        unsafe { self.device.device_wait_idle()? };
        Ok(())
    }

    /// Submits work to the graphics queue.
    ///
    /// # Safety
    ///
    /// The caller must ensure:
    /// - All command buffers are valid and fully recorded
    /// - The fence (if not null) is unsignaled and not in use by another submission
    pub unsafe fn submit_graphics(
        &self,
        submit_infos: &[vk::SubmitInfo],
        fence: vk::Fence,
    ) -> RhiResult<()> {
        unsafe {
            self.device
                .queue_submit(self.graphics_queue, submit_infos, fence)?;
        }
        Ok(())
    }
}

impl Drop for Device {
    fn drop(&mut self) {
        unsafe {
            if let Err(e) = self.device.device_wait_idle() {
                tracing::error!("Failed to wait for device idle during drop: {:?}", e);
            }

            // The allocator frees its memory blocks through the device handle.
            ManuallyDrop::drop(&mut self.allocator);

            self.device.destroy_device(None);
        }
        info!("Logical device destroyed");
    }
}

// Safety: ash::Device is Send + Sync, the remaining handles are plain values and
// the allocator is behind a Mutex.
unsafe impl Send for Device {}
unsafe impl Sync for Device {}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::physical_device::select_headless_device;

    #[test]
    fn test_device_is_send_sync() {
        fn assert_send_sync<T: Send + Sync>() {}
        assert_send_sync::<Device>();
    }

    #[test]
    fn test_headless_device_creation() {
        let instance = match Instance::new(c"device-test", false, None) {
            Ok(instance) => instance,
            Err(RhiError::LoadingError(_)) => {
                eprintln!("Skipping test: Vulkan not available");
                return;
            }
            Err(e) => panic!("Unexpected error: {:?}", e),
        };
        let caps = match select_headless_device(&instance) {
            Ok(caps) => caps,
            Err(RhiError::NoVulkanSupport | RhiError::NoSuitableDevice) => {
                eprintln!("Skipping test: no usable GPU");
                return;
            }
            Err(e) => panic!("Unexpected error: {:?}", e),
        };

        let device = Device::new(instance, &caps, &[]).unwrap();
        assert_eq!(device.queue_families().graphics_family, Some(caps.graphics_family));
        assert!(device.lock_allocator().is_ok());
        device.wait_idle().unwrap();
    }
}
