//! GPU buffer management.
//!
//! - [`BufferUsage`] picks the Vulkan usage flags and the memory location
//! - [`Buffer`] wraps VkBuffer with gpu-allocator managed memory
//!
//! Device-local buffers (vertex, index) are not host-visible; fill them
//! through [`TransferEngine::upload_buffer`](crate::transfer::TransferEngine::upload_buffer).
//! Host-visible buffers (staging, uniform, readback) stay persistently mapped.
//!
//! # Example
//!
//! ```no_run
//! use std::sync::Arc;
//! use vkframe_rhi::device::Device;
//! use vkframe_rhi::buffer::{Buffer, BufferUsage};
//!
//! # fn example(device: Arc<Device>) -> Result<(), vkframe_rhi::RhiError> {
//! let matrices = [0.0f32; 48];
//! let uniform = Buffer::new_with_data(
//!     device,
//!     BufferUsage::Uniform,
//!     bytemuck::cast_slice(&matrices),
//! )?;
//! # Ok(())
//! # }
//! ```

use std::sync::Arc;

use ash::vk;
use gpu_allocator::MemoryLocation;
use gpu_allocator::vulkan::Allocation;
use tracing::debug;

use crate::device::Device;
use crate::error::{RhiError, RhiResult};
use crate::memory;

/// Buffer usage type.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum BufferUsage {
    /// Device-local vertex data
    Vertex,
    /// Device-local index data
    Index,
    /// Host-visible shader uniforms, rewritten every frame
    Uniform,
    /// Host-visible source of a transfer
    Staging,
    /// Host-visible destination of a copy back from the GPU
    Readback,
}

impl BufferUsage {
    /// Converts to Vulkan buffer usage flags.
    pub fn to_vk_usage(self) -> vk::BufferUsageFlags {
        match self {
            BufferUsage::Vertex => {
                vk::BufferUsageFlags::VERTEX_BUFFER
                    | vk::BufferUsageFlags::TRANSFER_DST
                    | vk::BufferUsageFlags::TRANSFER_SRC
            }
            BufferUsage::Index => {
                vk::BufferUsageFlags::INDEX_BUFFER
                    | vk::BufferUsageFlags::TRANSFER_DST
                    | vk::BufferUsageFlags::TRANSFER_SRC
            }
            BufferUsage::Uniform => vk::BufferUsageFlags::UNIFORM_BUFFER,
            BufferUsage::Staging => vk::BufferUsageFlags::TRANSFER_SRC,
            BufferUsage::Readback => vk::BufferUsageFlags::TRANSFER_DST,
        }
    }

    /// Returns the memory location for this buffer type.
    pub fn memory_location(self) -> MemoryLocation {
        match self {
            BufferUsage::Vertex | BufferUsage::Index => MemoryLocation::GpuOnly,
            BufferUsage::Uniform | BufferUsage::Staging => MemoryLocation::CpuToGpu,
            BufferUsage::Readback => MemoryLocation::GpuToCpu,
        }
    }

    /// Whether the buffer is mapped for host access.
    pub fn is_host_visible(self) -> bool {
        self.memory_location() != MemoryLocation::GpuOnly
    }

    /// Returns a human-readable name for the buffer type.
    pub fn name(self) -> &'static str {
        match self {
            BufferUsage::Vertex => "vertex",
            BufferUsage::Index => "index",
            BufferUsage::Uniform => "uniform",
            BufferUsage::Staging => "staging",
            BufferUsage::Readback => "readback",
        }
    }
}

/// GPU buffer wrapper with managed memory.
pub struct Buffer {
    device: Arc<Device>,
    buffer: vk::Buffer,
    allocation: Option<Allocation>,
    size: vk::DeviceSize,
    usage: BufferUsage,
}

impl std::fmt::Debug for Buffer {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Buffer")
            .field("buffer", &self.buffer)
            .field("size", &self.size)
            .field("usage", &self.usage)
            .finish_non_exhaustive()
    }
}

impl Buffer {
    /// Creates a buffer of `size` bytes.
    ///
    /// # Errors
    ///
    /// Returns [`RhiError::InvalidResource`] for a zero size,
    /// [`RhiError::NoSuitableMemoryType`] if no memory type fits the usage,
    /// or the Vulkan/allocator error.
    pub fn new(device: Arc<Device>, usage: BufferUsage, size: vk::DeviceSize) -> RhiResult<Self> {
        if size == 0 {
            return Err(RhiError::InvalidResource(format!(
                "{} buffer size must be greater than 0",
                usage.name()
            )));
        }

        let buffer_info = vk::BufferCreateInfo::default()
            .size(size)
            .usage(usage.to_vk_usage())
            .sharing_mode(vk::SharingMode::EXCLUSIVE);

        let buffer = unsafe { device.handle().create_buffer(&buffer_info, None)? };
        let requirements = unsafe { device.handle().get_buffer_memory_requirements(buffer) };

        let allocation = match memory::allocate(
            &device,
            usage.name(),
            requirements,
            usage.memory_location(),
            true,
        ) {
            Ok(allocation) => allocation,
            Err(e) => {
                unsafe { device.handle().destroy_buffer(buffer, None) };
                return Err(e);
            }
        };

        let bound = unsafe {
            device
                .handle()
                .bind_buffer_memory(buffer, allocation.memory(), allocation.offset())
        };
        if let Err(e) = bound {
            memory::free(&device, allocation);
            unsafe { device.handle().destroy_buffer(buffer, None) };
            return Err(e.into());
        }

        debug!("Created {} buffer: {} bytes", usage.name(), size);

        Ok(Self {
            device,
            buffer,
            allocation: Some(allocation),
            size,
            usage,
        })
    }

    /// Creates a host-visible buffer sized to `data` and copies it in.
    ///
    /// # Errors
    ///
    /// Returns an error if creation fails or the usage is device-local.
    pub fn new_with_data(device: Arc<Device>, usage: BufferUsage, data: &[u8]) -> RhiResult<Self> {
        let buffer = Self::new(device, usage, data.len() as vk::DeviceSize)?;
        buffer.write_data(0, data)?;
        Ok(buffer)
    }

    /// Writes `data` through the persistent mapping at `offset`.
    ///
    /// # Errors
    ///
    /// Returns [`RhiError::InvalidResource`] if the buffer is not mapped or the
    /// write would run past its end.
    pub fn write_data(&self, offset: vk::DeviceSize, data: &[u8]) -> RhiResult<()> {
        if data.is_empty() {
            return Ok(());
        }
        self.check_range(offset, data.len())?;

        let ptr = self.mapped_ptr()?;
        unsafe {
            std::ptr::copy_nonoverlapping(data.as_ptr(), ptr.add(offset as usize), data.len());
        }

        Ok(())
    }

    /// Copies the whole buffer out through the persistent mapping.
    ///
    /// The caller must make sure no GPU write to this buffer is still pending.
    ///
    /// # Errors
    ///
    /// Returns [`RhiError::InvalidResource`] if the buffer is not mapped.
    pub fn read_data(&self) -> RhiResult<Vec<u8>> {
        let ptr = self.mapped_ptr()?;
        let mut out = vec![0u8; self.size as usize];
        unsafe {
            std::ptr::copy_nonoverlapping(ptr as *const u8, out.as_mut_ptr(), out.len());
        }
        Ok(out)
    }

    fn check_range(&self, offset: vk::DeviceSize, len: usize) -> RhiResult<()> {
        let end = offset.saturating_add(len as vk::DeviceSize);
        if end > self.size {
            return Err(RhiError::InvalidResource(format!(
                "access exceeds {} buffer: offset {} + {} bytes > {}",
                self.usage.name(),
                offset,
                len,
                self.size
            )));
        }
        Ok(())
    }

    fn mapped_ptr(&self) -> RhiResult<*mut u8> {
        self.allocation
            .as_ref()
            .and_then(Allocation::mapped_ptr)
            .map(|ptr| ptr.as_ptr() as *mut u8)
            .ok_or_else(|| {
                RhiError::InvalidResource(format!("{} buffer is not host-visible", self.usage.name()))
            })
    }

    /// Returns the Vulkan buffer handle.
    #[inline]
    pub fn handle(&self) -> vk::Buffer {
        self.buffer
    }

    /// Returns the buffer size in bytes.
    #[inline]
    pub fn size(&self) -> vk::DeviceSize {
        self.size
    }

    /// Returns the buffer usage type.
    #[inline]
    pub fn usage(&self) -> BufferUsage {
        self.usage
    }
}

impl Drop for Buffer {
    fn drop(&mut self) {
        if let Some(allocation) = self.allocation.take() {
            memory::free(&self.device, allocation);
        }

        unsafe {
            self.device.handle().destroy_buffer(self.buffer, None);
        }

        debug!("Destroyed {} buffer", self.usage.name());
    }
}

// Safety: the raw mapped pointer inside the allocation is only dereferenced
// through &self methods that copy bounded ranges.
unsafe impl Send for Buffer {}
unsafe impl Sync for Buffer {}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test_support::headless_device;

    #[test]
    fn test_buffer_usage_to_vk_usage() {
        assert!(
            BufferUsage::Vertex
                .to_vk_usage()
                .contains(vk::BufferUsageFlags::VERTEX_BUFFER | vk::BufferUsageFlags::TRANSFER_DST)
        );
        assert!(
            BufferUsage::Index
                .to_vk_usage()
                .contains(vk::BufferUsageFlags::INDEX_BUFFER | vk::BufferUsageFlags::TRANSFER_DST)
        );
        assert!(
            BufferUsage::Uniform
                .to_vk_usage()
                .contains(vk::BufferUsageFlags::UNIFORM_BUFFER)
        );
        assert_eq!(
            BufferUsage::Staging.to_vk_usage(),
            vk::BufferUsageFlags::TRANSFER_SRC
        );
        assert_eq!(
            BufferUsage::Readback.to_vk_usage(),
            vk::BufferUsageFlags::TRANSFER_DST
        );
    }

    #[test]
    fn test_buffer_usage_memory_location() {
        assert_eq!(BufferUsage::Vertex.memory_location(), MemoryLocation::GpuOnly);
        assert_eq!(BufferUsage::Index.memory_location(), MemoryLocation::GpuOnly);
        assert_eq!(BufferUsage::Uniform.memory_location(), MemoryLocation::CpuToGpu);
        assert_eq!(BufferUsage::Staging.memory_location(), MemoryLocation::CpuToGpu);
        assert_eq!(BufferUsage::Readback.memory_location(), MemoryLocation::GpuToCpu);

        assert!(!BufferUsage::Vertex.is_host_visible());
        assert!(BufferUsage::Staging.is_host_visible());
    }

    #[test]
    fn test_buffer_is_send_sync() {
        fn assert_send_sync<T: Send + Sync>() {}
        assert_send_sync::<Buffer>();
    }

    #[test]
    fn test_zero_size_rejected() {
        let Some(device) = headless_device() else {
            return;
        };
        let err = Buffer::new(device, BufferUsage::Staging, 0).unwrap_err();
        assert!(matches!(err, RhiError::InvalidResource(_)));
    }

    #[test]
    fn test_staging_write_and_read() {
        let Some(device) = headless_device() else {
            return;
        };
        let data: Vec<u8> = (0..64).collect();
        let buffer = Buffer::new_with_data(device, BufferUsage::Staging, &data).unwrap();
        assert_eq!(buffer.size(), 64);
        assert_eq!(buffer.read_data().unwrap(), data);

        let err = buffer.write_data(60, &[0u8; 8]).unwrap_err();
        assert!(matches!(err, RhiError::InvalidResource(_)));
    }

    #[test]
    fn test_device_local_not_mappable() {
        let Some(device) = headless_device() else {
            return;
        };
        let buffer = Buffer::new(device, BufferUsage::Vertex, 16).unwrap();
        let err = buffer.write_data(0, &[1, 2, 3, 4]).unwrap_err();
        assert!(matches!(err, RhiError::InvalidResource(_)));
    }
}
