//! RHI-specific error types.

use ash::vk;
use thiserror::Error;

/// RHI-specific error type.
#[derive(Error, Debug)]
pub enum RhiError {
    /// Vulkan API error
    #[error("Vulkan error: {0}")]
    VulkanError(#[from] vk::Result),

    /// Failed to load Vulkan
    #[error("Failed to load Vulkan: {0}")]
    LoadingError(#[from] ash::LoadingError),

    /// GPU allocator error
    #[error("Allocator error: {0}")]
    AllocatorError(gpu_allocator::AllocationError),

    /// The allocator mutex was poisoned by a panicking thread
    #[error("Allocator lock poisoned")]
    AllocatorPoisoned,

    /// Physical device enumeration returned nothing
    #[error("No Vulkan-capable device found")]
    NoVulkanSupport,

    /// Devices exist but none meets the mandatory capabilities
    #[error("No suitable GPU found")]
    NoSuitableDevice,

    /// No memory type matches both the resource bitmask and the required flags
    #[error("No suitable memory type (type bits {type_bits:#b}, required {required:?})")]
    NoSuitableMemoryType {
        /// Memory type bitmask reported by the resource
        type_bits: u32,
        /// Property flags the allocation needed
        required: vk::MemoryPropertyFlags,
    },

    /// The barrier table has no entry for this layout pair
    #[error("Unsupported layout transition: {old:?} -> {new:?}")]
    UnsupportedLayoutTransition {
        /// Current layout
        old: vk::ImageLayout,
        /// Requested layout
        new: vk::ImageLayout,
    },

    /// Invalid buffer/image parameters or payload
    #[error("Invalid resource: {0}")]
    InvalidResource(String),

    /// Shader module error
    #[error("Shader error: {0}")]
    ShaderError(String),

    /// Surface creation error
    #[error("Surface error: {0}")]
    SurfaceError(String),

    /// The presentation surface is gone and cannot be recreated
    #[error("Surface lost")]
    SurfaceLost,

    /// Swapchain error
    #[error("Swapchain error: {0}")]
    SwapchainError(String),

    /// Pipeline creation error
    #[error("Pipeline error: {0}")]
    PipelineError(String),
}

impl From<gpu_allocator::AllocationError> for RhiError {
    fn from(err: gpu_allocator::AllocationError) -> Self {
        match err {
            gpu_allocator::AllocationError::NoCompatibleMemoryTypeFound => {
                RhiError::NoSuitableMemoryType {
                    type_bits: 0,
                    required: vk::MemoryPropertyFlags::empty(),
                }
            }
            other => RhiError::AllocatorError(other),
        }
    }
}

impl RhiError {
    /// Whether this error aborts startup rather than a single operation.
    pub fn is_fatal_setup(&self) -> bool {
        matches!(
            self,
            RhiError::LoadingError(_)
                | RhiError::NoVulkanSupport
                | RhiError::NoSuitableDevice
                | RhiError::SurfaceError(_)
                | RhiError::SurfaceLost
        )
    }
}

/// Result type alias for RHI operations.
pub type RhiResult<T> = std::result::Result<T, RhiError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_allocator_no_memory_type_maps() {
        let err: RhiError = gpu_allocator::AllocationError::NoCompatibleMemoryTypeFound.into();
        assert!(matches!(err, RhiError::NoSuitableMemoryType { .. }));

        let err: RhiError = gpu_allocator::AllocationError::OutOfMemory.into();
        assert!(matches!(err, RhiError::AllocatorError(_)));
    }

    #[test]
    fn test_fatal_setup_classification() {
        assert!(RhiError::NoSuitableDevice.is_fatal_setup());
        assert!(RhiError::NoVulkanSupport.is_fatal_setup());
        assert!(RhiError::SurfaceLost.is_fatal_setup());
        assert!(!RhiError::InvalidResource("empty".into()).is_fatal_setup());
        assert!(!RhiError::VulkanError(vk::Result::ERROR_OUT_OF_DATE_KHR).is_fatal_setup());
    }

    #[test]
    fn test_layout_error_message() {
        let err = RhiError::UnsupportedLayoutTransition {
            old: vk::ImageLayout::GENERAL,
            new: vk::ImageLayout::PRESENT_SRC_KHR,
        };
        assert!(err.to_string().contains("GENERAL"));
    }
}
