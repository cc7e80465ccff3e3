//! Memory-type selection and allocation helpers.
//!
//! Allocation itself goes through gpu-allocator. Before a request is handed to
//! the allocator, the resource's memory-type bitmask is intersected with the
//! property flags its [`MemoryLocation`] requires, so an impossible request
//! fails with [`RhiError::NoSuitableMemoryType`] instead of an opaque allocator
//! error.

use ash::vk;
use gpu_allocator::MemoryLocation;
use gpu_allocator::vulkan::{Allocation, AllocationCreateDesc, AllocationScheme};
use tracing::trace;

use crate::device::Device;
use crate::error::{RhiError, RhiResult};

/// Property flags a memory location must provide.
pub fn required_properties(location: MemoryLocation) -> vk::MemoryPropertyFlags {
    match location {
        MemoryLocation::GpuOnly => vk::MemoryPropertyFlags::DEVICE_LOCAL,
        MemoryLocation::CpuToGpu => {
            vk::MemoryPropertyFlags::HOST_VISIBLE | vk::MemoryPropertyFlags::HOST_COHERENT
        }
        MemoryLocation::GpuToCpu => vk::MemoryPropertyFlags::HOST_VISIBLE,
        MemoryLocation::Unknown => vk::MemoryPropertyFlags::empty(),
    }
}

/// Finds the first memory type allowed by `type_bits` whose property flags
/// contain `required`.
///
/// # Errors
///
/// Returns [`RhiError::NoSuitableMemoryType`] if the intersection is empty.
pub fn find_memory_type(
    memory_properties: &vk::PhysicalDeviceMemoryProperties,
    type_bits: u32,
    required: vk::MemoryPropertyFlags,
) -> RhiResult<u32> {
    memory_properties
        .memory_types
        .iter()
        .take(memory_properties.memory_type_count as usize)
        .enumerate()
        .find(|(i, memory_type)| {
            type_bits & (1 << i) != 0 && memory_type.property_flags.contains(required)
        })
        .map(|(i, _)| i as u32)
        .ok_or(RhiError::NoSuitableMemoryType {
            type_bits,
            required,
        })
}

/// Allocates memory for a resource with the given requirements.
///
/// # Errors
///
/// Returns [`RhiError::NoSuitableMemoryType`] when no memory type satisfies the
/// location, or the allocator's error otherwise.
pub(crate) fn allocate(
    device: &Device,
    name: &str,
    requirements: vk::MemoryRequirements,
    location: MemoryLocation,
    linear: bool,
) -> RhiResult<Allocation> {
    let memory_type = find_memory_type(
        device.memory_properties(),
        requirements.memory_type_bits,
        required_properties(location),
    )?;
    trace!(
        "'{}': {} bytes, location {:?}, first matching memory type {}",
        name, requirements.size, location, memory_type
    );

    let mut allocator = device.lock_allocator()?;
    let allocation = allocator.allocate(&AllocationCreateDesc {
        name,
        requirements,
        location,
        linear,
        allocation_scheme: AllocationScheme::GpuAllocatorManaged,
    })?;
    Ok(allocation)
}

/// Returns an allocation to the allocator, logging instead of failing.
pub(crate) fn free(device: &Device, allocation: Allocation) {
    match device.lock_allocator() {
        Ok(mut allocator) => {
            if let Err(e) = allocator.free(allocation) {
                tracing::error!("Failed to free allocation: {:?}", e);
            }
        }
        Err(e) => tracing::error!("Failed to free allocation: {}", e),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn memory_properties(flags: &[vk::MemoryPropertyFlags]) -> vk::PhysicalDeviceMemoryProperties {
        let mut props = vk::PhysicalDeviceMemoryProperties {
            memory_type_count: flags.len() as u32,
            ..Default::default()
        };
        for (slot, &property_flags) in props.memory_types.iter_mut().zip(flags) {
            slot.property_flags = property_flags;
        }
        props
    }

    #[test]
    fn test_find_memory_type_respects_type_bits() {
        let props = memory_properties(&[
            vk::MemoryPropertyFlags::DEVICE_LOCAL,
            vk::MemoryPropertyFlags::HOST_VISIBLE | vk::MemoryPropertyFlags::HOST_COHERENT,
            vk::MemoryPropertyFlags::DEVICE_LOCAL,
        ]);

        assert_eq!(
            find_memory_type(&props, 0b111, vk::MemoryPropertyFlags::DEVICE_LOCAL).unwrap(),
            0
        );
        assert_eq!(
            find_memory_type(&props, 0b100, vk::MemoryPropertyFlags::DEVICE_LOCAL).unwrap(),
            2
        );
    }

    #[test]
    fn test_find_memory_type_requires_all_flags() {
        let props = memory_properties(&[
            vk::MemoryPropertyFlags::HOST_VISIBLE,
            vk::MemoryPropertyFlags::HOST_VISIBLE | vk::MemoryPropertyFlags::HOST_COHERENT,
        ]);

        let staging = required_properties(MemoryLocation::CpuToGpu);
        assert_eq!(find_memory_type(&props, 0b11, staging).unwrap(), 1);
    }

    #[test]
    fn test_find_memory_type_empty_intersection() {
        let props = memory_properties(&[
            vk::MemoryPropertyFlags::DEVICE_LOCAL,
            vk::MemoryPropertyFlags::HOST_VISIBLE | vk::MemoryPropertyFlags::HOST_COHERENT,
        ]);

        let err = find_memory_type(&props, 0b01, required_properties(MemoryLocation::CpuToGpu))
            .unwrap_err();
        assert!(matches!(
            err,
            RhiError::NoSuitableMemoryType { type_bits: 0b01, .. }
        ));
    }

    #[test]
    fn test_find_memory_type_ignores_types_past_count() {
        let mut props = memory_properties(&[vk::MemoryPropertyFlags::HOST_VISIBLE]);
        props.memory_types[1].property_flags = vk::MemoryPropertyFlags::DEVICE_LOCAL;

        assert!(find_memory_type(&props, 0b11, vk::MemoryPropertyFlags::DEVICE_LOCAL).is_err());
    }

    #[test]
    fn test_required_properties() {
        assert_eq!(
            required_properties(MemoryLocation::GpuOnly),
            vk::MemoryPropertyFlags::DEVICE_LOCAL
        );
        assert!(
            required_properties(MemoryLocation::CpuToGpu)
                .contains(vk::MemoryPropertyFlags::HOST_COHERENT)
        );
        assert!(
            required_properties(MemoryLocation::GpuToCpu)
                .contains(vk::MemoryPropertyFlags::HOST_VISIBLE)
        );
    }
}
