//! Descriptor set layouts, pools and writes.
//!
//! The quad uses one layout (uniform buffer at binding 0 for the vertex
//! stage, combined image sampler at binding 1 for the fragment stage) and
//! allocates one set per frame slot from a pool sized for exactly that.
//!
//! # Example
//!
//! ```no_run
//! use std::sync::Arc;
//! use vkframe_rhi::descriptor::{self, DescriptorPool, DescriptorSetLayout};
//! use vkframe_rhi::device::Device;
//! use vkframe_rhi::vk;
//!
//! # fn example(device: Arc<Device>) -> Result<(), vkframe_rhi::RhiError> {
//! let bindings = [
//!     descriptor::uniform_buffer_binding(0, vk::ShaderStageFlags::VERTEX),
//!     descriptor::combined_image_sampler_binding(1, vk::ShaderStageFlags::FRAGMENT),
//! ];
//! let layout = DescriptorSetLayout::new(device.clone(), &bindings)?;
//! let pool = DescriptorPool::for_bindings(device, &bindings, 2)?;
//! let sets = pool.allocate(&layout, 2)?;
//! # Ok(())
//! # }
//! ```

use std::sync::Arc;

use ash::vk;
use tracing::debug;

use crate::device::Device;
use crate::error::{RhiError, RhiResult};

/// Vulkan descriptor set layout wrapper.
pub struct DescriptorSetLayout {
    device: Arc<Device>,
    layout: vk::DescriptorSetLayout,
}

impl DescriptorSetLayout {
    /// Creates a descriptor set layout from `bindings`.
    ///
    /// # Errors
    ///
    /// Returns an error if layout creation fails.
    pub fn new(
        device: Arc<Device>,
        bindings: &[vk::DescriptorSetLayoutBinding<'_>],
    ) -> RhiResult<Self> {
        let create_info = vk::DescriptorSetLayoutCreateInfo::default().bindings(bindings);

        let layout = unsafe {
            device
                .handle()
                .create_descriptor_set_layout(&create_info, None)?
        };

        debug!("Created descriptor set layout with {} binding(s)", bindings.len());

        Ok(Self { device, layout })
    }

    #[inline]
    pub fn handle(&self) -> vk::DescriptorSetLayout {
        self.layout
    }
}

impl Drop for DescriptorSetLayout {
    fn drop(&mut self) {
        unsafe {
            self.device
                .handle()
                .destroy_descriptor_set_layout(self.layout, None);
        }
    }
}

/// Pool sizes that fit `set_count` sets of a layout with `bindings`.
pub fn pool_sizes(
    bindings: &[vk::DescriptorSetLayoutBinding<'_>],
    set_count: u32,
) -> Vec<vk::DescriptorPoolSize> {
    let mut sizes: Vec<vk::DescriptorPoolSize> = Vec::new();
    for binding in bindings {
        let count = binding.descriptor_count * set_count;
        match sizes.iter_mut().find(|s| s.ty == binding.descriptor_type) {
            Some(size) => size.descriptor_count += count,
            None => sizes.push(
                vk::DescriptorPoolSize::default()
                    .ty(binding.descriptor_type)
                    .descriptor_count(count),
            ),
        }
    }
    sizes
}

/// Vulkan descriptor pool wrapper.
///
/// Sets are released together when the pool is destroyed.
pub struct DescriptorPool {
    device: Arc<Device>,
    pool: vk::DescriptorPool,
    max_sets: u32,
}

impl std::fmt::Debug for DescriptorPool {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("DescriptorPool")
            .field("pool", &self.pool)
            .field("max_sets", &self.max_sets)
            .finish_non_exhaustive()
    }
}

impl DescriptorPool {
    /// Creates a pool with explicit sizes.
    ///
    /// # Errors
    ///
    /// Returns an error if pool creation fails.
    pub fn new(
        device: Arc<Device>,
        max_sets: u32,
        pool_sizes: &[vk::DescriptorPoolSize],
    ) -> RhiResult<Self> {
        let create_info = vk::DescriptorPoolCreateInfo::default()
            .max_sets(max_sets)
            .pool_sizes(pool_sizes);

        let pool = unsafe { device.handle().create_descriptor_pool(&create_info, None)? };

        debug!(
            "Created descriptor pool: max_sets={}, pool_sizes={}",
            max_sets,
            pool_sizes.len()
        );

        Ok(Self {
            device,
            pool,
            max_sets,
        })
    }

    /// Creates a pool that holds exactly `set_count` sets of one layout.
    ///
    /// # Errors
    ///
    /// Returns [`RhiError::InvalidResource`] if `bindings` is empty or
    /// `set_count` is zero, or the Vulkan error.
    pub fn for_bindings(
        device: Arc<Device>,
        bindings: &[vk::DescriptorSetLayoutBinding<'_>],
        set_count: u32,
    ) -> RhiResult<Self> {
        if bindings.is_empty() || set_count == 0 {
            return Err(RhiError::InvalidResource(
                "descriptor pool needs at least one binding and one set".to_string(),
            ));
        }
        Self::new(device, set_count, &pool_sizes(bindings, set_count))
    }

    /// Allocates `count` sets of `layout`.
    ///
    /// # Errors
    ///
    /// Returns an error if the pool is exhausted.
    pub fn allocate(
        &self,
        layout: &DescriptorSetLayout,
        count: usize,
    ) -> RhiResult<Vec<vk::DescriptorSet>> {
        let layouts = vec![layout.handle(); count];
        let alloc_info = vk::DescriptorSetAllocateInfo::default()
            .descriptor_pool(self.pool)
            .set_layouts(&layouts);

        let sets = unsafe { self.device.handle().allocate_descriptor_sets(&alloc_info)? };

        debug!("Allocated {} descriptor set(s)", sets.len());

        Ok(sets)
    }

    #[inline]
    pub fn handle(&self) -> vk::DescriptorPool {
        self.pool
    }

    #[inline]
    pub fn max_sets(&self) -> u32 {
        self.max_sets
    }
}

impl Drop for DescriptorPool {
    fn drop(&mut self) {
        unsafe {
            self.device
                .handle()
                .destroy_descriptor_pool(self.pool, None);
        }
    }
}

/// Uniform buffer binding with one descriptor.
#[inline]
pub fn uniform_buffer_binding(
    binding: u32,
    stage_flags: vk::ShaderStageFlags,
) -> vk::DescriptorSetLayoutBinding<'static> {
    vk::DescriptorSetLayoutBinding::default()
        .binding(binding)
        .descriptor_type(vk::DescriptorType::UNIFORM_BUFFER)
        .descriptor_count(1)
        .stage_flags(stage_flags)
}

/// Combined image sampler binding with one descriptor.
#[inline]
pub fn combined_image_sampler_binding(
    binding: u32,
    stage_flags: vk::ShaderStageFlags,
) -> vk::DescriptorSetLayoutBinding<'static> {
    vk::DescriptorSetLayoutBinding::default()
        .binding(binding)
        .descriptor_type(vk::DescriptorType::COMBINED_IMAGE_SAMPLER)
        .descriptor_count(1)
        .stage_flags(stage_flags)
}

/// Points `binding` of `set` at a whole uniform buffer.
pub fn write_uniform_buffer(
    device: &Device,
    set: vk::DescriptorSet,
    binding: u32,
    buffer: vk::Buffer,
    range: vk::DeviceSize,
) {
    let buffer_infos = [vk::DescriptorBufferInfo::default()
        .buffer(buffer)
        .offset(0)
        .range(range)];
    let write = vk::WriteDescriptorSet::default()
        .dst_set(set)
        .dst_binding(binding)
        .dst_array_element(0)
        .descriptor_type(vk::DescriptorType::UNIFORM_BUFFER)
        .buffer_info(&buffer_infos);

    unsafe { device.handle().update_descriptor_sets(&[write], &[]) };
}

/// Points `binding` of `set` at a sampled image.
pub fn write_combined_image_sampler(
    device: &Device,
    set: vk::DescriptorSet,
    binding: u32,
    image_info: vk::DescriptorImageInfo,
) {
    let image_infos = [image_info];
    let write = vk::WriteDescriptorSet::default()
        .dst_set(set)
        .dst_binding(binding)
        .dst_array_element(0)
        .descriptor_type(vk::DescriptorType::COMBINED_IMAGE_SAMPLER)
        .image_info(&image_infos);

    unsafe { device.handle().update_descriptor_sets(&[write], &[]) };
}
