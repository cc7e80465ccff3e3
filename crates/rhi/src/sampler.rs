//! Texture sampler.

use std::sync::Arc;

use ash::vk;
use tracing::debug;

use crate::device::Device;
use crate::error::RhiResult;

/// Vulkan sampler wrapper.
pub struct Sampler {
    device: Arc<Device>,
    sampler: vk::Sampler,
}

impl Sampler {
    /// Creates a sampler with linear filtering and repeat addressing.
    ///
    /// # Errors
    ///
    /// Returns an error if sampler creation fails.
    pub fn linear(device: Arc<Device>) -> RhiResult<Self> {
        Self::new(device, vk::Filter::LINEAR, vk::SamplerAddressMode::REPEAT)
    }

    /// Creates a single-mip sampler without anisotropy.
    ///
    /// # Errors
    ///
    /// Returns an error if sampler creation fails.
    pub fn new(
        device: Arc<Device>,
        filter: vk::Filter,
        address_mode: vk::SamplerAddressMode,
    ) -> RhiResult<Self> {
        let create_info = vk::SamplerCreateInfo::default()
            .mag_filter(filter)
            .min_filter(filter)
            .address_mode_u(address_mode)
            .address_mode_v(address_mode)
            .address_mode_w(address_mode)
            .anisotropy_enable(false)
            .max_anisotropy(1.0)
            .border_color(vk::BorderColor::INT_OPAQUE_BLACK)
            .unnormalized_coordinates(false)
            .compare_enable(false)
            .compare_op(vk::CompareOp::ALWAYS)
            .mipmap_mode(vk::SamplerMipmapMode::LINEAR)
            .mip_lod_bias(0.0)
            .min_lod(0.0)
            .max_lod(0.0);

        let sampler = unsafe { device.handle().create_sampler(&create_info, None)? };
        debug!("Created sampler ({:?}, {:?})", filter, address_mode);

        Ok(Self { device, sampler })
    }

    #[inline]
    pub fn handle(&self) -> vk::Sampler {
        self.sampler
    }
}

impl Drop for Sampler {
    fn drop(&mut self) {
        unsafe {
            self.device.handle().destroy_sampler(self.sampler, None);
        }
    }
}
