//! Sampled textures.
//!
//! A [`Texture`] pairs an uploaded [`Image`] in SHADER_READ_ONLY layout with
//! the [`Sampler`] it is read through, ready for a combined image sampler
//! descriptor.

use ash::vk;

use crate::error::{RhiError, RhiResult};
use crate::image::Image;
use crate::sampler::Sampler;

/// Shader-readable image plus sampler.
pub struct Texture {
    image: Image,
    sampler: Sampler,
}

impl Texture {
    /// Wraps an uploaded image.
    ///
    /// # Errors
    ///
    /// Returns [`RhiError::InvalidResource`] if the image has not been
    /// transitioned to SHADER_READ_ONLY_OPTIMAL.
    pub fn new(image: Image, sampler: Sampler) -> RhiResult<Self> {
        if image.layout() != vk::ImageLayout::SHADER_READ_ONLY_OPTIMAL {
            return Err(RhiError::InvalidResource(format!(
                "texture image is in {:?}, expected SHADER_READ_ONLY_OPTIMAL",
                image.layout()
            )));
        }
        Ok(Self { image, sampler })
    }

    #[inline]
    pub fn image(&self) -> &Image {
        &self.image
    }

    #[inline]
    pub fn sampler(&self) -> &Sampler {
        &self.sampler
    }

    /// Descriptor info for a combined image sampler binding.
    pub fn descriptor_info(&self) -> vk::DescriptorImageInfo {
        vk::DescriptorImageInfo::default()
            .image_layout(vk::ImageLayout::SHADER_READ_ONLY_OPTIMAL)
            .image_view(self.image.view())
            .sampler(self.sampler.handle())
    }
}
