//! Device-local images and layout transitions.
//!
//! [`Image`] owns a 2D VkImage, its memory and one view over the whole image,
//! and remembers the layout it was last transitioned to. The barrier table
//! used for transitions lives in [`transition_masks`].

use std::sync::Arc;

use ash::vk;
use gpu_allocator::MemoryLocation;
use gpu_allocator::vulkan::Allocation;
use tracing::debug;

use crate::device::Device;
use crate::error::{RhiError, RhiResult};
use crate::memory;

/// Access masks and pipeline stages for one layout transition.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct TransitionMasks {
    pub src_access: vk::AccessFlags,
    pub dst_access: vk::AccessFlags,
    pub src_stage: vk::PipelineStageFlags,
    pub dst_stage: vk::PipelineStageFlags,
}

/// Looks up the barrier masks for `old -> new`.
///
/// # Errors
///
/// Returns [`RhiError::UnsupportedLayoutTransition`] for any pair outside the
/// table.
pub fn transition_masks(old: vk::ImageLayout, new: vk::ImageLayout) -> RhiResult<TransitionMasks> {
    match (old, new) {
        (vk::ImageLayout::UNDEFINED, vk::ImageLayout::TRANSFER_DST_OPTIMAL) => Ok(TransitionMasks {
            src_access: vk::AccessFlags::empty(),
            dst_access: vk::AccessFlags::TRANSFER_WRITE,
            src_stage: vk::PipelineStageFlags::TOP_OF_PIPE,
            dst_stage: vk::PipelineStageFlags::TRANSFER,
        }),
        (vk::ImageLayout::TRANSFER_DST_OPTIMAL, vk::ImageLayout::SHADER_READ_ONLY_OPTIMAL) => {
            Ok(TransitionMasks {
                src_access: vk::AccessFlags::TRANSFER_WRITE,
                dst_access: vk::AccessFlags::SHADER_READ,
                src_stage: vk::PipelineStageFlags::TRANSFER,
                dst_stage: vk::PipelineStageFlags::FRAGMENT_SHADER,
            })
        }
        (vk::ImageLayout::UNDEFINED, vk::ImageLayout::DEPTH_STENCIL_ATTACHMENT_OPTIMAL) => {
            Ok(TransitionMasks {
                src_access: vk::AccessFlags::empty(),
                dst_access: vk::AccessFlags::DEPTH_STENCIL_ATTACHMENT_READ
                    | vk::AccessFlags::DEPTH_STENCIL_ATTACHMENT_WRITE,
                src_stage: vk::PipelineStageFlags::TOP_OF_PIPE,
                dst_stage: vk::PipelineStageFlags::EARLY_FRAGMENT_TESTS,
            })
        }
        _ => Err(RhiError::UnsupportedLayoutTransition { old, new }),
    }
}

/// Whether `format` carries a stencil component.
pub fn format_has_stencil(format: vk::Format) -> bool {
    matches!(
        format,
        vk::Format::D32_SFLOAT_S8_UINT
            | vk::Format::D24_UNORM_S8_UINT
            | vk::Format::D16_UNORM_S8_UINT
            | vk::Format::S8_UINT
    )
}

/// Whether `format` is a depth (or depth/stencil) format.
pub fn is_depth_format(format: vk::Format) -> bool {
    matches!(
        format,
        vk::Format::D32_SFLOAT
            | vk::Format::D32_SFLOAT_S8_UINT
            | vk::Format::D24_UNORM_S8_UINT
            | vk::Format::D16_UNORM
            | vk::Format::D16_UNORM_S8_UINT
    )
}

/// Aspect flags covering every component of `format`.
pub fn aspect_mask(format: vk::Format) -> vk::ImageAspectFlags {
    if is_depth_format(format) {
        if format_has_stencil(format) {
            vk::ImageAspectFlags::DEPTH | vk::ImageAspectFlags::STENCIL
        } else {
            vk::ImageAspectFlags::DEPTH
        }
    } else {
        vk::ImageAspectFlags::COLOR
    }
}

/// Size of one texel for the color formats uploads accept.
pub fn bytes_per_pixel(format: vk::Format) -> Option<usize> {
    match format {
        vk::Format::R8G8B8A8_SRGB
        | vk::Format::R8G8B8A8_UNORM
        | vk::Format::B8G8R8A8_SRGB
        | vk::Format::B8G8R8A8_UNORM => Some(4),
        vk::Format::R8_UNORM => Some(1),
        _ => None,
    }
}

/// Builds the image barrier for `old -> new` over the whole image.
///
/// # Errors
///
/// Returns [`RhiError::UnsupportedLayoutTransition`] if the pair is not in
/// the barrier table.
pub fn layout_barrier(
    image: vk::Image,
    format: vk::Format,
    old: vk::ImageLayout,
    new: vk::ImageLayout,
) -> RhiResult<(vk::ImageMemoryBarrier<'static>, TransitionMasks)> {
    let masks = transition_masks(old, new)?;
    let barrier = vk::ImageMemoryBarrier::default()
        .old_layout(old)
        .new_layout(new)
        .src_queue_family_index(vk::QUEUE_FAMILY_IGNORED)
        .dst_queue_family_index(vk::QUEUE_FAMILY_IGNORED)
        .image(image)
        .subresource_range(full_range(format))
        .src_access_mask(masks.src_access)
        .dst_access_mask(masks.dst_access);
    Ok((barrier, masks))
}

fn full_range(format: vk::Format) -> vk::ImageSubresourceRange {
    vk::ImageSubresourceRange::default()
        .aspect_mask(aspect_mask(format))
        .base_mip_level(0)
        .level_count(1)
        .base_array_layer(0)
        .layer_count(1)
}

/// Device-local 2D image with a view.
pub struct Image {
    device: Arc<Device>,
    image: vk::Image,
    view: vk::ImageView,
    allocation: Option<Allocation>,
    format: vk::Format,
    extent: vk::Extent2D,
    layout: vk::ImageLayout,
}

impl std::fmt::Debug for Image {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Image")
            .field("image", &self.image)
            .field("view", &self.view)
            .field("format", &self.format)
            .field("extent", &self.extent)
            .field("layout", &self.layout)
            .finish_non_exhaustive()
    }
}

impl Image {
    /// Creates an optimally tiled, single-mip 2D image in UNDEFINED layout.
    ///
    /// # Errors
    ///
    /// Returns [`RhiError::InvalidResource`] for a zero extent, or the
    /// Vulkan/allocator error.
    pub fn new(
        device: Arc<Device>,
        extent: vk::Extent2D,
        format: vk::Format,
        usage: vk::ImageUsageFlags,
    ) -> RhiResult<Self> {
        if extent.width == 0 || extent.height == 0 {
            return Err(RhiError::InvalidResource(format!(
                "image extent must be non-zero, got {}x{}",
                extent.width, extent.height
            )));
        }

        let image_info = vk::ImageCreateInfo::default()
            .image_type(vk::ImageType::TYPE_2D)
            .format(format)
            .extent(vk::Extent3D {
                width: extent.width,
                height: extent.height,
                depth: 1,
            })
            .mip_levels(1)
            .array_layers(1)
            .samples(vk::SampleCountFlags::TYPE_1)
            .tiling(vk::ImageTiling::OPTIMAL)
            .usage(usage)
            .sharing_mode(vk::SharingMode::EXCLUSIVE)
            .initial_layout(vk::ImageLayout::UNDEFINED);

        let image = unsafe { device.handle().create_image(&image_info, None)? };
        let requirements = unsafe { device.handle().get_image_memory_requirements(image) };

        let allocation =
            match memory::allocate(&device, "image", requirements, MemoryLocation::GpuOnly, false) {
                Ok(allocation) => allocation,
                Err(e) => {
                    unsafe { device.handle().destroy_image(image, None) };
                    return Err(e);
                }
            };

        let view = unsafe {
            device
                .handle()
                .bind_image_memory(image, allocation.memory(), allocation.offset())
        }
        .and_then(|()| {
            let view_info = vk::ImageViewCreateInfo::default()
                .image(image)
                .view_type(vk::ImageViewType::TYPE_2D)
                .format(format)
                .subresource_range(full_range(format));
            unsafe { device.handle().create_image_view(&view_info, None) }
        });

        let view = match view {
            Ok(view) => view,
            Err(e) => {
                memory::free(&device, allocation);
                unsafe { device.handle().destroy_image(image, None) };
                return Err(e.into());
            }
        };

        debug!(
            "Created image {}x{} ({:?}, {:?})",
            extent.width, extent.height, format, usage
        );

        Ok(Self {
            device,
            image,
            view,
            allocation: Some(allocation),
            format,
            extent,
            layout: vk::ImageLayout::UNDEFINED,
        })
    }

    /// Returns the Vulkan image handle.
    #[inline]
    pub fn handle(&self) -> vk::Image {
        self.image
    }

    /// Returns the view over the whole image.
    #[inline]
    pub fn view(&self) -> vk::ImageView {
        self.view
    }

    #[inline]
    pub fn format(&self) -> vk::Format {
        self.format
    }

    #[inline]
    pub fn extent(&self) -> vk::Extent2D {
        self.extent
    }

    /// Layout after the last recorded transition.
    #[inline]
    pub fn layout(&self) -> vk::ImageLayout {
        self.layout
    }

    pub(crate) fn set_layout(&mut self, layout: vk::ImageLayout) {
        self.layout = layout;
    }
}

impl Drop for Image {
    fn drop(&mut self) {
        unsafe {
            self.device.handle().destroy_image_view(self.view, None);
            self.device.handle().destroy_image(self.image, None);
        }
        if let Some(allocation) = self.allocation.take() {
            memory::free(&self.device, allocation);
        }
        debug!(
            "Destroyed image {}x{}",
            self.extent.width, self.extent.height
        );
    }
}
