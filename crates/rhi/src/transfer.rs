//! One-shot GPU transfers.
//!
//! [`TransferEngine`] moves CPU data into device-local memory. Every operation
//! records a single ONE_TIME_SUBMIT command buffer from a transient pool on
//! the graphics family, submits it, and blocks on `vkQueueWaitIdle` before
//! returning, so staging buffers are released only after the GPU is done with
//! them.
//!
//! # Example
//!
//! ```no_run
//! use std::sync::Arc;
//! use vkframe_rhi::buffer::BufferUsage;
//! use vkframe_rhi::device::Device;
//! use vkframe_rhi::transfer::TransferEngine;
//! use vkframe_rhi::vk;
//!
//! # fn example(device: Arc<Device>) -> Result<(), vkframe_rhi::RhiError> {
//! let transfer = TransferEngine::new(device)?;
//!
//! let indices: [u16; 6] = [0, 1, 2, 2, 3, 0];
//! let index_buffer = transfer.upload_buffer(bytemuck::cast_slice(&indices), BufferUsage::Index)?;
//!
//! let pixels = vec![255u8; 4 * 4 * 4];
//! let image = transfer.upload_image(&pixels, 4, 4, vk::Format::R8G8B8A8_SRGB)?;
//! # Ok(())
//! # }
//! ```

use std::sync::Arc;

use ash::vk;
use tracing::{debug, info};

use crate::buffer::{Buffer, BufferUsage};
use crate::command::{CommandBuffer, CommandPool};
use crate::device::Device;
use crate::error::{RhiError, RhiResult};
use crate::image::{self, Image};

/// Staged uploads, layout transitions and readback through blocking one-shot
/// submissions on the graphics queue.
pub struct TransferEngine {
    device: Arc<Device>,
    pool: CommandPool,
}

impl TransferEngine {
    /// Creates the engine and its transient command pool.
    ///
    /// # Errors
    ///
    /// Returns an error if the device has no graphics family or pool creation
    /// fails.
    pub fn new(device: Arc<Device>) -> RhiResult<Self> {
        let family = device
            .queue_families()
            .graphics_family
            .ok_or(RhiError::NoSuitableDevice)?;
        let pool = CommandPool::new_transient(device.clone(), family)?;

        info!("Transfer engine ready on queue family {}", family);

        Ok(Self { device, pool })
    }

    /// Returns the device this engine submits to.
    #[inline]
    pub fn device(&self) -> &Arc<Device> {
        &self.device
    }

    /// Records `record` into a fresh command buffer, submits it and waits for
    /// the graphics queue to go idle.
    ///
    /// The command buffer is freed on every path once recording has started.
    ///
    /// # Errors
    ///
    /// Returns the first error from recording, submission or the wait.
    pub fn one_shot<F>(&self, record: F) -> RhiResult<()>
    where
        F: FnOnce(&CommandBuffer) -> RhiResult<()>,
    {
        let cmd = CommandBuffer::new(self.device.clone(), &self.pool)?;
        let result = self.record_and_submit(&cmd, record);
        self.pool.free(cmd);
        result
    }

    fn record_and_submit<F>(&self, cmd: &CommandBuffer, record: F) -> RhiResult<()>
    where
        F: FnOnce(&CommandBuffer) -> RhiResult<()>,
    {
        cmd.begin()?;
        record(cmd)?;
        cmd.end()?;

        let command_buffers = [cmd.handle()];
        let submit_info = vk::SubmitInfo::default().command_buffers(&command_buffers);

        unsafe {
            self.device
                .submit_graphics(&[submit_info], vk::Fence::null())?;
            self.device
                .handle()
                .queue_wait_idle(self.device.graphics_queue())?;
        }
        Ok(())
    }

    /// Copies `data` into a new device-local buffer through a staging buffer.
    ///
    /// # Errors
    ///
    /// Returns [`RhiError::InvalidResource`] for an empty payload or a
    /// host-visible `usage`, and allocation or submission errors otherwise.
    pub fn upload_buffer(&self, data: &[u8], usage: BufferUsage) -> RhiResult<Buffer> {
        if data.is_empty() {
            return Err(RhiError::InvalidResource(format!(
                "empty {} upload",
                usage.name()
            )));
        }
        if usage.is_host_visible() {
            return Err(RhiError::InvalidResource(format!(
                "{} buffers are host-visible and are written directly",
                usage.name()
            )));
        }

        let size = data.len() as vk::DeviceSize;
        let staging = Buffer::new_with_data(self.device.clone(), BufferUsage::Staging, data)?;
        let destination = Buffer::new(self.device.clone(), usage, size)?;

        self.one_shot(|cmd| {
            let region = vk::BufferCopy::default().size(size);
            cmd.copy_buffer(staging.handle(), destination.handle(), &[region]);
            Ok(())
        })?;

        debug!("Uploaded {} bytes into {} buffer", size, usage.name());
        Ok(destination)
    }

    /// Uploads tightly packed pixels into a new sampled image and leaves it in
    /// SHADER_READ_ONLY_OPTIMAL.
    ///
    /// # Errors
    ///
    /// Returns [`RhiError::InvalidResource`] if the format is not an upload
    /// format or `pixels.len()` is not `width * height * bytes_per_pixel`.
    pub fn upload_image(
        &self,
        pixels: &[u8],
        width: u32,
        height: u32,
        format: vk::Format,
    ) -> RhiResult<Image> {
        let bpp = image::bytes_per_pixel(format).ok_or_else(|| {
            RhiError::InvalidResource(format!("{:?} is not an upload format", format))
        })?;
        let expected = width as usize * height as usize * bpp;
        if pixels.is_empty() || pixels.len() != expected {
            return Err(RhiError::InvalidResource(format!(
                "pixel payload is {} bytes, expected {} for {}x{} {:?}",
                pixels.len(),
                expected,
                width,
                height,
                format
            )));
        }

        let extent = vk::Extent2D { width, height };
        let staging = Buffer::new_with_data(self.device.clone(), BufferUsage::Staging, pixels)?;
        let mut texture = Image::new(
            self.device.clone(),
            extent,
            format,
            vk::ImageUsageFlags::TRANSFER_DST | vk::ImageUsageFlags::SAMPLED,
        )?;

        let (to_dst, to_dst_masks) = image::layout_barrier(
            texture.handle(),
            format,
            vk::ImageLayout::UNDEFINED,
            vk::ImageLayout::TRANSFER_DST_OPTIMAL,
        )?;
        let (to_read, to_read_masks) = image::layout_barrier(
            texture.handle(),
            format,
            vk::ImageLayout::TRANSFER_DST_OPTIMAL,
            vk::ImageLayout::SHADER_READ_ONLY_OPTIMAL,
        )?;

        self.one_shot(|cmd| {
            cmd.pipeline_barrier(to_dst_masks.src_stage, to_dst_masks.dst_stage, &[to_dst]);
            cmd.copy_buffer_to_image(
                staging.handle(),
                texture.handle(),
                vk::ImageLayout::TRANSFER_DST_OPTIMAL,
                &[image_copy_region(format, extent)],
            );
            cmd.pipeline_barrier(to_read_masks.src_stage, to_read_masks.dst_stage, &[to_read]);
            Ok(())
        })?;
        texture.set_layout(vk::ImageLayout::SHADER_READ_ONLY_OPTIMAL);

        debug!("Uploaded {}x{} {:?} image", width, height, format);
        Ok(texture)
    }

    /// Transitions `image` from its current layout to `new` in a standalone
    /// submission.
    ///
    /// # Errors
    ///
    /// Returns [`RhiError::UnsupportedLayoutTransition`] if the pair is not in
    /// the barrier table.
    pub fn transition_image_layout(&self, image: &mut Image, new: vk::ImageLayout) -> RhiResult<()> {
        let old = image.layout();
        let (barrier, masks) = image::layout_barrier(image.handle(), image.format(), old, new)?;

        self.one_shot(|cmd| {
            cmd.pipeline_barrier(masks.src_stage, masks.dst_stage, &[barrier]);
            Ok(())
        })?;
        image.set_layout(new);

        debug!("Transitioned image {:?} -> {:?}", old, new);
        Ok(())
    }

    /// Copies a device-local buffer back to host memory.
    ///
    /// # Errors
    ///
    /// Returns an error if the readback buffer cannot be created or the copy
    /// fails.
    pub fn read_back_buffer(&self, source: &Buffer) -> RhiResult<Vec<u8>> {
        let size = source.size();
        let readback = Buffer::new(self.device.clone(), BufferUsage::Readback, size)?;

        self.one_shot(|cmd| {
            let region = vk::BufferCopy::default().size(size);
            cmd.copy_buffer(source.handle(), readback.handle(), &[region]);
            Ok(())
        })?;

        readback.read_data()
    }
}

fn image_copy_region(format: vk::Format, extent: vk::Extent2D) -> vk::BufferImageCopy {
    vk::BufferImageCopy::default()
        .buffer_offset(0)
        .buffer_row_length(0)
        .buffer_image_height(0)
        .image_subresource(
            vk::ImageSubresourceLayers::default()
                .aspect_mask(image::aspect_mask(format))
                .mip_level(0)
                .base_array_layer(0)
                .layer_count(1),
        )
        .image_offset(vk::Offset3D { x: 0, y: 0, z: 0 })
        .image_extent(vk::Extent3D {
            width: extent.width,
            height: extent.height,
            depth: 1,
        })
}
