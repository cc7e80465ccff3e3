//! Per-frame uniform data.
//!
//! [`UniformBufferObject`] matches the `UniformBufferObject` block at
//! binding 0 of `shaders/quad.vert` (std140, three column-major matrices).
//! [`UniformBuffers`] keeps one persistently mapped buffer per frame slot so a
//! slot's matrices are only rewritten after its fence has been waited on.

use std::sync::Arc;

use ash::vk;
use bytemuck::{Pod, Zeroable};
use glam::{Mat4, Vec3};

use vkframe_rhi::buffer::{Buffer, BufferUsage};
use vkframe_rhi::device::Device;
use vkframe_rhi::{RhiError, RhiResult};

/// Model, view and projection matrices.
///
/// # Memory Layout
///
/// - Offset 0: model (64 bytes)
/// - Offset 64: view (64 bytes)
/// - Offset 128: proj (64 bytes)
#[repr(C)]
#[derive(Clone, Copy, Debug, Default, PartialEq, Pod, Zeroable)]
pub struct UniformBufferObject {
    pub model: Mat4,
    pub view: Mat4,
    pub proj: Mat4,
}

impl UniformBufferObject {
    pub const SIZE: usize = std::mem::size_of::<Self>();

    /// Quad spinning 90 degrees per second about Z, seen from (2, 2, 2).
    pub fn spinning(elapsed_secs: f32, aspect_ratio: f32) -> Self {
        let model = Mat4::from_rotation_z(elapsed_secs * 90f32.to_radians());
        let view = Mat4::look_at_rh(Vec3::splat(2.0), Vec3::ZERO, Vec3::Z);
        let mut proj = Mat4::perspective_rh(45f32.to_radians(), aspect_ratio, 0.1, 10.0);
        // Vulkan clip space has Y pointing down.
        proj.y_axis.y *= -1.0;

        Self { model, view, proj }
    }
}

/// One host-visible uniform buffer per frame slot.
pub struct UniformBuffers {
    buffers: Vec<Buffer>,
}

impl UniformBuffers {
    /// Creates `count` zero-initialized buffers.
    ///
    /// # Errors
    ///
    /// Returns an error if buffer creation fails.
    pub fn new(device: Arc<Device>, count: usize) -> RhiResult<Self> {
        let zero = UniformBufferObject::default();
        let buffers = (0..count)
            .map(|_| {
                Buffer::new_with_data(device.clone(), BufferUsage::Uniform, bytemuck::bytes_of(&zero))
            })
            .collect::<RhiResult<Vec<_>>>()?;
        Ok(Self { buffers })
    }

    /// Overwrites slot `frame_index`'s buffer.
    ///
    /// # Errors
    ///
    /// Returns [`RhiError::InvalidResource`] if the index is out of range.
    pub fn write(&self, frame_index: usize, ubo: &UniformBufferObject) -> RhiResult<()> {
        self.buffer(frame_index)?.write_data(0, bytemuck::bytes_of(ubo))
    }

    /// Returns slot `frame_index`'s buffer.
    ///
    /// # Errors
    ///
    /// Returns [`RhiError::InvalidResource`] if the index is out of range.
    pub fn buffer(&self, frame_index: usize) -> RhiResult<&Buffer> {
        self.buffers.get(frame_index).ok_or_else(|| {
            RhiError::InvalidResource(format!("no uniform buffer for frame {}", frame_index))
        })
    }

    /// Size of each buffer in bytes.
    pub fn range(&self) -> vk::DeviceSize {
        UniformBufferObject::SIZE as vk::DeviceSize
    }

    pub fn len(&self) -> usize {
        self.buffers.len()
    }

    pub fn is_empty(&self) -> bool {
        self.buffers.is_empty()
    }
}
