//! The textured, spinning quad drawn by the demo.

use std::sync::Arc;

use ash::vk;
use glam::{Vec2, Vec3};
use tracing::info;

use vkframe_core::Timer;
use vkframe_renderer::{FrameContext, FrameRecorder, MAX_FRAMES_IN_FLIGHT, UniformBufferObject, UniformBuffers};
use vkframe_rhi::RhiResult;
use vkframe_rhi::buffer::{Buffer, BufferUsage};
use vkframe_rhi::descriptor::{
    DescriptorPool, DescriptorSetLayout, combined_image_sampler_binding, uniform_buffer_binding,
    write_combined_image_sampler, write_uniform_buffer,
};
use vkframe_rhi::device::Device;
use vkframe_rhi::sampler::Sampler;
use vkframe_rhi::texture::Texture;
use vkframe_rhi::transfer::TransferEngine;
use vkframe_rhi::vertex::Vertex;

pub const VERTICES: [Vertex; 4] = [
    Vertex::new(Vec2::new(-0.5, -0.5), Vec3::new(1.0, 0.0, 0.0), Vec2::new(1.0, 0.0)),
    Vertex::new(Vec2::new(0.5, -0.5), Vec3::new(0.0, 1.0, 0.0), Vec2::new(0.0, 0.0)),
    Vertex::new(Vec2::new(0.5, 0.5), Vec3::new(0.0, 0.0, 1.0), Vec2::new(0.0, 1.0)),
    Vertex::new(Vec2::new(-0.5, 0.5), Vec3::new(1.0, 1.0, 1.0), Vec2::new(1.0, 1.0)),
];

pub const INDICES: [u16; 6] = [0, 1, 2, 2, 3, 0];

/// Width over height of `extent`, or 1.0 when it has no area.
pub fn aspect_ratio(extent: vk::Extent2D) -> f32 {
    if extent.width == 0 || extent.height == 0 {
        return 1.0;
    }
    extent.width as f32 / extent.height as f32
}

const TEXTURE_SIZE: u32 = 64;
const CHECKER_CELL: u32 = 8;

/// RGBA8 checkerboard of `size`x`size` pixels with `cell`-pixel squares.
pub fn checkerboard(size: u32, cell: u32) -> Vec<u8> {
    let cell = cell.max(1);
    let mut pixels = Vec::with_capacity((size * size * 4) as usize);
    for y in 0..size {
        for x in 0..size {
            let light = ((x / cell) + (y / cell)) % 2 == 0;
            let value = if light { 0xE0 } else { 0x30 };
            pixels.extend_from_slice(&[value, value, value, 0xFF]);
        }
    }
    pixels
}

/// Descriptor layout shared by the pipeline: matrices at binding 0 for the
/// vertex stage, the texture at binding 1 for the fragment stage.
pub fn descriptor_bindings() -> [vk::DescriptorSetLayoutBinding<'static>; 2] {
    [
        uniform_buffer_binding(0, vk::ShaderStageFlags::VERTEX),
        combined_image_sampler_binding(1, vk::ShaderStageFlags::FRAGMENT),
    ]
}

/// GPU resources of the quad plus the per-frame descriptor sets.
pub struct Quad {
    vertex_buffer: Buffer,
    index_buffer: Buffer,
    _texture: Texture,
    uniforms: UniformBuffers,
    descriptor_sets: Vec<vk::DescriptorSet>,
    _descriptor_pool: DescriptorPool,
    descriptor_layout: DescriptorSetLayout,
    timer: Timer,
    aspect_ratio: f32,
}

impl Quad {
    /// Uploads the geometry and texture and writes one descriptor set per
    /// frame slot.
    pub fn new(device: Arc<Device>, transfer: &TransferEngine) -> RhiResult<Self> {
        let bindings = descriptor_bindings();
        let descriptor_layout = DescriptorSetLayout::new(device.clone(), &bindings)?;
        let descriptor_pool =
            DescriptorPool::for_bindings(device.clone(), &bindings, MAX_FRAMES_IN_FLIGHT as u32)?;
        let descriptor_sets = descriptor_pool.allocate(&descriptor_layout, MAX_FRAMES_IN_FLIGHT)?;

        let vertex_buffer =
            transfer.upload_buffer(bytemuck::cast_slice(&VERTICES), BufferUsage::Vertex)?;
        let index_buffer =
            transfer.upload_buffer(bytemuck::cast_slice(&INDICES), BufferUsage::Index)?;

        let pixels = checkerboard(TEXTURE_SIZE, CHECKER_CELL);
        let image = transfer.upload_image(
            &pixels,
            TEXTURE_SIZE,
            TEXTURE_SIZE,
            vk::Format::R8G8B8A8_SRGB,
        )?;
        let texture = Texture::new(image, Sampler::linear(device.clone())?)?;

        let uniforms = UniformBuffers::new(device.clone(), MAX_FRAMES_IN_FLIGHT)?;
        for (frame_index, &set) in descriptor_sets.iter().enumerate() {
            write_uniform_buffer(
                &device,
                set,
                0,
                uniforms.buffer(frame_index)?.handle(),
                uniforms.range(),
            );
            write_combined_image_sampler(&device, set, 1, texture.descriptor_info());
        }

        info!(
            "Quad ready: {} vertices, {} indices, {}x{} texture",
            VERTICES.len(),
            INDICES.len(),
            TEXTURE_SIZE,
            TEXTURE_SIZE
        );

        Ok(Self {
            vertex_buffer,
            index_buffer,
            _texture: texture,
            uniforms,
            descriptor_sets,
            _descriptor_pool: descriptor_pool,
            descriptor_layout,
            timer: Timer::new(),
            aspect_ratio: 1.0,
        })
    }

    /// Layout the pipeline must be created with.
    pub fn descriptor_layout(&self) -> vk::DescriptorSetLayout {
        self.descriptor_layout.handle()
    }

    /// Updates the projection for the extent the swapchain was built with.
    pub fn set_extent(&mut self, extent: vk::Extent2D) {
        self.aspect_ratio = aspect_ratio(extent);
    }

    pub fn timer(&self) -> &Timer {
        &self.timer
    }
}

impl FrameRecorder for Quad {
    fn record(&mut self, frame: &FrameContext<'_>) -> RhiResult<()> {
        let ubo = UniformBufferObject::spinning(self.timer.elapsed_secs(), self.aspect_ratio);
        self.uniforms.write(frame.frame_index, &ubo)?;

        let set = self.descriptor_sets.get(frame.frame_index).copied().ok_or_else(|| {
            vkframe_rhi::RhiError::InvalidResource(format!(
                "no descriptor set for frame {}",
                frame.frame_index
            ))
        })?;

        let cmd = frame.command_buffer;
        cmd.bind_vertex_buffers(0, &[self.vertex_buffer.handle()], &[0]);
        cmd.bind_index_buffer(self.index_buffer.handle(), 0, vk::IndexType::UINT16);
        cmd.bind_descriptor_sets(frame.pipeline_layout, 0, &[set]);
        cmd.draw_indexed(INDICES.len() as u32, 1, 0, 0, 0);

        self.timer.tick();
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_checkerboard_size_and_pattern() {
        let pixels = checkerboard(16, 4);
        assert_eq!(pixels.len(), 16 * 16 * 4);

        let at = |x: usize, y: usize| pixels[(y * 16 + x) * 4];
        assert_eq!(at(0, 0), 0xE0);
        assert_eq!(at(4, 0), 0x30);
        assert_eq!(at(4, 4), 0xE0);
        assert!(pixels.chunks(4).all(|p| p[3] == 0xFF));
    }

    #[test]
    fn test_quad_indices_in_range() {
        assert!(INDICES.iter().all(|&i| (i as usize) < VERTICES.len()));
        assert_eq!(std::mem::size_of_val(&VERTICES), 4 * 28);
    }

    #[test]
    fn test_aspect_ratio_from_extent() {
        assert_eq!(aspect_ratio(vk::Extent2D { width: 800, height: 400 }), 2.0);
        assert_eq!(aspect_ratio(vk::Extent2D { width: 1024, height: 0 }), 1.0);
        assert_eq!(aspect_ratio(vk::Extent2D { width: 0, height: 0 }), 1.0);
    }

    #[test]
    fn test_descriptor_bindings() {
        let bindings = descriptor_bindings();
        assert_eq!(bindings[0].descriptor_type, vk::DescriptorType::UNIFORM_BUFFER);
        assert_eq!(bindings[0].stage_flags, vk::ShaderStageFlags::VERTEX);
        assert_eq!(bindings[1].binding, 1);
        assert_eq!(
            bindings[1].descriptor_type,
            vk::DescriptorType::COMBINED_IMAGE_SAMPLER
        );
    }
}
