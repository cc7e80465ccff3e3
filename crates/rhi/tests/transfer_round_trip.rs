//! Upload and readback through the transfer engine on a headless device.

use std::sync::Arc;

use vkframe_rhi::buffer::BufferUsage;
use vkframe_rhi::device::Device;
use vkframe_rhi::image::Image;
use vkframe_rhi::instance::Instance;
use vkframe_rhi::physical_device::select_headless_device;
use vkframe_rhi::sampler::Sampler;
use vkframe_rhi::texture::Texture;
use vkframe_rhi::transfer::TransferEngine;
use vkframe_rhi::vertex::Vertex;
use vkframe_rhi::{RhiError, vk};

fn transfer_engine() -> Option<TransferEngine> {
    let instance = match Instance::new(c"transfer-test", false, None) {
        Ok(instance) => instance,
        Err(RhiError::LoadingError(_)) => {
            eprintln!("Skipping test: Vulkan not available");
            return None;
        }
        Err(e) => panic!("Unexpected error: {:?}", e),
    };
    let caps = match select_headless_device(&instance) {
        Ok(caps) => caps,
        Err(RhiError::NoVulkanSupport | RhiError::NoSuitableDevice) => {
            eprintln!("Skipping test: no usable GPU");
            return None;
        }
        Err(e) => panic!("Unexpected error: {:?}", e),
    };
    let device: Arc<Device> = Device::new(instance, &caps, &[]).unwrap();
    Some(TransferEngine::new(device).unwrap())
}

#[test]
fn test_vertex_buffer_round_trip() {
    let Some(transfer) = transfer_engine() else {
        return;
    };

    let vertices = [
        Vertex::new([-0.5, -0.5].into(), [1.0, 0.0, 0.0].into(), [1.0, 0.0].into()),
        Vertex::new([0.5, -0.5].into(), [0.0, 1.0, 0.0].into(), [0.0, 0.0].into()),
        Vertex::new([0.5, 0.5].into(), [0.0, 0.0, 1.0].into(), [0.0, 1.0].into()),
        Vertex::new([-0.5, 0.5].into(), [1.0, 1.0, 1.0].into(), [1.0, 1.0].into()),
    ];
    let bytes: &[u8] = bytemuck::cast_slice(&vertices);

    let buffer = transfer.upload_buffer(bytes, BufferUsage::Vertex).unwrap();
    assert_eq!(buffer.size(), bytes.len() as u64);

    let read_back = transfer.read_back_buffer(&buffer).unwrap();
    assert_eq!(read_back, bytes);
}

#[test]
fn test_index_buffer_round_trip() {
    let Some(transfer) = transfer_engine() else {
        return;
    };

    let indices: [u16; 6] = [0, 1, 2, 2, 3, 0];
    let buffer = transfer
        .upload_buffer(bytemuck::cast_slice(&indices), BufferUsage::Index)
        .unwrap();

    let read_back = transfer.read_back_buffer(&buffer).unwrap();
    let decoded: &[u16] = bytemuck::cast_slice(&read_back);
    assert_eq!(decoded, &indices);
}

#[test]
fn test_texture_upload_ends_shader_readable() {
    let Some(transfer) = transfer_engine() else {
        return;
    };

    let pixels: Vec<u8> = (0..8 * 8).flat_map(|i| [i as u8, 0, 255, 255]).collect();
    let image = transfer
        .upload_image(&pixels, 8, 8, vk::Format::R8G8B8A8_UNORM)
        .unwrap();
    assert_eq!(image.layout(), vk::ImageLayout::SHADER_READ_ONLY_OPTIMAL);

    let sampler = Sampler::linear(transfer.device().clone()).unwrap();
    let texture = Texture::new(image, sampler).unwrap();
    assert_eq!(
        texture.descriptor_info().image_layout,
        vk::ImageLayout::SHADER_READ_ONLY_OPTIMAL
    );
}

#[test]
fn test_depth_transition_and_rejection() {
    let Some(transfer) = transfer_engine() else {
        return;
    };
    let device = transfer.device().clone();

    let Some(format) = device.find_supported_format(
        &[vk::Format::D32_SFLOAT, vk::Format::D24_UNORM_S8_UINT],
        vk::ImageTiling::OPTIMAL,
        vk::FormatFeatureFlags::DEPTH_STENCIL_ATTACHMENT,
    ) else {
        eprintln!("Skipping test: no depth format");
        return;
    };

    let mut depth = Image::new(
        device,
        vk::Extent2D { width: 16, height: 16 },
        format,
        vk::ImageUsageFlags::DEPTH_STENCIL_ATTACHMENT,
    )
    .unwrap();

    transfer
        .transition_image_layout(&mut depth, vk::ImageLayout::DEPTH_STENCIL_ATTACHMENT_OPTIMAL)
        .unwrap();
    assert_eq!(
        depth.layout(),
        vk::ImageLayout::DEPTH_STENCIL_ATTACHMENT_OPTIMAL
    );

    let err = transfer
        .transition_image_layout(&mut depth, vk::ImageLayout::SHADER_READ_ONLY_OPTIMAL)
        .unwrap_err();
    assert!(matches!(err, RhiError::UnsupportedLayoutTransition { .. }));
    assert_eq!(
        depth.layout(),
        vk::ImageLayout::DEPTH_STENCIL_ATTACHMENT_OPTIMAL
    );
}
