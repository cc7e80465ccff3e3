//! Graphics pipeline management.
//!
//! - [`PipelineLayout`] is built once from the descriptor set layouts and push
//!   constant ranges of a [`PipelineDesc`]
//! - [`Pipeline`] is baked against a render pass and a swapchain extent
//!   (static viewport and scissor), so it is rebuilt from the same
//!   [`PipelineDesc`] whenever the swapchain is recreated
//!
//! # Example
//!
//! ```no_run
//! use std::sync::Arc;
//! use vkframe_rhi::device::Device;
//! use vkframe_rhi::pipeline::{Pipeline, PipelineDesc, PipelineLayout};
//! use vkframe_rhi::render_pass::RenderPass;
//! use vkframe_rhi::vertex::Vertex;
//! use vkframe_rhi::vk;
//!
//! # fn example(device: Arc<Device>, render_pass: &RenderPass, vert: Vec<u8>, frag: Vec<u8>) -> Result<(), vkframe_rhi::RhiError> {
//! let desc = PipelineDesc::new(vert, frag)
//!     .vertex_input(
//!         vec![Vertex::binding_description()],
//!         Vertex::attribute_descriptions().to_vec(),
//!     );
//! let layout = PipelineLayout::new(device.clone(), &desc.set_layouts, &desc.push_constant_ranges)?;
//! let pipeline = Pipeline::new(
//!     device,
//!     &desc,
//!     &layout,
//!     render_pass,
//!     vk::Extent2D { width: 800, height: 600 },
//! )?;
//! # Ok(())
//! # }
//! ```

use std::sync::Arc;

use ash::vk;
use tracing::{debug, info};

use crate::device::Device;
use crate::error::{RhiError, RhiResult};
use crate::render_pass::RenderPass;
use crate::shader::{Shader, ShaderStage};

/// Vulkan pipeline layout wrapper.
pub struct PipelineLayout {
    device: Arc<Device>,
    layout: vk::PipelineLayout,
}

impl PipelineLayout {
    /// Creates a pipeline layout.
    ///
    /// # Errors
    ///
    /// Returns an error if pipeline layout creation fails.
    pub fn new(
        device: Arc<Device>,
        descriptor_set_layouts: &[vk::DescriptorSetLayout],
        push_constant_ranges: &[vk::PushConstantRange],
    ) -> RhiResult<Self> {
        let create_info = vk::PipelineLayoutCreateInfo::default()
            .set_layouts(descriptor_set_layouts)
            .push_constant_ranges(push_constant_ranges);

        let layout = unsafe { device.handle().create_pipeline_layout(&create_info, None)? };

        debug!(
            "Created pipeline layout with {} descriptor set layout(s) and {} push constant range(s)",
            descriptor_set_layouts.len(),
            push_constant_ranges.len()
        );

        Ok(Self { device, layout })
    }

    /// Returns the Vulkan pipeline layout handle.
    #[inline]
    pub fn handle(&self) -> vk::PipelineLayout {
        self.layout
    }
}

impl Drop for PipelineLayout {
    fn drop(&mut self) {
        unsafe {
            self.device
                .handle()
                .destroy_pipeline_layout(self.layout, None);
        }
    }
}

/// Primitive topology for input assembly.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub enum PrimitiveTopology {
    PointList,
    LineList,
    #[default]
    TriangleList,
    TriangleStrip,
}

impl PrimitiveTopology {
    pub fn to_vk(self) -> vk::PrimitiveTopology {
        match self {
            PrimitiveTopology::PointList => vk::PrimitiveTopology::POINT_LIST,
            PrimitiveTopology::LineList => vk::PrimitiveTopology::LINE_LIST,
            PrimitiveTopology::TriangleList => vk::PrimitiveTopology::TRIANGLE_LIST,
            PrimitiveTopology::TriangleStrip => vk::PrimitiveTopology::TRIANGLE_STRIP,
        }
    }
}

/// Polygon rasterization mode.
///
/// `Line` and `Point` need the `fillModeNonSolid` device feature, which the
/// device does not enable.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub enum PolygonMode {
    #[default]
    Fill,
    Line,
    Point,
}

impl PolygonMode {
    pub fn to_vk(self) -> vk::PolygonMode {
        match self {
            PolygonMode::Fill => vk::PolygonMode::FILL,
            PolygonMode::Line => vk::PolygonMode::LINE,
            PolygonMode::Point => vk::PolygonMode::POINT,
        }
    }
}

/// Face culling mode.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub enum CullMode {
    None,
    Front,
    #[default]
    Back,
}

impl CullMode {
    pub fn to_vk(self) -> vk::CullModeFlags {
        match self {
            CullMode::None => vk::CullModeFlags::NONE,
            CullMode::Front => vk::CullModeFlags::FRONT,
            CullMode::Back => vk::CullModeFlags::BACK,
        }
    }
}

/// Front face winding order.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub enum FrontFace {
    #[default]
    CounterClockwise,
    Clockwise,
}

impl FrontFace {
    pub fn to_vk(self) -> vk::FrontFace {
        match self {
            FrontFace::CounterClockwise => vk::FrontFace::COUNTER_CLOCKWISE,
            FrontFace::Clockwise => vk::FrontFace::CLOCKWISE,
        }
    }
}

/// Everything needed to (re)build a graphics pipeline apart from the render
/// pass and extent.
///
/// Owns the SPIR-V so the pipeline can be rebuilt after every swapchain
/// recreation without going back to disk.
#[derive(Clone, Debug)]
pub struct PipelineDesc {
    pub vertex_spirv: Vec<u8>,
    pub vertex_entry: String,
    pub fragment_spirv: Vec<u8>,
    pub fragment_entry: String,
    pub vertex_bindings: Vec<vk::VertexInputBindingDescription>,
    pub vertex_attributes: Vec<vk::VertexInputAttributeDescription>,
    pub topology: PrimitiveTopology,
    pub polygon_mode: PolygonMode,
    pub cull_mode: CullMode,
    pub front_face: FrontFace,
    pub depth_test: bool,
    pub set_layouts: Vec<vk::DescriptorSetLayout>,
    pub push_constant_ranges: Vec<vk::PushConstantRange>,
}

impl PipelineDesc {
    /// Triangle list, back-face culling, counter-clockwise front faces, depth
    /// test on, `main` entry points, no vertex input and no descriptors.
    pub fn new(vertex_spirv: Vec<u8>, fragment_spirv: Vec<u8>) -> Self {
        Self {
            vertex_spirv,
            vertex_entry: "main".to_string(),
            fragment_spirv,
            fragment_entry: "main".to_string(),
            vertex_bindings: Vec::new(),
            vertex_attributes: Vec::new(),
            topology: PrimitiveTopology::default(),
            polygon_mode: PolygonMode::default(),
            cull_mode: CullMode::default(),
            front_face: FrontFace::default(),
            depth_test: true,
            set_layouts: Vec::new(),
            push_constant_ranges: Vec::new(),
        }
    }

    pub fn vertex_input(
        mut self,
        bindings: Vec<vk::VertexInputBindingDescription>,
        attributes: Vec<vk::VertexInputAttributeDescription>,
    ) -> Self {
        self.vertex_bindings = bindings;
        self.vertex_attributes = attributes;
        self
    }

    pub fn set_layouts(mut self, layouts: Vec<vk::DescriptorSetLayout>) -> Self {
        self.set_layouts = layouts;
        self
    }

    pub fn push_constant_ranges(mut self, ranges: Vec<vk::PushConstantRange>) -> Self {
        self.push_constant_ranges = ranges;
        self
    }

    pub fn topology(mut self, topology: PrimitiveTopology) -> Self {
        self.topology = topology;
        self
    }

    pub fn polygon_mode(mut self, mode: PolygonMode) -> Self {
        self.polygon_mode = mode;
        self
    }

    pub fn cull_mode(mut self, mode: CullMode) -> Self {
        self.cull_mode = mode;
        self
    }

    pub fn front_face(mut self, face: FrontFace) -> Self {
        self.front_face = face;
        self
    }

    pub fn depth_test(mut self, enable: bool) -> Self {
        self.depth_test = enable;
        self
    }

    /// Checks the parts of the description that do not need a device.
    ///
    /// # Errors
    ///
    /// Returns [`RhiError::PipelineError`] if a shader is missing or an
    /// attribute refers to a binding that is not declared.
    pub fn validate(&self) -> RhiResult<()> {
        if self.vertex_spirv.is_empty() {
            return Err(RhiError::PipelineError("vertex shader is required".to_string()));
        }
        if self.fragment_spirv.is_empty() {
            return Err(RhiError::PipelineError("fragment shader is required".to_string()));
        }
        if let Some(attr) = self
            .vertex_attributes
            .iter()
            .find(|attr| !self.vertex_bindings.iter().any(|b| b.binding == attr.binding))
        {
            return Err(RhiError::PipelineError(format!(
                "attribute at location {} uses undeclared binding {}",
                attr.location, attr.binding
            )));
        }
        Ok(())
    }
}

/// Static viewport covering `extent` with the full depth range.
pub fn full_viewport(extent: vk::Extent2D) -> vk::Viewport {
    vk::Viewport {
        x: 0.0,
        y: 0.0,
        width: extent.width as f32,
        height: extent.height as f32,
        min_depth: 0.0,
        max_depth: 1.0,
    }
}

/// Scissor covering `extent`.
pub fn full_scissor(extent: vk::Extent2D) -> vk::Rect2D {
    vk::Rect2D {
        offset: vk::Offset2D { x: 0, y: 0 },
        extent,
    }
}

/// Vulkan graphics pipeline wrapper.
pub struct Pipeline {
    device: Arc<Device>,
    pipeline: vk::Pipeline,
    extent: vk::Extent2D,
}

impl Pipeline {
    /// Builds a graphics pipeline for subpass 0 of `render_pass`, with the
    /// viewport and scissor fixed to `extent`.
    ///
    /// Shader modules are created from the description's SPIR-V and destroyed
    /// again once the pipeline exists.
    ///
    /// # Errors
    ///
    /// Returns [`RhiError::PipelineError`] for an invalid description,
    /// [`RhiError::ShaderError`] for bad SPIR-V, or the Vulkan error.
    pub fn new(
        device: Arc<Device>,
        desc: &PipelineDesc,
        layout: &PipelineLayout,
        render_pass: &RenderPass,
        extent: vk::Extent2D,
    ) -> RhiResult<Self> {
        desc.validate()?;

        let vertex_shader = Shader::from_spirv_bytes(
            device.clone(),
            &desc.vertex_spirv,
            ShaderStage::Vertex,
            &desc.vertex_entry,
        )?;
        let fragment_shader = Shader::from_spirv_bytes(
            device.clone(),
            &desc.fragment_spirv,
            ShaderStage::Fragment,
            &desc.fragment_entry,
        )?;

        let shader_stages = [
            vertex_shader.stage_create_info(),
            fragment_shader.stage_create_info(),
        ];

        let vertex_input_state = vk::PipelineVertexInputStateCreateInfo::default()
            .vertex_binding_descriptions(&desc.vertex_bindings)
            .vertex_attribute_descriptions(&desc.vertex_attributes);

        let input_assembly_state = vk::PipelineInputAssemblyStateCreateInfo::default()
            .topology(desc.topology.to_vk())
            .primitive_restart_enable(false);

        let viewports = [full_viewport(extent)];
        let scissors = [full_scissor(extent)];
        let viewport_state = vk::PipelineViewportStateCreateInfo::default()
            .viewports(&viewports)
            .scissors(&scissors);

        let rasterization_state = vk::PipelineRasterizationStateCreateInfo::default()
            .depth_clamp_enable(false)
            .rasterizer_discard_enable(false)
            .polygon_mode(desc.polygon_mode.to_vk())
            .line_width(1.0)
            .cull_mode(desc.cull_mode.to_vk())
            .front_face(desc.front_face.to_vk())
            .depth_bias_enable(false);

        let multisample_state = vk::PipelineMultisampleStateCreateInfo::default()
            .sample_shading_enable(false)
            .rasterization_samples(vk::SampleCountFlags::TYPE_1);

        let depth_stencil_state = vk::PipelineDepthStencilStateCreateInfo::default()
            .depth_test_enable(desc.depth_test)
            .depth_write_enable(desc.depth_test)
            .depth_compare_op(vk::CompareOp::LESS)
            .depth_bounds_test_enable(false)
            .stencil_test_enable(false);

        let color_blend_attachments = [vk::PipelineColorBlendAttachmentState::default()
            .color_write_mask(vk::ColorComponentFlags::RGBA)
            .blend_enable(false)];
        let color_blend_state = vk::PipelineColorBlendStateCreateInfo::default()
            .logic_op_enable(false)
            .attachments(&color_blend_attachments);

        let pipeline_info = vk::GraphicsPipelineCreateInfo::default()
            .stages(&shader_stages)
            .vertex_input_state(&vertex_input_state)
            .input_assembly_state(&input_assembly_state)
            .viewport_state(&viewport_state)
            .rasterization_state(&rasterization_state)
            .multisample_state(&multisample_state)
            .depth_stencil_state(&depth_stencil_state)
            .color_blend_state(&color_blend_state)
            .layout(layout.handle())
            .render_pass(render_pass.handle())
            .subpass(0);

        let pipelines = unsafe {
            device
                .handle()
                .create_graphics_pipelines(vk::PipelineCache::null(), &[pipeline_info], None)
                .map_err(|(_, result)| result)?
        };
        let pipeline = pipelines
            .into_iter()
            .next()
            .ok_or_else(|| RhiError::PipelineError("driver returned no pipeline".to_string()))?;

        info!(
            "Graphics pipeline created for {}x{}",
            extent.width, extent.height
        );

        Ok(Self {
            device,
            pipeline,
            extent,
        })
    }

    /// Returns the Vulkan pipeline handle.
    #[inline]
    pub fn handle(&self) -> vk::Pipeline {
        self.pipeline
    }

    /// Extent the viewport and scissor were baked for.
    #[inline]
    pub fn extent(&self) -> vk::Extent2D {
        self.extent
    }
}

impl Drop for Pipeline {
    fn drop(&mut self) {
        unsafe {
            self.device.handle().destroy_pipeline(self.pipeline, None);
        }
        debug!("Graphics pipeline destroyed");
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn desc() -> PipelineDesc {
        PipelineDesc::new(vec![0; 20], vec![0; 20])
    }

    #[test]
    fn test_enums_to_vk() {
        assert_eq!(
            PrimitiveTopology::TriangleList.to_vk(),
            vk::PrimitiveTopology::TRIANGLE_LIST
        );
        assert_eq!(PolygonMode::Line.to_vk(), vk::PolygonMode::LINE);
        assert_eq!(CullMode::None.to_vk(), vk::CullModeFlags::NONE);
        assert_eq!(FrontFace::Clockwise.to_vk(), vk::FrontFace::CLOCKWISE);
    }

    #[test]
    fn test_desc_defaults() {
        let desc = desc();
        assert_eq!(desc.topology, PrimitiveTopology::TriangleList);
        assert_eq!(desc.cull_mode, CullMode::Back);
        assert_eq!(desc.front_face, FrontFace::CounterClockwise);
        assert!(desc.depth_test);
        assert_eq!(desc.vertex_entry, "main");
        assert!(desc.validate().is_ok());
    }

    #[test]
    fn test_desc_builder() {
        let desc = desc()
            .cull_mode(CullMode::None)
            .front_face(FrontFace::Clockwise)
            .depth_test(false)
            .topology(PrimitiveTopology::TriangleStrip);
        assert_eq!(desc.cull_mode, CullMode::None);
        assert_eq!(desc.front_face, FrontFace::Clockwise);
        assert!(!desc.depth_test);
        assert_eq!(desc.topology, PrimitiveTopology::TriangleStrip);
    }

    #[test]
    fn test_desc_requires_shaders() {
        let err = PipelineDesc::new(Vec::new(), vec![0; 4]).validate().unwrap_err();
        assert!(matches!(err, RhiError::PipelineError(_)));
    }

    #[test]
    fn test_desc_rejects_undeclared_binding() {
        let attr = vk::VertexInputAttributeDescription {
            location: 0,
            binding: 1,
            format: vk::Format::R32G32_SFLOAT,
            offset: 0,
        };
        let err = desc().vertex_input(Vec::new(), vec![attr]).validate().unwrap_err();
        assert!(matches!(err, RhiError::PipelineError(_)));
    }

    #[test]
    fn test_viewport_matches_extent() {
        let extent = vk::Extent2D { width: 1280, height: 720 };
        let viewport = full_viewport(extent);
        assert_eq!(viewport.width, 1280.0);
        assert_eq!(viewport.height, 720.0);
        assert_eq!(viewport.max_depth, 1.0);

        let scissor = full_scissor(extent);
        assert_eq!(scissor.extent.width, 1280);
        assert_eq!(scissor.offset.x, 0);
    }
}
