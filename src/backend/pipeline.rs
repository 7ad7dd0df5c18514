// Render pass, framebuffers and the fixed table of graphics pipelines
//
// Every (primitive kind, blend mode) pair gets its own precompiled pipeline.
// They share one layout: the texture descriptor set at set 0 and the 80-byte
// push-constant block.

use anyhow::{Context, Result};
use ash::vk;
use std::sync::Arc;
use super::image::DEPTH_FORMAT;
use super::shader::{ShaderCode, ShaderModule};
use super::VulkanDevice;
use crate::vertex::{vertex_input_description, PushConstants};

/// What a draw call renders, and in which space
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum PrimitiveKind {
    Textured3d,
    Flat3d,
    Line3d,
    Textured2d,
    Flat2d,
    Line2d,
}

impl PrimitiveKind {
    pub const COUNT: usize = 6;
    pub const ALL: [PrimitiveKind; Self::COUNT] = [
        PrimitiveKind::Textured3d,
        PrimitiveKind::Flat3d,
        PrimitiveKind::Line3d,
        PrimitiveKind::Textured2d,
        PrimitiveKind::Flat2d,
        PrimitiveKind::Line2d,
    ];

    /// Kind for a triangle draw
    pub fn triangles(textured: bool, is_3d: bool) -> Self {
        match (textured, is_3d) {
            (true, true) => PrimitiveKind::Textured3d,
            (false, true) => PrimitiveKind::Flat3d,
            (true, false) => PrimitiveKind::Textured2d,
            (false, false) => PrimitiveKind::Flat2d,
        }
    }

    /// Kind for a line draw
    pub fn lines(is_3d: bool) -> Self {
        if is_3d {
            PrimitiveKind::Line3d
        } else {
            PrimitiveKind::Line2d
        }
    }

    pub fn is_3d(self) -> bool {
        matches!(
            self,
            PrimitiveKind::Textured3d | PrimitiveKind::Flat3d | PrimitiveKind::Line3d
        )
    }

    pub fn is_line(self) -> bool {
        matches!(self, PrimitiveKind::Line3d | PrimitiveKind::Line2d)
    }

    fn index(self) -> usize {
        self as usize
    }
}

/// Framebuffer blending applied to every draw until changed
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub enum BlendMode {
    /// src_alpha, one_minus_src_alpha
    #[default]
    Normal,
    /// src_alpha, one
    AdditiveAlpha,
    /// one, one
    AdditiveColor,
}

impl BlendMode {
    pub const COUNT: usize = 3;
    pub const ALL: [BlendMode; Self::COUNT] =
        [BlendMode::Normal, BlendMode::AdditiveAlpha, BlendMode::AdditiveColor];

    /// Source and destination color factors
    pub fn factors(self) -> (vk::BlendFactor, vk::BlendFactor) {
        match self {
            BlendMode::Normal => (vk::BlendFactor::SRC_ALPHA, vk::BlendFactor::ONE_MINUS_SRC_ALPHA),
            BlendMode::AdditiveAlpha => (vk::BlendFactor::SRC_ALPHA, vk::BlendFactor::ONE),
            BlendMode::AdditiveColor => (vk::BlendFactor::ONE, vk::BlendFactor::ONE),
        }
    }

    fn index(self) -> usize {
        self as usize
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct PipelineKey {
    pub kind: PrimitiveKind,
    pub blend: BlendMode,
}

impl PipelineKey {
    pub fn new(kind: PrimitiveKind, blend: BlendMode) -> Self {
        Self { kind, blend }
    }

    /// All 18 keys, kind-major
    pub fn all() -> impl Iterator<Item = PipelineKey> {
        PrimitiveKind::ALL.into_iter().flat_map(|kind| {
            BlendMode::ALL.into_iter().map(move |blend| PipelineKey { kind, blend })
        })
    }
}

/// Pipeline handles indexed by `(kind, blend)`; null until filled
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PipelineTable {
    pipelines: [[vk::Pipeline; BlendMode::COUNT]; PrimitiveKind::COUNT],
}

impl PipelineTable {
    pub fn empty() -> Self {
        Self {
            pipelines: [[vk::Pipeline::null(); BlendMode::COUNT]; PrimitiveKind::COUNT],
        }
    }

    pub fn get(&self, key: PipelineKey) -> vk::Pipeline {
        self.pipelines[key.kind.index()][key.blend.index()]
    }

    pub fn set(&mut self, key: PipelineKey, pipeline: vk::Pipeline) {
        self.pipelines[key.kind.index()][key.blend.index()] = pipeline;
    }

    /// Key of the first empty slot, if any
    pub fn missing(&self) -> Option<PipelineKey> {
        PipelineKey::all().find(|&key| self.get(key) == vk::Pipeline::null())
    }

    pub fn iter(&self) -> impl Iterator<Item = vk::Pipeline> + '_ {
        self.pipelines.iter().flatten().copied()
    }
}

pub struct RenderPass {
    pub render_pass: vk::RenderPass,
    device: Arc<VulkanDevice>,
}

impl RenderPass {
    /// One color attachment (cleared, presented) and one depth attachment (cleared, discarded)
    pub fn new(device: Arc<VulkanDevice>, color_format: vk::Format) -> Result<Self> {
        // Color attachment (the swapchain image)
        let color_attachment = vk::AttachmentDescription::default()
            .format(color_format)
            .samples(vk::SampleCountFlags::TYPE_1)
            .load_op(vk::AttachmentLoadOp::CLEAR)
            .store_op(vk::AttachmentStoreOp::STORE)
            .stencil_load_op(vk::AttachmentLoadOp::DONT_CARE)
            .stencil_store_op(vk::AttachmentStoreOp::DONT_CARE)
            .initial_layout(vk::ImageLayout::UNDEFINED)
            .final_layout(vk::ImageLayout::PRESENT_SRC_KHR);

        // Depth attachment
        let depth_attachment = vk::AttachmentDescription::default()
            .format(DEPTH_FORMAT)
            .samples(vk::SampleCountFlags::TYPE_1)
            .load_op(vk::AttachmentLoadOp::CLEAR)
            .store_op(vk::AttachmentStoreOp::DONT_CARE) // Don't need to store depth
            .stencil_load_op(vk::AttachmentLoadOp::DONT_CARE)
            .stencil_store_op(vk::AttachmentStoreOp::DONT_CARE)
            .initial_layout(vk::ImageLayout::UNDEFINED)
            .final_layout(vk::ImageLayout::DEPTH_STENCIL_ATTACHMENT_OPTIMAL);

        let color_attachment_ref = vk::AttachmentReference::default()
            .attachment(0)
            .layout(vk::ImageLayout::COLOR_ATTACHMENT_OPTIMAL);

        let depth_attachment_ref = vk::AttachmentReference::default()
            .attachment(1)
            .layout(vk::ImageLayout::DEPTH_STENCIL_ATTACHMENT_OPTIMAL);

        let color_attachments = [color_attachment_ref];
        let subpass = vk::SubpassDescription::default()
            .pipeline_bind_point(vk::PipelineBindPoint::GRAPHICS)
            .color_attachments(&color_attachments)
            .depth_stencil_attachment(&depth_attachment_ref);

        // Hold color and depth writes until the acquired image is ready
        let dependency = vk::SubpassDependency::default()
            .src_subpass(vk::SUBPASS_EXTERNAL)
            .dst_subpass(0)
            .src_stage_mask(vk::PipelineStageFlags::COLOR_ATTACHMENT_OUTPUT | vk::PipelineStageFlags::EARLY_FRAGMENT_TESTS)
            .src_access_mask(vk::AccessFlags::empty())
            .dst_stage_mask(vk::PipelineStageFlags::COLOR_ATTACHMENT_OUTPUT | vk::PipelineStageFlags::EARLY_FRAGMENT_TESTS)
            .dst_access_mask(vk::AccessFlags::COLOR_ATTACHMENT_WRITE | vk::AccessFlags::DEPTH_STENCIL_ATTACHMENT_WRITE);

        let attachments = [color_attachment, depth_attachment];
        let subpasses = [subpass];
        let dependencies = [dependency];

        let render_pass_info = vk::RenderPassCreateInfo::default()
            .attachments(&attachments)
            .subpasses(&subpasses)
            .dependencies(&dependencies);

        let render_pass = unsafe {
            device.device.create_render_pass(&render_pass_info, None)
        }
        .context("Failed to create render pass")?;

        Ok(Self { render_pass, device })
    }
}

impl Drop for RenderPass {
    fn drop(&mut self) {
        unsafe {
            self.device.device.destroy_render_pass(self.render_pass, None);
        }
    }
}

/// One framebuffer per swapchain image, all sharing the depth view
pub struct Framebuffers {
    pub framebuffers: Vec<vk::Framebuffer>,
    device: Arc<VulkanDevice>,
}

impl Framebuffers {
    pub fn new(
        device: Arc<VulkanDevice>,
        render_pass: vk::RenderPass,
        image_views: &[vk::ImageView],
        depth_view: vk::ImageView,
        extent: vk::Extent2D,
    ) -> Result<Self> {
        let mut this = Self {
            framebuffers: Vec::with_capacity(image_views.len()),
            device,
        };

        for &image_view in image_views {
            let attachments = [image_view, depth_view];
            let framebuffer_info = vk::FramebufferCreateInfo::default()
                .render_pass(render_pass)
                .attachments(&attachments)
                .width(extent.width)
                .height(extent.height)
                .layers(1);

            let framebuffer = unsafe {
                this.device.device.create_framebuffer(&framebuffer_info, None)
            }
            .context("Failed to create framebuffer")?;
            this.framebuffers.push(framebuffer);
        }

        Ok(this)
    }

    pub fn get(&self, image_index: u32) -> Option<vk::Framebuffer> {
        self.framebuffers.get(image_index as usize).copied()
    }
}

impl Drop for Framebuffers {
    fn drop(&mut self) {
        unsafe {
            for &framebuffer in &self.framebuffers {
                self.device.device.destroy_framebuffer(framebuffer, None);
            }
        }
    }
}

/// The shared pipeline layout and all 18 pipelines
pub struct PipelineSet {
    pub layout: vk::PipelineLayout,
    pub table: PipelineTable,
    device: Arc<VulkanDevice>,
}

impl PipelineSet {
    /// Build every pipeline; fails if any of them cannot be created
    pub fn new(
        device: Arc<VulkanDevice>,
        render_pass: vk::RenderPass,
        set_layout: vk::DescriptorSetLayout,
        shaders: &ShaderCode,
    ) -> Result<Self> {
        let push_constant_ranges = [vk::PushConstantRange::default()
            .stage_flags(PushConstants::STAGES)
            .offset(0)
            .size(PushConstants::SIZE)];
        let set_layouts = [set_layout];

        let layout_info = vk::PipelineLayoutCreateInfo::default()
            .set_layouts(&set_layouts)
            .push_constant_ranges(&push_constant_ranges);

        let layout = unsafe {
            device.device.create_pipeline_layout(&layout_info, None)
        }
        .context("Failed to create pipeline layout")?;

        let mut this = Self {
            layout,
            table: PipelineTable::empty(),
            device,
        };

        let vert = ShaderModule::new(Arc::clone(&this.device), &shaders.vertex)?;
        let frag = ShaderModule::new(Arc::clone(&this.device), &shaders.fragment)?;

        for key in PipelineKey::all() {
            let pipeline = this.create_pipeline(key, render_pass, vert.module, frag.module)
                .with_context(|| format!("Failed to create pipeline {:?}/{:?}", key.kind, key.blend))?;
            this.table.set(key, pipeline);
        }

        if let Some(key) = this.table.missing() {
            anyhow::bail!("Pipeline table incomplete: {:?}/{:?}", key.kind, key.blend);
        }

        log::info!("Created {} graphics pipelines", PrimitiveKind::COUNT * BlendMode::COUNT);
        Ok(this)
    }

    pub fn get(&self, key: PipelineKey) -> vk::Pipeline {
        self.table.get(key)
    }

    fn create_pipeline(
        &self,
        key: PipelineKey,
        render_pass: vk::RenderPass,
        vert_shader: vk::ShaderModule,
        frag_shader: vk::ShaderModule,
    ) -> Result<vk::Pipeline> {
        let shader_stages = [
            vk::PipelineShaderStageCreateInfo::default()
                .stage(vk::ShaderStageFlags::VERTEX)
                .module(vert_shader)
                .name(c"main"),
            vk::PipelineShaderStageCreateInfo::default()
                .stage(vk::ShaderStageFlags::FRAGMENT)
                .module(frag_shader)
                .name(c"main"),
        ];

        let (bindings, attributes) = vertex_input_description();
        let vertex_input_info = vk::PipelineVertexInputStateCreateInfo::default()
            .vertex_binding_descriptions(&bindings)
            .vertex_attribute_descriptions(&attributes);

        let topology = if key.kind.is_line() {
            vk::PrimitiveTopology::LINE_LIST
        } else {
            vk::PrimitiveTopology::TRIANGLE_LIST
        };
        let input_assembly = vk::PipelineInputAssemblyStateCreateInfo::default()
            .topology(topology)
            .primitive_restart_enable(false);

        // Viewport and scissor are set per draw
        let viewport_state = vk::PipelineViewportStateCreateInfo::default()
            .viewport_count(1)
            .scissor_count(1);
        let dynamic_states = [vk::DynamicState::VIEWPORT, vk::DynamicState::SCISSOR];
        let dynamic_state = vk::PipelineDynamicStateCreateInfo::default()
            .dynamic_states(&dynamic_states);

        // Legacy geometry has no consistent winding
        let rasterizer = vk::PipelineRasterizationStateCreateInfo::default()
            .depth_clamp_enable(false)
            .rasterizer_discard_enable(false)
            .polygon_mode(vk::PolygonMode::FILL)
            .line_width(1.0)
            .cull_mode(vk::CullModeFlags::NONE)
            .front_face(vk::FrontFace::COUNTER_CLOCKWISE)
            .depth_bias_enable(false);

        let multisampling = vk::PipelineMultisampleStateCreateInfo::default()
            .sample_shading_enable(false)
            .rasterization_samples(vk::SampleCountFlags::TYPE_1);

        let (depth_test, depth_write) = depth_state(key.kind);
        let depth_stencil = vk::PipelineDepthStencilStateCreateInfo::default()
            .depth_test_enable(depth_test)
            .depth_write_enable(depth_write)
            .depth_compare_op(vk::CompareOp::LESS_OR_EQUAL)
            .depth_bounds_test_enable(false)
            .stencil_test_enable(false);

        let (src_factor, dst_factor) = key.blend.factors();
        let color_blend_attachments = [vk::PipelineColorBlendAttachmentState::default()
            .color_write_mask(vk::ColorComponentFlags::RGBA)
            .blend_enable(true)
            .src_color_blend_factor(src_factor)
            .dst_color_blend_factor(dst_factor)
            .color_blend_op(vk::BlendOp::ADD)
            .src_alpha_blend_factor(vk::BlendFactor::ONE)
            .dst_alpha_blend_factor(vk::BlendFactor::ONE_MINUS_SRC_ALPHA)
            .alpha_blend_op(vk::BlendOp::ADD)];
        let color_blending = vk::PipelineColorBlendStateCreateInfo::default()
            .logic_op_enable(false)
            .attachments(&color_blend_attachments);

        let pipeline_info = vk::GraphicsPipelineCreateInfo::default()
            .stages(&shader_stages)
            .vertex_input_state(&vertex_input_info)
            .input_assembly_state(&input_assembly)
            .viewport_state(&viewport_state)
            .rasterization_state(&rasterizer)
            .multisample_state(&multisampling)
            .depth_stencil_state(&depth_stencil)
            .color_blend_state(&color_blending)
            .dynamic_state(&dynamic_state)
            .layout(self.layout)
            .render_pass(render_pass)
            .subpass(0);

        let pipelines = unsafe {
            self.device.device.create_graphics_pipelines(
                vk::PipelineCache::null(),
                &[pipeline_info],
                None,
            )
        }
        .map_err(|(_, e)| e)?;

        pipelines.into_iter().next().context("Driver returned no pipeline")
    }
}

impl Drop for PipelineSet {
    fn drop(&mut self) {
        unsafe {
            for pipeline in self.table.iter() {
                if pipeline != vk::Pipeline::null() {
                    self.device.device.destroy_pipeline(pipeline, None);
                }
            }
            self.device.device.destroy_pipeline_layout(self.layout, None);
        }
    }
}

/// (depth test, depth write): 3D triangles test and write, 3D lines only test, 2D neither
pub fn depth_state(kind: PrimitiveKind) -> (bool, bool) {
    match (kind.is_3d(), kind.is_line()) {
        (true, false) => (true, true),
        (true, true) => (true, false),
        (false, _) => (false, false),
    }
}
