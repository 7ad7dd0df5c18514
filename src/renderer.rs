// =============================================================================
// RENDERER - The GPU context behind the legacy drawing API
// =============================================================================
//
// FRAME FLOW:
// ┌──────────────────────────────────────────────────────────────────────────┐
// │  begin_frame ─> draw_* (any number) ─> end_frame ─> present              │
// │                                                                          │
// │  wait fence     copy into ring,       close cmd     submit, then         │
// │  acquire image  record draw           buffer        queue present        │
// │  open pass                                                               │
// └──────────────────────────────────────────────────────────────────────────┘
//
// Per-frame calls never return errors. Vulkan failures inside them are logged
// and become a dropped frame or a dropped draw.
//
// =============================================================================

use anyhow::{Context, Result};
use ash::vk;
use glam::Mat4;
use raw_window_handle::{HasDisplayHandle, HasWindowHandle};
use std::sync::Arc;

use crate::backend::command::{CommandPool, VkRecorder};
use crate::backend::descriptor::DescriptorAllocator;
use crate::backend::image::GpuImage;
use crate::backend::pipeline::{
    BlendMode, Framebuffers, PipelineKey, PipelineSet, PrimitiveKind, RenderPass,
};
use crate::backend::shader::ShaderCode;
use crate::backend::swapchain::Acquired;
use crate::backend::{Swapchain, VulkanDevice};
use crate::canvas::Canvas;
use crate::config::RendererConfig;
use crate::draw::{self, fan_to_list, DrawState, RingWriter};
use crate::frame::{
    FramePhase, FrameRecord, FrameSlots, ResizeAction, ResizeState, FRAMES_IN_FLIGHT,
};
use crate::texture::{TextureId, TextureInfo, TextureManager};
use crate::transform::TransformState;
use crate::vertex::{PushConstants, Vertex};

const CLEAR_COLOR: [f32; 4] = [0.0, 0.0, 0.0, 1.0];
const CLEAR_DEPTH: f32 = 1.0;

/// Owns every GPU object of the renderer.
///
/// IMPORTANT: Field order matters for Drop! Fields are dropped top to bottom,
/// which is the reverse of creation order. `device` goes last.
pub struct Renderer {
    // ─────────────────────────────────────────────────────────────────────────
    // PER-FRAME RESOURCES & TEXTURES
    // ─────────────────────────────────────────────────────────────────────────
    frames: Vec<FrameRecord>,
    textures: TextureManager,

    // ─────────────────────────────────────────────────────────────────────────
    // PIPELINES & DESCRIPTORS
    // ─────────────────────────────────────────────────────────────────────────
    pipelines: PipelineSet,
    descriptors: Arc<DescriptorAllocator>,

    // ─────────────────────────────────────────────────────────────────────────
    // SWAPCHAIN-SIZED RESOURCES (rebuilt by recreate_swapchain)
    // ─────────────────────────────────────────────────────────────────────────
    /// `None` only while a recreation failed halfway
    framebuffers: Option<Framebuffers>,
    render_pass: RenderPass,
    depth: GpuImage,
    swapchain: Swapchain,

    // ─────────────────────────────────────────────────────────────────────────
    // VULKAN CORE
    // ─────────────────────────────────────────────────────────────────────────
    command_pool: CommandPool,
    device: Arc<VulkanDevice>,

    // ─────────────────────────────────────────────────────────────────────────
    // CPU-SIDE STATE
    // ─────────────────────────────────────────────────────────────────────────
    slots: FrameSlots,
    image_index: u32,
    blend: BlendMode,
    transform: TransformState,
    alpha_ref: f32,
    present_mode: vk::PresentModeKHR,
    /// Size asked for by the host window and whether the swapchain lags it
    resize: ResizeState,
    /// Reused for fan expansion
    fan_scratch: Vec<Vertex>,
}

impl Renderer {
    // =========================================================================
    // LIFECYCLE
    // =========================================================================

    /// Initialize every Vulkan object in dependency order:
    /// 1. Instance, surface, device, queue and allocator
    /// 2. Swapchain, depth buffer, render pass, framebuffers
    /// 3. Command pool, descriptor pool/layout, pipelines, white texture
    /// 4. Per-frame command buffers, sync objects and vertex rings
    ///
    /// If any step fails, everything created before it is released on return.
    pub fn new<W>(window: &W, width: u32, height: u32, config: &RendererConfig) -> Result<Self>
    where
        W: HasWindowHandle + HasDisplayHandle,
    {
        log::info!("Initializing renderer ({}x{})...", width, height);

        let display = window
            .display_handle()
            .context("Failed to get display handle")?
            .as_raw();
        let window_handle = window
            .window_handle()
            .context("Failed to get window handle")?
            .as_raw();

        // ─────────────────────────────────────────────────────────────────────
        // STEP 1: Device (instance + surface + queue + allocator)
        // ─────────────────────────────────────────────────────────────────────
        let device = VulkanDevice::new(
            &config.app_name,
            config.validation_enabled(),
            display,
            window_handle,
        )?;

        // ─────────────────────────────────────────────────────────────────────
        // STEP 2: Presentation targets
        // ─────────────────────────────────────────────────────────────────────
        let present_mode = config.present_mode();
        let swapchain = Swapchain::new(
            Arc::clone(&device),
            width.max(1),
            height.max(1),
            present_mode,
            None,
        )?;
        let depth = GpuImage::depth(Arc::clone(&device), swapchain.extent)
            .context("Failed to create depth buffer")?;
        let render_pass = RenderPass::new(Arc::clone(&device), swapchain.format)?;
        let framebuffers = Framebuffers::new(
            Arc::clone(&device),
            render_pass.render_pass,
            &swapchain.image_views,
            depth.view,
            swapchain.extent,
        )?;

        // ─────────────────────────────────────────────────────────────────────
        // STEP 3: Commands, descriptors, pipelines
        // ─────────────────────────────────────────────────────────────────────
        let command_pool = CommandPool::new(Arc::clone(&device))?;
        let descriptors = Arc::new(DescriptorAllocator::new(
            Arc::clone(&device),
            config.max_textures(),
        )?);

        let shaders = ShaderCode::load(config.shader_dir.as_deref())?;
        let pipelines = PipelineSet::new(
            Arc::clone(&device),
            render_pass.render_pass,
            descriptors.layout,
            &shaders,
        )?;

        let textures = TextureManager::new(
            Arc::clone(&device),
            Arc::clone(&descriptors),
            &command_pool,
        )?;

        // ─────────────────────────────────────────────────────────────────────
        // STEP 4: Per-frame resources
        // ─────────────────────────────────────────────────────────────────────
        let ring_size = config.vertex_ring_size();
        let frames = (0..FRAMES_IN_FLIGHT)
            .map(|_| FrameRecord::new(Arc::clone(&device), &command_pool, ring_size))
            .collect::<Result<Vec<_>>>()
            .context("Failed to create per-frame resources")?;

        log::info!(
            "Renderer ready: {} swapchain images, {} frames in flight, {} KiB vertex ring per frame",
            swapchain.image_count(),
            FRAMES_IN_FLIGHT,
            ring_size / 1024
        );

        Ok(Self {
            frames,
            textures,
            pipelines,
            descriptors,
            framebuffers: Some(framebuffers),
            render_pass,
            depth,
            swapchain,
            command_pool,
            device,
            slots: FrameSlots::new(),
            image_index: 0,
            blend: BlendMode::default(),
            transform: TransformState::new(config.projection_3d()),
            alpha_ref: config.alpha_ref,
            present_mode,
            resize: ResizeState::new(width, height),
            fan_scratch: Vec::new(),
        })
    }

    /// Idle the device and release everything. Equivalent to dropping.
    pub fn shutdown(self) {
        drop(self);
    }

    /// Rebuild the swapchain, depth buffer and framebuffers at a new size.
    ///
    /// Render pass, pipelines, descriptor sets and per-frame resources are kept.
    /// A zero-sized request (minimized window) keeps the current swapchain and
    /// is applied once a non-zero size arrives. While a frame is being
    /// recorded the rebuild is deferred to the next `begin_frame`.
    ///
    /// Fails if the surface no longer supports the swapchain's format.
    pub fn recreate_swapchain(&mut self, width: u32, height: u32) -> Result<()> {
        let recording = self.slots.recording_frame().is_some();
        match self.resize.request(width, height, recording) {
            ResizeAction::Rebuild { width, height } => self.rebuild_swapchain(width, height),
            ResizeAction::Minimized => {
                log::debug!("Window minimized, keeping current swapchain");
                Ok(())
            }
            ResizeAction::Defer => {
                log::debug!("Frame in progress, deferring swapchain recreation");
                Ok(())
            }
            ResizeAction::Keep => Ok(()),
        }
    }

    /// Replace the swapchain-sized resources. Nothing else is touched.
    fn rebuild_swapchain(&mut self, width: u32, height: u32) -> Result<()> {
        self.device.wait_idle()?;
        let kept = self.size_independent_handles();

        // Framebuffers reference the old image views and depth view
        self.framebuffers = None;

        let swapchain = Swapchain::new(
            Arc::clone(&self.device),
            width,
            height,
            self.present_mode,
            Some(&self.swapchain),
        )?;
        self.swapchain = swapchain;

        self.depth = GpuImage::depth(Arc::clone(&self.device), self.swapchain.extent)
            .context("Failed to recreate depth buffer")?;
        self.framebuffers = Some(Framebuffers::new(
            Arc::clone(&self.device),
            self.render_pass.render_pass,
            &self.swapchain.image_views,
            self.depth.view,
            self.swapchain.extent,
        )?);

        self.resize.rebuilt();
        debug_assert_eq!(kept, self.size_independent_handles());
        log::info!(
            "Swapchain recreated: {}x{}, {} images",
            self.swapchain.extent.width,
            self.swapchain.extent.height,
            self.swapchain.image_count()
        );
        Ok(())
    }

    fn size_independent_handles(&self) -> (vk::RenderPass, vk::Pipeline, vk::DescriptorSet) {
        (
            self.render_pass.render_pass,
            self.pipeline(PipelineKey::new(PrimitiveKind::Textured2d, BlendMode::Normal)),
            self.textures.white_descriptor_set(),
        )
    }

    // =========================================================================
    // FRAME SCHEDULING
    // =========================================================================

    /// Wait for this slot's previous frame, acquire an image and open recording.
    ///
    /// Returns false when no frame could be started (stale swapchain, minimized
    /// window, Vulkan error); the caller simply tries again next tick.
    pub fn begin_frame(&mut self) -> bool {
        if self.slots.is_open() {
            return true;
        }
        if self.slots.recording_frame().is_some() {
            // Ended but never presented
            self.present();
        }

        match self.resize.next_action() {
            ResizeAction::Keep => {}
            ResizeAction::Minimized | ResizeAction::Defer => return false,
            ResizeAction::Rebuild { width, height } => {
                if let Err(e) = self.rebuild_swapchain(width, height) {
                    log::error!("Swapchain recreation failed: {:#}", e);
                    return false;
                }
            }
        }

        let slot = self.slots.current();

        // ─────────────────────────────────────────────────────────────────────
        // STEP 1: Wait until the GPU is done with this slot
        // ─────────────────────────────────────────────────────────────────────
        if self.slots.start_acquire().is_some() {
            if let Err(e) = self.frames[slot].sync.wait() {
                log::error!("Waiting for frame fence failed: {:#}", e);
                self.slots.abandon_acquire();
                return false;
            }
        }

        // ─────────────────────────────────────────────────────────────────────
        // STEP 2: Acquire the next swapchain image
        // ─────────────────────────────────────────────────────────────────────
        let acquired = self
            .swapchain
            .acquire_next_image(u64::MAX, self.frames[slot].sync.image_available);

        let image_index = match acquired {
            Ok(Acquired::Image { index, suboptimal }) => {
                if suboptimal {
                    self.resize.mark_stale();
                }
                self.slots.image_acquired();
                index
            }
            Ok(Acquired::OutOfDate) => {
                log::warn!("Swapchain out of date, recreating");
                self.slots.abandon_acquire();
                self.resize.mark_stale();
                if let ResizeAction::Rebuild { width, height } = self.resize.next_action() {
                    if let Err(e) = self.rebuild_swapchain(width, height) {
                        log::error!("Swapchain recreation failed: {:#}", e);
                    }
                }
                return false;
            }
            Err(e) => {
                log::error!("Failed to acquire swapchain image: {:#}", e);
                self.slots.abandon_acquire();
                return false;
            }
        };

        let Some(framebuffer) = self.framebuffers.as_ref().and_then(|f| f.get(image_index)) else {
            log::error!("No framebuffer for swapchain image {}", image_index);
            self.abandon_frame();
            self.resize.mark_stale();
            return false;
        };

        // ─────────────────────────────────────────────────────────────────────
        // STEP 3: Reopen the command buffer, then reset the fence
        // ─────────────────────────────────────────────────────────────────────
        // The fence is reset last so a failure above never leaves an
        // unsignaled fence behind for the next wait.
        let frame = &mut self.frames[slot];
        let device = &self.device.device;
        let opened = unsafe {
            device
                .reset_command_buffer(frame.cmd, vk::CommandBufferResetFlags::empty())
                .and_then(|()| {
                    let begin_info = vk::CommandBufferBeginInfo::default()
                        .flags(vk::CommandBufferUsageFlags::ONE_TIME_SUBMIT);
                    device.begin_command_buffer(frame.cmd, &begin_info)
                })
        };
        if let Err(e) = opened {
            log::error!("Failed to begin command buffer: {}", e);
            self.abandon_frame();
            return false;
        }
        if let Err(e) = frame.sync.reset() {
            log::error!("Failed to reset frame fence: {:#}", e);
            self.abandon_frame();
            return false;
        }

        // ─────────────────────────────────────────────────────────────────────
        // STEP 4: Begin the render pass with the fixed clear
        // ─────────────────────────────────────────────────────────────────────
        let clear_values = [
            vk::ClearValue {
                color: vk::ClearColorValue { float32: CLEAR_COLOR },
            },
            vk::ClearValue {
                depth_stencil: vk::ClearDepthStencilValue {
                    depth: CLEAR_DEPTH,
                    stencil: 0,
                },
            },
        ];
        let pass_info = vk::RenderPassBeginInfo::default()
            .render_pass(self.render_pass.render_pass)
            .framebuffer(framebuffer)
            .render_area(vk::Rect2D {
                offset: vk::Offset2D { x: 0, y: 0 },
                extent: self.swapchain.extent,
            })
            .clear_values(&clear_values);
        unsafe {
            device.cmd_begin_render_pass(frame.cmd, &pass_info, vk::SubpassContents::INLINE);
        }

        frame.cursor.reset();
        self.image_index = image_index;

        let frame_number = self.slots.start_recording();
        self.textures.begin_frame(frame_number);

        log::trace!("Frame {} begun on slot {} (image {})", frame_number, slot, image_index);
        true
    }

    /// Give up on a frame after its image was acquired. The acquire's pending
    /// signal on `image_available` is consumed by an empty submission so the
    /// slot can acquire with that semaphore again.
    fn abandon_frame(&mut self) {
        if !self.slots.abandon_acquire() {
            return;
        }

        let wait_semaphores = [self.frames[self.slots.current()].sync.image_available];
        let wait_stages = [vk::PipelineStageFlags::ALL_COMMANDS];
        let submit_info = vk::SubmitInfo::default()
            .wait_semaphores(&wait_semaphores)
            .wait_dst_stage_mask(&wait_stages);

        let drained = unsafe {
            self.device
                .device
                .queue_submit(self.device.queue, &[submit_info], vk::Fence::null())
        };
        if let Err(e) = drained {
            log::error!("Failed to release acquired image semaphore: {}", e);
        }
    }

    /// Close the render pass and command recording. No-op without an open frame.
    pub fn end_frame(&mut self) {
        if !self.slots.is_open() {
            return;
        }

        let cmd = self.frames[self.slots.current()].cmd;
        let ended = unsafe {
            self.device.device.cmd_end_render_pass(cmd);
            self.device.device.end_command_buffer(cmd)
        };
        if let Err(e) = ended {
            // The submit in present() will fail and drop the frame
            log::error!("Failed to end command buffer: {}", e);
        }
        self.slots.finish_recording();
    }

    /// Submit the ended frame and queue it for presentation, then advance the
    /// frame slot. No-op unless `end_frame` closed a frame.
    pub fn present(&mut self) {
        if self.slots.phase() != (FramePhase::Recording { open: false }) {
            log::trace!("present() without an ended frame, ignoring");
            return;
        }

        let frame = &self.frames[self.slots.current()];
        let wait_semaphores = [frame.sync.image_available];
        let wait_stages = [vk::PipelineStageFlags::COLOR_ATTACHMENT_OUTPUT];
        let signal_semaphores = [frame.sync.render_finished];
        let command_buffers = [frame.cmd];

        let submit_info = vk::SubmitInfo::default()
            .wait_semaphores(&wait_semaphores)
            .wait_dst_stage_mask(&wait_stages)
            .command_buffers(&command_buffers)
            .signal_semaphores(&signal_semaphores);

        let submitted = unsafe {
            self.device.device.queue_submit(
                self.device.queue,
                &[submit_info],
                frame.sync.in_flight_fence,
            )
        };

        let submit_ok = submitted.is_ok();
        self.slots.complete(submit_ok);
        if let Err(e) = submitted {
            log::error!("Queue submit failed, frame dropped: {}", e);
            self.resize.mark_stale();
            return;
        }

        match self
            .swapchain
            .present(self.device.queue, self.image_index, &signal_semaphores)
        {
            Ok(false) => {}
            Ok(true) => {
                log::debug!("Swapchain stale or suboptimal after present");
                self.resize.mark_stale();
            }
            Err(e) => {
                log::warn!("Present failed: {:#}", e);
                self.resize.mark_stale();
            }
        }
    }

    /// End and present the current frame (beginning one first if needed),
    /// then open the next one.
    pub fn flip(&mut self) {
        if !self.slots.is_open() && !self.begin_frame() {
            return;
        }
        self.end_frame();
        self.present();
        self.begin_frame();
    }

    pub fn is_frame_open(&self) -> bool {
        self.slots.is_open()
    }

    pub fn frames_begun(&self) -> u64 {
        self.slots.frames_begun()
    }

    // =========================================================================
    // DRAWING
    // =========================================================================

    /// Draw a triangle list. Returns false if the draw was dropped.
    pub fn draw_triangles(&mut self, vertices: &[Vertex], textured: bool, is_3d: bool) -> bool {
        self.emit(PrimitiveKind::triangles(textured, is_3d), vertices)
    }

    /// Draw a triangle fan; fewer than 3 vertices is a silent no-op
    pub fn draw_triangle_fan(&mut self, vertices: &[Vertex], textured: bool, is_3d: bool) -> bool {
        if vertices.len() < 3 {
            return false;
        }
        let mut list = std::mem::take(&mut self.fan_scratch);
        fan_to_list(vertices, &mut list);
        let emitted = self.emit(PrimitiveKind::triangles(textured, is_3d), &list);
        self.fan_scratch = list;
        emitted
    }

    /// Draw a line list. A trailing unpaired vertex is ignored.
    pub fn draw_lines(&mut self, vertices: &[Vertex], is_3d: bool) -> bool {
        self.emit(PrimitiveKind::lines(is_3d), line_pairs(vertices))
    }

    fn emit(&mut self, kind: PrimitiveKind, vertices: &[Vertex]) -> bool {
        if !self.slots.is_open() {
            log::trace!("No frame open, dropping draw of {} vertices", vertices.len());
            return false;
        }

        let state = DrawState {
            pipeline: self.pipelines.get(PipelineKey::new(kind, self.blend)),
            layout: self.pipelines.layout,
            extent: self.swapchain.extent,
            descriptor_set: self.textures.bound_descriptor_set(),
            push_constants: PushConstants::new(self.transform.mvp(), self.alpha_ref),
        };

        let FrameRecord {
            cmd, ring, cursor, ..
        } = &mut self.frames[self.slots.current()];
        let buffer = ring.buffer;
        let Some(memory) = ring.mapped_mut() else {
            log::error!("Vertex ring is not host-mapped");
            return false;
        };

        let mut writer = RingWriter {
            buffer,
            cursor,
            memory,
        };
        let mut recorder = VkRecorder::new(&self.device.device, *cmd);
        draw::emit(&mut recorder, &mut writer, &state, vertices)
    }

    // =========================================================================
    // BLEND MODE & PASSES
    // =========================================================================

    pub fn set_blend_mode(&mut self, blend: BlendMode) {
        self.blend = blend;
    }

    pub fn blend_mode(&self) -> BlendMode {
        self.blend
    }

    /// Perspective projection, identity modelview, normal blending
    pub fn start_3d_pass(&mut self) {
        self.transform.start_3d_pass();
        self.blend = BlendMode::Normal;
    }

    /// Back to the `[0,1]` orthographic 2D space
    pub fn end_3d_pass(&mut self) {
        self.transform.end_3d_pass();
    }

    pub fn set_3d_pass(&mut self) {
        self.start_3d_pass();
    }

    pub fn set_2d_pass(&mut self) {
        self.end_3d_pass();
    }

    // =========================================================================
    // TRANSFORMS
    // =========================================================================

    pub fn transform(&self) -> &TransformState {
        &self.transform
    }

    pub fn transform_mut(&mut self) -> &mut TransformState {
        &mut self.transform
    }

    pub fn set_projection(&mut self, m: Mat4) {
        self.transform.set_projection(m);
    }

    pub fn set_modelview(&mut self, m: Mat4) {
        self.transform.set_modelview(m);
    }

    pub fn push_projection(&mut self) -> bool {
        self.transform.push_projection()
    }

    pub fn pop_projection(&mut self) -> bool {
        self.transform.pop_projection()
    }

    pub fn push_modelview(&mut self) -> bool {
        self.transform.push_modelview()
    }

    pub fn pop_modelview(&mut self) -> bool {
        self.transform.pop_modelview()
    }

    pub fn mvp(&self) -> &Mat4 {
        self.transform.mvp()
    }

    // =========================================================================
    // TEXTURES
    // =========================================================================

    /// Upload an RGBA8 image (`4 * width * height` bytes). Blocks until the
    /// copy has finished on the GPU. Returns `None` (and logs why) on failure.
    pub fn create_texture(&mut self, width: u32, height: u32, rgba: &[u8]) -> Option<TextureId> {
        match self.textures.create(&self.command_pool, width, height, rgba) {
            Ok(id) => Some(id),
            Err(e) => {
                log::error!("Failed to create {}x{} texture: {:#}", width, height, e);
                None
            }
        }
    }

    /// Unknown or already destroyed ids are ignored
    pub fn destroy_texture(&mut self, id: TextureId) {
        self.textures.destroy(id, self.slots.last_begun());
    }

    /// Bind `id` for subsequent draws; `None` or a dead id binds the white texture
    pub fn bind_texture(&mut self, id: Option<TextureId>) {
        self.textures.bind(id);
    }

    pub fn bound_texture(&self) -> Option<TextureId> {
        self.textures.bound()
    }

    /// The descriptor set the next draw will bind
    pub fn bound_descriptor_set(&self) -> vk::DescriptorSet {
        self.textures.bound_descriptor_set()
    }

    pub fn white_descriptor_set(&self) -> vk::DescriptorSet {
        self.textures.white_descriptor_set()
    }

    pub fn texture_info(&self, id: TextureId) -> Option<TextureInfo> {
        self.textures.info(id)
    }

    pub fn texture_count(&self) -> usize {
        self.textures.len()
    }

    // =========================================================================
    // QUERIES
    // =========================================================================

    pub fn extent(&self) -> vk::Extent2D {
        self.swapchain.extent
    }

    pub fn image_count(&self) -> usize {
        self.swapchain.image_count()
    }

    /// Pixel helpers bound to the current screen size
    pub fn canvas(&self) -> Canvas {
        Canvas::new(self.swapchain.extent.width, self.swapchain.extent.height)
    }

    pub fn pipeline(&self, key: PipelineKey) -> vk::Pipeline {
        self.pipelines.get(key)
    }

    pub fn device(&self) -> &Arc<VulkanDevice> {
        &self.device
    }

    /// Descriptor pool capacity
    pub fn texture_capacity(&self) -> u32 {
        self.descriptors.capacity
    }
}

impl Drop for Renderer {
    fn drop(&mut self) {
        log::info!("Shutting down renderer...");
        if let Err(e) = self.device.wait_idle() {
            log::error!("wait_idle failed during shutdown: {:#}", e);
        }
        self.textures.clear();
        // Remaining fields drop in declaration order
    }
}

/// Largest even-length prefix of `vertices`
fn line_pairs(vertices: &[Vertex]) -> &[Vertex] {
    &vertices[..vertices.len() & !1]
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn line_pairs_drops_trailing_vertex() {
        let v = [Vertex::default(); 5];
        assert_eq!(line_pairs(&v).len(), 4);
        assert_eq!(line_pairs(&v[..4]).len(), 4);
        assert_eq!(line_pairs(&v[..1]).len(), 0);
        assert!(line_pairs(&[]).is_empty());
    }
}
