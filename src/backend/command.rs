// Command pools, one-shot submissions and the per-draw recording seam

use anyhow::{Context, Result};
use ash::vk;
use std::sync::Arc;
use super::VulkanDevice;
use crate::vertex::PushConstants;

pub struct CommandPool {
    pub pool: vk::CommandPool,
    device: Arc<VulkanDevice>,
}

impl CommandPool {
    /// Pool on the graphics queue family whose buffers can be reset individually
    pub fn new(device: Arc<VulkanDevice>) -> Result<Self> {
        let pool_info = vk::CommandPoolCreateInfo::default()
            .queue_family_index(device.queue_family)
            .flags(vk::CommandPoolCreateFlags::RESET_COMMAND_BUFFER);

        let pool = unsafe {
            device.device.create_command_pool(&pool_info, None)
        }
        .context("Failed to create command pool")?;

        Ok(Self { pool, device })
    }

    pub fn allocate(&self, count: u32) -> Result<Vec<vk::CommandBuffer>> {
        let alloc_info = vk::CommandBufferAllocateInfo::default()
            .command_pool(self.pool)
            .level(vk::CommandBufferLevel::PRIMARY)
            .command_buffer_count(count);

        unsafe { self.device.device.allocate_command_buffers(&alloc_info) }
            .context("Failed to allocate command buffers")
    }

    /// Record with `record`, submit, and block until the GPU is done.
    ///
    /// The command buffer and fence live only for this call; nothing here
    /// touches the per-frame command buffers.
    pub fn submit_once(&self, record: impl FnOnce(&ash::Device, vk::CommandBuffer)) -> Result<()> {
        let device = &self.device.device;
        let cmd = self.allocate(1)?[0];

        let fence_info = vk::FenceCreateInfo::default();
        let fence = match unsafe { device.create_fence(&fence_info, None) } {
            Ok(fence) => fence,
            Err(e) => {
                unsafe { device.free_command_buffers(self.pool, &[cmd]) };
                return Err(e).context("Failed to create upload fence");
            }
        };

        let result = (|| -> Result<()> {
            let begin_info = vk::CommandBufferBeginInfo::default()
                .flags(vk::CommandBufferUsageFlags::ONE_TIME_SUBMIT);
            unsafe { device.begin_command_buffer(cmd, &begin_info) }
                .context("Failed to begin one-shot command buffer")?;

            record(device, cmd);

            unsafe { device.end_command_buffer(cmd) }
                .context("Failed to end one-shot command buffer")?;

            let command_buffers = [cmd];
            let submit_info = vk::SubmitInfo::default().command_buffers(&command_buffers);
            unsafe {
                device.queue_submit(self.device.queue, &[submit_info], fence)
                    .context("Failed to submit one-shot command buffer")?;
                device.wait_for_fences(&[fence], true, u64::MAX)
                    .context("Failed to wait for one-shot command buffer")?;
            }
            Ok(())
        })();

        unsafe {
            device.destroy_fence(fence, None);
            device.free_command_buffers(self.pool, &[cmd]);
        }
        result
    }
}

impl Drop for CommandPool {
    fn drop(&mut self) {
        unsafe {
            self.device.device.destroy_command_pool(self.pool, None);
        }
    }
}

/// The commands one immediate-mode draw records.
///
/// Implemented over a live command buffer by [`VkRecorder`]; the draw tests use
/// an in-memory log instead.
pub trait CommandRecorder {
    fn bind_pipeline(&mut self, pipeline: vk::Pipeline);
    /// Full-framebuffer viewport (depth 0..1) and matching scissor
    fn set_viewport_and_scissor(&mut self, extent: vk::Extent2D);
    fn push_constants(&mut self, layout: vk::PipelineLayout, constants: &PushConstants);
    fn bind_descriptor_set(&mut self, layout: vk::PipelineLayout, set: vk::DescriptorSet);
    fn bind_vertex_buffer(&mut self, buffer: vk::Buffer, offset: vk::DeviceSize);
    fn draw(&mut self, vertex_count: u32);
}

pub struct VkRecorder<'a> {
    device: &'a ash::Device,
    cmd: vk::CommandBuffer,
}

impl<'a> VkRecorder<'a> {
    pub fn new(device: &'a ash::Device, cmd: vk::CommandBuffer) -> Self {
        Self { device, cmd }
    }
}

impl CommandRecorder for VkRecorder<'_> {
    fn bind_pipeline(&mut self, pipeline: vk::Pipeline) {
        unsafe {
            self.device.cmd_bind_pipeline(self.cmd, vk::PipelineBindPoint::GRAPHICS, pipeline);
        }
    }

    fn set_viewport_and_scissor(&mut self, extent: vk::Extent2D) {
        let viewport = vk::Viewport {
            x: 0.0,
            y: 0.0,
            width: extent.width as f32,
            height: extent.height as f32,
            min_depth: 0.0,
            max_depth: 1.0,
        };
        let scissor = vk::Rect2D {
            offset: vk::Offset2D { x: 0, y: 0 },
            extent,
        };
        unsafe {
            self.device.cmd_set_viewport(self.cmd, 0, &[viewport]);
            self.device.cmd_set_scissor(self.cmd, 0, &[scissor]);
        }
    }

    fn push_constants(&mut self, layout: vk::PipelineLayout, constants: &PushConstants) {
        unsafe {
            self.device.cmd_push_constants(
                self.cmd,
                layout,
                PushConstants::STAGES,
                0,
                constants.as_bytes(),
            );
        }
    }

    fn bind_descriptor_set(&mut self, layout: vk::PipelineLayout, set: vk::DescriptorSet) {
        unsafe {
            self.device.cmd_bind_descriptor_sets(
                self.cmd,
                vk::PipelineBindPoint::GRAPHICS,
                layout,
                0,
                &[set],
                &[],
            );
        }
    }

    fn bind_vertex_buffer(&mut self, buffer: vk::Buffer, offset: vk::DeviceSize) {
        unsafe {
            self.device.cmd_bind_vertex_buffers(self.cmd, 0, &[buffer], &[offset]);
        }
    }

    fn draw(&mut self, vertex_count: u32) {
        unsafe {
            self.device.cmd_draw(self.cmd, vertex_count, 1, 0, 0);
        }
    }
}
