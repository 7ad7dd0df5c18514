// Synchronization primitives
//
// Fences, semaphores for GPU-CPU and GPU-GPU sync.
// One set per frame in flight.

use ash::vk;
use anyhow::{Context, Result};
use std::sync::Arc;
use super::VulkanDevice;

/// Frame synchronization - one per frame in flight
pub struct FrameSync {
    pub image_available: vk::Semaphore,
    pub render_finished: vk::Semaphore,
    pub in_flight_fence: vk::Fence,
    device: Arc<VulkanDevice>,
}

impl FrameSync {
    pub fn new(device: Arc<VulkanDevice>) -> Result<Self> {
        // Handles start null; Drop skips whatever was never created
        let mut this = Self {
            image_available: vk::Semaphore::null(),
            render_finished: vk::Semaphore::null(),
            in_flight_fence: vk::Fence::null(),
            device,
        };

        let semaphore_info = vk::SemaphoreCreateInfo::default();
        let fence_info = vk::FenceCreateInfo::default()
            .flags(vk::FenceCreateFlags::SIGNALED); // First wait must not block

        unsafe {
            this.image_available = this.device.device.create_semaphore(&semaphore_info, None)
                .context("Failed to create image-available semaphore")?;
            this.render_finished = this.device.device.create_semaphore(&semaphore_info, None)
                .context("Failed to create render-finished semaphore")?;
            this.in_flight_fence = this.device.device.create_fence(&fence_info, None)
                .context("Failed to create in-flight fence")?;
        }

        Ok(this)
    }

    /// Block until the GPU has finished the last submission that signalled this fence
    pub fn wait(&self) -> Result<()> {
        unsafe {
            self.device.device.wait_for_fences(&[self.in_flight_fence], true, u64::MAX)
        }
        .context("Failed to wait for in-flight fence")
    }

    pub fn reset(&self) -> Result<()> {
        unsafe { self.device.device.reset_fences(&[self.in_flight_fence]) }
            .context("Failed to reset in-flight fence")
    }
}

impl Drop for FrameSync {
    fn drop(&mut self) {
        unsafe {
            if self.in_flight_fence != vk::Fence::null() {
                self.device.device.destroy_fence(self.in_flight_fence, None);
            }
            if self.render_finished != vk::Semaphore::null() {
                self.device.device.destroy_semaphore(self.render_finished, None);
            }
            if self.image_available != vk::Semaphore::null() {
                self.device.device.destroy_semaphore(self.image_available, None);
            }
        }
    }
}
