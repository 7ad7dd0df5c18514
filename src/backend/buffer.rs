// GPU buffers backed by gpu-allocator
//
// Used for the per-frame vertex rings (persistently mapped) and for texture
// staging buffers (mapped, freed right after the upload).

use anyhow::{Context, Result};
use ash::vk;
use gpu_allocator::vulkan::{Allocation, AllocationCreateDesc, AllocationScheme};
use gpu_allocator::MemoryLocation;
use std::sync::Arc;
use super::VulkanDevice;

pub struct GpuBuffer {
    pub buffer: vk::Buffer,
    pub size: vk::DeviceSize,
    allocation: Option<Allocation>,
    device: Arc<VulkanDevice>,
}

impl GpuBuffer {
    /// Create a buffer and bind freshly allocated memory from `location`
    pub fn new(
        device: Arc<VulkanDevice>,
        name: &str,
        size: vk::DeviceSize,
        usage: vk::BufferUsageFlags,
        location: MemoryLocation,
    ) -> Result<Self> {
        let buffer_info = vk::BufferCreateInfo::default()
            .size(size)
            .usage(usage)
            .sharing_mode(vk::SharingMode::EXCLUSIVE);

        let buffer = unsafe {
            device.device.create_buffer(&buffer_info, None)
        }
        .with_context(|| format!("Failed to create buffer '{name}'"))?;

        // From here on Drop owns the buffer
        let mut this = Self {
            buffer,
            size,
            allocation: None,
            device,
        };

        let requirements = unsafe {
            this.device.device.get_buffer_memory_requirements(buffer)
        };

        let allocation = this.device.allocator().lock()
            .allocate(&AllocationCreateDesc {
                name,
                requirements,
                location,
                linear: true,
                allocation_scheme: AllocationScheme::GpuAllocatorManaged,
            })
            .with_context(|| format!("Failed to allocate memory for buffer '{name}'"))?;

        let bind = unsafe {
            this.device.device.bind_buffer_memory(buffer, allocation.memory(), allocation.offset())
        };
        this.allocation = Some(allocation);
        bind.with_context(|| format!("Failed to bind memory for buffer '{name}'"))?;

        Ok(this)
    }

    /// Host-visible vertex buffer that stays mapped for its whole lifetime
    pub fn vertex_ring(device: Arc<VulkanDevice>, size: vk::DeviceSize) -> Result<Self> {
        let buffer = Self::new(
            device,
            "vertex ring",
            size,
            vk::BufferUsageFlags::VERTEX_BUFFER,
            MemoryLocation::CpuToGpu,
        )?;
        if buffer.allocation.as_ref().and_then(|a| a.mapped_ptr()).is_none() {
            anyhow::bail!("Vertex ring memory is not host-mapped");
        }
        Ok(buffer)
    }

    /// Host-visible transfer source filled by `fill`
    pub fn staging(
        device: Arc<VulkanDevice>,
        size: vk::DeviceSize,
        fill: impl FnOnce(&mut [u8]),
    ) -> Result<Self> {
        let mut buffer = Self::new(
            device,
            "staging",
            size,
            vk::BufferUsageFlags::TRANSFER_SRC,
            MemoryLocation::CpuToGpu,
        )?;
        let mapped = buffer.mapped_mut().context("Staging memory is not host-mapped")?;
        fill(&mut mapped[..size as usize]);
        Ok(buffer)
    }

    /// The mapped bytes of a host-visible buffer
    pub fn mapped_mut(&mut self) -> Option<&mut [u8]> {
        self.allocation.as_mut().and_then(|a| a.mapped_slice_mut())
    }
}

impl Drop for GpuBuffer {
    fn drop(&mut self) {
        unsafe {
            self.device.device.destroy_buffer(self.buffer, None);
        }
        if let Some(allocation) = self.allocation.take() {
            if let Err(e) = self.device.allocator().lock().free(allocation) {
                log::warn!("Failed to free buffer memory: {}", e);
            }
        }
    }
}
