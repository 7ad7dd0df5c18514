// GPU-resident images (depth buffer, textures) with one view each

use anyhow::{Context, Result};
use ash::vk;
use gpu_allocator::vulkan::{Allocation, AllocationCreateDesc, AllocationScheme};
use gpu_allocator::MemoryLocation;
use std::sync::Arc;
use super::VulkanDevice;

pub const DEPTH_FORMAT: vk::Format = vk::Format::D32_SFLOAT;
pub const TEXTURE_FORMAT: vk::Format = vk::Format::R8G8B8A8_UNORM;

pub struct GpuImage {
    pub image: vk::Image,
    pub view: vk::ImageView,
    pub format: vk::Format,
    pub extent: vk::Extent2D,
    allocation: Option<Allocation>,
    device: Arc<VulkanDevice>,
}

impl GpuImage {
    fn new(
        device: Arc<VulkanDevice>,
        name: &str,
        extent: vk::Extent2D,
        format: vk::Format,
        usage: vk::ImageUsageFlags,
        aspect: vk::ImageAspectFlags,
    ) -> Result<Self> {
        let image_info = vk::ImageCreateInfo::default()
            .image_type(vk::ImageType::TYPE_2D)
            .extent(vk::Extent3D {
                width: extent.width,
                height: extent.height,
                depth: 1,
            })
            .mip_levels(1)
            .array_layers(1)
            .format(format)
            .tiling(vk::ImageTiling::OPTIMAL)
            .initial_layout(vk::ImageLayout::UNDEFINED)
            .usage(usage)
            .samples(vk::SampleCountFlags::TYPE_1)
            .sharing_mode(vk::SharingMode::EXCLUSIVE);

        let image = unsafe {
            device.device.create_image(&image_info, None)
        }
        .with_context(|| format!("Failed to create {name} image"))?;

        let mut this = Self {
            image,
            view: vk::ImageView::null(),
            format,
            extent,
            allocation: None,
            device,
        };

        let requirements = unsafe {
            this.device.device.get_image_memory_requirements(image)
        };

        let allocation = this.device.allocator().lock()
            .allocate(&AllocationCreateDesc {
                name,
                requirements,
                location: MemoryLocation::GpuOnly,
                linear: false,
                allocation_scheme: AllocationScheme::GpuAllocatorManaged,
            })
            .with_context(|| format!("Failed to allocate {name} image memory"))?;

        let bind = unsafe {
            this.device.device.bind_image_memory(image, allocation.memory(), allocation.offset())
        };
        this.allocation = Some(allocation);
        bind.with_context(|| format!("Failed to bind {name} image memory"))?;

        let view_info = vk::ImageViewCreateInfo::default()
            .image(image)
            .view_type(vk::ImageViewType::TYPE_2D)
            .format(format)
            .subresource_range(vk::ImageSubresourceRange {
                aspect_mask: aspect,
                base_mip_level: 0,
                level_count: 1,
                base_array_layer: 0,
                layer_count: 1,
            });

        this.view = unsafe {
            this.device.device.create_image_view(&view_info, None)
        }
        .with_context(|| format!("Failed to create {name} image view"))?;

        Ok(this)
    }

    /// Depth attachment matching the swapchain extent
    pub fn depth(device: Arc<VulkanDevice>, extent: vk::Extent2D) -> Result<Self> {
        Self::new(
            device,
            "depth",
            extent,
            DEPTH_FORMAT,
            vk::ImageUsageFlags::DEPTH_STENCIL_ATTACHMENT,
            vk::ImageAspectFlags::DEPTH,
        )
    }

    /// Sampled RGBA8 image filled by a transfer
    pub fn texture(device: Arc<VulkanDevice>, extent: vk::Extent2D) -> Result<Self> {
        Self::new(
            device,
            "texture",
            extent,
            TEXTURE_FORMAT,
            vk::ImageUsageFlags::TRANSFER_DST | vk::ImageUsageFlags::SAMPLED,
            vk::ImageAspectFlags::COLOR,
        )
    }
}

impl Drop for GpuImage {
    fn drop(&mut self) {
        unsafe {
            if self.view != vk::ImageView::null() {
                self.device.device.destroy_image_view(self.view, None);
            }
            self.device.device.destroy_image(self.image, None);
        }
        if let Some(allocation) = self.allocation.take() {
            if let Err(e) = self.device.allocator().lock().free(allocation) {
                log::warn!("Failed to free image memory: {}", e);
            }
        }
    }
}

/// Nearest-filtered, repeat-addressed sampler
pub struct Sampler {
    pub sampler: vk::Sampler,
    device: Arc<VulkanDevice>,
}

impl Sampler {
    pub fn nearest_repeat(device: Arc<VulkanDevice>) -> Result<Self> {
        let sampler_info = vk::SamplerCreateInfo::default()
            .mag_filter(vk::Filter::NEAREST)
            .min_filter(vk::Filter::NEAREST)
            .mipmap_mode(vk::SamplerMipmapMode::NEAREST)
            .address_mode_u(vk::SamplerAddressMode::REPEAT)
            .address_mode_v(vk::SamplerAddressMode::REPEAT)
            .address_mode_w(vk::SamplerAddressMode::REPEAT)
            .max_lod(0.0);

        let sampler = unsafe {
            device.device.create_sampler(&sampler_info, None)
        }
        .context("Failed to create sampler")?;

        Ok(Self { sampler, device })
    }
}

impl Drop for Sampler {
    fn drop(&mut self) {
        unsafe {
            self.device.device.destroy_sampler(self.sampler, None);
        }
    }
}
