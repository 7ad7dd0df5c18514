// Descriptor pool and layout for per-texture image+sampler sets

use anyhow::{Context, Result};
use ash::vk;
use std::sync::Arc;
use super::VulkanDevice;

/// Minimum number of texture sets the pool is sized for
pub const MIN_TEXTURE_SETS: u32 = 1024;

/// Owns the set layout (binding 0: combined image sampler, fragment stage)
/// and a pool whose sets can be freed individually.
pub struct DescriptorAllocator {
    pub layout: vk::DescriptorSetLayout,
    pub pool: vk::DescriptorPool,
    pub capacity: u32,
    device: Arc<VulkanDevice>,
}

impl DescriptorAllocator {
    pub fn new(device: Arc<VulkanDevice>, max_sets: u32) -> Result<Self> {
        let capacity = max_sets.max(MIN_TEXTURE_SETS);

        let bindings = [vk::DescriptorSetLayoutBinding::default()
            .binding(0)
            .descriptor_type(vk::DescriptorType::COMBINED_IMAGE_SAMPLER)
            .descriptor_count(1)
            .stage_flags(vk::ShaderStageFlags::FRAGMENT)];

        let layout_info = vk::DescriptorSetLayoutCreateInfo::default().bindings(&bindings);
        let layout = unsafe {
            device.device.create_descriptor_set_layout(&layout_info, None)
        }
        .context("Failed to create descriptor set layout")?;

        let mut this = Self {
            layout,
            pool: vk::DescriptorPool::null(),
            capacity,
            device,
        };

        let pool_sizes = [vk::DescriptorPoolSize {
            ty: vk::DescriptorType::COMBINED_IMAGE_SAMPLER,
            descriptor_count: capacity,
        }];
        let pool_info = vk::DescriptorPoolCreateInfo::default()
            .flags(vk::DescriptorPoolCreateFlags::FREE_DESCRIPTOR_SET)
            .max_sets(capacity)
            .pool_sizes(&pool_sizes);

        this.pool = unsafe {
            this.device.device.create_descriptor_pool(&pool_info, None)
        }
        .context("Failed to create descriptor pool")?;

        log::info!("Descriptor pool ready for {} texture sets", capacity);
        Ok(this)
    }

    /// Allocate one set and point binding 0 at `view` + `sampler`
    pub fn allocate_image_set(
        self: &Arc<Self>,
        view: vk::ImageView,
        sampler: vk::Sampler,
    ) -> Result<DescriptorSet> {
        let layouts = [self.layout];
        let alloc_info = vk::DescriptorSetAllocateInfo::default()
            .descriptor_pool(self.pool)
            .set_layouts(&layouts);

        let set = unsafe { self.device.device.allocate_descriptor_sets(&alloc_info) }
            .context("Failed to allocate descriptor set (pool exhausted?)")?[0];

        let image_info = [vk::DescriptorImageInfo {
            sampler,
            image_view: view,
            image_layout: vk::ImageLayout::SHADER_READ_ONLY_OPTIMAL,
        }];
        let write = vk::WriteDescriptorSet::default()
            .dst_set(set)
            .dst_binding(0)
            .descriptor_type(vk::DescriptorType::COMBINED_IMAGE_SAMPLER)
            .image_info(&image_info);

        unsafe { self.device.device.update_descriptor_sets(&[write], &[]) };

        Ok(DescriptorSet {
            set,
            allocator: Arc::clone(self),
        })
    }
}

impl Drop for DescriptorAllocator {
    fn drop(&mut self) {
        unsafe {
            if self.pool != vk::DescriptorPool::null() {
                self.device.device.destroy_descriptor_pool(self.pool, None);
            }
            self.device.device.destroy_descriptor_set_layout(self.layout, None);
        }
    }
}

/// A set returned to its pool on drop
pub struct DescriptorSet {
    pub set: vk::DescriptorSet,
    allocator: Arc<DescriptorAllocator>,
}

impl Drop for DescriptorSet {
    fn drop(&mut self) {
        let result = unsafe {
            self.allocator.device.device.free_descriptor_sets(self.allocator.pool, &[self.set])
        };
        if let Err(e) = result {
            log::warn!("Failed to free descriptor set: {:?}", e);
        }
    }
}
