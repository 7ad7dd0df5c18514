// Texture Manager
//
// RGBA8 pixel buffers are padded to power-of-two images, uploaded through a
// staging buffer with a blocking one-shot submission, and given their own
// sampler and descriptor set. Textures are addressed by slotmap keys so a
// destroyed texture can never be bound again.

use anyhow::{Context, Result};
use ash::vk;
use slotmap::SlotMap;
use std::sync::Arc;

use crate::backend::buffer::GpuBuffer;
use crate::backend::command::CommandPool;
use crate::backend::descriptor::{DescriptorAllocator, DescriptorSet};
use crate::backend::image::{GpuImage, Sampler};
use crate::backend::VulkanDevice;
use crate::frame::FrameSlots;

slotmap::new_key_type! {
    /// Handle returned by `create_texture`
    pub struct TextureId;
}

/// Logical and padded size of a texture
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct TextureInfo {
    pub width: u32,
    pub height: u32,
    pub padded_width: u32,
    pub padded_height: u32,
    /// Multiply `[0,1]` UVs by these to sample only the valid region
    pub u_scale: f32,
    pub v_scale: f32,
}

impl TextureInfo {
    pub fn new(width: u32, height: u32) -> Self {
        let padded_width = width.next_power_of_two();
        let padded_height = height.next_power_of_two();
        Self {
            width,
            height,
            padded_width,
            padded_height,
            u_scale: width as f32 / padded_width as f32,
            v_scale: height as f32 / padded_height as f32,
        }
    }

    /// Bytes of the padded RGBA8 image
    pub fn padded_size(&self) -> usize {
        self.padded_width as usize * self.padded_height as usize * 4
    }
}

/// Reject empty textures and pixel buffers that are not exactly `4*w*h` bytes
pub fn validate_pixels(width: u32, height: u32, rgba: &[u8]) -> Result<()> {
    if width == 0 || height == 0 {
        anyhow::bail!("Texture size {}x{} is empty", width, height);
    }
    let expected = width as usize * height as usize * 4;
    if rgba.len() != expected {
        anyhow::bail!(
            "Texture {}x{} needs {} bytes of RGBA data, got {}",
            width, height, expected, rgba.len()
        );
    }
    Ok(())
}

/// Copy `rgba` row by row into the padded image in `dst`, zeroing the padding
pub fn copy_padded(dst: &mut [u8], rgba: &[u8], info: &TextureInfo) {
    let dst = &mut dst[..info.padded_size()];
    if info.width == info.padded_width && info.height == info.padded_height {
        dst.copy_from_slice(rgba);
        return;
    }

    dst.fill(0);
    let src_row = info.width as usize * 4;
    let dst_row = info.padded_width as usize * 4;
    for (row, src) in rgba.chunks_exact(src_row).enumerate() {
        let start = row * dst_row;
        dst[start..start + src_row].copy_from_slice(src);
    }
}

/// Values kept alive until the frame they were last usable in has completed
pub struct RetireList<T> {
    entries: Vec<(u64, T)>,
}

impl<T> Default for RetireList<T> {
    fn default() -> Self {
        Self { entries: Vec::new() }
    }
}

impl<T> RetireList<T> {
    /// Park `value` until frame `frame` is known complete
    pub fn push(&mut self, frame: u64, value: T) {
        self.entries.push((frame, value));
    }

    /// Drop everything tagged with a frame `<= completed_through`.
    /// Returns how many values were released.
    pub fn collect(&mut self, completed_through: Option<u64>) -> usize {
        let Some(done) = completed_through else {
            return 0;
        };
        let before = self.entries.len();
        self.entries.retain(|(frame, _)| *frame > done);
        before - self.entries.len()
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

/// Live textures, destroyed ones still waiting on the GPU, and the current
/// binding. A destroyed or unknown id never resolves, so draws fall back to
/// white.
pub struct TextureSet<T> {
    live: SlotMap<TextureId, T>,
    retired: RetireList<T>,
    bound: Option<TextureId>,
}

impl<T> Default for TextureSet<T> {
    fn default() -> Self {
        Self {
            live: SlotMap::with_key(),
            retired: RetireList::default(),
            bound: None,
        }
    }
}

impl<T> TextureSet<T> {
    pub fn insert(&mut self, value: T) -> TextureId {
        self.live.insert(value)
    }

    pub fn get(&self, id: TextureId) -> Option<&T> {
        self.live.get(id)
    }

    pub fn contains(&self, id: TextureId) -> bool {
        self.live.contains_key(id)
    }

    /// Value for `id`; `None` for no id or a stale one
    pub fn resolve(&self, id: Option<TextureId>) -> Option<&T> {
        id.and_then(|id| self.live.get(id))
    }

    /// Bind `id` for following draws. A stale id binds nothing.
    pub fn bind(&mut self, id: Option<TextureId>) {
        self.bound = id.filter(|&id| self.live.contains_key(id));
    }

    pub fn bound(&self) -> Option<TextureId> {
        self.bound
    }

    /// Value of the bound texture; `None` means draw with white
    pub fn bound_value(&self) -> Option<&T> {
        self.resolve(self.bound)
    }

    /// Make `id` unbindable at once and unbind it if bound. The value is kept
    /// until frame `last_begun` has completed, or dropped now if no frame
    /// ever began. Returns false for unknown or already removed ids.
    pub fn remove(&mut self, id: TextureId, last_begun: Option<u64>) -> bool {
        let Some(value) = self.live.remove(id) else {
            return false;
        };
        if self.bound == Some(id) {
            self.bound = None;
        }
        match last_begun {
            Some(frame) => self.retired.push(frame, value),
            None => drop(value),
        }
        true
    }

    /// Frame `frame` started recording: nothing is bound, and retired values
    /// from frames that have completed are released. Returns how many were.
    pub fn begin_frame(&mut self, frame: u64) -> usize {
        self.bound = None;
        self.retired.collect(FrameSlots::completed_through(frame))
    }

    pub fn len(&self) -> usize {
        self.live.len()
    }

    pub fn is_empty(&self) -> bool {
        self.live.is_empty()
    }

    pub fn retired_len(&self) -> usize {
        self.retired.len()
    }

    /// Drop every value, live and retired. Returns the live count.
    pub fn clear(&mut self) -> usize {
        let live = self.live.len();
        self.bound = None;
        self.live.clear();
        self.retired.collect(Some(u64::MAX));
        live
    }
}

/// A fully uploaded texture. Field order is drop order.
pub struct Texture {
    pub info: TextureInfo,
    descriptor: DescriptorSet,
    _sampler: Sampler,
    _image: GpuImage,
}

impl Texture {
    pub fn descriptor_set(&self) -> vk::DescriptorSet {
        self.descriptor.set
    }

    /// Upload `rgba` and build the sampler and descriptor set.
    ///
    /// Everything created before a failing step is released on return.
    pub fn upload(
        device: &Arc<VulkanDevice>,
        descriptors: &Arc<DescriptorAllocator>,
        pool: &CommandPool,
        width: u32,
        height: u32,
        rgba: &[u8],
    ) -> Result<Self> {
        validate_pixels(width, height, rgba)?;
        let info = TextureInfo::new(width, height);

        let staging = GpuBuffer::staging(
            Arc::clone(device),
            info.padded_size() as vk::DeviceSize,
            |dst| copy_padded(dst, rgba, &info),
        )?;

        let extent = vk::Extent2D {
            width: info.padded_width,
            height: info.padded_height,
        };
        let image = GpuImage::texture(Arc::clone(device), extent)?;

        pool.submit_once(|device, cmd| {
            record_upload(device, cmd, staging.buffer, image.image, extent);
        })
        .context("Texture upload failed")?;
        drop(staging);

        let sampler = Sampler::nearest_repeat(Arc::clone(device))?;
        let descriptor = descriptors.allocate_image_set(image.view, sampler.sampler)?;

        Ok(Self {
            info,
            descriptor,
            _sampler: sampler,
            _image: image,
        })
    }
}

/// UNDEFINED -> TRANSFER_DST, copy, TRANSFER_DST -> SHADER_READ_ONLY
fn record_upload(
    device: &ash::Device,
    cmd: vk::CommandBuffer,
    staging: vk::Buffer,
    image: vk::Image,
    extent: vk::Extent2D,
) {
    let range = vk::ImageSubresourceRange {
        aspect_mask: vk::ImageAspectFlags::COLOR,
        base_mip_level: 0,
        level_count: 1,
        base_array_layer: 0,
        layer_count: 1,
    };

    let to_transfer = vk::ImageMemoryBarrier::default()
        .old_layout(vk::ImageLayout::UNDEFINED)
        .new_layout(vk::ImageLayout::TRANSFER_DST_OPTIMAL)
        .src_queue_family_index(vk::QUEUE_FAMILY_IGNORED)
        .dst_queue_family_index(vk::QUEUE_FAMILY_IGNORED)
        .image(image)
        .subresource_range(range)
        .src_access_mask(vk::AccessFlags::empty())
        .dst_access_mask(vk::AccessFlags::TRANSFER_WRITE);

    let region = vk::BufferImageCopy {
        buffer_offset: 0,
        buffer_row_length: 0,
        buffer_image_height: 0,
        image_subresource: vk::ImageSubresourceLayers {
            aspect_mask: vk::ImageAspectFlags::COLOR,
            mip_level: 0,
            base_array_layer: 0,
            layer_count: 1,
        },
        image_offset: vk::Offset3D { x: 0, y: 0, z: 0 },
        image_extent: vk::Extent3D {
            width: extent.width,
            height: extent.height,
            depth: 1,
        },
    };

    let to_shader = vk::ImageMemoryBarrier::default()
        .old_layout(vk::ImageLayout::TRANSFER_DST_OPTIMAL)
        .new_layout(vk::ImageLayout::SHADER_READ_ONLY_OPTIMAL)
        .src_queue_family_index(vk::QUEUE_FAMILY_IGNORED)
        .dst_queue_family_index(vk::QUEUE_FAMILY_IGNORED)
        .image(image)
        .subresource_range(range)
        .src_access_mask(vk::AccessFlags::TRANSFER_WRITE)
        .dst_access_mask(vk::AccessFlags::SHADER_READ);

    unsafe {
        device.cmd_pipeline_barrier(
            cmd,
            vk::PipelineStageFlags::TOP_OF_PIPE,
            vk::PipelineStageFlags::TRANSFER,
            vk::DependencyFlags::empty(),
            &[],
            &[],
            &[to_transfer],
        );
        device.cmd_copy_buffer_to_image(
            cmd,
            staging,
            image,
            vk::ImageLayout::TRANSFER_DST_OPTIMAL,
            &[region],
        );
        device.cmd_pipeline_barrier(
            cmd,
            vk::PipelineStageFlags::TRANSFER,
            vk::PipelineStageFlags::FRAGMENT_SHADER,
            vk::DependencyFlags::empty(),
            &[],
            &[],
            &[to_shader],
        );
    }
}

/// Owns every texture plus the permanent 1x1 white fallback
pub struct TextureManager {
    textures: TextureSet<Texture>,
    white: Texture,
    descriptors: Arc<DescriptorAllocator>,
    device: Arc<VulkanDevice>,
}

impl TextureManager {
    pub fn new(
        device: Arc<VulkanDevice>,
        descriptors: Arc<DescriptorAllocator>,
        pool: &CommandPool,
    ) -> Result<Self> {
        let white = Texture::upload(&device, &descriptors, pool, 1, 1, &[255, 255, 255, 255])
            .context("Failed to create white fallback texture")?;

        Ok(Self {
            textures: TextureSet::default(),
            white,
            descriptors,
            device,
        })
    }

    pub fn create(
        &mut self,
        pool: &CommandPool,
        width: u32,
        height: u32,
        rgba: &[u8],
    ) -> Result<TextureId> {
        let texture = Texture::upload(&self.device, &self.descriptors, pool, width, height, rgba)?;
        let id = self.textures.insert(texture);
        log::debug!("Created texture {:?} ({}x{})", id, width, height);
        Ok(id)
    }

    /// See [`TextureSet::remove`]
    pub fn destroy(&mut self, id: TextureId, last_begun: Option<u64>) -> bool {
        self.textures.remove(id, last_begun)
    }

    pub fn bind(&mut self, id: Option<TextureId>) {
        self.textures.bind(id);
    }

    pub fn bound(&self) -> Option<TextureId> {
        self.textures.bound()
    }

    /// Unbind and release retired textures the GPU can no longer be using
    pub fn begin_frame(&mut self, frame: u64) {
        let released = self.textures.begin_frame(frame);
        if released > 0 {
            log::trace!("Released {} retired textures", released);
        }
    }

    pub fn info(&self, id: TextureId) -> Option<TextureInfo> {
        self.textures.get(id).map(|texture| texture.info)
    }

    /// Descriptor set of the bound texture, or the white fallback
    pub fn bound_descriptor_set(&self) -> vk::DescriptorSet {
        self.textures
            .bound_value()
            .unwrap_or(&self.white)
            .descriptor_set()
    }

    pub fn white_descriptor_set(&self) -> vk::DescriptorSet {
        self.white.descriptor_set()
    }

    pub fn len(&self) -> usize {
        self.textures.len()
    }

    pub fn is_empty(&self) -> bool {
        self.textures.is_empty()
    }

    /// Drop every texture, live and retired. The caller idles the device first.
    pub fn clear(&mut self) {
        let live = self.textures.clear();
        log::debug!("Destroyed {} textures", live);
    }
}
