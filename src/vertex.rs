// Wire formats shared with the shader binaries
//
// Both layouts are fixed: existing SPIR-V reads them byte for byte.

use ash::vk;
use bytemuck::{Pod, Zeroable};
use glam::Mat4;

/// One vertex as every pipeline consumes it: position.xyz, color.rgba, texcoord.uv.
///
/// 2D and untextured draws use the same layout; unused channels carry neutral
/// defaults (z = 0, white color, uv = 0).
#[repr(C)]
#[derive(Debug, Clone, Copy, PartialEq, Pod, Zeroable)]
pub struct Vertex {
    pub position: [f32; 3],
    pub color: [f32; 4],
    pub tex_coord: [f32; 2],
}

impl Vertex {
    /// Size of one vertex in bytes (9 x f32)
    pub const SIZE: usize = std::mem::size_of::<Self>();

    pub const fn new(position: [f32; 3], color: [f32; 4], tex_coord: [f32; 2]) -> Self {
        Self { position, color, tex_coord }
    }

    /// Untextured vertex
    pub const fn colored(position: [f32; 3], color: [f32; 4]) -> Self {
        Self::new(position, color, [0.0, 0.0])
    }

    /// White vertex with texture coordinates
    pub const fn textured(position: [f32; 3], tex_coord: [f32; 2]) -> Self {
        Self::new(position, [1.0; 4], tex_coord)
    }
}

impl Default for Vertex {
    fn default() -> Self {
        Self::new([0.0; 3], [1.0; 4], [0.0; 2])
    }
}

/// Vertex input description for the single interleaved binding
pub fn vertex_input_description() -> (
    [vk::VertexInputBindingDescription; 1],
    [vk::VertexInputAttributeDescription; 3],
) {
    let binding = vk::VertexInputBindingDescription::default()
        .binding(0)
        .stride(Vertex::SIZE as u32)
        .input_rate(vk::VertexInputRate::VERTEX);

    let position = vk::VertexInputAttributeDescription::default()
        .binding(0)
        .location(0)
        .format(vk::Format::R32G32B32_SFLOAT)
        .offset(0);

    let color = vk::VertexInputAttributeDescription::default()
        .binding(0)
        .location(1)
        .format(vk::Format::R32G32B32A32_SFLOAT)
        .offset(12); // After 3 floats

    let tex_coord = vk::VertexInputAttributeDescription::default()
        .binding(0)
        .location(2)
        .format(vk::Format::R32G32_SFLOAT)
        .offset(28); // After 7 floats

    ([binding], [position, color, tex_coord])
}

/// Per-draw push constants: column-major MVP, alpha-test reference, padding to 80 bytes.
/// Visible to both the vertex and the fragment stage.
#[repr(C)]
#[derive(Debug, Clone, Copy, PartialEq, Pod, Zeroable)]
pub struct PushConstants {
    pub mvp: [f32; 16],
    pub alpha_ref: f32,
    pub _pad: [f32; 3],
}

impl PushConstants {
    pub const SIZE: u32 = std::mem::size_of::<Self>() as u32;
    pub const STAGES: vk::ShaderStageFlags = vk::ShaderStageFlags::from_raw(
        vk::ShaderStageFlags::VERTEX.as_raw() | vk::ShaderStageFlags::FRAGMENT.as_raw(),
    );

    pub fn new(mvp: &Mat4, alpha_ref: f32) -> Self {
        Self {
            mvp: mvp.to_cols_array(),
            alpha_ref,
            _pad: [0.0; 3],
        }
    }

    pub fn as_bytes(&self) -> &[u8] {
        bytemuck::bytes_of(self)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn vertex_is_nine_floats() {
        assert_eq!(Vertex::SIZE, 36);
        let v = Vertex::new([1.0, 2.0, 3.0], [0.1, 0.2, 0.3, 0.4], [0.5, 0.6]);
        let floats: &[f32] = bytemuck::cast_slice(std::slice::from_ref(&v));
        assert_eq!(floats, &[1.0, 2.0, 3.0, 0.1, 0.2, 0.3, 0.4, 0.5, 0.6]);
    }

    #[test]
    fn attribute_offsets_match_layout() {
        let (bindings, attributes) = vertex_input_description();
        assert_eq!(bindings[0].stride, 36);
        let offsets: Vec<u32> = attributes.iter().map(|a| a.offset).collect();
        assert_eq!(offsets, vec![0, 12, 28]);
    }

    #[test]
    fn push_constants_are_80_bytes() {
        assert_eq!(PushConstants::SIZE, 80);
        let pc = PushConstants::new(&Mat4::IDENTITY, 0.02);
        let bytes = pc.as_bytes();
        assert_eq!(bytes.len(), 80);
        let floats: &[f32] = bytemuck::cast_slice(bytes);
        assert_eq!(floats[0], 1.0);
        assert_eq!(floats[5], 1.0);
        assert_eq!(floats[16], 0.02);
        assert_eq!(&floats[17..], &[0.0, 0.0, 0.0]);
    }

    #[test]
    fn push_constant_stages_cover_both() {
        assert!(PushConstants::STAGES.contains(vk::ShaderStageFlags::VERTEX));
        assert!(PushConstants::STAGES.contains(vk::ShaderStageFlags::FRAGMENT));
    }
}
