// Immediate-Mode Draw Emitter
//
// Each legacy draw call becomes: vertices copied into the frame's ring buffer,
// then bind pipeline, viewport/scissor, push constants, texture set, vertex
// buffer at the ring offset, draw.

use ash::vk;

use crate::backend::command::CommandRecorder;
use crate::frame::RingCursor;
use crate::vertex::{PushConstants, Vertex};

/// Expand a triangle fan into a list with a fixed apex:
/// `{v0,v1,v2}, {v0,v2,v3}, ...`.
///
/// `out` is cleared first. Fans of fewer than 3 vertices produce nothing.
/// Returns the number of triangles written.
pub fn fan_to_list(fan: &[Vertex], out: &mut Vec<Vertex>) -> usize {
    out.clear();
    if fan.len() < 3 {
        return 0;
    }
    let triangles = fan.len() - 2;
    out.reserve(triangles * 3);
    for pair in fan[1..].windows(2) {
        out.push(fan[0]);
        out.push(pair[0]);
        out.push(pair[1]);
    }
    triangles
}

/// The frame's vertex ring: its buffer handle, cursor and mapped bytes
pub struct RingWriter<'a> {
    pub buffer: vk::Buffer,
    pub cursor: &'a mut RingCursor,
    pub memory: &'a mut [u8],
}

impl RingWriter<'_> {
    /// Copy `vertices` at the cursor, returning their byte offset.
    /// `None` (cursor untouched) if they do not fit.
    pub fn write(&mut self, vertices: &[Vertex]) -> Option<vk::DeviceSize> {
        let bytes: &[u8] = bytemuck::cast_slice(vertices);
        let start = self.cursor.try_reserve(bytes.len() as u64)?;
        let start_index = start as usize;
        self.memory[start_index..start_index + bytes.len()].copy_from_slice(bytes);
        Some(start)
    }
}

/// Everything a draw binds besides its vertices
#[derive(Debug, Clone, Copy)]
pub struct DrawState {
    pub pipeline: vk::Pipeline,
    pub layout: vk::PipelineLayout,
    pub extent: vk::Extent2D,
    pub descriptor_set: vk::DescriptorSet,
    pub push_constants: PushConstants,
}

/// Record one draw of `vertices` (already a list, not a fan).
///
/// Returns false and records nothing when the list is empty or the ring has no
/// room left this frame.
pub fn emit(
    recorder: &mut impl CommandRecorder,
    ring: &mut RingWriter<'_>,
    state: &DrawState,
    vertices: &[Vertex],
) -> bool {
    if vertices.is_empty() {
        return false;
    }

    let Some(offset) = ring.write(vertices) else {
        log::warn!(
            "Vertex ring full ({} of {} bytes used), dropping draw of {} vertices",
            ring.cursor.offset(),
            ring.cursor.capacity(),
            vertices.len()
        );
        return false;
    };

    recorder.bind_pipeline(state.pipeline);
    recorder.set_viewport_and_scissor(state.extent);
    recorder.push_constants(state.layout, &state.push_constants);
    recorder.bind_descriptor_set(state.layout, state.descriptor_set);
    recorder.bind_vertex_buffer(ring.buffer, offset);
    recorder.draw(vertices.len() as u32);
    true
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::backend::pipeline::{BlendMode, PipelineKey, PipelineTable, PrimitiveKind};
    use crate::texture::TextureSet;
    use crate::transform::TransformState;
    use ash::vk::Handle;

    #[derive(Debug, Clone, PartialEq)]
    enum Recorded {
        BindPipeline(vk::Pipeline),
        ViewportScissor(vk::Extent2D),
        PushConstants(PushConstants),
        BindDescriptorSet(vk::DescriptorSet),
        BindVertexBuffer(vk::Buffer, vk::DeviceSize),
        Draw(u32),
    }

    #[derive(Default)]
    struct LogRecorder {
        commands: Vec<Recorded>,
    }

    impl LogRecorder {
        fn draws(&self) -> Vec<u32> {
            self.commands
                .iter()
                .filter_map(|c| match c {
                    Recorded::Draw(n) => Some(*n),
                    _ => None,
                })
                .collect()
        }

        fn pipelines(&self) -> Vec<vk::Pipeline> {
            self.commands
                .iter()
                .filter_map(|c| match c {
                    Recorded::BindPipeline(p) => Some(*p),
                    _ => None,
                })
                .collect()
        }

        fn descriptor_sets(&self) -> Vec<vk::DescriptorSet> {
            self.commands
                .iter()
                .filter_map(|c| match c {
                    Recorded::BindDescriptorSet(s) => Some(*s),
                    _ => None,
                })
                .collect()
        }
    }

    impl CommandRecorder for LogRecorder {
        fn bind_pipeline(&mut self, pipeline: vk::Pipeline) {
            self.commands.push(Recorded::BindPipeline(pipeline));
        }
        fn set_viewport_and_scissor(&mut self, extent: vk::Extent2D) {
            self.commands.push(Recorded::ViewportScissor(extent));
        }
        fn push_constants(&mut self, _layout: vk::PipelineLayout, constants: &PushConstants) {
            self.commands.push(Recorded::PushConstants(*constants));
        }
        fn bind_descriptor_set(&mut self, _layout: vk::PipelineLayout, set: vk::DescriptorSet) {
            self.commands.push(Recorded::BindDescriptorSet(set));
        }
        fn bind_vertex_buffer(&mut self, buffer: vk::Buffer, offset: vk::DeviceSize) {
            self.commands.push(Recorded::BindVertexBuffer(buffer, offset));
        }
        fn draw(&mut self, vertex_count: u32) {
            self.commands.push(Recorded::Draw(vertex_count));
        }
    }

    fn numbered(count: usize) -> Vec<Vertex> {
        (0..count)
            .map(|i| Vertex::colored([i as f32, 0.0, 0.0], [1.0; 4]))
            .collect()
    }

    fn fake_table() -> PipelineTable {
        let mut table = PipelineTable::empty();
        for (i, key) in PipelineKey::all().enumerate() {
            table.set(key, vk::Pipeline::from_raw(0x100 + i as u64));
        }
        table
    }

    fn state(pipeline: vk::Pipeline, set: vk::DescriptorSet) -> DrawState {
        DrawState {
            pipeline,
            layout: vk::PipelineLayout::from_raw(0x10),
            extent: vk::Extent2D { width: 800, height: 600 },
            descriptor_set: set,
            push_constants: PushConstants::new(&glam::Mat4::IDENTITY, 0.02),
        }
    }

    #[test]
    fn fan_expands_with_fixed_apex() {
        let fan = numbered(5);
        let mut list = Vec::new();
        assert_eq!(fan_to_list(&fan, &mut list), 3);
        let xs: Vec<f32> = list.iter().map(|v| v.position[0]).collect();
        assert_eq!(xs, vec![0.0, 1.0, 2.0, 0.0, 2.0, 3.0, 0.0, 3.0, 4.0]);
    }

    #[test]
    fn fan_triangle_count_for_all_sizes() {
        let mut list = Vec::new();
        for count in 0..20 {
            let triangles = fan_to_list(&numbered(count), &mut list);
            let expected = count.saturating_sub(2);
            assert_eq!(triangles, expected, "fan of {count}");
            assert_eq!(list.len(), expected * 3);
        }
    }

    #[test]
    fn short_fan_clears_previous_output() {
        let mut list = numbered(6);
        assert_eq!(fan_to_list(&numbered(2), &mut list), 0);
        assert!(list.is_empty());
    }

    #[test]
    fn emit_records_commands_in_order() {
        let mut cursor = RingCursor::new(1024);
        let mut memory = vec![0u8; 1024];
        let buffer = vk::Buffer::from_raw(0x42);
        let mut ring = RingWriter { buffer, cursor: &mut cursor, memory: &mut memory };
        let mut recorder = LogRecorder::default();
        let draw = state(vk::Pipeline::from_raw(7), vk::DescriptorSet::from_raw(9));

        let vertices = numbered(3);
        assert!(emit(&mut recorder, &mut ring, &draw, &vertices));
        assert!(emit(&mut recorder, &mut ring, &draw, &vertices));

        assert_eq!(recorder.commands.len(), 12);
        assert_eq!(recorder.commands[0], Recorded::BindPipeline(vk::Pipeline::from_raw(7)));
        assert_eq!(
            recorder.commands[1],
            Recorded::ViewportScissor(vk::Extent2D { width: 800, height: 600 })
        );
        assert_eq!(recorder.commands[2], Recorded::PushConstants(draw.push_constants));
        assert_eq!(recorder.commands[3], Recorded::BindDescriptorSet(vk::DescriptorSet::from_raw(9)));
        assert_eq!(recorder.commands[4], Recorded::BindVertexBuffer(buffer, 0));
        assert_eq!(recorder.commands[5], Recorded::Draw(3));
        // Second draw starts where the first ended
        assert_eq!(recorder.commands[10], Recorded::BindVertexBuffer(buffer, 108));
        assert_eq!(cursor.offset(), 216);

        // Bytes landed in the ring
        let floats: &[f32] = bytemuck::cast_slice(&memory[..216]);
        assert_eq!(floats[9], 1.0);
    }

    #[test]
    fn draw_that_does_not_fit_is_dropped() {
        let capacity = 100u64;
        let mut cursor = RingCursor::new(capacity);
        let mut memory = vec![0u8; capacity as usize];
        let mut ring = RingWriter {
            buffer: vk::Buffer::from_raw(1),
            cursor: &mut cursor,
            memory: &mut memory,
        };
        let mut recorder = LogRecorder::default();
        let draw = state(vk::Pipeline::from_raw(7), vk::DescriptorSet::from_raw(9));

        // 2 vertices = 72 bytes fit, 1 more = 36 does not (28 left)
        assert!(emit(&mut recorder, &mut ring, &draw, &numbered(2)));
        assert!(!emit(&mut recorder, &mut ring, &draw, &numbered(1)));
        assert_eq!(recorder.draws(), vec![2]);
        assert_eq!(cursor.offset(), 72);
    }

    #[test]
    fn empty_draw_records_nothing() {
        let mut cursor = RingCursor::new(64);
        let mut memory = vec![0u8; 64];
        let mut ring = RingWriter {
            buffer: vk::Buffer::from_raw(1),
            cursor: &mut cursor,
            memory: &mut memory,
        };
        let mut recorder = LogRecorder::default();
        let draw = state(vk::Pipeline::from_raw(7), vk::DescriptorSet::from_raw(9));
        assert!(!emit(&mut recorder, &mut ring, &draw, &[]));
        assert!(recorder.commands.is_empty());
    }

    #[test]
    fn unbound_and_destroyed_textures_draw_with_white() {
        let white = vk::DescriptorSet::from_raw(0xFFFF);
        let mut textures = TextureSet::default();
        let tex = textures.insert(vk::DescriptorSet::from_raw(0x64));

        let bound_set = |textures: &TextureSet<vk::DescriptorSet>| {
            *textures.bound_value().unwrap_or(&white)
        };

        let mut cursor = RingCursor::new(4096);
        let mut memory = vec![0u8; 4096];
        let mut ring = RingWriter {
            buffer: vk::Buffer::from_raw(1),
            cursor: &mut cursor,
            memory: &mut memory,
        };
        let mut recorder = LogRecorder::default();
        let pipeline = vk::Pipeline::from_raw(7);

        emit(&mut recorder, &mut ring, &state(pipeline, bound_set(&textures)), &numbered(3));
        textures.bind(Some(tex));
        emit(&mut recorder, &mut ring, &state(pipeline, bound_set(&textures)), &numbered(3));

        // Destroyed while bound
        textures.remove(tex, Some(0));
        emit(&mut recorder, &mut ring, &state(pipeline, bound_set(&textures)), &numbered(3));

        // Binding the destroyed id again
        textures.bind(Some(tex));
        emit(&mut recorder, &mut ring, &state(pipeline, bound_set(&textures)), &numbered(3));

        assert_eq!(
            recorder.descriptor_sets(),
            vec![white, vk::DescriptorSet::from_raw(0x64), white, white]
        );
    }

    #[test]
    fn quad_3d_then_textured_quad_2d() {
        let table = fake_table();
        let white = vk::DescriptorSet::from_raw(0xFFFF);
        let mut textures = TextureSet::default();
        let texture_64 = textures.insert(vk::DescriptorSet::from_raw(0x64));

        let extent = vk::Extent2D { width: 800, height: 600 };
        let mut transform = TransformState::default();
        let mut cursor = RingCursor::new(4 * 1024 * 1024);
        let mut memory = vec![0u8; cursor.capacity() as usize];
        let mut recorder = LogRecorder::default();
        let mut scratch = Vec::new();

        let quad = |z: f32| {
            vec![
                Vertex::new([0.0, 0.0, z], [1.0; 4], [0.0, 0.0]),
                Vertex::new([1.0, 0.0, z], [1.0; 4], [1.0, 0.0]),
                Vertex::new([1.0, 1.0, z], [1.0; 4], [1.0, 1.0]),
                Vertex::new([0.0, 1.0, z], [1.0; 4], [0.0, 1.0]),
            ]
        };

        {
            let mut ring = RingWriter {
                buffer: vk::Buffer::from_raw(1),
                cursor: &mut cursor,
                memory: &mut memory,
            };

            // Opaque flat 3D quad, nothing bound
            transform.start_3d_pass();
            fan_to_list(&quad(-2.0), &mut scratch);
            let flat = DrawState {
                pipeline: table.get(PipelineKey::new(
                    PrimitiveKind::triangles(false, true),
                    BlendMode::Normal,
                )),
                layout: vk::PipelineLayout::from_raw(0x10),
                extent,
                descriptor_set: *textures.bound_value().unwrap_or(&white),
                push_constants: PushConstants::new(transform.mvp(), 0.02),
            };
            assert!(emit(&mut recorder, &mut ring, &flat, &scratch));

            // Textured 2D quad with the 64x64 texture bound
            transform.end_3d_pass();
            textures.bind(Some(texture_64));
            fan_to_list(&quad(0.0), &mut scratch);
            let textured = DrawState {
                pipeline: table.get(PipelineKey::new(
                    PrimitiveKind::triangles(true, false),
                    BlendMode::Normal,
                )),
                layout: vk::PipelineLayout::from_raw(0x10),
                extent,
                descriptor_set: *textures.bound_value().unwrap_or(&white),
                push_constants: PushConstants::new(transform.mvp(), 0.02),
            };
            assert!(emit(&mut recorder, &mut ring, &textured, &scratch));
        }

        assert_eq!(recorder.draws(), vec![6, 6]);
        let pipelines = recorder.pipelines();
        assert_eq!(
            pipelines,
            vec![
                table.get(PipelineKey::new(PrimitiveKind::Flat3d, BlendMode::Normal)),
                table.get(PipelineKey::new(PrimitiveKind::Textured2d, BlendMode::Normal)),
            ]
        );
        assert_ne!(pipelines[0], pipelines[1]);
        assert_eq!(recorder.descriptor_sets(), vec![white, vk::DescriptorSet::from_raw(0x64)]);
        assert_eq!(cursor.offset(), 432);
    }
}
