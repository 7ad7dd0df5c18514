// =============================================================================
// LEGACY-VK - Immediate-mode drawing on top of Vulkan
// =============================================================================
//
// ARCHITECTURE OVERVIEW:
// ┌─────────────────────────────────────────────────────────────────┐
// │  Game / UI code (draw_triangles, draw_lines, bind_texture, ...) │
// │    └── Renderer (frame scheduler, blend mode, transforms)       │
// │          ├── Draw emitter (fan expansion, vertex ring)          │
// │          ├── Texture manager (uploads, white fallback)          │
// │          └── backend: device, swapchain, pipelines, sync        │
// └─────────────────────────────────────────────────────────────────┘
//
// =============================================================================

pub mod backend;
pub mod canvas;
pub mod config;
pub mod draw;
pub mod frame;
pub mod renderer;
pub mod texture;
pub mod transform;
pub mod vertex;

pub use backend::pipeline::{BlendMode, PipelineKey, PrimitiveKind};
pub use canvas::{Canvas, Color};
pub use config::{Config, RendererConfig};
pub use renderer::Renderer;
pub use texture::{TextureId, TextureInfo};
pub use transform::TransformState;
pub use vertex::Vertex;
