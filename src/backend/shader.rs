// Shader module loading
//
// Vulkan consumes SPIR-V bytecode. The build script compiles shaders/ into
// OUT_DIR; a configured override directory takes precedence at runtime.

use anyhow::{Context, Result};
use ash::vk;
use std::io::Cursor;
use std::path::Path;
use std::sync::Arc;
use super::VulkanDevice;

static EMBEDDED_VERT: &[u8] = include_bytes!(concat!(env!("OUT_DIR"), "/legacy.vert.spv"));
static EMBEDDED_FRAG: &[u8] = include_bytes!(concat!(env!("OUT_DIR"), "/legacy.frag.spv"));

/// SPIR-V words for the vertex and fragment stage
pub struct ShaderCode {
    pub vertex: Vec<u32>,
    pub fragment: Vec<u32>,
}

impl ShaderCode {
    /// Load from `dir` when given, otherwise use the shaders embedded at build time
    pub fn load(dir: Option<&Path>) -> Result<Self> {
        match dir {
            Some(dir) => {
                log::info!("Loading shaders from {}", dir.display());
                let vertex = std::fs::read(dir.join("legacy.vert.spv"))
                    .with_context(|| format!("Failed to read legacy.vert.spv from {}", dir.display()))?;
                let fragment = std::fs::read(dir.join("legacy.frag.spv"))
                    .with_context(|| format!("Failed to read legacy.frag.spv from {}", dir.display()))?;
                Ok(Self {
                    vertex: parse_spirv("legacy.vert.spv", &vertex)?,
                    fragment: parse_spirv("legacy.frag.spv", &fragment)?,
                })
            }
            None => Ok(Self {
                vertex: parse_spirv("legacy.vert.spv", EMBEDDED_VERT)?,
                fragment: parse_spirv("legacy.frag.spv", EMBEDDED_FRAG)?,
            }),
        }
    }
}

/// Decode SPIR-V bytes into words (checks alignment and magic number)
pub fn parse_spirv(name: &str, bytes: &[u8]) -> Result<Vec<u32>> {
    if bytes.is_empty() {
        anyhow::bail!(
            "Shader {name} is empty: glslc was not available at build time. \
             Install the Vulkan SDK or set renderer.shader_dir"
        );
    }
    ash::util::read_spv(&mut Cursor::new(bytes))
        .with_context(|| format!("Shader {name} is not valid SPIR-V"))
}

/// A shader module destroyed on drop. Only needed until the pipelines are built.
pub struct ShaderModule {
    pub module: vk::ShaderModule,
    device: Arc<VulkanDevice>,
}

impl ShaderModule {
    pub fn new(device: Arc<VulkanDevice>, code: &[u32]) -> Result<Self> {
        let create_info = vk::ShaderModuleCreateInfo::default().code(code);

        let module = unsafe {
            device.device.create_shader_module(&create_info, None)
        }
        .context("Failed to create shader module")?;

        Ok(Self { module, device })
    }
}

impl Drop for ShaderModule {
    fn drop(&mut self) {
        unsafe {
            self.device.device.destroy_shader_module(self.module, None);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn empty_blob_is_rejected_with_hint() {
        let err = parse_spirv("legacy.vert.spv", &[]).unwrap_err();
        assert!(err.to_string().contains("shader_dir"));
    }

    #[test]
    fn wrong_magic_is_rejected() {
        assert!(parse_spirv("bad.spv", &[1, 2, 3, 4, 5, 6, 7, 8]).is_err());
    }

    #[test]
    fn valid_header_decodes_to_words() {
        let mut bytes = Vec::new();
        for word in [0x0723_0203u32, 0x0001_0000, 0, 1, 0] {
            bytes.extend_from_slice(&word.to_le_bytes());
        }
        let words = parse_spirv("min.spv", &bytes).unwrap();
        assert_eq!(words.len(), 5);
        assert_eq!(words[0], 0x0723_0203);
    }

    #[test]
    fn missing_override_dir_is_an_error() {
        let dir = Path::new("/nonexistent/legacy-vk-shaders");
        assert!(ShaderCode::load(Some(dir)).is_err());
    }
}
