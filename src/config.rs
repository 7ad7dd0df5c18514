// =============================================================================
// CONFIGURATION - Load settings from config.toml
// =============================================================================
//
// Every section has defaults, so a missing file or missing keys are fine.
// `RendererConfig` is also what library users hand to `Renderer::new`.

use anyhow::{Context, Result};
use ash::vk;
use serde::Deserialize;
use std::path::{Path, PathBuf};

use crate::backend::descriptor::MIN_TEXTURE_SETS;
use crate::transform::{Projection3d, DEFAULT_FAR, DEFAULT_FOV_Y_DEGREES, DEFAULT_NEAR};
use crate::vertex::Vertex;

/// Root configuration structure
#[derive(Debug, Clone, Deserialize, Default)]
#[serde(default)]
pub struct Config {
    pub window: WindowConfig,
    pub renderer: RendererConfig,
    pub debug: DebugConfig,
}

/// Window settings
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct WindowConfig {
    pub title: String,
    pub width: u32,
    pub height: u32,
    pub fullscreen: bool,
}

impl Default for WindowConfig {
    fn default() -> Self {
        Self {
            title: "legacy-vk".to_string(),
            width: 800,
            height: 600,
            fullscreen: false,
        }
    }
}

/// Renderer settings
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct RendererConfig {
    pub app_name: String,
    /// Only honored in debug builds
    pub validation_layers: bool,
    /// fifo, mailbox, immediate or fifo_relaxed
    pub present_mode: String,
    /// Bytes of vertex data each frame may emit (raised to at least one vertex)
    pub vertex_ring_size: u64,
    /// Descriptor pool capacity (raised to at least 1024)
    pub max_textures: u32,
    pub alpha_ref: f32,
    pub fov_y_degrees: f32,
    pub near_plane: f32,
    pub far_plane: f32,
    /// Directory with legacy.vert.spv / legacy.frag.spv overriding the built-in shaders
    pub shader_dir: Option<PathBuf>,
}

impl Default for RendererConfig {
    fn default() -> Self {
        Self {
            app_name: "legacy-vk".to_string(),
            validation_layers: true,
            present_mode: "fifo".to_string(),
            vertex_ring_size: 4 * 1024 * 1024,
            max_textures: MIN_TEXTURE_SETS,
            alpha_ref: 0.02,
            fov_y_degrees: DEFAULT_FOV_Y_DEGREES,
            near_plane: DEFAULT_NEAR,
            far_plane: DEFAULT_FAR,
            shader_dir: None,
        }
    }
}

impl RendererConfig {
    /// Get present mode as Vulkan enum
    pub fn present_mode(&self) -> vk::PresentModeKHR {
        match self.present_mode.to_lowercase().as_str() {
            "immediate" => vk::PresentModeKHR::IMMEDIATE,
            "mailbox" => vk::PresentModeKHR::MAILBOX,
            "fifo" => vk::PresentModeKHR::FIFO,
            "fifo_relaxed" => vk::PresentModeKHR::FIFO_RELAXED,
            _ => {
                log::warn!("Unknown present mode '{}', defaulting to FIFO", self.present_mode);
                vk::PresentModeKHR::FIFO
            }
        }
    }

    pub fn max_textures(&self) -> u32 {
        self.max_textures.max(MIN_TEXTURE_SETS)
    }

    /// Vertex ring capacity; a Vulkan buffer cannot be empty
    pub fn vertex_ring_size(&self) -> u64 {
        self.vertex_ring_size.max(Vertex::SIZE as u64)
    }

    /// Validation is never enabled in release builds
    pub fn validation_enabled(&self) -> bool {
        self.validation_layers && cfg!(debug_assertions)
    }

    pub fn projection_3d(&self) -> Projection3d {
        Projection3d {
            fov_y_degrees: self.fov_y_degrees,
            near: self.near_plane,
            far: self.far_plane,
            ..Projection3d::default()
        }
    }
}

/// Debug settings
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct DebugConfig {
    pub log_to_file: bool,
    pub log_file: String,
    pub show_fps: bool,
}

impl Default for DebugConfig {
    fn default() -> Self {
        Self {
            log_to_file: false,
            log_file: "legacy_vk.log".to_string(),
            show_fps: true,
        }
    }
}

impl Config {
    /// Load configuration from file, falling back to defaults if not found
    pub fn load() -> Self {
        Self::load_from_path("config.toml").unwrap_or_else(|e| {
            log::warn!("Failed to load config.toml: {:#}. Using defaults.", e);
            Config::default()
        })
    }

    /// Load configuration from a specific path
    pub fn load_from_path<P: AsRef<Path>>(path: P) -> Result<Self> {
        let path = path.as_ref();

        if !path.exists() {
            log::info!("Config file not found at {:?}, using defaults", path);
            return Ok(Config::default());
        }

        let content = std::fs::read_to_string(path)
            .with_context(|| format!("Failed to read config file: {:?}", path))?;

        let config = Self::parse(&content)
            .with_context(|| format!("Failed to parse config file: {:?}", path))?;

        log::info!("Loaded configuration from {:?}", path);
        log::debug!("Config: {:?}", config);

        Ok(config)
    }

    pub fn parse(content: &str) -> Result<Self> {
        Ok(toml::from_str(content)?)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn empty_file_gives_defaults() {
        let config = Config::parse("").unwrap();
        assert_eq!(config.window.width, 800);
        assert_eq!(config.window.height, 600);
        assert_eq!(config.renderer.vertex_ring_size, 4 * 1024 * 1024);
        assert_eq!(config.renderer.max_textures(), 1024);
        assert_eq!(config.renderer.alpha_ref, 0.02);
        assert_eq!(config.renderer.present_mode(), vk::PresentModeKHR::FIFO);
        assert!(config.renderer.shader_dir.is_none());
        assert!(!config.debug.log_to_file);
    }

    #[test]
    fn partial_sections_keep_other_defaults() {
        let config = Config::parse(
            r#"
            [window]
            title = "Demo"
            width = 1024

            [renderer]
            present_mode = "Mailbox"
            vertex_ring_size = 65536
            shader_dir = "prebuilt/spv"
            "#,
        )
        .unwrap();

        assert_eq!(config.window.title, "Demo");
        assert_eq!(config.window.width, 1024);
        assert_eq!(config.window.height, 600);
        assert_eq!(config.renderer.present_mode(), vk::PresentModeKHR::MAILBOX);
        assert_eq!(config.renderer.vertex_ring_size, 65536);
        assert_eq!(config.renderer.shader_dir, Some(PathBuf::from("prebuilt/spv")));
        assert_eq!(config.renderer.far_plane, 5000.0);
    }

    #[test]
    fn texture_capacity_is_clamped_up() {
        let config = Config::parse("[renderer]\nmax_textures = 16\n").unwrap();
        assert_eq!(config.renderer.max_textures, 16);
        assert_eq!(config.renderer.max_textures(), 1024);

        let config = Config::parse("[renderer]\nmax_textures = 4096\n").unwrap();
        assert_eq!(config.renderer.max_textures(), 4096);
    }

    #[test]
    fn vertex_ring_holds_at_least_one_vertex() {
        let config = Config::parse("[renderer]\nvertex_ring_size = 0\n").unwrap();
        assert_eq!(config.renderer.vertex_ring_size(), 36);

        let config = Config::parse("[renderer]\nvertex_ring_size = 65536\n").unwrap();
        assert_eq!(config.renderer.vertex_ring_size(), 65536);
    }

    #[test]
    fn unknown_present_mode_falls_back_to_fifo() {
        let config = Config::parse("[renderer]\npresent_mode = \"vsync-please\"\n").unwrap();
        assert_eq!(config.renderer.present_mode(), vk::PresentModeKHR::FIFO);
    }

    #[test]
    fn projection_comes_from_renderer_section() {
        let config = Config::parse("[renderer]\nfov_y_degrees = 60.0\nnear_plane = 1.0\n").unwrap();
        let projection = config.renderer.projection_3d();
        assert_eq!(projection.fov_y_degrees, 60.0);
        assert_eq!(projection.near, 1.0);
        assert_eq!(projection.far, 5000.0);
        assert_eq!(projection.aspect, 1.0);
    }

    #[test]
    fn malformed_toml_is_an_error() {
        assert!(Config::parse("[window\nwidth = ").is_err());
        assert!(Config::parse("[window]\nwidth = \"wide\"\n").is_err());
    }

    #[test]
    fn missing_file_gives_defaults() {
        let config = Config::load_from_path("/nonexistent/legacy-vk/config.toml").unwrap();
        assert_eq!(config.window.title, "legacy-vk");
    }
}
