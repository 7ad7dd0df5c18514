// =============================================================================
// LEGACY-VK DEMO - Drives the renderer from a winit window
// =============================================================================
//
// Draws a spinning 3D quad with axis lines, a textured 2D quad and a few
// canvas primitives every frame.
//
// KEYS:
//   Esc  quit
//   F11  toggle fullscreen
//   T    swap the demo texture (destroys the old one)
//   B    cycle the overlay blend mode
//
// =============================================================================

use anyhow::Result;
use glam::{Mat4, Vec3};
use legacy_vk::canvas::{Color, WHITE_CORNERS};
use legacy_vk::{BlendMode, Config, Renderer, TextureId, Vertex};
use std::fs::{File, OpenOptions};
use std::io::{self, Write};
use std::sync::Arc;
use std::time::Instant;
use winit::{
    application::ApplicationHandler,
    event::WindowEvent,
    event_loop::{ActiveEventLoop, EventLoop},
    window::{Fullscreen, Window, WindowAttributes},
};

// =============================================================================
// ENTRY POINT
// =============================================================================

fn main() -> Result<()> {
    let config = Config::load();

    init_logging(&config);
    log::info!("Starting legacy-vk demo");
    log::info!(
        "Window: {}x{} ({})",
        config.window.width,
        config.window.height,
        if config.window.fullscreen { "fullscreen" } else { "windowed" }
    );
    log::info!("Present mode: {}", config.renderer.present_mode);

    let event_loop = EventLoop::new()?;
    let mut app = App::new(config);
    event_loop.run_app(&mut app)?;
    Ok(())
}

/// Writes every log line to stderr and to the log file
struct Tee {
    file: File,
}

impl Write for Tee {
    fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
        io::stderr().write_all(buf)?;
        self.file.write_all(buf)?;
        Ok(buf.len())
    }

    fn flush(&mut self) -> io::Result<()> {
        io::stderr().flush()?;
        self.file.flush()
    }
}

/// Initialize logging with optional file output for validation errors
fn init_logging(config: &Config) {
    use env_logger::{Builder, Env, Target};

    let mut builder = Builder::from_env(Env::default().default_filter_or("info"));

    if config.debug.log_to_file {
        let opened = OpenOptions::new()
            .create(true)
            .write(true)
            .truncate(true)
            .open(&config.debug.log_file);

        match opened {
            Ok(mut file) => {
                let _ = writeln!(file, "=== legacy-vk log ===");
                let _ = writeln!(file, "Started: {:?}", std::time::SystemTime::now());
                let _ = writeln!(file);
                builder.target(Target::Pipe(Box::new(Tee { file })));
            }
            Err(e) => eprintln!("Cannot open log file {}: {}", config.debug.log_file, e),
        }
    }

    builder.init();
}

// =============================================================================
// DEMO TEXTURES
// =============================================================================

/// 64x64 black/white checkerboard with 8px squares
fn checker_pixels() -> (u32, u32, Vec<u8>) {
    let (w, h) = (64u32, 64u32);
    let mut rgba = Vec::with_capacity((w * h * 4) as usize);
    for y in 0..h {
        for x in 0..w {
            let v = if ((x / 8) + (y / 8)) % 2 == 0 { 255 } else { 40 };
            rgba.extend_from_slice(&[v, v, v, 255]);
        }
    }
    (w, h, rgba)
}

/// 48x40 vertical color stripes; not a power of two, so it gets padded
fn stripe_pixels() -> (u32, u32, Vec<u8>) {
    let (w, h) = (48u32, 40u32);
    let colors: [[u8; 4]; 3] = [[220, 60, 60, 255], [60, 200, 80, 255], [70, 90, 230, 255]];
    let mut rgba = Vec::with_capacity((w * h * 4) as usize);
    for _ in 0..h {
        for x in 0..w {
            rgba.extend_from_slice(&colors[(x / 16) as usize]);
        }
    }
    (w, h, rgba)
}

// =============================================================================
// APPLICATION STATE
// =============================================================================

/// IMPORTANT: `renderer` is declared before `window` so the surface is
/// destroyed while the window still exists.
struct App {
    renderer: Option<Renderer>,
    window: Option<Arc<Window>>,
    config: Config,

    texture: Option<TextureId>,
    use_stripes: bool,
    overlay_blend: BlendMode,
    is_fullscreen: bool,

    start: Instant,
    frame_count: u32,
    last_fps_update: Instant,
    last_frame_time: Instant,
}

impl App {
    fn new(config: Config) -> Self {
        let is_fullscreen = config.window.fullscreen;
        let now = Instant::now();
        Self {
            renderer: None,
            window: None,
            config,
            texture: None,
            use_stripes: false,
            overlay_blend: BlendMode::AdditiveAlpha,
            is_fullscreen,
            start: now,
            frame_count: 0,
            last_fps_update: now,
            last_frame_time: now,
        }
    }

    fn init_renderer(&mut self, window: &Window) -> Result<()> {
        let size = window.inner_size();
        let mut renderer =
            Renderer::new(window, size.width, size.height, &self.config.renderer)?;
        self.texture = upload_demo_texture(&mut renderer, self.use_stripes);
        self.renderer = Some(renderer);
        Ok(())
    }

    fn swap_texture(&mut self) {
        let Some(renderer) = self.renderer.as_mut() else {
            return;
        };
        if let Some(old) = self.texture.take() {
            renderer.destroy_texture(old);
        }
        self.use_stripes = !self.use_stripes;
        self.texture = upload_demo_texture(renderer, self.use_stripes);
        log::info!("Texture swapped ({} live)", renderer.texture_count());
    }

    fn cycle_overlay_blend(&mut self) {
        self.overlay_blend = match self.overlay_blend {
            BlendMode::Normal => BlendMode::AdditiveAlpha,
            BlendMode::AdditiveAlpha => BlendMode::AdditiveColor,
            BlendMode::AdditiveColor => BlendMode::Normal,
        };
        log::info!("Overlay blend mode: {:?}", self.overlay_blend);
    }

    // =========================================================================
    // RENDER LOOP
    // =========================================================================

    /// Returns false when the frame was skipped
    fn render_frame(&mut self) -> bool {
        let Some(renderer) = self.renderer.as_mut() else {
            return false;
        };
        if !renderer.begin_frame() {
            return false;
        }

        let t = self.start.elapsed().as_secs_f32();
        draw_scene(renderer, self.texture, self.overlay_blend, t);

        renderer.end_frame();
        renderer.present();
        true
    }

    // =========================================================================
    // FULLSCREEN TOGGLE
    // =========================================================================

    fn toggle_fullscreen(&mut self) {
        if let Some(ref window) = self.window {
            self.is_fullscreen = !self.is_fullscreen;

            if self.is_fullscreen {
                window.set_fullscreen(Some(Fullscreen::Borderless(None)));
                log::info!("Entered fullscreen mode");
            } else {
                window.set_fullscreen(None);
                log::info!("Exited fullscreen mode");
            }
        }
    }

    // =========================================================================
    // FPS TRACKING
    // =========================================================================

    fn update_fps(&mut self) {
        if !self.config.debug.show_fps {
            return;
        }

        let now = Instant::now();
        let frame_time = now.duration_since(self.last_frame_time).as_secs_f32();
        self.last_frame_time = now;
        self.frame_count += 1;

        let elapsed = now.duration_since(self.last_fps_update).as_secs_f32();
        if elapsed >= 1.0 {
            let fps = self.frame_count as f32 / elapsed;

            if let Some(ref window) = self.window {
                let mode = if self.is_fullscreen { "fullscreen" } else { "windowed" };
                window.set_title(&format!(
                    "{} - {:.0} FPS ({:.2}ms) [{}]",
                    self.config.window.title,
                    fps,
                    frame_time * 1000.0,
                    mode
                ));
            }

            self.frame_count = 0;
            self.last_fps_update = now;
        }
    }
}

fn upload_demo_texture(renderer: &mut Renderer, stripes: bool) -> Option<TextureId> {
    let (w, h, rgba) = if stripes { stripe_pixels() } else { checker_pixels() };
    renderer.create_texture(w, h, &rgba)
}

fn draw_scene(renderer: &mut Renderer, texture: Option<TextureId>, overlay: BlendMode, t: f32) {
    const ORANGE: Color = [1.0, 0.55, 0.1, 1.0];
    const CYAN: Color = [0.2, 0.9, 1.0, 1.0];
    const GREEN: Color = [0.3, 1.0, 0.3, 1.0];

    // ─────────────────────────────────────────────────────────────────────────
    // 3D: spinning quad and axis lines
    // ─────────────────────────────────────────────────────────────────────────
    renderer.start_3d_pass();
    renderer.set_modelview(
        Mat4::from_translation(Vec3::new(0.0, 0.0, -3.0)) * Mat4::from_rotation_y(t),
    );

    let quad = [
        Vertex::colored([-1.0, -1.0, 0.0], ORANGE),
        Vertex::colored([1.0, -1.0, 0.0], ORANGE),
        Vertex::colored([1.0, 1.0, 0.0], [1.0, 0.9, 0.2, 1.0]),
        Vertex::colored([-1.0, 1.0, 0.0], [1.0, 0.9, 0.2, 1.0]),
    ];
    renderer.draw_triangle_fan(&quad, false, true);

    let axes = [
        Vertex::colored([0.0, 0.0, 0.0], [1.0, 0.0, 0.0, 1.0]),
        Vertex::colored([1.5, 0.0, 0.0], [1.0, 0.0, 0.0, 1.0]),
        Vertex::colored([0.0, 0.0, 0.0], GREEN),
        Vertex::colored([0.0, 1.5, 0.0], GREEN),
        Vertex::colored([0.0, 0.0, 0.0], CYAN),
        Vertex::colored([0.0, 0.0, 1.5], CYAN),
    ];
    renderer.draw_lines(&axes, true);

    // ─────────────────────────────────────────────────────────────────────────
    // 2D: textured quad and canvas primitives
    // ─────────────────────────────────────────────────────────────────────────
    renderer.end_3d_pass();
    let canvas = renderer.canvas();

    if let Some(id) = texture {
        if let Some(info) = renderer.texture_info(id) {
            renderer.bind_texture(Some(id));
            let fan = canvas.bitmap(
                16,
                16,
                info.width * 2,
                info.height * 2,
                (info.u_scale, info.v_scale),
                WHITE_CORNERS,
            );
            renderer.draw_triangle_fan(&fan, true, false);
        }
    }

    renderer.bind_texture(None);
    renderer.draw_triangle_fan(&canvas.rect(16, 180, 143, 195, [0.15, 0.15, 0.6, 1.0]), false, false);

    renderer.set_blend_mode(overlay);
    renderer.draw_triangle_fan(&canvas.rect(80, 40, 239, 159, [0.9, 0.2, 0.6, 0.5]), false, false);
    renderer.set_blend_mode(BlendMode::Normal);

    let extent = renderer.extent();
    let (cx, cy) = (extent.width as i32 / 2, extent.height as i32 / 2);
    renderer.draw_lines(&canvas.reticle(cx, cy, 0.02, GREEN), false);
    renderer.draw_lines(&canvas.line(16, 210, 143, 210, CYAN), false);
}

// =============================================================================
// EVENT HANDLING
// =============================================================================

impl ApplicationHandler for App {
    /// Called when the application is ready to create windows.
    fn resumed(&mut self, event_loop: &ActiveEventLoop) {
        if self.window.is_some() {
            return;
        }

        let mut window_attributes = WindowAttributes::default()
            .with_title(&self.config.window.title)
            .with_inner_size(winit::dpi::PhysicalSize::new(
                self.config.window.width,
                self.config.window.height,
            ));

        if self.config.window.fullscreen {
            window_attributes =
                window_attributes.with_fullscreen(Some(Fullscreen::Borderless(None)));
        }

        let window = match event_loop.create_window(window_attributes) {
            Ok(w) => Arc::new(w),
            Err(e) => {
                log::error!("Failed to create window: {:?}", e);
                event_loop.exit();
                return;
            }
        };

        if let Err(e) = self.init_renderer(&window) {
            log::error!("Failed to initialize renderer: {:?}", e);
            event_loop.exit();
            return;
        }

        self.window = Some(window);
    }

    fn window_event(
        &mut self,
        event_loop: &ActiveEventLoop,
        _id: winit::window::WindowId,
        event: WindowEvent,
    ) {
        match event {
            WindowEvent::CloseRequested => {
                log::info!("Close requested, shutting down...");
                if let Some(renderer) = self.renderer.take() {
                    renderer.shutdown();
                }
                event_loop.exit();
            }

            WindowEvent::Resized(size) => {
                log::debug!("Window resized to {}x{}", size.width, size.height);
                if let Some(renderer) = self.renderer.as_mut() {
                    if let Err(e) = renderer.recreate_swapchain(size.width, size.height) {
                        log::error!("Swapchain recreation failed: {:#}", e);
                    }
                }
            }

            WindowEvent::RedrawRequested => {
                if self.render_frame() {
                    self.update_fps();
                }
            }

            WindowEvent::KeyboardInput { event, .. } => {
                use winit::keyboard::{KeyCode, PhysicalKey};

                if event.state.is_pressed() && !event.repeat {
                    if let PhysicalKey::Code(key) = event.physical_key {
                        match key {
                            KeyCode::Escape => {
                                log::info!("ESC pressed, exiting...");
                                event_loop.exit();
                            }
                            KeyCode::F11 => self.toggle_fullscreen(),
                            KeyCode::KeyT => self.swap_texture(),
                            KeyCode::KeyB => self.cycle_overlay_blend(),
                            _ => {}
                        }
                    }
                }
            }

            _ => {}
        }
    }

    /// Request continuous redraws
    fn about_to_wait(&mut self, _event_loop: &ActiveEventLoop) {
        if let Some(ref window) = self.window {
            window.request_redraw();
        }
    }
}
