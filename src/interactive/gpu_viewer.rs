//! Windowed viewer that presents pipeline frames through wgpu + winit

use std::sync::Arc;
use std::time::Instant;
use winit::{
    application::ApplicationHandler,
    event::{ElementState, KeyEvent, WindowEvent},
    event_loop::{ActiveEventLoop, ControlFlow, EventLoop},
    keyboard::{KeyCode, PhysicalKey},
    window::{Window, WindowId},
};

use crate::environment::{Environment, ParameterProvider, Weather};
use crate::gpu::{GpuContext, GpuError, PresentPipeline};
use crate::params::Preset;
use crate::pipeline::{FrameInput, Pipeline};
use crate::render::write_rgba8;
use crate::scene::{Scene, ViewState};

/// Configuration for the GPU viewer
#[derive(Debug, Clone)]
pub struct GpuViewerConfig {
    pub preset: Preset,
    /// Window pixels per rendered pixel; the pipeline renders at
    /// window size / scale and follows window resizes
    pub scale: u32,
    pub time_scale: f32,
    pub title: String,
}

impl Default for GpuViewerConfig {
    fn default() -> Self {
        Self {
            preset: Preset::default(),
            scale: 4,
            time_scale: 20.0,
            title: "neon_post - GPU Viewer (ESC to exit)".to_string(),
        }
    }
}

struct ViewerState {
    gpu_ctx: GpuContext,
    present: PresentPipeline,
    pipeline: Pipeline,
    environment: Environment,
    scene: Scene,
    view: ViewState,
    pixel_buffer: Vec<u8>, // RGBA8 for GPU upload
    scale: u32,
    time_scale: f32,
    paused: bool,
    last_frame: Instant,
}

#[derive(Debug, thiserror::Error)]
enum StateError {
    #[error(transparent)]
    Gpu(#[from] GpuError),

    #[error(transparent)]
    Config(#[from] crate::error::ConfigError),
}

impl ViewerState {
    fn new(window: Arc<Window>, config: &GpuViewerConfig) -> Result<Self, StateError> {
        let gpu_ctx = GpuContext::new(window)?;
        let present = PresentPipeline::new(&gpu_ctx);

        let scale = config.scale.max(1);
        let (w, h) = render_size(gpu_ctx.size, scale);
        let mut preset = config.preset;
        preset.config.width = w;
        preset.config.height = h;
        let pipeline = Pipeline::from_preset(&preset)?;

        Ok(Self {
            gpu_ctx,
            present,
            pipeline,
            environment: Environment::new(config.preset.params).at_time_of_day(0.3),
            scene: Scene::demo(),
            view: ViewState::demo(w as f32 / h as f32),
            pixel_buffer: Vec::new(),
            scale,
            time_scale: config.time_scale,
            paused: false,
            last_frame: Instant::now(),
        })
    }

    fn resize(&mut self, size: (u32, u32)) {
        self.gpu_ctx.resize(size);
        let (w, h) = render_size(self.gpu_ctx.size, self.scale);
        match self.pipeline.resize(w, h) {
            Ok(()) => self.view = ViewState::demo(w as f32 / h as f32),
            Err(e) => log::error!("resize to {}x{} failed: {}", w, h, e),
        }
    }

    fn update_and_render(&mut self) {
        let now = Instant::now();
        let dt = now.duration_since(self.last_frame).as_secs_f32();
        self.last_frame = now;
        if !self.paused {
            self.environment.advance(dt * self.time_scale);
        }

        let frame = FrameInput {
            params: self.environment.parameters(),
            view: self.view,
            scene: &self.scene,
        };
        let Some(image) = self.pipeline.execute(&frame) else {
            log::warn!("no frame produced");
            return;
        };
        write_rgba8(image, &mut self.pixel_buffer);
        let (w, h) = image.dimensions();

        self.present.update_texture(&self.gpu_ctx, w, h, &self.pixel_buffer);

        match self.present.render(&self.gpu_ctx) {
            Ok(()) => {}
            Err(wgpu::SurfaceError::Lost | wgpu::SurfaceError::Outdated) => self.gpu_ctx.reconfigure(),
            Err(e) => log::error!("Render error: {:?}", e),
        }
    }
}

/// Pipeline resolution for a window size
fn render_size(window: (u32, u32), scale: u32) -> (u32, u32) {
    ((window.0 / scale).max(1), (window.1 / scale).max(1))
}

/// Application handler for winit event loop
struct GpuViewerApp {
    config: GpuViewerConfig,
    state: Option<ViewerState>,
}

impl GpuViewerApp {
    fn new(config: GpuViewerConfig) -> Self {
        Self { config, state: None }
    }
}

impl ApplicationHandler for GpuViewerApp {
    fn resumed(&mut self, event_loop: &ActiveEventLoop) {
        if self.state.is_some() {
            return;
        }

        let (w, h) = (self.config.preset.config.width, self.config.preset.config.height);
        let scale = self.config.scale.max(1);
        let window_attrs = Window::default_attributes()
            .with_title(&self.config.title)
            .with_inner_size(winit::dpi::PhysicalSize::new(w * scale, h * scale));

        let window = match event_loop.create_window(window_attrs) {
            Ok(window) => Arc::new(window),
            Err(e) => {
                log::error!("Failed to create window: {}", e);
                event_loop.exit();
                return;
            }
        };

        match ViewerState::new(window, &self.config) {
            Ok(state) => {
                println!("=== neon_post GPU Viewer ===");
                println!("Controls:");
                println!("  Space      - Pause/resume the clock");
                println!("  1-7        - Weather: Clear/Cloudy/Rainy/Stormy/Snowy/Foggy/Windy");
                println!("  B / O / S  - Toggle bloom / outlines / spiral");
                println!("  N          - Jump to midnight, D to noon");
                println!("  ESC        - Exit");
                println!();

                self.state = Some(state);
            }
            Err(e) => {
                log::error!("Failed to create viewer state: {}", e);
                event_loop.exit();
            }
        }
    }

    fn window_event(&mut self, event_loop: &ActiveEventLoop, _id: WindowId, event: WindowEvent) {
        let state = match &mut self.state {
            Some(s) => s,
            None => return,
        };

        match event {
            WindowEvent::CloseRequested => {
                event_loop.exit();
            }

            WindowEvent::Resized(size) => {
                state.resize((size.width, size.height));
            }

            WindowEvent::KeyboardInput {
                event: KeyEvent {
                    physical_key: PhysicalKey::Code(key),
                    state: ElementState::Pressed,
                    ..
                },
                ..
            } => {
                let digits = [
                    KeyCode::Digit1,
                    KeyCode::Digit2,
                    KeyCode::Digit3,
                    KeyCode::Digit4,
                    KeyCode::Digit5,
                    KeyCode::Digit6,
                    KeyCode::Digit7,
                ];
                if let Some(i) = digits.iter().position(|&d| d == key) {
                    let weather = Weather::ALL[i];
                    state.environment.auto_weather = false;
                    state.environment.set_weather(weather);
                    println!("Weather: {:?}", weather);
                    return;
                }

                match key {
                    KeyCode::Escape => event_loop.exit(),

                    KeyCode::Space => {
                        state.paused = !state.paused;
                        println!("Clock: {}", if state.paused { "paused" } else { "running" });
                    }

                    KeyCode::KeyB => {
                        let base = state.environment.base_mut();
                        base.bloom_enabled = !base.bloom_enabled;
                        println!("Bloom: {}", base.bloom_enabled);
                    }
                    KeyCode::KeyO => {
                        let base = state.environment.base_mut();
                        base.outlines_enabled = !base.outlines_enabled;
                        println!("Outlines: {}", base.outlines_enabled);
                    }
                    KeyCode::KeyS => {
                        let base = state.environment.base_mut();
                        base.spiral_enabled = !base.spiral_enabled;
                        if base.spiral_enabled && base.spiral_intensity <= 0.0 {
                            base.spiral_intensity = 0.6;
                        }
                        println!("Spiral: {}", base.spiral_enabled);
                    }

                    KeyCode::KeyN => state.environment.set_time_of_day(1.0),
                    KeyCode::KeyD => state.environment.set_time_of_day(0.0),

                    _ => {}
                }
            }

            WindowEvent::CursorMoved { position, .. } => {
                let (w, h) = state.gpu_ctx.size;
                let base = state.environment.base_mut();
                base.spiral_center = [position.x as f32 / w as f32, position.y as f32 / h as f32];
            }

            WindowEvent::RedrawRequested => {
                state.update_and_render();
            }

            _ => {}
        }
    }

    fn about_to_wait(&mut self, _event_loop: &ActiveEventLoop) {
        if let Some(state) = &self.state {
            // Request continuous redraw for smooth updates
            state.gpu_ctx.request_redraw();
        }
    }
}

#[derive(Debug, thiserror::Error)]
pub enum GpuViewerError {
    #[error("event loop error: {0}")]
    EventLoop(#[from] winit::error::EventLoopError),
}

/// Run the GPU viewer until the window is closed
pub fn run_gpu_viewer(config: GpuViewerConfig) -> Result<(), GpuViewerError> {
    let event_loop = EventLoop::new()?;
    event_loop.set_control_flow(ControlFlow::Poll);

    let mut app = GpuViewerApp::new(config);
    event_loop.run_app(&mut app)?;

    Ok(())
}
