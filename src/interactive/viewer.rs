//! Software viewer: runs the pipeline every frame and shows it in a minifb window

use minifb::{Key, KeyRepeat, MouseMode, Window, WindowOptions};
use std::time::Instant;
use thiserror::Error;

use crate::environment::{Environment, ParameterProvider};
use crate::error::ConfigError;
use crate::params::Preset;
use crate::pipeline::{FrameInput, Pipeline};
use crate::render::{DebugView, debug_image, write_0rgb};
use crate::scene::{Scene, ViewState};

#[derive(Error, Debug)]
pub enum ViewerError {
    #[error(transparent)]
    Config(#[from] ConfigError),

    #[error("window error: {0}")]
    Window(#[from] minifb::Error),
}

/// Configuration for the interactive viewer
#[derive(Debug, Clone)]
pub struct ViewerConfig {
    /// Pipeline settings and the base frame parameters; the render size is
    /// taken from `preset.config`
    pub preset: Preset,
    /// Pixel scale factor (each rendered pixel = scale x scale window pixels)
    pub scale: usize,
    /// Day/night clock speed, in game seconds per real second
    pub time_scale: f32,
    /// Start time of day, 0 is noon and 1 is midnight
    pub start_time_of_day: f32,
}

impl Default for ViewerConfig {
    fn default() -> Self {
        Self {
            preset: Preset::default(),
            scale: 4,
            time_scale: 20.0,
            start_time_of_day: 0.3,
        }
    }
}

/// Interactive viewer for the post-processing stack
pub struct InteractiveViewer {
    config: ViewerConfig,
    pipeline: Pipeline,
    environment: Environment,
    scene: Scene,
    view: ViewState,
    window: Window,
    buffer: Vec<u32>,
}

impl InteractiveViewer {
    pub fn new(config: ViewerConfig) -> Result<Self, ViewerError> {
        let pipeline = Pipeline::from_preset(&config.preset)?;
        let (w, h) = pipeline.dimensions();
        let scale = config.scale.max(1);
        let (window_w, window_h) = (w as usize * scale, h as usize * scale);

        let window = Window::new(
            "neon_post - Interactive Viewer (ESC to exit)",
            window_w,
            window_h,
            WindowOptions {
                resize: false,
                ..WindowOptions::default()
            },
        )?;

        let environment = Environment::new(config.preset.params).at_time_of_day(config.start_time_of_day);

        Ok(Self {
            pipeline,
            environment,
            scene: Scene::demo(),
            view: ViewState::demo(w as f32 / h as f32),
            window,
            buffer: vec![0u32; window_w * window_h],
            config: ViewerConfig { scale, ..config },
        })
    }

    /// Run the interactive viewer loop
    pub fn run(&mut self) -> Result<(), ViewerError> {
        let (w, h) = self.pipeline.dimensions();
        let scale = self.config.scale;
        let (window_w, window_h) = (w as usize * scale, h as usize * scale);

        // Limit to ~60fps
        self.window.set_target_fps(60);

        let mut paused = false;
        let mut time_scale = self.config.time_scale;
        let mut debug_view = DebugView::Final;
        let mut last = Instant::now();
        let mut frames = 0u32;
        let mut frame_time = 0.0f64;

        println!("=== neon_post Interactive Viewer ===");
        println!("Controls:");
        println!("  Mouse       - Move spiral center");
        println!("  Space       - Pause/resume the clock");
        println!("  Left/Right  - Scrub the clock back / forward");
        println!("  [ / ]       - Slow down / speed up the clock");
        println!("  W           - Next weather (stops auto rotation)");
        println!("  B / O / S   - Toggle bloom / outlines / spiral");
        println!("  Up/Down     - Spiral intensity");
        println!("  V           - Cycle debug view");
        println!("  ESC         - Exit");
        println!();

        while self.window.is_open() && !self.window.is_key_down(Key::Escape) {
            let now = Instant::now();
            let dt = now.duration_since(last).as_secs_f32();
            last = now;

            if self.window.is_key_pressed(Key::Space, KeyRepeat::No) {
                paused = !paused;
                println!("Clock: {}", if paused { "paused" } else { "running" });
            }
            if self.window.is_key_pressed(Key::LeftBracket, KeyRepeat::Yes) {
                time_scale = (time_scale * 0.5).max(0.25);
                println!("Time scale: {:.2}x", time_scale);
            }
            if self.window.is_key_pressed(Key::RightBracket, KeyRepeat::Yes) {
                time_scale = (time_scale * 2.0).min(512.0);
                println!("Time scale: {:.2}x", time_scale);
            }
            if self.window.is_key_pressed(Key::Right, KeyRepeat::Yes) {
                self.environment.scrub(30.0);
            }
            if self.window.is_key_pressed(Key::Left, KeyRepeat::Yes) {
                self.environment.scrub(-30.0);
            }
            if self.window.is_key_pressed(Key::W, KeyRepeat::No) {
                let next = self.environment.weather().next();
                self.environment.auto_weather = false;
                self.environment.set_weather(next);
                println!("Weather: {:?} (auto rotation off)", next);
            }
            if self.window.is_key_pressed(Key::B, KeyRepeat::No) {
                let base = self.environment.base_mut();
                base.bloom_enabled = !base.bloom_enabled;
                println!("Bloom: {}", on_off(base.bloom_enabled));
            }
            if self.window.is_key_pressed(Key::O, KeyRepeat::No) {
                let base = self.environment.base_mut();
                base.outlines_enabled = !base.outlines_enabled;
                println!("Outlines: {}", on_off(base.outlines_enabled));
            }
            if self.window.is_key_pressed(Key::S, KeyRepeat::No) {
                let base = self.environment.base_mut();
                base.spiral_enabled = !base.spiral_enabled;
                if base.spiral_enabled && base.spiral_intensity <= 0.0 {
                    base.spiral_intensity = 0.5;
                }
                println!("Spiral: {}", on_off(base.spiral_enabled));
            }
            if self.window.is_key_pressed(Key::Up, KeyRepeat::Yes) {
                let base = self.environment.base_mut();
                base.spiral_intensity = (base.spiral_intensity + 0.1).min(1.0);
                println!("Spiral intensity: {:.1}", base.spiral_intensity);
            }
            if self.window.is_key_pressed(Key::Down, KeyRepeat::Yes) {
                let base = self.environment.base_mut();
                base.spiral_intensity = (base.spiral_intensity - 0.1).max(0.0);
                println!("Spiral intensity: {:.1}", base.spiral_intensity);
            }
            if self.window.is_key_pressed(Key::V, KeyRepeat::No) {
                debug_view = debug_view.next();
                println!("View: {:?}", debug_view);
            }

            if let Some((mx, my)) = self.window.get_mouse_pos(MouseMode::Discard) {
                let base = self.environment.base_mut();
                base.spiral_center = [mx / window_w as f32, my / window_h as f32];
            }

            if !paused {
                self.environment.advance(dt * time_scale);
            }

            let start = Instant::now();
            let frame = FrameInput {
                params: self.environment.parameters(),
                view: self.view,
                scene: &self.scene,
            };
            self.pipeline.execute(&frame);
            frame_time += start.elapsed().as_secs_f64();
            frames += 1;

            match debug_image(&self.pipeline, debug_view) {
                Some(image) => write_0rgb(&image, scale, &mut self.buffer),
                None => self.buffer.fill(0),
            }

            if frames == 60 {
                let info = self.environment.time_info();
                self.window.set_title(&format!(
                    "neon_post - {:.1} ms/frame - tod {:.2} ({}) - {:?}",
                    frame_time * 1000.0 / frames as f64,
                    info.time_of_day,
                    if info.is_day { "day" } else { "night" },
                    self.environment.weather(),
                ));
                frames = 0;
                frame_time = 0.0;
            }

            self.window.update_with_buffer(&self.buffer, window_w, window_h)?;
        }

        Ok(())
    }
}

fn on_off(flag: bool) -> &'static str {
    if flag { "ON" } else { "OFF" }
}
