mod buffer;
mod color;
mod environment;
mod error;
mod gpu;
mod interactive;
mod params;
mod passes;
mod pipeline;
mod render;
mod scene;

#[cfg(test)]
mod tests;

// Re-export public API
pub use buffer::{BufferId, BufferPool, ColorBuffer, DepthBuffer, FrameBuffer, NormalBuffer, PixelFormat};
pub use color::{RGBA, mix, mix_rgb, smoothstep};
pub use environment::{DayNightCycle, Environment, ParameterProvider, Weather};
pub use error::{ConfigError, PassError};
pub use interactive::{GpuViewerConfig, InteractiveViewer, ViewerConfig, run_gpu_viewer};
pub use params::{CelShadeConfig, GradingParams, PipelineConfig, PipelineParameters, Preset};
pub use passes::{Pass, PassContext};
pub use pipeline::{FrameInput, FrameReport, PassStatus, Pipeline, PipelineBuilder};
pub use render::{DebugView, save_ppm};
pub use scene::{Mesh, Scene, Vertex, ViewState};

fn main() {
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info")).init();

    let args: Vec<String> = std::env::args().collect();

    let preset = match args.iter().position(|a| a == "--preset") {
        Some(i) => match args.get(i + 1) {
            Some(path) => match Preset::load(path) {
                Ok(preset) => {
                    log::info!("loaded preset {}", path);
                    preset
                }
                Err(e) => {
                    eprintln!("Error: {}", e);
                    std::process::exit(1);
                }
            },
            None => {
                eprintln!("Error: --preset needs a path");
                std::process::exit(1);
            }
        },
        None => Preset::default(),
    };

    if args.iter().any(|a| a == "--interactive") {
        run_interactive(preset);
    } else if args.iter().any(|a| a == "--gpu") {
        run_gpu(preset);
    } else if args.iter().any(|a| a == "--benchmark") {
        run_benchmark(&preset);
    } else {
        println!("neon_post - stylized post-processing pipeline");
        println!("Run with --interactive for the minifb viewer");
        println!("Run with --gpu for the wgpu viewer");
        println!("Run with --benchmark to time the pipeline");
        println!("Add --preset <file.json> to load settings");
        println!();
        if let Err(e) = render_stills(&preset) {
            eprintln!("Error: {}", e);
        }
    }
}

/// Render the demo scene at a few times of day and weathers, one PPM each
fn render_stills(preset: &Preset) -> Result<(), Box<dyn std::error::Error>> {
    let mut pipeline = Pipeline::from_preset(preset)?;
    let (w, h) = pipeline.dimensions();
    let scene = Scene::demo();
    let view = ViewState::demo(w as f32 / h as f32);

    let shots = [
        ("noon", 0.0, Weather::Clear, false),
        ("afternoon", 0.3, Weather::Clear, false),
        ("dusk", 0.5, Weather::Cloudy, true),
        ("midnight", 1.0, Weather::Clear, true),
        ("storm", 0.8, Weather::Stormy, false),
    ];

    for (name, tod, weather, spiral) in shots {
        let mut environment = Environment::new(preset.params).at_time_of_day(tod);
        environment.set_weather(weather);
        let base = environment.base_mut();
        base.spiral_enabled |= spiral;
        if spiral {
            base.spiral_intensity = base.spiral_intensity.max(0.7);
            base.spiral_center = [0.5, 0.55];
        }

        let frame = FrameInput { params: environment.parameters(), view, scene: &scene };
        let Some(image) = pipeline.execute(&frame) else {
            log::warn!("{}: no output", name);
            continue;
        };

        let filename = format!("neon_{}.ppm", name);
        save_ppm(image, &filename, 2)?;
        println!("  {:<9} tod {:.2} {:?} -> {}", name, tod, weather, filename);
    }
    Ok(())
}

fn run_benchmark(preset: &Preset) {
    use std::time::Instant;

    println!("=== Pipeline Benchmark ===\n");

    let sizes = [(160, 90), (320, 180), (640, 360), (1280, 720)];
    let iterations = 20;
    let scene = Scene::demo();

    for (width, height) in sizes {
        let sized = Preset { config: PipelineConfig { width, height, ..preset.config }, ..*preset };
        let mut pipeline = match Pipeline::from_preset(&sized) {
            Ok(p) => p,
            Err(e) => {
                eprintln!("Error: {}", e);
                return;
            }
        };
        let view = ViewState::demo(width as f32 / height as f32);
        let mut params = preset.params;
        params.spiral_enabled = true;
        params.spiral_intensity = 0.6;

        println!("Resolution: {}x{}", width, height);
        println!("-----------------------");

        // Warm up the rayon pool
        pipeline.execute(&FrameInput { params, view, scene: &scene });

        let start = Instant::now();
        for i in 0..iterations {
            params.elapsed = i as f32 / 60.0;
            pipeline.execute(&FrameInput { params, view, scene: &scene });
        }
        let avg_ms = start.elapsed().as_secs_f64() * 1000.0 / iterations as f64;

        println!("  Full stack:  {:.3} ms/frame", avg_ms);
        println!("  Estimated max FPS: {:.1}", 1000.0 / avg_ms);
        println!();
    }
}

fn run_interactive(preset: Preset) {
    let config = ViewerConfig { preset, ..ViewerConfig::default() };

    match InteractiveViewer::new(config) {
        Ok(mut viewer) => {
            if let Err(e) = viewer.run() {
                eprintln!("Error: {}", e);
            }
        }
        Err(e) => {
            eprintln!("Failed to create viewer: {}", e);
        }
    }
}

fn run_gpu(preset: Preset) {
    let config = GpuViewerConfig { preset, ..GpuViewerConfig::default() };
    if let Err(e) = run_gpu_viewer(config) {
        eprintln!("Error: {}", e);
    }
}
