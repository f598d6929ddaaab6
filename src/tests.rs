//! End-to-end tests for the post-processing pipeline

use approx::assert_abs_diff_eq;

use crate::passes::bloom::{Axis, bloom_scale, bloom_seed, blur_pixel, gaussian_kernel};
use crate::passes::par_fill;
use crate::{
    BufferId, ConfigError, DayNightCycle, Environment, FrameBuffer, FrameInput, ParameterProvider, PassStatus,
    Pipeline, PipelineConfig, PipelineParameters, Preset, RGBA, Scene, ViewState, Weather,
};

const W: u32 = 48;
const H: u32 = 27;

fn small_pipeline() -> Pipeline {
    Pipeline::standard(&PipelineConfig { width: W, height: H, ..Default::default() }).unwrap()
}

fn frame(scene: &Scene, params: PipelineParameters) -> FrameInput<'_> {
    FrameInput { params, view: ViewState::demo(W as f32 / H as f32), scene }
}

#[test]
fn test_worked_example_bloom_chain() {
    // Seed: (0.9 - 0.6) / (1 - 0.6) = 0.75
    let scene_color = RGBA::rgb(0.9, 0.9, 0.1);
    let seed = bloom_seed(scene_color, 0.9, 0.6);

    // A uniform seed survives both blur directions unchanged
    let kernel = gaussian_kernel();
    let bright = FrameBuffer::new(9, 9, seed);
    let mut scratch = FrameBuffer::new(9, 9, RGBA::transparent());
    par_fill(&mut scratch, |x, y| blur_pixel(&bright, &kernel, Axis::Horizontal, x, y));
    let mut bloom = FrameBuffer::new(9, 9, RGBA::transparent());
    let scale = bloom_scale(1.0, 0.5);
    par_fill(&mut bloom, |x, y| blur_pixel(&scratch, &kernel, Axis::Vertical, x, y) * scale);

    let total = scene_color + bloom.get(4, 4);
    assert_abs_diff_eq!(total.r, 1.575, epsilon = 1e-4);
    assert_abs_diff_eq!(total.g, 1.575, epsilon = 1e-4);
    assert_abs_diff_eq!(total.b, 0.175, epsilon = 1e-4);
}

#[test]
fn test_standard_pipeline_produces_opaque_frame() {
    let mut pipeline = small_pipeline();
    let scene = Scene::demo();
    let output = pipeline.execute(&frame(&scene, PipelineParameters::default())).unwrap();

    assert_eq!(output.dimensions(), (W, H));
    assert!(output.pixels().iter().all(|px| px.a == 1.0));
    assert!(output.pixels().iter().all(|px| px.r.is_finite() && px.g.is_finite() && px.b.is_finite()));

    let report = pipeline.last_report();
    assert!(report.entries.iter().filter(|(label, _)| *label != "spiral_warp").all(|(_, s)| *s == PassStatus::Ran));
    assert_eq!(report.status("spiral_warp"), Some(PassStatus::Disabled));
}

#[test]
fn test_day_and_night_bloom_differ() {
    let scene = Scene::demo();
    let base = PipelineParameters { bloom_threshold: 0.1, ..Default::default() };

    let mut day = small_pipeline();
    day.execute(&frame(&scene, PipelineParameters { time_of_day: 0.0, ..base }));
    let mut night = small_pipeline();
    night.execute(&frame(&scene, PipelineParameters { time_of_day: 1.0, ..base }));

    let day_bloom = day.buffer(BufferId::Bloom).unwrap();
    let night_bloom = night.buffer(BufferId::Bloom).unwrap();
    assert_ne!(day_bloom, night_bloom);

    let energy = |b: &FrameBuffer<RGBA>| b.pixels().iter().map(|p| p.r + p.g + p.b).sum::<f32>();
    assert!(energy(day_bloom) > 0.0);
    assert!(energy(night_bloom) > 0.0);
}

#[test]
fn test_frames_change_smoothly_across_the_cycle_wrap() {
    let scene = Scene::demo();
    let mut environment = Environment::new(PipelineParameters::default());
    environment.auto_weather = false;
    let cycle_seconds = environment.cycle().cycle_seconds;

    let mut pipeline = small_pipeline();
    let mut render = |env: &Environment| pipeline.execute(&frame(&scene, env.parameters())).cloned().unwrap();
    let mean_change = |a: &FrameBuffer<RGBA>, b: &FrameBuffer<RGBA>| {
        let total: f32 = a
            .pixels()
            .iter()
            .zip(b.pixels())
            .map(|(p, q)| (p.r - q.r).abs() + (p.g - q.g).abs() + (p.b - q.b).abs())
            .sum();
        total / (3 * a.pixels().len()) as f32
    };

    environment.advance(cycle_seconds - 1.0);
    let before = render(&environment);
    environment.advance(2.0);
    let after = render(&environment);
    assert!(mean_change(&before, &after) < 0.05);
}

#[test]
fn test_zero_intensity_spiral_is_bit_identical() {
    let mut pipeline = small_pipeline();
    let scene = Scene::demo();
    let params = PipelineParameters { spiral_enabled: true, spiral_intensity: 0.0, elapsed: 12.5, ..Default::default() };
    pipeline.execute(&frame(&scene, params));

    assert_eq!(pipeline.last_report().status("spiral_warp"), Some(PassStatus::Ran));
    assert_eq!(pipeline.buffer(BufferId::Warped), pipeline.buffer(BufferId::SceneColor));
}

#[test]
fn test_active_spiral_changes_warped_buffer() {
    let mut pipeline = small_pipeline();
    let scene = Scene::demo();
    let params = PipelineParameters {
        spiral_enabled: true,
        spiral_intensity: 1.0,
        spiral_radius: 0.5,
        elapsed: 2.0,
        ..Default::default()
    };
    pipeline.execute(&frame(&scene, params));
    assert_ne!(pipeline.buffer(BufferId::Warped), pipeline.buffer(BufferId::SceneColor));
}

#[test]
fn test_missing_bloom_buffer_degrades_like_disabled_bloom() {
    let scene = Scene::demo();
    let params = PipelineParameters::default();

    let mut evicted = small_pipeline();
    evicted.evict(BufferId::Bloom);
    let degraded = evicted.execute(&frame(&scene, params)).cloned();
    assert_eq!(evicted.last_report().status("blur_v"), Some(PassStatus::Skipped));
    assert_eq!(evicted.last_report().status("composite"), Some(PassStatus::Ran));

    let mut disabled = small_pipeline();
    let reference = disabled.execute(&frame(&scene, PipelineParameters { bloom_enabled: false, ..params })).cloned();

    assert!(degraded.is_some());
    assert_eq!(degraded, reference);
}

#[test]
fn test_missing_scene_color_passes_nothing_through() {
    let mut pipeline = small_pipeline();
    pipeline.evict(BufferId::SceneColor);
    let scene = Scene::demo();

    assert!(pipeline.execute(&frame(&scene, PipelineParameters::default())).is_none());
    let report = pipeline.last_report();
    assert_eq!(report.status("cel_shade"), Some(PassStatus::Skipped));
    assert_eq!(report.status("composite"), Some(PassStatus::Skipped));
}

#[test]
fn test_invalid_gamma_skips_composite_and_passes_scene_through() {
    let mut pipeline = small_pipeline();
    let scene = Scene::demo();
    let params = PipelineParameters { display_gamma: 0.0, ..Default::default() };

    let output = pipeline.execute(&frame(&scene, params)).cloned();
    assert_eq!(pipeline.last_report().status("composite"), Some(PassStatus::Failed));
    assert_eq!(output.as_ref(), pipeline.buffer(BufferId::Warped));

    // The next valid frame recovers
    pipeline.execute(&frame(&scene, PipelineParameters::default()));
    assert_eq!(pipeline.last_report().status("composite"), Some(PassStatus::Ran));
}

#[test]
fn test_out_of_range_parameters_are_clamped() {
    let scene = Scene::demo();

    let mut a = small_pipeline();
    let over = a
        .execute(&frame(&scene, PipelineParameters { time_of_day: 1.7, weather_intensity: 3.0, ..Default::default() }))
        .cloned();
    let mut b = small_pipeline();
    let clamped = b
        .execute(&frame(&scene, PipelineParameters { time_of_day: 1.0, weather_intensity: 1.0, ..Default::default() }))
        .cloned();

    assert!(over.is_some());
    assert_eq!(over, clamped);
}

#[test]
fn test_resize_recreates_buffers() {
    let mut pipeline = small_pipeline();
    let scene = Scene::demo();
    pipeline.execute(&frame(&scene, PipelineParameters::default()));
    let epoch = pipeline.epoch();

    pipeline.resize(32, 16).unwrap();
    assert_eq!(pipeline.epoch(), epoch + 1);
    // Nothing from the old resolution is readable
    assert!(pipeline.output().is_none());

    let output = pipeline.execute(&frame(&scene, PipelineParameters::default())).unwrap();
    assert_eq!(output.dimensions(), (32, 16));

    // Same size again is a no-op
    pipeline.resize(32, 16).unwrap();
    assert_eq!(pipeline.epoch(), epoch + 1);
}

#[test]
fn test_construction_errors() {
    let config = PipelineConfig { width: 0, ..Default::default() };
    assert!(matches!(Pipeline::standard(&config), Err(ConfigError::ZeroSizeTarget { .. })));

    let mut config = PipelineConfig::default();
    config.cel.step_count = 1;
    assert!(matches!(Pipeline::standard(&config), Err(ConfigError::StepCount(1))));

    let mut preset = Preset::default();
    preset.params.display_gamma = 0.0;
    assert!(matches!(
        Pipeline::from_preset(&preset),
        Err(ConfigError::NonPositiveGamma { name: "display gamma", .. })
    ));

    let mut preset = Preset::default();
    preset.params.grading.gamma = -1.0;
    assert!(matches!(Pipeline::from_preset(&preset), Err(ConfigError::NonPositiveGamma { .. })));

    assert!(Pipeline::from_preset(&Preset::default()).is_ok());
}

#[test]
fn test_preset_drives_pipeline() {
    let preset = Preset::from_json(
        r#"{
            "config": { "width": 24, "height": 12, "cel": { "step_count": 4 } },
            "params": { "bloom_intensity": 2.0, "outlines_enabled": false }
        }"#,
    )
    .unwrap();

    let mut pipeline = Pipeline::standard(&preset.config).unwrap();
    let scene = Scene::demo();
    let input = FrameInput { params: preset.params, view: ViewState::demo(2.0), scene: &scene };
    let output = pipeline.execute(&input).unwrap();
    assert_eq!(output.dimensions(), (24, 12));
    assert_eq!(pipeline.last_report().status("edge_detect"), Some(PassStatus::Disabled));
}

#[test]
fn test_environment_drives_frames_over_a_cycle() {
    let cycle = DayNightCycle { cycle_seconds: 60.0, day_seconds: 40.0 };
    let mut environment = Environment::new(PipelineParameters::default()).with_cycle(cycle);
    let mut pipeline = small_pipeline();
    let scene = Scene::demo();

    let mut outputs = Vec::new();
    for _ in 0..4 {
        let params = environment.parameters();
        assert!((0.0..=1.0).contains(&params.time_of_day));
        outputs.push(pipeline.execute(&frame(&scene, params)).cloned());
        environment.advance(15.0);
    }
    assert!(outputs.iter().all(Option::is_some));
    // The clock moved, so the frames did too
    assert_ne!(outputs[0], outputs[1]);
}

#[test]
fn test_weather_changes_final_frame() {
    let scene = Scene::demo();
    let mut clear_env = Environment::new(PipelineParameters::default()).at_time_of_day(0.5);
    clear_env.set_weather(Weather::Clear);
    let mut storm_env = Environment::new(PipelineParameters::default()).at_time_of_day(0.5);
    storm_env.set_weather(Weather::Stormy);

    let mut clear = small_pipeline();
    let clear_frame = clear.execute(&frame(&scene, clear_env.parameters())).cloned();
    let mut storm = small_pipeline();
    let storm_frame = storm.execute(&frame(&scene, storm_env.parameters())).cloned();

    assert!(clear_frame.is_some());
    assert_ne!(clear_frame, storm_frame);
}
