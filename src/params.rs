//! Per-frame parameters and construction-time configuration.
//!
//! `PipelineParameters` is a plain `Copy` value recomputed every frame by the
//! parameter provider. The pipeline clamps a copy before handing it to the
//! passes, so passes only ever see in-range values and cannot write back.

use serde::{Deserialize, Serialize};
use std::path::Path;

use crate::color::RGBA;
use crate::error::{ConfigError, ConfigResult};

/// Lift/gamma/gain grading plus saturation and the night blue push
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct GradingParams {
    pub lift: RGBA,
    /// Grading gamma ("gamma2"); the composite raises to `1 / gamma`
    pub gamma: f32,
    pub gain: RGBA,
    pub saturation: f32,
    /// Added to the blue channel, scaled up at night
    pub blue_bias: f32,
}

impl GradingParams {
    /// Grading that leaves colors untouched
    pub const fn identity() -> Self {
        Self {
            lift: RGBA::new(0.0, 0.0, 0.0, 0.0),
            gamma: 1.0,
            gain: RGBA::splat(1.0),
            saturation: 1.0,
            blue_bias: 0.0,
        }
    }
}

impl Default for GradingParams {
    fn default() -> Self {
        Self {
            lift: RGBA::new(0.01, 0.0, 0.02, 0.0),
            gamma: 1.05,
            gain: RGBA::rgb(1.05, 1.0, 1.08),
            saturation: 1.15,
            blue_bias: 0.03,
        }
    }
}

/// Everything the post passes read for one frame
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct PipelineParameters {
    /// 0 is full day (noon), 1 is full night (midnight), 0.5 is sunrise or
    /// sunset
    pub time_of_day: f32,
    pub weather_intensity: f32,
    /// Multiplier on the configured fog density
    pub fog_scale: f32,
    /// Seconds since the provider started; drives animated effects
    pub elapsed: f32,

    pub bloom_enabled: bool,
    pub bloom_threshold: f32,
    pub bloom_intensity: f32,

    pub outlines_enabled: bool,
    pub edge_scale: f32,
    pub edge_color: RGBA,

    pub spiral_enabled: bool,
    pub spiral_intensity: f32,
    /// Normalized screen coordinates, origin top-left
    pub spiral_center: [f32; 2],
    pub spiral_radius: f32,

    pub grading: GradingParams,
    pub exposure: f32,
    pub display_gamma: f32,
}

impl Default for PipelineParameters {
    fn default() -> Self {
        Self {
            time_of_day: 0.5,
            weather_intensity: 0.0,
            fog_scale: 1.0,
            elapsed: 0.0,
            bloom_enabled: true,
            bloom_threshold: 0.6,
            bloom_intensity: 1.0,
            outlines_enabled: true,
            edge_scale: 1.0,
            edge_color: RGBA::rgb(0.0, 0.9, 1.0),
            spiral_enabled: false,
            spiral_intensity: 0.0,
            spiral_center: [0.5, 0.5],
            spiral_radius: 0.3,
            grading: GradingParams::default(),
            exposure: 1.0,
            display_gamma: 2.2,
        }
    }
}

impl PipelineParameters {
    /// Copy with every bounded parameter forced into its documented range.
    /// Overshoot from animation curves is expected and not an error.
    pub fn clamped(&self) -> Self {
        let mut p = *self;
        p.time_of_day = p.time_of_day.clamp(0.0, 1.0);
        p.weather_intensity = p.weather_intensity.clamp(0.0, 1.0);
        p.spiral_intensity = p.spiral_intensity.clamp(0.0, 1.0);
        p.spiral_center = [p.spiral_center[0].clamp(0.0, 1.0), p.spiral_center[1].clamp(0.0, 1.0)];
        p.fog_scale = p.fog_scale.max(0.0);
        p.spiral_radius = p.spiral_radius.max(0.0);
        p.bloom_threshold = p.bloom_threshold.max(0.0);
        p.bloom_intensity = p.bloom_intensity.max(0.0);
        p.edge_scale = p.edge_scale.max(0.0);
        p.exposure = p.exposure.max(0.0);
        p.grading.saturation = p.grading.saturation.max(0.0);
        p
    }

    /// Checks the parameters that are used as divisors. These are never
    /// clamped: a non-positive gamma is a caller bug.
    pub fn validate(&self) -> ConfigResult<()> {
        check_positive("grading gamma", self.grading.gamma)?;
        check_positive("display gamma", self.display_gamma)
    }
}

fn check_positive(name: &'static str, value: f32) -> ConfigResult<()> {
    // `!(v > 0)` also rejects NaN
    if !(value > 0.0) {
        return Err(ConfigError::NonPositiveGamma { name, value });
    }
    Ok(())
}

/// Palette and quantization for the cel-shading pass
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct CelShadeConfig {
    /// Number of lighting bands, 2–4 look right; must be > 1
    pub step_count: u32,
    pub blue_bias: f32,
    pub base_color: RGBA,
    pub accent_color: RGBA,
    pub warm_accent: RGBA,
    pub cool_accent: RGBA,
    pub storm_tint: RGBA,
    pub fog_color: RGBA,
    pub fog_density: f32,
}

impl Default for CelShadeConfig {
    fn default() -> Self {
        Self {
            step_count: 3,
            blue_bias: 0.1,
            base_color: RGBA::rgb(0.62, 0.55, 0.68),
            accent_color: RGBA::rgb(0.15, 0.35, 0.95),
            warm_accent: RGBA::rgb(1.0, 0.6, 0.25),
            cool_accent: RGBA::rgb(0.25, 0.35, 0.85),
            storm_tint: RGBA::rgb(0.32, 0.35, 0.42),
            fog_color: RGBA::rgb(0.18, 0.25, 0.33),
            fog_density: 0.02,
        }
    }
}

impl CelShadeConfig {
    pub fn validate(&self) -> ConfigResult<()> {
        if self.step_count <= 1 {
            return Err(ConfigError::StepCount(self.step_count));
        }
        Ok(())
    }
}

/// Construction-time configuration for the standard pipeline
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct PipelineConfig {
    pub width: u32,
    pub height: u32,
    pub cel: CelShadeConfig,
}

impl Default for PipelineConfig {
    fn default() -> Self {
        Self {
            width: 320,
            height: 180,
            cel: CelShadeConfig::default(),
        }
    }
}

impl PipelineConfig {
    pub fn validate(&self) -> ConfigResult<()> {
        validate_size(self.width, self.height)?;
        self.cel.validate()
    }
}

pub fn validate_size(width: u32, height: u32) -> ConfigResult<()> {
    if width == 0 || height == 0 {
        return Err(ConfigError::ZeroSizeTarget { width, height });
    }
    Ok(())
}

/// A pipeline configuration plus the base per-frame parameters, as stored in
/// a JSON preset file. Missing fields fall back to the defaults.
#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct Preset {
    pub config: PipelineConfig,
    pub params: PipelineParameters,
}

impl Preset {
    pub fn from_json(text: &str) -> ConfigResult<Self> {
        let preset: Preset = serde_json::from_str(text).map_err(|e| ConfigError::Preset(e.to_string()))?;
        preset.validate()?;
        Ok(preset)
    }

    pub fn load(path: impl AsRef<Path>) -> ConfigResult<Self> {
        let path = path.as_ref();
        let text = std::fs::read_to_string(path)
            .map_err(|e| ConfigError::Preset(format!("{}: {}", path.display(), e)))?;
        Self::from_json(&text)
    }

    pub fn to_json(&self) -> String {
        // Plain data with no maps keyed by non-strings; serialization cannot fail
        serde_json::to_string_pretty(self).unwrap_or_default()
    }

    pub fn validate(&self) -> ConfigResult<()> {
        self.config.validate()?;
        self.params.validate()
    }
}
