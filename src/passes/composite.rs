//! Final composite: scene + bloom, grading, tone-mapping, outline overlay,
//! atmospheric tint and vignette, in that order.

use std::f32::consts::PI;

use super::{Pass, PassContext, expect_outputs, par_fill, pixel_uv};
use crate::buffer::{BufferData, BufferId};
use crate::color::{RGBA, mix, mix_rgb, smoothstep};
use crate::error::{ConfigError, PassError, PassResult};
use crate::params::PipelineParameters;

pub struct CompositePass;

/// Lift/gamma/gain, saturation, night blue push and storm grading
pub fn grade(color: RGBA, params: &PipelineParameters) -> RGBA {
    let g = &params.grading;
    let inv_gamma = 1.0 / g.gamma;
    let mut c = (color + g.lift).map(|v| v.max(0.0).powf(inv_gamma)).modulate(g.gain);

    c = mix_rgb(RGBA::splat(c.luma()), c, g.saturation).with_alpha(c.a);
    c.b += g.blue_bias * mix(0.5, 1.0, params.time_of_day);

    if params.weather_intensity > 0.5 {
        let storm = (params.weather_intensity - 0.5) * 2.0;
        c = mix_rgb(c, RGBA::splat(c.luma()), storm * 0.4) * (1.0 - storm * 0.25);
    }
    c
}

/// Exposure, Reinhard, neon highlight preservation, display gamma
pub fn tone_map(color: RGBA, exposure: f32, display_gamma: f32) -> RGBA {
    let c = color.map(|v| (v * exposure).max(0.0));
    let mut m = c.map(|v| v / (v + 1.0));

    // Saturated orange/cyan highlights keep more of their linear value
    let neon = smoothstep(0.8, 1.0, c.r * c.g * 0.5).max(smoothstep(0.8, 1.0, c.g * c.b * 0.5));
    m = mix_rgb(m, c * 0.8, neon);

    let inv_gamma = 1.0 / display_gamma;
    m.map(|v| v.max(0.0).powf(inv_gamma))
}

/// Brightest at sunrise and sunset (time_of_day 0.5), dimmer at full day
/// and full night
#[inline]
pub fn atmosphere_factor(time_of_day: f32) -> f32 {
    mix(0.95, 1.05, (time_of_day * PI).sin())
}

#[inline]
pub fn vignette_factor(u: f32, v: f32) -> f32 {
    let (du, dv) = (u - 0.5, v - 0.5);
    1.0 - (du * du + dv * dv) * 0.3
}

/// Full composite for one pixel. `bloom` is black and `outline` transparent
/// when their buffers are unavailable.
pub fn composite_pixel(scene: RGBA, bloom: RGBA, outline: RGBA, uv: (f32, f32), params: &PipelineParameters) -> RGBA {
    let mut c = scene + bloom;
    c = grade(c, params);
    c = tone_map(c, params.exposure, params.display_gamma);
    c = mix_rgb(c, outline, outline.a);
    c = c * (atmosphere_factor(params.time_of_day) * vignette_factor(uv.0, uv.1));
    c.with_alpha(1.0)
}

impl Pass for CompositePass {
    fn label(&self) -> &'static str {
        "composite"
    }

    fn reads(&self) -> &'static [BufferId] {
        &[BufferId::Warped]
    }

    fn optional_reads(&self) -> &'static [BufferId] {
        &[BufferId::Bloom, BufferId::Outline]
    }

    fn writes(&self) -> &'static [BufferId] {
        &[BufferId::Final]
    }

    fn passthrough(&self) -> Option<BufferId> {
        Some(BufferId::Warped)
    }

    fn execute(&mut self, ctx: &PassContext<'_>, outputs: &mut [BufferData]) -> PassResult<()> {
        let params = ctx.params;
        params.validate().map_err(|e| match e {
            ConfigError::NonPositiveGamma { name, .. } => PassError::InvalidParameter(name),
            _ => PassError::InvalidParameter("grading"),
        })?;

        let [target] = expect_outputs::<1>(self.label(), outputs)?;
        let target = target.as_color_mut(BufferId::Final)?;
        let scene = ctx.pool.color(BufferId::Warped)?;
        let bloom = ctx.pool.optional_color(BufferId::Bloom)?;
        let outline = ctx.pool.optional_color(BufferId::Outline)?;
        let (w, h) = target.dimensions();

        par_fill(target, |x, y| {
            let bloom = bloom.map_or(RGBA::black(), |b| b.get(x, y));
            let outline = outline.map_or(RGBA::transparent(), |o| o.get(x, y));
            composite_pixel(scene.get(x, y), bloom, outline, pixel_uv(x, y, w, h), params)
        });
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::params::GradingParams;
    use approx::assert_abs_diff_eq;

    fn identity_params() -> PipelineParameters {
        PipelineParameters { grading: GradingParams::identity(), ..Default::default() }
    }

    #[test]
    fn test_identity_grading_is_noop() {
        let c = RGBA::rgb(0.3, 0.6, 0.9);
        let graded = grade(c, &identity_params());
        assert_abs_diff_eq!(graded.r, 0.3, epsilon = 1e-6);
        assert_abs_diff_eq!(graded.g, 0.6, epsilon = 1e-6);
        assert_abs_diff_eq!(graded.b, 0.9, epsilon = 1e-6);
    }

    #[test]
    fn test_identity_composite_matches_tone_curve() {
        let params = identity_params();
        let scene = RGBA::rgb(0.5, 0.25, 1.0);
        let uv = (0.2, 0.7);
        let out = composite_pixel(scene, RGBA::black(), RGBA::transparent(), uv, &params);

        let k = atmosphere_factor(params.time_of_day) * vignette_factor(uv.0, uv.1);
        let expected = |v: f32| (v / (v + 1.0)).powf(1.0 / params.display_gamma) * k;
        assert_abs_diff_eq!(out.r, expected(0.5), epsilon = 1e-5);
        assert_abs_diff_eq!(out.g, expected(0.25), epsilon = 1e-5);
        assert_abs_diff_eq!(out.b, expected(1.0), epsilon = 1e-5);
        assert_eq!(out.a, 1.0);
    }

    #[test]
    fn test_opaque_outline_replaces_color() {
        let params = PipelineParameters { time_of_day: 0.5, ..Default::default() };
        let outline = RGBA::rgb(0.0, 0.9, 1.0);
        let out = composite_pixel(RGBA::splat(0.4), RGBA::black(), outline, (0.5, 0.5), &params);
        // Center pixel: vignette 1, twilight atmosphere 1.05
        assert_abs_diff_eq!(out.r, 0.0, epsilon = 1e-6);
        assert_abs_diff_eq!(out.g, 0.9 * 1.05, epsilon = 1e-5);
        assert_abs_diff_eq!(out.b, 1.0 * 1.05, epsilon = 1e-5);
    }

    #[test]
    fn test_neon_highlights_stay_bright() {
        // r*g*0.5 well above 0.8 fully engages the preservation term
        let c = RGBA::rgb(2.0, 2.0, 0.0);
        let m = tone_map(c, 1.0, 1.0);
        assert_abs_diff_eq!(m.r, 1.6, epsilon = 1e-5);
        // Plain Reinhard would cap it below 1
        let dim = tone_map(RGBA::rgb(2.0, 0.0, 0.0), 1.0, 1.0);
        assert_abs_diff_eq!(dim.r, 2.0 / 3.0, epsilon = 1e-5);
    }

    #[test]
    fn test_storm_desaturates_and_darkens() {
        let calm = PipelineParameters { weather_intensity: 0.0, ..identity_params() };
        let storm = PipelineParameters { weather_intensity: 1.0, ..identity_params() };
        let c = RGBA::rgb(0.9, 0.2, 0.1);
        let a = grade(c, &calm);
        let b = grade(c, &storm);
        assert!(b.r - b.b < a.r - a.b);
        assert!(b.luma() < a.luma());
    }

    #[test]
    fn test_night_blue_push() {
        let mut params = identity_params();
        params.grading.blue_bias = 0.1;
        params.time_of_day = 1.0;
        assert_abs_diff_eq!(grade(RGBA::black(), &params).b, 0.1, epsilon = 1e-6);
        params.time_of_day = 0.0;
        assert_abs_diff_eq!(grade(RGBA::black(), &params).b, 0.05, epsilon = 1e-6);
    }

    #[test]
    fn test_atmosphere_and_vignette() {
        assert_abs_diff_eq!(atmosphere_factor(0.5), 1.05, epsilon = 1e-6);
        assert_abs_diff_eq!(atmosphere_factor(0.0), 0.95, epsilon = 1e-6);
        assert_eq!(vignette_factor(0.5, 0.5), 1.0);
        assert_abs_diff_eq!(vignette_factor(0.0, 0.0), 0.85, epsilon = 1e-6);
    }
}
