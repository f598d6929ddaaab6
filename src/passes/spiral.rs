//! Polar warp with an animated glow around a screen-space center.

use glam::Vec2;

use super::{Pass, PassContext, expect_outputs, par_fill, pixel_uv};
use crate::buffer::{BufferData, BufferId, ColorBuffer};
use crate::color::{RGBA, mix, mix_rgb};
use crate::error::PassResult;
use crate::params::PipelineParameters;

const GLOW_WARM: RGBA = RGBA::rgb(1.0, 0.55, 0.15);
const GLOW_COOL: RGBA = RGBA::rgb(0.2, 0.5, 1.0);
/// Glow only shows once the warp is this strong
const GLOW_MIN_INTENSITY: f32 = 0.3;
/// Fraction of the warp radius the glow covers
const GLOW_RADIUS: f32 = 0.8;

pub struct SpiralWarpPass;

/// Warped color for pixel (x, y) of `src`. Pixels outside the radius, and
/// every pixel when the effect is off, are returned unmodified.
///
/// Distances are measured in units of frame height, with the horizontal
/// axis scaled by the aspect ratio, so the affected area is a circle on
/// screen whatever the target shape.
pub fn spiral_pixel(src: &ColorBuffer, x: u32, y: u32, params: &PipelineParameters) -> RGBA {
    let intensity = params.spiral_intensity;
    let radius = params.spiral_radius;
    let original = src.get(x, y);
    if intensity <= 0.0 || radius <= 0.0 {
        return original;
    }

    let aspect = src.width() as f32 / src.height() as f32;
    let (u, v) = pixel_uv(x, y, src.width(), src.height());
    let uv = Vec2::new(u, v);
    let center = Vec2::from_array(params.spiral_center);
    let offset = (uv - center) * Vec2::new(aspect, 1.0);
    let dist = offset.length();
    if dist >= radius {
        return original;
    }

    let tod = params.time_of_day;
    let time = params.elapsed;
    let spiral = intensity * (1.0 - dist / radius);
    let speed = mix(1.0, 2.0, 1.0 - tod);
    let wave = ((time * 0.5 + dist * 8.0) * speed).sin();

    let angle = offset.y.atan2(offset.x) + spiral * wave * 0.3;
    let warped_radius = dist * (1.0 + spiral * 0.1 * wave);
    let warped = center + Vec2::from_angle(angle) * warped_radius / Vec2::new(aspect, 1.0);
    let sample_uv = uv.lerp(warped, spiral);
    let mut color = src.sample_bilinear(sample_uv.x, sample_uv.y);

    let glow_radius = radius * GLOW_RADIUS;
    if intensity > GLOW_MIN_INTENSITY && dist < glow_radius {
        // Orange by day, blue by night
        let glow = mix_rgb(GLOW_WARM, GLOW_COOL, tod);
        let pulse = 0.5 + 0.5 * (time * 3.0 + dist * 20.0).sin();
        let falloff = 1.0 - dist / glow_radius;
        color += glow * (pulse * falloff * intensity * 0.35);
    }
    color
}

impl Pass for SpiralWarpPass {
    fn label(&self) -> &'static str {
        "spiral_warp"
    }

    fn reads(&self) -> &'static [BufferId] {
        &[BufferId::SceneColor]
    }

    fn writes(&self) -> &'static [BufferId] {
        &[BufferId::Warped]
    }

    fn passthrough(&self) -> Option<BufferId> {
        Some(BufferId::SceneColor)
    }

    fn enabled(&self, params: &PipelineParameters) -> bool {
        params.spiral_enabled
    }

    fn execute(&mut self, ctx: &PassContext<'_>, outputs: &mut [BufferData]) -> PassResult<()> {
        let [warped] = expect_outputs::<1>(self.label(), outputs)?;
        let warped = warped.as_color_mut(BufferId::Warped)?;
        let scene = ctx.pool.color(BufferId::SceneColor)?;
        let params = ctx.params;

        if params.spiral_intensity <= 0.0 && warped.copy_from(scene) {
            return Ok(());
        }
        par_fill(warped, |x, y| spiral_pixel(scene, x, y, params));
        Ok(())
    }
}
