//! Bloom: bright-pass extraction followed by a separable 9-tap Gaussian.
//!
//! The horizontal pass writes a scratch buffer; the vertical pass reads it
//! and applies the time-of-day bloom scale.

use super::{Pass, PassContext, expect_outputs, par_fill};
use crate::buffer::{BufferData, BufferId, ColorBuffer};
use crate::color::{RGBA, mix};
use crate::error::PassResult;
use crate::params::PipelineParameters;

/// Center tap followed by the four symmetric side taps, before normalization
pub const BASE_WEIGHTS: [f32; 5] = [0.227, 0.195, 0.122, 0.054, 0.016];

/// Base weights scaled so the full 9-tap kernel sums to exactly 1
pub fn gaussian_kernel() -> [f32; 5] {
    let sum = BASE_WEIGHTS[0] + 2.0 * BASE_WEIGHTS[1..].iter().sum::<f32>();
    BASE_WEIGHTS.map(|w| w / sum)
}

/// Threshold shifted up during the day and down at night
#[inline]
pub fn dynamic_threshold(threshold: f32, time_of_day: f32) -> f32 {
    mix(threshold * 1.2, threshold * 0.8, time_of_day)
}

/// Perceived brightness, biased toward the neon hues (orange and cyan)
#[inline]
pub fn neon_brightness(color: RGBA) -> f32 {
    let warm = color.dot(RGBA::rgb(1.0, 0.7, 0.0));
    let cool = color.dot(RGBA::rgb(0.0, 0.7, 1.0));
    color.luma().max(warm.max(cool) * 0.8)
}

/// Scale `color` by how far `brightness` exceeds `threshold`. At or below
/// the threshold the result is black.
#[inline]
pub fn bloom_seed(color: RGBA, brightness: f32, threshold: f32) -> RGBA {
    // Keeps the divisor away from zero when the threshold reaches 1
    let t = threshold.min(0.999);
    if brightness > t {
        color * ((brightness - t) / (1.0 - t))
    } else {
        RGBA::black()
    }
}

#[inline]
pub fn bright_pass(color: RGBA, threshold: f32, time_of_day: f32) -> RGBA {
    bloom_seed(color, neon_brightness(color), dynamic_threshold(threshold, time_of_day))
}

/// Bloom strength: 1.3x intensity in full day, 0.7x at full night
#[inline]
pub fn bloom_scale(intensity: f32, time_of_day: f32) -> f32 {
    mix(intensity * 0.7, intensity * 1.3, 1.0 - time_of_day)
}

pub struct BrightExtractPass;

impl Pass for BrightExtractPass {
    fn label(&self) -> &'static str {
        "bright_extract"
    }

    fn reads(&self) -> &'static [BufferId] {
        &[BufferId::SceneColor]
    }

    fn writes(&self) -> &'static [BufferId] {
        &[BufferId::Bright]
    }

    fn enabled(&self, params: &PipelineParameters) -> bool {
        params.bloom_enabled
    }

    fn execute(&mut self, ctx: &PassContext<'_>, outputs: &mut [BufferData]) -> PassResult<()> {
        let [bright] = expect_outputs::<1>(self.label(), outputs)?;
        let bright = bright.as_color_mut(BufferId::Bright)?;
        let scene = ctx.pool.color(BufferId::SceneColor)?;
        let (threshold, tod) = (ctx.params.bloom_threshold, ctx.params.time_of_day);

        par_fill(bright, |x, y| bright_pass(scene.get(x, y), threshold, tod));
        Ok(())
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Axis {
    Horizontal,
    Vertical,
}

/// One direction of the separable blur
pub struct BlurPass {
    axis: Axis,
    kernel: [f32; 5],
}

impl BlurPass {
    pub fn horizontal() -> Self {
        Self { axis: Axis::Horizontal, kernel: gaussian_kernel() }
    }

    pub fn vertical() -> Self {
        Self { axis: Axis::Vertical, kernel: gaussian_kernel() }
    }
}

/// Weighted sum of the 9 taps centered on (x, y) along `axis`, edges clamped
pub fn blur_pixel(src: &ColorBuffer, kernel: &[f32; 5], axis: Axis, x: u32, y: u32) -> RGBA {
    let (x, y) = (x as i64, y as i64);
    let tap = |offset: i64| match axis {
        Axis::Horizontal => src.get_clamped(x + offset, y),
        Axis::Vertical => src.get_clamped(x, y + offset),
    };

    let mut sum = tap(0) * kernel[0];
    for (i, &w) in kernel.iter().enumerate().skip(1) {
        let i = i as i64;
        sum += (tap(i) + tap(-i)) * w;
    }
    sum.with_alpha(1.0)
}

impl Pass for BlurPass {
    fn label(&self) -> &'static str {
        match self.axis {
            Axis::Horizontal => "blur_h",
            Axis::Vertical => "blur_v",
        }
    }

    fn reads(&self) -> &'static [BufferId] {
        match self.axis {
            Axis::Horizontal => &[BufferId::Bright],
            Axis::Vertical => &[BufferId::BloomScratch],
        }
    }

    fn writes(&self) -> &'static [BufferId] {
        match self.axis {
            Axis::Horizontal => &[BufferId::BloomScratch],
            Axis::Vertical => &[BufferId::Bloom],
        }
    }

    fn enabled(&self, params: &PipelineParameters) -> bool {
        params.bloom_enabled
    }

    fn execute(&mut self, ctx: &PassContext<'_>, outputs: &mut [BufferData]) -> PassResult<()> {
        let [target] = expect_outputs::<1>(self.label(), outputs)?;
        let target = target.as_color_mut(self.writes()[0])?;
        let src = ctx.pool.color(self.reads()[0])?;

        let scale = match self.axis {
            Axis::Horizontal => 1.0,
            Axis::Vertical => bloom_scale(ctx.params.bloom_intensity, ctx.params.time_of_day),
        };
        let (kernel, axis) = (&self.kernel, self.axis);

        par_fill(target, |x, y| blur_pixel(src, kernel, axis, x, y) * scale);
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::buffer::FrameBuffer;
    use approx::assert_abs_diff_eq;

    #[test]
    fn test_kernel_is_normalized() {
        let k = gaussian_kernel();
        let total = k[0] + 2.0 * k[1..].iter().sum::<f32>();
        assert_abs_diff_eq!(total, 1.0, epsilon = 1e-5);
        // Monotonically falling off from the center
        assert!(k.windows(2).all(|w| w[0] > w[1]));
    }

    #[test]
    fn test_blur_preserves_uniform_field() {
        let kernel = gaussian_kernel();
        let src = FrameBuffer::new(7, 5, RGBA::rgb(0.4, 0.2, 0.8));
        let mut h = FrameBuffer::new(7, 5, RGBA::transparent());
        par_fill(&mut h, |x, y| blur_pixel(&src, &kernel, Axis::Horizontal, x, y));
        let mut v = FrameBuffer::new(7, 5, RGBA::transparent());
        par_fill(&mut v, |x, y| blur_pixel(&h, &kernel, Axis::Vertical, x, y));

        for px in v.pixels() {
            assert_abs_diff_eq!(px.r, 0.4, epsilon = 1e-5);
            assert_abs_diff_eq!(px.g, 0.2, epsilon = 1e-5);
            assert_abs_diff_eq!(px.b, 0.8, epsilon = 1e-5);
        }
    }

    #[test]
    fn test_blur_spreads_a_single_bright_pixel() {
        let kernel = gaussian_kernel();
        let mut src = FrameBuffer::new(9, 1, RGBA::black());
        src.set(4, 0, RGBA::splat(1.0));

        let center = blur_pixel(&src, &kernel, Axis::Horizontal, 4, 0);
        let side = blur_pixel(&src, &kernel, Axis::Horizontal, 6, 0);
        assert_abs_diff_eq!(center.r, kernel[0], epsilon = 1e-6);
        assert_abs_diff_eq!(side.r, kernel[2], epsilon = 1e-6);
        // Vertical blur of a one-row image leaves it alone
        let vertical = blur_pixel(&src, &kernel, Axis::Vertical, 4, 0);
        assert_abs_diff_eq!(vertical.r, 1.0, epsilon = 1e-5);
    }

    #[test]
    fn test_brightness_at_threshold_is_black() {
        let c = RGBA::rgb(0.5, 0.5, 0.5);
        assert_eq!(bloom_seed(c, 0.6, 0.6), RGBA::black());
        assert_eq!(bloom_seed(c, 0.2, 0.6), RGBA::black());
        assert!(bloom_seed(c, 0.61, 0.6).r > 0.0);
    }

    #[test]
    fn test_full_brightness_zero_threshold_is_identity() {
        // Pure green scaled to unit luminance; luma dominates the neon term
        let c = RGBA::rgb(0.0, 1.0 / 0.7152, 0.0);
        assert_abs_diff_eq!(neon_brightness(c), 1.0, epsilon = 1e-5);
        let out = bright_pass(c, 0.0, 0.5);
        assert_abs_diff_eq!(out.g, c.g, epsilon = 1e-5);
        assert_eq!(out.r, 0.0);
        assert_eq!(out.b, 0.0);
    }

    #[test]
    fn test_seed_factor() {
        // (0.9 - 0.6) / (1 - 0.6) = 0.75
        let seed = bloom_seed(RGBA::rgb(0.9, 0.9, 0.1), 0.9, 0.6);
        assert_abs_diff_eq!(seed.r, 0.675, epsilon = 1e-5);
        assert_abs_diff_eq!(seed.g, 0.675, epsilon = 1e-5);
        assert_abs_diff_eq!(seed.b, 0.075, epsilon = 1e-5);
    }

    #[test]
    fn test_threshold_at_one_does_not_divide_by_zero() {
        let out = bloom_seed(RGBA::splat(2.0), 2.0, 1.0);
        assert!(out.r.is_finite() && out.r > 0.0);
    }

    #[test]
    fn test_blur_passes_chain_through_scratch() {
        let (h, v) = (BlurPass::horizontal(), BlurPass::vertical());
        assert_eq!((h.reads(), h.writes()), (&[BufferId::Bright][..], &[BufferId::BloomScratch][..]));
        assert_eq!((v.reads(), v.writes()), (&[BufferId::BloomScratch][..], &[BufferId::Bloom][..]));
        assert_ne!(h.label(), v.label());
    }

    #[test]
    fn test_day_night_threshold_and_scale() {
        assert_abs_diff_eq!(dynamic_threshold(0.5, 0.0), 0.6, epsilon = 1e-6);
        assert_abs_diff_eq!(dynamic_threshold(0.5, 1.0), 0.4, epsilon = 1e-6);
        assert_abs_diff_eq!(dynamic_threshold(0.6, 0.5), 0.6, epsilon = 1e-6);

        assert_abs_diff_eq!(bloom_scale(1.0, 1.0), 0.7, epsilon = 1e-6);
        assert_abs_diff_eq!(bloom_scale(1.0, 0.0), 1.3, epsilon = 1e-6);
        assert_abs_diff_eq!(bloom_scale(1.0, 0.5), 1.0, epsilon = 1e-6);
    }
}
