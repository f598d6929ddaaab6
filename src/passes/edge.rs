//! Outline extraction from depth and normal discontinuities.

use glam::Vec3;

use super::{Pass, PassContext, expect_outputs, par_fill};
use crate::buffer::{BufferData, BufferId, DepthBuffer, NormalBuffer};
use crate::color::{RGBA, mix, mix_rgb, smoothstep};
use crate::error::PassResult;
use crate::params::PipelineParameters;

pub struct EdgeDetectPass;

/// Roberts-cross edge measure at (x, y), neighbours fetched with
/// clamp-to-edge addressing.
pub fn edge_magnitude(depth: &DepthBuffer, normals: &NormalBuffer, x: u32, y: u32) -> f32 {
    let (x, y) = (x as i64, y as i64);
    let d = |dx: i64, dy: i64| depth.get_clamped(x + dx, y + dy);
    let n = |dx: i64, dy: i64| -> Vec3 { normals.get_clamped(x + dx, y + dy) };

    let gx = d(1, 1) - d(-1, -1);
    let gy = d(1, -1) - d(-1, 1);
    let depth_edge = (gx * gx + gy * gy).sqrt();

    let normal_edge = (n(1, 1) - n(-1, -1)).length() + (n(1, -1) - n(-1, 1)).length();

    depth_edge.max(normal_edge * 0.5)
}

/// Outline color for an edge measure: black by day, the neon edge color by
/// night, with thinner lines at night. Alpha carries the strength; zero
/// strength is fully transparent.
pub fn outline_pixel(edge: f32, params: &PipelineParameters) -> RGBA {
    let tod = params.time_of_day;
    let threshold = mix(0.015, 0.025, tod);
    let strength = smoothstep(threshold, threshold + 0.01, edge) * params.edge_scale;
    if strength <= 0.0 {
        return RGBA::transparent();
    }
    mix_rgb(RGBA::black(), params.edge_color, tod).with_alpha(strength.min(1.0))
}

impl Pass for EdgeDetectPass {
    fn label(&self) -> &'static str {
        "edge_detect"
    }

    fn reads(&self) -> &'static [BufferId] {
        &[BufferId::Depth, BufferId::Normals]
    }

    fn writes(&self) -> &'static [BufferId] {
        &[BufferId::Outline]
    }

    fn enabled(&self, params: &PipelineParameters) -> bool {
        params.outlines_enabled
    }

    fn execute(&mut self, ctx: &PassContext<'_>, outputs: &mut [BufferData]) -> PassResult<()> {
        let [outline] = expect_outputs::<1>(self.label(), outputs)?;
        let outline = outline.as_color_mut(BufferId::Outline)?;
        let depth = ctx.pool.depth(BufferId::Depth)?;
        let normals = ctx.pool.normals(BufferId::Normals)?;
        let params = ctx.params;

        par_fill(outline, |x, y| outline_pixel(edge_magnitude(depth, normals, x, y), params));
        Ok(())
    }
}
