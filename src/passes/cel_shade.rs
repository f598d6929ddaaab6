//! Geometry/lighting pass: rasterizes the scene and cel-shades it.
//!
//! Rasterization is serial (depth test order matters); shading then runs per
//! row in parallel over the resolved depth/normal/position buffers.

use glam::{Mat3, Mat4, Vec2, Vec3, Vec4};
use smallvec::SmallVec;
use std::f32::consts::PI;

use super::{Pass, PassContext, expect_outputs, par_fill};
use crate::buffer::{BufferData, BufferId, DepthBuffer, FrameBuffer, NormalBuffer};
use crate::color::{RGBA, mix, mix_rgb, smoothstep};
use crate::error::{ConfigResult, PassResult};
use crate::params::{CelShadeConfig, PipelineParameters};
use crate::scene::Mesh;

/// Rim term above which the glow kicks in
const RIM_START: f32 = 0.75;
/// How far the day/night accents pull the band color
const ACCENT_STRENGTH: f32 = 0.25;

pub struct CelShadePass {
    config: CelShadeConfig,
    /// View-space position per pixel, resolved during rasterization
    positions: FrameBuffer<Vec3>,
}

impl CelShadePass {
    pub fn new(config: CelShadeConfig) -> ConfigResult<Self> {
        config.validate()?;
        Ok(Self {
            config,
            positions: FrameBuffer::new(1, 1, Vec3::ZERO),
        })
    }

    pub fn config(&self) -> &CelShadeConfig {
        &self.config
    }
}

impl Pass for CelShadePass {
    fn label(&self) -> &'static str {
        "cel_shade"
    }

    fn reads(&self) -> &'static [BufferId] {
        &[]
    }

    fn writes(&self) -> &'static [BufferId] {
        &[BufferId::SceneColor, BufferId::Depth, BufferId::Normals]
    }

    fn resize(&mut self, width: u32, height: u32) {
        self.positions = FrameBuffer::new(width, height, Vec3::ZERO);
    }

    fn execute(&mut self, ctx: &PassContext<'_>, outputs: &mut [BufferData]) -> PassResult<()> {
        let [color, depth, normals] = expect_outputs::<3>(self.label(), outputs)?;
        let color = color.as_color_mut(BufferId::SceneColor)?;
        let depth = depth.as_depth_mut(BufferId::Depth)?;
        let normals = normals.as_normal_mut(BufferId::Normals)?;

        if self.positions.dimensions() != depth.dimensions() {
            self.resize(depth.width(), depth.height());
        }

        depth.fill(1.0);
        normals.fill(Vec3::ZERO);
        self.positions.fill(Vec3::ZERO);

        {
            let mut targets = RasterTargets {
                depth: &mut *depth,
                normals: &mut *normals,
                positions: &mut self.positions,
            };
            for mesh in &ctx.scene.meshes {
                draw_mesh(mesh, ctx.view.view, ctx.view.projection, &mut targets);
            }
        }

        let depth: &DepthBuffer = depth;
        let normals: &NormalBuffer = normals;
        let positions = &self.positions;
        let light = ctx.view.view.transform_vector3(ctx.view.light_dir).normalize_or_zero();
        let config = &self.config;
        let params = ctx.params;
        let sky = sky_color(config, params.time_of_day);

        par_fill(color, |x, y| {
            if depth.get(x, y) >= 1.0 {
                sky
            } else {
                cel_shade(normals.get(x, y), positions.get(x, y), light, config, params)
            }
        });
        Ok(())
    }
}

/// Shade one fragment. `normal`, `position` and `light` are in view space, so
/// the eye sits at the origin.
pub fn cel_shade(
    normal: Vec3,
    position: Vec3,
    light: Vec3,
    config: &CelShadeConfig,
    params: &PipelineParameters,
) -> RGBA {
    let steps = config.step_count as f32;
    let ndl = normal.dot(light).max(0.0);
    let stepped = (ndl * steps).floor() / (steps - 1.0);

    let base = mix_rgb(config.base_color, config.fog_color, config.fog_density * 0.3);
    let mut color = mix_rgb(base, config.accent_color, (stepped + config.blue_bias).clamp(0.0, 1.0));

    // Warmest at sunrise and sunset, cool toward full day and full night
    let warmth = (params.time_of_day * PI).sin();
    color = mix_rgb(color, config.warm_accent, warmth.max(0.0) * ACCENT_STRENGTH);
    color = mix_rgb(color, config.cool_accent, (1.0 - warmth).clamp(0.0, 1.0) * ACCENT_STRENGTH);

    if params.weather_intensity > 0.5 {
        let storm = (params.weather_intensity - 0.5) * 2.0;
        let grey = mix_rgb(RGBA::splat(color.luma()), config.storm_tint, 0.5);
        color = mix_rgb(color, grey, storm * 0.6) * (1.0 - storm * 0.3);
    }

    let view_dir = (-position).normalize_or_zero();
    let rim = 1.0 - normal.dot(view_dir).max(0.0);
    if rim > RIM_START {
        let rim_color = mix_rgb(config.cool_accent, config.warm_accent, warmth.clamp(0.0, 1.0));
        color += rim_color * (smoothstep(RIM_START, 1.0, rim) * 0.6);
    }

    let visibility = (-position.length() * config.fog_density * params.fog_scale).exp();
    mix_rgb(config.fog_color, color, visibility).with_alpha(1.0)
}

/// Background color: fog color dimmed toward midnight
pub fn sky_color(config: &CelShadeConfig, time_of_day: f32) -> RGBA {
    let light = mix(1.0, 0.35, time_of_day);
    let fog = config.fog_color;
    RGBA::rgb(fog.r * light, fog.g * light, fog.b)
}

struct RasterTargets<'a> {
    depth: &'a mut DepthBuffer,
    normals: &'a mut NormalBuffer,
    positions: &'a mut FrameBuffer<Vec3>,
}

#[derive(Debug, Clone, Copy)]
struct ClipVertex {
    clip: Vec4,
    view_pos: Vec3,
    view_normal: Vec3,
}

impl ClipVertex {
    fn lerp(self, other: ClipVertex, t: f32) -> ClipVertex {
        ClipVertex {
            clip: self.clip.lerp(other.clip, t),
            view_pos: self.view_pos.lerp(other.view_pos, t),
            view_normal: self.view_normal.lerp(other.view_normal, t),
        }
    }
}

fn draw_mesh(mesh: &Mesh, view: Mat4, projection: Mat4, targets: &mut RasterTargets<'_>) {
    let model_view = view * mesh.transform;
    let normal_matrix = Mat3::from_mat4(model_view).inverse().transpose();

    for tri in mesh.indices.chunks_exact(3) {
        let (Some(a), Some(b), Some(c)) = (
            mesh.vertices.get(tri[0] as usize),
            mesh.vertices.get(tri[1] as usize),
            mesh.vertices.get(tri[2] as usize),
        ) else {
            log::debug!("skipping triangle with out-of-range index {:?}", tri);
            continue;
        };

        let corners = [a, b, c].map(|v| {
            let view_pos = model_view.transform_point3(v.position);
            ClipVertex {
                clip: projection * view_pos.extend(1.0),
                view_pos,
                view_normal: (normal_matrix * v.normal).normalize_or_zero(),
            }
        });

        let polygon = clip_near(&corners);
        for i in 1..polygon.len().saturating_sub(1) {
            rasterize([polygon[0], polygon[i], polygon[i + 1]], targets);
        }
    }
}

/// Sutherland–Hodgman against the near plane (clip z >= 0 for a [0, 1]
/// depth range). Returns 0, 3 or 4 vertices.
fn clip_near(tri: &[ClipVertex; 3]) -> SmallVec<[ClipVertex; 4]> {
    let mut out = SmallVec::new();
    for i in 0..3 {
        let cur = tri[i];
        let next = tri[(i + 1) % 3];
        let (dc, dn) = (cur.clip.z, next.clip.z);
        if dc >= 0.0 {
            out.push(cur);
        }
        if (dc >= 0.0) != (dn >= 0.0) {
            out.push(cur.lerp(next, dc / (dc - dn)));
        }
    }
    out
}

#[inline]
fn edge(a: Vec2, b: Vec2, p: Vec2) -> f32 {
    (b.x - a.x) * (p.y - a.y) - (b.y - a.y) * (p.x - a.x)
}

fn rasterize(tri: [ClipVertex; 3], targets: &mut RasterTargets<'_>) {
    if tri.iter().any(|v| v.clip.w <= f32::EPSILON) {
        return;
    }
    let ndc = tri.map(|v| v.clip.truncate() / v.clip.w);

    // Back-face cull: CCW in NDC (y up) is front facing
    let ndc_area = edge(ndc[0].truncate(), ndc[1].truncate(), ndc[2].truncate());
    if ndc_area <= 0.0 {
        return;
    }

    let (w, h) = targets.depth.dimensions();
    let screen = ndc.map(|p| Vec2::new((p.x * 0.5 + 0.5) * w as f32, (0.5 - p.y * 0.5) * h as f32));
    let area = edge(screen[0], screen[1], screen[2]);
    if area.abs() <= f32::EPSILON {
        return;
    }

    let min = screen[0].min(screen[1]).min(screen[2]);
    let max = screen[0].max(screen[1]).max(screen[2]);
    let x0 = min.x.floor().max(0.0) as u32;
    let y0 = min.y.floor().max(0.0) as u32;
    let x1 = (max.x.ceil() as i64).min(w as i64 - 1);
    let y1 = (max.y.ceil() as i64).min(h as i64 - 1);
    if x1 < 0 || y1 < 0 {
        return;
    }

    let inv_w = tri.map(|v| 1.0 / v.clip.w);

    for y in y0..=y1 as u32 {
        for x in x0..=x1 as u32 {
            let p = Vec2::new(x as f32 + 0.5, y as f32 + 0.5);
            let b0 = edge(screen[1], screen[2], p) / area;
            let b1 = edge(screen[2], screen[0], p) / area;
            let b2 = edge(screen[0], screen[1], p) / area;
            if b0 < 0.0 || b1 < 0.0 || b2 < 0.0 {
                continue;
            }

            let z = b0 * ndc[0].z + b1 * ndc[1].z + b2 * ndc[2].z;
            if !(0.0..1.0).contains(&z) || z >= targets.depth.get(x, y) {
                continue;
            }

            // Perspective-correct attribute weights
            let p0 = b0 * inv_w[0];
            let p1 = b1 * inv_w[1];
            let p2 = b2 * inv_w[2];
            let norm = p0 + p1 + p2;
            let (p0, p1, p2) = (p0 / norm, p1 / norm, p2 / norm);

            let normal = tri[0].view_normal * p0 + tri[1].view_normal * p1 + tri[2].view_normal * p2;
            let position = tri[0].view_pos * p0 + tri[1].view_pos * p1 + tri[2].view_pos * p2;

            targets.depth.set(x, y, z);
            targets.normals.set(x, y, normal.normalize_or_zero());
            targets.positions.set(x, y, position);
        }
    }
}
