//! Conversion of pipeline buffers to displayable formats

use glam::Vec3;
use rayon::prelude::*;
use std::fs::File;
use std::io::{self, BufWriter, Write};

use crate::buffer::{BufferId, ColorBuffer, DepthBuffer, NormalBuffer};
use crate::color::RGBA;
use crate::pipeline::Pipeline;

/// Which buffer a viewer shows
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DebugView {
    Final,
    Scene,
    Depth,
    Normals,
    Outline,
    Bloom,
}

impl DebugView {
    pub const ALL: [DebugView; 6] = [
        DebugView::Final,
        DebugView::Scene,
        DebugView::Depth,
        DebugView::Normals,
        DebugView::Outline,
        DebugView::Bloom,
    ];

    pub fn next(self) -> DebugView {
        let i = Self::ALL.iter().position(|&v| v == self).unwrap_or(0);
        Self::ALL[(i + 1) % Self::ALL.len()]
    }
}

/// Convert a float value (0.0-1.0) to a byte (0-255)
#[inline]
pub fn to_byte(value: f32) -> u8 {
    (value.clamp(0.0, 1.0) * 255.0) as u8
}

#[inline]
pub fn pack_0rgb(pixel: RGBA) -> u32 {
    let r = to_byte(pixel.r) as u32;
    let g = to_byte(pixel.g) as u32;
    let b = to_byte(pixel.b) as u32;
    (r << 16) | (g << 8) | b
}

/// Fill `out` with tightly packed RGBA8 bytes, resizing it as needed
pub fn write_rgba8(buffer: &ColorBuffer, out: &mut Vec<u8>) {
    out.resize(buffer.pixels().len() * 4, 0);
    out.par_chunks_mut(4).zip(buffer.pixels().par_iter()).for_each(|(dst, px)| {
        dst[0] = to_byte(px.r);
        dst[1] = to_byte(px.g);
        dst[2] = to_byte(px.b);
        dst[3] = to_byte(px.a);
    });
}

/// Upscale `buffer` by an integer `scale` into a 0RGB framebuffer of
/// `width * scale` by `height * scale` pixels, as minifb expects
pub fn write_0rgb(buffer: &ColorBuffer, scale: usize, out: &mut [u32]) {
    let (w, h) = (buffer.width() as usize, buffer.height() as usize);
    let out_w = w * scale;
    if scale == 0 || out.len() < out_w * h * scale {
        log::warn!("display buffer too small for {}x{} at scale {}", w, h, scale);
        return;
    }

    out[..out_w * h * scale]
        .par_chunks_mut(out_w)
        .enumerate()
        .for_each(|(py, row)| {
            let y = (py / scale) as u32;
            for (px, dst) in row.iter_mut().enumerate() {
                *dst = pack_0rgb(buffer.get((px / scale) as u32, y));
            }
        });
}

/// Depth as greyscale, near = white. Background stays black.
pub fn depth_to_color(depth: &DepthBuffer) -> ColorBuffer {
    let mut out = ColorBuffer::new(depth.width(), depth.height(), RGBA::black());
    out.pixels_mut().par_iter_mut().zip(depth.pixels().par_iter()).for_each(|(dst, &d)| {
        // Perspective depth bunches up near 1; stretch it out
        let v = (1.0 - d).powf(0.25);
        *dst = RGBA::splat(v);
    });
    out
}

/// Normals remapped from [-1, 1] to [0, 1] per channel
pub fn normals_to_color(normals: &NormalBuffer) -> ColorBuffer {
    let mut out = ColorBuffer::new(normals.width(), normals.height(), RGBA::black());
    out.pixels_mut().par_iter_mut().zip(normals.pixels().par_iter()).for_each(|(dst, &n)| {
        *dst = if n == Vec3::ZERO {
            RGBA::black()
        } else {
            let c = n * 0.5 + Vec3::splat(0.5);
            RGBA::rgb(c.x, c.y, c.z)
        };
    });
    out
}

/// Outline composited over black so alpha is visible
pub fn outline_to_color(outline: &ColorBuffer) -> ColorBuffer {
    let mut out = outline.clone();
    out.pixels_mut().par_iter_mut().for_each(|px| *px = (*px * px.a).with_alpha(1.0));
    out
}

/// Image for `view` from the pipeline's last frame, if that buffer was written
pub fn debug_image(pipeline: &Pipeline, view: DebugView) -> Option<ColorBuffer> {
    let pool = pipeline.pool();
    match view {
        DebugView::Final => pipeline.output().cloned(),
        DebugView::Scene => pipeline.buffer(BufferId::SceneColor).cloned(),
        DebugView::Depth => pool.depth(BufferId::Depth).ok().map(depth_to_color),
        DebugView::Normals => pool.normals(BufferId::Normals).ok().map(normals_to_color),
        DebugView::Outline => pipeline.buffer(BufferId::Outline).map(outline_to_color),
        DebugView::Bloom => pipeline.buffer(BufferId::Bloom).cloned(),
    }
}

/// Save a color buffer to a binary PPM file, each pixel drawn `scale` times
/// in each direction
pub fn save_ppm(buffer: &ColorBuffer, filename: &str, scale: usize) -> io::Result<()> {
    let scale = scale.max(1);
    let (w, h) = (buffer.width() as usize, buffer.height() as usize);
    let mut file = BufWriter::new(File::create(filename)?);
    write_ppm(&mut file, buffer, scale)?;
    file.flush()?;
    log::debug!("wrote {} ({}x{})", filename, w * scale, h * scale);
    Ok(())
}

pub fn write_ppm(out: &mut impl Write, buffer: &ColorBuffer, scale: usize) -> io::Result<()> {
    let (w, h) = (buffer.width() as usize, buffer.height() as usize);
    writeln!(out, "P6")?;
    writeln!(out, "{} {}", w * scale, h * scale)?;
    writeln!(out, "255")?;

    let mut row = Vec::with_capacity(w * scale * 3);
    for y in 0..h * scale {
        row.clear();
        for x in 0..w * scale {
            let px = buffer.get((x / scale) as u32, (y / scale) as u32);
            row.extend_from_slice(&[to_byte(px.r), to_byte(px.g), to_byte(px.b)]);
        }
        out.write_all(&row)?;
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::buffer::FrameBuffer;

    #[test]
    fn test_to_byte_clamps() {
        assert_eq!(to_byte(-1.0), 0);
        assert_eq!(to_byte(0.5), 127);
        assert_eq!(to_byte(3.0), 255);
    }

    #[test]
    fn test_0rgb_upscale() {
        let mut buf = FrameBuffer::new(2, 1, RGBA::black());
        buf.set(1, 0, RGBA::rgb(1.0, 0.0, 1.0));

        let mut out = vec![0u32; 4 * 2];
        write_0rgb(&buf, 2, &mut out);
        assert_eq!(out, vec![0, 0, 0xFF00FF, 0xFF00FF, 0, 0, 0xFF00FF, 0xFF00FF]);
    }

    #[test]
    fn test_rgba8_layout() {
        let buf = FrameBuffer::new(1, 2, RGBA::new(1.0, 0.0, 0.0, 1.0));
        let mut out = Vec::new();
        write_rgba8(&buf, &mut out);
        assert_eq!(out, vec![255, 0, 0, 255, 255, 0, 0, 255]);
    }

    #[test]
    fn test_ppm_header_and_size() {
        let buf = FrameBuffer::new(3, 2, RGBA::splat(1.0));
        let mut bytes = Vec::new();
        write_ppm(&mut bytes, &buf, 2).unwrap();

        let header = b"P6\n6 4\n255\n";
        assert!(bytes.starts_with(header));
        assert_eq!(bytes.len(), header.len() + 6 * 4 * 3);
        assert!(bytes[header.len()..].iter().all(|&b| b == 255));
    }

    #[test]
    fn test_debug_visualizers() {
        let depth = FrameBuffer::from_pixels(2, 1, vec![0.0f32, 1.0]).unwrap();
        let img = depth_to_color(&depth);
        assert_eq!(img.get(0, 0), RGBA::splat(1.0));
        assert_eq!(img.get(1, 0), RGBA::splat(0.0));

        let normals = FrameBuffer::from_pixels(2, 1, vec![Vec3::Z, Vec3::ZERO]).unwrap();
        let img = normals_to_color(&normals);
        assert_eq!(img.get(0, 0), RGBA::rgb(0.5, 0.5, 1.0));
        assert_eq!(img.get(1, 0), RGBA::black());

        assert_eq!(DebugView::Bloom.next(), DebugView::Final);
    }

    #[test]
    fn test_debug_image_covers_every_view() {
        use crate::params::{PipelineConfig, PipelineParameters};
        use crate::pipeline::FrameInput;
        use crate::scene::{Scene, ViewState};

        let mut pipeline = Pipeline::standard(&PipelineConfig { width: 16, height: 9, ..Default::default() }).unwrap();
        // Nothing has run yet
        assert!(DebugView::ALL.iter().all(|&v| debug_image(&pipeline, v).is_none()));

        let scene = Scene::demo();
        let frame = FrameInput { params: PipelineParameters::default(), view: ViewState::demo(16.0 / 9.0), scene: &scene };
        pipeline.execute(&frame);
        for view in DebugView::ALL {
            let image = debug_image(&pipeline, view);
            assert_eq!(image.map(|i| i.dimensions()), Some((16, 9)), "{:?}", view);
        }

        // Depth is rendered white at the near plane, black where nothing was drawn
        let depth = debug_image(&pipeline, DebugView::Depth).unwrap();
        assert!(depth.pixels().iter().any(|p| p.r > 0.0));
    }
}
