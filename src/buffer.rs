//! Frame buffers and the pool that owns them.
//!
//! All buffers use a flat row-major layout (`index = y * width + x`), the same
//! cache-friendly layout the lighting grids use. The pool hands a pass its
//! output buffers by value for the duration of `execute` and takes them back
//! afterwards, so no buffer is reallocated between frames.

use glam::Vec3;
use serde::{Deserialize, Serialize};

use crate::color::{RGBA, mix, mix_rgb};
use crate::error::{PassError, PassResult};

/// Owned 2D grid of pixels
#[derive(Debug, Clone, PartialEq)]
pub struct FrameBuffer<T> {
    width: u32,
    height: u32,
    data: Vec<T>,
}

pub type ColorBuffer = FrameBuffer<RGBA>;
pub type DepthBuffer = FrameBuffer<f32>;
pub type NormalBuffer = FrameBuffer<Vec3>;

impl<T: Copy> FrameBuffer<T> {
    /// Allocate a buffer, returning `None` when the allocation fails.
    pub fn try_new(width: u32, height: u32, fill: T) -> Option<Self> {
        let len = (width as usize).checked_mul(height as usize)?;
        let mut data = Vec::new();
        data.try_reserve_exact(len).ok()?;
        data.resize(len, fill);
        Some(Self { width, height, data })
    }

    pub fn new(width: u32, height: u32, fill: T) -> Self {
        let len = width as usize * height as usize;
        Self { width, height, data: vec![fill; len] }
    }

    /// Wrap existing row-major pixel data
    pub fn from_pixels(width: u32, height: u32, data: Vec<T>) -> Option<Self> {
        (data.len() == width as usize * height as usize).then_some(Self { width, height, data })
    }

    pub fn width(&self) -> u32 {
        self.width
    }

    pub fn height(&self) -> u32 {
        self.height
    }

    pub fn dimensions(&self) -> (u32, u32) {
        (self.width, self.height)
    }

    #[inline]
    pub fn get(&self, x: u32, y: u32) -> T {
        self.data[y as usize * self.width as usize + x as usize]
    }

    #[inline]
    pub fn set(&mut self, x: u32, y: u32, value: T) {
        let w = self.width as usize;
        self.data[y as usize * w + x as usize] = value;
    }

    /// Fetch with clamp-to-edge addressing
    #[inline]
    pub fn get_clamped(&self, x: i64, y: i64) -> T {
        let cx = x.clamp(0, self.width as i64 - 1) as u32;
        let cy = y.clamp(0, self.height as i64 - 1) as u32;
        self.get(cx, cy)
    }

    pub fn fill(&mut self, value: T) {
        self.data.fill(value);
    }

    pub fn pixels(&self) -> &[T] {
        &self.data
    }

    pub fn pixels_mut(&mut self) -> &mut [T] {
        &mut self.data
    }

    /// Overwrite this buffer with `other`; returns false on a size mismatch.
    pub fn copy_from(&mut self, other: &FrameBuffer<T>) -> bool {
        if self.dimensions() != other.dimensions() {
            return false;
        }
        self.data.copy_from_slice(&other.data);
        true
    }
}

impl FrameBuffer<RGBA> {
    /// Bilinear sample at normalized coordinates with clamp-to-edge addressing.
    /// Texel centers sit at `(i + 0.5) / size`.
    pub fn sample_bilinear(&self, u: f32, v: f32) -> RGBA {
        let fx = u * self.width as f32 - 0.5;
        let fy = v * self.height as f32 - 0.5;
        let x0 = fx.floor();
        let y0 = fy.floor();
        let tx = fx - x0;
        let ty = fy - y0;
        let (x0, y0) = (x0 as i64, y0 as i64);

        let top = lerp(self.get_clamped(x0, y0), self.get_clamped(x0 + 1, y0), tx);
        let bottom = lerp(self.get_clamped(x0, y0 + 1), self.get_clamped(x0 + 1, y0 + 1), tx);
        lerp(top, bottom, ty)
    }
}

/// Full four-channel interpolation, used for filtering
#[inline]
fn lerp(a: RGBA, b: RGBA, t: f32) -> RGBA {
    let mut out = mix_rgb(a, b, t);
    out.a = mix(a.a, b.a, t);
    out
}

/// Pixel format of a pipeline buffer
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum PixelFormat {
    /// Linear RGBA, unclamped until tone-mapping
    Color,
    /// Normalized depth, 0 = near plane, 1 = far plane / background
    Depth,
    /// View-space unit normal, components in [-1, 1]
    Normal,
}

/// The buffers a pipeline can route between passes
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum BufferId {
    SceneColor,
    Depth,
    Normals,
    Outline,
    Bright,
    BloomScratch,
    Bloom,
    Warped,
    Final,
}

impl BufferId {
    pub const COUNT: usize = 9;

    pub const ALL: [BufferId; Self::COUNT] = [
        BufferId::SceneColor,
        BufferId::Depth,
        BufferId::Normals,
        BufferId::Outline,
        BufferId::Bright,
        BufferId::BloomScratch,
        BufferId::Bloom,
        BufferId::Warped,
        BufferId::Final,
    ];

    #[inline]
    pub fn index(self) -> usize {
        self as usize
    }

    pub fn format(self) -> PixelFormat {
        match self {
            BufferId::Depth => PixelFormat::Depth,
            BufferId::Normals => PixelFormat::Normal,
            _ => PixelFormat::Color,
        }
    }
}

/// A buffer of any supported format
#[derive(Debug, Clone, PartialEq)]
pub enum BufferData {
    Color(ColorBuffer),
    Depth(DepthBuffer),
    Normal(NormalBuffer),
}

impl BufferData {
    /// Allocate a cleared buffer for `format`
    pub fn try_allocate(format: PixelFormat, width: u32, height: u32) -> Option<Self> {
        match format {
            PixelFormat::Color => FrameBuffer::try_new(width, height, RGBA::transparent()).map(BufferData::Color),
            PixelFormat::Depth => FrameBuffer::try_new(width, height, 1.0).map(BufferData::Depth),
            PixelFormat::Normal => FrameBuffer::try_new(width, height, Vec3::ZERO).map(BufferData::Normal),
        }
    }

    pub fn format(&self) -> PixelFormat {
        match self {
            BufferData::Color(_) => PixelFormat::Color,
            BufferData::Depth(_) => PixelFormat::Depth,
            BufferData::Normal(_) => PixelFormat::Normal,
        }
    }

    /// Copy pixels between buffers of the same format and size
    pub fn copy_from(&mut self, other: &BufferData) -> bool {
        match (self, other) {
            (BufferData::Color(dst), BufferData::Color(src)) => dst.copy_from(src),
            (BufferData::Depth(dst), BufferData::Depth(src)) => dst.copy_from(src),
            (BufferData::Normal(dst), BufferData::Normal(src)) => dst.copy_from(src),
            _ => false,
        }
    }

    pub fn as_color_mut(&mut self, id: BufferId) -> PassResult<&mut ColorBuffer> {
        match self {
            BufferData::Color(buf) => Ok(buf),
            other => Err(PassError::FormatMismatch { buffer: id, expected: PixelFormat::Color, found: other.format() }),
        }
    }

    pub fn as_depth_mut(&mut self, id: BufferId) -> PassResult<&mut DepthBuffer> {
        match self {
            BufferData::Depth(buf) => Ok(buf),
            other => Err(PassError::FormatMismatch { buffer: id, expected: PixelFormat::Depth, found: other.format() }),
        }
    }

    pub fn as_normal_mut(&mut self, id: BufferId) -> PassResult<&mut NormalBuffer> {
        match self {
            BufferData::Normal(buf) => Ok(buf),
            other => Err(PassError::FormatMismatch { buffer: id, expected: PixelFormat::Normal, found: other.format() }),
        }
    }
}

/// Storage for every buffer a pipeline routes, plus the per-frame record of
/// which buffers have been written.
#[derive(Debug)]
pub struct BufferPool {
    slots: [Option<BufferData>; BufferId::COUNT],
    written: [bool; BufferId::COUNT],
    width: u32,
    height: u32,
    epoch: u64,
}

impl BufferPool {
    pub fn new(width: u32, height: u32) -> Self {
        Self {
            slots: std::array::from_fn(|_| None),
            written: [false; BufferId::COUNT],
            width,
            height,
            epoch: 0,
        }
    }

    /// (Re)allocate the given buffers at a new resolution. Every previously
    /// held buffer is dropped and the written mask is cleared, so nothing from
    /// the old resolution can be read afterwards.
    pub fn reallocate(&mut self, ids: &[BufferId], width: u32, height: u32) {
        self.slots = std::array::from_fn(|_| None);
        self.written = [false; BufferId::COUNT];
        self.width = width;
        self.height = height;
        self.epoch += 1;

        for &id in ids {
            match BufferData::try_allocate(id.format(), width, height) {
                Some(data) => self.slots[id.index()] = Some(data),
                None => log::warn!("failed to allocate {:?} buffer at {}x{}", id, width, height),
            }
        }
    }

    pub fn dimensions(&self) -> (u32, u32) {
        (self.width, self.height)
    }

    /// Incremented every time the buffers are recreated
    pub fn epoch(&self) -> u64 {
        self.epoch
    }

    pub fn begin_frame(&mut self) {
        self.written = [false; BufferId::COUNT];
    }

    /// True if the buffer exists and was written during the current frame
    pub fn is_available(&self, id: BufferId) -> bool {
        self.written[id.index()] && self.slots[id.index()].is_some()
    }

    /// Drop a buffer, as a backend would after losing the allocation
    pub fn evict(&mut self, id: BufferId) {
        self.slots[id.index()] = None;
        self.written[id.index()] = false;
    }

    pub fn take(&mut self, id: BufferId) -> Option<BufferData> {
        self.slots[id.index()].take()
    }

    pub fn restore(&mut self, id: BufferId, data: BufferData) {
        self.slots[id.index()] = Some(data);
    }

    pub fn mark_written(&mut self, id: BufferId) {
        self.written[id.index()] = true;
    }

    fn readable(&self, id: BufferId) -> PassResult<&BufferData> {
        if !self.written[id.index()] {
            return Err(PassError::MissingInput(id));
        }
        self.slots[id.index()].as_ref().ok_or(PassError::MissingInput(id))
    }

    pub fn color(&self, id: BufferId) -> PassResult<&ColorBuffer> {
        match self.readable(id)? {
            BufferData::Color(buf) => Ok(buf),
            other => Err(PassError::FormatMismatch { buffer: id, expected: PixelFormat::Color, found: other.format() }),
        }
    }

    /// Like [`BufferPool::color`] but maps a missing buffer to `None`
    pub fn optional_color(&self, id: BufferId) -> PassResult<Option<&ColorBuffer>> {
        match self.color(id) {
            Ok(buf) => Ok(Some(buf)),
            Err(PassError::MissingInput(_)) => Ok(None),
            Err(e) => Err(e),
        }
    }

    pub fn depth(&self, id: BufferId) -> PassResult<&DepthBuffer> {
        match self.readable(id)? {
            BufferData::Depth(buf) => Ok(buf),
            other => Err(PassError::FormatMismatch { buffer: id, expected: PixelFormat::Depth, found: other.format() }),
        }
    }

    pub fn normals(&self, id: BufferId) -> PassResult<&NormalBuffer> {
        match self.readable(id)? {
            BufferData::Normal(buf) => Ok(buf),
            other => Err(PassError::FormatMismatch { buffer: id, expected: PixelFormat::Normal, found: other.format() }),
        }
    }

    /// Copy `src` into `dst` unmodified and mark `dst` written.
    /// Returns false if either buffer is unavailable or they differ in format.
    pub fn copy(&mut self, src: BufferId, dst: BufferId) -> bool {
        if !self.is_available(src) {
            return false;
        }
        let Some(mut target) = self.take(dst) else {
            return false;
        };
        let copied = match &self.slots[src.index()] {
            Some(source) => target.copy_from(source),
            None => false,
        };
        self.restore(dst, target);
        if copied {
            self.mark_written(dst);
        }
        copied
    }
}
