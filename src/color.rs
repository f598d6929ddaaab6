//! Linear color type and the small shader-style helpers the passes share.
//!
//! Colors are stored as f32 per channel so values above 1.0 survive until
//! tone-mapping in the composite pass.

use serde::{Deserialize, Serialize};
use std::ops::{Add, AddAssign, Mul, Sub};

/// Rec. 709 luminance weights
pub const LUMA: RGBA = RGBA::rgb(0.2126, 0.7152, 0.0722);

/// RGBA color with floating point components
#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize)]
pub struct RGBA {
    pub r: f32,
    pub g: f32,
    pub b: f32,
    #[serde(default = "opaque")]
    pub a: f32,
}

fn opaque() -> f32 {
    1.0
}

impl RGBA {
    pub const fn new(r: f32, g: f32, b: f32, a: f32) -> Self {
        RGBA { r, g, b, a }
    }

    /// Opaque color from three channels
    pub const fn rgb(r: f32, g: f32, b: f32) -> Self {
        RGBA { r, g, b, a: 1.0 }
    }

    pub const fn black() -> Self {
        RGBA { r: 0.0, g: 0.0, b: 0.0, a: 1.0 }
    }

    /// Fully transparent black; the "no outline" value
    pub const fn transparent() -> Self {
        RGBA { r: 0.0, g: 0.0, b: 0.0, a: 0.0 }
    }

    pub const fn splat(v: f32) -> Self {
        RGBA { r: v, g: v, b: v, a: 1.0 }
    }

    /// Dot product over the RGB channels only
    #[inline]
    pub fn dot(self, other: RGBA) -> f32 {
        self.r * other.r + self.g * other.g + self.b * other.b
    }

    #[inline]
    pub fn luma(self) -> f32 {
        self.dot(LUMA)
    }

    /// Applies `f` to each RGB channel, keeping alpha
    #[inline]
    pub fn map(self, f: impl Fn(f32) -> f32) -> Self {
        RGBA { r: f(self.r), g: f(self.g), b: f(self.b), a: self.a }
    }

    /// Same color with a different alpha
    #[inline]
    pub fn with_alpha(self, a: f32) -> Self {
        RGBA { a, ..self }
    }

    /// Per-channel RGB product
    #[inline]
    pub fn modulate(self, other: RGBA) -> Self {
        RGBA { r: self.r * other.r, g: self.g * other.g, b: self.b * other.b, a: self.a }
    }
}

impl Add for RGBA {
    type Output = RGBA;

    #[inline]
    fn add(self, rhs: RGBA) -> RGBA {
        RGBA { r: self.r + rhs.r, g: self.g + rhs.g, b: self.b + rhs.b, a: self.a }
    }
}

impl AddAssign for RGBA {
    #[inline]
    fn add_assign(&mut self, rhs: RGBA) {
        self.r += rhs.r;
        self.g += rhs.g;
        self.b += rhs.b;
    }
}

impl Sub for RGBA {
    type Output = RGBA;

    #[inline]
    fn sub(self, rhs: RGBA) -> RGBA {
        RGBA { r: self.r - rhs.r, g: self.g - rhs.g, b: self.b - rhs.b, a: self.a }
    }
}

impl Mul<f32> for RGBA {
    type Output = RGBA;

    #[inline]
    fn mul(self, s: f32) -> RGBA {
        RGBA { r: self.r * s, g: self.g * s, b: self.b * s, a: self.a }
    }
}

/// Linear interpolation `a + (b - a) * t`, GLSL `mix`
#[inline]
pub fn mix(a: f32, b: f32, t: f32) -> f32 {
    a + (b - a) * t
}

/// Channel-wise `mix` on RGB; alpha is taken from `a`
#[inline]
pub fn mix_rgb(a: RGBA, b: RGBA, t: f32) -> RGBA {
    RGBA {
        r: mix(a.r, b.r, t),
        g: mix(a.g, b.g, t),
        b: mix(a.b, b.b, t),
        a: a.a,
    }
}

/// Hermite smoothstep; returns 0 below `edge0` and 1 above `edge1`
#[inline]
pub fn smoothstep(edge0: f32, edge1: f32, x: f32) -> f32 {
    let t = ((x - edge0) / (edge1 - edge0)).clamp(0.0, 1.0);
    t * t * (3.0 - 2.0 * t)
}
