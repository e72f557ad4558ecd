//! sRGB<->linear lookup tables and linear-space premultiplied alpha helpers.
//!
//! All stroke rasterization happens in linear, premultiplied RGBA floats;
//! these tables are the only place sRGB<->linear conversion should occur.

use std::sync::OnceLock;

fn srgb_to_linear_analytic(c: f32) -> f32 {
    if c <= 0.04045 {
        c / 12.92
    } else {
        ((c + 0.055) / 1.055).powf(2.4)
    }
}

/// Analytic linear -> sRGB component conversion.
pub fn linear_to_srgb(c: f32) -> f32 {
    let c = c.clamp(0.0, 1.0);
    if c <= 0.0031308 {
        12.92 * c
    } else {
        1.055 * c.powf(1.0 / 2.4) - 0.055
    }
}

fn build_srgb_to_linear() -> [f32; 256] {
    let mut table = [0.0f32; 256];
    for (i, slot) in table.iter_mut().enumerate() {
        *slot = srgb_to_linear_analytic(i as f32 / 255.0);
    }
    table
}

fn build_linear_to_srgb8() -> [u8; 4096] {
    let mut table = [0u8; 4096];
    for (i, slot) in table.iter_mut().enumerate() {
        let linear = i as f32 / 4095.0;
        *slot = (linear_to_srgb(linear) * 255.0).round().clamp(0.0, 255.0) as u8;
    }
    table
}

static SRGB_TO_LINEAR_TABLE: OnceLock<[f32; 256]> = OnceLock::new();
static LINEAR_TO_SRGB8_TABLE: OnceLock<[u8; 4096]> = OnceLock::new();

/// 256-entry sRGB (8-bit index) -> linear (float) table.
pub fn srgb_to_linear(byte: u8) -> f32 {
    SRGB_TO_LINEAR_TABLE.get_or_init(build_srgb_to_linear)[byte as usize]
}

/// 4096-entry linear (quantized) -> sRGB 8-bit table.
pub fn linear_to_srgb8(linear: f32) -> u8 {
    let idx = (linear.clamp(0.0, 1.0) * 4095.0).round() as usize;
    LINEAR_TO_SRGB8_TABLE.get_or_init(build_linear_to_srgb8)[idx.min(4095)]
}

/// A linear, premultiplied RGBA color. All backend math operates in this
/// representation; conversion to/from sRGB straight alpha happens only at
/// surface read/write boundaries.
#[derive(Debug, Clone, Copy, PartialEq, Default)]
pub struct LinearRgba {
    pub r: f32,
    pub g: f32,
    pub b: f32,
    pub a: f32,
}

impl LinearRgba {
    pub fn new(r: f32, g: f32, b: f32, a: f32) -> Self {
        Self { r, g, b, a }
    }

    /// Build from an sRGB 8-bit straight-alpha pixel, premultiplying.
    pub fn from_srgb8_straight(r: u8, g: u8, b: u8, a: u8) -> Self {
        let a_f = a as f32 / 255.0;
        let lr = srgb_to_linear(r) * a_f;
        let lg = srgb_to_linear(g) * a_f;
        let lb = srgb_to_linear(b) * a_f;
        Self::new(lr, lg, lb, a_f)
    }

    /// Convert back to an sRGB 8-bit straight-alpha pixel, unpremultiplying.
    pub fn to_srgb8_straight(self) -> [u8; 4] {
        let unpremul = self.unpremultiplied();
        [
            linear_to_srgb8(unpremul.r),
            linear_to_srgb8(unpremul.g),
            linear_to_srgb8(unpremul.b),
            (self.a.clamp(0.0, 1.0) * 255.0).round() as u8,
        ]
    }

    /// Premultiply straight-alpha linear components.
    pub fn premultiply(r: f32, g: f32, b: f32, a: f32) -> Self {
        Self::new(r * a, g * a, b * a, a)
    }

    /// Divide color channels back out of premultiplied alpha.
    pub fn unpremultiplied(self) -> Self {
        if self.a <= 1e-6 {
            return Self::new(0.0, 0.0, 0.0, 0.0);
        }
        Self::new(self.r / self.a, self.g / self.a, self.b / self.a, self.a)
    }

    /// Porter-Duff "over": `self` on top of `dst`, both premultiplied.
    pub fn over(self, dst: LinearRgba) -> LinearRgba {
        let inv = 1.0 - self.a;
        LinearRgba::new(
            self.r + dst.r * inv,
            self.g + dst.g * inv,
            self.b + dst.b * inv,
            self.a + dst.a * inv,
        )
    }
}

/// Linear-space lerp between two premultiplied colors.
pub fn lerp_rgba_linear(a: LinearRgba, b: LinearRgba, t: f32) -> LinearRgba {
    LinearRgba::new(
        a.r + (b.r - a.r) * t,
        a.g + (b.g - a.g) * t,
        a.b + (b.b - a.b) * t,
        a.a + (b.a - a.a) * t,
    )
}
