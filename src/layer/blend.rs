//! Blend modes for layer and surface compositing.
//!
//! Blend math itself operates on straight (unpremultiplied) channel values,
//! matching the Porter-Duff + Photoshop blend-mode conventions; inputs and
//! outputs are [`LinearRgba`] (premultiplied) since that is what surfaces
//! store internally.

use crate::color::lut::LinearRgba;
use serde::{Deserialize, Serialize};

/// Layer/surface blend mode.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum BlendMode {
    Normal,
    Dissolve,

    Darken,
    Multiply,
    ColorBurn,
    LinearBurn,
    DarkerColor,

    Lighten,
    Screen,
    ColorDodge,
    LinearDodge,
    LighterColor,

    Overlay,
    SoftLight,
    HardLight,
    VividLight,
    LinearLight,
    PinLight,
    HardMix,

    Difference,
    Exclusion,
    Subtract,
    Divide,

    Hue,
    Saturation,
    Color,
    Luminosity,
}

impl Default for BlendMode {
    fn default() -> Self {
        Self::Normal
    }
}

impl BlendMode {
    pub fn all() -> Vec<BlendMode> {
        vec![
            BlendMode::Normal,
            BlendMode::Dissolve,
            BlendMode::Darken,
            BlendMode::Multiply,
            BlendMode::ColorBurn,
            BlendMode::LinearBurn,
            BlendMode::DarkerColor,
            BlendMode::Lighten,
            BlendMode::Screen,
            BlendMode::ColorDodge,
            BlendMode::LinearDodge,
            BlendMode::LighterColor,
            BlendMode::Overlay,
            BlendMode::SoftLight,
            BlendMode::HardLight,
            BlendMode::VividLight,
            BlendMode::LinearLight,
            BlendMode::PinLight,
            BlendMode::HardMix,
            BlendMode::Difference,
            BlendMode::Exclusion,
            BlendMode::Subtract,
            BlendMode::Divide,
            BlendMode::Hue,
            BlendMode::Saturation,
            BlendMode::Color,
            BlendMode::Luminosity,
        ]
    }

    pub fn name(&self) -> &'static str {
        match self {
            BlendMode::Normal => "Normal",
            BlendMode::Dissolve => "Dissolve",
            BlendMode::Darken => "Darken",
            BlendMode::Multiply => "Multiply",
            BlendMode::ColorBurn => "Color Burn",
            BlendMode::LinearBurn => "Linear Burn",
            BlendMode::DarkerColor => "Darker Color",
            BlendMode::Lighten => "Lighten",
            BlendMode::Screen => "Screen",
            BlendMode::ColorDodge => "Color Dodge",
            BlendMode::LinearDodge => "Linear Dodge (Add)",
            BlendMode::LighterColor => "Lighter Color",
            BlendMode::Overlay => "Overlay",
            BlendMode::SoftLight => "Soft Light",
            BlendMode::HardLight => "Hard Light",
            BlendMode::VividLight => "Vivid Light",
            BlendMode::LinearLight => "Linear Light",
            BlendMode::PinLight => "Pin Light",
            BlendMode::HardMix => "Hard Mix",
            BlendMode::Difference => "Difference",
            BlendMode::Exclusion => "Exclusion",
            BlendMode::Subtract => "Subtract",
            BlendMode::Divide => "Divide",
            BlendMode::Hue => "Hue",
            BlendMode::Saturation => "Saturation",
            BlendMode::Color => "Color",
            BlendMode::Luminosity => "Luminosity",
        }
    }

    /// Blend `src` (premultiplied) over `dst` (premultiplied) using this
    /// mode. Unsupported modes fall back to `Normal` (source-over).
    pub fn blend(&self, src: LinearRgba, dst: LinearRgba) -> LinearRgba {
        if src.a <= 0.0 {
            return dst;
        }

        let base = dst.unpremultiplied();
        let top = src.unpremultiplied();

        let result = match self {
            BlendMode::Normal => top,
            BlendMode::Multiply => Self::channelwise(base, top, |b, s| b * s),
            BlendMode::Screen => Self::channelwise(base, top, |b, s| 1.0 - (1.0 - b) * (1.0 - s)),
            BlendMode::Overlay => Self::channelwise(base, top, Self::overlay_channel),
            BlendMode::Darken => Self::channelwise(base, top, f32::min),
            BlendMode::Lighten => Self::channelwise(base, top, f32::max),
            BlendMode::ColorDodge => Self::channelwise(base, top, Self::dodge_channel),
            BlendMode::ColorBurn => Self::channelwise(base, top, Self::burn_channel),
            BlendMode::HardLight => Self::channelwise(base, top, |b, s| Self::overlay_channel(s, b)),
            BlendMode::SoftLight => Self::channelwise(base, top, Self::soft_light_channel),
            BlendMode::Difference => Self::channelwise(base, top, |b, s| (b - s).abs()),
            BlendMode::Exclusion => Self::channelwise(base, top, |b, s| b + s - 2.0 * b * s),
            BlendMode::LinearDodge => Self::channelwise(base, top, |b, s| (b + s).min(1.0)),
            BlendMode::LinearBurn => Self::channelwise(base, top, |b, s| (b + s - 1.0).max(0.0)),
            BlendMode::Subtract => Self::channelwise(base, top, |b, s| (b - s).max(0.0)),
            BlendMode::Divide => Self::channelwise(base, top, Self::divide_channel),
            _ => top, // fallback to source-over for unimplemented modes
        };

        let out_a = top.a + base.a * (1.0 - top.a);
        if out_a <= 0.0 {
            return LinearRgba::default();
        }

        let straight_r = (result.r * top.a + base.r * base.a * (1.0 - top.a)) / out_a;
        let straight_g = (result.g * top.a + base.g * base.a * (1.0 - top.a)) / out_a;
        let straight_b = (result.b * top.a + base.b * base.a * (1.0 - top.a)) / out_a;

        LinearRgba::premultiply(straight_r, straight_g, straight_b, out_a)
    }

    fn channelwise(
        base: LinearRgba,
        top: LinearRgba,
        f: impl Fn(f32, f32) -> f32,
    ) -> LinearRgba {
        LinearRgba::new(f(base.r, top.r), f(base.g, top.g), f(base.b, top.b), top.a)
    }

    fn overlay_channel(b: f32, s: f32) -> f32 {
        if b < 0.5 {
            2.0 * b * s
        } else {
            1.0 - 2.0 * (1.0 - b) * (1.0 - s)
        }
    }

    fn dodge_channel(b: f32, s: f32) -> f32 {
        if s >= 1.0 {
            1.0
        } else {
            (b / (1.0 - s)).min(1.0)
        }
    }

    fn burn_channel(b: f32, s: f32) -> f32 {
        if s <= 0.0 {
            0.0
        } else {
            (1.0 - (1.0 - b) / s).max(0.0)
        }
    }

    fn soft_light_channel(b: f32, s: f32) -> f32 {
        if s < 0.5 {
            b - (1.0 - 2.0 * s) * b * (1.0 - b)
        } else {
            let d = if b < 0.25 {
                ((16.0 * b - 12.0) * b + 4.0) * b
            } else {
                b.sqrt()
            };
            b + (2.0 * s - 1.0) * (d - b)
        }
    }

    fn divide_channel(b: f32, s: f32) -> f32 {
        if s <= 0.0 {
            1.0
        } else {
            (b / s).min(1.0)
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn opaque(r: f32, g: f32, b: f32) -> LinearRgba {
        LinearRgba::premultiply(r, g, b, 1.0)
    }

    #[test]
    fn normal_blend_takes_source() {
        let base = opaque(1.0, 0.0, 0.0);
        let top = opaque(0.0, 1.0, 0.0);
        let result = BlendMode::Normal.blend(top, base);
        assert!((result.unpremultiplied().g - 1.0).abs() < 0.01);
    }

    #[test]
    fn multiply_blend() {
        let base = opaque(1.0, 0.5, 0.5);
        let top = opaque(0.5, 0.5, 0.5);
        let result = BlendMode::Multiply.blend(top, base).unpremultiplied();
        assert!((result.r - 0.5).abs() < 0.01);
        assert!((result.g - 0.25).abs() < 0.01);
    }

    #[test]
    fn unimplemented_mode_falls_back_to_normal() {
        let base = opaque(1.0, 0.0, 0.0);
        let top = opaque(0.0, 0.0, 1.0);
        let result = BlendMode::Hue.blend(top, base).unpremultiplied();
        assert!((result.b - 1.0).abs() < 0.01);
    }

    #[test]
    fn transparent_source_keeps_dst() {
        let base = opaque(0.2, 0.4, 0.6);
        let top = LinearRgba::new(0.0, 0.0, 0.0, 0.0);
        let result = BlendMode::Normal.blend(top, base);
        assert_eq!(result, base);
    }

    #[test]
    fn blend_mode_names() {
        assert_eq!(BlendMode::Normal.name(), "Normal");
        assert_eq!(BlendMode::Multiply.name(), "Multiply");
    }
}
