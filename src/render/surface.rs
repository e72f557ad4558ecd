//! In-memory RGBA raster surface.
//!
//! The engine's `Surface` trait is implemented once, by a plain owned pixel
//! buffer — the re-architecture note in SPEC_FULL replaces the original
//! HTML-canvas-vs-offscreen-canvas polymorphism with this single type.

use crate::color::lut::LinearRgba;
use crate::layer::blend::BlendMode;

/// A 2D raster target holding linear, premultiplied RGBA floats.
///
/// Pixels are stored premultiplied-linear internally; conversion to/from
/// sRGB straight-alpha 8-bit buffers happens only at `read_pixels_srgb8` /
/// `write_pixels_srgb8`.
#[derive(Debug, Clone)]
pub struct Surface {
    width: u32,
    height: u32,
    pixels: Vec<LinearRgba>,
    blend: BlendMode,
    alpha: f32,
}

impl Surface {
    pub fn new(width: u32, height: u32) -> Self {
        Self {
            width,
            height,
            pixels: vec![LinearRgba::default(); (width * height) as usize],
            blend: BlendMode::Normal,
            alpha: 1.0,
        }
    }

    pub fn width(&self) -> u32 {
        self.width
    }

    pub fn height(&self) -> u32 {
        self.height
    }

    pub fn set_blend(&mut self, mode: BlendMode) {
        self.blend = mode;
    }

    pub fn set_alpha(&mut self, alpha: f32) {
        self.alpha = alpha.clamp(0.0, 1.0);
    }

    fn index(&self, x: i32, y: i32) -> Option<usize> {
        if x < 0 || y < 0 || x as u32 >= self.width || y as u32 >= self.height {
            return None;
        }
        Some((y as u32 * self.width + x as u32) as usize)
    }

    pub fn get(&self, x: i32, y: i32) -> LinearRgba {
        self.index(x, y).map(|i| self.pixels[i]).unwrap_or_default()
    }

    pub fn set(&mut self, x: i32, y: i32, color: LinearRgba) {
        if let Some(i) = self.index(x, y) {
            self.pixels[i] = color;
        }
    }

    /// Composite `color` over the existing pixel using Porter-Duff "over".
    pub fn blend_pixel(&mut self, x: i32, y: i32, color: LinearRgba) {
        if let Some(i) = self.index(x, y) {
            self.pixels[i] = color.over(self.pixels[i]);
        }
    }

    pub fn fill_rect(&mut self, x: i32, y: i32, w: u32, h: u32, color: LinearRgba) {
        for py in y..y + h as i32 {
            for px in x..x + w as i32 {
                self.set(px, py, color);
            }
        }
    }

    pub fn clear(&mut self) {
        self.pixels.fill(LinearRgba::default());
    }

    /// Composite every pixel of `other` onto `self` with this surface's
    /// configured blend mode and alpha, at an integer offset.
    pub fn draw_image(&mut self, other: &Surface, offset_x: i32, offset_y: i32) {
        let blend = self.blend;
        let alpha = self.alpha;
        for y in 0..other.height {
            for x in 0..other.width {
                let src = other.get(x as i32, y as i32);
                if src.a <= 0.0 {
                    continue;
                }
                let dx = offset_x + x as i32;
                let dy = offset_y + y as i32;
                let dst = self.get(dx, dy);
                let scaled = LinearRgba::new(src.r * alpha, src.g * alpha, src.b * alpha, src.a * alpha);
                let blended = blend.blend(scaled, dst);
                self.set(dx, dy, blended);
            }
        }
    }

    pub fn read_pixels(&self) -> &[LinearRgba] {
        &self.pixels
    }

    pub fn write_pixels(&mut self, pixels: Vec<LinearRgba>) {
        debug_assert_eq!(pixels.len(), self.pixels.len());
        self.pixels = pixels;
    }

    /// Read out as straight-alpha sRGB 8-bit RGBA bytes.
    pub fn read_pixels_srgb8(&self) -> Vec<u8> {
        let mut out = Vec::with_capacity(self.pixels.len() * 4);
        for p in &self.pixels {
            out.extend_from_slice(&p.to_srgb8_straight());
        }
        out
    }

    /// Overwrite from straight-alpha sRGB 8-bit RGBA bytes.
    pub fn write_pixels_srgb8(&mut self, bytes: &[u8]) {
        debug_assert_eq!(bytes.len(), self.pixels.len() * 4);
        for (i, chunk) in bytes.chunks_exact(4).enumerate() {
            self.pixels[i] = LinearRgba::from_srgb8_straight(chunk[0], chunk[1], chunk[2], chunk[3]);
        }
    }

    /// Bilinear sample in this surface's linear color space.
    pub fn sample_bilinear(&self, x: f32, y: f32) -> LinearRgba {
        let x0 = x.floor() as i32;
        let y0 = y.floor() as i32;
        let fx = x - x0 as f32;
        let fy = y - y0 as f32;

        let p00 = self.get(x0, y0);
        let p10 = self.get(x0 + 1, y0);
        let p01 = self.get(x0, y0 + 1);
        let p11 = self.get(x0 + 1, y0 + 1);

        let lerp = |a: f32, b: f32, t: f32| a + (b - a) * t;
        LinearRgba::new(
            lerp(lerp(p00.r, p10.r, fx), lerp(p01.r, p11.r, fx), fy),
            lerp(lerp(p00.g, p10.g, fx), lerp(p01.g, p11.g, fx), fy),
            lerp(lerp(p00.b, p10.b, fx), lerp(p01.b, p11.b, fx), fy),
            lerp(lerp(p00.a, p10.a, fx), lerp(p01.a, p11.a, fx), fy),
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn new_surface_is_transparent() {
        let surface = Surface::new(4, 4);
        for p in surface.read_pixels() {
            assert_eq!(p.a, 0.0);
        }
    }

    #[test]
    fn blend_pixel_composites_over() {
        let mut surface = Surface::new(2, 2);
        surface.set(0, 0, LinearRgba::new(0.0, 1.0, 0.0, 1.0));
        surface.blend_pixel(0, 0, LinearRgba::new(1.0, 0.0, 0.0, 0.5));
        let result = surface.get(0, 0);
        assert!(result.r > 0.0);
    }

    #[test]
    fn out_of_bounds_read_is_transparent() {
        let surface = Surface::new(2, 2);
        let p = surface.get(100, 100);
        assert_eq!(p.a, 0.0);
    }
}
