//! Stroke backends: stamping, ribbon, spray, wet, smudge.
//!
//! A `Backend` is a closed tag rather than a plugin registry — the
//! re-architecture note in SPEC_FULL replaces dynamic backend registration
//! with an exhaustive enum dispatched on the hot per-stamp path.

use crate::brush::context::BrushContext;
use crate::color::lut::LinearRgba;
use crate::layer::blend::BlendMode;
use crate::math::clamp01;
use crate::paper::{GrainCache, GrainKind, PaperSystem};
use crate::render::surface::Surface;
use crate::stroke::Stamp;
use serde::{Deserialize, Serialize};

/// Which rasterizer a brush preset resolves to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum Backend {
    Stamping,
    Ribbon,
    Spray,
    Wet,
    Smudge,
}

impl Default for Backend {
    fn default() -> Self {
        Backend::Stamping
    }
}

/// Tip and texture settings shared by all backends, resolved from a preset.
#[derive(Debug, Clone, Copy, Serialize, Deserialize)]
pub struct BrushStrokeSettings {
    /// `1.0` = circular tip, lower values flatten the tip into an ellipse.
    pub roundness: f32,
    /// Edge softness, `0..100`.
    pub softness: f32,
    /// Extra per-stamp rotation jitter in degrees, applied on top of tangent+followAmt.
    pub shape_angle_jitter_deg: f32,
    /// Per-stamp alpha, `0..1`.
    pub flow: f32,
    pub grain_kind: GrainKind,
    /// `0..1`; `0` disables the grain multiply pass.
    pub grain_depth: f32,
    pub grain_rotate_deg: f32,
    pub grain_scale: f32,
    /// Absolute floor applied to the stamp's rendered diameter.
    pub tip_min_px: f32,
    /// Wet backend only: draw a blurred rim where the blurred pass exceeds the sharp pass.
    pub wet_edges: bool,
    /// Smudge backend only: sampling radius in px.
    pub smudge_radius_px: f32,
}

impl Default for BrushStrokeSettings {
    fn default() -> Self {
        Self {
            roundness: 1.0,
            softness: 35.0,
            shape_angle_jitter_deg: 0.0,
            flow: 1.0,
            grain_kind: GrainKind::None,
            grain_depth: 0.0,
            grain_rotate_deg: 0.0,
            grain_scale: 1.0,
            tip_min_px: 0.75,
            wet_edges: false,
            smudge_radius_px: 14.0,
        }
    }
}

/// Paint a soft-edged oval tip, optionally shaded by a paper system and
/// optionally grain-multiplied, into `surface`.
fn draw_tip(
    surface: &mut Surface,
    stamp: &Stamp,
    size_px: f32,
    rotation_deg: f32,
    settings: &BrushStrokeSettings,
    color: LinearRgba,
    alpha_scale: f32,
    paper: Option<&PaperSystem>,
    grain_cache: Option<&GrainCache>,
    grain_seed: u32,
    grain_anchor: (f32, f32),
) {
    let diameter = (size_px * stamp.width_scale).max(settings.tip_min_px);
    let rx = (diameter * 0.5).max(0.05);
    let ry = (rx * settings.roundness.clamp(0.02, 1.0)).max(0.05);
    let blur = (settings.softness / 100.0 * size_px * 0.25).max(0.1);
    let rotation = rotation_deg.to_radians();
    let flow = clamp01(settings.flow * alpha_scale);
    if flow <= 0.0 {
        return;
    }

    let cos_r = rotation.cos();
    let sin_r = rotation.sin();
    let half = rx.max(ry) + blur + 1.0;
    let x0 = (stamp.x - half).floor() as i32;
    let x1 = (stamp.x + half).ceil() as i32;
    let y0 = (stamp.y - half).floor() as i32;
    let y1 = (stamp.y + half).ceil() as i32;

    for py in y0..=y1 {
        for px in x0..=x1 {
            let dx = px as f32 + 0.5 - stamp.x;
            let dy = py as f32 + 0.5 - stamp.y;
            // rotate into tip-local space
            let lx = dx * cos_r + dy * sin_r;
            let ly = -dx * sin_r + dy * cos_r;
            let d = ((lx / rx).powi(2) + (ly / ry).powi(2)).sqrt();
            let blur_norm = (blur / rx.max(ry)).max(1e-3);
            let coverage = 1.0 - crate::math::smoothstep(1.0 - blur_norm, 1.0 + blur_norm, d);
            if coverage <= 0.001 {
                continue;
            }

            let mut a = clamp01(coverage * flow);
            if let Some(p) = paper {
                a = p.shade_ink(a, px as f32, py as f32);
            }
            if a <= 0.0 {
                continue;
            }

            let scaled = LinearRgba::new(color.r * a, color.g * a, color.b * a, a);
            surface.blend_pixel(px, py, scaled);
        }
    }

    if settings.grain_depth > 0.0 {
        if let Some(cache) = grain_cache {
            apply_grain_patch(surface, stamp, rx.max(ry), settings, cache, grain_seed, grain_anchor);
        }
    }
}

/// Multiply a cached grain tile over the stamp footprint. The tile is
/// sampled in world space, rotated about `anchor` rather than the stamp's
/// own center, so the pattern holds its phase as the stroke moves on.
fn apply_grain_patch(
    surface: &mut Surface,
    stamp: &Stamp,
    radius: f32,
    settings: &BrushStrokeSettings,
    grain_cache: &GrainCache,
    seed: u32,
    anchor: (f32, f32),
) {
    let half = radius + 1.0;
    let grain_alpha = clamp01(0.22 * settings.grain_depth);
    let x0 = (stamp.x - half).floor() as i32;
    let x1 = (stamp.x + half).ceil() as i32;
    let y0 = (stamp.y - half).floor() as i32;
    let y1 = (stamp.y + half).ceil() as i32;

    for py in y0..=y1 {
        for px in x0..=x1 {
            let dx = px as f32 - stamp.x;
            let dy = py as f32 - stamp.y;
            if dx * dx + dy * dy > half * half {
                continue;
            }
            let pattern = PaperSystem::get_grain_pattern(
                grain_cache,
                settings.grain_kind,
                settings.grain_scale,
                seed,
                settings.grain_rotate_deg,
                anchor,
                px as f32,
                py as f32,
            );
            let src = LinearRgba::premultiply(pattern, pattern, pattern, grain_alpha);
            let dst = surface.get(px, py);
            let blended = BlendMode::Multiply.blend(src, dst);
            surface.set(px, py, blended);
        }
    }
}

/// Box-blur a surface in place over `radius_px`, operating on premultiplied
/// linear channels directly (unweighted by alpha, matching the paper tile
/// blur helper's separable-box approach).
fn box_blur(surface: &mut Surface, radius_px: f32) {
    let r = radius_px.round().max(1.0) as i32;
    let w = surface.width() as i32;
    let h = surface.height() as i32;
    let src: Vec<LinearRgba> = surface.read_pixels().to_vec();
    let get = |buf: &[LinearRgba], x: i32, y: i32| -> LinearRgba {
        if x < 0 || y < 0 || x >= w || y >= h {
            LinearRgba::default()
        } else {
            buf[(y * w + x) as usize]
        }
    };

    // horizontal pass
    let mut mid = vec![LinearRgba::default(); (w * h) as usize];
    for y in 0..h {
        for x in 0..w {
            let mut sum = LinearRgba::default();
            let mut n = 0.0f32;
            for dx in -r..=r {
                let s = get(&src, x + dx, y);
                sum = LinearRgba::new(sum.r + s.r, sum.g + s.g, sum.b + s.b, sum.a + s.a);
                n += 1.0;
            }
            mid[(y * w + x) as usize] = LinearRgba::new(sum.r / n, sum.g / n, sum.b / n, sum.a / n);
        }
    }

    // vertical pass
    let mut out = vec![LinearRgba::default(); (w * h) as usize];
    for y in 0..h {
        for x in 0..w {
            let mut sum = LinearRgba::default();
            let mut n = 0.0f32;
            for dy in -r..=r {
                let s = get(&mid, x, y + dy);
                sum = LinearRgba::new(sum.r + s.r, sum.g + s.g, sum.b + s.b, sum.a + s.a);
                n += 1.0;
            }
            out[(y * w + x) as usize] = LinearRgba::new(sum.r / n, sum.g / n, sum.b / n, sum.a / n);
        }
    }

    surface.write_pixels(out);
}

impl Backend {
    /// Draw `stamps` onto `target`, resolving this backend's specific pass
    /// structure. `base_size_px` is the placement options' unscaled tip size.
    #[allow(clippy::too_many_arguments)]
    pub fn draw(
        &self,
        target: &mut Surface,
        stamps: &[Stamp],
        base_size_px: f32,
        settings: &BrushStrokeSettings,
        color: LinearRgba,
        paper: Option<&PaperSystem>,
        grain_cache: Option<&GrainCache>,
        context: &mut BrushContext,
    ) {
        match self {
            Backend::Stamping | Backend::Spray => {
                for stamp in stamps {
                    let jitter = context.random_range(-1.0, 1.0) * settings.shape_angle_jitter_deg;
                    let anchor = context.grain_anchor(stamp.x, stamp.y);
                    draw_tip(
                        target,
                        stamp,
                        base_size_px,
                        stamp.angle_deg + jitter,
                        settings,
                        color,
                        1.0,
                        paper,
                        grain_cache,
                        context.seed,
                        anchor,
                    );
                }
            }
            Backend::Ribbon => {
                self.draw_ribbon(target, stamps, base_size_px, settings, color, paper);
            }
            Backend::Wet => {
                self.draw_wet(target, stamps, base_size_px, settings, color, paper, grain_cache, context);
            }
            Backend::Smudge => {
                self.draw_smudge(target, stamps, settings, context);
            }
        }
    }

    fn draw_ribbon(
        &self,
        target: &mut Surface,
        stamps: &[Stamp],
        base_size_px: f32,
        settings: &BrushStrokeSettings,
        color: LinearRgba,
        paper: Option<&PaperSystem>,
    ) {
        if stamps.is_empty() {
            return;
        }
        if stamps.len() == 1 {
            draw_tip(target, &stamps[0], base_size_px, stamps[0].tangent_deg, settings, color, 1.0, paper, None, 0, (0.0, 0.0));
            return;
        }
        for pair in stamps.windows(2) {
            let (a, b) = (&pair[0], &pair[1]);
            let seg_len = ((b.x - a.x).powi(2) + (b.y - a.y).powi(2)).sqrt();
            let steps = (seg_len / 1.5).ceil().max(1.0) as usize;
            for i in 0..=steps {
                let t = i as f32 / steps as f32;
                let interp = Stamp {
                    x: crate::math::lerp(a.x, b.x, t),
                    y: crate::math::lerp(a.y, b.y, t),
                    angle_deg: a.tangent_deg,
                    pressure: crate::math::lerp(a.pressure, b.pressure, t),
                    t: crate::math::lerp(a.t, b.t, t),
                    width_scale: crate::math::lerp(a.width_scale, b.width_scale, t),
                    tangent_deg: a.tangent_deg,
                };
                draw_tip(target, &interp, base_size_px, a.tangent_deg, settings, color, 1.0, paper, None, 0, (0.0, 0.0));
            }
        }
    }

    fn draw_wet(
        &self,
        target: &mut Surface,
        stamps: &[Stamp],
        base_size_px: f32,
        settings: &BrushStrokeSettings,
        color: LinearRgba,
        paper: Option<&PaperSystem>,
        grain_cache: Option<&GrainCache>,
        context: &mut BrushContext,
    ) {
        let w = target.width();
        let h = target.height();
        {
            let anchor = stamps.first().map(|s| context.grain_anchor(s.x, s.y)).unwrap_or((0.0, 0.0));
            let a = context.get_temp_layer("wet-a", w, h);
            a.clear();
            for stamp in stamps {
                draw_tip(a, stamp, base_size_px, stamp.angle_deg, settings, color, 1.0, paper, grain_cache, context.seed, anchor);
            }
        }

        let a_snapshot = context.get_temp_layer("wet-a", w, h).clone();
        let mut b = a_snapshot.clone();
        box_blur(&mut b, 2.0);

        if settings.wet_edges {
            let mut rim = b.clone();
            for (px, dst) in rim_pixels(&b, &a_snapshot).into_iter() {
                rim.set(px.0, px.1, dst);
            }
            box_blur(&mut rim, 0.7);
            target.set_blend(BlendMode::Multiply);
            target.set_alpha(0.25);
            target.draw_image(&rim, 0, 0);
        }

        target.set_blend(BlendMode::Normal);
        target.set_alpha(0.85);
        target.draw_image(&b, 0, 0);
        target.set_alpha(1.0);
        target.draw_image(&a_snapshot, 0, 0);
    }

    fn draw_smudge(
        &self,
        target: &mut Surface,
        stamps: &[Stamp],
        settings: &BrushStrokeSettings,
        context: &mut BrushContext,
    ) {
        let source = match context.smudge_source() {
            Some(s) => s.clone(),
            None => return,
        };
        let radius = settings.smudge_radius_px.max(1.0);
        let advance = (radius * 0.6).min(12.0);

        for pair in stamps.windows(2) {
            let (a, b) = (&pair[0], &pair[1]);
            let dx = b.x - a.x;
            let dy = b.y - a.y;
            let len = (dx * dx + dy * dy).sqrt();
            let (nx, ny) = if len > 1e-6 { (dx / len, dy / len) } else { (0.0, 0.0) };

            let r = radius.ceil() as i32;
            for oy in -r..=r {
                for ox in -r..=r {
                    let d2 = (ox * ox + oy * oy) as f32;
                    if d2 > radius * radius {
                        continue;
                    }
                    let sx = a.x + ox as f32;
                    let sy = a.y + oy as f32;
                    if sx < 0.0 || sy < 0.0 || sx >= source.width() as f32 || sy >= source.height() as f32 {
                        continue;
                    }
                    let sample = source.get(sx as i32, sy as i32);
                    if sample.a <= 0.0 {
                        continue;
                    }
                    let k = (1.0 - d2 / (radius * radius)).max(0.0);
                    let scaled = LinearRgba::new(sample.r * k, sample.g * k, sample.b * k, sample.a * k);
                    let dest_x = (a.x + advance * nx + ox as f32).round() as i32;
                    let dest_y = (a.y + advance * ny + oy as f32).round() as i32;
                    target.blend_pixel(dest_x, dest_y, scaled);
                }
            }
        }
    }
}

fn rim_pixels(blurred: &Surface, sharp: &Surface) -> Vec<((i32, i32), LinearRgba)> {
    let w = blurred.width() as i32;
    let h = blurred.height() as i32;
    let mut out = Vec::new();
    for y in 0..h {
        for x in 0..w {
            let bp = blurred.get(x, y);
            let sp = sharp.get(x, y);
            let diff = (bp.a - sp.a).max(0.0);
            if diff > 0.0 {
                out.push(((x, y), LinearRgba::new(bp.r, bp.g, bp.b, diff)));
            }
        }
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::color::lut::LinearRgba;

    fn context() -> BrushContext {
        BrushContext::new(64, 64, 1.0, 1, LinearRgba::premultiply(0.0, 0.0, 0.0, 1.0))
    }

    fn one_stamp() -> Vec<Stamp> {
        vec![Stamp { x: 32.0, y: 32.0, angle_deg: 0.0, pressure: 1.0, t: 0.0, width_scale: 1.0, tangent_deg: 0.0 }]
    }

    #[test]
    fn grain_anchor_stays_pinned_across_stamps_in_a_stroke() {
        let mut ctx = context();
        let stamps = vec![
            Stamp { x: 5.0, y: 5.0, angle_deg: 0.0, pressure: 1.0, t: 0.0, width_scale: 1.0, tangent_deg: 0.0 },
            Stamp { x: 40.0, y: 50.0, angle_deg: 0.0, pressure: 1.0, t: 1.0, width_scale: 1.0, tangent_deg: 0.0 },
        ];
        let settings = BrushStrokeSettings {
            grain_kind: crate::paper::GrainKind::Paper,
            grain_depth: 1.0,
            grain_rotate_deg: 45.0,
            ..BrushStrokeSettings::default()
        };
        let mut surface = Surface::new(64, 64);
        let color = LinearRgba::premultiply(0.0, 0.0, 1.0, 1.0);
        let cache = GrainCache::new();
        Backend::Stamping.draw(&mut surface, &stamps, 20.0, &settings, color, None, Some(&cache), &mut ctx);
        assert!(ctx.grain_anchor(999.0, 999.0) == (5.0, 5.0));
    }

    #[test]
    fn stamping_paints_visible_pixels() {
        let mut surface = Surface::new(64, 64);
        let mut ctx = context();
        let settings = BrushStrokeSettings::default();
        let color = LinearRgba::premultiply(1.0, 0.0, 0.0, 1.0);
        Backend::Stamping.draw(&mut surface, &one_stamp(), 20.0, &settings, color, None, None, &mut ctx);
        assert!(surface.get(32, 32).a > 0.0);
    }

    #[test]
    fn ribbon_connects_two_stamps() {
        let mut surface = Surface::new(64, 64);
        let mut ctx = context();
        let settings = BrushStrokeSettings::default();
        let color = LinearRgba::premultiply(0.0, 1.0, 0.0, 1.0);
        let stamps = vec![
            Stamp { x: 10.0, y: 32.0, angle_deg: 0.0, pressure: 1.0, t: 0.0, width_scale: 1.0, tangent_deg: 0.0 },
            Stamp { x: 50.0, y: 32.0, angle_deg: 0.0, pressure: 1.0, t: 1.0, width_scale: 1.0, tangent_deg: 0.0 },
        ];
        Backend::Ribbon.draw(&mut surface, &stamps, 12.0, &settings, color, None, None, &mut ctx);
        assert!(surface.get(30, 32).a > 0.0);
    }

    #[test]
    fn smudge_without_source_is_noop() {
        let mut surface = Surface::new(20, 20);
        let mut ctx = context();
        let settings = BrushStrokeSettings::default();
        let stamps = vec![
            Stamp { x: 5.0, y: 5.0, angle_deg: 0.0, pressure: 1.0, t: 0.0, width_scale: 1.0, tangent_deg: 0.0 },
            Stamp { x: 10.0, y: 5.0, angle_deg: 0.0, pressure: 1.0, t: 1.0, width_scale: 1.0, tangent_deg: 0.0 },
        ];
        Backend::Smudge.draw(&mut surface, &stamps, 10.0, &settings, LinearRgba::default(), None, None, &mut ctx);
        for p in surface.read_pixels() {
            assert_eq!(p.a, 0.0);
        }
    }

    #[test]
    fn smudge_does_not_introduce_new_color() {
        let mut target = Surface::new(40, 40);
        let mut ctx = context();
        let mut pre = Surface::new(40, 40);
        pre.fill_rect(15, 15, 10, 10, LinearRgba::premultiply(1.0, 0.0, 0.0, 1.0));
        ctx.ensure_smudge_source(&pre);

        let settings = BrushStrokeSettings { smudge_radius_px: 8.0, ..BrushStrokeSettings::default() };
        let stamps = vec![
            Stamp { x: 20.0, y: 20.0, angle_deg: 0.0, pressure: 1.0, t: 0.0, width_scale: 1.0, tangent_deg: 0.0 },
            Stamp { x: 30.0, y: 20.0, angle_deg: 0.0, pressure: 1.0, t: 1.0, width_scale: 1.0, tangent_deg: 0.0 },
        ];
        Backend::Smudge.draw(&mut target, &stamps, 10.0, &settings, LinearRgba::default(), None, None, &mut ctx);

        for p in target.read_pixels() {
            assert!(p.g <= 0.001);
            assert!(p.b <= 0.001);
        }
    }
}
