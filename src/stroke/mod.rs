//! Stroke Placement
//!
//! Turns a calibrated input path into a sequence of [`Stamp`]s: resampling
//! by arc length, applying spacing/jitter/scatter/taper, and (optionally)
//! a predictive head nudge to compensate input latency.

use crate::math::{lerp, Mulberry32};
use crate::pressure::PointerKind;
use glam::Vec2;
use serde::{Deserialize, Serialize};

/// One raw input sample along the stroke path, in logical (CSS) pixels.
#[derive(Debug, Clone, Copy)]
pub struct PathPoint {
    pub x: f32,
    pub y: f32,
    pub t_ms: f64,
    pub raw_pressure: Option<f32>,
    pub pointer_kind: PointerKind,
    /// Pressure already calibrated by the pressure tracker, in `[0,1]`.
    pub pressure: f32,
}

impl PathPoint {
    pub fn position(&self) -> Vec2 {
        Vec2::new(self.x, self.y)
    }
}

/// A single dab placement produced by [`path_to_stamps`].
#[derive(Debug, Clone, Copy, Serialize, Deserialize)]
pub struct Stamp {
    pub x: f32,
    pub y: f32,
    pub angle_deg: f32,
    pub pressure: f32,
    pub t: f32,
    pub width_scale: f32,
    pub tangent_deg: f32,
}

/// Taper profile applied at one end of the stroke.
#[derive(Debug, Clone, Copy, Serialize, Deserialize)]
pub struct TaperProfile {
    /// Fraction of the stroke (by arc length) over which the taper acts.
    pub length_fraction: f32,
    /// Bias exponent shaping the taper curve (1.0 = linear ramp).
    pub end_bias: f32,
}

impl Default for TaperProfile {
    fn default() -> Self {
        Self {
            length_fraction: 0.0,
            end_bias: 1.0,
        }
    }
}

/// Options controlling stroke placement, sourced from a brush preset's
/// `strokePath`/`shape` sections.
#[derive(Debug, Clone, Copy, Serialize, Deserialize)]
pub struct PlacementOpts {
    pub base_size_px: f32,
    pub spacing_percent: f32,
    pub jitter_percent: f32,
    pub scatter_px: f32,
    pub stamps_per_step: u32,
    pub streamline_percent: f32,
    pub angle_jitter_deg: f32,
    pub follow_amount: f32,
    pub taper_start: TaperProfile,
    pub taper_end: TaperProfile,
    pub uniformity: f32,
    pub tip_min_px: f32,
    pub predict_px: f32,
    pub velocity_aware: bool,
    /// Strength of the velocity-aware spacing response (`kSpeed`). Only
    /// used when `velocity_aware` is set.
    pub k_speed: f32,
    pub min_step_px: f32,
    pub seed: u32,
}

impl Default for PlacementOpts {
    fn default() -> Self {
        Self {
            base_size_px: 10.0,
            spacing_percent: 20.0,
            jitter_percent: 0.0,
            scatter_px: 0.0,
            stamps_per_step: 1,
            streamline_percent: 0.0,
            angle_jitter_deg: 0.0,
            follow_amount: 0.0,
            taper_start: TaperProfile::default(),
            taper_end: TaperProfile::default(),
            uniformity: 1.0,
            tip_min_px: 0.5,
            predict_px: 0.0,
            velocity_aware: false,
            k_speed: 1.0,
            min_step_px: 0.25,
            seed: 1,
        }
    }
}

/// Apply a one-pole low-pass filter to the path. Returns smoothed
/// positions, same length as input, with pressure/time fields untouched.
fn streamline(path: &[PathPoint], streamline_percent: f32) -> Vec<Vec2> {
    let alpha = (1.0 - streamline_percent / 100.0).max(0.05);
    let mut out = Vec::with_capacity(path.len());
    let mut prev: Option<Vec2> = None;
    for p in path {
        let pos = p.position();
        let smoothed = match prev {
            Some(last) => last.lerp(pos, alpha),
            None => pos,
        };
        out.push(smoothed);
        prev = Some(smoothed);
    }
    out
}

struct ArcSample {
    pos: Vec2,
    pressure: f32,
    cumulative: f32,
    t: f32,
}

fn build_arc_table(path: &[PathPoint], smoothed: &[Vec2]) -> Vec<ArcSample> {
    let mut table = Vec::with_capacity(path.len());
    let mut cumulative = 0.0f32;
    for (i, p) in path.iter().enumerate() {
        if i > 0 {
            let seg = smoothed[i].distance(smoothed[i - 1]);
            cumulative += if seg < 1e-6 { 0.0 } else { seg };
        }
        table.push(ArcSample {
            pos: smoothed[i],
            pressure: p.pressure,
            cumulative,
            t: 0.0,
        });
    }
    let total = table.last().map(|s| s.cumulative).unwrap_or(0.0);
    if total > 1e-6 {
        for s in &mut table {
            s.t = s.cumulative / total;
        }
    }
    table
}

/// Sample the arc table at a given cumulative arc-length distance.
fn sample_at_distance(table: &[ArcSample], dist: f32) -> (Vec2, f32, f32, Vec2) {
    let (pos, pressure, t, tangent, _) = sample_at_distance_with_local_seg(table, dist);
    (pos, pressure, t, tangent)
}

/// As [`sample_at_distance`], but also returns the raw input segment length
/// bracketing `dist` — a proxy for local input speed, since raw samples
/// arrive at a roughly constant rate.
fn sample_at_distance_with_local_seg(table: &[ArcSample], dist: f32) -> (Vec2, f32, f32, Vec2, f32) {
    if table.len() == 1 {
        return (table[0].pos, table[0].pressure, table[0].t, Vec2::ZERO, 0.0);
    }
    for w in table.windows(2) {
        let (a, b) = (&w[0], &w[1]);
        if dist >= a.cumulative && dist <= b.cumulative {
            let seg_len = (b.cumulative - a.cumulative).max(1e-6);
            let local_t = ((dist - a.cumulative) / seg_len).clamp(0.0, 1.0);
            let pos = a.pos.lerp(b.pos, local_t);
            let pressure = lerp(a.pressure, b.pressure, local_t);
            let t = lerp(a.t, b.t, local_t);
            let tangent = (b.pos - a.pos).normalize_or_zero();
            return (pos, pressure, t, tangent, seg_len);
        }
    }
    let last = table.last().unwrap();
    let prev = &table[table.len() - 2];
    let tangent = (last.pos - prev.pos).normalize_or_zero();
    let seg_len = (last.cumulative - prev.cumulative).max(1e-6);
    (last.pos, last.pressure, last.t, tangent, seg_len)
}

fn taper_width(t: f32, start: TaperProfile, end: TaperProfile) -> f32 {
    let start_scale = if start.length_fraction > 1e-6 {
        let local = (t / start.length_fraction).clamp(0.0, 1.0);
        local.powf(start.end_bias.max(1e-3))
    } else {
        1.0
    };
    let end_scale = if end.length_fraction > 1e-6 {
        let local = ((1.0 - t) / end.length_fraction).clamp(0.0, 1.0);
        local.powf(end.end_bias.max(1e-3))
    } else {
        1.0
    };
    (start_scale * end_scale).clamp(0.0, 1.0)
}

/// Resample a calibrated path into backend-ready stamps.
///
/// Streamline smoothing is applied before the predictive head nudge (both
/// act on the path in that order when both are enabled) — see
/// `DESIGN.md`'s "streamline vs predict ordering" decision.
pub fn path_to_stamps(path: &[PathPoint], opts: &PlacementOpts) -> Vec<Stamp> {
    if path.is_empty() {
        return Vec::new();
    }
    if path.len() == 1 {
        let p = &path[0];
        return vec![Stamp {
            x: p.x,
            y: p.y,
            angle_deg: 0.0,
            pressure: p.pressure,
            t: 0.0,
            width_scale: taper_width(0.0, opts.taper_start, opts.taper_end),
            tangent_deg: 0.0,
        }];
    }

    let mut smoothed = streamline(path, opts.streamline_percent);

    if opts.predict_px > 0.0 {
        let n = smoothed.len();
        let tangent = (smoothed[n - 1] - smoothed[n - 2]).normalize_or_zero();
        let predict = opts.predict_px.min(24.0);
        let extended = smoothed[n - 1] + tangent * predict;
        smoothed.push(extended);
    }

    let arc_table = if smoothed.len() > path.len() {
        // account for the synthetic predicted point by reusing the last
        // real pressure/t for it.
        let mut extended_path: Vec<PathPoint> = path.to_vec();
        extended_path.push(*path.last().unwrap());
        build_arc_table(&extended_path, &smoothed)
    } else {
        build_arc_table(path, &smoothed)
    };

    let total_len = arc_table.last().map(|s| s.cumulative).unwrap_or(0.0);
    let step_px = (opts.spacing_percent / 100.0 * opts.base_size_px).max(0.25);

    let mut rng = Mulberry32::new(opts.seed);
    let mut stamps = Vec::new();
    let mut dist = 0.0f32;
    let n_stamps = opts.stamps_per_step.max(1);

    while dist <= total_len + 1e-6 {
        let step = if opts.velocity_aware {
            let (_, _, _, _, local_seg) = sample_at_distance_with_local_seg(&arc_table, dist);
            let factor = (1.0 + opts.k_speed * (local_seg / step_px - 1.0)).clamp(0.5, 2.0);
            (step_px * factor).max(opts.min_step_px)
        } else {
            step_px
        };

        let jitter_amount = (opts.jitter_percent / 100.0) * step * rng.next_signed();
        let sample_dist = (dist + jitter_amount).clamp(0.0, total_len);
        let (pos, pressure, t, tangent) = sample_at_distance(&arc_table, sample_dist);
        let tangent_deg = tangent.y.atan2(tangent.x).to_degrees();
        let normal = Vec2::new(-tangent.y, tangent.x);

        for k in 0..n_stamps {
            let lateral = if n_stamps > 1 {
                opts.scatter_px * ((k as f32 - (n_stamps as f32 - 1.0) / 2.0)
                    / (n_stamps as f32 - 1.0).max(1.0))
            } else {
                0.0
            };
            let extra = 0.25 * opts.scatter_px * rng.next_signed();
            let offset = normal * (lateral + extra);
            let stamp_pos = pos + offset;

            let angle_jitter = rng.range(-opts.angle_jitter_deg, opts.angle_jitter_deg);
            let angle_deg = opts.follow_amount * tangent_deg + angle_jitter;

            let mut width_scale = taper_width(t, opts.taper_start, opts.taper_end);
            width_scale = lerp(width_scale, 1.0, opts.uniformity).clamp(0.0, 1.0);

            stamps.push(Stamp {
                x: stamp_pos.x,
                y: stamp_pos.y,
                angle_deg,
                pressure,
                t,
                width_scale,
                tangent_deg,
            });
        }

        if step <= 1e-6 {
            break;
        }
        dist += step;
    }

    stamps
}

#[cfg(test)]
mod tests {
    use super::*;

    fn pp(x: f32, y: f32, t_ms: f64, pressure: f32) -> PathPoint {
        PathPoint {
            x,
            y,
            t_ms,
            raw_pressure: None,
            pointer_kind: PointerKind::Mouse,
            pressure,
        }
    }

    #[test]
    fn empty_path_yields_no_stamps() {
        let opts = PlacementOpts::default();
        assert!(path_to_stamps(&[], &opts).is_empty());
    }

    #[test]
    fn single_point_yields_one_stamp() {
        let opts = PlacementOpts::default();
        let stamps = path_to_stamps(&[pp(5.0, 5.0, 0.0, 1.0)], &opts);
        assert_eq!(stamps.len(), 1);
        assert_eq!(stamps[0].tangent_deg, 0.0);
    }

    #[test]
    fn straight_line_stamp_count_matches_scenario() {
        let mut opts = PlacementOpts::default();
        opts.base_size_px = 10.0;
        opts.spacing_percent = 20.0;
        opts.jitter_percent = 0.0;
        opts.scatter_px = 0.0;
        opts.stamps_per_step = 1;

        let path: Vec<PathPoint> = (0..=10)
            .map(|i| pp(i as f32 * 10.0, 0.0, i as f64 * 16.0, 1.0))
            .collect();
        let stamps = path_to_stamps(&path, &opts);

        // step = 2px over a 100px line -> 51 stamps at x = 0,2,4,...,100
        assert_eq!(stamps.len(), 51);
        for s in &stamps {
            assert!((s.y - 0.0).abs() < 1e-3);
            assert_eq!(s.angle_deg, 0.0);
        }
        assert!((stamps[0].x - 0.0).abs() < 1e-3);
        assert!((stamps.last().unwrap().x - 100.0).abs() < 1e-3);
    }

    #[test]
    fn zero_jitter_keeps_stamps_on_path() {
        let mut opts = PlacementOpts::default();
        opts.jitter_percent = 0.0;
        opts.scatter_px = 0.0;
        opts.angle_jitter_deg = 0.0;

        let path = vec![pp(0.0, 0.0, 0.0, 1.0), pp(50.0, 0.0, 50.0, 1.0)];
        let stamps = path_to_stamps(&path, &opts);
        for s in &stamps {
            assert!((s.y - 0.0).abs() < 1e-3);
        }
    }

    #[test]
    fn velocity_aware_spacing_widens_on_a_fast_long_segment() {
        let mut opts = PlacementOpts::default();
        opts.base_size_px = 10.0;
        opts.spacing_percent = 20.0; // nominal step = 2px
        opts.jitter_percent = 0.0;
        opts.scatter_px = 0.0;
        opts.velocity_aware = true;
        opts.k_speed = 1.0;
        opts.min_step_px = 0.25;

        // One huge raw segment (fast motion): localSeg >> nominal step, so
        // the factor should clamp to 2.0 and roughly halve the stamp count
        // relative to the non-velocity-aware bare step.
        let path = vec![pp(0.0, 0.0, 0.0, 1.0), pp(200.0, 0.0, 1.0, 1.0)];
        let aware = path_to_stamps(&path, &opts);

        opts.velocity_aware = false;
        let bare = path_to_stamps(&path, &opts);

        assert!(aware.len() < bare.len());
    }

    #[test]
    fn deterministic_given_same_seed() {
        let mut opts = PlacementOpts::default();
        opts.jitter_percent = 30.0;
        opts.scatter_px = 5.0;
        opts.seed = 77;

        let path = vec![pp(0.0, 0.0, 0.0, 1.0), pp(80.0, 40.0, 80.0, 1.0)];
        let a = path_to_stamps(&path, &opts);
        let b = path_to_stamps(&path, &opts);
        assert_eq!(a.len(), b.len());
        for (sa, sb) in a.iter().zip(b.iter()) {
            assert_eq!(sa.x, sb.x);
            assert_eq!(sa.y, sb.y);
        }
    }
}
