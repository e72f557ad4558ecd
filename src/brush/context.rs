//! Per-stroke brush context.
//!
//! Created when a stroke begins and dropped when it ends. Holds everything
//! that is scoped to a single stroke: the deterministic RNG, a smoothed
//! velocity estimate, grain phase anchoring, and a registry of scratch
//! surfaces reused by backends across stamps.

use crate::math::Mulberry32;
use crate::render::surface::Surface;
use std::collections::HashMap;

/// Exponentially-smoothed velocity tracked across a stroke.
#[derive(Debug, Clone, Copy, Default)]
pub struct VelocityState {
    pub last_x: f32,
    pub last_y: f32,
    pub last_t_ms: f64,
    pub smoothed: f32,
    pub has_sample: bool,
}

/// Grain phase anchor, kept stable across a stroke so rotated grain tiles
/// don't swim from stamp to stamp.
#[derive(Debug, Clone, Copy, Default)]
pub struct GrainPhase {
    pub phase_x: f32,
    pub phase_y: f32,
    pub last_head_x: f32,
    pub last_head_y: f32,
    anchored: bool,
}

/// Milliseconds over which velocity smoothing reaches steady state.
const DEFAULT_SMOOTHING_MS: f64 = 80.0;

/// Per-stroke singleton borrowed exclusively by the active backend.
pub struct BrushContext {
    pub width: u32,
    pub height: u32,
    pub dpr: f32,
    pub seed: u32,
    rng: Mulberry32,
    pub color_linear: crate::color::lut::LinearRgba,
    pub velocity: VelocityState,
    pub grain: GrainPhase,
    scratch_layers: HashMap<(String, u32, u32), Surface>,
    smudge_source: Option<Surface>,
    sample_index: u64,
    stamp_index: u64,
}

impl BrushContext {
    pub fn new(width: u32, height: u32, dpr: f32, seed: u32, color_linear: crate::color::lut::LinearRgba) -> Self {
        Self {
            width,
            height,
            dpr,
            seed,
            rng: Mulberry32::new(seed),
            color_linear,
            velocity: VelocityState::default(),
            grain: GrainPhase::default(),
            scratch_layers: HashMap::new(),
            smudge_source: None,
            sample_index: 0,
            stamp_index: 0,
        }
    }

    /// Deterministic uniform sample in `[0,1)`, advancing the stroke RNG.
    pub fn next_random(&mut self) -> f32 {
        self.rng.next_f32()
    }

    /// `next_random` scaled to `[lo, hi)`.
    pub fn random_range(&mut self, lo: f32, hi: f32) -> f32 {
        self.rng.range(lo, hi)
    }

    /// Update the smoothed velocity estimate from a new pointer position.
    ///
    /// `k = min(1, dt/smoothingMs)`, `s += k*(inst - s)`.
    pub fn update_velocity(&mut self, x: f32, y: f32, now_ms: f64) -> (f32, f32) {
        if !self.velocity.has_sample {
            self.velocity = VelocityState {
                last_x: x,
                last_y: y,
                last_t_ms: now_ms,
                smoothed: 0.0,
                has_sample: true,
            };
            return (0.0, 0.0);
        }

        let dt = (now_ms - self.velocity.last_t_ms).max(0.0);
        let dx = x - self.velocity.last_x;
        let dy = y - self.velocity.last_y;
        let dist = (dx * dx + dy * dy).sqrt();
        let inst = if dt > 1e-6 { dist / (dt as f32 / 1000.0) } else { 0.0 };

        let k = (dt / DEFAULT_SMOOTHING_MS).min(1.0) as f32;
        self.velocity.smoothed += k * (inst - self.velocity.smoothed);
        self.velocity.last_x = x;
        self.velocity.last_y = y;
        self.velocity.last_t_ms = now_ms;

        (inst, self.velocity.smoothed)
    }

    /// Fetch (creating if needed) a scratch surface keyed by a tag and exact
    /// pixel size. Reused across stamps sharing the same key/size.
    pub fn get_temp_layer(&mut self, key: &str, px_w: u32, px_h: u32) -> &mut Surface {
        self.scratch_layers
            .entry((key.to_string(), px_w, px_h))
            .or_insert_with(|| Surface::new(px_w, px_h))
    }

    /// Lazily snapshot the active layer's current pixels so smudge reads
    /// from pre-stroke state regardless of what's already been painted this
    /// stroke.
    pub fn ensure_smudge_source(&mut self, from_layer: &Surface) -> &Surface {
        if self.smudge_source.is_none() {
            self.smudge_source = Some(from_layer.clone());
        }
        self.smudge_source.as_ref().unwrap()
    }

    pub fn smudge_source(&self) -> Option<&Surface> {
        self.smudge_source.as_ref()
    }

    pub fn next_sample_index(&mut self) -> u64 {
        let i = self.sample_index;
        self.sample_index += 1;
        i
    }

    pub fn next_stamp_index(&mut self) -> u64 {
        let i = self.stamp_index;
        self.stamp_index += 1;
        i
    }

    /// Stable grain-rotation anchor for this stroke. Pinned to the first
    /// stamp position seen; every later call returns that same point so
    /// grain tiles rotate in place instead of swimming stamp to stamp.
    pub fn grain_anchor(&mut self, x: f32, y: f32) -> (f32, f32) {
        if !self.grain.anchored {
            self.grain.phase_x = x;
            self.grain.phase_y = y;
            self.grain.anchored = true;
        }
        self.grain.last_head_x = x;
        self.grain.last_head_y = y;
        (self.grain.phase_x, self.grain.phase_y)
    }

    /// Seed this stroke's grain anchor from a previous stroke's carried
    /// phase. Used when a preset has `grain.persist_phase` set, so a
    /// rotated grain tile keeps its phase across separate, connected marks
    /// instead of re-anchoring to each new stroke's first stamp.
    pub fn seed_grain_phase(&mut self, phase: GrainPhase) {
        self.grain = phase;
    }

    /// This stroke's grain phase, to hand to `seed_grain_phase` on the next
    /// stroke when the preset asks for continuity.
    pub fn grain_phase(&self) -> GrainPhase {
        self.grain
    }
}
