//! Pressure Tracker
//!
//! Turns raw pointer samples into a calibrated, smoothed pressure value in
//! `[0, 1]`. Combines hardware pressure (pen), velocity-synthesized pressure
//! (mouse/touch), temporal smoothing (EMA or One-Euro), velocity
//! compensation, and a final response curve.

use crate::math::{clamp01, lerp, MonotoneCurve};
use serde::{Deserialize, Serialize};

/// Pointer kind reported alongside a sample.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum PointerKind {
    Pen,
    Mouse,
    Touch,
    Unknown,
}

/// Shape applied when mapping speed into a synthesized pressure value.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum EaseShape {
    Linear,
    EaseIn,
    EaseOut,
    EaseInOut,
}

impl EaseShape {
    fn apply(self, t: f32) -> f32 {
        let t = t.clamp(0.0, 1.0);
        match self {
            EaseShape::Linear => t,
            EaseShape::EaseIn => t * t,
            EaseShape::EaseOut => 1.0 - (1.0 - t) * (1.0 - t),
            EaseShape::EaseInOut => {
                if t < 0.5 {
                    2.0 * t * t
                } else {
                    1.0 - (-2.0 * t + 2.0).powi(2) / 2.0
                }
            }
        }
    }
}

/// Raw pointer sample fed into the tracker.
#[derive(Debug, Clone, Copy)]
pub struct PressureSample {
    pub x: f32,
    pub y: f32,
    pub t_ms: f64,
    pub raw_pressure: Option<f32>,
    pub pointer_kind: PointerKind,
}

/// Velocity-based pressure synthesis settings.
#[derive(Debug, Clone, Copy, Serialize, Deserialize)]
pub struct SynthConfig {
    pub enabled: bool,
    pub speed_range: (f32, f32),
    pub min_pressure: f32,
    pub max_pressure: f32,
    pub curve: EaseShape,
}

impl Default for SynthConfig {
    fn default() -> Self {
        Self {
            enabled: false,
            speed_range: (0.0, 2000.0),
            min_pressure: 0.15,
            max_pressure: 1.0,
            curve: EaseShape::Linear,
        }
    }
}

/// Temporal smoothing mode.
#[derive(Debug, Clone, Copy, Serialize, Deserialize)]
pub enum Smoothing {
    None,
    Ema { alpha: f32 },
    OneEuro { min_cutoff: f32, beta: f32, d_cutoff: f32 },
}

impl Default for Smoothing {
    fn default() -> Self {
        Smoothing::OneEuro {
            min_cutoff: 1.0,
            beta: 0.3,
            d_cutoff: 1.0,
        }
    }
}

/// Full pressure-tracker configuration, as carried in a brush preset.
#[derive(Debug, Clone, Copy, Serialize, Deserialize)]
pub struct PressureConfig {
    pub clamp_min: f32,
    pub clamp_max: f32,
    pub synth: SynthConfig,
    pub smoothing: Smoothing,
    pub velocity_comp: Option<VelocityComp>,
    pub response_gamma: Option<f32>,
}

impl Default for PressureConfig {
    fn default() -> Self {
        Self {
            clamp_min: 0.0,
            clamp_max: 1.0,
            synth: SynthConfig::default(),
            smoothing: Smoothing::default(),
            velocity_comp: None,
            response_gamma: None,
        }
    }
}

/// `p *= clamp01(1 - k*speed/refSpeed)`.
#[derive(Debug, Clone, Copy, Serialize, Deserialize)]
pub struct VelocityComp {
    pub k: f32,
    pub ref_speed: f32,
}

fn one_euro_alpha(cutoff: f32, dt: f32) -> f32 {
    let tau = 1.0 / (2.0 * std::f32::consts::PI * cutoff.max(1e-6));
    1.0 / (1.0 + tau / dt.max(1e-6))
}

/// Low-pass filter state shared by One-Euro's value and derivative filters.
#[derive(Debug, Clone, Copy, Default)]
struct LowPass {
    value: Option<f32>,
}

impl LowPass {
    fn filter(&mut self, x: f32, alpha: f32) -> f32 {
        let y = match self.value {
            Some(prev) => alpha * x + (1.0 - alpha) * prev,
            None => x,
        };
        self.value = Some(y);
        y
    }
}

/// Stateful per-stroke pressure tracker. Reset at the start of every stroke.
pub struct PressureTracker {
    config: PressureConfig,
    curve: Option<MonotoneCurve>,
    last_sample: Option<PressureSample>,
    ema_value: Option<f32>,
    one_euro_value: LowPass,
    one_euro_deriv: LowPass,
    last_filtered: Option<f32>,
}

impl PressureTracker {
    pub fn new(config: PressureConfig) -> Self {
        Self {
            config,
            curve: None,
            last_sample: None,
            ema_value: None,
            one_euro_value: LowPass::default(),
            one_euro_deriv: LowPass::default(),
            last_filtered: None,
        }
    }

    pub fn with_curve(mut self, curve: MonotoneCurve) -> Self {
        self.curve = Some(curve);
        self
    }

    /// Clear all temporal state. Call between strokes.
    pub fn reset(&mut self) {
        self.last_sample = None;
        self.ema_value = None;
        self.one_euro_value = LowPass::default();
        self.one_euro_deriv = LowPass::default();
        self.last_filtered = None;
    }

    /// Process one sample, returning the calibrated pressure in `[0, 1]`.
    pub fn update(&mut self, sample: PressureSample) -> f32 {
        if sample.x.is_nan() || sample.y.is_nan() {
            return 1.0;
        }

        let dt = match self.last_sample {
            Some(prev) => {
                let raw_dt = (sample.t_ms - prev.t_ms) / 1000.0;
                if raw_dt <= 0.0 {
                    f32::EPSILON
                } else {
                    raw_dt as f32
                }
            }
            None => f32::EPSILON,
        };

        let speed = match self.last_sample {
            Some(prev) => {
                let dx = sample.x - prev.x;
                let dy = sample.y - prev.y;
                (dx * dx + dy * dy).sqrt() / dt
            }
            None => 0.0,
        };

        let mut pressure = self.base_pressure(&sample, speed);

        pressure = self.apply_smoothing(pressure, dt);

        if let Some(comp) = self.config.velocity_comp {
            if comp.ref_speed > 1e-6 {
                pressure *= clamp01(1.0 - comp.k * speed / comp.ref_speed);
            }
        }

        if let Some(curve) = &self.curve {
            pressure = curve.sample(clamp01(pressure));
        } else if let Some(gamma) = self.config.response_gamma {
            pressure = clamp01(pressure).powf(gamma);
        }

        let result = clamp01(pressure);
        self.last_sample = Some(sample);
        result
    }

    fn base_pressure(&self, sample: &PressureSample, speed: f32) -> f32 {
        if sample.pointer_kind == PointerKind::Pen {
            if let Some(raw) = sample.raw_pressure {
                if !raw.is_nan() {
                    return raw.clamp(self.config.clamp_min, self.config.clamp_max);
                }
            }
        }

        if self.config.synth.enabled {
            let (v0, v1) = self.config.synth.speed_range;
            let span = (v1 - v0).max(1e-6);
            let t = clamp01((speed - v0) / span);
            let shaped = self.config.synth.curve.apply(t);
            return lerp(
                self.config.synth.min_pressure,
                self.config.synth.max_pressure,
                shaped,
            );
        }

        1.0
    }

    fn apply_smoothing(&mut self, pressure: f32, dt: f32) -> f32 {
        match self.config.smoothing {
            Smoothing::None => pressure,
            Smoothing::Ema { alpha } => {
                let prev = self.ema_value.unwrap_or(pressure);
                let smoothed = alpha * pressure + (1.0 - alpha) * prev;
                self.ema_value = Some(smoothed);
                smoothed
            }
            Smoothing::OneEuro {
                min_cutoff,
                beta,
                d_cutoff,
            } => {
                let prev = self.last_filtered.unwrap_or(pressure);
                let deriv_raw = (pressure - prev) / dt;
                let deriv_alpha = one_euro_alpha(d_cutoff, dt);
                let deriv = self.one_euro_deriv.filter(deriv_raw, deriv_alpha);

                let cutoff = min_cutoff + beta * deriv.abs();
                let alpha = one_euro_alpha(cutoff, dt);
                let filtered = self.one_euro_value.filter(pressure, alpha);
                self.last_filtered = Some(filtered);
                filtered
            }
        }
    }
}
