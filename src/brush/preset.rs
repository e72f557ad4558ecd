//! Brush preset format and resolution.
//!
//! A preset is the stable JSON contract a host hands the engine. Resolving
//! one produces plain engine-ready values (a [`Backend`] tag plus the
//! placement/pressure/stroke-rendering structs those modules already own) —
//! the preset format never leaks past this module.

use crate::math::{lerp, CurvePoint, MonotoneCurve};
use crate::paper::GrainKind;
use crate::pressure::PressureConfig;
use crate::render::backend::{Backend, BrushStrokeSettings};
use crate::stroke::{PlacementOpts, Stamp, TaperProfile};

use serde::{Deserialize, Serialize};

fn default_size_pressure_curve() -> Vec<[f32; 2]> {
    vec![[0.0, 0.0], [1.0, 1.0]]
}

/// Tip geometry and the pressure→size response.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ShapeParams {
    #[serde(rename = "type")]
    pub kind: String,
    pub roundness: f32,
    pub softness: Option<f32>,
    pub angle: f32,
    #[serde(rename = "sizeScale")]
    pub size_scale: f32,
    #[serde(rename = "minSizeRatio")]
    pub min_size_ratio: f32,
    #[serde(rename = "sizePressureCurve")]
    pub size_pressure_curve: Vec<[f32; 2]>,
}

impl Default for ShapeParams {
    fn default() -> Self {
        Self {
            kind: "round".into(),
            roundness: 1.0,
            softness: None,
            angle: 0.0,
            size_scale: 1.0,
            min_size_ratio: 0.3,
            size_pressure_curve: default_size_pressure_curve(),
        }
    }
}

/// Placement tuning: spacing/jitter/scatter/count/streamline, percentages
/// except where noted. `None` means "use this backend's default".
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct StrokePathParams {
    pub spacing: Option<f32>,
    pub jitter: Option<f32>,
    pub scatter: Option<f32>,
    pub count: Option<u32>,
    pub streamline: Option<f32>,
}

impl Default for StrokePathParams {
    fn default() -> Self {
        Self { spacing: None, jitter: None, scatter: None, count: None, streamline: None }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct GrainParams {
    pub kind: GrainKind,
    pub depth: f32,
    pub scale: f32,
    pub rotate: f32,
    /// Carry the grain rotation anchor over from the previous stroke
    /// instead of re-anchoring to this stroke's first stamp. Lets
    /// separate, connected marks read as one continuous grain pattern.
    #[serde(rename = "persistPhase")]
    pub persist_phase: bool,
}

impl Default for GrainParams {
    fn default() -> Self {
        Self { kind: GrainKind::None, depth: 0.0, scale: 1.0, rotate: 0.0, persist_phase: false }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct RenderingParams {
    pub mode: String,
    #[serde(rename = "wetEdges")]
    pub wet_edges: bool,
    pub flow: Option<f32>,
}

impl Default for RenderingParams {
    fn default() -> Self {
        Self { mode: "normal".into(), wet_edges: false, flow: None }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct InputParams {
    pub pressure: PressureConfig,
}

impl Default for InputParams {
    fn default() -> Self {
        Self { pressure: PressureConfig::default() }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct EngineParams {
    pub backend: String,
    #[serde(rename = "baseSize")]
    pub base_size_px: f32,
    pub shape: ShapeParams,
    #[serde(rename = "strokePath")]
    pub stroke_path: StrokePathParams,
    pub grain: GrainParams,
    pub rendering: RenderingParams,
    pub input: InputParams,
}

impl Default for EngineParams {
    fn default() -> Self {
        Self {
            backend: "stamping".into(),
            base_size_px: 10.0,
            shape: ShapeParams::default(),
            stroke_path: StrokePathParams::default(),
            grain: GrainParams::default(),
            rendering: RenderingParams::default(),
            input: InputParams::default(),
        }
    }
}

/// A brush preset, as handed to `Engine::begin_stroke`.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct BrushPreset {
    pub id: String,
    pub name: String,
    pub engine: EngineParams,
}

impl Default for BrushPreset {
    fn default() -> Self {
        Self { id: String::new(), name: String::new(), engine: EngineParams::default() }
    }
}

fn parse_backend(name: &str) -> Backend {
    match name {
        "stamping" | "auto" => Backend::Stamping,
        "ribbon" => Backend::Ribbon,
        "spray" => Backend::Spray,
        "wet" => Backend::Wet,
        "smudge" => Backend::Smudge,
        other => {
            log::warn!("unknown brush backend '{other}', falling back to stamping");
            Backend::Stamping
        }
    }
}

/// A preset resolved into the concrete values the rest of the engine
/// consumes. Built once per stroke.
pub struct ResolvedBrush {
    pub backend: Backend,
    pub placement: PlacementOpts,
    pub pressure: PressureConfig,
    pub stroke_settings: BrushStrokeSettings,
    pub min_size_ratio: f32,
    pub size_pressure_curve: MonotoneCurve,
    pub constant_angle_deg: f32,
}

impl ResolvedBrush {
    /// Fold the preset's pressure→size response into each stamp's
    /// `width_scale`, and apply the shape's constant angle offset. Call
    /// once, right after `path_to_stamps`.
    pub fn apply_shape_dynamics(&self, stamps: &mut [Stamp]) {
        for stamp in stamps {
            let response = self.size_pressure_curve.sample(stamp.pressure.clamp(0.0, 1.0));
            let size_factor = lerp(self.min_size_ratio, 1.0, response);
            stamp.width_scale = (stamp.width_scale * size_factor).clamp(0.0, 1.0);
            stamp.angle_deg += self.constant_angle_deg;
        }
    }
}

impl BrushPreset {
    /// Resolve this preset into concrete engine settings. `seed` is the
    /// per-stroke RNG seed, threaded into [`PlacementOpts`].
    pub fn resolve(&self, seed: u32) -> ResolvedBrush {
        let backend = parse_backend(&self.engine.backend);
        let is_spray = backend == Backend::Spray;
        let is_wet = backend == Backend::Wet;

        let stroke_path = &self.engine.stroke_path;
        let spacing_percent = stroke_path.spacing.unwrap_or(if is_spray { 6.0 } else { 20.0 }).max(0.1);
        let jitter_percent = stroke_path.jitter.unwrap_or(if is_spray { 40.0 } else { 0.0 }).max(0.0);
        let scatter_px = stroke_path.scatter.unwrap_or(if is_spray { 18.0 } else { 0.0 }).max(0.0);
        let stamps_per_step = stroke_path.count.unwrap_or(if is_spray { 18 } else { 1 }).max(1);
        let streamline_percent = stroke_path.streamline.unwrap_or(0.0).clamp(0.0, 100.0);

        let shape = &self.engine.shape;
        let softness = shape
            .softness
            .unwrap_or(if is_spray { 60.0 } else if is_wet { 70.0 } else { 35.0 })
            .clamp(0.0, 100.0);
        let roundness = shape.roundness.clamp(0.02, 1.0);

        let flow = self
            .engine
            .rendering
            .flow
            .unwrap_or(if is_spray { 0.30 } else if is_wet { 0.60 } else { 1.0 })
            .clamp(0.0, 1.0);

        let base_size_px = self.engine.base_size_px.max(0.1)
            * if is_spray { 0.6 } else { 1.0 }
            * shape.size_scale.max(0.01);

        let placement = PlacementOpts {
            base_size_px,
            spacing_percent,
            jitter_percent,
            scatter_px,
            stamps_per_step,
            streamline_percent,
            angle_jitter_deg: 0.0,
            follow_amount: 1.0,
            taper_start: TaperProfile::default(),
            taper_end: TaperProfile::default(),
            uniformity: 1.0,
            tip_min_px: 0.5,
            predict_px: 0.0,
            velocity_aware: false,
            k_speed: 0.5,
            min_step_px: 0.25,
            seed,
        };

        let stroke_settings = BrushStrokeSettings {
            roundness,
            softness,
            shape_angle_jitter_deg: 0.0,
            flow,
            grain_kind: self.engine.grain.kind,
            grain_depth: self.engine.grain.depth.clamp(0.0, 1.0),
            grain_rotate_deg: self.engine.grain.rotate,
            grain_scale: self.engine.grain.scale.max(0.1),
            tip_min_px: 0.75,
            wet_edges: self.engine.rendering.wet_edges,
            smudge_radius_px: 14.0,
        };

        let curve_points: Vec<CurvePoint> = shape
            .size_pressure_curve
            .iter()
            .map(|p| CurvePoint { x: p[0], y: p[1] })
            .collect();

        ResolvedBrush {
            backend,
            placement,
            pressure: self.engine.input.pressure,
            stroke_settings,
            min_size_ratio: shape.min_size_ratio.clamp(0.0, 1.0),
            size_pressure_curve: MonotoneCurve::build(&curve_points),
            constant_angle_deg: shape.angle,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_preset_resolves_to_stamping() {
        let preset = BrushPreset::default();
        let resolved = preset.resolve(1);
        assert_eq!(resolved.backend, Backend::Stamping);
        assert!((resolved.placement.base_size_px - 10.0).abs() < 1e-6);
    }

    #[test]
    fn unknown_backend_falls_back_to_stamping() {
        let mut preset = BrushPreset::default();
        preset.engine.backend = "plasma".into();
        assert_eq!(preset.resolve(1).backend, Backend::Stamping);
    }

    #[test]
    fn spray_preset_picks_up_spray_defaults_when_unset() {
        let mut preset = BrushPreset::default();
        preset.engine.backend = "spray".into();
        preset.engine.base_size_px = 10.0;
        let resolved = preset.resolve(1);
        assert_eq!(resolved.backend, Backend::Spray);
        assert!((resolved.placement.base_size_px - 6.0).abs() < 1e-6); // 10 * 0.6
        assert_eq!(resolved.placement.stamps_per_step, 18);
        assert!((resolved.stroke_settings.flow - 0.30).abs() < 1e-6);
    }

    #[test]
    fn wet_preset_picks_up_wet_defaults_when_unset() {
        let mut preset = BrushPreset::default();
        preset.engine.backend = "wet".into();
        let resolved = preset.resolve(1);
        assert_eq!(resolved.backend, Backend::Wet);
        assert!((resolved.stroke_settings.softness - 70.0).abs() < 1e-6);
        assert!((resolved.stroke_settings.flow - 0.60).abs() < 1e-6);
    }

    #[test]
    fn explicit_wet_settings_override_defaults() {
        let mut preset = BrushPreset::default();
        preset.engine.backend = "wet".into();
        preset.engine.shape.softness = Some(10.0);
        preset.engine.rendering.flow = Some(0.95);
        let resolved = preset.resolve(1);
        assert!((resolved.stroke_settings.softness - 10.0).abs() < 1e-6);
        assert!((resolved.stroke_settings.flow - 0.95).abs() < 1e-6);
    }

    #[test]
    fn explicit_stroke_path_overrides_spray_defaults() {
        let mut preset = BrushPreset::default();
        preset.engine.backend = "spray".into();
        preset.engine.stroke_path.count = Some(4);
        assert_eq!(preset.resolve(1).placement.stamps_per_step, 4);
    }

    #[test]
    fn deserializes_from_minimal_json() {
        let json = r#"{"id":"p1","name":"Soft Round","engine":{"backend":"stamping"}}"#;
        let preset: BrushPreset = serde_json::from_str(json).unwrap();
        assert_eq!(preset.engine.backend, "stamping");
        assert!((preset.engine.base_size_px - 10.0).abs() < 1e-6);
    }

    #[test]
    fn pressure_curve_scales_width_by_min_size_ratio_at_zero_pressure() {
        let mut preset = BrushPreset::default();
        preset.engine.shape.min_size_ratio = 0.25;
        let resolved = preset.resolve(1);
        let mut stamps = vec![Stamp { x: 0.0, y: 0.0, angle_deg: 0.0, pressure: 0.0, t: 0.0, width_scale: 1.0, tangent_deg: 0.0 }];
        resolved.apply_shape_dynamics(&mut stamps);
        assert!((stamps[0].width_scale - 0.25).abs() < 1e-3);
    }
}
