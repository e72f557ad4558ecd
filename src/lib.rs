//! # Vellum Core Brush Engine
//!
//! A CPU-bound 2D raster brush engine: pressure-tracked stroke placement,
//! multi-backend stamp/ribbon/spray/wet/smudge rendering, paper/grain
//! substrate simulation, layer compositing, and snapshot-based undo/redo.
//!
//! ## Architecture
//!
//! ```text
//! pointer samples -> pressure -> placement -> backend -> layer -> history
//! ```
//!
//! [`DrawEngine`] is the facade: it resolves a [`brush::BrushPreset`] into a
//! backend, drives that pipeline per stroke, and owns the [`layer::LayerStack`]
//! and [`history::History`].

#![warn(missing_docs)]
#![warn(clippy::all)]

pub mod brush;
pub mod color;
pub mod error;
pub mod history;
pub mod layer;
pub mod math;
pub mod paper;
pub mod pressure;
pub mod render;
pub mod stroke;

pub use brush::{BrushContext, BrushPreset};
pub use color::Color;
pub use error::{EngineError, EngineResult};
pub use history::{DirtyRect, History};
pub use layer::{BlendMode, Layer, LayerOptions, LayerStack};
pub use pressure::{PressureConfig, PressureTracker};
pub use render::backend::Backend;
pub use stroke::{PathPoint, Stamp};

use crate::color::lut::LinearRgba;
use crate::history::DirtyRect as HistoryDirtyRect;
use crate::math::CurveCache;
use crate::paper::GrainCache;
use crate::pressure::PressureTracker as Tracker;
use crate::render::surface::Surface;

use uuid::Uuid;

/// Engine version information.
pub const VERSION: &str = env!("CARGO_PKG_VERSION");

/// Maximum supported canvas dimension.
pub const MAX_CANVAS_SIZE: u32 = 16384;

/// Core engine configuration.
#[derive(Debug, Clone, serde::Serialize, serde::Deserialize)]
pub struct EngineConfig {
    /// Maximum canvas width in device pixels a layer stack may request.
    pub max_width: u32,
    /// Maximum canvas height in device pixels a layer stack may request.
    pub max_height: u32,
    /// Maximum number of undo steps kept before the oldest is evicted.
    pub history_limit: usize,
    /// Device pixel ratio used when a stroke caller doesn't specify one.
    pub default_dpr: f32,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            max_width: MAX_CANVAS_SIZE,
            max_height: MAX_CANVAS_SIZE,
            history_limit: 100,
            default_dpr: 1.0,
        }
    }
}

/// Process-wide caches the facade threads through stroke resolution:
/// built monotone-curve LUTs and grain tiles, both expensive enough to be
/// worth sharing across strokes.
#[derive(Default)]
struct EngineCaches {
    curves: CurveCache,
    grain: GrainCache,
}

/// Opaque handle to a stroke in progress. Returned by [`DrawEngine::begin_stroke`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct StrokeHandle(Uuid);

/// State threaded through one stroke's lifetime, from `begin_stroke` to
/// `end_stroke`.
struct ActiveStroke {
    layer_id: Uuid,
    resolved: brush::ResolvedBrush,
    color: LinearRgba,
    tracker: Tracker,
    context: BrushContext,
    path: Vec<stroke::PathPoint>,
    persist_grain_phase: bool,
}

/// The main brush engine instance: resolves presets, drives the stroke
/// pipeline, and owns the layer stack and undo history.
pub struct DrawEngine {
    config: EngineConfig,
    caches: EngineCaches,
    layers: LayerStack,
    history: History,
    strokes: std::collections::HashMap<Uuid, ActiveStroke>,
    /// Last stroke's grain phase, carried forward only into strokes whose
    /// preset has `grain.persist_phase` set.
    grain_phase: Option<brush::GrainPhase>,
}

impl DrawEngine {
    /// Create a new engine with default configuration and an empty canvas
    /// of the given logical size.
    pub fn new(css_w: f32, css_h: f32) -> Self {
        Self::with_config(css_w, css_h, EngineConfig::default())
    }

    /// Create a new engine with custom configuration.
    pub fn with_config(css_w: f32, css_h: f32, config: EngineConfig) -> Self {
        let layers = LayerStack::new(css_w, css_h, config.default_dpr);
        let history = History::new(config.history_limit);
        Self {
            config,
            caches: EngineCaches::default(),
            layers,
            history,
            strokes: std::collections::HashMap::new(),
            grain_phase: None,
        }
    }

    /// The engine's configuration.
    pub fn config(&self) -> &EngineConfig {
        &self.config
    }

    /// The layer stack. Exposed directly: the engine serializes access to
    /// it by construction (no stroke is in flight outside `begin_stroke`..
    /// `end_stroke`), so no additional lock is needed here.
    pub fn layers(&self) -> &LayerStack {
        &self.layers
    }

    /// Add a new empty layer to the stack and make it active.
    pub fn add_layer(&mut self, name: impl Into<String>, opts: LayerOptions) -> Uuid {
        self.layers.add_layer(name, opts)
    }

    /// Switch the active layer that new strokes commit to.
    pub fn set_active_layer(&mut self, id: Uuid) -> EngineResult<()> {
        self.layers.set_active_layer(id)
    }

    /// Resize the canvas, optionally preserving existing pixel content.
    pub fn resize(&mut self, css_w: f32, css_h: f32, dpr: f32, preserve: bool) {
        self.layers.resize_stack(css_w, css_h, dpr, preserve);
    }

    /// Begin a new stroke against the active layer, resolving `preset` and
    /// `color_hex` into the concrete settings the pipeline will use.
    ///
    /// An invalid `color_hex` falls back to opaque black rather than
    /// aborting — painting a visibly wrong color is recoverable, losing the
    /// whole stroke is not.
    pub fn begin_stroke(&mut self, preset: &BrushPreset, color_hex: &str, seed: u32) -> EngineResult<StrokeHandle> {
        let layer_id = self
            .layers
            .active_layer_id()
            .ok_or_else(|| EngineError::ContextUnavailable("no active layer".into()))?;
        let layer = self
            .layers
            .get(layer_id)
            .ok_or(EngineError::LayerNotFound(layer_id))?;

        let color = Color::from_hex(color_hex).unwrap_or_else(Color::black).to_linear_premultiplied();

        let curve_points: Vec<math::CurvePoint> = preset
            .engine
            .shape
            .size_pressure_curve
            .iter()
            .map(|p| math::CurvePoint { x: p[0], y: p[1] })
            .collect();
        let mut resolved = preset.resolve(seed);
        resolved.size_pressure_curve = (*self.caches.curves.get_or_build(&curve_points)).clone();

        let tracker = Tracker::new(resolved.pressure);
        let mut context = BrushContext::new(layer.width(), layer.height(), self.layers.dpr(), seed, color);

        let persist_grain_phase = preset.engine.grain.persist_phase;
        if persist_grain_phase {
            if let Some(phase) = self.grain_phase {
                context.seed_grain_phase(phase);
            }
        }

        let handle = StrokeHandle(Uuid::new_v4());
        self.strokes.insert(
            handle.0,
            ActiveStroke { layer_id, resolved, color, tracker, context, path: Vec::new(), persist_grain_phase },
        );
        Ok(handle)
    }

    /// Feed one raw pointer sample into an in-progress stroke. The pressure
    /// tracker calibrates it immediately; placement happens at `end_stroke`.
    pub fn push_sample(&mut self, handle: StrokeHandle, sample: pressure::PressureSample) -> EngineResult<()> {
        let active = self
            .strokes
            .get_mut(&handle.0)
            .ok_or_else(|| EngineError::ContextUnavailable("no such stroke".into()))?;

        let pressure = active.tracker.update(sample);
        active.path.push(stroke::PathPoint {
            x: sample.x,
            y: sample.y,
            t_ms: sample.t_ms,
            raw_pressure: sample.raw_pressure,
            pointer_kind: sample.pointer_kind,
            pressure,
        });
        Ok(())
    }

    /// Finish a stroke: place stamps over the full calibrated path, draw
    /// them through the resolved backend, and commit the result to history.
    /// An empty or degenerate stroke (no pixels touched) is discarded
    /// without growing the undo log.
    pub fn end_stroke(&mut self, handle: StrokeHandle) -> EngineResult<()> {
        let mut active = self
            .strokes
            .remove(&handle.0)
            .ok_or_else(|| EngineError::ContextUnavailable("no such stroke".into()))?;

        let layer = self.layers.get_mut(active.layer_id).ok_or(EngineError::LayerNotFound(active.layer_id))?;
        if layer.width() != active.context.width || layer.height() != active.context.height {
            return Err(EngineError::SizeMismatch(active.context.width, active.context.height, layer.width(), layer.height()));
        }

        let mut stamps = stroke::path_to_stamps(&active.path, &active.resolved.placement);
        active.resolved.apply_shape_dynamics(&mut stamps);

        let txn = self.history.begin(active.layer_id, &layer.surface, "stroke");

        active.context.ensure_smudge_source(&layer.surface);
        active.resolved.backend.draw(
            &mut layer.surface,
            &stamps,
            active.resolved.placement.base_size_px,
            &active.resolved.stroke_settings,
            active.color,
            None,
            Some(&self.caches.grain),
            &mut active.context,
        );

        let dirty = stamp_bounds(&stamps, active.resolved.placement.base_size_px, layer.width(), layer.height());
        self.history.commit(txn, &layer.surface, dirty);

        if active.persist_grain_phase {
            self.grain_phase = Some(active.context.grain_phase());
        }
        Ok(())
    }

    /// Whether there is a state to undo.
    pub fn can_undo(&self) -> bool {
        self.history.can_undo()
    }

    /// Whether there is a state to redo.
    pub fn can_redo(&self) -> bool {
        self.history.can_redo()
    }

    /// Undo the last committed stroke. A no-op (`Ok(false)`) when history is
    /// empty, per the engine's "undo/redo with nothing to do" error kind.
    pub fn undo(&mut self) -> EngineResult<bool> {
        if !self.history.can_undo() {
            return Ok(false);
        }
        self.history.undo(&mut self.layers)?;
        Ok(true)
    }

    /// Redo the last undone stroke.
    pub fn redo(&mut self) -> EngineResult<bool> {
        if !self.history.can_redo() {
            return Ok(false);
        }
        self.history.redo(&mut self.layers)?;
        Ok(true)
    }

    /// Composite the stack and encode it as PNG bytes. `bounds`, if given,
    /// is `(x, y, width, height)` in device pixels and crops the export.
    pub fn export_png(&self, bounds: Option<(u32, u32, u32, u32)>) -> EngineResult<Vec<u8>> {
        let (w, h) = self.layers.device_size();
        let mut target = Surface::new(w, h);
        self.layers.composite_to(&mut target, None);

        let (x, y, crop_w, crop_h) = bounds.unwrap_or((0, 0, w, h));
        if x + crop_w > w || y + crop_h > h {
            return Err(EngineError::SizeMismatch(crop_w, crop_h, w, h));
        }

        let rgba = if bounds.is_some() {
            let mut cropped = Surface::new(crop_w, crop_h);
            for row in 0..crop_h {
                for col in 0..crop_w {
                    cropped.set(col as i32, row as i32, target.get((x + col) as i32, (y + row) as i32));
                }
            }
            cropped.read_pixels_srgb8()
        } else {
            target.read_pixels_srgb8()
        };

        let (out_w, out_h) = bounds.map(|(_, _, w, h)| (w, h)).unwrap_or((w, h));
        let mut bytes: Vec<u8> = Vec::new();
        {
            let mut cursor = std::io::Cursor::new(&mut bytes);
            image::write_buffer_with_format(
                &mut cursor,
                &rgba,
                out_w,
                out_h,
                image::ColorType::Rgba8,
                image::ImageOutputFormat::Png,
            )?;
        }
        Ok(bytes)
    }
}

/// Bounding box of placed stamps, padded for the tip's softness blur and
/// clamped to the layer, suitable as a `History::commit` dirty region.
fn stamp_bounds(stamps: &[Stamp], base_size_px: f32, width: u32, height: u32) -> Option<HistoryDirtyRect> {
    if stamps.is_empty() {
        return None;
    }
    let pad = base_size_px.max(1.0) as u32 + 2;
    let (mut min_x, mut min_y) = (f32::MAX, f32::MAX);
    let (mut max_x, mut max_y) = (f32::MIN, f32::MIN);
    for s in stamps {
        min_x = min_x.min(s.x);
        min_y = min_y.min(s.y);
        max_x = max_x.max(s.x);
        max_y = max_y.max(s.y);
    }
    let mut rect = HistoryDirtyRect::new(
        (min_x.floor().max(0.0)) as u32,
        (min_y.floor().max(0.0)) as u32,
        (max_x - min_x).max(0.0) as u32 + 1,
        (max_y - min_y).max(0.0) as u32 + 1,
    );
    rect.pad(pad, width, height);
    rect.clamp(width, height);
    Some(rect)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::pressure::PointerKind;

    fn engine_with_layer() -> (DrawEngine, Uuid) {
        let mut engine = DrawEngine::new(100.0, 100.0);
        let id = engine.add_layer("base", LayerOptions::default());
        (engine, id)
    }

    fn sample(x: f32, y: f32, t_ms: f64) -> pressure::PressureSample {
        pressure::PressureSample { x, y, t_ms, raw_pressure: None, pointer_kind: PointerKind::Mouse }
    }

    #[test]
    fn engine_creation_has_no_layers() {
        let engine = DrawEngine::new(100.0, 100.0);
        assert!(engine.layers().layers().is_empty());
        assert!(!engine.can_undo());
    }

    #[test]
    fn stroke_without_active_layer_errs() {
        let mut engine = DrawEngine::new(10.0, 10.0);
        let preset = BrushPreset::default();
        assert!(engine.begin_stroke(&preset, "#000000", 1).is_err());
    }

    #[test]
    fn straight_stroke_paints_and_commits_history() {
        let (mut engine, layer_id) = engine_with_layer();
        let preset = BrushPreset::default();
        let handle = engine.begin_stroke(&preset, "#FF0000", 1).unwrap();
        for i in 0..10 {
            engine.push_sample(handle, sample(i as f32 * 5.0, 50.0, i as f64 * 16.0)).unwrap();
        }
        engine.end_stroke(handle).unwrap();

        assert!(engine.can_undo());
        let layer = engine.layers().get(layer_id).unwrap();
        assert!(layer.surface.get(25, 50).a > 0.0);
    }

    #[test]
    fn undo_restores_blank_layer() {
        let (mut engine, layer_id) = engine_with_layer();
        let preset = BrushPreset::default();
        let handle = engine.begin_stroke(&preset, "#00FF00", 7).unwrap();
        for i in 0..5 {
            engine.push_sample(handle, sample(i as f32 * 8.0, 50.0, i as f64 * 16.0)).unwrap();
        }
        engine.end_stroke(handle).unwrap();
        assert!(engine.undo().unwrap());

        let layer = engine.layers().get(layer_id).unwrap();
        assert_eq!(layer.surface.get(10, 50).a, 0.0);
        assert!(!engine.can_undo());
        assert!(engine.can_redo());
    }

    #[test]
    fn grain_phase_persists_across_strokes_when_preset_asks_for_it() {
        let (mut engine, _) = engine_with_layer();
        let mut preset = BrushPreset::default();
        preset.engine.grain.persist_phase = true;

        let first = engine.begin_stroke(&preset, "#FF0000", 1).unwrap();
        engine.push_sample(first, sample(10.0, 10.0, 0.0)).unwrap();
        engine.push_sample(first, sample(20.0, 10.0, 16.0)).unwrap();
        engine.end_stroke(first).unwrap();
        let carried = engine.grain_phase.expect("persisted phase after first stroke");

        let second = engine.begin_stroke(&preset, "#00FF00", 2).unwrap();
        let anchor = engine.strokes.get_mut(&second.0).unwrap().context.grain_anchor(999.0, 999.0);
        assert_eq!(anchor, (carried.phase_x, carried.phase_y));
        engine.end_stroke(second).unwrap();
    }

    #[test]
    fn grain_phase_resets_when_preset_does_not_persist() {
        let (mut engine, _) = engine_with_layer();
        let preset = BrushPreset::default();

        let first = engine.begin_stroke(&preset, "#FF0000", 1).unwrap();
        engine.push_sample(first, sample(10.0, 10.0, 0.0)).unwrap();
        engine.push_sample(first, sample(20.0, 10.0, 16.0)).unwrap();
        engine.end_stroke(first).unwrap();
        assert!(engine.grain_phase.is_none());

        let second = engine.begin_stroke(&preset, "#00FF00", 2).unwrap();
        let anchor = engine.strokes.get_mut(&second.0).unwrap().context.grain_anchor(5.0, 6.0);
        assert_eq!(anchor, (5.0, 6.0));
        engine.end_stroke(second).unwrap();
    }

    #[test]
    fn redo_without_undo_is_noop() {
        let (mut engine, _) = engine_with_layer();
        assert!(!engine.redo().unwrap());
    }

    #[test]
    fn export_png_produces_nonempty_bytes() {
        let (mut engine, _) = engine_with_layer();
        let bytes = engine.export_png(None).unwrap();
        assert!(!bytes.is_empty());
        assert_eq!(&bytes[1..4], b"PNG");
    }

    #[test]
    fn export_png_with_bounds_rejects_out_of_range() {
        let (engine, _) = engine_with_layer();
        assert!(engine.export_png(Some((0, 0, 1000, 1000))).is_err());
    }

    #[test]
    fn degenerate_stroke_does_not_grow_history() {
        let (mut engine, _) = engine_with_layer();
        let preset = BrushPreset::default();
        let handle = engine.begin_stroke(&preset, "#000000", 1).unwrap();
        engine.push_sample(handle, sample(-500.0, -500.0, 0.0)).unwrap();
        engine.end_stroke(handle).unwrap();
        assert!(!engine.can_undo());
    }
}
