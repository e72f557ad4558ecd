//! Brush Engine Module
//!
//! A brush is a stable JSON preset ([`BrushPreset`]) that resolves into a
//! [`crate::render::backend::Backend`] plus the placement/pressure/render
//! settings the rest of the engine already owns. Per-stroke state lives in
//! [`context::BrushContext`].

pub mod context;
mod preset;

pub use context::{BrushContext, GrainPhase};
pub use preset::{BrushPreset, EngineParams, GrainParams, InputParams, ResolvedBrush, RenderingParams, ShapeParams, StrokePathParams};
