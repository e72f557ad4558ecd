//! Layer stack: ordered raster layers composited through shared blend modes.

pub mod blend;

pub use blend::BlendMode;

use crate::color::lut::LinearRgba;
use crate::error::{EngineError, EngineResult};
use crate::render::surface::Surface;

use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Options passed when adding a layer to a stack.
#[derive(Debug, Clone, Copy, Serialize, Deserialize)]
pub struct LayerOptions {
    pub opacity: f32,
    pub blend: BlendMode,
    pub visible: bool,
}

impl Default for LayerOptions {
    fn default() -> Self {
        Self { opacity: 1.0, blend: BlendMode::Normal, visible: true }
    }
}

/// A single raster layer. Pixels are stored device-pixel sized (`css_size * dpr`).
pub struct Layer {
    pub id: Uuid,
    pub name: String,
    pub visible: bool,
    pub opacity: f32,
    pub blend_mode: BlendMode,
    pub surface: Surface,
}

impl Layer {
    fn new(name: impl Into<String>, device_w: u32, device_h: u32, opts: LayerOptions) -> Self {
        Self {
            id: Uuid::new_v4(),
            name: name.into(),
            visible: opts.visible,
            opacity: opts.opacity.clamp(0.0, 1.0),
            blend_mode: opts.blend,
            surface: Surface::new(device_w, device_h),
        }
    }

    pub fn width(&self) -> u32 {
        self.surface.width()
    }

    pub fn height(&self) -> u32 {
        self.surface.height()
    }
}

fn device_size(css_w: f32, css_h: f32, dpr: f32) -> (u32, u32) {
    (
        (css_w * dpr).ceil().max(1.0) as u32,
        (css_h * dpr).ceil().max(1.0) as u32,
    )
}

/// Ordered stack of layers sharing one CSS-pixel canvas size and device
/// pixel ratio. Layers are stored bottom-to-top.
pub struct LayerStack {
    css_w: f32,
    css_h: f32,
    dpr: f32,
    layers: Vec<Layer>,
    active_layer_id: Option<Uuid>,
}

impl LayerStack {
    /// Create an empty stack for a canvas of the given CSS size and device
    /// pixel ratio.
    pub fn new(css_w: f32, css_h: f32, dpr: f32) -> Self {
        Self { css_w, css_h, dpr, layers: Vec::new(), active_layer_id: None }
    }

    pub fn css_size(&self) -> (f32, f32) {
        (self.css_w, self.css_h)
    }

    pub fn dpr(&self) -> f32 {
        self.dpr
    }

    pub fn device_size(&self) -> (u32, u32) {
        device_size(self.css_w, self.css_h, self.dpr)
    }

    /// Add a new, empty layer and make it active. Returns its id.
    pub fn add_layer(&mut self, name: impl Into<String>, opts: LayerOptions) -> Uuid {
        let (w, h) = self.device_size();
        let layer = Layer::new(name, w, h, opts);
        let id = layer.id;
        self.layers.push(layer);
        self.active_layer_id = Some(id);
        id
    }

    pub fn remove_layer(&mut self, id: Uuid) -> EngineResult<()> {
        let pos = self.position_of(id)?;
        self.layers.remove(pos);
        if self.active_layer_id == Some(id) {
            self.active_layer_id = self.layers.last().map(|l| l.id);
        }
        Ok(())
    }

    fn position_of(&self, id: Uuid) -> EngineResult<usize> {
        self.layers.iter().position(|l| l.id == id).ok_or(EngineError::LayerNotFound(id))
    }

    pub fn get(&self, id: Uuid) -> Option<&Layer> {
        self.layers.iter().find(|l| l.id == id)
    }

    pub fn get_mut(&mut self, id: Uuid) -> Option<&mut Layer> {
        self.layers.iter_mut().find(|l| l.id == id)
    }

    pub fn layers(&self) -> &[Layer] {
        &self.layers
    }

    pub fn active_layer_id(&self) -> Option<Uuid> {
        self.active_layer_id
    }

    pub fn active_layer(&self) -> Option<&Layer> {
        self.active_layer_id.and_then(|id| self.get(id))
    }

    pub fn active_layer_mut(&mut self) -> Option<&mut Layer> {
        self.active_layer_id.and_then(move |id| self.layers.iter_mut().find(|l| l.id == id))
    }

    pub fn set_active_layer(&mut self, id: Uuid) -> EngineResult<()> {
        self.position_of(id)?;
        self.active_layer_id = Some(id);
        Ok(())
    }

    /// Resize the canvas. When `preserve` is set, existing pixels are
    /// bilinearly resampled into the new device size; otherwise layers are
    /// cleared. Backing-store dimensions are always updated.
    pub fn resize_stack(&mut self, css_w: f32, css_h: f32, dpr: f32, preserve: bool) {
        let (new_w, new_h) = device_size(css_w, css_h, dpr);

        for layer in &mut self.layers {
            if preserve {
                let old = &layer.surface;
                let (old_w, old_h) = (old.width(), old.height());
                let mut resized = Surface::new(new_w, new_h);
                if old_w > 0 && old_h > 0 {
                    let sx = old_w as f32 / new_w as f32;
                    let sy = old_h as f32 / new_h as f32;
                    for y in 0..new_h {
                        for x in 0..new_w {
                            let src_x = (x as f32 + 0.5) * sx - 0.5;
                            let src_y = (y as f32 + 0.5) * sy - 0.5;
                            resized.set(x as i32, y as i32, old.sample_bilinear(src_x, src_y));
                        }
                    }
                }
                layer.surface = resized;
            } else {
                layer.surface = Surface::new(new_w, new_h);
            }
        }

        self.css_w = css_w;
        self.css_h = css_h;
        self.dpr = dpr;
    }

    /// Composite all visible layers, bottom to top, into `target`.
    /// `target` is cleared (or filled with `bg`) first.
    pub fn composite_to(&self, target: &mut Surface, bg: Option<LinearRgba>) {
        target.clear();
        if let Some(color) = bg {
            let (w, h) = (target.width(), target.height());
            target.fill_rect(0, 0, w, h, color);
        }

        for layer in &self.layers {
            if !layer.visible || layer.opacity <= 0.0 {
                continue;
            }
            target.set_blend(layer.blend_mode);
            target.set_alpha(layer.opacity);
            target.draw_image(&layer.surface, 0, 0);
        }
        target.set_blend(BlendMode::Normal);
        target.set_alpha(1.0);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn new_stack_has_no_layers() {
        let stack = LayerStack::new(100.0, 100.0, 1.0);
        assert!(stack.layers().is_empty());
        assert_eq!(stack.device_size(), (100, 100));
    }

    #[test]
    fn add_layer_becomes_active() {
        let mut stack = LayerStack::new(10.0, 10.0, 2.0);
        let id = stack.add_layer("base", LayerOptions::default());
        assert_eq!(stack.active_layer_id(), Some(id));
        assert_eq!(stack.get(id).unwrap().width(), 20);
    }

    #[test]
    fn composite_to_empty_stack_is_transparent() {
        let stack = LayerStack::new(4.0, 4.0, 1.0);
        let mut target = Surface::new(4, 4);
        stack.composite_to(&mut target, None);
        for p in target.read_pixels() {
            assert_eq!(p.a, 0.0);
        }
    }

    #[test]
    fn invisible_layer_is_skipped() {
        let mut stack = LayerStack::new(2.0, 2.0, 1.0);
        let id = stack.add_layer("a", LayerOptions { visible: false, ..Default::default() });
        stack.get_mut(id).unwrap().surface.fill_rect(0, 0, 2, 2, LinearRgba::premultiply(1.0, 0.0, 0.0, 1.0));
        let mut target = Surface::new(2, 2);
        stack.composite_to(&mut target, None);
        assert_eq!(target.get(0, 0).a, 0.0);
    }

    #[test]
    fn resize_preserve_keeps_content_nonempty() {
        let mut stack = LayerStack::new(4.0, 4.0, 1.0);
        let id = stack.add_layer("a", LayerOptions::default());
        stack.get_mut(id).unwrap().surface.fill_rect(0, 0, 4, 4, LinearRgba::premultiply(0.0, 1.0, 0.0, 1.0));
        stack.resize_stack(8.0, 8.0, 1.0, true);
        let layer = stack.get(id).unwrap();
        assert_eq!(layer.width(), 8);
        assert!(layer.surface.get(4, 4).a > 0.0);
    }

    #[test]
    fn resize_without_preserve_clears() {
        let mut stack = LayerStack::new(4.0, 4.0, 1.0);
        let id = stack.add_layer("a", LayerOptions::default());
        stack.get_mut(id).unwrap().surface.fill_rect(0, 0, 4, 4, LinearRgba::premultiply(0.0, 1.0, 0.0, 1.0));
        stack.resize_stack(4.0, 4.0, 2.0, false);
        let layer = stack.get(id).unwrap();
        assert_eq!(layer.surface.get(2, 2).a, 0.0);
    }
}
