//! Undo/redo history.
//!
//! Each entry records a layer's pixels before and after a mutation. A scoped
//! transaction (`begin`/`commit`) replaces recording-by-closure: the caller
//! snapshots `before`, mutates the layer however it likes, then commits with
//! the current state; a no-op mutation is detected by a cheap downscaled
//! hash and discarded rather than pushed.

use crate::color::lut::LinearRgba;
use crate::error::{EngineError, EngineResult};
use crate::layer::LayerStack;
use crate::render::surface::Surface;
use uuid::Uuid;

/// A modified rectangular region of a layer.
#[derive(Debug, Clone, Copy)]
pub struct DirtyRect {
    pub x: u32,
    pub y: u32,
    pub width: u32,
    pub height: u32,
}

impl DirtyRect {
    pub fn new(x: u32, y: u32, width: u32, height: u32) -> Self {
        Self { x, y, width, height }
    }

    pub fn full(width: u32, height: u32) -> Self {
        Self { x: 0, y: 0, width, height }
    }

    pub fn expand_to(&mut self, px: u32, py: u32) {
        let x2 = self.x + self.width;
        let y2 = self.y + self.height;
        if px < self.x {
            self.width += self.x - px;
            self.x = px;
        } else if px >= x2 {
            self.width = px - self.x + 1;
        }
        if py < self.y {
            self.height += self.y - py;
            self.y = py;
        } else if py >= y2 {
            self.height = py - self.y + 1;
        }
    }

    pub fn pad(&mut self, padding: u32, max_width: u32, max_height: u32) {
        let new_x = self.x.saturating_sub(padding);
        let new_y = self.y.saturating_sub(padding);
        let new_x2 = (self.x + self.width + padding).min(max_width);
        let new_y2 = (self.y + self.height + padding).min(max_height);
        self.x = new_x;
        self.y = new_y;
        self.width = new_x2.saturating_sub(new_x);
        self.height = new_y2.saturating_sub(new_y);
    }

    pub fn clamp(&mut self, layer_width: u32, layer_height: u32) {
        if self.x >= layer_width || self.y >= layer_height {
            self.width = 0;
            self.height = 0;
            return;
        }
        if self.x + self.width > layer_width {
            self.width = layer_width - self.x;
        }
        if self.y + self.height > layer_height {
            self.height = layer_height - self.y;
        }
    }

    pub fn is_empty(&self) -> bool {
        self.width == 0 || self.height == 0
    }
}

fn pixels_to_bytes(pixels: &[LinearRgba]) -> Vec<u8> {
    let mut out = Vec::with_capacity(pixels.len() * 16);
    for p in pixels {
        out.extend_from_slice(&p.r.to_le_bytes());
        out.extend_from_slice(&p.g.to_le_bytes());
        out.extend_from_slice(&p.b.to_le_bytes());
        out.extend_from_slice(&p.a.to_le_bytes());
    }
    out
}

fn bytes_to_pixels(bytes: &[u8]) -> Vec<LinearRgba> {
    bytes
        .chunks_exact(16)
        .map(|c| {
            LinearRgba::new(
                f32::from_le_bytes(c[0..4].try_into().unwrap()),
                f32::from_le_bytes(c[4..8].try_into().unwrap()),
                f32::from_le_bytes(c[8..12].try_into().unwrap()),
                f32::from_le_bytes(c[12..16].try_into().unwrap()),
            )
        })
        .collect()
}

fn extract_region(source: &[LinearRgba], source_width: u32, rect: DirtyRect) -> Vec<LinearRgba> {
    let mut result = vec![LinearRgba::default(); (rect.width * rect.height) as usize];
    for row in 0..rect.height {
        let src_start = ((rect.y + row) * source_width + rect.x) as usize;
        let dst_start = (row * rect.width) as usize;
        let w = rect.width as usize;
        result[dst_start..dst_start + w].copy_from_slice(&source[src_start..src_start + w]);
    }
    result
}

fn restore_region(source: &[LinearRgba], target: &mut [LinearRgba], target_width: u32, rect: DirtyRect) {
    for row in 0..rect.height {
        let src_start = (row * rect.width) as usize;
        let dst_start = ((rect.y + row) * target_width + rect.x) as usize;
        let w = rect.width as usize;
        target[dst_start..dst_start + w].copy_from_slice(&source[src_start..src_start + w]);
    }
}

/// Either a full-layer snapshot or just a dirty region, optionally lz4-compressed.
#[derive(Debug, Clone)]
enum SnapshotData {
    Full { bytes: Vec<u8>, compressed: bool },
    Incremental { rect: DirtyRect, bytes: Vec<u8>, compressed: bool },
}

/// A point-in-time capture of one layer's pixels.
#[derive(Debug, Clone)]
pub struct LayerSnapshot {
    layer_id: Uuid,
    data: SnapshotData,
    dimensions: (u32, u32),
}

const COMPRESS_THRESHOLD_BYTES: usize = 1024;

impl LayerSnapshot {
    fn full(layer_id: Uuid, pixels: &[LinearRgba], width: u32, height: u32) -> Self {
        let raw = pixels_to_bytes(pixels);
        let (bytes, compressed) = if raw.len() > COMPRESS_THRESHOLD_BYTES {
            (lz4_flex::compress_prepend_size(&raw), true)
        } else {
            (raw, false)
        };
        Self { layer_id, data: SnapshotData::Full { bytes, compressed }, dimensions: (width, height) }
    }

    fn incremental(layer_id: Uuid, pixels: &[LinearRgba], width: u32, height: u32, rect: DirtyRect) -> Self {
        let mut rect = rect;
        rect.clamp(width, height);
        if rect.is_empty() {
            return Self {
                layer_id,
                data: SnapshotData::Incremental { rect, bytes: Vec::new(), compressed: false },
                dimensions: (width, height),
            };
        }
        let raw = pixels_to_bytes(&extract_region(pixels, width, rect));
        let (bytes, compressed) = if raw.len() > COMPRESS_THRESHOLD_BYTES {
            (lz4_flex::compress_prepend_size(&raw), true)
        } else {
            (raw, false)
        };
        Self { layer_id, data: SnapshotData::Incremental { rect, bytes, compressed }, dimensions: (width, height) }
    }

    fn decode(bytes: &[u8], compressed: bool) -> Vec<LinearRgba> {
        let raw = if compressed {
            lz4_flex::decompress_size_prepended(bytes).unwrap_or_default()
        } else {
            bytes.to_vec()
        };
        bytes_to_pixels(&raw)
    }

    /// Restore this snapshot's pixels into `surface`.
    pub fn restore_to_surface(&self, surface: &mut Surface) {
        let (width, _height) = self.dimensions;
        match &self.data {
            SnapshotData::Full { bytes, compressed } => {
                let pixels = Self::decode(bytes, *compressed);
                if pixels.len() == (surface.width() * surface.height()) as usize {
                    surface.write_pixels(pixels);
                }
            }
            SnapshotData::Incremental { rect, bytes, compressed } => {
                if rect.is_empty() || bytes.is_empty() {
                    return;
                }
                let patch = Self::decode(bytes, *compressed);
                let mut current = surface.read_pixels().to_vec();
                restore_region(&patch, &mut current, width, *rect);
                surface.write_pixels(current);
            }
        }
    }

    pub fn memory_size(&self) -> usize {
        match &self.data {
            SnapshotData::Full { bytes, .. } => bytes.len(),
            SnapshotData::Incremental { bytes, .. } => bytes.len(),
        }
    }
}

/// Downscale to at most 64x64 and compute an FNV-1a hash. Used to detect
/// strokes that mutated nothing (e.g. a stamp entirely outside the layer).
fn downscaled_hash(pixels: &[LinearRgba], width: u32, height: u32) -> u64 {
    const GRID: u32 = 64;
    let gx = GRID.min(width.max(1));
    let gy = GRID.min(height.max(1));

    let mut hash: u64 = 0xcbf29ce484222325;
    for sy in 0..gy {
        for sx in 0..gx {
            let x = (sx * width / gx).min(width.saturating_sub(1));
            let y = (sy * height / gy).min(height.saturating_sub(1));
            let p = pixels[(y * width + x) as usize];
            for byte in p.r.to_bits().to_le_bytes().iter()
                .chain(p.g.to_bits().to_le_bytes().iter())
                .chain(p.b.to_bits().to_le_bytes().iter())
                .chain(p.a.to_bits().to_le_bytes().iter())
            {
                hash ^= *byte as u64;
                hash = hash.wrapping_mul(0x100000001b3);
            }
        }
    }
    hash
}

fn hash_equal(before: &[LinearRgba], after: &[LinearRgba], width: u32, height: u32) -> bool {
    downscaled_hash(before, width, height) == downscaled_hash(after, width, height)
}

/// An open snapshot waiting for the corresponding mutation to finish.
pub struct PendingTransaction {
    layer_id: Uuid,
    before_pixels: Vec<LinearRgba>,
    dims: (u32, u32),
    description: String,
}

struct HistoryEntry {
    layer_id: Uuid,
    before: LayerSnapshot,
    after: LayerSnapshot,
    #[allow(dead_code)]
    description: String,
}

/// Linear undo/redo log with a single cursor. `index == -1` means "nothing
/// applied"; `index == entries.len() - 1` means "fully forward".
pub struct History {
    entries: Vec<HistoryEntry>,
    index: i64,
    limit: usize,
}

impl History {
    pub fn new(limit: usize) -> Self {
        Self { entries: Vec::new(), index: -1, limit: limit.max(1) }
    }

    /// Snapshot `surface` as the "before" state of a transaction. The
    /// caller mutates the layer after this call and passes the same
    /// surface back to `commit`.
    pub fn begin(&self, layer_id: Uuid, surface: &Surface, description: impl Into<String>) -> PendingTransaction {
        PendingTransaction {
            layer_id,
            before_pixels: surface.read_pixels().to_vec(),
            dims: (surface.width(), surface.height()),
            description: description.into(),
        }
    }

    /// Finish a transaction. Returns `true` if an entry was pushed, `false`
    /// if the mutation was a no-op and nothing changed.
    pub fn commit(&mut self, txn: PendingTransaction, surface: &Surface, dirty: Option<DirtyRect>) -> bool {
        let (width, height) = txn.dims;
        let after_pixels = surface.read_pixels();

        if hash_equal(&txn.before_pixels, after_pixels, width, height) {
            return false;
        }

        let (before, after) = match dirty {
            Some(rect) => (
                LayerSnapshot::incremental(txn.layer_id, &txn.before_pixels, width, height, rect),
                LayerSnapshot::incremental(txn.layer_id, after_pixels, width, height, rect),
            ),
            None => (
                LayerSnapshot::full(txn.layer_id, &txn.before_pixels, width, height),
                LayerSnapshot::full(txn.layer_id, after_pixels, width, height),
            ),
        };

        self.push(HistoryEntry { layer_id: txn.layer_id, before, after, description: txn.description });
        true
    }

    fn push(&mut self, entry: HistoryEntry) {
        if self.index < self.entries.len() as i64 - 1 {
            self.entries.truncate((self.index + 1).max(0) as usize);
        }
        self.entries.push(entry);
        self.index = self.entries.len() as i64 - 1;

        if self.entries.len() > self.limit {
            self.entries.remove(0);
            self.index -= 1;
        }
    }

    pub fn can_undo(&self) -> bool {
        self.index >= 0
    }

    pub fn can_redo(&self) -> bool {
        self.index < self.entries.len() as i64 - 1
    }

    pub fn undo(&mut self, stack: &mut LayerStack) -> EngineResult<()> {
        if self.index < 0 {
            return Err(EngineError::HistoryEmpty("undo"));
        }
        let entry = &self.entries[self.index as usize];
        if let Some(layer) = stack.get_mut(entry.layer_id) {
            entry.before.restore_to_surface(&mut layer.surface);
        }
        self.index -= 1;
        Ok(())
    }

    pub fn redo(&mut self, stack: &mut LayerStack) -> EngineResult<()> {
        if !self.can_redo() {
            return Err(EngineError::HistoryEmpty("redo"));
        }
        self.index += 1;
        let entry = &self.entries[self.index as usize];
        if let Some(layer) = stack.get_mut(entry.layer_id) {
            entry.after.restore_to_surface(&mut layer.surface);
        }
        Ok(())
    }

    pub fn memory_usage(&self) -> usize {
        self.entries.iter().map(|e| e.before.memory_size() + e.after.memory_size()).sum()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::layer::LayerOptions;

    #[test]
    fn snapshot_round_trips_pixel_for_pixel() {
        let mut surface = Surface::new(8, 8);
        surface.fill_rect(2, 2, 3, 3, LinearRgba::new(0.2, 0.4, 0.6, 0.8));
        let snapshot = LayerSnapshot::full(Uuid::new_v4(), surface.read_pixels(), 8, 8);

        let mut restored = Surface::new(8, 8);
        snapshot.restore_to_surface(&mut restored);

        assert_eq!(restored.read_pixels(), surface.read_pixels());
    }

    #[test]
    fn no_op_mutation_is_discarded() {
        let mut history = History::new(10);
        let mut stack = LayerStack::new(8.0, 8.0, 1.0);
        let id = stack.add_layer("base", LayerOptions::default());
        let layer = stack.get_mut(id).unwrap();

        let txn = history.begin(id, &layer.surface, "no-op");
        let pushed = history.commit(txn, &layer.surface, None);

        assert!(!pushed);
        assert!(!history.can_undo());
    }

    #[test]
    fn undo_redo_round_trip() {
        let mut history = History::new(10);
        let mut stack = LayerStack::new(4.0, 4.0, 1.0);
        let id = stack.add_layer("base", LayerOptions::default());

        let before_surface = stack.get(id).unwrap().surface.clone();
        let txn = history.begin(id, &before_surface, "stroke");
        stack.get_mut(id).unwrap().surface.fill_rect(0, 0, 4, 4, LinearRgba::new(1.0, 0.0, 0.0, 1.0));
        let after_surface = stack.get(id).unwrap().surface.clone();
        assert!(history.commit(txn, &after_surface, None));

        history.undo(&mut stack).unwrap();
        assert_eq!(stack.get(id).unwrap().surface.get(0, 0).a, 0.0);

        history.redo(&mut stack).unwrap();
        assert_eq!(stack.get(id).unwrap().surface.get(0, 0).r, 1.0);
    }

    #[test]
    fn double_undo_past_start_errs() {
        let mut history: History = History::new(10);
        let mut stack = LayerStack::new(2.0, 2.0, 1.0);
        stack.add_layer("base", LayerOptions::default());
        assert!(history.undo(&mut stack).is_err());
    }

    #[test]
    fn limit_evicts_oldest_entry() {
        let mut history = History::new(2);
        let mut stack = LayerStack::new(2.0, 2.0, 1.0);
        let id = stack.add_layer("base", LayerOptions::default());

        for i in 0..4 {
            let before = stack.get(id).unwrap().surface.clone();
            let txn = history.begin(id, &before, format!("edit {i}"));
            let c = (i as f32) / 4.0;
            stack.get_mut(id).unwrap().surface.fill_rect(0, 0, 2, 2, LinearRgba::new(c, c, c, 1.0));
            let after = stack.get(id).unwrap().surface.clone();
            history.commit(txn, &after, None);
        }

        assert_eq!(history.entries.len(), 2);
    }
}
