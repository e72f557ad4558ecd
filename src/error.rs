//! Error types for the Vellum Core brush engine.

use thiserror::Error;

/// Engine error type.
#[derive(Error, Debug)]
pub enum EngineError {
    /// Canvas dimension exceeds maximum allowed size
    #[error("Canvas size {0}x{1} exceeds maximum allowed {2}x{2}")]
    CanvasTooLarge(u32, u32, u32),

    /// Invalid canvas dimensions
    #[error("Invalid canvas dimensions: {0}x{1}")]
    InvalidCanvasSize(u32, u32),

    /// Layer not found
    #[error("Layer not found: {0}")]
    LayerNotFound(uuid::Uuid),

    /// Layer index out of bounds
    #[error("Layer index {0} out of bounds (max: {1})")]
    LayerIndexOutOfBounds(usize, usize),

    /// Invalid blend mode name
    #[error("Invalid blend mode: {0}")]
    InvalidBlendMode(String),

    /// Brush preset failed to parse or resolve
    #[error("Invalid brush preset: {0}")]
    InvalidPreset(String),

    /// No active stroke context for the requested operation
    #[error("no active brush context: {0}")]
    ContextUnavailable(String),

    /// A sample/read landed outside the addressed surface
    #[error("sample out of bounds: ({0}, {1})")]
    OutOfBoundsSample(f32, f32),

    /// Undo/redo requested with nothing on the relevant side of history
    #[error("history has no entries to {0}")]
    HistoryEmpty(&'static str),

    /// Mismatched buffer/surface dimensions for an operation expecting equal sizes
    #[error("size mismatch: expected {0}x{1}, got {2}x{3}")]
    SizeMismatch(u32, u32, u32, u32),

    /// Memory allocation failed
    #[error("memory allocation failed: requested {0} bytes")]
    MemoryAllocationFailed(usize),

    /// File I/O error
    #[error("I/O error: {0}")]
    IoError(#[from] std::io::Error),

    /// Serialization error
    #[error("serialization error: {0}")]
    SerializationError(String),

    /// Image encode/decode error
    #[error("image error: {0}")]
    ImageError(#[from] image::ImageError),

    /// Compression/decompression error
    #[error("compression error: {0}")]
    CompressionError(String),

    /// Invalid operation for the engine's current state
    #[error("invalid operation: {0}")]
    InvalidOperation(String),
}

/// Result type alias for engine operations.
pub type EngineResult<T> = Result<T, EngineError>;

impl From<serde_json::Error> for EngineError {
    fn from(err: serde_json::Error) -> Self {
        EngineError::SerializationError(err.to_string())
    }
}
