//! Error types for the model bridge.

use thiserror::Error;

/// Result type alias using BridgeError.
pub type Result<T> = std::result::Result<T, BridgeError>;

/// Main error type for conversion and hand-off operations.
#[derive(Error, Debug)]
pub enum BridgeError {
    /// The input file extension maps to no supported loader.
    #[error("Unsupported format: {0}")]
    UnsupportedFormat(String),

    /// Failed to parse an OBJ or MTL file.
    #[error("OBJ parse error: {0}")]
    Obj(#[from] tobj::LoadError),

    /// Failed to parse a glTF/GLB file.
    #[error("glTF parse error: {0}")]
    Gltf(#[from] gltf::Error),

    /// Input parsed but describes no usable geometry or is internally
    /// inconsistent (e.g. mismatched attribute lengths).
    #[error("Invalid model: {0}")]
    InvalidModel(String),

    /// Failed to serialize the canonical GLB blob.
    #[error("Export failed: {0}")]
    ExportFailed(String),

    /// The persistence layer cannot be opened or written. Callers degrade
    /// to the built-in default model instead of surfacing this.
    #[error("Store unavailable: {0}")]
    StoreUnavailable(String),

    /// Failed to parse JSON data (store manifest, static config).
    #[error("JSON parse error: {0}")]
    Json(#[from] serde_json::Error),

    /// I/O error during file operations.
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}
