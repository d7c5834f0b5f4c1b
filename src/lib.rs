//! # Model Bridge
//!
//! A Rust library for converting 3D models to GLB and handing them off to
//! an AR viewer page.
//!
//! ## Overview
//!
//! This library takes a user-supplied 3D asset (OBJ, STL, or glTF/GLB),
//! normalizes its geometry into a canonical presentable form, exports it to
//! a single GLB blob, persists it in a local model store, and builds the
//! viewer URL that carries the model's identity to a separately loaded
//! viewer page.
//!
//! ## Quick Start
//!
//! ```ignore
//! use model_bridge::{ConversionSession, ModelStore, ViewerReference};
//!
//! // Run one conversion
//! let mut session = ConversionSession::begin("fox.obj", obj_bytes)?;
//! let glb = session.convert()?;
//!
//! // Persist it and build the hand-off URL
//! let store = ModelStore::open_or_init("./store")?;
//! session.store_if_current(&store)?;
//! let url = ViewerReference::CurrentSlot.to_viewer_url("https://example.com/app");
//! ```
//!
//! ## Viewer side
//!
//! On viewer load, parse the query parameters and resolve them to a model
//! source; resolution always produces something displayable:
//!
//! ```ignore
//! use model_bridge::handoff::{resolve, ViewerParams};
//!
//! let params = ViewerParams::parse(query_string);
//! let source = resolve(&params, store.as_ref());
//! ```

pub mod config;
pub mod error;
pub mod export;
pub mod handoff;
pub mod loader;
pub mod scene;
pub mod session;
pub mod store;

// Re-export main types for convenience
pub use config::StaticConfig;
pub use error::{BridgeError, Result};
pub use export::glb::{export_glb, GLB_EXTENSION, GLB_MIME_TYPE};
pub use handoff::{
    resolve, ModelSource, PredefinedModel, ViewerParams, ViewerReference, PREDEFINED_MODELS,
};
pub use loader::{load_model, InputFormat};
pub use scene::{normalize, Material, Mesh, SceneGraph, SceneNode, SceneStats};
pub use session::{ConversionSession, SessionToken};
pub use store::{ModelStore, StoredModelRecord, CURRENT_SLOT_ID};

/// One-shot conversion: load, normalize, and export in a single call.
///
/// Returns the GLB bytes together with the normalization stats. For the
/// stateful flow (late material data, staleness tracking, persistence) use
/// [`ConversionSession`].
pub fn convert_to_glb(
    bytes: &[u8],
    extension: &str,
    aux_mtl: Option<&str>,
) -> Result<(Vec<u8>, SceneStats)> {
    let format = InputFormat::from_extension(extension)?;
    let mut scene = load_model(bytes, format, aux_mtl)?;
    let stats = normalize(&mut scene);
    let glb = export_glb(&scene)?;
    Ok((glb, stats))
}

#[cfg(feature = "wasm")]
pub mod wasm;
