//! WASM bindings for model-bridge.
//!
//! This module provides JavaScript-friendly APIs for use in the browser.
//! The store is filesystem-backed and not exposed here; browser callers
//! convert bytes and build hand-off URLs, persisting through their own
//! storage layer.

use wasm_bindgen::prelude::*;

#[wasm_bindgen(start)]
pub fn init() {
    // Set up better panic messages in the browser console
    console_error_panic_hook::set_once();
}

/// Result of one conversion: the GLB blob plus display stats.
#[wasm_bindgen]
pub struct ConversionResult {
    glb: Vec<u8>,
    vertices: usize,
    triangles: usize,
}

#[wasm_bindgen]
impl ConversionResult {
    /// The canonical GLB bytes as a fresh `Uint8Array`.
    pub fn glb(&self) -> js_sys::Uint8Array {
        js_sys::Uint8Array::from(self.glb.as_slice())
    }

    #[wasm_bindgen(getter)]
    pub fn vertices(&self) -> usize {
        self.vertices
    }

    #[wasm_bindgen(getter)]
    pub fn triangles(&self) -> usize {
        self.triangles
    }
}

/// Convert model bytes to GLB. `extension` selects the loader; `mtl_text`
/// is optional companion material data for OBJ input.
#[wasm_bindgen]
pub fn convert_to_glb(
    data: &[u8],
    extension: &str,
    mtl_text: Option<String>,
) -> Result<ConversionResult, JsError> {
    let (glb, stats) = crate::convert_to_glb(data, extension, mtl_text.as_deref())
        .map_err(|e| JsError::new(&e.to_string()))?;
    Ok(ConversionResult {
        glb,
        vertices: stats.vertices,
        triangles: stats.triangles,
    })
}

/// Viewer URL for the current-slot model.
#[wasm_bindgen]
pub fn viewer_url_for_current(base_url: &str) -> String {
    crate::ViewerReference::CurrentSlot.to_viewer_url(base_url)
}

/// Viewer URL for a history record.
#[wasm_bindgen]
pub fn viewer_url_for_history(base_url: &str, id: &str) -> String {
    crate::ViewerReference::HistoryId(id.to_string()).to_viewer_url(base_url)
}

/// Viewer URL for a directly hosted model file.
#[wasm_bindgen]
pub fn viewer_url_for_hosted(base_url: &str, file_name: &str) -> String {
    crate::handoff::hosted_model_reference(base_url, file_name).to_viewer_url(base_url)
}
