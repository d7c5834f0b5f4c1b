//! The hand-off protocol between converter and viewer page loads.
//!
//! The converter encodes a model identity into viewer query parameters; a
//! separately-loaded viewer resolves those parameters back to a concrete
//! model source. The only shared state between the two is the store, so the
//! query string carries identity, never model data.

use crate::error::Result;
use crate::store::{ModelStore, StoredModelRecord};

/// Query-parameter value meaning "use the current slot".
pub const MODEL_PARAM_CUSTOM: &str = "custom";
/// Query-parameter value meaning "look up a history identifier".
pub const MODEL_PARAM_UPLOADED: &str = "uploaded";

/// A predefined, remotely hosted model the viewer can always fall back to.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PredefinedModel {
    pub key: &'static str,
    pub name: &'static str,
    pub description: &'static str,
    pub src: &'static str,
    pub ios_src: Option<&'static str>,
    pub poster: &'static str,
}

/// The built-in model catalog. The first entry is the default used whenever
/// resolution finds nothing better.
pub const PREDEFINED_MODELS: &[PredefinedModel] = &[
    PredefinedModel {
        key: "astronaut",
        name: "Astronaut",
        description: "A detailed astronaut model from NASA. Perfect for space-themed AR experiences.",
        src: "https://modelviewer.dev/shared-assets/models/Astronaut.glb",
        ios_src: Some("https://modelviewer.dev/shared-assets/models/Astronaut.usdz"),
        poster: "https://modelviewer.dev/shared-assets/models/Astronaut.png",
    },
    PredefinedModel {
        key: "robot",
        name: "Shish Kebab",
        description: "A delicious-looking shish kebab. Great for food visualization in AR.",
        src: "https://modelviewer.dev/shared-assets/models/shishkebab.glb",
        ios_src: None,
        poster: "https://modelviewer.dev/assets/poster-shishkebab.png",
    },
    PredefinedModel {
        key: "chair",
        name: "Modern Chair",
        description: "A sleek modern chair design. Perfect for furniture visualization.",
        src: "https://modelviewer.dev/shared-assets/models/Chair.glb",
        ios_src: None,
        poster: "https://modelviewer.dev/assets/poster-chair.webp",
    },
];

/// The model shown when nothing else resolves.
pub fn default_model() -> &'static PredefinedModel {
    &PREDEFINED_MODELS[0]
}

/// Look up a predefined model by its catalog key.
pub fn predefined_model(key: &str) -> Option<&'static PredefinedModel> {
    PREDEFINED_MODELS.iter().find(|m| m.key == key)
}

/// A model identity to be carried to the viewer page. The three forms are
/// mutually exclusive; exactly one encoding is produced per reference.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ViewerReference {
    /// Whatever the store's current slot holds at viewer-load time.
    CurrentSlot,
    /// A specific history record.
    HistoryId(String),
    /// A directly embedded model URL with an optional display name.
    DirectUrl { url: String, name: Option<String> },
}

impl ViewerReference {
    /// Build the full viewer URL for this reference.
    pub fn to_viewer_url(&self, base_url: &str) -> String {
        let base = base_url.trim_end_matches('/');
        match self {
            ViewerReference::CurrentSlot => {
                format!("{}/viewer.html?model={}", base, MODEL_PARAM_CUSTOM)
            }
            ViewerReference::HistoryId(id) => format!(
                "{}/viewer.html?model={}&id={}",
                base,
                MODEL_PARAM_UPLOADED,
                percent_encode(id)
            ),
            ViewerReference::DirectUrl { url, name } => {
                let mut out = format!("{}/viewer.html?src={}", base, percent_encode(url));
                if let Some(name) = name {
                    out.push_str("&name=");
                    out.push_str(&percent_encode(name));
                }
                out
            }
        }
    }
}

/// Viewer URL for a model file hosted under the deployment's `models/`
/// directory. The filename is normalized to carry the `.glb` extension.
pub fn hosted_model_reference(base_url: &str, file_name: &str) -> ViewerReference {
    let file_name = if file_name.ends_with(".glb") {
        file_name.to_string()
    } else {
        format!("{}.glb", file_name)
    };
    let name = file_name.trim_end_matches(".glb").to_string();
    ViewerReference::DirectUrl {
        url: format!("{}/models/{}", base_url.trim_end_matches('/'), file_name),
        name: Some(name),
    }
}

/// Parsed viewer invocation parameters.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ViewerParams {
    /// Predefined-model key, or the `custom`/`uploaded` sentinels.
    pub model: Option<String>,
    /// History identifier, meaningful with `model=uploaded`.
    pub id: Option<String>,
    /// Direct model URL. Highest resolution priority.
    pub src: Option<String>,
    /// Display name override.
    pub name: Option<String>,
    /// Landing-page one-shot success marker; stripped after display.
    pub uploaded: Option<String>,
}

impl ViewerParams {
    /// Parse a raw query string (with or without the leading `?`).
    /// The first occurrence of a parameter wins, as in the browser API.
    pub fn parse(query: &str) -> Self {
        let mut params = ViewerParams::default();
        for (key, value) in query_pairs(query) {
            let slot = match key.as_str() {
                "model" => &mut params.model,
                "id" => &mut params.id,
                "src" => &mut params.src,
                "name" => &mut params.name,
                "uploaded" => &mut params.uploaded,
                _ => continue,
            };
            if slot.is_none() {
                *slot = Some(value);
            }
        }
        params
    }
}

/// Rewrite a landing-page query string with the one-shot `uploaded`
/// parameter removed, preserving everything else.
pub fn strip_uploaded_param(query: &str) -> String {
    query_pairs(query)
        .filter(|(key, _)| key != "uploaded")
        .map(|(key, value)| format!("{}={}", percent_encode(&key), percent_encode(&value)))
        .collect::<Vec<_>>()
        .join("&")
}

/// A resolved model source for the viewer to display.
#[derive(Debug, Clone, PartialEq)]
pub enum ModelSource {
    /// Load directly from a URL.
    DirectUrl { url: String, name: Option<String> },
    /// Serve a persisted blob (current slot or history record).
    StoredBlob(StoredModelRecord),
    /// One of the built-in catalog entries.
    Predefined(&'static PredefinedModel),
}

/// Resolve viewer parameters to a model source.
///
/// Precedence, first match wins: direct `src` URL, then an explicit history
/// identifier, then the current slot, then a predefined key, then the
/// built-in default. A missing record or an unavailable store falls through
/// to the default rather than failing the page, so this never errors.
pub fn resolve(params: &ViewerParams, store: Option<&ModelStore>) -> ModelSource {
    if let Some(src) = &params.src {
        return ModelSource::DirectUrl {
            url: src.clone(),
            name: params.name.clone(),
        };
    }

    match params.model.as_deref() {
        Some(MODEL_PARAM_UPLOADED) => {
            if let Some(id) = &params.id {
                if let Some(record) = lookup(store, |s| s.get_by_id(id)) {
                    return ModelSource::StoredBlob(record);
                }
            }
        }
        Some(MODEL_PARAM_CUSTOM) => {
            if let Some(record) = lookup(store, |s| s.get_current()) {
                return ModelSource::StoredBlob(record);
            }
        }
        Some(key) => {
            if let Some(model) = predefined_model(key) {
                return ModelSource::Predefined(model);
            }
        }
        None => {}
    }

    ModelSource::Predefined(default_model())
}

fn lookup(
    store: Option<&ModelStore>,
    get: impl FnOnce(&ModelStore) -> Result<Option<StoredModelRecord>>,
) -> Option<StoredModelRecord> {
    let store = match store {
        Some(store) => store,
        None => {
            log::warn!("Model store unavailable, falling back to default model");
            return None;
        }
    };
    match get(store) {
        Ok(record) => record,
        Err(e) => {
            log::warn!("Store lookup failed, falling back to default model: {}", e);
            None
        }
    }
}

fn query_pairs(query: &str) -> impl Iterator<Item = (String, String)> + '_ {
    query
        .trim_start_matches('?')
        .split('&')
        .filter(|pair| !pair.is_empty())
        .map(|pair| {
            let (key, value) = pair.split_once('=').unwrap_or((pair, ""));
            (percent_decode(key), percent_decode(value))
        })
}

/// Percent-encode a query-string component. Unreserved characters pass
/// through; everything else (including `&`, `=`, `/`) is escaped, so
/// encoded values round-trip through [`percent_decode`].
pub fn percent_encode(input: &str) -> String {
    let mut out = String::with_capacity(input.len());
    for byte in input.bytes() {
        match byte {
            b'A'..=b'Z' | b'a'..=b'z' | b'0'..=b'9' | b'-' | b'_' | b'.' | b'~' => {
                out.push(byte as char)
            }
            _ => out.push_str(&format!("%{:02X}", byte)),
        }
    }
    out
}

/// Decode a percent-encoded query-string component. Malformed escapes are
/// passed through verbatim; `+` decodes as a space as in form encoding.
pub fn percent_decode(input: &str) -> String {
    let bytes = input.as_bytes();
    let mut out = Vec::with_capacity(bytes.len());
    let mut i = 0;
    while i < bytes.len() {
        match bytes[i] {
            b'%' if i + 2 < bytes.len() => {
                let decoded = std::str::from_utf8(&bytes[i + 1..i + 3])
                    .ok()
                    .and_then(|hex| u8::from_str_radix(hex, 16).ok());
                match decoded {
                    Some(byte) => {
                        out.push(byte);
                        i += 3;
                    }
                    None => {
                        out.push(b'%');
                        i += 1;
                    }
                }
            }
            b'+' => {
                out.push(b' ');
                i += 1;
            }
            byte => {
                out.push(byte);
                i += 1;
            }
        }
    }
    String::from_utf8_lossy(&out).into_owned()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::store::ModelStore;
    use tempfile::tempdir;

    #[test]
    fn test_current_slot_reference() {
        let url = ViewerReference::CurrentSlot.to_viewer_url("https://example.com/app");
        assert_eq!(url, "https://example.com/app/viewer.html?model=custom");
    }

    #[test]
    fn test_history_reference() {
        let url =
            ViewerReference::HistoryId("model_1000".to_string()).to_viewer_url("https://x.test");
        assert_eq!(url, "https://x.test/viewer.html?model=uploaded&id=model_1000");
    }

    #[test]
    fn test_direct_url_reference_round_trips() {
        let reference = ViewerReference::DirectUrl {
            url: "https://x/models/a.glb".to_string(),
            name: Some("A".to_string()),
        };
        let url = reference.to_viewer_url("https://host");

        let query = url.split_once('?').unwrap().1;
        let params = ViewerParams::parse(query);
        assert_eq!(params.src.as_deref(), Some("https://x/models/a.glb"));
        assert_eq!(params.name.as_deref(), Some("A"));
    }

    #[test]
    fn test_hosted_model_reference_normalizes_extension() {
        let reference = hosted_model_reference("https://host/app/", "fox");
        match &reference {
            ViewerReference::DirectUrl { url, name } => {
                assert_eq!(url, "https://host/app/models/fox.glb");
                assert_eq!(name.as_deref(), Some("fox"));
            }
            other => panic!("unexpected reference: {other:?}"),
        }
    }

    #[test]
    fn test_parse_first_occurrence_wins() {
        let params = ViewerParams::parse("?model=custom&model=robot");
        assert_eq!(params.model.as_deref(), Some("custom"));
    }

    #[test]
    fn test_strip_uploaded_param() {
        assert_eq!(
            strip_uploaded_param("?model=astronaut&uploaded=Fox&name=X"),
            "model=astronaut&name=X"
        );
        assert_eq!(strip_uploaded_param("uploaded=Fox"), "");
    }

    #[test]
    fn test_percent_codec_round_trip() {
        let original = "https://x/models/a b.glb?q=1&r=2";
        let encoded = percent_encode(original);
        assert!(!encoded.contains('&'));
        assert_eq!(percent_decode(&encoded), original);
    }

    #[test]
    fn test_resolver_direct_url_beats_custom() {
        let params = ViewerParams::parse("?src=https%3A%2F%2Fx%2Fa.glb&model=custom");
        let source = resolve(&params, None);
        assert_eq!(
            source,
            ModelSource::DirectUrl {
                url: "https://x/a.glb".to_string(),
                name: None,
            }
        );
    }

    #[test]
    fn test_resolver_history_id() {
        let dir = tempdir().unwrap();
        let store = ModelStore::open_or_init(dir.path()).unwrap();
        let id = store.store_conversion("Fox", b"fox-bytes").unwrap();

        let params = ViewerParams::parse(&format!("model=uploaded&id={}", id));
        match resolve(&params, Some(&store)) {
            ModelSource::StoredBlob(record) => assert_eq!(record.name, "Fox"),
            other => panic!("unexpected source: {other:?}"),
        }
    }

    #[test]
    fn test_resolver_current_slot() {
        let dir = tempdir().unwrap();
        let store = ModelStore::open_or_init(dir.path()).unwrap();
        store.store_conversion("Latest", b"bytes").unwrap();

        let params = ViewerParams::parse("model=custom");
        match resolve(&params, Some(&store)) {
            ModelSource::StoredBlob(record) => assert_eq!(record.name, "Latest"),
            other => panic!("unexpected source: {other:?}"),
        }
    }

    #[test]
    fn test_resolver_missing_record_falls_back() {
        let dir = tempdir().unwrap();
        let store = ModelStore::open_or_init(dir.path()).unwrap();

        let params = ViewerParams::parse("model=custom");
        assert_eq!(
            resolve(&params, Some(&store)),
            ModelSource::Predefined(default_model())
        );
    }

    #[test]
    fn test_resolver_unavailable_store_falls_back() {
        let params = ViewerParams::parse("");
        assert_eq!(
            resolve(&params, None),
            ModelSource::Predefined(default_model())
        );

        let params = ViewerParams::parse("model=uploaded&id=model_1");
        assert_eq!(
            resolve(&params, None),
            ModelSource::Predefined(default_model())
        );
    }

    #[test]
    fn test_resolver_predefined_key() {
        let params = ViewerParams::parse("model=chair");
        match resolve(&params, None) {
            ModelSource::Predefined(model) => assert_eq!(model.key, "chair"),
            other => panic!("unexpected source: {other:?}"),
        }
    }
}
