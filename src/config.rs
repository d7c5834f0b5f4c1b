//! Static deployment configuration.
//!
//! The alternate deployment mode: instead of running a conversion, a
//! deployment ships a `config.json` naming one custom model file under its
//! `models/` directory. Read once at landing-page load.

use crate::error::Result;
use crate::handoff::{hosted_model_reference, ViewerReference};
use serde::Deserialize;
use std::path::Path;

/// Parsed `config.json`.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct StaticConfig {
    /// Filename of the custom model, resolved against the models directory.
    #[serde(rename = "customModel")]
    pub custom_model: String,
}

impl StaticConfig {
    /// Load the config file. A missing file means the deployment has no
    /// static model configured and is not an error.
    pub fn load(path: impl AsRef<Path>) -> Result<Option<StaticConfig>> {
        let path = path.as_ref();
        if !path.exists() {
            return Ok(None);
        }
        let text = std::fs::read_to_string(path)?;
        Ok(Some(serde_json::from_str(&text)?))
    }

    /// The viewer reference for the configured model.
    pub fn model_reference(&self, base_url: &str) -> ViewerReference {
        hosted_model_reference(base_url, &self.custom_model)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::tempdir;

    #[test]
    fn test_load_missing_config_is_none() {
        let dir = tempdir().unwrap();
        assert_eq!(StaticConfig::load(dir.path().join("config.json")).unwrap(), None);
    }

    #[test]
    fn test_load_and_reference() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("config.json");
        std::fs::write(&path, r#"{"customModel": "fox"}"#).unwrap();

        let config = StaticConfig::load(&path).unwrap().unwrap();
        let url = config
            .model_reference("https://host/app")
            .to_viewer_url("https://host/app");
        assert!(url.contains("src=https%3A%2F%2Fhost%2Fapp%2Fmodels%2Ffox.glb"));
    }

    #[test]
    fn test_malformed_config_is_an_error() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("config.json");
        std::fs::write(&path, "not json").unwrap();
        assert!(StaticConfig::load(&path).is_err());
    }
}
