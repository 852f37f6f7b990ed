//! Image catalog from `multipass find --format json`.

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::domain::error::MultipassError;

/// One catalog entry. `name` is the catalog key (e.g. `24.04`).
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Image {
    #[serde(default)]
    pub name: String,
    #[serde(default)]
    pub aliases: Vec<String>,
    #[serde(default)]
    pub os: String,
    #[serde(default)]
    pub release: String,
    #[serde(default)]
    pub remote: String,
    #[serde(default)]
    pub version: String,
}

impl Image {
    #[must_use]
    pub fn is_lts(&self) -> bool {
        self.release.contains("LTS")
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct FindImagesResult {
    pub images: BTreeMap<String, Image>,
    /// Blueprints are passed through untouched; their shape changed across releases.
    pub blueprints: serde_json::Map<String, Value>,
    pub errors: Vec<Value>,
}

impl FindImagesResult {
    /// Images ordered for presentation: LTS releases first, then the rest,
    /// each group newest key first.
    #[must_use]
    pub fn sorted_images(&self) -> Vec<&Image> {
        let mut images: Vec<&Image> = self.images.values().collect();
        images.sort_by(|a, b| b.is_lts().cmp(&a.is_lts()).then_with(|| b.name.cmp(&a.name)));
        images
    }
}

/// Parse `multipass find --format json` output.
///
/// `"blueprints (deprecated)"` wins over `"blueprints"` when both exist.
///
/// # Errors
///
/// Returns an error if the output is not valid JSON.
pub fn parse_find(stdout: &[u8]) -> Result<FindImagesResult, MultipassError> {
    let doc: Value = serde_json::from_slice(stdout)
        .map_err(|e| MultipassError::other(format!("invalid JSON from multipass find: {e}")))?;

    let images = doc
        .get("images")
        .and_then(Value::as_object)
        .map(|m| {
            m.iter()
                .filter_map(|(key, record)| {
                    let mut image: Image = serde_json::from_value(record.clone()).ok()?;
                    image.name.clone_from(key);
                    Some((key.clone(), image))
                })
                .collect()
        })
        .unwrap_or_default();

    let blueprints = doc
        .get("blueprints (deprecated)")
        .or_else(|| doc.get("blueprints"))
        .and_then(Value::as_object)
        .cloned()
        .unwrap_or_default();

    let errors = doc
        .get("errors")
        .and_then(Value::as_array)
        .cloned()
        .unwrap_or_default();

    Ok(FindImagesResult {
        images,
        blueprints,
        errors,
    })
}
