//! Loader layer manifest (`VkLayer_*.json`).

use std::collections::BTreeMap;

use serde::Serialize;
use vkoverlay_common::{LAYER_DESCRIPTION, LAYER_IMPLEMENTATION_VERSION, LAYER_NAME};
use vkoverlay_core::config::DISABLE_ENV;

pub const FILE_FORMAT_VERSION: &str = "1.2.0";
pub const API_VERSION: &str = "1.3.0";

#[derive(Debug, Serialize)]
pub struct Manifest {
    pub file_format_version: String,
    pub layer: LayerEntry,
}

#[derive(Debug, Serialize)]
pub struct LayerEntry {
    pub name: String,
    #[serde(rename = "type")]
    pub layer_type: String,
    pub library_path: String,
    pub api_version: String,
    pub implementation_version: String,
    pub description: String,
    /// Setting any of these variables to its value hides the layer.
    pub disable_environment: BTreeMap<String, String>,
}

impl Manifest {
    pub fn new(library_path: &str) -> Self {
        Self {
            file_format_version: FILE_FORMAT_VERSION.to_string(),
            layer: LayerEntry {
                name: LAYER_NAME.to_string(),
                layer_type: "GLOBAL".to_string(),
                library_path: library_path.to_string(),
                api_version: API_VERSION.to_string(),
                implementation_version: LAYER_IMPLEMENTATION_VERSION.to_string(),
                description: LAYER_DESCRIPTION.to_string(),
                disable_environment: BTreeMap::from([(DISABLE_ENV.to_string(), "1".to_string())]),
            },
        }
    }

    pub fn to_json(&self) -> serde_json::Result<String> {
        serde_json::to_string_pretty(self)
    }
}

/// Library path written when none is given: next to the manifest.
pub fn default_library_path() -> String {
    format!("./{}", vkoverlay_common::platform::layer_library_name())
}
