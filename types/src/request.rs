//! The generation request payload handed to a provider.

use std::collections::BTreeMap;
use std::path::PathBuf;

use serde::{Deserialize, Serialize};

/// Everything a provider needs for one generation call.
///
/// `image_mapping` links the marker names embedded in `prompt` to the files
/// they stand for; `reference_images` is the full set of files to attach,
/// including images a resource declares but never mentions in its template.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct GenerateRequest {
    pub prompt: String,
    #[serde(skip_serializing_if = "Option::is_none", default)]
    pub negative_prompt: Option<String>,
    pub width: u32,
    pub height: u32,
    pub count: u32,
    #[serde(skip_serializing_if = "Option::is_none", default)]
    pub reference_images: Option<Vec<PathBuf>>,
    #[serde(skip_serializing_if = "Option::is_none", default)]
    pub image_mapping: Option<BTreeMap<String, PathBuf>>,
}

impl GenerateRequest {
    #[must_use]
    pub fn size_string(&self) -> String {
        format!("{}x{}", self.width, self.height)
    }
}
