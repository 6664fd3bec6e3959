//! Reference-image records.
//!
//! Constructors take the timestamp explicitly; callers own the clock.

use std::path::{Path, PathBuf};

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::ids::{ImageId, ResourceId};
use crate::text::file_stem_name;

/// Where a reference image entered the library.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "lowercase")]
pub enum ImageSource {
    /// Imported directly in the studio.
    Studio,
    /// Attached to a library resource.
    Resource { owner: ResourceId },
}

/// A user-imported image that prompts can reference by id.
///
/// Owned exclusively by the image registry; editors and resolvers hold ids,
/// never copies of the record.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ReferenceImage {
    id: ImageId,
    original_path: PathBuf,
    display_name: String,
    original_file_name: String,
    #[serde(skip_serializing_if = "Option::is_none", default)]
    thumbnail: Option<String>,
    added_at: DateTime<Utc>,
    source: ImageSource,
}

impl ReferenceImage {
    /// Build a record for a newly imported file.
    ///
    /// The display name defaults to the filename stem.
    #[must_use]
    pub fn import(path: PathBuf, source: ImageSource, added_at: DateTime<Utc>) -> Self {
        let original_file_name = path
            .file_name()
            .map(|name| name.to_string_lossy().into_owned())
            .unwrap_or_default();
        let display_name = file_stem_name(&path);
        Self {
            id: ImageId::generate(),
            original_path: path,
            display_name,
            original_file_name,
            thumbnail: None,
            added_at,
            source,
        }
    }

    #[must_use]
    pub fn with_thumbnail(mut self, thumbnail: String) -> Self {
        self.thumbnail = Some(thumbnail);
        self
    }

    #[must_use]
    pub fn id(&self) -> &ImageId {
        &self.id
    }

    #[must_use]
    pub fn original_path(&self) -> &Path {
        &self.original_path
    }

    #[must_use]
    pub fn display_name(&self) -> &str {
        &self.display_name
    }

    #[must_use]
    pub fn original_file_name(&self) -> &str {
        &self.original_file_name
    }

    #[must_use]
    pub fn thumbnail(&self) -> Option<&str> {
        self.thumbnail.as_deref()
    }

    #[must_use]
    pub fn added_at(&self) -> DateTime<Utc> {
        self.added_at
    }

    #[must_use]
    pub fn source(&self) -> &ImageSource {
        &self.source
    }

    /// In-place rename; empty names are ignored.
    pub fn set_display_name(&mut self, name: impl Into<String>) {
        let name = name.into();
        if !name.trim().is_empty() {
            self.display_name = name;
        }
    }
}

#[cfg(test)]
mod tests {
    use super::{ImageSource, ReferenceImage};
    use std::path::PathBuf;

    #[test]
    fn import_defaults_display_name_to_stem() {
        let image = ReferenceImage::import(
            PathBuf::from("/tmp/cat.png"),
            ImageSource::Studio,
            chrono::Utc::now(),
        );
        assert_eq!(image.display_name(), "cat");
        assert_eq!(image.original_file_name(), "cat.png");
    }

    #[test]
    fn rename_ignores_blank_names() {
        let mut image = ReferenceImage::import(
            PathBuf::from("/tmp/cat.png"),
            ImageSource::Studio,
            chrono::Utc::now(),
        );
        image.set_display_name("  ");
        assert_eq!(image.display_name(), "cat");
        image.set_display_name("tabby");
        assert_eq!(image.display_name(), "tabby");
    }
}
