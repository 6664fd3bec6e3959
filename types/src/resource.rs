//! Library resources: reusable prompt templates with attached style images.

use std::path::PathBuf;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::ids::ResourceId;

/// Upper bound on the style images a single resource may carry.
pub const MAX_RESOURCE_IMAGES: usize = 5;

#[derive(Debug, Error)]
#[error("a resource may carry at most {MAX_RESOURCE_IMAGES} images, got {0}")]
pub struct TooManyImagesError(pub usize);

/// A reusable prompt template.
///
/// `prompt_template` is a serialized [`crate::PromptDocument`] (JSON array)
/// or legacy plain text; its embedded image references are file paths, not
/// registry ids - see [`crate::TemplateNode`].
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Resource {
    id: ResourceId,
    name: String,
    #[serde(skip_serializing_if = "Option::is_none", default)]
    description: Option<String>,
    prompt_template: String,
    images: Vec<PathBuf>,
    created_at: DateTime<Utc>,
    updated_at: DateTime<Utc>,
}

impl Resource {
    pub fn new(
        name: impl Into<String>,
        description: Option<String>,
        prompt_template: impl Into<String>,
        images: Vec<PathBuf>,
        created_at: DateTime<Utc>,
    ) -> Result<Self, TooManyImagesError> {
        if images.len() > MAX_RESOURCE_IMAGES {
            return Err(TooManyImagesError(images.len()));
        }
        Ok(Self {
            id: ResourceId::generate(),
            name: name.into(),
            description,
            prompt_template: prompt_template.into(),
            images,
            created_at,
            updated_at: created_at,
        })
    }

    #[must_use]
    pub fn id(&self) -> &ResourceId {
        &self.id
    }

    #[must_use]
    pub fn name(&self) -> &str {
        &self.name
    }

    #[must_use]
    pub fn description(&self) -> Option<&str> {
        self.description.as_deref()
    }

    #[must_use]
    pub fn prompt_template(&self) -> &str {
        &self.prompt_template
    }

    #[must_use]
    pub fn images(&self) -> &[PathBuf] {
        &self.images
    }

    #[must_use]
    pub fn created_at(&self) -> DateTime<Utc> {
        self.created_at
    }

    #[must_use]
    pub fn updated_at(&self) -> DateTime<Utc> {
        self.updated_at
    }

    pub fn set_name(&mut self, name: impl Into<String>, updated_at: DateTime<Utc>) {
        self.name = name.into();
        self.updated_at = updated_at;
    }

    pub fn set_description(&mut self, description: Option<String>, updated_at: DateTime<Utc>) {
        self.description = description;
        self.updated_at = updated_at;
    }

    pub fn set_prompt_template(
        &mut self,
        prompt_template: impl Into<String>,
        updated_at: DateTime<Utc>,
    ) {
        self.prompt_template = prompt_template.into();
        self.updated_at = updated_at;
    }

    pub fn set_images(
        &mut self,
        images: Vec<PathBuf>,
        updated_at: DateTime<Utc>,
    ) -> Result<(), TooManyImagesError> {
        if images.len() > MAX_RESOURCE_IMAGES {
            return Err(TooManyImagesError(images.len()));
        }
        self.images = images;
        self.updated_at = updated_at;
        Ok(())
    }
}
