//! Core domain types for Reverie.
//!
//! This crate contains pure domain types with no IO, no async, and minimal dependencies.
//! Everything here can be used from any layer of the application.

mod document;
mod ids;
mod image;
mod request;
mod resource;
mod text;

pub use document::{ContentNode, PromptDocument, TemplateNode, parse_template};
pub use ids::{ImageId, ResourceId};
pub use image::{ImageSource, ReferenceImage};
pub use request::GenerateRequest;
pub use resource::{MAX_RESOURCE_IMAGES, Resource, TooManyImagesError};
pub use text::{file_stem_name, truncate_with_ellipsis};
