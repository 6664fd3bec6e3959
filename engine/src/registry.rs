//! In-memory registries for reference images and library resources.
//!
//! Registries own their records; the composer and resolver hold ids only.
//! They are handed to consumers explicitly - nothing in this crate reaches
//! into ambient global state to resolve an id.

use std::path::{Path, PathBuf};

use chrono::Utc;

use reverie_types::{
    ImageId, ImageSource, ReferenceImage, Resource, ResourceId, TooManyImagesError,
};

/// Ordered store of imported reference images.
#[derive(Debug, Clone, Default)]
pub struct ReferenceImageRegistry {
    images: Vec<ReferenceImage>,
}

impl ReferenceImageRegistry {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Import a file. Importing a path that is already registered returns
    /// the existing record's id instead of creating a duplicate.
    pub fn import(&mut self, path: PathBuf, source: ImageSource) -> ImageId {
        if let Some(existing) = self.images.iter().find(|img| img.original_path() == path) {
            return existing.id().clone();
        }
        let image = ReferenceImage::import(path, source, Utc::now());
        let id = image.id().clone();
        self.images.push(image);
        id
    }

    pub fn insert(&mut self, image: ReferenceImage) {
        self.images.push(image);
    }

    pub fn remove(&mut self, id: &ImageId) -> bool {
        let before = self.images.len();
        self.images.retain(|img| img.id() != id);
        self.images.len() != before
    }

    pub fn rename(&mut self, id: &ImageId, name: impl Into<String>) -> bool {
        match self.images.iter_mut().find(|img| img.id() == id) {
            Some(image) => {
                image.set_display_name(name);
                true
            }
            None => false,
        }
    }

    pub fn clear(&mut self) {
        self.images.clear();
    }

    #[must_use]
    pub fn get(&self, id: &ImageId) -> Option<&ReferenceImage> {
        self.images.iter().find(|img| img.id() == id)
    }

    #[must_use]
    pub fn get_by_name(&self, name: &str) -> Option<&ReferenceImage> {
        self.images.iter().find(|img| img.display_name() == name)
    }

    pub fn iter(&self) -> impl Iterator<Item = &ReferenceImage> {
        self.images.iter()
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.images.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.images.is_empty()
    }
}

/// Ordered store of library resources.
#[derive(Debug, Clone, Default)]
pub struct ResourceRegistry {
    resources: Vec<Resource>,
}

impl ResourceRegistry {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    #[must_use]
    pub fn from_resources(resources: Vec<Resource>) -> Self {
        Self { resources }
    }

    pub fn create(
        &mut self,
        name: impl Into<String>,
        description: Option<String>,
        prompt_template: impl Into<String>,
        images: Vec<PathBuf>,
    ) -> Result<ResourceId, TooManyImagesError> {
        let resource = Resource::new(name, description, prompt_template, images, Utc::now())?;
        let id = resource.id().clone();
        self.resources.push(resource);
        Ok(id)
    }

    pub fn insert(&mut self, resource: Resource) {
        self.resources.push(resource);
    }

    pub fn delete(&mut self, id: &ResourceId) -> bool {
        let before = self.resources.len();
        self.resources.retain(|res| res.id() != id);
        self.resources.len() != before
    }

    #[must_use]
    pub fn get(&self, id: &ResourceId) -> Option<&Resource> {
        self.resources.iter().find(|res| res.id() == id)
    }

    pub fn get_mut(&mut self, id: &ResourceId) -> Option<&mut Resource> {
        self.resources.iter_mut().find(|res| res.id() == id)
    }

    #[must_use]
    pub fn get_by_name(&self, name: &str) -> Option<&Resource> {
        self.resources.iter().find(|res| res.name() == name)
    }

    pub fn iter(&self) -> impl Iterator<Item = &Resource> {
        self.resources.iter()
    }

    #[must_use]
    pub fn snapshot(&self) -> &[Resource] {
        &self.resources
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.resources.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.resources.is_empty()
    }
}

/// Convenience for tests and fixtures: registry lookups by path.
impl ReferenceImageRegistry {
    #[must_use]
    pub fn get_by_path(&self, path: &Path) -> Option<&ReferenceImage> {
        self.images.iter().find(|img| img.original_path() == path)
    }
}

#[cfg(test)]
mod tests {
    use super::{ReferenceImageRegistry, ResourceRegistry};
    use reverie_types::ImageSource;
    use std::path::PathBuf;

    #[test]
    fn import_is_idempotent_per_path() {
        let mut registry = ReferenceImageRegistry::new();
        let a = registry.import(PathBuf::from("/tmp/cat.png"), ImageSource::Studio);
        let b = registry.import(PathBuf::from("/tmp/cat.png"), ImageSource::Studio);
        assert_eq!(a, b);
        assert_eq!(registry.len(), 1);
    }

    #[test]
    fn rename_and_lookup_by_name() {
        let mut registry = ReferenceImageRegistry::new();
        let id = registry.import(PathBuf::from("/tmp/cat.png"), ImageSource::Studio);
        assert!(registry.rename(&id, "tabby"));
        assert_eq!(registry.get_by_name("tabby").unwrap().id(), &id);
        assert!(registry.get_by_name("cat").is_none());
    }

    #[test]
    fn remove_reports_whether_anything_changed() {
        let mut registry = ReferenceImageRegistry::new();
        let id = registry.import(PathBuf::from("/tmp/cat.png"), ImageSource::Studio);
        assert!(registry.remove(&id));
        assert!(!registry.remove(&id));
        assert!(registry.is_empty());
    }

    #[test]
    fn resource_crud_round_trip() {
        let mut registry = ResourceRegistry::new();
        let id = registry
            .create("neon", None, "glow style", vec![])
            .unwrap();
        assert_eq!(registry.get(&id).unwrap().name(), "neon");
        assert_eq!(registry.get_by_name("neon").unwrap().id(), &id);
        assert!(registry.delete(&id));
        assert!(registry.get(&id).is_none());
    }

    #[test]
    fn iteration_preserves_insertion_order() {
        let mut registry = ResourceRegistry::new();
        registry.create("a", None, "", vec![]).unwrap();
        registry.create("b", None, "", vec![]).unwrap();
        let names: Vec<&str> = registry.iter().map(|r| r.name()).collect();
        assert_eq!(names, vec!["a", "b"]);
    }
}
