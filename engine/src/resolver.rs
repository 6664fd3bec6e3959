//! Prompt serialization and reference resolution.
//!
//! One deterministic walk of the document produces everything the provider
//! payload needs: the flat prompt text with image markers spliced in, the
//! deduplicated list of reference-image files, and the marker-name → path
//! mapping that ties the two together.
//!
//! Resolution never fails. Ids that no longer resolve are logged and
//! dropped from the output; a stale registry entry must not abort the whole
//! request.

use std::collections::BTreeMap;
use std::path::{Path, PathBuf};

use reverie_types::{ContentNode, PromptDocument, TemplateNode, file_stem_name, parse_template};

use crate::generation::FileProbe;
use crate::registry::{ReferenceImageRegistry, ResourceRegistry};

/// Resolves documents against a snapshot of the two registries.
#[derive(Debug, Clone, Copy)]
pub struct PromptResolver<'a> {
    images: &'a ReferenceImageRegistry,
    resources: &'a ResourceRegistry,
}

/// The output of one resolution walk.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ResolvedPrompt {
    text: String,
    paths: Vec<PathBuf>,
    mapping: BTreeMap<String, PathBuf>,
}

impl ResolvedPrompt {
    /// The flat prompt string sent to the provider.
    #[must_use]
    pub fn serialized_prompt(&self) -> &str {
        &self.text
    }

    /// Deduplicated reference-image paths, in first-occurrence order.
    #[must_use]
    pub fn referenced_image_paths(&self) -> &[PathBuf] {
        &self.paths
    }

    /// Marker name → file path, for every marker emitted into the prompt.
    #[must_use]
    pub fn image_mapping(&self) -> &BTreeMap<String, PathBuf> {
        &self.mapping
    }

    #[must_use]
    pub fn is_prompt_empty(&self) -> bool {
        self.text.is_empty()
    }

    /// Drop every path that no longer exists on disk, from both the path
    /// list and the mapping. Checks run sequentially so error attribution
    /// and ordering stay deterministic.
    pub async fn retain_existing(&mut self, probe: &dyn FileProbe) {
        let mut kept = Vec::with_capacity(self.paths.len());
        for path in self.paths.drain(..) {
            if probe.exists(&path).await {
                kept.push(path);
            } else {
                tracing::warn!(path = %path.display(), "Dropping missing reference image");
            }
        }
        self.mapping.retain(|_, path| kept.contains(path));
        self.paths = kept;
    }
}

/// Allocates marker names. The first claim on a name keeps it bare; a later
/// claim with the same name but a different file gets `name#2`, `name#3`, …
/// in emission order, so identically-named images from different sources
/// can never collide.
#[derive(Debug, Default)]
struct MarkerNames {
    assigned: BTreeMap<String, PathBuf>,
}

impl MarkerNames {
    fn allocate(&mut self, base: &str, path: &Path) -> String {
        if let Some(existing) = self.assigned.get(base) {
            if existing == path {
                return base.to_string();
            }
        } else {
            self.assigned.insert(base.to_string(), path.to_path_buf());
            return base.to_string();
        }
        let mut n = 2;
        loop {
            let candidate = format!("{base}#{n}");
            match self.assigned.get(&candidate) {
                Some(existing) if existing == path => return candidate,
                Some(_) => n += 1,
                None => {
                    self.assigned.insert(candidate.clone(), path.to_path_buf());
                    return candidate;
                }
            }
        }
    }
}

fn image_marker(name: &str) -> String {
    format!("图片文件[{name}]")
}

impl<'a> PromptResolver<'a> {
    #[must_use]
    pub fn new(images: &'a ReferenceImageRegistry, resources: &'a ResourceRegistry) -> Self {
        Self { images, resources }
    }

    /// Resolve a document. `legacy_prompt` is returned verbatim when the
    /// document is empty - the pre-structured-prompt compatibility path.
    #[must_use]
    pub fn resolve(&self, document: &PromptDocument, legacy_prompt: Option<&str>) -> ResolvedPrompt {
        if document.is_empty() {
            if let Some(prompt) = legacy_prompt.filter(|p| !p.is_empty()) {
                return ResolvedPrompt {
                    text: prompt.to_string(),
                    ..ResolvedPrompt::default()
                };
            }
            return ResolvedPrompt::default();
        }

        let mut out = ResolvedPrompt::default();
        let mut names = MarkerNames::default();

        for node in document.nodes() {
            match node {
                ContentNode::Text(value) => out.text.push_str(value),
                ContentNode::ImageReference(id) => match self.images.get(id) {
                    Some(image) => {
                        let name =
                            names.allocate(image.display_name(), image.original_path());
                        out.text.push_str(&image_marker(&name));
                        push_path(&mut out.paths, image.original_path());
                        out.mapping.insert(name, image.original_path().to_path_buf());
                    }
                    None => {
                        tracing::warn!(%id, "Image reference does not resolve; omitting");
                    }
                },
                ContentNode::ResourceReference(id) => match self.resources.get(id) {
                    Some(resource) => {
                        self.expand_resource(resource, &mut out, &mut names);
                    }
                    None => {
                        tracing::warn!(%id, "Resource reference does not resolve; omitting");
                    }
                },
            }
        }

        out
    }

    /// Expand a resource template in place. Template image references are
    /// file paths, named by their filename stem; a template that does not
    /// parse as a node array is emitted as literal text. Expansion is one
    /// level deep by construction - [`TemplateNode`] has no resource
    /// variant.
    fn expand_resource(
        &self,
        resource: &reverie_types::Resource,
        out: &mut ResolvedPrompt,
        names: &mut MarkerNames,
    ) {
        match parse_template(resource.prompt_template()) {
            Some(nodes) => {
                for node in nodes {
                    match node {
                        TemplateNode::Text(value) => out.text.push_str(&value),
                        TemplateNode::ImagePath(raw) => {
                            let path = PathBuf::from(&raw);
                            let name = names.allocate(&file_stem_name(&path), &path);
                            out.text.push_str(&image_marker(&name));
                            push_path(&mut out.paths, &path);
                            out.mapping.insert(name, path);
                        }
                    }
                }
            }
            None => out.text.push_str(resource.prompt_template()),
        }

        for path in resource.images() {
            push_path(&mut out.paths, path);
        }
    }
}

fn push_path(paths: &mut Vec<PathBuf>, path: &Path) {
    if !paths.iter().any(|existing| existing == path) {
        paths.push(path.to_path_buf());
    }
}
