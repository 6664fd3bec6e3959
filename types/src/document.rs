//! The structured prompt document model.
//!
//! A prompt is an ordered sequence of [`ContentNode`]s: literal text
//! interleaved with atomic references to registered images and library
//! resources. The persisted form is a JSON array of `{type, value}` objects;
//! a bare string is accepted as a legacy fallback and treated as a single
//! text node.

use serde::{Deserialize, Serialize};

use crate::ids::{ImageId, ResourceId};

/// One node of a prompt document.
///
/// Reference nodes carry no positional data beyond their place in the
/// sequence - no offsets, no styling.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", content = "value", rename_all = "kebab-case")]
pub enum ContentNode {
    Text(String),
    ImageReference(ImageId),
    ResourceReference(ResourceId),
}

impl ContentNode {
    #[must_use]
    pub fn text(value: impl Into<String>) -> Self {
        Self::Text(value.into())
    }

    #[must_use]
    pub fn image(id: impl Into<String>) -> Self {
        Self::ImageReference(ImageId::new(id))
    }

    #[must_use]
    pub fn resource(id: impl Into<String>) -> Self {
        Self::ResourceReference(ResourceId::new(id))
    }

    #[must_use]
    pub fn is_text(&self) -> bool {
        matches!(self, Self::Text(_))
    }
}

/// An ordered prompt document.
///
/// Adjacent text nodes are not required to be merged; consumers must behave
/// as if they were (concatenation is associative).
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct PromptDocument(Vec<ContentNode>);

impl PromptDocument {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    #[must_use]
    pub fn from_nodes(nodes: Vec<ContentNode>) -> Self {
        Self(nodes)
    }

    /// Parse a persisted prompt string.
    ///
    /// Attempts the JSON-array form first and falls back to treating the
    /// whole string as legacy plain text. An empty string parses to an empty
    /// document, not to a single empty text node.
    #[must_use]
    pub fn parse(raw: &str) -> Self {
        if raw.is_empty() {
            return Self::default();
        }
        match serde_json::from_str::<Vec<ContentNode>>(raw) {
            Ok(nodes) => Self(nodes),
            Err(_) => Self(vec![ContentNode::Text(raw.to_string())]),
        }
    }

    /// Canonical persisted form: a JSON array of nodes.
    #[must_use]
    pub fn to_json(&self) -> String {
        serde_json::to_string(&self.0).unwrap_or_else(|_| "[]".to_string())
    }

    #[must_use]
    pub fn nodes(&self) -> &[ContentNode] {
        &self.0
    }

    pub fn push(&mut self, node: ContentNode) {
        self.0.push(node);
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    #[must_use]
    pub fn is_text_only(&self) -> bool {
        self.0.iter().all(ContentNode::is_text)
    }

    /// Concatenation of the text nodes; reference nodes contribute nothing.
    #[must_use]
    pub fn plain_text(&self) -> String {
        self.0
            .iter()
            .filter_map(|node| match node {
                ContentNode::Text(value) => Some(value.as_str()),
                ContentNode::ImageReference(_) | ContentNode::ResourceReference(_) => None,
            })
            .collect()
    }
}

impl FromIterator<ContentNode> for PromptDocument {
    fn from_iter<T: IntoIterator<Item = ContentNode>>(iter: T) -> Self {
        Self(iter.into_iter().collect())
    }
}

/// One node of a resource's prompt template.
///
/// A template can only embed literal text and image *paths* - there is no
/// resource-reference variant, so a resource can never expand into another
/// resource. Expansion depth is one level by construction.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", content = "value", rename_all = "kebab-case")]
pub enum TemplateNode {
    Text(String),
    #[serde(rename = "image-reference")]
    ImagePath(String),
}

/// Parse a stored resource template into typed template nodes.
///
/// Returns `None` when the string is not a JSON array of template nodes
/// (including when it contains a `resource-reference` entry); callers then
/// emit the template as literal text.
#[must_use]
pub fn parse_template(raw: &str) -> Option<Vec<TemplateNode>> {
    serde_json::from_str::<Vec<TemplateNode>>(raw).ok()
}
