//! The mention picker: a keyboard-navigable, filtered list of everything a
//! prompt can reference.
//!
//! Pure state - candidates go in, one `select` or `close` comes out. The
//! candidate order is images first, then resources, each in registry order;
//! filtering never reorders.

use reverie_types::{ImageId, ResourceId};

/// What a candidate points at.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum CandidateTarget {
    Image(ImageId),
    Resource(ResourceId),
}

/// Type-specific detail shown next to the label.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum CandidateDetail {
    Image { has_thumbnail: bool },
    Resource { image_count: usize, preview: String },
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MentionCandidate {
    pub target: CandidateTarget,
    pub label: String,
    pub detail: CandidateDetail,
}

/// Open picker state. Closed is the absence of this value.
#[derive(Debug, Clone)]
pub struct MentionPicker {
    candidates: Vec<MentionCandidate>,
    filter: String,
    selected: usize,
}

impl MentionPicker {
    #[must_use]
    pub fn new(candidates: Vec<MentionCandidate>, filter: String) -> Self {
        Self {
            candidates,
            filter,
            selected: 0,
        }
    }

    #[must_use]
    pub fn filter(&self) -> &str {
        &self.filter
    }

    #[must_use]
    pub fn selected(&self) -> usize {
        self.selected
    }

    /// Update the filter; the selection resets to the top whenever the
    /// filter actually changes.
    pub fn set_filter(&mut self, filter: &str) {
        if self.filter != filter {
            self.filter = filter.to_string();
            self.selected = 0;
        }
    }

    /// Case-insensitive substring match on the label, order preserved.
    #[must_use]
    pub fn filtered(&self) -> Vec<&MentionCandidate> {
        let needle = self.filter.to_lowercase();
        self.candidates
            .iter()
            .filter(|candidate| candidate.label.to_lowercase().contains(&needle))
            .collect()
    }

    #[must_use]
    pub fn filtered_len(&self) -> usize {
        self.filtered().len()
    }

    pub fn move_down(&mut self) {
        let len = self.filtered_len();
        if len > 0 {
            self.selected = (self.selected + 1) % len;
        }
    }

    pub fn move_up(&mut self) {
        let len = self.filtered_len();
        if len > 0 {
            self.selected = (self.selected + len - 1) % len;
        }
    }

    /// The highlighted candidate, if the filtered list is non-empty.
    #[must_use]
    pub fn selected_candidate(&self) -> Option<&MentionCandidate> {
        self.filtered().get(self.selected).copied()
    }
}
