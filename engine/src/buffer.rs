//! The composer's rich-text buffer.
//!
//! A buffer is an ordered run of segments: editable text interleaved with
//! atomic reference chips. The cursor is a global index in *units*, where a
//! unit is one grapheme cluster of text or one whole chip. A chip can never
//! be entered or partially edited - deletion removes it as a whole.
//!
//! The buffer is a derived view of the canonical [`PromptDocument`]: edits
//! re-parse the buffer into a document, and external document changes are
//! reconciled through [`PromptBuffer::sync_document`], which leaves the
//! buffer untouched when nothing actually diverged (so the cursor survives
//! the app echoing the buffer's own edits back at it).

use unicode_segmentation::UnicodeSegmentation;

use reverie_types::{ContentNode, ImageId, PromptDocument, ResourceId};

/// One run of the buffer.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Segment {
    Text(String),
    Image(ImageId),
    Resource(ResourceId),
}

impl Segment {
    fn units(&self) -> usize {
        match self {
            Segment::Text(text) => text.graphemes(true).count(),
            Segment::Image(_) | Segment::Resource(_) => 1,
        }
    }

    #[must_use]
    pub fn is_chip(&self) -> bool {
        !matches!(self, Segment::Text(_))
    }
}

/// Replace span remembered between mention detection and chip insertion:
/// the `@` and query text to delete, as grapheme offsets inside one text
/// segment.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct MentionSpan {
    pub segment: usize,
    pub start: usize,
    pub end: usize,
}

#[derive(Debug, Clone, Default)]
pub struct PromptBuffer {
    segments: Vec<Segment>,
    cursor: usize,
    self_update: bool,
}

impl PromptBuffer {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    #[must_use]
    pub fn segments(&self) -> &[Segment] {
        &self.segments
    }

    #[must_use]
    pub fn cursor(&self) -> usize {
        self.cursor
    }

    #[must_use]
    pub fn total_units(&self) -> usize {
        self.segments.iter().map(Segment::units).sum()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.segments.is_empty()
    }

    #[must_use]
    pub fn has_chips(&self) -> bool {
        self.segments.iter().any(Segment::is_chip)
    }

    /// Concatenated text content; chips contribute nothing.
    #[must_use]
    pub fn plain_text(&self) -> String {
        self.segments
            .iter()
            .filter_map(|segment| match segment {
                Segment::Text(text) => Some(text.as_str()),
                Segment::Image(_) | Segment::Resource(_) => None,
            })
            .collect()
    }

    // ------------------------------------------------------------------
    // Document round-trip
    // ------------------------------------------------------------------

    /// Replace the whole surface from a document. Cursor moves to the end.
    pub fn rebuild_from(&mut self, document: &PromptDocument) {
        self.segments = document
            .nodes()
            .iter()
            .filter_map(|node| match node {
                ContentNode::Text(value) if value.is_empty() => None,
                ContentNode::Text(value) => Some(Segment::Text(value.clone())),
                ContentNode::ImageReference(id) => Some(Segment::Image(id.clone())),
                ContentNode::ResourceReference(id) => Some(Segment::Resource(id.clone())),
            })
            .collect();
        self.cursor = self.total_units();
    }

    /// Re-parse the surface into a document, in segment order.
    #[must_use]
    pub fn to_document(&self) -> PromptDocument {
        self.segments
            .iter()
            .filter_map(|segment| match segment {
                Segment::Text(text) if text.is_empty() => None,
                Segment::Text(text) => Some(ContentNode::Text(text.clone())),
                Segment::Image(id) => Some(ContentNode::ImageReference(id.clone())),
                Segment::Resource(id) => Some(ContentNode::ResourceReference(id.clone())),
            })
            .collect()
    }

    /// Mark the next [`Self::sync_document`] as the echo of a local edit,
    /// suppressing the rebuild it would otherwise do.
    pub fn mark_self_update(&mut self) {
        self.self_update = true;
    }

    /// Reconcile an externally-supplied document with the surface.
    ///
    /// The rebuild is skipped - leaving segments and cursor untouched - when
    /// the update is the buffer's own edit echoing back, or when the incoming
    /// document is text-only, non-empty, and already equals this chip-free
    /// surface's text. Returns whether a rebuild happened.
    pub fn sync_document(&mut self, document: &PromptDocument) -> bool {
        if self.self_update {
            self.self_update = false;
            return false;
        }

        if document.is_text_only() && !self.has_chips() {
            let text = document.plain_text();
            if !text.is_empty() && text == self.plain_text() {
                return false;
            }
        }

        self.rebuild_from(document);
        true
    }

    // ------------------------------------------------------------------
    // Cursor geometry
    // ------------------------------------------------------------------

    /// Where an insertion at `at` lands: `(segment, Some(offset))` inside a
    /// text segment, `(segment, None)` for a new text segment at that index.
    fn insertion_point(&self, at: usize) -> (usize, Option<usize>) {
        let mut acc = 0;
        for (i, segment) in self.segments.iter().enumerate() {
            let span = segment.units();
            match segment {
                Segment::Text(_) => {
                    if at >= acc && at <= acc + span {
                        return (i, Some(at - acc));
                    }
                }
                Segment::Image(_) | Segment::Resource(_) => {
                    if at == acc {
                        return (i, None);
                    }
                }
            }
            acc += span;
        }
        (self.segments.len(), None)
    }

    /// The unit covering index `unit`: `(segment, Some(grapheme))` for text,
    /// `(segment, None)` for a chip.
    fn unit_location(&self, unit: usize) -> Option<(usize, Option<usize>)> {
        let mut acc = 0;
        for (i, segment) in self.segments.iter().enumerate() {
            let span = segment.units();
            if unit < acc + span {
                return Some(match segment {
                    Segment::Text(_) => (i, Some(unit - acc)),
                    Segment::Image(_) | Segment::Resource(_) => (i, None),
                });
            }
            acc += span;
        }
        None
    }

    fn units_before(&self, segment: usize) -> usize {
        self.segments[..segment].iter().map(Segment::units).sum()
    }

    /// The text segment the caret sits in (or at the edge of), with the
    /// caret's grapheme offset inside it. `None` when the caret is at a
    /// chip-to-chip boundary or the buffer is empty.
    #[must_use]
    pub fn caret_text_position(&self) -> Option<(usize, usize)> {
        match self.insertion_point(self.cursor) {
            (segment, Some(offset)) if segment < self.segments.len() => Some((segment, offset)),
            _ => None,
        }
    }

    // ------------------------------------------------------------------
    // Editing
    // ------------------------------------------------------------------

    pub fn enter_char(&mut self, new_char: char) {
        self.enter_text(&new_char.to_string());
    }

    pub fn enter_newline(&mut self) {
        self.enter_char('\n');
    }

    pub fn enter_text(&mut self, text: &str) {
        if text.is_empty() {
            return;
        }
        let inserted = text.graphemes(true).count();
        match self.insertion_point(self.cursor) {
            (i, Some(offset)) => {
                if let Some(Segment::Text(existing)) = self.segments.get_mut(i) {
                    let byte = byte_index_at(existing, offset);
                    existing.insert_str(byte, text);
                }
            }
            (i, None) => {
                self.segments.insert(i, Segment::Text(text.to_string()));
            }
        }
        self.cursor += inserted;
    }

    pub fn delete_backward(&mut self) {
        if self.cursor == 0 {
            return;
        }
        if self.remove_unit(self.cursor - 1) {
            self.cursor -= 1;
        }
    }

    pub fn delete_forward(&mut self) {
        if self.cursor >= self.total_units() {
            return;
        }
        self.remove_unit(self.cursor);
    }

    /// Remove one unit; whole chips go in one step. Returns whether anything
    /// was removed.
    fn remove_unit(&mut self, unit: usize) -> bool {
        let Some((i, grapheme)) = self.unit_location(unit) else {
            return false;
        };
        match grapheme {
            None => {
                self.segments.remove(i);
                self.merge_text_at(i);
            }
            Some(offset) => {
                if let Some(Segment::Text(text)) = self.segments.get_mut(i) {
                    let start = byte_index_at(text, offset);
                    let end = byte_index_at(text, offset + 1);
                    text.replace_range(start..end, "");
                    if text.is_empty() {
                        self.segments.remove(i);
                        self.merge_text_at(i);
                    }
                }
            }
        }
        true
    }

    /// Merge `segments[i-1]` and `segments[i]` when both are text.
    fn merge_text_at(&mut self, i: usize) {
        if i == 0 || i >= self.segments.len() {
            return;
        }
        let both_text = matches!(
            (&self.segments[i - 1], &self.segments[i]),
            (Segment::Text(_), Segment::Text(_))
        );
        if both_text {
            let Segment::Text(tail) = self.segments.remove(i) else {
                return;
            };
            if let Some(Segment::Text(head)) = self.segments.get_mut(i - 1) {
                head.push_str(&tail);
            }
        }
    }

    pub fn move_cursor_left(&mut self) {
        self.cursor = self.cursor.saturating_sub(1);
    }

    pub fn move_cursor_right(&mut self) {
        self.cursor = (self.cursor + 1).min(self.total_units());
    }

    pub fn reset_cursor(&mut self) {
        self.cursor = 0;
    }

    pub fn move_cursor_end(&mut self) {
        self.cursor = self.total_units();
    }

    pub fn clear(&mut self) {
        self.segments.clear();
        self.cursor = 0;
    }

    /// Delete trailing whitespace, then the word before the cursor. Chips
    /// bound words; when the cursor sits directly behind a chip, the chip
    /// itself is deleted.
    pub fn delete_word_backwards(&mut self) {
        let mut deleted = false;
        while self.cursor > 0 && self.prev_unit_is_whitespace() {
            self.delete_backward();
            deleted = true;
        }
        while self.cursor > 0 {
            match self.unit_location(self.cursor - 1) {
                Some((_, Some(_))) if !self.prev_unit_is_whitespace() => {
                    self.delete_backward();
                    deleted = true;
                }
                _ => break,
            }
        }
        if !deleted
            && self.cursor > 0
            && matches!(self.unit_location(self.cursor - 1), Some((_, None)))
        {
            self.delete_backward();
        }
    }

    fn prev_unit_is_whitespace(&self) -> bool {
        let Some((i, Some(offset))) = self.unit_location(self.cursor.wrapping_sub(1)) else {
            return false;
        };
        let Some(Segment::Text(text)) = self.segments.get(i) else {
            return false;
        };
        text.graphemes(true)
            .nth(offset)
            .is_some_and(|g| g.chars().all(char::is_whitespace))
    }

    // ------------------------------------------------------------------
    // Mention insertion
    // ------------------------------------------------------------------

    /// Replace the remembered span with a chip followed by a non-breaking
    /// space, placing the cursor after the space.
    pub fn insert_mention(&mut self, span: MentionSpan, chip: Segment) {
        let Some(Segment::Text(text)) = self.segments.get(span.segment) else {
            tracing::warn!("mention span no longer points at a text segment");
            return;
        };
        let graphemes: Vec<&str> = text.graphemes(true).collect();
        let start = span.start.min(graphemes.len());
        let end = span.end.clamp(start, graphemes.len());

        let left: String = graphemes[..start].concat();
        let right: String = graphemes[end..].concat();
        let left_units = start;

        let mut replacement = Vec::with_capacity(3);
        if !left.is_empty() {
            replacement.push(Segment::Text(left));
        }
        replacement.push(chip);
        replacement.push(Segment::Text(format!("\u{a0}{right}")));

        let base = self.units_before(span.segment);
        self.segments.splice(span.segment..=span.segment, replacement);
        self.cursor = base + left_units + 2;
    }
}

fn byte_index_at(text: &str, grapheme_index: usize) -> usize {
    text.grapheme_indices(true)
        .nth(grapheme_index)
        .map_or(text.len(), |(i, _)| i)
}
