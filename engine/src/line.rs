//! Single-line text input with grapheme-aware cursor handling.
//!
//! Used for the negative-prompt field and other plain line editors; the
//! composer itself uses [`crate::PromptBuffer`].

use unicode_segmentation::UnicodeSegmentation;

#[derive(Debug, Default, Clone, PartialEq, Eq)]
pub struct LineInput {
    text: String,
    cursor: usize,
}

impl LineInput {
    #[must_use]
    pub fn text(&self) -> &str {
        &self.text
    }

    #[must_use]
    pub fn cursor(&self) -> usize {
        self.cursor
    }

    pub fn take_text(&mut self) -> String {
        self.cursor = 0;
        std::mem::take(&mut self.text)
    }

    pub fn set_text(&mut self, text: impl Into<String>) {
        self.text = text.into();
        self.cursor = self.grapheme_count();
    }

    pub fn move_cursor_left(&mut self) {
        self.cursor = self.cursor.saturating_sub(1);
    }

    pub fn move_cursor_right(&mut self) {
        self.cursor = (self.cursor + 1).min(self.grapheme_count());
    }

    pub fn reset_cursor(&mut self) {
        self.cursor = 0;
    }

    pub fn move_cursor_end(&mut self) {
        self.cursor = self.grapheme_count();
    }

    pub fn enter_char(&mut self, new_char: char) {
        let index = self.byte_index_at(self.cursor);
        self.text.insert(index, new_char);
        self.cursor += 1;
    }

    pub fn delete_char(&mut self) {
        if self.cursor == 0 {
            return;
        }
        let start = self.byte_index_at(self.cursor - 1);
        let end = self.byte_index_at(self.cursor);
        self.text.replace_range(start..end, "");
        self.cursor -= 1;
    }

    pub fn clear(&mut self) {
        self.text.clear();
        self.cursor = 0;
    }

    #[must_use]
    pub fn grapheme_count(&self) -> usize {
        self.text.graphemes(true).count()
    }

    fn byte_index_at(&self, grapheme_index: usize) -> usize {
        self.text
            .grapheme_indices(true)
            .nth(grapheme_index)
            .map_or(self.text.len(), |(i, _)| i)
    }
}

#[cfg(test)]
mod tests {
    use super::LineInput;

    #[test]
    fn edits_respect_grapheme_boundaries() {
        let mut line = LineInput::default();
        line.set_text("a🦀b");
        assert_eq!(line.cursor(), 3);
        line.move_cursor_left();
        line.delete_char();
        assert_eq!(line.text(), "ab");
        assert_eq!(line.cursor(), 1);
        line.enter_char('x');
        assert_eq!(line.text(), "axb");
    }

    #[test]
    fn take_text_resets_the_field() {
        let mut line = LineInput::default();
        line.set_text("blurry");
        assert_eq!(line.take_text(), "blurry");
        assert_eq!(line.text(), "");
        assert_eq!(line.cursor(), 0);
    }
}
