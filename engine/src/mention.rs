//! Cursor-relative `@` detection.
//!
//! Runs after every composer edit. Detection only looks at the text segment
//! the caret sits in - an `@` in a different segment (i.e. behind a chip)
//! never triggers, and a query that has grown a newline is stale.

use unicode_segmentation::UnicodeSegmentation;

use crate::buffer::{MentionSpan, PromptBuffer, Segment};

/// What the composer should do with the mention picker after an edit.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum MentionSignal {
    /// Open (or refresh) the picker with this filter, remembering the span
    /// to replace on selection.
    Open { query: String, span: MentionSpan },
    /// Close the picker if it is open.
    Close,
}

#[must_use]
pub fn detect(buffer: &PromptBuffer) -> MentionSignal {
    let Some((segment, offset)) = buffer.caret_text_position() else {
        return MentionSignal::Close;
    };
    let Some(Segment::Text(text)) = buffer.segments().get(segment) else {
        return MentionSignal::Close;
    };

    let graphemes: Vec<&str> = text.graphemes(true).collect();
    let Some(at) = graphemes[..offset].iter().rposition(|g| *g == "@") else {
        return MentionSignal::Close;
    };

    let query: String = graphemes[at + 1..offset].concat();
    if query.contains('\n') {
        return MentionSignal::Close;
    }

    MentionSignal::Open {
        query,
        span: MentionSpan {
            segment,
            start: at,
            end: offset,
        },
    }
}

#[cfg(test)]
mod tests {
    use super::{MentionSignal, detect};
    use crate::buffer::{MentionSpan, PromptBuffer};
    use reverie_types::{ContentNode, PromptDocument};

    fn open(signal: &MentionSignal) -> (&str, MentionSpan) {
        match signal {
            MentionSignal::Open { query, span } => (query.as_str(), *span),
            MentionSignal::Close => panic!("expected Open, got Close"),
        }
    }

    #[test]
    fn detects_query_after_at() {
        let mut buffer = PromptBuffer::new();
        buffer.enter_text("draw @ca");
        let signal = detect(&buffer);
        let (query, span) = open(&signal);
        assert_eq!(query, "ca");
        assert_eq!(
            span,
            MentionSpan {
                segment: 0,
                start: 5,
                end: 8
            }
        );
    }

    #[test]
    fn no_at_closes() {
        let mut buffer = PromptBuffer::new();
        buffer.enter_text("plain text");
        assert_eq!(detect(&buffer), MentionSignal::Close);
    }

    #[test]
    fn bare_at_opens_with_empty_query() {
        let mut buffer = PromptBuffer::new();
        buffer.enter_text("@");
        let signal = detect(&buffer);
        let (query, span) = open(&signal);
        assert_eq!(query, "");
        assert_eq!(span.start, 0);
        assert_eq!(span.end, 1);
    }

    #[test]
    fn rightmost_at_wins() {
        let mut buffer = PromptBuffer::new();
        buffer.enter_text("@first @sec");
        let signal = detect(&buffer);
        let (query, span) = open(&signal);
        assert_eq!(query, "sec");
        assert_eq!(span.start, 7);
    }

    #[test]
    fn newline_in_query_closes() {
        let mut buffer = PromptBuffer::new();
        buffer.enter_text("@ca");
        buffer.enter_newline();
        buffer.enter_text("t");
        assert_eq!(detect(&buffer), MentionSignal::Close);
    }

    #[test]
    fn at_behind_cursor_only() {
        // The @ after the cursor is invisible to detection.
        let mut buffer = PromptBuffer::new();
        buffer.enter_text("a@b");
        buffer.reset_cursor();
        buffer.move_cursor_right(); // between 'a' and '@'
        assert_eq!(detect(&buffer), MentionSignal::Close);
    }

    #[test]
    fn at_in_previous_segment_does_not_trigger() {
        let mut buffer = PromptBuffer::new();
        buffer.rebuild_from(&PromptDocument::from_nodes(vec![
            ContentNode::text("@ca"),
            ContentNode::image("img1"),
            ContentNode::text("xyz"),
        ]));
        // Cursor at the very end, inside the "xyz" segment.
        assert_eq!(detect(&buffer), MentionSignal::Close);
    }
}
