//! Composer rendering: turn the prompt buffer into styled lines and locate
//! the caret.

use ratatui::style::Style;
use ratatui::text::{Line, Span};
use unicode_segmentation::UnicodeSegmentation;
use unicode_width::UnicodeWidthStr;

use reverie_engine::{App, Segment};

use crate::theme::Palette;

/// The rendered composer surface: display lines plus the caret's (row, col)
/// within them. The caret can be absent when the buffer geometry and cursor
/// momentarily disagree; callers skip caret-anchored UI in that case instead
/// of guessing.
pub(crate) struct ComposerView {
    pub(crate) lines: Vec<Line<'static>>,
    pub(crate) caret: Option<(u16, u16)>,
}

struct LineBuilder {
    lines: Vec<Line<'static>>,
    spans: Vec<Span<'static>>,
    width: u16,
    row: u16,
}

impl LineBuilder {
    fn new() -> Self {
        Self {
            lines: Vec::new(),
            spans: Vec::new(),
            width: 0,
            row: 0,
        }
    }

    fn push_span(&mut self, text: String, style: Style) {
        if text.is_empty() {
            return;
        }
        self.width += text.width() as u16;
        self.spans.push(Span::styled(text, style));
    }

    fn newline(&mut self) {
        self.lines.push(Line::from(std::mem::take(&mut self.spans)));
        self.row += 1;
        self.width = 0;
    }

    fn finish(mut self) -> Vec<Line<'static>> {
        self.lines.push(Line::from(self.spans));
        self.lines
    }
}

pub(crate) fn build_composer_view(app: &App, palette: &Palette) -> ComposerView {
    let buffer = app.buffer();
    let cursor = buffer.cursor();
    let text_style = Style::default().fg(palette.text);

    let mut builder = LineBuilder::new();
    let mut caret = None;
    let mut units = 0usize;

    for segment in buffer.segments() {
        match segment {
            Segment::Text(text) => {
                let mut run = String::new();
                for grapheme in text.graphemes(true) {
                    if units == cursor {
                        builder.push_span(std::mem::take(&mut run), text_style);
                        caret = Some((builder.row, builder.width));
                    }
                    if grapheme == "\n" {
                        builder.push_span(std::mem::take(&mut run), text_style);
                        builder.newline();
                    } else {
                        run.push_str(grapheme);
                    }
                    units += 1;
                }
                builder.push_span(run, text_style);
            }
            Segment::Image(_) | Segment::Resource(_) => {
                if units == cursor {
                    caret = Some((builder.row, builder.width));
                }
                let (label, resolved) = match app.chip_label(segment) {
                    Some(label) => (label.text().to_string(), label.is_resolved()),
                    None => (String::new(), false),
                };
                let style =
                    palette.chip_style(matches!(segment, Segment::Resource(_)), resolved);
                builder.push_span(format!("@{label}"), style);
                units += 1;
            }
        }
    }

    if caret.is_none() && units == cursor {
        caret = Some((builder.row, builder.width));
    }

    ComposerView {
        lines: builder.finish(),
        caret,
    }
}

#[cfg(test)]
mod tests {
    use super::build_composer_view;
    use crate::theme::Palette;
    use futures_util::future::BoxFuture;
    use reverie_engine::{
        App, AppOptions, FileProbe, GenerateRequest, ImageGenerator, ImageSource,
        ReferenceImageRegistry, ResourceRegistry,
    };
    use std::path::{Path, PathBuf};
    use std::sync::Arc;

    struct NoopGenerator;
    impl ImageGenerator for NoopGenerator {
        fn generate<'a>(
            &'a self,
            _request: &'a GenerateRequest,
        ) -> BoxFuture<'a, Result<Vec<PathBuf>, anyhow::Error>> {
            Box::pin(async { Ok(Vec::new()) })
        }
    }

    struct NoopProbe;
    impl FileProbe for NoopProbe {
        fn exists<'a>(&'a self, _path: &'a Path) -> BoxFuture<'a, bool> {
            Box::pin(async { true })
        }
    }

    fn app() -> App {
        App::new(
            ReferenceImageRegistry::new(),
            ResourceRegistry::new(),
            Arc::new(NoopGenerator),
            Arc::new(NoopProbe),
            AppOptions::default(),
        )
    }

    #[test]
    fn caret_tracks_rows_across_newlines() {
        let mut app = app();
        for c in "ab".chars() {
            app.compose_char(c);
        }
        app.compose_newline();
        app.compose_char('c');

        let view = build_composer_view(&app, &Palette::default());
        assert_eq!(view.lines.len(), 2);
        assert_eq!(view.caret, Some((1, 1)));
    }

    #[test]
    fn caret_at_start_of_empty_buffer() {
        let app = app();
        let view = build_composer_view(&app, &Palette::default());
        assert_eq!(view.caret, Some((0, 0)));
    }

    #[test]
    fn chips_render_with_their_labels() {
        let mut images = ReferenceImageRegistry::new();
        images.import(PathBuf::from("/tmp/cat.png"), ImageSource::Studio);
        let mut app = App::new(
            images,
            ResourceRegistry::new(),
            Arc::new(NoopGenerator),
            Arc::new(NoopProbe),
            AppOptions::default(),
        );
        let id = app.images().iter().next().unwrap().id().clone();
        app.set_document(reverie_engine::PromptDocument::from_nodes(vec![
            reverie_engine::ContentNode::text("a "),
            reverie_engine::ContentNode::ImageReference(id),
        ]));

        let view = build_composer_view(&app, &Palette::default());
        let rendered: String = view.lines[0]
            .spans
            .iter()
            .map(|span| span.content.as_ref())
            .collect();
        assert_eq!(rendered, "a @cat");
    }
}
