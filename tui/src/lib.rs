//! Terminal UI for Reverie.
//!
//! Renders the [`App`] state - composer with reference chips, mention
//! picker popup, libraries, gallery, status line - and routes key events
//! back into it. The binary owns the terminal session and the frame loop.

mod composer;
mod input;
mod theme;

pub use input::handle_key;
pub use theme::Palette;

use ratatui::Frame;
use ratatui::layout::{Constraint, Direction, Layout, Rect};
use ratatui::style::{Modifier, Style};
use ratatui::text::{Line, Span};
use ratatui::widgets::{Block, Borders, Clear, List, ListItem, ListState, Paragraph};

use reverie_engine::{App, CandidateDetail, InputMode, StatusKind};

use composer::build_composer_view;

const PICKER_WIDTH: u16 = 36;
const PICKER_MAX_ROWS: u16 = 8;
/// The picker opens this many rows below the caret's row.
const PICKER_CARET_GAP: u16 = 1;

pub fn draw(frame: &mut Frame, app: &App, palette: &Palette) {
    let rows = Layout::default()
        .direction(Direction::Vertical)
        .constraints([
            Constraint::Length(1),
            Constraint::Length(7),
            Constraint::Length(3),
            Constraint::Min(6),
            Constraint::Length(6),
            Constraint::Length(1),
        ])
        .split(frame.area());

    draw_title(frame, app, palette, rows[0]);
    let composer_area = rows[1];
    draw_negative(frame, app, palette, rows[2]);

    let panels = Layout::default()
        .direction(Direction::Horizontal)
        .constraints([Constraint::Percentage(50), Constraint::Percentage(50)])
        .split(rows[3]);
    draw_images(frame, app, palette, panels[0]);
    draw_library(frame, app, palette, panels[1]);

    draw_gallery(frame, app, palette, rows[4]);
    draw_status(frame, app, palette, rows[5]);

    // The composer goes last among the panels so the picker popup, which
    // anchors to the caret, can paint over whatever sits below it.
    draw_composer(frame, app, palette, composer_area);
}

fn border_style(palette: &Palette, focused: bool) -> Style {
    if focused {
        Style::default().fg(palette.border_focused)
    } else {
        Style::default().fg(palette.border)
    }
}

fn draw_title(frame: &mut Frame, app: &App, palette: &Palette, area: Rect) {
    let (width, height) = app.size();
    let title = Line::from(vec![
        Span::styled("Reverie", Style::default().add_modifier(Modifier::BOLD)),
        Span::raw("  "),
        Span::styled(
            format!("{} · {width}x{height} · x{}", app.provider_name(), app.count()),
            Style::default().fg(palette.text_muted),
        ),
    ]);
    frame.render_widget(Paragraph::new(title), area);
}

fn draw_composer(frame: &mut Frame, app: &App, palette: &Palette, area: Rect) {
    let focused = app.mode() == InputMode::Compose;
    let block = Block::default()
        .borders(Borders::ALL)
        .border_style(border_style(palette, focused))
        .title("Prompt (@ to reference)");
    let inner = block.inner(area);

    let view = build_composer_view(app, palette);

    // Keep the caret row visible.
    let scroll = view
        .caret
        .map(|(row, _)| row.saturating_sub(inner.height.saturating_sub(1)))
        .unwrap_or(0);

    frame.render_widget(
        Paragraph::new(view.lines.clone())
            .block(block)
            .scroll((scroll, 0)),
        area,
    );

    if focused {
        if let Some((row, col)) = view.caret {
            let row = row.saturating_sub(scroll);
            if row < inner.height && col < inner.width {
                frame.set_cursor_position((inner.x + col, inner.y + row));
            }
        }
    }

    if app.mention_open() {
        draw_picker(frame, app, palette, inner, view.caret, scroll);
    }
}

/// The picker popup, anchored directly below the caret and painted over
/// everything else on the frame.
fn draw_picker(
    frame: &mut Frame,
    app: &App,
    palette: &Palette,
    composer_inner: Rect,
    caret: Option<(u16, u16)>,
    scroll: u16,
) {
    let Some(picker) = app.mention_picker() else {
        return;
    };
    let Some((caret_row, caret_col)) = caret else {
        // No caret to anchor to; leave the picker closed-looking rather
        // than floating somewhere arbitrary.
        tracing::warn!("Cannot locate composer caret; skipping mention picker");
        return;
    };

    let frame_area = frame.area();
    let filtered = picker.filtered();

    let rows = (filtered.len() as u16).clamp(1, PICKER_MAX_ROWS) + 2;
    let anchor_y = composer_inner.y + caret_row.saturating_sub(scroll) + PICKER_CARET_GAP;
    let y = anchor_y.min(frame_area.height.saturating_sub(rows));
    let x = (composer_inner.x + caret_col).min(frame_area.width.saturating_sub(PICKER_WIDTH));
    let area = Rect {
        x,
        y,
        width: PICKER_WIDTH.min(frame_area.width),
        height: rows.min(frame_area.height),
    };

    let items: Vec<ListItem> = if filtered.is_empty() {
        vec![ListItem::new(Span::styled(
            "No matches",
            Style::default().fg(palette.text_muted),
        ))]
    } else {
        filtered
            .iter()
            .map(|candidate| {
                let mut spans = vec![Span::raw(candidate.label.clone())];
                match &candidate.detail {
                    CandidateDetail::Image { .. } => {
                        spans.push(Span::styled(
                            "  image",
                            Style::default().fg(palette.chip_image),
                        ));
                    }
                    CandidateDetail::Resource {
                        image_count,
                        preview,
                    } => {
                        spans.push(Span::styled(
                            format!("  resource ({image_count} img)"),
                            Style::default().fg(palette.chip_resource),
                        ));
                        if !preview.is_empty() {
                            spans.push(Span::styled(
                                format!("  {preview}"),
                                Style::default().fg(palette.text_muted),
                            ));
                        }
                    }
                }
                ListItem::new(Line::from(spans))
            })
            .collect()
    };

    let mut state = ListState::default();
    if !filtered.is_empty() {
        state.select(Some(picker.selected()));
    }

    frame.render_widget(Clear, area);
    frame.render_stateful_widget(
        List::new(items)
            .block(
                Block::default()
                    .borders(Borders::ALL)
                    .border_style(Style::default().fg(palette.accent)),
            )
            .highlight_style(
                Style::default()
                    .bg(palette.selection_bg)
                    .add_modifier(Modifier::BOLD),
            ),
        area,
        &mut state,
    );
}

fn draw_negative(frame: &mut Frame, app: &App, palette: &Palette, area: Rect) {
    let focused = app.mode() == InputMode::Negative;
    let block = Block::default()
        .borders(Borders::ALL)
        .border_style(border_style(palette, focused))
        .title("Negative prompt");
    let inner = block.inner(area);
    frame.render_widget(
        Paragraph::new(app.negative().text().to_string()).block(block),
        area,
    );
    if focused {
        let col = app.negative().cursor() as u16;
        if col < inner.width {
            frame.set_cursor_position((inner.x + col, inner.y));
        }
    }
}

fn draw_images(frame: &mut Frame, app: &App, palette: &Palette, area: Rect) {
    let items: Vec<ListItem> = app
        .images()
        .iter()
        .map(|image| {
            ListItem::new(Line::from(vec![
                Span::styled("@", Style::default().fg(palette.chip_image)),
                Span::raw(image.display_name().to_string()),
                Span::styled(
                    format!("  {}", image.original_file_name()),
                    Style::default().fg(palette.text_muted),
                ),
            ]))
        })
        .collect();
    let block = Block::default()
        .borders(Borders::ALL)
        .border_style(border_style(palette, false))
        .title(format!("Reference images ({})", app.images().len()));
    frame.render_widget(List::new(items).block(block), area);
}

fn draw_library(frame: &mut Frame, app: &App, palette: &Palette, area: Rect) {
    let focused = app.mode() == InputMode::Library;
    let items: Vec<ListItem> = app
        .resources()
        .iter()
        .map(|resource| {
            ListItem::new(Line::from(vec![
                Span::styled("@", Style::default().fg(palette.chip_resource)),
                Span::raw(resource.name().to_string()),
                Span::styled(
                    format!("  {} img", resource.images().len()),
                    Style::default().fg(palette.text_muted),
                ),
            ]))
        })
        .collect();
    let block = Block::default()
        .borders(Borders::ALL)
        .border_style(border_style(palette, focused))
        .title(format!("Resources ({})", app.resources().len()));

    let mut state = ListState::default();
    if focused && !app.resources().is_empty() {
        state.select(Some(app.library_selected()));
    }
    frame.render_stateful_widget(
        List::new(items).block(block).highlight_style(
            Style::default()
                .bg(palette.selection_bg)
                .add_modifier(Modifier::BOLD),
        ),
        area,
        &mut state,
    );
}

fn draw_gallery(frame: &mut Frame, app: &App, palette: &Palette, area: Rect) {
    let focused = app.mode() == InputMode::Gallery;
    let items: Vec<ListItem> = app
        .generated_images()
        .iter()
        .map(|path| ListItem::new(path.display().to_string()))
        .collect();
    let title = if app.is_generating() {
        "Gallery (generating…)".to_string()
    } else {
        format!("Gallery ({})", app.generated_images().len())
    };
    let block = Block::default()
        .borders(Borders::ALL)
        .border_style(border_style(palette, focused))
        .title(title);

    let mut state = ListState::default();
    if focused && !app.generated_images().is_empty() {
        state.select(Some(app.gallery_selected()));
    }
    frame.render_stateful_widget(
        List::new(items).block(block).highlight_style(
            Style::default()
                .bg(palette.selection_bg)
                .add_modifier(Modifier::BOLD),
        ),
        area,
        &mut state,
    );
}

fn draw_status(frame: &mut Frame, app: &App, palette: &Palette, area: Rect) {
    let line = match app.status() {
        Some(status) => {
            let style = match status.kind {
                StatusKind::Info => Style::default().fg(palette.accent),
                StatusKind::Warning => Style::default().fg(palette.warning),
                StatusKind::Error => Style::default().fg(palette.error),
            };
            Line::from(Span::styled(status.text.clone(), style))
        }
        None => Line::from(Span::styled(
            "Enter: generate · Shift+Enter: newline · @: mention · Tab: focus · Ctrl+C: quit",
            Style::default().fg(palette.text_muted),
        )),
    };
    frame.render_widget(Paragraph::new(line), area);
}
