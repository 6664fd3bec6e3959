//! Key routing into the [`App`].
//!
//! While the mention picker is open, Enter/Tab/Up/Down/Esc belong to the
//! picker and must never reach the composer or any other handler.

use crossterm::event::{KeyCode, KeyEvent, KeyEventKind, KeyModifiers};

use reverie_engine::{App, InputMode};

pub fn handle_key(app: &mut App, key: KeyEvent) {
    if matches!(key.kind, KeyEventKind::Release) {
        return;
    }

    // Ctrl+C quits from anywhere.
    if key.modifiers.contains(KeyModifiers::CONTROL) && key.code == KeyCode::Char('c') {
        app.request_quit();
        return;
    }

    match app.mode() {
        InputMode::Compose => handle_compose(app, key),
        InputMode::Negative => handle_negative(app, key),
        InputMode::Library => handle_library(app, key),
        InputMode::Gallery => handle_gallery(app, key),
    }
}

fn handle_compose(app: &mut App, key: KeyEvent) {
    if app.mention_open() {
        match key.code {
            KeyCode::Up => {
                app.mention_move_up();
                return;
            }
            KeyCode::Down => {
                app.mention_move_down();
                return;
            }
            KeyCode::Enter | KeyCode::Tab => {
                app.mention_confirm();
                return;
            }
            KeyCode::Esc => {
                app.mention_close();
                return;
            }
            _ => {}
        }
    }

    // Shift+Enter and Ctrl+J insert a literal newline; bare Enter submits.
    let is_newline = matches!(
        (key.code, key.modifiers),
        (KeyCode::Enter, m) if m.contains(KeyModifiers::SHIFT) || m.contains(KeyModifiers::CONTROL)
    ) || matches!(key, KeyEvent { code: KeyCode::Char('j'), modifiers: m, .. } if m.contains(KeyModifiers::CONTROL));

    if is_newline {
        app.compose_newline();
        return;
    }

    match key.code {
        KeyCode::Enter => app.submit(),
        KeyCode::Tab => app.focus_next(),
        KeyCode::Backspace => app.compose_backspace(),
        KeyCode::Delete => app.compose_delete_forward(),
        KeyCode::Left => app.compose_move_left(),
        KeyCode::Right => app.compose_move_right(),
        KeyCode::Home => app.compose_move_home(),
        KeyCode::End => app.compose_move_end(),
        KeyCode::Char('w') if key.modifiers.contains(KeyModifiers::CONTROL) => {
            app.compose_delete_word();
        }
        KeyCode::Char('u') if key.modifiers.contains(KeyModifiers::CONTROL) => {
            app.compose_clear();
        }
        KeyCode::Char(c) if c != '\r' && !key.modifiers.contains(KeyModifiers::CONTROL) => {
            app.compose_char(c);
        }
        _ => {}
    }
}

fn handle_negative(app: &mut App, key: KeyEvent) {
    match key.code {
        KeyCode::Enter => app.submit(),
        KeyCode::Tab => app.focus_next(),
        KeyCode::Esc => app.focus_compose(),
        KeyCode::Backspace => app.negative_mut().delete_char(),
        KeyCode::Left => app.negative_mut().move_cursor_left(),
        KeyCode::Right => app.negative_mut().move_cursor_right(),
        KeyCode::Home => app.negative_mut().reset_cursor(),
        KeyCode::End => app.negative_mut().move_cursor_end(),
        KeyCode::Char('u') if key.modifiers.contains(KeyModifiers::CONTROL) => {
            app.negative_mut().clear();
        }
        KeyCode::Char(c) if c != '\r' && !key.modifiers.contains(KeyModifiers::CONTROL) => {
            app.negative_mut().enter_char(c);
        }
        _ => {}
    }
}

fn handle_library(app: &mut App, key: KeyEvent) {
    match key.code {
        KeyCode::Tab => app.focus_next(),
        KeyCode::Esc => app.focus_compose(),
        KeyCode::Up | KeyCode::Char('k') => app.library_move_up(),
        KeyCode::Down | KeyCode::Char('j') => app.library_move_down(),
        KeyCode::Enter => app.library_activate(),
        _ => {}
    }
}

fn handle_gallery(app: &mut App, key: KeyEvent) {
    match key.code {
        KeyCode::Tab => app.focus_next(),
        KeyCode::Esc => app.focus_compose(),
        KeyCode::Up | KeyCode::Char('k') => app.gallery_move_up(),
        KeyCode::Down | KeyCode::Char('j') => app.gallery_move_down(),
        _ => {}
    }
}
