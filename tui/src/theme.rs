//! Color palette for the TUI.

use ratatui::style::{Color, Modifier, Style};

#[derive(Debug, Clone, Copy)]
pub struct Palette {
    pub text: Color,
    pub text_muted: Color,
    pub border: Color,
    pub border_focused: Color,
    pub chip_image: Color,
    pub chip_resource: Color,
    pub warning: Color,
    pub error: Color,
    pub accent: Color,
    pub selection_bg: Color,
}

impl Default for Palette {
    fn default() -> Self {
        Self {
            text: Color::Gray,
            text_muted: Color::DarkGray,
            border: Color::DarkGray,
            border_focused: Color::Magenta,
            chip_image: Color::Magenta,
            chip_resource: Color::Blue,
            warning: Color::Yellow,
            error: Color::Red,
            accent: Color::Cyan,
            selection_bg: Color::Rgb(60, 40, 80),
        }
    }
}

impl Palette {
    #[must_use]
    pub fn chip_style(&self, resource: bool, resolved: bool) -> Style {
        if !resolved {
            return Style::default()
                .fg(self.warning)
                .add_modifier(Modifier::ITALIC);
        }
        let color = if resource {
            self.chip_resource
        } else {
            self.chip_image
        };
        Style::default().fg(color).add_modifier(Modifier::BOLD)
    }
}
