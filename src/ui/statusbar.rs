//! Toolbar on top and status line at the bottom

use crate::lifecycle::{LifecycleState, ToolbarState};
use crate::screen::Screen;
use crate::terminal::Color;
use super::layout::Rect;

/// Run controls. Stateless; drawn from the lifecycle's toolbar state.
pub struct Toolbar;

impl Toolbar {
    pub fn draw(screen: &mut Screen, toolbar: &ToolbarState, tooltip: Option<&str>, bounds: Rect) {
        let row = bounds.y;
        screen.fill(row, bounds.x, bounds.width, 1, ' ', Color::Black, Color::LightGray);

        let mut col = bounds.x + 1;
        let mut item = |screen: &mut Screen, key: &str, label: &str, enabled: bool| {
            let fg = if enabled { Color::Black } else { Color::DarkGray };
            screen.write_str(row, col, key, Color::Red, Color::LightGray);
            screen.write_str(row, col + key.len() as u16 + 1, label, fg, Color::LightGray);
            col += (key.len() + label.chars().count() + 3) as u16;
        };

        item(screen, "F5", toolbar.start.label(), tooltip.is_none());
        item(screen, "F6", "Variables", toolbar.inspector_editable);
        item(screen, "F7", "Stop", toolbar.stop_enabled);
        item(screen, "^W", "Close", true);
        item(screen, "^R", "Reload", true);
        item(screen, "^Q", "Quit", true);

        if let Some(tip) = tooltip {
            let x = bounds.x + bounds.width.saturating_sub(tip.len() as u16 + 1);
            screen.write_str(row, x, tip, Color::Red, Color::LightGray);
        }
    }
}

pub struct StatusBar;

impl StatusBar {
    pub fn draw(
        screen: &mut Screen,
        state: LifecycleState,
        hint: Option<&str>,
        cursor_line: usize,
        bounds: Rect,
    ) {
        let row = bounds.y;
        screen.fill(row, bounds.x, bounds.width, 1, ' ', Color::White, Color::Cyan);

        let state_text = match state {
            LifecycleState::Stopped => " Stopped ",
            LifecycleState::Started => " Running... ",
            LifecycleState::Paused => " Paused ",
        };
        screen.write_str(row, bounds.x, state_text, Color::White, Color::Cyan);

        if let Some(hint) = hint {
            let x = bounds.x + bounds.width.saturating_sub(hint.len() as u16) / 2;
            screen.write_str(row, x, hint, Color::Black, Color::Cyan);
        }

        // Line number on the right, like "00012"
        let pos = format!("{:05} ", cursor_line + 1);
        let x = bounds.x + bounds.width.saturating_sub(pos.len() as u16);
        screen.write_str(row, x, &pos, Color::Black, Color::Cyan);
    }
}
