//! Read-only source view with the run's error annotation

use crate::editor::EditorPane;
use crate::screen::Screen;
use crate::terminal::Color;
use super::layout::Rect;

const GUTTER_WIDTH: u16 = 5;

pub struct EditorView;

impl EditorView {
    /// Lines of source visible inside `bounds`
    pub fn content_rows(bounds: Rect) -> usize {
        bounds.height.saturating_sub(2) as usize
    }

    pub fn draw(screen: &mut Screen, pane: &EditorPane, bounds: Rect) {
        if bounds.width < 3 || bounds.height < 3 {
            return;
        }
        screen.draw_box(bounds.y, bounds.x, bounds.width, bounds.height, Color::White, Color::Blue);
        let title = format!(" {} ", pane.name());
        let title_x = bounds.x + bounds.width.saturating_sub(title.chars().count() as u16) / 2;
        screen.write_str(bounds.y, title_x, &title, Color::Blue, Color::White);

        let content = bounds.inset(1);
        let gutter = if pane.line_numbers() { GUTTER_WIDTH } else { 0 };
        let text_col = content.x + gutter;
        let text_width = content.width.saturating_sub(gutter) as usize;
        let annotation = pane.annotation();

        for r in 0..content.height {
            let line_num = pane.scroll() + r as usize;
            let Some(line) = pane.lines().get(line_num) else { break };
            let row = content.y + r;
            let bg = if line_num == pane.cursor_line() { Color::Cyan } else { Color::Blue };

            if gutter > 0 {
                let number = format!("{:>4} ", line_num + 1);
                screen.write_str(row, content.x, &number, Color::LightGray, Color::Blue);
            }
            screen.fill(row, text_col, text_width as u16, 1, ' ', Color::Yellow, bg);

            // Byte offsets of the error span on this line
            let span = annotation
                .filter(|a| a.location.line == line_num)
                .map(|a| (a.location.start_column, a.location.end_column.max(a.location.start_column + 1)));

            let mut byte = 0;
            for (i, ch) in line.chars().take(text_width).enumerate() {
                let (fg, cell_bg) = match span {
                    Some((start, end)) if byte >= start && byte < end => (Color::White, Color::Red),
                    _ => (Color::Yellow, bg),
                };
                screen.set(row, text_col + i as u16, ch, fg, cell_bg);
                byte += ch.len_utf8();
            }
        }

        // Message on the bottom border
        if let Some(a) = annotation {
            let msg = format!(" line {}: {} ", a.location.line + 1, a.message);
            let msg: String = msg.chars().take(content.width as usize).collect();
            screen.write_str(bounds.y + bounds.height - 1, content.x, &msg, Color::White, Color::Red);
        }
    }
}
