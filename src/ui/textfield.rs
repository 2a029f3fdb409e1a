//! TextField widget - a single-line text input field

use crate::input::InputEvent;
use crate::screen::Screen;
use crate::terminal::Color;
use super::layout::Rect;
use super::widget::{mouse_position, Action, EventResult, Widget};

/// Colors for the text field
#[derive(Clone, Copy)]
pub struct TextFieldColors {
    pub text_fg: Color,
    pub text_bg: Color,
    pub cursor_fg: Color,
    pub cursor_bg: Color,
}

impl Default for TextFieldColors {
    fn default() -> Self {
        Self {
            text_fg: Color::Black,
            text_bg: Color::Cyan,
            cursor_fg: Color::Cyan,
            cursor_bg: Color::Black,
        }
    }
}

/// A single-line text input widget
pub struct TextField {
    text: Vec<char>,
    /// Cursor position (character index)
    cursor_pos: usize,
    /// First visible character
    scroll_offset: usize,
    colors: TextFieldColors,
    focused: bool,
}

impl Default for TextField {
    fn default() -> Self {
        Self::new()
    }
}

impl TextField {
    pub fn new() -> Self {
        Self {
            text: Vec::new(),
            cursor_pos: 0,
            scroll_offset: 0,
            colors: TextFieldColors::default(),
            focused: false,
        }
    }

    pub fn text(&self) -> String {
        self.text.iter().collect()
    }

    #[cfg(test)]
    pub fn set_text(&mut self, text: &str) {
        self.text = text.chars().collect();
        self.cursor_pos = self.text.len();
        self.scroll_offset = 0;
    }

    pub fn cursor_pos(&self) -> usize {
        self.cursor_pos
    }

    /// Insert at the cursor. Line breaks are dropped.
    pub fn insert_str(&mut self, s: &str) {
        for ch in s.chars().filter(|c| !matches!(c, '\r' | '\n')) {
            self.insert_char(ch);
        }
    }

    fn insert_char(&mut self, ch: char) {
        self.text.insert(self.cursor_pos, ch);
        self.cursor_pos += 1;
    }

    fn backspace(&mut self) {
        if self.cursor_pos > 0 {
            self.cursor_pos -= 1;
            self.text.remove(self.cursor_pos);
        }
    }

    fn delete(&mut self) {
        if self.cursor_pos < self.text.len() {
            self.text.remove(self.cursor_pos);
        }
    }

    /// Apply an editing or cursor key. False if the key is not one.
    fn edit(&mut self, event: &InputEvent) -> bool {
        match event {
            InputEvent::Char(ch) => self.insert_char(*ch),
            InputEvent::Backspace => self.backspace(),
            InputEvent::Delete => self.delete(),
            InputEvent::CursorLeft => self.cursor_pos = self.cursor_pos.saturating_sub(1),
            InputEvent::CursorRight => self.cursor_pos = (self.cursor_pos + 1).min(self.text.len()),
            InputEvent::Home => self.cursor_pos = 0,
            InputEvent::End => self.cursor_pos = self.text.len(),
            _ => return false,
        }
        true
    }

    fn ensure_cursor_visible(&mut self, visible_width: usize) {
        if visible_width == 0 {
            return;
        }

        // Leave one cell at the end for the cursor when at end of text
        let usable_width = visible_width.saturating_sub(1);

        if self.cursor_pos < self.scroll_offset {
            self.scroll_offset = self.cursor_pos;
        } else if self.cursor_pos > self.scroll_offset + usable_width {
            self.scroll_offset = self.cursor_pos - usable_width;
        }
    }
}

impl Widget for TextField {
    fn draw(&self, screen: &mut Screen, bounds: Rect) {
        if bounds.width == 0 || bounds.height == 0 {
            return;
        }

        let visible = (self.scroll_offset..).take(bounds.width as usize);
        for (col, index) in (bounds.x..).zip(visible) {
            let ch = self.text.get(index).copied().unwrap_or(' ');
            let (fg, bg) = if self.focused && index == self.cursor_pos {
                (self.colors.cursor_fg, self.colors.cursor_bg)
            } else {
                (self.colors.text_fg, self.colors.text_bg)
            };
            screen.set(bounds.y, col, ch, fg, bg);
        }
    }

    fn handle_event(&mut self, event: &InputEvent, bounds: Rect) -> EventResult {
        if self.focused {
            if *event == InputEvent::Enter {
                return EventResult::Action(Action::Submit);
            }
            if self.edit(event) {
                self.ensure_cursor_visible(bounds.width as usize);
                return EventResult::Consumed;
            }
        }

        match (event, mouse_position(event)) {
            (InputEvent::MouseClick { .. }, Some((row, col))) if bounds.contains(row, col) => {
                let char_pos = self.scroll_offset + (col - bounds.x) as usize;
                self.cursor_pos = char_pos.min(self.text.len());
                EventResult::Action(Action::Focus)
            }
            _ => EventResult::Ignored,
        }
    }

    fn set_focus(&mut self, focused: bool) {
        self.focused = focused;
    }
}
