//! On-screen keyboard of the handheld

use crate::input::InputEvent;
use crate::screen::Screen;
use crate::sim::keyboard::{button_at, KeyButton, KEYBOARD_COLS, KEYBOARD_ROWS};
use crate::terminal::Color;
use super::layout::Rect;
use super::widget::{mouse_position, Action, EventResult, Widget};

const BUTTON_WIDTH: u16 = 7;

/// Mouse press sends key-down, release sends key-up for the same key
#[derive(Default)]
pub struct KeyboardView {
    /// Button held by the mouse
    pressed: Option<u8>,
}

impl KeyboardView {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn size() -> (u16, u16) {
        (BUTTON_WIDTH * KEYBOARD_COLS as u16, KEYBOARD_ROWS as u16)
    }

    /// Button under the given screen position
    pub fn hit_test(bounds: Rect, row: u16, col: u16) -> Option<KeyButton> {
        if !bounds.contains(row, col) {
            return None;
        }
        let r = (row - bounds.y) as usize;
        let c = ((col - bounds.x) / BUTTON_WIDTH) as usize;
        button_at(r, c)
    }

    /// Draw with `is_down` deciding which keys show as held
    pub fn draw_keys(&self, screen: &mut Screen, bounds: Rect, is_down: &dyn Fn(u8) -> bool) {
        for row in 0..KEYBOARD_ROWS {
            if row as u16 >= bounds.height {
                break;
            }
            for col in 0..KEYBOARD_COLS {
                let Some(button) = button_at(row, col) else { continue };
                let x = bounds.x + col as u16 * BUTTON_WIDTH;
                if x + BUTTON_WIDTH > bounds.x + bounds.width {
                    break;
                }
                let down = self.pressed == Some(button.code) || is_down(button.code);
                let (fg, bg) = if down {
                    (Color::White, Color::Black)
                } else {
                    (Color::Black, Color::LightGray)
                };
                let label = format!("{:^width$}", button.label, width = BUTTON_WIDTH as usize - 1);
                screen.write_str(bounds.y + row as u16, x, &label, fg, bg);
            }
        }
    }
}

impl Widget for KeyboardView {
    fn draw(&self, screen: &mut Screen, bounds: Rect) {
        self.draw_keys(screen, bounds, &|_| false);
    }

    fn handle_event(&mut self, event: &InputEvent, bounds: Rect) -> EventResult {
        match (event, mouse_position(event)) {
            (InputEvent::MouseClick { .. }, Some((row, col))) => match Self::hit_test(bounds, row, col) {
                Some(button) => {
                    self.pressed = Some(button.code);
                    EventResult::Action(Action::KeyDown(button.code))
                }
                None => EventResult::Ignored,
            },
            // Released wherever the pointer ended up
            (InputEvent::MouseRelease { .. }, _) => match self.pressed.take() {
                Some(code) => EventResult::Action(Action::KeyUp(code)),
                None => EventResult::Ignored,
            },
            _ => EventResult::Ignored,
        }
    }
}
