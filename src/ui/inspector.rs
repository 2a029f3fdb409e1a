//! Variable inspector panel
//!
//! Draws the rows of [`crate::sim::inspector::Inspector`] in a framed
//! list. Up and Down select, Enter expands an array or opens an editor on
//! the value, and Enter in the editor stores it. Escape closes the editor,
//! then gives the focus back.

use crate::engine::Engine;
use crate::input::InputEvent;
use crate::lifecycle::INSPECTOR_HINT;
use crate::screen::Screen;
use crate::sim::inspector::Inspector;
use crate::terminal::Color;
use super::layout::Rect;
use super::textfield::TextField;
use super::widget::{mouse_position, Action, EventResult, Widget};

/// Frame, list and message line
pub const INSPECTOR_HEIGHT: u16 = 9;
const LABEL_WIDTH: u16 = 14;

pub struct InspectorView {
    model: Inspector,
    editor: Option<TextField>,
    error: Option<String>,
    focused: bool,
}

impl Default for InspectorView {
    fn default() -> Self {
        Self::new()
    }
}

impl InspectorView {
    pub fn new() -> Self {
        Self { model: Inspector::new(), editor: None, error: None, focused: false }
    }

    #[cfg(test)]
    pub fn model(&self) -> &Inspector {
        &self.model
    }

    pub fn is_focused(&self) -> bool {
        self.focused
    }

    pub fn is_editing(&self) -> bool {
        self.editor.is_some()
    }

    pub fn set_focus(&mut self, focused: bool) {
        self.focused = focused && self.model.is_enabled();
        if !self.focused {
            self.close_editor();
        }
    }

    /// Follow the lifecycle: editable only while paused or stopped
    pub fn set_enabled<E: Engine + ?Sized>(&mut self, enabled: bool, engine: &E) {
        self.model.set_enabled(enabled, engine);
        if !enabled {
            self.set_focus(false);
        }
    }

    fn close_editor(&mut self) {
        self.editor = None;
        self.error = None;
    }

    fn list_rect(bounds: Rect) -> Rect {
        Rect::new(bounds.x + 1, bounds.y + 1, bounds.width.saturating_sub(2), bounds.height.saturating_sub(3))
    }

    /// First row index shown, keeping the selection in view
    fn first_visible(&self, list: Rect) -> usize {
        let visible = (list.height as usize).max(1);
        (self.model.selected() + 1).saturating_sub(visible)
    }

    fn value_rect(&self, list: Rect, idx: usize) -> Rect {
        let row = list.y + (idx - self.first_visible(list)) as u16;
        Rect::new(list.x + LABEL_WIDTH + 1, row, list.width.saturating_sub(LABEL_WIDTH + 1), 1)
    }

    fn begin_edit<E: Engine + ?Sized>(&mut self, engine: &E) {
        if let Some(text) = self.model.edit_text(engine) {
            let mut field = TextField::new();
            field.insert_str(&text);
            field.set_focus(true);
            self.editor = Some(field);
            self.error = None;
        }
    }

    fn commit<E: Engine + ?Sized>(&mut self, engine: &mut E) {
        let Some(text) = self.editor.as_ref().map(TextField::text) else {
            return;
        };
        match self.model.commit(&text, engine) {
            Ok(()) => self.close_editor(),
            Err(err) => self.error = Some(err.to_string()),
        }
    }

    pub fn handle_event<E: Engine + ?Sized>(
        &mut self,
        event: &InputEvent,
        bounds: Rect,
        engine: &mut E,
    ) -> EventResult {
        let list = Self::list_rect(bounds);

        if let Some((row, col)) = mouse_position(event) {
            if !matches!(event, InputEvent::MouseClick { .. }) || !bounds.contains(row, col) {
                return EventResult::Ignored;
            }
            let was_focused = self.focused;
            self.set_focus(true);
            if !self.focused || !list.contains(row, col) {
                return EventResult::Consumed;
            }
            let idx = self.first_visible(list) + (row - list.y) as usize;
            if idx >= self.model.rows().len() {
                return EventResult::Consumed;
            }
            if !was_focused {
                self.model.select(idx);
            } else if idx == self.model.selected() && !self.is_editing() {
                if !self.model.toggle_expanded(engine) {
                    self.begin_edit(engine);
                }
            } else if idx != self.model.selected() {
                self.close_editor();
                self.model.select(idx);
            }
            return EventResult::Consumed;
        }

        if !self.focused {
            return EventResult::Ignored;
        }

        if self.editor.is_some() {
            let rect = self.value_rect(list, self.model.selected());
            match event {
                InputEvent::Escape => self.close_editor(),
                _ => {
                    let submitted = self
                        .editor
                        .as_mut()
                        .map(|field| field.handle_event(event, rect) == EventResult::Action(Action::Submit))
                        .unwrap_or(false);
                    if submitted {
                        self.commit(engine);
                    }
                }
            }
            return EventResult::Consumed;
        }

        match event {
            InputEvent::CursorUp => self.model.select_prev(),
            InputEvent::CursorDown => self.model.select_next(),
            InputEvent::Home => self.model.select(0),
            InputEvent::End => self.model.select(usize::MAX),
            InputEvent::Enter => {
                if !self.model.toggle_expanded(engine) {
                    self.begin_edit(engine);
                }
            }
            InputEvent::Escape => self.set_focus(false),
            _ => return EventResult::Ignored,
        }
        EventResult::Consumed
    }

    pub fn draw(&self, screen: &mut Screen, bounds: Rect) {
        let frame = if self.focused { Color::White } else { Color::DarkGray };
        screen.draw_box(bounds.y, bounds.x, bounds.width, bounds.height, frame, Color::Black);
        screen.write_str(bounds.y, bounds.x + 2, " Variables (F6) ", frame, Color::Black);

        let list = Self::list_rect(bounds);
        let message_row = list.y + list.height;
        if !self.model.is_enabled() {
            screen.write_str(list.y, list.x + 1, INSPECTOR_HINT, Color::DarkGray, Color::Black);
            return;
        }
        if self.model.rows().is_empty() {
            screen.write_str(list.y, list.x + 1, "No variables", Color::DarkGray, Color::Black);
        }

        let first = self.first_visible(list);
        for (offset, row) in self.model.rows().iter().skip(first).take(list.height as usize).enumerate() {
            let idx = first + offset;
            let y = list.y + offset as u16;
            let (fg, bg) = if self.focused && idx == self.model.selected() {
                (Color::Black, Color::Cyan)
            } else {
                (Color::LightGray, Color::Black)
            };
            screen.fill(y, list.x, list.width, 1, ' ', fg, bg);
            let label: String = row.label.chars().take(LABEL_WIDTH as usize).collect();
            screen.write_str(y, list.x, &label, fg, bg);
            let value = self.value_rect(list, idx);
            match (&self.editor, idx == self.model.selected()) {
                (Some(field), true) => field.draw(screen, value),
                _ => {
                    let text: String = row.value.chars().take(value.width as usize).collect();
                    screen.write_str(y, value.x, &text, fg, bg);
                }
            }
        }

        if let Some(err) = &self.error {
            let msg: String = err.chars().take(list.width as usize).collect();
            screen.write_str(message_row, list.x, &msg, Color::Red, Color::Black);
        }

        if let Some(field) = &self.editor {
            let value = self.value_rect(list, self.model.selected());
            let offset = field.cursor_pos().min(value.width.saturating_sub(1) as usize);
            screen.set_cursor(value.y, value.x + offset as u16);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::engine::mock::MockEngine;
    use crate::engine::{EngineString, Value};

    const BOUNDS: Rect = Rect { x: 1, y: 1, width: 40, height: INSPECTOR_HEIGHT };

    fn engine() -> MockEngine {
        let mut engine = MockEngine::default();
        engine.vars.assign("A%", Value::Integer(1)).ok();
        engine.vars.assign("S$", Value::String(EngineString(b"X".to_vec()))).ok();
        engine.vars.dim("B%", vec![2]);
        engine
    }

    fn view(engine: &MockEngine) -> InspectorView {
        let mut view = InspectorView::new();
        view.set_enabled(true, engine);
        view.set_focus(true);
        view
    }

    fn send(view: &mut InspectorView, events: &[InputEvent], engine: &mut MockEngine) {
        for event in events {
            assert_eq!(view.handle_event(event, BOUNDS, engine), EventResult::Consumed);
        }
    }

    fn row_text(screen: &Screen, row: u16) -> String {
        (1..=BOUNDS.width).filter_map(|col| screen.get(row, col).map(|c| c.ch)).collect()
    }

    #[test]
    fn test_edit_integer_with_keys() {
        let mut engine = engine();
        let mut v = view(&engine);
        send(
            &mut v,
            &[InputEvent::Enter, InputEvent::Backspace, InputEvent::Char('9'), InputEvent::Enter],
            &mut engine,
        );
        assert!(!v.is_editing());
        assert_eq!(engine.vars.get("A%"), Some(Value::Integer(9)));
    }

    #[test]
    fn test_invalid_value_keeps_editor_open() {
        let mut engine = engine();
        let mut v = view(&engine);
        send(&mut v, &[InputEvent::Enter, InputEvent::Char('x'), InputEvent::Enter], &mut engine);
        assert!(v.is_editing());

        let mut screen = Screen::new(40, INSPECTOR_HEIGHT);
        v.draw(&mut screen, BOUNDS);
        assert!(row_text(&screen, INSPECTOR_HEIGHT - 1).contains("not an integer"));

        send(&mut v, &[InputEvent::Escape], &mut engine);
        assert!(!v.is_editing());
        assert!(v.is_focused());
        assert_eq!(engine.vars.get("A%"), Some(Value::Integer(1)));
    }

    #[test]
    fn test_enter_expands_array() {
        let mut engine = engine();
        let mut v = view(&engine);
        send(&mut v, &[InputEvent::End, InputEvent::Enter], &mut engine);
        assert!(!v.is_editing());
        assert_eq!(v.model().rows().len(), 6);

        send(&mut v, &[InputEvent::CursorDown, InputEvent::CursorDown, InputEvent::Enter], &mut engine);
        assert!(v.is_editing());
        send(&mut v, &[InputEvent::Char('4'), InputEvent::Enter], &mut engine);
        assert_eq!(engine.vars.element("B%", &[1]), Some(Value::Integer(4)));
    }

    #[test]
    fn test_disabled_shows_hint_and_drops_focus() {
        let engine = engine();
        let mut v = view(&engine);
        v.set_enabled(false, &engine);
        assert!(!v.is_focused());
        v.set_focus(true);
        assert!(!v.is_focused());

        let mut screen = Screen::new(80, INSPECTOR_HEIGHT);
        v.draw(&mut screen, Rect::new(1, 1, 80, INSPECTOR_HEIGHT));
        let text: String = (1..=80).filter_map(|col| screen.get(2, col).map(|c| c.ch)).collect();
        assert!(text.contains(INSPECTOR_HINT));
    }

    #[test]
    fn test_click_selects_then_edits() {
        let mut engine = engine();
        let mut v = InspectorView::new();
        v.set_enabled(true, &engine);
        let click = InputEvent::MouseClick { row: 3, col: 4 };
        send(&mut v, &[click.clone()], &mut engine);
        assert!(v.is_focused());
        assert_eq!(v.model().selected(), 1);
        assert!(!v.is_editing());

        send(&mut v, &[click], &mut engine);
        assert!(v.is_editing());

        let mut screen = Screen::new(40, INSPECTOR_HEIGHT);
        v.draw(&mut screen, BOUNDS);
        assert!(row_text(&screen, 3).contains("S$"));
        assert_eq!(
            v.handle_event(&InputEvent::MouseClick { row: 30, col: 4 }, BOUNDS, &mut engine),
            EventResult::Ignored
        );
    }
}
