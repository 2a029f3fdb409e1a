//! Modal view for a structured `INPUT` statement
//!
//! The view owns one text field per requested value and drives the
//! validation session in [`crate::sim::input_dialog`]. Enter on a field
//! finishes it and moves on; Enter on the last field, Ctrl+Enter and OK
//! submit everything.

use crate::engine::{Engine, InputRequest, KeyboardInput};
use crate::input::InputEvent;
use crate::screen::Screen;
use crate::sim::input_dialog::{DialogState, InputDialog};
use crate::terminal::Color;
use super::layout::Rect;
use super::textfield::TextField;
use super::widget::{Action, EventResult, Widget};

const DIALOG_WIDTH: u16 = 52;
/// Rows per field: label, text, error
const FIELD_ROWS: u16 = 3;
const OK_LABEL: &str = "< OK >";
const CANCEL_LABEL: &str = "< Cancel >";

/// What the owner has to do after an event
#[derive(Debug, PartialEq)]
pub enum DialogOutcome {
    Pending,
    Accepted(Vec<KeyboardInput>),
    Cancelled,
}

pub struct InputDialogView {
    session: InputDialog,
    fields: Vec<TextField>,
    focus: usize,
}

impl InputDialogView {
    pub fn new(request: InputRequest) -> Self {
        let session = InputDialog::new(request);
        let mut fields: Vec<TextField> = (0..session.field_count()).map(|_| TextField::new()).collect();
        if let Some(first) = fields.first_mut() {
            first.set_focus(true);
        }
        Self { session, fields, focus: 0 }
    }

    #[cfg(test)]
    pub fn session(&self) -> &InputDialog {
        &self.session
    }

    #[cfg(test)]
    pub fn focus(&self) -> usize {
        self.focus
    }

    pub fn size(&self) -> (u16, u16) {
        let prompt = u16::from(self.session.prompt().is_some());
        (DIALOG_WIDTH, 2 + prompt + FIELD_ROWS * self.fields.len() as u16 + 2)
    }

    /// Insert clipboard text into the focused field
    pub fn paste(&mut self, text: &str) {
        if let Some(field) = self.fields.get_mut(self.focus) {
            field.insert_str(text);
        }
    }

    /// Close without submitting, returning held values to the engine
    pub fn cancel<E: Engine + ?Sized>(&mut self, engine: &mut E) -> DialogOutcome {
        self.session.cancel(engine);
        self.outcome()
    }

    pub fn handle_event<E: Engine + ?Sized>(
        &mut self,
        event: &InputEvent,
        bounds: Rect,
        engine: &mut E,
    ) -> DialogOutcome {
        if self.fields.is_empty() {
            return DialogOutcome::Pending;
        }

        match event {
            InputEvent::Escape => return self.cancel(engine),
            InputEvent::CtrlEnter => self.submit(engine),
            InputEvent::Tab | InputEvent::CursorDown => self.move_focus(self.focus + 1, engine),
            InputEvent::ShiftTab | InputEvent::CursorUp => {
                let prev = (self.focus + self.fields.len() - 1) % self.fields.len();
                self.move_focus(prev, engine);
            }
            InputEvent::MouseClick { row, col } => {
                let (ok, cancel) = self.button_rects(bounds);
                if ok.contains(*row, *col) {
                    self.submit(engine);
                } else if cancel.contains(*row, *col) {
                    return self.cancel(engine);
                } else {
                    for idx in 0..self.fields.len() {
                        let rect = self.field_rect(bounds, idx);
                        if self.fields[idx].handle_event(event, rect) == EventResult::Action(Action::Focus) {
                            if idx != self.focus {
                                self.move_focus(idx, engine);
                            }
                            break;
                        }
                    }
                }
            }
            _ => {
                let rect = self.field_rect(bounds, self.focus);
                if self.fields[self.focus].handle_event(event, rect) == EventResult::Action(Action::Submit) {
                    if self.focus + 1 == self.fields.len() {
                        self.submit(engine);
                    } else {
                        self.move_focus(self.focus + 1, engine);
                    }
                }
            }
        }
        self.outcome()
    }

    /// Finish the focused field, then focus `idx` (wrapping)
    fn move_focus<E: Engine + ?Sized>(&mut self, idx: usize, engine: &mut E) {
        self.finish_focused(engine);
        if self.session.state() != DialogState::Editing {
            return;
        }
        self.fields[self.focus].set_focus(false);
        self.focus = idx % self.fields.len();
        self.fields[self.focus].set_focus(true);
    }

    fn finish_focused<E: Engine + ?Sized>(&mut self, engine: &mut E) {
        let text = self.fields[self.focus].text();
        self.session.finish_field(self.focus, &text, engine);
    }

    fn submit<E: Engine + ?Sized>(&mut self, engine: &mut E) {
        let texts: Vec<String> = self.fields.iter().map(TextField::text).collect();
        if self.session.submit_all(&texts, engine) == DialogState::Editing {
            // Jump to the first field that failed
            if let Some(bad) = (0..self.fields.len()).find(|&i| !self.session.is_field_valid(i)) {
                self.fields[self.focus].set_focus(false);
                self.focus = bad;
                self.fields[bad].set_focus(true);
            }
        }
    }

    fn outcome(&mut self) -> DialogOutcome {
        match self.session.state() {
            DialogState::Accepted => match self.session.take_values() {
                Some(values) => DialogOutcome::Accepted(values),
                None => DialogOutcome::Pending,
            },
            DialogState::Rejected => DialogOutcome::Cancelled,
            DialogState::Editing | DialogState::ValidatingAll => DialogOutcome::Pending,
        }
    }

    fn first_field_row(&self, bounds: Rect) -> u16 {
        bounds.y + 1 + u16::from(self.session.prompt().is_some())
    }

    fn field_rect(&self, bounds: Rect, idx: usize) -> Rect {
        let row = self.first_field_row(bounds) + idx as u16 * FIELD_ROWS + 1;
        Rect::new(bounds.x + 2, row, bounds.width.saturating_sub(4), 1)
    }

    fn button_rects(&self, bounds: Rect) -> (Rect, Rect) {
        let row = bounds.y + bounds.height.saturating_sub(2);
        let ok = Rect::new(bounds.x + 2, row, OK_LABEL.len() as u16, 1);
        let cancel = Rect::new(ok.x + ok.width + 2, row, CANCEL_LABEL.len() as u16, 1);
        (ok, cancel)
    }

    pub fn draw(&self, screen: &mut Screen, bounds: Rect) {
        screen.draw_box(bounds.y, bounds.x, bounds.width, bounds.height, Color::Black, Color::LightGray);
        let title = " Input ";
        let title_x = bounds.x + bounds.width.saturating_sub(title.len() as u16) / 2;
        screen.write_str(bounds.y, title_x, title, Color::Black, Color::LightGray);

        if let Some(prompt) = self.session.prompt() {
            screen.write_str(bounds.y + 1, bounds.x + 2, prompt, Color::Black, Color::LightGray);
        }

        for (idx, field) in self.fields.iter().enumerate() {
            let rect = self.field_rect(bounds, idx);
            let label = self.session.field_label(idx);
            screen.write_str(rect.y - 1, rect.x, &label, Color::Black, Color::LightGray);
            field.draw(screen, rect);
            if let Some(err) = self.session.field_error(idx) {
                let msg: String = err.to_string().chars().take(rect.width as usize).collect();
                screen.write_str(rect.y + 1, rect.x, &msg, Color::Red, Color::LightGray);
            }
        }

        let (ok, cancel) = self.button_rects(bounds);
        screen.write_str(ok.y, ok.x, OK_LABEL, Color::Black, Color::LightGray);
        screen.write_str(cancel.y, cancel.x, CANCEL_LABEL, Color::Black, Color::LightGray);
        screen.write_str(cancel.y, cancel.x + cancel.width + 2, "Ctrl+Enter submits", Color::DarkGray, Color::LightGray);

        let cursor = self.field_rect(bounds, self.focus);
        let offset = self.fields[self.focus].cursor_pos().min(cursor.width.saturating_sub(1) as usize);
        screen.set_cursor(cursor.y, cursor.x + offset as u16);
    }
}
