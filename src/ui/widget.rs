//! Widget trait and event results

use crate::input::InputEvent;
use crate::screen::Screen;
use super::layout::Rect;

/// Something a widget asks its owner to do
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum Action {
    /// Text field wants focus
    Focus,
    /// Text field got Enter
    Submit,
    /// On-screen key pressed
    KeyDown(u8),
    /// On-screen key released
    KeyUp(u8),
}

/// Result of handling an event
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum EventResult {
    /// Event was handled, stop propagation
    Consumed,
    /// Event was not handled, continue propagation
    Ignored,
    /// Event triggered an action for the owner
    Action(Action),
}

impl EventResult {
    pub fn is_consumed(&self) -> bool {
        !matches!(self, EventResult::Ignored)
    }
}

/// Common interface for UI widgets
///
/// Widgets receive their bounds from the layout and draw themselves within
/// them. Mouse events carry absolute positions, so a widget checks the
/// bounds before handling one.
pub trait Widget {
    fn draw(&self, screen: &mut Screen, bounds: Rect);

    fn handle_event(&mut self, event: &InputEvent, bounds: Rect) -> EventResult;

    fn set_focus(&mut self, _focused: bool) {}
}

/// Extract mouse position from an event
pub fn mouse_position(event: &InputEvent) -> Option<(u16, u16)> {
    match event {
        InputEvent::MouseClick { row, col }
        | InputEvent::MouseRelease { row, col }
        | InputEvent::ScrollUp { row, col }
        | InputEvent::ScrollDown { row, col } => Some((*row, *col)),
        _ => None,
    }
}
