//! Input handling and global key bindings

use crate::terminal::{Key, MouseButton, MouseEvent};

/// Processed input events for the application
#[derive(Clone, Debug, PartialEq)]
pub enum InputEvent {
    /// Mouse press
    MouseClick { row: u16, col: u16 },
    /// Mouse release
    MouseRelease { row: u16, col: u16 },
    /// Mouse wheel scroll
    ScrollUp { row: u16, col: u16 },
    ScrollDown { row: u16, col: u16 },
    /// Regular character input
    Char(char),
    /// Navigation keys
    CursorUp,
    CursorDown,
    CursorLeft,
    CursorRight,
    Home,
    End,
    PageUp,
    PageDown,
    /// Space with a modifier, the closest a terminal gets to a bare modifier
    ShiftSpace,
    CtrlSpace,
    /// Editing keys
    Enter,
    CtrlEnter,
    Backspace,
    Delete,
    Tab,
    ShiftTab,
    Escape,
    /// Function keys
    F(u8),
    /// Ctrl shortcuts
    CtrlV, // Paste
    CtrlW, // Close simulator
    CtrlR, // Reload program
    CtrlQ, // Quit
    /// Other
    Unknown,
}

impl From<Key> for InputEvent {
    fn from(key: Key) -> Self {
        match key {
            Key::Char(c) => InputEvent::Char(c),
            Key::Enter => InputEvent::Enter,
            Key::CtrlEnter => InputEvent::CtrlEnter,
            Key::Escape => InputEvent::Escape,
            Key::Backspace => InputEvent::Backspace,
            Key::Delete => InputEvent::Delete,
            Key::Tab => InputEvent::Tab,
            Key::ShiftTab => InputEvent::ShiftTab,
            Key::Up => InputEvent::CursorUp,
            Key::Down => InputEvent::CursorDown,
            Key::Left => InputEvent::CursorLeft,
            Key::Right => InputEvent::CursorRight,
            Key::Home => InputEvent::Home,
            Key::End => InputEvent::End,
            Key::PageUp => InputEvent::PageUp,
            Key::PageDown => InputEvent::PageDown,
            Key::ShiftSpace => InputEvent::ShiftSpace,
            Key::CtrlSpace => InputEvent::CtrlSpace,
            Key::F(n) => InputEvent::F(n),
            Key::Ctrl('v') => InputEvent::CtrlV,
            Key::Ctrl('w') => InputEvent::CtrlW,
            Key::Ctrl('r') => InputEvent::CtrlR,
            Key::Ctrl('q') => InputEvent::CtrlQ,
            Key::Mouse(MouseEvent { button: MouseButton::Left, row, col, pressed: true, motion: false }) => {
                InputEvent::MouseClick { row, col }
            }
            Key::Mouse(MouseEvent { button: MouseButton::Left, row, col, pressed: false, .. }) => {
                InputEvent::MouseRelease { row, col }
            }
            Key::Mouse(MouseEvent { button: MouseButton::WheelUp, row, col, .. }) => {
                InputEvent::ScrollUp { row, col }
            }
            Key::Mouse(MouseEvent { button: MouseButton::WheelDown, row, col, .. }) => {
                InputEvent::ScrollDown { row, col }
            }
            _ => InputEvent::Unknown,
        }
    }
}

/// Application commands reachable from anywhere
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Command {
    /// Open the simulator, start, pause, or continue
    StartPause,
    /// Move the keyboard focus to the variable inspector or back
    FocusInspector,
    Stop,
    CloseSimulator,
    Reload,
    Quit,
}

/// Global shortcut bound to `event`. F1-F4 belong to the device keyboard.
pub fn command_for(event: &InputEvent) -> Option<Command> {
    match event {
        InputEvent::F(5) => Some(Command::StartPause),
        InputEvent::F(6) => Some(Command::FocusInspector),
        InputEvent::F(7) => Some(Command::Stop),
        InputEvent::CtrlW => Some(Command::CloseSimulator),
        InputEvent::CtrlR => Some(Command::Reload),
        InputEvent::CtrlQ => Some(Command::Quit),
        _ => None,
    }
}
