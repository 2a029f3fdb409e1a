//! Key codes of the simulated handheld and how host keys reach them

use crate::input::InputEvent;

pub const KEY_ENTER: u8 = 13;
pub const KEY_PAGE_DOWN: u8 = 14;
pub const KEY_IME: u8 = 18;
pub const KEY_PAGE_UP: u8 = 19;
pub const KEY_UP: u8 = 20;
pub const KEY_DOWN: u8 = 21;
pub const KEY_RIGHT: u8 = 22;
pub const KEY_LEFT: u8 = 23;
pub const KEY_HELP: u8 = 25;
pub const KEY_SHIFT: u8 = 26;
pub const KEY_ESCAPE: u8 = 27;
pub const KEY_F1: u8 = 28;
pub const KEY_SPACE: u8 = 32;

/// Number keys share the letter keys of the numeric block
const DIGIT_KEYS: [u8; 9] = [b'b', b'n', b'm', b'g', b'h', b'j', b't', b'y', b'u'];

/// Translate a host key into a device key code
pub fn device_key(event: &InputEvent) -> Option<u8> {
    match event {
        InputEvent::F(n @ 1..=4) => Some(KEY_F1 + (n - 1)),
        InputEvent::CursorUp => Some(KEY_UP),
        InputEvent::CursorDown => Some(KEY_DOWN),
        InputEvent::CursorRight => Some(KEY_RIGHT),
        InputEvent::CursorLeft => Some(KEY_LEFT),
        InputEvent::Enter => Some(KEY_ENTER),
        InputEvent::PageDown => Some(KEY_PAGE_DOWN),
        InputEvent::PageUp => Some(KEY_PAGE_UP),
        InputEvent::Escape => Some(KEY_ESCAPE),
        // Bare modifiers never arrive from a terminal
        InputEvent::ShiftSpace => Some(KEY_SHIFT),
        InputEvent::CtrlSpace => Some(KEY_HELP),
        InputEvent::Char(c) => char_key(*c),
        _ => None,
    }
}

fn char_key(c: char) -> Option<u8> {
    match c {
        'a'..='z' | 'A'..='Z' => Some(c.to_ascii_lowercase() as u8),
        '1'..='9' => Some(DIGIT_KEYS[c as usize - '1' as usize]),
        '0' => Some(b'0'),
        '.' => Some(b'.'),
        ' ' => Some(KEY_SPACE),
        '~' => Some(KEY_IME),
        _ => None,
    }
}

/// One button of the on-screen keyboard
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct KeyButton {
    pub label: &'static str,
    pub code: u8,
}

const fn b(label: &'static str, code: u8) -> Option<KeyButton> {
    Some(KeyButton { label, code })
}

pub const KEYBOARD_ROWS: usize = 5;
pub const KEYBOARD_COLS: usize = 10;

/// Layout of the handheld keyboard
pub const KEYBOARD: [[Option<KeyButton>; KEYBOARD_COLS]; KEYBOARD_ROWS] = [
    [None, None, None, None, None, None, b("F1", 28), b("F2", 29), b("F3", 30), b("F4", 31)],
    [
        b("Q", b'q'),
        b("W", b'w'),
        b("E", b'e'),
        b("R", b'r'),
        b("T 7", b't'),
        b("Y 8", b'y'),
        b("U 9", b'u'),
        b("I", b'i'),
        b("O", b'o'),
        b("P", b'p'),
    ],
    [
        b("A", b'a'),
        b("S", b's'),
        b("D", b'd'),
        b("F", b'f'),
        b("G 4", b'g'),
        b("H 5", b'h'),
        b("J 6", b'j'),
        b("K", b'k'),
        b("L", b'l'),
        b("Enter", KEY_ENTER),
    ],
    [
        b("Z", b'z'),
        b("X", b'x'),
        b("C", b'c'),
        b("V", b'v'),
        b("B 1", b'b'),
        b("N 2", b'n'),
        b("M 3", b'm'),
        b("PgUp", KEY_PAGE_UP),
        b("\u{2191}", KEY_UP),
        b("PgDn", KEY_PAGE_DOWN),
    ],
    [
        b("Help", KEY_HELP),
        b("Shift", KEY_SHIFT),
        b("IME", KEY_IME),
        b("Esc", KEY_ESCAPE),
        b("0", b'0'),
        b(".", b'.'),
        b("Space", KEY_SPACE),
        b("\u{2190}", KEY_LEFT),
        b("\u{2193}", KEY_DOWN),
        b("\u{2192}", KEY_RIGHT),
    ],
];

pub fn button_at(row: usize, col: usize) -> Option<KeyButton> {
    KEYBOARD.get(row).and_then(|r| r.get(col)).copied().flatten()
}
