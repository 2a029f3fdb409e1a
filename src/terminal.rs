//! Terminal handling with raw ANSI escape sequences

use std::io::{self, BufWriter, Read, Stdout, Write};
use std::os::unix::io::AsRawFd;
use std::thread;
use std::time::Duration;

/// How long to wait for the rest of an escape sequence after a lone ESC
const ESCAPE_WAIT: Duration = Duration::from_millis(10);

/// Palette used by the shell, plus arbitrary RGB for the device screen
#[derive(Clone, Copy, PartialEq, Eq, Debug)]
pub enum Color {
    Black,
    Blue,
    Cyan,
    Red,
    LightGray,
    DarkGray,
    Yellow,
    White,
    Rgb(u8, u8, u8),
}

impl Color {
    /// Color from a `0xRRGGBB` value
    pub fn from_hex(rgb: u32) -> Color {
        Color::Rgb((rgb >> 16) as u8, (rgb >> 8) as u8, rgb as u8)
    }

    fn rgb(self) -> (u8, u8, u8) {
        match self {
            Color::Black => (0x00, 0x00, 0x00),
            Color::Blue => (0x00, 0x00, 0xAA),
            Color::Cyan => (0x00, 0xAA, 0xAA),
            Color::Red => (0xAA, 0x00, 0x00),
            Color::LightGray => (0xAA, 0xAA, 0xAA),
            Color::DarkGray => (0x55, 0x55, 0x55),
            Color::Yellow => (0xFF, 0xFF, 0x55),
            Color::White => (0xFF, 0xFF, 0xFF),
            Color::Rgb(r, g, b) => (r, g, b),
        }
    }

    /// Truecolor SGR parameters, `38;2;r;g;b` or `48;2;r;g;b`
    fn sgr(self, layer: u8) -> String {
        let (r, g, b) = self.rgb();
        format!("{};2;{};{};{}", layer, r, g, b)
    }
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub enum MouseButton {
    Left,
    Middle,
    Right,
    WheelUp,
    WheelDown,
    None, // motion without a button
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct MouseEvent {
    pub button: MouseButton,
    pub row: u16,
    pub col: u16,
    pub pressed: bool,
    pub motion: bool,
}

/// Key events including special keys
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum Key {
    Char(char),
    Enter,
    CtrlEnter,
    Escape,
    Backspace,
    Delete,
    Tab,
    ShiftTab,
    Up,
    Down,
    Left,
    Right,
    Home,
    End,
    PageUp,
    PageDown,
    ShiftSpace,
    CtrlSpace,
    F(u8),
    Ctrl(char),
    Mouse(MouseEvent),
    Unknown(Vec<u8>),
}

/// Raw mode on stdin, restored when dropped
struct RawMode {
    original: libc::termios,
}

impl RawMode {
    fn enable() -> io::Result<Self> {
        let fd = io::stdin().as_raw_fd();
        // SAFETY: termios is plain data and tcgetattr fills it completely
        let original = unsafe {
            let mut termios: libc::termios = std::mem::zeroed();
            if libc::tcgetattr(fd, &mut termios) != 0 {
                return Err(io::Error::last_os_error());
            }
            termios
        };

        let mut raw = original;
        raw.c_lflag &= !(libc::ECHO | libc::ICANON | libc::ISIG | libc::IEXTEN);
        raw.c_iflag &= !(libc::IXON | libc::ICRNL | libc::BRKINT | libc::INPCK | libc::ISTRIP);
        raw.c_oflag &= !libc::OPOST;
        raw.c_cflag |= libc::CS8;
        // Reads return immediately, with or without input
        raw.c_cc[libc::VMIN] = 0;
        raw.c_cc[libc::VTIME] = 0;

        // SAFETY: fd is stdin and raw is a valid termios
        if unsafe { libc::tcsetattr(fd, libc::TCSAFLUSH, &raw) } != 0 {
            return Err(io::Error::last_os_error());
        }
        Ok(Self { original })
    }
}

impl Drop for RawMode {
    fn drop(&mut self) {
        // SAFETY: restores the settings read in `enable`
        unsafe {
            libc::tcsetattr(io::stdin().as_raw_fd(), libc::TCSAFLUSH, &self.original);
        }
    }
}

pub struct Terminal {
    out: BufWriter<Stdout>,
    width: u16,
    height: u16,
    // Dropped after `Terminal::drop` has written the reset sequences
    _raw: RawMode,
}

impl Terminal {
    /// Switch the terminal to raw mode with mouse reporting
    pub fn new() -> io::Result<Self> {
        let raw = RawMode::enable()?;
        let mut term = Self {
            out: BufWriter::new(io::stdout()),
            width: 80,
            height: 25,
            _raw: raw,
        };
        term.update_size();

        term.write_raw(concat!(
            "\x1b[?1049h", // alternate screen
            "\x1b[?25l",   // hide cursor
            "\x1b[?1002h", // button-event mouse tracking
            "\x1b[?1006h", // SGR mouse coordinates
            "\x1b[>1u",    // kitty keyboard protocol, for Ctrl+Enter
            "\x1b[2J\x1b[H",
        ))?;
        term.flush()?;
        Ok(term)
    }

    pub fn size(&self) -> (u16, u16) {
        (self.width, self.height)
    }

    pub fn update_size(&mut self) {
        // SAFETY: TIOCGWINSZ writes a winsize into `ws`
        unsafe {
            let mut ws: libc::winsize = std::mem::zeroed();
            if libc::ioctl(libc::STDOUT_FILENO, libc::TIOCGWINSZ, &mut ws) == 0 && ws.ws_col > 0 {
                self.width = ws.ws_col;
                self.height = ws.ws_row;
            }
        }
    }

    pub fn write_raw(&mut self, s: &str) -> io::Result<()> {
        self.out.write_all(s.as_bytes())
    }

    pub fn flush(&mut self) -> io::Result<()> {
        self.out.flush()
    }

    /// Move cursor to position (1-based)
    pub fn goto(&mut self, row: u16, col: u16) -> io::Result<()> {
        write!(self.out, "\x1b[{};{}H", row, col)
    }

    pub fn set_colors(&mut self, fg: Color, bg: Color) -> io::Result<()> {
        write!(self.out, "\x1b[{};{}m", fg.sgr(38), bg.sgr(48))
    }

    pub fn show_cursor(&mut self) -> io::Result<()> {
        self.write_raw("\x1b[?25h")
    }

    pub fn hide_cursor(&mut self) -> io::Result<()> {
        self.write_raw("\x1b[?25l")
    }

    pub fn write_char(&mut self, c: char) -> io::Result<()> {
        let mut buf = [0u8; 4];
        self.out.write_all(c.encode_utf8(&mut buf).as_bytes())
    }

    /// Read one key if available, without blocking
    pub fn read_key(&self) -> io::Result<Option<Key>> {
        let mut buf = [0u8; 32];
        let mut stdin = io::stdin();

        let mut len = stdin.read(&mut buf)?;
        if len == 0 {
            return Ok(None);
        }
        // A lone ESC may be the start of a sequence still in flight
        if len == 1 && buf[0] == 0x1b {
            thread::sleep(ESCAPE_WAIT);
            len += stdin.read(&mut buf[1..]).unwrap_or(0);
        }
        Ok(Some(parse_key(&buf[..len])))
    }
}

impl Drop for Terminal {
    fn drop(&mut self) {
        let _ = self.write_raw(concat!(
            "\x1b[<u",
            "\x1b[?1006l",
            "\x1b[?1002l",
            "\x1b[?25h",
            "\x1b[0m",
            "\x1b[?1049l",
        ));
        let _ = self.flush();
    }
}

/// Parse raw bytes into a Key
pub fn parse_key(buf: &[u8]) -> Key {
    match buf {
        [] => Key::Unknown(Vec::new()),
        [b'\r'] => Key::Enter,
        // Ctrl+Enter sends LF on most terminals
        [b'\n'] => Key::CtrlEnter,
        [b'\t'] => Key::Tab,
        [0x1b] => Key::Escape,
        [0x7f] | [0x08] => Key::Backspace,
        [0x00] => Key::CtrlSpace,
        [c @ 1..=26] => Key::Ctrl((b'a' + c - 1) as char),
        [c @ 32..=126] => Key::Char(*c as char),
        [0x1b, b'O', f @ b'P'..=b'S'] => Key::F(f - b'P' + 1),
        [0x1b, b'[', rest @ ..] => parse_csi(rest).unwrap_or_else(|| Key::Unknown(buf.to_vec())),
        _ => match std::str::from_utf8(buf).ok().and_then(|s| s.chars().next()) {
            Some(c) if !c.is_control() => Key::Char(c),
            _ => Key::Unknown(buf.to_vec()),
        },
    }
}

/// Body of a `CSI params final` sequence, after the `ESC [`
fn parse_csi(body: &[u8]) -> Option<Key> {
    if let Some(mouse) = body.strip_prefix(b"<") {
        return parse_sgr_mouse(mouse).map(Key::Mouse);
    }

    let (&last, params) = body.split_last()?;
    let params = std::str::from_utf8(params).ok()?;
    let mut nums = params.split(';').map(|p| p.parse::<u32>().ok());
    let first = nums.next().flatten();
    let modifiers = nums.next().flatten().unwrap_or(1);

    let key = match (last, first) {
        (b'A', _) => Key::Up,
        (b'B', _) => Key::Down,
        (b'C', _) => Key::Right,
        (b'D', _) => Key::Left,
        (b'H', _) => Key::Home,
        (b'F', _) => Key::End,
        (b'Z', _) => Key::ShiftTab,
        (b'~', Some(1 | 7)) => Key::Home,
        (b'~', Some(4 | 8)) => Key::End,
        (b'~', Some(3)) => Key::Delete,
        (b'~', Some(5)) => Key::PageUp,
        (b'~', Some(6)) => Key::PageDown,
        (b'~', Some(n @ 11..=15)) => Key::F((n - 10) as u8),
        (b'~', Some(n @ 17..=21)) => Key::F((n - 11) as u8),
        (b'~', Some(n @ 23..=24)) => Key::F((n - 12) as u8),
        // Kitty keyboard protocol: CSI codepoint ; modifiers u
        (b'u', Some(code)) => kitty_key(code, modifiers)?,
        _ => return None,
    };
    Some(key)
}

fn kitty_key(code: u32, modifiers: u32) -> Option<Key> {
    // Modifier bits are sent plus one
    let bits = modifiers.saturating_sub(1);
    let shift = bits & 1 != 0;
    let ctrl = bits & 4 != 0;
    let key = match code {
        13 if ctrl => Key::CtrlEnter,
        13 => Key::Enter,
        27 => Key::Escape,
        9 if shift => Key::ShiftTab,
        9 => Key::Tab,
        127 => Key::Backspace,
        32 if ctrl => Key::CtrlSpace,
        32 if shift => Key::ShiftSpace,
        c if ctrl => {
            let c = char::from_u32(c)?.to_ascii_lowercase();
            if !c.is_ascii_lowercase() {
                return None;
            }
            Key::Ctrl(c)
        }
        c => Key::Char(char::from_u32(c)?),
    };
    Some(key)
}

/// SGR mouse report body: `Cb;Cx;Cy` followed by `M` (press) or `m` (release)
fn parse_sgr_mouse(body: &[u8]) -> Option<MouseEvent> {
    let (&last, fields) = body.split_last()?;
    let pressed = match last {
        b'M' => true,
        b'm' => false,
        _ => return None,
    };
    let fields = std::str::from_utf8(fields).ok()?;
    let mut parts = fields.split(';').map(str::parse::<u16>);
    let (Some(Ok(cb)), Some(Ok(col)), Some(Ok(row)), None) =
        (parts.next(), parts.next(), parts.next(), parts.next())
    else {
        return None;
    };

    let button = match (cb & 64 != 0, cb & 0b11) {
        (true, 0) => MouseButton::WheelUp,
        (true, _) => MouseButton::WheelDown,
        (false, 0) => MouseButton::Left,
        (false, 1) => MouseButton::Middle,
        (false, 2) => MouseButton::Right,
        (false, _) => MouseButton::None,
    };

    Some(MouseEvent {
        button,
        row,
        col,
        pressed,
        motion: cb & 32 != 0,
    })
}
