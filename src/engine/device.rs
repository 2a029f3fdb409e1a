//! Monochrome 160x80 device used by the script engine

use std::cell::RefCell;
use std::collections::VecDeque;
use std::rc::Rc;

use super::{Device, ExecInput, Rect, SCREEN_HEIGHT, SCREEN_WIDTH};

/// Keys buffered before the program reads them
const KEY_BUFFER_SIZE: usize = 16;

/// Caret drawn under the cursor position
const CARET_WIDTH: u32 = 6;
const CARET_HEIGHT: u32 = 2;
const CARET_OFFSET_Y: u32 = 10;

struct DeviceState {
    pixels: Vec<bool>,
    dirty: Option<Rect>,
    key_buffer: VecDeque<u8>,
    pressed: Vec<u8>,
    cursor_x: u32,
    cursor_y: u32,
    /// Caret currently drawn inverted on screen
    caret_shown: bool,
}

impl DeviceState {
    fn new() -> Self {
        Self {
            pixels: vec![false; (SCREEN_WIDTH * SCREEN_HEIGHT) as usize],
            dirty: None,
            key_buffer: VecDeque::with_capacity(KEY_BUFFER_SIZE),
            pressed: Vec::new(),
            cursor_x: 0,
            cursor_y: 0,
            caret_shown: false,
        }
    }

    fn index(x: u32, y: u32) -> Option<usize> {
        if x < SCREEN_WIDTH && y < SCREEN_HEIGHT {
            Some((y * SCREEN_WIDTH + x) as usize)
        } else {
            None
        }
    }

    fn mark_dirty(&mut self, rect: Rect) {
        if rect.is_empty() {
            return;
        }
        self.dirty = Some(match self.dirty {
            Some(d) => d.union(&rect),
            None => rect,
        });
    }

    fn apply(&mut self, rect: Rect, f: impl Fn(bool) -> bool) {
        for y in rect.top..rect.bottom {
            for x in rect.left..rect.right {
                if let Some(idx) = Self::index(x, y) {
                    self.pixels[idx] = f(self.pixels[idx]);
                }
            }
        }
        self.mark_dirty(rect);
    }

    fn caret_rect(&self) -> Rect {
        Rect::from_size(self.cursor_x, self.cursor_y + CARET_OFFSET_Y, CARET_WIDTH, CARET_HEIGHT)
    }

    fn hide_caret(&mut self) {
        if self.caret_shown {
            let rect = self.caret_rect();
            self.apply(rect, |p| !p);
            self.caret_shown = false;
        }
    }
}

/// Shared handle to the device. The engine and the simulator window each
/// hold one; both see the same screen and key buffer.
#[derive(Clone)]
pub struct ScriptDevice {
    state: Rc<RefCell<DeviceState>>,
}

impl Default for ScriptDevice {
    fn default() -> Self {
        Self::new()
    }
}

impl ScriptDevice {
    pub fn new() -> Self {
        Self {
            state: Rc::new(RefCell::new(DeviceState::new())),
        }
    }

    pub fn clear_screen(&self) {
        let mut s = self.state.borrow_mut();
        s.caret_shown = false;
        s.pixels.fill(false);
        s.mark_dirty(Rect::full_screen());
    }

    pub fn fill(&self, rect: Rect) {
        let mut s = self.state.borrow_mut();
        s.hide_caret();
        s.apply(rect, |_| true);
    }

    pub fn clear(&self, rect: Rect) {
        let mut s = self.state.borrow_mut();
        s.hide_caret();
        s.apply(rect, |_| false);
    }

    pub fn invert(&self, rect: Rect) {
        let mut s = self.state.borrow_mut();
        s.hide_caret();
        s.apply(rect, |p| !p);
    }

    pub fn set_cursor(&self, x: u32, y: u32) {
        let mut s = self.state.borrow_mut();
        s.hide_caret();
        s.cursor_x = x.min(SCREEN_WIDTH - 1);
        s.cursor_y = y.min(SCREEN_HEIGHT - 1);
    }

    #[cfg(test)]
    pub fn buffered_keys(&self) -> usize {
        self.state.borrow().key_buffer.len()
    }
}

impl Device for ScriptDevice {
    fn reset(&mut self) {
        *self.state.borrow_mut() = DeviceState::new();
        self.state.borrow_mut().mark_dirty(Rect::full_screen());
    }

    fn assign_key(&mut self, input: &mut ExecInput) -> bool {
        let mut s = self.state.borrow_mut();
        match s.key_buffer.pop_front() {
            Some(key) => {
                s.hide_caret();
                *input = ExecInput::Key(key);
                true
            }
            None => false,
        }
    }

    fn fire_key_down(&mut self, key: u8) {
        let mut s = self.state.borrow_mut();
        if !s.pressed.contains(&key) {
            s.pressed.push(key);
        }
        if s.key_buffer.len() < KEY_BUFFER_SIZE {
            s.key_buffer.push_back(key);
        }
    }

    fn fire_key_up(&mut self, key: u8) {
        self.state.borrow_mut().pressed.retain(|&k| k != key);
    }

    fn blink_cursor(&mut self) {
        let mut s = self.state.borrow_mut();
        let rect = s.caret_rect();
        s.apply(rect, |p| !p);
        s.caret_shown = !s.caret_shown;
    }

    fn hide_cursor(&mut self) {
        self.state.borrow_mut().hide_caret();
    }

    fn is_pressed(&self, key: u8) -> bool {
        self.state.borrow().pressed.contains(&key)
    }

    fn take_dirty_area(&mut self) -> Option<Rect> {
        self.state.borrow_mut().dirty.take()
    }

    fn pixel(&self, x: u32, y: u32) -> bool {
        DeviceState::index(x, y)
            .map(|idx| self.state.borrow().pixels[idx])
            .unwrap_or(false)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_dirty_area_accumulates_and_clears() {
        let mut dev = ScriptDevice::new();
        dev.fill(Rect::from_size(0, 0, 4, 4));
        dev.invert(Rect::from_size(10, 20, 2, 2));
        assert_eq!(dev.take_dirty_area(), Some(Rect::new(0, 0, 12, 22)));
        assert_eq!(dev.take_dirty_area(), None);
        assert!(dev.pixel(1, 1));
        assert!(dev.pixel(11, 21));
        assert!(!dev.pixel(5, 5));
    }

    #[test]
    fn test_assign_key_drains_buffer_in_order() {
        let mut dev = ScriptDevice::new();
        let mut input = ExecInput::None;
        assert!(!dev.assign_key(&mut input));
        assert_eq!(input, ExecInput::None);

        dev.fire_key_down(97);
        dev.fire_key_down(13);
        assert!(dev.assign_key(&mut input));
        assert_eq!(input, ExecInput::Key(97));
        assert!(dev.assign_key(&mut input));
        assert_eq!(input, ExecInput::Key(13));
        assert!(!dev.assign_key(&mut input));
    }

    #[test]
    fn test_key_up_only_releases() {
        let mut dev = ScriptDevice::new();
        dev.fire_key_down(32);
        assert!(dev.is_pressed(32));
        dev.fire_key_up(32);
        assert!(!dev.is_pressed(32));
        assert_eq!(dev.buffered_keys(), 1);
    }

    #[test]
    fn test_key_buffer_is_bounded() {
        let mut dev = ScriptDevice::new();
        for _ in 0..(KEY_BUFFER_SIZE + 5) {
            dev.fire_key_down(120);
        }
        assert_eq!(dev.buffered_keys(), KEY_BUFFER_SIZE);
    }

    #[test]
    fn test_blink_toggles_caret_and_marks_dirty() {
        let mut dev = ScriptDevice::new();
        dev.set_cursor(8, 0);
        dev.blink_cursor();
        assert!(dev.pixel(8, CARET_OFFSET_Y));
        let dirty = dev.take_dirty_area().expect("caret should be dirty");
        assert!(dirty.contains(8, CARET_OFFSET_Y));

        dev.blink_cursor();
        assert!(!dev.pixel(8, CARET_OFFSET_Y));
    }

    #[test]
    fn test_hide_cursor_restores_pixels() {
        let mut dev = ScriptDevice::new();
        dev.fill(Rect::from_size(0, CARET_OFFSET_Y, 2, 1));
        dev.blink_cursor();
        assert!(!dev.pixel(0, CARET_OFFSET_Y));
        assert!(dev.pixel(3, CARET_OFFSET_Y));

        dev.hide_cursor();
        assert!(dev.pixel(0, CARET_OFFSET_Y));
        assert!(!dev.pixel(3, CARET_OFFSET_Y));
        // already hidden
        dev.hide_cursor();
        assert!(dev.pixel(0, CARET_OFFSET_Y));
    }

    #[test]
    fn test_reset_clears_everything() {
        let mut dev = ScriptDevice::new();
        dev.fill(Rect::full_screen());
        dev.fire_key_down(97);
        dev.reset();
        assert!(!dev.pixel(0, 0));
        assert_eq!(dev.buffered_keys(), 0);
        assert_eq!(dev.take_dirty_area(), Some(Rect::full_screen()));
    }
}
