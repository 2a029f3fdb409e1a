//! Terminal rendering of the 160x80 device screen
//!
//! The widget keeps its own copy of the device pixels and only refreshes the
//! rectangles handed to [`DeviceScreen::update_region`], the way a paint
//! event only repaints the exposed area. At scale 1 every cell holds a 2x4
//! braille block; at scale 2 every cell holds two vertically stacked pixels
//! drawn with an upper half block.

use crate::config::SimulatorConfig;
use crate::engine::{self, Device, SCREEN_HEIGHT, SCREEN_WIDTH};
use crate::screen::Screen;
use crate::terminal::Color;
use super::layout::Rect;

/// Braille dot bit for the pixel at (dx, dy) within a 2x4 cell
const BRAILLE_DOTS: [[u32; 4]; 2] = [[0x01, 0x02, 0x04, 0x40], [0x08, 0x10, 0x20, 0x80]];
const BRAILLE_BASE: u32 = 0x2800;
const UPPER_HALF: char = '\u{2580}';

pub struct DeviceScreen {
    scale: u8,
    foreground: Color,
    background: Color,
    pixels: Vec<bool>,
}

impl DeviceScreen {
    pub fn new(config: &SimulatorConfig) -> Self {
        Self {
            scale: config.pixel_scale,
            foreground: Color::from_hex(config.foreground),
            background: Color::from_hex(config.background),
            pixels: vec![false; (SCREEN_WIDTH * SCREEN_HEIGHT) as usize],
        }
    }

    /// Pixels covered by one terminal cell
    fn cell_pixels(&self) -> (u32, u32) {
        if self.scale == 1 {
            (2, 4)
        } else {
            (1, 2)
        }
    }

    /// Size in terminal cells
    pub fn size(&self) -> (u16, u16) {
        let (w, h) = self.cell_pixels();
        ((SCREEN_WIDTH / w) as u16, (SCREEN_HEIGHT / h) as u16)
    }

    pub fn pixel(&self, x: u32, y: u32) -> bool {
        if x < SCREEN_WIDTH && y < SCREEN_HEIGHT {
            self.pixels[(y * SCREEN_WIDTH + x) as usize]
        } else {
            false
        }
    }

    /// Copy the pixels inside `rect` from the device
    pub fn update_region<D: Device + ?Sized>(&mut self, device: &D, rect: engine::Rect) {
        let right = rect.right.min(SCREEN_WIDTH);
        let bottom = rect.bottom.min(SCREEN_HEIGHT);
        for y in rect.top..bottom {
            for x in rect.left..right {
                self.pixels[(y * SCREEN_WIDTH + x) as usize] = device.pixel(x, y);
            }
        }
    }

    /// Cell at terminal offset (col, row) within the widget
    fn cell(&self, col: u32, row: u32) -> (char, Color, Color) {
        if self.scale == 1 {
            let mut bits = 0;
            for (dx, column) in BRAILLE_DOTS.iter().enumerate() {
                for (dy, bit) in column.iter().enumerate() {
                    if self.pixel(col * 2 + dx as u32, row * 4 + dy as u32) {
                        bits |= bit;
                    }
                }
            }
            let ch = char::from_u32(BRAILLE_BASE + bits).unwrap_or(' ');
            (ch, self.foreground, self.background)
        } else {
            let color = |lit: bool| if lit { self.foreground } else { self.background };
            let top = color(self.pixel(col, row * 2));
            let bottom = color(self.pixel(col, row * 2 + 1));
            (UPPER_HALF, top, bottom)
        }
    }

    pub fn draw(&self, screen: &mut Screen, bounds: Rect) {
        let (width, height) = self.size();
        for row in 0..height.min(bounds.height) {
            for col in 0..width.min(bounds.width) {
                let (ch, fg, bg) = self.cell(col as u32, row as u32);
                screen.set(bounds.y + row, bounds.x + col, ch, fg, bg);
            }
        }
    }
}
