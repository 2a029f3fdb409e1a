//! Double-buffered cell grid
//!
//! Views draw into the back buffer with 1-based coordinates; `flush` sends
//! only the cells that differ from what the terminal already shows.

use std::io;

use crate::terminal::{Color, Terminal};

#[derive(Clone, Copy, PartialEq, Eq, Debug)]
pub struct Cell {
    pub ch: char,
    pub fg: Color,
    pub bg: Color,
}

impl Default for Cell {
    fn default() -> Self {
        Self { ch: ' ', fg: Color::LightGray, bg: Color::Black }
    }
}

pub struct Screen {
    width: u16,
    height: u16,
    back: Vec<Cell>,
    /// What the terminal shows; `None` when unknown
    front: Vec<Option<Cell>>,
    cursor: (u16, u16),
    cursor_visible: bool,
}

impl Screen {
    pub fn new(width: u16, height: u16) -> Self {
        let len = width as usize * height as usize;
        Self {
            width,
            height,
            back: vec![Cell::default(); len],
            front: vec![None; len],
            cursor: (1, 1),
            cursor_visible: false,
        }
    }

    pub fn size(&self) -> (u16, u16) {
        (self.width, self.height)
    }

    pub fn resize(&mut self, width: u16, height: u16) {
        *self = Self::new(width, height);
    }

    fn index(&self, row: u16, col: u16) -> Option<usize> {
        let inside = (1..=self.height).contains(&row) && (1..=self.width).contains(&col);
        inside.then(|| (row - 1) as usize * self.width as usize + (col - 1) as usize)
    }

    pub fn set(&mut self, row: u16, col: u16, ch: char, fg: Color, bg: Color) {
        if let Some(i) = self.index(row, col) {
            self.back[i] = Cell { ch, fg, bg };
        }
    }

    #[cfg(test)]
    pub fn get(&self, row: u16, col: u16) -> Option<Cell> {
        self.index(row, col).map(|i| self.back[i])
    }

    /// Draw `s` from (row, col) to the right, clipped at the screen edge
    pub fn write_str(&mut self, row: u16, col: u16, s: &str, fg: Color, bg: Color) {
        for (offset, ch) in s.chars().enumerate() {
            let Some(c) = col.checked_add(offset as u16).filter(|c| *c <= self.width) else {
                break;
            };
            self.set(row, c, ch, fg, bg);
        }
    }

    pub fn fill(&mut self, row: u16, col: u16, width: u16, height: u16, ch: char, fg: Color, bg: Color) {
        for r in row..row.saturating_add(height) {
            for c in col..col.saturating_add(width) {
                self.set(r, c, ch, fg, bg);
            }
        }
    }

    pub fn clear_with(&mut self, fg: Color, bg: Color) {
        self.back.fill(Cell { ch: ' ', fg, bg });
    }

    /// Single-line frame with a blank interior
    pub fn draw_box(&mut self, row: u16, col: u16, width: u16, height: u16, fg: Color, bg: Color) {
        if width < 2 || height < 2 {
            return;
        }
        let (bottom, right) = (row + height - 1, col + width - 1);
        self.fill(row, col, width, height, ' ', fg, bg);
        self.fill(row, col + 1, width - 2, 1, '─', fg, bg);
        self.fill(bottom, col + 1, width - 2, 1, '─', fg, bg);
        self.fill(row + 1, col, 1, height - 2, '│', fg, bg);
        self.fill(row + 1, right, 1, height - 2, '│', fg, bg);
        for (r, c, ch) in [(row, col, '┌'), (row, right, '┐'), (bottom, col, '└'), (bottom, right, '┘')] {
            self.set(r, c, ch, fg, bg);
        }
    }

    pub fn set_cursor(&mut self, row: u16, col: u16) {
        self.cursor = (row, col);
    }

    pub fn set_cursor_visible(&mut self, visible: bool) {
        self.cursor_visible = visible;
    }

    /// Send changed cells to the terminal
    pub fn flush(&mut self, term: &mut Terminal) -> io::Result<()> {
        let width = self.width as usize;
        let mut colors: Option<(Color, Color)> = None;
        // Position the terminal cursor will be at after the last write
        let mut at: Option<usize> = None;

        for (i, (cell, shown)) in self.back.iter().zip(self.front.iter_mut()).enumerate() {
            if *shown == Some(*cell) {
                continue;
            }
            if at != Some(i) || i % width == 0 {
                term.goto((i / width) as u16 + 1, (i % width) as u16 + 1)?;
            }
            if colors != Some((cell.fg, cell.bg)) {
                term.set_colors(cell.fg, cell.bg)?;
                colors = Some((cell.fg, cell.bg));
            }
            term.write_char(cell.ch)?;
            *shown = Some(*cell);
            at = Some(i + 1);
        }

        if self.cursor_visible {
            term.goto(self.cursor.0, self.cursor.1)?;
            term.show_cursor()?;
        } else {
            term.hide_cursor()?;
        }
        term.flush()
    }

    /// Forget what the terminal shows so the next flush redraws everything
    pub fn invalidate(&mut self) {
        self.front.fill(None);
    }
}
