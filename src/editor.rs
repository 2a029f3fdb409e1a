//! Program source shown next to the simulator
//!
//! Text editing belongs to the host editor; this pane shows the loaded
//! program, scrolls, and displays the runtime or compile error reported for
//! the current run.

use std::fs;
use std::io;
use std::path::{Path, PathBuf};

use tracing::debug;

use crate::engine::Location;
use crate::error::{RuntimeError, ScriptError};
use crate::input::InputEvent;

/// Shown on the start affordance when the program does not compile
pub const COMPILE_ERROR_TOOLTIP: &str = "file has errors, cannot run";

const WHEEL_LINES: usize = 3;

/// Error marker drawn over the source
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Annotation {
    pub location: Location,
    pub message: String,
}

pub struct EditorPane {
    path: PathBuf,
    lines: Vec<String>,
    cursor_line: usize,
    scroll: usize,
    annotation: Option<Annotation>,
    compile_failed: bool,
    line_numbers: bool,
}

impl EditorPane {
    pub fn new(path: impl Into<PathBuf>, source: &str, line_numbers: bool) -> Self {
        Self {
            path: path.into(),
            lines: split_lines(source),
            cursor_line: 0,
            scroll: 0,
            annotation: None,
            compile_failed: false,
            line_numbers,
        }
    }

    pub fn open(path: &Path, line_numbers: bool) -> io::Result<Self> {
        let source = fs::read_to_string(path)?;
        Ok(Self::new(path, &source, line_numbers))
    }

    /// Read the file again, dropping annotations
    pub fn reload(&mut self) -> io::Result<()> {
        let source = fs::read_to_string(&self.path)?;
        self.lines = split_lines(&source);
        self.cursor_line = self.cursor_line.min(self.lines.len().saturating_sub(1));
        self.annotation = None;
        self.compile_failed = false;
        debug!(path = %self.path.display(), lines = self.lines.len(), "program reloaded");
        Ok(())
    }

    /// File name without directories
    pub fn name(&self) -> String {
        self.path
            .file_name()
            .map(|n| n.to_string_lossy().into_owned())
            .unwrap_or_else(|| self.path.display().to_string())
    }

    pub fn source(&self) -> String {
        self.lines.join("\n")
    }

    pub fn lines(&self) -> &[String] {
        &self.lines
    }

    pub fn cursor_line(&self) -> usize {
        self.cursor_line
    }

    pub fn scroll(&self) -> usize {
        self.scroll
    }

    pub fn line_numbers(&self) -> bool {
        self.line_numbers
    }

    pub fn annotation(&self) -> Option<&Annotation> {
        self.annotation.as_ref()
    }

    /// Show a runtime error and put the cursor on it
    pub fn show_runtime_error(&mut self, err: &RuntimeError) {
        self.cursor_line = err.location.line.min(self.lines.len().saturating_sub(1));
        self.annotation = Some(Annotation { location: err.location, message: err.message.clone() });
    }

    /// Mark the program as not compilable
    pub fn show_compile_error(&mut self, err: &ScriptError) {
        let width = self.lines.get(err.line).map(String::len).unwrap_or(0);
        self.cursor_line = err.line.min(self.lines.len().saturating_sub(1));
        self.annotation = Some(Annotation {
            location: Location { line: err.line, start_column: 0, end_column: width },
            message: err.message.clone(),
        });
        self.compile_failed = true;
    }

    pub fn clear_compile_error(&mut self) {
        if self.compile_failed {
            self.compile_failed = false;
            self.annotation = None;
        }
    }

    pub fn clear_annotation(&mut self) {
        self.annotation = None;
    }

    pub fn start_tooltip(&self) -> Option<&'static str> {
        self.compile_failed.then_some(COMPILE_ERROR_TOOLTIP)
    }

    /// Scroll so the cursor line is inside a view of `rows` lines
    pub fn ensure_cursor_visible(&mut self, rows: usize) {
        if rows == 0 {
            return;
        }
        if self.cursor_line < self.scroll {
            self.scroll = self.cursor_line;
        } else if self.cursor_line >= self.scroll + rows {
            self.scroll = self.cursor_line + 1 - rows;
        }
    }

    /// Navigation keys and the mouse wheel. Returns whether the event was used.
    pub fn handle_event(&mut self, event: &InputEvent, rows: usize) -> bool {
        let last = self.lines.len().saturating_sub(1);
        let page = rows.max(1);
        match event {
            InputEvent::CursorUp => self.cursor_line = self.cursor_line.saturating_sub(1),
            InputEvent::CursorDown => self.cursor_line = (self.cursor_line + 1).min(last),
            InputEvent::PageUp => self.cursor_line = self.cursor_line.saturating_sub(page),
            InputEvent::PageDown => self.cursor_line = (self.cursor_line + page).min(last),
            InputEvent::Home => self.cursor_line = 0,
            InputEvent::End => self.cursor_line = last,
            InputEvent::ScrollUp { .. } => {
                self.scroll = self.scroll.saturating_sub(WHEEL_LINES);
                return true;
            }
            InputEvent::ScrollDown { .. } => {
                self.scroll = (self.scroll + WHEEL_LINES).min(self.lines.len().saturating_sub(rows));
                return true;
            }
            _ => return false,
        }
        self.ensure_cursor_visible(rows);
        true
    }
}

fn split_lines(source: &str) -> Vec<String> {
    let mut lines: Vec<String> = source.lines().map(str::to_string).collect();
    if lines.is_empty() {
        lines.push(String::new());
    }
    lines
}
