//! Fixed-rate repaint sampling and caret blinking

use std::time::Duration;

use tracing::trace;

use super::SimEvent;
use crate::engine::{Device, Rect};
use crate::event_loop::{EventLoop, TimerId};

/// Samples the device dirty area at a fixed rate, independent of how many
/// batches ran in between.
pub struct RepaintScheduler {
    interval: Duration,
    timer: Option<TimerId>,
}

impl RepaintScheduler {
    pub fn new(interval: Duration) -> Self {
        Self { interval, timer: None }
    }

    pub fn start(&mut self, lp: &mut EventLoop<SimEvent>) {
        if self.timer.is_none() {
            self.timer = Some(lp.start_timer(self.interval, SimEvent::RepaintTick));
        }
    }

    pub fn stop(&mut self, lp: &mut EventLoop<SimEvent>) {
        if let Some(id) = self.timer.take() {
            lp.kill_timer(id);
        }
    }

    pub fn is_active(&self) -> bool {
        self.timer.is_some()
    }

    /// Take the area to redraw, if anything changed since the last tick
    pub fn tick<D: Device + ?Sized>(&self, device: &mut D) -> Option<Rect> {
        if !self.is_active() {
            return None;
        }
        let area = device.take_dirty_area()?;
        trace!(?area, "repaint");
        Some(area)
    }
}

/// Toggles the device caret while the program waits for keyboard input
pub struct CursorBlinkScheduler {
    interval: Duration,
    timer: Option<TimerId>,
}

impl CursorBlinkScheduler {
    pub fn new(interval: Duration) -> Self {
        Self { interval, timer: None }
    }

    /// Returns true if the timer was not already running
    pub fn start(&mut self, lp: &mut EventLoop<SimEvent>) -> bool {
        if self.timer.is_some() {
            return false;
        }
        self.timer = Some(lp.start_timer(self.interval, SimEvent::CursorTick));
        true
    }

    /// Kill the timer and take the caret off the screen
    pub fn stop<D: Device + ?Sized>(&mut self, device: &mut D, lp: &mut EventLoop<SimEvent>) {
        if let Some(id) = self.timer.take() {
            lp.kill_timer(id);
            device.hide_cursor();
        }
    }

    pub fn is_active(&self) -> bool {
        self.timer.is_some()
    }

    pub fn tick<D: Device + ?Sized>(&self, device: &mut D, paused: bool) {
        if self.is_active() && !paused {
            device.blink_cursor();
        }
    }
}
