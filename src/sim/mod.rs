//! Simulator window: runs one loaded program against its device
//!
//! [`SimWindow`] owns the engine, the device, the execution scheduler and
//! the views that show them. It reacts to lifecycle transitions and to
//! [`SimEvent`]s from the event loop, and reports back through [`Notice`]
//! when the application has to raise `stop`.

pub mod input_dialog;
pub mod inspector;
pub mod keyboard;
pub mod repaint;
pub mod scheduler;

use std::time::Duration;

use tracing::{debug, info};

use crate::config::SimulatorConfig;
use crate::engine::{Device, Engine};
use crate::error::RuntimeError;
use crate::event_loop::EventLoop;
use crate::input::InputEvent;
use crate::lifecycle::{LifecycleState, ToolbarState, Transition};
use crate::screen::Screen;
use crate::terminal::Color;
use crate::ui::device_screen::DeviceScreen;
use crate::ui::input_dialog::{DialogOutcome, InputDialogView};
use crate::ui::inspector::{InspectorView, INSPECTOR_HEIGHT};
use crate::ui::keyboard::KeyboardView;
use crate::ui::layout::{split, Axis, Rect, Size};
use crate::ui::widget::{Action, EventResult, Widget};
use scheduler::{ExecutionScheduler, StepOutcome};

pub const PROGRAM_ERROR_MESSAGE: &str = "Program error, see the editor for details";

/// Events the simulator schedules on the event loop
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum SimEvent {
    RunStep,
    /// Sleep timer of the given generation expired
    SleepElapsed(u64),
    RepaintTick,
    CursorTick,
    /// Synthetic release of a key pressed on the host keyboard
    KeyRelease(u8),
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum SimStatus {
    Ready,
    Running,
    Paused,
    Finished,
}

impl SimStatus {
    pub fn label(self) -> &'static str {
        match self {
            SimStatus::Ready => "Ready",
            SimStatus::Running => "Running",
            SimStatus::Paused => "Paused",
            SimStatus::Finished => "Finished",
        }
    }
}

/// Something the application must act on
#[derive(Clone, Debug, PartialEq)]
pub enum Notice {
    /// The program ended or the input dialog was cancelled
    Stop,
    /// The program faulted. Annotate the editor, then stop.
    Failed(RuntimeError),
}

/// Regions inside the window bounds
struct WindowLayout {
    title: Rect,
    screen: Rect,
    status: Rect,
    keyboard: Rect,
    inspector: Rect,
}

pub struct SimWindow<E, D> {
    name: String,
    engine: E,
    device: D,
    scheduler: ExecutionScheduler,
    screen: DeviceScreen,
    keyboard: KeyboardView,
    dialog: Option<InputDialogView>,
    inspector: InspectorView,
    status: SimStatus,
    message: Option<String>,
    key_release: Duration,
}

impl<E: Engine, D: Device> SimWindow<E, D> {
    pub fn new(name: impl Into<String>, engine: E, device: D, config: &SimulatorConfig) -> Self {
        let name = name.into();
        info!(%name, "simulator window opened");
        Self {
            name,
            engine,
            device,
            scheduler: ExecutionScheduler::new(config),
            screen: DeviceScreen::new(config),
            keyboard: KeyboardView::new(),
            dialog: None,
            inspector: InspectorView::new(),
            status: SimStatus::Ready,
            message: None,
            key_release: Duration::from_millis(config.key_release_ms),
        }
    }

    pub fn title(&self) -> String {
        format!("GVBASIC simulator - {} [{}]", self.name, self.status.label())
    }

    #[cfg(test)]
    pub fn status(&self) -> SimStatus {
        self.status
    }

    #[cfg(test)]
    pub fn message(&self) -> Option<&str> {
        self.message.as_deref()
    }

    #[cfg(test)]
    pub fn scheduler(&self) -> &ExecutionScheduler {
        &self.scheduler
    }

    pub fn has_dialog(&self) -> bool {
        self.dialog.is_some()
    }

    pub fn inspector_focused(&self) -> bool {
        self.inspector.is_focused()
    }

    /// Whether the inspector has a value editor open
    pub fn inspector_editing(&self) -> bool {
        self.inspector.is_editing()
    }

    /// F6: move the keyboard focus to the inspector or back
    pub fn toggle_inspector_focus(&mut self) {
        let focused = self.inspector.is_focused();
        self.inspector.set_focus(!focused);
    }

    pub fn blur_inspector(&mut self) {
        self.inspector.set_focus(false);
    }

    #[cfg(test)]
    pub fn engine(&self) -> &E {
        &self.engine
    }

    #[cfg(test)]
    pub fn device(&self) -> &D {
        &self.device
    }

    /// Size in terminal cells
    pub fn size(&self) -> (u16, u16) {
        let (screen_w, screen_h) = self.screen.size();
        let (kb_w, kb_h) = KeyboardView::size();
        ((screen_w + 2).max(kb_w + 2), 1 + screen_h + 2 + 1 + kb_h + INSPECTOR_HEIGHT)
    }

    fn layout(&self, bounds: Rect) -> WindowLayout {
        let (_, screen_h) = self.screen.size();
        let (kb_w, kb_h) = KeyboardView::size();
        let rows = split(
            bounds,
            Axis::Vertical,
            &[
                Size::Fixed(1),
                Size::Fixed(screen_h + 2),
                Size::Fixed(1),
                Size::Fixed(kb_h),
                Size::Fixed(INSPECTOR_HEIGHT),
            ],
        );
        let keyboard = rows[3].centered(kb_w, kb_h);
        WindowLayout { title: rows[0], screen: rows[1], status: rows[2], keyboard, inspector: rows[4] }
    }

    /// Act on a lifecycle transition
    pub fn on_transition(&mut self, transition: Transition, lp: &mut EventLoop<SimEvent>) {
        match (transition.from, transition.to) {
            (LifecycleState::Stopped, LifecycleState::Started) => {
                self.close_dialog();
                self.message = None;
                self.scheduler.start(&mut self.engine, &mut self.device, lp);
                self.status = SimStatus::Running;
            }
            (_, LifecycleState::Started) => {
                self.scheduler.cont(lp);
                self.status = SimStatus::Running;
            }
            (_, LifecycleState::Paused) => {
                self.scheduler.pause();
                self.status = SimStatus::Paused;
            }
            (_, LifecycleState::Stopped) => {
                self.close_dialog();
                if let Err(err) = self.scheduler.stop(&mut self.engine, &mut self.device, lp) {
                    self.message = Some(format!("Runtime error: {}", err));
                }
                // Last frame drawn after the repaint timer stopped
                if let Some(rect) = self.device.take_dirty_area() {
                    self.screen.update_region(&self.device, rect);
                }
                self.status = SimStatus::Finished;
            }
        }
        let editable = ToolbarState::for_state(transition.to, true).inspector_editable;
        self.inspector.set_enabled(editable, &self.engine);
        debug!(status = ?self.status, editable, "simulator status");
    }

    pub fn handle_event(&mut self, event: SimEvent, lp: &mut EventLoop<SimEvent>) -> Option<Notice> {
        match event {
            SimEvent::RunStep => match self.scheduler.run_step(&mut self.engine, &mut self.device, lp) {
                StepOutcome::AwaitingInput(request) => {
                    self.dialog = Some(InputDialogView::new(request));
                    None
                }
                StepOutcome::Finished => Some(Notice::Stop),
                StepOutcome::Failed(err) => {
                    self.message = Some(PROGRAM_ERROR_MESSAGE.to_string());
                    Some(Notice::Failed(err))
                }
                StepOutcome::Idle
                | StepOutcome::Stepped
                | StepOutcome::Sleeping
                | StepOutcome::WaitingForKey => None,
            },
            SimEvent::SleepElapsed(generation) => {
                self.scheduler.wake(generation, lp);
                None
            }
            SimEvent::RepaintTick => {
                if let Some(rect) = self.scheduler.repaint_tick(&mut self.device) {
                    self.screen.update_region(&self.device, rect);
                }
                None
            }
            SimEvent::CursorTick => {
                self.scheduler.blink_tick(&mut self.device);
                None
            }
            SimEvent::KeyRelease(code) => {
                self.scheduler.key_up(&mut self.device, code);
                None
            }
        }
    }

    /// Host key mapped to a device key. The host never reports releases, so
    /// one is scheduled.
    pub fn press_key(&mut self, code: u8, lp: &mut EventLoop<SimEvent>) {
        if !self.scheduler.is_running() {
            return;
        }
        self.scheduler.key_down(&mut self.device, code, lp);
        lp.single_shot(self.key_release, SimEvent::KeyRelease(code));
    }

    /// Key for the focused inspector. Returns whether it was consumed.
    pub fn inspector_event(&mut self, event: &InputEvent, bounds: Rect) -> bool {
        let area = self.layout(bounds).inspector;
        self.inspector.handle_event(event, area, &mut self.engine).is_consumed()
    }

    /// Mouse on the inspector or the on-screen keyboard. Returns whether it
    /// was consumed.
    pub fn handle_mouse(&mut self, event: &InputEvent, bounds: Rect, lp: &mut EventLoop<SimEvent>) -> bool {
        let layout = self.layout(bounds);
        if let InputEvent::MouseClick { row, col } = event {
            if layout.inspector.contains(*row, *col) {
                return self.inspector.handle_event(event, layout.inspector, &mut self.engine).is_consumed();
            }
            self.inspector.set_focus(false);
        }
        match self.keyboard.handle_event(event, layout.keyboard) {
            EventResult::Action(Action::KeyDown(code)) => {
                if self.scheduler.is_running() {
                    self.scheduler.key_down(&mut self.device, code, lp);
                }
                true
            }
            EventResult::Action(Action::KeyUp(code)) => {
                self.scheduler.key_up(&mut self.device, code);
                true
            }
            result => result.is_consumed(),
        }
    }

    fn dialog_rect(bounds: Rect, dialog: &InputDialogView) -> Rect {
        let (w, h) = dialog.size();
        bounds.centered(w, h)
    }

    /// Key or mouse event while the input dialog is open
    pub fn dialog_event(
        &mut self,
        event: &InputEvent,
        bounds: Rect,
        lp: &mut EventLoop<SimEvent>,
    ) -> Option<Notice> {
        let dialog = self.dialog.as_mut()?;
        let rect = Self::dialog_rect(bounds, dialog);
        match dialog.handle_event(event, rect, &mut self.engine) {
            DialogOutcome::Pending => None,
            DialogOutcome::Accepted(values) => {
                self.dialog = None;
                self.scheduler.provide_input(&mut self.engine, values, lp);
                None
            }
            DialogOutcome::Cancelled => {
                self.dialog = None;
                debug!("input dialog cancelled");
                Some(Notice::Stop)
            }
        }
    }

    /// Tear the window down. Whatever is still queued on the loop was
    /// scheduled by this window and must not reach the next one.
    pub fn close(mut self, lp: &mut EventLoop<SimEvent>) {
        self.close_dialog();
        let discarded = lp.clear();
        info!(name = %self.name, discarded, "simulator window closed");
    }

    pub fn paste(&mut self, text: &str) {
        if let Some(dialog) = self.dialog.as_mut() {
            dialog.paste(text);
        }
    }

    fn close_dialog(&mut self) {
        if let Some(mut dialog) = self.dialog.take() {
            dialog.cancel(&mut self.engine);
        }
    }

    pub fn draw(&self, screen: &mut Screen, bounds: Rect) {
        let layout = self.layout(bounds);

        let title = layout.title;
        screen.fill(title.y, title.x, title.width, 1, ' ', Color::White, Color::Blue);
        let text = self.title();
        let x = title.x + title.width.saturating_sub(text.chars().count() as u16) / 2;
        screen.write_str(title.y, x, &text, Color::White, Color::Blue);

        let (screen_w, screen_h) = self.screen.size();
        let frame = layout.screen.centered(screen_w + 2, screen_h + 2);
        screen.draw_box(frame.y, frame.x, frame.width, frame.height, Color::DarkGray, Color::Black);
        self.screen.draw(screen, frame.inset(1));

        let status = layout.status;
        screen.fill(status.y, status.x, status.width, 1, ' ', Color::Black, Color::LightGray);
        match &self.message {
            Some(msg) => screen.write_str(status.y, status.x + 1, msg, Color::Red, Color::LightGray),
            None => screen.write_str(status.y, status.x + 1, self.status.label(), Color::Black, Color::LightGray),
        }

        self.keyboard.draw_keys(screen, layout.keyboard, &|code| self.device.is_pressed(code));
        self.inspector.draw(screen, layout.inspector);

        if let Some(dialog) = &self.dialog {
            dialog.draw(screen, Self::dialog_rect(bounds, dialog));
        }
    }
}
