//! GVBASIC simulator
//!
//! Shows a GVBASIC program beside a simulated device screen and keyboard,
//! and runs it one batch at a time from a single-threaded event loop using
//! raw ANSI escape sequences (no external TUI libraries).

mod config;
mod editor;
mod engine;
mod error;
mod event_loop;
mod input;
mod lifecycle;
mod screen;
mod sim;
mod terminal;
mod ui;

use std::fs::File;
use std::io;
use std::path::{Path, PathBuf};
use std::sync::Mutex;
use std::thread;
use std::time::Duration;

use anyhow::Context;
use clap::Parser;
use tracing::{debug, info, warn};
use tracing_subscriber::EnvFilter;

use config::Config;
use editor::EditorPane;
use engine::device::ScriptDevice;
use engine::script::ScriptEngine;
use event_loop::{EventLoop, SystemClock};
use input::{command_for, Command, InputEvent};
use lifecycle::{Lifecycle, LifecycleEvent, LifecycleState, ToolbarState};
use screen::Screen;
use sim::keyboard::device_key;
use sim::{Notice, SimEvent, SimWindow};
use terminal::{Color, Terminal};
use ui::layout::AppLayout;
use ui::widget::mouse_position;
use ui::{app_layout, EditorView, StatusBar, Toolbar};

/// Longest the host sleeps between polls for input
const FRAME_TIME: Duration = Duration::from_millis(10);

const LOG_ENV: &str = "GVBSIM_LOG";

#[derive(Parser, Debug)]
#[command(name = "gvbsim", version, about = "Run a GVBASIC program on a simulated device")]
struct Args {
    /// Program to load
    script: PathBuf,

    /// Configuration file (default: gvbsim.toml in the working directory
    /// or next to the executable)
    #[arg(long)]
    config: Option<PathBuf>,

    /// Pixel scale: 1 is compact, 2 is large
    #[arg(long)]
    scale: Option<u8>,

    /// Instructions executed per step
    #[arg(long)]
    batch_size: Option<usize>,

    /// Write logs to this file. Falls back to $GVBSIM_LOG.
    #[arg(long)]
    log_file: Option<PathBuf>,

    /// Open the simulator and start the program immediately
    #[arg(long)]
    run: bool,
}

/// Main application
struct App {
    terminal: Terminal,
    screen: Screen,
    config: Config,
    lifecycle: Lifecycle,
    editor: EditorPane,
    sim: Option<SimWindow<ScriptEngine, ScriptDevice>>,
    event_loop: EventLoop<SimEvent>,
    clipboard: Option<arboard::Clipboard>,
    quit: bool,
}

impl App {
    fn new(config: Config, editor: EditorPane) -> io::Result<Self> {
        let terminal = Terminal::new()?;
        let (width, height) = terminal.size();
        let screen = Screen::new(width, height);

        Ok(Self {
            terminal,
            screen,
            config,
            lifecycle: Lifecycle::new(),
            editor,
            sim: None,
            event_loop: EventLoop::new(Box::new(SystemClock::new())),
            clipboard: arboard::Clipboard::new().ok(),
            quit: false,
        })
    }

    fn run(&mut self, autostart: bool) -> io::Result<()> {
        if autostart {
            self.try_start_pause();
            if self.sim.is_some() {
                self.try_start_pause();
            }
        }

        while !self.quit {
            self.terminal.update_size();
            let (width, height) = self.terminal.size();
            if (width, height) != self.screen.size() {
                self.screen.resize(width, height);
                self.screen.invalidate();
            }

            // All pending input first, then whatever the simulator scheduled
            while let Some(key) = self.terminal.read_key()? {
                self.handle_input(InputEvent::from(key));
                if self.quit {
                    break;
                }
            }
            for event in self.event_loop.drain_ready() {
                self.handle_sim_event(event);
            }

            self.draw();
            self.screen.flush(&mut self.terminal)?;

            let wait = self
                .event_loop
                .time_until_next()
                .map_or(FRAME_TIME, |next| next.min(FRAME_TIME));
            if !wait.is_zero() {
                thread::sleep(wait);
            }
        }
        Ok(())
    }

    fn layout(&self) -> AppLayout {
        let (width, height) = self.screen.size();
        app_layout(width, height, self.sim.as_ref().map(|sim| sim.size().0))
    }

    fn handle_input(&mut self, event: InputEvent) {
        if let Some(command) = command_for(&event) {
            self.run_command(command);
            return;
        }

        let layout = self.layout();
        if let (Some(sim), Some(bounds)) = (self.sim.as_mut(), layout.simulator) {
            // The input dialog is modal within the simulator
            if sim.has_dialog() {
                let notice = match event {
                    InputEvent::CtrlV => {
                        if let Some(clipboard) = self.clipboard.as_mut() {
                            match clipboard.get_text() {
                                Ok(text) => sim.paste(&text),
                                Err(err) => debug!(%err, "clipboard read failed"),
                            }
                        }
                        None
                    }
                    _ => sim.dialog_event(&event, bounds, &mut self.event_loop),
                };
                if let Some(notice) = notice {
                    self.handle_notice(notice);
                }
                return;
            }

            match mouse_position(&event) {
                Some((row, col)) => {
                    let release = matches!(event, InputEvent::MouseRelease { .. });
                    if (release || bounds.contains(row, col))
                        && sim.handle_mouse(&event, bounds, &mut self.event_loop)
                    {
                        return;
                    }
                    if !bounds.contains(row, col) && matches!(event, InputEvent::MouseClick { .. }) {
                        sim.blur_inspector();
                    }
                }
                None if sim.inspector_focused() => {
                    if sim.inspector_event(&event, bounds) {
                        return;
                    }
                }
                None if self.lifecycle.state() == LifecycleState::Started => {
                    if let Some(code) = device_key(&event) {
                        sim.press_key(code, &mut self.event_loop);
                        return;
                    }
                }
                None => {}
            }
        }

        let rows = EditorView::content_rows(layout.editor);
        self.editor.handle_event(&event, rows);
    }

    fn run_command(&mut self, command: Command) {
        debug!(?command, "command");
        match command {
            Command::StartPause => self.try_start_pause(),
            Command::FocusInspector => {
                if let Some(sim) = self.sim.as_mut() {
                    sim.toggle_inspector_focus();
                }
            }
            Command::Stop => self.dispatch(LifecycleEvent::Stop),
            Command::CloseSimulator => self.close_simulator(),
            Command::Reload => {
                self.close_simulator();
                if let Err(err) = self.editor.reload() {
                    warn!(%err, "reload failed");
                }
            }
            Command::Quit => {
                self.close_simulator();
                self.quit = true;
            }
        }
    }

    /// F5: open the simulator on first use, then start, pause, or continue
    fn try_start_pause(&mut self) {
        match self.lifecycle.state() {
            LifecycleState::Stopped if self.sim.is_none() => self.open_simulator(),
            LifecycleState::Stopped => self.dispatch(LifecycleEvent::Start),
            LifecycleState::Started => self.dispatch(LifecycleEvent::Pause),
            LifecycleState::Paused => self.dispatch(LifecycleEvent::Cont),
        }
    }

    /// Compile the program and show the simulator without starting it
    fn open_simulator(&mut self) {
        let device = ScriptDevice::new();
        match ScriptEngine::load(&self.editor.source(), device.clone()) {
            Ok(engine) => {
                self.editor.clear_compile_error();
                self.sim = Some(SimWindow::new(self.editor.name(), engine, device, &self.config.simulator));
            }
            Err(err) => {
                info!(%err, "program does not compile");
                self.editor.show_compile_error(&err);
                let rows = EditorView::content_rows(self.layout().editor);
                self.editor.ensure_cursor_visible(rows);
            }
        }
    }

    fn close_simulator(&mut self) {
        self.dispatch(LifecycleEvent::Stop);
        if let Some(sim) = self.sim.take() {
            sim.close(&mut self.event_loop);
        }
    }

    /// Raise a lifecycle event. The simulator only acts on legal transitions.
    fn dispatch(&mut self, event: LifecycleEvent) {
        let Some(transition) = self.lifecycle.dispatch(event) else {
            return;
        };
        if transition.clears_error_annotation() {
            self.editor.clear_annotation();
        }
        if let Some(sim) = self.sim.as_mut() {
            sim.on_transition(transition, &mut self.event_loop);
        }
    }

    fn handle_sim_event(&mut self, event: SimEvent) {
        let Some(sim) = self.sim.as_mut() else {
            debug!(?event, "event for closed simulator dropped");
            return;
        };
        if let Some(notice) = sim.handle_event(event, &mut self.event_loop) {
            self.handle_notice(notice);
        }
    }

    fn handle_notice(&mut self, notice: Notice) {
        if let Notice::Failed(err) = &notice {
            self.editor.show_runtime_error(err);
            let rows = EditorView::content_rows(self.layout().editor);
            self.editor.ensure_cursor_visible(rows);
        }
        self.dispatch(LifecycleEvent::Stop);
    }

    fn draw(&mut self) {
        let layout = self.layout();
        let state = self.lifecycle.state();
        let toolbar = ToolbarState::for_state(state, self.sim.is_some());

        self.screen.clear_with(Color::Yellow, Color::Blue);
        // The input dialog and the inspector editor place the cursor
        let typing = self
            .sim
            .as_ref()
            .is_some_and(|sim| sim.has_dialog() || sim.inspector_editing());
        self.screen.set_cursor_visible(typing);
        Toolbar::draw(&mut self.screen, &toolbar, self.editor.start_tooltip(), layout.toolbar);
        EditorView::draw(&mut self.screen, &self.editor, layout.editor);
        if let (Some(sim), Some(bounds)) = (&self.sim, layout.simulator) {
            sim.draw(&mut self.screen, bounds);
        }
        StatusBar::draw(
            &mut self.screen,
            state,
            toolbar.inspector_hint(),
            self.editor.cursor_line(),
            layout.status,
        );
    }
}

/// The terminal is in raw mode, so logs only go to a file
fn init_logging(path: Option<&Path>) -> anyhow::Result<()> {
    let Some(path) = path else {
        return Ok(());
    };
    let file = File::create(path)
        .with_context(|| format!("cannot create log file {}", path.display()))?;
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .with_writer(Mutex::new(file))
        .with_ansi(false)
        .init();
    Ok(())
}

fn main() -> anyhow::Result<()> {
    let args = Args::parse();

    let log_file = args
        .log_file
        .clone()
        .or_else(|| std::env::var_os(LOG_ENV).map(PathBuf::from));
    init_logging(log_file.as_deref())?;

    let mut config = Config::load(args.config.as_deref()).context("cannot load configuration")?;
    if let Some(scale) = args.scale {
        config.simulator.pixel_scale = scale;
    }
    if let Some(batch_size) = args.batch_size {
        config.simulator.batch_size = batch_size;
    }
    config.validate().context("invalid command line option")?;

    let editor = EditorPane::open(&args.script, config.editor.line_numbers)
        .with_context(|| format!("cannot open {}", args.script.display()))?;
    info!(script = %args.script.display(), "starting");

    let mut app = App::new(config, editor).context("cannot set up the terminal")?;
    app.run(args.run)?;
    Ok(())
}
