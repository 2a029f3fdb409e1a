//! Cooperative execution of the engine in bounded batches
//!
//! [`ExecutionScheduler::run_step`] is the only place the engine runs. Each
//! call looks at the result of the previous batch, decides whether the
//! program can make progress, and if so runs one more batch and posts the
//! next `RunStep` back onto the event loop. Suspensions (sleep, key wait,
//! structured input) simply return without posting; whatever clears the
//! suspension posts the step again.

use std::mem;
use std::time::Duration;

use tracing::{debug, trace, warn};

use super::repaint::{CursorBlinkScheduler, RepaintScheduler};
use super::SimEvent;
use crate::config::SimulatorConfig;
use crate::engine::{Device, Engine, ExecInput, ExecResult, InputRequest, KeyboardInput, Rect};
use crate::error::{RuntimeError, StopError};
use crate::event_loop::{EventLoop, TimerId};

/// Progress of a pending `INPUT` statement
#[derive(Debug, Default)]
pub enum InputState {
    #[default]
    Idle,
    /// The dialog is open
    Prompting,
    /// Values were supplied and go into the next batch
    Ready(Vec<KeyboardInput>),
}

/// What a call to [`ExecutionScheduler::run_step`] did
#[derive(Debug, PartialEq)]
pub enum StepOutcome {
    /// Not running, paused, or already waiting for the dialog
    Idle,
    Stepped,
    Sleeping,
    WaitingForKey,
    /// The caller has to open the input dialog for this request
    AwaitingInput(InputRequest),
    /// The program ended normally. The caller raises `stop`.
    Finished,
    /// The program faulted. The caller reports it and raises `stop`.
    Failed(RuntimeError),
}

pub struct ExecutionScheduler {
    batch_size: usize,
    min_sleep: Duration,
    last: ExecResult,
    input: ExecInput,
    running: bool,
    paused: bool,
    /// Armed sleep timer and its generation
    sleep: Option<(TimerId, u64)>,
    sleep_generation: u64,
    step_posted: bool,
    input_state: InputState,
    repaint: RepaintScheduler,
    blink: CursorBlinkScheduler,
}

impl ExecutionScheduler {
    pub fn new(config: &SimulatorConfig) -> Self {
        Self {
            batch_size: config.batch_size,
            min_sleep: Duration::from_millis(config.min_sleep_ms),
            last: ExecResult::End,
            input: ExecInput::None,
            running: false,
            paused: false,
            sleep: None,
            sleep_generation: 0,
            step_posted: false,
            input_state: InputState::Idle,
            repaint: RepaintScheduler::new(Duration::from_millis(config.repaint_interval_ms)),
            blink: CursorBlinkScheduler::new(Duration::from_millis(config.cursor_blink_ms)),
        }
    }

    #[cfg(test)]
    pub fn last_result(&self) -> &ExecResult {
        &self.last
    }

    pub fn is_running(&self) -> bool {
        self.running
    }

    pub fn is_prompting(&self) -> bool {
        matches!(self.input_state, InputState::Prompting)
    }

    #[cfg(test)]
    pub fn repaint(&self) -> &RepaintScheduler {
        &self.repaint
    }

    #[cfg(test)]
    pub fn blink(&self) -> &CursorBlinkScheduler {
        &self.blink
    }

    /// Reset engine and device and begin running from the top
    pub fn start<E, D>(&mut self, engine: &mut E, device: &mut D, lp: &mut EventLoop<SimEvent>)
    where
        E: Engine + ?Sized,
        D: Device + ?Sized,
    {
        engine.reset();
        self.blink.stop(device, lp);
        device.reset();
        self.cancel_sleep(lp);
        self.last = ExecResult::Continue;
        self.input = ExecInput::None;
        self.input_state = InputState::Idle;
        self.running = true;
        self.paused = false;
        self.repaint.start(lp);
        debug!("execution started");
        self.schedule(lp);
    }

    pub fn pause(&mut self) {
        if self.running {
            self.paused = true;
            debug!(last = ?self.last, "execution paused");
        }
    }

    pub fn cont(&mut self, lp: &mut EventLoop<SimEvent>) {
        if self.running && self.paused {
            self.paused = false;
            debug!("execution continued");
            self.schedule(lp);
        }
    }

    /// Halt timers and the engine. The engine is only asked to stop while
    /// the program has not ended.
    pub fn stop<E, D>(
        &mut self,
        engine: &mut E,
        device: &mut D,
        lp: &mut EventLoop<SimEvent>,
    ) -> Result<(), StopError>
    where
        E: Engine + ?Sized,
        D: Device + ?Sized,
    {
        self.cancel_sleep(lp);
        self.repaint.stop(lp);
        self.blink.stop(device, lp);
        self.running = false;
        self.paused = false;
        if let InputState::Ready(values) = mem::take(&mut self.input_state) {
            for value in values {
                engine.release(value);
            }
        }
        if let ExecInput::KeyboardInput(values) = mem::take(&mut self.input) {
            for value in values {
                engine.release(value);
            }
        }

        let result = if self.last.is_end() { Ok(()) } else { engine.stop() };
        self.last = ExecResult::End;
        debug!("execution stopped");
        if let Err(err) = &result {
            warn!(%err, "engine stop failed");
        }
        result
    }

    /// One scheduling opportunity
    pub fn run_step<E, D>(
        &mut self,
        engine: &mut E,
        device: &mut D,
        lp: &mut EventLoop<SimEvent>,
    ) -> StepOutcome
    where
        E: Engine + ?Sized,
        D: Device + ?Sized,
    {
        self.step_posted = false;
        if !self.running || self.paused {
            return StepOutcome::Idle;
        }

        match &self.last {
            ExecResult::End => return StepOutcome::Finished,
            ExecResult::Continue => {}
            ExecResult::Sleep(ns) => {
                if self.sleep.is_none() {
                    let ms = ((ns + 500_000) / 1_000_000).max(self.min_sleep.as_millis() as u64);
                    self.sleep_generation += 1;
                    let id = lp.single_shot(
                        Duration::from_millis(ms),
                        SimEvent::SleepElapsed(self.sleep_generation),
                    );
                    self.sleep = Some((id, self.sleep_generation));
                    trace!(ms, "sleeping");
                }
                return StepOutcome::Sleeping;
            }
            ExecResult::InKey => {
                if !device.assign_key(&mut self.input) {
                    if self.blink.start(lp) {
                        trace!("waiting for key");
                    }
                    return StepOutcome::WaitingForKey;
                }
                self.blink.stop(device, lp);
            }
            ExecResult::KeyboardInput(request) => match mem::take(&mut self.input_state) {
                InputState::Idle => {
                    self.blink.start(lp);
                    self.input_state = InputState::Prompting;
                    debug!(fields = request.fields.len(), "awaiting keyboard input");
                    return StepOutcome::AwaitingInput(request.clone());
                }
                InputState::Prompting => {
                    self.input_state = InputState::Prompting;
                    return StepOutcome::Idle;
                }
                InputState::Ready(values) => {
                    self.input = ExecInput::KeyboardInput(values);
                    self.blink.stop(device, lp);
                }
            },
            ExecResult::Error { location, message } => {
                let err = RuntimeError { location: *location, message: message.clone() };
                warn!(%err, "runtime error");
                self.last = ExecResult::End;
                return StepOutcome::Failed(err);
            }
        }

        self.step(engine, lp);
        StepOutcome::Stepped
    }

    fn step<E: Engine + ?Sized>(&mut self, engine: &mut E, lp: &mut EventLoop<SimEvent>) {
        let input = mem::take(&mut self.input);
        self.last = engine.exec(input, self.batch_size);
        trace!(result = ?self.last, "batch done");
        self.schedule(lp);
    }

    /// Post the next `RunStep` unless one is already pending
    fn schedule(&mut self, lp: &mut EventLoop<SimEvent>) {
        if !self.step_posted {
            self.step_posted = true;
            lp.post(SimEvent::RunStep);
        }
    }

    /// Sleep timer expiry
    pub fn wake(&mut self, generation: u64, lp: &mut EventLoop<SimEvent>) {
        match self.sleep {
            Some((_, armed)) if armed == generation => self.sleep = None,
            _ => {
                trace!(generation, "stale sleep timer ignored");
                return;
            }
        }
        self.last = ExecResult::Continue;
        if self.running && !self.paused {
            self.schedule(lp);
        }
    }

    fn cancel_sleep(&mut self, lp: &mut EventLoop<SimEvent>) {
        if let Some((id, _)) = self.sleep.take() {
            lp.kill_timer(id);
        }
    }

    /// Forward a key press. Resumes a program waiting in `InKey`.
    pub fn key_down<D: Device + ?Sized>(
        &mut self,
        device: &mut D,
        key: u8,
        lp: &mut EventLoop<SimEvent>,
    ) {
        device.fire_key_down(key);
        if self.running && !self.paused && self.last.is_inkey() {
            self.schedule(lp);
        }
    }

    pub fn key_up<D: Device + ?Sized>(&mut self, device: &mut D, key: u8) {
        device.fire_key_up(key);
    }

    /// Values from an accepted input dialog. Dropped back to the engine when
    /// no dialog is open.
    pub fn provide_input<E: Engine + ?Sized>(
        &mut self,
        engine: &mut E,
        values: Vec<KeyboardInput>,
        lp: &mut EventLoop<SimEvent>,
    ) {
        if !self.is_prompting() {
            warn!("keyboard input supplied with no pending request");
            for value in values {
                engine.release(value);
            }
            return;
        }
        self.input_state = InputState::Ready(values);
        self.schedule(lp);
    }

    pub fn repaint_tick<D: Device + ?Sized>(&self, device: &mut D) -> Option<Rect> {
        self.repaint.tick(device)
    }

    pub fn blink_tick<D: Device + ?Sized>(&self, device: &mut D) {
        self.blink.tick(device, self.paused);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::engine::mock::{MockDevice, MockEngine};
    use crate::engine::{KeyboardInputType, Location};
    use crate::event_loop::testing::ManualClock;

    struct Harness {
        engine: MockEngine,
        device: MockDevice,
        lp: EventLoop<SimEvent>,
        clock: ManualClock,
        sched: ExecutionScheduler,
    }

    impl Harness {
        fn new(results: impl IntoIterator<Item = ExecResult>) -> Self {
            let clock = ManualClock::default();
            Self {
                engine: MockEngine::with_results(results),
                device: MockDevice::default(),
                lp: EventLoop::new(Box::new(clock.clone())),
                clock,
                sched: ExecutionScheduler::new(&SimulatorConfig::default()),
            }
        }

        fn start(&mut self) {
            self.sched.start(&mut self.engine, &mut self.device, &mut self.lp);
        }

        fn run_step(&mut self) -> StepOutcome {
            self.sched.run_step(&mut self.engine, &mut self.device, &mut self.lp)
        }

        /// Handle every ready event, returning the outcomes of run steps
        fn pump(&mut self) -> Vec<StepOutcome> {
            let mut outcomes = Vec::new();
            for event in self.lp.drain_ready() {
                match event {
                    SimEvent::RunStep => outcomes.push(self.run_step()),
                    SimEvent::SleepElapsed(gen) => self.sched.wake(gen, &mut self.lp),
                    SimEvent::CursorTick => self.sched.blink_tick(&mut self.device),
                    SimEvent::RepaintTick | SimEvent::KeyRelease(_) => {}
                }
            }
            outcomes
        }

        fn stop(&mut self) -> Result<(), StopError> {
            self.sched.stop(&mut self.engine, &mut self.device, &mut self.lp)
        }
    }

    fn request(fields: Vec<KeyboardInputType>) -> InputRequest {
        InputRequest { prompt: None, fields }
    }

    #[test]
    fn test_three_batches_then_finished() {
        let mut h = Harness::new([ExecResult::Continue, ExecResult::Continue, ExecResult::End]);
        h.start();
        assert_eq!(h.engine.reset_calls, 1);
        assert_eq!(h.device.resets, 1);

        let mut outcomes = Vec::new();
        for _ in 0..10 {
            outcomes.extend(h.pump());
        }
        assert_eq!(h.engine.exec_count(), 3);
        assert_eq!(
            outcomes,
            vec![StepOutcome::Stepped, StepOutcome::Stepped, StepOutcome::Stepped, StepOutcome::Finished]
        );
        assert!(h.stop().is_ok());
        assert_eq!(h.engine.stop_calls, 0);
    }

    #[test]
    fn test_sleep_rounds_to_milliseconds() {
        let mut h = Harness::new([ExecResult::Sleep(1_500_000), ExecResult::End]);
        h.start();
        h.pump();
        assert_eq!(h.engine.exec_count(), 1);
        assert_eq!(h.pump(), vec![StepOutcome::Sleeping]);
        assert_eq!(h.lp.time_until_next(), Some(Duration::from_millis(2)));

        h.clock.advance_ms(1);
        assert!(h.pump().is_empty());
        assert_eq!(h.engine.exec_count(), 1);
    }

    #[test]
    fn test_sleep_expiry_steps_exactly_once() {
        let mut h = Harness::new([ExecResult::Sleep(3_000_000), ExecResult::Sleep(3_000_000)]);
        h.start();
        h.pump();
        h.pump();
        // extra scheduling opportunities while asleep do nothing
        assert_eq!(h.run_step(), StepOutcome::Sleeping);
        assert_eq!(h.run_step(), StepOutcome::Sleeping);
        assert_eq!(h.lp.active_timers(), 2);

        h.clock.advance_ms(3);
        h.pump();
        assert_eq!(h.engine.exec_count(), 1);
        assert_eq!(h.pump(), vec![StepOutcome::Stepped]);
        assert_eq!(h.engine.exec_count(), 2);
        assert_eq!(h.pump(), vec![StepOutcome::Sleeping]);
        assert_eq!(h.engine.exec_count(), 2);
    }

    #[test]
    fn test_zero_sleep_clamped_to_floor() {
        let mut h = Harness::new([ExecResult::Sleep(0)]);
        h.start();
        h.pump();
        h.pump();
        assert_eq!(h.lp.time_until_next(), Some(Duration::from_millis(1)));
    }

    #[test]
    fn test_stale_sleep_after_stop_is_ignored() {
        let mut h = Harness::new([ExecResult::Sleep(5_000_000)]);
        h.start();
        h.pump();
        h.pump();
        let generation = h.sched.sleep.map(|(_, g)| g).unwrap_or_default();
        h.stop().ok();
        h.sched.wake(generation, &mut h.lp);
        assert!(!h.lp.has_posted());
        assert!(h.sched.last_result().is_end());
    }

    #[test]
    fn test_inkey_without_key_waits_and_blinks_once() {
        let mut h = Harness::new([ExecResult::InKey, ExecResult::End]);
        h.start();
        h.pump();
        assert_eq!(h.pump(), vec![StepOutcome::WaitingForKey]);
        assert_eq!(h.run_step(), StepOutcome::WaitingForKey);
        assert_eq!(h.run_step(), StepOutcome::WaitingForKey);
        assert_eq!(h.sched.last_result(), &ExecResult::InKey);
        assert!(h.sched.blink().is_active());
        assert_eq!(h.lp.active_timers(), 2);
        assert_eq!(h.engine.exec_count(), 1);
    }

    #[test]
    fn test_key_down_resumes_inkey() {
        let mut h = Harness::new([ExecResult::InKey, ExecResult::End]);
        h.start();
        h.pump();
        h.pump();
        h.sched.key_down(&mut h.device, 97, &mut h.lp);
        h.sched.key_down(&mut h.device, 98, &mut h.lp);
        assert_eq!(h.pump(), vec![StepOutcome::Stepped]);
        assert_eq!(h.engine.exec_calls[1], ExecInput::Key(97));
        assert!(!h.sched.blink().is_active());
    }

    #[test]
    fn test_keyboard_input_round_trip() {
        let req = request(vec![KeyboardInputType::Integer]);
        let mut h = Harness::new([ExecResult::KeyboardInput(req.clone()), ExecResult::End]);
        h.start();
        h.pump();
        assert_eq!(h.pump(), vec![StepOutcome::AwaitingInput(req)]);
        assert!(h.sched.is_prompting());
        assert!(h.sched.blink().is_active());
        // the dialog is open, nothing else happens
        assert_eq!(h.run_step(), StepOutcome::Idle);

        h.sched.provide_input(&mut h.engine, vec![KeyboardInput::Integer(7)], &mut h.lp);
        assert_eq!(h.pump(), vec![StepOutcome::Stepped]);
        assert_eq!(
            h.engine.exec_calls[1],
            ExecInput::KeyboardInput(vec![KeyboardInput::Integer(7)])
        );
        assert!(!h.sched.blink().is_active());
        assert_eq!(h.device.cursor_hides, 1);
    }

    #[test]
    fn test_unrequested_input_is_released() {
        let mut h = Harness::new([ExecResult::End]);
        h.start();
        let value = KeyboardInput::Func(crate::engine::FnBody::new(1, "X"));
        h.sched.provide_input(&mut h.engine, vec![value.clone()], &mut h.lp);
        assert_eq!(h.engine.released, vec![value]);
    }

    #[test]
    fn test_error_reports_once_and_skips_engine_stop() {
        let location = Location { line: 3, start_column: 0, end_column: 4 };
        let mut h = Harness::new([ExecResult::Error { location, message: "boom".into() }]);
        h.start();
        h.pump();
        let outcomes = h.pump();
        assert_eq!(
            outcomes,
            vec![StepOutcome::Failed(RuntimeError { location, message: "boom".into() })]
        );
        assert_eq!(h.run_step(), StepOutcome::Finished);
        assert!(h.stop().is_ok());
        assert_eq!(h.engine.stop_calls, 0);
    }

    #[test]
    fn test_paused_steps_do_nothing() {
        let mut h = Harness::new([ExecResult::Continue, ExecResult::Continue, ExecResult::End]);
        h.start();
        h.sched.pause();
        for _ in 0..5 {
            assert_eq!(h.run_step(), StepOutcome::Idle);
        }
        h.pump();
        assert_eq!(h.engine.exec_count(), 0);
        assert_eq!(h.device.key_downs.len(), 0);

        h.sched.cont(&mut h.lp);
        assert_eq!(h.pump(), vec![StepOutcome::Stepped]);
        assert_eq!(h.engine.exec_count(), 1);
    }

    #[test]
    fn test_sleep_expiring_while_paused_waits_for_cont() {
        let mut h = Harness::new([ExecResult::Sleep(2_000_000), ExecResult::End]);
        h.start();
        h.pump();
        h.pump();
        h.sched.pause();
        h.clock.advance_ms(2);
        h.pump();
        assert!(!h.lp.has_posted());
        assert_eq!(h.sched.last_result(), &ExecResult::Continue);

        h.sched.cont(&mut h.lp);
        assert_eq!(h.pump(), vec![StepOutcome::Stepped]);
        assert_eq!(h.engine.exec_count(), 2);
    }

    #[test]
    fn test_stop_kills_every_timer() {
        let mut h = Harness::new([ExecResult::InKey]);
        h.engine.stop_result = Some(StopError("still busy".into()));
        h.start();
        h.pump();
        h.pump();
        assert!(h.sched.repaint().is_active());
        assert!(h.sched.blink().is_active());

        assert_eq!(h.stop(), Err(StopError("still busy".into())));
        assert_eq!(h.engine.stop_calls, 1);
        assert!(!h.sched.repaint().is_active());
        assert!(!h.sched.blink().is_active());
        assert_eq!(h.lp.active_timers(), 0);
        assert!(h.sched.last_result().is_end());

        // a step already queued finds nothing to do
        assert_eq!(h.run_step(), StepOutcome::Idle);
    }

    #[test]
    fn test_stop_releases_pending_values() {
        let req = request(vec![KeyboardInputType::String]);
        let mut h = Harness::new([ExecResult::KeyboardInput(req)]);
        h.start();
        h.pump();
        h.pump();
        let value = KeyboardInput::String(crate::engine::EngineString(b"HI".to_vec()));
        h.sched.provide_input(&mut h.engine, vec![value.clone()], &mut h.lp);
        h.stop().ok();
        assert_eq!(h.engine.released, vec![value]);
    }

    #[test]
    fn test_only_one_step_pending() {
        let mut h = Harness::new([ExecResult::InKey, ExecResult::End]);
        h.start();
        h.pump();
        h.pump();
        for key in [1, 2, 3] {
            h.sched.key_down(&mut h.device, key, &mut h.lp);
        }
        assert_eq!(h.lp.drain_ready().len(), 1);
    }
}
