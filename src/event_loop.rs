//! Single-threaded event queue with deferred posts and timers
//!
//! The host polls [`EventLoop::drain_ready`] once per iteration and handles
//! the returned events in order. Events posted while handling are picked up
//! by the next drain, so a handler that keeps re-posting itself still lets
//! timers and terminal input through between rounds.

use std::collections::{HashMap, VecDeque};
use std::time::{Duration, Instant};

use tracing::trace;

/// Source of monotonic time, measured from an arbitrary origin
pub trait Clock {
    fn now(&self) -> Duration;
}

pub struct SystemClock {
    origin: Instant,
}

impl SystemClock {
    pub fn new() -> Self {
        Self { origin: Instant::now() }
    }
}

impl Default for SystemClock {
    fn default() -> Self {
        Self::new()
    }
}

impl Clock for SystemClock {
    fn now(&self) -> Duration {
        self.origin.elapsed()
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct TimerId(u64);

struct Timer<E> {
    deadline: Duration,
    /// `None` for one-shot timers
    interval: Option<Duration>,
    event: E,
}

pub struct EventLoop<E> {
    clock: Box<dyn Clock>,
    posted: VecDeque<E>,
    timers: HashMap<TimerId, Timer<E>>,
    next_id: u64,
}

impl<E: Clone> EventLoop<E> {
    pub fn new(clock: Box<dyn Clock>) -> Self {
        Self {
            clock,
            posted: VecDeque::new(),
            timers: HashMap::new(),
            next_id: 1,
        }
    }

    /// Queue `event` for the next drain
    pub fn post(&mut self, event: E) {
        self.posted.push_back(event);
    }

    /// Deliver `event` once after `delay`
    pub fn single_shot(&mut self, delay: Duration, event: E) -> TimerId {
        self.add_timer(delay, None, event)
    }

    /// Deliver `event` every `interval` until killed
    pub fn start_timer(&mut self, interval: Duration, event: E) -> TimerId {
        self.add_timer(interval, Some(interval), event)
    }

    fn add_timer(&mut self, delay: Duration, interval: Option<Duration>, event: E) -> TimerId {
        let id = TimerId(self.next_id);
        self.next_id += 1;
        let deadline = self.clock.now() + delay;
        self.timers.insert(id, Timer { deadline, interval, event });
        trace!(?id, ?delay, periodic = interval.is_some(), "timer armed");
        id
    }

    /// Returns false if the timer already fired (one-shot) or was killed
    pub fn kill_timer(&mut self, id: TimerId) -> bool {
        self.timers.remove(&id).is_some()
    }

    pub fn is_active(&self, id: TimerId) -> bool {
        self.timers.contains_key(&id)
    }

    /// Drop every posted event and timer. Returns how many were discarded.
    pub fn clear(&mut self) -> usize {
        let discarded = self.posted.len() + self.timers.len();
        self.posted.clear();
        self.timers.clear();
        discarded
    }

    #[cfg(test)]
    pub fn active_timers(&self) -> usize {
        self.timers.len()
    }

    #[cfg(test)]
    pub fn has_posted(&self) -> bool {
        !self.posted.is_empty()
    }

    /// Collect due timer events in deadline order, followed by the events
    /// posted before this call.
    pub fn drain_ready(&mut self) -> Vec<E> {
        let now = self.clock.now();

        let mut due: Vec<(Duration, TimerId)> = self
            .timers
            .iter()
            .filter(|(_, t)| t.deadline <= now)
            .map(|(id, t)| (t.deadline, *id))
            .collect();
        due.sort();

        let mut events = Vec::with_capacity(due.len() + self.posted.len());
        for (_, id) in due {
            let rearm = match self.timers.get_mut(&id) {
                Some(timer) => {
                    events.push(timer.event.clone());
                    match timer.interval {
                        Some(interval) => {
                            let mut next = timer.deadline + interval;
                            if next <= now {
                                next = now + interval;
                            }
                            timer.deadline = next;
                            true
                        }
                        None => false,
                    }
                }
                None => continue,
            };
            if !rearm {
                self.timers.remove(&id);
            }
        }

        events.extend(self.posted.drain(..));
        events
    }

    /// Time until the earliest timer is due. Zero when posted events are
    /// waiting, `None` when there is nothing scheduled.
    pub fn time_until_next(&self) -> Option<Duration> {
        if !self.posted.is_empty() {
            return Some(Duration::ZERO);
        }
        let now = self.clock.now();
        self.timers
            .values()
            .map(|t| t.deadline.saturating_sub(now))
            .min()
    }
}


#[cfg(test)]
mod tests {
    use super::testing::ManualClock;
    use super::*;

    fn new_loop() -> (EventLoop<&'static str>, ManualClock) {
        let clock = ManualClock::default();
        (EventLoop::new(Box::new(clock.clone())), clock)
    }

    #[test]
    fn test_posted_events_keep_order() {
        let (mut lp, _) = new_loop();
        lp.post("a");
        lp.post("b");
        assert_eq!(lp.time_until_next(), Some(Duration::ZERO));
        assert_eq!(lp.drain_ready(), vec!["a", "b"]);
        assert!(lp.drain_ready().is_empty());
        assert_eq!(lp.time_until_next(), None);
    }

    #[test]
    fn test_timers_come_before_posts() {
        let (mut lp, clock) = new_loop();
        lp.single_shot(Duration::from_millis(5), "timer");
        lp.post("posted");
        clock.advance_ms(5);
        assert_eq!(lp.drain_ready(), vec!["timer", "posted"]);
    }

    #[test]
    fn test_single_shot_fires_once() {
        let (mut lp, clock) = new_loop();
        let id = lp.single_shot(Duration::from_millis(2), "wake");
        clock.advance_ms(1);
        assert!(lp.drain_ready().is_empty());
        assert_eq!(lp.time_until_next(), Some(Duration::from_millis(1)));
        clock.advance_ms(1);
        assert_eq!(lp.drain_ready(), vec!["wake"]);
        assert!(!lp.is_active(id));
        clock.advance_ms(10);
        assert!(lp.drain_ready().is_empty());
    }

    #[test]
    fn test_due_timers_in_deadline_order() {
        let (mut lp, clock) = new_loop();
        lp.single_shot(Duration::from_millis(9), "late");
        lp.single_shot(Duration::from_millis(3), "early");
        clock.advance_ms(10);
        assert_eq!(lp.drain_ready(), vec!["early", "late"]);
    }

    #[test]
    fn test_killed_timer_never_fires() {
        let (mut lp, clock) = new_loop();
        let id = lp.single_shot(Duration::from_millis(1), "x");
        assert!(lp.kill_timer(id));
        assert!(!lp.kill_timer(id));
        clock.advance_ms(5);
        assert!(lp.drain_ready().is_empty());
    }

    #[test]
    fn test_periodic_timer_rearms_without_burst() {
        let (mut lp, clock) = new_loop();
        let id = lp.start_timer(Duration::from_millis(10), "tick");
        clock.advance_ms(10);
        assert_eq!(lp.drain_ready(), vec!["tick"]);
        clock.advance_ms(10);
        assert_eq!(lp.drain_ready(), vec!["tick"]);
        // host stalled for several intervals
        clock.advance_ms(55);
        assert_eq!(lp.drain_ready(), vec!["tick"]);
        assert_eq!(lp.time_until_next(), Some(Duration::from_millis(10)));
        assert!(lp.is_active(id));
        assert_eq!(lp.active_timers(), 1);
    }

    #[test]
    fn test_clear_discards_posts_and_timers() {
        let (mut lp, clock) = new_loop();
        lp.post("step");
        let id = lp.start_timer(Duration::from_millis(5), "tick");
        lp.single_shot(Duration::from_millis(1), "wake");
        assert_eq!(lp.clear(), 3);
        assert!(!lp.is_active(id));
        clock.advance_ms(10);
        assert!(lp.drain_ready().is_empty());
        assert_eq!(lp.time_until_next(), None);
    }

    #[test]
    fn test_events_posted_during_handling_wait_for_next_round() {
        let (mut lp, _) = new_loop();
        lp.post("step");
        for event in lp.drain_ready() {
            assert_eq!(event, "step");
            lp.post("step");
        }
        assert!(lp.has_posted());
        assert_eq!(lp.drain_ready(), vec!["step"]);
    }
}
