//! Program lifecycle shared by the editor and the simulator window
//!
//! `Stopped --start--> Started --pause--> Paused --cont--> Started`, and
//! `stop` from either running state back to `Stopped`. Any other event is
//! dropped. Entering a state produces a [`Transition`] the caller acts on;
//! nothing here raises further events, so one dispatch is one transition.

use tracing::debug;

#[derive(Clone, Copy, PartialEq, Eq, Debug, Default)]
pub enum LifecycleState {
    #[default]
    Stopped,
    Started,
    Paused,
}

#[derive(Clone, Copy, PartialEq, Eq, Debug)]
pub enum LifecycleEvent {
    Start,
    Pause,
    Cont,
    Stop,
}

impl LifecycleEvent {
    #[cfg(test)]
    pub const ALL: [LifecycleEvent; 4] = [
        LifecycleEvent::Start,
        LifecycleEvent::Pause,
        LifecycleEvent::Cont,
        LifecycleEvent::Stop,
    ];
}

impl LifecycleState {
    /// Target state of `event`, or `None` if the event has no edge here
    pub fn on(self, event: LifecycleEvent) -> Option<LifecycleState> {
        use LifecycleEvent as E;
        use LifecycleState as S;
        match (self, event) {
            (S::Stopped, E::Start) => Some(S::Started),
            (S::Started, E::Pause) => Some(S::Paused),
            (S::Paused, E::Cont) => Some(S::Started),
            (S::Started | S::Paused, E::Stop) => Some(S::Stopped),
            _ => None,
        }
    }
}

/// A transition that happened
#[derive(Clone, Copy, PartialEq, Eq, Debug)]
pub struct Transition {
    pub from: LifecycleState,
    pub to: LifecycleState,
    pub event: LifecycleEvent,
}

impl Transition {
    /// Entering `Started` drops the runtime error shown in the editor
    pub fn clears_error_annotation(&self) -> bool {
        self.to == LifecycleState::Started
    }
}

#[derive(Default)]
pub struct Lifecycle {
    state: LifecycleState,
}

impl Lifecycle {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn state(&self) -> LifecycleState {
        self.state
    }

    /// Apply `event`. Returns the transition, or `None` when it was dropped.
    pub fn dispatch(&mut self, event: LifecycleEvent) -> Option<Transition> {
        match self.state.on(event) {
            Some(to) => {
                let transition = Transition { from: self.state, to, event };
                self.state = to;
                debug!(from = ?transition.from, to = ?to, ?event, "lifecycle transition");
                Some(transition)
            }
            None => {
                debug!(state = ?self.state, ?event, "lifecycle event ignored");
                None
            }
        }
    }
}

/// What the start/pause affordance does next
#[derive(Clone, Copy, PartialEq, Eq, Debug)]
pub enum StartAction {
    /// Compile and open the simulator window
    OpenSimulator,
    Run,
    Pause,
    Continue,
}

impl StartAction {
    pub fn label(self) -> &'static str {
        match self {
            StartAction::OpenSimulator => "Start simulator",
            StartAction::Run => "Run",
            StartAction::Pause => "Pause",
            StartAction::Continue => "Continue",
        }
    }
}

pub const INSPECTOR_HINT: &str = "Pause the program to view and modify variables";

/// Editor toolbar as seen after entering a state
#[derive(Clone, Copy, PartialEq, Eq, Debug)]
pub struct ToolbarState {
    pub start: StartAction,
    pub stop_enabled: bool,
    pub inspector_editable: bool,
}

impl ToolbarState {
    pub fn for_state(state: LifecycleState, has_sim_window: bool) -> Self {
        match state {
            LifecycleState::Stopped => Self {
                start: if has_sim_window { StartAction::Run } else { StartAction::OpenSimulator },
                stop_enabled: false,
                inspector_editable: true,
            },
            LifecycleState::Started => Self {
                start: StartAction::Pause,
                stop_enabled: true,
                inspector_editable: false,
            },
            LifecycleState::Paused => Self {
                start: StartAction::Continue,
                stop_enabled: true,
                inspector_editable: true,
            },
        }
    }

    pub fn inspector_hint(&self) -> Option<&'static str> {
        if self.inspector_editable {
            None
        } else {
            Some(INSPECTOR_HINT)
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use LifecycleEvent as E;
    use LifecycleState as S;

    const LEGAL: [(S, E, S); 5] = [
        (S::Stopped, E::Start, S::Started),
        (S::Started, E::Pause, S::Paused),
        (S::Paused, E::Cont, S::Started),
        (S::Started, E::Stop, S::Stopped),
        (S::Paused, E::Stop, S::Stopped),
    ];

    fn reference(state: S, event: E) -> S {
        LEGAL
            .iter()
            .find(|(from, ev, _)| *from == state && *ev == event)
            .map(|(_, _, to)| *to)
            .unwrap_or(state)
    }

    fn all_sequences(len: usize) -> Vec<Vec<E>> {
        let mut seqs = vec![vec![]];
        for _ in 0..len {
            seqs = seqs
                .into_iter()
                .flat_map(|s| {
                    E::ALL.iter().map(move |e| {
                        let mut next = s.clone();
                        next.push(*e);
                        next
                    })
                })
                .collect();
        }
        seqs
    }

    #[test]
    fn test_replay_matches_legal_transitions() {
        for len in 0..=6 {
            for seq in all_sequences(len) {
                let mut lc = Lifecycle::new();
                let mut expected = S::Stopped;
                for event in &seq {
                    let transition = lc.dispatch(*event);
                    let next = reference(expected, *event);
                    assert_eq!(transition.is_some(), next != expected);
                    expected = next;
                    assert_eq!(lc.state(), expected, "sequence {:?}", seq);
                }
            }
        }
    }

    #[test]
    fn test_illegal_events_are_dropped() {
        let mut lc = Lifecycle::new();
        assert_eq!(lc.dispatch(E::Pause), None);
        assert_eq!(lc.dispatch(E::Cont), None);
        assert_eq!(lc.dispatch(E::Stop), None);
        assert_eq!(lc.state(), S::Stopped);

        lc.dispatch(E::Start);
        assert_eq!(lc.dispatch(E::Start), None);
        assert_eq!(lc.dispatch(E::Cont), None);
        assert_eq!(lc.state(), S::Started);
    }

    #[test]
    fn test_stop_from_any_running_state() {
        for path in [vec![E::Start], vec![E::Start, E::Pause], vec![E::Start, E::Pause, E::Cont]] {
            let mut lc = Lifecycle::new();
            for e in path {
                lc.dispatch(e);
            }
            let t = lc.dispatch(E::Stop).expect("stop is legal while running");
            assert_eq!(t.to, S::Stopped);
            assert_eq!(lc.state(), S::Stopped);
        }
    }

    #[test]
    fn test_entering_started_clears_annotation() {
        let mut lc = Lifecycle::new();
        assert!(lc.dispatch(E::Start).map(|t| t.clears_error_annotation()).unwrap_or(false));
        let pause = lc.dispatch(E::Pause).expect("pause");
        assert!(!pause.clears_error_annotation());
        assert!(lc.dispatch(E::Cont).expect("cont").clears_error_annotation());
    }

    #[test]
    fn test_toolbar_per_state() {
        let stopped = ToolbarState::for_state(S::Stopped, false);
        assert_eq!(stopped.start.label(), "Start simulator");
        assert!(!stopped.stop_enabled);
        assert_eq!(ToolbarState::for_state(S::Stopped, true).start.label(), "Run");

        let started = ToolbarState::for_state(S::Started, true);
        assert_eq!(started.start, StartAction::Pause);
        assert!(started.stop_enabled);
        assert_eq!(started.inspector_hint(), Some(INSPECTOR_HINT));

        let paused = ToolbarState::for_state(S::Paused, true);
        assert_eq!(paused.start.label(), "Continue");
        assert!(paused.stop_enabled);
        assert!(paused.inspector_editable);
        assert_eq!(paused.inspector_hint(), None);
    }
}
