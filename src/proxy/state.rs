//! Backend lifecycle state machine
//!
//! A lock-free register holding one [`ConnectionState`]. Transitions follow a
//! fixed table and are applied with one compare-and-swap per legal
//! predecessor, so concurrent callers never both win into incompatible
//! states. A rejected transition is a normal outcome: another task moved the
//! state first and the caller should re-read it.

use log::debug;
use std::fmt;
use std::sync::atomic::{AtomicU8, Ordering};

/// Lifecycle of the backend behind one listen address
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[repr(u8)]
pub enum ConnectionState {
    /// Backend presumed not running
    Off = 0,
    /// Start requested, backend not yet reachable
    StartingUp = 1,
    /// Backend reachable, connections may be forwarded
    Running = 2,
    /// Backend reachable with no connections, idle timer armed
    Empty = 3,
    /// Stop requested, not yet confirmed
    ShuttingDown = 4,
}

impl ConnectionState {
    /// Legal predecessors of `self`
    pub fn predecessors(self) -> &'static [ConnectionState] {
        use ConnectionState::*;
        match self {
            StartingUp => &[Off],
            Running => &[StartingUp, Empty],
            Empty => &[Running],
            ShuttingDown => &[Running],
            Off => &[ShuttingDown],
        }
    }

    /// Whether `from -> to` is in the transition table
    pub fn can_transition(from: ConnectionState, to: ConnectionState) -> bool {
        to.predecessors().contains(&from)
    }

    fn from_u8(value: u8) -> Self {
        match value {
            0 => Self::Off,
            1 => Self::StartingUp,
            2 => Self::Running,
            3 => Self::Empty,
            _ => Self::ShuttingDown,
        }
    }
}

impl fmt::Display for ConnectionState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Self::Off => "Off",
            Self::StartingUp => "StartingUp",
            Self::Running => "Running",
            Self::Empty => "Empty",
            Self::ShuttingDown => "ShuttingDown",
        };
        f.write_str(name)
    }
}

/// Lock-free state register with a fixed transition table
#[derive(Debug)]
pub struct StateMachine {
    state: AtomicU8,
}

impl StateMachine {
    pub fn new(initial: ConnectionState) -> Self {
        Self {
            state: AtomicU8::new(initial as u8),
        }
    }

    /// Current state
    pub fn get(&self) -> ConnectionState {
        ConnectionState::from_u8(self.state.load(Ordering::Acquire))
    }

    /// Move to `new` from any of its legal predecessors
    ///
    /// Returns `false` when the current state is not a legal predecessor,
    /// including when a concurrent caller got there first.
    pub fn transition(&self, new: ConnectionState) -> bool {
        new.predecessors()
            .iter()
            .any(|&old| self.swap(old, new))
    }

    /// Move `old -> new` only, if that pair is in the table
    ///
    /// Unlike [`transition`](Self::transition) this does not try the other
    /// predecessors of `new`.
    pub fn transition_from(&self, old: ConnectionState, new: ConnectionState) -> bool {
        ConnectionState::can_transition(old, new) && self.swap(old, new)
    }

    /// Overwrite the state unconditionally
    ///
    /// Used to seed the state from an out-of-band liveness probe.
    pub fn reset(&self, state: ConnectionState) {
        let old = ConnectionState::from_u8(self.state.swap(state as u8, Ordering::AcqRel));
        debug!("Resetting state from {} to {}", old, state);
    }

    /// Recovery CAS outside the transition table
    ///
    /// Moves `expected -> new` only if nobody changed the state since it was
    /// observed. Used to fall back to `Off` after a failed start, a readiness
    /// timeout or a backend that stopped answering.
    pub fn compare_and_reset(&self, expected: ConnectionState, new: ConnectionState) -> bool {
        let ok = self.swap(expected, new);
        if ok {
            debug!("Recovered state from {} to {}", expected, new);
        }
        ok
    }

    fn swap(&self, old: ConnectionState, new: ConnectionState) -> bool {
        let ok = self
            .state
            .compare_exchange(old as u8, new as u8, Ordering::AcqRel, Ordering::Acquire)
            .is_ok();
        if ok {
            debug!("Updating state from {} to {}", old, new);
        }
        ok
    }
}
