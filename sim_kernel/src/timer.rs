//! # Simulation Clock
//!
//! Deterministic time base for the simulation.
//!
//! ## Philosophy
//!
//! **Determinism enables thorough testing.**
//!
//! Simulation time is a unit counter that only moves when a process
//! executes. Arrival, completion, turnaround and waiting times are all
//! measured on it; wall-clock time never leaks in.

/// Controllable, monotonic simulation clock
///
/// # Examples
///
/// ```
/// use sim_kernel::timer::SimClock;
///
/// let mut clock = SimClock::new();
/// assert_eq!(clock.now(), 0);
///
/// clock.advance(2);
/// clock.advance(3);
/// assert_eq!(clock.now(), 5);
/// ```
#[derive(Debug, Clone)]
pub struct SimClock {
    now: u64,
}

impl SimClock {
    /// Creates a clock at time 0
    pub fn new() -> Self {
        Self { now: 0 }
    }

    /// Creates a clock starting at a specific time
    pub fn with_initial_time(now: u64) -> Self {
        Self { now }
    }

    /// Advances by `delta` units (saturating)
    pub fn advance(&mut self, delta: u64) {
        self.now = self.now.saturating_add(delta);
    }

    /// Current simulation time
    pub fn now(&self) -> u64 {
        self.now
    }
}

impl Default for SimClock {
    fn default() -> Self {
        Self::new()
    }
}
