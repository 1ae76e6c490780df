//! Cooperative pacing between transitions.
//!
//! A pause sleeps in short slices and gives up as soon as the interrupt flag
//! is raised. Once interrupted, every later pause in the same operation is
//! skipped so the remaining transitions complete without delay.

use std::sync::atomic::{AtomicBool, Ordering};
use std::thread;
use std::time::{Duration, Instant};

const SLICE: Duration = Duration::from_millis(5);

pub(crate) struct Pacer<'a> {
    delay: Duration,
    interrupt: &'a AtomicBool,
    interrupted: bool,
}

impl<'a> Pacer<'a> {
    pub(crate) fn new(delay: Duration, interrupt: &'a AtomicBool) -> Self {
        Self {
            delay,
            interrupt,
            interrupted: false,
        }
    }

    /// Sleeps for the configured delay unless interrupted
    pub(crate) fn pause(&mut self) {
        if self.delay.is_zero() || self.interrupted {
            return;
        }
        let deadline = Instant::now() + self.delay;
        loop {
            if self.interrupt.load(Ordering::SeqCst) {
                self.interrupted = true;
                return;
            }
            let now = Instant::now();
            if now >= deadline {
                return;
            }
            thread::sleep((deadline - now).min(SLICE));
        }
    }

    pub(crate) fn interrupted(&self) -> bool {
        self.interrupted
    }
}
