//! Wall-clock interval timers for the scheduler.
use std::{
    thread,
    time::{Duration, Instant},
};

/// Timer to synchronize the scheduler loop with a periodic trigger.
///
/// It is designed to work with the yielding cooperative pattern of the
/// interpreter loop: time elapses while instructions dispatch, and each
/// cycle asks the clock whether its interval has passed.
pub(crate) struct Clock {
    last: Instant,
    interval: Duration,
}

impl Clock {
    /// Creates a new clock with the current time as internal state.
    pub(crate) fn new(interval: Duration) -> Self {
        Self {
            last: Instant::now(),
            interval,
        }
    }

    pub(crate) fn from_nanos(freq: u64) -> Self {
        Self::new(Duration::from_nanos(freq))
    }

    /// Set the clock state back to zero.
    pub(crate) fn reset(&mut self) {
        self.last = Instant::now()
    }

    /// Check whether the interval has elapsed, resetting when it has.
    pub(crate) fn tick(&mut self) -> bool {
        if self.last.elapsed() >= self.interval {
            // Reset back to now, rather than trying to catch up.
            self.reset();
            true
        } else {
            false
        }
    }

    /// Block the current thread until the next clock cycle.
    /// A zero interval returns immediately.
    pub(crate) fn wait(&mut self) {
        if self.interval.is_zero() {
            return;
        }
        loop {
            if self.last.elapsed() < self.interval {
                // Sleep does not have enough resolution, and causes
                // the clock to run at 30 FPS.
                //
                // Spinning a loop causes high CPU usage and fan madness.
                //
                // Yielding in a loop is the best alternative.
                thread::yield_now();
            } else {
                self.reset();
                return;
            }
        }
    }
}
