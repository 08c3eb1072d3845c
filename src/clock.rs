//! Time source used for holds, pacing and the supervisor cadence.
//!
//! Production code sleeps for real; tests swap in [`ManualClock`] so that a
//! menu session with half-second holds runs instantly.

use std::sync::{Arc, Mutex};
use std::time::Duration;

pub trait Clock {
    fn sleep(&self, duration: Duration);
}

#[derive(Debug, Default, Clone, Copy)]
pub struct SystemClock;

impl Clock for SystemClock {
    fn sleep(&self, duration: Duration) {
        std::thread::sleep(duration);
    }
}

/// Virtual clock that returns immediately and remembers every requested sleep.
#[derive(Debug, Default, Clone)]
pub struct ManualClock {
    sleeps: Arc<Mutex<Vec<Duration>>>,
}

impl ManualClock {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn sleeps(&self) -> Vec<Duration> {
        self.sleeps.lock().map(|s| s.clone()).unwrap_or_default()
    }

    /// Total virtual time that has passed.
    pub fn elapsed(&self) -> Duration {
        self.sleeps().iter().sum()
    }
}

impl Clock for ManualClock {
    fn sleep(&self, duration: Duration) {
        if let Ok(mut sleeps) = self.sleeps.lock() {
            sleeps.push(duration);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn manual_clock_accumulates() {
        let clock = ManualClock::new();
        clock.sleep(Duration::from_millis(500));
        clock.sleep(Duration::from_millis(200));
        assert_eq!(clock.elapsed(), Duration::from_millis(700));
        assert_eq!(clock.sleeps().len(), 2);
    }
}
