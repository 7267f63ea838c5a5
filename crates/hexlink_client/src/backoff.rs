//! Exponential reconnect delays.

use std::time::Duration;

/// Delay schedule for realtime reconnects.
///
/// Attempt `n` waits `min(2^n, max_units)` units: 1, 2, 4, then the ceiling.
#[derive(Debug, Clone)]
pub struct Backoff {
    unit: Duration,
    max_units: u32,
    attempt: u32,
}

impl Backoff {
    /// Schedule starting at one `unit`, capped at `max_units` units.
    pub fn new(unit: Duration, max_units: u32) -> Self {
        Self {
            unit,
            max_units: max_units.max(1),
            attempt: 0,
        }
    }

    /// Returns the delay for the next attempt and advances the schedule.
    pub fn next_delay(&mut self) -> Duration {
        let units = 2u32.saturating_pow(self.attempt).min(self.max_units);
        self.attempt = self.attempt.saturating_add(1);
        self.unit * units
    }

    /// Attempts made since the last reset.
    pub fn attempts(&self) -> u32 {
        self.attempt
    }

    /// Starts over at one unit. Called whenever a channel opens.
    pub fn reset(&mut self) {
        self.attempt = 0;
    }
}
