//! Millisecond time source for the tick loop.
//!
//! Timestamps are `u32` milliseconds that wrap after ~49.7 days, the same
//! width as a microcontroller `millis()`. Compare them only through
//! [`elapsed_ms`].

use std::time::Instant;

// ── Clocks ───────────────────────────────────────────────────────────

pub trait Clock {
    fn now_ms(&self) -> u32;
}

/// Wall-clock monotonic counter starting at zero when created.
pub struct MonotonicClock {
    start: Instant,
}

impl MonotonicClock {
    pub fn new() -> Self {
        Self {
            start: Instant::now(),
        }
    }
}

impl Default for MonotonicClock {
    fn default() -> Self {
        Self::new()
    }
}

impl Clock for MonotonicClock {
    fn now_ms(&self) -> u32 {
        // Truncation is the wraparound.
        self.start.elapsed().as_millis() as u32
    }
}

// ── Wrapping arithmetic ──────────────────────────────────────────────

/// Milliseconds from `since` to `now`, correct across counter overflow.
pub fn elapsed_ms(now: u32, since: u32) -> u32 {
    now.wrapping_sub(since)
}

// ── Tests ────────────────────────────────────────────────────────────
