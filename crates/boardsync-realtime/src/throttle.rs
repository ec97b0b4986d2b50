//! Leading-edge throttle for high-frequency emissions.
//!
//! Emits the first value immediately, then suppresses for a fixed window.
//! Values arriving during the window coalesce: only the last one is
//! released when the window elapses. Not collaboration-specific; the cursor
//! publish path is the main consumer.

use std::time::Duration;

use tokio::time::Instant;

/// A leading-edge throttle over values of type `T`.
///
/// The caller owns the clock: [`offer`](Throttle::offer) and
/// [`flush`](Throttle::flush) take an explicit `now`, and
/// [`deadline`](Throttle::deadline) tells the caller when a trailing value
/// is due. This keeps the primitive pure and timer-free.
#[derive(Debug)]
pub struct Throttle<T> {
    window: Duration,
    window_start: Option<Instant>,
    pending: Option<T>,
}

impl<T> Throttle<T> {
    /// Creates a throttle with the given suppression window.
    pub fn new(window: Duration) -> Self {
        Self {
            window,
            window_start: None,
            pending: None,
        }
    }

    /// Offers a value. Returns `Some(value)` when it should be emitted
    /// immediately (leading edge); otherwise stores it as the trailing
    /// candidate, replacing any earlier pending value.
    pub fn offer(&mut self, value: T, now: Instant) -> Option<T> {
        match self.window_start {
            Some(start) if now < start + self.window => {
                self.pending = Some(value);
                None
            }
            _ => {
                self.window_start = Some(now);
                self.pending = None;
                Some(value)
            }
        }
    }

    /// When the pending trailing value is due, if any.
    pub fn deadline(&self) -> Option<Instant> {
        self.pending
            .as_ref()
            .and(self.window_start)
            .map(|start| start + self.window)
    }

    /// Releases the trailing value once its window has elapsed. Opens a new
    /// suppression window so a burst keeps coalescing.
    pub fn flush(&mut self, now: Instant) -> Option<T> {
        match self.window_start {
            Some(start) if self.pending.is_some() && now >= start + self.window => {
                self.window_start = Some(now);
                self.pending.take()
            }
            _ => None,
        }
    }
}
