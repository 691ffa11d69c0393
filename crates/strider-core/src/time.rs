use std::time::Duration;

// ---------------------------------------------------------------------------
// ControlClock
// ---------------------------------------------------------------------------

/// Integer-nanosecond control clock advanced once per tick.
///
/// Tracking ticks instead of summing `dT` keeps the walking time exact over
/// long sessions, so planner impact times stay comparable with it.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ControlClock {
    period_nanos: u64,
    ticks: u64,
}

impl ControlClock {
    /// Create a clock at time zero with period `dt` seconds.
    #[must_use]
    #[allow(clippy::cast_possible_truncation, clippy::cast_sign_loss)]
    pub fn new(dt: f64) -> Self {
        Self {
            period_nanos: (dt * 1_000_000_000.0).round() as u64,
            ticks: 0,
        }
    }

    /// Advance by one period.
    pub fn tick(&mut self) {
        self.ticks += 1;
    }

    pub fn reset(&mut self) {
        self.ticks = 0;
    }

    pub const fn ticks(&self) -> u64 {
        self.ticks
    }

    pub const fn period(&self) -> Duration {
        Duration::from_nanos(self.period_nanos)
    }

    /// Elapsed time in seconds.
    #[allow(clippy::cast_precision_loss)]
    pub fn now(&self) -> f64 {
        (self.ticks * self.period_nanos) as f64 * 1e-9
    }

    /// Absolute time `offset` ticks in the future.
    #[allow(clippy::cast_precision_loss)]
    pub fn time_after(&self, offset: usize) -> f64 {
        ((self.ticks + offset as u64) * self.period_nanos) as f64 * 1e-9
    }

    /// Period in seconds.
    #[allow(clippy::cast_precision_loss)]
    pub fn dt(&self) -> f64 {
        self.period_nanos as f64 * 1e-9
    }
}
