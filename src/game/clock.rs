//! Simulation and wall clocks
//!
//! The simulation only ever sees fixed steps from [`FixedStep`]. Wall time is
//! used for activity stamps that drive idle reaping.

use std::time::{Duration, SystemTime, UNIX_EPOCH};

/// Milliseconds since the Unix epoch, or 0 if the system clock is before it
pub fn wall_millis() -> u64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map_or(0, |since| u64::try_from(since.as_millis()).unwrap_or(u64::MAX))
}

/// Converts jittery wall-clock gaps into whole simulation steps.
///
/// Real elapsed time is accumulated and drained in quanta of `step`; the
/// remainder carries into the next call so no time is lost between wake-ups.
#[derive(Debug, Clone)]
pub struct FixedStep {
    step: Duration,
    carry: Duration,
    max_steps: u32,
}

impl FixedStep {
    pub fn new(step: Duration, max_steps: u32) -> Self {
        Self {
            step,
            carry: Duration::ZERO,
            max_steps: max_steps.max(1),
        }
    }

    pub fn step_ms(&self) -> u64 {
        self.step.as_millis() as u64
    }

    /// Add `elapsed` and return how many steps to run now plus any steps
    /// dropped because the backlog exceeded the catch-up cap.
    pub fn advance(&mut self, elapsed: Duration) -> (u32, u32) {
        if self.step.is_zero() {
            return (0, 0);
        }

        self.carry += elapsed;
        let due = (self.carry.as_nanos() / self.step.as_nanos()).min(u32::MAX as u128) as u32;
        self.carry -= self.step * due;

        if due > self.max_steps {
            (self.max_steps, due - self.max_steps)
        } else {
            (due, 0)
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn remainder_carries_forward() {
        let mut clock = FixedStep::new(Duration::from_millis(50), 10);
        assert_eq!(clock.advance(Duration::from_millis(30)), (0, 0));
        assert_eq!(clock.advance(Duration::from_millis(30)), (1, 0));
        assert_eq!(clock.advance(Duration::from_millis(40)), (1, 0));
        assert_eq!(clock.advance(Duration::from_millis(49)), (0, 0));
        assert_eq!(clock.advance(Duration::from_millis(1)), (1, 0));
    }

    #[test]
    fn wall_clock_is_past_the_epoch() {
        let before = wall_millis();
        assert!(before > 0);
        assert!(wall_millis() >= before);
    }

    #[test]
    fn backlog_is_capped() {
        let mut clock = FixedStep::new(Duration::from_millis(50), 4);
        assert_eq!(clock.advance(Duration::from_millis(500)), (4, 6));
        assert_eq!(clock.advance(Duration::from_millis(50)), (1, 0));
    }
}
