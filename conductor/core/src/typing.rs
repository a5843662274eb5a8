//! Typing Indicator
//!
//! A cyclic "assistant is typing" animation driven by the interface task.
//! The indicator never schedules itself: the owner calls [`TypingIndicator::tick`]
//! every frame with the current time and gets a phase back only when the
//! interval has elapsed and the indicator is still active.

use std::time::{Duration, Instant};

/// Number of animation phases before the cycle repeats
pub const TYPING_PHASES: usize = 4;

/// Default time between phases
pub const DEFAULT_TYPING_INTERVAL: Duration = Duration::from_millis(500);

/// Whether the indicator is animating
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum TypingState {
    /// Not shown
    Idle,
    /// Animating, with the phase currently displayed
    Active {
        /// Current phase in `0..TYPING_PHASES`
        phase: usize,
    },
}

/// Typing animation state machine
#[derive(Debug)]
pub struct TypingIndicator {
    state: TypingState,
    interval: Duration,
    last_tick: Option<Instant>,
}

impl Default for TypingIndicator {
    fn default() -> Self {
        Self::new(DEFAULT_TYPING_INTERVAL)
    }
}

impl TypingIndicator {
    /// Create an idle indicator with the given phase interval
    #[must_use]
    pub fn new(interval: Duration) -> Self {
        Self {
            state: TypingState::Idle,
            interval,
            last_tick: None,
        }
    }

    /// Enter `Active` at phase 0
    pub fn start(&mut self, now: Instant) {
        self.state = TypingState::Active { phase: 0 };
        self.last_tick = Some(now);
    }

    /// Advance if the interval has elapsed; `None` while idle or not yet due
    pub fn tick(&mut self, now: Instant) -> Option<usize> {
        let TypingState::Active { phase } = self.state else {
            return None;
        };
        let last = self.last_tick?;
        if now.saturating_duration_since(last) < self.interval {
            return None;
        }

        let next = (phase + 1) % TYPING_PHASES;
        self.state = TypingState::Active { phase: next };
        self.last_tick = Some(now);
        Some(next)
    }

    /// Return to `Idle`; reports whether it was active. Repeated calls are no-ops.
    pub fn stop(&mut self) -> bool {
        let was_active = self.is_active();
        self.state = TypingState::Idle;
        self.last_tick = None;
        was_active
    }

    /// Current state
    #[must_use]
    pub fn state(&self) -> TypingState {
        self.state
    }

    /// Whether the indicator is animating
    #[must_use]
    pub fn is_active(&self) -> bool {
        matches!(self.state, TypingState::Active { .. })
    }

    /// Phase interval
    #[must_use]
    pub fn interval(&self) -> Duration {
        self.interval
    }

    /// Display text for a phase: "typing" followed by 0-3 dots
    #[must_use]
    pub fn frame(phase: usize) -> &'static str {
        const FRAMES: [&str; TYPING_PHASES] = ["typing", "typing.", "typing..", "typing..."];
        FRAMES[phase % TYPING_PHASES]
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    const STEP: Duration = Duration::from_millis(500);

    #[test]
    fn test_idle_never_ticks() {
        let mut typing = TypingIndicator::new(STEP);
        let now = Instant::now();
        assert_eq!(typing.tick(now + STEP * 3), None);
        assert_eq!(typing.state(), TypingState::Idle);
    }

    #[test]
    fn test_phases_cycle() {
        let mut typing = TypingIndicator::new(STEP);
        let t0 = Instant::now();
        typing.start(t0);
        assert_eq!(typing.state(), TypingState::Active { phase: 0 });

        assert_eq!(typing.tick(t0 + Duration::from_millis(100)), None);

        let phases: Vec<_> = (1..=5).filter_map(|i| typing.tick(t0 + STEP * i)).collect();
        assert_eq!(phases, vec![1, 2, 3, 0, 1]);
    }

    #[test]
    fn test_stop_is_idempotent() {
        let mut typing = TypingIndicator::default();
        let t0 = Instant::now();
        typing.start(t0);

        assert!(typing.stop());
        assert!(!typing.stop());
        assert_eq!(typing.state(), TypingState::Idle);
        assert_eq!(typing.tick(t0 + STEP * 2), None);
    }

    #[test]
    fn test_frames() {
        assert_eq!(TypingIndicator::frame(0), "typing");
        assert_eq!(TypingIndicator::frame(3), "typing...");
        assert_eq!(TypingIndicator::frame(5), "typing.");
    }
}
