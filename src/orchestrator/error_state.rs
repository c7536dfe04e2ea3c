//! De-duplicating error reporter for run mode.
//!
//! While a broken file stays open the same error comes back on every save.
//! It is shown once, then held back until it changes, the build recovers,
//! or the reminder interval passes.

use std::time::{Duration, Instant};

use crate::utils::hash;

/// What to do with a reported error.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Report {
    /// New or different error
    Show,
    /// Same error, shown recently
    Suppressed,
    /// Same error, reminder interval elapsed
    Reminder,
}

#[derive(Debug)]
pub struct ErrorState {
    /// Hash of the current error message and when it was last shown
    current: Option<(u64, Instant)>,
    reminder: Duration,
}

impl ErrorState {
    pub fn new(reminder: Duration) -> Self {
        Self {
            current: None,
            reminder,
        }
    }

    pub fn report_error(&mut self, message: &str) -> Report {
        self.report_error_at(message, Instant::now())
    }

    pub fn report_error_at(&mut self, message: &str, now: Instant) -> Report {
        let key = hash::compute(message);
        match self.current {
            Some((current, shown)) if current == key => {
                if now.saturating_duration_since(shown) >= self.reminder {
                    self.current = Some((key, now));
                    Report::Reminder
                } else {
                    Report::Suppressed
                }
            }
            _ => {
                self.current = Some((key, now));
                Report::Show
            }
        }
    }

    /// Clear the error state. Returns `true` when this ends a failure streak.
    pub fn report_success(&mut self) -> bool {
        self.current.take().is_some()
    }

    pub fn is_failing(&self) -> bool {
        self.current.is_some()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_same_error_shown_once() {
        let mut state = ErrorState::new(Duration::from_secs(30));
        let now = Instant::now();
        assert_eq!(state.report_error_at("unexpected token", now), Report::Show);
        assert_eq!(
            state.report_error_at("unexpected token", now + Duration::from_secs(1)),
            Report::Suppressed
        );
        assert!(state.is_failing());
    }

    #[test]
    fn test_different_error_shown() {
        let mut state = ErrorState::new(Duration::from_secs(30));
        let now = Instant::now();
        state.report_error_at("unexpected token", now);
        assert_eq!(state.report_error_at("unexpected eof", now), Report::Show);
        // Switching back counts as a change too
        assert_eq!(state.report_error_at("unexpected token", now), Report::Show);
    }

    #[test]
    fn test_reminder_after_cooldown() {
        let mut state = ErrorState::new(Duration::from_secs(30));
        let now = Instant::now();
        state.report_error_at("broken", now);
        assert_eq!(
            state.report_error_at("broken", now + Duration::from_secs(31)),
            Report::Reminder
        );
        // The reminder restarts the interval
        assert_eq!(
            state.report_error_at("broken", now + Duration::from_secs(40)),
            Report::Suppressed
        );
    }

    #[test]
    fn test_success_resets() {
        let mut state = ErrorState::new(Duration::from_secs(30));
        assert!(!state.report_success());

        state.report_error("broken");
        assert!(state.report_success());
        assert!(!state.is_failing());
        assert_eq!(state.report_error("broken"), Report::Show);
    }
}
