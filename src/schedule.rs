//! Per-document debounce of verification passes.
//!
//! Time is supplied by the caller so the host decides how the clock advances.
//! Every edit cancels the pending pass and schedules a new one; the most
//! recent edit always wins, including over a pending priority pass.

use std::time::{Duration, Instant};

/// A verification pass waiting for its deadline.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PendingVerification {
    /// When the pass becomes due.
    pub due: Instant,
    /// Generation the pass was scheduled under.
    pub generation: u64,
    /// Scheduled with the short delay because an edit touched a marker line.
    pub priority: bool,
}

/// Debounce state for one document.
#[derive(Debug, Clone, Default)]
pub struct VerificationSchedule {
    /// Bumped on every schedule and cancel, so a superseded pass is stale.
    generation: u64,
    /// The single outstanding pass, if any.
    pending: Option<PendingVerification>,
}

impl VerificationSchedule {
    /// Drop the pending pass.
    pub fn cancel(&mut self) {
        self.generation = self.generation.saturating_add(1);
        self.pending = None;
    }

    /// Current generation.
    pub const fn generation(&self) -> u64 {
        return self.generation;
    }

    /// Whether a pass exists and its deadline has passed.
    pub fn is_due(&self, now: Instant) -> bool {
        return self.pending.is_some_and(|p| return p.due <= now);
    }

    /// Empty schedule.
    pub fn new() -> Self {
        return Self::default();
    }

    /// The outstanding pass.
    pub const fn pending(&self) -> Option<&PendingVerification> {
        return self.pending.as_ref();
    }

    /// Replace any pending pass with one due `delay` after `now`.
    pub fn schedule(&mut self, now: Instant, delay: Duration, priority: bool) -> PendingVerification {
        self.generation = self.generation.saturating_add(1);
        let pass = PendingVerification {
            due: now.checked_add(delay).unwrap_or(now),
            generation: self.generation,
            priority,
        };
        self.pending = Some(pass);
        return pass;
    }

    /// Remove and return the pending pass if it is due at `now`.
    pub fn take_due(&mut self, now: Instant) -> Option<PendingVerification> {
        if !self.is_due(now) {
            return None;
        }
        return self.pending.take();
    }
}

#[cfg(test)]
mod tests {
    use std::time::{Duration, Instant};

    use super::VerificationSchedule;

    const NORMAL: Duration = Duration::from_millis(500);
    const PRIORITY: Duration = Duration::from_millis(100);

    #[test]
    fn pass_becomes_due_after_its_delay() {
        let start = Instant::now();
        let mut schedule = VerificationSchedule::new();
        schedule.schedule(start, NORMAL, false);
        assert!(schedule.take_due(start + Duration::from_millis(499)).is_none());
        let pass = schedule.take_due(start + NORMAL).unwrap();
        assert!(!pass.priority);
        assert!(schedule.pending().is_none());
    }

    #[test]
    fn later_edit_replaces_pending_pass() {
        let start = Instant::now();
        let mut schedule = VerificationSchedule::new();
        let first = schedule.schedule(start, PRIORITY, true);
        let second = schedule.schedule(start + Duration::from_millis(50), NORMAL, false);
        assert!(second.generation > first.generation);
        assert!(!schedule.is_due(start + PRIORITY), "priority pass was superseded");
        assert!(schedule.is_due(start + Duration::from_millis(550)));
    }

    #[test]
    fn cancel_drops_the_pass() {
        let start = Instant::now();
        let mut schedule = VerificationSchedule::new();
        schedule.schedule(start, PRIORITY, true);
        let generation = schedule.generation();
        schedule.cancel();
        assert!(schedule.pending().is_none());
        assert!(schedule.generation() > generation);
        assert!(schedule.take_due(start + NORMAL).is_none());
    }
}
