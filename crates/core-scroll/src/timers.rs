//! Two named, cancellable deadlines driven by caller-supplied instants.
//!
//! Nothing here sleeps or spawns; the owner asks for [`DebounceTimers::next_deadline`]
//! and calls [`DebounceTimers::take_expired`] when time has advanced.

use std::time::Instant;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum TimerKind {
    /// While armed, qualifying scrolls do not recycle immediately.
    BurstSuppression,
    /// Trailing recycle after the last qualifying scroll.
    TrailingSettle,
}

impl TimerKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            TimerKind::BurstSuppression => "burst_suppression",
            TimerKind::TrailingSettle => "trailing_settle",
        }
    }
}

#[derive(Debug, Clone, Copy, Default)]
pub struct DebounceTimers {
    burst: Option<Instant>,
    settle: Option<Instant>,
}

impl DebounceTimers {
    fn slot(&mut self, kind: TimerKind) -> &mut Option<Instant> {
        match kind {
            TimerKind::BurstSuppression => &mut self.burst,
            TimerKind::TrailingSettle => &mut self.settle,
        }
    }

    /// Arm `kind`, replacing any pending deadline.
    pub fn schedule(&mut self, kind: TimerKind, deadline: Instant) {
        *self.slot(kind) = Some(deadline);
    }

    /// Disarm `kind`. Returns whether it was armed.
    pub fn cancel(&mut self, kind: TimerKind) -> bool {
        self.slot(kind).take().is_some()
    }

    pub fn deadline(&self, kind: TimerKind) -> Option<Instant> {
        match kind {
            TimerKind::BurstSuppression => self.burst,
            TimerKind::TrailingSettle => self.settle,
        }
    }

    pub fn is_armed(&self, kind: TimerKind) -> bool {
        self.deadline(kind).is_some()
    }

    pub fn next_deadline(&self) -> Option<Instant> {
        match (self.burst, self.settle) {
            (Some(a), Some(b)) => Some(a.min(b)),
            (a, b) => a.or(b),
        }
    }

    /// Disarm and return the earliest timer due at `now`. Ties go to the
    /// settle so a settle never observes a burst window it is about to reopen.
    pub fn take_expired(&mut self, now: Instant) -> Option<(TimerKind, Instant)> {
        let due = |d: Option<Instant>| d.filter(|d| *d <= now);
        let kind = match (due(self.burst), due(self.settle)) {
            (None, None) => return None,
            (Some(_), None) => TimerKind::BurstSuppression,
            (None, Some(_)) => TimerKind::TrailingSettle,
            (Some(b), Some(s)) if b < s => TimerKind::BurstSuppression,
            (Some(_), Some(_)) => TimerKind::TrailingSettle,
        };
        self.slot(kind).take().map(|deadline| (kind, deadline))
    }
}
