//! Debounced scroll handling.
//!
//! Policy for a qualifying report at `now`:
//! - burst window closed: recycle immediately and arm the burst window;
//! - burst window open: skip the immediate recycle;
//! - always: cancel any pending settle and re-arm it at `now + settle_delay`.
//!
//! When the settle fires it recomputes the destination from the latest report,
//! recycles unconditionally and reopens the burst window. A burst of reports
//! therefore yields at most one immediate recycle per window plus exactly one
//! trailing settle at the final position.

use std::time::Instant;

use core_config::{Geometry, GridExtent, ScrollTiming};
use core_window::{Anchor, WindowState};
use tracing::{debug, trace};

use crate::{Axes, DebounceTimers, ScrollMetrics, ScrollMetricsSnapshot, ScrollReport, TimerKind, decide};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RecycleCause {
    Immediate,
    Settle,
}

/// Recycle the window to `destination`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ScrollAction {
    pub destination: Anchor,
    pub axes: Axes,
    pub cause: RecycleCause,
}

#[derive(Debug)]
pub struct ScrollEngine {
    geometry: Geometry,
    extent: GridExtent,
    timing: ScrollTiming,
    timers: DebounceTimers,
    last_report: ScrollReport,
    metrics: ScrollMetrics,
}

impl ScrollEngine {
    pub fn new(geometry: Geometry, extent: GridExtent, timing: ScrollTiming) -> Self {
        Self {
            geometry,
            extent,
            timing,
            timers: DebounceTimers::default(),
            last_report: ScrollReport::default(),
            metrics: ScrollMetrics::default(),
        }
    }

    pub fn last_report(&self) -> ScrollReport {
        self.last_report
    }

    pub fn timers(&self) -> &DebounceTimers {
        &self.timers
    }

    pub fn metrics_snapshot(&self) -> ScrollMetricsSnapshot {
        self.metrics.snapshot()
    }

    pub fn next_deadline(&self) -> Option<Instant> {
        self.timers.next_deadline()
    }

    /// Handle a scroll report. Expired timers must be polled first.
    pub fn on_scroll(&mut self, now: Instant, report: ScrollReport, state: &WindowState) -> Option<ScrollAction> {
        self.metrics.incr_report();
        self.last_report = report;
        if self
            .timers
            .deadline(TimerKind::BurstSuppression)
            .is_some_and(|d| d <= now)
        {
            self.timers.cancel(TimerKind::BurstSuppression);
        }

        let decision = decide(report, state, self.geometry, self.extent);
        if !decision.fires() {
            trace!(target: "scroll.engine", left = report.left, top = report.top, "scroll_idle");
            return None;
        }
        self.metrics.incr_qualifying();

        let action = if self.timers.is_armed(TimerKind::BurstSuppression) {
            self.metrics.incr_suppressed();
            trace!(
                target: "scroll.engine",
                row = decision.destination.row,
                column = decision.destination.column,
                "scroll_suppressed"
            );
            None
        } else {
            self.metrics.incr_immediate();
            self.timers
                .schedule(TimerKind::BurstSuppression, now + self.timing.burst_window);
            debug!(
                target: "scroll.engine",
                row = decision.destination.row,
                column = decision.destination.column,
                axes = ?decision.axes,
                "scroll_recycle_immediate"
            );
            Some(ScrollAction {
                destination: decision.destination,
                axes: decision.axes,
                cause: RecycleCause::Immediate,
            })
        };
        self.timers.schedule(TimerKind::TrailingSettle, now + self.timing.settle_delay);
        action
    }

    /// Fire every timer due at `now`. Returns the settle recycle if one fired.
    pub fn poll(&mut self, now: Instant, state: &WindowState) -> Option<ScrollAction> {
        let mut action = None;
        while let Some((kind, deadline)) = self.timers.take_expired(now) {
            match kind {
                TimerKind::BurstSuppression => {
                    trace!(target: "scroll.engine", timer = kind.as_str(), "timer_expired");
                }
                TimerKind::TrailingSettle => {
                    let decision = decide(self.last_report, state, self.geometry, self.extent);
                    self.metrics.incr_settle();
                    // Reopened from the settle's own deadline so the window does
                    // not depend on how late the poll ran.
                    self.timers
                        .schedule(TimerKind::BurstSuppression, deadline + self.timing.burst_window);
                    debug!(
                        target: "scroll.engine",
                        row = decision.destination.row,
                        column = decision.destination.column,
                        "scroll_recycle_settle"
                    );
                    action = Some(ScrollAction {
                        destination: decision.destination,
                        axes: decision.axes,
                        cause: RecycleCause::Settle,
                    });
                }
            }
        }
        action
    }

    /// Drop pending timers (teardown).
    pub fn cancel_all(&mut self) {
        self.timers.cancel(TimerKind::BurstSuppression);
        self.timers.cancel(TimerKind::TrailingSettle);
    }
}
