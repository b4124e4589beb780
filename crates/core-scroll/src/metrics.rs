use std::sync::atomic::{AtomicU64, Ordering::Relaxed};

/// Scroll engine counters.
#[derive(Debug, Default)]
pub struct ScrollMetrics {
    scroll_reports: AtomicU64,
    qualifying: AtomicU64,
    immediate_recycles: AtomicU64,
    settle_recycles: AtomicU64,
    /// Qualifying reports that arrived inside an armed burst window.
    suppressed: AtomicU64,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct ScrollMetricsSnapshot {
    pub scroll_reports: u64,
    pub qualifying: u64,
    pub immediate_recycles: u64,
    pub settle_recycles: u64,
    pub suppressed: u64,
}

impl ScrollMetrics {
    pub fn snapshot(&self) -> ScrollMetricsSnapshot {
        ScrollMetricsSnapshot {
            scroll_reports: self.scroll_reports.load(Relaxed),
            qualifying: self.qualifying.load(Relaxed),
            immediate_recycles: self.immediate_recycles.load(Relaxed),
            settle_recycles: self.settle_recycles.load(Relaxed),
            suppressed: self.suppressed.load(Relaxed),
        }
    }

    pub(crate) fn incr_report(&self) {
        self.scroll_reports.fetch_add(1, Relaxed);
    }
    pub(crate) fn incr_qualifying(&self) {
        self.qualifying.fetch_add(1, Relaxed);
    }
    pub(crate) fn incr_immediate(&self) {
        self.immediate_recycles.fetch_add(1, Relaxed);
    }
    pub(crate) fn incr_settle(&self) {
        self.settle_recycles.fetch_add(1, Relaxed);
    }
    pub(crate) fn incr_suppressed(&self) {
        self.suppressed.fetch_add(1, Relaxed);
    }
}
