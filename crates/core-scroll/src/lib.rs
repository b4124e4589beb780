//! Scroll engine: turns viewport scroll reports into debounced recycle
//! requests.
//!
//! A report `{left, top}` maps to a destination anchor per axis:
//! `floor(offset / cell_size) - recycle_threshold`, clamped to
//! `[0, total - loaded]`. Whether an axis asks for a recycle is decided by
//! [`axis_fires`]:
//! - backward (`delta <= 0`) always qualifies;
//! - forward (`delta >= 0`) qualifies only while `total - current >= threshold`;
//! - neither fires when the destination equals the current anchor.
//!
//! The backward side has no buffer-range check: any move back toward the
//! origin recycles, even one that stays inside the loaded buffer, while a
//! forward move stops qualifying within `threshold` of the grid end.
//!
//! Debouncing lives in [`ScrollEngine`] (see `engine.rs`): at most one
//! immediate recycle per burst window plus one trailing settle.

use bitflags::bitflags;
use core_config::{Geometry, GridExtent};
use core_window::{Anchor, WindowState};

pub mod engine;
pub mod metrics;
pub mod timers;

pub use engine::{RecycleCause, ScrollAction, ScrollEngine};
pub use metrics::{ScrollMetrics, ScrollMetricsSnapshot};
pub use timers::{DebounceTimers, TimerKind};

/// Body scroll offsets in pixels, as reported by the viewport.
#[derive(Debug, Clone, Copy, PartialEq, Default)]
pub struct ScrollReport {
    pub left: f64,
    pub top: f64,
}

impl ScrollReport {
    pub const fn new(left: f64, top: f64) -> Self {
        Self { left, top }
    }
}

bitflags! {
    /// Axes whose recycle rule fired for a report.
    #[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
    pub struct Axes: u8 {
        const ROWS = 0b01;
        const COLUMNS = 0b10;
    }
}

/// Destination anchor for one axis.
pub fn destination_index(offset: f64, cell_size: u32, threshold: usize, total: usize, loaded: usize) -> usize {
    // NaN and negative offsets floor to zero through the saturating cast.
    let cells = (offset / f64::from(cell_size.max(1))).floor() as usize;
    cells.saturating_sub(threshold).min(total.saturating_sub(loaded))
}

/// Recycle rule for one axis.
pub fn axis_fires(current: usize, destination: usize, total: usize, threshold: usize) -> bool {
    if destination == current {
        return false;
    }
    let backward = destination <= current;
    let forward = destination >= current && total.saturating_sub(current) >= threshold;
    backward || forward
}

/// Destination anchor and qualifying axes for one report.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Decision {
    pub destination: Anchor,
    pub axes: Axes,
}

impl Decision {
    pub fn fires(&self) -> bool {
        !self.axes.is_empty()
    }
}

pub fn decide(report: ScrollReport, state: &WindowState, geometry: Geometry, extent: GridExtent) -> Decision {
    let threshold = geometry.recycle_threshold;
    let row = destination_index(report.top, geometry.cell_height, threshold, extent.total_rows, state.loaded_rows);
    let column = destination_index(
        report.left,
        geometry.cell_width,
        threshold,
        extent.total_columns,
        state.loaded_columns,
    );
    let mut axes = Axes::empty();
    axes.set(Axes::ROWS, axis_fires(state.current_row, row, extent.total_rows, threshold));
    axes.set(
        Axes::COLUMNS,
        axis_fires(state.current_column, column, extent.total_columns, threshold),
    );
    Decision {
        destination: Anchor::new(row, column),
        axes,
    }
}
