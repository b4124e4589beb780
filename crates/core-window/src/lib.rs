//! Materialized window over the logical grid.
//!
//! A [`Window`] owns the visual-slot matrices (body, row headers, column
//! headers) and the [`WindowState`] describing which logical rectangle they
//! show. Only the resize and recycle engines in this crate mutate either.
//!
//! Invariants (checked by the tests in `tests/`):
//! * The body holds exactly `loaded_rows` rows of `loaded_columns` slots; the
//!   header lists hold `loaded_rows` and `loaded_columns` slots.
//! * Body slot `(i, j)` shows logical cell `(current_row + i, current_column + j)`;
//!   row header `i` shows row `current_row + i`; column header `j` shows column
//!   `current_column + j`.
//! * `current_row <= total_rows - loaded_rows` and likewise for columns.
//! * Recycling never creates or destroys a slot.

use std::collections::VecDeque;

use core_data::{CellCoord, CellRect, GridExtent};
use core_surface::{Pane, RenderSurface, VisualSlot};
use thiserror::Error;

pub mod bind;
pub mod recycle;
pub mod resize;

pub use bind::{Binder, MissingPolicy, PENDING_LABEL};
pub use recycle::RecycleOutcome;
pub use resize::{LoadedExtent, ResizeOutcome};

#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum WindowError {
    #[error("slot bound to unloaded cell ({}, {})", .0.row, .0.column)]
    UncoveredCell(CellCoord),
    #[error("row header bound to unloaded row label {0}")]
    UncoveredRowLabel(usize),
    #[error("column header bound to unloaded column label {0}")]
    UncoveredColumnLabel(usize),
}

/// Logical top-left corner of the materialized window.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub struct Anchor {
    pub row: usize,
    pub column: usize,
}

impl Anchor {
    pub const fn new(row: usize, column: usize) -> Self {
        Self { row, column }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct WindowState {
    pub current_row: usize,
    pub current_column: usize,
    pub loaded_rows: usize,
    pub loaded_columns: usize,
}

impl WindowState {
    pub fn anchor(&self) -> Anchor {
        Anchor::new(self.current_row, self.current_column)
    }

    pub fn loaded(&self) -> LoadedExtent {
        LoadedExtent::new(self.loaded_rows, self.loaded_columns)
    }

    /// Logical rectangle currently materialized.
    pub fn rect(&self) -> CellRect {
        CellRect::new(self.current_row, self.loaded_rows, self.current_column, self.loaded_columns)
    }

    pub fn max_anchor(&self, extent: GridExtent) -> Anchor {
        Anchor::new(
            extent.total_rows.saturating_sub(self.loaded_rows),
            extent.total_columns.saturating_sub(self.loaded_columns),
        )
    }

    /// Clamp a candidate anchor into `[0, total - loaded]` on both axes.
    pub fn clamp_anchor(&self, anchor: Anchor, extent: GridExtent) -> Anchor {
        let max = self.max_anchor(extent);
        Anchor::new(anchor.row.min(max.row), anchor.column.min(max.column))
    }

    pub fn within_bounds(&self, extent: GridExtent) -> bool {
        self.loaded_rows <= extent.total_rows
            && self.loaded_columns <= extent.total_columns
            && self.anchor() == self.clamp_anchor(self.anchor(), extent)
    }
}

#[derive(Debug)]
pub struct Window<S> {
    state: WindowState,
    body: VecDeque<VecDeque<S>>,
    row_headers: VecDeque<S>,
    column_headers: VecDeque<S>,
}

impl<S> Default for Window<S> {
    fn default() -> Self {
        Self::new()
    }
}

impl<S> Window<S> {
    /// Empty window anchored at the grid origin.
    pub fn new() -> Self {
        Self {
            state: WindowState::default(),
            body: VecDeque::new(),
            row_headers: VecDeque::new(),
            column_headers: VecDeque::new(),
        }
    }

    pub fn state(&self) -> WindowState {
        self.state
    }

    pub fn body_slot(&self, row: usize, column: usize) -> Option<&S> {
        self.body.get(row).and_then(|r| r.get(column))
    }

    pub fn row_header(&self, row: usize) -> Option<&S> {
        self.row_headers.get(row)
    }

    pub fn column_header(&self, column: usize) -> Option<&S> {
        self.column_headers.get(column)
    }

    /// Body rows in relative (window) order.
    pub fn body_rows(&self) -> impl Iterator<Item = &VecDeque<S>> {
        self.body.iter()
    }

    pub fn row_headers(&self) -> impl Iterator<Item = &S> {
        self.row_headers.iter()
    }

    pub fn column_headers(&self) -> impl Iterator<Item = &S> {
        self.column_headers.iter()
    }

    /// Total number of materialized slots across all three panes.
    pub fn slot_count(&self) -> usize {
        self.body.iter().map(VecDeque::len).sum::<usize>() + self.row_headers.len() + self.column_headers.len()
    }
}

impl<S: VisualSlot> Window<S> {
    /// Detach every slot from the surface and drop the matrices.
    pub fn teardown<R>(self, surface: &mut R) -> usize
    where
        R: RenderSurface<Slot = S>,
    {
        let mut detached = 0;
        for row in &self.body {
            for slot in row {
                surface.detach(Pane::Body, slot);
                detached += 1;
            }
        }
        for slot in &self.row_headers {
            surface.detach(Pane::RowHeader, slot);
            detached += 1;
        }
        for slot in &self.column_headers {
            surface.detach(Pane::ColumnHeader, slot);
            detached += 1;
        }
        tracing::debug!(target: "window", detached, "window_teardown");
        detached
    }
}
