//! Recycle engine: shift the window to a new anchor by rotating slots.
//!
//! No slot is created or destroyed. A forward shift of `m` moves the first `m`
//! rows to the tail, a backward shift moves the last `m` rows to the head; only
//! the moved rows are rebound. The column pass repeats the same inside every
//! body row and once for the column headers, after `current_row` has been
//! updated.
//!
//! The caller must have covered the destination rectangle before calling
//! [`Window::recycle`].

use std::collections::VecDeque;
use std::ops::Range;

use core_data::CellCoord;
use core_surface::VisualSlot;
use tracing::{debug, trace};

use crate::{Anchor, Binder, Window, WindowError};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct RecycleOutcome {
    pub rows_moved: usize,
    pub columns_moved: usize,
    pub slots_rebound: usize,
}

impl RecycleOutcome {
    pub fn is_noop(&self) -> bool {
        self.rows_moved == 0 && self.columns_moved == 0
    }
}

/// Rotation applied to one axis.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Shift {
    None,
    Forward(usize),
    Backward(usize),
}

impl Shift {
    fn between(current: usize, destination: usize, loaded: usize) -> Self {
        let moved = current.abs_diff(destination).min(loaded);
        if moved == 0 {
            Shift::None
        } else if destination > current {
            Shift::Forward(moved)
        } else {
            Shift::Backward(moved)
        }
    }

    fn moved(self) -> usize {
        match self {
            Shift::None => 0,
            Shift::Forward(m) | Shift::Backward(m) => m,
        }
    }

    fn rotate<T>(self, items: &mut VecDeque<T>) {
        match self {
            Shift::None => {}
            Shift::Forward(m) => items.rotate_left(m),
            Shift::Backward(m) => items.rotate_right(m),
        }
    }

    /// Positions (after rotation) holding recycled entries.
    fn recycled(self, loaded: usize) -> Range<usize> {
        match self {
            Shift::None => 0..0,
            Shift::Forward(m) => loaded - m..loaded,
            Shift::Backward(m) => 0..m,
        }
    }

    /// Positions (before rotation) whose entries keep their logical index.
    fn surviving(self, loaded: usize) -> Range<usize> {
        match self {
            Shift::None => 0..loaded,
            Shift::Forward(m) => m..loaded,
            Shift::Backward(m) => 0..loaded - m,
        }
    }
}

impl<S: VisualSlot> Window<S> {
    pub fn recycle(&mut self, destination: Anchor, binder: &Binder<'_>) -> Result<RecycleOutcome, WindowError> {
        let destination = self.state.clamp_anchor(destination, binder.extent());
        let mut outcome = RecycleOutcome::default();
        if destination == self.state.anchor() {
            trace!(target: "window.recycle", row = destination.row, column = destination.column, "recycle_noop");
            return Ok(outcome);
        }

        let loaded_rows = self.state.loaded_rows;
        let loaded_columns = self.state.loaded_columns;
        let rows = Shift::between(self.state.current_row, destination.row, loaded_rows);
        let columns = Shift::between(self.state.current_column, destination.column, loaded_columns);

        // Row pass. Columns the column pass will recycle are left for it.
        rows.rotate(&mut self.body);
        rows.rotate(&mut self.row_headers);
        let survivors = columns.surviving(loaded_columns);
        let column_anchor = self.state.current_column;
        for i in rows.recycled(loaded_rows) {
            let logical_row = destination.row + i;
            binder.row_header(&mut self.row_headers[i], logical_row)?;
            let row = &mut self.body[i];
            for j in survivors.clone() {
                binder.body(&mut row[j], CellCoord::new(logical_row, column_anchor + j))?;
            }
            outcome.slots_rebound += 1 + survivors.len();
        }
        self.state.current_row = destination.row;

        // Column pass.
        let recycled_columns = columns.recycled(loaded_columns);
        for (i, row) in self.body.iter_mut().enumerate() {
            columns.rotate(row);
            let logical_row = destination.row + i;
            for j in recycled_columns.clone() {
                binder.body(&mut row[j], CellCoord::new(logical_row, destination.column + j))?;
            }
            outcome.slots_rebound += recycled_columns.len();
        }
        columns.rotate(&mut self.column_headers);
        for j in recycled_columns.clone() {
            binder.column_header(&mut self.column_headers[j], destination.column + j)?;
        }
        outcome.slots_rebound += recycled_columns.len();
        self.state.current_column = destination.column;

        outcome.rows_moved = rows.moved();
        outcome.columns_moved = columns.moved();
        debug!(
            target: "window.recycle",
            row = destination.row,
            column = destination.column,
            rows_moved = outcome.rows_moved,
            columns_moved = outcome.columns_moved,
            slots_rebound = outcome.slots_rebound,
            "recycle_applied"
        );
        Ok(outcome)
    }
}
