//! Resize engine: grow or shrink the slot matrices to a new loaded extent.
//!
//! Shrinking truncates from the tail (rows first, then columns) and detaches
//! every dropped slot. Growing creates, binds, attaches and appends slots for
//! the new rows, then the new columns across the post-growth row set.
//!
//! The caller must have covered [`WindowState::resized`] for the target before
//! calling [`Window::resize`].

use std::collections::VecDeque;

use core_config::Geometry;
use core_data::{CellCoord, GridExtent};
use core_surface::{Pane, RenderSurface, SurfaceSize, VisualSlot};
use tracing::{debug, info};

use crate::{Binder, Window, WindowError, WindowState};

/// Number of materialized rows and columns.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct LoadedExtent {
    pub rows: usize,
    pub columns: usize,
}

impl LoadedExtent {
    pub const fn new(rows: usize, columns: usize) -> Self {
        Self { rows, columns }
    }

    /// Loaded extent for a visible surface: the sliding window plus a buffer on
    /// both sides, clamped to the grid. The row count is derived from the
    /// surface width and the column count from its height.
    pub fn for_surface(size: SurfaceSize, geometry: Geometry, extent: GridExtent) -> Self {
        let sliding_rows = cells_in(size.width, geometry.cell_width);
        let sliding_columns = cells_in(size.height, geometry.cell_height);
        let buffer = geometry.buffer_size.saturating_mul(2);
        Self {
            rows: buffer.saturating_add(sliding_rows).min(extent.total_rows),
            columns: buffer.saturating_add(sliding_columns).min(extent.total_columns),
        }
    }
}

fn cells_in(pixels: f64, cell: u32) -> usize {
    // `as` saturates: negative and NaN sizes become zero.
    (pixels / f64::from(cell.max(1))).floor() as usize
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct ResizeOutcome {
    pub rows_added: usize,
    pub rows_removed: usize,
    pub columns_added: usize,
    pub columns_removed: usize,
    /// Anchor moved back so the grown window still fits in the grid.
    pub reanchored: bool,
}

impl ResizeOutcome {
    pub fn is_noop(&self) -> bool {
        *self == Self::default()
    }
}

impl WindowState {
    /// State after resizing to `target`: anchor unchanged unless the grown
    /// window would run past the grid end.
    pub fn resized(&self, target: LoadedExtent, extent: GridExtent) -> WindowState {
        let mut next = WindowState {
            loaded_rows: target.rows,
            loaded_columns: target.columns,
            ..*self
        };
        let anchor = next.clamp_anchor(self.anchor(), extent);
        next.current_row = anchor.row;
        next.current_column = anchor.column;
        next
    }
}

impl<S: VisualSlot> Window<S> {
    pub fn resize<R>(&mut self, target: LoadedExtent, surface: &mut R, binder: &Binder<'_>) -> Result<ResizeOutcome, WindowError>
    where
        R: RenderSurface<Slot = S>,
    {
        let extent = binder.extent();
        let target = LoadedExtent::new(target.rows.min(extent.total_rows), target.columns.min(extent.total_columns));
        let mut outcome = ResizeOutcome {
            rows_removed: self.shrink_rows(target.rows, surface),
            columns_removed: self.shrink_columns(target.columns, surface),
            ..ResizeOutcome::default()
        };

        let anchor = self.state.resized(target, extent).anchor();
        if anchor != self.state.anchor() {
            info!(
                target: "window.resize",
                from_row = self.state.current_row,
                from_column = self.state.current_column,
                to_row = anchor.row,
                to_column = anchor.column,
                "resize_reanchor"
            );
            self.recycle(anchor, binder)?;
            outcome.reanchored = true;
        }

        outcome.rows_added = self.grow_rows(target.rows, surface, binder)?;
        outcome.columns_added = self.grow_columns(target.columns, surface, binder)?;

        debug!(
            target: "window.resize",
            loaded_rows = self.state.loaded_rows,
            loaded_columns = self.state.loaded_columns,
            rows_added = outcome.rows_added,
            rows_removed = outcome.rows_removed,
            columns_added = outcome.columns_added,
            columns_removed = outcome.columns_removed,
            "resize_applied"
        );
        Ok(outcome)
    }

    fn shrink_rows<R>(&mut self, rows: usize, surface: &mut R) -> usize
    where
        R: RenderSurface<Slot = S>,
    {
        let from = self.state.loaded_rows;
        if rows >= from {
            return 0;
        }
        for row in self.body.drain(rows..) {
            for slot in &row {
                surface.detach(Pane::Body, slot);
            }
        }
        for slot in self.row_headers.drain(rows..) {
            surface.detach(Pane::RowHeader, &slot);
        }
        self.state.loaded_rows = rows;
        from - rows
    }

    fn shrink_columns<R>(&mut self, columns: usize, surface: &mut R) -> usize
    where
        R: RenderSurface<Slot = S>,
    {
        let from = self.state.loaded_columns;
        if columns >= from {
            return 0;
        }
        for row in &mut self.body {
            for slot in row.drain(columns..) {
                surface.detach(Pane::Body, &slot);
            }
        }
        for slot in self.column_headers.drain(columns..) {
            surface.detach(Pane::ColumnHeader, &slot);
        }
        self.state.loaded_columns = columns;
        from - columns
    }

    fn grow_rows<R>(&mut self, rows: usize, surface: &mut R, binder: &Binder<'_>) -> Result<usize, WindowError>
    where
        R: RenderSurface<Slot = S>,
    {
        let from = self.state.loaded_rows;
        for i in from..rows {
            let logical_row = self.state.current_row + i;
            let mut row = VecDeque::with_capacity(self.state.loaded_columns);
            for j in 0..self.state.loaded_columns {
                let mut slot = surface.create_slot(Pane::Body);
                binder.body(&mut slot, CellCoord::new(logical_row, self.state.current_column + j))?;
                row.push_back(slot);
            }
            let mut header = surface.create_slot(Pane::RowHeader);
            binder.row_header(&mut header, logical_row)?;

            for slot in &row {
                surface.attach(Pane::Body, slot);
            }
            surface.attach(Pane::RowHeader, &header);
            self.body.push_back(row);
            self.row_headers.push_back(header);
            self.state.loaded_rows = i + 1;
        }
        Ok(rows.saturating_sub(from))
    }

    fn grow_columns<R>(&mut self, columns: usize, surface: &mut R, binder: &Binder<'_>) -> Result<usize, WindowError>
    where
        R: RenderSurface<Slot = S>,
    {
        let from = self.state.loaded_columns;
        for j in from..columns {
            let logical_column = self.state.current_column + j;
            let mut fresh = Vec::with_capacity(self.body.len());
            for i in 0..self.body.len() {
                let mut slot = surface.create_slot(Pane::Body);
                binder.body(&mut slot, CellCoord::new(self.state.current_row + i, logical_column))?;
                fresh.push(slot);
            }
            let mut header = surface.create_slot(Pane::ColumnHeader);
            binder.column_header(&mut header, logical_column)?;

            for (row, slot) in self.body.iter_mut().zip(fresh) {
                surface.attach(Pane::Body, &slot);
                row.push_back(slot);
            }
            surface.attach(Pane::ColumnHeader, &header);
            self.column_headers.push_back(header);
            self.state.loaded_columns = j + 1;
        }
        Ok(columns.saturating_sub(from))
    }
}
