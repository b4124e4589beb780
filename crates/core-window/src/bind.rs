//! Slot binding: position + content for one logical coordinate.
//!
//! Every rebind reads the cache at the slot's *current* logical coordinate.
//! Nothing carries the coordinate a fetch was requested for, so a late fetch can
//! never paint a slot that has since moved elsewhere.

use core_config::Geometry;
use core_data::{CellCoord, CellRect, DataCache, GridExtent};
use core_surface::VisualSlot;
use tracing::trace;

use crate::{Window, WindowError};

/// Content shown by a slot whose data has not arrived yet (deferred fetches).
pub const PENDING_LABEL: &str = "…";

/// What to do when a slot is bound to an unloaded coordinate.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MissingPolicy {
    /// Synchronous coverage: an unloaded read is an invariant violation.
    Fail,
    /// Deferred coverage: show [`PENDING_LABEL`] until the fetch completes.
    Placeholder,
}

pub struct Binder<'a> {
    cache: &'a DataCache,
    geometry: Geometry,
    missing: MissingPolicy,
}

impl<'a> Binder<'a> {
    pub fn new(cache: &'a DataCache, geometry: Geometry, missing: MissingPolicy) -> Self {
        Self {
            cache,
            geometry,
            missing,
        }
    }

    pub fn extent(&self) -> GridExtent {
        self.cache.extent()
    }

    pub fn body<S: VisualSlot>(&self, slot: &mut S, coord: CellCoord) -> Result<(), WindowError> {
        let (x, y) = self.geometry.pixel_position(coord.row, coord.column);
        slot.set_position(x, y);
        match self.cache.get(coord) {
            Some(value) => slot.set_content(&value.to_string()),
            None => self.pending(slot, WindowError::UncoveredCell(coord))?,
        }
        Ok(())
    }

    pub fn row_header<S: VisualSlot>(&self, slot: &mut S, row: usize) -> Result<(), WindowError> {
        let (x, y) = self.geometry.pixel_position(row, 0);
        slot.set_position(x, y);
        match self.cache.row_label(row) {
            Some(label) => slot.set_content(label),
            None => self.pending(slot, WindowError::UncoveredRowLabel(row))?,
        }
        Ok(())
    }

    pub fn column_header<S: VisualSlot>(&self, slot: &mut S, column: usize) -> Result<(), WindowError> {
        let (x, y) = self.geometry.pixel_position(0, column);
        slot.set_position(x, y);
        match self.cache.column_label(column) {
            Some(label) => slot.set_content(label),
            None => self.pending(slot, WindowError::UncoveredColumnLabel(column))?,
        }
        Ok(())
    }

    fn pending<S: VisualSlot>(&self, slot: &mut S, err: WindowError) -> Result<(), WindowError> {
        match self.missing {
            MissingPolicy::Fail => Err(err),
            MissingPolicy::Placeholder => {
                trace!(target: "window.bind", %err, "bound_placeholder");
                slot.set_content(PENDING_LABEL);
                Ok(())
            }
        }
    }
}

impl<S: VisualSlot> Window<S> {
    /// Rebind every slot whose current logical coordinate lies in `rect`
    /// (typically a block that just arrived). Returns the number of slots
    /// rebound.
    pub fn rebind_region(&mut self, rect: CellRect, binder: &Binder<'_>) -> Result<usize, WindowError> {
        let state = self.state;
        let mut rebound = 0;
        for (i, row) in self.body.iter_mut().enumerate() {
            let logical_row = state.current_row + i;
            if !rect.rows().contains(&logical_row) {
                continue;
            }
            for (j, slot) in row.iter_mut().enumerate() {
                let coord = CellCoord::new(logical_row, state.current_column + j);
                if rect.contains(coord) {
                    binder.body(slot, coord)?;
                    rebound += 1;
                }
            }
        }
        for (i, slot) in self.row_headers.iter_mut().enumerate() {
            let row = state.current_row + i;
            if rect.rows().contains(&row) {
                binder.row_header(slot, row)?;
                rebound += 1;
            }
        }
        for (j, slot) in self.column_headers.iter_mut().enumerate() {
            let column = state.current_column + j;
            if rect.columns().contains(&column) {
                binder.column_header(slot, column)?;
                rebound += 1;
            }
        }
        trace!(target: "window.bind", %rect, rebound, "region_rebound");
        Ok(rebound)
    }
}
