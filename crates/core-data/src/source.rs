//! Data source seam.
//!
//! A [`DataSource`] supplies one rectangle of values plus the labels in range.
//! The reference [`FormulaSource`] computes `(row * column) mod 100000` and
//! labels every row and column with its own index. A remote or paged source
//! implements the same trait; the session decides whether to call it inline or
//! through fetch tickets.

use crate::{CellCoord, CellRect, CellValue, FetchedBlock};
use thiserror::Error;

pub const REFERENCE_MODULUS: u64 = 100_000;

#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum FetchError {
    #[error("data source failed for {rect}: {reason}")]
    Source { rect: CellRect, reason: String },
    #[error("fetched block {rect} lies outside the {total_rows}x{total_columns} grid")]
    OutsideExtent {
        rect: CellRect,
        total_rows: usize,
        total_columns: usize,
    },
    #[error("fetched block {rect} carries {got} {what}, expected {expected}")]
    Shape {
        rect: CellRect,
        what: &'static str,
        got: usize,
        expected: usize,
    },
    #[error("no fetch in flight for ticket {0}")]
    UnknownTicket(u64),
}

pub trait DataSource: Send + Sync {
    /// Fetch every value and label in `rect`. The rectangle is always inside the
    /// grid extent when called by the cache.
    fn fetch(&self, rect: CellRect) -> Result<FetchedBlock, FetchError>;
}

impl<T: DataSource + ?Sized> DataSource for std::sync::Arc<T> {
    fn fetch(&self, rect: CellRect) -> Result<FetchedBlock, FetchError> {
        (**self).fetch(rect)
    }
}

/// Synchronous stand-in for a real backend.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct FormulaSource {
    modulus: u64,
}

impl Default for FormulaSource {
    fn default() -> Self {
        Self::new()
    }
}

impl FormulaSource {
    pub const fn new() -> Self {
        Self {
            modulus: REFERENCE_MODULUS,
        }
    }

    pub fn value_at(&self, coord: CellCoord) -> CellValue {
        let product = coord.row as u128 * coord.column as u128;
        // modulus fits in i64, so the remainder does too
        CellValue::Number((product % u128::from(self.modulus)) as i64)
    }
}

impl DataSource for FormulaSource {
    fn fetch(&self, rect: CellRect) -> Result<FetchedBlock, FetchError> {
        let mut values = Vec::with_capacity(rect.cell_count());
        for row in rect.rows() {
            for column in rect.columns() {
                values.push(self.value_at(CellCoord::new(row, column)));
            }
        }
        Ok(FetchedBlock {
            rect,
            values,
            row_labels: rect.rows().map(|r| r.to_string()).collect(),
            column_labels: rect.columns().map(|c| c.to_string()).collect(),
        })
    }
}
