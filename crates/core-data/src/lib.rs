//! Logical grid data: coordinates, rectangles, values and the lazily filled
//! [`DataCache`] that backs every visual slot.
//!
//! The cache is indexed by absolute logical coordinate, never by time or by
//! window position. That is what makes re-fetches idempotent and lets a fetch
//! that completes after the window has moved on still be written safely.

use std::fmt;
use std::ops::Range;

pub mod cache;
pub mod source;

pub use cache::{CacheStats, CoverageRequest, DataCache, FetchTicket};
pub use core_config::GridExtent;
pub use source::{DataSource, FetchError, FormulaSource, REFERENCE_MODULUS};

/// Absolute logical coordinate into the full grid.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct CellCoord {
    pub row: usize,
    pub column: usize,
}

impl CellCoord {
    pub const fn new(row: usize, column: usize) -> Self {
        Self { row, column }
    }
}

/// Half-open logical rectangle `[row_from, row_from + row_count) x
/// [column_from, column_from + column_count)`.
///
/// A rectangle may have zero columns but a non-zero row count (or the reverse);
/// that shape still addresses the row (column) labels in range.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub struct CellRect {
    pub row_from: usize,
    pub row_count: usize,
    pub column_from: usize,
    pub column_count: usize,
}

impl CellRect {
    pub const fn new(row_from: usize, row_count: usize, column_from: usize, column_count: usize) -> Self {
        Self {
            row_from,
            row_count,
            column_from,
            column_count,
        }
    }

    pub fn rows(&self) -> Range<usize> {
        self.row_from..self.row_from + self.row_count
    }

    pub fn columns(&self) -> Range<usize> {
        self.column_from..self.column_from + self.column_count
    }

    /// True when the rectangle addresses no cell, row or column at all.
    pub fn is_empty(&self) -> bool {
        self.row_count == 0 && self.column_count == 0
    }

    pub fn cell_count(&self) -> usize {
        self.row_count * self.column_count
    }

    pub fn contains(&self, coord: CellCoord) -> bool {
        self.rows().contains(&coord.row) && self.columns().contains(&coord.column)
    }

    /// Row or column ranges overlap on both axes (label-only rectangles count
    /// on their non-empty axis).
    pub fn overlaps(&self, other: &CellRect) -> bool {
        let rows = ranges_overlap(self.rows(), other.rows());
        let columns = ranges_overlap(self.columns(), other.columns());
        match (
            self.row_count == 0 || other.row_count == 0,
            self.column_count == 0 || other.column_count == 0,
        ) {
            (false, false) => rows && columns,
            (true, false) => columns,
            (false, true) => rows,
            (true, true) => false,
        }
    }

    /// Clip the rectangle to the grid extent.
    pub fn clamp_to(&self, extent: GridExtent) -> CellRect {
        let row_from = self.row_from.min(extent.total_rows);
        let column_from = self.column_from.min(extent.total_columns);
        CellRect {
            row_from,
            row_count: self.row_count.min(extent.total_rows - row_from),
            column_from,
            column_count: self.column_count.min(extent.total_columns - column_from),
        }
    }

    pub fn fits(&self, extent: GridExtent) -> bool {
        self.row_from + self.row_count <= extent.total_rows
            && self.column_from + self.column_count <= extent.total_columns
    }
}

impl fmt::Display for CellRect {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "rows {}..{} x columns {}..{}",
            self.row_from,
            self.row_from + self.row_count,
            self.column_from,
            self.column_from + self.column_count
        )
    }
}

fn ranges_overlap(a: Range<usize>, b: Range<usize>) -> bool {
    a.start < b.end && b.start < a.end
}

/// A loaded logical grid value.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum CellValue {
    Number(i64),
    Text(String),
}

impl fmt::Display for CellValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            CellValue::Number(n) => write!(f, "{n}"),
            CellValue::Text(s) => f.write_str(s),
        }
    }
}

/// Rectangle of values plus the row and column labels in range, as returned by
/// a [`DataSource`]. `values` is row-major.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FetchedBlock {
    pub rect: CellRect,
    pub values: Vec<CellValue>,
    pub row_labels: Vec<String>,
    pub column_labels: Vec<String>,
}

impl FetchedBlock {
    pub fn value(&self, coord: CellCoord) -> Option<&CellValue> {
        if !self.rect.contains(coord) {
            return None;
        }
        let r = coord.row - self.rect.row_from;
        let c = coord.column - self.rect.column_from;
        self.values.get(r * self.rect.column_count + c)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn clamp_clips_to_extent() {
        let extent = GridExtent::new(100, 40);
        let r = CellRect::new(90, 50, 30, 50).clamp_to(extent);
        assert_eq!(r, CellRect::new(90, 10, 30, 10));
        assert!(r.fits(extent));
        let past = CellRect::new(500, 5, 0, 5).clamp_to(extent);
        assert_eq!(past.row_count, 0);
    }

    #[test]
    fn overlap_respects_label_only_rects() {
        let window = CellRect::new(0, 10, 0, 10);
        assert!(window.overlaps(&CellRect::new(9, 5, 9, 5)));
        assert!(!window.overlaps(&CellRect::new(10, 5, 0, 10)));
        // rows-only rectangle overlaps on the row axis alone
        assert!(window.overlaps(&CellRect::new(5, 2, 0, 0)));
        assert!(!window.overlaps(&CellRect::new(20, 2, 0, 0)));
    }

    #[test]
    fn block_value_lookup_is_row_major() {
        let rect = CellRect::new(2, 2, 5, 3);
        let block = FetchedBlock {
            rect,
            values: (0..6).map(CellValue::Number).collect(),
            row_labels: vec!["2".into(), "3".into()],
            column_labels: vec!["5".into(), "6".into(), "7".into()],
        };
        assert_eq!(block.value(CellCoord::new(3, 6)), Some(&CellValue::Number(4)));
        assert_eq!(block.value(CellCoord::new(4, 6)), None);
    }

    #[test]
    fn display_forms() {
        assert_eq!(CellValue::Number(-7).to_string(), "-7");
        assert_eq!(CellValue::Text("x".into()).to_string(), "x");
        assert_eq!(CellRect::new(1, 2, 3, 4).to_string(), "rows 1..3 x columns 3..7");
    }
}
