//! Lazily filled logical data cache.
//!
//! Policy: entries are written once discovered and never evicted. Memory grows
//! with the explored area of the grid, not with its extent, because storage is
//! sparse (keyed by logical coordinate).
//!
//! Coverage comes in two shapes:
//! * [`DataCache::ensure_covered`] fetches inline from a [`DataSource`].
//! * [`DataCache::request`] / [`DataCache::complete`] split the same work into
//!   an issued [`FetchTicket`] and a later completion, for sources that answer
//!   asynchronously. At most one ticket is in flight for any overlapping range;
//!   a request that would overlap returns [`CoverageRequest::Pending`] and must
//!   be repeated once the earlier ticket completes.
//!
//! Only the bounding rectangle of what is actually missing is fetched, so a
//! window shifted by `k` rows costs a `k`-row strip.

use crate::{CellCoord, CellRect, CellValue, DataSource, FetchError, FetchedBlock, GridExtent};
use ahash::AHashMap;
use tracing::{debug, trace, warn};

/// Handle for a fetch issued through [`DataCache::request`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct FetchTicket {
    pub id: u64,
    pub rect: CellRect,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CoverageRequest {
    /// Everything in range is already loaded.
    Covered,
    /// The missing region overlaps a fetch already in flight.
    Pending,
    /// A new fetch must be executed by the caller and handed to `complete`.
    Issued(FetchTicket),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct CacheStats {
    pub fetches: u64,
    pub cells_written: u64,
    pub labels_written: u64,
}

#[derive(Debug)]
pub struct DataCache {
    extent: GridExtent,
    cells: AHashMap<CellCoord, CellValue>,
    row_labels: AHashMap<usize, String>,
    column_labels: AHashMap<usize, String>,
    in_flight: Vec<FetchTicket>,
    next_ticket: u64,
    stats: CacheStats,
}

impl DataCache {
    pub fn new(extent: GridExtent) -> Self {
        Self {
            extent,
            cells: AHashMap::new(),
            row_labels: AHashMap::new(),
            column_labels: AHashMap::new(),
            in_flight: Vec::new(),
            next_ticket: 1,
            stats: CacheStats::default(),
        }
    }

    pub fn extent(&self) -> GridExtent {
        self.extent
    }

    pub fn stats(&self) -> CacheStats {
        self.stats
    }

    pub fn get(&self, coord: CellCoord) -> Option<&CellValue> {
        self.cells.get(&coord)
    }

    pub fn row_label(&self, row: usize) -> Option<&str> {
        self.row_labels.get(&row).map(String::as_str)
    }

    pub fn column_label(&self, column: usize) -> Option<&str> {
        self.column_labels.get(&column).map(String::as_str)
    }

    /// Number of loaded cells (labels excluded).
    pub fn loaded_cells(&self) -> usize {
        self.cells.len()
    }

    pub fn in_flight(&self) -> &[FetchTicket] {
        &self.in_flight
    }

    pub fn is_covered(&self, rect: CellRect) -> bool {
        self.missing_bounds(rect.clamp_to(self.extent)).is_none()
    }

    /// Guarantee every cell and label in `rect` (clamped to the extent) is
    /// loaded, fetching the missing region inline. Returns the fetched rectangle
    /// or `None` when nothing was missing.
    pub fn ensure_covered<S>(&mut self, rect: CellRect, source: &S) -> Result<Option<CellRect>, FetchError>
    where
        S: DataSource + ?Sized,
    {
        let rect = rect.clamp_to(self.extent);
        let Some(missing) = self.missing_bounds(rect) else {
            trace!(target: "data.cache", %rect, "coverage_hit");
            return Ok(None);
        };
        debug!(target: "data.cache", %rect, %missing, "coverage_fetch");
        let block = source.fetch(missing)?;
        self.store(block)?;
        Ok(Some(missing))
    }

    /// Register a fetch for whatever is missing in `rect` without performing it.
    pub fn request(&mut self, rect: CellRect) -> CoverageRequest {
        let rect = rect.clamp_to(self.extent);
        let Some(missing) = self.missing_bounds(rect) else {
            return CoverageRequest::Covered;
        };
        if let Some(busy) = self.in_flight.iter().find(|t| t.rect.overlaps(&missing)) {
            trace!(target: "data.cache", %missing, ticket = busy.id, "coverage_pending");
            return CoverageRequest::Pending;
        }
        let ticket = FetchTicket {
            id: self.next_ticket,
            rect: missing,
        };
        self.next_ticket += 1;
        self.in_flight.push(ticket);
        debug!(target: "data.cache", ticket = ticket.id, rect = %missing, "coverage_issued");
        CoverageRequest::Issued(ticket)
    }

    /// Finish a ticket issued by [`request`](Self::request). The in-flight entry
    /// is released whether or not the fetch succeeded. A block that arrives after
    /// the window moved elsewhere is still stored: coordinates are absolute.
    pub fn complete(&mut self, ticket_id: u64, result: Result<FetchedBlock, FetchError>) -> Result<CellRect, FetchError> {
        let Some(pos) = self.in_flight.iter().position(|t| t.id == ticket_id) else {
            return Err(FetchError::UnknownTicket(ticket_id));
        };
        let ticket = self.in_flight.remove(pos);
        match result {
            Ok(block) => {
                if block.rect != ticket.rect {
                    warn!(
                        target: "data.cache",
                        ticket = ticket_id,
                        requested = %ticket.rect,
                        returned = %block.rect,
                        "fetch_rect_mismatch"
                    );
                }
                let rect = block.rect;
                self.store(block)?;
                Ok(rect)
            }
            Err(e) => {
                warn!(target: "data.cache", ticket = ticket_id, error = %e, "fetch_failed");
                Err(e)
            }
        }
    }

    /// Validate and write a fetched block. Overwrites are allowed; the cache is
    /// keyed by logical coordinate so a re-fetch yields the same contents.
    pub fn store(&mut self, block: FetchedBlock) -> Result<(), FetchError> {
        let rect = block.rect;
        if !rect.fits(self.extent) {
            return Err(FetchError::OutsideExtent {
                rect,
                total_rows: self.extent.total_rows,
                total_columns: self.extent.total_columns,
            });
        }
        check_len(rect, "values", block.values.len(), rect.cell_count())?;
        check_len(rect, "row labels", block.row_labels.len(), rect.row_count)?;
        check_len(rect, "column labels", block.column_labels.len(), rect.column_count)?;

        let columns = rect.column_count;
        for (idx, value) in block.values.into_iter().enumerate() {
            let coord = CellCoord::new(rect.row_from + idx / columns, rect.column_from + idx % columns);
            self.cells.insert(coord, value);
        }
        for (row, label) in rect.rows().zip(block.row_labels) {
            self.row_labels.insert(row, label);
        }
        for (column, label) in rect.columns().zip(block.column_labels) {
            self.column_labels.insert(column, label);
        }
        self.stats.fetches += 1;
        self.stats.cells_written += rect.cell_count() as u64;
        self.stats.labels_written += (rect.row_count + rect.column_count) as u64;
        Ok(())
    }

    /// Bounding rectangle of every unloaded cell and label inside `rect`.
    fn missing_bounds(&self, rect: CellRect) -> Option<CellRect> {
        let mut rows = Span::default();
        let mut columns = Span::default();
        for row in rect.rows() {
            if !self.row_labels.contains_key(&row) {
                rows.include(row);
            }
        }
        for column in rect.columns() {
            if !self.column_labels.contains_key(&column) {
                columns.include(column);
            }
        }
        for row in rect.rows() {
            for column in rect.columns() {
                if !self.cells.contains_key(&CellCoord::new(row, column)) {
                    rows.include(row);
                    columns.include(column);
                }
            }
        }
        if rows.is_empty() && columns.is_empty() {
            return None;
        }
        let (row_from, row_count) = rows.or_empty_at(rect.row_from);
        let (column_from, column_count) = columns.or_empty_at(rect.column_from);
        Some(CellRect::new(row_from, row_count, column_from, column_count))
    }
}

fn check_len(rect: CellRect, what: &'static str, got: usize, expected: usize) -> Result<(), FetchError> {
    if got == expected {
        Ok(())
    } else {
        Err(FetchError::Shape {
            rect,
            what,
            got,
            expected,
        })
    }
}

/// Inclusive min/max accumulator for one axis.
#[derive(Debug, Default, Clone, Copy)]
struct Span {
    bounds: Option<(usize, usize)>,
}

impl Span {
    fn include(&mut self, i: usize) {
        self.bounds = Some(match self.bounds {
            None => (i, i),
            Some((lo, hi)) => (lo.min(i), hi.max(i)),
        });
    }

    fn is_empty(&self) -> bool {
        self.bounds.is_none()
    }

    fn or_empty_at(&self, start: usize) -> (usize, usize) {
        match self.bounds {
            Some((lo, hi)) => (lo, hi - lo + 1),
            None => (start, 0),
        }
    }
}
