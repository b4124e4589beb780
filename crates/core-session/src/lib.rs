//! One grid instance: surface, data, window and scroll engine wired together.
//!
//! A [`GridSession`] is the only owner of its [`DataCache`], its slot matrices
//! and its debounce timers, so several grids can live side by side. All
//! mutation happens through `&mut self` on the caller's control thread:
//! [`resize`](GridSession::resize), [`on_scroll`](GridSession::on_scroll),
//! [`poll_timers`](GridSession::poll_timers) and
//! [`complete_fetch`](GridSession::complete_fetch).
//!
//! Coverage before binding
//! -----------------------
//! * Synchronous mode fetches the missing part of a target rectangle inline
//!   before any slot is bound to it. A slot bound to an unloaded coordinate is
//!   an invariant violation and surfaces as [`SessionError::Window`].
//! * Deferred mode registers a fetch ticket instead (see
//!   [`take_fetch_requests`](GridSession::take_fetch_requests)) and binds a
//!   placeholder. When the ticket completes, every slot whose *current*
//!   coordinate lies in the fetched rectangle is rebound, and the current
//!   window is requested again so anything still missing gets its own ticket.
//!
//! Invariants (must hold after every public call that returns `Ok`):
//! * `0 <= current_row <= total_rows - loaded_rows` (same for columns).
//! * Body slot `(i, j)` is positioned at logical `(current_row + i,
//!   current_column + j)` and, unless a deferred fetch is outstanding for it,
//!   shows the cached value there.
//! * Recycling never changes the slot count.

use std::sync::Arc;
use std::time::Instant;

use core_config::{FetchMode, GridSettings};
use core_data::{CacheStats, CellRect, CoverageRequest, DataCache, DataSource, FetchError, FetchTicket, FetchedBlock};
use core_scroll::{ScrollAction, ScrollEngine, ScrollMetricsSnapshot, ScrollReport};
use core_surface::{Pane, RenderSurface};
use core_window::{Anchor, Binder, LoadedExtent, MissingPolicy, RecycleOutcome, ResizeOutcome, Window, WindowError, WindowState};
use thiserror::Error;
use tracing::{debug, info, warn};

#[derive(Debug, Error)]
pub enum SessionError {
    #[error(transparent)]
    Window(#[from] WindowError),
    #[error(transparent)]
    Fetch(#[from] FetchError),
}

pub struct GridSession<R: RenderSurface, D: DataSource> {
    settings: GridSettings,
    surface: R,
    source: Arc<D>,
    cache: DataCache,
    window: Window<R::Slot>,
    scroll: ScrollEngine,
    /// Tickets issued in deferred mode and not yet handed to the runtime.
    issued: Vec<FetchTicket>,
}

impl<R: RenderSurface, D: DataSource> GridSession<R, D> {
    /// Build a session and run the initial resize against the surface's
    /// current size.
    pub fn new(settings: GridSettings, surface: R, source: Arc<D>) -> Result<Self, SessionError> {
        let mut session = Self {
            settings,
            surface,
            source,
            cache: DataCache::new(settings.extent),
            window: Window::new(),
            scroll: ScrollEngine::new(settings.geometry, settings.extent, settings.timing),
            issued: Vec::new(),
        };
        session.size_content();
        let outcome = session.resize()?;
        info!(
            target: "session",
            total_rows = settings.extent.total_rows,
            total_columns = settings.extent.total_columns,
            loaded_rows = session.window.state().loaded_rows,
            loaded_columns = session.window.state().loaded_columns,
            fetch = ?settings.fetch,
            rows_added = outcome.rows_added,
            "session_started"
        );
        Ok(session)
    }

    /// Size the scrollable panes to the full logical grid and reset the header
    /// scroll positions.
    fn size_content(&mut self) {
        let g = self.settings.geometry;
        let (width, height) = g.pixel_position(self.settings.extent.total_rows, self.settings.extent.total_columns);
        self.surface.set_content_extent(Pane::Body, width, height);
        self.surface
            .set_content_extent(Pane::ColumnHeader, width, u64::from(g.cell_height));
        self.surface
            .set_content_extent(Pane::RowHeader, u64::from(g.cell_width), height);
        self.surface.mirror_header_scroll(Pane::ColumnHeader, 0.0);
        self.surface.mirror_header_scroll(Pane::RowHeader, 0.0);
    }

    fn missing_policy(&self) -> MissingPolicy {
        match self.settings.fetch {
            FetchMode::Synchronous => MissingPolicy::Fail,
            FetchMode::Deferred => MissingPolicy::Placeholder,
        }
    }

    fn cover(&mut self, rect: CellRect) -> Result<(), SessionError> {
        match self.settings.fetch {
            FetchMode::Synchronous => {
                self.cache.ensure_covered(rect, self.source.as_ref())?;
            }
            FetchMode::Deferred => {
                if let CoverageRequest::Issued(ticket) = self.cache.request(rect) {
                    self.issued.push(ticket);
                }
            }
        }
        Ok(())
    }

    /// Re-measure the surface and grow or shrink the window to match.
    pub fn resize(&mut self) -> Result<ResizeOutcome, SessionError> {
        let extent = self.settings.extent;
        let size = self.surface.measure();
        let target = LoadedExtent::for_surface(size, self.settings.geometry, extent);
        let next = self.window.state().resized(target, extent);
        self.cover(next.rect())?;

        let policy = self.missing_policy();
        let binder = Binder::new(&self.cache, self.settings.geometry, policy);
        let outcome = self.window.resize(target, &mut self.surface, &binder)?;
        if !outcome.is_noop() {
            info!(
                target: "session",
                width = size.width,
                height = size.height,
                loaded_rows = target.rows,
                loaded_columns = target.columns,
                reanchored = outcome.reanchored,
                "session_resized"
            );
        }
        Ok(outcome)
    }

    /// Handle a viewport scroll report: mirror the offsets onto the headers,
    /// then let the scroll engine decide whether to recycle now.
    pub fn on_scroll(&mut self, now: Instant, report: ScrollReport) -> Result<Option<RecycleOutcome>, SessionError> {
        self.surface.mirror_header_scroll(Pane::ColumnHeader, report.left);
        self.surface.mirror_header_scroll(Pane::RowHeader, report.top);
        // Timers that fell due before this report fire first.
        let mut outcome = self.poll_timers(now)?;
        let state = self.window.state();
        if let Some(action) = self.scroll.on_scroll(now, report, &state) {
            outcome = Some(self.apply(action)?);
        }
        Ok(outcome)
    }

    /// Fire due debounce timers. Returns the settle recycle if one ran.
    pub fn poll_timers(&mut self, now: Instant) -> Result<Option<RecycleOutcome>, SessionError> {
        let state = self.window.state();
        match self.scroll.poll(now, &state) {
            Some(action) => self.apply(action).map(Some),
            None => Ok(None),
        }
    }

    pub fn next_deadline(&self) -> Option<Instant> {
        self.scroll.next_deadline()
    }

    fn apply(&mut self, action: ScrollAction) -> Result<RecycleOutcome, SessionError> {
        debug!(
            target: "session",
            cause = ?action.cause,
            row = action.destination.row,
            column = action.destination.column,
            "session_recycle"
        );
        self.recycle_to(action.destination)
    }

    /// Cover the destination window and recycle to it. Out-of-range
    /// destinations are clamped; the current anchor is a no-op.
    pub fn recycle_to(&mut self, destination: Anchor) -> Result<RecycleOutcome, SessionError> {
        let state = self.window.state();
        let destination = state.clamp_anchor(destination, self.settings.extent);
        if destination == state.anchor() {
            return Ok(RecycleOutcome::default());
        }
        self.cover(CellRect::new(
            destination.row,
            state.loaded_rows,
            destination.column,
            state.loaded_columns,
        ))?;
        let policy = self.missing_policy();
        let binder = Binder::new(&self.cache, self.settings.geometry, policy);
        Ok(self.window.recycle(destination, &binder)?)
    }

    /// Drain fetch tickets issued since the last call (deferred mode only).
    pub fn take_fetch_requests(&mut self) -> Vec<FetchTicket> {
        std::mem::take(&mut self.issued)
    }

    /// Shared handle to the data source, for running deferred fetches off the
    /// control thread.
    pub fn source(&self) -> Arc<D> {
        Arc::clone(&self.source)
    }

    /// Store the result of a deferred fetch and rebind the slots that currently
    /// show coordinates inside it. Returns the number of slots rebound.
    ///
    /// The ticket is released even when the fetch failed; the failure is
    /// returned and the region is requested again on the next coverage check.
    pub fn complete_fetch(&mut self, ticket: u64, result: Result<FetchedBlock, FetchError>) -> Result<usize, SessionError> {
        let rect = match self.cache.complete(ticket, result) {
            Ok(rect) => rect,
            Err(e) => {
                warn!(target: "session", ticket, error = %e, "fetch_completion_failed");
                return Err(e.into());
            }
        };
        let policy = self.missing_policy();
        let binder = Binder::new(&self.cache, self.settings.geometry, policy);
        let rebound = self.window.rebind_region(rect, &binder)?;
        debug!(target: "session", ticket, %rect, rebound, "fetch_applied");
        // The window may have moved while the fetch was in flight.
        let current = self.window.state().rect();
        self.cover(current)?;
        Ok(rebound)
    }

    /// Cancel timers, detach every slot and hand the surface back.
    pub fn teardown(mut self) -> R {
        self.scroll.cancel_all();
        let detached = self.window.teardown(&mut self.surface);
        let stats = self.cache.stats();
        info!(
            target: "session",
            detached,
            fetches = stats.fetches,
            cells_written = stats.cells_written,
            "session_teardown"
        );
        self.surface
    }

    pub fn settings(&self) -> &GridSettings {
        &self.settings
    }

    pub fn state(&self) -> WindowState {
        self.window.state()
    }

    pub fn window(&self) -> &Window<R::Slot> {
        &self.window
    }

    pub fn cache(&self) -> &DataCache {
        &self.cache
    }

    pub fn cache_stats(&self) -> CacheStats {
        self.cache.stats()
    }

    pub fn surface(&self) -> &R {
        &self.surface
    }

    pub fn surface_mut(&mut self) -> &mut R {
        &mut self.surface
    }

    pub fn scroll_metrics(&self) -> ScrollMetricsSnapshot {
        self.scroll.metrics_snapshot()
    }
}
