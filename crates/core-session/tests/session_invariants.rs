//! Random interleavings of resizes, scroll bursts, timer polls and deferred
//! fetch completions driven through `GridSession` must keep the anchor inside
//! the grid and every slot bound to the value at its logical coordinate.

use std::sync::Arc;
use std::time::{Duration, Instant};

use core_config::{FetchMode, Geometry, GridExtent, GridSettings};
use core_data::{CellCoord, DataSource, FetchTicket, FormulaSource};
use core_scroll::ScrollReport;
use core_session::GridSession;
use core_surface::{MemorySurface, Pane, SurfaceSize};
use core_window::PENDING_LABEL;
use proptest::prelude::*;

const GEOMETRY: Geometry = Geometry {
    cell_width: 10,
    cell_height: 20,
    buffer_size: 2,
    recycle_threshold: 1,
};

#[derive(Debug, Clone)]
enum Op {
    Resize(u32, u32),
    Scroll { after_ms: u64, left: u32, top: u32 },
    Poll(u64),
    Complete(usize),
}

fn op() -> impl Strategy<Value = Op> {
    prop_oneof![
        1 => (0u32..300, 0u32..300).prop_map(|(w, h)| Op::Resize(w, h)),
        4 => (0u64..120, 0u32..2_000, 0u32..4_000).prop_map(|(after_ms, left, top)| Op::Scroll { after_ms, left, top }),
        1 => (0u64..200).prop_map(Op::Poll),
        2 => (0usize..8).prop_map(Op::Complete),
    ]
}

type Session = GridSession<MemorySurface, FormulaSource>;

fn expected(cached: Option<String>, deferred: bool) -> Option<String> {
    match cached {
        Some(value) => Some(value),
        None if deferred => Some(PENDING_LABEL.to_owned()),
        None => None,
    }
}

fn check(s: &Session) -> Result<(), TestCaseError> {
    let deferred = s.settings().fetch == FetchMode::Deferred;
    let extent = s.settings().extent;
    let state = s.state();
    let window = s.window();
    let cache = s.cache();

    prop_assert!(state.within_bounds(extent), "anchor out of bounds: {:?}", state);
    prop_assert_eq!(window.body_rows().count(), state.loaded_rows);
    prop_assert_eq!(window.row_headers().count(), state.loaded_rows);
    prop_assert_eq!(window.column_headers().count(), state.loaded_columns);
    prop_assert_eq!(s.surface().attached_count(Pane::Body), state.loaded_rows * state.loaded_columns);
    prop_assert_eq!(s.surface().attached_count(Pane::RowHeader), state.loaded_rows);
    prop_assert_eq!(s.surface().attached_count(Pane::ColumnHeader), state.loaded_columns);

    for (i, row) in window.body_rows().enumerate() {
        prop_assert_eq!(row.len(), state.loaded_columns);
        for (j, slot) in row.iter().enumerate() {
            let coord = CellCoord::new(state.current_row + i, state.current_column + j);
            let want = expected(cache.get(coord).map(|v| v.to_string()), deferred);
            prop_assert_eq!(Some(slot.content().to_owned()), want, "body ({}, {})", coord.row, coord.column);
            prop_assert_eq!(slot.position(), GEOMETRY.pixel_position(coord.row, coord.column));
        }
    }
    for (i, h) in window.row_headers().enumerate() {
        let want = expected(cache.row_label(state.current_row + i).map(str::to_owned), deferred);
        prop_assert_eq!(Some(h.content().to_owned()), want);
    }
    for (j, h) in window.column_headers().enumerate() {
        let want = expected(cache.column_label(state.current_column + j).map(str::to_owned), deferred);
        prop_assert_eq!(Some(h.content().to_owned()), want);
    }
    Ok(())
}

fn complete(s: &mut Session, ticket: FetchTicket) {
    let block = s.source().fetch(ticket.rect);
    s.complete_fetch(ticket.id, block).unwrap();
}

proptest! {
    #[test]
    fn session_invariants_hold_over_random_interleavings(
        rows in 1usize..150,
        columns in 1usize..150,
        deferred in any::<bool>(),
        ops in proptest::collection::vec(op(), 1..40),
    ) {
        let settings = GridSettings {
            extent: GridExtent::new(rows, columns),
            geometry: GEOMETRY,
            fetch: if deferred { FetchMode::Deferred } else { FetchMode::Synchronous },
            ..GridSettings::default()
        };
        let surface = MemorySurface::new(SurfaceSize::new(120.0, 120.0));
        let mut s = GridSession::new(settings, surface, Arc::new(FormulaSource::new())).unwrap();
        let mut pending: Vec<FetchTicket> = s.take_fetch_requests();
        let mut now = Instant::now();
        check(&s)?;

        for op in ops {
            match op {
                Op::Resize(w, h) => {
                    s.surface_mut().set_size(SurfaceSize::new(f64::from(w), f64::from(h)));
                    s.resize().unwrap();
                }
                Op::Scroll { after_ms, left, top } => {
                    now += Duration::from_millis(after_ms);
                    let created = s.surface().slots_created();
                    s.on_scroll(now, ScrollReport::new(f64::from(left), f64::from(top))).unwrap();
                    prop_assert_eq!(s.surface().slots_created(), created);
                }
                Op::Poll(after_ms) => {
                    now += Duration::from_millis(after_ms);
                    s.poll_timers(now).unwrap();
                }
                Op::Complete(pick) => {
                    if !pending.is_empty() {
                        let ticket = pending.remove(pick % pending.len());
                        complete(&mut s, ticket);
                    }
                }
            }
            pending.extend(s.take_fetch_requests());
            check(&s)?;
        }

        // let the trailing settle fire, then finish every outstanding fetch
        s.poll_timers(now + Duration::from_secs(1)).unwrap();
        prop_assert!(s.next_deadline().is_none());
        pending.extend(s.take_fetch_requests());
        while let Some(ticket) = pending.pop() {
            complete(&mut s, ticket);
            pending.extend(s.take_fetch_requests());
        }
        prop_assert!(s.cache().in_flight().is_empty());
        check(&s)?;
        let placeholders = s
            .window()
            .body_rows()
            .flat_map(|row| row.iter())
            .filter(|slot| slot.content() == PENDING_LABEL)
            .count();
        prop_assert_eq!(placeholders, 0);
    }
}
