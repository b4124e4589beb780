//! Random resize/recycle sequences must keep every slot bound to the cache
//! value at its logical coordinate, keep the anchor inside the grid and never
//! change the slot count on recycle.

use core_config::Geometry;
use core_data::{CellCoord, CellRect, DataCache, FormulaSource, GridExtent};
use core_surface::{MemorySlot, MemorySurface, Pane};
use core_window::{Anchor, Binder, LoadedExtent, MissingPolicy, Window};
use proptest::prelude::*;

#[derive(Debug, Clone)]
enum Op {
    Resize(usize, usize),
    Recycle(usize, usize),
}

fn op() -> impl Strategy<Value = Op> {
    prop_oneof![
        (0usize..40, 0usize..40).prop_map(|(r, c)| Op::Resize(r, c)),
        (0usize..200, 0usize..200).prop_map(|(r, c)| Op::Recycle(r, c)),
    ]
}

const GEOMETRY: Geometry = Geometry {
    cell_width: 10,
    cell_height: 20,
    buffer_size: 2,
    recycle_threshold: 1,
};

fn check(window: &Window<MemorySlot>, cache: &DataCache, surface: &MemorySurface) -> Result<(), TestCaseError> {
    let state = window.state();
    prop_assert!(state.within_bounds(cache.extent()));
    prop_assert_eq!(window.body_rows().count(), state.loaded_rows);
    prop_assert_eq!(window.row_headers().count(), state.loaded_rows);
    prop_assert_eq!(window.column_headers().count(), state.loaded_columns);
    prop_assert_eq!(surface.attached_count(Pane::Body), state.loaded_rows * state.loaded_columns);
    for (i, row) in window.body_rows().enumerate() {
        prop_assert_eq!(row.len(), state.loaded_columns);
        for (j, slot) in row.iter().enumerate() {
            let coord = CellCoord::new(state.current_row + i, state.current_column + j);
            let expected = cache.get(coord).map(|v| v.to_string());
            prop_assert_eq!(Some(slot.content().to_owned()), expected);
            prop_assert_eq!(slot.position(), GEOMETRY.pixel_position(coord.row, coord.column));
        }
    }
    for (i, h) in window.row_headers().enumerate() {
        prop_assert_eq!(Some(h.content()), cache.row_label(state.current_row + i));
    }
    for (j, h) in window.column_headers().enumerate() {
        prop_assert_eq!(Some(h.content()), cache.column_label(state.current_column + j));
    }
    Ok(())
}

proptest! {
    #[test]
    fn window_invariant_holds_over_random_sequences(
        rows in 1usize..120,
        columns in 1usize..120,
        ops in proptest::collection::vec(op(), 1..25),
    ) {
        let extent = GridExtent::new(rows, columns);
        let source = FormulaSource::new();
        let mut cache = DataCache::new(extent);
        let mut surface = MemorySurface::default();
        let mut window: Window<MemorySlot> = Window::new();

        for op in ops {
            match op {
                Op::Resize(r, c) => {
                    let target = LoadedExtent::new(r.min(rows), c.min(columns));
                    let next = window.state().resized(target, extent);
                    cache.ensure_covered(next.rect(), &source).unwrap();
                    let binder = Binder::new(&cache, GEOMETRY, MissingPolicy::Fail);
                    window.resize(target, &mut surface, &binder).unwrap();
                    prop_assert_eq!(window.state().loaded(), target);
                }
                Op::Recycle(r, c) => {
                    let state = window.state();
                    let to = state.clamp_anchor(Anchor::new(r, c), extent);
                    cache
                        .ensure_covered(CellRect::new(to.row, state.loaded_rows, to.column, state.loaded_columns), &source)
                        .unwrap();
                    let before = window.slot_count();
                    let created = surface.slots_created();
                    let binder = Binder::new(&cache, GEOMETRY, MissingPolicy::Fail);
                    window.recycle(Anchor::new(r, c), &binder).unwrap();
                    prop_assert_eq!(window.slot_count(), before);
                    prop_assert_eq!(surface.slots_created(), created);
                    prop_assert_eq!(window.state().anchor(), to);
                }
            }
            check(&window, &cache, &surface)?;
        }
    }
}

#[test]
fn forward_recycle_moves_forty_rows_to_the_tail() {
    let geometry = Geometry {
        cell_width: 60,
        cell_height: 60,
        buffer_size: 20,
        recycle_threshold: 10,
    };
    let extent = GridExtent::new(1000, 1000);
    let source = FormulaSource::new();
    let mut cache = DataCache::new(extent);
    let mut surface = MemorySurface::default();
    let mut window: Window<MemorySlot> = Window::new();
    let target = LoadedExtent::new(50, 50);
    cache.ensure_covered(CellRect::new(0, 50, 0, 50), &source).unwrap();
    window
        .resize(target, &mut surface, &Binder::new(&cache, geometry, MissingPolicy::Fail))
        .unwrap();

    cache.ensure_covered(CellRect::new(40, 50, 0, 50), &source).unwrap();
    let outcome = window
        .recycle(Anchor::new(40, 0), &Binder::new(&cache, geometry, MissingPolicy::Fail))
        .unwrap();
    assert_eq!(outcome.rows_moved, 40);
    let tail: Vec<_> = window.row_headers().skip(10).map(|h| h.content().to_owned()).collect();
    let expected: Vec<_> = (50..90).map(|r: usize| r.to_string()).collect();
    assert_eq!(tail, expected);
    assert_eq!(window.body_slot(0, 1).unwrap().content(), "40");
}
