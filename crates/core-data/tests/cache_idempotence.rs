//! Property tests for cache coverage: covering twice equals covering once, and
//! every covered coordinate holds the source's value.

use core_data::{CellCoord, CellRect, DataCache, DataSource, FormulaSource, GridExtent};
use proptest::prelude::*;

fn snapshot(cache: &DataCache, rect: CellRect) -> Vec<Option<String>> {
    let mut out = Vec::new();
    for row in rect.rows() {
        out.push(cache.row_label(row).map(str::to_owned));
        for column in rect.columns() {
            out.push(cache.get(CellCoord::new(row, column)).map(|v| v.to_string()));
        }
    }
    out
}

proptest! {
    #[test]
    fn ensure_covered_twice_equals_once(
        row_from in 0usize..300,
        row_count in 0usize..60,
        column_from in 0usize..300,
        column_count in 0usize..60,
    ) {
        let extent = GridExtent::new(256, 256);
        let src = FormulaSource::new();
        let rect = CellRect::new(row_from, row_count, column_from, column_count);

        let mut once = DataCache::new(extent);
        once.ensure_covered(rect, &src).unwrap();
        let mut twice = DataCache::new(extent);
        twice.ensure_covered(rect, &src).unwrap();
        let second = twice.ensure_covered(rect, &src).unwrap();

        prop_assert!(second.is_none());
        let clamped = rect.clamp_to(extent);
        prop_assert_eq!(snapshot(&once, clamped), snapshot(&twice, clamped));
        prop_assert_eq!(once.loaded_cells(), twice.loaded_cells());
    }

    #[test]
    fn overlapping_covers_match_source(
        a in (0usize..100, 1usize..30, 0usize..100, 1usize..30),
        b in (0usize..100, 1usize..30, 0usize..100, 1usize..30),
    ) {
        let extent = GridExtent::new(120, 120);
        let src = FormulaSource::new();
        let mut cache = DataCache::new(extent);
        let ra = CellRect::new(a.0, a.1, a.2, a.3);
        let rb = CellRect::new(b.0, b.1, b.2, b.3);
        cache.ensure_covered(ra, &src).unwrap();
        cache.ensure_covered(rb, &src).unwrap();
        for rect in [ra.clamp_to(extent), rb.clamp_to(extent)] {
            prop_assert!(cache.is_covered(rect));
            for row in rect.rows() {
                for column in rect.columns() {
                    let coord = CellCoord::new(row, column);
                    prop_assert_eq!(cache.get(coord), Some(&src.value_at(coord)));
                }
            }
        }
        let fetched = src.fetch(ra.clamp_to(extent)).unwrap();
        prop_assert_eq!(fetched.values.len(), ra.clamp_to(extent).cell_count());
    }
}
