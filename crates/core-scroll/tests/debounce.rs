use std::time::{Duration, Instant};

use core_config::{Geometry, GridExtent, ScrollTiming};
use core_scroll::{RecycleCause, ScrollAction, ScrollEngine, ScrollReport, destination_index};
use core_window::{Anchor, WindowState};
use proptest::prelude::*;

const GEOMETRY: Geometry = Geometry {
    cell_width: 60,
    cell_height: 60,
    buffer_size: 20,
    recycle_threshold: 10,
};

/// Drives the engine the way the runtime does: due timers fire at their own
/// deadline before the next report is handled.
struct Driver {
    engine: ScrollEngine,
    state: WindowState,
    log: Vec<(Instant, ScrollAction)>,
}

impl Driver {
    fn new() -> Self {
        Self {
            engine: ScrollEngine::new(GEOMETRY, GridExtent::new(1000, 1000), ScrollTiming::default()),
            state: WindowState {
                current_row: 0,
                current_column: 0,
                loaded_rows: 50,
                loaded_columns: 50,
            },
            log: Vec::new(),
        }
    }

    fn apply(&mut self, at: Instant, action: ScrollAction) {
        self.state.current_row = action.destination.row;
        self.state.current_column = action.destination.column;
        self.log.push((at, action));
    }

    fn advance_to(&mut self, now: Instant) {
        while let Some(deadline) = self.engine.next_deadline().filter(|d| *d <= now) {
            if let Some(action) = self.engine.poll(deadline, &self.state) {
                self.apply(deadline, action);
            }
        }
    }

    fn report(&mut self, now: Instant, report: ScrollReport) {
        self.advance_to(now);
        if let Some(action) = self.engine.on_scroll(now, report, &self.state) {
            self.apply(now, action);
        }
    }

    fn drain(&mut self) {
        while let Some(deadline) = self.engine.next_deadline() {
            self.advance_to(deadline);
        }
    }

    fn count(&self, cause: RecycleCause) -> usize {
        self.log.iter().filter(|(_, a)| a.cause == cause).count()
    }
}

#[test]
fn rapid_burst_yields_one_immediate_and_one_settle() {
    let t0 = Instant::now();
    let mut d = Driver::new();
    for i in 0..10u64 {
        let top = 3000.0 + 600.0 * i as f64;
        d.report(t0 + Duration::from_millis(10 * i), ScrollReport::new(0.0, top));
    }
    d.drain();

    assert_eq!(d.count(RecycleCause::Immediate), 1);
    assert_eq!(d.count(RecycleCause::Settle), 1);
    let (at, settle) = d.log[1];
    assert_eq!(at, t0 + Duration::from_millis(140));
    // final report: top = 8400 -> 140 - 10
    assert_eq!(settle.destination, Anchor::new(130, 0));
    assert_eq!(d.state.current_row, 130);

    let m = d.engine.metrics_snapshot();
    assert_eq!(m.scroll_reports, 10);
    assert_eq!(m.immediate_recycles, 1);
    assert_eq!(m.settle_recycles, 1);
    assert_eq!(m.suppressed, 9);
}

#[test]
fn backward_scroll_after_settle_recycles() {
    let t0 = Instant::now();
    let mut d = Driver::new();
    d.report(t0, ScrollReport::new(0.0, 30_000.0));
    d.drain();
    assert_eq!(d.state.current_row, 490);
    d.report(t0 + Duration::from_secs(1), ScrollReport::new(0.0, 0.0));
    assert_eq!(d.state.current_row, 0);
}

proptest! {
    #[test]
    fn debounce_policy_holds_for_random_bursts(
        steps in proptest::collection::vec((0u64..120, 0u32..80_000, 0u32..80_000), 1..40),
    ) {
        let t0 = Instant::now();
        let mut d = Driver::new();
        let mut now = t0;
        let mut last = ScrollReport::default();
        for (gap, left, top) in steps {
            now += Duration::from_millis(gap);
            last = ScrollReport::new(f64::from(left), f64::from(top));
            d.report(now, last);
        }
        d.drain();

        // the window ends at the destination of the final position
        let row = destination_index(last.top, 60, 10, 1000, 50);
        let column = destination_index(last.left, 60, 10, 1000, 50);
        prop_assert_eq!((d.state.current_row, d.state.current_column), (row, column));

        // immediate recycles never fall inside an open burst window
        let burst = ScrollTiming::default().burst_window;
        let mut window_end: Option<Instant> = None;
        for (at, action) in &d.log {
            if action.cause == RecycleCause::Immediate
                && let Some(end) = window_end
            {
                prop_assert!(*at >= end);
            }
            window_end = Some(*at + burst);
        }

        let m = d.engine.metrics_snapshot();
        prop_assert_eq!(m.qualifying, m.immediate_recycles + m.suppressed);
        prop_assert!(m.settle_recycles <= m.qualifying);
        if m.qualifying > 0 {
            prop_assert!(m.settle_recycles >= 1);
            prop_assert_eq!(d.log.last().map(|(_, a)| a.cause), Some(RecycleCause::Settle));
        }
    }
}
