use price_chart_core::domain::chart::{MIN_TIME_SPAN_MS, TimeRange, TimeframeSelection, ViewportManager};
use price_chart_core::domain::market_data::{DAY_MS, OHLCV, Price, PriceBar, Timestamp, Volume};
use quickcheck::TestResult;
use quickcheck_macros::quickcheck;

const T0: i64 = 1_600_000_000_000;
const WIDTH: f64 = 800.0;

fn make_bar(i: i64) -> PriceBar {
    PriceBar::new(
        Timestamp::from_millis(T0 + i * DAY_MS),
        OHLCV::new(
            Price::from(10.0),
            Price::from(11.0),
            Price::from(9.0),
            Price::from(10.5),
            Volume::from(1.0),
        ),
    )
}

fn loaded() -> ViewportManager {
    let mut vm = ViewportManager::default();
    vm.set_data((0..200).map(make_bar).collect());
    vm
}

#[test]
fn zoom_keeps_anchor_time_under_cursor() {
    let mut vm = loaded();
    let anchor_x = 200.0;
    let before_time = vm.pixel_to_time(anchor_x);
    let before_span = vm.state().visible.span();

    assert!(vm.zoom_at(anchor_x, 2.0));

    let state = vm.state();
    assert!((vm.pixel_to_time(anchor_x) - before_time).abs() < 1.0);
    assert!((state.visible.span() - before_span / 2.0).abs() < 1.0);
    assert!((state.zoom_level - 2.0).abs() < 1e-9);
    assert_eq!(state.timeframe, TimeframeSelection::Custom);
}

#[test]
fn zoom_out_then_in_restores_window() {
    let mut vm = loaded();
    vm.zoom_at(400.0, 4.0);
    let zoomed = vm.state().visible;

    vm.zoom_at(600.0, 0.5);
    vm.zoom_at(600.0, 2.0);

    let restored = vm.state().visible;
    assert!((restored.start - zoomed.start).abs() < 1.0);
    assert!((restored.end - zoomed.end).abs() < 1.0);
}

#[test]
fn negligible_zoom_is_ignored() {
    let mut vm = loaded();
    let before = vm.state();
    assert!(!vm.zoom_at(400.0, 1.0 + 1e-12));
    assert!(!vm.zoom_at(400.0, 0.0));
    assert!(!vm.zoom_at(400.0, f64::NAN));
    assert_eq!(vm.state(), before);
}

#[test]
fn zoom_stops_at_minimum_span() {
    let mut vm = loaded();
    assert!(vm.zoom_at(WIDTH, 1e12));
    assert!((vm.state().visible.span() - MIN_TIME_SPAN_MS as f64).abs() < 1e-3);
    // already at the floor
    assert!(!vm.zoom_at(WIDTH, 2.0));
}

#[test]
fn anchor_outside_surface_is_clamped() {
    let mut vm = loaded();
    let right_edge = vm.state().visible.end;
    vm.zoom_at(5_000.0, 2.0);
    assert!((vm.state().visible.end - right_edge).abs() < 1.0);
}

#[quickcheck]
fn zoom_preserves_anchor(anchor: f64, factor: f64) -> TestResult {
    if !anchor.is_finite() || !factor.is_finite() {
        return TestResult::discard();
    }
    // zooming in from the full view never reaches the data edges
    let anchor_x = anchor.abs() % WIDTH;
    let factor = 1.0 + factor.abs() % 3.0;

    let mut vm = loaded();
    let before = vm.pixel_to_time(anchor_x);
    vm.zoom_at(anchor_x, factor);
    let after = vm.pixel_to_time(anchor_x);
    TestResult::from_bool((after - before).abs() < 1.0)
}

fn data_bounds() -> (f64, f64) {
    (T0 as f64, (T0 + 199 * DAY_MS) as f64)
}

fn inside(visible: TimeRange) -> bool {
    let (lo, hi) = data_bounds();
    visible.start >= lo - 1e-3 && visible.end <= hi + 1e-3
}

#[test]
fn zoom_out_near_edge_stays_inside_data() {
    let mut vm = loaded();
    assert!(vm.zoom_at(400.0, 4.0));
    assert!(vm.zoom_at(0.0, 0.5));
    assert!(vm.zoom_at(400.0, 0.25));

    let visible = vm.state().visible;
    let (lo, hi) = data_bounds();
    assert!(inside(visible), "{visible:?}");
    assert_eq!((visible.start, visible.end), (lo, hi));
    assert_eq!(vm.visible_data().len(), 200);
    // already showing everything
    assert!(!vm.zoom_at(400.0, 0.5));
}

#[test]
fn range_left_of_data_is_moved_inside() {
    let mut vm = loaded();
    let end = (T0 - 5_000 * DAY_MS) as f64;
    vm.set_visible_time_range(end - 10.0 * DAY_MS as f64, end).unwrap();

    let visible = vm.state().visible;
    assert_eq!(visible.start, T0 as f64);
    assert!((visible.span() - 10.0 * DAY_MS as f64).abs() < 1e-6);
    assert!(!vm.visible_data().is_empty());
}

#[quickcheck]
fn zoom_and_range_stay_inside_data(steps: Vec<(f64, f64, bool)>) -> TestResult {
    if steps.iter().any(|(a, b, _)| !a.is_finite() || !b.is_finite()) {
        return TestResult::discard();
    }
    let (lo, _) = data_bounds();
    let mut vm = loaded();
    for (a, b, zoom) in steps {
        if zoom {
            vm.zoom_at(a.abs() % (2.0 * WIDTH), 0.1 + b.abs() % 10.0);
        } else {
            let start = lo + (a % 1_000.0) * DAY_MS as f64;
            let span = (b.abs() % 400.0) * DAY_MS as f64 + 1.0;
            let _ = vm.set_visible_time_range(start, start + span);
        }
        if !inside(vm.state().visible) {
            return TestResult::failed();
        }
    }
    TestResult::passed()
}
