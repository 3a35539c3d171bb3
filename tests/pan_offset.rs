use futures::FutureExt;
use price_chart_core::domain::chart::{PanDelta, ViewportManager};
use price_chart_core::domain::market_data::{
    DAY_MS, DataLoader, LoadFuture, OHLCV, Price, PriceBar, Timestamp, Volume,
};
use std::rc::Rc;

const T0: i64 = 1_600_000_000_000;

fn make_bar(i: i64) -> PriceBar {
    PriceBar::new(
        Timestamp::from_millis(T0 + i * DAY_MS),
        OHLCV::new(
            Price::from(50.0),
            Price::from(51.0),
            Price::from(49.0),
            Price::from(50.0),
            Volume::from(1.0),
        ),
    )
}

/// Never has anything more to give.
struct EmptyLoader;

impl DataLoader for EmptyLoader {
    fn load_more_left(&self, _edge: Timestamp, _count: usize) -> LoadFuture {
        futures::future::ready(Ok(Vec::new())).boxed_local()
    }

    fn load_more_right(&self, _edge: Timestamp, _count: usize) -> LoadFuture {
        futures::future::ready(Ok(Vec::new())).boxed_local()
    }
}

fn zoomed_in() -> ViewportManager {
    let mut vm = ViewportManager::default();
    vm.set_data((0..100).map(make_bar).collect());
    vm.zoom_at(400.0, 4.0);
    vm
}

#[test]
fn drag_right_moves_to_earlier_time() {
    let mut vm = zoomed_in();
    let before = vm.state().visible;
    let ms_per_px = before.span() / 800.0;

    assert!(vm.pan(PanDelta::Pixels(100.0)));

    let after = vm.state().visible;
    assert!((after.start - (before.start - 100.0 * ms_per_px)).abs() < 1e-3);
    assert!((after.span() - before.span()).abs() < 1e-3);
}

#[test]
fn time_delta_shifts_both_edges() {
    let mut vm = zoomed_in();
    let before = vm.state().visible;
    assert!(vm.pan(PanDelta::Time(DAY_MS as f64)));
    let after = vm.state().visible;
    assert_eq!(after.start, before.start + DAY_MS as f64);
    assert_eq!(after.end, before.end + DAY_MS as f64);
}

#[test]
fn pan_there_and_back_restores_window() {
    let mut vm = zoomed_in();
    let before = vm.state().visible;

    assert!(vm.pan(PanDelta::Pixels(50.0)));
    assert!(vm.pan(PanDelta::Pixels(-50.0)));
    let after = vm.state().visible;
    assert!((after.start - before.start).abs() < 1e-3);
    assert!((after.end - before.end).abs() < 1e-3);

    let d = 3.5 * DAY_MS as f64;
    assert!(vm.pan(PanDelta::Time(-d)));
    assert!(vm.pan(PanDelta::Time(d)));
    let after = vm.state().visible;
    assert!((after.start - before.start).abs() < 1e-3);
    assert!((after.end - before.end).abs() < 1e-3);
}

#[test]
fn pan_without_loader_stays_inside_data() {
    let mut vm = ViewportManager::default();
    vm.set_data((0..100).map(make_bar).collect());
    let before = vm.state().visible;

    // full view: both directions leave the data
    assert!(!vm.pan(PanDelta::Pixels(50.0)));
    assert!(!vm.pan(PanDelta::Pixels(-50.0)));
    assert!(!vm.pan(PanDelta::Pixels(0.0)));
    assert_eq!(vm.state().visible, before);
}

#[test]
fn pan_with_loader_may_leave_data() {
    let mut vm = ViewportManager::default().with_loader(Rc::new(EmptyLoader));
    vm.set_data((0..100).map(make_bar).collect());
    let before = vm.state().visible;

    assert!(vm.pan(PanDelta::Pixels(-200.0)));
    assert!(vm.state().visible.end > before.end);
}

#[test]
fn drag_sequence_accumulates() {
    let mut vm = zoomed_in();
    let before = vm.state().visible;
    let ms_per_px = before.span() / 800.0;

    vm.begin_drag(300.0, 0.0);
    assert!(vm.drag_to(310.0, 16.0));
    assert!(vm.drag_to(330.0, 32.0));
    vm.end_drag();

    let after = vm.state().visible;
    assert!((after.start - (before.start - 30.0 * ms_per_px)).abs() < 1e-3);
    assert!(!vm.is_animating());
}

#[test]
fn drag_without_begin_is_ignored() {
    let mut vm = zoomed_in();
    assert!(!vm.drag_to(500.0, 10.0));
    assert!(!vm.end_drag());
}
