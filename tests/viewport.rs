use price_chart_core::domain::chart::{
    MIN_TIME_SPAN_MS, TimeframeSelection, ViewportConfig, ViewportManager,
};
use price_chart_core::domain::errors::ChartError;
use price_chart_core::domain::market_data::{
    DAY_MS, OHLCV, Price, PriceBar, TimeInterval, Timestamp, Volume,
};

const T0: i64 = 1_700_000_000_000;

fn make_bar(i: i64) -> PriceBar {
    let close = 100.0 + i as f64;
    PriceBar::new(
        Timestamp::from_millis(T0 + i * DAY_MS),
        OHLCV::new(
            Price::from(close),
            Price::from(close + 2.0),
            Price::from(close - 2.0),
            Price::from(close),
            Volume::from(10.0 + i as f64),
        ),
    )
}

fn loaded(n: i64) -> ViewportManager {
    let mut vm = ViewportManager::new(ViewportConfig::default());
    vm.set_data((0..n).map(make_bar).collect());
    vm
}

#[test]
fn set_data_shows_everything() {
    let vm = loaded(100);
    let state = vm.state();

    assert_eq!(state.visible.start, T0 as f64);
    assert_eq!(state.visible.end, (T0 + 99 * DAY_MS) as f64);
    assert_eq!(vm.visible_data().len(), 100);
    assert_eq!(state.interval, TimeInterval::OneDay);
    assert_eq!(state.timeframe, TimeframeSelection::Custom);
    assert!((state.zoom_level - 1.0).abs() < 1e-12);
    // no loader: the whole series is the buffer
    assert_eq!(vm.cached_data().len(), 100);
    assert_eq!(vm.data_blocks().len(), 1);
    assert_eq!(vm.data_blocks()[0].bar_count, 100);
}

#[test]
fn set_data_sorts_and_drops_invalid() {
    let mut bars: Vec<PriceBar> = (0..10).rev().map(make_bar).collect();
    bars.push(make_bar(3));
    let mut broken = make_bar(20);
    broken.ohlcv.high = Price::from(1.0);
    bars.push(broken);

    let mut vm = ViewportManager::default();
    vm.set_data(bars);

    let stamps: Vec<i64> = vm.bars().as_slice().iter().map(|b| b.timestamp.value()).collect();
    let expected: Vec<i64> = (0..10).map(|i| T0 + i * DAY_MS).collect();
    assert_eq!(stamps, expected);
}

#[test]
fn price_and_volume_ranges_follow_visible_bars() {
    let vm = loaded(100);
    let state = vm.state();

    // lows 98..=197, highs 102..=201, padded by 8% of the 103 range
    assert!((state.price_range.min - (98.0 - 103.0 * 0.08)).abs() < 1e-9);
    assert!((state.price_range.max - (201.0 + 103.0 * 0.08)).abs() < 1e-9);
    assert!((state.volume_range.max - 109.0 * 1.1).abs() < 1e-9);
    assert_eq!(state.volume_range.min, 0.0);
}

#[test]
fn inverted_range_is_rejected() {
    let mut vm = loaded(10);
    let before = vm.state();
    let err = vm.set_visible_time_range((T0 + DAY_MS) as f64, T0 as f64).unwrap_err();
    assert!(matches!(err, ChartError::InvalidRange(_)));
    assert!(vm.set_visible_time_range(f64::NAN, T0 as f64).is_err());
    assert_eq!(vm.state(), before);
}

#[test]
fn tiny_range_expands_around_center() {
    let mut vm = loaded(10);
    let center = (T0 + 5 * DAY_MS) as f64;
    vm.set_visible_time_range(center - 1_000.0, center + 1_000.0).unwrap();

    let visible = vm.state().visible;
    assert!((visible.span() - MIN_TIME_SPAN_MS as f64).abs() < 1e-6);
    assert!((visible.center() - center).abs() < 1e-6);
}

#[test]
fn huge_range_is_capped() {
    let config = ViewportConfig { max_time_span_ms: 30 * DAY_MS, ..ViewportConfig::default() };
    let mut vm = ViewportManager::new(config);
    vm.set_data((0..100).map(make_bar).collect());

    let state = vm.state();
    assert!((state.visible.span() - (30 * DAY_MS) as f64).abs() < 1e-6);
    assert_eq!(state.visible.end, (T0 + 99 * DAY_MS) as f64);
    assert!(state.zoom_level > 3.0);
}

#[test]
fn pixel_time_round_trip() {
    let vm = loaded(50);
    for x in [0.0, 123.5, 400.0, 799.0] {
        let t = vm.pixel_to_time(x);
        assert!((vm.time_to_pixel(t) - x).abs() < 1e-6);
    }
    let y = vm.price_to_y(120.0);
    assert!((vm.y_to_price(y) - 120.0).abs() < 1e-9);
}

#[test]
fn resize_ignores_degenerate_sizes() {
    let mut vm = loaded(10);
    vm.resize(0.0, 300.0);
    assert_eq!(vm.state().width, 800.0);

    vm.resize(1600.0, 900.0);
    let state = vm.state();
    assert_eq!((state.width, state.height), (1600.0, 900.0));
    assert!((state.pixels_per_ms * state.visible.span() - 1600.0).abs() < 1e-6);
}

#[test]
fn empty_data_keeps_defaults() {
    let mut vm = ViewportManager::default();
    vm.set_data(Vec::new());
    assert!(vm.visible_data().is_empty());
    assert!(vm.data_blocks().is_empty());
    assert_eq!(vm.bars_per_pixel(), 0.0);
}
