use chrono::{Datelike, Weekday};
use price_chart_core::domain::chart::{TimeframePreset, TimeframeSelection, ViewportManager};
use price_chart_core::domain::errors::ChartError;
use price_chart_core::domain::market_data::{DAY_MS, OHLCV, Price, PriceBar, Timestamp, Volume};
use price_chart_core::time_utils;

/// 2020-01-06, a Monday.
const FIRST_MONDAY: i64 = 1_578_268_800_000;

/// `n` daily bars on weekdays only, starting at `FIRST_MONDAY`.
fn weekday_bars(n: usize) -> Vec<PriceBar> {
    let utc = time_utils::utc();
    (0..)
        .map(|d: i64| FIRST_MONDAY + d * DAY_MS)
        .filter(|t| {
            let weekday = time_utils::to_datetime(*t, &utc).map(|dt| dt.weekday());
            !matches!(weekday, Some(Weekday::Sat | Weekday::Sun))
        })
        .take(n)
        .map(|t| {
            PriceBar::new(
                Timestamp::from_millis(t),
                OHLCV::new(
                    Price::from(300.0),
                    Price::from(305.0),
                    Price::from(295.0),
                    Price::from(302.0),
                    Volume::from(1_000.0),
                ),
            )
        })
        .collect()
}

fn loaded() -> ViewportManager {
    let mut vm = ViewportManager::default();
    vm.set_data(weekday_bars(1_000));
    vm
}

#[test]
fn one_month_ends_at_last_bar() {
    let mut vm = loaded();
    vm.apply_timeframe_str("1M").unwrap();
    let state = vm.state();

    // last bar: Friday 2023-11-03
    assert_eq!(state.visible.end, 1_698_969_600_000.0);
    // calendar month back: 2023-10-03
    assert_eq!(state.visible.start, 1_696_291_200_000.0);
    assert_eq!(state.timeframe, TimeframeSelection::Preset(TimeframePreset::OneMonth));
    let visible = vm.visible_data().len();
    assert!((20..=24).contains(&visible), "{visible} bars visible");
}

#[test]
fn presets_parse_case_insensitively() {
    let mut vm = loaded();
    vm.apply_timeframe_str("ytd").unwrap();
    let utc = time_utils::utc();
    let start = time_utils::to_datetime(vm.state().visible.start as i64, &utc).unwrap();
    assert_eq!((start.year(), start.month(), start.day()), (2023, 1, 1));

    vm.apply_timeframe_str("all").unwrap();
    assert_eq!(vm.state().visible.start, FIRST_MONDAY as f64);
    assert_eq!(vm.visible_data().len(), 1_000);
}

#[test]
fn unknown_preset_is_rejected() {
    let mut vm = loaded();
    let before = vm.state();
    let err = vm.apply_timeframe_str("2W").unwrap_err();
    assert_eq!(err, ChartError::UnknownTimeframe("2W".to_string()));
    assert_eq!(vm.state(), before);
}

#[test]
fn longer_presets_show_more_bars() {
    let mut vm = loaded();
    let mut counts = Vec::new();
    for preset in ["5D", "1M", "3M", "6M", "1Y"] {
        vm.apply_timeframe_str(preset).unwrap();
        counts.push(vm.visible_data().len());
    }
    assert!(counts.windows(2).all(|w| w[0] < w[1]), "{counts:?}");
}

#[test]
fn manual_zoom_clears_preset() {
    let mut vm = loaded();
    vm.apply_timeframe(TimeframePreset::ThreeMonths);
    vm.zoom_at(400.0, 2.0);
    assert_eq!(vm.state().timeframe, TimeframeSelection::Custom);
}

#[test]
fn preset_names_round_trip_through_display() {
    use std::str::FromStr;
    use strum::IntoEnumIterator;
    for preset in TimeframePreset::iter() {
        assert_eq!(TimeframePreset::from_str(&preset.to_string()).unwrap(), preset);
    }
}
