use price_chart_core::domain::errors::ChartError;
use price_chart_core::domain::market_data::{
    DAY_MS, IndicatorEngine, IndicatorEngineConfig, IndicatorId, IndicatorParams, IndicatorValue, OHLCV, Price,
    PriceBar, Timestamp, Volume,
};
use std::collections::HashMap;
use std::sync::Arc;
use strum::IntoEnumIterator;

const T0: i64 = 1_700_000_000_000;

/// A gently oscillating series so every kernel sees gains, losses and range.
fn bars(n: usize) -> Vec<PriceBar> {
    (0..n)
        .map(|i| {
            let base = 100.0 + (i as f64 * 0.7).sin() * 5.0 + i as f64 * 0.1;
            PriceBar::new(
                Timestamp::from_millis(T0 + i as i64 * DAY_MS),
                OHLCV::new(
                    Price::from(base - 0.5),
                    Price::from(base + 2.0),
                    Price::from(base - 2.0),
                    Price::from(base + 0.5),
                    Volume::from(1_000.0 + (i % 7) as f64 * 100.0),
                ),
            )
        })
        .collect()
}

#[test]
fn repeated_request_is_served_from_cache() {
    let mut engine = IndicatorEngine::default();
    let data = bars(60);
    let params = IndicatorParams::new().with("period", 10usize);

    let first = engine.calculate("sma", &data, &params).unwrap();
    let second = engine.calculate("sma", &data, &params).unwrap();

    assert!(Arc::ptr_eq(&first, &second));
    let stats = engine.stats();
    assert_eq!(stats.computations, 1);
    assert_eq!(stats.cache_hits, 1);
    assert_eq!(stats.cached_series, 1);
}

#[test]
fn different_params_or_bars_compute_again() {
    let mut engine = IndicatorEngine::default();
    let data = bars(60);

    let a = engine.calculate("ema", &data, &IndicatorParams::new().with("period", 10usize)).unwrap();
    let b = engine.calculate("ema", &data, &IndicatorParams::new().with("period", 11usize)).unwrap();
    let c = engine.calculate("ema", &data[1..], &IndicatorParams::new().with("period", 10usize)).unwrap();

    assert!(!Arc::ptr_eq(&a, &b));
    assert_eq!(c.len(), 59);
    assert_eq!(engine.stats().computations, 3);
    assert_eq!(engine.stats().cache_hits, 0);
}

#[test]
fn every_indicator_is_bar_aligned() {
    let mut engine = IndicatorEngine::default();
    let data = bars(60);
    for id in IndicatorId::iter() {
        let out = engine.calculate(id.as_ref(), &data, &IndicatorParams::new()).unwrap();
        assert_eq!(out.len(), data.len(), "{id}");
        assert!(out.iter().zip(&data).all(|(r, b)| r.timestamp == b.timestamp.value()), "{id}");
        assert!(out.last().unwrap().value.is_some(), "{id} has no value on the last bar");
        assert!(out.iter().flat_map(|r| r.value).all(|v| v.is_finite()), "{id}");
    }
    assert_eq!(engine.stats().computations, 20);
}

#[test]
fn names_are_case_insensitive() {
    let mut engine = IndicatorEngine::default();
    let data = bars(30);
    let lower = engine.calculate("williams_r", &data, &IndicatorParams::new()).unwrap();
    let upper = engine.calculate("WILLIAMS_R", &data, &IndicatorParams::new()).unwrap();
    assert!(Arc::ptr_eq(&lower, &upper));
}

#[test]
fn unknown_indicator_is_a_hard_error() {
    let mut engine = IndicatorEngine::default();
    let err = engine.calculate("supertrend", &bars(10), &IndicatorParams::new()).unwrap_err();
    assert_eq!(err, ChartError::UnknownIndicator("supertrend".to_string()));
    assert_eq!(engine.stats().computations, 0);
}

#[test]
fn bad_parameters_are_rejected() {
    let mut engine = IndicatorEngine::default();
    let data = bars(60);

    let zero = engine.calculate("sma", &data, &IndicatorParams::new().with("period", 0usize));
    assert!(matches!(zero, Err(ChartError::InvalidParameter { ref name, .. }) if name == "period"));

    let fractional = engine.calculate("rsi", &data, &IndicatorParams::new().with("period", 2.5));
    assert!(matches!(fractional, Err(ChartError::InvalidParameter { .. })));

    let inverted = IndicatorParams::new().with("fast", 26usize).with("slow", 12usize);
    assert!(matches!(engine.calculate("macd", &data, &inverted), Err(ChartError::InvalidParameter { .. })));

    let source = IndicatorParams::new().with("source", "volume");
    assert!(matches!(engine.calculate("sma", &data, &source), Err(ChartError::InvalidParameter { .. })));
    assert_eq!(engine.stats().cached_series, 0);
}

#[test]
fn configured_defaults_sit_under_caller_params() {
    let mut default_params = HashMap::new();
    default_params.insert(IndicatorId::Sma, IndicatorParams::new().with("period", 5usize));
    let mut engine = IndicatorEngine::new(IndicatorEngineConfig { default_params, ..IndicatorEngineConfig::default() });
    let data = bars(30);

    let configured = engine.calculate("sma", &data, &IndicatorParams::new()).unwrap();
    assert!(configured[3].value.is_none());
    assert!(configured[4].value.is_some());

    let explicit = engine.calculate("sma", &data, &IndicatorParams::new().with("period", 10usize)).unwrap();
    assert!(explicit[8].value.is_none());
    assert!(explicit[9].value.is_some());
}

#[test]
fn price_source_selects_the_input_field() {
    let mut engine = IndicatorEngine::default();
    let data = bars(10);
    let params = IndicatorParams::new().with("period", 1usize).with("source", "high");
    let out = engine.calculate("sma", &data, &params).unwrap();
    match out[4].value {
        Some(IndicatorValue::Single { value }) => assert!((value - data[4].ohlcv.high.value()).abs() < 1e-9),
        other => panic!("unexpected value {other:?}"),
    }
}

#[test]
fn clearing_the_cache_forces_recomputation() {
    let mut engine = IndicatorEngine::default();
    let data = bars(40);
    let first = engine.calculate("atr", &data, &IndicatorParams::new()).unwrap();
    engine.clear_cache();
    assert_eq!(engine.stats().cached_series, 0);
    let second = engine.calculate("atr", &data, &IndicatorParams::new()).unwrap();
    assert!(!Arc::ptr_eq(&first, &second));
    assert_eq!(first, second);
    assert_eq!(engine.stats().computations, 2);
}

#[test]
fn stats_serialize_for_the_host() {
    let mut engine = IndicatorEngine::default();
    engine.calculate("obv", &bars(5), &IndicatorParams::new()).unwrap();
    insta::assert_json_snapshot!(engine.stats(), @r###"
    {
      "computations": 1,
      "cache_hits": 0,
      "cached_series": 1,
      "cached_scalars": 0
    }
    "###);
}
