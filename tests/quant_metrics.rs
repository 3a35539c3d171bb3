use price_chart_core::domain::errors::ChartError;
use price_chart_core::domain::market_data::{IndicatorEngine, IndicatorEngineConfig};

fn growth(n: usize, rate: f64) -> Vec<f64> {
    (0..n).map(|i| 100.0 * (1.0 + rate).powi(i as i32) * if i % 3 == 0 { 0.99 } else { 1.0 }).collect()
}

#[test]
fn max_drawdown_tracks_the_running_peak() {
    let mut engine = IndicatorEngine::default();
    let dd = engine.calculate_scalar("max_drawdown", &[100.0, 120.0, 90.0, 130.0, 117.0], None).unwrap();
    assert!((dd - 0.25).abs() < 1e-12);
}

#[test]
fn flat_series_scores_zero() {
    let mut engine = IndicatorEngine::default();
    let flat = vec![50.0; 40];
    for metric in ["sharpe", "sortino", "calmar", "max_drawdown", "var"] {
        assert_eq!(engine.calculate_scalar(metric, &flat, None).unwrap(), 0.0, "{metric}");
    }
}

#[test]
fn benchmark_metrics_need_a_benchmark() {
    let mut engine = IndicatorEngine::default();
    let series = growth(30, 0.01);
    assert!(matches!(engine.calculate_scalar("alpha", &series, None), Err(ChartError::MissingInput(_))));
    assert!(matches!(engine.calculate_scalar("beta", &series, None), Err(ChartError::MissingInput(_))));
}

#[test]
fn beta_against_itself_is_one() {
    let mut engine = IndicatorEngine::default();
    let series = growth(50, 0.004);
    let beta = engine.calculate_scalar("beta", &series, Some(&series)).unwrap();
    assert!((beta - 1.0).abs() < 1e-9);
    let alpha = engine.calculate_scalar("alpha", &series, Some(&series)).unwrap();
    assert!(alpha.abs() < 1e-9);
}

#[test]
fn steady_gains_have_positive_sharpe() {
    let mut engine = IndicatorEngine::default();
    let sharpe = engine.calculate_scalar("sharpe", &growth(60, 0.01), None).unwrap();
    assert!(sharpe > 0.0);
}

#[test]
fn risk_free_rate_lowers_sharpe() {
    let series = growth(60, 0.002);
    let base = IndicatorEngine::default().calculate_scalar("sharpe", &series, None).unwrap();
    let mut with_rate =
        IndicatorEngine::new(IndicatorEngineConfig { risk_free_rate: 0.05, ..IndicatorEngineConfig::default() });
    assert!(with_rate.calculate_scalar("sharpe", &series, None).unwrap() < base);
}

#[test]
fn value_at_risk_reports_the_tail_loss() {
    let mut engine = IndicatorEngine::default();
    // nineteen returns: one 10% loss, the rest +1%
    let mut series = vec![100.0];
    for i in 0..19 {
        let last = *series.last().unwrap();
        series.push(if i == 7 { last * 0.9 } else { last * 1.01 });
    }
    let var = engine.calculate_scalar("VaR", &series, None).unwrap();
    assert!((var - 0.1).abs() < 1e-9);
}

#[test]
fn invalid_input_is_reported() {
    let mut engine = IndicatorEngine::default();
    assert_eq!(
        engine.calculate_scalar("omega", &[1.0, 2.0], None).unwrap_err(),
        ChartError::UnknownMetric("omega".to_string())
    );
    assert!(matches!(
        engine.calculate_scalar("sharpe", &[1.0, f64::NAN, 2.0], None),
        Err(ChartError::InvalidParameter { .. })
    ));
    assert!(matches!(
        engine.calculate_scalar("beta", &[1.0, 2.0, 3.0], Some(&[1.0, f64::INFINITY])),
        Err(ChartError::InvalidParameter { .. })
    ));
    assert!(matches!(engine.calculate_scalar("sharpe", &[1.0], None), Err(ChartError::MissingInput(_))));
}

#[test]
fn repeated_metric_is_cached() {
    let mut engine = IndicatorEngine::default();
    let series = growth(30, 0.01);
    let a = engine.calculate_scalar("sortino", &series, None).unwrap();
    let b = engine.calculate_scalar("sortino", &series, None).unwrap();
    assert_eq!(a, b);
    let stats = engine.stats();
    assert_eq!((stats.computations, stats.cache_hits, stats.cached_scalars), (1, 1, 1));
}
