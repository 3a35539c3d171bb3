//! Scalar performance metrics over a price or equity series.

use super::indicator_engine::IndicatorEngineConfig;
use crate::domain::errors::{ChartError, ChartResult};

/// Simple period-over-period returns. A zero previous value yields a zero return.
pub fn simple_returns(series: &[f64]) -> Vec<f64> {
    series
        .windows(2)
        .map(|w| if w[0] == 0.0 { 0.0 } else { w[1] / w[0] - 1.0 })
        .collect()
}

fn mean(values: &[f64]) -> f64 {
    if values.is_empty() {
        return 0.0;
    }
    values.iter().sum::<f64>() / values.len() as f64
}

fn sample_std(values: &[f64]) -> f64 {
    if values.len() < 2 {
        return 0.0;
    }
    let m = mean(values);
    let variance = values.iter().map(|v| (v - m).powi(2)).sum::<f64>() / (values.len() - 1) as f64;
    variance.sqrt()
}

fn require_returns(series: &[f64]) -> ChartResult<Vec<f64>> {
    if series.len() < 2 {
        return Err(ChartError::MissingInput("at least two observations are required".to_string()));
    }
    Ok(simple_returns(series))
}

/// Annualized Sharpe ratio with sample standard deviation.
pub fn sharpe(series: &[f64], cfg: &IndicatorEngineConfig) -> ChartResult<f64> {
    let returns = require_returns(series)?;
    let per_period_rf = cfg.risk_free_rate / cfg.periods_per_year;
    let excess: Vec<f64> = returns.iter().map(|r| r - per_period_rf).collect();
    let sd = sample_std(&excess);
    if sd == 0.0 {
        return Ok(0.0);
    }
    Ok(mean(&excess) / sd * cfg.periods_per_year.sqrt())
}

/// Annualized Sortino ratio; downside deviation uses only returns below the risk-free rate.
pub fn sortino(series: &[f64], cfg: &IndicatorEngineConfig) -> ChartResult<f64> {
    let returns = require_returns(series)?;
    let per_period_rf = cfg.risk_free_rate / cfg.periods_per_year;
    let excess: Vec<f64> = returns.iter().map(|r| r - per_period_rf).collect();
    let downside = excess.iter().map(|r| r.min(0.0).powi(2)).sum::<f64>() / excess.len() as f64;
    let dd = downside.sqrt();
    if dd == 0.0 {
        return Ok(0.0);
    }
    Ok(mean(&excess) / dd * cfg.periods_per_year.sqrt())
}

/// Largest peak-to-trough decline as a positive fraction.
pub fn max_drawdown(series: &[f64]) -> ChartResult<f64> {
    if series.is_empty() {
        return Err(ChartError::MissingInput("series is empty".to_string()));
    }
    let mut peak = f64::NEG_INFINITY;
    let mut worst = 0.0_f64;
    for &v in series {
        peak = peak.max(v);
        if peak > 0.0 {
            worst = worst.max((peak - v) / peak);
        }
    }
    Ok(worst)
}

/// Compound annual growth divided by maximum drawdown.
pub fn calmar(series: &[f64], cfg: &IndicatorEngineConfig) -> ChartResult<f64> {
    let returns = require_returns(series)?;
    let drawdown = max_drawdown(series)?;
    if drawdown == 0.0 {
        return Ok(0.0);
    }
    let (first, last) = (series[0], series[series.len() - 1]);
    if first <= 0.0 || last <= 0.0 {
        return Ok(0.0);
    }
    let years = returns.len() as f64 / cfg.periods_per_year;
    let cagr = (last / first).powf(1.0 / years) - 1.0;
    Ok(cagr / drawdown)
}

fn paired_returns(series: &[f64], benchmark: &[f64]) -> ChartResult<(Vec<f64>, Vec<f64>)> {
    let asset = require_returns(series)?;
    let market = require_returns(benchmark)?;
    let n = asset.len().min(market.len());
    if n < 2 {
        return Err(ChartError::MissingInput("benchmark overlap is too short".to_string()));
    }
    // align the most recent observations
    Ok((asset[asset.len() - n..].to_vec(), market[market.len() - n..].to_vec()))
}

/// Covariance with the benchmark over benchmark variance.
pub fn beta(series: &[f64], benchmark: &[f64]) -> ChartResult<f64> {
    let (asset, market) = paired_returns(series, benchmark)?;
    let (ma, mm) = (mean(&asset), mean(&market));
    let n = (asset.len() - 1) as f64;
    let cov = asset.iter().zip(&market).map(|(a, m)| (a - ma) * (m - mm)).sum::<f64>() / n;
    let var = market.iter().map(|m| (m - mm).powi(2)).sum::<f64>() / n;
    if var == 0.0 {
        return Ok(0.0);
    }
    Ok(cov / var)
}

/// Annualized Jensen's alpha.
pub fn alpha(series: &[f64], benchmark: &[f64], cfg: &IndicatorEngineConfig) -> ChartResult<f64> {
    let b = beta(series, benchmark)?;
    let (asset, market) = paired_returns(series, benchmark)?;
    let rf = cfg.risk_free_rate / cfg.periods_per_year;
    let per_period = mean(&asset) - (rf + b * (mean(&market) - rf));
    Ok(per_period * cfg.periods_per_year)
}

/// Historical value at risk, reported as a positive loss fraction.
pub fn value_at_risk(series: &[f64], cfg: &IndicatorEngineConfig) -> ChartResult<f64> {
    let mut returns = require_returns(series)?;
    returns.sort_by(f64::total_cmp);
    let idx = ((1.0 - cfg.var_confidence) * returns.len() as f64).floor() as usize;
    Ok(-returns[idx.min(returns.len() - 1)])
}
