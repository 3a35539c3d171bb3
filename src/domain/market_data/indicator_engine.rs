use super::{PriceBar, indicators, metrics};
use crate::domain::errors::{ChartError, ChartResult};
use crate::domain::logging::LogComponent;
use crate::log_debug;
use serde::{Deserialize, Serialize};
use std::collections::hash_map::DefaultHasher;
use std::collections::{BTreeMap, HashMap};
use std::hash::{Hash, Hasher};
use std::str::FromStr;
use std::sync::Arc;
use strum::{AsRefStr, Display as StrumDisplay, EnumIter, EnumString};

/// Bar-aligned indicators.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Hash, StrumDisplay, EnumString, EnumIter, AsRefStr, Serialize, Deserialize,
)]
#[strum(serialize_all = "snake_case", ascii_case_insensitive)]
#[serde(rename_all = "snake_case")]
pub enum IndicatorId {
    Sma,
    Ema,
    Wma,
    Rsi,
    Macd,
    Bollinger,
    Atr,
    Stochastic,
    WilliamsR,
    Cci,
    Roc,
    Momentum,
    Obv,
    Vwap,
    Mfi,
    Adx,
    Donchian,
    Keltner,
    HistoricalVolatility,
    Cmf,
}

/// Single-number metrics over a price or equity series.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Hash, StrumDisplay, EnumString, EnumIter, AsRefStr, Serialize, Deserialize,
)]
#[strum(serialize_all = "snake_case", ascii_case_insensitive)]
#[serde(rename_all = "snake_case")]
pub enum MetricId {
    Sharpe,
    Sortino,
    Calmar,
    Alpha,
    Beta,
    MaxDrawdown,
    #[strum(serialize = "var")]
    #[serde(rename = "var")]
    ValueAtRisk,
}

/// Which bar field feeds a single-input indicator.
#[derive(Debug, Clone, Copy, PartialEq, Eq, StrumDisplay, EnumString, AsRefStr)]
#[strum(serialize_all = "snake_case", ascii_case_insensitive)]
pub enum PriceSource {
    Open,
    High,
    Low,
    Close,
    Hl2,
    Hlc3,
    Ohlc4,
}

impl PriceSource {
    pub fn extract(&self, bars: &[PriceBar]) -> Vec<f64> {
        bars.iter()
            .map(|b| {
                let o = &b.ohlcv;
                match self {
                    Self::Open => o.open.value(),
                    Self::High => o.high.value(),
                    Self::Low => o.low.value(),
                    Self::Close => o.close.value(),
                    Self::Hl2 => (o.high.value() + o.low.value()) / 2.0,
                    Self::Hlc3 => o.typical_price(),
                    Self::Ohlc4 => (o.open.value() + o.high.value() + o.low.value() + o.close.value()) / 4.0,
                }
            })
            .collect()
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum ParamValue {
    Flag(bool),
    Number(f64),
    Text(String),
}

impl From<f64> for ParamValue {
    fn from(v: f64) -> Self {
        Self::Number(v)
    }
}

impl From<usize> for ParamValue {
    fn from(v: usize) -> Self {
        Self::Number(v as f64)
    }
}

impl From<bool> for ParamValue {
    fn from(v: bool) -> Self {
        Self::Flag(v)
    }
}

impl From<&str> for ParamValue {
    fn from(v: &str) -> Self {
        Self::Text(v.to_string())
    }
}

/// Named indicator parameters. Ordered so the JSON form is a stable cache key.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct IndicatorParams(BTreeMap<String, ParamValue>);

impl IndicatorParams {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with(mut self, key: &str, value: impl Into<ParamValue>) -> Self {
        self.0.insert(key.to_string(), value.into());
        self
    }

    pub fn get(&self, key: &str) -> Option<&ParamValue> {
        self.0.get(key)
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    /// `self` layered over `defaults`; explicit keys win.
    pub fn merged_over(&self, defaults: &IndicatorParams) -> IndicatorParams {
        let mut merged = defaults.0.clone();
        merged.extend(self.0.iter().map(|(k, v)| (k.clone(), v.clone())));
        IndicatorParams(merged)
    }

    fn invalid(key: &str, reason: impl Into<String>) -> ChartError {
        ChartError::InvalidParameter { name: key.to_string(), reason: reason.into() }
    }

    /// Window length: a whole number of at least 1.
    pub fn period(&self, key: &str, default: usize) -> ChartResult<usize> {
        match self.0.get(key) {
            None => Ok(default),
            Some(ParamValue::Number(n)) if n.is_finite() && *n >= 1.0 && n.fract() == 0.0 => Ok(*n as usize),
            Some(other) => Err(Self::invalid(key, format!("expected a positive integer, got {other:?}"))),
        }
    }

    pub fn positive(&self, key: &str, default: f64) -> ChartResult<f64> {
        match self.0.get(key) {
            None => Ok(default),
            Some(ParamValue::Number(n)) if n.is_finite() && *n > 0.0 => Ok(*n),
            Some(other) => Err(Self::invalid(key, format!("expected a positive number, got {other:?}"))),
        }
    }

    pub fn flag(&self, key: &str, default: bool) -> bool {
        match self.0.get(key) {
            Some(ParamValue::Flag(b)) => *b,
            _ => default,
        }
    }

    pub fn source(&self, default: PriceSource) -> ChartResult<PriceSource> {
        match self.0.get("source") {
            None => Ok(default),
            Some(ParamValue::Text(s)) => {
                PriceSource::from_str(s).map_err(|_| Self::invalid("source", format!("unknown price source {s}")))
            }
            Some(other) => Err(Self::invalid("source", format!("expected a field name, got {other:?}"))),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum IndicatorValue {
    Single { value: f64 },
    Macd { macd: f64, signal: f64, histogram: f64 },
    Band { upper: f64, middle: f64, lower: f64 },
    Stochastic { k: f64, d: f64 },
    Directional { adx: f64, plus_di: f64, minus_di: f64 },
}

impl IndicatorValue {
    pub fn is_finite(&self) -> bool {
        match *self {
            Self::Single { value } => value.is_finite(),
            Self::Macd { macd, signal, histogram } => macd.is_finite() && signal.is_finite() && histogram.is_finite(),
            Self::Band { upper, middle, lower } => upper.is_finite() && middle.is_finite() && lower.is_finite(),
            Self::Stochastic { k, d } => k.is_finite() && d.is_finite(),
            Self::Directional { adx, plus_di, minus_di } => {
                adx.is_finite() && plus_di.is_finite() && minus_di.is_finite()
            }
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct IndicatorRecord {
    pub timestamp: i64,
    pub value: Option<IndicatorValue>,
}

/// Construction-time defaults for the engine.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct IndicatorEngineConfig {
    /// Per-indicator parameter defaults, layered under caller params.
    pub default_params: HashMap<IndicatorId, IndicatorParams>,
    /// Annual risk-free rate as a fraction.
    pub risk_free_rate: f64,
    pub periods_per_year: f64,
    pub var_confidence: f64,
}

impl Default for IndicatorEngineConfig {
    fn default() -> Self {
        Self { default_params: HashMap::new(), risk_free_rate: 0.0, periods_per_year: 252.0, var_confidence: 0.95 }
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct EngineStats {
    pub computations: u64,
    pub cache_hits: u64,
    pub cached_series: usize,
    pub cached_scalars: usize,
}

/// Cached indicator and metric computation.
#[derive(Debug, Default)]
pub struct IndicatorEngine {
    config: IndicatorEngineConfig,
    series_cache: HashMap<String, Arc<Vec<IndicatorRecord>>>,
    scalar_cache: HashMap<String, f64>,
    computations: u64,
    cache_hits: u64,
}

impl IndicatorEngine {
    pub fn new(config: IndicatorEngineConfig) -> Self {
        Self { config, ..Self::default() }
    }

    pub fn config(&self) -> &IndicatorEngineConfig {
        &self.config
    }

    /// Compute (or fetch) an indicator by name.
    pub fn calculate(
        &mut self,
        id: &str,
        bars: &[PriceBar],
        params: &IndicatorParams,
    ) -> ChartResult<Arc<Vec<IndicatorRecord>>> {
        let id = IndicatorId::from_str(id).map_err(|_| ChartError::UnknownIndicator(id.to_string()))?;
        self.calculate_id(id, bars, params)
    }

    pub fn calculate_id(
        &mut self,
        id: IndicatorId,
        bars: &[PriceBar],
        params: &IndicatorParams,
    ) -> ChartResult<Arc<Vec<IndicatorRecord>>> {
        let effective = match self.config.default_params.get(&id) {
            Some(defaults) => params.merged_over(defaults),
            None => params.clone(),
        };
        let key = format!("{}|{}|{}", id.as_ref(), serde_json::to_string(&effective)?, bars_key(bars));

        if let Some(hit) = self.series_cache.get(&key) {
            self.cache_hits += 1;
            return Ok(Arc::clone(hit));
        }

        let slots = indicators::compute(id, bars, &effective)?;
        let records: Vec<IndicatorRecord> = bars
            .iter()
            .zip(slots)
            .map(|(bar, value)| IndicatorRecord {
                timestamp: bar.timestamp.value(),
                value: value.filter(IndicatorValue::is_finite),
            })
            .collect();

        self.computations += 1;
        log_debug!(LogComponent::Domain("IndicatorEngine"), "computed {} over {} bars", id, bars.len());

        let records = Arc::new(records);
        self.series_cache.insert(key, Arc::clone(&records));
        Ok(records)
    }

    /// Compute (or fetch) a scalar metric. Alpha and beta require a benchmark.
    pub fn calculate_scalar(&mut self, metric: &str, series: &[f64], benchmark: Option<&[f64]>) -> ChartResult<f64> {
        let metric = MetricId::from_str(metric).map_err(|_| ChartError::UnknownMetric(metric.to_string()))?;
        if series.iter().chain(benchmark.unwrap_or_default()).any(|v| !v.is_finite()) {
            return Err(ChartError::InvalidParameter {
                name: "series".to_string(),
                reason: "series contains a non-finite value".to_string(),
            });
        }

        let key = format!("{}|{}", metric.as_ref(), serde_json::to_string(&(series, benchmark))?);
        if let Some(hit) = self.scalar_cache.get(&key) {
            self.cache_hits += 1;
            return Ok(*hit);
        }

        let cfg = &self.config;
        let needs_benchmark = || {
            benchmark.ok_or_else(|| ChartError::MissingInput(format!("{metric} requires a benchmark series")))
        };
        let value = match metric {
            MetricId::Sharpe => metrics::sharpe(series, cfg)?,
            MetricId::Sortino => metrics::sortino(series, cfg)?,
            MetricId::Calmar => metrics::calmar(series, cfg)?,
            MetricId::MaxDrawdown => metrics::max_drawdown(series)?,
            MetricId::ValueAtRisk => metrics::value_at_risk(series, cfg)?,
            MetricId::Beta => metrics::beta(series, needs_benchmark()?)?,
            MetricId::Alpha => metrics::alpha(series, needs_benchmark()?, cfg)?,
        };
        let value = if value.is_finite() { value } else { 0.0 };

        self.computations += 1;
        self.scalar_cache.insert(key, value);
        Ok(value)
    }

    pub fn clear_cache(&mut self) {
        self.series_cache.clear();
        self.scalar_cache.clear();
    }

    pub fn stats(&self) -> EngineStats {
        EngineStats {
            computations: self.computations,
            cache_hits: self.cache_hits,
            cached_series: self.series_cache.len(),
            cached_scalars: self.scalar_cache.len(),
        }
    }
}

/// Length and edge timestamps in clear, the rest as a content hash.
fn bars_key(bars: &[PriceBar]) -> String {
    let edge = |bar: Option<&PriceBar>| bar.map_or(-1, |b| b.timestamp.value());
    format!("{}:{}:{}:{:016x}", bars.len(), edge(bars.first()), edge(bars.last()), fingerprint(bars))
}

fn fingerprint(bars: &[PriceBar]) -> u64 {
    let mut hasher = DefaultHasher::new();
    bars.len().hash(&mut hasher);
    for bar in bars {
        bar.timestamp.value().hash(&mut hasher);
        let o = &bar.ohlcv;
        for v in [o.open.value(), o.high.value(), o.low.value(), o.close.value(), o.volume.value()] {
            v.to_bits().hash(&mut hasher);
        }
    }
    hasher.finish()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::market_data::{OHLCV, Price, Timestamp, Volume};

    fn bar(t: i64, close: f64) -> PriceBar {
        let p = Price::from(close);
        PriceBar::new(Timestamp::from_millis(t), OHLCV::new(p, p, p, p, Volume::from(1.0)))
    }

    #[test]
    fn bars_key_spells_out_length_and_edges() {
        let bars = [bar(1_000, 1.0), bar(2_000, 2.0), bar(3_000, 3.0)];
        assert!(bars_key(&bars).starts_with("3:1000:3000:"));
        assert!(bars_key(&bars[1..]).starts_with("2:2000:3000:"));
        assert!(bars_key(&[]).starts_with("0:-1:-1:"));

        let mut moved = bars;
        moved[1] = bar(2_000, 2.5);
        assert_eq!(bars_key(&moved)[..12], bars_key(&bars)[..12]);
        assert_ne!(bars_key(&moved), bars_key(&bars));
    }
}
