//! Construction-time configuration for every component.

use crate::domain::chart::{LabelConfig, PriceAxisConfig, TimeAxisConfig, ViewportConfig};
use crate::domain::errors::{ChartError, ChartResult};
use crate::domain::market_data::IndicatorEngineConfig;
use serde::{Deserialize, Serialize};

/// Every section falls back to its `Default` when omitted.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ChartConfig {
    pub viewport: ViewportConfig,
    pub time_axis: TimeAxisConfig,
    pub price_axis: PriceAxisConfig,
    pub labels: LabelConfig,
    pub indicators: IndicatorEngineConfig,
}

impl ChartConfig {
    pub fn from_json(json: &str) -> ChartResult<Self> {
        let config: Self = serde_json::from_str(json)?;
        config.validate()?;
        Ok(config)
    }

    pub fn to_json(&self) -> ChartResult<String> {
        Ok(serde_json::to_string(self)?)
    }

    /// Reject settings no component can work with.
    pub fn validate(&self) -> ChartResult<()> {
        let v = &self.viewport;
        if v.min_time_span_ms <= 0 || v.min_time_span_ms > v.max_time_span_ms {
            return Err(ChartError::Config(format!(
                "time span limits [{}, {}] are inverted or empty",
                v.min_time_span_ms, v.max_time_span_ms
            )));
        }
        if !(v.motion.decay > 0.0 && v.motion.decay < 1.0) {
            return Err(ChartError::Config(format!("momentum decay {} must lie in (0, 1)", v.motion.decay)));
        }
        if v.utc_offset_minutes != self.time_axis.utc_offset_minutes {
            return Err(ChartError::Config(format!(
                "viewport offset {} min differs from time axis offset {} min",
                v.utc_offset_minutes, self.time_axis.utc_offset_minutes
            )));
        }
        if self.time_axis.min_ticks == 0 || self.time_axis.min_ticks > self.time_axis.max_ticks {
            return Err(ChartError::Config("time axis tick band is empty".to_string()));
        }
        if self.price_axis.min_ticks == 0 || self.price_axis.min_ticks > self.price_axis.max_ticks {
            return Err(ChartError::Config("price axis tick band is empty".to_string()));
        }
        if !(self.indicators.var_confidence > 0.0 && self.indicators.var_confidence < 1.0) {
            return Err(ChartError::Config("VaR confidence must lie in (0, 1)".to_string()));
        }
        Ok(())
    }
}
