use crate::domain::errors::{LoadError, LoadResult};
use crate::domain::market_data::{OHLCV, Price, PriceBar, Timestamp, Volume};
use serde::{Deserialize, Serialize};

/// Flat bar shape exchanged with JavaScript
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct BarDto {
    pub timestamp: i64,
    pub open: f64,
    pub high: f64,
    pub low: f64,
    pub close: f64,
    #[serde(default)]
    pub volume: f64,
}

/// Accepted wire forms: an object, or a kline-style `[t, o, h, l, c, v]` array.
#[derive(Debug, Clone, Deserialize)]
#[serde(untagged)]
pub enum BarWire {
    Object(BarDto),
    Kline(i64, f64, f64, f64, f64, f64),
}

impl From<BarWire> for BarDto {
    fn from(wire: BarWire) -> Self {
        match wire {
            BarWire::Object(dto) => dto,
            BarWire::Kline(timestamp, open, high, low, close, volume) => {
                BarDto { timestamp, open, high, low, close, volume }
            }
        }
    }
}

impl BarDto {
    /// Convert to the domain entity. OHLC ordering is checked later by validation.
    pub fn to_domain_bar(&self) -> PriceBar {
        PriceBar::new(
            Timestamp::from(self.timestamp),
            OHLCV::new(
                Price::from(self.open),
                Price::from(self.high),
                Price::from(self.low),
                Price::from(self.close),
                Volume::from(self.volume),
            ),
        )
    }
}

/// Parse a JSON array of bars in either wire form.
pub fn parse_bars(json: &str) -> LoadResult<Vec<PriceBar>> {
    let wire: Vec<BarWire> = serde_json::from_str(json).map_err(|e| LoadError::Malformed(e.to_string()))?;
    Ok(wire.into_iter().map(|w| BarDto::from(w).to_domain_bar()).collect())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn both_wire_forms_parse() {
        let json = r#"[
            {"timestamp": 1000, "open": 1.0, "high": 2.0, "low": 0.5, "close": 1.5, "volume": 10.0},
            [2000, 1.5, 2.5, 1.0, 2.0, 4.0]
        ]"#;
        let bars = parse_bars(json).unwrap();
        assert_eq!(bars.len(), 2);
        assert_eq!(bars[1].timestamp.value(), 2000);
        assert_eq!(bars[1].ohlcv.volume.value(), 4.0);
    }

    #[test]
    fn malformed_payload_is_reported() {
        assert!(matches!(parse_bars("{\"bars\": 1}"), Err(LoadError::Malformed(_))));
    }
}
