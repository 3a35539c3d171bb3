use super::{OHLCV, Price, PriceBar, Volume};
use crate::domain::logging::LogComponent;
use crate::log_warn;

/// Folds consecutive bars into synthetic bars with OHLC semantics.
pub struct Aggregator;

impl Aggregator {
    /// Open of the first bar, close of the last, extreme high/low, summed volume.
    /// The timestamp is taken from the midpoint bar of the group.
    pub fn aggregate(bars: &[PriceBar]) -> Option<PriceBar> {
        let first = bars.first()?;
        let last = bars.last()?;
        let mid = &bars[bars.len() / 2];

        let mut high = first.ohlcv.high.value();
        let mut low = first.ohlcv.low.value();
        let mut volume = 0.0;
        for bar in bars {
            high = high.max(bar.ohlcv.high.value());
            low = low.min(bar.ohlcv.low.value());
            volume += bar.ohlcv.volume.value();
        }

        Some(PriceBar::new(
            mid.timestamp,
            OHLCV::new(
                first.ohlcv.open,
                Price::from(high),
                Price::from(low),
                last.ohlcv.close,
                Volume::from(volume),
            ),
        ))
    }

    /// Downsample by grouping `factor` consecutive bars. A trailing partial group
    /// is aggregated as well.
    pub fn downsample(bars: &[PriceBar], factor: usize) -> Vec<PriceBar> {
        if factor <= 1 {
            return bars.to_vec();
        }
        bars.chunks(factor).filter_map(Self::aggregate).collect()
    }
}

/// Validation of incoming bars
#[derive(Clone, Default)]
pub struct DataValidationService;

impl DataValidationService {
    pub fn new() -> Self {
        Self
    }

    /// Validate one bar with a descriptive reason
    pub fn validate_bar(&self, bar: &PriceBar) -> Result<(), String> {
        if !bar.ohlcv.is_finite() {
            return Err("OHLCV contains a non-finite value".to_string());
        }
        if bar.ohlcv.high.value() < bar.ohlcv.low.value() {
            return Err("High price cannot be lower than low price".to_string());
        }
        if bar.ohlcv.high.value() < bar.ohlcv.open.value().max(bar.ohlcv.close.value()) {
            return Err("High price cannot be lower than open/close".to_string());
        }
        if bar.ohlcv.low.value() > bar.ohlcv.open.value().min(bar.ohlcv.close.value()) {
            return Err("Low price cannot be higher than open/close".to_string());
        }
        if bar.ohlcv.volume.value() < 0.0 {
            return Err("Volume cannot be negative".to_string());
        }
        Ok(())
    }

    /// Drop invalid bars, logging how many were rejected.
    pub fn retain_valid(&self, bars: Vec<PriceBar>) -> Vec<PriceBar> {
        let total = bars.len();
        let mut first_reason = None;
        let valid: Vec<PriceBar> = bars
            .into_iter()
            .filter(|bar| match self.validate_bar(bar) {
                Ok(()) => true,
                Err(reason) => {
                    first_reason.get_or_insert(reason);
                    false
                }
            })
            .collect();

        if let Some(reason) = first_reason {
            log_warn!(
                LogComponent::Domain("Validation"),
                "Dropped {} of {} bars ({})",
                total - valid.len(),
                total,
                reason
            );
        }
        valid
    }}
