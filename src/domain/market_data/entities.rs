pub use super::value_objects::{OHLCV, Price, Timestamp, Volume};
use serde::{Deserialize, Serialize};
use std::ops::Range;

/// Domain entity - one immutable OHLCV bar
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct PriceBar {
    pub timestamp: Timestamp,
    pub ohlcv: OHLCV,
}

impl PriceBar {
    pub fn new(timestamp: Timestamp, ohlcv: OHLCV) -> Self {
        Self { timestamp, ohlcv }
    }
}

/// Authoritative bar sequence: ascending by timestamp, no duplicate timestamps.
#[derive(Debug, Clone, Default)]
pub struct BarSeries {
    bars: Vec<PriceBar>,
}

impl BarSeries {
    pub fn new() -> Self {
        Self { bars: Vec::new() }
    }

    /// Build from arbitrary input. On duplicate timestamps the first occurrence wins.
    pub fn from_unsorted(mut bars: Vec<PriceBar>) -> Self {
        bars.sort_by_key(|b| b.timestamp);
        bars.dedup_by_key(|b| b.timestamp);
        Self { bars }
    }

    /// Merge incoming bars, keeping existing bars on timestamp collisions.
    /// Returns the number of bars actually added.
    pub fn merge(&mut self, mut incoming: Vec<PriceBar>) -> usize {
        if incoming.is_empty() {
            return 0;
        }
        incoming.sort_by_key(|b| b.timestamp);
        incoming.dedup_by_key(|b| b.timestamp);

        let before = self.bars.len();
        let mut merged = Vec::with_capacity(before + incoming.len());
        let mut existing = std::mem::take(&mut self.bars).into_iter().peekable();
        let mut fresh = incoming.into_iter().peekable();

        loop {
            let heads = (existing.peek().map(|b| b.timestamp), fresh.peek().map(|b| b.timestamp));
            match heads {
                (Some(a), Some(b)) => {
                    if a < b {
                        merged.extend(existing.next());
                    } else if a > b {
                        merged.extend(fresh.next());
                    } else {
                        merged.extend(existing.next());
                        fresh.next();
                    }
                }
                (Some(_), None) => merged.extend(existing.by_ref()),
                (None, Some(_)) => merged.extend(fresh.by_ref()),
                (None, None) => break,
            }
        }

        self.bars = merged;
        self.bars.len() - before
    }

    pub fn as_slice(&self) -> &[PriceBar] {
        &self.bars
    }

    pub fn len(&self) -> usize {
        self.bars.len()
    }

    pub fn is_empty(&self) -> bool {
        self.bars.is_empty()
    }

    pub fn first(&self) -> Option<&PriceBar> {
        self.bars.first()
    }

    pub fn latest(&self) -> Option<&PriceBar> {
        self.bars.last()
    }

    /// Index range of bars with `start <= timestamp <= end`.
    pub fn index_range(&self, start: f64, end: f64) -> Range<usize> {
        let lo = self.bars.partition_point(|b| b.timestamp.as_f64() < start);
        let hi = self.bars.partition_point(|b| b.timestamp.as_f64() <= end);
        lo..hi.max(lo)
    }

    /// Index of the first bar at or after `timestamp`.
    pub fn lower_bound(&self, timestamp: i64) -> usize {
        self.bars.partition_point(|b| b.timestamp.value() < timestamp)
    }

    /// Median spacing between consecutive bars.
    pub fn median_spacing_ms(&self) -> Option<i64> {
        if self.bars.len() < 2 {
            return None;
        }
        let mut gaps: Vec<i64> = self
            .bars
            .windows(2)
            .map(|pair| pair[1].timestamp.value() - pair[0].timestamp.value())
            .collect();
        gaps.sort_unstable();
        Some(gaps[gaps.len() / 2])
    }
}

/// Low/high extremes of a bar slice.
pub fn price_extremes(bars: &[PriceBar]) -> Option<(f64, f64)> {
    let first = bars.first()?;
    let init = (first.ohlcv.low.value(), first.ohlcv.high.value());
    Some(bars.iter().fold(init, |(lo, hi), b| {
        (lo.min(b.ohlcv.low.value()), hi.max(b.ohlcv.high.value()))
    }))
}

/// Largest volume in a bar slice.
pub fn max_volume(bars: &[PriceBar]) -> Option<f64> {
    bars.iter().map(|b| b.ohlcv.volume.value()).reduce(f64::max)
}
