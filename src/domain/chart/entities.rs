use crate::domain::errors::{LoadError, LoadResult};
use crate::domain::market_data::{BarSeries, LoadDirection, PriceBar};
use serde::Serialize;

/// Bookkeeping for one contiguous chunk of loaded history.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct DataBlock {
    pub start_index: usize,
    pub end_index: usize,
    pub start_time: i64,
    pub end_time: i64,
    pub bar_count: usize,
    pub last_access_time: i64,
    pub is_loading: bool,
    /// `None` for the block installed by `set_data`.
    pub direction: Option<LoadDirection>,
}

impl DataBlock {
    pub fn loaded(bars: &[PriceBar], direction: Option<LoadDirection>, now: i64) -> Option<Self> {
        let (first, last) = (bars.first()?, bars.last()?);
        Some(Self {
            start_index: 0,
            end_index: 0,
            start_time: first.timestamp.value(),
            end_time: last.timestamp.value(),
            bar_count: bars.len(),
            last_access_time: now,
            is_loading: false,
            direction,
        })
    }

    pub fn pending(direction: LoadDirection, edge: i64, now: i64) -> Self {
        Self {
            start_index: 0,
            end_index: 0,
            start_time: edge,
            end_time: edge,
            bar_count: 0,
            last_access_time: now,
            is_loading: true,
            direction: Some(direction),
        }
    }

    /// Re-derive indices from the block's time span after the sequence changed.
    pub fn reindex(&mut self, series: &BarSeries) {
        self.start_index = series.lower_bound(self.start_time);
        self.end_index = series.lower_bound(self.end_time.saturating_add(1));
    }
}

/// Settled loader response, before it is merged.
#[derive(Debug)]
pub struct LoadOutcome {
    pub direction: LoadDirection,
    pub result: LoadResult<Vec<PriceBar>>,
}

/// What merging one load did.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct LoadReport {
    pub direction: LoadDirection,
    pub added: usize,
    pub exhausted: bool,
    pub error: Option<LoadError>,
}

impl LoadReport {
    pub fn is_ok(&self) -> bool {
        self.error.is_none()
    }
}
