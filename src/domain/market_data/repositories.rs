use super::{PriceBar, Timestamp};
use crate::domain::errors::LoadResult;
use futures::future::LocalBoxFuture;
use serde::{Deserialize, Serialize};

/// Future returned by a loader. Loads run on the UI thread, hence `Local`.
pub type LoadFuture = LocalBoxFuture<'static, LoadResult<Vec<PriceBar>>>;

/// Which edge of the loaded history a request extends.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum LoadDirection {
    Left,
    Right,
}

/// Source of additional history. Timeouts are the loader's concern.
pub trait DataLoader {
    /// Up to `count` bars strictly older than `edge`.
    fn load_more_left(&self, edge: Timestamp, count: usize) -> LoadFuture;

    /// Up to `count` bars strictly newer than `edge`.
    fn load_more_right(&self, edge: Timestamp, count: usize) -> LoadFuture;

    /// Called after every successful range mutation with the buffered index range.
    fn on_range_change(&self, _start_index: usize, _end_index: usize) {}
}
