use futures::FutureExt;
use futures::channel::oneshot;
use futures::executor::block_on;
use price_chart_core::domain::chart::{PanDelta, ViewportConfig, ViewportManager};
use price_chart_core::domain::errors::{LoadError, LoadResult};
use price_chart_core::domain::market_data::{
    DAY_MS, DataLoader, LoadDirection, LoadFuture, OHLCV, Price, PriceBar, Timestamp, Volume,
};
use std::cell::RefCell;
use std::collections::VecDeque;
use std::rc::Rc;

const T0: i64 = 1_600_000_000_000;

fn make_bar(i: i64) -> PriceBar {
    PriceBar::new(
        Timestamp::from_millis(T0 + i * DAY_MS),
        OHLCV::new(
            Price::from(1.0),
            Price::from(1.5),
            Price::from(0.5),
            Price::from(1.2),
            Volume::from(1.0),
        ),
    )
}

type Call = (LoadDirection, i64, usize);

/// Answers immediately from a per-direction script; an empty script means "no more".
#[derive(Default)]
struct ScriptedLoader {
    calls: RefCell<Vec<Call>>,
    left: RefCell<VecDeque<LoadResult<Vec<PriceBar>>>>,
    right: RefCell<VecDeque<LoadResult<Vec<PriceBar>>>>,
    ranges: RefCell<Vec<(usize, usize)>>,
}

impl ScriptedLoader {
    fn respond(&self, direction: LoadDirection, edge: Timestamp, count: usize) -> LoadFuture {
        self.calls.borrow_mut().push((direction, edge.value(), count));
        let script = match direction {
            LoadDirection::Left => &self.left,
            LoadDirection::Right => &self.right,
        };
        let result = script.borrow_mut().pop_front().unwrap_or(Ok(Vec::new()));
        futures::future::ready(result).boxed_local()
    }

    fn calls_for(&self, direction: LoadDirection) -> usize {
        self.calls.borrow().iter().filter(|(d, _, _)| *d == direction).count()
    }
}

impl DataLoader for ScriptedLoader {
    fn load_more_left(&self, edge: Timestamp, count: usize) -> LoadFuture {
        self.respond(LoadDirection::Left, edge, count)
    }

    fn load_more_right(&self, edge: Timestamp, count: usize) -> LoadFuture {
        self.respond(LoadDirection::Right, edge, count)
    }

    fn on_range_change(&self, start_index: usize, end_index: usize) {
        self.ranges.borrow_mut().push((start_index, end_index));
    }
}

/// Hands out futures that stay pending until the test resolves them.
#[derive(Default)]
struct DeferredLoader {
    pending: RefCell<Vec<(LoadDirection, oneshot::Sender<LoadResult<Vec<PriceBar>>>)>>,
}

impl DeferredLoader {
    fn defer(&self, direction: LoadDirection) -> LoadFuture {
        let (tx, rx) = oneshot::channel();
        self.pending.borrow_mut().push((direction, tx));
        rx.map(|answer| answer.unwrap_or_else(|_| Err(LoadError::Network("dropped".to_string()))))
            .boxed_local()
    }

    fn resolve(&self, direction: LoadDirection, result: LoadResult<Vec<PriceBar>>) {
        let mut pending = self.pending.borrow_mut();
        if let Some(i) = pending.iter().position(|(d, _)| *d == direction) {
            let (_, tx) = pending.remove(i);
            let _ = tx.send(result);
        }
    }

    fn outstanding(&self) -> usize {
        self.pending.borrow().len()
    }
}

impl DataLoader for DeferredLoader {
    fn load_more_left(&self, _edge: Timestamp, _count: usize) -> LoadFuture {
        self.defer(LoadDirection::Left)
    }

    fn load_more_right(&self, _edge: Timestamp, _count: usize) -> LoadFuture {
        self.defer(LoadDirection::Right)
    }
}

fn timestamps(vm: &ViewportManager) -> Vec<i64> {
    vm.bars().as_slice().iter().map(|b| b.timestamp.value()).collect()
}

#[test]
fn edges_are_requested_with_their_timestamps() {
    let loader = Rc::new(ScriptedLoader::default());
    let mut vm = ViewportManager::default().with_loader(loader.clone());
    vm.set_data((0..100).map(make_bar).collect());

    let calls = loader.calls.borrow().clone();
    assert_eq!(
        calls,
        vec![
            (LoadDirection::Left, T0, ViewportConfig::default().load_batch_size),
            (LoadDirection::Right, T0 + 99 * DAY_MS, ViewportConfig::default().load_batch_size),
        ]
    );
    assert!(vm.is_loading(LoadDirection::Left));
    assert!(vm.is_loading(LoadDirection::Right));
    assert_eq!(vm.data_blocks().iter().filter(|b| b.is_loading).count(), 2);
}

#[test]
fn backfill_merges_older_history() {
    let loader = Rc::new(ScriptedLoader::default());
    loader.left.borrow_mut().push_back(Ok((-30..0).map(make_bar).collect()));
    let mut vm = ViewportManager::default().with_loader(loader.clone());
    vm.set_data((0..100).map(make_bar).collect());

    let reports = block_on(vm.settle_loads());

    assert_eq!(reports.len(), 2);
    let left = reports.iter().find(|r| r.direction == LoadDirection::Left).unwrap();
    assert_eq!(left.added, 30);
    assert!(!left.exhausted);
    let right = reports.iter().find(|r| r.direction == LoadDirection::Right).unwrap();
    assert!(right.exhausted && right.is_ok());

    let expected: Vec<i64> = (-30..100).map(|i| T0 + i * DAY_MS).collect();
    assert_eq!(timestamps(&vm), expected);
    assert!(vm.is_exhausted(LoadDirection::Right));
    assert!(!vm.is_loading(LoadDirection::Left));
    // the visible window did not move, so the new left edge is out of reach
    assert_eq!(loader.calls_for(LoadDirection::Left), 1);

    let blocks = vm.data_blocks();
    assert!(blocks.iter().all(|b| !b.is_loading));
    let older = blocks.iter().find(|b| b.direction == Some(LoadDirection::Left)).unwrap();
    assert_eq!((older.start_index, older.end_index, older.bar_count), (0, 30, 30));
    assert!(loader.ranges.borrow().iter().all(|(s, e)| s <= e && *e <= vm.bars().len()));
}

#[test]
fn duplicate_bars_are_not_counted() {
    let loader = Rc::new(ScriptedLoader::default());
    loader.left.borrow_mut().push_back(Ok((-5..5).map(make_bar).collect()));
    let mut vm = ViewportManager::default().with_loader(loader.clone());
    vm.set_data((0..100).map(make_bar).collect());

    let reports = block_on(vm.settle_loads());
    let left = reports.iter().find(|r| r.direction == LoadDirection::Left).unwrap();
    assert_eq!(left.added, 5);
    assert_eq!(vm.bars().len(), 105);
    let stamps = timestamps(&vm);
    assert!(stamps.windows(2).all(|w| w[0] < w[1]));
}

#[test]
fn only_duplicates_marks_edge_exhausted() {
    let loader = Rc::new(ScriptedLoader::default());
    loader.left.borrow_mut().push_back(Ok((0..10).map(make_bar).collect()));
    let mut vm = ViewportManager::default().with_loader(loader.clone());
    vm.set_data((0..100).map(make_bar).collect());

    block_on(vm.settle_loads());
    assert!(vm.is_exhausted(LoadDirection::Left));

    vm.pan(PanDelta::Pixels(50.0));
    assert_eq!(loader.calls_for(LoadDirection::Left), 1);
}

#[test]
fn no_duplicate_request_while_busy() {
    let loader = Rc::new(DeferredLoader::default());
    let mut vm = ViewportManager::default().with_loader(loader.clone());
    vm.set_data((0..100).map(make_bar).collect());
    assert_eq!(loader.outstanding(), 2);

    vm.pan(PanDelta::Pixels(30.0));
    vm.zoom_at(100.0, 0.5);
    assert!(vm.poll_loads().is_empty());
    assert_eq!(loader.outstanding(), 2);
    assert_eq!(vm.pending_load_count(), 2);

    loader.resolve(LoadDirection::Left, Ok((-20..0).map(make_bar).collect()));
    let reports = vm.poll_loads();
    assert_eq!(reports.len(), 1);
    assert_eq!(reports[0].added, 20);
    assert!(vm.is_loading(LoadDirection::Right));
}

#[test]
fn failed_load_can_be_retried() {
    let loader = Rc::new(ScriptedLoader::default());
    loader.left.borrow_mut().push_back(Err(LoadError::Network("timeout".to_string())));
    loader.left.borrow_mut().push_back(Ok((-10..0).map(make_bar).collect()));
    let mut vm = ViewportManager::default().with_loader(loader.clone());
    vm.set_data((0..100).map(make_bar).collect());

    let reports = vm.poll_loads();
    let left = reports.iter().find(|r| r.direction == LoadDirection::Left).unwrap();
    assert_eq!(left.error, Some(LoadError::Network("timeout".to_string())));
    assert!(!left.exhausted);
    assert!(!vm.is_loading(LoadDirection::Left));
    assert!(!vm.is_exhausted(LoadDirection::Left));
    assert_eq!(vm.bars().len(), 100);

    // the next range mutation near the edge asks again
    vm.pan(PanDelta::Time(-1.0));
    assert_eq!(loader.calls_for(LoadDirection::Left), 2);
    block_on(vm.settle_loads());
    assert_eq!(vm.bars().len(), 110);
}

#[test]
fn destroy_discards_outstanding_loads() {
    let loader = Rc::new(DeferredLoader::default());
    let mut vm = ViewportManager::default().with_loader(loader.clone());
    vm.set_data((0..100).map(make_bar).collect());

    vm.destroy();
    loader.resolve(LoadDirection::Left, Ok((-20..0).map(make_bar).collect()));

    assert!(vm.poll_loads().is_empty());
    assert_eq!(vm.bars().len(), 100);
    assert!(!vm.is_loading(LoadDirection::Left));
    assert_eq!(vm.pending_load_count(), 0);
}
