//! Visible window, prefetch buffer, interaction and incremental loading.

use super::animation::{Animation, FrameHandle, FrameScheduler, MotionConfig, VelocityTracker};
use super::entities::{DataBlock, LoadOutcome, LoadReport};
use super::value_objects::{
    IndexRange, LodLevel, PanDelta, TimeRange, TimeframePreset, TimeframeSelection, ValueRange, ViewportState,
};
use crate::domain::errors::{ChartError, ChartResult};
use crate::domain::logging::{LogComponent, get_time_provider};
use crate::domain::market_data::{
    Aggregator, BarSeries, DAY_MS, DataLoader, DataValidationService, LoadDirection, MINUTE_MS, PriceBar, TimeInterval,
    max_volume, price_extremes,
};
use crate::time_utils;
use crate::{log_debug, log_info, log_warn};
use chrono::FixedOffset;
use futures::future::LocalBoxFuture;
use futures::stream::FuturesUnordered;
use futures::{FutureExt, StreamExt};
use serde::{Deserialize, Serialize};
use std::rc::Rc;
use std::str::FromStr;
use std::task::{Context, Poll};

const COMPONENT: LogComponent = LogComponent::Domain("Viewport");

/// Shortest visible span.
pub const MIN_TIME_SPAN_MS: i64 = 15 * MINUTE_MS;
/// Longest visible span (20 years).
pub const MAX_TIME_SPAN_MS: i64 = 20 * 365 * DAY_MS + 5 * DAY_MS;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ViewportConfig {
    pub width: f64,
    pub height: f64,
    pub min_time_span_ms: i64,
    pub max_time_span_ms: i64,
    /// Span changes smaller than this are ignored by zoom.
    pub min_span_change_ms: f64,
    /// Distance from a loaded edge that triggers a load.
    pub load_margin_ms: i64,
    pub load_batch_size: usize,
    pub price_padding: f64,
    pub volume_headroom: f64,
    pub utc_offset_minutes: i32,
    pub motion: MotionConfig,
}

impl Default for ViewportConfig {
    fn default() -> Self {
        Self {
            width: 800.0,
            height: 600.0,
            min_time_span_ms: MIN_TIME_SPAN_MS,
            max_time_span_ms: MAX_TIME_SPAN_MS,
            min_span_change_ms: 1_000.0,
            load_margin_ms: 7 * DAY_MS,
            load_batch_size: 500,
            price_padding: 0.08,
            volume_headroom: 0.10,
            utc_offset_minutes: 0,
            motion: MotionConfig::default(),
        }
    }
}

#[derive(Debug, Clone, Copy, Default)]
struct EdgeState {
    busy: bool,
    exhausted: bool,
}

/// Owns the bar sequence and everything derived from the visible window.
pub struct ViewportManager {
    config: ViewportConfig,
    offset: FixedOffset,
    bars: BarSeries,
    state: ViewportState,
    validator: DataValidationService,
    loader: Option<Rc<dyn DataLoader>>,
    scheduler: Option<Box<dyn FrameScheduler>>,
    pending_frame: Option<FrameHandle>,
    animation: Option<Animation>,
    velocity: VelocityTracker,
    drag_last_x: Option<f64>,
    left: EdgeState,
    right: EdgeState,
    pending_loads: FuturesUnordered<LocalBoxFuture<'static, LoadOutcome>>,
    blocks: Vec<DataBlock>,
    destroyed: bool,
}

impl Default for ViewportManager {
    fn default() -> Self {
        Self::new(ViewportConfig::default())
    }
}

impl ViewportManager {
    pub fn new(config: ViewportConfig) -> Self {
        let state = ViewportState { width: config.width, height: config.height, ..ViewportState::default() };
        Self {
            offset: time_utils::offset_from_minutes(config.utc_offset_minutes),
            config,
            bars: BarSeries::new(),
            state,
            validator: DataValidationService::new(),
            loader: None,
            scheduler: None,
            pending_frame: None,
            animation: None,
            velocity: VelocityTracker::default(),
            drag_last_x: None,
            left: EdgeState::default(),
            right: EdgeState::default(),
            pending_loads: FuturesUnordered::new(),
            blocks: Vec::new(),
            destroyed: false,
        }
    }

    pub fn with_loader(mut self, loader: Rc<dyn DataLoader>) -> Self {
        self.set_loader(Some(loader));
        self
    }

    pub fn with_scheduler(mut self, scheduler: Box<dyn FrameScheduler>) -> Self {
        self.scheduler = Some(scheduler);
        self
    }

    pub fn set_loader(&mut self, loader: Option<Rc<dyn DataLoader>>) {
        self.loader = loader;
        self.refresh_derived();
    }

    pub fn config(&self) -> &ViewportConfig {
        &self.config
    }

    pub fn utc_offset(&self) -> &FixedOffset {
        &self.offset
    }

    // ------------------------------------------------------------------
    // Data
    // ------------------------------------------------------------------

    /// Replace all bars. Invalid bars are dropped, the rest sorted and deduplicated.
    /// The view resets to the full data span, clamped to the span limits and
    /// ending at the last bar.
    pub fn set_data(&mut self, bars: Vec<PriceBar>) {
        let valid = self.validator.retain_valid(bars);
        self.bars = BarSeries::from_unsorted(valid);
        self.pending_loads = FuturesUnordered::new();
        self.left = EdgeState::default();
        self.right = EdgeState::default();
        self.blocks.clear();
        self.stop_animation();

        let now = get_time_provider().current_timestamp();
        self.blocks.extend(DataBlock::loaded(self.bars.as_slice(), None, now));
        self.reindex_blocks();

        if let Some(spacing) = self.bars.median_spacing_ms() {
            self.state.interval = TimeInterval::nearest(spacing);
        }

        match (self.bars.first(), self.bars.latest()) {
            (Some(first), Some(last)) => {
                let end = last.timestamp.as_f64();
                let span = self.clamp_span(end - first.timestamp.as_f64());
                self.state.visible = TimeRange::new(end - span, end);
            }
            _ => self.state.visible = TimeRange::default(),
        }
        self.state.timeframe = TimeframeSelection::Custom;

        log_info!(COMPONENT, "loaded {} bars ({})", self.bars.len(), self.state.interval);
        self.after_range_change();
    }

    pub fn bars(&self) -> &BarSeries {
        &self.bars
    }

    pub fn data_blocks(&self) -> &[DataBlock] {
        &self.blocks
    }

    pub fn visible_data(&self) -> &[PriceBar] {
        let range = self.bars.index_range(self.state.visible.start, self.state.visible.end);
        &self.bars.as_slice()[range]
    }

    /// Visible bars plus the prefetch buffer on each side.
    pub fn cached_data(&self) -> &[PriceBar] {
        let r = self.state.cached_range;
        &self.bars.as_slice()[r.start..r.end.min(self.bars.len())]
    }

    pub fn state(&self) -> ViewportState {
        self.state.clone()
    }

    // ------------------------------------------------------------------
    // Range mutation
    // ------------------------------------------------------------------

    /// Set the visible window. The span is clamped to the limits around its center.
    /// Without a loader the window is then moved inside the loaded data.
    pub fn set_visible_time_range(&mut self, start: f64, end: f64) -> ChartResult<()> {
        let requested = TimeRange::new(start, end);
        if !requested.is_valid() {
            return Err(ChartError::InvalidRange(format!("[{start}, {end}]")));
        }
        let span = self.clamp_span(requested.span());
        let center = requested.center();
        self.state.visible = self.fit_to_data(TimeRange::new(center - span / 2.0, center + span / 2.0));
        self.state.timeframe = TimeframeSelection::Custom;
        self.after_range_change();
        Ok(())
    }

    pub fn apply_timeframe_str(&mut self, preset: &str) -> ChartResult<()> {
        let preset =
            TimeframePreset::from_str(preset).map_err(|_| ChartError::UnknownTimeframe(preset.to_string()))?;
        self.apply_timeframe(preset);
        Ok(())
    }

    /// Show a preset window ending at the last bar, or at "now" without data.
    pub fn apply_timeframe(&mut self, preset: TimeframePreset) {
        let end = match self.bars.latest() {
            Some(bar) => bar.timestamp.value(),
            None => get_time_provider().current_timestamp(),
        };
        let data_start = self.bars.first().map(|b| b.timestamp.value());
        let start = preset.start_for(end, data_start, &self.offset);
        let span = self.clamp_span((end - start) as f64);
        let end = end as f64;

        self.state.visible = self.fit_to_data(TimeRange::new(end - span, end));
        self.state.timeframe = TimeframeSelection::Preset(preset);
        log_debug!(COMPONENT, "timeframe {} -> span {:.0} ms", preset, span);
        self.after_range_change();
    }

    /// Zoom by `factor` (>1 zooms in) keeping the time under `anchor_x` in place.
    /// Returns `false` when the span would not change meaningfully.
    pub fn zoom_at(&mut self, anchor_x: f64, factor: f64) -> bool {
        if !factor.is_finite() || factor <= 0.0 || !anchor_x.is_finite() {
            return false;
        }
        let visible = self.state.visible;
        let span = visible.span();
        if span <= 0.0 {
            return false;
        }
        let ratio = if self.state.width > 0.0 { (anchor_x / self.state.width).clamp(0.0, 1.0) } else { 0.5 };
        let anchor_time = visible.start + ratio * span;

        let new_span = self.clamp_span(span / factor);
        if (new_span - span).abs() < self.config.min_span_change_ms {
            return false;
        }
        let start = anchor_time - ratio * new_span;
        let next = self.fit_to_data(TimeRange::new(start, start + new_span));
        let moved = (next.start - visible.start).abs().max((next.end - visible.end).abs());
        if moved < self.config.min_span_change_ms {
            return false;
        }
        self.state.visible = next;
        self.state.timeframe = TimeframeSelection::Custom;
        self.after_range_change();
        true
    }

    /// Shift the window. Without a loader the view may not move further
    /// outside the loaded data.
    pub fn pan(&mut self, delta: PanDelta) -> bool {
        let dt = match delta {
            PanDelta::Pixels(dx) => {
                if self.state.pixels_per_ms <= 0.0 {
                    return false;
                }
                -dx / self.state.pixels_per_ms
            }
            PanDelta::Time(ms) => ms,
        };
        if !dt.is_finite() || dt == 0.0 {
            return false;
        }

        let next = self.state.visible.shifted(dt);
        if self.loader.is_none()
            && let (Some(first), Some(last)) = (self.bars.first(), self.bars.latest())
        {
            let escapes_left = dt < 0.0 && next.start < first.timestamp.as_f64();
            let escapes_right = dt > 0.0 && next.end > last.timestamp.as_f64();
            if escapes_left || escapes_right {
                return false;
            }
        }

        self.state.visible = next;
        self.state.timeframe = TimeframeSelection::Custom;
        self.after_range_change();
        true
    }

    pub fn resize(&mut self, width: f64, height: f64) {
        if width.is_finite() && height.is_finite() && width > 0.0 && height > 0.0 {
            self.state.width = width;
            self.state.height = height;
            self.refresh_derived();
        }
    }

    // ------------------------------------------------------------------
    // Coordinates and LOD
    // ------------------------------------------------------------------

    pub fn pixel_to_time(&self, x: f64) -> f64 {
        self.state.x_to_time(x)
    }

    pub fn time_to_pixel(&self, t: f64) -> f64 {
        self.state.time_to_x(t)
    }

    pub fn price_to_y(&self, price: f64) -> f64 {
        self.state.price_to_y(price)
    }

    pub fn y_to_price(&self, y: f64) -> f64 {
        self.state.y_to_price(y)
    }

    pub fn bars_per_pixel(&self) -> f64 {
        if self.state.width <= 0.0 {
            return 0.0;
        }
        self.visible_data().len() as f64 / self.state.width
    }

    pub fn current_lod(&self) -> LodLevel {
        LodLevel::for_density(self.bars_per_pixel())
    }

    /// Visible bars aggregated to the current level of detail.
    pub fn lod_data(&self) -> Vec<PriceBar> {
        Aggregator::downsample(self.visible_data(), self.current_lod().aggregation_factor)
    }

    // ------------------------------------------------------------------
    // Drag, momentum and smooth zoom
    // ------------------------------------------------------------------

    pub fn begin_drag(&mut self, x: f64, time_ms: f64) {
        self.stop_animation();
        self.velocity.reset();
        self.velocity.record(x, time_ms);
        self.drag_last_x = Some(x);
    }

    pub fn drag_to(&mut self, x: f64, time_ms: f64) -> bool {
        let Some(last) = self.drag_last_x else { return false };
        self.velocity.record(x, time_ms);
        self.drag_last_x = Some(x);
        self.pan(PanDelta::Pixels(x - last))
    }

    /// Release the pointer. Returns whether coasting started.
    pub fn end_drag(&mut self) -> bool {
        if self.drag_last_x.take().is_none() {
            return false;
        }
        let velocity = self.velocity.velocity();
        self.velocity.reset();
        if velocity.abs() <= self.config.motion.start_velocity || self.scheduler.is_none() {
            return false;
        }
        self.animation = Some(Animation::Momentum { velocity });
        self.schedule_frame();
        true
    }

    /// Spread a zoom over several frames. Without a scheduler the zoom is applied at once.
    pub fn smooth_zoom_at(&mut self, anchor_x: f64, factor: f64) -> bool {
        if !factor.is_finite() || factor <= 0.0 {
            return false;
        }
        let frames = self.config.motion.zoom_frames.max(1);
        if self.scheduler.is_none() || frames == 1 {
            return self.zoom_at(anchor_x, factor);
        }
        self.stop_animation();
        self.animation = Some(Animation::Zoom {
            anchor_x,
            step_factor: factor.powf(1.0 / frames as f64),
            remaining: frames,
        });
        self.schedule_frame();
        true
    }

    pub fn is_animating(&self) -> bool {
        self.animation.is_some()
    }

    /// Advance the running animation by one frame. Returns whether it continues.
    pub fn on_animation_frame(&mut self) -> bool {
        self.pending_frame = None;
        let next = match self.animation.take() {
            Some(Animation::Momentum { velocity }) => {
                let moved = self.pan(PanDelta::Pixels(velocity * self.config.motion.frame_ms));
                let velocity = velocity * self.config.motion.decay;
                (moved && velocity.abs() >= self.config.motion.stop_velocity)
                    .then_some(Animation::Momentum { velocity })
            }
            Some(Animation::Zoom { anchor_x, step_factor, remaining }) => {
                self.zoom_at(anchor_x, step_factor);
                (remaining > 1).then_some(Animation::Zoom { anchor_x, step_factor, remaining: remaining - 1 })
            }
            None => None,
        };
        self.animation = next;
        if self.animation.is_some() {
            self.schedule_frame();
        }
        self.animation.is_some()
    }

    fn schedule_frame(&mut self) {
        if self.pending_frame.is_none()
            && !self.destroyed
            && let Some(scheduler) = self.scheduler.as_mut()
        {
            self.pending_frame = Some(scheduler.request_frame());
        }
    }

    pub fn stop_animation(&mut self) {
        self.animation = None;
        if let (Some(handle), Some(scheduler)) = (self.pending_frame.take(), self.scheduler.as_mut()) {
            scheduler.cancel_frame(handle);
        }
    }

    // ------------------------------------------------------------------
    // Incremental loading
    // ------------------------------------------------------------------

    pub fn is_loading(&self, direction: LoadDirection) -> bool {
        self.edge(direction).busy
    }

    pub fn is_exhausted(&self, direction: LoadDirection) -> bool {
        self.edge(direction).exhausted
    }

    pub fn pending_load_count(&self) -> usize {
        self.pending_loads.len()
    }

    fn edge(&self, direction: LoadDirection) -> &EdgeState {
        match direction {
            LoadDirection::Left => &self.left,
            LoadDirection::Right => &self.right,
        }
    }

    fn edge_mut(&mut self, direction: LoadDirection) -> &mut EdgeState {
        match direction {
            LoadDirection::Left => &mut self.left,
            LoadDirection::Right => &mut self.right,
        }
    }

    /// Request more history for each edge the view is close to.
    fn check_edges(&mut self) {
        if self.destroyed || self.loader.is_none() {
            return;
        }
        let (Some(first), Some(last)) = (self.bars.first().copied(), self.bars.latest().copied()) else {
            return;
        };
        let margin = self.config.load_margin_ms as f64;
        let visible = self.state.visible;

        if visible.start - first.timestamp.as_f64() <= margin {
            self.request(LoadDirection::Left, first.timestamp.value());
        }
        if last.timestamp.as_f64() - visible.end <= margin {
            self.request(LoadDirection::Right, last.timestamp.value());
        }
    }

    fn request(&mut self, direction: LoadDirection, edge: i64) {
        let state = *self.edge(direction);
        if state.busy || state.exhausted {
            return;
        }
        let Some(loader) = self.loader.clone() else { return };
        self.edge_mut(direction).busy = true;

        let count = self.config.load_batch_size;
        let future = match direction {
            LoadDirection::Left => loader.load_more_left(edge.into(), count),
            LoadDirection::Right => loader.load_more_right(edge.into(), count),
        };
        self.pending_loads.push(async move { LoadOutcome { direction, result: future.await } }.boxed_local());
        self.blocks.push(DataBlock::pending(direction, edge, get_time_provider().current_timestamp()));
        log_debug!(COMPONENT, "requested {} bars {:?} of {}", count, direction, edge);
    }

    /// Merge every load that has already completed. Never blocks.
    pub fn poll_loads(&mut self) -> Vec<LoadReport> {
        let waker = futures::task::noop_waker();
        let mut cx = Context::from_waker(&waker);
        let mut ready = Vec::new();
        while let Poll::Ready(Some(outcome)) = self.pending_loads.poll_next_unpin(&mut cx) {
            ready.push(outcome);
        }
        ready.into_iter().map(|outcome| self.apply_load(outcome)).collect()
    }

    /// Wait for every outstanding load and merge the results.
    pub async fn settle_loads(&mut self) -> Vec<LoadReport> {
        let mut reports = Vec::new();
        while let Some(outcome) = self.pending_loads.next().await {
            reports.push(self.apply_load(outcome));
        }
        reports
    }

    fn apply_load(&mut self, outcome: LoadOutcome) -> LoadReport {
        let LoadOutcome { direction, result } = outcome;
        self.edge_mut(direction).busy = false;
        let pending = self.blocks.iter().rposition(|b| b.is_loading && b.direction == Some(direction));

        match result {
            Ok(bars) => {
                let valid = self.validator.retain_valid(bars);
                let now = get_time_provider().current_timestamp();
                let block = DataBlock::loaded(&valid, Some(direction), now);
                let added = self.bars.merge(valid);
                let exhausted = added == 0;
                match (pending, block) {
                    (Some(i), Some(block)) if added > 0 => self.blocks[i] = block,
                    (Some(i), _) => {
                        self.blocks.remove(i);
                    }
                    (None, _) => {}
                }
                if exhausted {
                    self.edge_mut(direction).exhausted = true;
                    log_info!(COMPONENT, "no more history {:?}", direction);
                } else {
                    log_info!(COMPONENT, "merged {} bars {:?}, total {}", added, direction, self.bars.len());
                }
                self.reindex_blocks();
                if added > 0 {
                    self.after_range_change();
                }
                LoadReport { direction, added, exhausted, error: None }
            }
            Err(err) => {
                if let Some(i) = pending {
                    self.blocks.remove(i);
                }
                log_warn!(COMPONENT, "load {:?} failed: {}", direction, err);
                LoadReport { direction, added: 0, exhausted: false, error: Some(err) }
            }
        }
    }

    fn reindex_blocks(&mut self) {
        let bars = &self.bars;
        for block in self.blocks.iter_mut().filter(|b| !b.is_loading) {
            block.reindex(bars);
        }
    }

    /// Stop all animation and discard outstanding loads.
    pub fn destroy(&mut self) {
        self.stop_animation();
        self.pending_loads = FuturesUnordered::new();
        self.left.busy = false;
        self.right.busy = false;
        self.blocks.retain(|b| !b.is_loading);
        self.destroyed = true;
    }

    pub fn is_destroyed(&self) -> bool {
        self.destroyed
    }

    // ------------------------------------------------------------------
    // Derived state
    // ------------------------------------------------------------------

    fn clamp_span(&self, span: f64) -> f64 {
        span.clamp(self.config.min_time_span_ms as f64, self.config.max_time_span_ms as f64)
    }

    /// Without a loader, keep `range` inside `[first bar, last bar]`. The span is kept
    /// when it fits and shrunk to the data span otherwise, never below the minimum span.
    fn fit_to_data(&self, range: TimeRange) -> TimeRange {
        if self.loader.is_some() {
            return range;
        }
        let (Some(first), Some(last)) = (self.bars.first(), self.bars.latest()) else {
            return range;
        };
        let (lo, hi) = (first.timestamp.as_f64(), last.timestamp.as_f64());
        let data_span = hi - lo;
        let span = range.span();
        if data_span < self.config.min_time_span_ms as f64 {
            // shorter than the minimum span: center on the data
            let center = lo + data_span / 2.0;
            return TimeRange::new(center - span / 2.0, center + span / 2.0);
        }
        if span >= data_span {
            return TimeRange::new(lo, hi);
        }
        let start = range.start.clamp(lo, hi - span);
        TimeRange::new(start, start + span)
    }

    fn after_range_change(&mut self) {
        self.refresh_derived();
        self.touch_blocks();
        if let Some(loader) = &self.loader {
            loader.on_range_change(self.state.cached_range.start, self.state.cached_range.end);
        }
        self.check_edges();
    }

    fn touch_blocks(&mut self) {
        let visible = self.state.visible;
        let now = get_time_provider().current_timestamp();
        for block in self.blocks.iter_mut().filter(|b| !b.is_loading) {
            if (block.end_time as f64) >= visible.start && (block.start_time as f64) <= visible.end {
                block.last_access_time = now;
            }
        }
    }

    fn refresh_derived(&mut self) {
        let visible = self.state.visible;
        let span = visible.span();
        self.state.pixels_per_ms = if span > 0.0 { self.state.width / span } else { 0.0 };

        let vis = self.bars.index_range(visible.start, visible.end);
        self.state.cached_range = if self.loader.is_none() {
            IndexRange::new(0, self.bars.len())
        } else {
            let buffer = vis.len() / 2 + 10;
            IndexRange::new(vis.start.saturating_sub(buffer), (vis.end + buffer).min(self.bars.len()))
        };

        self.state.zoom_level = match (self.bars.first(), self.bars.latest()) {
            (Some(first), Some(last)) if span > 0.0 && last.timestamp > first.timestamp => {
                (last.timestamp.value() - first.timestamp.value()) as f64 / span
            }
            _ => 1.0,
        };

        let slice = &self.bars.as_slice()[vis];
        if let Some((lo, hi)) = price_extremes(slice) {
            self.state.price_range = self.padded_price_range(lo, hi);
        }
        if let Some(max) = max_volume(slice) {
            self.state.volume_range = if max > 0.0 {
                ValueRange::new(0.0, max * (1.0 + self.config.volume_headroom))
            } else {
                ValueRange::new(0.0, 1.0)
            };
        }
    }

    fn padded_price_range(&self, lo: f64, hi: f64) -> ValueRange {
        let range = hi - lo;
        let pad = if range > 0.0 { range * self.config.price_padding } else { (hi.abs() * 0.01).max(0.01) };
        let min = if lo >= 0.0 { (lo - pad).max(0.0) } else { lo - pad };
        ValueRange::new(min, hi + pad)
    }
}

impl Drop for ViewportManager {
    fn drop(&mut self) {
        self.stop_animation();
    }
}
