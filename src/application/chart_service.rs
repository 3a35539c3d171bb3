use crate::{
    config::ChartConfig,
    domain::{
        chart::{
            AxisTick, FrameScheduler, LabelBox, LabelCollisionResolver, LabelResolution, LoadReport, LodLevel,
            PanDelta, PriceAxis, PriceAxisCalculator, ScaleMode, TimeAxis, TimeAxisCalculator, ViewportManager,
            ViewportState,
        },
        errors::{ChartError, ChartResult},
        logging::LogComponent,
        market_data::{DataLoader, IndicatorEngine, IndicatorParams, IndicatorRecord, PriceBar},
    },
    log_debug,
};
use serde::Serialize;
use std::rc::Rc;
use std::sync::Arc;

const COMPONENT: LogComponent = LogComponent::Application("ChartService");

/// Approximate glyph metrics used to size label boxes.
const CHAR_WIDTH_PX: f64 = 7.0;
const LABEL_HEIGHT_PX: f64 = 14.0;
const LABEL_PADDING_PX: f64 = 6.0;

/// Which axis a resolved label belongs to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum LabelKind {
    Time,
    Price,
    CurrentPrice,
}

/// Text attached to a resolved label box.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct FrameLabel {
    pub kind: LabelKind,
    pub text: String,
    pub bounds: LabelBox,
}

/// Everything a renderer needs to paint one frame.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ChartFrame {
    pub state: ViewportState,
    pub time_axis: TimeAxis,
    pub price_axis: PriceAxis,
    pub labels: Vec<FrameLabel>,
    pub hidden_labels: usize,
    pub label_density: f64,
    pub current_price: Option<f64>,
    pub lod: LodLevel,
    pub bars: Vec<PriceBar>,
}

/// Composes the viewport, both axis calculators, the label resolver and the indicator engine.
pub struct ChartApplicationService {
    viewport: ViewportManager,
    time_axis: TimeAxisCalculator,
    price_axis: PriceAxisCalculator,
    labels: LabelCollisionResolver,
    indicators: IndicatorEngine,
    scale_mode: ScaleMode,
}

impl Default for ChartApplicationService {
    fn default() -> Self {
        Self::new(ChartConfig::default())
    }
}

impl ChartApplicationService {
    pub fn new(config: ChartConfig) -> Self {
        let ChartConfig { viewport, time_axis, price_axis, labels, indicators } = config;
        Self {
            viewport: ViewportManager::new(viewport),
            time_axis: TimeAxisCalculator::new(time_axis),
            price_axis: PriceAxisCalculator::new(price_axis),
            labels: LabelCollisionResolver::new(labels),
            indicators: IndicatorEngine::new(indicators),
            scale_mode: ScaleMode::Linear,
        }
    }

    pub fn with_loader(mut self, loader: Rc<dyn DataLoader>) -> Self {
        self.viewport.set_loader(Some(loader));
        self
    }

    pub fn with_scheduler(mut self, scheduler: Box<dyn FrameScheduler>) -> Self {
        self.viewport = self.viewport.with_scheduler(scheduler);
        self
    }

    pub fn viewport(&self) -> &ViewportManager {
        &self.viewport
    }

    pub fn viewport_mut(&mut self) -> &mut ViewportManager {
        &mut self.viewport
    }

    pub fn indicators(&self) -> &IndicatorEngine {
        &self.indicators
    }

    pub fn scale_mode(&self) -> ScaleMode {
        self.scale_mode
    }

    pub fn set_scale_mode(&mut self, mode: ScaleMode) {
        self.scale_mode = mode;
    }

    /// Replace the bars. Cached indicator series keyed on old data are dropped.
    pub fn set_data(&mut self, bars: Vec<PriceBar>) {
        self.viewport.set_data(bars);
        self.indicators.clear_cache();
    }

    pub fn set_visible_time_range(&mut self, start: f64, end: f64) -> ChartResult<()> {
        self.viewport.set_visible_time_range(start, end)
    }

    pub fn apply_timeframe(&mut self, preset: &str) -> ChartResult<()> {
        self.viewport.apply_timeframe_str(preset)
    }

    pub fn zoom_at(&mut self, anchor_x: f64, factor: f64) -> bool {
        self.viewport.zoom_at(anchor_x, factor)
    }

    pub fn pan(&mut self, delta: PanDelta) -> bool {
        self.viewport.pan(delta)
    }

    pub fn resize(&mut self, width: f64, height: f64) {
        self.viewport.resize(width, height);
    }

    pub fn on_animation_frame(&mut self) -> bool {
        self.viewport.on_animation_frame()
    }

    pub fn poll_loads(&mut self) -> Vec<LoadReport> {
        self.viewport.poll_loads()
    }

    pub async fn settle_loads(&mut self) -> Vec<LoadReport> {
        self.viewport.settle_loads().await
    }

    /// Build the axes and labels for the current view.
    pub fn frame(&self) -> ChartResult<ChartFrame> {
        let state = self.viewport.state();
        if self.viewport.bars().is_empty() {
            return Err(ChartError::MissingInput("no bars loaded".to_string()));
        }

        let time_axis = self.time_axis.compute(state.visible, state.width)?;
        let price_axis = self.price_axis.compute(
            state.price_range.min,
            state.price_range.max,
            state.height,
            self.price_axis.config().min_tick_spacing_px,
            self.scale_mode,
        )?;

        let current_price = self.viewport.visible_data().last().map(|bar| bar.ohlcv.close.value());
        let mut candidates = Vec::new();
        candidates.extend(time_axis.ticks.iter().map(|tick| time_label(tick, &state)));
        candidates.extend(price_axis.ticks.iter().map(|tick| price_label(tick, &state)));

        let mut critical = Vec::new();
        if let Some(price) = current_price {
            let text = format!("{:.*}", price_axis.decimals.max(2), price);
            let y = self.viewport.price_to_y(price);
            critical.push(candidates.len());
            candidates.push(placed(LabelKind::CurrentPrice, text, |w| (state.width - w, y - LABEL_HEIGHT_PX / 2.0)));
        }

        let boxes: Vec<LabelBox> = candidates
            .iter()
            .enumerate()
            .map(|(id, label)| LabelBox { id, ..label.bounds })
            .collect();
        let resolution = self.labels.resolve_with_critical(&boxes, &critical, self.labels.config().min_spacing_px);
        let labels = attach_text(&candidates, &resolution);

        log_debug!(
            COMPONENT,
            "frame: {} time ticks, {} price ticks, {} labels hidden",
            time_axis.ticks.len(),
            price_axis.ticks.len(),
            resolution.hidden.len()
        );

        Ok(ChartFrame {
            time_axis,
            price_axis,
            labels,
            hidden_labels: resolution.hidden.len(),
            label_density: resolution.density,
            current_price,
            lod: self.viewport.current_lod(),
            bars: self.viewport.lod_data(),
            state,
        })
    }

    /// Indicator series over the visible bars.
    pub fn visible_indicator(&mut self, id: &str, params: &IndicatorParams) -> ChartResult<Arc<Vec<IndicatorRecord>>> {
        let bars = self.viewport.visible_data();
        self.indicators.calculate(id, bars, params)
    }

    /// Indicator series over every loaded bar.
    pub fn indicator(&mut self, id: &str, params: &IndicatorParams) -> ChartResult<Arc<Vec<IndicatorRecord>>> {
        let bars = self.viewport.bars().as_slice();
        self.indicators.calculate(id, bars, params)
    }

    /// Risk metric over the visible closes, optionally against a benchmark series.
    pub fn visible_metric(&mut self, metric: &str, benchmark: Option<&[f64]>) -> ChartResult<f64> {
        let closes: Vec<f64> = self.viewport.visible_data().iter().map(|b| b.ohlcv.close.value()).collect();
        self.indicators.calculate_scalar(metric, &closes, benchmark)
    }

    pub fn destroy(&mut self) {
        self.viewport.destroy();
        self.indicators.clear_cache();
    }
}

fn text_width(text: &str) -> f64 {
    text.chars().count() as f64 * CHAR_WIDTH_PX + LABEL_PADDING_PX
}

fn placed(kind: LabelKind, text: String, origin: impl FnOnce(f64) -> (f64, f64)) -> FrameLabel {
    let width = text_width(&text);
    let (x, y) = origin(width);
    let priority = match kind {
        LabelKind::CurrentPrice => 100,
        LabelKind::Time | LabelKind::Price => 0,
    };
    FrameLabel { kind, bounds: LabelBox::new(0, x, y, width, LABEL_HEIGHT_PX).with_priority(priority), text }
}

/// Centered under the tick along the bottom edge.
fn time_label(tick: &AxisTick, state: &ViewportState) -> FrameLabel {
    let mut label = placed(LabelKind::Time, tick.label.clone(), |w| {
        (tick.position - w / 2.0, state.height - LABEL_HEIGHT_PX)
    });
    label.bounds.is_major = tick.is_major;
    if tick.is_key_boundary {
        label.bounds.priority += 1;
    }
    label
}

/// Right-aligned against the price scale.
fn price_label(tick: &AxisTick, state: &ViewportState) -> FrameLabel {
    let mut label = placed(LabelKind::Price, tick.label.clone(), |w| {
        (state.width - w, tick.position - LABEL_HEIGHT_PX / 2.0)
    });
    label.bounds.is_major = tick.is_major;
    label
}

fn attach_text(candidates: &[FrameLabel], resolution: &LabelResolution) -> Vec<FrameLabel> {
    resolution
        .visible
        .iter()
        .filter_map(|b| {
            candidates.get(b.id).map(|c| FrameLabel { kind: c.kind, text: c.text.clone(), bounds: *b })
        })
        .collect()
}
