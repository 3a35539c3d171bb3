use crate::application::ChartApplicationService;
use crate::config::ChartConfig;
use crate::domain::chart::{LoadReport, PanDelta, ScaleMode};
use crate::domain::errors::ChartError;
use crate::domain::logging::LogComponent;
use crate::domain::market_data::{DataLoader, IndicatorParams};
use crate::infrastructure::dto;
use crate::infrastructure::js_bridge::{JsDataLoader, JsFrameScheduler};
use crate::{log_debug, log_info};
use js_sys::Promise;
use std::cell::{Cell, RefCell};
use std::rc::{Rc, Weak};
use wasm_bindgen::prelude::*;
use wasm_bindgen_futures::{JsFuture, future_to_promise, spawn_local};

const COMPONENT: LogComponent = LogComponent::Presentation("ChartEngineApi");

/// Delay between polls of outstanding loads.
const SETTLE_POLL_MS: i32 = 16;

impl From<ChartError> for JsValue {
    fn from(err: ChartError) -> Self {
        JsValue::from_str(&err.to_string())
    }
}

type SharedService = Rc<RefCell<ChartApplicationService>>;

/// JavaScript handle to one chart. Structured values cross the boundary as JSON strings.
#[wasm_bindgen]
pub struct ChartEngineApi {
    service: SharedService,
    /// Set while a background task is polling loads.
    driving: Rc<Cell<bool>>,
}

#[wasm_bindgen]
impl ChartEngineApi {
    /// `config_json` may be omitted or partial; missing sections use defaults.
    #[wasm_bindgen(constructor)]
    pub fn new(config_json: Option<String>) -> Result<ChartEngineApi, JsValue> {
        let config = match config_json.as_deref() {
            Some(json) => ChartConfig::from_json(json)?,
            None => ChartConfig::default(),
        };
        let driving = Rc::new(Cell::new(false));
        let service = Rc::new_cyclic(|weak: &Weak<RefCell<ChartApplicationService>>| {
            let weak = weak.clone();
            let driving = Rc::clone(&driving);
            let scheduler = JsFrameScheduler::new(move |_timestamp| {
                if let Some(service) = weak.upgrade()
                    && let Ok(mut service) = service.try_borrow_mut()
                {
                    service.on_animation_frame();
                    service.poll_loads();
                }
                // momentum may have crossed a load margin
                drive_loads(weak.clone(), Rc::clone(&driving));
            });
            RefCell::new(ChartApplicationService::new(config).with_scheduler(Box::new(scheduler)))
        });
        log_info!(COMPONENT, "chart engine created");
        Ok(Self { service, driving })
    }

    /// Install a loader object with `loadMoreLeft`/`loadMoreRight` returning Promises of bars.
    #[wasm_bindgen(js_name = setLoader)]
    pub fn set_loader(&self, loader: JsValue) {
        let loader: Option<Rc<dyn DataLoader>> = if loader.is_null() || loader.is_undefined() {
            None
        } else {
            Some(Rc::new(JsDataLoader::new(loader)))
        };
        self.service.borrow_mut().viewport_mut().set_loader(loader);
        self.drive();
    }

    /// Replace all bars from a JSON array of objects or kline tuples.
    #[wasm_bindgen(js_name = setData)]
    pub fn set_data(&self, bars_json: &str) -> Result<usize, JsValue> {
        let bars = dto::parse_bars(bars_json).map_err(ChartError::from)?;
        let count = {
            let mut service = self.service.borrow_mut();
            service.set_data(bars);
            service.viewport().bars().len()
        };
        self.drive();
        Ok(count)
    }

    #[wasm_bindgen(js_name = setVisibleRange)]
    pub fn set_visible_range(&self, start: f64, end: f64) -> Result<(), JsValue> {
        self.service.borrow_mut().set_visible_time_range(start, end)?;
        self.drive();
        Ok(())
    }

    #[wasm_bindgen(js_name = applyTimeframe)]
    pub fn apply_timeframe(&self, preset: &str) -> Result<(), JsValue> {
        self.service.borrow_mut().apply_timeframe(preset)?;
        self.drive();
        Ok(())
    }

    #[wasm_bindgen(js_name = zoomAt)]
    pub fn zoom_at(&self, anchor_x: f64, factor: f64) -> bool {
        let changed = self.service.borrow_mut().zoom_at(anchor_x, factor);
        self.drive();
        changed
    }

    #[wasm_bindgen(js_name = smoothZoomAt)]
    pub fn smooth_zoom_at(&self, anchor_x: f64, factor: f64) -> bool {
        self.service.borrow_mut().viewport_mut().smooth_zoom_at(anchor_x, factor)
    }

    /// Shift by a drag distance in pixels.
    #[wasm_bindgen]
    pub fn pan(&self, dx: f64) -> bool {
        let changed = self.service.borrow_mut().pan(PanDelta::Pixels(dx));
        self.drive();
        changed
    }

    #[wasm_bindgen(js_name = panTime)]
    pub fn pan_time(&self, delta_ms: f64) -> bool {
        let changed = self.service.borrow_mut().pan(PanDelta::Time(delta_ms));
        self.drive();
        changed
    }

    #[wasm_bindgen(js_name = beginDrag)]
    pub fn begin_drag(&self, x: f64, time_ms: f64) {
        self.service.borrow_mut().viewport_mut().begin_drag(x, time_ms);
    }

    #[wasm_bindgen(js_name = dragTo)]
    pub fn drag_to(&self, x: f64, time_ms: f64) -> bool {
        let changed = self.service.borrow_mut().viewport_mut().drag_to(x, time_ms);
        self.drive();
        changed
    }

    #[wasm_bindgen(js_name = endDrag)]
    pub fn end_drag(&self) -> bool {
        let changed = self.service.borrow_mut().viewport_mut().end_drag();
        self.drive();
        changed
    }

    #[wasm_bindgen]
    pub fn resize(&self, width: f64, height: f64) {
        self.service.borrow_mut().resize(width, height);
        self.drive();
    }

    /// `{"mode":"linear"}`, `{"mode":"logarithmic"}` or `{"mode":"percentage","base":100}`.
    #[wasm_bindgen(js_name = setScaleMode)]
    pub fn set_scale_mode(&self, mode_json: &str) -> Result<(), JsValue> {
        let mode: ScaleMode = serde_json::from_str(mode_json).map_err(ChartError::from)?;
        self.service.borrow_mut().set_scale_mode(mode);
        Ok(())
    }

    /// Axes, resolved labels and level-of-detail bars for the current view.
    #[wasm_bindgen]
    pub fn frame(&self) -> Result<String, JsValue> {
        let frame = self.service.borrow().frame()?;
        Ok(serde_json::to_string(&frame).map_err(ChartError::from)?)
    }

    #[wasm_bindgen(js_name = viewportState)]
    pub fn viewport_state(&self) -> Result<String, JsValue> {
        let state = self.service.borrow().viewport().state();
        Ok(serde_json::to_string(&state).map_err(ChartError::from)?)
    }

    /// Indicator series over the visible bars. `params_json` is an object such as `{"period":20}`.
    #[wasm_bindgen]
    pub fn indicator(&self, id: &str, params_json: Option<String>) -> Result<String, JsValue> {
        let params: IndicatorParams = match params_json.as_deref() {
            Some(json) => serde_json::from_str(json).map_err(ChartError::from)?,
            None => IndicatorParams::new(),
        };
        let series = self.service.borrow_mut().visible_indicator(id, &params)?;
        Ok(serde_json::to_string(series.as_ref()).map_err(ChartError::from)?)
    }

    /// Risk metric over the visible closes.
    #[wasm_bindgen]
    pub fn metric(&self, name: &str, benchmark: Option<Vec<f64>>) -> Result<f64, JsValue> {
        Ok(self.service.borrow_mut().visible_metric(name, benchmark.as_deref())?)
    }

    /// Merge completed loads without waiting. Loads are also merged in the
    /// background, so reports already merged there are not repeated here.
    #[wasm_bindgen(js_name = pollLoads)]
    pub fn poll_loads(&self) -> Result<String, JsValue> {
        let reports = self.service.borrow_mut().poll_loads();
        reports_json(&reports)
    }

    /// Resolves with the merged reports once no load is outstanding.
    #[wasm_bindgen(js_name = settleLoads)]
    pub fn settle_loads(&self) -> Promise {
        let service = Rc::clone(&self.service);
        future_to_promise(async move {
            let mut reports = Vec::new();
            loop {
                let pending = {
                    let mut service = service.borrow_mut();
                    reports.extend(service.poll_loads());
                    service.viewport().pending_load_count()
                };
                if pending == 0 {
                    break;
                }
                sleep(SETTLE_POLL_MS).await?;
            }
            reports_json(&reports).map(|json| JsValue::from_str(&json))
        })
    }

    #[wasm_bindgen(js_name = indicatorStats)]
    pub fn indicator_stats(&self) -> Result<String, JsValue> {
        let stats = self.service.borrow().indicators().stats();
        Ok(serde_json::to_string(&stats).map_err(ChartError::from)?)
    }

    /// Stop animation and drop outstanding loads.
    #[wasm_bindgen]
    pub fn destroy(&self) {
        self.service.borrow_mut().destroy();
        log_info!(COMPONENT, "chart engine destroyed");
    }
}

impl ChartEngineApi {
    fn drive(&self) {
        drive_loads(Rc::downgrade(&self.service), Rc::clone(&self.driving));
    }
}

/// Poll outstanding loads from the JS event loop until none is left or the
/// chart is dropped. At most one such task runs per chart.
fn drive_loads(service: Weak<RefCell<ChartApplicationService>>, driving: Rc<Cell<bool>>) {
    let Some(shared) = service.upgrade() else { return };
    let pending = match shared.try_borrow() {
        Ok(chart) => chart.viewport().pending_load_count(),
        // mid-frame: the frame callback drives again afterwards
        Err(_) => 0,
    };
    drop(shared);
    if pending == 0 || driving.replace(true) {
        return;
    }
    spawn_local(async move {
        loop {
            if sleep(SETTLE_POLL_MS).await.is_err() {
                break;
            }
            let Some(shared) = service.upgrade() else { break };
            let Ok(mut chart) = shared.try_borrow_mut() else { continue };
            let reports = chart.poll_loads();
            if !reports.is_empty() {
                log_debug!(COMPONENT, "merged {} load(s) in background", reports.len());
            }
            if chart.viewport().pending_load_count() == 0 {
                break;
            }
        }
        driving.set(false);
    });
}

fn reports_json(reports: &[LoadReport]) -> Result<String, JsValue> {
    Ok(serde_json::to_string(reports).map_err(ChartError::from)?)
}

async fn sleep(ms: i32) -> Result<(), JsValue> {
    let promise = Promise::new(&mut |resolve, _reject| {
        let scheduled = web_sys::window()
            .is_some_and(|w| w.set_timeout_with_callback_and_timeout_and_arguments_0(&resolve, ms).is_ok());
        if !scheduled {
            let _ = resolve.call0(&JsValue::UNDEFINED);
        }
    });
    JsFuture::from(promise).await.map(|_| ())
}
