//! Adapters from browser APIs to the domain seams.

use super::dto;
use crate::domain::chart::{FrameHandle, FrameScheduler};
use crate::domain::errors::LoadError;
use crate::domain::logging::LogComponent;
use crate::domain::market_data::{DataLoader, LoadFuture, Timestamp};
use crate::log_warn;
use futures::FutureExt;
use js_sys::{Function, JSON, Promise, Reflect};
use wasm_bindgen::JsCast;
use wasm_bindgen::closure::Closure;
use wasm_bindgen::prelude::*;
use wasm_bindgen_futures::JsFuture;

/// `requestAnimationFrame` scheduler. The callback owns the frame handling.
pub struct JsFrameScheduler {
    callback: Closure<dyn FnMut(f64)>,
}

impl JsFrameScheduler {
    pub fn new(on_frame: impl FnMut(f64) + 'static) -> Self {
        Self { callback: Closure::wrap(Box::new(on_frame) as Box<dyn FnMut(f64)>) }
    }
}

impl FrameScheduler for JsFrameScheduler {
    fn request_frame(&mut self) -> FrameHandle {
        let id = web_sys::window()
            .and_then(|w| w.request_animation_frame(self.callback.as_ref().unchecked_ref()).ok())
            .unwrap_or_default();
        FrameHandle(id as u64)
    }

    fn cancel_frame(&mut self, handle: FrameHandle) {
        if let Some(window) = web_sys::window() {
            let _ = window.cancel_animation_frame(handle.0 as i32);
        }
    }
}

/// Wraps a JS object exposing Promise-returning `loadMoreLeft(edge, count)`,
/// `loadMoreRight(edge, count)` and an optional `onRangeChange(start, end)`.
pub struct JsDataLoader {
    target: JsValue,
}

impl JsDataLoader {
    pub fn new(target: JsValue) -> Self {
        Self { target }
    }

    fn method(&self, name: &str) -> Option<Function> {
        Reflect::get(&self.target, &JsValue::from_str(name)).ok()?.dyn_into::<Function>().ok()
    }

    fn call(&self, name: &'static str, edge: Timestamp, count: usize) -> LoadFuture {
        let called = match self.method(name) {
            Some(f) => f
                .call2(&self.target, &JsValue::from_f64(edge.as_f64()), &JsValue::from_f64(count as f64))
                .map_err(|e| LoadError::Rejected(format!("{name} threw: {e:?}"))),
            None => Err(LoadError::Rejected(format!("loader has no {name}"))),
        };

        async move {
            let value = JsFuture::from(Promise::resolve(&called?))
                .await
                .map_err(|e| LoadError::Network(format!("{e:?}")))?;
            let json = JSON::stringify(&value).map_err(|e| LoadError::Malformed(format!("{e:?}")))?;
            dto::parse_bars(&String::from(json))
        }
        .boxed_local()
    }
}

impl DataLoader for JsDataLoader {
    fn load_more_left(&self, edge: Timestamp, count: usize) -> LoadFuture {
        self.call("loadMoreLeft", edge, count)
    }

    fn load_more_right(&self, edge: Timestamp, count: usize) -> LoadFuture {
        self.call("loadMoreRight", edge, count)
    }

    fn on_range_change(&self, start_index: usize, end_index: usize) {
        if let Some(f) = self.method("onRangeChange")
            && let Err(e) =
                f.call2(&self.target, &JsValue::from_f64(start_index as f64), &JsValue::from_f64(end_index as f64))
        {
            log_warn!(LogComponent::Infrastructure("JsDataLoader"), "onRangeChange threw: {:?}", e);
        }
    }
}
