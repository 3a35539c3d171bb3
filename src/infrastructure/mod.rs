//! Infrastructure: logging sinks, clocks, wire DTOs and browser adapters.

pub mod dto;
pub mod services;

#[cfg(target_arch = "wasm32")]
pub mod js_bridge;
