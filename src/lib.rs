pub mod application;
pub mod config;
pub mod domain;
pub mod infrastructure;
pub mod presentation;
pub mod time_utils;

pub use application::{ChartApplicationService, ChartFrame};
pub use config::ChartConfig;
pub use domain::errors::{ChartError, ChartResult, LoadError};

/// Install the panic hook, console logger and browser clock.
#[cfg(target_arch = "wasm32")]
#[wasm_bindgen::prelude::wasm_bindgen(start)]
pub fn initialize() {
    console_error_panic_hook::set_once();

    let console_logger = if cfg!(debug_assertions) {
        infrastructure::services::ConsoleLogger::new_development()
    } else {
        infrastructure::services::ConsoleLogger::new_production()
    };
    domain::logging::init_logger(Box::new(console_logger));
    domain::logging::init_time_provider(Box::new(infrastructure::services::BrowserTimeProvider::new()));

    crate::log_info!(domain::logging::LogComponent::Presentation("Initialize"), "chart core initialized");
}
