use crate::domain::logging::{LogEntry, LogLevel, Logger, TimeProvider, get_time_provider};
use std::sync::{Arc, Mutex};

/// Console logger: browser console on wasm, stderr elsewhere.
pub struct ConsoleLogger {
    min_level: LogLevel,
}

impl ConsoleLogger {
    pub fn new(min_level: LogLevel) -> Self {
        Self { min_level }
    }

    pub fn new_production() -> Self {
        Self::new(LogLevel::Info)
    }

    pub fn new_development() -> Self {
        Self::new(LogLevel::Debug)
    }

    pub fn format_log_entry(&self, entry: &LogEntry) -> String {
        let timestamp = get_time_provider().format_timestamp(entry.timestamp);
        format!("[{}] {} {} | {}", timestamp, entry.level, entry.component, entry.message)
    }
}

impl Logger for ConsoleLogger {
    fn enabled(&self, level: LogLevel) -> bool {
        level >= self.min_level
    }

    fn log(&self, entry: LogEntry) {
        if !self.enabled(entry.level) {
            return;
        }
        let formatted = self.format_log_entry(&entry);

        #[cfg(target_arch = "wasm32")]
        {
            let line = wasm_bindgen::JsValue::from_str(&formatted);
            match entry.level {
                LogLevel::Trace | LogLevel::Debug => web_sys::console::debug_1(&line),
                LogLevel::Info => web_sys::console::info_1(&line),
                LogLevel::Warn => web_sys::console::warn_1(&line),
            }
        }

        #[cfg(not(target_arch = "wasm32"))]
        eprintln!("{formatted}");
    }
}

/// Logger that keeps entries in memory. Clones share the buffer.
#[derive(Clone, Default)]
pub struct MemoryLogger {
    entries: Arc<Mutex<Vec<LogEntry>>>,
}

impl MemoryLogger {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn entries(&self) -> Vec<LogEntry> {
        self.entries.lock().map(|e| e.clone()).unwrap_or_default()
    }

    pub fn count_at(&self, level: LogLevel) -> usize {
        self.entries.lock().map(|e| e.iter().filter(|x| x.level == level).count()).unwrap_or(0)
    }
}

impl Logger for MemoryLogger {
    fn log(&self, entry: LogEntry) {
        if let Ok(mut entries) = self.entries.lock() {
            entries.push(entry);
        }
    }
}

/// Clock backed by `Date.now()` on wasm, `chrono` elsewhere.
#[derive(Default)]
pub struct BrowserTimeProvider;

impl BrowserTimeProvider {
    pub fn new() -> Self {
        Self
    }
}

impl TimeProvider for BrowserTimeProvider {
    fn current_timestamp(&self) -> i64 {
        #[cfg(target_arch = "wasm32")]
        {
            js_sys::Date::now() as i64
        }
        #[cfg(not(target_arch = "wasm32"))]
        {
            chrono::Utc::now().timestamp_millis()
        }
    }

    fn format_timestamp(&self, timestamp: i64) -> String {
        chrono::DateTime::from_timestamp_millis(timestamp)
            .map(|dt| dt.format("%H:%M:%S%.3f").to_string())
            .unwrap_or_else(|| timestamp.to_string())
    }
}
