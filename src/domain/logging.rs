//! Process-wide logger and clock, installed once at startup.

use derive_more::Display;
use once_cell::sync::OnceCell;
use std::fmt;

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Display)]
pub enum LogLevel {
    #[display(fmt = "TRACE")]
    Trace = 0,
    #[display(fmt = "DEBUG")]
    Debug = 1,
    #[display(fmt = " INFO")]
    Info = 2,
    #[display(fmt = " WARN")]
    Warn = 3,
}

/// Layer a message originates from.
#[derive(Debug, Clone, PartialEq, Eq, Display)]
pub enum LogComponent {
    #[display(fmt = "DOM:{}", _0)]
    Domain(&'static str),
    #[display(fmt = "APP:{}", _0)]
    Application(&'static str),
    #[display(fmt = "INF:{}", _0)]
    Infrastructure(&'static str),
    #[display(fmt = "PRE:{}", _0)]
    Presentation(&'static str),
}

#[derive(Debug, Clone)]
pub struct LogEntry {
    pub timestamp: i64,
    pub level: LogLevel,
    pub component: LogComponent,
    pub message: String,
}

impl LogEntry {
    pub fn new(level: LogLevel, component: LogComponent, message: impl Into<String>) -> Self {
        Self { timestamp: get_time_provider().current_timestamp(), level, component, message: message.into() }
    }
}

/// Clock abstraction, milliseconds since the Unix epoch.
pub trait TimeProvider: Send + Sync {
    fn current_timestamp(&self) -> i64;
    fn format_timestamp(&self, timestamp: i64) -> String;
}

pub trait Logger: Send + Sync {
    fn log(&self, entry: LogEntry);

    /// Entries below the logger's threshold are never formatted.
    fn enabled(&self, _level: LogLevel) -> bool {
        true
    }
}

static GLOBAL_LOGGER: OnceCell<Box<dyn Logger>> = OnceCell::new();
static GLOBAL_TIME_PROVIDER: OnceCell<Box<dyn TimeProvider>> = OnceCell::new();

/// Install the process-wide logger. Later calls are ignored.
pub fn init_logger(logger: Box<dyn Logger>) {
    let _ = GLOBAL_LOGGER.set(logger);
}

/// Install the process-wide clock. Later calls are ignored.
pub fn init_time_provider(time_provider: Box<dyn TimeProvider>) {
    let _ = GLOBAL_TIME_PROVIDER.set(time_provider);
}

pub fn get_logger() -> &'static dyn Logger {
    GLOBAL_LOGGER.get().map(|logger| logger.as_ref()).unwrap_or(&NoOpLogger)
}

pub fn get_time_provider() -> &'static dyn TimeProvider {
    GLOBAL_TIME_PROVIDER.get().map(|provider| provider.as_ref()).unwrap_or(&SystemClock)
}

/// Backend of the `log_*!` macros.
pub fn emit(level: LogLevel, component: LogComponent, args: fmt::Arguments<'_>) {
    let logger = get_logger();
    if logger.enabled(level) {
        logger.log(LogEntry::new(level, component, args.to_string()));
    }
}

struct NoOpLogger;
impl Logger for NoOpLogger {
    fn log(&self, _entry: LogEntry) {}

    fn enabled(&self, _level: LogLevel) -> bool {
        false
    }
}

struct SystemClock;
impl TimeProvider for SystemClock {
    fn current_timestamp(&self) -> i64 {
        chrono::Utc::now().timestamp_millis()
    }

    fn format_timestamp(&self, timestamp: i64) -> String {
        chrono::DateTime::from_timestamp_millis(timestamp)
            .map(|dt| dt.format("%H:%M:%S%.3f").to_string())
            .unwrap_or_else(|| format!("{timestamp:06}"))
    }
}

// Trace, debug and info compile away in release builds.

#[macro_export]
macro_rules! log_trace {
    ($component:expr, $($arg:tt)*) => {
        #[cfg(debug_assertions)]
        {
            $crate::domain::logging::emit($crate::domain::logging::LogLevel::Trace, $component, format_args!($($arg)*));
        }
    };
}

#[macro_export]
macro_rules! log_debug {
    ($component:expr, $($arg:tt)*) => {
        #[cfg(debug_assertions)]
        {
            $crate::domain::logging::emit($crate::domain::logging::LogLevel::Debug, $component, format_args!($($arg)*));
        }
    };
}

#[macro_export]
macro_rules! log_info {
    ($component:expr, $($arg:tt)*) => {
        #[cfg(debug_assertions)]
        {
            $crate::domain::logging::emit($crate::domain::logging::LogLevel::Info, $component, format_args!($($arg)*));
        }
    };
}

#[macro_export]
macro_rules! log_warn {
    ($component:expr, $($arg:tt)*) => {
        $crate::domain::logging::emit($crate::domain::logging::LogLevel::Warn, $component, format_args!($($arg)*))
    };
}
