//! Internal logging system for the vgdemo engine
//!
//! This module provides a small logging system with:
//! - Customizable logger via Logger trait
//! - Severity levels (Trace, Debug, Info, Warn, Error)
//! - Colored console output by default, filtered by a minimum severity
//! - A process-wide logger behind an RwLock
//! - File and line information for detailed ERROR logs

use colored::*;
use std::sync::{OnceLock, RwLock};
use std::time::SystemTime;
use chrono::{DateTime, Local};

/// Environment variable read by `DefaultLogger::from_env()`
pub const LOG_ENV_VAR: &str = "VGDEMO_LOG";

/// Logger trait for custom logging implementations
///
/// Implement this trait to redirect engine logs (file logging, test capture, etc.)
///
/// # Example
///
/// ```no_run
/// use vgdemo_engine::vgdemo::log::{Logger, LogEntry};
///
/// struct FileLogger {
///     file: std::fs::File,
/// }
///
/// impl Logger for FileLogger {
///     fn log(&self, entry: &LogEntry) {
///         // Write to file...
///     }
/// }
/// ```
pub trait Logger: Send + Sync {
    /// Log an entry
    ///
    /// # Arguments
    ///
    /// * `entry` - The log entry to process
    fn log(&self, entry: &LogEntry);
}

/// Log entry containing all information about a log message
#[derive(Debug, Clone)]
pub struct LogEntry {
    /// Severity level (Trace, Debug, Info, Warn, Error)
    pub severity: LogSeverity,

    /// Timestamp when the log was created
    pub timestamp: SystemTime,

    /// Source module (e.g., "vgdemo::Device", "vgdemo::vulkan")
    pub source: String,

    /// Log message
    pub message: String,

    /// Source file (only for detailed ERROR logs)
    pub file: Option<&'static str>,

    /// Source line (only for detailed ERROR logs)
    pub line: Option<u32>,
}

/// Log severity levels
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
pub enum LogSeverity {
    /// Very verbose information (every device call report)
    Trace,

    /// Development/debugging information
    Debug,

    /// Important informational messages
    Info,

    /// Warning messages (non-fatal failures such as missing demo content)
    Warn,

    /// Error messages (with file:line details)
    Error,
}

impl LogSeverity {
    /// Parse a severity name (`trace`, `debug`, `info`, `warn`, `error`), case-insensitive
    pub fn from_name(name: &str) -> Option<Self> {
        match name.trim().to_ascii_lowercase().as_str() {
            "trace" => Some(LogSeverity::Trace),
            "debug" => Some(LogSeverity::Debug),
            "info" => Some(LogSeverity::Info),
            "warn" | "warning" => Some(LogSeverity::Warn),
            "error" => Some(LogSeverity::Error),
            _ => None,
        }
    }
}

/// Default logger implementation using colored console output
///
/// Colors:
/// - Trace: bright black
/// - Debug: cyan
/// - Info: green
/// - Warn: yellow
/// - Error: red + bold
///
/// Format:
/// - Normal: `[timestamp] [SEVERITY] [source] message`
/// - Error: `[timestamp] [ERROR] [source] message (file:line)`
pub struct DefaultLogger {
    min_severity: LogSeverity,
}

impl DefaultLogger {
    /// Create a logger with the build-dependent minimum severity
    /// (Debug in debug builds, Info in release builds)
    pub fn new() -> Self {
        let min_severity = if cfg!(debug_assertions) {
            LogSeverity::Debug
        } else {
            LogSeverity::Info
        };
        Self { min_severity }
    }

    /// Create a logger that drops entries below `min_severity`
    pub fn with_min_severity(min_severity: LogSeverity) -> Self {
        Self { min_severity }
    }

    /// Create a logger whose minimum severity comes from `VGDEMO_LOG`
    ///
    /// Unknown or missing values fall back to `DefaultLogger::new()`.
    pub fn from_env() -> Self {
        std::env::var(LOG_ENV_VAR)
            .ok()
            .and_then(|value| LogSeverity::from_name(&value))
            .map(Self::with_min_severity)
            .unwrap_or_default()
    }

    /// Minimum severity printed by this logger
    pub fn min_severity(&self) -> LogSeverity {
        self.min_severity
    }

    /// Whether an entry of the given severity would be printed
    pub fn enabled(&self, severity: LogSeverity) -> bool {
        severity >= self.min_severity
    }
}

impl Default for DefaultLogger {
    fn default() -> Self {
        Self::new()
    }
}

impl Logger for DefaultLogger {
    fn log(&self, entry: &LogEntry) {
        if !self.enabled(entry.severity) {
            return;
        }

        // Format timestamp as YYYY-MM-DD HH:MM:SS.mmm
        let datetime: DateTime<Local> = entry.timestamp.into();
        let timestamp = datetime.format("%Y-%m-%d %H:%M:%S%.3f").to_string();

        let severity_str = match entry.severity {
            LogSeverity::Trace => "TRACE".bright_black(),
            LogSeverity::Debug => "DEBUG".cyan(),
            LogSeverity::Info => "INFO ".green(),
            LogSeverity::Warn => "WARN ".yellow(),
            LogSeverity::Error => "ERROR".red().bold(),
        };

        let source = entry.source.bright_blue();

        if let (Some(file), Some(line)) = (entry.file, entry.line) {
            println!(
                "[{}] [{}] [{}] {} ({}:{})",
                timestamp,
                severity_str,
                source,
                entry.message,
                file,
                line
            );
        } else {
            println!(
                "[{}] [{}] [{}] {}",
                timestamp,
                severity_str,
                source,
                entry.message
            );
        }
    }
}

// ===== GLOBAL LOGGER =====

/// Global logger (initialized with DefaultLogger)
static LOGGER: OnceLock<RwLock<Box<dyn Logger>>> = OnceLock::new();

fn logger_lock() -> &'static RwLock<Box<dyn Logger>> {
    LOGGER.get_or_init(|| RwLock::new(Box::new(DefaultLogger::new())))
}

/// Set a custom logger
///
/// Replace the default logger with a custom implementation.
///
/// # Arguments
///
/// * `logger` - Any type implementing the Logger trait
pub fn set_logger<L: Logger + 'static>(logger: L) {
    if let Ok(mut lock) = logger_lock().write() {
        *lock = Box::new(logger);
    }
}

/// Reset logger to default (DefaultLogger::new())
pub fn reset_logger() {
    if let Ok(mut lock) = logger_lock().write() {
        *lock = Box::new(DefaultLogger::new());
    }
}

/// Internal logging method (for simple logs without file:line)
///
/// Used by macros like engine_info!, engine_warn!, etc.
///
/// # Arguments
///
/// * `severity` - Log severity level
/// * `source` - Source module (e.g., "vgdemo::Device")
/// * `message` - Log message
pub fn log(severity: LogSeverity, source: &str, message: String) {
    if let Ok(lock) = logger_lock().read() {
        lock.log(&LogEntry {
            severity,
            timestamp: SystemTime::now(),
            source: source.to_string(),
            message,
            file: None,
            line: None,
        });
    }
}

/// Internal logging method with file:line information (for ERROR logs)
///
/// Used by engine_error!, engine_err! and engine_bail! to include source location.
///
/// # Arguments
///
/// * `severity` - Log severity level (typically Error)
/// * `source` - Source module (e.g., "vgdemo::Device")
/// * `message` - Log message
/// * `file` - Source file path
/// * `line` - Source line number
pub fn log_detailed(
    severity: LogSeverity,
    source: &str,
    message: String,
    file: &'static str,
    line: u32,
) {
    if let Ok(lock) = logger_lock().read() {
        lock.log(&LogEntry {
            severity,
            timestamp: SystemTime::now(),
            source: source.to_string(),
            message,
            file: Some(file),
            line: Some(line),
        });
    }
}

// ===== LOGGING MACROS =====

/// Log a TRACE message (very verbose, typically filtered out)
///
/// # Example
///
/// ```no_run
/// # use vgdemo_engine::engine_trace;
/// engine_trace!("vgdemo::Device", "queue.submit_commands -> Success");
/// ```
#[macro_export]
macro_rules! engine_trace {
    ($source:expr, $($arg:tt)*) => {
        $crate::log::log(
            $crate::log::LogSeverity::Trace,
            $source,
            format!($($arg)*)
        )
    };
}

/// Log a DEBUG message (development information)
///
/// # Example
///
/// ```no_run
/// # use vgdemo_engine::engine_debug;
/// # let size = 0x10000;
/// engine_debug!("vgdemo::MemPool", "Created block of {} bytes", size);
/// ```
#[macro_export]
macro_rules! engine_debug {
    ($source:expr, $($arg:tt)*) => {
        $crate::log::log(
            $crate::log::LogSeverity::Debug,
            $source,
            format!($($arg)*)
        )
    };
}

/// Log an INFO message (important events)
///
/// # Example
///
/// ```no_run
/// # use vgdemo_engine::engine_info;
/// # let (width, height) = (1920, 1080);
/// engine_info!("vgdemo::Sample", "mode changed: {}x{}", width, height);
/// ```
#[macro_export]
macro_rules! engine_info {
    ($source:expr, $($arg:tt)*) => {
        $crate::log::log(
            $crate::log::LogSeverity::Info,
            $source,
            format!($($arg)*)
        )
    };
}

/// Log a WARN message (potential issues)
///
/// # Example
///
/// ```no_run
/// # use vgdemo_engine::engine_warn;
/// # let path = "images/image1.png";
/// engine_warn!("vgdemo::Demo", "Could not load image {}", path);
/// ```
#[macro_export]
macro_rules! engine_warn {
    ($source:expr, $($arg:tt)*) => {
        $crate::log::log(
            $crate::log::LogSeverity::Warn,
            $source,
            format!($($arg)*)
        )
    };
}

/// Log an ERROR message with file:line information
///
/// # Example
///
/// ```no_run
/// # use vgdemo_engine::engine_error;
/// # let error = "out of memory";
/// engine_error!("vgdemo::Device", "Failed to create image: {}", error);
/// ```
#[macro_export]
macro_rules! engine_error {
    ($source:expr, $($arg:tt)*) => {
        $crate::log::log_detailed(
            $crate::log::LogSeverity::Error,
            $source,
            format!($($arg)*),
            file!(),
            line!()
        )
    };
}

/// Log an ERROR message and evaluate to `Error::BackendError` carrying the same text
///
/// # Example
///
/// ```no_run
/// # use vgdemo_engine::engine_err;
/// # fn wait_idle() -> Result<(), i32> { Ok(()) }
/// # fn run() -> vgdemo_engine::vgdemo::Result<()> {
/// wait_idle().map_err(|e| engine_err!("vgdemo::vulkan", "Failed to wait idle: {:?}", e))?;
/// # Ok(())
/// # }
/// ```
#[macro_export]
macro_rules! engine_err {
    ($source:expr, $($arg:tt)*) => {{
        let message = format!($($arg)*);
        $crate::log::log_detailed(
            $crate::log::LogSeverity::Error,
            $source,
            message.clone(),
            file!(),
            line!()
        );
        $crate::vgdemo::Error::BackendError(message)
    }};
}

/// Log an ERROR message and return `Err(Error::BackendError(..))` from the enclosing function
///
/// # Example
///
/// ```no_run
/// # use vgdemo_engine::engine_bail;
/// # fn check(slot: usize) -> vgdemo_engine::vgdemo::Result<()> {
/// if slot >= 2 {
///     engine_bail!("vgdemo::vulkan", "slot {} out of range", slot);
/// }
/// # Ok(())
/// # }
/// ```
#[macro_export]
macro_rules! engine_bail {
    ($source:expr, $($arg:tt)*) => {
        return Err($crate::engine_err!($source, $($arg)*))
    };
}

#[cfg(test)]
#[path = "log_tests.rs"]
mod tests;
