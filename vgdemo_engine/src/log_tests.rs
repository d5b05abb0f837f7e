//! Unit tests for log.rs
//!
//! Tests Logger trait, LogEntry, LogSeverity, DefaultLogger and the global logger.

use crate::log::{self, Logger, LogEntry, LogSeverity, DefaultLogger};
use serial_test::serial;
use std::sync::{Arc, Mutex};
use std::time::SystemTime;

// ============================================================================
// TEST LOGGER IMPLEMENTATION
// ============================================================================

/// Test logger that captures log entries for verification
struct TestLogger {
    entries: Arc<Mutex<Vec<LogEntry>>>,
}

impl TestLogger {
    fn new() -> (Self, Arc<Mutex<Vec<LogEntry>>>) {
        let entries = Arc::new(Mutex::new(Vec::new()));
        (Self { entries: entries.clone() }, entries)
    }
}

impl Logger for TestLogger {
    fn log(&self, entry: &LogEntry) {
        self.entries.lock().unwrap().push(entry.clone());
    }
}

/// Entries logged from one source (other tests may log concurrently)
fn entries_from(entries: &Arc<Mutex<Vec<LogEntry>>>, source: &str) -> Vec<LogEntry> {
    entries
        .lock()
        .unwrap()
        .iter()
        .filter(|e| e.source == source)
        .cloned()
        .collect()
}

// ============================================================================
// LOG SEVERITY TESTS
// ============================================================================

#[test]
fn test_log_severity_ordering() {
    assert!(LogSeverity::Trace < LogSeverity::Debug);
    assert!(LogSeverity::Debug < LogSeverity::Info);
    assert!(LogSeverity::Info < LogSeverity::Warn);
    assert!(LogSeverity::Warn < LogSeverity::Error);
}

#[test]
fn test_log_severity_from_name() {
    assert_eq!(LogSeverity::from_name("trace"), Some(LogSeverity::Trace));
    assert_eq!(LogSeverity::from_name("DEBUG"), Some(LogSeverity::Debug));
    assert_eq!(LogSeverity::from_name(" info "), Some(LogSeverity::Info));
    assert_eq!(LogSeverity::from_name("warning"), Some(LogSeverity::Warn));
    assert_eq!(LogSeverity::from_name("error"), Some(LogSeverity::Error));
    assert_eq!(LogSeverity::from_name("verbose"), None);
}

// ============================================================================
// LOG ENTRY TESTS
// ============================================================================

#[test]
fn test_log_entry_creation_with_file_line() {
    let entry = LogEntry {
        severity: LogSeverity::Error,
        timestamp: SystemTime::now(),
        source: "vgdemo::Device".to_string(),
        message: "image creation failed".to_string(),
        file: Some("device.rs"),
        line: Some(42),
    };

    assert_eq!(entry.severity, LogSeverity::Error);
    assert_eq!(entry.file, Some("device.rs"));
    assert_eq!(entry.line, Some(42));
}

// ============================================================================
// DEFAULT LOGGER TESTS
// ============================================================================

#[test]
fn test_default_logger_filters_below_min_severity() {
    let logger = DefaultLogger::with_min_severity(LogSeverity::Warn);
    assert_eq!(logger.min_severity(), LogSeverity::Warn);
    assert!(!logger.enabled(LogSeverity::Info));
    assert!(logger.enabled(LogSeverity::Warn));
    assert!(logger.enabled(LogSeverity::Error));
}

#[test]
fn test_default_logger_prints_all_severities() {
    let logger = DefaultLogger::with_min_severity(LogSeverity::Trace);
    for severity in [
        LogSeverity::Trace,
        LogSeverity::Debug,
        LogSeverity::Info,
        LogSeverity::Warn,
        LogSeverity::Error,
    ] {
        logger.log(&LogEntry {
            severity,
            timestamp: SystemTime::now(),
            source: "vgdemo::Test".to_string(),
            message: format!("{:?} message", severity),
            file: None,
            line: None,
        });
    }
}

#[test]
fn test_default_logger_build_default() {
    let logger = DefaultLogger::default();
    if cfg!(debug_assertions) {
        assert_eq!(logger.min_severity(), LogSeverity::Debug);
    } else {
        assert_eq!(logger.min_severity(), LogSeverity::Info);
    }
}

#[test]
fn test_logger_trait_is_send_sync() {
    fn assert_send_sync<T: Send + Sync>() {}
    assert_send_sync::<DefaultLogger>();
    assert_send_sync::<TestLogger>();
}

// ============================================================================
// GLOBAL LOGGER TESTS
// ============================================================================

#[test]
#[serial]
fn test_global_logger_receives_macro_output() {
    let (test_logger, entries) = TestLogger::new();
    log::set_logger(test_logger);

    crate::engine_info!("vgdemo::LogTest", "value = {}", 7);
    crate::engine_warn!("vgdemo::LogTest", "careful");
    crate::engine_error!("vgdemo::LogTest", "broken {}", "thing");

    let captured = entries_from(&entries, "vgdemo::LogTest");
    log::reset_logger();

    assert_eq!(captured.len(), 3);
    assert_eq!(captured[0].severity, LogSeverity::Info);
    assert_eq!(captured[0].message, "value = 7");
    assert!(captured[0].file.is_none());
    assert_eq!(captured[2].severity, LogSeverity::Error);
    assert_eq!(captured[2].message, "broken thing");
    assert!(captured[2].file.is_some());
    assert!(captured[2].line.is_some());
}

#[test]
#[serial]
fn test_engine_err_logs_and_builds_backend_error() {
    let (test_logger, entries) = TestLogger::new();
    log::set_logger(test_logger);

    let err = crate::engine_err!("vgdemo::LogTest", "code {}", 3);

    let captured = entries_from(&entries, "vgdemo::LogTest");
    log::reset_logger();

    assert_eq!(err, crate::error::Error::BackendError("code 3".to_string()));
    assert_eq!(captured.len(), 1);
    assert_eq!(captured[0].severity, LogSeverity::Error);
}

fn bail_when(fail: bool) -> crate::error::Result<u32> {
    if fail {
        crate::engine_bail!("vgdemo::LogTest", "bailing out");
    }
    Ok(1)
}

#[test]
#[serial]
fn test_engine_bail_returns_early() {
    let (test_logger, entries) = TestLogger::new();
    log::set_logger(test_logger);

    let ok = bail_when(false);
    let failed = bail_when(true);

    let captured = entries_from(&entries, "vgdemo::LogTest");
    log::reset_logger();

    assert_eq!(ok, Ok(1));
    assert!(matches!(failed, Err(crate::error::Error::BackendError(ref m)) if m == "bailing out"));
    assert_eq!(captured.len(), 1);
}

#[test]
#[serial]
fn test_reset_logger_detaches_custom_logger() {
    let (test_logger, entries) = TestLogger::new();
    log::set_logger(test_logger);
    log::reset_logger();

    crate::engine_info!("vgdemo::LogTest", "after reset");

    assert!(entries_from(&entries, "vgdemo::LogTest").is_empty());
}
