/// Vulkan Debug Messenger - routes validation layer messages into the engine log
///
/// Messages are filtered by severity, counted, grouped by text (repeated
/// messages carry a `[xN]` marker) and forwarded to the engine logger under
/// the `vgdemo::vulkan::validation` source.

use ash::vk;
use colored::*;
use rustc_hash::FxHashMap;
use std::ffi::CStr;
use std::sync::atomic::{AtomicU32, Ordering};
use std::sync::Mutex;
use vgdemo_engine::{engine_debug, engine_error, engine_trace, engine_warn};

const VALIDATION_SOURCE: &str = "vgdemo::vulkan::validation";

/// Global debug configuration (shared across callbacks)
static DEBUG_CONFIG: Mutex<Option<Config>> = Mutex::new(None);

/// Global validation statistics (thread-safe atomic counters)
static VALIDATION_STATS: ValidationStatsTracker = ValidationStatsTracker::new();

/// Occurrence count per message text
static MESSAGE_TRACKER: Mutex<Option<FxHashMap<String, u32>>> = Mutex::new(None);

/// Which validation messages reach the log
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum DebugSeverity {
    ErrorsOnly,
    #[default]
    ErrorsAndWarnings,
    All,
}

/// Validation message counts since the messenger was installed
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct ValidationStats {
    pub errors: u32,
    pub warnings: u32,
    pub info: u32,
    pub verbose: u32,
}

impl ValidationStats {
    pub fn total(&self) -> u32 {
        self.errors + self.warnings + self.info + self.verbose
    }
}

/// Debug configuration for the callback
#[derive(Debug, Clone, Copy)]
pub(crate) struct Config {
    pub severity: DebugSeverity,
    pub panic_on_error: bool,
    pub enable_stats: bool,
}

struct ValidationStatsTracker {
    errors: AtomicU32,
    warnings: AtomicU32,
    info: AtomicU32,
    verbose: AtomicU32,
}

impl ValidationStatsTracker {
    const fn new() -> Self {
        Self {
            errors: AtomicU32::new(0),
            warnings: AtomicU32::new(0),
            info: AtomicU32::new(0),
            verbose: AtomicU32::new(0),
        }
    }

    fn increment(&self, severity: vk::DebugUtilsMessageSeverityFlagsEXT) {
        let counter = if severity.contains(vk::DebugUtilsMessageSeverityFlagsEXT::ERROR) {
            &self.errors
        } else if severity.contains(vk::DebugUtilsMessageSeverityFlagsEXT::WARNING) {
            &self.warnings
        } else if severity.contains(vk::DebugUtilsMessageSeverityFlagsEXT::INFO) {
            &self.info
        } else {
            &self.verbose
        };
        counter.fetch_add(1, Ordering::Relaxed);
    }

    fn get_stats(&self) -> ValidationStats {
        ValidationStats {
            errors: self.errors.load(Ordering::Relaxed),
            warnings: self.warnings.load(Ordering::Relaxed),
            info: self.info.load(Ordering::Relaxed),
            verbose: self.verbose.load(Ordering::Relaxed),
        }
    }

    fn reset(&self) {
        self.errors.store(0, Ordering::Relaxed);
        self.warnings.store(0, Ordering::Relaxed);
        self.info.store(0, Ordering::Relaxed);
        self.verbose.store(0, Ordering::Relaxed);
    }
}

/// Initialize debug configuration (resets statistics and message grouping)
pub(crate) fn init_debug_config(config: Config) {
    VALIDATION_STATS.reset();
    if let Ok(mut tracker) = MESSAGE_TRACKER.lock() {
        *tracker = Some(FxHashMap::default());
    }
    if let Ok(mut current) = DEBUG_CONFIG.lock() {
        *current = Some(config);
    }
}

/// Forget the configuration once the messenger is destroyed
pub(crate) fn cleanup_debug_config() {
    if let Ok(mut current) = DEBUG_CONFIG.lock() {
        *current = None;
    }
    if let Ok(mut tracker) = MESSAGE_TRACKER.lock() {
        *tracker = None;
    }
}

/// Get current validation statistics
pub fn get_validation_stats() -> ValidationStats {
    VALIDATION_STATS.get_stats()
}

/// Print validation statistics report
pub fn print_validation_stats_report() {
    let stats = get_validation_stats();

    if stats.total() == 0 {
        println!("\n{}", "No validation messages".green().bold());
        return;
    }

    println!("\n{}", "=== Validation Statistics Report ===".bright_blue().bold());
    if stats.errors > 0 {
        println!("  {} {}", "Errors:".red().bold(), stats.errors);
    }
    if stats.warnings > 0 {
        println!("  {} {}", "Warnings:".yellow().bold(), stats.warnings);
    }
    if stats.info > 0 {
        println!("  {} {}", "Info:".cyan(), stats.info);
    }
    if stats.verbose > 0 {
        println!("  {} {}", "Verbose:".bright_black(), stats.verbose);
    }
    println!("  {} {}", "Total:".white().bold(), stats.total());

    if let Ok(tracker) = MESSAGE_TRACKER.lock() {
        if let Some(messages) = tracker.as_ref() {
            let repeated = messages.values().filter(|&&count| count > 1).count();
            if repeated > 0 {
                println!("\n  {} message(s) appeared multiple times", repeated);
            }
        }
    }

    println!("{}\n", "====================================".bright_blue().bold());
}

/// Messenger severity flags requested for a severity setting
pub(crate) fn severity_flags(severity: DebugSeverity) -> vk::DebugUtilsMessageSeverityFlagsEXT {
    match severity {
        DebugSeverity::ErrorsOnly => vk::DebugUtilsMessageSeverityFlagsEXT::ERROR,
        DebugSeverity::ErrorsAndWarnings => {
            vk::DebugUtilsMessageSeverityFlagsEXT::ERROR
                | vk::DebugUtilsMessageSeverityFlagsEXT::WARNING
        }
        DebugSeverity::All => {
            vk::DebugUtilsMessageSeverityFlagsEXT::ERROR
                | vk::DebugUtilsMessageSeverityFlagsEXT::WARNING
                | vk::DebugUtilsMessageSeverityFlagsEXT::INFO
                | vk::DebugUtilsMessageSeverityFlagsEXT::VERBOSE
        }
    }
}

/// Short label of a message type
pub(crate) fn message_type_label(message_type: vk::DebugUtilsMessageTypeFlagsEXT) -> &'static str {
    if message_type.contains(vk::DebugUtilsMessageTypeFlagsEXT::VALIDATION) {
        "Validation"
    } else if message_type.contains(vk::DebugUtilsMessageTypeFlagsEXT::PERFORMANCE) {
        "Performance"
    } else {
        "General"
    }
}

fn track_message(message: &str) -> u32 {
    match MESSAGE_TRACKER.lock() {
        Ok(mut tracker) => {
            let messages = tracker.get_or_insert_with(FxHashMap::default);
            let count = messages.entry(message.to_string()).or_insert(0);
            *count += 1;
            *count
        }
        Err(_) => 1,
    }
}

unsafe fn c_str_or<'a>(ptr: *const std::os::raw::c_char, fallback: &'a str) -> std::borrow::Cow<'a, str> {
    if ptr.is_null() {
        std::borrow::Cow::Borrowed(fallback)
    } else {
        CStr::from_ptr(ptr).to_string_lossy()
    }
}

/// Vulkan debug messenger callback
///
/// Called by the validation layers when they detect issues. Never aborts the
/// Vulkan call that triggered it (always returns `VK_FALSE`).
pub(crate) unsafe extern "system" fn vulkan_debug_callback(
    message_severity: vk::DebugUtilsMessageSeverityFlagsEXT,
    message_type: vk::DebugUtilsMessageTypeFlagsEXT,
    p_callback_data: *const vk::DebugUtilsMessengerCallbackDataEXT,
    _user_data: *mut std::os::raw::c_void,
) -> vk::Bool32 {
    if p_callback_data.is_null() {
        return vk::FALSE;
    }
    let callback_data = *p_callback_data;
    let message_id_name = c_str_or(callback_data.p_message_id_name, "Unknown");
    let message = c_str_or(callback_data.p_message, "No message");

    let config = match DEBUG_CONFIG.lock() {
        Ok(guard) => match *guard {
            Some(config) => config,
            None => return vk::FALSE,
        },
        Err(_) => return vk::FALSE,
    };

    if !severity_flags(config.severity).intersects(message_severity) {
        return vk::FALSE;
    }

    let occurrence_count = if config.enable_stats {
        VALIDATION_STATS.increment(message_severity);
        track_message(&message)
    } else {
        1
    };
    let repeat_indicator = if occurrence_count > 1 {
        format!(" [x{}]", occurrence_count)
    } else {
        String::new()
    };
    let type_str = message_type_label(message_type);

    if message_severity.contains(vk::DebugUtilsMessageSeverityFlagsEXT::ERROR) {
        engine_error!(VALIDATION_SOURCE, "[{}]{} {}: {}", type_str, repeat_indicator, message_id_name, message);
        if config.panic_on_error {
            panic!("Vulkan validation error (strict mode)\n  Message ID: {}\n  Message: {}", message_id_name, message);
        }
    } else if message_severity.contains(vk::DebugUtilsMessageSeverityFlagsEXT::WARNING) {
        engine_warn!(VALIDATION_SOURCE, "[{}]{} {}: {}", type_str, repeat_indicator, message_id_name, message);
    } else if message_severity.contains(vk::DebugUtilsMessageSeverityFlagsEXT::INFO) {
        engine_debug!(VALIDATION_SOURCE, "[{}]{} {}: {}", type_str, repeat_indicator, message_id_name, message);
    } else {
        engine_trace!(VALIDATION_SOURCE, "[{}]{} {}: {}", type_str, repeat_indicator, message_id_name, message);
    }

    vk::FALSE
}
