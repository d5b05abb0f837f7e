/// Fatal error sink - every failed device call ends the process
///
/// The sink logs each report like `LogErrorSink`. On failure it shows the
/// report on an `ErrorSurface` and calls its exit function with
/// `FATAL_EXIT_STATUS`. Nothing is released on that path.

use colored::Colorize;

use crate::device::{DebugReport, ErrorSink, LogErrorSink};

/// Process exit status after a fatal device error
pub const FATAL_EXIT_STATUS: i32 = 1;

/// Host-level surface that displays a fatal error to the user
pub trait ErrorSurface: Send + Sync {
    /// # Arguments
    ///
    /// * `context` - Device call that failed
    /// * `message` - Failure description
    /// * `code` - Numeric result code
    fn show(&self, context: &str, message: &str, code: u32);
}

/// Prints a highlighted banner to stderr
#[derive(Debug, Default, Clone, Copy)]
pub struct ConsoleErrorSurface;

impl ErrorSurface for ConsoleErrorSurface {
    fn show(&self, context: &str, message: &str, code: u32) {
        eprintln!("{}", " FATAL GPU ERROR ".on_red().white().bold());
        eprintln!("  {} {}", "Context:".bold(), context);
        eprintln!("  {} {}", "Message:".bold(), message);
        eprintln!("  {} {}", "Result:".bold(), code);
    }
}

type ExitFn = Box<dyn Fn(i32) + Send + Sync>;

/// Error sink that logs, then terminates the process on failure
pub struct FatalErrorSink {
    surface: Box<dyn ErrorSurface>,
    exit: ExitFn,
}

impl std::fmt::Debug for FatalErrorSink {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("FatalErrorSink").finish_non_exhaustive()
    }
}

impl FatalErrorSink {
    /// Sink exiting through `std::process::exit`
    pub fn new(surface: impl ErrorSurface + 'static) -> Self {
        Self::with_exit(surface, |status| {
            std::process::exit(status);
        })
    }

    /// Sink with a custom exit function
    ///
    /// The device keeps propagating the error if `exit` returns.
    pub fn with_exit(surface: impl ErrorSurface + 'static, exit: impl Fn(i32) + Send + Sync + 'static) -> Self {
        Self {
            surface: Box::new(surface),
            exit: Box::new(exit),
        }
    }
}

impl ErrorSink for FatalErrorSink {
    fn report(&self, report: &DebugReport<'_>) {
        LogErrorSink.report(report);
        if report.result.is_success() {
            return;
        }

        self.surface.show(report.context, report.message, report.result.code());
        (self.exit)(FATAL_EXIT_STATUS);
    }
}

#[cfg(test)]
#[path = "fatal_tests.rs"]
mod tests;
