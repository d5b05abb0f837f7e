/// Device call reports and the error sink they are delivered to

use std::fmt;

use crate::error::Error;

/// Result code of one device call
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum DeviceResult {
    Success,
    Fail,
    Timeout,
    OutOfMemory,
    NotImplemented,
    MisalignedSize,
    MisalignedData,
    BadInput,
    BadFlags,
    BadState,
}

impl DeviceResult {
    pub fn is_success(self) -> bool {
        self == DeviceResult::Success
    }

    /// Numeric code shown on the error surface
    pub fn code(self) -> u32 {
        match self {
            DeviceResult::Success => 0,
            DeviceResult::Fail => 1,
            DeviceResult::Timeout => 2,
            DeviceResult::OutOfMemory => 3,
            DeviceResult::NotImplemented => 4,
            DeviceResult::MisalignedSize => 5,
            DeviceResult::MisalignedData => 6,
            DeviceResult::BadInput => 7,
            DeviceResult::BadFlags => 8,
            DeviceResult::BadState => 9,
        }
    }
}

impl fmt::Display for DeviceResult {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{:?} ({})", self, self.code())
    }
}

impl From<&Error> for DeviceResult {
    fn from(error: &Error) -> Self {
        match error {
            Error::BackendError(_) => DeviceResult::Fail,
            Error::OutOfMemory => DeviceResult::OutOfMemory,
            Error::InvalidResource(_) => DeviceResult::BadInput,
            Error::InitializationFailed(_) => DeviceResult::Fail,
            Error::InvalidState(_) => DeviceResult::BadState,
            Error::AssetLoadFailed(_) => DeviceResult::BadInput,
        }
    }
}

/// Outcome of one device call, delivered to the error sink
#[derive(Debug, Clone, Copy)]
pub struct DebugReport<'a> {
    /// Call that produced the report (e.g. "Queue::submit_commands")
    pub context: &'a str,
    pub result: DeviceResult,
    /// Failure description (empty on success)
    pub message: &'a str,
}

/// Receives a report for every device call, successful or not
///
/// Registered at device creation. A sink may terminate the process on
/// failure; `Device` only relies on it returning for successful reports.
pub trait ErrorSink: Send + Sync {
    fn report(&self, report: &DebugReport<'_>);
}

/// Error sink that only logs (successes at trace level, failures as errors)
#[derive(Debug, Default, Clone, Copy)]
pub struct LogErrorSink;

impl ErrorSink for LogErrorSink {
    fn report(&self, report: &DebugReport<'_>) {
        if report.result.is_success() {
            crate::engine_trace!("vgdemo::Device", "{} -> {}", report.context, report.result);
        } else {
            crate::engine_error!(
                "vgdemo::Device",
                "{} -> {}: {}",
                report.context,
                report.result,
                report.message
            );
        }
    }
}
