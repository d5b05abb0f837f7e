//! Error types for the vgdemo engine
//!
//! This module defines the error types used throughout the engine,
//! including device calls, initialization, and asset loading.

use std::fmt;

/// Result type for vgdemo engine operations
pub type Result<T> = std::result::Result<T, Error>;

/// vgdemo engine errors
#[derive(Debug, Clone, PartialEq)]
pub enum Error {
    /// Backend-specific error (Vulkan, mock, etc.)
    BackendError(String),

    /// Out of GPU memory (pool, block, or command memory exhausted)
    OutOfMemory,

    /// Invalid resource (image, shader, memory block, etc.)
    InvalidResource(String),

    /// Initialization failed (device, backend, subsystems)
    InitializationFailed(String),

    /// Operation issued in a state that does not allow it
    InvalidState(String),

    /// Asset could not be read from the asset store
    AssetLoadFailed(String),
}

impl fmt::Display for Error {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Error::BackendError(msg) => write!(f, "Backend error: {}", msg),
            Error::OutOfMemory => write!(f, "Out of GPU memory"),
            Error::InvalidResource(msg) => write!(f, "Invalid resource: {}", msg),
            Error::InitializationFailed(msg) => write!(f, "Initialization failed: {}", msg),
            Error::InvalidState(msg) => write!(f, "Invalid state: {}", msg),
            Error::AssetLoadFailed(msg) => write!(f, "Asset load failed: {}", msg),
        }
    }
}

impl std::error::Error for Error {}

#[cfg(test)]
#[path = "error_tests.rs"]
mod tests;
