//! Unit tests for error.rs
//!
//! Tests all Error variants and their implementations (Display, Debug, Clone, std::error::Error).

use crate::error::{Error, Result};

// ============================================================================
// ERROR DISPLAY TESTS
// ============================================================================

#[test]
fn test_backend_error_display() {
    let err = Error::BackendError("vkQueueSubmit failed".to_string());
    let display = format!("{}", err);
    assert!(display.contains("Backend error"));
    assert!(display.contains("vkQueueSubmit failed"));
}

#[test]
fn test_out_of_memory_display() {
    assert_eq!(format!("{}", Error::OutOfMemory), "Out of GPU memory");
}

#[test]
fn test_invalid_resource_display() {
    let err = Error::InvalidResource("unknown image".to_string());
    let display = format!("{}", err);
    assert!(display.contains("Invalid resource"));
    assert!(display.contains("unknown image"));
}

#[test]
fn test_initialization_failed_display() {
    let err = Error::InitializationFailed("no GPU".to_string());
    assert_eq!(format!("{}", err), "Initialization failed: no GPU");
}

#[test]
fn test_invalid_state_display() {
    let err = Error::InvalidState("resources already created".to_string());
    assert_eq!(format!("{}", err), "Invalid state: resources already created");
}

#[test]
fn test_asset_load_failed_display() {
    let err = Error::AssetLoadFailed("assets/shaders/fill_vsh.spv".to_string());
    let display = format!("{}", err);
    assert!(display.starts_with("Asset load failed"));
    assert!(display.contains("fill_vsh.spv"));
}

// ============================================================================
// ERROR TRAIT IMPLEMENTATIONS
// ============================================================================

#[test]
fn test_error_is_std_error() {
    let err = Error::OutOfMemory;
    let _: &dyn std::error::Error = &err;
}

#[test]
fn test_error_debug() {
    let debug = format!("{:?}", Error::InvalidState("x".to_string()));
    assert!(debug.contains("InvalidState"));
}

#[test]
fn test_error_clone_and_eq() {
    let err = Error::BackendError("device lost".to_string());
    assert_eq!(err.clone(), err);
    assert_ne!(err, Error::OutOfMemory);
}

// ============================================================================
// RESULT ALIAS
// ============================================================================

fn fails() -> Result<u32> {
    Err(Error::OutOfMemory)
}

fn propagates() -> Result<u32> {
    let value = fails()?;
    Ok(value + 1)
}

#[test]
fn test_result_propagation() {
    assert_eq!(propagates(), Err(Error::OutOfMemory));
}
