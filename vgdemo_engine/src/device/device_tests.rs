//! Unit tests for the device model (Device, Queue, images, shaders, swapchain)

use std::path::PathBuf;

use crate::device::mock_device::{mock_device, MockCall, MockEvent};
use crate::device::{
    align_up, DebugReport, DeviceMaker, DeviceResult, ErrorSink, Image, ImageFlags, ImageFormat,
    ImageLayoutMaker, LogErrorSink, MemBlockFlags, MemPool, Queue, Shader, ShaderStage,
    SwapchainMaker, SHADER_CODE_ALIGNMENT,
};
use crate::device::mock_device::MockBackend;
use crate::error::Error;

fn image_pool(device: &crate::device::Device) -> MemPool {
    MemPool::new(device, MemBlockFlags::GPU_CACHED | MemBlockFlags::IMAGE, 0x100000)
}

fn code_pool(device: &crate::device::Device) -> MemPool {
    MemPool::new(
        device,
        MemBlockFlags::CPU_UNCACHED | MemBlockFlags::GPU_CACHED | MemBlockFlags::CODE,
        0x8000,
    )
}

fn temp_shader_file(name: &str, bytes: &[u8]) -> PathBuf {
    let dir = std::env::temp_dir().join(format!("vgdemo-device-tests-{}", std::process::id()));
    std::fs::create_dir_all(&dir).unwrap();
    let path = dir.join(name);
    std::fs::write(&path, bytes).unwrap();
    path
}

// ============================================================================
// ALIGNMENT HELPER
// ============================================================================

#[test]
fn test_align_up() {
    assert_eq!(align_up(0, 0x100), 0);
    assert_eq!(align_up(1, 0x100), 0x100);
    assert_eq!(align_up(0x100, 0x100), 0x100);
    assert_eq!(align_up(13, 4), 16);
}

// ============================================================================
// DEVICE RESULT AND REPORTS
// ============================================================================

#[test]
fn test_device_result_from_error() {
    assert_eq!(DeviceResult::from(&Error::OutOfMemory), DeviceResult::OutOfMemory);
    assert_eq!(DeviceResult::from(&Error::InvalidState("x".into())), DeviceResult::BadState);
    assert_eq!(DeviceResult::from(&Error::InvalidResource("x".into())), DeviceResult::BadInput);
    assert_eq!(DeviceResult::from(&Error::BackendError("x".into())), DeviceResult::Fail);
    assert_eq!(DeviceResult::from(&Error::AssetLoadFailed("x".into())), DeviceResult::BadInput);
}

#[test]
fn test_device_result_display_and_codes() {
    assert!(DeviceResult::Success.is_success());
    assert!(!DeviceResult::Fail.is_success());
    assert_eq!(DeviceResult::Success.code(), 0);
    assert_eq!(DeviceResult::BadState.to_string(), "BadState (9)");
}

#[test]
fn test_log_error_sink_accepts_all_reports() {
    let sink = LogErrorSink;
    sink.report(&DebugReport { context: "Queue::wait_idle", result: DeviceResult::Success, message: "" });
    sink.report(&DebugReport { context: "Queue::wait_idle", result: DeviceResult::Timeout, message: "slow" });
}

#[test]
fn test_every_call_is_reported() {
    let (device, _probe, sink) = mock_device();
    let queue = Queue::new(&device);

    queue.wait_idle().unwrap();

    let reports = sink.reports();
    assert_eq!(reports.len(), 1);
    assert_eq!(reports[0].context, "Queue::wait_idle");
    assert_eq!(reports[0].result, DeviceResult::Success);
    assert!(reports[0].message.is_empty());
}

#[test]
fn test_failed_call_is_reported_and_propagated() {
    let (device, probe, sink) = mock_device();
    let queue = Queue::new(&device);
    probe.fail_next(MockCall::WaitIdle, Error::BackendError("device lost".to_string()));

    let err = queue.wait_idle().unwrap_err();

    assert_eq!(err, Error::BackendError("device lost".to_string()));
    let failures = sink.failures();
    assert_eq!(failures.len(), 1);
    assert_eq!(failures[0].result, DeviceResult::Fail);
    assert!(failures[0].message.contains("device lost"));
}

#[test]
fn test_device_maker_defaults_to_log_sink() {
    let (backend, _probe) = MockBackend::new();
    let device = DeviceMaker::new(backend).create();

    assert_eq!(device.backend_name(), "mock");
    assert!(Queue::new(&device).wait_idle().is_ok());
}

#[test]
fn test_device_clones_share_the_backend() {
    let (device, probe, _sink) = mock_device();
    let clone = device.clone();

    Queue::new(&clone).wait_idle().unwrap();
    Queue::new(&device).wait_idle().unwrap();

    assert_eq!(probe.events(), vec![MockEvent::WaitIdle, MockEvent::WaitIdle]);
}

// ============================================================================
// IMAGES
// ============================================================================

#[test]
fn test_image_layout_maker_builds_description() {
    let (device, _probe, _sink) = mock_device();

    let layout = ImageLayoutMaker::new(&device)
        .set_flags(ImageFlags::USAGE_RENDER | ImageFlags::HW_COMPRESSION)
        .set_format(ImageFormat::S8)
        .set_dimensions(64, 32)
        .initialize()
        .unwrap();

    assert_eq!(layout.width(), 64);
    assert_eq!(layout.height(), 32);
    assert_eq!(layout.format(), ImageFormat::S8);
    assert!(layout.desc().flags.contains(ImageFlags::HW_COMPRESSION));
    assert!(layout.size() >= 64 * 32);
}

#[test]
fn test_image_layout_rejects_empty_dimensions() {
    let (device, _probe, sink) = mock_device();

    let result = ImageLayoutMaker::new(&device).set_dimensions(0, 16).initialize();

    assert!(matches!(result, Err(Error::InvalidResource(_))));
    assert_eq!(sink.failures()[0].context, "ImageLayout::initialize");
}

#[test]
fn test_image_drop_destroys_image_then_frees_memory() {
    let (device, probe, _sink) = mock_device();
    let pool = image_pool(&device);
    let layout = ImageLayoutMaker::new(&device).set_dimensions(16, 16).initialize().unwrap();

    let image = Image::create(&device, &layout, &pool).unwrap();
    assert_eq!(pool.allocation_count(), 1);
    assert_eq!(probe.live_image_count(), 1);
    assert_eq!(image.memory().map(|m| m.size()), Some(layout.size()));

    drop(image);

    assert_eq!(pool.allocation_count(), 0);
    assert_eq!(probe.live_image_count(), 0);
}

#[test]
fn test_image_creation_failure_releases_memory() {
    let (device, probe, _sink) = mock_device();
    let pool = image_pool(&device);
    let layout = ImageLayoutMaker::new(&device).set_dimensions(16, 16).initialize().unwrap();
    probe.fail_next(MockCall::CreateImage, Error::OutOfMemory);

    assert!(Image::create(&device, &layout, &pool).is_err());
    assert_eq!(pool.allocation_count(), 0);
}

// ============================================================================
// SHADERS
// ============================================================================

#[test]
fn test_shader_load_copies_code_into_code_memory() {
    let (device, probe, _sink) = mock_device();
    let pool = code_pool(&device);
    let _pad = pool.allocate(3, 1).unwrap();
    let path = temp_shader_file("load_copies.spv", &[0x03, 0x02, 0x23, 0x07, 1, 2, 3, 4]);

    let shader = Shader::load(&device, &pool, ShaderStage::Fragment, &path).unwrap();

    assert_eq!(shader.stage(), ShaderStage::Fragment);
    assert_eq!(
        probe.shader_code(shader.key()),
        Some(vec![0x03, 0x02, 0x23, 0x07, 1, 2, 3, 4])
    );
    assert!(probe.events().iter().any(|event| matches!(
        event,
        MockEvent::CreateShader { stage: ShaderStage::Fragment, size: 8, .. }
    )));
    assert_eq!(pool.used_bytes(), 3 + 8);
    // The code range starts on the next shader alignment boundary
    let next = pool.allocate(1, 1).unwrap();
    assert_eq!(next.offset(), 3);
    let after = pool.allocate(SHADER_CODE_ALIGNMENT - 4, 1).unwrap();
    assert_eq!(after.offset(), 4);
}

#[test]
fn test_shader_load_missing_file_is_reported() {
    let (device, probe, sink) = mock_device();
    let pool = code_pool(&device);

    let result = Shader::load(&device, &pool, ShaderStage::Vertex, &PathBuf::from("/nonexistent/fill_vsh.spv"));

    assert!(matches!(result, Err(Error::AssetLoadFailed(_))));
    let failures = sink.failures();
    assert_eq!(failures[0].context, "Shader::load");
    assert_eq!(failures[0].result, DeviceResult::BadInput);
    assert_eq!(probe.live_shader_count(), 0);
}

#[test]
fn test_shader_drop_frees_code() {
    let (device, probe, _sink) = mock_device();
    let pool = code_pool(&device);

    let shader = Shader::from_code(&device, &pool, ShaderStage::Vertex, &[1, 2, 3, 4]).unwrap();
    assert_eq!(pool.allocation_count(), 1);

    drop(shader);

    assert_eq!(pool.allocation_count(), 0);
    assert_eq!(probe.live_shader_count(), 0);
}

// ============================================================================
// SWAPCHAIN AND QUEUE
// ============================================================================

#[test]
fn test_swapchain_requires_images() {
    let (device, _probe, _sink) = mock_device();
    assert!(SwapchainMaker::new(&device, std::iter::empty()).create().is_err());
}

#[test]
fn test_swapchain_destroy_releases_backend_object() {
    let (device, probe, _sink) = mock_device();
    let pool = image_pool(&device);
    let layout = ImageLayoutMaker::new(&device).set_dimensions(8, 8).initialize().unwrap();
    let images = vec![
        Image::create(&device, &layout, &pool).unwrap(),
        Image::create(&device, &layout, &pool).unwrap(),
    ];

    let swapchain = SwapchainMaker::new(&device, images.iter()).create().unwrap();
    assert_eq!(swapchain.image_count(), 2);
    assert_eq!(probe.live_swapchain_count(), 1);

    swapchain.destroy();
    assert_eq!(probe.live_swapchain_count(), 0);
}

#[test]
fn test_queue_present_follows_acquire() {
    let (device, probe, _sink) = mock_device();
    let pool = image_pool(&device);
    let layout = ImageLayoutMaker::new(&device).set_dimensions(8, 8).initialize().unwrap();
    let images = vec![Image::create(&device, &layout, &pool).unwrap()];
    let swapchain = SwapchainMaker::new(&device, images.iter()).create().unwrap();
    let queue = Queue::new(&device);
    probe.clear_events();

    let slot = queue.acquire_image(&swapchain).unwrap();
    queue.present_image(&swapchain, slot).unwrap();

    assert_eq!(
        probe.events(),
        vec![MockEvent::AcquireImage { slot: 0 }, MockEvent::Present { slot: 0 }]
    );
}
