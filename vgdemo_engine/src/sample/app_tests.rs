//! Unit tests for the sample application on the mock device

use std::cell::RefCell;
use std::path::PathBuf;
use std::rc::Rc;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};

use crate::config::SampleConfig;
use crate::device::mock_device::{mock_device, MockBackend, MockCall, MockEvent, MockProbe};
use crate::device::{Command, DeviceMaker, ImageFormat, LogErrorSink};
use crate::error::{Error, Result};
use crate::sample::{
    Application, Buttons, DemoContent, ErrorSurface, FatalErrorSink, HostDriver, InputState, OperationMode,
    SampleApp, FATAL_EXIT_STATUS,
};
use crate::vg::{Color, Context};

#[derive(Default)]
struct ContentLog {
    loads: usize,
    frames: Vec<(f32, f32, f32, bool)>,
    freed: bool,
}

struct TestContent {
    log: Rc<RefCell<ContentLog>>,
    fail_load: bool,
}

impl DemoContent for TestContent {
    fn load(&mut self, _vg: &mut Context) -> Result<()> {
        self.log.borrow_mut().loads += 1;
        if self.fail_load {
            return Err(Error::AssetLoadFailed("images/image1.png".to_string()));
        }
        Ok(())
    }

    fn render(&mut self, vg: &mut Context, _x: f32, _y: f32, width: f32, height: f32, t: f32, blowup: bool) {
        self.log.borrow_mut().frames.push((width, height, t, blowup));
        vg.begin_path();
        vg.rect(10.0, 10.0, 100.0, 50.0);
        vg.fill_color(Color::rgba(255, 192, 0, 255));
        vg.fill();
    }

    fn free(&mut self, _vg: &mut Context) {
        self.log.borrow_mut().freed = true;
    }
}

fn content() -> (TestContent, Rc<RefCell<ContentLog>>) {
    let log = Rc::new(RefCell::new(ContentLog::default()));
    (TestContent { log: log.clone(), fail_load: false }, log)
}

static NEXT_DIR: AtomicUsize = AtomicUsize::new(0);

fn config() -> SampleConfig {
    let id = NEXT_DIR.fetch_add(1, Ordering::Relaxed);
    let dir = std::env::temp_dir().join(format!("vgdemo-sample-tests-{}-{}", std::process::id(), id));
    std::fs::create_dir_all(&dir).unwrap();
    for name in ["fill_vsh.spv", "fill_fsh.spv", "fill_aa_fsh.spv"] {
        std::fs::write(dir.join(name), [0x03, 0x02, 0x23, 0x07]).unwrap();
    }
    SampleConfig { shader_dir: dir, asset_dir: PathBuf::from("/nonexistent"), ..SampleConfig::default() }
}

fn app(mode: OperationMode) -> (SampleApp<TestContent>, MockProbe, Rc<RefCell<ContentLog>>) {
    let (device, probe, _sink) = mock_device();
    let (content, log) = content();
    let app = SampleApp::new(device, config(), mode, content).unwrap();
    (app, probe, log)
}

fn framebuffer_sizes(probe: &MockProbe) -> Vec<(u32, u32)> {
    probe
        .live_images()
        .iter()
        .filter(|(_, desc)| desc.format == ImageFormat::RGBA8Unorm)
        .map(|(_, desc)| (desc.width, desc.height))
        .collect()
}

// ============================================================================
// STARTUP AND SHUTDOWN
// ============================================================================

#[test]
fn test_new_builds_resources_for_the_startup_mode() {
    let (app, probe, log) = app(OperationMode::Console);

    assert_eq!(app.framebuffer_size(), (1920, 1080));
    assert_eq!(framebuffer_sizes(&probe), vec![(1920, 1080); 2]);
    assert_eq!(probe.live_shader_count(), 2);
    assert_eq!(log.borrow().loads, 1);
}

#[test]
fn test_window_scale_maps_design_width_to_framebuffer() {
    let (handheld, _, _) = app(OperationMode::Handheld);
    let (docked, _, _) = app(OperationMode::Console);

    assert_eq!(handheld.window_scale(), 1.0);
    assert_eq!(docked.window_scale(), 1.5);
}

#[test]
fn test_content_load_failure_is_not_fatal() {
    let (device, _probe, sink) = mock_device();
    let (mut content, log) = content();
    content.fail_load = true;

    let mut app = SampleApp::new(device, config(), OperationMode::Handheld, content).unwrap();

    assert!(app.on_frame(0, &InputState::default()));
    assert_eq!(log.borrow().frames.len(), 1);
    assert!(sink.failures().is_empty());
}

#[test]
fn test_invalid_config_is_rejected() {
    let (device, _probe, _sink) = mock_device();
    let (content, _log) = content();
    let config = SampleConfig { framebuffer_count: 0, ..config() };

    assert!(matches!(
        SampleApp::new(device, config, OperationMode::Handheld, content),
        Err(Error::InitializationFailed(_))
    ));
}

#[test]
fn test_drop_frees_content_and_every_gpu_object() {
    let (app, probe, log) = app(OperationMode::Handheld);
    let image_pool = app.image_pool().clone();
    let data_pool = app.data_pool().clone();
    let code_pool = app.code_pool().clone();

    drop(app);

    assert!(log.borrow().freed);
    assert_eq!(image_pool.allocation_count(), 0);
    assert_eq!(data_pool.allocation_count(), 0);
    assert_eq!(code_pool.allocation_count(), 0);
    assert_eq!(probe.live_swapchain_count(), 0);
    assert_eq!(probe.live_shader_count(), 0);
}

// ============================================================================
// FRAME LOOP
// ============================================================================

#[test]
fn test_frame_submits_bind_then_static_then_content_then_presents() {
    let (mut app, probe, log) = app(OperationMode::Handheld);
    probe.clear_events();

    app.render(2_500_000_000, false).unwrap();

    let resources = app.framebuffers().resources().unwrap();
    let events = probe.events();
    assert_eq!(events[0], MockEvent::AcquireImage { slot: 0 });
    assert_eq!(events[1], MockEvent::Submit(resources.bind_list(0).unwrap().commands().to_vec()));
    assert_eq!(events[2], MockEvent::Submit(resources.render_list().commands().to_vec()));
    assert!(matches!(&events[3], MockEvent::Submit(commands) if commands.iter().any(|c| matches!(c, Command::Draw { .. }))));
    assert_eq!(*events.last().unwrap(), MockEvent::Present { slot: 0 });

    assert_eq!(log.borrow().frames, vec![(1280.0, 720.0, 2.5, false)]);
}

#[test]
fn test_every_present_follows_its_slot_bind_list() {
    let (mut app, probe, _log) = app(OperationMode::Handheld);
    probe.clear_events();

    for frame in 0..5u64 {
        app.render(frame * 16_000_000, false).unwrap();
    }

    let resources = app.framebuffers().resources().unwrap();
    let events = probe.events();
    let mut bound_slot = None;
    let mut presents = 0;
    for event in &events {
        match event {
            MockEvent::AcquireImage { .. } => bound_slot = None,
            MockEvent::Submit(commands) => {
                if let Some(Command::BindRenderTargets { color, .. }) = commands.first() {
                    bound_slot = resources.framebuffers().iter().position(|fb| fb.key() == *color);
                }
            }
            MockEvent::Present { slot } => {
                assert_eq!(bound_slot, Some(*slot));
                presents += 1;
            }
            _ => {}
        }
    }
    assert_eq!(presents, 5);
}

#[test]
fn test_minus_held_requests_blowup() {
    let (mut app, _probe, log) = app(OperationMode::Handheld);

    assert!(app.on_frame(0, &InputState::new(Buttons::empty(), Buttons::MINUS)));

    assert!(log.borrow().frames[0].3);
}

#[test]
fn test_quit_stops_the_driver_without_rendering() {
    let (app, probe, log) = app(OperationMode::Handheld);
    let mut driver = HostDriver::new(app);
    driver.step(0, &InputState::default());
    let submissions = probe.submissions().len();

    assert!(!driver.step(1, &InputState::new(Buttons::PLUS, Buttons::PLUS)));
    assert!(!driver.step(2, &InputState::default()));

    assert_eq!(probe.submissions().len(), submissions);
    assert_eq!(log.borrow().frames.len(), 1);
}

// ============================================================================
// OPERATION MODE
// ============================================================================

#[test]
fn test_mode_changes_resize_without_leaking() {
    let (mut app, probe, _log) = app(OperationMode::Handheld);
    let baseline = app.image_pool().allocation_count();

    app.on_operation_mode(OperationMode::Console);
    assert_eq!(framebuffer_sizes(&probe), vec![(1920, 1080); 2]);
    assert_eq!(app.image_pool().allocation_count(), baseline);

    app.on_operation_mode(OperationMode::Handheld);
    assert_eq!(framebuffer_sizes(&probe), vec![(1280, 720); 2]);
    assert_eq!(app.image_pool().allocation_count(), baseline);
    assert_eq!(probe.live_swapchain_count(), 1);
    assert_eq!(app.mode(), OperationMode::Handheld);
}

#[test]
fn test_frames_render_after_a_mode_change() {
    let (mut app, probe, log) = app(OperationMode::Handheld);
    app.render(0, false).unwrap();

    app.change_operation_mode(OperationMode::Console).unwrap();
    app.render(1, false).unwrap();

    assert!(matches!(probe.events().last(), Some(MockEvent::Present { .. })));
    assert_eq!(log.borrow().frames.len(), 2);
    assert_eq!(app.window_scale(), 1.5);
}

#[test]
fn test_failed_mode_change_keeps_previous_mode_and_size() {
    let (mut app, probe, _log) = app(OperationMode::Handheld);
    probe.fail_next(MockCall::CreateSwapchain, Error::BackendError("no surface".to_string()));

    assert!(app.change_operation_mode(OperationMode::Console).is_err());

    assert_eq!(app.mode(), OperationMode::Handheld);
    assert_eq!(app.framebuffer_size(), (1280, 720));
    assert!(!app.framebuffers().has_resources());
}

#[test]
fn test_failed_frame_stops_the_app() {
    let (device, probe, _sink) = mock_device();
    let (content, _log) = content();
    let mut app = SampleApp::new(device, config(), OperationMode::Handheld, content).unwrap();
    probe.fail_next(MockCall::AcquireImage, Error::BackendError("lost".to_string()));

    assert!(!app.on_frame(0, &InputState::default()));
}

// ============================================================================
// FATAL ERRORS
// ============================================================================

struct SilentSurface;

impl ErrorSurface for SilentSurface {
    fn show(&self, _context: &str, _message: &str, _code: u32) {}
}

#[test]
fn test_fatal_error_during_creation_exits_non_zero_before_any_frame() {
    let (backend, probe) = MockBackend::new();
    let exits = Arc::new(Mutex::new(Vec::new()));
    let recorded = exits.clone();
    let sink = FatalErrorSink::with_exit(SilentSurface, move |status| recorded.lock().unwrap().push(status));
    let device = DeviceMaker::new(backend).set_error_sink(sink).create();
    probe.fail_next(MockCall::CreateImage, Error::OutOfMemory);
    let (content, log) = content();

    let result = SampleApp::new(device, config(), OperationMode::Handheld, content);

    assert!(result.is_err());
    assert_eq!(*exits.lock().unwrap(), vec![FATAL_EXIT_STATUS]);
    assert!(probe.submissions().is_empty());
    assert_eq!(log.borrow().loads, 0);
}

#[test]
fn test_missing_shaders_are_fatal() {
    let (backend, probe) = MockBackend::new();
    let exits = Arc::new(Mutex::new(Vec::new()));
    let recorded = exits.clone();
    let sink = FatalErrorSink::with_exit(SilentSurface, move |status| recorded.lock().unwrap().push(status));
    let device = DeviceMaker::new(backend).set_error_sink(sink).create();
    let (content, _log) = content();
    let config = SampleConfig { shader_dir: PathBuf::from("/nonexistent/shaders"), ..config() };

    assert!(matches!(
        SampleApp::new(device, config, OperationMode::Handheld, content),
        Err(Error::AssetLoadFailed(_))
    ));
    assert_eq!(*exits.lock().unwrap(), vec![FATAL_EXIT_STATUS]);
    assert_eq!(probe.live_swapchain_count(), 0);
}

#[test]
fn test_log_sink_lets_the_app_run() {
    let (backend, _probe) = MockBackend::new();
    let device = DeviceMaker::new(backend).set_error_sink(LogErrorSink).create();
    let (content, _log) = content();

    let mut app = SampleApp::new(device, config(), OperationMode::Handheld, content).unwrap();

    assert!(app.on_frame(0, &InputState::default()));
}
