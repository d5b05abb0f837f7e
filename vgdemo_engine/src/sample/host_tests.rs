//! Unit tests for the host boundary

use crate::config::SampleConfig;
use crate::sample::host::{choose_framebuffer_size, Application, Buttons, HostDriver, InputState, OperationMode};

#[derive(Default)]
struct ScriptedApp {
    frames: Vec<u64>,
    modes: Vec<OperationMode>,
    /// Events in call order: "frame" or "mode"
    calls: Vec<&'static str>,
}

impl Application for ScriptedApp {
    fn on_frame(&mut self, ns: u64, input: &InputState) -> bool {
        self.calls.push("frame");
        if input.pressed(Buttons::PLUS) {
            return false;
        }
        self.frames.push(ns);
        true
    }

    fn on_operation_mode(&mut self, mode: OperationMode) {
        self.calls.push("mode");
        self.modes.push(mode);
    }
}

fn quit() -> InputState {
    InputState::new(Buttons::PLUS, Buttons::PLUS)
}

// ============================================================================
// OPERATION MODE
// ============================================================================

#[test]
fn test_framebuffer_size_follows_mode() {
    let config = SampleConfig::default();

    assert_eq!(choose_framebuffer_size(&config, OperationMode::Handheld), (1280, 720));
    assert_eq!(choose_framebuffer_size(&config, OperationMode::Console), (1920, 1080));
}

#[test]
fn test_default_mode_is_handheld() {
    assert_eq!(OperationMode::default(), OperationMode::Handheld);
}

// ============================================================================
// INPUT
// ============================================================================

#[test]
fn test_input_pressed_and_held_are_separate() {
    let input = InputState::new(Buttons::PLUS, Buttons::MINUS);

    assert!(input.pressed(Buttons::PLUS));
    assert!(!input.pressed(Buttons::MINUS));
    assert!(input.is_held(Buttons::MINUS));
    assert!(!input.is_held(Buttons::PLUS));
    assert!(!InputState::default().pressed(Buttons::all()));
}

// ============================================================================
// DRIVER
// ============================================================================

#[test]
fn test_driver_forwards_frames_while_running() {
    let mut driver = HostDriver::new(ScriptedApp::default());

    assert!(driver.step(10, &InputState::default()));
    assert!(driver.step(20, &InputState::default()));

    assert_eq!(driver.app().frames, vec![10, 20]);
    assert_eq!(driver.frame_count(), 2);
    assert!(driver.is_running());
}

#[test]
fn test_quit_returns_false_once_then_stops_calling() {
    let mut driver = HostDriver::new(ScriptedApp::default());
    driver.step(1, &InputState::default());

    assert!(!driver.step(2, &quit()));
    assert!(!driver.step(3, &InputState::default()));
    assert!(!driver.step(4, &quit()));

    let app = driver.into_app();
    assert_eq!(app.calls, vec!["frame", "frame"]);
    assert_eq!(app.frames, vec![1]);
}

#[test]
fn test_mode_change_is_delivered_before_the_next_frame() {
    let mut driver = HostDriver::new(ScriptedApp::default());
    driver.step(1, &InputState::default());

    driver.notify_operation_mode(OperationMode::Handheld);
    driver.notify_operation_mode(OperationMode::Console);
    driver.step(2, &InputState::default());
    driver.step(3, &InputState::default());

    assert_eq!(driver.app().calls, vec!["frame", "mode", "frame", "frame"]);
    assert_eq!(driver.app().modes, vec![OperationMode::Console]);
}

#[test]
fn test_mode_change_after_quit_is_dropped() {
    let mut driver = HostDriver::new(ScriptedApp::default());
    driver.step(1, &quit());

    driver.notify_operation_mode(OperationMode::Console);
    driver.step(2, &InputState::default());

    assert!(driver.app().modes.is_empty());
}
