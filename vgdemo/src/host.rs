/// winit application host
///
/// Opens the window at the operation mode's resolution, brings up the
/// Vulkan backend and the sample on the first `resumed`, and drives the
/// sample through a `HostDriver` on every redraw. Keyboard input is folded
/// into the controller buttons the sample understands.

use std::time::Instant;

use vgdemo_engine::device::DeviceMaker;
use vgdemo_engine::sample::{
    choose_framebuffer_size, Buttons, ConsoleErrorSurface, FatalErrorSink, HostDriver, InputState, OperationMode,
    SampleApp,
};
use vgdemo_engine::vgdemo::{Error, Result, SampleConfig};
use vgdemo_engine::{engine_error, engine_info};
use vgdemo_engine_renderer_vulkan::{VulkanBackend, VulkanConfig};
use winit::application::ApplicationHandler;
use winit::dpi::PhysicalSize;
use winit::event::{ElementState, WindowEvent};
use winit::event_loop::ActiveEventLoop;
use winit::keyboard::{Key, NamedKey};
use winit::window::{Window, WindowId};

use crate::demo::DemoScene;

// ============================================================================
// Input
// ============================================================================

/// Controller button a key stands for
///
/// `+` and Escape quit, `-` is the blowup button.
pub fn button_for_key(key: &Key) -> Option<Buttons> {
    match key {
        Key::Named(NamedKey::Escape) => Some(Buttons::PLUS),
        Key::Character(text) => match text.as_str() {
            "+" => Some(Buttons::PLUS),
            "-" => Some(Buttons::MINUS),
            _ => None,
        },
        _ => None,
    }
}

/// Whether a key toggles between handheld and docked mode
pub fn is_mode_toggle(key: &Key) -> bool {
    matches!(key, Key::Character(text) if text.eq_ignore_ascii_case("d"))
}

/// The other operation mode
pub fn toggled(mode: OperationMode) -> OperationMode {
    match mode {
        OperationMode::Handheld => OperationMode::Console,
        OperationMode::Console => OperationMode::Handheld,
    }
}

/// Accumulates key events between two frames
#[derive(Debug, Default)]
pub struct KeyTracker {
    down: Buttons,
    held: Buttons,
    mode_toggle: bool,
}

impl KeyTracker {
    pub fn handle_key(&mut self, key: &Key, state: ElementState, repeat: bool) {
        if is_mode_toggle(key) {
            if state.is_pressed() && !repeat {
                self.mode_toggle = !self.mode_toggle;
            }
            return;
        }

        let Some(button) = button_for_key(key) else {
            return;
        };
        match state {
            ElementState::Pressed => {
                if !repeat {
                    self.down |= button;
                }
                self.held |= button;
            }
            ElementState::Released => self.held.remove(button),
        }
    }

    /// Input for the next frame; presses are reported once
    pub fn take_input(&mut self) -> InputState {
        InputState::new(std::mem::take(&mut self.down), self.held)
    }

    /// Whether an odd number of mode toggles happened since the last call
    pub fn take_mode_toggle(&mut self) -> bool {
        std::mem::take(&mut self.mode_toggle)
    }

    /// Forget held buttons (focus lost)
    pub fn release_all(&mut self) {
        self.held = Buttons::empty();
    }
}

// ============================================================================
// Host
// ============================================================================

struct Running {
    // Dropped before the window the backend's surface was created from
    driver: HostDriver<SampleApp<DemoScene>>,
    window: Window,
}

/// `ApplicationHandler` running the sample
pub struct WinitHost {
    config: SampleConfig,
    mode: OperationMode,
    keys: KeyTracker,
    started: Instant,
    running: Option<Running>,
    failed: bool,
}

impl WinitHost {
    pub fn new(config: SampleConfig, mode: OperationMode) -> Self {
        Self {
            config,
            mode,
            keys: KeyTracker::default(),
            started: Instant::now(),
            running: None,
            failed: false,
        }
    }

    /// Whether startup failed and the loop was stopped
    pub fn failed(&self) -> bool {
        self.failed
    }

    fn start(&mut self, event_loop: &ActiveEventLoop) -> Result<Running> {
        let (width, height) = choose_framebuffer_size(&self.config, self.mode);
        let attributes = Window::default_attributes()
            .with_title("vgdemo")
            .with_inner_size(PhysicalSize::new(width, height))
            .with_resizable(false);
        let window = event_loop
            .create_window(attributes)
            .map_err(|err| Error::InitializationFailed(format!("window creation failed: {}", err)))?;

        let backend = VulkanBackend::new(&window, VulkanConfig::default())?;
        let device = DeviceMaker::new(backend)
            .set_error_sink(FatalErrorSink::new(ConsoleErrorSurface))
            .create();

        let content = DemoScene::new(&self.config.asset_dir);
        let app = SampleApp::new(device, self.config.clone(), self.mode, content)?;

        Ok(Running {
            driver: HostDriver::new(app),
            window,
        })
    }

    fn toggle_mode(&mut self) {
        let Some(running) = self.running.as_mut() else {
            return;
        };
        self.mode = toggled(self.mode);
        running.driver.notify_operation_mode(self.mode);

        let (width, height) = choose_framebuffer_size(&self.config, self.mode);
        let _ = running.window.request_inner_size(PhysicalSize::new(width, height));
        engine_info!("vgdemo::WinitHost", "Switching to {:?} ({}x{})", self.mode, width, height);
    }

    fn redraw(&mut self, event_loop: &ActiveEventLoop) {
        if self.keys.take_mode_toggle() {
            self.toggle_mode();
        }
        let input = self.keys.take_input();
        let ns = self.started.elapsed().as_nanos() as u64;

        let Some(running) = self.running.as_mut() else {
            return;
        };
        if running.driver.step(ns, &input) {
            running.window.request_redraw();
        } else {
            event_loop.exit();
        }
    }
}

impl ApplicationHandler for WinitHost {
    fn resumed(&mut self, event_loop: &ActiveEventLoop) {
        if self.running.is_some() || self.failed {
            return;
        }

        match self.start(event_loop) {
            Ok(running) => {
                running.window.request_redraw();
                self.started = Instant::now();
                self.running = Some(running);
            }
            Err(err) => {
                engine_error!("vgdemo::WinitHost", "Startup failed: {}", err);
                self.failed = true;
                event_loop.exit();
            }
        }
    }

    fn window_event(&mut self, event_loop: &ActiveEventLoop, _window_id: WindowId, event: WindowEvent) {
        match event {
            WindowEvent::CloseRequested => event_loop.exit(),
            WindowEvent::Focused(false) => self.keys.release_all(),
            WindowEvent::KeyboardInput { event, .. } => {
                self.keys.handle_key(&event.logical_key, event.state, event.repeat);
            }
            WindowEvent::RedrawRequested => self.redraw(event_loop),
            _ => {}
        }
    }

    fn exiting(&mut self, _event_loop: &ActiveEventLoop) {
        if let Some(running) = self.running.take() {
            engine_info!("vgdemo::WinitHost", "Exiting after {} frames", running.driver.frame_count());
        }
    }
}

#[cfg(test)]
#[path = "host_tests.rs"]
mod tests;
