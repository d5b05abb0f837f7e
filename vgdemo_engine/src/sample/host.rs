/// Application host boundary
///
/// The host owns the top-level loop and input polling. It calls the
/// application once per frame and forwards operation-mode changes between
/// frames.

use bitflags::bitflags;

use crate::config::SampleConfig;

/// Display configuration reported by the host
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub enum OperationMode {
    #[default]
    Handheld,
    /// Docked: rendered for an external display
    Console,
}

/// Framebuffer size for an operation mode
pub fn choose_framebuffer_size(config: &SampleConfig, mode: OperationMode) -> (u32, u32) {
    match mode {
        OperationMode::Handheld => config.handheld_size,
        OperationMode::Console => config.docked_size,
    }
}

bitflags! {
    /// Controller buttons the sample reacts to
    #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
    pub struct Buttons: u32 {
        /// Quit
        const PLUS = 1 << 0;
        /// Held: exaggerated ("blowup") rendering
        const MINUS = 1 << 1;
    }
}

/// Input snapshot of one frame
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct InputState {
    /// Buttons that went down since the previous frame
    pub down: Buttons,
    /// Buttons currently held
    pub held: Buttons,
}

impl InputState {
    pub fn new(down: Buttons, held: Buttons) -> Self {
        Self { down, held }
    }

    pub fn pressed(&self, buttons: Buttons) -> bool {
        self.down.intersects(buttons)
    }

    pub fn is_held(&self, buttons: Buttons) -> bool {
        self.held.intersects(buttons)
    }
}

/// Callbacks an application registers with the host
pub trait Application {
    /// Render one frame; `false` asks the host to stop
    ///
    /// # Arguments
    ///
    /// * `ns` - Time since the host started, in nanoseconds
    /// * `input` - Input polled for this frame
    fn on_frame(&mut self, ns: u64, input: &InputState) -> bool;

    /// The display configuration changed
    fn on_operation_mode(&mut self, mode: OperationMode);
}

/// Drives an `Application` the way the host loop does
///
/// Mode changes are queued and delivered before the next frame (only the
/// latest one counts). Once `on_frame` returned `false` the application is
/// never called again.
#[derive(Debug)]
pub struct HostDriver<A: Application> {
    app: A,
    pending_mode: Option<OperationMode>,
    running: bool,
    frame_count: u64,
}

impl<A: Application> HostDriver<A> {
    pub fn new(app: A) -> Self {
        Self {
            app,
            pending_mode: None,
            running: true,
            frame_count: 0,
        }
    }

    pub fn app(&self) -> &A {
        &self.app
    }

    pub fn app_mut(&mut self) -> &mut A {
        &mut self.app
    }

    pub fn into_app(self) -> A {
        self.app
    }

    pub fn is_running(&self) -> bool {
        self.running
    }

    /// Frames rendered so far (the frame that returned `false` excluded)
    pub fn frame_count(&self) -> u64 {
        self.frame_count
    }

    /// Queue an operation-mode change for delivery before the next frame
    pub fn notify_operation_mode(&mut self, mode: OperationMode) {
        self.pending_mode = Some(mode);
    }

    /// Run one host iteration; returns whether the application keeps running
    pub fn step(&mut self, ns: u64, input: &InputState) -> bool {
        if !self.running {
            return false;
        }
        if let Some(mode) = self.pending_mode.take() {
            self.app.on_operation_mode(mode);
        }

        self.running = self.app.on_frame(ns, input);
        if self.running {
            self.frame_count += 1;
        } else {
            crate::engine_info!("vgdemo::HostDriver", "Application quit after {} frames", self.frame_count);
        }
        self.running
    }
}

#[cfg(test)]
#[path = "host_tests.rs"]
mod tests;
