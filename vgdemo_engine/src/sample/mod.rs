/// Sample module - the harness that drives the vector-graphics demo
///
/// `FramebufferManager` owns the framebuffer-dependent resources and the
/// static command list, `SampleApp` runs the frame loop and the mode-change
/// rebuild, and the host boundary (`Application`, `HostDriver`) feeds it
/// frames, input and operation-mode changes.

pub mod host;
pub mod fatal;
pub mod content;
pub mod resources;
pub mod app;

pub use host::*;
pub use fatal::*;
pub use content::*;
pub use resources::*;
pub use app::*;
