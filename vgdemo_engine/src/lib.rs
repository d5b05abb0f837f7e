/*!
# VgDemo Engine

Backend-agnostic core of the vector-graphics sample.

The crate models a small explicit GPU API (device, queue, memory pools,
images, command buffers and lists, swapchain) on top of a pluggable
`GraphicsBackend`, and builds the sample on that model: framebuffer resource
lifecycle, a pre-recorded static command list, the per-frame loop and the
operation-mode rebuild path. A vector-graphics frontend (`vg`) and its GPU
renderer adapter (`vg_renderer`) provide the drawing.

## Architecture

- **Device**: owns the backend and the error sink every call reports to
- **MemPool**: arenas carving aligned ranges out of backend memory blocks
- **CmdBuf / CmdList**: command recording and immutable replayable lists
- **SampleApp**: resource lifecycle, static recorder, frame loop, mode change
- **vg::Context**: path building, paints and tessellation
- **VgRenderer**: records vector-graphics batches as GPU commands

Backend implementations (Vulkan) live in their own crates.
*/

// Internal modules
mod error;
pub mod log;
pub mod config;
pub mod device;
pub mod vg;
pub mod vg_renderer;
pub mod sample;

// Main vgdemo namespace module
pub mod vgdemo {
    // Error types
    pub use crate::error::{Error, Result};

    // Configuration
    pub use crate::config::SampleConfig;

    // Logging sub-module (types only, NOT macros)
    pub mod log {
        pub use crate::log::{Logger, LogEntry, LogSeverity, DefaultLogger, set_logger, reset_logger};
    }

    // Device model sub-module
    pub mod device {
        pub use crate::device::*;
    }

    // Vector graphics sub-module
    pub mod vg {
        pub use crate::vg::*;
        pub use crate::vg_renderer::VgRenderer;
    }

    // Sample harness sub-module
    pub mod sample {
        pub use crate::sample::*;
    }
}

// Re-export math library at crate root
pub use glam;
