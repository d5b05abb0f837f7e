/// Device module - explicit GPU API model shared by every backend

// Module declarations
pub mod types;
pub mod state;
pub mod command;
pub mod backend;
pub mod debug;
#[allow(clippy::module_inception)]
pub mod device;
pub mod queue;
pub mod mem_pool;
pub mod cmd_buf;
pub mod image;
pub mod shader;
pub mod swapchain;

// Re-export everything
pub use types::*;
pub use state::*;
pub use command::*;
pub use backend::*;
pub use debug::*;
pub use device::*;
pub use queue::*;
pub use mem_pool::*;
pub use cmd_buf::*;
pub use image::*;
pub use shader::*;
pub use swapchain::*;

// Mock backend for tests (no GPU required)
#[cfg(any(test, feature = "mock"))]
pub mod mock_device;

#[cfg(test)]
#[path = "device_tests.rs"]
mod tests;
