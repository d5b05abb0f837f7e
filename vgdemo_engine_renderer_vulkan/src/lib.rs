/*!
# VgDemo Engine - Vulkan Backend

Vulkan implementation of the vgdemo device model.

`VulkanBackend` implements `vgdemo_engine::device::GraphicsBackend` on
Vulkan 1.3 through `ash`, with `gpu-allocator` backing the engine's memory
blocks. Framebuffers rendered by the engine are blitted into a
`VkSwapchainKHR` created on the window surface at present time.

```no_run
use vgdemo_engine::device::DeviceMaker;
use vgdemo_engine_renderer_vulkan::{VulkanBackend, VulkanConfig};
# fn run(window: &winit::window::Window) -> vgdemo_engine::vgdemo::Result<()> {
let backend = VulkanBackend::new(window, VulkanConfig::default())?;
let device = DeviceMaker::new(backend).create();
# Ok(())
# }
```
*/

// Vulkan implementation modules
mod vulkan;
mod vulkan_context;
mod vulkan_format;
mod vulkan_memory;
mod vulkan_image;
mod vulkan_shader;
mod vulkan_sampler;
mod vulkan_descriptor_set;
mod vulkan_pipeline;
mod vulkan_command_list;
mod vulkan_swapchain;
mod debug;

pub use vulkan::{VulkanBackend, VulkanConfig};

// Re-export debug utilities
pub use debug::{get_validation_stats, print_validation_stats_report, DebugSeverity, ValidationStats};

/// Namespace mirroring the engine crate's `vgdemo` module
pub mod vgdemo {
    pub use crate::vulkan::{VulkanBackend, VulkanConfig};
    pub use crate::debug::{DebugSeverity, ValidationStats};
}
