/// GraphicsBackend trait - the native GPU API behind `Device`

use crate::device::command::Command;
use crate::device::types::{
    ImageKey, ImageLayout, ImageLayoutDesc, MemBlockFlags, MemBlockKey, ShaderKey, ShaderStage,
    SwapchainKey,
};
use crate::error::Result;

/// Native GPU API implemented by each backend (Vulkan, mock)
///
/// The backend owns every native object and hands out keys. Calls are made
/// through `Device`, which serializes them and reports each outcome to the
/// device's error sink.
pub trait GraphicsBackend: Send {
    /// Backend name used in logs
    fn name(&self) -> &str;

    /// Create a memory block of `size` bytes (a multiple of `MEMBLOCK_ALIGNMENT`)
    fn create_mem_block(&mut self, flags: MemBlockFlags, size: u64) -> Result<MemBlockKey>;

    fn destroy_mem_block(&mut self, block: MemBlockKey) -> Result<()>;

    /// Write bytes into a CPU-visible memory block
    ///
    /// # Arguments
    ///
    /// * `block` - Destination block
    /// * `offset` - Byte offset inside the block
    /// * `data` - Bytes to copy
    fn write_mem_block(&mut self, block: MemBlockKey, offset: u64, data: &[u8]) -> Result<()>;

    /// Compute the memory size and alignment of an image
    fn image_layout(&mut self, desc: &ImageLayoutDesc) -> Result<ImageLayout>;

    /// Create an image bound to memory at (block, offset)
    fn create_image(&mut self, layout: &ImageLayout, block: MemBlockKey, offset: u64) -> Result<ImageKey>;

    fn destroy_image(&mut self, image: ImageKey) -> Result<()>;

    /// Create a shader from `size` bytes of code stored at (block, offset)
    fn create_shader(
        &mut self,
        stage: ShaderStage,
        block: MemBlockKey,
        offset: u64,
        size: u64,
    ) -> Result<ShaderKey>;

    fn destroy_shader(&mut self, shader: ShaderKey) -> Result<()>;

    /// Create a swapchain presenting the given framebuffer images (one per slot)
    fn create_swapchain(&mut self, images: &[ImageKey]) -> Result<SwapchainKey>;

    fn destroy_swapchain(&mut self, swapchain: SwapchainKey) -> Result<()>;

    /// Block until a slot of the swapchain is free and return its index
    fn acquire_image(&mut self, swapchain: SwapchainKey) -> Result<usize>;

    /// Execute commands in submission order
    fn submit_commands(&mut self, commands: &[Command]) -> Result<()>;

    /// Present the framebuffer of `slot`
    fn present_image(&mut self, swapchain: SwapchainKey, slot: usize) -> Result<()>;

    /// Block until all submitted work has completed
    fn wait_idle(&mut self) -> Result<()>;
}
