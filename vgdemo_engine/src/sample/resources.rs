/// Framebuffer resource lifecycle and the static command list
///
/// Everything that depends on the framebuffer size lives in one
/// `FramebufferResources`: the stencil buffer, the color framebuffers, one
/// "bind render target" list per swapchain slot, the static render list and
/// the swapchain. The lists are recorded into the manager's static command
/// buffer, so destroying the resources clears that buffer.

use crate::config::SampleConfig;
use crate::device::{
    CmdBuf, CmdList, ColorState, ColorWriteState, Device, Image, ImageFlags, ImageFormat, ImageLayoutMaker,
    MemHandle, MemPool, Queue, RasterizerState, Scissor, Swapchain, SwapchainMaker, Viewport, CMDMEM_ALIGNMENT,
};
use crate::error::{Error, Result};

/// Resources built for one framebuffer size
#[derive(Debug)]
pub struct FramebufferResources {
    width: u32,
    height: u32,
    // Destroyed before the images it presents
    swapchain: Swapchain,
    bind_lists: Vec<CmdList>,
    render_list: CmdList,
    framebuffers: Vec<Image>,
    depth_buffer: Image,
}

impl FramebufferResources {
    pub fn size(&self) -> (u32, u32) {
        (self.width, self.height)
    }

    pub fn swapchain(&self) -> &Swapchain {
        &self.swapchain
    }

    /// List binding the framebuffer of `slot` (and the stencil buffer) as render targets
    pub fn bind_list(&self, slot: usize) -> Option<&CmdList> {
        self.bind_lists.get(slot)
    }

    /// Viewport, scissor, clears and base state
    pub fn render_list(&self) -> &CmdList {
        &self.render_list
    }

    pub fn framebuffers(&self) -> &[Image] {
        &self.framebuffers
    }

    pub fn depth_buffer(&self) -> &Image {
        &self.depth_buffer
    }
}

/// Creates and destroys the framebuffer-dependent resources as a unit
pub struct FramebufferManager {
    device: Device,
    queue: Queue,
    image_pool: MemPool,
    cmd_buf: CmdBuf,
    _cmd_mem: MemHandle,
    framebuffer_count: usize,
    clear_color: [f32; 4],
    resources: Option<FramebufferResources>,
}

impl std::fmt::Debug for FramebufferManager {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("FramebufferManager")
            .field("framebuffer_count", &self.framebuffer_count)
            .field("size", &self.size())
            .finish()
    }
}

impl FramebufferManager {
    /// Create the manager and feed its static command buffer
    ///
    /// # Arguments
    ///
    /// * `queue` - Queue drained before resources are destroyed
    /// * `image_pool` - Pool the framebuffers and stencil buffer come from
    /// * `data_pool` - Pool providing `config.static_cmd_size` bytes of command memory
    pub fn new(queue: &Queue, image_pool: &MemPool, data_pool: &MemPool, config: &SampleConfig) -> Result<Self> {
        let device = queue.device().clone();
        let cmd_mem = data_pool.allocate(config.static_cmd_size, CMDMEM_ALIGNMENT)?;
        let mut cmd_buf = CmdBuf::new(&device);
        cmd_buf.add_memory_handle(&cmd_mem)?;

        Ok(Self {
            device,
            queue: queue.clone(),
            image_pool: image_pool.clone(),
            cmd_buf,
            _cmd_mem: cmd_mem,
            framebuffer_count: config.framebuffer_count,
            clear_color: config.clear_color,
            resources: None,
        })
    }

    pub fn resources(&self) -> Option<&FramebufferResources> {
        self.resources.as_ref()
    }

    pub fn has_resources(&self) -> bool {
        self.resources.is_some()
    }

    /// Current framebuffer size, if resources exist
    pub fn size(&self) -> Option<(u32, u32)> {
        self.resources.as_ref().map(FramebufferResources::size)
    }

    /// Build the stencil buffer, framebuffers, per-slot bind lists, swapchain and static list
    pub fn create_resources(&mut self, width: u32, height: u32) -> Result<()> {
        if self.resources.is_some() {
            return Err(Error::InvalidState(
                "framebuffer resources must be destroyed before they are recreated".to_string(),
            ));
        }

        let resources = match self.build_resources(width, height) {
            Ok(resources) => resources,
            Err(err) => {
                // Lists recorded before the failure must not keep their command memory
                self.cmd_buf.clear();
                return Err(err);
            }
        };
        self.resources = Some(resources);

        crate::engine_info!(
            "vgdemo::FramebufferManager",
            "Created {} framebuffers of {}x{}",
            self.framebuffer_count,
            width,
            height
        );
        Ok(())
    }

    fn build_resources(&mut self, width: u32, height: u32) -> Result<FramebufferResources> {
        let depth_layout = ImageLayoutMaker::new(&self.device)
            .set_flags(ImageFlags::USAGE_RENDER | ImageFlags::HW_COMPRESSION)
            .set_format(ImageFormat::S8)
            .set_dimensions(width, height)
            .initialize()?;
        let depth_buffer = Image::create(&self.device, &depth_layout, &self.image_pool)?;

        let framebuffer_layout = ImageLayoutMaker::new(&self.device)
            .set_flags(ImageFlags::USAGE_RENDER | ImageFlags::USAGE_PRESENT | ImageFlags::HW_COMPRESSION)
            .set_format(ImageFormat::RGBA8Unorm)
            .set_dimensions(width, height)
            .initialize()?;

        let mut framebuffers = Vec::with_capacity(self.framebuffer_count);
        let mut bind_lists = Vec::with_capacity(self.framebuffer_count);
        for _ in 0..self.framebuffer_count {
            let framebuffer = Image::create(&self.device, &framebuffer_layout, &self.image_pool)?;
            self.cmd_buf
                .bind_render_targets(framebuffer.key(), Some(depth_buffer.key()))?;
            bind_lists.push(self.cmd_buf.finish_list());
            framebuffers.push(framebuffer);
        }

        let swapchain = SwapchainMaker::new(&self.device, framebuffers.iter()).create()?;
        let render_list = self.record_static_commands(width, height)?;

        Ok(FramebufferResources {
            width,
            height,
            swapchain,
            bind_lists,
            render_list,
            framebuffers,
            depth_buffer,
        })
    }

    /// Drain the queue, then release everything `create_resources` built
    ///
    /// Does nothing (and does not wait) when no resources exist.
    pub fn destroy_resources(&mut self) -> Result<()> {
        if self.resources.is_none() {
            return Ok(());
        }
        self.queue.wait_idle()?;

        // Invalidates the bind lists and the static list
        self.cmd_buf.clear();

        if let Some(resources) = self.resources.take() {
            let FramebufferResources { swapchain, framebuffers, depth_buffer, .. } = resources;
            swapchain.destroy();
            drop(framebuffers);
            drop(depth_buffer);
        }

        crate::engine_debug!("vgdemo::FramebufferManager", "Framebuffer resources destroyed");
        Ok(())
    }

    /// Record the list replayed at the start of every frame
    fn record_static_commands(&mut self, width: u32, height: u32) -> Result<CmdList> {
        self.cmd_buf.set_viewport(Viewport {
            x: 0.0,
            y: 0.0,
            width: width as f32,
            height: height as f32,
            near: 0.0,
            far: 1.0,
        })?;
        self.cmd_buf.set_scissor(Scissor { x: 0, y: 0, width, height })?;

        self.cmd_buf.clear_color(self.clear_color)?;
        self.cmd_buf.clear_depth_stencil(true, 1.0, 0xFF, 0)?;

        self.cmd_buf.bind_rasterizer_state(RasterizerState::default())?;
        self.cmd_buf.bind_color_state(ColorState::default())?;
        self.cmd_buf.bind_color_write_state(ColorWriteState::default())?;

        Ok(self.cmd_buf.finish_list())
    }
}

impl Drop for FramebufferManager {
    fn drop(&mut self) {
        let _ = self.destroy_resources();
    }
}

#[cfg(test)]
#[path = "resources_tests.rs"]
mod tests;
