/// Sample application - frame loop and operation-mode rebuild

use crate::config::SampleConfig;
use crate::device::{Device, MemBlockFlags, MemPool, Queue};
use crate::error::{Error, Result};
use crate::vg::Context;
use crate::vg_renderer::VgRenderer;
use super::content::DemoContent;
use super::host::{choose_framebuffer_size, Application, Buttons, InputState, OperationMode};
use super::resources::FramebufferManager;

/// The vector-graphics sample
///
/// Owns the queue, the three memory pools, the framebuffer resources, the
/// vector-graphics renderer and context, and the demo content. Dropping it
/// frees the content first, then the context (and the renderer it owns),
/// then the framebuffer resources.
pub struct SampleApp<C: DemoContent> {
    // Field order is drop order after `Drop::drop` freed the content
    content: C,
    vg: Context,
    framebuffers: FramebufferManager,
    image_pool: MemPool,
    code_pool: MemPool,
    data_pool: MemPool,
    queue: Queue,
    device: Device,
    config: SampleConfig,
    mode: OperationMode,
    framebuffer_size: (u32, u32),
}

impl<C: DemoContent> std::fmt::Debug for SampleApp<C> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SampleApp")
            .field("mode", &self.mode)
            .field("framebuffer_size", &self.framebuffer_size)
            .finish_non_exhaustive()
    }
}

impl<C: DemoContent> SampleApp<C> {
    /// Build every GPU object of the sample and load the demo content
    ///
    /// A content load failure is logged and the sample runs without it.
    ///
    /// # Arguments
    ///
    /// * `device` - Device, normally created with a `FatalErrorSink`
    /// * `config` - Sizes, pools and asset locations
    /// * `mode` - Operation mode at startup
    /// * `content` - What to draw every frame
    pub fn new(device: Device, config: SampleConfig, mode: OperationMode, mut content: C) -> Result<Self> {
        config.validate()?;

        let queue = Queue::new(&device);
        let image_pool = MemPool::new(&device, MemBlockFlags::GPU_CACHED | MemBlockFlags::IMAGE, config.image_pool_size);
        let code_pool = MemPool::new(
            &device,
            MemBlockFlags::CPU_UNCACHED | MemBlockFlags::GPU_CACHED | MemBlockFlags::CODE,
            config.code_pool_size,
        );
        let data_pool = MemPool::new(
            &device,
            MemBlockFlags::CPU_UNCACHED | MemBlockFlags::GPU_CACHED,
            config.data_pool_size,
        );

        let framebuffer_size = choose_framebuffer_size(&config, mode);
        let mut framebuffers = FramebufferManager::new(&queue, &image_pool, &data_pool, &config)?;
        framebuffers.create_resources(framebuffer_size.0, framebuffer_size.1)?;

        let renderer = VgRenderer::new(
            &queue,
            &image_pool,
            &code_pool,
            &data_pool,
            config.shader_dir.clone(),
            config.dynamic_cmd_size,
        );
        let mut vg = Context::new(Box::new(renderer), config.vg_flags)?;

        if let Err(err) = content.load(&mut vg) {
            crate::engine_warn!("vgdemo::SampleApp", "Failed to load demo content: {}", err);
        }

        crate::engine_info!(
            "vgdemo::SampleApp",
            "Sample ready on '{}' ({:?}, {}x{})",
            device.backend_name(),
            mode,
            framebuffer_size.0,
            framebuffer_size.1
        );

        Ok(Self {
            content,
            vg,
            framebuffers,
            image_pool,
            code_pool,
            data_pool,
            queue,
            device,
            config,
            mode,
            framebuffer_size,
        })
    }

    pub fn device(&self) -> &Device {
        &self.device
    }

    pub fn queue(&self) -> &Queue {
        &self.queue
    }

    pub fn image_pool(&self) -> &MemPool {
        &self.image_pool
    }

    pub fn code_pool(&self) -> &MemPool {
        &self.code_pool
    }

    pub fn data_pool(&self) -> &MemPool {
        &self.data_pool
    }

    pub fn framebuffers(&self) -> &FramebufferManager {
        &self.framebuffers
    }

    pub fn content(&self) -> &C {
        &self.content
    }

    pub fn mode(&self) -> OperationMode {
        self.mode
    }

    pub fn framebuffer_size(&self) -> (u32, u32) {
        self.framebuffer_size
    }

    /// Scale from the content design size to the framebuffer
    pub fn window_scale(&self) -> f32 {
        self.framebuffer_size.0 as f32 / self.config.design_size.0 as f32
    }

    /// Render and present one frame
    ///
    /// Acquires a slot, submits its bind list and the static list, draws the
    /// content through the vector-graphics context and presents the slot.
    ///
    /// # Arguments
    ///
    /// * `ns` - Time since start, in nanoseconds
    /// * `blowup` - Exaggerated rendering requested by the user
    pub fn render(&mut self, ns: u64, blowup: bool) -> Result<()> {
        let resources = self
            .framebuffers
            .resources()
            .ok_or_else(|| Error::InvalidState("no framebuffer resources to render into".to_string()))?;

        let slot = self.queue.acquire_image(resources.swapchain())?;
        let bind_list = resources
            .bind_list(slot)
            .ok_or_else(|| Error::InvalidState(format!("swapchain returned unknown slot {}", slot)))?;
        self.queue.submit_commands(bind_list)?;
        self.queue.submit_commands(resources.render_list())?;

        let (width, height) = self.framebuffer_size;
        let scale = self.window_scale();
        let (design_width, design_height) = self.config.design_size;

        self.vg.begin_frame(width as f32, height as f32, 1.0);
        self.vg.scale(scale, scale);
        self.content.render(
            &mut self.vg,
            0.0,
            0.0,
            design_width as f32,
            design_height as f32,
            ns as f32 / 1_000_000_000.0,
            blowup,
        );
        self.vg.end_frame()?;

        self.queue.present_image(resources.swapchain(), slot)
    }

    /// Rebuild the framebuffer resources for a new operation mode
    pub fn change_operation_mode(&mut self, mode: OperationMode) -> Result<()> {
        self.framebuffers.destroy_resources()?;

        let (width, height) = choose_framebuffer_size(&self.config, mode);
        self.framebuffers.create_resources(width, height)?;

        self.mode = mode;
        self.framebuffer_size = (width, height);
        crate::engine_info!("vgdemo::SampleApp", "mode changed: {}x{}", width, height);
        Ok(())
    }
}

impl<C: DemoContent> Application for SampleApp<C> {
    fn on_frame(&mut self, ns: u64, input: &InputState) -> bool {
        if input.pressed(Buttons::PLUS) {
            return false;
        }
        let blowup = input.is_held(Buttons::MINUS);

        match self.render(ns, blowup) {
            Ok(()) => true,
            Err(err) => {
                crate::engine_error!("vgdemo::SampleApp", "Frame failed: {}", err);
                false
            }
        }
    }

    fn on_operation_mode(&mut self, mode: OperationMode) {
        if let Err(err) = self.change_operation_mode(mode) {
            crate::engine_error!("vgdemo::SampleApp", "Operation mode change failed: {}", err);
        }
    }
}

impl<C: DemoContent> Drop for SampleApp<C> {
    fn drop(&mut self) {
        self.content.free(&mut self.vg);
    }
}

#[cfg(test)]
#[path = "app_tests.rs"]
mod tests;
