/// Mock graphics backend for unit tests (no GPU required)
///
/// `MockBackend` keeps every object in memory, emulates CPU writes and
/// buffer-to-image copies, and records each call as a `MockEvent`. The
/// `MockProbe` returned next to it stays usable after the backend has been
/// moved into a `Device`, and can make a chosen call fail.

use std::sync::{Arc, Mutex, MutexGuard};

use slotmap::SlotMap;

use crate::device::backend::GraphicsBackend;
use crate::device::command::Command;
use crate::device::debug::{DebugReport, DeviceResult, ErrorSink};
use crate::device::device::{Device, DeviceMaker};
use crate::device::types::{
    align_up, ImageKey, ImageLayout, ImageLayoutDesc, MemBlockFlags, MemBlockKey, ShaderKey,
    ShaderStage, SwapchainKey,
};
use crate::error::{Error, Result};

/// Memory size granularity of mock images
pub const MOCK_IMAGE_ALIGNMENT: u64 = 0x100;

/// Backend call selector used for failure injection
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum MockCall {
    CreateMemBlock,
    DestroyMemBlock,
    WriteMemBlock,
    ImageLayout,
    CreateImage,
    DestroyImage,
    CreateShader,
    DestroyShader,
    CreateSwapchain,
    DestroySwapchain,
    AcquireImage,
    SubmitCommands,
    PresentImage,
    WaitIdle,
}

/// Recorded backend call
#[derive(Debug, Clone, PartialEq)]
pub enum MockEvent {
    CreateMemBlock { key: MemBlockKey, flags: MemBlockFlags, size: u64 },
    DestroyMemBlock(MemBlockKey),
    CreateImage { key: ImageKey, desc: ImageLayoutDesc },
    DestroyImage(ImageKey),
    CreateShader { key: ShaderKey, stage: ShaderStage, size: u64 },
    DestroyShader(ShaderKey),
    CreateSwapchain { key: SwapchainKey, images: Vec<ImageKey> },
    DestroySwapchain(SwapchainKey),
    AcquireImage { slot: usize },
    Submit(Vec<Command>),
    Present { slot: usize },
    WaitIdle,
}

#[derive(Debug)]
struct MockBlock {
    flags: MemBlockFlags,
    data: Vec<u8>,
}

#[derive(Debug)]
struct MockImage {
    layout: ImageLayout,
    pixels: Vec<u8>,
}

#[derive(Debug)]
struct MockShader {
    code: Vec<u8>,
}

#[derive(Debug)]
struct MockSwapchain {
    images: Vec<ImageKey>,
    next_slot: usize,
}

#[derive(Debug, Default)]
struct MockState {
    blocks: SlotMap<MemBlockKey, MockBlock>,
    images: SlotMap<ImageKey, MockImage>,
    shaders: SlotMap<ShaderKey, MockShader>,
    swapchains: SlotMap<SwapchainKey, MockSwapchain>,
    events: Vec<MockEvent>,
    failures: Vec<(MockCall, Error)>,
    write_count: usize,
}

impl MockState {
    fn take_failure(&mut self, call: MockCall) -> Result<()> {
        match self.failures.iter().position(|(c, _)| *c == call) {
            Some(index) => Err(self.failures.remove(index).1),
            None => Ok(()),
        }
    }

    fn copy_buffer_to_image(&mut self, command: &Command) -> Result<()> {
        let Command::CopyBufferToImage { src, image, rect } = command else {
            return Ok(());
        };
        let (width, bpp) = match self.images.get(*image) {
            Some(target) => (target.layout.width(), target.layout.format().bytes_per_pixel()),
            None => return Err(Error::InvalidResource("copy into a destroyed image".to_string())),
        };
        let height = self.images.get(*image).map(|i| i.layout.height()).unwrap_or(0);
        if rect.x + rect.width > width || rect.y + rect.height > height {
            return Err(Error::InvalidResource(format!(
                "copy region {:?} outside a {}x{} image",
                rect, width, height
            )));
        }

        let row_bytes = (rect.width * bpp) as usize;
        let total = row_bytes * rect.height as usize;
        let source = self
            .blocks
            .get(src.block)
            .and_then(|block| block.data.get(src.offset as usize..src.offset as usize + total))
            .map(|bytes| bytes.to_vec())
            .ok_or_else(|| Error::InvalidResource("copy source outside its block".to_string()))?;

        if let Some(target) = self.images.get_mut(*image) {
            let pitch = (width * bpp) as usize;
            for row in 0..rect.height as usize {
                let dst = (rect.y as usize + row) * pitch + (rect.x * bpp) as usize;
                target.pixels[dst..dst + row_bytes]
                    .copy_from_slice(&source[row * row_bytes..(row + 1) * row_bytes]);
            }
        }
        Ok(())
    }

    /// Check every image and shader referenced by a command stream is alive
    fn validate_commands(&self, commands: &[Command]) -> Result<()> {
        for command in commands {
            let alive = match command {
                Command::BindRenderTargets { color, depth } => {
                    self.images.contains_key(*color)
                        && depth.map_or(true, |d| self.images.contains_key(d))
                }
                Command::BindShaders { vertex, fragment } => {
                    self.shaders.contains_key(*vertex) && self.shaders.contains_key(*fragment)
                }
                Command::BindTexture { image, .. } => self.images.contains_key(*image),
                Command::BindVtxBuffer { addr, .. } | Command::BindUniformBuffer { addr, .. } => {
                    self.blocks.contains_key(addr.block)
                }
                _ => true,
            };
            if !alive {
                return Err(Error::InvalidResource(format!(
                    "command references a destroyed object: {:?}",
                    command
                )));
            }
        }
        Ok(())
    }
}

fn lock(state: &Mutex<MockState>) -> MutexGuard<'_, MockState> {
    state.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
}

/// In-memory `GraphicsBackend`
#[derive(Debug)]
pub struct MockBackend {
    state: Arc<Mutex<MockState>>,
}

impl MockBackend {
    /// Create a backend and the probe observing it
    pub fn new() -> (Self, MockProbe) {
        let state = Arc::new(Mutex::new(MockState::default()));
        (Self { state: state.clone() }, MockProbe { state })
    }
}

impl GraphicsBackend for MockBackend {
    fn name(&self) -> &str {
        "mock"
    }

    fn create_mem_block(&mut self, flags: MemBlockFlags, size: u64) -> Result<MemBlockKey> {
        let mut state = lock(&self.state);
        state.take_failure(MockCall::CreateMemBlock)?;
        let key = state.blocks.insert(MockBlock { flags, data: vec![0; size as usize] });
        state.events.push(MockEvent::CreateMemBlock { key, flags, size });
        Ok(key)
    }

    fn destroy_mem_block(&mut self, block: MemBlockKey) -> Result<()> {
        let mut state = lock(&self.state);
        state.take_failure(MockCall::DestroyMemBlock)?;
        state
            .blocks
            .remove(block)
            .ok_or_else(|| Error::InvalidResource("unknown memory block".to_string()))?;
        state.events.push(MockEvent::DestroyMemBlock(block));
        Ok(())
    }

    fn write_mem_block(&mut self, block: MemBlockKey, offset: u64, data: &[u8]) -> Result<()> {
        let mut state = lock(&self.state);
        state.take_failure(MockCall::WriteMemBlock)?;
        let target = state
            .blocks
            .get_mut(block)
            .ok_or_else(|| Error::InvalidResource("unknown memory block".to_string()))?;
        if !target.flags.is_cpu_visible() {
            return Err(Error::InvalidResource("memory block is not CPU visible".to_string()));
        }
        let start = offset as usize;
        let bytes = target
            .data
            .get_mut(start..start + data.len())
            .ok_or_else(|| Error::InvalidResource("write outside memory block".to_string()))?;
        bytes.copy_from_slice(data);
        state.write_count += 1;
        Ok(())
    }

    fn image_layout(&mut self, desc: &ImageLayoutDesc) -> Result<ImageLayout> {
        let mut state = lock(&self.state);
        state.take_failure(MockCall::ImageLayout)?;
        let bytes = desc.width as u64 * desc.height as u64 * desc.format.bytes_per_pixel() as u64;
        Ok(ImageLayout::new(*desc, align_up(bytes, MOCK_IMAGE_ALIGNMENT), MOCK_IMAGE_ALIGNMENT))
    }

    fn create_image(&mut self, layout: &ImageLayout, block: MemBlockKey, offset: u64) -> Result<ImageKey> {
        let mut state = lock(&self.state);
        state.take_failure(MockCall::CreateImage)?;
        let memory = state
            .blocks
            .get(block)
            .ok_or_else(|| Error::InvalidResource("unknown memory block".to_string()))?;
        if !memory.flags.contains(MemBlockFlags::IMAGE) {
            return Err(Error::InvalidResource("image memory block lacks the IMAGE flag".to_string()));
        }
        if offset % layout.alignment() != 0 || offset + layout.size() > memory.data.len() as u64 {
            return Err(Error::InvalidResource("image does not fit its memory range".to_string()));
        }
        let pixels = vec![0; layout.size() as usize];
        let key = state.images.insert(MockImage { layout: *layout, pixels });
        state.events.push(MockEvent::CreateImage { key, desc: *layout.desc() });
        Ok(key)
    }

    fn destroy_image(&mut self, image: ImageKey) -> Result<()> {
        let mut state = lock(&self.state);
        state.take_failure(MockCall::DestroyImage)?;
        state
            .images
            .remove(image)
            .ok_or_else(|| Error::InvalidResource("unknown image".to_string()))?;
        state.events.push(MockEvent::DestroyImage(image));
        Ok(())
    }

    fn create_shader(&mut self, stage: ShaderStage, block: MemBlockKey, offset: u64, size: u64) -> Result<ShaderKey> {
        let mut state = lock(&self.state);
        state.take_failure(MockCall::CreateShader)?;
        let code = state
            .blocks
            .get(block)
            .filter(|memory| memory.flags.contains(MemBlockFlags::CODE))
            .and_then(|memory| memory.data.get(offset as usize..(offset + size) as usize))
            .map(|bytes| bytes.to_vec())
            .ok_or_else(|| Error::InvalidResource("shader code outside a code block".to_string()))?;
        let key = state.shaders.insert(MockShader { code });
        state.events.push(MockEvent::CreateShader { key, stage, size });
        Ok(key)
    }

    fn destroy_shader(&mut self, shader: ShaderKey) -> Result<()> {
        let mut state = lock(&self.state);
        state.take_failure(MockCall::DestroyShader)?;
        state
            .shaders
            .remove(shader)
            .ok_or_else(|| Error::InvalidResource("unknown shader".to_string()))?;
        state.events.push(MockEvent::DestroyShader(shader));
        Ok(())
    }

    fn create_swapchain(&mut self, images: &[ImageKey]) -> Result<SwapchainKey> {
        let mut state = lock(&self.state);
        state.take_failure(MockCall::CreateSwapchain)?;
        if images.iter().any(|image| !state.images.contains_key(*image)) {
            return Err(Error::InvalidResource("swapchain over a destroyed image".to_string()));
        }
        let key = state.swapchains.insert(MockSwapchain { images: images.to_vec(), next_slot: 0 });
        state.events.push(MockEvent::CreateSwapchain { key, images: images.to_vec() });
        Ok(key)
    }

    fn destroy_swapchain(&mut self, swapchain: SwapchainKey) -> Result<()> {
        let mut state = lock(&self.state);
        state.take_failure(MockCall::DestroySwapchain)?;
        state
            .swapchains
            .remove(swapchain)
            .ok_or_else(|| Error::InvalidResource("unknown swapchain".to_string()))?;
        state.events.push(MockEvent::DestroySwapchain(swapchain));
        Ok(())
    }

    fn acquire_image(&mut self, swapchain: SwapchainKey) -> Result<usize> {
        let mut state = lock(&self.state);
        state.take_failure(MockCall::AcquireImage)?;
        let chain = state
            .swapchains
            .get_mut(swapchain)
            .ok_or_else(|| Error::InvalidResource("unknown swapchain".to_string()))?;
        let slot = chain.next_slot;
        chain.next_slot = (slot + 1) % chain.images.len();
        state.events.push(MockEvent::AcquireImage { slot });
        Ok(slot)
    }

    fn submit_commands(&mut self, commands: &[Command]) -> Result<()> {
        let mut state = lock(&self.state);
        state.take_failure(MockCall::SubmitCommands)?;
        state.validate_commands(commands)?;
        for command in commands {
            state.copy_buffer_to_image(command)?;
        }
        state.events.push(MockEvent::Submit(commands.to_vec()));
        Ok(())
    }

    fn present_image(&mut self, swapchain: SwapchainKey, slot: usize) -> Result<()> {
        let mut state = lock(&self.state);
        state.take_failure(MockCall::PresentImage)?;
        let chain = state
            .swapchains
            .get(swapchain)
            .ok_or_else(|| Error::InvalidResource("unknown swapchain".to_string()))?;
        if slot >= chain.images.len() {
            return Err(Error::InvalidResource(format!("slot {} out of range", slot)));
        }
        state.events.push(MockEvent::Present { slot });
        Ok(())
    }

    fn wait_idle(&mut self) -> Result<()> {
        let mut state = lock(&self.state);
        state.take_failure(MockCall::WaitIdle)?;
        state.events.push(MockEvent::WaitIdle);
        Ok(())
    }
}

/// Test-side view of a `MockBackend`
#[derive(Debug, Clone)]
pub struct MockProbe {
    state: Arc<Mutex<MockState>>,
}

impl MockProbe {
    /// Make the next call of kind `call` fail with `error`
    pub fn fail_next(&self, call: MockCall, error: Error) {
        lock(&self.state).failures.push((call, error));
    }

    /// Every recorded event, oldest first
    pub fn events(&self) -> Vec<MockEvent> {
        lock(&self.state).events.clone()
    }

    pub fn clear_events(&self) {
        lock(&self.state).events.clear();
    }

    /// Command streams of every successful submission, oldest first
    pub fn submissions(&self) -> Vec<Vec<Command>> {
        lock(&self.state)
            .events
            .iter()
            .filter_map(|event| match event {
                MockEvent::Submit(commands) => Some(commands.clone()),
                _ => None,
            })
            .collect()
    }

    pub fn live_block_count(&self) -> usize {
        lock(&self.state).blocks.len()
    }

    pub fn live_image_count(&self) -> usize {
        lock(&self.state).images.len()
    }

    pub fn live_shader_count(&self) -> usize {
        lock(&self.state).shaders.len()
    }

    pub fn live_swapchain_count(&self) -> usize {
        lock(&self.state).swapchains.len()
    }

    /// Number of successful CPU writes into memory blocks
    pub fn write_count(&self) -> usize {
        lock(&self.state).write_count
    }

    /// Descriptions of the live images
    pub fn live_images(&self) -> Vec<(ImageKey, ImageLayoutDesc)> {
        lock(&self.state)
            .images
            .iter()
            .map(|(key, image)| (key, *image.layout.desc()))
            .collect()
    }

    /// Tightly packed pixels of a live image
    pub fn image_pixels(&self, image: ImageKey) -> Option<Vec<u8>> {
        let state = lock(&self.state);
        let image = state.images.get(image)?;
        let bytes = image.layout.width() as usize
            * image.layout.height() as usize
            * image.layout.format().bytes_per_pixel() as usize;
        Some(image.pixels[..bytes].to_vec())
    }

    /// Bytes of a live memory block
    pub fn read_mem(&self, block: MemBlockKey, offset: u64, len: usize) -> Option<Vec<u8>> {
        let state = lock(&self.state);
        let start = offset as usize;
        state.blocks.get(block)?.data.get(start..start + len).map(|bytes| bytes.to_vec())
    }

    /// Code of a live shader
    pub fn shader_code(&self, shader: ShaderKey) -> Option<Vec<u8>> {
        lock(&self.state).shaders.get(shader).map(|s| s.code.clone())
    }
}

/// Report captured by `RecordingSink`
#[derive(Debug, Clone, PartialEq)]
pub struct RecordedReport {
    pub context: String,
    pub result: DeviceResult,
    pub message: String,
}

/// Error sink that records every report
#[derive(Debug, Clone, Default)]
pub struct RecordingSink {
    reports: Arc<Mutex<Vec<RecordedReport>>>,
}

impl RecordingSink {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn reports(&self) -> Vec<RecordedReport> {
        self.reports.lock().map(|r| r.clone()).unwrap_or_default()
    }

    /// Reports whose result is not `Success`
    pub fn failures(&self) -> Vec<RecordedReport> {
        self.reports()
            .into_iter()
            .filter(|report| !report.result.is_success())
            .collect()
    }
}

impl ErrorSink for RecordingSink {
    fn report(&self, report: &DebugReport<'_>) {
        if let Ok(mut reports) = self.reports.lock() {
            reports.push(RecordedReport {
                context: report.context.to_string(),
                result: report.result,
                message: report.message.to_string(),
            });
        }
    }
}

/// Device over a fresh `MockBackend`, reporting to a `RecordingSink`
pub fn mock_device() -> (Device, MockProbe, RecordingSink) {
    let (backend, probe) = MockBackend::new();
    let sink = RecordingSink::new();
    let device = DeviceMaker::new(backend).set_error_sink(sink.clone()).create();
    (device, probe, sink)
}

#[cfg(test)]
#[path = "mock_device_tests.rs"]
mod tests;
