/// CmdBuf - command recording into attached command memory
/// CmdMemRing - per-frame slices of one command memory allocation

use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

use crate::device::command::{CmdList, Command};
use crate::device::device::Device;
use crate::device::mem_pool::{MemHandle, MemPool};
use crate::device::state::{
    BlendState, ColorState, ColorWriteState, DepthStencilState, Face, Primitive, RasterizerState,
    SamplerFlags, Scissor, StencilMasks, Viewport, VtxAttribState, VtxBufferState,
};
use crate::device::types::{
    align_up, CopyRect, GpuAddr, ImageKey, ShaderKey, ShaderStage, CMDMEM_ALIGNMENT,
};
use crate::error::{Error, Result};

/// Command buffer
///
/// Commands consume the command memory attached with `add_memory`; recording
/// past its capacity fails. `finish_list` closes the commands recorded since
/// the previous list into an immutable `CmdList`. `clear` rewinds the memory
/// and invalidates every list finished so far.
pub struct CmdBuf {
    device: Device,
    chunks: usize,
    capacity: u64,
    used: u64,
    pending: Vec<Command>,
    generation: Arc<AtomicU64>,
}

impl std::fmt::Debug for CmdBuf {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("CmdBuf")
            .field("capacity", &self.capacity)
            .field("used", &self.used)
            .field("pending", &self.pending.len())
            .finish()
    }
}

impl CmdBuf {
    pub fn new(device: &Device) -> Self {
        Self {
            device: device.clone(),
            chunks: 0,
            capacity: 0,
            used: 0,
            pending: Vec::new(),
            generation: Arc::new(AtomicU64::new(0)),
        }
    }

    /// Attach `size` bytes of command memory starting at `addr`
    pub fn add_memory(&mut self, addr: GpuAddr, size: u64) -> Result<()> {
        if addr.offset % CMDMEM_ALIGNMENT != 0 || size % CMDMEM_ALIGNMENT != 0 {
            return self.device.check(
                "CmdBuf::add_memory",
                Err(Error::InvalidResource(format!(
                    "command memory at {} with size {} is not {}-byte aligned",
                    addr.offset, size, CMDMEM_ALIGNMENT
                ))),
            );
        }
        self.chunks += 1;
        self.capacity += size;
        Ok(())
    }

    /// Attach the whole range of a pool allocation
    pub fn add_memory_handle(&mut self, handle: &MemHandle) -> Result<()> {
        self.add_memory(handle.gpu_addr(), handle.size())
    }

    /// Number of memory ranges attached since the last `discard_memory`
    pub fn chunk_count(&self) -> usize {
        self.chunks
    }

    /// Bytes of attached command memory
    pub fn capacity(&self) -> u64 {
        self.capacity
    }

    /// Bytes consumed since the last `clear`
    pub fn used(&self) -> u64 {
        self.used
    }

    /// Record one command
    pub fn push(&mut self, command: Command) -> Result<()> {
        let size = command.encoded_size();
        if self.used + size > self.capacity {
            return self.device.check(
                "CmdBuf::push",
                Err(Error::OutOfMemory),
            );
        }
        self.used += size;
        self.pending.push(command);
        Ok(())
    }

    /// Close the commands recorded since the previous list
    pub fn finish_list(&mut self) -> CmdList {
        let commands = std::mem::take(&mut self.pending);
        CmdList::new(commands, self.generation.clone())
    }

    /// Rewind the attached memory; every list finished so far becomes stale
    pub fn clear(&mut self) {
        self.generation.fetch_add(1, Ordering::AcqRel);
        self.pending.clear();
        self.used = 0;
    }

    /// Forget all attached memory without invalidating finished lists
    pub fn discard_memory(&mut self) {
        self.chunks = 0;
        self.capacity = 0;
        self.used = 0;
    }

    // ===== RECORDING HELPERS =====

    pub fn bind_render_targets(&mut self, color: ImageKey, depth: Option<ImageKey>) -> Result<()> {
        self.push(Command::BindRenderTargets { color, depth })
    }

    pub fn set_viewport(&mut self, viewport: Viewport) -> Result<()> {
        self.push(Command::SetViewport(viewport))
    }

    pub fn set_scissor(&mut self, scissor: Scissor) -> Result<()> {
        self.push(Command::SetScissor(scissor))
    }

    pub fn clear_color(&mut self, color: [f32; 4]) -> Result<()> {
        self.push(Command::ClearColor { color })
    }

    pub fn clear_depth_stencil(
        &mut self,
        clear_depth: bool,
        depth: f32,
        stencil_mask: u8,
        stencil_value: u8,
    ) -> Result<()> {
        self.push(Command::ClearDepthStencil { clear_depth, depth, stencil_mask, stencil_value })
    }

    pub fn bind_rasterizer_state(&mut self, state: RasterizerState) -> Result<()> {
        self.push(Command::BindRasterizerState(state))
    }

    pub fn bind_color_state(&mut self, state: ColorState) -> Result<()> {
        self.push(Command::BindColorState(state))
    }

    pub fn bind_color_write_state(&mut self, state: ColorWriteState) -> Result<()> {
        self.push(Command::BindColorWriteState(state))
    }

    pub fn bind_blend_state(&mut self, state: BlendState) -> Result<()> {
        self.push(Command::BindBlendState(state))
    }

    pub fn bind_depth_stencil_state(&mut self, state: DepthStencilState) -> Result<()> {
        self.push(Command::BindDepthStencilState(state))
    }

    pub fn set_stencil(&mut self, face: Face, write_mask: u8, reference: u8, compare_mask: u8) -> Result<()> {
        self.push(Command::SetStencil(StencilMasks { face, write_mask, reference, compare_mask }))
    }

    pub fn bind_shaders(&mut self, vertex: ShaderKey, fragment: ShaderKey) -> Result<()> {
        self.push(Command::BindShaders { vertex, fragment })
    }

    pub fn bind_vtx_attrib_state(&mut self, attribs: &[VtxAttribState]) -> Result<()> {
        self.push(Command::BindVtxAttribState(attribs.to_vec()))
    }

    pub fn bind_vtx_buffer_state(&mut self, buffers: &[VtxBufferState]) -> Result<()> {
        self.push(Command::BindVtxBufferState(buffers.to_vec()))
    }

    pub fn bind_vtx_buffer(&mut self, slot: u32, addr: GpuAddr, size: u64) -> Result<()> {
        self.push(Command::BindVtxBuffer { slot, addr, size })
    }

    pub fn bind_uniform_buffer(&mut self, stage: ShaderStage, addr: GpuAddr, size: u64) -> Result<()> {
        self.push(Command::BindUniformBuffer { stage, addr, size })
    }

    pub fn bind_texture(&mut self, stage: ShaderStage, image: ImageKey, sampler: SamplerFlags) -> Result<()> {
        self.push(Command::BindTexture { stage, image, sampler })
    }

    pub fn draw(&mut self, primitive: Primitive, vertex_count: u32, first_vertex: u32) -> Result<()> {
        self.push(Command::Draw {
            primitive,
            vertex_count,
            instance_count: 1,
            first_vertex,
            first_instance: 0,
        })
    }

    pub fn copy_buffer_to_image(&mut self, src: GpuAddr, image: ImageKey, rect: CopyRect) -> Result<()> {
        self.push(Command::CopyBufferToImage { src, image, rect })
    }

    pub fn barrier(&mut self) -> Result<()> {
        self.push(Command::Barrier)
    }
}

/// Ring of `N` equal slices of one command memory allocation
///
/// `begin` clears the command buffer and attaches the current slice; `end`
/// finishes the list and advances to the next slice.
#[derive(Debug)]
pub struct CmdMemRing<const N: usize> {
    memory: Option<MemHandle>,
    slice_size: u64,
    current: usize,
}

impl<const N: usize> Default for CmdMemRing<N> {
    fn default() -> Self {
        Self::new()
    }
}

impl<const N: usize> CmdMemRing<N> {
    pub fn new() -> Self {
        Self { memory: None, slice_size: 0, current: 0 }
    }

    /// Allocate `size` bytes from `pool`, split into `N` slices
    pub fn allocate(&mut self, pool: &MemPool, size: u64) -> Result<()> {
        let slice_size = align_up(size / N as u64, CMDMEM_ALIGNMENT);
        self.memory = Some(pool.allocate(slice_size * N as u64, CMDMEM_ALIGNMENT)?);
        self.slice_size = slice_size;
        self.current = 0;
        Ok(())
    }

    /// Slice index the next `begin` attaches
    pub fn current_slot(&self) -> usize {
        self.current
    }

    pub fn slice_size(&self) -> u64 {
        self.slice_size
    }

    pub fn begin(&mut self, cmdbuf: &mut CmdBuf) -> Result<()> {
        let memory = self
            .memory
            .as_ref()
            .ok_or_else(|| Error::InvalidState("command memory ring not allocated".to_string()))?;
        let base = memory.gpu_addr();
        cmdbuf.clear();
        cmdbuf.discard_memory();
        cmdbuf.add_memory(
            GpuAddr { block: base.block, offset: base.offset + self.slice_size * self.current as u64 },
            self.slice_size,
        )
    }

    pub fn end(&mut self, cmdbuf: &mut CmdBuf) -> CmdList {
        self.current = (self.current + 1) % N;
        cmdbuf.finish_list()
    }

    /// Release the ring memory
    pub fn free(&mut self) {
        if let Some(memory) = self.memory.take() {
            memory.destroy();
        }
        self.slice_size = 0;
        self.current = 0;
    }
}

#[cfg(test)]
#[path = "cmd_buf_tests.rs"]
mod tests;
