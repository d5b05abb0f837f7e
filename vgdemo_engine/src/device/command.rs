/// Recorded GPU commands and immutable command lists

use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

use crate::device::state::{
    BlendState, ColorState, ColorWriteState, DepthStencilState, Primitive, RasterizerState,
    SamplerFlags, Scissor, StencilMasks, Viewport, VtxAttribState, VtxBufferState,
};
use crate::device::types::{CopyRect, GpuAddr, ImageKey, ShaderKey, ShaderStage};

/// One recorded GPU command
///
/// Commands are what backends translate into native command streams. Each
/// command occupies `encoded_size()` bytes of the command memory attached to
/// the recording `CmdBuf`.
#[derive(Debug, Clone, PartialEq)]
pub enum Command {
    /// Bind a color target and an optional depth/stencil target
    BindRenderTargets { color: ImageKey, depth: Option<ImageKey> },
    SetViewport(Viewport),
    SetScissor(Scissor),
    /// Clear the bound color target
    ClearColor { color: [f32; 4] },
    /// Clear the bound depth/stencil target
    ClearDepthStencil { clear_depth: bool, depth: f32, stencil_mask: u8, stencil_value: u8 },
    BindRasterizerState(RasterizerState),
    BindColorState(ColorState),
    BindColorWriteState(ColorWriteState),
    BindBlendState(BlendState),
    BindDepthStencilState(DepthStencilState),
    SetStencil(StencilMasks),
    BindShaders { vertex: ShaderKey, fragment: ShaderKey },
    BindVtxAttribState(Vec<VtxAttribState>),
    BindVtxBufferState(Vec<VtxBufferState>),
    BindVtxBuffer { slot: u32, addr: GpuAddr, size: u64 },
    BindUniformBuffer { stage: ShaderStage, addr: GpuAddr, size: u64 },
    /// Bind an image with one of the preset samplers
    BindTexture { stage: ShaderStage, image: ImageKey, sampler: SamplerFlags },
    Draw { primitive: Primitive, vertex_count: u32, instance_count: u32, first_vertex: u32, first_instance: u32 },
    /// Copy tightly packed linear pixels into a region of an image
    CopyBufferToImage { src: GpuAddr, image: ImageKey, rect: CopyRect },
    /// Full pipeline barrier
    Barrier,
}

impl Command {
    /// Bytes of command memory this command consumes
    pub fn encoded_size(&self) -> u64 {
        let words: u64 = match self {
            Command::BindRenderTargets { .. } => 4,
            Command::SetViewport(_) => 7,
            Command::SetScissor(_) => 5,
            Command::ClearColor { .. } => 5,
            Command::ClearDepthStencil { .. } => 3,
            Command::BindRasterizerState(_) => 2,
            Command::BindColorState(_) => 2,
            Command::BindColorWriteState(_) => 2,
            Command::BindBlendState(_) => 3,
            Command::BindDepthStencilState(_) => 3,
            Command::SetStencil(_) => 2,
            Command::BindShaders { .. } => 5,
            Command::BindVtxAttribState(attribs) => 1 + attribs.len() as u64,
            Command::BindVtxBufferState(buffers) => 1 + buffers.len() as u64,
            Command::BindVtxBuffer { .. } => 5,
            Command::BindUniformBuffer { .. } => 5,
            Command::BindTexture { .. } => 3,
            Command::Draw { .. } => 5,
            Command::CopyBufferToImage { .. } => 9,
            Command::Barrier => 1,
        };
        words * 4
    }
}

/// Immutable list of commands produced by `CmdBuf::finish_list`
///
/// A list stays replayable until the command buffer that produced it is
/// cleared; `Queue::submit_commands` rejects stale lists.
#[derive(Debug, Clone)]
pub struct CmdList {
    commands: Arc<[Command]>,
    generation: u64,
    source_generation: Arc<AtomicU64>,
}

impl CmdList {
    pub(crate) fn new(commands: Vec<Command>, source_generation: Arc<AtomicU64>) -> Self {
        let generation = source_generation.load(Ordering::Acquire);
        Self {
            commands: commands.into(),
            generation,
            source_generation,
        }
    }

    /// Recorded commands in submission order
    pub fn commands(&self) -> &[Command] {
        &self.commands
    }

    pub fn len(&self) -> usize {
        self.commands.len()
    }

    pub fn is_empty(&self) -> bool {
        self.commands.is_empty()
    }

    /// Whether the command memory behind this list is still intact
    pub fn is_valid(&self) -> bool {
        self.source_generation.load(Ordering::Acquire) == self.generation
    }
}
