/// Renderer adapter - draws vector-graphics batches through the device model
///
/// `VgRenderer` implements `vg::RenderBackend`. Every flush uploads the
/// batch vertices and fragment uniforms into per-slot data-pool buffers and
/// records one command list through a two-slice command memory ring.

mod texture;

use std::path::PathBuf;

use glam::Vec2;

use crate::device::{
    align_up, CmdBuf, CmdMemRing, ColorMask, ColorState, ColorWriteState, CompareOp, CopyRect, DepthStencilState,
    Device, Face, GpuAddr, Image, ImageFlags as GpuImageFlags, ImageFormat, ImageLayoutMaker, MemHandle, MemPool,
    Primitive, Queue, RasterizerState, Shader, ShaderStage, StencilFaceState, StencilOp, VtxAttribFormat,
    VtxAttribState, VtxBufferState, CMDMEM_ALIGNMENT, IMAGE_LINEAR_STRIDE_ALIGNMENT, MEMBLOCK_ALIGNMENT,
    UNIFORM_BUF_ALIGNMENT,
};
use crate::error::{Error, Result};
use crate::vg::{
    Call, CallKind, CreateFlags, FragUniforms, FrameBatch, ImageFlags, ImageId, PathRange, RenderBackend,
    TextureInfo, TextureKind, Vertex,
};
use texture::{Texture, TextureStore};

/// Number of frames in flight (command memory slices and data buffers)
pub const FRAME_SLOTS: usize = 2;

/// Distance between two uniform blocks in the uniform buffer
pub const UNIFORM_STRIDE: u64 = UNIFORM_BUF_ALIGNMENT;

/// Bytes of the vertex-stage view uniform (vec2 padded to vec4)
const VIEW_UNIFORM_SIZE: u64 = 16;

/// Smallest per-slot data buffer
const MIN_BUFFER_SIZE: u64 = 0x1000;

const VERTEX_SHADER: &str = "fill_vsh.spv";
const FRAGMENT_SHADER: &str = "fill_fsh.spv";
const FRAGMENT_SHADER_AA: &str = "fill_aa_fsh.spv";

const VERTEX_ATTRIBS: [VtxAttribState; 2] = [
    VtxAttribState { buffer: 0, offset: 0, format: VtxAttribFormat::Float32x2 },
    VtxAttribState { buffer: 0, offset: 8, format: VtxAttribFormat::Float32x2 },
];

const VERTEX_BUFFERS: [VtxBufferState; 1] = [VtxBufferState { stride: 16, divisor: 0 }];

/// Vertex and uniform buffers of one frame slot
#[derive(Default)]
struct SlotBuffers {
    vertices: Option<MemHandle>,
    uniforms: Option<MemHandle>,
}

/// Make sure `slot` holds at least `size` bytes, growing to the next power of two
fn reserve(slot: &mut Option<MemHandle>, pool: &MemPool, size: u64, alignment: u64) -> Result<GpuAddr> {
    let fits = slot.as_ref().map(|handle| handle.size() >= size).unwrap_or(false);
    if !fits {
        // Release first so the old range can be reused
        *slot = None;
        let capacity = size.next_power_of_two().max(MIN_BUFFER_SIZE);
        *slot = Some(pool.allocate(capacity, alignment)?);
    }
    match slot {
        Some(handle) => Ok(handle.gpu_addr()),
        None => Err(Error::InvalidState("slot buffer missing after allocation".to_string())),
    }
}

/// Vector-graphics renderer on top of the device model
pub struct VgRenderer {
    device: Device,
    queue: Queue,
    image_pool: MemPool,
    code_pool: MemPool,
    data_pool: MemPool,
    shader_dir: PathBuf,
    cmd_mem_size: u64,
    flags: CreateFlags,
    view_size: Vec2,
    vertex_shader: Option<Shader>,
    fragment_shader: Option<Shader>,
    cmd_buf: CmdBuf,
    cmd_ring: CmdMemRing<FRAME_SLOTS>,
    slots: [SlotBuffers; FRAME_SLOTS],
    textures: TextureStore,
}

impl VgRenderer {
    /// Create a renderer; GPU objects are created by `render_create`
    ///
    /// # Arguments
    ///
    /// * `queue` - Queue used for draws and texture uploads
    /// * `image_pool` - Pool for texture images
    /// * `code_pool` - Pool for shader code
    /// * `data_pool` - Pool for command memory, vertex/uniform buffers and upload scratch
    /// * `shader_dir` - Directory holding the compiled fill shaders
    /// * `cmd_mem_size` - Command memory shared by the ring slices
    pub fn new(
        queue: &Queue,
        image_pool: &MemPool,
        code_pool: &MemPool,
        data_pool: &MemPool,
        shader_dir: impl Into<PathBuf>,
        cmd_mem_size: u64,
    ) -> Self {
        let device = queue.device().clone();
        Self {
            cmd_buf: CmdBuf::new(&device),
            device,
            queue: queue.clone(),
            image_pool: image_pool.clone(),
            code_pool: code_pool.clone(),
            data_pool: data_pool.clone(),
            shader_dir: shader_dir.into(),
            cmd_mem_size,
            flags: CreateFlags::empty(),
            view_size: Vec2::ZERO,
            vertex_shader: None,
            fragment_shader: None,
            cmd_ring: CmdMemRing::new(),
            slots: Default::default(),
            textures: TextureStore::new(),
        }
    }

    pub fn view_size(&self) -> Vec2 {
        self.view_size
    }

    pub fn texture_count(&self) -> usize {
        self.textures.len()
    }

    /// Copy rows of pixel data into an image through a scratch buffer
    fn upload(&self, image: &Image, rect: CopyRect, data: &[u8]) -> Result<()> {
        let scratch = self.data_pool.allocate(data.len() as u64, IMAGE_LINEAR_STRIDE_ALIGNMENT)?;
        scratch.write(0, data)?;

        let cmd_mem = self.data_pool.allocate(MEMBLOCK_ALIGNMENT, CMDMEM_ALIGNMENT)?;
        let mut cmd_buf = CmdBuf::new(&self.device);
        cmd_buf.add_memory_handle(&cmd_mem)?;
        cmd_buf.copy_buffer_to_image(scratch.gpu_addr(), image.key(), rect)?;

        self.queue.submit_commands(&cmd_buf.finish_list())?;
        self.queue.wait_idle()
    }

    /// Write the view uniform and every fragment uniform block into the slot buffer
    fn upload_uniforms(&mut self, slot: usize, uniforms: &[FragUniforms]) -> Result<GpuAddr> {
        let size = UNIFORM_STRIDE * (1 + uniforms.len() as u64);
        let addr = reserve(&mut self.slots[slot].uniforms, &self.data_pool, size, UNIFORM_BUF_ALIGNMENT)?;

        let mut bytes = vec![0u8; size as usize];
        bytes[..8].copy_from_slice(bytemuck::bytes_of(&self.view_size.to_array()));
        for (index, block) in uniforms.iter().enumerate() {
            let offset = UNIFORM_STRIDE as usize * (1 + index);
            bytes[offset..offset + FragUniforms::SIZE].copy_from_slice(bytemuck::bytes_of(block));
        }

        if let Some(handle) = &self.slots[slot].uniforms {
            handle.write(0, &bytes)?;
        }
        Ok(addr)
    }

    fn upload_vertices(&mut self, slot: usize, vertices: &[Vertex]) -> Result<(GpuAddr, u64)> {
        let bytes: &[u8] = bytemuck::cast_slice(vertices);
        let size = bytes.len() as u64;
        let addr = reserve(&mut self.slots[slot].vertices, &self.data_pool, size, 4)?;
        if let Some(handle) = &self.slots[slot].vertices {
            handle.write(0, bytes)?;
        }
        Ok((addr, size))
    }
}

/// Records the command sequence of each call kind
struct CallRecorder<'a> {
    cmd_buf: &'a mut CmdBuf,
    textures: &'a TextureStore,
    uniforms: GpuAddr,
    antialias: bool,
    stencil_strokes: bool,
}

impl CallRecorder<'_> {
    fn record(&mut self, call: &Call, paths: &[PathRange]) -> Result<()> {
        self.cmd_buf.bind_blend_state(call.blend.to_blend_state())?;
        match call.kind {
            CallKind::Fill => self.fill(call, paths),
            CallKind::ConvexFill => self.convex_fill(call, paths),
            CallKind::Stroke => self.stroke(call, paths),
            CallKind::Triangles => self.triangles(call),
        }
    }

    fn set_uniforms(&mut self, index: usize, image: Option<ImageId>) -> Result<()> {
        let addr = GpuAddr {
            block: self.uniforms.block,
            offset: self.uniforms.offset + UNIFORM_STRIDE * (1 + index as u64),
        };
        self.cmd_buf
            .bind_uniform_buffer(ShaderStage::Fragment, addr, FragUniforms::SIZE as u64)?;

        if let Some(texture) = image.and_then(|id| self.textures.get(id)) {
            self.cmd_buf
                .bind_texture(ShaderStage::Fragment, texture.image().key(), texture.sampler())?;
        }
        Ok(())
    }

    fn fill(&mut self, call: &Call, paths: &[PathRange]) -> Result<()> {
        self.cmd_buf.set_stencil(Face::FrontAndBack, 0xFF, 0, 0xFF)?;

        // Winding count into the stencil buffer, no color
        let stencil = DepthStencilState::default()
            .with_stencil_test(true)
            .with_front(StencilFaceState::new(CompareOp::Always, StencilOp::Keep, StencilOp::Keep, StencilOp::IncrementAndWrap))
            .with_back(StencilFaceState::new(CompareOp::Always, StencilOp::Keep, StencilOp::Keep, StencilOp::DecrementAndWrap));
        self.cmd_buf.bind_depth_stencil_state(stencil)?;
        self.cmd_buf
            .bind_color_write_state(ColorWriteState::default().with_mask(ColorMask::empty()))?;
        self.set_uniforms(call.uniform_offset, None)?;
        self.cmd_buf
            .bind_rasterizer_state(RasterizerState::default().with_cull_mode(Face::None))?;
        for path in paths {
            self.cmd_buf.draw(Primitive::TriangleFan, path.fill_count, path.fill_offset)?;
        }

        self.cmd_buf.bind_color_write_state(ColorWriteState::default())?;
        self.set_uniforms(call.uniform_offset + 1, call.image)?;
        self.cmd_buf.bind_rasterizer_state(RasterizerState::default())?;

        if self.antialias {
            let equal = StencilFaceState::new(CompareOp::Equal, StencilOp::Keep, StencilOp::Keep, StencilOp::Keep);
            self.cmd_buf.bind_depth_stencil_state(
                DepthStencilState::default().with_stencil_test(true).with_front(equal).with_back(equal),
            )?;
            for path in paths {
                self.cmd_buf.draw(Primitive::TriangleStrip, path.stroke_count, path.stroke_offset)?;
            }
        }

        // Cover the bounds wherever the winding is non-zero, clearing the stencil
        let cover = StencilFaceState::new(CompareOp::NotEqual, StencilOp::Zero, StencilOp::Zero, StencilOp::Zero);
        self.cmd_buf.bind_depth_stencil_state(
            DepthStencilState::default().with_stencil_test(true).with_front(cover).with_back(cover),
        )?;
        self.cmd_buf
            .draw(Primitive::TriangleStrip, call.triangle_count, call.triangle_offset)?;

        self.cmd_buf.bind_depth_stencil_state(DepthStencilState::default())
    }

    fn convex_fill(&mut self, call: &Call, paths: &[PathRange]) -> Result<()> {
        self.set_uniforms(call.uniform_offset, call.image)?;
        for path in paths {
            self.cmd_buf.draw(Primitive::TriangleFan, path.fill_count, path.fill_offset)?;
            if path.stroke_count > 0 {
                self.cmd_buf.draw(Primitive::TriangleStrip, path.stroke_count, path.stroke_offset)?;
            }
        }
        Ok(())
    }

    fn stroke(&mut self, call: &Call, paths: &[PathRange]) -> Result<()> {
        if !self.stencil_strokes {
            self.set_uniforms(call.uniform_offset, call.image)?;
            for path in paths {
                self.cmd_buf.draw(Primitive::TriangleStrip, path.stroke_count, path.stroke_offset)?;
            }
            return Ok(());
        }

        self.cmd_buf.set_stencil(Face::Front, 0xFF, 0, 0xFF)?;

        // Stroke base, each pixel once
        let base = StencilFaceState::new(CompareOp::Equal, StencilOp::Keep, StencilOp::Keep, StencilOp::IncrementAndClamp);
        self.cmd_buf
            .bind_depth_stencil_state(DepthStencilState::default().with_stencil_test(true).with_front(base))?;
        self.set_uniforms(call.uniform_offset + 1, call.image)?;
        for path in paths {
            self.cmd_buf.draw(Primitive::TriangleStrip, path.stroke_count, path.stroke_offset)?;
        }

        // Anti-aliased edges where the base was not drawn
        let fringe = StencilFaceState { pass_op: StencilOp::Keep, ..base };
        self.cmd_buf
            .bind_depth_stencil_state(DepthStencilState::default().with_stencil_test(true).with_front(fringe))?;
        self.set_uniforms(call.uniform_offset, call.image)?;
        for path in paths {
            self.cmd_buf.draw(Primitive::TriangleStrip, path.stroke_count, path.stroke_offset)?;
        }

        // Clear the stencil again, color writes off
        let clear = StencilFaceState::new(CompareOp::Always, StencilOp::Zero, StencilOp::Zero, StencilOp::Zero);
        self.cmd_buf
            .bind_depth_stencil_state(DepthStencilState::default().with_stencil_test(true).with_front(clear))?;
        self.cmd_buf
            .bind_color_write_state(ColorWriteState::default().with_mask(ColorMask::empty()))?;
        for path in paths {
            self.cmd_buf.draw(Primitive::TriangleStrip, path.stroke_count, path.stroke_offset)?;
        }
        self.cmd_buf.bind_color_write_state(ColorWriteState::default())?;

        self.cmd_buf.bind_depth_stencil_state(DepthStencilState::default())
    }

    fn triangles(&mut self, call: &Call) -> Result<()> {
        self.set_uniforms(call.uniform_offset, call.image)?;
        self.cmd_buf.draw(Primitive::Triangles, call.triangle_count, call.triangle_offset)
    }
}

impl RenderBackend for VgRenderer {
    fn render_create(&mut self, flags: CreateFlags) -> Result<()> {
        if self.vertex_shader.is_some() {
            return Err(Error::InvalidState("vector renderer already created".to_string()));
        }

        let fragment = if flags.contains(CreateFlags::ANTIALIAS) { FRAGMENT_SHADER_AA } else { FRAGMENT_SHADER };
        let vertex_shader = Shader::load(
            &self.device,
            &self.code_pool,
            ShaderStage::Vertex,
            &self.shader_dir.join(VERTEX_SHADER),
        )?;
        let fragment_shader = Shader::load(
            &self.device,
            &self.code_pool,
            ShaderStage::Fragment,
            &self.shader_dir.join(fragment),
        )?;
        self.cmd_ring.allocate(&self.data_pool, self.cmd_mem_size)?;

        self.vertex_shader = Some(vertex_shader);
        self.fragment_shader = Some(fragment_shader);
        self.flags = flags;

        crate::engine_info!(
            "vgdemo::VgRenderer",
            "Vector renderer created (fragment shader {}, flags {:?})",
            fragment,
            flags
        );
        Ok(())
    }

    fn create_texture(
        &mut self,
        kind: TextureKind,
        width: u32,
        height: u32,
        flags: ImageFlags,
        data: Option<&[u8]>,
    ) -> Result<ImageId> {
        let size = width as usize * height as usize * kind.bytes_per_pixel();
        if let Some(data) = data {
            if data.len() < size {
                return Err(Error::InvalidResource(format!(
                    "texture data of {} bytes is smaller than {}x{} pixels",
                    data.len(),
                    width,
                    height
                )));
            }
        }

        let format = match kind {
            TextureKind::Rgba => ImageFormat::RGBA8Unorm,
            TextureKind::Alpha => ImageFormat::R8Unorm,
        };
        let layout = ImageLayoutMaker::new(&self.device)
            .set_flags(GpuImageFlags::empty())
            .set_format(format)
            .set_dimensions(width, height)
            .initialize()?;
        let image = Image::create(&self.device, &layout, &self.image_pool)?;

        // Missing data leaves the texture zeroed
        let zeroes;
        let pixels = match data {
            Some(data) => &data[..size],
            None => {
                zeroes = vec![0u8; size];
                &zeroes[..]
            }
        };
        self.upload(&image, CopyRect { x: 0, y: 0, width, height }, pixels)?;

        let id = self.textures.insert(Texture::new(image, TextureInfo { kind, width, height, flags }));
        crate::engine_debug!("vgdemo::VgRenderer", "Created texture {} ({}x{} {:?})", id.raw(), width, height, kind);
        Ok(id)
    }

    fn delete_texture(&mut self, image: ImageId) -> bool {
        self.textures.remove(image).is_some()
    }

    fn update_texture(&mut self, image: ImageId, _x: u32, y: u32, _width: u32, height: u32, data: &[u8]) -> Result<bool> {
        let Some(texture) = self.textures.get(image) else {
            return Ok(false);
        };
        let info = texture.info();

        // Whole rows starting at `y`
        let row = info.width as usize * info.kind.bytes_per_pixel();
        let end_row = y
            .checked_add(height)
            .filter(|&end_row| end_row <= info.height)
            .ok_or_else(|| {
                Error::InvalidResource(format!(
                    "update of {} rows from {} does not fit texture {} ({}x{})",
                    height,
                    y,
                    image.raw(),
                    info.width,
                    info.height
                ))
            })?;
        let start = y as usize * row;
        let end = end_row as usize * row;
        if data.len() < end {
            return Err(Error::InvalidResource(format!(
                "update of rows {}..{} of texture {} needs {} bytes, {} given",
                y,
                end_row,
                image.raw(),
                end,
                data.len()
            )));
        }

        let rect = CopyRect { x: 0, y, width: info.width, height };
        self.upload(texture.image(), rect, &data[start..end])?;
        Ok(true)
    }

    fn texture_info(&self, image: ImageId) -> Option<TextureInfo> {
        self.textures.get(image).map(Texture::info)
    }

    fn render_viewport(&mut self, width: f32, height: f32, _device_pixel_ratio: f32) {
        self.view_size = Vec2::new(width, height);
    }

    fn render_cancel(&mut self) {}

    fn render_flush(&mut self, batch: &FrameBatch) -> Result<()> {
        if batch.calls.is_empty() {
            return Ok(());
        }
        let (Some(vertex_shader), Some(fragment_shader)) = (&self.vertex_shader, &self.fragment_shader) else {
            return Err(Error::InvalidState("render_flush before render_create".to_string()));
        };
        let (vertex_key, fragment_key) = (vertex_shader.key(), fragment_shader.key());

        let slot = self.cmd_ring.current_slot();
        let (vertex_addr, vertex_size) = self.upload_vertices(slot, &batch.vertices)?;
        let uniform_addr = self.upload_uniforms(slot, &batch.uniforms)?;

        self.cmd_ring.begin(&mut self.cmd_buf)?;

        self.cmd_buf.bind_color_state(ColorState::default().with_blend_enable(true))?;
        self.cmd_buf.bind_shaders(vertex_key, fragment_key)?;
        self.cmd_buf.bind_vtx_attrib_state(&VERTEX_ATTRIBS)?;
        self.cmd_buf.bind_vtx_buffer_state(&VERTEX_BUFFERS)?;
        self.cmd_buf.bind_vtx_buffer(0, vertex_addr, align_up(vertex_size, 4))?;
        self.cmd_buf
            .bind_uniform_buffer(ShaderStage::Vertex, uniform_addr, VIEW_UNIFORM_SIZE)?;

        let mut recorder = CallRecorder {
            cmd_buf: &mut self.cmd_buf,
            textures: &self.textures,
            uniforms: uniform_addr,
            antialias: self.flags.contains(CreateFlags::ANTIALIAS),
            stencil_strokes: self.flags.contains(CreateFlags::STENCIL_STROKES),
        };
        for call in &batch.calls {
            recorder.record(call, batch.call_paths(call))?;
        }

        let list = self.cmd_ring.end(&mut self.cmd_buf);
        self.queue.submit_commands(&list)
    }
}

impl Drop for VgRenderer {
    fn drop(&mut self) {
        // Lists recorded from the ring may still be executing
        if self.vertex_shader.is_some() {
            let _ = self.queue.wait_idle();
        }
    }
}

#[cfg(test)]
#[path = "vg_renderer_tests.rs"]
mod tests;
