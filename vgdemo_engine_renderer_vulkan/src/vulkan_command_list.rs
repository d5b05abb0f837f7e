/// Command recording - replays engine command lists into Vulkan command buffers
///
/// The engine's binding state survives from one submitted list to the next,
/// while a Vulkan command buffer starts from nothing. `QueueState` keeps the
/// engine-visible state across submissions and `CommandRecorder` applies it
/// lazily: rendering scopes open on the first clear or draw, and pipelines,
/// dynamic state, vertex buffers and descriptor sets are flushed at each draw
/// only when they differ from what the command buffer already has.

use ash::vk;
use slotmap::SlotMap;
use vgdemo_engine::device::{
    BlendState, ColorState, ColorWriteState, Command, CopyRect, DepthStencilState, Face, GpuAddr,
    ImageKey, MemBlockKey, Primitive, RasterizerState, SamplerFlags, Scissor, ShaderKey,
    ShaderStage, StencilMasks, Viewport, VtxAttribState, VtxBufferState,
};
use vgdemo_engine::vgdemo::{Error, Result};

use crate::vulkan_descriptor_set::{DescriptorAllocator, DescriptorKey, DescriptorWrite};
use crate::vulkan_format::{has_depth, has_stencil, scissor_to_vk, stencil_face_to_vk, viewport_to_vk};
use crate::vulkan_image::VulkanImage;
use crate::vulkan_memory::MemBlock;
use crate::vulkan_pipeline::{PipelineCache, PipelineKey};
use crate::vulkan_sampler::SamplerCache;
use crate::vulkan_shader::VulkanShader;

/// Dynamic stencil values of one face
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) struct StencilDynamic {
    pub write_mask: u8,
    pub reference: u8,
    pub compare_mask: u8,
}

/// Faces to program for the bound front/back stencil values
///
/// Identical values are set once for both faces.
pub(crate) fn stencil_updates(front: StencilDynamic, back: StencilDynamic) -> Vec<(Face, StencilDynamic)> {
    if front == back {
        vec![(Face::FrontAndBack, front)]
    } else {
        vec![(Face::Front, front), (Face::Back, back)]
    }
}

impl Default for StencilDynamic {
    fn default() -> Self {
        Self {
            write_mask: 0xFF,
            reference: 0,
            compare_mask: 0xFF,
        }
    }
}

/// Engine binding state, persistent across submissions
#[derive(Debug, Clone, Default)]
pub(crate) struct QueueState {
    pub color_target: Option<ImageKey>,
    pub depth_target: Option<ImageKey>,
    pub viewport: Option<Viewport>,
    pub scissor: Option<Scissor>,
    pub stencil_front: StencilDynamic,
    pub stencil_back: StencilDynamic,
    pub rasterizer: RasterizerState,
    pub color: ColorState,
    pub color_write: ColorWriteState,
    pub blend: BlendState,
    pub depth_stencil: DepthStencilState,
    pub shaders: Option<(ShaderKey, ShaderKey)>,
    pub attribs: Vec<VtxAttribState>,
    pub buffers: Vec<VtxBufferState>,
    pub vertex_buffers: Vec<Option<GpuAddr>>,
    pub vertex_uniform: Option<(GpuAddr, u64)>,
    pub fragment_uniform: Option<(GpuAddr, u64)>,
    pub texture: Option<(ImageKey, SamplerFlags)>,
}

impl QueueState {
    pub fn set_stencil(&mut self, masks: StencilMasks) {
        let values = StencilDynamic {
            write_mask: masks.write_mask,
            reference: masks.reference,
            compare_mask: masks.compare_mask,
        };
        match masks.face {
            Face::None => {}
            Face::Front => self.stencil_front = values,
            Face::Back => self.stencil_back = values,
            Face::FrontAndBack => {
                self.stencil_front = values;
                self.stencil_back = values;
            }
        }
    }

    pub fn bind_vtx_buffer(&mut self, slot: u32, addr: GpuAddr) {
        let slot = slot as usize;
        if self.vertex_buffers.len() <= slot {
            self.vertex_buffers.resize(slot + 1, None);
        }
        self.vertex_buffers[slot] = Some(addr);
    }

    pub fn bind_uniform_buffer(&mut self, stage: ShaderStage, addr: GpuAddr, size: u64) {
        match stage {
            ShaderStage::Vertex => self.vertex_uniform = Some((addr, size)),
            ShaderStage::Fragment => self.fragment_uniform = Some((addr, size)),
        }
    }

    /// Drop every binding that refers to a destroyed image
    pub fn forget_image(&mut self, image: ImageKey) {
        if self.color_target == Some(image) {
            self.color_target = None;
        }
        if self.depth_target == Some(image) {
            self.depth_target = None;
        }
        if matches!(self.texture, Some((bound, _)) if bound == image) {
            self.texture = None;
        }
    }

    /// Drop the shader binding if it uses a destroyed shader
    pub fn forget_shader(&mut self, shader: ShaderKey) {
        if matches!(self.shaders, Some((vertex, fragment)) if vertex == shader || fragment == shader) {
            self.shaders = None;
        }
    }

    /// Drop every buffer binding inside a destroyed memory block
    pub fn forget_block(&mut self, block: MemBlockKey) {
        for slot in self.vertex_buffers.iter_mut() {
            if matches!(slot, Some(addr) if addr.block == block) {
                *slot = None;
            }
        }
        if matches!(self.vertex_uniform, Some((addr, _)) if addr.block == block) {
            self.vertex_uniform = None;
        }
        if matches!(self.fragment_uniform, Some((addr, _)) if addr.block == block) {
            self.fragment_uniform = None;
        }
    }
}

/// Backend objects a recorder reads and updates
pub(crate) struct Resources<'a> {
    pub blocks: &'a SlotMap<MemBlockKey, MemBlock>,
    pub images: &'a mut SlotMap<ImageKey, VulkanImage>,
    pub shaders: &'a SlotMap<ShaderKey, VulkanShader>,
    pub pipelines: &'a mut PipelineCache,
    pub samplers: &'a mut SamplerCache,
    pub descriptors: &'a mut DescriptorAllocator,
    /// Sampled when no texture is bound
    pub placeholder: &'a mut VulkanImage,
}

/// State already recorded into the current command buffer
#[derive(Default)]
struct Recorded {
    pipeline: Option<PipelineKey>,
    viewport: Option<Viewport>,
    scissor: Option<Scissor>,
    stencil: Option<(StencilDynamic, StencilDynamic)>,
    vertex_buffers: Vec<(vk::Buffer, u64)>,
    descriptor: Option<(vk::DescriptorSet, [u32; 2])>,
}

pub(crate) struct CommandRecorder<'a> {
    device: &'a ash::Device,
    cb: vk::CommandBuffer,
    state: &'a mut QueueState,
    res: Resources<'a>,
    rendering: bool,
    recorded: Recorded,
}

fn block_buffer(blocks: &SlotMap<MemBlockKey, MemBlock>, block: MemBlockKey) -> Result<vk::Buffer> {
    blocks
        .get(block)
        .and_then(MemBlock::buffer)
        .ok_or_else(|| Error::InvalidResource(format!("memory block {:?} cannot be bound as a buffer", block)))
}

impl<'a> CommandRecorder<'a> {
    /// Start recording into `cb`, which must be in the recording state
    pub fn new(device: &'a ash::Device, cb: vk::CommandBuffer, state: &'a mut QueueState, res: Resources<'a>) -> Self {
        Self {
            device,
            cb,
            state,
            res,
            rendering: false,
            recorded: Recorded::default(),
        }
    }

    /// Record commands in order, stopping at the first failing one
    pub fn record(&mut self, commands: &[Command]) -> Result<()> {
        for command in commands {
            self.record_one(command)?;
        }
        Ok(())
    }

    /// Close any open rendering scope; the command buffer can then be ended
    pub fn finish(mut self) {
        self.end_rendering();
    }

    fn record_one(&mut self, command: &Command) -> Result<()> {
        match command {
            Command::BindRenderTargets { color, depth } => {
                if !self.res.images.contains_key(*color) {
                    return Err(Error::InvalidResource(format!("render target {:?} does not exist", color)));
                }
                if let Some(depth) = depth {
                    if !self.res.images.contains_key(*depth) {
                        return Err(Error::InvalidResource(format!("depth target {:?} does not exist", depth)));
                    }
                }
                self.end_rendering();
                self.state.color_target = Some(*color);
                self.state.depth_target = *depth;
            }
            Command::SetViewport(viewport) => self.state.viewport = Some(*viewport),
            Command::SetScissor(scissor) => self.state.scissor = Some(*scissor),
            Command::ClearColor { color } => self.clear_color(*color)?,
            Command::ClearDepthStencil { clear_depth, depth, stencil_value, .. } => {
                self.clear_depth_stencil(*clear_depth, *depth, *stencil_value)?;
            }
            Command::BindRasterizerState(state) => self.state.rasterizer = *state,
            Command::BindColorState(state) => self.state.color = *state,
            Command::BindColorWriteState(state) => self.state.color_write = *state,
            Command::BindBlendState(state) => self.state.blend = *state,
            Command::BindDepthStencilState(state) => self.state.depth_stencil = *state,
            Command::SetStencil(masks) => self.state.set_stencil(*masks),
            Command::BindShaders { vertex, fragment } => {
                for shader in [vertex, fragment] {
                    if !self.res.shaders.contains_key(*shader) {
                        return Err(Error::InvalidResource(format!("shader {:?} does not exist", shader)));
                    }
                }
                self.state.shaders = Some((*vertex, *fragment));
            }
            Command::BindVtxAttribState(attribs) => self.state.attribs = attribs.clone(),
            Command::BindVtxBufferState(buffers) => self.state.buffers = buffers.clone(),
            Command::BindVtxBuffer { slot, addr, .. } => {
                block_buffer(self.res.blocks, addr.block)?;
                self.state.bind_vtx_buffer(*slot, *addr);
            }
            Command::BindUniformBuffer { stage, addr, size } => {
                block_buffer(self.res.blocks, addr.block)?;
                self.state.bind_uniform_buffer(*stage, *addr, *size);
            }
            Command::BindTexture { stage, image, sampler } => {
                if *stage != ShaderStage::Fragment {
                    return Err(Error::InvalidState("textures can only be bound to the fragment stage".to_string()));
                }
                if !self.res.images.contains_key(*image) {
                    return Err(Error::InvalidResource(format!("texture {:?} does not exist", image)));
                }
                self.state.texture = Some((*image, *sampler));
            }
            Command::Draw { primitive, vertex_count, instance_count, first_vertex, first_instance } => {
                self.draw(*primitive, *vertex_count, *instance_count, *first_vertex, *first_instance)?;
            }
            Command::CopyBufferToImage { src, image, rect } => self.copy_buffer_to_image(*src, *image, *rect)?,
            Command::Barrier => self.barrier(),
        }
        Ok(())
    }

    fn begin_rendering(&mut self) -> Result<()> {
        if self.rendering {
            return Ok(());
        }
        let color_key = self.state.color_target
            .ok_or_else(|| Error::InvalidState("no render target bound".to_string()))?;

        let color = self.res.images.get_mut(color_key)
            .ok_or_else(|| Error::InvalidResource(format!("render target {:?} does not exist", color_key)))?;
        color.transition(self.cb, vk::ImageLayout::COLOR_ATTACHMENT_OPTIMAL);
        let (color_view, extent) = (color.view, color.extent);

        let depth = match self.state.depth_target {
            Some(depth_key) => {
                let depth = self.res.images.get_mut(depth_key)
                    .ok_or_else(|| Error::InvalidResource(format!("depth target {:?} does not exist", depth_key)))?;
                depth.transition(self.cb, vk::ImageLayout::DEPTH_STENCIL_ATTACHMENT_OPTIMAL);
                Some((depth.view, depth.format))
            }
            None => None,
        };

        let color_attachment = vk::RenderingAttachmentInfo::default()
            .image_view(color_view)
            .image_layout(vk::ImageLayout::COLOR_ATTACHMENT_OPTIMAL)
            .load_op(vk::AttachmentLoadOp::LOAD)
            .store_op(vk::AttachmentStoreOp::STORE);
        let depth_attachment = depth.map(|(view, _)| {
            vk::RenderingAttachmentInfo::default()
                .image_view(view)
                .image_layout(vk::ImageLayout::DEPTH_STENCIL_ATTACHMENT_OPTIMAL)
                .load_op(vk::AttachmentLoadOp::LOAD)
                .store_op(vk::AttachmentStoreOp::STORE)
        });

        let mut rendering_info = vk::RenderingInfo::default()
            .render_area(vk::Rect2D {
                offset: vk::Offset2D { x: 0, y: 0 },
                extent,
            })
            .layer_count(1)
            .color_attachments(std::slice::from_ref(&color_attachment));
        if let (Some(attachment), Some((_, format))) = (depth_attachment.as_ref(), depth) {
            if has_depth(format) {
                rendering_info = rendering_info.depth_attachment(attachment);
            }
            if has_stencil(format) {
                rendering_info = rendering_info.stencil_attachment(attachment);
            }
        }

        unsafe {
            self.device.cmd_begin_rendering(self.cb, &rendering_info);
        }
        self.rendering = true;
        Ok(())
    }

    fn end_rendering(&mut self) {
        if self.rendering {
            unsafe { self.device.cmd_end_rendering(self.cb); }
            self.rendering = false;
        }
    }

    fn target_extent(&self) -> Result<vk::Extent2D> {
        self.state.color_target
            .and_then(|key| self.res.images.get(key))
            .map(|image| image.extent)
            .ok_or_else(|| Error::InvalidState("no render target bound".to_string()))
    }

    fn full_clear_rect(extent: vk::Extent2D) -> vk::ClearRect {
        vk::ClearRect {
            rect: vk::Rect2D {
                offset: vk::Offset2D { x: 0, y: 0 },
                extent,
            },
            base_array_layer: 0,
            layer_count: 1,
        }
    }

    fn clear_color(&mut self, color: [f32; 4]) -> Result<()> {
        self.begin_rendering()?;
        let extent = self.target_extent()?;
        let attachment = vk::ClearAttachment {
            aspect_mask: vk::ImageAspectFlags::COLOR,
            color_attachment: 0,
            clear_value: vk::ClearValue {
                color: vk::ClearColorValue { float32: color },
            },
        };
        unsafe {
            self.device.cmd_clear_attachments(self.cb, &[attachment], &[Self::full_clear_rect(extent)]);
        }
        Ok(())
    }

    fn clear_depth_stencil(&mut self, clear_depth: bool, depth: f32, stencil_value: u8) -> Result<()> {
        let depth_key = self.state.depth_target
            .ok_or_else(|| Error::InvalidState("no depth/stencil target bound".to_string()))?;
        let format = self.res.images.get(depth_key)
            .map(|image| image.format)
            .ok_or_else(|| Error::InvalidResource(format!("depth target {:?} does not exist", depth_key)))?;

        let mut aspect_mask = vk::ImageAspectFlags::empty();
        if has_stencil(format) {
            aspect_mask |= vk::ImageAspectFlags::STENCIL;
        }
        if clear_depth && has_depth(format) {
            aspect_mask |= vk::ImageAspectFlags::DEPTH;
        }
        if aspect_mask.is_empty() {
            return Ok(());
        }

        self.begin_rendering()?;
        let extent = self.target_extent()?;
        let attachment = vk::ClearAttachment {
            aspect_mask,
            color_attachment: 0,
            clear_value: vk::ClearValue {
                depth_stencil: vk::ClearDepthStencilValue {
                    depth,
                    stencil: stencil_value as u32,
                },
            },
        };
        unsafe {
            self.device.cmd_clear_attachments(self.cb, &[attachment], &[Self::full_clear_rect(extent)]);
        }
        Ok(())
    }

    fn draw(
        &mut self,
        primitive: Primitive,
        vertex_count: u32,
        instance_count: u32,
        first_vertex: u32,
        first_instance: u32,
    ) -> Result<()> {
        if vertex_count == 0 || instance_count == 0 {
            return Ok(());
        }

        // Layout transitions are not allowed inside a rendering scope
        self.prepare_texture()?;
        self.begin_rendering()?;

        self.bind_pipeline(primitive)?;
        self.set_dynamic_state()?;
        self.bind_vertex_buffers()?;
        self.bind_descriptor_set()?;

        unsafe {
            self.device.cmd_draw(self.cb, vertex_count, instance_count, first_vertex, first_instance);
        }
        Ok(())
    }

    fn prepare_texture(&mut self) -> Result<()> {
        let texture = match self.state.texture {
            Some((key, _)) => self.res.images.get_mut(key)
                .ok_or_else(|| Error::InvalidResource(format!("texture {:?} does not exist", key)))?,
            None => &mut *self.res.placeholder,
        };
        if texture.layout != vk::ImageLayout::SHADER_READ_ONLY_OPTIMAL {
            if self.rendering {
                unsafe { self.device.cmd_end_rendering(self.cb); }
                self.rendering = false;
            }
            texture.transition(self.cb, vk::ImageLayout::SHADER_READ_ONLY_OPTIMAL);
        }
        Ok(())
    }

    fn bind_pipeline(&mut self, primitive: Primitive) -> Result<()> {
        let (vertex, fragment) = self.state.shaders
            .ok_or_else(|| Error::InvalidState("draw without bound shaders".to_string()))?;
        let color_format = self.state.color_target
            .and_then(|key| self.res.images.get(key))
            .map(|image| image.format)
            .ok_or_else(|| Error::InvalidState("no render target bound".to_string()))?;
        let depth_stencil_format = self.state.depth_target
            .and_then(|key| self.res.images.get(key))
            .map_or(vk::Format::UNDEFINED, |image| image.format);

        let key = PipelineKey {
            vertex,
            fragment,
            primitive,
            rasterizer: self.state.rasterizer,
            color: self.state.color,
            color_write: self.state.color_write,
            blend: self.state.blend,
            depth_stencil: self.state.depth_stencil,
            attribs: self.state.attribs.clone(),
            buffers: self.state.buffers.clone(),
            color_format,
            depth_stencil_format,
        };
        if self.recorded.pipeline.as_ref() == Some(&key) {
            return Ok(());
        }

        let pipeline = self.res.pipelines.get_or_create(&key, self.res.shaders)?;
        unsafe {
            self.device.cmd_bind_pipeline(self.cb, vk::PipelineBindPoint::GRAPHICS, pipeline);
        }
        self.recorded.pipeline = Some(key);
        Ok(())
    }

    fn set_dynamic_state(&mut self) -> Result<()> {
        let extent = self.target_extent()?;
        let viewport = self.state.viewport.unwrap_or(Viewport {
            x: 0.0,
            y: 0.0,
            width: extent.width as f32,
            height: extent.height as f32,
            near: 0.0,
            far: 1.0,
        });
        let scissor = self.state.scissor.unwrap_or(Scissor {
            x: 0,
            y: 0,
            width: extent.width,
            height: extent.height,
        });
        let stencil = (self.state.stencil_front, self.state.stencil_back);

        unsafe {
            if self.recorded.viewport != Some(viewport) {
                self.device.cmd_set_viewport(self.cb, 0, &[viewport_to_vk(&viewport)]);
                self.recorded.viewport = Some(viewport);
            }
            if self.recorded.scissor != Some(scissor) {
                self.device.cmd_set_scissor(self.cb, 0, &[scissor_to_vk(&scissor)]);
                self.recorded.scissor = Some(scissor);
            }
            if self.recorded.stencil != Some(stencil) {
                for (face, values) in stencil_updates(stencil.0, stencil.1) {
                    let face = stencil_face_to_vk(face);
                    self.device.cmd_set_stencil_compare_mask(self.cb, face, values.compare_mask as u32);
                    self.device.cmd_set_stencil_write_mask(self.cb, face, values.write_mask as u32);
                    self.device.cmd_set_stencil_reference(self.cb, face, values.reference as u32);
                }
                self.recorded.stencil = Some(stencil);
            }
        }
        Ok(())
    }

    fn bind_vertex_buffers(&mut self) -> Result<()> {
        let mut bindings = Vec::with_capacity(self.state.buffers.len());
        for slot in 0..self.state.buffers.len() {
            let addr = self.state.vertex_buffers.get(slot).copied().flatten()
                .ok_or_else(|| Error::InvalidState(format!("draw without a vertex buffer in slot {}", slot)))?;
            bindings.push((block_buffer(self.res.blocks, addr.block)?, addr.offset));
        }
        if bindings.is_empty() || self.recorded.vertex_buffers == bindings {
            return Ok(());
        }

        let (buffers, offsets): (Vec<vk::Buffer>, Vec<u64>) = bindings.iter().copied().unzip();
        unsafe {
            self.device.cmd_bind_vertex_buffers(self.cb, 0, &buffers, &offsets);
        }
        self.recorded.vertex_buffers = bindings;
        Ok(())
    }

    fn bind_descriptor_set(&mut self) -> Result<()> {
        let (vertex, vertex_range) = self.state.vertex_uniform
            .ok_or_else(|| Error::InvalidState("draw without a vertex uniform buffer".to_string()))?;
        let (fragment, fragment_range) = self.state.fragment_uniform
            .ok_or_else(|| Error::InvalidState("draw without a fragment uniform buffer".to_string()))?;

        let (texture, sampler, image_view) = match self.state.texture {
            Some((key, sampler)) => {
                let image = self.res.images.get(key)
                    .ok_or_else(|| Error::InvalidResource(format!("texture {:?} does not exist", key)))?;
                (key, sampler, image.view)
            }
            None => (ImageKey::default(), SamplerFlags::empty(), self.res.placeholder.view),
        };

        let key = DescriptorKey {
            vertex_block: vertex.block,
            vertex_range,
            fragment_block: fragment.block,
            fragment_range,
            texture,
            sampler,
        };
        let blocks = &*self.res.blocks;
        let samplers = &mut *self.res.samplers;
        let set = self.res.descriptors.get_or_write(self.res.pipelines.set_layout(), key, || {
            Ok(DescriptorWrite {
                vertex_buffer: block_buffer(blocks, vertex.block)?,
                fragment_buffer: block_buffer(blocks, fragment.block)?,
                image_view,
                sampler: samplers.get(sampler)?,
            })
        })?;

        let offsets = [vertex.offset as u32, fragment.offset as u32];
        if self.recorded.descriptor == Some((set, offsets)) {
            return Ok(());
        }
        unsafe {
            self.device.cmd_bind_descriptor_sets(
                self.cb,
                vk::PipelineBindPoint::GRAPHICS,
                self.res.pipelines.layout(),
                0,
                &[set],
                &offsets,
            );
        }
        self.recorded.descriptor = Some((set, offsets));
        Ok(())
    }

    fn copy_buffer_to_image(&mut self, src: GpuAddr, image: ImageKey, rect: CopyRect) -> Result<()> {
        let buffer = block_buffer(self.res.blocks, src.block)?;
        self.end_rendering();

        let target = self.res.images.get_mut(image)
            .ok_or_else(|| Error::InvalidResource(format!("copy target {:?} does not exist", image)))?;
        if rect.x + rect.width > target.extent.width || rect.y + rect.height > target.extent.height {
            return Err(Error::InvalidResource(format!(
                "copy rect {}x{}+{}+{} exceeds image {}x{}",
                rect.width, rect.height, rect.x, rect.y, target.extent.width, target.extent.height
            )));
        }
        target.transition(self.cb, vk::ImageLayout::TRANSFER_DST_OPTIMAL);

        let region = vk::BufferImageCopy {
            buffer_offset: src.offset,
            buffer_row_length: 0,
            buffer_image_height: 0,
            image_subresource: vk::ImageSubresourceLayers {
                aspect_mask: target.aspect,
                mip_level: 0,
                base_array_layer: 0,
                layer_count: 1,
            },
            image_offset: vk::Offset3D {
                x: rect.x as i32,
                y: rect.y as i32,
                z: 0,
            },
            image_extent: vk::Extent3D {
                width: rect.width,
                height: rect.height,
                depth: 1,
            },
        };
        unsafe {
            self.device.cmd_copy_buffer_to_image(
                self.cb,
                buffer,
                target.image,
                vk::ImageLayout::TRANSFER_DST_OPTIMAL,
                &[region],
            );
        }
        Ok(())
    }

    fn barrier(&mut self) {
        self.end_rendering();
        let barrier = vk::MemoryBarrier::default()
            .src_access_mask(vk::AccessFlags::MEMORY_WRITE)
            .dst_access_mask(vk::AccessFlags::MEMORY_READ | vk::AccessFlags::MEMORY_WRITE);
        unsafe {
            self.device.cmd_pipeline_barrier(
                self.cb,
                vk::PipelineStageFlags::ALL_COMMANDS,
                vk::PipelineStageFlags::ALL_COMMANDS,
                vk::DependencyFlags::empty(),
                &[barrier],
                &[],
                &[],
            );
        }
    }
}

#[cfg(test)]
#[path = "vulkan_command_list_tests.rs"]
mod tests;
