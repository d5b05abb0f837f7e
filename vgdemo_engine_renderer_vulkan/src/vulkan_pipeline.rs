/// PipelineCache - graphics pipelines keyed by the state bound at draw time
///
/// The device model binds fixed-function state piecemeal (rasterizer, blend,
/// depth-stencil, vertex layout, shaders). Vulkan bakes it into pipelines, so
/// each distinct combination seen at a draw is compiled once and reused.
/// Viewport, scissor, stencil masks and stencil reference stay dynamic.

use ash::vk;
use rustc_hash::FxHashMap;
use slotmap::SlotMap;
use std::sync::Arc;
use vgdemo_engine::device::{
    BlendState, ColorState, ColorWriteState, DepthStencilState, Primitive, RasterizerState,
    ShaderKey, ShaderStage, VtxAttribState, VtxBufferState,
};
use vgdemo_engine::vgdemo::{Error, Result};
use vgdemo_engine::{engine_debug, engine_err};

use crate::vulkan_context::GpuContext;
use crate::vulkan_descriptor_set::create_set_layout;
use crate::vulkan_format::{
    blend_factor_to_vk, blend_op_to_vk, color_mask_to_vk, compare_op_to_vk, cull_mode_to_vk,
    front_face_to_vk, has_depth, has_stencil, primitive_to_vk, shader_stage_to_vk,
    stencil_face_state_to_vk, vtx_format_to_vk,
};
use crate::vulkan_shader::VulkanShader;

/// Reject a draw whose bound shaders sit in the wrong stage slots
pub(crate) fn check_stages(vertex: ShaderStage, fragment: ShaderStage) -> Result<()> {
    if vertex != ShaderStage::Vertex || fragment != ShaderStage::Fragment {
        return Err(Error::InvalidState(format!(
            "shaders bound as vertex/fragment have stages {:?}/{:?}", vertex, fragment
        )));
    }
    Ok(())
}

/// State baked into one pipeline
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub(crate) struct PipelineKey {
    pub vertex: ShaderKey,
    pub fragment: ShaderKey,
    pub primitive: Primitive,
    pub rasterizer: RasterizerState,
    pub color: ColorState,
    pub color_write: ColorWriteState,
    pub blend: BlendState,
    pub depth_stencil: DepthStencilState,
    pub attribs: Vec<VtxAttribState>,
    pub buffers: Vec<VtxBufferState>,
    pub color_format: vk::Format,
    /// `UNDEFINED` when no depth/stencil target is bound
    pub depth_stencil_format: vk::Format,
}

pub(crate) struct PipelineCache {
    ctx: Arc<GpuContext>,
    set_layout: vk::DescriptorSetLayout,
    layout: vk::PipelineLayout,
    pipelines: FxHashMap<PipelineKey, vk::Pipeline>,
}

impl PipelineCache {
    pub fn new(ctx: Arc<GpuContext>) -> Result<Self> {
        let set_layout = create_set_layout(&ctx.device)?;
        let set_layouts = [set_layout];
        let layout_info = vk::PipelineLayoutCreateInfo::default().set_layouts(&set_layouts);
        let layout = unsafe {
            match ctx.device.create_pipeline_layout(&layout_info, None) {
                Ok(layout) => layout,
                Err(e) => {
                    ctx.device.destroy_descriptor_set_layout(set_layout, None);
                    return Err(engine_err!("vgdemo::vulkan", "Failed to create pipeline layout: {:?}", e));
                }
            }
        };

        Ok(Self {
            ctx,
            set_layout,
            layout,
            pipelines: FxHashMap::default(),
        })
    }

    pub fn set_layout(&self) -> vk::DescriptorSetLayout {
        self.set_layout
    }

    pub fn layout(&self) -> vk::PipelineLayout {
        self.layout
    }

    pub fn len(&self) -> usize {
        self.pipelines.len()
    }

    /// Get the pipeline for `key`, compiling it on first use
    pub fn get_or_create(
        &mut self,
        key: &PipelineKey,
        shaders: &SlotMap<ShaderKey, VulkanShader>,
    ) -> Result<vk::Pipeline> {
        if let Some(&pipeline) = self.pipelines.get(key) {
            return Ok(pipeline);
        }

        let vertex = shaders.get(key.vertex)
            .ok_or_else(|| Error::InvalidResource("bound vertex shader was destroyed".to_string()))?;
        let fragment = shaders.get(key.fragment)
            .ok_or_else(|| Error::InvalidResource("bound fragment shader was destroyed".to_string()))?;

        check_stages(vertex.stage, fragment.stage)?;
        let pipeline = self.create_pipeline(key, vertex, fragment)?;
        engine_debug!("vgdemo::vulkan", "Compiled pipeline #{} ({:?}, blend {})",
            self.pipelines.len() + 1, key.primitive, key.color.blend_enable);
        self.pipelines.insert(key.clone(), pipeline);
        Ok(pipeline)
    }

    /// Destroy every pipeline built from `shader` (the GPU must be idle)
    pub fn evict_shader(&mut self, shader: ShaderKey) {
        let device = &self.ctx.device;
        self.pipelines.retain(|key, pipeline| {
            let keep = key.vertex != shader && key.fragment != shader;
            if !keep {
                unsafe { device.destroy_pipeline(*pipeline, None); }
            }
            keep
        });
    }

    fn create_pipeline(
        &self,
        key: &PipelineKey,
        vertex: &VulkanShader,
        fragment: &VulkanShader,
    ) -> Result<vk::Pipeline> {
        let shader_stages = [vertex, fragment].map(|shader| {
            vk::PipelineShaderStageCreateInfo::default()
                .stage(shader_stage_to_vk(shader.stage))
                .module(shader.module)
                .name(c"main")
        });

        // Vertex input state
        let vertex_bindings: Vec<vk::VertexInputBindingDescription> = key.buffers
            .iter()
            .enumerate()
            .map(|(binding, buffer)| vk::VertexInputBindingDescription {
                binding: binding as u32,
                stride: buffer.stride,
                input_rate: if buffer.divisor == 0 {
                    vk::VertexInputRate::VERTEX
                } else {
                    vk::VertexInputRate::INSTANCE
                },
            })
            .collect();

        let vertex_attributes: Vec<vk::VertexInputAttributeDescription> = key.attribs
            .iter()
            .enumerate()
            .map(|(location, attrib)| vk::VertexInputAttributeDescription {
                location: location as u32,
                binding: attrib.buffer,
                format: vtx_format_to_vk(attrib.format),
                offset: attrib.offset,
            })
            .collect();

        let vertex_input_state = vk::PipelineVertexInputStateCreateInfo::default()
            .vertex_binding_descriptions(&vertex_bindings)
            .vertex_attribute_descriptions(&vertex_attributes);

        let input_assembly_state = vk::PipelineInputAssemblyStateCreateInfo::default()
            .topology(primitive_to_vk(key.primitive))
            .primitive_restart_enable(false);

        // Viewport state (dynamic)
        let viewport_state = vk::PipelineViewportStateCreateInfo::default()
            .viewport_count(1)
            .scissor_count(1);

        let rasterization_state = vk::PipelineRasterizationStateCreateInfo::default()
            .depth_clamp_enable(false)
            .rasterizer_discard_enable(false)
            .polygon_mode(vk::PolygonMode::FILL)
            .line_width(1.0)
            .cull_mode(cull_mode_to_vk(key.rasterizer.cull_mode))
            .front_face(front_face_to_vk(key.rasterizer.front_face))
            .depth_bias_enable(false);

        let has_target_depth = has_depth(key.depth_stencil_format);
        let has_target_stencil = has_stencil(key.depth_stencil_format);
        let depth_stencil_state = vk::PipelineDepthStencilStateCreateInfo::default()
            .depth_test_enable(has_target_depth && key.depth_stencil.depth_test_enable)
            .depth_write_enable(has_target_depth && key.depth_stencil.depth_write_enable)
            .depth_compare_op(compare_op_to_vk(key.depth_stencil.depth_compare_op))
            .depth_bounds_test_enable(false)
            .stencil_test_enable(has_target_stencil && key.depth_stencil.stencil_test_enable)
            .front(stencil_face_state_to_vk(&key.depth_stencil.front))
            .back(stencil_face_state_to_vk(&key.depth_stencil.back));

        let multisample_state = vk::PipelineMultisampleStateCreateInfo::default()
            .sample_shading_enable(false)
            .rasterization_samples(vk::SampleCountFlags::TYPE_1);

        let color_blend_attachment = {
            let mut attachment = vk::PipelineColorBlendAttachmentState::default()
                .color_write_mask(color_mask_to_vk(key.color_write.mask))
                .blend_enable(key.color.blend_enable);
            if key.color.blend_enable {
                attachment = attachment
                    .src_color_blend_factor(blend_factor_to_vk(key.blend.src_color))
                    .dst_color_blend_factor(blend_factor_to_vk(key.blend.dst_color))
                    .color_blend_op(blend_op_to_vk(key.blend.color_op))
                    .src_alpha_blend_factor(blend_factor_to_vk(key.blend.src_alpha))
                    .dst_alpha_blend_factor(blend_factor_to_vk(key.blend.dst_alpha))
                    .alpha_blend_op(blend_op_to_vk(key.blend.alpha_op));
            }
            attachment
        };
        let color_blend_state = vk::PipelineColorBlendStateCreateInfo::default()
            .logic_op_enable(false)
            .attachments(std::slice::from_ref(&color_blend_attachment));

        let dynamic_states = [
            vk::DynamicState::VIEWPORT,
            vk::DynamicState::SCISSOR,
            vk::DynamicState::STENCIL_COMPARE_MASK,
            vk::DynamicState::STENCIL_WRITE_MASK,
            vk::DynamicState::STENCIL_REFERENCE,
        ];
        let dynamic_state = vk::PipelineDynamicStateCreateInfo::default()
            .dynamic_states(&dynamic_states);

        // Dynamic rendering: attachment formats instead of a render pass
        let color_formats = [key.color_format];
        let mut rendering_info = vk::PipelineRenderingCreateInfo::default()
            .color_attachment_formats(&color_formats)
            .depth_attachment_format(if has_target_depth { key.depth_stencil_format } else { vk::Format::UNDEFINED })
            .stencil_attachment_format(if has_target_stencil { key.depth_stencil_format } else { vk::Format::UNDEFINED });

        let pipeline_create_info = vk::GraphicsPipelineCreateInfo::default()
            .stages(&shader_stages)
            .vertex_input_state(&vertex_input_state)
            .input_assembly_state(&input_assembly_state)
            .viewport_state(&viewport_state)
            .rasterization_state(&rasterization_state)
            .depth_stencil_state(&depth_stencil_state)
            .multisample_state(&multisample_state)
            .color_blend_state(&color_blend_state)
            .dynamic_state(&dynamic_state)
            .layout(self.layout)
            .push_next(&mut rendering_info);

        let pipelines = unsafe {
            self.ctx.device
                .create_graphics_pipelines(vk::PipelineCache::null(), &[pipeline_create_info], None)
                .map_err(|e| engine_err!("vgdemo::vulkan", "Failed to create graphics pipeline: {:?}", e.1))?
        };
        pipelines.into_iter().next()
            .ok_or_else(|| engine_err!("vgdemo::vulkan", "Pipeline creation returned no pipeline"))
    }
}

impl Drop for PipelineCache {
    fn drop(&mut self) {
        unsafe {
            for (_, pipeline) in self.pipelines.drain() {
                self.ctx.device.destroy_pipeline(pipeline, None);
            }
            self.ctx.device.destroy_pipeline_layout(self.layout, None);
            self.ctx.device.destroy_descriptor_set_layout(self.set_layout, None);
        }
    }
}

#[cfg(test)]
#[path = "vulkan_pipeline_tests.rs"]
mod tests;
