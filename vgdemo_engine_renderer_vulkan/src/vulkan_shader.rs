/// VulkanShader - shader module created from SPIR-V held in code memory

use ash::vk;
use std::io::Cursor;
use std::sync::Arc;
use vgdemo_engine::device::ShaderStage;
use vgdemo_engine::engine_err;
use vgdemo_engine::vgdemo::{Error, Result};

use crate::vulkan_context::GpuContext;

pub(crate) struct VulkanShader {
    ctx: Arc<GpuContext>,
    pub module: vk::ShaderModule,
    pub stage: ShaderStage,
}

impl VulkanShader {
    /// Create a shader module from SPIR-V bytes
    pub fn new(ctx: Arc<GpuContext>, stage: ShaderStage, code: &[u8]) -> Result<Self> {
        let words = ash::util::read_spv(&mut Cursor::new(code))
            .map_err(|e| Error::InvalidResource(format!("shader code is not valid SPIR-V: {}", e)))?;

        let create_info = vk::ShaderModuleCreateInfo::default().code(&words);
        let module = unsafe {
            ctx.device.create_shader_module(&create_info, None)
                .map_err(|e| engine_err!("vgdemo::vulkan", "Failed to create {:?} shader module: {:?}", stage, e))?
        };

        Ok(Self { ctx, module, stage })
    }
}

impl Drop for VulkanShader {
    fn drop(&mut self) {
        unsafe {
            self.ctx.device.destroy_shader_module(self.module, None);
        }
    }
}
