/// SamplerCache - one VkSampler per sampler preset, created on first use

use ash::vk;
use std::sync::Arc;
use vgdemo_engine::device::SamplerFlags;
use vgdemo_engine::engine_err;
use vgdemo_engine::vgdemo::Result;

use crate::vulkan_context::GpuContext;
use crate::vulkan_format::sampler_params;

pub(crate) struct SamplerCache {
    ctx: Arc<GpuContext>,
    cache: [Option<vk::Sampler>; SamplerFlags::COUNT],
}

impl SamplerCache {
    pub fn new(ctx: Arc<GpuContext>) -> Self {
        Self {
            ctx,
            cache: [None; SamplerFlags::COUNT],
        }
    }

    /// Get or create the sampler of a preset
    pub fn get(&mut self, flags: SamplerFlags) -> Result<vk::Sampler> {
        if let Some(sampler) = self.cache[flags.index()] {
            return Ok(sampler);
        }

        let params = sampler_params(flags);
        let create_info = vk::SamplerCreateInfo::default()
            .mag_filter(params.filter)
            .min_filter(params.filter)
            .mipmap_mode(params.mipmap_mode)
            .address_mode_u(params.address_u)
            .address_mode_v(params.address_v)
            .address_mode_w(vk::SamplerAddressMode::CLAMP_TO_EDGE)
            .mip_lod_bias(0.0)
            .min_lod(0.0)
            .max_lod(vk::LOD_CLAMP_NONE)
            .anisotropy_enable(false)
            .max_anisotropy(1.0)
            .compare_enable(false)
            .compare_op(vk::CompareOp::ALWAYS)
            .border_color(vk::BorderColor::FLOAT_TRANSPARENT_BLACK)
            .unnormalized_coordinates(false);

        let sampler = unsafe {
            self.ctx.device.create_sampler(&create_info, None)
                .map_err(|e| engine_err!("vgdemo::vulkan", "Failed to create sampler {:?}: {:?}", flags, e))?
        };
        self.cache[flags.index()] = Some(sampler);
        Ok(sampler)
    }
}

impl Drop for SamplerCache {
    fn drop(&mut self) {
        for sampler in self.cache.iter_mut().filter_map(Option::take) {
            unsafe { self.ctx.device.destroy_sampler(sampler, None); }
        }
    }
}
