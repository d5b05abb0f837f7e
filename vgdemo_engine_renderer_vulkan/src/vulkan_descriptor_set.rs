/// DescriptorAllocator - per-frame descriptor sets for the fill pipeline layout
///
/// Sets are cached by their bindings for the lifetime of a frame and the
/// pools are reset wholesale when the frame's fence has signaled. A new pool
/// is added whenever the current ones are exhausted.

use ash::vk;
use rustc_hash::FxHashMap;
use std::sync::Arc;
use vgdemo_engine::device::{ImageKey, MemBlockKey, SamplerFlags};
use vgdemo_engine::engine_err;
use vgdemo_engine::vgdemo::Result;

use crate::vulkan_context::GpuContext;

/// Sets per descriptor pool
const SETS_PER_POOL: u32 = 256;

/// Binding slots of the fill descriptor set layout
pub(crate) const VERTEX_UNIFORM_BINDING: u32 = 0;
pub(crate) const FRAGMENT_UNIFORM_BINDING: u32 = 1;
pub(crate) const TEXTURE_BINDING: u32 = 2;

/// Everything a descriptor set is built from (uniform offsets are dynamic)
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub(crate) struct DescriptorKey {
    pub vertex_block: MemBlockKey,
    pub vertex_range: u64,
    pub fragment_block: MemBlockKey,
    pub fragment_range: u64,
    pub texture: ImageKey,
    pub sampler: SamplerFlags,
}

/// Resolved Vulkan objects for a `DescriptorKey`
pub(crate) struct DescriptorWrite {
    pub vertex_buffer: vk::Buffer,
    pub fragment_buffer: vk::Buffer,
    pub image_view: vk::ImageView,
    pub sampler: vk::Sampler,
}

/// Create the set layout shared by every pipeline
pub(crate) fn create_set_layout(device: &ash::Device) -> Result<vk::DescriptorSetLayout> {
    let bindings = [
        vk::DescriptorSetLayoutBinding::default()
            .binding(VERTEX_UNIFORM_BINDING)
            .descriptor_type(vk::DescriptorType::UNIFORM_BUFFER_DYNAMIC)
            .descriptor_count(1)
            .stage_flags(vk::ShaderStageFlags::VERTEX),
        vk::DescriptorSetLayoutBinding::default()
            .binding(FRAGMENT_UNIFORM_BINDING)
            .descriptor_type(vk::DescriptorType::UNIFORM_BUFFER_DYNAMIC)
            .descriptor_count(1)
            .stage_flags(vk::ShaderStageFlags::FRAGMENT),
        vk::DescriptorSetLayoutBinding::default()
            .binding(TEXTURE_BINDING)
            .descriptor_type(vk::DescriptorType::COMBINED_IMAGE_SAMPLER)
            .descriptor_count(1)
            .stage_flags(vk::ShaderStageFlags::FRAGMENT),
    ];
    let info = vk::DescriptorSetLayoutCreateInfo::default().bindings(&bindings);
    unsafe {
        device.create_descriptor_set_layout(&info, None)
            .map_err(|e| engine_err!("vgdemo::vulkan", "Failed to create descriptor set layout: {:?}", e))
    }
}

pub(crate) struct DescriptorAllocator {
    ctx: Arc<GpuContext>,
    pools: Vec<vk::DescriptorPool>,
    current: usize,
    sets: FxHashMap<DescriptorKey, vk::DescriptorSet>,
}

impl DescriptorAllocator {
    pub fn new(ctx: Arc<GpuContext>) -> Result<Self> {
        let pool = Self::create_pool(&ctx.device)?;
        Ok(Self {
            ctx,
            pools: vec![pool],
            current: 0,
            sets: FxHashMap::default(),
        })
    }

    fn create_pool(device: &ash::Device) -> Result<vk::DescriptorPool> {
        let pool_sizes = [
            vk::DescriptorPoolSize {
                ty: vk::DescriptorType::UNIFORM_BUFFER_DYNAMIC,
                descriptor_count: SETS_PER_POOL * 2,
            },
            vk::DescriptorPoolSize {
                ty: vk::DescriptorType::COMBINED_IMAGE_SAMPLER,
                descriptor_count: SETS_PER_POOL,
            },
        ];
        let info = vk::DescriptorPoolCreateInfo::default()
            .pool_sizes(&pool_sizes)
            .max_sets(SETS_PER_POOL);
        unsafe {
            device.create_descriptor_pool(&info, None)
                .map_err(|e| engine_err!("vgdemo::vulkan", "Failed to create descriptor pool: {:?}", e))
        }
    }

    /// Return every set to the pools (the GPU must be done with them)
    pub fn reset(&mut self) -> Result<()> {
        for &pool in &self.pools {
            unsafe {
                self.ctx.device.reset_descriptor_pool(pool, vk::DescriptorPoolResetFlags::empty())
                    .map_err(|e| engine_err!("vgdemo::vulkan", "Failed to reset descriptor pool: {:?}", e))?;
            }
        }
        self.current = 0;
        self.sets.clear();
        Ok(())
    }

    /// Get the set for `key`, allocating and writing it on first use this frame
    pub fn get_or_write(
        &mut self,
        layout: vk::DescriptorSetLayout,
        key: DescriptorKey,
        write: impl FnOnce() -> Result<DescriptorWrite>,
    ) -> Result<vk::DescriptorSet> {
        if let Some(&set) = self.sets.get(&key) {
            return Ok(set);
        }

        let resolved = write()?;
        let set = self.allocate(layout)?;

        let vertex_info = [vk::DescriptorBufferInfo {
            buffer: resolved.vertex_buffer,
            offset: 0,
            range: key.vertex_range,
        }];
        let fragment_info = [vk::DescriptorBufferInfo {
            buffer: resolved.fragment_buffer,
            offset: 0,
            range: key.fragment_range,
        }];
        let image_info = [vk::DescriptorImageInfo {
            sampler: resolved.sampler,
            image_view: resolved.image_view,
            image_layout: vk::ImageLayout::SHADER_READ_ONLY_OPTIMAL,
        }];
        let writes = [
            vk::WriteDescriptorSet::default()
                .dst_set(set)
                .dst_binding(VERTEX_UNIFORM_BINDING)
                .descriptor_type(vk::DescriptorType::UNIFORM_BUFFER_DYNAMIC)
                .buffer_info(&vertex_info),
            vk::WriteDescriptorSet::default()
                .dst_set(set)
                .dst_binding(FRAGMENT_UNIFORM_BINDING)
                .descriptor_type(vk::DescriptorType::UNIFORM_BUFFER_DYNAMIC)
                .buffer_info(&fragment_info),
            vk::WriteDescriptorSet::default()
                .dst_set(set)
                .dst_binding(TEXTURE_BINDING)
                .descriptor_type(vk::DescriptorType::COMBINED_IMAGE_SAMPLER)
                .image_info(&image_info),
        ];
        unsafe {
            self.ctx.device.update_descriptor_sets(&writes, &[]);
        }

        self.sets.insert(key, set);
        Ok(set)
    }

    fn allocate(&mut self, layout: vk::DescriptorSetLayout) -> Result<vk::DescriptorSet> {
        let layouts = [layout];
        loop {
            let info = vk::DescriptorSetAllocateInfo::default()
                .descriptor_pool(self.pools[self.current])
                .set_layouts(&layouts);
            match unsafe { self.ctx.device.allocate_descriptor_sets(&info) } {
                Ok(sets) => {
                    return sets.into_iter().next()
                        .ok_or_else(|| engine_err!("vgdemo::vulkan", "Descriptor set allocation returned no set"));
                }
                Err(vk::Result::ERROR_OUT_OF_POOL_MEMORY) | Err(vk::Result::ERROR_FRAGMENTED_POOL) => {
                    self.current += 1;
                    if self.current == self.pools.len() {
                        let pool = Self::create_pool(&self.ctx.device)?;
                        self.pools.push(pool);
                    }
                }
                Err(e) => {
                    return Err(engine_err!("vgdemo::vulkan", "Failed to allocate descriptor set: {:?}", e));
                }
            }
        }
    }
}

impl Drop for DescriptorAllocator {
    fn drop(&mut self) {
        for pool in self.pools.drain(..) {
            unsafe { self.ctx.device.destroy_descriptor_pool(pool, None); }
        }
    }
}
