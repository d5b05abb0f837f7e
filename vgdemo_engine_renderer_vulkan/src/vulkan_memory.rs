/// MemBlock - gpu-allocator backed storage for one engine memory block
///
/// Image blocks are raw device memory that images are bound into at an
/// offset. Data and code blocks additionally carry a `VkBuffer` spanning the
/// whole block, so any `GpuAddr` inside them can be bound as a vertex buffer,
/// a uniform buffer or a copy source.

use ash::vk;
use gpu_allocator::vulkan::{Allocation, AllocationCreateDesc, AllocationScheme};
use std::sync::Arc;
use vgdemo_engine::device::MemBlockFlags;
use vgdemo_engine::vgdemo::{Error, Result};
use vgdemo_engine::{engine_err, engine_error};

use crate::vulkan_context::GpuContext;
use crate::vulkan_format::{block_buffer_usage, memory_location};

/// Memory requirements every image block must satisfy
#[derive(Debug, Clone, Copy)]
pub(crate) struct ImageMemoryProfile {
    pub alignment: u64,
    pub memory_type_bits: u32,
}

pub(crate) struct MemBlock {
    ctx: Arc<GpuContext>,
    flags: MemBlockFlags,
    size: u64,
    /// Whole-block buffer (null for image blocks)
    buffer: vk::Buffer,
    allocation: Option<Allocation>,
}

impl MemBlock {
    /// Allocate a data or code block with its whole-block buffer
    pub fn new_buffer_block(ctx: Arc<GpuContext>, flags: MemBlockFlags, size: u64) -> Result<Self> {
        unsafe {
            let buffer_info = vk::BufferCreateInfo::default()
                .size(size)
                .usage(block_buffer_usage())
                .sharing_mode(vk::SharingMode::EXCLUSIVE);

            let buffer = ctx.device.create_buffer(&buffer_info, None)
                .map_err(|e| engine_err!("vgdemo::vulkan", "Failed to create block buffer ({} bytes): {:?}", size, e))?;

            let requirements = ctx.device.get_buffer_memory_requirements(buffer);

            let allocation = ctx.allocator().and_then(|mut allocator| {
                allocator
                    .allocate(&AllocationCreateDesc {
                        name: "memblock",
                        requirements,
                        location: memory_location(flags),
                        linear: true,
                        allocation_scheme: AllocationScheme::GpuAllocatorManaged,
                    })
                    .map_err(|e| {
                        engine_error!("vgdemo::vulkan", "Out of GPU memory for a {} byte block: {:?}", size, e);
                        Error::OutOfMemory
                    })
            });
            let allocation = match allocation {
                Ok(allocation) => allocation,
                Err(e) => {
                    ctx.device.destroy_buffer(buffer, None);
                    return Err(e);
                }
            };

            if let Err(e) = ctx.device.bind_buffer_memory(buffer, allocation.memory(), allocation.offset()) {
                if let Ok(mut allocator) = ctx.allocator() {
                    allocator.free(allocation).ok();
                }
                ctx.device.destroy_buffer(buffer, None);
                return Err(engine_err!("vgdemo::vulkan", "Failed to bind block buffer memory: {:?}", e));
            }

            Ok(Self {
                ctx,
                flags,
                size,
                buffer,
                allocation: Some(allocation),
            })
        }
    }

    /// Allocate an image block compatible with every image the engine creates
    pub fn new_image_block(
        ctx: Arc<GpuContext>,
        flags: MemBlockFlags,
        size: u64,
        profile: ImageMemoryProfile,
    ) -> Result<Self> {
        let requirements = vk::MemoryRequirements {
            size,
            alignment: profile.alignment,
            memory_type_bits: profile.memory_type_bits,
        };
        let allocation = ctx.allocator()?
            .allocate(&AllocationCreateDesc {
                name: "memblock_image",
                requirements,
                location: memory_location(flags),
                linear: false,
                allocation_scheme: AllocationScheme::GpuAllocatorManaged,
            })
            .map_err(|e| {
                engine_error!("vgdemo::vulkan", "Out of GPU memory for a {} byte image block: {:?}", size, e);
                Error::OutOfMemory
            })?;

        Ok(Self {
            ctx,
            flags,
            size,
            buffer: vk::Buffer::null(),
            allocation: Some(allocation),
        })
    }

    pub fn flags(&self) -> MemBlockFlags {
        self.flags
    }

    pub fn size(&self) -> u64 {
        self.size
    }

    /// Whole-block buffer, if this is a data or code block
    pub fn buffer(&self) -> Option<vk::Buffer> {
        (self.buffer != vk::Buffer::null()).then_some(self.buffer)
    }

    /// Device memory and the allocation's base offset inside it
    pub fn memory(&self) -> Result<(vk::DeviceMemory, u64)> {
        let allocation = self.allocation.as_ref()
            .ok_or_else(|| engine_err!("vgdemo::vulkan", "Memory block has no allocation"))?;
        unsafe { Ok((allocation.memory(), allocation.offset())) }
    }

    fn check_range(&self, offset: u64, len: u64) -> Result<()> {
        if offset.checked_add(len).map_or(true, |end| end > self.size) {
            return Err(Error::InvalidResource(format!(
                "range {:#x}+{:#x} exceeds memory block of {:#x} bytes",
                offset, len, self.size
            )));
        }
        Ok(())
    }

    /// Copy `data` into the mapped block at `offset`
    pub fn write(&mut self, offset: u64, data: &[u8]) -> Result<()> {
        self.check_range(offset, data.len() as u64)?;
        let mapped = self.allocation.as_mut()
            .and_then(|allocation| allocation.mapped_slice_mut())
            .ok_or_else(|| Error::InvalidResource("memory block is not CPU-visible".to_string()))?;
        let start = offset as usize;
        mapped[start..start + data.len()].copy_from_slice(data);
        Ok(())
    }

    /// Read `len` bytes of the mapped block at `offset`
    pub fn read(&self, offset: u64, len: u64) -> Result<Vec<u8>> {
        self.check_range(offset, len)?;
        let mapped = self.allocation.as_ref()
            .and_then(|allocation| allocation.mapped_slice())
            .ok_or_else(|| Error::InvalidResource("memory block is not CPU-visible".to_string()))?;
        let start = offset as usize;
        Ok(mapped[start..start + len as usize].to_vec())
    }
}

impl Drop for MemBlock {
    fn drop(&mut self) {
        unsafe {
            // Don't panic if lock fails - we still need to destroy the buffer
            if let Some(allocation) = self.allocation.take() {
                if let Ok(mut allocator) = self.ctx.allocator() {
                    allocator.free(allocation).ok();
                }
            }
            if self.buffer != vk::Buffer::null() {
                self.ctx.device.destroy_buffer(self.buffer, None);
            }
        }
    }
}
