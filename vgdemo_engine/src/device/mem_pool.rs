/// MemPool - arena of backend memory blocks carved into aligned ranges
///
/// The pool creates backend blocks on demand (`max(block_size, request)`
/// bytes, rounded to `MEMBLOCK_ALIGNMENT`) and hands out `MemHandle`s. A
/// handle returns its range to the pool when destroyed or dropped; adjacent
/// free ranges are merged. Blocks are released when the pool and every
/// handle carved from it are gone.

use std::sync::{Arc, Mutex, MutexGuard};

use crate::device::device::Device;
use crate::device::types::{align_up, GpuAddr, MemBlockFlags, MemBlockKey, MEMBLOCK_ALIGNMENT};
use crate::error::{Error, Result};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
struct FreeRange {
    offset: u64,
    size: u64,
}

impl FreeRange {
    fn end(&self) -> u64 {
        self.offset + self.size
    }
}

#[derive(Debug)]
struct PoolBlock {
    key: MemBlockKey,
    size: u64,
    /// Free ranges sorted by offset, never adjacent
    free: Vec<FreeRange>,
}

impl PoolBlock {
    fn new(key: MemBlockKey, size: u64) -> Self {
        Self {
            key,
            size,
            free: vec![FreeRange { offset: 0, size }],
        }
    }

    /// First-fit carve of `size` bytes aligned to `alignment`
    fn carve(&mut self, size: u64, alignment: u64) -> Option<u64> {
        let index = self.free.iter().position(|range| {
            let start = align_up(range.offset, alignment);
            start + size <= range.end()
        })?;

        let range = self.free.remove(index);
        let start = align_up(range.offset, alignment);
        let end = start + size;

        let mut insert_at = index;
        if start > range.offset {
            self.free.insert(insert_at, FreeRange { offset: range.offset, size: start - range.offset });
            insert_at += 1;
        }
        if end < range.end() {
            self.free.insert(insert_at, FreeRange { offset: end, size: range.end() - end });
        }
        Some(start)
    }

    fn release(&mut self, offset: u64, size: u64) {
        let index = self.free.partition_point(|range| range.offset < offset);
        self.free.insert(index, FreeRange { offset, size });

        // Merge with the following range, then with the preceding one
        if index + 1 < self.free.len() && self.free[index].end() == self.free[index + 1].offset {
            let next = self.free.remove(index + 1);
            self.free[index].size += next.size;
        }
        if index > 0 && self.free[index - 1].end() == self.free[index].offset {
            let current = self.free.remove(index);
            self.free[index - 1].size += current.size;
        }
    }

    fn used_bytes(&self) -> u64 {
        self.size - self.free.iter().map(|range| range.size).sum::<u64>()
    }
}

struct PoolInner {
    device: Device,
    flags: MemBlockFlags,
    block_size: u64,
    blocks: Vec<PoolBlock>,
    allocation_count: usize,
}

impl PoolInner {
    fn block_mut(&mut self, key: MemBlockKey) -> Option<&mut PoolBlock> {
        self.blocks.iter_mut().find(|block| block.key == key)
    }
}

impl Drop for PoolInner {
    fn drop(&mut self) {
        for block in self.blocks.drain(..) {
            let key = block.key;
            // Failures are already reported through the device error sink
            let _ = self
                .device
                .call("MemBlock::destroy", |backend| backend.destroy_mem_block(key));
        }
    }
}

/// Memory pool with a fixed usage-flag profile
#[derive(Clone)]
pub struct MemPool {
    inner: Arc<Mutex<PoolInner>>,
    flags: MemBlockFlags,
}

impl std::fmt::Debug for MemPool {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("MemPool")
            .field("flags", &self.flags)
            .field("allocation_count", &self.allocation_count())
            .field("block_count", &self.block_count())
            .finish()
    }
}

fn lock_inner(inner: &Mutex<PoolInner>) -> Result<MutexGuard<'_, PoolInner>> {
    inner
        .lock()
        .map_err(|_| Error::BackendError("memory pool lock poisoned".to_string()))
}

impl MemPool {
    /// Create an empty pool; no backend memory is allocated until first use
    ///
    /// # Arguments
    ///
    /// * `device` - Device the blocks are created on
    /// * `flags` - Usage profile of every block of this pool
    /// * `block_size` - Default size of the blocks the pool creates
    pub fn new(device: &Device, flags: MemBlockFlags, block_size: u64) -> Self {
        Self {
            inner: Arc::new(Mutex::new(PoolInner {
                device: device.clone(),
                flags,
                block_size: align_up(block_size.max(1), MEMBLOCK_ALIGNMENT),
                blocks: Vec::new(),
                allocation_count: 0,
            })),
            flags,
        }
    }

    pub fn flags(&self) -> MemBlockFlags {
        self.flags
    }

    /// Allocate `size` bytes aligned to `alignment` (a power of two)
    pub fn allocate(&self, size: u64, alignment: u64) -> Result<MemHandle> {
        let mut guard = lock_inner(&self.inner)?;
        let inner = &mut *guard;
        let device = inner.device.clone();

        if size == 0 || !alignment.is_power_of_two() {
            return device.check(
                "MemPool::allocate",
                Err(Error::InvalidResource(format!(
                    "bad allocation request: size {} alignment {}",
                    size, alignment
                ))),
            );
        }

        for block in inner.blocks.iter_mut() {
            if let Some(offset) = block.carve(size, alignment) {
                let key = block.key;
                inner.allocation_count += 1;
                return Ok(MemHandle::new(self.inner.clone(), key, offset, size));
            }
        }

        let block_size = align_up(inner.block_size.max(size), MEMBLOCK_ALIGNMENT);
        let flags = inner.flags;
        let key = device.call("MemBlock::create", |backend| {
            backend.create_mem_block(flags, block_size)
        })?;
        crate::engine_debug!(
            "vgdemo::MemPool",
            "Created {:?} block of {} bytes",
            flags,
            block_size
        );

        inner.blocks.push(PoolBlock::new(key, block_size));
        let offset = inner
            .blocks
            .last_mut()
            .and_then(|block| block.carve(size, alignment))
            .ok_or(Error::OutOfMemory)?;
        inner.allocation_count += 1;
        Ok(MemHandle::new(self.inner.clone(), key, offset, size))
    }

    /// Live allocations carved from this pool
    pub fn allocation_count(&self) -> usize {
        self.inner.lock().map(|inner| inner.allocation_count).unwrap_or(0)
    }

    /// Backend blocks currently held by this pool
    pub fn block_count(&self) -> usize {
        self.inner.lock().map(|inner| inner.blocks.len()).unwrap_or(0)
    }

    /// Bytes currently handed out (alignment padding excluded)
    pub fn used_bytes(&self) -> u64 {
        self.inner
            .lock()
            .map(|inner| inner.blocks.iter().map(PoolBlock::used_bytes).sum())
            .unwrap_or(0)
    }
}

/// Range of pool memory; freed on `destroy()` or drop
pub struct MemHandle {
    pool: Arc<Mutex<PoolInner>>,
    block: MemBlockKey,
    offset: u64,
    size: u64,
    released: bool,
}

impl std::fmt::Debug for MemHandle {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("MemHandle")
            .field("block", &self.block)
            .field("offset", &self.offset)
            .field("size", &self.size)
            .finish()
    }
}

impl MemHandle {
    fn new(pool: Arc<Mutex<PoolInner>>, block: MemBlockKey, offset: u64, size: u64) -> Self {
        Self { pool, block, offset, size, released: false }
    }

    pub fn block(&self) -> MemBlockKey {
        self.block
    }

    pub fn offset(&self) -> u64 {
        self.offset
    }

    pub fn size(&self) -> u64 {
        self.size
    }

    pub fn gpu_addr(&self) -> GpuAddr {
        GpuAddr { block: self.block, offset: self.offset }
    }

    /// Copy `data` into this range at `offset` (CPU-visible pools only)
    pub fn write(&self, offset: u64, data: &[u8]) -> Result<()> {
        let device = lock_inner(&self.pool)?.device.clone();
        if offset + data.len() as u64 > self.size {
            return device.check(
                "MemBlock::write",
                Err(Error::InvalidResource(format!(
                    "write of {} bytes at {} overflows a {} byte allocation",
                    data.len(),
                    offset,
                    self.size
                ))),
            );
        }
        let block = self.block;
        let absolute = self.offset + offset;
        device.call("MemBlock::write", |backend| backend.write_mem_block(block, absolute, data))
    }

    /// Return the range to its pool
    pub fn destroy(mut self) {
        self.release();
    }

    fn release(&mut self) {
        if self.released {
            return;
        }
        self.released = true;
        if let Ok(mut inner) = self.pool.lock() {
            inner.allocation_count = inner.allocation_count.saturating_sub(1);
            let (offset, size) = (self.offset, self.size);
            if let Some(block) = inner.block_mut(self.block) {
                block.release(offset, size);
            }
        }
    }
}

impl Drop for MemHandle {
    fn drop(&mut self) {
        self.release();
    }
}

#[cfg(test)]
#[path = "mem_pool_tests.rs"]
mod tests;
