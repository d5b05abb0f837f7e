//! Unit tests for mem_pool.rs

use crate::device::mock_device::{mock_device, MockCall, MockEvent};
use crate::device::{MemBlockFlags, MemPool, MEMBLOCK_ALIGNMENT};
use crate::error::Error;

fn data_flags() -> MemBlockFlags {
    MemBlockFlags::CPU_UNCACHED | MemBlockFlags::GPU_CACHED
}

// ============================================================================
// ALLOCATION
// ============================================================================

#[test]
fn test_pool_creates_no_block_until_first_allocation() {
    let (device, probe, _sink) = mock_device();
    let pool = MemPool::new(&device, data_flags(), 0x10000);

    assert_eq!(pool.block_count(), 0);
    assert_eq!(probe.live_block_count(), 0);

    let handle = pool.allocate(64, 16).unwrap();

    assert_eq!(pool.block_count(), 1);
    assert_eq!(handle.offset(), 0);
    assert_eq!(handle.size(), 64);
    assert_eq!(pool.allocation_count(), 1);
}

#[test]
fn test_pool_respects_alignment() {
    let (device, _probe, _sink) = mock_device();
    let pool = MemPool::new(&device, data_flags(), 0x10000);

    let first = pool.allocate(10, 1).unwrap();
    let second = pool.allocate(32, 0x100).unwrap();
    let third = pool.allocate(4, 4).unwrap();

    assert_eq!(first.offset(), 0);
    assert_eq!(second.offset(), 0x100);
    // The padding between the first two allocations is reused
    assert_eq!(third.offset(), 12);
}

#[test]
fn test_pool_grows_with_a_block_sized_for_large_requests() {
    let (device, probe, _sink) = mock_device();
    let pool = MemPool::new(&device, data_flags(), 0x1000);

    let _small = pool.allocate(0x800, 4).unwrap();
    let large = pool.allocate(0x3000, 4).unwrap();

    assert_eq!(pool.block_count(), 2);
    assert_eq!(large.offset(), 0);
    let sizes: Vec<u64> = probe
        .events()
        .iter()
        .filter_map(|event| match event {
            MockEvent::CreateMemBlock { size, .. } => Some(*size),
            _ => None,
        })
        .collect();
    assert_eq!(sizes, vec![0x1000, 0x3000]);
}

#[test]
fn test_pool_rounds_block_size_to_memblock_alignment() {
    let (device, probe, _sink) = mock_device();
    let pool = MemPool::new(&device, data_flags(), 100);

    let _handle = pool.allocate(10, 4).unwrap();

    assert!(matches!(
        probe.events()[0],
        MockEvent::CreateMemBlock { size, .. } if size == MEMBLOCK_ALIGNMENT
    ));
}

#[test]
fn test_pool_rejects_bad_requests_through_the_sink() {
    let (device, _probe, sink) = mock_device();
    let pool = MemPool::new(&device, data_flags(), 0x1000);

    assert!(matches!(pool.allocate(0, 4), Err(Error::InvalidResource(_))));
    assert!(matches!(pool.allocate(16, 3), Err(Error::InvalidResource(_))));

    let failures = sink.failures();
    assert_eq!(failures.len(), 2);
    assert_eq!(failures[0].context, "MemPool::allocate");
}

#[test]
fn test_pool_propagates_backend_failure() {
    let (device, probe, sink) = mock_device();
    let pool = MemPool::new(&device, data_flags(), 0x1000);
    probe.fail_next(MockCall::CreateMemBlock, Error::OutOfMemory);

    assert_eq!(pool.allocate(16, 4).unwrap_err(), Error::OutOfMemory);
    assert_eq!(pool.block_count(), 0);
    assert_eq!(pool.allocation_count(), 0);
    assert_eq!(sink.failures()[0].context, "MemBlock::create");
}

// ============================================================================
// RELEASE
// ============================================================================

#[test]
fn test_freed_ranges_are_coalesced_and_reused() {
    let (device, _probe, _sink) = mock_device();
    let pool = MemPool::new(&device, data_flags(), 0x1000);

    let a = pool.allocate(0x400, 4).unwrap();
    let b = pool.allocate(0x400, 4).unwrap();
    let c = pool.allocate(0x400, 4).unwrap();
    assert_eq!(pool.used_bytes(), 0xC00);

    drop(a);
    c.destroy();
    b.destroy();
    assert_eq!(pool.used_bytes(), 0);
    assert_eq!(pool.allocation_count(), 0);

    // The whole block is one free range again
    let whole = pool.allocate(0x1000, 4).unwrap();
    assert_eq!(whole.offset(), 0);
    assert_eq!(pool.block_count(), 1);
}

#[test]
fn test_blocks_are_destroyed_with_the_pool_and_its_handles() {
    let (device, probe, _sink) = mock_device();
    let pool = MemPool::new(&device, data_flags(), 0x1000);
    let handle = pool.allocate(16, 4).unwrap();

    drop(pool);
    assert_eq!(probe.live_block_count(), 1);

    drop(handle);
    assert_eq!(probe.live_block_count(), 0);
}

// ============================================================================
// WRITES
// ============================================================================

#[test]
fn test_handle_write_lands_at_its_offset() {
    let (device, probe, _sink) = mock_device();
    let pool = MemPool::new(&device, data_flags(), 0x1000);
    let _pad = pool.allocate(0x20, 4).unwrap();
    let handle = pool.allocate(8, 4).unwrap();

    handle.write(2, &[1, 2, 3]).unwrap();

    let bytes = probe.read_mem(handle.block(), handle.offset(), 8).unwrap();
    assert_eq!(bytes, vec![0, 0, 1, 2, 3, 0, 0, 0]);
    assert_eq!(handle.gpu_addr().offset, 0x20);
}

#[test]
fn test_handle_write_overflow_is_rejected() {
    let (device, probe, sink) = mock_device();
    let pool = MemPool::new(&device, data_flags(), 0x1000);
    let handle = pool.allocate(4, 4).unwrap();

    assert!(handle.write(2, &[0; 4]).is_err());
    assert_eq!(probe.write_count(), 0);
    assert_eq!(sink.failures().len(), 1);
}

#[test]
fn test_write_into_image_memory_fails() {
    let (device, _probe, sink) = mock_device();
    let pool = MemPool::new(&device, MemBlockFlags::GPU_CACHED | MemBlockFlags::IMAGE, 0x1000);
    let handle = pool.allocate(4, 4).unwrap();

    assert!(handle.write(0, &[1]).is_err());
    assert_eq!(sink.failures()[0].context, "MemBlock::write");
}
