//! Unit tests for the framebuffer resource lifecycle

use crate::config::SampleConfig;
use crate::device::mock_device::{mock_device, MockCall, MockEvent, MockProbe};
use crate::device::{
    Command, ImageFlags, ImageFormat, MemBlockFlags, MemPool, Queue, Scissor, Viewport,
};
use crate::error::Error;
use crate::sample::resources::FramebufferManager;

struct Fixture {
    manager: FramebufferManager,
    queue: Queue,
    image_pool: MemPool,
    probe: MockProbe,
}

fn fixture() -> Fixture {
    let (device, probe, _sink) = mock_device();
    let queue = Queue::new(&device);
    let image_pool = MemPool::new(&device, MemBlockFlags::GPU_CACHED | MemBlockFlags::IMAGE, 0x1000000);
    let data_pool = MemPool::new(&device, MemBlockFlags::CPU_UNCACHED | MemBlockFlags::GPU_CACHED, 0x100000);
    let manager = FramebufferManager::new(&queue, &image_pool, &data_pool, &SampleConfig::default()).unwrap();
    Fixture { manager, queue, image_pool, probe }
}

// ============================================================================
// CREATION
// ============================================================================

#[test]
fn test_create_builds_depth_framebuffers_and_swapchain() {
    let mut f = fixture();

    f.manager.create_resources(1280, 720).unwrap();

    let images = f.probe.live_images();
    assert_eq!(images.len(), 3);
    let stencil: Vec<_> = images.iter().filter(|(_, desc)| desc.format == ImageFormat::S8).collect();
    assert_eq!(stencil.len(), 1);
    assert!(!stencil[0].1.flags.contains(ImageFlags::USAGE_PRESENT));
    for (_, desc) in images.iter().filter(|(_, desc)| desc.format == ImageFormat::RGBA8Unorm) {
        assert!(desc.flags.contains(ImageFlags::USAGE_RENDER | ImageFlags::USAGE_PRESENT));
        assert_eq!((desc.width, desc.height), (1280, 720));
    }
    assert_eq!(f.probe.live_swapchain_count(), 1);
    assert_eq!(f.manager.size(), Some((1280, 720)));
    assert_eq!(f.image_pool.allocation_count(), 3);
}

#[test]
fn test_bind_lists_pair_each_framebuffer_with_the_stencil_buffer() {
    let mut f = fixture();
    f.manager.create_resources(640, 480).unwrap();
    let resources = f.manager.resources().unwrap();

    for (slot, framebuffer) in resources.framebuffers().iter().enumerate() {
        let list = resources.bind_list(slot).unwrap();
        assert_eq!(
            list.commands(),
            &[Command::BindRenderTargets { color: framebuffer.key(), depth: Some(resources.depth_buffer().key()) }]
        );
    }
    assert!(resources.bind_list(resources.framebuffers().len()).is_none());
}

#[test]
fn test_static_list_sets_viewport_clears_and_base_state() {
    let mut f = fixture();
    f.manager.create_resources(640, 480).unwrap();

    let commands = f.manager.resources().unwrap().render_list().commands().to_vec();

    assert_eq!(commands.len(), 7);
    assert_eq!(
        commands[0],
        Command::SetViewport(Viewport { x: 0.0, y: 0.0, width: 640.0, height: 480.0, near: 0.0, far: 1.0 })
    );
    assert_eq!(commands[1], Command::SetScissor(Scissor { x: 0, y: 0, width: 640, height: 480 }));
    assert_eq!(commands[2], Command::ClearColor { color: [0.2, 0.3, 0.3, 1.0] });
    assert_eq!(
        commands[3],
        Command::ClearDepthStencil { clear_depth: true, depth: 1.0, stencil_mask: 0xFF, stencil_value: 0 }
    );
    assert!(matches!(commands[4], Command::BindRasterizerState(_)));
    assert!(matches!(commands[5], Command::BindColorState(_)));
    assert!(matches!(commands[6], Command::BindColorWriteState(_)));
}

#[test]
fn test_create_twice_is_rejected() {
    let mut f = fixture();
    f.manager.create_resources(640, 480).unwrap();

    assert!(matches!(f.manager.create_resources(640, 480), Err(Error::InvalidState(_))));
    assert_eq!(f.probe.live_image_count(), 3);
}

#[test]
fn test_failed_create_leaves_nothing_behind() {
    let mut f = fixture();
    f.probe.fail_next(MockCall::CreateSwapchain, Error::BackendError("no surface".to_string()));

    assert!(f.manager.create_resources(640, 480).is_err());

    assert!(!f.manager.has_resources());
    assert_eq!(f.image_pool.allocation_count(), 0);
    assert_eq!(f.probe.live_image_count(), 0);
}

#[test]
fn test_failed_create_rewinds_static_commands() {
    let mut f = fixture();
    f.probe.fail_next(MockCall::CreateSwapchain, Error::BackendError("no surface".to_string()));

    assert!(f.manager.create_resources(640, 480).is_err());
    assert_eq!(f.manager.cmd_buf.used(), 0);
}

#[test]
fn test_repeated_failed_creates_do_not_exhaust_command_memory() {
    let mut f = fixture();
    for _ in 0..200 {
        f.probe.fail_next(MockCall::CreateSwapchain, Error::BackendError("no surface".to_string()));
        assert!(f.manager.create_resources(640, 480).is_err());
    }

    f.manager.create_resources(640, 480).unwrap();

    assert!(f.manager.has_resources());
    let render_list = f.manager.resources().unwrap().render_list();
    assert!(matches!(render_list.commands().first(), Some(Command::SetViewport(_))));
}

// ============================================================================
// DESTRUCTION
// ============================================================================

#[test]
fn test_create_then_destroy_returns_to_baseline() {
    let mut f = fixture();
    let baseline = f.image_pool.allocation_count();

    f.manager.create_resources(1920, 1080).unwrap();
    f.manager.destroy_resources().unwrap();

    assert_eq!(f.image_pool.allocation_count(), baseline);
    assert_eq!(f.probe.live_image_count(), 0);
    assert_eq!(f.probe.live_swapchain_count(), 0);
}

#[test]
fn test_destroy_waits_idle_first_and_swapchain_goes_before_images() {
    let mut f = fixture();
    f.manager.create_resources(640, 480).unwrap();
    f.probe.clear_events();

    f.manager.destroy_resources().unwrap();

    let events = f.probe.events();
    assert_eq!(events[0], MockEvent::WaitIdle);
    assert!(matches!(events[1], MockEvent::DestroySwapchain(_)));
    assert!(events[2..].iter().all(|event| !matches!(event, MockEvent::DestroySwapchain(_))));
}

#[test]
fn test_destroy_invalidates_recorded_lists() {
    let mut f = fixture();
    f.manager.create_resources(640, 480).unwrap();
    let stale = f.manager.resources().unwrap().render_list().clone();

    f.manager.destroy_resources().unwrap();

    assert!(!stale.is_valid());
    assert!(f.queue.submit_commands(&stale).is_err());
}

#[test]
fn test_destroy_without_resources_is_a_no_op() {
    let mut f = fixture();
    f.manager.create_resources(640, 480).unwrap();
    f.manager.destroy_resources().unwrap();
    f.probe.clear_events();

    f.manager.destroy_resources().unwrap();
    f.manager.destroy_resources().unwrap();

    assert!(f.probe.events().is_empty());
}

#[test]
fn test_recreate_after_destroy_uses_new_size() {
    let mut f = fixture();
    f.manager.create_resources(1280, 720).unwrap();
    f.manager.destroy_resources().unwrap();

    f.manager.create_resources(1920, 1080).unwrap();

    assert_eq!(f.manager.size(), Some((1920, 1080)));
    assert!(f.probe.live_images().iter().all(|(_, desc)| (desc.width, desc.height) == (1920, 1080)));
    assert_eq!(f.image_pool.allocation_count(), 3);
}

#[test]
fn test_dropping_the_manager_releases_resources() {
    let f = fixture();
    let Fixture { mut manager, image_pool, probe, .. } = f;
    manager.create_resources(640, 480).unwrap();

    drop(manager);

    assert_eq!(image_pool.allocation_count(), 0);
    assert_eq!(probe.live_swapchain_count(), 0);
}
