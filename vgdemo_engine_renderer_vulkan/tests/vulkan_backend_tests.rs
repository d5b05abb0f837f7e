/// Integration tests for VulkanBackend
///
/// Every test needs a GPU and a display, so they are ignored by default:
/// `cargo test -p vgdemo_engine_renderer_vulkan -- --ignored`

use vgdemo_engine::device::{
    Command, CopyRect, GpuAddr, GraphicsBackend, ImageFlags, ImageFormat, ImageKey, ImageLayoutDesc,
    MemBlockFlags, MemBlockKey, ShaderStage, MEMBLOCK_ALIGNMENT,
};
use vgdemo_engine::vgdemo::Error;
use vgdemo_engine_renderer_vulkan::{get_validation_stats, VulkanBackend, VulkanConfig};
use winit::event_loop::EventLoop;
use winit::window::Window;

#[allow(deprecated)]
fn create_test_window() -> (Window, EventLoop<()>) {
    let event_loop = EventLoop::new().unwrap();
    let window_attrs = Window::default_attributes()
        .with_title("Vulkan Backend Test")
        .with_inner_size(winit::dpi::PhysicalSize::new(320, 240))
        .with_visible(false); // Hidden window for tests
    let window = event_loop.create_window(window_attrs).unwrap();
    (window, event_loop)
}

fn create_backend(window: &Window) -> VulkanBackend {
    let config = VulkanConfig {
        enable_validation: true,
        ..Default::default()
    };
    VulkanBackend::new(window, config).unwrap()
}

fn create_framebuffer(backend: &mut VulkanBackend, width: u32, height: u32) -> (MemBlockKey, ImageKey) {
    let layout = backend
        .image_layout(&ImageLayoutDesc {
            flags: ImageFlags::USAGE_RENDER | ImageFlags::USAGE_PRESENT,
            format: ImageFormat::RGBA8Unorm,
            width,
            height,
        })
        .unwrap();
    let size = layout.size().div_ceil(MEMBLOCK_ALIGNMENT) * MEMBLOCK_ALIGNMENT;
    let block = backend.create_mem_block(MemBlockFlags::IMAGE, size).unwrap();
    let image = backend.create_image(&layout, block, 0).unwrap();
    (block, image)
}

// ============================================================================
// MEMORY BLOCK TESTS
// ============================================================================

#[test]
#[ignore] // Requires GPU
fn test_vulkan_backend_name() {
    let (window, _event_loop) = create_test_window();
    let backend = create_backend(&window);
    assert_eq!(backend.name(), "vulkan");
}

#[test]
#[ignore] // Requires GPU
fn test_vulkan_mem_block_write_and_destroy() {
    let (window, _event_loop) = create_test_window();
    let mut backend = create_backend(&window);

    let block = backend.create_mem_block(MemBlockFlags::CPU_UNCACHED, 0x1000).unwrap();
    backend.write_mem_block(block, 0x10, &[1, 2, 3, 4]).unwrap();

    let overflow = backend.write_mem_block(block, 0xFFE, &[0; 4]);
    assert!(matches!(overflow, Err(Error::InvalidResource(_))));

    backend.destroy_mem_block(block).unwrap();
    assert!(backend.destroy_mem_block(block).is_err());
}

#[test]
#[ignore] // Requires GPU
fn test_vulkan_write_to_image_block_fails() {
    let (window, _event_loop) = create_test_window();
    let mut backend = create_backend(&window);

    let block = backend.create_mem_block(MemBlockFlags::IMAGE, 0x10000).unwrap();
    let result = backend.write_mem_block(block, 0, &[0; 16]);
    assert!(matches!(result, Err(Error::InvalidResource(_))));
}

// ============================================================================
// IMAGE TESTS
// ============================================================================

#[test]
#[ignore] // Requires GPU
fn test_vulkan_image_layout_is_cached() {
    let (window, _event_loop) = create_test_window();
    let mut backend = create_backend(&window);

    let desc = ImageLayoutDesc {
        flags: ImageFlags::empty(),
        format: ImageFormat::R8Unorm,
        width: 256,
        height: 256,
    };
    let first = backend.image_layout(&desc).unwrap();
    let second = backend.image_layout(&desc).unwrap();

    assert_eq!(first, second);
    assert!(first.size() >= 256 * 256);
    assert!(first.alignment().is_power_of_two());
}

#[test]
#[ignore] // Requires GPU
fn test_vulkan_stencil_image_layout() {
    let (window, _event_loop) = create_test_window();
    let mut backend = create_backend(&window);

    let layout = backend
        .image_layout(&ImageLayoutDesc {
            flags: ImageFlags::USAGE_RENDER,
            format: ImageFormat::S8,
            width: 320,
            height: 240,
        })
        .unwrap();
    assert!(layout.size() >= 320 * 240);
}

#[test]
#[ignore] // Requires GPU
fn test_vulkan_create_image_checks_placement() {
    let (window, _event_loop) = create_test_window();
    let mut backend = create_backend(&window);

    let layout = backend
        .image_layout(&ImageLayoutDesc {
            flags: ImageFlags::empty(),
            format: ImageFormat::RGBA8Unorm,
            width: 64,
            height: 64,
        })
        .unwrap();
    let block = backend.create_mem_block(MemBlockFlags::IMAGE, 0x100000).unwrap();
    let data_block = backend.create_mem_block(MemBlockFlags::CPU_UNCACHED, 0x100000).unwrap();

    assert!(backend.create_image(&layout, block, 1).is_err());
    assert!(backend.create_image(&layout, block, 0x100000).is_err());
    assert!(backend.create_image(&layout, data_block, 0).is_err());

    let image = backend.create_image(&layout, block, 0).unwrap();
    backend.destroy_image(image).unwrap();
    assert!(backend.destroy_image(image).is_err());
}

// ============================================================================
// SHADER TESTS
// ============================================================================

#[test]
#[ignore] // Requires GPU
fn test_vulkan_shader_requires_code_block() {
    let (window, _event_loop) = create_test_window();
    let mut backend = create_backend(&window);

    let block = backend.create_mem_block(MemBlockFlags::CPU_UNCACHED, 0x1000).unwrap();
    let result = backend.create_shader(ShaderStage::Vertex, block, 0, 0x100);
    assert!(matches!(result, Err(Error::InvalidResource(_))));
}

#[test]
#[ignore] // Requires GPU
fn test_vulkan_shader_rejects_invalid_spirv() {
    let (window, _event_loop) = create_test_window();
    let mut backend = create_backend(&window);

    let block = backend
        .create_mem_block(MemBlockFlags::CPU_UNCACHED | MemBlockFlags::CODE, 0x1000)
        .unwrap();
    backend.write_mem_block(block, 0, &[0xAB; 64]).unwrap();

    let result = backend.create_shader(ShaderStage::Fragment, block, 0, 64);
    assert!(matches!(result, Err(Error::InvalidResource(_))));
}

// ============================================================================
// SUBMISSION TESTS
// ============================================================================

#[test]
#[ignore] // Requires GPU
fn test_vulkan_clear_and_upload_outside_frame() {
    let (window, _event_loop) = create_test_window();
    let mut backend = create_backend(&window);
    let (_fb_block, framebuffer) = create_framebuffer(&mut backend, 320, 240);

    let staging = backend.create_mem_block(MemBlockFlags::CPU_UNCACHED, 0x1000).unwrap();
    backend.write_mem_block(staging, 0, &[0xFF; 16 * 16 * 4]).unwrap();

    backend
        .submit_commands(&[
            Command::BindRenderTargets { color: framebuffer, depth: None },
            Command::ClearColor { color: [0.3, 0.3, 0.32, 1.0] },
            Command::Barrier,
            Command::CopyBufferToImage {
                src: GpuAddr { block: staging, offset: 0 },
                image: framebuffer,
                rect: CopyRect { x: 8, y: 8, width: 16, height: 16 },
            },
        ])
        .unwrap();
    backend.wait_idle().unwrap();

    assert_eq!(get_validation_stats().errors, 0);
}

#[test]
#[ignore] // Requires GPU
fn test_vulkan_copy_outside_image_fails() {
    let (window, _event_loop) = create_test_window();
    let mut backend = create_backend(&window);
    let (_fb_block, framebuffer) = create_framebuffer(&mut backend, 64, 64);
    let staging = backend.create_mem_block(MemBlockFlags::CPU_UNCACHED, 0x1000).unwrap();

    let result = backend.submit_commands(&[Command::CopyBufferToImage {
        src: GpuAddr { block: staging, offset: 0 },
        image: framebuffer,
        rect: CopyRect { x: 60, y: 0, width: 8, height: 8 },
    }]);
    assert!(matches!(result, Err(Error::InvalidResource(_))));
}

#[test]
#[ignore] // Requires GPU
fn test_vulkan_clear_without_target_fails() {
    let (window, _event_loop) = create_test_window();
    let mut backend = create_backend(&window);

    let result = backend.submit_commands(&[Command::ClearColor { color: [0.0; 4] }]);
    assert!(matches!(result, Err(Error::InvalidState(_))));
}

// ============================================================================
// PRESENTATION TESTS
// ============================================================================

#[test]
#[ignore] // Requires GPU and a display
fn test_vulkan_acquire_render_present() {
    let (window, _event_loop) = create_test_window();
    let mut backend = create_backend(&window);
    let (_block_a, image_a) = create_framebuffer(&mut backend, 320, 240);
    let (_block_b, image_b) = create_framebuffer(&mut backend, 320, 240);
    let swapchain = backend.create_swapchain(&[image_a, image_b]).unwrap();

    for frame in 0..4 {
        let slot = backend.acquire_image(swapchain).unwrap();
        assert_eq!(slot, frame % 2);

        let target = if slot == 0 { image_a } else { image_b };
        backend
            .submit_commands(&[
                Command::BindRenderTargets { color: target, depth: None },
                Command::ClearColor { color: [0.0, 0.0, 0.0, 1.0] },
            ])
            .unwrap();
        backend.present_image(swapchain, slot).unwrap();
    }

    backend.wait_idle().unwrap();
    backend.destroy_swapchain(swapchain).unwrap();
    assert_eq!(get_validation_stats().errors, 0);
}

#[test]
#[ignore] // Requires GPU and a display
fn test_vulkan_present_without_acquire_fails() {
    let (window, _event_loop) = create_test_window();
    let mut backend = create_backend(&window);
    let (_block, image) = create_framebuffer(&mut backend, 320, 240);
    let swapchain = backend.create_swapchain(&[image]).unwrap();

    let result = backend.present_image(swapchain, 0);
    assert!(matches!(result, Err(Error::InvalidState(_))));
}

#[test]
#[ignore] // Requires GPU
fn test_vulkan_swapchain_over_destroyed_image_fails() {
    let (window, _event_loop) = create_test_window();
    let mut backend = create_backend(&window);
    let (_block, image) = create_framebuffer(&mut backend, 64, 64);
    backend.destroy_image(image).unwrap();

    assert!(backend.create_swapchain(&[image]).is_err());
    assert!(backend.create_swapchain(&[]).is_err());
}
