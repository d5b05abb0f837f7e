/// GpuContext - Vulkan objects shared by every backend resource
///
/// Memory blocks, images, shaders, samplers, pipelines and the presenter all
/// hold an `Arc<GpuContext>`, so the logical device outlives every object
/// created from it. The last reference tears everything down in order:
/// allocator, debug messenger, device, instance.

use ash::vk;
use gpu_allocator::vulkan::Allocator;
use std::mem::ManuallyDrop;
use std::sync::{Mutex, MutexGuard};
use vgdemo_engine::engine_err;
use vgdemo_engine::vgdemo::Result;

pub(crate) struct GpuContext {
    /// Vulkan loader; must outlive the instance
    _entry: ash::Entry,
    pub instance: ash::Instance,
    pub physical_device: vk::PhysicalDevice,
    pub device: ash::Device,

    /// GPU memory allocator
    /// Wrapped in ManuallyDrop so it is dropped BEFORE the device is destroyed
    allocator: ManuallyDrop<Mutex<Allocator>>,

    /// Queue used for rendering, copies and presentation blits
    pub graphics_queue: vk::Queue,
    pub graphics_queue_family: u32,
    /// Queue used for vkQueuePresentKHR (may be the graphics queue)
    pub present_queue: vk::Queue,

    /// Debug utils loader (validation builds only)
    debug_utils_loader: Option<ash::ext::debug_utils::Instance>,
    debug_messenger: Option<vk::DebugUtilsMessengerEXT>,
}

impl GpuContext {
    /// # Arguments
    ///
    /// * `entry` - Vulkan loader the instance was created from
    /// * `instance` - Vulkan instance
    /// * `physical_device` - Selected GPU
    /// * `device` - Logical device
    /// * `allocator` - Allocator created on `device`
    /// * `graphics_queue` - Graphics queue and its family index
    /// * `present_queue` - Queue able to present to the window surface
    /// * `debug` - Debug utils loader and messenger, when validation is enabled
    #[allow(clippy::too_many_arguments)]
    pub fn new(
        entry: ash::Entry,
        instance: ash::Instance,
        physical_device: vk::PhysicalDevice,
        device: ash::Device,
        allocator: Allocator,
        graphics_queue: (vk::Queue, u32),
        present_queue: vk::Queue,
        debug: Option<(ash::ext::debug_utils::Instance, vk::DebugUtilsMessengerEXT)>,
    ) -> Self {
        let (debug_utils_loader, debug_messenger) = match debug {
            Some((loader, messenger)) => (Some(loader), Some(messenger)),
            None => (None, None),
        };
        Self {
            _entry: entry,
            instance,
            physical_device,
            device,
            allocator: ManuallyDrop::new(Mutex::new(allocator)),
            graphics_queue: graphics_queue.0,
            graphics_queue_family: graphics_queue.1,
            present_queue,
            debug_utils_loader,
            debug_messenger,
        }
    }

    /// Lock the allocator
    pub fn allocator(&self) -> Result<MutexGuard<'_, Allocator>> {
        self.allocator
            .lock()
            .map_err(|_| engine_err!("vgdemo::vulkan", "GPU allocator lock poisoned"))
    }
}

impl Drop for GpuContext {
    fn drop(&mut self) {
        unsafe {
            self.device.device_wait_idle().ok();

            // Allocator first: it frees its device memory blocks
            ManuallyDrop::drop(&mut self.allocator);

            if let (Some(loader), Some(messenger)) =
                (self.debug_utils_loader.as_ref(), self.debug_messenger.take())
            {
                loader.destroy_debug_utils_messenger(messenger, None);
                crate::debug::cleanup_debug_config();
            }

            self.device.destroy_device(None);
            self.instance.destroy_instance(None);
        }
    }
}
