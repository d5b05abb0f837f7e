/// Presentation - window swapchain, frame slots and engine swapchains
///
/// The engine renders into its own framebuffer images and presents a slot.
/// `Presenter` owns the window's `VkSwapchainKHR` and blits the framebuffer
/// of the presented slot into the acquired window image. Each slot of an
/// engine swapchain owns a `FrameContext` (command pool, descriptor sets,
/// fence and acquire semaphore) so consecutive frames overlap on the GPU.

use ash::vk;
use std::sync::Arc;
use vgdemo_engine::device::ImageKey;
use vgdemo_engine::vgdemo::{Error, Result};
use vgdemo_engine::{engine_debug, engine_err, engine_error, engine_info};

use crate::vulkan_context::GpuContext;
use crate::vulkan_descriptor_set::DescriptorAllocator;
use crate::vulkan_image::{full_range, VulkanImage};

/// Window image formats in order of preference (UNORM: the engine writes display values)
const SURFACE_FORMAT_PREFERENCE: [vk::Format; 2] = [vk::Format::B8G8R8A8_UNORM, vk::Format::R8G8B8A8_UNORM];

/// Per-slot recording and synchronization objects
pub(crate) struct FrameContext {
    ctx: Arc<GpuContext>,
    pool: vk::CommandPool,
    pub descriptors: DescriptorAllocator,
    /// Signaled when the slot's last fenced submission has completed
    pub fence: vk::Fence,
    /// Signaled when the acquired window image is ready to be written
    pub image_available: vk::Semaphore,
}

impl FrameContext {
    pub fn new(ctx: Arc<GpuContext>) -> Result<Self> {
        unsafe {
            let pool_info = vk::CommandPoolCreateInfo::default()
                .queue_family_index(ctx.graphics_queue_family)
                .flags(vk::CommandPoolCreateFlags::TRANSIENT);
            let pool = ctx.device.create_command_pool(&pool_info, None)
                .map_err(|e| engine_err!("vgdemo::vulkan", "Failed to create command pool: {:?}", e))?;

            let fence_info = vk::FenceCreateInfo::default().flags(vk::FenceCreateFlags::SIGNALED);
            let fence = match ctx.device.create_fence(&fence_info, None) {
                Ok(fence) => fence,
                Err(e) => {
                    ctx.device.destroy_command_pool(pool, None);
                    return Err(engine_err!("vgdemo::vulkan", "Failed to create frame fence: {:?}", e));
                }
            };

            let image_available = match ctx.device.create_semaphore(&vk::SemaphoreCreateInfo::default(), None) {
                Ok(semaphore) => semaphore,
                Err(e) => {
                    ctx.device.destroy_fence(fence, None);
                    ctx.device.destroy_command_pool(pool, None);
                    return Err(engine_err!("vgdemo::vulkan", "Failed to create image-available semaphore: {:?}", e));
                }
            };

            let descriptors = match DescriptorAllocator::new(ctx.clone()) {
                Ok(descriptors) => descriptors,
                Err(e) => {
                    ctx.device.destroy_semaphore(image_available, None);
                    ctx.device.destroy_fence(fence, None);
                    ctx.device.destroy_command_pool(pool, None);
                    return Err(e);
                }
            };

            Ok(Self {
                ctx,
                pool,
                descriptors,
                fence,
                image_available,
            })
        }
    }

    /// Wait for the slot's previous work, then recycle its command buffers and descriptor sets
    pub fn begin(&mut self) -> Result<()> {
        unsafe {
            self.ctx.device.wait_for_fences(&[self.fence], true, u64::MAX)
                .map_err(|e| engine_err!("vgdemo::vulkan", "Failed to wait for frame fence: {:?}", e))?;
            self.ctx.device.reset_command_pool(self.pool, vk::CommandPoolResetFlags::empty())
                .map_err(|e| engine_err!("vgdemo::vulkan", "Failed to reset command pool: {:?}", e))?;
        }
        self.descriptors.reset()
    }

    /// Allocate a primary command buffer in the recording state
    pub fn allocate_command_buffer(&self) -> Result<vk::CommandBuffer> {
        unsafe {
            let alloc_info = vk::CommandBufferAllocateInfo::default()
                .command_pool(self.pool)
                .level(vk::CommandBufferLevel::PRIMARY)
                .command_buffer_count(1);
            let cb = self.ctx.device.allocate_command_buffers(&alloc_info)
                .map_err(|e| engine_err!("vgdemo::vulkan", "Failed to allocate command buffer: {:?}", e))?
                .into_iter()
                .next()
                .ok_or_else(|| engine_err!("vgdemo::vulkan", "Command buffer allocation returned nothing"))?;

            let begin_info = vk::CommandBufferBeginInfo::default()
                .flags(vk::CommandBufferUsageFlags::ONE_TIME_SUBMIT);
            self.ctx.device.begin_command_buffer(cb, &begin_info)
                .map_err(|e| engine_err!("vgdemo::vulkan", "Failed to begin command buffer: {:?}", e))?;
            Ok(cb)
        }
    }

    /// End `cb` and submit it to the graphics queue
    ///
    /// # Arguments
    ///
    /// * `cb` - Command buffer from `allocate_command_buffer`
    /// * `wait` - Semaphore to wait on, with the stage that waits
    /// * `signal` - Semaphores signaled on completion
    /// * `fenced` - Reset and signal this slot's fence
    pub fn submit(
        &self,
        cb: vk::CommandBuffer,
        wait: Option<(vk::Semaphore, vk::PipelineStageFlags)>,
        signal: &[vk::Semaphore],
        fenced: bool,
    ) -> Result<()> {
        unsafe {
            self.ctx.device.end_command_buffer(cb)
                .map_err(|e| engine_err!("vgdemo::vulkan", "Failed to end command buffer: {:?}", e))?;

            let fence = if fenced {
                self.ctx.device.reset_fences(&[self.fence])
                    .map_err(|e| engine_err!("vgdemo::vulkan", "Failed to reset frame fence: {:?}", e))?;
                self.fence
            } else {
                vk::Fence::null()
            };

            let command_buffers = [cb];
            let (wait_semaphores, wait_stages): (Vec<_>, Vec<_>) = wait.into_iter().unzip();
            let submit_info = vk::SubmitInfo::default()
                .wait_semaphores(&wait_semaphores)
                .wait_dst_stage_mask(&wait_stages)
                .command_buffers(&command_buffers)
                .signal_semaphores(signal);

            self.ctx.device.queue_submit(self.ctx.graphics_queue, &[submit_info], fence)
                .map_err(|e| engine_err!("vgdemo::vulkan", "Failed to submit command buffer: {:?}", e))
        }
    }

    /// Block until the slot's fenced submission has completed
    pub fn wait(&self) -> Result<()> {
        unsafe {
            self.ctx.device.wait_for_fences(&[self.fence], true, u64::MAX)
                .map_err(|e| engine_err!("vgdemo::vulkan", "Failed to wait for frame fence: {:?}", e))
        }
    }
}

impl Drop for FrameContext {
    fn drop(&mut self) {
        unsafe {
            self.ctx.device.wait_for_fences(&[self.fence], true, u64::MAX).ok();
            self.ctx.device.destroy_semaphore(self.image_available, None);
            self.ctx.device.destroy_fence(self.fence, None);
            self.ctx.device.destroy_command_pool(self.pool, None);
        }
    }
}

/// Engine swapchain: one framebuffer image and one frame context per slot
pub(crate) struct VulkanSwapchain {
    pub images: Vec<ImageKey>,
    pub slots: Vec<FrameContext>,
    pub next_slot: usize,
}

impl VulkanSwapchain {
    pub fn new(ctx: &Arc<GpuContext>, images: &[ImageKey]) -> Result<Self> {
        let slots = images
            .iter()
            .map(|_| FrameContext::new(ctx.clone()))
            .collect::<Result<Vec<_>>>()?;
        Ok(Self {
            images: images.to_vec(),
            slots,
            next_slot: 0,
        })
    }
}

/// Window swapchain
pub(crate) struct Presenter {
    ctx: Arc<GpuContext>,
    surface: vk::SurfaceKHR,
    surface_loader: ash::khr::surface::Instance,
    swapchain_loader: ash::khr::swapchain::Device,
    swapchain: vk::SwapchainKHR,
    images: Vec<vk::Image>,
    format: vk::SurfaceFormatKHR,
    extent: vk::Extent2D,
    /// One per window image, signaled by the blit submission
    render_finished: Vec<vk::Semaphore>,
    needs_recreate: bool,
}

impl Presenter {
    /// Wrap a window surface; the swapchain itself is created on first acquire
    pub fn new(
        ctx: Arc<GpuContext>,
        surface: vk::SurfaceKHR,
        surface_loader: ash::khr::surface::Instance,
    ) -> Result<Self> {
        let formats = unsafe {
            surface_loader
                .get_physical_device_surface_formats(ctx.physical_device, surface)
                .map_err(|e| {
                    engine_error!("vgdemo::vulkan", "Failed to query surface formats: {:?}", e);
                    Error::InitializationFailed(format!("Failed to get surface formats: {:?}", e))
                })?
        };
        let format = SURFACE_FORMAT_PREFERENCE
            .iter()
            .find_map(|preferred| formats.iter().find(|f| f.format == *preferred))
            .or_else(|| formats.first())
            .copied()
            .ok_or_else(|| Error::InitializationFailed("surface reports no formats".to_string()))?;
        engine_info!("vgdemo::vulkan", "Window surface format: {:?} / {:?}", format.format, format.color_space);

        let swapchain_loader = ash::khr::swapchain::Device::new(&ctx.instance, &ctx.device);

        Ok(Self {
            ctx,
            surface,
            surface_loader,
            swapchain_loader,
            swapchain: vk::SwapchainKHR::null(),
            images: Vec::new(),
            format,
            extent: vk::Extent2D { width: 0, height: 0 },
            render_finished: Vec::new(),
            needs_recreate: true,
        })
    }

    pub fn render_finished(&self, index: u32) -> vk::Semaphore {
        self.render_finished[index as usize]
    }

    /// Acquire the next window image, signaling `semaphore` when it is ready
    ///
    /// `fallback` sizes the swapchain when the surface leaves the extent to
    /// the application.
    pub fn acquire(&mut self, semaphore: vk::Semaphore, fallback: vk::Extent2D) -> Result<u32> {
        if self.needs_recreate {
            self.recreate(fallback)?;
        }
        match self.try_acquire(semaphore) {
            Err(vk::Result::ERROR_OUT_OF_DATE_KHR) => {
                engine_debug!("vgdemo::vulkan", "Window swapchain out of date during acquire, recreating");
                self.recreate(fallback)?;
                self.try_acquire(semaphore)
                    .map_err(|e| engine_err!("vgdemo::vulkan", "Failed to acquire window image: {:?}", e))
            }
            result => result.map_err(|e| engine_err!("vgdemo::vulkan", "Failed to acquire window image: {:?}", e)),
        }
    }

    fn try_acquire(&mut self, semaphore: vk::Semaphore) -> std::result::Result<u32, vk::Result> {
        let (index, suboptimal) = unsafe {
            self.swapchain_loader.acquire_next_image(self.swapchain, u64::MAX, semaphore, vk::Fence::null())?
        };
        if suboptimal {
            self.needs_recreate = true;
        }
        Ok(index)
    }

    fn recreate(&mut self, fallback: vk::Extent2D) -> Result<()> {
        unsafe {
            self.ctx.device.device_wait_idle()
                .map_err(|e| engine_err!("vgdemo::vulkan", "Failed to wait idle before swapchain recreate: {:?}", e))?;

            let capabilities = self.surface_loader
                .get_physical_device_surface_capabilities(self.ctx.physical_device, self.surface)
                .map_err(|e| engine_err!("vgdemo::vulkan", "Failed to get surface capabilities: {:?}", e))?;

            if !capabilities.supported_usage_flags.contains(vk::ImageUsageFlags::TRANSFER_DST) {
                return Err(Error::InitializationFailed(
                    "window surface does not support transfer writes".to_string(),
                ));
            }

            let extent = if capabilities.current_extent.width != u32::MAX {
                capabilities.current_extent
            } else {
                vk::Extent2D {
                    width: fallback.width.clamp(
                        capabilities.min_image_extent.width,
                        capabilities.max_image_extent.width,
                    ),
                    height: fallback.height.clamp(
                        capabilities.min_image_extent.height,
                        capabilities.max_image_extent.height,
                    ),
                }
            };
            if extent.width == 0 || extent.height == 0 {
                return Err(Error::InvalidState("window surface has zero size".to_string()));
            }

            let image_count = capabilities.min_image_count + 1;
            let image_count = if capabilities.max_image_count > 0 {
                image_count.min(capabilities.max_image_count)
            } else {
                image_count
            };

            let old_swapchain = self.swapchain;
            let create_info = vk::SwapchainCreateInfoKHR::default()
                .surface(self.surface)
                .min_image_count(image_count)
                .image_format(self.format.format)
                .image_color_space(self.format.color_space)
                .image_extent(extent)
                .image_array_layers(1)
                .image_usage(vk::ImageUsageFlags::TRANSFER_DST)
                .image_sharing_mode(vk::SharingMode::EXCLUSIVE)
                .pre_transform(capabilities.current_transform)
                .composite_alpha(vk::CompositeAlphaFlagsKHR::OPAQUE)
                .present_mode(vk::PresentModeKHR::FIFO)
                .clipped(true)
                .old_swapchain(old_swapchain);

            let swapchain = self.swapchain_loader.create_swapchain(&create_info, None)
                .map_err(|e| engine_err!("vgdemo::vulkan", "Failed to create window swapchain: {:?}", e))?;
            if old_swapchain != vk::SwapchainKHR::null() {
                self.swapchain_loader.destroy_swapchain(old_swapchain, None);
            }
            self.swapchain = swapchain;
            self.extent = extent;

            self.images = self.swapchain_loader.get_swapchain_images(swapchain)
                .map_err(|e| engine_err!("vgdemo::vulkan", "Failed to get swapchain images: {:?}", e))?;

            for semaphore in self.render_finished.drain(..) {
                self.ctx.device.destroy_semaphore(semaphore, None);
            }
            for _ in 0..self.images.len() {
                let semaphore = self.ctx.device.create_semaphore(&vk::SemaphoreCreateInfo::default(), None)
                    .map_err(|e| engine_err!("vgdemo::vulkan", "Failed to create render-finished semaphore: {:?}", e))?;
                self.render_finished.push(semaphore);
            }
        }

        self.needs_recreate = false;
        engine_info!("vgdemo::vulkan", "Window swapchain: {}x{}, {} images",
            self.extent.width, self.extent.height, self.images.len());
        Ok(())
    }

    /// Record the blit of `source` into window image `index`, leaving it ready to present
    pub fn record_blit(&self, cb: vk::CommandBuffer, source: &mut VulkanImage, index: u32) -> Result<()> {
        let target = *self.images.get(index as usize).ok_or_else(|| {
            engine_err!("vgdemo::vulkan", "Window image index {} out of range (count: {})", index, self.images.len())
        })?;

        source.transition(cb, vk::ImageLayout::TRANSFER_SRC_OPTIMAL);

        let color_range = full_range(vk::ImageAspectFlags::COLOR);
        let to_transfer = vk::ImageMemoryBarrier::default()
            .old_layout(vk::ImageLayout::UNDEFINED)
            .new_layout(vk::ImageLayout::TRANSFER_DST_OPTIMAL)
            .src_queue_family_index(vk::QUEUE_FAMILY_IGNORED)
            .dst_queue_family_index(vk::QUEUE_FAMILY_IGNORED)
            .image(target)
            .subresource_range(color_range)
            .src_access_mask(vk::AccessFlags::empty())
            .dst_access_mask(vk::AccessFlags::TRANSFER_WRITE);

        let color_layers = vk::ImageSubresourceLayers {
            aspect_mask: vk::ImageAspectFlags::COLOR,
            mip_level: 0,
            base_array_layer: 0,
            layer_count: 1,
        };
        let region = vk::ImageBlit {
            src_subresource: color_layers,
            src_offsets: [
                vk::Offset3D { x: 0, y: 0, z: 0 },
                vk::Offset3D {
                    x: source.extent.width as i32,
                    y: source.extent.height as i32,
                    z: 1,
                },
            ],
            dst_subresource: color_layers,
            dst_offsets: [
                vk::Offset3D { x: 0, y: 0, z: 0 },
                vk::Offset3D {
                    x: self.extent.width as i32,
                    y: self.extent.height as i32,
                    z: 1,
                },
            ],
        };

        let to_present = vk::ImageMemoryBarrier::default()
            .old_layout(vk::ImageLayout::TRANSFER_DST_OPTIMAL)
            .new_layout(vk::ImageLayout::PRESENT_SRC_KHR)
            .src_queue_family_index(vk::QUEUE_FAMILY_IGNORED)
            .dst_queue_family_index(vk::QUEUE_FAMILY_IGNORED)
            .image(target)
            .subresource_range(color_range)
            .src_access_mask(vk::AccessFlags::TRANSFER_WRITE)
            .dst_access_mask(vk::AccessFlags::empty());

        unsafe {
            self.ctx.device.cmd_pipeline_barrier(
                cb,
                vk::PipelineStageFlags::TRANSFER,
                vk::PipelineStageFlags::TRANSFER,
                vk::DependencyFlags::empty(),
                &[], &[], &[to_transfer],
            );
            self.ctx.device.cmd_blit_image(
                cb,
                source.image,
                vk::ImageLayout::TRANSFER_SRC_OPTIMAL,
                target,
                vk::ImageLayout::TRANSFER_DST_OPTIMAL,
                &[region],
                vk::Filter::LINEAR,
            );
            self.ctx.device.cmd_pipeline_barrier(
                cb,
                vk::PipelineStageFlags::TRANSFER,
                vk::PipelineStageFlags::BOTTOM_OF_PIPE,
                vk::DependencyFlags::empty(),
                &[], &[], &[to_present],
            );
        }
        Ok(())
    }

    /// Queue window image `index` for display once its blit has finished
    pub fn present(&mut self, index: u32) -> Result<()> {
        let swapchains = [self.swapchain];
        let image_indices = [index];
        let wait_semaphores = [self.render_finished(index)];
        let present_info = vk::PresentInfoKHR::default()
            .wait_semaphores(&wait_semaphores)
            .swapchains(&swapchains)
            .image_indices(&image_indices);

        match unsafe { self.swapchain_loader.queue_present(self.ctx.present_queue, &present_info) } {
            Ok(false) => Ok(()),
            Ok(true) | Err(vk::Result::ERROR_OUT_OF_DATE_KHR) => {
                // Resized: rebuild before the next acquire
                self.needs_recreate = true;
                Ok(())
            }
            Err(e) => Err(engine_err!("vgdemo::vulkan", "Failed to present window image: {:?}", e)),
        }
    }
}

impl Drop for Presenter {
    fn drop(&mut self) {
        unsafe {
            self.ctx.device.device_wait_idle().ok();

            for &semaphore in &self.render_finished {
                self.ctx.device.destroy_semaphore(semaphore, None);
            }
            if self.swapchain != vk::SwapchainKHR::null() {
                self.swapchain_loader.destroy_swapchain(self.swapchain, None);
            }
            self.surface_loader.destroy_surface(self.surface, None);
        }
    }
}
