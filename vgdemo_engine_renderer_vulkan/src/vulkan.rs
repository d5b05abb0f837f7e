/// VulkanBackend - Vulkan implementation of the GraphicsBackend trait

use ash::vk;
use gpu_allocator::vulkan::{Allocator, AllocatorCreateDesc};
use raw_window_handle::{HasDisplayHandle, HasWindowHandle};
use rustc_hash::FxHashMap;
use slotmap::SlotMap;
use std::ffi::CString;
use std::sync::Arc;
use vgdemo_engine::device::{
    Command, GraphicsBackend, ImageFlags, ImageFormat, ImageKey, ImageLayout, ImageLayoutDesc,
    MemBlockFlags, MemBlockKey, ShaderKey, ShaderStage, SwapchainKey, UNIFORM_BUF_ALIGNMENT,
};
use vgdemo_engine::vgdemo::{Error, Result};
use vgdemo_engine::{engine_debug, engine_err, engine_error, engine_info, engine_trace, engine_warn};

use crate::debug::DebugSeverity;
use crate::vulkan_command_list::{CommandRecorder, QueueState, Resources};
use crate::vulkan_context::GpuContext;
use crate::vulkan_format::STENCIL_FORMAT_CANDIDATES;
use crate::vulkan_image::{full_range, image_create_info, probe_requirements, VulkanImage};
use crate::vulkan_memory::{ImageMemoryProfile, MemBlock};
use crate::vulkan_pipeline::PipelineCache;
use crate::vulkan_sampler::SamplerCache;
use crate::vulkan_shader::VulkanShader;
use crate::vulkan_swapchain::{FrameContext, Presenter, VulkanSwapchain};

/// Vulkan backend configuration
#[derive(Debug, Clone)]
pub struct VulkanConfig {
    /// Application name reported to the driver
    pub app_name: String,
    /// Request `VK_LAYER_KHRONOS_validation` and route its messages to the engine log
    pub enable_validation: bool,
    /// Which validation messages are logged
    pub validation_severity: DebugSeverity,
    /// Panic on the first validation error (for tests and debugging)
    pub panic_on_validation_error: bool,
    /// Count validation messages (see `get_validation_stats`)
    pub enable_validation_stats: bool,
}

impl Default for VulkanConfig {
    fn default() -> Self {
        Self {
            app_name: "vgdemo".to_string(),
            enable_validation: cfg!(debug_assertions) || cfg!(feature = "vulkan-validation"),
            validation_severity: DebugSeverity::ErrorsAndWarnings,
            panic_on_validation_error: false,
            enable_validation_stats: true,
        }
    }
}

/// Frame between `acquire_image` and `present_image`
#[derive(Debug, Clone, Copy)]
struct ActiveFrame {
    swapchain: SwapchainKey,
    slot: usize,
    image_index: u32,
}

/// Vulkan device implementation
///
/// Owns every native object behind the engine's keys. Fields are declared in
/// teardown order: objects first, then the caches and the window swapchain,
/// and the shared context last.
pub struct VulkanBackend {
    swapchains: SlotMap<SwapchainKey, VulkanSwapchain>,
    images: SlotMap<ImageKey, VulkanImage>,
    shaders: SlotMap<ShaderKey, VulkanShader>,
    blocks: SlotMap<MemBlockKey, MemBlock>,

    /// Recording context for submissions outside a frame
    immediate: FrameContext,
    pipelines: PipelineCache,
    samplers: SamplerCache,
    /// 1x1 image sampled when no texture is bound
    placeholder: VulkanImage,
    _placeholder_memory: MemBlock,
    presenter: Presenter,

    queue_state: QueueState,
    active_frame: Option<ActiveFrame>,
    layouts: FxHashMap<ImageLayoutDesc, ImageLayout>,
    stencil_format: vk::Format,
    image_profile: ImageMemoryProfile,

    ctx: Arc<GpuContext>,
}

impl VulkanBackend {
    /// Bring up Vulkan on a window
    ///
    /// # Arguments
    ///
    /// * `window` - Window the engine presents to
    /// * `config` - Validation and naming options
    pub fn new<W: HasDisplayHandle + HasWindowHandle>(window: &W, config: VulkanConfig) -> Result<Self> {
        unsafe {
            let entry = ash::Entry::load()
                .map_err(|e| {
                    engine_error!("vgdemo::vulkan", "Failed to load Vulkan library: {:?}", e);
                    Error::InitializationFailed(format!("Failed to load Vulkan library: {:?}", e))
                })?;

            let app_name = CString::new(config.app_name.as_str())
                .map_err(|_| Error::InitializationFailed("application name contains a NUL byte".to_string()))?;
            let app_info = vk::ApplicationInfo::default()
                .application_name(&app_name)
                .application_version(vk::make_api_version(0, 1, 0, 0))
                .engine_name(c"vgdemo")
                .engine_version(vk::make_api_version(0, 0, 1, 0))
                .api_version(vk::API_VERSION_1_3);

            let display_handle = window.display_handle()
                .map_err(|e| {
                    engine_error!("vgdemo::vulkan", "Failed to get display handle: {}", e);
                    Error::InitializationFailed(format!("Failed to get display handle: {}", e))
                })?;
            let mut extension_names = ash_window::enumerate_required_extensions(display_handle.as_raw())
                .map_err(|e| {
                    engine_error!("vgdemo::vulkan", "Failed to get required extensions: {}", e);
                    Error::InitializationFailed(format!("Failed to get required extensions: {}", e))
                })?
                .to_vec();
            if config.enable_validation {
                extension_names.push(ash::ext::debug_utils::NAME.as_ptr());
            }

            let layer_names = if config.enable_validation {
                vec![c"VK_LAYER_KHRONOS_validation".as_ptr()]
            } else {
                vec![]
            };

            let create_info = vk::InstanceCreateInfo::default()
                .application_info(&app_info)
                .enabled_layer_names(&layer_names)
                .enabled_extension_names(&extension_names);

            let instance = entry.create_instance(&create_info, None)
                .map_err(|e| {
                    engine_error!("vgdemo::vulkan", "Failed to create Vulkan instance: {:?}", e);
                    Error::InitializationFailed(format!("Failed to create instance: {:?}", e))
                })?;

            let debug = if config.enable_validation {
                let debug_utils = ash::ext::debug_utils::Instance::new(&entry, &instance);

                crate::debug::init_debug_config(crate::debug::Config {
                    severity: config.validation_severity,
                    panic_on_error: config.panic_on_validation_error,
                    enable_stats: config.enable_validation_stats,
                });

                let debug_info = vk::DebugUtilsMessengerCreateInfoEXT::default()
                    .message_severity(crate::debug::severity_flags(config.validation_severity))
                    .message_type(
                        vk::DebugUtilsMessageTypeFlagsEXT::GENERAL
                            | vk::DebugUtilsMessageTypeFlagsEXT::VALIDATION
                            | vk::DebugUtilsMessageTypeFlagsEXT::PERFORMANCE,
                    )
                    .pfn_user_callback(Some(crate::debug::vulkan_debug_callback));

                let messenger = debug_utils.create_debug_utils_messenger(&debug_info, None)
                    .map_err(|e| {
                        engine_error!("vgdemo::vulkan", "Failed to create debug messenger: {:?}", e);
                        Error::InitializationFailed(format!("Failed to create debug messenger: {:?}", e))
                    })?;
                engine_info!("vgdemo::vulkan", "Validation layers enabled ({:?})", config.validation_severity);
                Some((debug_utils, messenger))
            } else {
                None
            };

            let window_handle = window.window_handle()
                .map_err(|e| {
                    engine_error!("vgdemo::vulkan", "Failed to get window handle: {}", e);
                    Error::InitializationFailed(format!("Failed to get window handle: {}", e))
                })?;
            let surface = ash_window::create_surface(
                &entry,
                &instance,
                display_handle.as_raw(),
                window_handle.as_raw(),
                None,
            )
            .map_err(|e| {
                engine_error!("vgdemo::vulkan", "Failed to create surface: {:?}", e);
                Error::InitializationFailed(format!("Failed to create surface: {:?}", e))
            })?;
            let surface_loader = ash::khr::surface::Instance::new(&entry, &instance);

            let (physical_device, graphics_family, present_family) =
                pick_physical_device(&instance, &surface_loader, surface)?;

            let queue_priorities = [1.0];
            let mut queue_create_infos = vec![
                vk::DeviceQueueCreateInfo::default()
                    .queue_family_index(graphics_family)
                    .queue_priorities(&queue_priorities),
            ];
            if present_family != graphics_family {
                queue_create_infos.push(
                    vk::DeviceQueueCreateInfo::default()
                        .queue_family_index(present_family)
                        .queue_priorities(&queue_priorities),
                );
            }

            let device_extension_names = [ash::khr::swapchain::NAME.as_ptr()];
            let mut vulkan13_features = vk::PhysicalDeviceVulkan13Features::default()
                .dynamic_rendering(true);

            let device_create_info = vk::DeviceCreateInfo::default()
                .queue_create_infos(&queue_create_infos)
                .enabled_extension_names(&device_extension_names)
                .push_next(&mut vulkan13_features);

            let device = instance.create_device(physical_device, &device_create_info, None)
                .map_err(|e| {
                    engine_error!("vgdemo::vulkan", "Failed to create logical device: {:?}", e);
                    Error::InitializationFailed(format!("Failed to create device: {:?}", e))
                })?;

            let graphics_queue = device.get_device_queue(graphics_family, 0);
            let present_queue = device.get_device_queue(present_family, 0);

            let allocator = Allocator::new(&AllocatorCreateDesc {
                instance: instance.clone(),
                device: device.clone(),
                physical_device,
                debug_settings: Default::default(),
                buffer_device_address: false,
                allocation_sizes: Default::default(),
            })
            .map_err(|e| {
                engine_error!("vgdemo::vulkan", "Failed to create GPU allocator: {:?}", e);
                Error::InitializationFailed(format!("Failed to create allocator: {:?}", e))
            })?;

            let limits = instance.get_physical_device_properties(physical_device).limits;
            if limits.min_uniform_buffer_offset_alignment > UNIFORM_BUF_ALIGNMENT {
                engine_warn!("vgdemo::vulkan",
                    "GPU requires {}-byte uniform buffer alignment, engine aligns to {}",
                    limits.min_uniform_buffer_offset_alignment, UNIFORM_BUF_ALIGNMENT);
            }

            let stencil_format = pick_stencil_format(&instance, physical_device)?;

            let ctx = Arc::new(GpuContext::new(
                entry,
                instance,
                physical_device,
                device,
                allocator,
                (graphics_queue, graphics_family),
                present_queue,
                debug,
            ));

            let presenter = Presenter::new(ctx.clone(), surface, surface_loader)?;
            let image_profile = probe_image_profile(&ctx.device, stencil_format)?;
            let pipelines = PipelineCache::new(ctx.clone())?;
            let samplers = SamplerCache::new(ctx.clone());
            let mut immediate = FrameContext::new(ctx.clone())?;
            let (placeholder, placeholder_memory) =
                create_placeholder(&ctx, &mut immediate, stencil_format, image_profile)?;

            engine_info!("vgdemo::vulkan", "Vulkan backend ready (stencil format {:?}, image alignment {:#x})",
                stencil_format, image_profile.alignment);

            Ok(Self {
                swapchains: SlotMap::with_key(),
                images: SlotMap::with_key(),
                shaders: SlotMap::with_key(),
                blocks: SlotMap::with_key(),
                immediate,
                pipelines,
                samplers,
                placeholder,
                _placeholder_memory: placeholder_memory,
                presenter,
                queue_state: QueueState::default(),
                active_frame: None,
                layouts: FxHashMap::default(),
                stencil_format,
                image_profile,
                ctx,
            })
        }
    }

    fn device_wait_idle(&self) -> Result<()> {
        unsafe {
            self.ctx.device.device_wait_idle()
                .map_err(|e| engine_err!("vgdemo::vulkan", "Failed to wait idle: {:?}", e))
        }
    }
}

/// Pick the first Vulkan 1.3 GPU with a graphics queue and a queue that can present to `surface`
///
/// Returns the device and its graphics and present queue families.
unsafe fn pick_physical_device(
    instance: &ash::Instance,
    surface_loader: &ash::khr::surface::Instance,
    surface: vk::SurfaceKHR,
) -> Result<(vk::PhysicalDevice, u32, u32)> {
    let physical_devices = instance.enumerate_physical_devices()
        .map_err(|e| {
            engine_error!("vgdemo::vulkan", "Failed to enumerate physical devices: {:?}", e);
            Error::InitializationFailed(format!("Failed to enumerate physical devices: {:?}", e))
        })?;

    for physical_device in physical_devices {
        let properties = instance.get_physical_device_properties(physical_device);
        let name = properties.device_name_as_c_str()
            .map(|name| name.to_string_lossy().into_owned())
            .unwrap_or_default();
        if properties.api_version < vk::API_VERSION_1_3 {
            engine_debug!("vgdemo::vulkan", "Skipping {}: Vulkan 1.3 not supported", name);
            continue;
        }

        let queue_families = instance.get_physical_device_queue_family_properties(physical_device);
        let supports_present = |family: u32| {
            surface_loader
                .get_physical_device_surface_support(physical_device, family, surface)
                .unwrap_or(false)
        };

        let Some(graphics_family) = (0..queue_families.len() as u32)
            .find(|&i| queue_families[i as usize].queue_flags.contains(vk::QueueFlags::GRAPHICS))
        else {
            engine_debug!("vgdemo::vulkan", "Skipping {}: no graphics queue", name);
            continue;
        };
        let present_family = if supports_present(graphics_family) {
            Some(graphics_family)
        } else {
            (0..queue_families.len() as u32).find(|&i| supports_present(i))
        };
        let Some(present_family) = present_family else {
            engine_debug!("vgdemo::vulkan", "Skipping {}: cannot present to the window", name);
            continue;
        };

        engine_info!("vgdemo::vulkan", "Using GPU: {} (graphics queue {}, present queue {})",
            name, graphics_family, present_family);
        return Ok((physical_device, graphics_family, present_family));
    }

    engine_error!("vgdemo::vulkan", "No Vulkan 1.3 GPU can render to this window");
    Err(Error::InitializationFailed("No suitable Vulkan 1.3 GPU found".to_string()))
}

/// First stencil-capable format usable as an attachment
unsafe fn pick_stencil_format(instance: &ash::Instance, physical_device: vk::PhysicalDevice) -> Result<vk::Format> {
    for format in STENCIL_FORMAT_CANDIDATES {
        let properties = instance.get_physical_device_format_properties(physical_device, format);
        if properties.optimal_tiling_features.contains(vk::FormatFeatureFlags::DEPTH_STENCIL_ATTACHMENT) {
            if format != vk::Format::S8_UINT {
                engine_info!("vgdemo::vulkan", "S8_UINT attachments unsupported, stencil images use {:?}", format);
            }
            return Ok(format);
        }
    }
    engine_error!("vgdemo::vulkan", "GPU supports no stencil attachment format");
    Err(Error::InitializationFailed("No stencil attachment format available".to_string()))
}

/// Memory requirements shared by every kind of image the engine creates
///
/// Image blocks are allocated before the images placed in them are known, so
/// they use memory types and an alignment valid for all of them.
fn probe_image_profile(device: &ash::Device, stencil_format: vk::Format) -> Result<ImageMemoryProfile> {
    let probes = [
        ImageLayoutDesc {
            flags: ImageFlags::USAGE_RENDER | ImageFlags::USAGE_PRESENT,
            format: ImageFormat::RGBA8Unorm,
            width: 64,
            height: 64,
        },
        ImageLayoutDesc {
            flags: ImageFlags::empty(),
            format: ImageFormat::R8Unorm,
            width: 64,
            height: 64,
        },
        ImageLayoutDesc {
            flags: ImageFlags::USAGE_RENDER,
            format: ImageFormat::S8,
            width: 64,
            height: 64,
        },
    ];

    let mut profile = ImageMemoryProfile {
        alignment: 1,
        memory_type_bits: u32::MAX,
    };
    for desc in &probes {
        let requirements = probe_requirements(device, &image_create_info(desc, stencil_format))?;
        profile.alignment = profile.alignment.max(requirements.alignment);
        profile.memory_type_bits &= requirements.memory_type_bits;
    }
    if profile.memory_type_bits == 0 {
        return Err(Error::InitializationFailed(
            "no memory type can hold every image format".to_string(),
        ));
    }
    Ok(profile)
}

/// Create the 1x1 placeholder texture, cleared to transparent black
fn create_placeholder(
    ctx: &Arc<GpuContext>,
    immediate: &mut FrameContext,
    stencil_format: vk::Format,
    profile: ImageMemoryProfile,
) -> Result<(VulkanImage, MemBlock)> {
    let desc = ImageLayoutDesc {
        flags: ImageFlags::empty(),
        format: ImageFormat::RGBA8Unorm,
        width: 1,
        height: 1,
    };
    let info = image_create_info(&desc, stencil_format);
    let requirements = probe_requirements(&ctx.device, &info)?;
    let memory = MemBlock::new_image_block(ctx.clone(), MemBlockFlags::IMAGE, requirements.size, profile)?;
    let (device_memory, base) = memory.memory()?;
    let mut image = VulkanImage::new(ctx.clone(), &info, device_memory, base)?;

    immediate.begin()?;
    let cb = immediate.allocate_command_buffer()?;
    image.transition(cb, vk::ImageLayout::TRANSFER_DST_OPTIMAL);
    unsafe {
        ctx.device.cmd_clear_color_image(
            cb,
            image.image,
            vk::ImageLayout::TRANSFER_DST_OPTIMAL,
            &vk::ClearColorValue { float32: [0.0; 4] },
            &[full_range(vk::ImageAspectFlags::COLOR)],
        );
    }
    image.transition(cb, vk::ImageLayout::SHADER_READ_ONLY_OPTIMAL);
    immediate.submit(cb, None, &[], true)?;
    immediate.wait()?;

    Ok((image, memory))
}

impl GraphicsBackend for VulkanBackend {
    fn name(&self) -> &str {
        "vulkan"
    }

    fn create_mem_block(&mut self, flags: MemBlockFlags, size: u64) -> Result<MemBlockKey> {
        if size == 0 {
            return Err(Error::InvalidResource("memory block size is zero".to_string()));
        }
        let block = if flags.contains(MemBlockFlags::IMAGE) {
            MemBlock::new_image_block(self.ctx.clone(), flags, size, self.image_profile)?
        } else {
            MemBlock::new_buffer_block(self.ctx.clone(), flags, size)?
        };
        let key = self.blocks.insert(block);
        engine_trace!("vgdemo::vulkan", "Created memory block {:?} ({:?}, {:#x} bytes)", key, flags, size);
        Ok(key)
    }

    fn destroy_mem_block(&mut self, block: MemBlockKey) -> Result<()> {
        if !self.blocks.contains_key(block) {
            return Err(Error::InvalidResource("unknown memory block".to_string()));
        }
        self.device_wait_idle()?;
        self.blocks.remove(block);
        self.queue_state.forget_block(block);
        engine_trace!("vgdemo::vulkan", "Destroyed memory block {:?}", block);
        Ok(())
    }

    fn write_mem_block(&mut self, block: MemBlockKey, offset: u64, data: &[u8]) -> Result<()> {
        self.blocks
            .get_mut(block)
            .ok_or_else(|| Error::InvalidResource("unknown memory block".to_string()))?
            .write(offset, data)
    }

    fn image_layout(&mut self, desc: &ImageLayoutDesc) -> Result<ImageLayout> {
        if let Some(layout) = self.layouts.get(desc) {
            return Ok(*layout);
        }

        let info = image_create_info(desc, self.stencil_format);
        let requirements = probe_requirements(&self.ctx.device, &info)?;
        if requirements.memory_type_bits & self.image_profile.memory_type_bits == 0 {
            return Err(Error::InvalidResource(format!(
                "{:?} images cannot live in image memory blocks",
                desc.format
            )));
        }

        let layout = ImageLayout::new(*desc, requirements.size, requirements.alignment);
        self.layouts.insert(*desc, layout);
        Ok(layout)
    }

    fn create_image(&mut self, layout: &ImageLayout, block: MemBlockKey, offset: u64) -> Result<ImageKey> {
        let memory = self.blocks
            .get(block)
            .ok_or_else(|| Error::InvalidResource("unknown memory block".to_string()))?;
        if !memory.flags().contains(MemBlockFlags::IMAGE) {
            return Err(Error::InvalidResource("image memory block lacks the IMAGE flag".to_string()));
        }
        if offset % layout.alignment() != 0 || offset + layout.size() > memory.size() {
            return Err(Error::InvalidResource("image does not fit its memory range".to_string()));
        }

        let (device_memory, base) = memory.memory()?;
        let info = image_create_info(layout.desc(), self.stencil_format);
        let image = VulkanImage::new(self.ctx.clone(), &info, device_memory, base + offset)?;
        let key = self.images.insert(image);
        engine_trace!("vgdemo::vulkan", "Created {}x{} {:?} image {:?}",
            layout.width(), layout.height(), layout.format(), key);
        Ok(key)
    }

    fn destroy_image(&mut self, image: ImageKey) -> Result<()> {
        if !self.images.contains_key(image) {
            return Err(Error::InvalidResource("unknown image".to_string()));
        }
        self.device_wait_idle()?;
        self.images.remove(image);
        self.queue_state.forget_image(image);
        Ok(())
    }

    fn create_shader(&mut self, stage: ShaderStage, block: MemBlockKey, offset: u64, size: u64) -> Result<ShaderKey> {
        let code = self.blocks
            .get(block)
            .filter(|memory| memory.flags().contains(MemBlockFlags::CODE))
            .ok_or_else(|| Error::InvalidResource("shader code outside a code block".to_string()))?
            .read(offset, size)?;
        let shader = VulkanShader::new(self.ctx.clone(), stage, &code)?;
        let key = self.shaders.insert(shader);
        engine_debug!("vgdemo::vulkan", "Created {:?} shader {:?} ({} bytes)", stage, key, size);
        Ok(key)
    }

    fn destroy_shader(&mut self, shader: ShaderKey) -> Result<()> {
        if !self.shaders.contains_key(shader) {
            return Err(Error::InvalidResource("unknown shader".to_string()));
        }
        self.device_wait_idle()?;
        self.pipelines.evict_shader(shader);
        self.shaders.remove(shader);
        self.queue_state.forget_shader(shader);
        Ok(())
    }

    fn create_swapchain(&mut self, images: &[ImageKey]) -> Result<SwapchainKey> {
        if images.is_empty() {
            return Err(Error::InvalidResource("swapchain without images".to_string()));
        }
        if images.iter().any(|image| !self.images.contains_key(*image)) {
            return Err(Error::InvalidResource("swapchain over a destroyed image".to_string()));
        }
        let swapchain = VulkanSwapchain::new(&self.ctx, images)?;
        let key = self.swapchains.insert(swapchain);
        engine_debug!("vgdemo::vulkan", "Created swapchain {:?} with {} slots ({} pipelines cached)",
            key, images.len(), self.pipelines.len());
        Ok(key)
    }

    fn destroy_swapchain(&mut self, swapchain: SwapchainKey) -> Result<()> {
        if !self.swapchains.contains_key(swapchain) {
            return Err(Error::InvalidResource("unknown swapchain".to_string()));
        }
        self.device_wait_idle()?;
        self.swapchains.remove(swapchain);
        if matches!(self.active_frame, Some(frame) if frame.swapchain == swapchain) {
            self.active_frame = None;
        }
        Ok(())
    }

    fn acquire_image(&mut self, swapchain: SwapchainKey) -> Result<usize> {
        if let Some(previous) = self.active_frame {
            // The window image is already acquired; hand it back before taking another
            engine_warn!("vgdemo::vulkan", "Acquire while slot {} is still in flight, presenting it first",
                previous.slot);
            self.present_image(previous.swapchain, previous.slot)?;
        }

        let chain = self.swapchains
            .get_mut(swapchain)
            .ok_or_else(|| Error::InvalidResource("unknown swapchain".to_string()))?;
        let slot = chain.next_slot;
        chain.next_slot = (slot + 1) % chain.slots.len();

        let frame = &mut chain.slots[slot];
        frame.begin()?;

        let fallback = self.images
            .get(chain.images[slot])
            .map(|image| image.extent)
            .ok_or_else(|| Error::InvalidResource("swapchain framebuffer was destroyed".to_string()))?;
        let image_index = self.presenter.acquire(frame.image_available, fallback)?;

        self.active_frame = Some(ActiveFrame {
            swapchain,
            slot,
            image_index,
        });
        Ok(slot)
    }

    fn submit_commands(&mut self, commands: &[Command]) -> Result<()> {
        if commands.is_empty() {
            return Ok(());
        }

        let Self {
            ctx,
            blocks,
            images,
            shaders,
            pipelines,
            samplers,
            placeholder,
            queue_state,
            swapchains,
            immediate,
            active_frame,
            ..
        } = self;

        let in_frame = active_frame.is_some();
        let frame = match *active_frame {
            Some(active) => swapchains
                .get_mut(active.swapchain)
                .and_then(|chain| chain.slots.get_mut(active.slot))
                .ok_or_else(|| engine_err!("vgdemo::vulkan", "Active frame refers to a destroyed swapchain"))?,
            None => {
                immediate.begin()?;
                immediate
            }
        };

        let cb = frame.allocate_command_buffer()?;
        let mut recorder = CommandRecorder::new(
            &ctx.device,
            cb,
            queue_state,
            Resources {
                blocks,
                images,
                shaders,
                pipelines,
                samplers,
                descriptors: &mut frame.descriptors,
                placeholder,
            },
        );
        // Commands recorded before a failure still run, so tracked image layouts stay true
        let recorded = recorder.record(commands);
        recorder.finish();

        frame.submit(cb, None, &[], !in_frame)?;
        if !in_frame {
            frame.wait()?;
        }
        recorded
    }

    fn present_image(&mut self, swapchain: SwapchainKey, slot: usize) -> Result<()> {
        let active = match self.active_frame {
            Some(active) if active.swapchain == swapchain && active.slot == slot => active,
            Some(active) => {
                return Err(Error::InvalidState(format!(
                    "present of slot {} while slot {} is acquired",
                    slot, active.slot
                )));
            }
            None => return Err(Error::InvalidState("present without an acquired image".to_string())),
        };
        self.active_frame = None;

        let chain = self.swapchains
            .get(swapchain)
            .ok_or_else(|| Error::InvalidResource("unknown swapchain".to_string()))?;
        let frame = &chain.slots[slot];
        let framebuffer = self.images
            .get_mut(chain.images[slot])
            .ok_or_else(|| Error::InvalidResource("swapchain framebuffer was destroyed".to_string()))?;

        let cb = frame.allocate_command_buffer()?;
        self.presenter.record_blit(cb, framebuffer, active.image_index)?;
        frame.submit(
            cb,
            Some((frame.image_available, vk::PipelineStageFlags::TRANSFER)),
            &[self.presenter.render_finished(active.image_index)],
            true,
        )?;

        self.presenter.present(active.image_index)
    }

    fn wait_idle(&mut self) -> Result<()> {
        self.device_wait_idle()
    }
}

impl Drop for VulkanBackend {
    fn drop(&mut self) {
        unsafe {
            self.ctx.device.device_wait_idle().ok();
        }

        // Objects before the memory they are bound to
        self.swapchains.clear();
        self.images.clear();
        self.shaders.clear();
        self.blocks.clear();

        engine_debug!("vgdemo::vulkan", "Vulkan backend destroyed");
    }
}
