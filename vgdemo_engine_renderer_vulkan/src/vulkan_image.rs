/// VulkanImage - image bound into an engine memory block, with its view
///
/// The current layout is tracked at record time. Commands are recorded and
/// submitted in queue order, so the tracked layout is the one the image will
/// be in when the next recorded command executes.

use ash::vk;
use std::sync::Arc;
use vgdemo_engine::device::ImageLayoutDesc;
use vgdemo_engine::engine_err;
use vgdemo_engine::vgdemo::Result;

use crate::vulkan_context::GpuContext;
use crate::vulkan_format::{aspect_mask, image_format_to_vk, image_usage_to_vk};

pub(crate) struct VulkanImage {
    ctx: Arc<GpuContext>,
    pub image: vk::Image,
    pub view: vk::ImageView,
    pub format: vk::Format,
    pub aspect: vk::ImageAspectFlags,
    pub extent: vk::Extent2D,
    /// Layout after the last recorded command touching the image
    pub layout: vk::ImageLayout,
}

/// Create info shared by layout probes and real images
pub(crate) fn image_create_info(desc: &ImageLayoutDesc, stencil_format: vk::Format) -> vk::ImageCreateInfo<'static> {
    vk::ImageCreateInfo::default()
        .image_type(vk::ImageType::TYPE_2D)
        .format(image_format_to_vk(desc.format, stencil_format))
        .extent(vk::Extent3D {
            width: desc.width,
            height: desc.height,
            depth: 1,
        })
        .mip_levels(1)
        .array_layers(1)
        .samples(vk::SampleCountFlags::TYPE_1)
        .tiling(vk::ImageTiling::OPTIMAL)
        .usage(image_usage_to_vk(desc.flags, desc.format))
        .sharing_mode(vk::SharingMode::EXCLUSIVE)
        .initial_layout(vk::ImageLayout::UNDEFINED)
}

/// Memory requirements of an image, measured on a throwaway `VkImage`
pub(crate) fn probe_requirements(device: &ash::Device, info: &vk::ImageCreateInfo) -> Result<vk::MemoryRequirements> {
    unsafe {
        let probe = device.create_image(info, None)
            .map_err(|e| engine_err!("vgdemo::vulkan", "Failed to create layout probe image: {:?}", e))?;
        let requirements = device.get_image_memory_requirements(probe);
        device.destroy_image(probe, None);
        Ok(requirements)
    }
}

impl VulkanImage {
    /// Create an image and bind it at `offset` inside `memory`
    ///
    /// # Arguments
    ///
    /// * `ctx` - Shared GPU context
    /// * `info` - Create info from `image_create_info`
    /// * `memory` - Device memory of the block
    /// * `offset` - Absolute offset of the image inside `memory`
    pub fn new(
        ctx: Arc<GpuContext>,
        info: &vk::ImageCreateInfo,
        memory: vk::DeviceMemory,
        offset: u64,
    ) -> Result<Self> {
        unsafe {
            let image = ctx.device.create_image(info, None)
                .map_err(|e| engine_err!("vgdemo::vulkan", "Failed to create image: {:?}", e))?;

            if let Err(e) = ctx.device.bind_image_memory(image, memory, offset) {
                ctx.device.destroy_image(image, None);
                return Err(engine_err!("vgdemo::vulkan", "Failed to bind image memory: {:?}", e));
            }

            let aspect = aspect_mask(info.format);
            let view_info = vk::ImageViewCreateInfo::default()
                .image(image)
                .view_type(vk::ImageViewType::TYPE_2D)
                .format(info.format)
                .components(vk::ComponentMapping {
                    r: vk::ComponentSwizzle::IDENTITY,
                    g: vk::ComponentSwizzle::IDENTITY,
                    b: vk::ComponentSwizzle::IDENTITY,
                    a: vk::ComponentSwizzle::IDENTITY,
                })
                .subresource_range(full_range(aspect));

            let view = match ctx.device.create_image_view(&view_info, None) {
                Ok(view) => view,
                Err(e) => {
                    ctx.device.destroy_image(image, None);
                    return Err(engine_err!("vgdemo::vulkan", "Failed to create image view: {:?}", e));
                }
            };

            Ok(Self {
                ctx,
                image,
                view,
                format: info.format,
                aspect,
                extent: vk::Extent2D {
                    width: info.extent.width,
                    height: info.extent.height,
                },
                layout: vk::ImageLayout::UNDEFINED,
            })
        }
    }

    /// Record a layout transition, if the image is not already in `new_layout`
    pub fn transition(&mut self, cb: vk::CommandBuffer, new_layout: vk::ImageLayout) {
        if self.layout == new_layout {
            return;
        }
        let barrier = vk::ImageMemoryBarrier::default()
            .old_layout(self.layout)
            .new_layout(new_layout)
            .src_queue_family_index(vk::QUEUE_FAMILY_IGNORED)
            .dst_queue_family_index(vk::QUEUE_FAMILY_IGNORED)
            .image(self.image)
            .subresource_range(full_range(self.aspect))
            .src_access_mask(vk::AccessFlags::MEMORY_WRITE)
            .dst_access_mask(vk::AccessFlags::MEMORY_READ | vk::AccessFlags::MEMORY_WRITE);

        unsafe {
            self.ctx.device.cmd_pipeline_barrier(
                cb,
                vk::PipelineStageFlags::ALL_COMMANDS,
                vk::PipelineStageFlags::ALL_COMMANDS,
                vk::DependencyFlags::empty(),
                &[], &[], &[barrier],
            );
        }
        self.layout = new_layout;
    }
}

/// Subresource range covering the single mip and layer of an image
pub(crate) fn full_range(aspect: vk::ImageAspectFlags) -> vk::ImageSubresourceRange {
    vk::ImageSubresourceRange {
        aspect_mask: aspect,
        base_mip_level: 0,
        level_count: 1,
        base_array_layer: 0,
        layer_count: 1,
    }
}

impl Drop for VulkanImage {
    fn drop(&mut self) {
        unsafe {
            self.ctx.device.destroy_image_view(self.view, None);
            self.ctx.device.destroy_image(self.image, None);
        }
    }
}
