/// Image layouts and pool-backed images

use crate::device::device::Device;
use crate::device::mem_pool::{MemHandle, MemPool};
use crate::device::types::{ImageFlags, ImageFormat, ImageKey, ImageLayout, ImageLayoutDesc};
use crate::error::{Error, Result};

/// Builder computing an `ImageLayout` through the backend
#[derive(Debug)]
pub struct ImageLayoutMaker {
    device: Device,
    desc: ImageLayoutDesc,
}

impl ImageLayoutMaker {
    /// Start from an empty RGBA8 layout without usage flags
    pub fn new(device: &Device) -> Self {
        Self {
            device: device.clone(),
            desc: ImageLayoutDesc {
                flags: ImageFlags::empty(),
                format: ImageFormat::RGBA8Unorm,
                width: 0,
                height: 0,
            },
        }
    }

    pub fn set_flags(mut self, flags: ImageFlags) -> Self {
        self.desc.flags = flags;
        self
    }

    pub fn set_format(mut self, format: ImageFormat) -> Self {
        self.desc.format = format;
        self
    }

    pub fn set_dimensions(mut self, width: u32, height: u32) -> Self {
        self.desc.width = width;
        self.desc.height = height;
        self
    }

    /// Ask the backend for the memory size and alignment of the image
    pub fn initialize(self) -> Result<ImageLayout> {
        if self.desc.width == 0 || self.desc.height == 0 {
            return self.device.check(
                "ImageLayout::initialize",
                Err(Error::InvalidResource(format!(
                    "image dimensions {}x{} are empty",
                    self.desc.width, self.desc.height
                ))),
            );
        }
        let desc = self.desc;
        self.device
            .call("ImageLayout::initialize", |backend| backend.image_layout(&desc))
    }
}

/// GPU image bound to memory carved from an image pool
///
/// Dropping the image destroys the backend image, then frees its memory.
#[derive(Debug)]
pub struct Image {
    device: Device,
    key: ImageKey,
    layout: ImageLayout,
    memory: Option<MemHandle>,
}

impl Image {
    /// Allocate memory for `layout` from `pool` and create the image in it
    ///
    /// # Arguments
    ///
    /// * `device` - Device owning the image
    /// * `layout` - Layout computed by `ImageLayoutMaker`
    /// * `pool` - Pool the backing memory is carved from
    pub fn create(device: &Device, layout: &ImageLayout, pool: &MemPool) -> Result<Self> {
        let memory = pool.allocate(layout.size(), layout.alignment())?;
        let (block, offset) = (memory.block(), memory.offset());
        let layout = *layout;
        let key = device.call("Image::create", |backend| {
            backend.create_image(&layout, block, offset)
        })?;
        Ok(Self {
            device: device.clone(),
            key,
            layout,
            memory: Some(memory),
        })
    }

    pub fn key(&self) -> ImageKey {
        self.key
    }

    pub fn layout(&self) -> &ImageLayout {
        &self.layout
    }

    pub fn width(&self) -> u32 {
        self.layout.width()
    }

    pub fn height(&self) -> u32 {
        self.layout.height()
    }

    pub fn format(&self) -> ImageFormat {
        self.layout.format()
    }

    /// Memory backing the image
    pub fn memory(&self) -> Option<&MemHandle> {
        self.memory.as_ref()
    }
}

impl Drop for Image {
    fn drop(&mut self) {
        let key = self.key;
        // Failures are already reported through the device error sink
        let _ = self.device.call("Image::destroy", |backend| backend.destroy_image(key));
        if let Some(memory) = self.memory.take() {
            memory.destroy();
        }
    }
}
