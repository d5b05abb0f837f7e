/// Swapchain - rotating set of framebuffers exposed to the display

use crate::device::device::Device;
use crate::device::image::Image;
use crate::device::types::SwapchainKey;
use crate::error::{Error, Result};

/// Builder for `Swapchain`
pub struct SwapchainMaker<'a> {
    device: &'a Device,
    images: Vec<&'a Image>,
}

impl<'a> SwapchainMaker<'a> {
    /// # Arguments
    ///
    /// * `device` - Device owning the swapchain
    /// * `images` - Framebuffer images, one per slot, in slot order
    pub fn new(device: &'a Device, images: impl IntoIterator<Item = &'a Image>) -> Self {
        Self {
            device,
            images: images.into_iter().collect(),
        }
    }

    pub fn create(self) -> Result<Swapchain> {
        if self.images.is_empty() {
            return self.device.check(
                "Swapchain::create",
                Err(Error::InvalidResource("swapchain needs at least one image".to_string())),
            );
        }
        let keys: Vec<_> = self.images.iter().map(|image| image.key()).collect();
        let key = self
            .device
            .call("Swapchain::create", |backend| backend.create_swapchain(&keys))?;
        Ok(Swapchain {
            device: self.device.clone(),
            key,
            image_count: keys.len(),
        })
    }
}

/// Swapchain over the framebuffer images; destroyed on drop
#[derive(Debug)]
pub struct Swapchain {
    device: Device,
    key: SwapchainKey,
    image_count: usize,
}

impl Swapchain {
    pub fn key(&self) -> SwapchainKey {
        self.key
    }

    /// Number of slots
    pub fn image_count(&self) -> usize {
        self.image_count
    }

    /// Destroy the swapchain now
    pub fn destroy(self) {
        drop(self);
    }
}

impl Drop for Swapchain {
    fn drop(&mut self) {
        let key = self.key;
        let _ = self
            .device
            .call("Swapchain::destroy", |backend| backend.destroy_swapchain(key));
    }
}
