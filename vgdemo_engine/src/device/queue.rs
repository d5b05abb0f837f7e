/// Queue - ordered command submission channel

use crate::device::command::CmdList;
use crate::device::device::Device;
use crate::device::swapchain::Swapchain;
use crate::error::{Error, Result};

/// Graphics queue bound to a device
#[derive(Debug, Clone)]
pub struct Queue {
    device: Device,
}

impl Queue {
    pub fn new(device: &Device) -> Self {
        Self { device: device.clone() }
    }

    pub fn device(&self) -> &Device {
        &self.device
    }

    /// Block until a swapchain slot is free and return its index
    pub fn acquire_image(&self, swapchain: &Swapchain) -> Result<usize> {
        let key = swapchain.key();
        self.device.call("Queue::acquire_image", |backend| backend.acquire_image(key))
    }

    /// Submit a finished command list
    ///
    /// Lists whose command buffer was cleared after they were finished are
    /// rejected with `InvalidState`.
    pub fn submit_commands(&self, list: &CmdList) -> Result<()> {
        if !list.is_valid() {
            return self.device.check(
                "Queue::submit_commands",
                Err(Error::InvalidState(
                    "command list replayed after its command memory was cleared".to_string(),
                )),
            );
        }
        self.device.call("Queue::submit_commands", |backend| {
            backend.submit_commands(list.commands())
        })
    }

    /// Present the framebuffer of `slot`
    pub fn present_image(&self, swapchain: &Swapchain, slot: usize) -> Result<()> {
        let key = swapchain.key();
        self.device.call("Queue::present_image", |backend| backend.present_image(key, slot))
    }

    /// Block until every submitted command has executed
    pub fn wait_idle(&self) -> Result<()> {
        self.device.call("Queue::wait_idle", |backend| backend.wait_idle())
    }
}
