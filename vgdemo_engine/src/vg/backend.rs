/// Drawing-backend contract of the vector-graphics context

use crate::error::Result;
use crate::vg::batch::FrameBatch;
use crate::vg::types::{CreateFlags, ImageFlags, ImageId, TextureInfo, TextureKind};

/// GPU side of a vector-graphics context
///
/// The context tessellates and batches; a backend owns textures and turns a
/// `FrameBatch` into GPU work.
pub trait RenderBackend {
    /// Create GPU objects (shaders, command memory) for the given flags
    fn render_create(&mut self, flags: CreateFlags) -> Result<()>;

    /// Create a texture, optionally initialized from tightly packed rows
    ///
    /// Missing data leaves the texture zeroed.
    fn create_texture(
        &mut self,
        kind: TextureKind,
        width: u32,
        height: u32,
        flags: ImageFlags,
        data: Option<&[u8]>,
    ) -> Result<ImageId>;

    /// Delete a texture, returning false for an unknown id
    fn delete_texture(&mut self, image: ImageId) -> bool;

    /// Replace a rectangle of a texture
    ///
    /// `data` holds the whole image in tightly packed rows. Returns false for
    /// an unknown id.
    fn update_texture(&mut self, image: ImageId, x: u32, y: u32, width: u32, height: u32, data: &[u8]) -> Result<bool>;

    /// Kind, size and flags of a live texture
    fn texture_info(&self, image: ImageId) -> Option<TextureInfo>;

    /// Size of a live texture
    fn texture_size(&self, image: ImageId) -> Option<(u32, u32)> {
        self.texture_info(image).map(|info| (info.width, info.height))
    }

    /// Set the size of the frame about to be recorded
    fn render_viewport(&mut self, width: f32, height: f32, device_pixel_ratio: f32);

    /// Drop the frame without drawing it
    fn render_cancel(&mut self);

    /// Draw a finished frame
    fn render_flush(&mut self, batch: &FrameBatch) -> Result<()>;
}
