/// Demo content drawn by the sample

use crate::error::Result;
use crate::vg::Context;

/// Content rendered through the vector-graphics context every frame
///
/// A failed `load` is logged by the sample and rendering goes on, so
/// `render` must cope with whatever `load` left behind.
pub trait DemoContent {
    /// Create images and other context resources
    fn load(&mut self, vg: &mut Context) -> Result<()>;

    /// Draw one frame into the `(x, y, width, height)` design rectangle
    ///
    /// # Arguments
    ///
    /// * `t` - Seconds since start
    /// * `blowup` - Exaggerated rendering requested by the user
    #[allow(clippy::too_many_arguments)]
    fn render(&mut self, vg: &mut Context, x: f32, y: f32, width: f32, height: f32, t: f32, blowup: bool);

    /// Release what `load` created
    fn free(&mut self, vg: &mut Context);
}
