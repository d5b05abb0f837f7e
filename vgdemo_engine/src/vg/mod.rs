/// Vector-graphics module - path building, paints and tessellation
///
/// `Context` records paths and turns fills and strokes into a `FrameBatch`
/// of vertices, uniforms and calls. A `RenderBackend` owns the textures and
/// draws the batch.

pub mod types;
pub mod color;
pub mod paint;
pub mod batch;
pub mod backend;
mod path;
pub mod context;

pub use types::*;
pub use color::Color;
pub use paint::Paint;
pub use batch::*;
pub use backend::RenderBackend;
pub use context::Context;

#[cfg(test)]
#[path = "vg_tests.rs"]
mod tests;
