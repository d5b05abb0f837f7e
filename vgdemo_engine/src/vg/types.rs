/// Shared vector-graphics types: context flags, image flags and ids, winding

use bitflags::bitflags;

bitflags! {
    /// Flags passed when creating a context and its renderer
    #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
    pub struct CreateFlags: u32 {
        /// Geometry based anti-aliasing (fringe strips + AA fragment shader)
        const ANTIALIAS = 1 << 0;
        /// Draw strokes through the stencil buffer so overlaps blend once
        const STENCIL_STROKES = 1 << 1;
        /// Extra validation in the renderer
        const DEBUG = 1 << 2;
    }
}

bitflags! {
    /// Per-image sampling and upload flags
    #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
    pub struct ImageFlags: u32 {
        /// Sample with mip filtering
        const GENERATE_MIPMAPS = 1 << 0;
        const REPEAT_X = 1 << 1;
        const REPEAT_Y = 1 << 2;
        /// Flip the image vertically when used in a pattern
        const FLIP_Y = 1 << 3;
        /// Pixel data is already premultiplied by alpha
        const PREMULTIPLIED = 1 << 4;
        /// Nearest filtering
        const NEAREST = 1 << 5;
    }
}

/// Identifier of a texture owned by the render backend (never 0)
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct ImageId(pub u32);

impl ImageId {
    pub fn raw(self) -> u32 {
        self.0
    }
}

/// Pixel format of a texture
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum TextureKind {
    /// 8-bit single channel (coverage/alpha)
    Alpha,
    /// 8-bit RGBA
    Rgba,
}

impl TextureKind {
    pub fn bytes_per_pixel(self) -> usize {
        match self {
            TextureKind::Alpha => 1,
            TextureKind::Rgba => 4,
        }
    }
}

/// Description of a live texture as reported by the backend
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TextureInfo {
    pub kind: TextureKind,
    pub width: u32,
    pub height: u32,
    pub flags: ImageFlags,
}

/// Path orientation
///
/// Solid shapes are counter-clockwise, holes clockwise. `arc` also uses it
/// as the sweep direction.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Winding {
    Ccw,
    Cw,
}

impl Winding {
    pub const SOLID: Winding = Winding::Ccw;
    pub const HOLE: Winding = Winding::Cw;
}

/// End of an open stroked path
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub enum LineCap {
    #[default]
    Butt,
    Square,
}

/// Corner of a stroked path
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub enum LineJoin {
    #[default]
    Miter,
    Bevel,
}
