/// Fixed-function state recorded into command buffers
///
/// Defaults describe a render target made of one color image and a stencil-only
/// depth image: back-face culling with counter-clockwise front faces, blending
/// off, all color channels written, depth and stencil tests off.

use bitflags::bitflags;

/// Viewport rectangle with depth range
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Viewport {
    pub x: f32,
    pub y: f32,
    pub width: f32,
    pub height: f32,
    pub near: f32,
    pub far: f32,
}

/// Scissor rectangle in framebuffer pixels
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct Scissor {
    pub x: u32,
    pub y: u32,
    pub width: u32,
    pub height: u32,
}

bitflags! {
    /// Color channel mask
    #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
    pub struct ColorMask: u8 {
        const R = 1 << 0;
        const G = 1 << 1;
        const B = 1 << 2;
        const A = 1 << 3;
        const RGBA = Self::R.bits() | Self::G.bits() | Self::B.bits() | Self::A.bits();
    }
}

/// Polygon face selector
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Face {
    None,
    Front,
    Back,
    FrontAndBack,
}

/// Winding that counts as front-facing
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum FrontFace {
    CounterClockwise,
    Clockwise,
}

/// Primitive assembly mode
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Primitive {
    Triangles,
    TriangleStrip,
    TriangleFan,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct RasterizerState {
    pub cull_mode: Face,
    pub front_face: FrontFace,
}

impl Default for RasterizerState {
    fn default() -> Self {
        Self {
            cull_mode: Face::Back,
            front_face: FrontFace::CounterClockwise,
        }
    }
}

impl RasterizerState {
    pub fn with_cull_mode(mut self, cull_mode: Face) -> Self {
        self.cull_mode = cull_mode;
        self
    }
}

/// Per-target blend enable
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub struct ColorState {
    pub blend_enable: bool,
}

impl ColorState {
    pub fn with_blend_enable(mut self, enable: bool) -> Self {
        self.blend_enable = enable;
        self
    }
}

/// Per-target color write mask
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct ColorWriteState {
    pub mask: ColorMask,
}

impl Default for ColorWriteState {
    fn default() -> Self {
        Self { mask: ColorMask::RGBA }
    }
}

impl ColorWriteState {
    pub fn with_mask(mut self, mask: ColorMask) -> Self {
        self.mask = mask;
        self
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum BlendFactor {
    Zero,
    One,
    SrcColor,
    OneMinusSrcColor,
    DstColor,
    OneMinusDstColor,
    SrcAlpha,
    OneMinusSrcAlpha,
    DstAlpha,
    OneMinusDstAlpha,
    SrcAlphaSaturate,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum BlendOp {
    Add,
    Subtract,
    ReverseSubtract,
    Min,
    Max,
}

/// Blend equation of one color target
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct BlendState {
    pub src_color: BlendFactor,
    pub dst_color: BlendFactor,
    pub color_op: BlendOp,
    pub src_alpha: BlendFactor,
    pub dst_alpha: BlendFactor,
    pub alpha_op: BlendOp,
}

impl Default for BlendState {
    fn default() -> Self {
        Self {
            src_color: BlendFactor::SrcAlpha,
            dst_color: BlendFactor::OneMinusSrcAlpha,
            color_op: BlendOp::Add,
            src_alpha: BlendFactor::One,
            dst_alpha: BlendFactor::Zero,
            alpha_op: BlendOp::Add,
        }
    }
}

impl BlendState {
    /// Set the four blend factors, keeping additive blend ops
    pub fn with_factors(
        mut self,
        src_color: BlendFactor,
        dst_color: BlendFactor,
        src_alpha: BlendFactor,
        dst_alpha: BlendFactor,
    ) -> Self {
        self.src_color = src_color;
        self.dst_color = dst_color;
        self.src_alpha = src_alpha;
        self.dst_alpha = dst_alpha;
        self
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum CompareOp {
    Never,
    Less,
    Equal,
    LessOrEqual,
    Greater,
    NotEqual,
    GreaterOrEqual,
    Always,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum StencilOp {
    Keep,
    Zero,
    Replace,
    IncrementAndClamp,
    DecrementAndClamp,
    Invert,
    IncrementAndWrap,
    DecrementAndWrap,
}

/// Stencil operations for one face
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct StencilFaceState {
    pub fail_op: StencilOp,
    pub pass_op: StencilOp,
    pub depth_fail_op: StencilOp,
    pub compare_op: CompareOp,
}

impl Default for StencilFaceState {
    fn default() -> Self {
        Self {
            fail_op: StencilOp::Keep,
            pass_op: StencilOp::Replace,
            depth_fail_op: StencilOp::Keep,
            compare_op: CompareOp::Always,
        }
    }
}

impl StencilFaceState {
    pub fn new(compare_op: CompareOp, fail_op: StencilOp, depth_fail_op: StencilOp, pass_op: StencilOp) -> Self {
        Self { fail_op, pass_op, depth_fail_op, compare_op }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct DepthStencilState {
    pub depth_test_enable: bool,
    pub depth_write_enable: bool,
    pub depth_compare_op: CompareOp,
    pub stencil_test_enable: bool,
    pub front: StencilFaceState,
    pub back: StencilFaceState,
}

impl Default for DepthStencilState {
    fn default() -> Self {
        Self {
            depth_test_enable: false,
            depth_write_enable: false,
            depth_compare_op: CompareOp::Less,
            stencil_test_enable: false,
            front: StencilFaceState::default(),
            back: StencilFaceState::default(),
        }
    }
}

impl DepthStencilState {
    pub fn with_stencil_test(mut self, enable: bool) -> Self {
        self.stencil_test_enable = enable;
        self
    }

    pub fn with_front(mut self, front: StencilFaceState) -> Self {
        self.front = front;
        self
    }

    pub fn with_back(mut self, back: StencilFaceState) -> Self {
        self.back = back;
        self
    }
}

/// Dynamic stencil masks and reference for one or both faces
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct StencilMasks {
    pub face: Face,
    pub write_mask: u8,
    pub reference: u8,
    pub compare_mask: u8,
}

/// Vertex attribute component layout
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum VtxAttribFormat {
    Float32x2,
    Float32x3,
    Float32x4,
}

/// One vertex attribute fetched from a vertex buffer slot
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct VtxAttribState {
    pub buffer: u32,
    pub offset: u32,
    pub format: VtxAttribFormat,
}

/// Stride of one vertex buffer slot
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct VtxBufferState {
    pub stride: u32,
    pub divisor: u32,
}

bitflags! {
    /// Sampler preset selector (16 combinations)
    #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
    pub struct SamplerFlags: u8 {
        /// Filter between mip levels
        const MIP_FILTER = 1 << 0;
        /// Nearest filtering instead of linear
        const NEAREST = 1 << 1;
        /// Repeat horizontally instead of clamping
        const REPEAT_X = 1 << 2;
        /// Repeat vertically instead of clamping
        const REPEAT_Y = 1 << 3;
    }
}

impl SamplerFlags {
    /// Number of distinct sampler presets
    pub const COUNT: usize = 16;

    /// Preset index in `0..COUNT`
    pub fn index(self) -> usize {
        self.bits() as usize
    }
}
