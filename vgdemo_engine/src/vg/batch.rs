/// Frame batch: the geometry, uniforms and draw calls of one vector-graphics frame
///
/// The context tessellates paths into a `FrameBatch`; the render backend
/// uploads and replays it on `render_flush`.

use bytemuck::{Pod, Zeroable};
use glam::Affine2;

use crate::device::{BlendFactor, BlendState};
use crate::vg::color::Color;
use crate::vg::types::ImageId;

/// Vertex layout: position then texture/AA coordinate (16 bytes)
#[repr(C)]
#[derive(Debug, Clone, Copy, PartialEq, Default, Pod, Zeroable)]
pub struct Vertex {
    pub x: f32,
    pub y: f32,
    pub u: f32,
    pub v: f32,
}

impl Vertex {
    pub const fn new(x: f32, y: f32, u: f32, v: f32) -> Self {
        Self { x, y, u, v }
    }
}

/// Fragment shader `type` selector
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ShaderType {
    /// Rounded-box gradient
    FillGradient = 0,
    /// Image pattern
    FillImage = 1,
    /// Stencil-only output
    Simple = 2,
    /// Textured triangles
    Image = 3,
}

/// Fragment shader `texType` selector
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TextureType {
    PremultipliedRgba = 0,
    Rgba = 1,
    Alpha = 2,
}

/// Fragment uniform block (11 vec4, std140 compatible)
#[repr(C)]
#[derive(Debug, Clone, Copy, PartialEq, Pod, Zeroable)]
pub struct FragUniforms {
    pub scissor_mat: [[f32; 4]; 3],
    pub paint_mat: [[f32; 4]; 3],
    pub inner_color: [f32; 4],
    pub outer_color: [f32; 4],
    pub scissor_ext: [f32; 2],
    pub scissor_scale: [f32; 2],
    pub extent: [f32; 2],
    pub radius: f32,
    pub feather: f32,
    pub stroke_mult: f32,
    pub stroke_thr: f32,
    pub tex_type: f32,
    pub shader_type: f32,
}

impl Default for FragUniforms {
    fn default() -> Self {
        Self::zeroed()
    }
}

impl FragUniforms {
    /// Size of the block in bytes
    pub const SIZE: usize = std::mem::size_of::<FragUniforms>();

    /// Uniforms of the stencil-only pass of a fill
    pub fn simple() -> Self {
        Self {
            stroke_thr: -1.0,
            shader_type: ShaderType::Simple as u32 as f32,
            ..Self::zeroed()
        }
    }

    /// Uniforms with no scissor and the given colors, everything else zero
    pub(crate) fn unscissored(inner: Color, outer: Color) -> Self {
        Self {
            inner_color: inner.premultiplied(),
            outer_color: outer.premultiplied(),
            scissor_ext: [1.0, 1.0],
            scissor_scale: [1.0, 1.0],
            ..Self::zeroed()
        }
    }
}

/// Affine transform as the three vec4 columns of a 3x3 matrix
pub fn xform_to_mat3x4(xform: &Affine2) -> [[f32; 4]; 3] {
    [
        [xform.matrix2.x_axis.x, xform.matrix2.x_axis.y, 0.0, 0.0],
        [xform.matrix2.y_axis.x, xform.matrix2.y_axis.y, 0.0, 0.0],
        [xform.translation.x, xform.translation.y, 1.0, 0.0],
    ]
}

/// Kind of draw call, selecting the command sequence the renderer records
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CallKind {
    /// Stencil fill of one or more possibly concave paths plus a cover quad
    Fill,
    /// Single convex path drawn directly
    ConvexFill,
    Stroke,
    Triangles,
}

/// Blend factors of a call (additive ops)
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct BlendFactors {
    pub src_color: BlendFactor,
    pub dst_color: BlendFactor,
    pub src_alpha: BlendFactor,
    pub dst_alpha: BlendFactor,
}

impl Default for BlendFactors {
    /// Premultiplied source-over
    fn default() -> Self {
        Self {
            src_color: BlendFactor::One,
            dst_color: BlendFactor::OneMinusSrcAlpha,
            src_alpha: BlendFactor::One,
            dst_alpha: BlendFactor::OneMinusSrcAlpha,
        }
    }
}

impl BlendFactors {
    pub fn to_blend_state(self) -> BlendState {
        BlendState::default().with_factors(self.src_color, self.dst_color, self.src_alpha, self.dst_alpha)
    }
}

/// Vertex ranges of one tessellated path inside `FrameBatch::vertices`
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct PathRange {
    /// Triangle fan of the interior
    pub fill_offset: u32,
    pub fill_count: u32,
    /// Triangle strip of the stroke or AA fringe
    pub stroke_offset: u32,
    pub stroke_count: u32,
}

/// One draw call
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Call {
    pub kind: CallKind,
    pub image: Option<ImageId>,
    /// Range in `FrameBatch::paths`
    pub path_offset: usize,
    pub path_count: usize,
    /// Cover quad (fills) or triangle list (triangles) in `FrameBatch::vertices`
    pub triangle_offset: u32,
    pub triangle_count: u32,
    /// Index of the first uniform block in `FrameBatch::uniforms`
    pub uniform_offset: usize,
    pub blend: BlendFactors,
}

/// Everything recorded between `begin_frame` and `end_frame`
#[derive(Debug, Clone, Default)]
pub struct FrameBatch {
    pub calls: Vec<Call>,
    pub paths: Vec<PathRange>,
    pub vertices: Vec<Vertex>,
    pub uniforms: Vec<FragUniforms>,
}

impl FrameBatch {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn is_empty(&self) -> bool {
        self.calls.is_empty()
    }

    pub fn clear(&mut self) {
        self.calls.clear();
        self.paths.clear();
        self.vertices.clear();
        self.uniforms.clear();
    }

    /// Paths referenced by a call
    pub fn call_paths(&self, call: &Call) -> &[PathRange] {
        &self.paths[call.path_offset..call.path_offset + call.path_count]
    }

    /// Append vertices and return the offset of the first one
    pub(crate) fn push_vertices(&mut self, vertices: &[Vertex]) -> u32 {
        let offset = self.vertices.len() as u32;
        self.vertices.extend_from_slice(vertices);
        offset
    }

    /// Append uniform blocks and return the index of the first one
    pub(crate) fn push_uniforms(&mut self, uniforms: &[FragUniforms]) -> usize {
        let offset = self.uniforms.len();
        self.uniforms.extend_from_slice(uniforms);
        offset
    }
}
