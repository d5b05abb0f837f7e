/// Vector-graphics context: render state stack, path building, fill and stroke

use glam::{Affine2, Vec2};

use crate::error::{Error, Result};
use crate::vg::backend::RenderBackend;
use crate::vg::batch::{
    xform_to_mat3x4, BlendFactors, Call, CallKind, FragUniforms, FrameBatch, PathRange, ShaderType, TextureType,
    Vertex,
};
use crate::vg::color::Color;
use crate::vg::paint::Paint;
use crate::vg::path::{PathCache, PathCommand};
use crate::vg::types::{CreateFlags, ImageFlags, ImageId, LineCap, LineJoin, TextureKind, Winding};

/// Depth of the save/restore stack
const MAX_STATES: usize = 32;

/// Bezier control point distance approximating a quarter circle
const KAPPA90: f32 = 0.552_284_8;

/// Join and miter limit used to build fill fringes
const FILL_FRINGE_MITER_LIMIT: f32 = 2.4;

/// Widest stroke accepted, in device pixels
const MAX_STROKE_WIDTH: f32 = 200.0;

/// Threshold of the stencil pass of a stencil stroke
const STENCIL_STROKE_THRESHOLD: f32 = 1.0 - 0.5 / 255.0;

#[derive(Debug, Clone, Copy)]
struct State {
    fill: Paint,
    stroke: Paint,
    stroke_width: f32,
    miter_limit: f32,
    line_join: LineJoin,
    line_cap: LineCap,
    alpha: f32,
    xform: Affine2,
}

impl Default for State {
    fn default() -> Self {
        Self {
            fill: Paint::color(Color::WHITE),
            stroke: Paint::color(Color::BLACK),
            stroke_width: 1.0,
            miter_limit: 10.0,
            line_join: LineJoin::Miter,
            line_cap: LineCap::Butt,
            alpha: 1.0,
            xform: Affine2::IDENTITY,
        }
    }
}

/// Immediate-mode vector-graphics context
///
/// Draw calls recorded between `begin_frame` and `end_frame` are tessellated
/// into a `FrameBatch` and handed to the render backend on `end_frame`.
pub struct Context {
    backend: Box<dyn RenderBackend>,
    flags: CreateFlags,
    commands: Vec<PathCommand>,
    /// Last path point in user space
    command_pos: Vec2,
    states: Vec<State>,
    cache: PathCache,
    tess_tol: f32,
    dist_tol: f32,
    fringe_width: f32,
    batch: FrameBatch,
}

impl std::fmt::Debug for Context {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Context")
            .field("flags", &self.flags)
            .field("commands", &self.commands.len())
            .field("states", &self.states.len())
            .field("calls", &self.batch.calls.len())
            .finish()
    }
}

impl Context {
    /// Create a context drawing through `backend`
    pub fn new(mut backend: Box<dyn RenderBackend>, flags: CreateFlags) -> Result<Self> {
        backend.render_create(flags)?;

        let mut context = Self {
            backend,
            flags,
            commands: Vec::new(),
            command_pos: Vec2::ZERO,
            states: Vec::with_capacity(MAX_STATES),
            cache: PathCache::new(),
            tess_tol: 0.0,
            dist_tol: 0.0,
            fringe_width: 0.0,
            batch: FrameBatch::new(),
        };
        context.set_device_pixel_ratio(1.0);
        context.save();
        context.reset();

        Ok(context)
    }

    pub fn flags(&self) -> CreateFlags {
        self.flags
    }

    fn set_device_pixel_ratio(&mut self, ratio: f32) {
        self.tess_tol = 0.25 / ratio;
        self.dist_tol = 0.01 / ratio;
        self.fringe_width = 1.0 / ratio;
    }

    fn state(&self) -> &State {
        // The stack always holds at least one state
        &self.states[self.states.len() - 1]
    }

    fn state_mut(&mut self) -> &mut State {
        let last = self.states.len() - 1;
        &mut self.states[last]
    }

    // ===== FRAME =====

    /// Start a frame of `width` x `height` logical pixels
    pub fn begin_frame(&mut self, width: f32, height: f32, device_pixel_ratio: f32) {
        self.states.clear();
        self.save();
        self.reset();

        self.set_device_pixel_ratio(device_pixel_ratio);
        self.backend.render_viewport(width, height, device_pixel_ratio);
        self.batch.clear();
    }

    /// Drop everything recorded since `begin_frame`
    pub fn cancel_frame(&mut self) {
        self.backend.render_cancel();
        self.batch.clear();
    }

    /// Render everything recorded since `begin_frame`
    pub fn end_frame(&mut self) -> Result<()> {
        let result = self.backend.render_flush(&self.batch);
        self.batch.clear();
        result
    }

    // ===== STATE STACK =====

    /// Push a copy of the current state
    pub fn save(&mut self) {
        if self.states.len() >= MAX_STATES {
            return;
        }
        let state = self.states.last().copied().unwrap_or_default();
        self.states.push(state);
    }

    /// Pop the state pushed by the matching `save`
    pub fn restore(&mut self) {
        if self.states.len() <= 1 {
            return;
        }
        self.states.pop();
    }

    /// Reset the current state to defaults
    pub fn reset(&mut self) {
        *self.state_mut() = State::default();
    }

    // ===== TRANSFORMS =====

    pub fn reset_transform(&mut self) {
        self.state_mut().xform = Affine2::IDENTITY;
    }

    pub fn translate(&mut self, x: f32, y: f32) {
        let state = self.state_mut();
        state.xform = state.xform * Affine2::from_translation(Vec2::new(x, y));
    }

    pub fn rotate(&mut self, angle: f32) {
        let state = self.state_mut();
        state.xform = state.xform * Affine2::from_angle(angle);
    }

    pub fn scale(&mut self, x: f32, y: f32) {
        let state = self.state_mut();
        state.xform = state.xform * Affine2::from_scale(Vec2::new(x, y));
    }

    pub fn current_transform(&self) -> Affine2 {
        self.state().xform
    }

    // ===== RENDER STYLES =====

    pub fn stroke_color(&mut self, color: Color) {
        self.state_mut().stroke = Paint::color(color);
    }

    pub fn stroke_paint(&mut self, paint: Paint) {
        let state = self.state_mut();
        state.stroke = Paint { xform: state.xform * paint.xform, ..paint };
    }

    pub fn fill_color(&mut self, color: Color) {
        self.state_mut().fill = Paint::color(color);
    }

    pub fn fill_paint(&mut self, paint: Paint) {
        let state = self.state_mut();
        state.fill = Paint { xform: state.xform * paint.xform, ..paint };
    }

    pub fn stroke_width(&mut self, width: f32) {
        self.state_mut().stroke_width = width;
    }

    pub fn miter_limit(&mut self, limit: f32) {
        self.state_mut().miter_limit = limit;
    }

    pub fn line_cap(&mut self, cap: LineCap) {
        self.state_mut().line_cap = cap;
    }

    pub fn line_join(&mut self, join: LineJoin) {
        self.state_mut().line_join = join;
    }

    /// Alpha applied to every later fill and stroke
    pub fn global_alpha(&mut self, alpha: f32) {
        self.state_mut().alpha = alpha;
    }

    // ===== PAINTS =====

    pub fn linear_gradient(&self, sx: f32, sy: f32, ex: f32, ey: f32, inner: Color, outer: Color) -> Paint {
        Paint::linear_gradient(Vec2::new(sx, sy), Vec2::new(ex, ey), inner, outer)
    }

    #[allow(clippy::too_many_arguments)]
    pub fn box_gradient(&self, x: f32, y: f32, w: f32, h: f32, r: f32, f: f32, inner: Color, outer: Color) -> Paint {
        Paint::box_gradient(Vec2::new(x, y), Vec2::new(w, h), r, f, inner, outer)
    }

    pub fn radial_gradient(&self, cx: f32, cy: f32, inr: f32, outr: f32, inner: Color, outer: Color) -> Paint {
        Paint::radial_gradient(Vec2::new(cx, cy), inr, outr, inner, outer)
    }

    #[allow(clippy::too_many_arguments)]
    pub fn image_pattern(&self, ox: f32, oy: f32, w: f32, h: f32, angle: f32, image: ImageId, alpha: f32) -> Paint {
        Paint::image_pattern(Vec2::new(ox, oy), Vec2::new(w, h), angle, image, alpha)
    }

    // ===== IMAGES =====

    /// Create an RGBA image from tightly packed rows
    pub fn create_image_rgba(&mut self, width: u32, height: u32, flags: ImageFlags, data: &[u8]) -> Result<ImageId> {
        self.create_image(TextureKind::Rgba, width, height, flags, data)
    }

    /// Create a single channel image from tightly packed rows
    pub fn create_image_alpha(&mut self, width: u32, height: u32, flags: ImageFlags, data: &[u8]) -> Result<ImageId> {
        self.create_image(TextureKind::Alpha, width, height, flags, data)
    }

    fn create_image(
        &mut self,
        kind: TextureKind,
        width: u32,
        height: u32,
        flags: ImageFlags,
        data: &[u8],
    ) -> Result<ImageId> {
        check_image_data(kind, width, height, data)?;
        self.backend.create_texture(kind, width, height, flags, Some(data))
    }

    /// Replace the whole content of an image
    pub fn update_image(&mut self, image: ImageId, data: &[u8]) -> Result<()> {
        let info = self
            .backend
            .texture_info(image)
            .ok_or_else(|| Error::InvalidResource(format!("unknown image {}", image.raw())))?;
        check_image_data(info.kind, info.width, info.height, data)?;

        if self.backend.update_texture(image, 0, 0, info.width, info.height, data)? {
            Ok(())
        } else {
            Err(Error::InvalidResource(format!("unknown image {}", image.raw())))
        }
    }

    pub fn image_size(&self, image: ImageId) -> Option<(u32, u32)> {
        self.backend.texture_size(image)
    }

    /// Delete an image; unknown ids are ignored
    pub fn delete_image(&mut self, image: ImageId) {
        if !self.backend.delete_texture(image) {
            crate::engine_warn!("vgdemo::vg", "delete_image: unknown image {}", image.raw());
        }
    }

    // ===== PATHS =====

    /// Clear the current path
    pub fn begin_path(&mut self) {
        self.commands.clear();
        self.cache.clear();
    }

    fn append(&mut self, command: PathCommand) {
        let xform = self.state().xform;
        let transformed = match command {
            PathCommand::MoveTo(p) => {
                self.command_pos = p;
                PathCommand::MoveTo(xform.transform_point2(p))
            }
            PathCommand::LineTo(p) => {
                self.command_pos = p;
                PathCommand::LineTo(xform.transform_point2(p))
            }
            PathCommand::BezierTo(c1, c2, p) => {
                self.command_pos = p;
                PathCommand::BezierTo(
                    xform.transform_point2(c1),
                    xform.transform_point2(c2),
                    xform.transform_point2(p),
                )
            }
            other => other,
        };
        self.commands.push(transformed);
    }

    pub fn move_to(&mut self, x: f32, y: f32) {
        self.append(PathCommand::MoveTo(Vec2::new(x, y)));
    }

    pub fn line_to(&mut self, x: f32, y: f32) {
        self.append(PathCommand::LineTo(Vec2::new(x, y)));
    }

    /// Cubic bezier from the last point through two control points
    pub fn bezier_to(&mut self, c1x: f32, c1y: f32, c2x: f32, c2y: f32, x: f32, y: f32) {
        self.append(PathCommand::BezierTo(Vec2::new(c1x, c1y), Vec2::new(c2x, c2y), Vec2::new(x, y)));
    }

    /// Quadratic bezier from the last point through one control point
    pub fn quad_to(&mut self, cx: f32, cy: f32, x: f32, y: f32) {
        let p0 = self.command_pos;
        let c = Vec2::new(cx, cy);
        let p = Vec2::new(x, y);
        let c1 = p0 + (c - p0) * (2.0 / 3.0);
        let c2 = p + (c - p) * (2.0 / 3.0);
        self.append(PathCommand::BezierTo(c1, c2, p));
    }

    /// Circular arc around (cx, cy) from angle `a0` to `a1` (radians)
    ///
    /// Continues the current sub-path with a line to the arc start, or
    /// starts a new one if the path is empty.
    pub fn arc(&mut self, cx: f32, cy: f32, r: f32, a0: f32, a1: f32, dir: Winding) {
        use std::f32::consts::{FRAC_PI_2, TAU};

        let mut da = a1 - a0;
        match dir {
            Winding::Cw => {
                if da.abs() >= TAU {
                    da = TAU;
                } else {
                    while da < 0.0 {
                        da += TAU;
                    }
                }
            }
            Winding::Ccw => {
                if da.abs() >= TAU {
                    da = -TAU;
                } else {
                    while da > 0.0 {
                        da -= TAU;
                    }
                }
            }
        }

        let divs = ((da.abs() / FRAC_PI_2 + 0.5) as i32).clamp(1, 5);
        let hda = (da / divs as f32) / 2.0;
        let mut kappa = (4.0 / 3.0 * (1.0 - hda.cos()) / hda.sin()).abs();
        if dir == Winding::Ccw {
            kappa = -kappa;
        }

        let start_with_line = !self.commands.is_empty();
        let center = Vec2::new(cx, cy);
        let mut prev = Vec2::ZERO;
        let mut prev_tan = Vec2::ZERO;

        for i in 0..=divs {
            let a = a0 + da * (i as f32 / divs as f32);
            let d = Vec2::new(a.cos(), a.sin());
            let p = center + d * r;
            let tan = Vec2::new(-d.y, d.x) * r * kappa;

            if i == 0 {
                if start_with_line {
                    self.append(PathCommand::LineTo(p));
                } else {
                    self.append(PathCommand::MoveTo(p));
                }
            } else {
                self.append(PathCommand::BezierTo(prev + prev_tan, p - tan, p));
            }
            prev = p;
            prev_tan = tan;
        }
    }

    /// Close the current sub-path with a line segment
    pub fn close_path(&mut self) {
        self.commands.push(PathCommand::Close);
    }

    /// Set the winding of the current sub-path
    pub fn path_winding(&mut self, winding: Winding) {
        self.commands.push(PathCommand::Winding(winding));
    }

    pub fn rect(&mut self, x: f32, y: f32, w: f32, h: f32) {
        self.move_to(x, y);
        self.line_to(x, y + h);
        self.line_to(x + w, y + h);
        self.line_to(x + w, y);
        self.close_path();
    }

    pub fn rounded_rect(&mut self, x: f32, y: f32, w: f32, h: f32, r: f32) {
        if r < 0.1 {
            self.rect(x, y, w, h);
            return;
        }

        let rx = r.min(w.abs() * 0.5) * w.signum();
        let ry = r.min(h.abs() * 0.5) * h.signum();
        let k = 1.0 - KAPPA90;

        self.move_to(x, y + ry);
        self.line_to(x, y + h - ry);
        self.bezier_to(x, y + h - ry * k, x + rx * k, y + h, x + rx, y + h);
        self.line_to(x + w - rx, y + h);
        self.bezier_to(x + w - rx * k, y + h, x + w, y + h - ry * k, x + w, y + h - ry);
        self.line_to(x + w, y + ry);
        self.bezier_to(x + w, y + ry * k, x + w - rx * k, y, x + w - rx, y);
        self.line_to(x + rx, y);
        self.bezier_to(x + rx * k, y, x, y + ry * k, x, y + ry);
        self.close_path();
    }

    pub fn ellipse(&mut self, cx: f32, cy: f32, rx: f32, ry: f32) {
        let kx = rx * KAPPA90;
        let ky = ry * KAPPA90;

        self.move_to(cx - rx, cy);
        self.bezier_to(cx - rx, cy + ky, cx - kx, cy + ry, cx, cy + ry);
        self.bezier_to(cx + kx, cy + ry, cx + rx, cy + ky, cx + rx, cy);
        self.bezier_to(cx + rx, cy - ky, cx + kx, cy - ry, cx, cy - ry);
        self.bezier_to(cx - kx, cy - ry, cx - rx, cy - ky, cx - rx, cy);
        self.close_path();
    }

    pub fn circle(&mut self, cx: f32, cy: f32, r: f32) {
        self.ellipse(cx, cy, r, r);
    }

    // ===== DRAWING =====

    /// Fill the current path with the fill paint
    pub fn fill(&mut self) {
        let state = *self.state();
        let paint = state.fill.with_alpha_scale(state.alpha);

        self.cache.flatten(&self.commands, self.tess_tol, self.dist_tol);
        let fringe = if self.flags.contains(CreateFlags::ANTIALIAS) { self.fringe_width } else { 0.0 };
        self.cache
            .expand_fill(fringe, LineJoin::Miter, FILL_FRINGE_MITER_LIMIT, self.fringe_width);

        self.record_fill(&paint);
    }

    /// Stroke the current path with the stroke paint
    pub fn stroke(&mut self) {
        let state = *self.state();
        let scale = average_scale(&state.xform);
        let mut stroke_width = (state.stroke_width * scale).clamp(0.0, MAX_STROKE_WIDTH);
        let mut paint = state.stroke;

        if stroke_width < self.fringe_width {
            // Thinner than a pixel: keep the width and fade the color instead
            let alpha = (stroke_width / self.fringe_width).clamp(0.0, 1.0);
            paint = paint.with_alpha_scale(alpha * alpha);
            stroke_width = self.fringe_width;
        }
        let paint = paint.with_alpha_scale(state.alpha);

        self.cache.flatten(&self.commands, self.tess_tol, self.dist_tol);
        let fringe = if self.flags.contains(CreateFlags::ANTIALIAS) { self.fringe_width } else { 0.0 };
        self.cache
            .expand_stroke(stroke_width * 0.5, fringe, state.line_cap, state.line_join, state.miter_limit);

        self.record_stroke(&paint, stroke_width);
    }

    /// Copy the tessellated paths into the batch, returning the path range offset
    fn push_cached_paths(&mut self) -> usize {
        let base = self.batch.push_vertices(&self.cache.vertices);
        let path_offset = self.batch.paths.len();
        self.batch.paths.extend(self.cache.paths.iter().map(|path| PathRange {
            fill_offset: base + path.fill.start as u32,
            fill_count: path.fill.len() as u32,
            stroke_offset: base + path.stroke.start as u32,
            stroke_count: path.stroke.len() as u32,
        }));
        path_offset
    }

    fn record_fill(&mut self, paint: &Paint) {
        if self.cache.paths.is_empty() {
            return;
        }
        let Some(uniforms) = self.convert_paint(paint, self.fringe_width, self.fringe_width, -1.0) else {
            return;
        };

        let path_count = self.cache.paths.len();
        let path_offset = self.push_cached_paths();
        let convex = path_count == 1 && self.cache.paths[0].convex;

        let call = if convex {
            Call {
                kind: CallKind::ConvexFill,
                image: paint.image,
                path_offset,
                path_count,
                triangle_offset: 0,
                triangle_count: 0,
                uniform_offset: self.batch.push_uniforms(&[uniforms]),
                blend: BlendFactors::default(),
            }
        } else {
            let [x0, y0, x1, y1] = self.cache.bounds;
            let quad = [
                Vertex::new(x1, y1, 0.5, 1.0),
                Vertex::new(x1, y0, 0.5, 1.0),
                Vertex::new(x0, y1, 0.5, 1.0),
                Vertex::new(x0, y0, 0.5, 1.0),
            ];
            Call {
                kind: CallKind::Fill,
                image: paint.image,
                path_offset,
                path_count,
                triangle_offset: self.batch.push_vertices(&quad),
                triangle_count: quad.len() as u32,
                uniform_offset: self.batch.push_uniforms(&[FragUniforms::simple(), uniforms]),
                blend: BlendFactors::default(),
            }
        };
        self.batch.calls.push(call);
    }

    fn record_stroke(&mut self, paint: &Paint, stroke_width: f32) {
        if self.cache.paths.is_empty() {
            return;
        }
        let Some(uniforms) = self.convert_paint(paint, stroke_width, self.fringe_width, -1.0) else {
            return;
        };

        let path_count = self.cache.paths.len();
        let path_offset = self.push_cached_paths();

        let uniform_offset = if self.flags.contains(CreateFlags::STENCIL_STROKES) {
            let stencil = FragUniforms { stroke_thr: STENCIL_STROKE_THRESHOLD, ..uniforms };
            self.batch.push_uniforms(&[uniforms, stencil])
        } else {
            self.batch.push_uniforms(&[uniforms])
        };

        self.batch.calls.push(Call {
            kind: CallKind::Stroke,
            image: paint.image,
            path_offset,
            path_count,
            triangle_offset: 0,
            triangle_count: 0,
            uniform_offset,
            blend: BlendFactors::default(),
        });
    }

    /// Fragment uniforms of a paint; `None` when its image is unknown
    fn convert_paint(&self, paint: &Paint, width: f32, fringe: f32, stroke_thr: f32) -> Option<FragUniforms> {
        let mut frag = FragUniforms::unscissored(paint.inner_color, paint.outer_color);
        frag.extent = paint.extent.to_array();
        frag.stroke_mult = (width * 0.5 + fringe * 0.5) / fringe;
        frag.stroke_thr = stroke_thr;

        let inverse = match paint.image {
            Some(image) => {
                let Some(info) = self.backend.texture_info(image) else {
                    crate::engine_warn!("vgdemo::vg", "Paint uses unknown image {}, draw skipped", image.raw());
                    return None;
                };
                let xform = if info.flags.contains(ImageFlags::FLIP_Y) {
                    let half = Vec2::new(0.0, paint.extent.y * 0.5);
                    paint.xform
                        * Affine2::from_translation(half)
                        * Affine2::from_scale(Vec2::new(1.0, -1.0))
                        * Affine2::from_translation(-half)
                } else {
                    paint.xform
                };
                frag.shader_type = ShaderType::FillImage as u32 as f32;
                let tex_type = match info.kind {
                    TextureKind::Rgba if info.flags.contains(ImageFlags::PREMULTIPLIED) => {
                        TextureType::PremultipliedRgba
                    }
                    TextureKind::Rgba => TextureType::Rgba,
                    TextureKind::Alpha => TextureType::Alpha,
                };
                frag.tex_type = tex_type as u32 as f32;
                xform.inverse()
            }
            None => {
                frag.shader_type = ShaderType::FillGradient as u32 as f32;
                frag.radius = paint.radius;
                frag.feather = paint.feather;
                paint.xform.inverse()
            }
        };
        frag.paint_mat = xform_to_mat3x4(&inverse);

        Some(frag)
    }
}

fn average_scale(xform: &Affine2) -> f32 {
    let m = xform.matrix2;
    let sx = (m.x_axis.x * m.x_axis.x + m.y_axis.x * m.y_axis.x).sqrt();
    let sy = (m.x_axis.y * m.x_axis.y + m.y_axis.y * m.y_axis.y).sqrt();
    (sx + sy) * 0.5
}

fn check_image_data(kind: TextureKind, width: u32, height: u32, data: &[u8]) -> Result<()> {
    let expected = width as usize * height as usize * kind.bytes_per_pixel();
    if width == 0 || height == 0 || data.len() < expected {
        return Err(Error::InvalidResource(format!(
            "image data of {} bytes does not cover {}x{} {:?} pixels",
            data.len(),
            width,
            height,
            kind
        )));
    }
    Ok(())
}

#[cfg(test)]
#[path = "context_tests.rs"]
mod tests;
