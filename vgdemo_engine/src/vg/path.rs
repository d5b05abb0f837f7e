/// Path flattening and tessellation
///
/// Commands (already in device space) are flattened into polylines, curves
/// subdivided until they are within the tessellation tolerance. Polylines
/// are then expanded into a triangle fan for the interior plus a triangle
/// strip for the anti-aliased fringe (fills) or for the outline (strokes).

use std::ops::Range;

use bitflags::bitflags;
use glam::Vec2;

use crate::vg::batch::Vertex;
use crate::vg::types::{LineCap, LineJoin, Winding};

/// Maximum bezier subdivision depth
const MAX_TESSELLATION_LEVEL: u32 = 10;

/// Upper bound of the miter extrusion scale
const MAX_MITER_SCALE: f32 = 600.0;

/// Path command with its points transformed to device space
#[derive(Debug, Clone, Copy, PartialEq)]
pub(crate) enum PathCommand {
    MoveTo(Vec2),
    LineTo(Vec2),
    BezierTo(Vec2, Vec2, Vec2),
    Close,
    Winding(Winding),
}

bitflags! {
    #[derive(Debug, Clone, Copy, PartialEq, Eq)]
    pub(crate) struct PointFlags: u8 {
        const CORNER = 1 << 0;
        const LEFT = 1 << 1;
        const BEVEL = 1 << 2;
        const INNER_BEVEL = 1 << 3;
    }
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub(crate) struct PathPoint {
    pub pos: Vec2,
    /// Unit direction to the next point
    pub dir: Vec2,
    /// Distance to the next point
    pub len: f32,
    /// Scaled average of the two adjacent segment normals
    pub dm: Vec2,
    pub flags: PointFlags,
}

impl PathPoint {
    fn new(pos: Vec2, flags: PointFlags) -> Self {
        Self { pos, dir: Vec2::ZERO, len: 0.0, dm: Vec2::ZERO, flags }
    }
}

/// One flattened sub-path
#[derive(Debug, Clone, PartialEq)]
pub(crate) struct FlatPath {
    pub first: usize,
    pub count: usize,
    pub closed: bool,
    pub winding: Winding,
    pub convex: bool,
    /// Interior fan in `PathCache::vertices`
    pub fill: Range<usize>,
    /// Fringe or stroke strip in `PathCache::vertices`
    pub stroke: Range<usize>,
}

/// Flattened points and expanded vertices of the current path
#[derive(Debug, Default)]
pub(crate) struct PathCache {
    pub points: Vec<PathPoint>,
    pub paths: Vec<FlatPath>,
    pub vertices: Vec<Vertex>,
    /// min x, min y, max x, max y
    pub bounds: [f32; 4],
    flattened: bool,
}

impl PathCache {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn clear(&mut self) {
        self.points.clear();
        self.paths.clear();
        self.vertices.clear();
        self.flattened = false;
    }

    /// Flatten commands into polylines (no-op once done for the current path)
    pub fn flatten(&mut self, commands: &[PathCommand], tess_tol: f32, dist_tol: f32) {
        if self.flattened {
            return;
        }
        self.flattened = true;

        let mut last = Vec2::ZERO;
        for command in commands {
            match *command {
                PathCommand::MoveTo(p) => {
                    self.add_path();
                    self.add_point(p, PointFlags::CORNER, dist_tol);
                    last = p;
                }
                PathCommand::LineTo(p) => {
                    self.add_point(p, PointFlags::CORNER, dist_tol);
                    last = p;
                }
                PathCommand::BezierTo(c1, c2, p) => {
                    self.tessellate_bezier(last, c1, c2, p, 0, PointFlags::CORNER, tess_tol, dist_tol);
                    last = p;
                }
                PathCommand::Close => {
                    if let Some(path) = self.paths.last_mut() {
                        path.closed = true;
                    }
                }
                PathCommand::Winding(winding) => {
                    if let Some(path) = self.paths.last_mut() {
                        path.winding = winding;
                    }
                }
            }
        }

        let mut min = Vec2::splat(1e6);
        let mut max = Vec2::splat(-1e6);

        for path in &mut self.paths {
            let pts = &mut self.points[path.first..path.first + path.count];

            // A closing point equal to the first one is dropped and closes the path
            if path.count > 1 && points_equal(pts[path.count - 1].pos, pts[0].pos, dist_tol) {
                path.count -= 1;
                path.closed = true;
            }
            let pts = &mut pts[..path.count];

            if pts.len() > 2 {
                let area = poly_area(pts);
                let reverse = match path.winding {
                    Winding::Ccw => area < 0.0,
                    Winding::Cw => area > 0.0,
                };
                if reverse {
                    pts.reverse();
                }
            }

            let n = pts.len();
            for i in 0..n {
                let next = pts[(i + 1) % n].pos;
                let delta = next - pts[i].pos;
                let len = delta.length();
                pts[i].len = len;
                pts[i].dir = if len > 1e-6 { delta / len } else { delta };
                min = min.min(pts[i].pos);
                max = max.max(pts[i].pos);
            }
        }

        // Degenerate sub-paths produce no geometry
        self.paths.retain(|path| path.count >= 2);

        self.bounds = if self.paths.is_empty() {
            [0.0; 4]
        } else {
            [min.x, min.y, max.x, max.y]
        };
    }

    fn add_path(&mut self) {
        self.paths.push(FlatPath {
            first: self.points.len(),
            count: 0,
            closed: false,
            winding: Winding::Ccw,
            convex: false,
            fill: 0..0,
            stroke: 0..0,
        });
    }

    fn add_point(&mut self, pos: Vec2, flags: PointFlags, dist_tol: f32) {
        let Some(path) = self.paths.last_mut() else {
            return;
        };
        if path.count > 0 {
            if let Some(last) = self.points.last_mut() {
                if points_equal(last.pos, pos, dist_tol) {
                    last.flags |= flags;
                    return;
                }
            }
        }
        self.points.push(PathPoint::new(pos, flags));
        path.count += 1;
    }

    #[allow(clippy::too_many_arguments)]
    fn tessellate_bezier(
        &mut self,
        p1: Vec2,
        p2: Vec2,
        p3: Vec2,
        p4: Vec2,
        level: u32,
        flags: PointFlags,
        tess_tol: f32,
        dist_tol: f32,
    ) {
        if level > MAX_TESSELLATION_LEVEL {
            return;
        }

        let p12 = (p1 + p2) * 0.5;
        let p23 = (p2 + p3) * 0.5;
        let p34 = (p3 + p4) * 0.5;
        let p123 = (p12 + p23) * 0.5;

        let d = p4 - p1;
        let d2 = ((p2.x - p4.x) * d.y - (p2.y - p4.y) * d.x).abs();
        let d3 = ((p3.x - p4.x) * d.y - (p3.y - p4.y) * d.x).abs();

        if (d2 + d3) * (d2 + d3) < tess_tol * d.length_squared() {
            self.add_point(p4, flags, dist_tol);
            return;
        }

        let p234 = (p23 + p34) * 0.5;
        let p1234 = (p123 + p234) * 0.5;

        self.tessellate_bezier(p1, p12, p123, p1234, level + 1, PointFlags::empty(), tess_tol, dist_tol);
        self.tessellate_bezier(p1234, p234, p34, p4, level + 1, flags, tess_tol, dist_tol);
    }

    /// Compute miter directions and join flags for a stroke half-width `w`
    fn calculate_joins(&mut self, w: f32, join: LineJoin, miter_limit: f32) {
        let inv_w = if w > 0.0 { 1.0 / w } else { 0.0 };

        for path in &mut self.paths {
            let pts = &mut self.points[path.first..path.first + path.count];
            let n = pts.len();
            let mut left_count = 0;

            for j in 0..n {
                let p0 = pts[(j + n - 1) % n];
                let p1 = &mut pts[j];

                let dl0 = left_normal(p0.dir);
                let dl1 = left_normal(p1.dir);
                p1.dm = (dl0 + dl1) * 0.5;
                let dmr2 = p1.dm.length_squared();
                if dmr2 > 1e-6 {
                    let scale = (1.0 / dmr2).min(MAX_MITER_SCALE);
                    p1.dm *= scale;
                }

                p1.flags &= PointFlags::CORNER;

                let cross = p1.dir.x * p0.dir.y - p0.dir.x * p1.dir.y;
                if cross > 0.0 {
                    left_count += 1;
                    p1.flags |= PointFlags::LEFT;
                }

                let limit = (p0.len.min(p1.len) * inv_w).max(1.01);
                if dmr2 * limit * limit < 1.0 {
                    p1.flags |= PointFlags::INNER_BEVEL;
                }

                if p1.flags.contains(PointFlags::CORNER)
                    && (dmr2 * miter_limit * miter_limit < 1.0 || join == LineJoin::Bevel)
                {
                    p1.flags |= PointFlags::BEVEL;
                }
            }

            path.convex = left_count == n;
        }
    }

    /// Expand flattened paths into interior fans and, when `w > 0`, AA fringes
    ///
    /// `aa` is the fringe width of the context.
    pub fn expand_fill(&mut self, w: f32, join: LineJoin, miter_limit: f32, aa: f32) {
        let fringe = w > 0.0;
        self.calculate_joins(w, join, miter_limit);
        self.vertices.clear();

        let convex = self.paths.len() == 1 && self.paths[0].convex;
        let woff = 0.5 * aa;
        let out = &mut self.vertices;

        for path in &mut self.paths {
            let pts = &self.points[path.first..path.first + path.count];
            let n = pts.len();

            let fill_start = out.len();
            if fringe {
                for j in 0..n {
                    let p0 = &pts[(j + n - 1) % n];
                    let p1 = &pts[j];
                    if p1.flags.contains(PointFlags::BEVEL) {
                        if p1.flags.contains(PointFlags::LEFT) {
                            out.push(vertex(p1.pos + p1.dm * woff, 0.5, 1.0));
                        } else {
                            out.push(vertex(p1.pos + left_normal(p0.dir) * woff, 0.5, 1.0));
                            out.push(vertex(p1.pos + left_normal(p1.dir) * woff, 0.5, 1.0));
                        }
                    } else {
                        out.push(vertex(p1.pos + p1.dm * woff, 0.5, 1.0));
                    }
                }
            } else {
                out.extend(pts.iter().map(|p| vertex(p.pos, 0.5, 1.0)));
            }
            path.fill = fill_start..out.len();

            let stroke_start = out.len();
            if fringe {
                // Convex shapes get only the outer half of the fringe so they
                // can be drawn without stenciling
                let (lw, lu) = if convex { (woff, 0.5) } else { (w + woff, 0.0) };
                let (rw, ru) = (w - woff, 1.0);

                for j in 0..n {
                    let p0 = &pts[(j + n - 1) % n];
                    let p1 = &pts[j];
                    if p1.flags.intersects(PointFlags::BEVEL | PointFlags::INNER_BEVEL) {
                        bevel_join(out, p0, p1, lw, rw, lu, ru);
                    } else {
                        out.push(vertex(p1.pos + p1.dm * lw, lu, 1.0));
                        out.push(vertex(p1.pos - p1.dm * rw, ru, 1.0));
                    }
                }
                close_strip(out, stroke_start, lu, ru);
            }
            path.stroke = stroke_start..out.len();
        }
    }

    /// Expand flattened paths into stroke strips of half-width `w`
    ///
    /// `aa` is the fringe width, zero when anti-aliasing is off.
    pub fn expand_stroke(&mut self, w: f32, aa: f32, cap: LineCap, join: LineJoin, miter_limit: f32) {
        let w = w + aa * 0.5;
        // Without AA the fragment coverage gradient is disabled
        let (u0, u1) = if aa == 0.0 { (0.5, 0.5) } else { (0.0, 1.0) };

        self.calculate_joins(w, join, miter_limit);
        self.vertices.clear();
        let out = &mut self.vertices;

        for path in &mut self.paths {
            let pts = &self.points[path.first..path.first + path.count];
            let n = pts.len();
            let start = out.len();
            path.fill = start..start;

            let segment = |p0: &PathPoint, p1: &PathPoint, out: &mut Vec<Vertex>| {
                if p1.flags.intersects(PointFlags::BEVEL | PointFlags::INNER_BEVEL) {
                    bevel_join(out, p0, p1, w, w, u0, u1);
                } else {
                    out.push(vertex(p1.pos + p1.dm * w, u0, 1.0));
                    out.push(vertex(p1.pos - p1.dm * w, u1, 1.0));
                }
            };

            if path.closed {
                for j in 0..n {
                    segment(&pts[(j + n - 1) % n], &pts[j], out);
                }
                close_strip(out, start, u0, u1);
            } else {
                let cap_offset = match cap {
                    LineCap::Butt => -aa * 0.5,
                    LineCap::Square => w - aa,
                };

                let dir = (pts[1].pos - pts[0].pos).normalize_or_zero();
                cap_start(out, pts[0].pos, dir, w, cap_offset, aa, u0, u1);
                for j in 1..n - 1 {
                    segment(&pts[j - 1], &pts[j], out);
                }
                let dir = (pts[n - 1].pos - pts[n - 2].pos).normalize_or_zero();
                cap_end(out, pts[n - 1].pos, dir, w, cap_offset, aa, u0, u1);
            }
            path.stroke = start..out.len();
        }
    }
}

fn vertex(pos: Vec2, u: f32, v: f32) -> Vertex {
    Vertex::new(pos.x, pos.y, u, v)
}

/// Normal pointing to the left of a direction
fn left_normal(dir: Vec2) -> Vec2 {
    Vec2::new(dir.y, -dir.x)
}

fn points_equal(a: Vec2, b: Vec2, tol: f32) -> bool {
    a.distance_squared(b) < tol * tol
}

fn poly_area(pts: &[PathPoint]) -> f32 {
    let a = pts[0].pos;
    let mut area = 0.0;
    for i in 2..pts.len() {
        let b = pts[i - 1].pos;
        let c = pts[i].pos;
        area += (c.x - a.x) * (b.y - a.y) - (b.x - a.x) * (c.y - a.y);
    }
    area * 0.5
}

/// Repeat the first two vertices of a strip to close the loop
fn close_strip(out: &mut Vec<Vertex>, start: usize, u0: f32, u1: f32) {
    let first = out[start];
    let second = out[start + 1];
    out.push(Vertex::new(first.x, first.y, u0, 1.0));
    out.push(Vertex::new(second.x, second.y, u1, 1.0));
}

/// Endpoints of the bevel on the `w` side of a join
fn choose_bevel(bevel: bool, p0: &PathPoint, p1: &PathPoint, w: f32) -> (Vec2, Vec2) {
    if bevel {
        (p1.pos + left_normal(p0.dir) * w, p1.pos + left_normal(p1.dir) * w)
    } else {
        let p = p1.pos + p1.dm * w;
        (p, p)
    }
}

fn bevel_join(out: &mut Vec<Vertex>, p0: &PathPoint, p1: &PathPoint, lw: f32, rw: f32, lu: f32, ru: f32) {
    let dl0 = left_normal(p0.dir);
    let dl1 = left_normal(p1.dir);
    let inner_bevel = p1.flags.contains(PointFlags::INNER_BEVEL);

    if p1.flags.contains(PointFlags::LEFT) {
        let (l0, l1) = choose_bevel(inner_bevel, p0, p1, lw);

        out.push(vertex(l0, lu, 1.0));
        out.push(vertex(p1.pos - dl0 * rw, ru, 1.0));

        if p1.flags.contains(PointFlags::BEVEL) {
            out.push(vertex(l0, lu, 1.0));
            out.push(vertex(p1.pos - dl0 * rw, ru, 1.0));
            out.push(vertex(l1, lu, 1.0));
            out.push(vertex(p1.pos - dl1 * rw, ru, 1.0));
        } else {
            let r0 = p1.pos - p1.dm * rw;
            out.push(vertex(p1.pos, 0.5, 1.0));
            out.push(vertex(p1.pos - dl0 * rw, ru, 1.0));
            out.push(vertex(r0, ru, 1.0));
            out.push(vertex(r0, ru, 1.0));
            out.push(vertex(p1.pos, 0.5, 1.0));
            out.push(vertex(p1.pos - dl1 * rw, ru, 1.0));
        }

        out.push(vertex(l1, lu, 1.0));
        out.push(vertex(p1.pos - dl1 * rw, ru, 1.0));
    } else {
        let (r0, r1) = choose_bevel(inner_bevel, p0, p1, -rw);

        out.push(vertex(p1.pos + dl0 * lw, lu, 1.0));
        out.push(vertex(r0, ru, 1.0));

        if p1.flags.contains(PointFlags::BEVEL) {
            out.push(vertex(p1.pos + dl0 * lw, lu, 1.0));
            out.push(vertex(r0, ru, 1.0));
            out.push(vertex(p1.pos + dl1 * lw, lu, 1.0));
            out.push(vertex(r1, ru, 1.0));
        } else {
            let l0 = p1.pos + p1.dm * lw;
            out.push(vertex(p1.pos + dl0 * lw, lu, 1.0));
            out.push(vertex(p1.pos, 0.5, 1.0));
            out.push(vertex(l0, lu, 1.0));
            out.push(vertex(l0, lu, 1.0));
            out.push(vertex(p1.pos + dl1 * lw, lu, 1.0));
            out.push(vertex(p1.pos, 0.5, 1.0));
        }

        out.push(vertex(p1.pos + dl1 * lw, lu, 1.0));
        out.push(vertex(r1, ru, 1.0));
    }
}

#[allow(clippy::too_many_arguments)]
fn cap_start(out: &mut Vec<Vertex>, p: Vec2, dir: Vec2, w: f32, d: f32, aa: f32, u0: f32, u1: f32) {
    let p = p - dir * d;
    let dl = left_normal(dir);
    out.push(vertex(p + dl * w - dir * aa, u0, 0.0));
    out.push(vertex(p - dl * w - dir * aa, u1, 0.0));
    out.push(vertex(p + dl * w, u0, 1.0));
    out.push(vertex(p - dl * w, u1, 1.0));
}

#[allow(clippy::too_many_arguments)]
fn cap_end(out: &mut Vec<Vertex>, p: Vec2, dir: Vec2, w: f32, d: f32, aa: f32, u0: f32, u1: f32) {
    let p = p + dir * d;
    let dl = left_normal(dir);
    out.push(vertex(p + dl * w, u0, 1.0));
    out.push(vertex(p - dl * w, u1, 1.0));
    out.push(vertex(p + dl * w + dir * aa, u0, 0.0));
    out.push(vertex(p - dl * w + dir * aa, u1, 0.0));
}

#[cfg(test)]
#[path = "path_tests.rs"]
mod tests;
