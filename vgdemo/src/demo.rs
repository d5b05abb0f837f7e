/// Demo scene drawn by the sample every frame
///
/// Animated widgets laid out for the configured design size: eyes following
/// a wandering point, a bezier graph, a hue wheel, line widths and joins, an
/// edit box, and a panel of thumbnails decoded from `images/image{1..12}.png`.

use std::f32::consts::PI;
use std::path::{Path, PathBuf};

use vgdemo_engine::sample::DemoContent;
use vgdemo_engine::vg::{Color, Context, ImageFlags, ImageId, LineCap, LineJoin, Winding};
use vgdemo_engine::vgdemo::{Error, Result};
use vgdemo_engine::{engine_debug, engine_warn};

/// Number of thumbnail images looked up under `images/`
pub const THUMBNAIL_COUNT: usize = 12;

const THUMBNAIL_SIZE: f32 = 60.0;

/// The vector-graphics demo content
#[derive(Debug)]
pub struct DemoScene {
    image_dir: PathBuf,
    images: Vec<ImageId>,
}

impl DemoScene {
    /// # Arguments
    ///
    /// * `asset_dir` - Directory holding the `images/` folder
    pub fn new(asset_dir: impl AsRef<Path>) -> Self {
        Self {
            image_dir: asset_dir.as_ref().join("images"),
            images: Vec::new(),
        }
    }

    /// Path of thumbnail `index` (0-based)
    pub fn thumbnail_path(&self, index: usize) -> PathBuf {
        self.image_dir.join(format!("image{}.png", index + 1))
    }

    /// Thumbnails currently loaded, in file order
    pub fn images(&self) -> &[ImageId] {
        &self.images
    }
}

/// Decode a PNG and upload it as an RGBA image
fn load_thumbnail(vg: &mut Context, path: &Path) -> Result<ImageId> {
    let decoded = image::open(path)
        .map_err(|err| Error::AssetLoadFailed(format!("{}: {}", path.display(), err)))?
        .to_rgba8();
    let (width, height) = decoded.dimensions();
    vg.create_image_rgba(width, height, ImageFlags::empty(), decoded.as_raw())
}

impl DemoContent for DemoScene {
    fn load(&mut self, vg: &mut Context) -> Result<()> {
        for index in 0..THUMBNAIL_COUNT {
            let path = self.thumbnail_path(index);
            match load_thumbnail(vg, &path) {
                Ok(image) => self.images.push(image),
                Err(err) => engine_warn!("vgdemo::DemoScene", "Skipping thumbnail: {}", err),
            }
        }
        engine_debug!(
            "vgdemo::DemoScene",
            "Loaded {}/{} thumbnails from {}",
            self.images().len(),
            THUMBNAIL_COUNT,
            self.image_dir.display()
        );
        Ok(())
    }

    fn render(&mut self, vg: &mut Context, x: f32, y: f32, width: f32, height: f32, t: f32, blowup: bool) {
        // Stand-in for a mouse cursor
        let mx = width * 0.5 + (t * 0.7).cos() * width * 0.3;
        let my = height * 0.5 + (t * 1.1).sin() * height * 0.3;

        vg.save();
        vg.translate(x, y);
        if blowup {
            vg.rotate((t * 0.3).sin() * 5.0 / 180.0 * PI);
            vg.scale(2.0, 2.0);
        }

        draw_graph(vg, 0.0, height / 2.0, width, height / 2.0, t);
        draw_eyes(vg, width - 250.0, 50.0, 150.0, 100.0, mx, my, t);
        draw_color_wheel(vg, width - 300.0, height - 300.0, 250.0, 250.0, t);
        draw_lines(vg, 120.0, height - 50.0, 600.0, 50.0, t);
        draw_widths(vg, 10.0, 50.0, 30.0);
        draw_caps(vg, 10.0, 300.0, 30.0);
        draw_edit_box_base(vg, 60.0, 95.0, 280.0, 28.0);
        draw_thumbnails(vg, 365.0, 40.0, 160.0, 300.0, &self.images, t);

        vg.restore();
    }

    fn free(&mut self, vg: &mut Context) {
        for image in self.images.drain(..) {
            vg.delete_image(image);
        }
    }
}

// ============================================================================
// Widgets
// ============================================================================

#[allow(clippy::too_many_arguments)]
fn draw_eyes(vg: &mut Context, x: f32, y: f32, w: f32, h: f32, mx: f32, my: f32, t: f32) {
    let ex = w * 0.23;
    let ey = h * 0.5;
    let (lx, ly) = (x + ex, y + ey);
    let (rx, ry) = (x + w - ex, y + ey);
    let br = ex.min(ey) * 0.5;
    let blink = 1.0 - (t * 0.5).sin().powi(200) * 0.8;

    let shadow = vg.linear_gradient(
        x,
        y + h * 0.5,
        x + w * 0.1,
        y + h,
        Color::rgba(0, 0, 0, 32),
        Color::rgba(0, 0, 0, 16),
    );
    vg.begin_path();
    vg.ellipse(lx + 3.0, ly + 16.0, ex, ey);
    vg.ellipse(rx + 3.0, ry + 16.0, ex, ey);
    vg.fill_paint(shadow);
    vg.fill();

    let white = vg.linear_gradient(
        x,
        y + h * 0.25,
        x + w * 0.1,
        y + h,
        Color::rgba(220, 220, 220, 255),
        Color::rgba(128, 128, 128, 255),
    );
    vg.begin_path();
    vg.ellipse(lx, ly, ex, ey);
    vg.ellipse(rx, ry, ex, ey);
    vg.fill_paint(white);
    vg.fill();

    for (cx, cy) in [(lx, ly), (rx, ry)] {
        let (dx, dy) = pupil_offset(mx - cx, my - cy, ex, ey);
        vg.begin_path();
        vg.ellipse(cx + dx, cy + dy + ey * 0.25 * (1.0 - blink), br, br * blink);
        vg.fill_color(Color::rgba(32, 32, 32, 255));
        vg.fill();

        let gloss = vg.radial_gradient(
            cx - ex * 0.25,
            cy - ey * 0.5,
            ex * 0.1,
            ex * 0.75,
            Color::rgba(255, 255, 255, 128),
            Color::rgba(255, 255, 255, 0),
        );
        vg.begin_path();
        vg.ellipse(cx, cy, ex, ey);
        vg.fill_paint(gloss);
        vg.fill();
    }
}

/// Pupil displacement toward a target, kept inside the eye
pub(crate) fn pupil_offset(dx: f32, dy: f32, ex: f32, ey: f32) -> (f32, f32) {
    let mut dx = dx / (ex * 10.0);
    let mut dy = dy / (ey * 10.0);
    let d = (dx * dx + dy * dy).sqrt();
    if d > 1.0 {
        dx /= d;
        dy /= d;
    }
    (dx * ex * 0.4, dy * ey * 0.5)
}

/// Six graph samples in `[0, 1]` for time `t`
pub(crate) fn graph_samples(t: f32) -> [f32; 6] {
    [
        (1.0 + (t * 1.2345 + (t * 0.33457).cos() * 0.44).sin()) * 0.5,
        (1.0 + (t * 0.68363 + (t * 1.3).cos() * 1.55).sin()) * 0.5,
        (1.0 + (t * 1.1642 + (t * 0.33457).cos() * 1.24).sin()) * 0.5,
        (1.0 + (t * 0.56345 + (t * 1.63).cos() * 0.14).sin()) * 0.5,
        (1.0 + (t * 1.6245 + (t * 0.254).cos() * 0.3).sin()) * 0.5,
        (1.0 + (t * 0.345 + (t * 0.03).cos() * 0.6).sin()) * 0.5,
    ]
}

fn draw_graph(vg: &mut Context, x: f32, y: f32, w: f32, h: f32, t: f32) {
    let samples = graph_samples(t);
    let dx = w / 5.0;
    let points: Vec<(f32, f32)> = samples
        .iter()
        .enumerate()
        .map(|(i, s)| (x + i as f32 * dx, y + h * s * 0.8))
        .collect();

    let trace_curve = |vg: &mut Context| {
        vg.move_to(points[0].0, points[0].1);
        for pair in points.windows(2) {
            let ((px, py), (cx, cy)) = (pair[0], pair[1]);
            vg.bezier_to(px + dx * 0.5, py, cx - dx * 0.5, cy, cx, cy);
        }
    };

    let area = vg.linear_gradient(x, y, x, y + h, Color::rgba(0, 160, 192, 0), Color::rgba(0, 160, 192, 64));
    vg.begin_path();
    trace_curve(vg);
    vg.line_to(x + w, y + h);
    vg.line_to(x, y + h);
    vg.fill_paint(area);
    vg.fill();

    // Shadow, then the line itself
    vg.begin_path();
    vg.translate(0.0, 2.0);
    trace_curve(vg);
    vg.translate(0.0, -2.0);
    vg.stroke_color(Color::rgba(0, 0, 0, 32));
    vg.stroke_width(3.0);
    vg.stroke();

    vg.begin_path();
    trace_curve(vg);
    vg.stroke_color(Color::rgba(0, 160, 192, 255));
    vg.stroke_width(3.0);
    vg.stroke();

    for &(px, py) in &points {
        let halo = vg.radial_gradient(px, py + 2.0, 3.0, 8.0, Color::rgba(0, 0, 0, 32), Color::rgba(0, 0, 0, 0));
        vg.begin_path();
        vg.rect(px - 10.0, py - 10.0 + 2.0, 20.0, 20.0);
        vg.fill_paint(halo);
        vg.fill();
    }

    vg.begin_path();
    for &(px, py) in &points {
        vg.circle(px, py, 4.0);
    }
    vg.fill_color(Color::rgba(0, 160, 192, 255));
    vg.fill();

    vg.begin_path();
    for &(px, py) in &points {
        vg.circle(px, py, 2.0);
    }
    vg.fill_color(Color::rgba(220, 220, 220, 255));
    vg.fill();

    vg.stroke_width(1.0);
}

fn draw_color_wheel(vg: &mut Context, x: f32, y: f32, w: f32, h: f32, t: f32) {
    let hue = (t * 0.12).sin();
    let cx = x + w * 0.5;
    let cy = y + h * 0.5;
    let r1 = w.min(h) * 0.5 - 5.0;
    let r0 = r1 - 20.0;
    // Half a pixel of overlap hides the seams between segments
    let aeps = 0.5 / r1;

    vg.save();

    for i in 0..6 {
        let a0 = i as f32 / 6.0 * PI * 2.0 - aeps;
        let a1 = (i as f32 + 1.0) / 6.0 * PI * 2.0 + aeps;
        vg.begin_path();
        vg.arc(cx, cy, r0, a0, a1, Winding::Cw);
        vg.arc(cx, cy, r1, a1, a0, Winding::Ccw);
        vg.close_path();

        let ax = cx + a0.cos() * (r0 + r1) * 0.5;
        let ay = cy + a0.sin() * (r0 + r1) * 0.5;
        let bx = cx + a1.cos() * (r0 + r1) * 0.5;
        let by = cy + a1.sin() * (r0 + r1) * 0.5;
        let paint = vg.linear_gradient(
            ax,
            ay,
            bx,
            by,
            Color::hsla(a0 / (PI * 2.0), 1.0, 0.55, 255),
            Color::hsla(a1 / (PI * 2.0), 1.0, 0.55, 255),
        );
        vg.fill_paint(paint);
        vg.fill();
    }

    vg.begin_path();
    vg.circle(cx, cy, r0 - 0.5);
    vg.circle(cx, cy, r1 + 0.5);
    vg.stroke_color(Color::rgba(0, 0, 0, 64));
    vg.stroke_width(1.0);
    vg.stroke();

    // Selector
    vg.save();
    vg.translate(cx, cy);
    vg.rotate(hue * PI * 2.0);

    vg.stroke_width(2.0);
    vg.begin_path();
    vg.rect(r0 - 1.0, -3.0, r1 - r0 + 2.0, 6.0);
    vg.stroke_color(Color::rgba(255, 255, 255, 192));
    vg.stroke();

    let shadow = vg.box_gradient(
        r0 - 3.0,
        -5.0,
        r1 - r0 + 6.0,
        10.0,
        2.0,
        4.0,
        Color::rgba(0, 0, 0, 128),
        Color::rgba(0, 0, 0, 0),
    );
    vg.begin_path();
    vg.rect(r0 - 2.0 - 10.0, -4.0 - 10.0, r1 - r0 + 4.0 + 20.0, 8.0 + 20.0);
    vg.rect(r0 - 2.0, -4.0, r1 - r0 + 4.0, 8.0);
    vg.path_winding(Winding::HOLE);
    vg.fill_paint(shadow);
    vg.fill();

    // Center triangle
    let r = r0 - 6.0;
    let (ax, ay) = ((120.0f32 / 180.0 * PI).cos() * r, (120.0f32 / 180.0 * PI).sin() * r);
    let (bx, by) = ((-120.0f32 / 180.0 * PI).cos() * r, (-120.0f32 / 180.0 * PI).sin() * r);
    vg.begin_path();
    vg.move_to(r, 0.0);
    vg.line_to(ax, ay);
    vg.line_to(bx, by);
    vg.close_path();
    let fill = vg.linear_gradient(r, 0.0, ax, ay, Color::hsla(hue, 1.0, 0.5, 255), Color::rgba(255, 255, 255, 255));
    vg.fill_paint(fill);
    vg.fill();
    let shade = vg.linear_gradient(
        (r + ax) * 0.5,
        ay * 0.5,
        bx,
        by,
        Color::rgba(0, 0, 0, 0),
        Color::rgba(0, 0, 0, 255),
    );
    vg.fill_paint(shade);
    vg.fill();
    vg.stroke_color(Color::rgba(0, 0, 0, 64));
    vg.stroke();

    // Marker on the triangle
    let mx = (ax + bx) * 0.3;
    let my = (ay + by) * 0.4;
    vg.stroke_width(2.0);
    vg.begin_path();
    vg.circle(mx, my, 5.0);
    vg.stroke_color(Color::rgba(255, 255, 255, 192));
    vg.stroke();

    vg.restore();
    vg.restore();
}

fn draw_lines(vg: &mut Context, x: f32, y: f32, w: f32, _h: f32, t: f32) {
    let pad = 5.0;
    let s = w / 9.0 - pad * 2.0;
    let joins = [LineJoin::Miter, LineJoin::Bevel];
    let caps = [LineCap::Butt, LineCap::Square];
    let pts = [
        -s * 0.25 + (t * 0.3).cos() * s * 0.5,
        (t * 0.3).sin() * s * 0.5,
        -s * 0.25,
        0.0,
        s * 0.25,
        0.0,
        s * 0.25 + (-t * 0.3).cos() * s * 0.5,
        (-t * 0.3).sin() * s * 0.5,
    ];

    vg.save();
    for (i, cap) in caps.iter().enumerate() {
        for (j, join) in joins.iter().enumerate() {
            let fx = x + s * 0.5 + (i * 2 + j) as f32 / 9.0 * w + pad;
            let fy = y - s * 0.5 + pad;

            vg.line_cap(*cap);
            vg.line_join(*join);

            vg.stroke_width(s * 0.3);
            vg.stroke_color(Color::rgba(0, 0, 0, 160));
            vg.begin_path();
            vg.move_to(fx + pts[0], fy + pts[1]);
            vg.line_to(fx + pts[2], fy + pts[3]);
            vg.line_to(fx + pts[4], fy + pts[5]);
            vg.line_to(fx + pts[6], fy + pts[7]);
            vg.stroke();

            vg.line_cap(LineCap::Butt);
            vg.line_join(LineJoin::Bevel);

            vg.stroke_width(1.0);
            vg.stroke_color(Color::rgba(0, 192, 255, 255));
            vg.begin_path();
            vg.move_to(fx + pts[0], fy + pts[1]);
            vg.line_to(fx + pts[2], fy + pts[3]);
            vg.line_to(fx + pts[4], fy + pts[5]);
            vg.line_to(fx + pts[6], fy + pts[7]);
            vg.stroke();
        }
    }
    vg.restore();
}

fn draw_widths(vg: &mut Context, x: f32, y: f32, width: f32) {
    vg.save();
    vg.stroke_color(Color::rgba(0, 0, 0, 255));

    let mut y = y;
    for i in 0..20 {
        let w = (i as f32 + 0.5) * 0.1;
        vg.stroke_width(w);
        vg.begin_path();
        vg.move_to(x, y);
        vg.line_to(x + width, y + width * 0.3);
        vg.stroke();
        y += 10.0;
    }
    vg.restore();
}

fn draw_caps(vg: &mut Context, x: f32, y: f32, width: f32) {
    let caps = [LineCap::Butt, LineCap::Square];
    let line_width = 8.0;

    vg.save();

    vg.begin_path();
    vg.rect(x - line_width / 2.0, y, width + line_width, 40.0);
    vg.fill_color(Color::rgba(255, 255, 255, 32));
    vg.fill();

    vg.begin_path();
    vg.rect(x, y, width, 40.0);
    vg.fill_color(Color::rgba(255, 255, 255, 32));
    vg.fill();

    vg.stroke_width(line_width);
    for (i, cap) in caps.iter().enumerate() {
        vg.line_cap(*cap);
        vg.stroke_color(Color::rgba(0, 0, 0, 255));
        vg.begin_path();
        vg.move_to(x, y + i as f32 * 10.0 + 5.0);
        vg.line_to(x + width, y + i as f32 * 10.0 + 5.0);
        vg.stroke();
    }

    vg.restore();
}

fn draw_edit_box_base(vg: &mut Context, x: f32, y: f32, w: f32, h: f32) {
    let bg = vg.box_gradient(
        x + 1.0,
        y + 1.0 + 1.5,
        w - 2.0,
        h - 2.0,
        3.0,
        4.0,
        Color::rgba(255, 255, 255, 32),
        Color::rgba(32, 32, 32, 32),
    );
    vg.begin_path();
    vg.rounded_rect(x + 1.0, y + 1.0, w - 2.0, h - 2.0, 4.0 - 1.0);
    vg.fill_paint(bg);
    vg.fill();

    vg.begin_path();
    vg.rounded_rect(x + 0.5, y + 0.5, w - 1.0, h - 1.0, 4.0 - 0.5);
    vg.stroke_color(Color::rgba(0, 0, 0, 48));
    vg.stroke();
}

fn draw_spinner(vg: &mut Context, cx: f32, cy: f32, r: f32, t: f32) {
    let a0 = t * 6.0;
    let a1 = PI + t * 6.0;
    let r0 = r;
    let r1 = r * 0.75;

    vg.save();

    vg.begin_path();
    vg.arc(cx, cy, r0, a0, a1, Winding::Cw);
    vg.arc(cx, cy, r1, a1, a0, Winding::Ccw);
    vg.close_path();
    let ax = cx + a0.cos() * (r0 + r1) * 0.5;
    let ay = cy + a0.sin() * (r0 + r1) * 0.5;
    let bx = cx + a1.cos() * (r0 + r1) * 0.5;
    let by = cy + a1.sin() * (r0 + r1) * 0.5;
    let paint = vg.linear_gradient(ax, ay, bx, by, Color::rgba(0, 0, 0, 0), Color::rgba(0, 0, 0, 128));
    vg.fill_paint(paint);
    vg.fill();

    vg.restore();
}

/// Offset and size that make an image cover a square thumbnail
pub(crate) fn cover_rect(image_width: f32, image_height: f32, size: f32) -> (f32, f32, f32, f32) {
    if image_width < image_height {
        let h = size * image_height / image_width;
        (0.0, -(h - size) * 0.5, size, h)
    } else {
        let w = size * image_width / image_height;
        (-(w - size) * 0.5, 0.0, w, size)
    }
}

fn draw_thumbnails(vg: &mut Context, x: f32, y: f32, w: f32, h: f32, images: &[ImageId], t: f32) {
    let corner_radius = 3.0;

    vg.save();

    // Drop shadow
    let shadow = vg.box_gradient(
        x,
        y + 4.0,
        w,
        h,
        corner_radius * 2.0,
        20.0,
        Color::rgba(0, 0, 0, 128),
        Color::rgba(0, 0, 0, 0),
    );
    vg.begin_path();
    vg.rect(x - 10.0, y - 10.0, w + 20.0, h + 30.0);
    vg.rounded_rect(x, y, w, h, corner_radius);
    vg.path_winding(Winding::HOLE);
    vg.fill_paint(shadow);
    vg.fill();

    vg.begin_path();
    vg.rounded_rect(x, y, w, h, corner_radius);
    vg.fill_color(Color::rgba(200, 200, 200, 255));
    vg.fill();

    if images.is_empty() {
        draw_spinner(vg, x + w * 0.5, y + h * 0.5, 20.0, t);
        vg.restore();
        return;
    }

    let rows = images.len().div_ceil(2) as f32;
    let stack_height = rows * (THUMBNAIL_SIZE + 10.0) + 10.0;
    let scroll = (1.0 + (t * 0.5).cos()) * 0.5 * (stack_height - h).max(0.0);

    for (i, &image) in images.iter().enumerate() {
        let tx = x + 10.0 + (i % 2) as f32 * (THUMBNAIL_SIZE + 10.0);
        let ty = y + 10.0 + (i / 2) as f32 * (THUMBNAIL_SIZE + 10.0) - scroll;
        // No clipping: thumbnails crossing the panel edge are skipped
        if ty < y || ty + THUMBNAIL_SIZE > y + h {
            continue;
        }
        let Some((iw, ih)) = vg.image_size(image) else {
            continue;
        };

        let (ix, iy, pw, ph) = cover_rect(iw as f32, ih as f32, THUMBNAIL_SIZE);
        let pattern = vg.image_pattern(tx + ix, ty + iy, pw, ph, 0.0, image, 1.0);
        vg.begin_path();
        vg.rounded_rect(tx, ty, THUMBNAIL_SIZE, THUMBNAIL_SIZE, 5.0);
        vg.fill_paint(pattern);
        vg.fill();

        vg.begin_path();
        vg.rounded_rect(tx + 0.5, ty + 0.5, THUMBNAIL_SIZE - 1.0, THUMBNAIL_SIZE - 1.0, 4.0 - 0.5);
        vg.stroke_width(1.0);
        vg.stroke_color(Color::rgba(255, 255, 255, 192));
        vg.stroke();
    }

    vg.restore();
}

#[cfg(test)]
#[path = "demo_tests.rs"]
mod tests;
