//! Unit tests for colors, paints and batch layouts

use glam::Vec2;

use crate::device::BlendFactor;
use crate::vg::{BlendFactors, Color, FragUniforms, FrameBatch, ImageId, Paint, Vertex};

fn approx(a: f32, b: f32) -> bool {
    (a - b).abs() < 1e-4
}

// ============================================================================
// COLORS
// ============================================================================

#[test]
fn test_rgba_normalizes_components() {
    let color = Color::rgba(255, 0, 51, 128);
    assert_eq!(color.r, 1.0);
    assert_eq!(color.g, 0.0);
    assert!(approx(color.b, 0.2));
    assert!(approx(color.a, 128.0 / 255.0));
}

#[test]
fn test_hsl_primaries() {
    let red = Color::hsl(0.0, 1.0, 0.5);
    assert!(approx(red.r, 1.0) && approx(red.g, 0.0) && approx(red.b, 0.0));

    let green = Color::hsl(1.0 / 3.0, 1.0, 0.5);
    assert!(approx(green.r, 0.0) && approx(green.g, 1.0) && approx(green.b, 0.0));

    // Hue wraps around
    let wrapped = Color::hsl(1.0 + 2.0 / 3.0, 1.0, 0.5);
    assert!(approx(wrapped.b, 1.0));
    assert_eq!(Color::hsla(0.0, 0.0, 1.0, 64).a, 64.0 / 255.0);
}

#[test]
fn test_premultiplied_and_lerp() {
    let color = Color::rgbaf(1.0, 0.5, 0.0, 0.5);
    assert_eq!(color.premultiplied(), [0.5, 0.25, 0.0, 0.5]);

    let mid = Color::BLACK.lerp(Color::WHITE, 0.5);
    assert!(approx(mid.r, 0.5));
    assert_eq!(Color::BLACK.lerp(Color::WHITE, 4.0), Color::WHITE);
}

// ============================================================================
// PAINTS
// ============================================================================

#[test]
fn test_linear_gradient_places_start_on_box_edge() {
    let start = Vec2::new(10.0, 20.0);
    let end = Vec2::new(30.0, 20.0);
    let paint = Paint::linear_gradient(start, end, Color::WHITE, Color::BLACK);

    assert_eq!(paint.feather, 20.0);
    assert!(approx(paint.extent.y - paint.extent.x, 10.0));
    let mapped = paint.xform.transform_point2(Vec2::new(0.0, paint.extent.x));
    assert!(mapped.distance(start) < 0.1);
}

#[test]
fn test_degenerate_linear_gradient_points_down() {
    let paint = Paint::linear_gradient(Vec2::ZERO, Vec2::ZERO, Color::WHITE, Color::BLACK);
    assert_eq!(paint.feather, 1.0);
    assert_eq!(paint.xform.matrix2.y_axis, Vec2::new(0.0, 1.0));
}

#[test]
fn test_radial_and_box_gradients() {
    let radial = Paint::radial_gradient(Vec2::new(5.0, 5.0), 10.0, 30.0, Color::WHITE, Color::BLACK);
    assert_eq!(radial.radius, 20.0);
    assert_eq!(radial.feather, 20.0);
    assert_eq!(radial.xform.translation, Vec2::new(5.0, 5.0));

    let boxed = Paint::box_gradient(Vec2::new(0.0, 0.0), Vec2::new(100.0, 50.0), 4.0, 0.5, Color::WHITE, Color::BLACK);
    assert_eq!(boxed.xform.translation, Vec2::new(50.0, 25.0));
    assert_eq!(boxed.extent, Vec2::new(50.0, 25.0));
    // Feather never drops below one pixel
    assert_eq!(boxed.feather, 1.0);
}

#[test]
fn test_image_pattern_tints_with_alpha() {
    let paint = Paint::image_pattern(Vec2::new(3.0, 4.0), Vec2::new(16.0, 8.0), 0.0, ImageId(7), 0.25);
    assert_eq!(paint.image, Some(ImageId(7)));
    assert_eq!(paint.inner_color, Color::rgbaf(1.0, 1.0, 1.0, 0.25));
    assert_eq!(paint.xform.translation, Vec2::new(3.0, 4.0));
    assert_eq!(paint.extent, Vec2::new(16.0, 8.0));
}

// ============================================================================
// BATCH LAYOUT
// ============================================================================

#[test]
fn test_gpu_layouts() {
    assert_eq!(std::mem::size_of::<Vertex>(), 16);
    assert_eq!(FragUniforms::SIZE, 11 * 16);
}

#[test]
fn test_simple_uniforms_select_stencil_shader() {
    let simple = FragUniforms::simple();
    assert_eq!(simple.shader_type, 2.0);
    assert_eq!(simple.stroke_thr, -1.0);
    assert_eq!(simple.inner_color, [0.0; 4]);
}

#[test]
fn test_default_blend_is_premultiplied_source_over() {
    let blend = BlendFactors::default().to_blend_state();
    assert_eq!(blend.src_color, BlendFactor::One);
    assert_eq!(blend.dst_color, BlendFactor::OneMinusSrcAlpha);
    assert_eq!(blend.dst_alpha, BlendFactor::OneMinusSrcAlpha);
}

#[test]
fn test_frame_batch_offsets() {
    let mut batch = FrameBatch::new();
    assert!(batch.is_empty());

    assert_eq!(batch.push_vertices(&[Vertex::default(); 3]), 0);
    assert_eq!(batch.push_vertices(&[Vertex::default(); 2]), 3);
    assert_eq!(batch.push_uniforms(&[FragUniforms::simple()]), 0);
    assert_eq!(batch.push_uniforms(&[FragUniforms::simple(); 2]), 1);

    batch.clear();
    assert!(batch.vertices.is_empty() && batch.uniforms.is_empty());
}
