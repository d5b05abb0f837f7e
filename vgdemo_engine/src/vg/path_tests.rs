//! Unit tests for path flattening and tessellation

use glam::Vec2;

use super::*;

const TESS_TOL: f32 = 0.25;
const DIST_TOL: f32 = 0.01;

fn v(x: f32, y: f32) -> Vec2 {
    Vec2::new(x, y)
}

fn square(size: f32) -> Vec<PathCommand> {
    vec![
        PathCommand::MoveTo(v(0.0, 0.0)),
        PathCommand::LineTo(v(0.0, size)),
        PathCommand::LineTo(v(size, size)),
        PathCommand::LineTo(v(size, 0.0)),
        PathCommand::Close,
    ]
}

fn flattened(commands: &[PathCommand]) -> PathCache {
    let mut cache = PathCache::new();
    cache.flatten(commands, TESS_TOL, DIST_TOL);
    cache
}

fn path_area(cache: &PathCache, index: usize) -> f32 {
    let path = &cache.paths[index];
    poly_area(&cache.points[path.first..path.first + path.count])
}

// ============================================================================
// FLATTENING
// ============================================================================

#[test]
fn test_flatten_square() {
    let cache = flattened(&square(10.0));

    assert_eq!(cache.paths.len(), 1);
    assert_eq!(cache.paths[0].count, 4);
    assert!(cache.paths[0].closed);
    assert_eq!(cache.bounds, [0.0, 0.0, 10.0, 10.0]);
}

#[test]
fn test_flatten_is_cached_until_cleared() {
    let mut cache = flattened(&square(10.0));
    cache.flatten(&square(50.0), TESS_TOL, DIST_TOL);
    assert_eq!(cache.bounds[2], 10.0);

    cache.clear();
    cache.flatten(&square(50.0), TESS_TOL, DIST_TOL);
    assert_eq!(cache.bounds[2], 50.0);
}

#[test]
fn test_closing_point_equal_to_start_is_dropped() {
    let cache = flattened(&[
        PathCommand::MoveTo(v(0.0, 0.0)),
        PathCommand::LineTo(v(10.0, 0.0)),
        PathCommand::LineTo(v(10.0, 10.0)),
        PathCommand::LineTo(v(0.0, 0.0)),
    ]);

    assert_eq!(cache.paths[0].count, 3);
    assert!(cache.paths[0].closed);
}

#[test]
fn test_coincident_points_are_merged() {
    let cache = flattened(&[
        PathCommand::MoveTo(v(0.0, 0.0)),
        PathCommand::LineTo(v(5.0, 5.0)),
        PathCommand::LineTo(v(5.0, 5.001)),
        PathCommand::LineTo(v(9.0, 0.0)),
    ]);

    assert_eq!(cache.paths[0].count, 3);
}

#[test]
fn test_degenerate_sub_paths_are_discarded() {
    let cache = flattened(&[PathCommand::MoveTo(v(1.0, 1.0)), PathCommand::MoveTo(v(2.0, 2.0))]);
    assert!(cache.paths.is_empty());
    assert_eq!(cache.bounds, [0.0; 4]);
}

#[test]
fn test_bezier_is_subdivided_within_its_hull() {
    let cache = flattened(&[
        PathCommand::MoveTo(v(0.0, 0.0)),
        PathCommand::BezierTo(v(0.0, 100.0), v(100.0, 100.0), v(100.0, 0.0)),
    ]);

    let path = &cache.paths[0];
    assert!(path.count > 8);
    let points = &cache.points[path.first..path.first + path.count];
    assert!(points.iter().all(|p| p.pos.y >= -0.001 && p.pos.y <= 100.0));
    assert_eq!(points.last().map(|p| p.pos), Some(v(100.0, 0.0)));
    // Only the curve end point is a corner
    assert!(!points[1].flags.contains(PointFlags::CORNER));
}

#[test]
fn test_winding_is_enforced() {
    let mut commands = square(10.0);
    let solid = flattened(&commands);
    assert!(path_area(&solid, 0) > 0.0);

    commands.push(PathCommand::Winding(Winding::HOLE));
    let hole = flattened(&commands);
    assert!(path_area(&hole, 0) < 0.0);
}

#[test]
fn test_segment_directions_are_normalized() {
    let cache = flattened(&square(10.0));
    for point in &cache.points[..4] {
        assert!((point.dir.length() - 1.0).abs() < 1e-5);
        assert_eq!(point.len, 10.0);
    }
}

// ============================================================================
// FILLS
// ============================================================================

#[test]
fn test_fill_without_fringe_emits_plain_fan() {
    let mut cache = flattened(&square(10.0));
    cache.expand_fill(0.0, LineJoin::Miter, 2.4, 1.0);

    let path = &cache.paths[0];
    assert_eq!(path.fill.len(), 4);
    assert!(path.stroke.is_empty());
    assert!(cache.vertices.iter().all(|vtx| vtx.u == 0.5 && vtx.v == 1.0));
}

#[test]
fn test_convex_fill_gets_half_fringe() {
    let mut cache = flattened(&square(10.0));
    cache.expand_fill(1.0, LineJoin::Miter, 2.4, 1.0);

    let path = &cache.paths[0];
    assert!(path.convex);
    assert_eq!(path.fill.len(), 4);
    // Two vertices per corner plus the two closing the loop
    assert_eq!(path.stroke.len(), 10);
    let strip = &cache.vertices[path.stroke.clone()];
    assert_eq!(strip[0].u, 0.5);
    assert_eq!(strip[1].u, 1.0);
    assert_eq!(strip[8].x, strip[0].x);
    assert_eq!(strip[9].y, strip[1].y);
}

#[test]
fn test_concave_path_is_not_convex() {
    let mut cache = flattened(&[
        PathCommand::MoveTo(v(0.0, 0.0)),
        PathCommand::LineTo(v(0.0, 20.0)),
        PathCommand::LineTo(v(20.0, 20.0)),
        PathCommand::LineTo(v(20.0, 10.0)),
        PathCommand::LineTo(v(10.0, 10.0)),
        PathCommand::LineTo(v(10.0, 0.0)),
        PathCommand::Close,
    ]);
    cache.expand_fill(1.0, LineJoin::Miter, 2.4, 1.0);

    assert!(!cache.paths[0].convex);
    // Full fringe: the outer side starts at u = 0
    assert_eq!(cache.vertices[cache.paths[0].stroke.start].u, 0.0);
}

#[test]
fn test_two_paths_are_never_convex_fill() {
    let mut commands = square(10.0);
    commands.extend(square(4.0));
    let mut cache = flattened(&commands);
    cache.expand_fill(1.0, LineJoin::Miter, 2.4, 1.0);

    assert_eq!(cache.paths.len(), 2);
    // Each path is convex but the pair is drawn with a full fringe
    assert_eq!(cache.vertices[cache.paths[0].stroke.start].u, 0.0);
}

// ============================================================================
// STROKES
// ============================================================================

#[test]
fn test_open_stroke_has_butt_caps() {
    let mut cache = flattened(&[PathCommand::MoveTo(v(0.0, 0.0)), PathCommand::LineTo(v(10.0, 0.0))]);
    cache.expand_stroke(1.0, 1.0, LineCap::Butt, LineJoin::Miter, 10.0);

    let path = &cache.paths[0];
    assert!(path.fill.is_empty());
    assert_eq!(path.stroke.len(), 8);

    let strip = &cache.vertices[path.stroke.clone()];
    // Half width grows by half a fringe, caps extend one fringe outwards
    assert_eq!(strip[0], Vertex::new(-0.5, -1.5, 0.0, 0.0));
    assert_eq!(strip[1], Vertex::new(-0.5, 1.5, 1.0, 0.0));
    assert_eq!(strip[7], Vertex::new(10.5, 1.5, 1.0, 0.0));
}

#[test]
fn test_square_cap_extends_past_the_end() {
    let mut cache = flattened(&[PathCommand::MoveTo(v(0.0, 0.0)), PathCommand::LineTo(v(10.0, 0.0))]);
    cache.expand_stroke(2.0, 0.0, LineCap::Square, LineJoin::Miter, 10.0);

    let strip = &cache.vertices[cache.paths[0].stroke.clone()];
    assert_eq!(strip[0].x, -2.0);
    assert_eq!(strip[7].x, 12.0);
    // No AA: every vertex sits in the middle of the coverage ramp
    assert!(strip.iter().all(|vtx| vtx.u == 0.5));
}

#[test]
fn test_closed_stroke_loops_back() {
    let mut cache = flattened(&square(10.0));
    cache.expand_stroke(1.0, 1.0, LineCap::Butt, LineJoin::Miter, 10.0);

    let strip = &cache.vertices[cache.paths[0].stroke.clone()];
    assert_eq!(strip.len(), 10);
    assert_eq!((strip[8].x, strip[8].y), (strip[0].x, strip[0].y));
}

#[test]
fn test_bevel_join_adds_vertices() {
    let mut miter = flattened(&square(10.0));
    miter.expand_stroke(1.0, 1.0, LineCap::Butt, LineJoin::Miter, 10.0);
    let mut bevel = flattened(&square(10.0));
    bevel.expand_stroke(1.0, 1.0, LineCap::Butt, LineJoin::Bevel, 10.0);

    assert!(bevel.paths[0].stroke.len() > miter.paths[0].stroke.len());
}

#[test]
fn test_sharp_corner_falls_back_to_bevel() {
    let commands = [
        PathCommand::MoveTo(v(0.0, 0.0)),
        PathCommand::LineTo(v(50.0, 2.0)),
        PathCommand::LineTo(v(0.0, 4.0)),
    ];
    let mut cache = flattened(&commands);
    cache.expand_stroke(1.0, 1.0, LineCap::Butt, LineJoin::Miter, 10.0);

    let tip = &cache.points[1];
    assert!(tip.flags.contains(PointFlags::BEVEL));
}
